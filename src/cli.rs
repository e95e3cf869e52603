use anyhow::Result;
use clap::{Args, Parser, Subcommand};

use crate::commands::{self, CommandReport};
use crate::logging;

#[derive(Parser)]
#[command(name = "pm-brief")]
#[command(about = "Executive status summaries from tracker issues", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Print the command report as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Debug logging (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Distil uncached issues into the context cache
    Distill(DistillArgs),
    /// Build and publish reports from cached context
    Report(ReportArgs),
    /// Distil, then build and publish, project by project
    Run(ReportArgs),
    /// Show paths, configured projects and cache contents
    Status,
}

#[derive(Args)]
struct DistillArgs {
    /// Only this project (case-insensitive name)
    #[arg(long)]
    project: Option<String>,

    /// List what would be distilled without calling the model
    #[arg(long)]
    dry_run: bool,
}

#[derive(Args)]
struct ReportArgs {
    /// Only this project (case-insensitive name)
    #[arg(long)]
    project: Option<String>,

    /// Timeline year; defaults to the configured year, then the current one
    #[arg(long)]
    year: Option<i32>,

    /// Write the preview file but do not publish
    #[arg(long)]
    dry_run: bool,
}

fn print_report(report: &CommandReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }
    let state = if report.ok { "ok" } else { "failed" };
    println!("{}: {state}", report.command);
    for detail in &report.details {
        println!("  {detail}");
    }
    for issue in &report.issues {
        println!("  issue: {issue}");
    }
    Ok(())
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let report = match cli.command {
        Command::Distill(args) => commands::distill::run(&commands::distill::DistillOptions {
            project: args.project,
            dry_run: args.dry_run,
        })?,
        Command::Report(args) => commands::report::run(&commands::report::PublishOptions {
            project: args.project,
            year: args.year,
            dry_run: args.dry_run,
        })?,
        Command::Run(args) => commands::run::run(&commands::run::RunOptions {
            project: args.project,
            year: args.year,
            dry_run: args.dry_run,
        })?,
        Command::Status => commands::status::run()?,
    };

    print_report(&report, cli.json)?;
    if !report.ok {
        std::process::exit(1);
    }
    Ok(())
}
