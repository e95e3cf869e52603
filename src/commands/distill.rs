use anyhow::Result;

use crate::atlassian::jira::JiraClient;
use crate::brief::distill::DistillOutcome;
use crate::brief::llm::build_generator;
use crate::brief::pipeline::{PipelineContext, distill_for_project};
use crate::commands::{CommandReport, Session, ensure_tracker_configured};

#[derive(Debug, Clone, Default)]
pub struct DistillOptions {
    pub project: Option<String>,
    pub dry_run: bool,
}

pub fn describe_outcome(report: &mut CommandReport, project: &str, outcome: &DistillOutcome) {
    report.detail(format!(
        "{project}: fetched={} cached={} distilled={} skipped={}",
        outcome.fetched,
        outcome.already_cached,
        outcome.distilled.len(),
        outcome.skipped.len()
    ));
    if !outcome.skipped.is_empty() {
        report.detail(format!(
            "{project}: skipped_keys={} (retried next run)",
            outcome.skipped.join(",")
        ));
    }
    if !outcome.pending.is_empty() {
        report.detail(format!(
            "{project}: would_distill={}",
            outcome.pending.join(",")
        ));
    }
}

pub fn run_with(session: &Session, opts: &DistillOptions) -> Result<CommandReport> {
    let mut report = CommandReport::new("distill");
    if opts.dry_run {
        report.detail("distill.dry_run=true");
    }
    let projects = session.projects(opts.project.as_deref(), &mut report);
    if projects.is_empty() || !ensure_tracker_configured(&session.cfg, &mut report) {
        return Ok(report);
    }

    let generator = build_generator(&session.cfg.llm)?;
    let jira = JiraClient::new(&session.cfg.tracker)?;
    let ctx = PipelineContext {
        cfg: &session.cfg,
        paths: &session.paths,
        cache: &session.cache,
        generator: generator.as_ref(),
    };

    for project in projects {
        match distill_for_project(&ctx, &jira, project, opts.dry_run) {
            Ok(outcome) => describe_outcome(&mut report, &project.name, &outcome),
            Err(err) => {
                tracing::error!(project = %project.name, error = ?err, "distillation failed");
                report.issue(format!("{}: {err:#}", project.name));
            }
        }
    }
    Ok(report)
}

pub fn run(opts: &DistillOptions) -> Result<CommandReport> {
    let session = Session::open()?;
    run_with(&session, opts)
}
