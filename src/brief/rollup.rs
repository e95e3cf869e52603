use crate::brief::config::PipelineConfig;
use crate::brief::llm::{CompletionRequest, Persona, TextGenerator};
use crate::brief::model::IssueContext;
use crate::brief::util::clamp_with_ellipsis;
use crate::error::GenerationError;
use chrono::{Days, NaiveDate};
use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Achievements,
    Focus,
    NextSteps,
    Risks,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::Achievements,
        Category::Focus,
        Category::NextSteps,
        Category::Risks,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Category::Achievements => "achievements",
            Category::Focus => "focus",
            Category::NextSteps => "next-steps",
            Category::Risks => "risks",
        }
    }

    /// Achievements and focus look back at finished work, the others at
    /// what is still open.
    fn wants_closed(self) -> bool {
        matches!(self, Category::Achievements | Category::Focus)
    }

    fn persona(self) -> Persona {
        if self.wants_closed() {
            Persona::ProjectManager
        } else {
            Persona::ScrumMaster
        }
    }

    fn text(self, context: &IssueContext) -> String {
        match self {
            Category::Achievements => format!("{}\n", context.digest.achievements.trim()),
            Category::Focus => format!("{}\n", context.digest.focus.trim()),
            Category::NextSteps | Category::Risks => format!(
                "{}: {}\n",
                context.metadata.title.trim(),
                context.metadata.description.trim()
            ),
        }
    }

    fn ask(self) -> &'static str {
        match self {
            Category::Achievements => "Summarize and highlight achievements",
            Category::Focus => "Summarize the focus items which were taken in last sprint",
            Category::NextSteps => "Summarize the next steps which should be taken in next sprint",
            Category::Risks => "Summarize the risks which might occur in next sprint",
        }
    }

    fn prompt(self, content: &str, lines: usize, max_chars: usize) -> String {
        format!(
            "{} in {lines} lines, each max. {max_chars} characters, from the following content. Return only those {lines} lines without any other additional output. Do not include line numbers into the output.\n\nContent:\n{content}",
            self.ask()
        )
    }
}

/// `created` falls inside the trailing window when it is strictly after
/// `today - days`.
pub fn in_window(created: NaiveDate, today: NaiveDate, days: u32) -> bool {
    match today.checked_sub_days(Days::new(u64::from(days))) {
        Some(cutoff) => created > cutoff,
        None => true,
    }
}

/// Concatenated text of every context the category selects.
pub fn category_content(
    category: Category,
    contexts: &[IssueContext],
    pipeline: &PipelineConfig,
    today: NaiveDate,
) -> String {
    let mut content = String::new();
    for context in contexts {
        let created = match context.created_date() {
            Ok(date) => date,
            Err(err) => {
                tracing::warn!(key = %context.key, error = %err, "skipping context in rollup");
                continue;
            }
        };
        if !in_window(created, today, pipeline.sprint_length_days) {
            continue;
        }
        if context.is_closed(&pipeline.closed_states) != category.wants_closed() {
            continue;
        }
        content.push_str(&category.text(context));
    }
    content
}

fn split_lines(reply: &str, max_chars: usize) -> Vec<String> {
    reply
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| clamp_with_ellipsis(line, max_chars))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Sorted, de-duplicated lines for one category; no model call when nothing
/// matches.
pub fn summarize_category(
    category: Category,
    contexts: &[IssueContext],
    pipeline: &PipelineConfig,
    today: NaiveDate,
    generator: &dyn TextGenerator,
) -> Result<Vec<String>, GenerationError> {
    let content = category_content(category, contexts, pipeline, today);
    if content.trim().is_empty() {
        tracing::debug!(category = category.label(), "no matching context, rollup empty");
        return Ok(Vec::new());
    }
    let request = CompletionRequest::text(
        category.persona(),
        category.prompt(&content, pipeline.rollup_lines, pipeline.summary_max_chars),
    );
    let reply = generator.complete(&request)?;
    Ok(split_lines(&reply, pipeline.summary_max_chars))
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Rollups {
    pub achievements: Vec<String>,
    pub focus: Vec<String>,
    pub next_steps: Vec<String>,
    pub risks: Vec<String>,
}

pub fn build_rollups(
    contexts: &[IssueContext],
    pipeline: &PipelineConfig,
    today: NaiveDate,
    generator: &dyn TextGenerator,
) -> Result<Rollups, GenerationError> {
    let mut rollups = Rollups::default();
    for category in Category::ALL {
        let lines = summarize_category(category, contexts, pipeline, today, generator)?;
        tracing::debug!(category = category.label(), lines = lines.len(), "rollup built");
        match category {
            Category::Achievements => rollups.achievements = lines,
            Category::Focus => rollups.focus = lines,
            Category::NextSteps => rollups.next_steps = lines,
            Category::Risks => rollups.risks = lines,
        }
    }
    Ok(rollups)
}
