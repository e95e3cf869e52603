use crate::brief::llm::{CompletionRequest, Persona, TextGenerator};
use crate::brief::util::{clamp_with_ellipsis, truncate_chars};
use crate::error::GenerationError;

pub const CONTENT_MARKER: &str = "\n\nContent:\n";

fn collapse_prompt(content: &str, max_chars: usize) -> String {
    format!(
        "Create one line summary of MAXIMUM {max_chars} characters long describing highlights, achievements, risks, focus and deliverables from the content below. Return only the summary, MAX {max_chars} characters long, without any other additional information.{CONTENT_MARKER}{content}"
    )
}

/// Folds any number of fragments into one short summary while keeping every
/// model call under `budget_chars` characters of content.
pub struct ChunkSummarizer<'a> {
    generator: &'a dyn TextGenerator,
    budget_chars: usize,
    summary_max_chars: usize,
}

impl<'a> ChunkSummarizer<'a> {
    /// `summary_max_chars` must be smaller than `budget_chars`; config
    /// validation enforces it.
    pub fn new(
        generator: &'a dyn TextGenerator,
        budget_chars: usize,
        summary_max_chars: usize,
    ) -> Self {
        Self {
            generator,
            budget_chars,
            summary_max_chars,
        }
    }

    // A collapsed accumulator plus one capped fragment still fits the budget.
    fn fragment_cap(&self) -> usize {
        self.budget_chars.saturating_sub(self.summary_max_chars).max(1)
    }

    fn collapse(&self, content: &str) -> Result<String, GenerationError> {
        let request = CompletionRequest::text(
            Persona::ProjectManager,
            collapse_prompt(content, self.summary_max_chars),
        );
        let reply = self.generator.complete(&request)?;
        Ok(clamp_with_ellipsis(&reply, self.summary_max_chars))
    }

    pub fn summarize<I, S>(&self, fragments: I) -> Result<String, GenerationError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let cap = self.fragment_cap();
        let mut acc = String::new();
        let mut acc_chars = 0usize;

        for fragment in fragments {
            let mut fragment = fragment.as_ref();
            let owned;
            if fragment.chars().count() > cap {
                tracing::debug!(cap, "clamping oversized fragment before summarisation");
                owned = truncate_chars(fragment, cap);
                fragment = &owned;
            }
            let fragment_chars = fragment.chars().count();

            if !acc.is_empty() && acc_chars + fragment_chars > self.budget_chars {
                acc = self.collapse(&acc)?;
                acc_chars = acc.chars().count();
            }
            acc.push_str(fragment);
            acc_chars += fragment_chars;
        }

        if acc.trim().is_empty() {
            return Ok(String::new());
        }
        self.collapse(&acc)
    }
}
