use crate::brief::chunk::ChunkSummarizer;
use crate::brief::model::{IssueContext, TimelineBucket};
use anyhow::{Result, anyhow};
use chrono::{Datelike, NaiveDate};
use std::collections::BTreeSet;

fn last_day_of_month(year: i32, month: u32) -> Option<NaiveDate> {
    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    NaiveDate::from_ymd_opt(next_year, next_month, 1)?.pred_opt()
}

/// Twelve empty buckets, January first, each spanning its whole month.
pub fn month_buckets(year: i32) -> Result<Vec<TimelineBucket>> {
    (1..=12)
        .map(|month| {
            let start_date = NaiveDate::from_ymd_opt(year, month, 1)
                .ok_or_else(|| anyhow!("year {year} is out of range"))?;
            let end_date = last_day_of_month(year, month)
                .ok_or_else(|| anyhow!("year {year} is out of range"))?;
            Ok(TimelineBucket {
                start_date,
                end_date,
                description: String::new(),
                fragments: BTreeSet::new(),
            })
        })
        .collect()
}

pub fn timeline_fragment(context: &IssueContext) -> String {
    format!(
        "{} {} {}\n",
        context.digest.focus.trim(),
        context.digest.achievements.trim(),
        context.digest.deliverable.trim()
    )
}

/// Adds each context's fragment to the bucket whose range strictly contains
/// its creation date. Dates on the first or last day of a month match no
/// bucket.
pub fn assign_contexts(buckets: &mut [TimelineBucket], contexts: &[IssueContext]) {
    for context in contexts {
        let created = match context.created_date() {
            Ok(date) => date,
            Err(err) => {
                tracing::warn!(key = %context.key, error = %err, "skipping context in timeline");
                continue;
            }
        };
        for bucket in buckets.iter_mut() {
            if bucket.start_date < created && created < bucket.end_date {
                bucket.fragments.insert(timeline_fragment(context));
            }
        }
    }
}

/// Monthly buckets for `year`, summarised and ordered most recent first.
pub fn build_timeline(
    contexts: &[IssueContext],
    year: i32,
    summarizer: &ChunkSummarizer<'_>,
) -> Result<Vec<TimelineBucket>> {
    let mut buckets = month_buckets(year)?;
    assign_contexts(&mut buckets, contexts);

    for bucket in &mut buckets {
        bucket.description = summarizer.summarize(&bucket.fragments)?;
        tracing::debug!(
            month = bucket.start_date.month(),
            fragments = bucket.fragments.len(),
            "timeline bucket summarised"
        );
    }

    buckets.sort_by(|a, b| b.start_date.cmp(&a.start_date));
    Ok(buckets)
}
