use crate::brief::audit::append_event;
use crate::brief::cache::ContextCache;
use crate::brief::config::PipelineConfig;
use crate::brief::llm::{CompletionRequest, Persona, TextGenerator};
use crate::brief::model::{Issue, IssueContext, IssueDigest, IssueMetadata};
use crate::brief::paths::BriefPaths;
use crate::brief::util::truncate_chars;
use crate::error::GenerationError;
use anyhow::{Context, Result};
use serde_json::{Value, json};

/// JSON schema for [`IssueDigest`]: six required string fields.
pub fn digest_schema() -> Value {
    let mut properties = serde_json::Map::new();
    for field in IssueDigest::FIELDS {
        properties.insert(field.to_string(), json!({"type": "string"}));
    }
    json!({
        "type": "object",
        "properties": properties,
        "required": IssueDigest::FIELDS,
    })
}

fn distill_prompt(issue: &Issue, description: &str, project_title: &str, max_chars: usize) -> String {
    let ticket = json!({
        "key": issue.key,
        "summary": issue.summary,
        "status": issue.status,
        "created": issue.created,
        "priority": issue.priority,
        "assignee": issue.assignee,
        "labels": issue.labels,
        "description": description,
    });
    format!(
        "Analyze the following Jira ticket in the context of the project '{project_title}'. Your response must be in English.
You must provide a value for ALL fields. If information is not in the ticket, infer it from the context.
For each field, provide a concise answer (max {max_chars} characters).
Provide the result as JSON with these string fields:
key: Jira issue key
summary: Concise jira issue summary
achievements: What was achieved with this ticket in relation to project goals.
deliverable: The concrete deliverable from this ticket.
focus: The main focus area of this ticket (e.g., bug fix, new feature, backend, frontend, etc.).
risks: Any potential risks that could arise from or are highlighted by this ticket.
DO NOT include anything else in your answer apart from valid JSON.
Given the following jira issue {ticket} provide only the result JSON."
    )
}

// Models sometimes wrap JSON in a fence or a sentence.
fn json_body(reply: &str) -> &str {
    match (reply.find('{'), reply.rfind('}')) {
        (Some(start), Some(end)) if start < end => &reply[start..=end],
        _ => reply.trim(),
    }
}

pub fn parse_digest(reply: &str) -> Result<IssueDigest, GenerationError> {
    let digest: IssueDigest = serde_json::from_str(json_body(reply))
        .map_err(|err| GenerationError::SchemaValidation(format!("reply is not a digest: {err}")))?;
    let empty = digest.empty_fields();
    if !empty.is_empty() {
        return Err(GenerationError::SchemaValidation(format!(
            "empty fields: {}",
            empty.join(", ")
        )));
    }
    Ok(digest)
}

/// One structured generation call turning an issue into its cached context.
pub fn distill_issue(
    issue: &Issue,
    project_title: &str,
    report_id: &str,
    generator: &dyn TextGenerator,
    pipeline: &PipelineConfig,
) -> Result<IssueContext, GenerationError> {
    let metadata = IssueMetadata::from_issue(issue, pipeline.description_max_chars);
    let description = truncate_chars(
        issue.description.as_deref().unwrap_or_default(),
        pipeline.description_max_chars,
    );
    let request = CompletionRequest {
        persona: Persona::ScrumMaster,
        prompt: distill_prompt(issue, &description, project_title, pipeline.summary_max_chars),
        schema: Some(digest_schema()),
    };
    let reply = generator.complete(&request)?;
    let digest = parse_digest(&reply)?;
    Ok(IssueContext {
        key: issue.key.clone(),
        report_id: report_id.to_string(),
        digest,
        metadata,
    })
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DistillOutcome {
    pub fetched: usize,
    pub already_cached: usize,
    pub distilled: Vec<String>,
    pub skipped: Vec<String>,
    /// Keys a dry run would have distilled.
    pub pending: Vec<String>,
}

pub struct DistillJob<'a> {
    pub project: &'a str,
    pub report_id: &'a str,
    pub dry_run: bool,
}

/// Distils every issue not yet cached for the report. Schema and token-limit
/// failures skip the issue; any other generation failure aborts the project.
pub fn distill_project(
    job: &DistillJob<'_>,
    issues: &[Issue],
    cache: &ContextCache,
    generator: &dyn TextGenerator,
    pipeline: &PipelineConfig,
    paths: &BriefPaths,
) -> Result<DistillOutcome> {
    let cached = cache
        .keys_for_report(job.report_id)
        .with_context(|| format!("failed to read cached keys for page {}", job.report_id))?;
    let mut outcome = DistillOutcome {
        fetched: issues.len(),
        ..DistillOutcome::default()
    };

    for issue in issues {
        if cached.contains(&issue.key) {
            tracing::debug!(key = %issue.key, "already cached");
            outcome.already_cached += 1;
            continue;
        }
        if job.dry_run {
            outcome.pending.push(issue.key.clone());
            continue;
        }

        tracing::debug!(key = %issue.key, "distilling issue");
        match distill_issue(issue, job.project, job.report_id, generator, pipeline) {
            Ok(context) => {
                cache
                    .upsert(&context)
                    .with_context(|| format!("failed to cache {}", issue.key))?;
                append_event(paths, "distill", "ok", job.project, &issue.key)?;
                outcome.distilled.push(issue.key.clone());
            }
            Err(err) if err.skips_issue() => {
                tracing::warn!(key = %issue.key, error = %err, "issue skipped, will retry next run");
                append_event(
                    paths,
                    "distill",
                    "skipped",
                    job.project,
                    &format!("{}: {err}", issue.key),
                )?;
                outcome.skipped.push(issue.key.clone());
            }
            Err(err) => {
                return Err(err).with_context(|| format!("distillation of {} failed", issue.key));
            }
        }
    }

    tracing::info!(
        project = job.project,
        fetched = outcome.fetched,
        cached = outcome.already_cached,
        distilled = outcome.distilled.len(),
        skipped = outcome.skipped.len(),
        "distillation finished"
    );
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::{DistillJob, digest_schema, distill_issue, distill_project, parse_digest};
    use crate::brief::cache::ContextCache;
    use crate::brief::config::PipelineConfig;
    use crate::brief::llm::Persona;
    use crate::brief::model::Issue;
    use crate::brief::paths::BriefPaths;
    use crate::brief::testing::RecordingGenerator;
    use crate::error::GenerationError;
    use std::fs;
    use tempfile::{TempDir, tempdir};

    fn issue(key: &str, description: Option<String>) -> Issue {
        Issue {
            key: key.to_string(),
            summary: format!("{key} summary"),
            description,
            status: "In Progress".to_string(),
            created: "2025-01-10T10:00:00.000+0000".to_string(),
            assignee: Some("dev@example.com".to_string()),
            labels: vec!["backend".to_string()],
            priority: Some("High".to_string()),
        }
    }

    fn digest_json(key: &str) -> String {
        serde_json::json!({
            "key": key,
            "summary": "Billing API",
            "achievements": "Endpoint live",
            "deliverable": "REST endpoint",
            "focus": "backend",
            "risks": "Load untested"
        })
        .to_string()
    }

    fn workspace() -> (TempDir, BriefPaths, ContextCache) {
        let tmp = tempdir().expect("tempdir");
        let paths = BriefPaths {
            brief_home: tmp.path().to_path_buf(),
            config_file: tmp.path().join("brief.toml"),
            logs_dir: tmp.path().join("logs"),
            cache_db: tmp.path().join("cache.sqlite"),
            preview_dir: tmp.path().join("preview"),
        };
        let cache = ContextCache::open(&paths.cache_db).expect("cache");
        (tmp, paths, cache)
    }

    fn pipeline() -> PipelineConfig {
        PipelineConfig::default()
    }

    fn job(dry_run: bool) -> DistillJob<'static> {
        DistillJob {
            project: "Apollo",
            report_id: "4242",
            dry_run,
        }
    }

    #[test]
    fn schema_requires_every_digest_field() {
        let schema = digest_schema();
        let required = schema["required"].as_array().expect("required");
        assert_eq!(required.len(), 6);
        assert_eq!(schema["properties"]["risks"]["type"], "string");
    }

    #[test]
    fn parse_digest_accepts_fenced_json() {
        let reply = format!("```json\n{}\n```", digest_json("APO-1"));
        let digest = parse_digest(&reply).expect("digest");
        assert_eq!(digest.key, "APO-1");
        assert_eq!(digest.focus, "backend");
    }

    #[test]
    fn parse_digest_rejects_blank_fields() {
        let reply = r#"{"key":"APO-1","summary":"s","achievements":"","deliverable":"d","focus":"f","risks":" "}"#;
        let err = parse_digest(reply).expect_err("blank fields");
        assert!(matches!(
            err,
            GenerationError::SchemaValidation(ref m) if m.contains("achievements") && m.contains("risks")
        ));
        assert!(parse_digest("not json at all").is_err());
    }

    #[test]
    fn distill_issue_truncates_description_and_uses_schema() {
        let generator = RecordingGenerator::replying(&digest_json("APO-1"));
        let long = format!("{}{}", "a".repeat(2048), "TAIL-MARKER");
        let context = distill_issue(
            &issue("APO-1", Some(long)),
            "Apollo",
            "4242",
            &generator,
            &PipelineConfig::default(),
        )
        .expect("context");

        assert_eq!(context.key, "APO-1");
        assert_eq!(context.report_id, "4242");
        assert_eq!(context.metadata.description.chars().count(), 2048);
        let request = &generator.requests()[0];
        assert_eq!(request.persona, Persona::ScrumMaster);
        assert!(request.schema.is_some());
        assert!(request.prompt.contains("'Apollo'"));
        assert!(!request.prompt.contains("TAIL-MARKER"));
    }

    #[test]
    fn cached_issues_make_no_generation_calls() {
        let (_tmp, paths, cache) = workspace();
        let issues = vec![issue("APO-1", None), issue("APO-2", None)];
        let generator = RecordingGenerator::new(|req| {
            let key = if req.prompt.contains("APO-1") { "APO-1" } else { "APO-2" };
            Ok(digest_json(key))
        });

        let first = distill_project(&job(false), &issues, &cache, &generator, &pipeline(), &paths)
            .expect("first run");
        assert_eq!(first.distilled, vec!["APO-1", "APO-2"]);
        assert_eq!(generator.call_count(), 2);

        let second = distill_project(&job(false), &issues, &cache, &generator, &pipeline(), &paths)
            .expect("second run");
        assert_eq!(second.already_cached, 2);
        assert!(second.distilled.is_empty());
        assert_eq!(generator.call_count(), 2);
    }

    #[test]
    fn schema_failures_skip_the_issue_and_leave_it_uncached() {
        let (_tmp, paths, cache) = workspace();
        let issues = vec![issue("APO-1", None), issue("APO-2", None)];
        let generator = RecordingGenerator::new(|req| {
            if req.prompt.contains("APO-1") {
                Ok("I could not do that".to_string())
            } else {
                Ok(digest_json("APO-2"))
            }
        });

        let outcome = distill_project(&job(false), &issues, &cache, &generator, &pipeline(), &paths)
            .expect("run");
        assert_eq!(outcome.skipped, vec!["APO-1"]);
        assert_eq!(outcome.distilled, vec!["APO-2"]);

        let keys = cache.keys_for_report("4242").expect("keys");
        assert!(!keys.contains("APO-1"));
        let audit = fs::read_to_string(paths.logs_dir.join("audit.log")).expect("audit");
        assert!(audit.contains("\"status\":\"skipped\""));
    }

    #[test]
    fn token_limit_skips_but_provider_failure_aborts() {
        let (_tmp, paths, cache) = workspace();
        let issues = vec![issue("APO-1", None)];

        let truncated = RecordingGenerator::new(|_| {
            Err(GenerationError::TokenLimitExceeded {
                provider: "ollama".to_string(),
                detail: "length".to_string(),
            })
        });
        let outcome = distill_project(&job(false), &issues, &cache, &truncated, &pipeline(), &paths)
            .expect("skip");
        assert_eq!(outcome.skipped, vec!["APO-1"]);

        let down = RecordingGenerator::new(|_| {
            Err(GenerationError::Provider {
                provider: "ollama".to_string(),
                message: "connection refused".to_string(),
            })
        });
        let err = distill_project(&job(false), &issues, &cache, &down, &pipeline(), &paths)
            .expect_err("abort");
        assert!(format!("{err:#}").contains("connection refused"));
    }

    #[test]
    fn dry_run_lists_pending_keys_without_calls() {
        let (_tmp, paths, cache) = workspace();
        let generator = RecordingGenerator::replying("unused");
        let outcome = distill_project(
            &job(true),
            &[issue("APO-9", None)],
            &cache,
            &generator,
            &PipelineConfig::default(),
            &paths,
        )
        .expect("dry run");
        assert_eq!(outcome.pending, vec!["APO-9"]);
        assert_eq!(generator.call_count(), 0);
        assert!(cache.keys_for_report("4242").expect("keys").is_empty());
    }
}
