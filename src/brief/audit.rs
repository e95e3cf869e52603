use crate::brief::paths::BriefPaths;
use crate::brief::util::now_epoch_secs;
use anyhow::{Context, Result};
use serde::Serialize;
use std::fs;
use std::io::Write;
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize)]
pub struct AuditEvent {
    pub at_epoch_secs: u64,
    pub phase: String,
    pub status: String,
    pub project: String,
    pub message: String,
}

pub fn audit_log_path(paths: &BriefPaths) -> PathBuf {
    paths.logs_dir.join("audit.log")
}

pub fn append_event(
    paths: &BriefPaths,
    phase: &str,
    status: &str,
    project: &str,
    message: &str,
) -> Result<()> {
    fs::create_dir_all(&paths.logs_dir)
        .with_context(|| format!("failed to create {}", paths.logs_dir.display()))?;
    let event = AuditEvent {
        at_epoch_secs: now_epoch_secs()?,
        phase: phase.to_string(),
        status: status.to_string(),
        project: project.to_string(),
        message: message.to_string(),
    };

    let line = format!("{}\n", serde_json::to_string(&event)?);
    let path = audit_log_path(paths);
    let mut file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    file.write_all(line.as_bytes())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{append_event, audit_log_path};
    use crate::brief::paths::BriefPaths;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn append_event_writes_one_json_line_per_event() {
        let tmp = tempdir().expect("tempdir");
        let paths = BriefPaths {
            brief_home: tmp.path().to_path_buf(),
            config_file: tmp.path().join("brief.toml"),
            logs_dir: tmp.path().join("logs"),
            cache_db: tmp.path().join("cache.sqlite"),
            preview_dir: tmp.path().join("preview"),
        };

        append_event(&paths, "distill", "ok", "Apollo", "PROJ-1 cached").expect("first");
        append_event(&paths, "distill", "skipped", "Apollo", "PROJ-2 schema").expect("second");

        let raw = fs::read_to_string(audit_log_path(&paths)).expect("read audit log");
        let lines: Vec<_> = raw.lines().collect();
        assert_eq!(lines.len(), 2);
        let second: serde_json::Value = serde_json::from_str(lines[1]).expect("json line");
        assert_eq!(second["status"], "skipped");
        assert_eq!(second["project"], "Apollo");
    }
}
