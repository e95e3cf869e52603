use anyhow::Result;
use std::env;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct BriefPaths {
    pub brief_home: PathBuf,
    pub config_file: PathBuf,
    pub logs_dir: PathBuf,
    pub cache_db: PathBuf,
    pub preview_dir: PathBuf,
}

fn required_home_dir() -> Result<PathBuf> {
    if let Some(home) = dirs::home_dir() {
        return Ok(home);
    }
    Err(anyhow::anyhow!("HOME directory could not be resolved"))
}

fn env_or_default_path(var: &str, fallback: PathBuf) -> PathBuf {
    match env::var(var) {
        Ok(v) if !v.trim().is_empty() => PathBuf::from(v.trim()),
        _ => fallback,
    }
}

pub fn resolve_paths() -> Result<BriefPaths> {
    let brief_home = match env::var("BRIEF_HOME") {
        Ok(v) if !v.trim().is_empty() => PathBuf::from(v.trim()),
        _ => required_home_dir()?.join(".pm-brief"),
    };

    let config_file = env_or_default_path("BRIEF_CONFIG_PATH", brief_home.join("brief.toml"));
    let logs_dir = env_or_default_path("BRIEF_LOGS_DIR", brief_home.join("logs"));
    let cache_db = env_or_default_path("BRIEF_CACHE_DB", brief_home.join("context-cache.sqlite"));
    let preview_dir = env_or_default_path("BRIEF_PREVIEW_DIR", brief_home.join("preview"));

    Ok(BriefPaths {
        brief_home,
        config_file,
        logs_dir,
        cache_db,
        preview_dir,
    })
}
