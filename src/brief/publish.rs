use crate::brief::config::ReportConfig;
use crate::brief::model::ExecutiveReport;
use crate::error::TemplateError;
use anyhow::{Context, Result};
use handlebars::Handlebars;
use std::fs;
use std::path::{Path, PathBuf};

pub const BUILTIN_TEMPLATE: &str = include_str!("../../templates/exec_summary.html.hbs");
const TEMPLATE_NAME: &str = "exec_summary";

/// Renders an [`ExecutiveReport`] to wiki storage HTML. Values are
/// HTML-escaped.
pub struct ReportRenderer {
    handlebars: Handlebars<'static>,
}

impl ReportRenderer {
    pub fn from_source(source: &str) -> Result<Self, TemplateError> {
        let mut handlebars = Handlebars::new();
        handlebars.register_template_string(TEMPLATE_NAME, source)?;
        Ok(Self { handlebars })
    }

    pub fn builtin() -> Result<Self, TemplateError> {
        Self::from_source(BUILTIN_TEMPLATE)
    }

    pub fn from_file(path: &Path) -> Result<Self, TemplateError> {
        let source = fs::read_to_string(path)?;
        Self::from_source(&source)
    }

    pub fn from_config(cfg: &ReportConfig) -> Result<Self, TemplateError> {
        match cfg.template_path.as_deref().map(str::trim).filter(|p| !p.is_empty()) {
            Some(path) => {
                tracing::debug!(template = path, "using custom report template");
                Self::from_file(Path::new(path))
            }
            None => Self::builtin(),
        }
    }

    pub fn render(&self, report: &ExecutiveReport) -> Result<String, TemplateError> {
        Ok(self.handlebars.render(TEMPLATE_NAME, report)?)
    }
}

pub fn preview_path(preview_dir: &Path, page_id: &str) -> PathBuf {
    preview_dir.join(format!("{page_id}.html"))
}

pub fn write_preview(preview_dir: &Path, page_id: &str, html: &str) -> Result<PathBuf> {
    fs::create_dir_all(preview_dir)
        .with_context(|| format!("failed to create {}", preview_dir.display()))?;
    let path = preview_path(preview_dir, page_id);
    fs::write(&path, html).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(path)
}
