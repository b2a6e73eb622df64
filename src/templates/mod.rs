//! Page templates using the Tera template engine
//!
//! The default templates are embedded in the binary. Any `*.html` file in the
//! site's templates directory replaces the built-in template of the same name.

use anyhow::{Context as _, Result};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt::Write as _;
use std::path::Path;
use tera::{Context, Tera};
use walkdir::WalkDir;

use crate::content::TocEntry;

/// Template renderer
pub struct TemplateRenderer {
    tera: Tera,
}

impl TemplateRenderer {
    /// Create a renderer with the built-in templates, overridden from `templates_dir`
    pub fn new(templates_dir: &Path) -> Result<Self> {
        let mut tera = Tera::default();

        tera.add_raw_templates(vec![
            ("base.html", include_str!("default/base.html")),
            ("page.html", include_str!("default/page.html")),
            ("index.html", include_str!("default/index.html")),
        ])?;

        if templates_dir.is_dir() {
            for entry in WalkDir::new(templates_dir)
                .into_iter()
                .filter_map(|e| e.ok())
                .filter(|e| e.path().extension().is_some_and(|ext| ext == "html"))
            {
                let name = entry
                    .path()
                    .strip_prefix(templates_dir)
                    .unwrap_or(entry.path())
                    .to_string_lossy()
                    .replace('\\', "/");
                tera.add_template_file(entry.path(), Some(&name))
                    .with_context(|| format!("Invalid template {:?}", entry.path()))?;
                tracing::debug!("Loaded template override {}", name);
            }
        }

        tera.register_filter("date_format", date_format_filter);

        Ok(Self { tera })
    }

    /// Render a template with given context
    pub fn render(&self, template_name: &str, context: &Context) -> Result<String> {
        Ok(self.tera.render(template_name, context)?)
    }
}

/// Tera filter: format a `YYYY-MM-DD` string with a strftime pattern
fn date_format_filter(
    value: &tera::Value,
    args: &HashMap<String, tera::Value>,
) -> tera::Result<tera::Value> {
    let s = tera::try_get_value!("date_format", "value", String, value);
    let format = match args.get("format") {
        Some(val) => tera::try_get_value!("date_format", "format", String, val),
        None => "%B %d, %Y".to_string(),
    };

    let Ok(date) = chrono::NaiveDate::parse_from_str(&s, "%Y-%m-%d") else {
        return Ok(tera::Value::String(s));
    };

    // An invalid pattern surfaces as a formatting error, not a panic
    let mut out = String::new();
    write!(out, "{}", date.format(&format)).map_err(|_| {
        tera::Error::msg(format!("date_format: invalid date format {:?}", format))
    })?;
    Ok(tera::Value::String(out))
}

/// A rendered document as seen by templates
#[derive(Debug, Clone, Serialize)]
pub struct PageData {
    pub title: String,
    /// `YYYY-MM-DD`
    pub date: String,
    pub updated: Option<String>,
    pub author: Option<String>,
    pub description: Option<String>,
    pub tags: Vec<String>,
    pub slug: String,
    /// Site-relative URL
    pub path: String,
    pub permalink: String,
    pub content: String,
    /// Rendered text before the summary marker
    pub summary: Option<String>,
    pub toc: Vec<TocEntry>,
    pub word_count: usize,
    pub reading_time: usize,
}
