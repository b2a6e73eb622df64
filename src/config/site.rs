//! Site configuration (config.toml)

use anyhow::{Context, Result};
use chrono::format::{Item, StrftimeItems};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// Name of the configuration file at the site root
pub const CONFIG_FILE: &str = "config.toml";

/// Main site configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    // Site
    pub title: String,
    pub description: String,
    pub author: String,
    pub language: String,

    // URL
    pub base_url: String,
    pub root: String,

    // Directory
    pub content_dir: String,
    pub output_dir: String,
    pub static_dir: String,
    pub templates_dir: String,
    /// Glob patterns (relative to the content dir) that are never loaded
    pub ignored_content: Vec<String>,

    // Writing
    pub date_format: String,
    pub render_drafts: bool,

    #[serde(default)]
    pub markdown: MarkdownConfig,

    #[serde(default)]
    pub check: CheckConfig,

    /// Free-form values passed through to templates
    #[serde(default)]
    pub extra: HashMap<String, toml::Value>,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            title: "My Blog".to_string(),
            description: String::new(),
            author: String::new(),
            language: "en".to_string(),

            base_url: "http://example.com".to_string(),
            root: "/".to_string(),

            content_dir: "content".to_string(),
            output_dir: "public".to_string(),
            static_dir: "static".to_string(),
            templates_dir: "templates".to_string(),
            ignored_content: Vec::new(),

            date_format: "%B %d, %Y".to_string(),
            render_drafts: false,

            markdown: MarkdownConfig::default(),
            check: CheckConfig::default(),
            extra: HashMap::new(),
        }
    }
}

impl SiteConfig {
    /// Load configuration from a file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {:?}", path))?;
        let config: SiteConfig =
            toml::from_str(&content).with_context(|| format!("Invalid config {:?}", path))?;
        config.validate()?;
        tracing::debug!("Loaded config from {:?}", path);
        Ok(config)
    }

    /// Reject settings that would only fail once pages are rendered
    pub fn validate(&self) -> Result<()> {
        let invalid = StrftimeItems::new(&self.date_format).any(|item| matches!(item, Item::Error));
        if invalid {
            anyhow::bail!("Invalid date_format {:?}", self.date_format);
        }
        Ok(())
    }

    /// Absolute permalink for a site-relative path
    pub fn permalink(&self, path: &str) -> String {
        let base = self.base_url.trim_end_matches('/');
        format!("{}{}", base, self.url_for(path))
    }

    /// Site-relative URL honoring `root`
    pub fn url_for(&self, path: &str) -> String {
        let root = self.root.trim_end_matches('/');
        let path = path.trim_start_matches('/');

        if path.is_empty() {
            format!("{}/", root)
        } else {
            format!("{}/{}", root, path)
        }
    }
}

/// Markdown rendering options
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MarkdownConfig {
    pub highlight_code: bool,
    pub highlight_theme: String,
    pub line_numbers: bool,
    pub smart_punctuation: bool,
    pub external_links_target_blank: bool,
}

impl Default for MarkdownConfig {
    fn default() -> Self {
        Self {
            highlight_code: true,
            highlight_theme: "base16-ocean.dark".to_string(),
            line_numbers: false,
            smart_punctuation: true,
            external_links_target_blank: false,
        }
    }
}

/// Options for `plume check`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckConfig {
    /// Treat a missing `extra.author` as an error instead of a warning
    pub require_author: bool,
    /// Verify that relative link and image targets exist on disk
    pub local_links: bool,
}

impl Default for CheckConfig {
    fn default() -> Self {
        Self {
            require_author: false,
            local_links: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SiteConfig::default();
        assert_eq!(config.content_dir, "content");
        assert_eq!(config.output_dir, "public");
        assert!(config.markdown.highlight_code);
        assert!(!config.check.require_author);
    }

    #[test]
    fn test_parse_config() {
        let source = r#"
title = "Andy's Notes"
base_url = "https://andy.example.org"
ignored_content = ["*.bak"]

[markdown]
line_numbers = true

[check]
require_author = true

[extra]
github = "andyday"
"#;
        let config: SiteConfig = toml::from_str(source).unwrap();
        assert_eq!(config.title, "Andy's Notes");
        assert_eq!(config.ignored_content, vec!["*.bak"]);
        assert!(config.markdown.line_numbers);
        assert!(config.markdown.smart_punctuation);
        assert!(config.check.require_author);
        assert_eq!(
            config.extra.get("github").and_then(|v| v.as_str()),
            Some("andyday")
        );
    }

    #[test]
    fn test_invalid_date_format_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        fs::write(&path, "date_format = \"%Q\"\n").unwrap();
        let err = SiteConfig::load(&path).unwrap_err();
        assert!(err.to_string().contains("Invalid date_format"));

        fs::write(&path, "date_format = \"%d/%m/%Y\"\n").unwrap();
        assert_eq!(SiteConfig::load(&path).unwrap().date_format, "%d/%m/%Y");
    }

    #[test]
    fn test_url_helpers() {
        let config = SiteConfig {
            base_url: "https://example.com/".to_string(),
            root: "/blog/".to_string(),
            ..Default::default()
        };
        assert_eq!(config.url_for("/numba-odes/"), "/blog/numba-odes/");
        assert_eq!(config.url_for(""), "/blog/");
        assert_eq!(
            config.permalink("numba-odes/"),
            "https://example.com/blog/numba-odes/"
        );
    }
}
