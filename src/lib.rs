//! plume: a small static blog toolkit
//!
//! Documents are Markdown files whose TOML front matter sits between `+++`
//! delimiters. This crate parses and checks them, lists them in date order,
//! and renders them to static HTML with Tera templates.

pub mod cache;
pub mod check;
pub mod commands;
pub mod config;
pub mod content;
pub mod generator;
pub mod server;
pub mod templates;

use anyhow::Result;
use std::path::{Path, PathBuf};

/// A site rooted at a directory
#[derive(Debug, Clone)]
pub struct Site {
    /// Site configuration
    pub config: config::SiteConfig,
    /// Base directory
    pub base_dir: PathBuf,
    /// Markdown sources
    pub content_dir: PathBuf,
    /// Rendered output
    pub output_dir: PathBuf,
    /// Files copied verbatim into the output
    pub static_dir: PathBuf,
    /// Template overrides
    pub templates_dir: PathBuf,
}

impl Site {
    /// Create a site from a directory, reading `config.toml` if present
    pub fn new<P: AsRef<Path>>(base_dir: P) -> Result<Self> {
        let base_dir = base_dir.as_ref().to_path_buf();
        let config_path = base_dir.join(config::CONFIG_FILE);

        let config = if config_path.exists() {
            config::SiteConfig::load(&config_path)?
        } else {
            tracing::debug!("No {} found, using defaults", config::CONFIG_FILE);
            config::SiteConfig::default()
        };

        Ok(Self::with_config(base_dir, config))
    }

    /// Create a site from an already loaded configuration
    pub fn with_config(base_dir: PathBuf, config: config::SiteConfig) -> Self {
        let content_dir = base_dir.join(&config.content_dir);
        let output_dir = base_dir.join(&config.output_dir);
        let static_dir = base_dir.join(&config.static_dir);
        let templates_dir = base_dir.join(&config.templates_dir);

        Self {
            config,
            base_dir,
            content_dir,
            output_dir,
            static_dir,
            templates_dir,
        }
    }

    /// Path of the configuration file
    pub fn config_path(&self) -> PathBuf {
        self.base_dir.join(config::CONFIG_FILE)
    }

    /// Build the static site
    pub fn build(&self) -> Result<()> {
        commands::generate::run(self, &commands::generate::BuildOptions::default())
    }

    /// Remove the output directory and cache
    pub fn clean(&self) -> Result<()> {
        commands::clean::run(self)
    }
}
