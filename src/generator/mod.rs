//! Generator module - renders documents to static HTML with Tera templates

use anyhow::{Context as _, Result};
use std::fs;
use std::path::Path;

use tera::Context;
use walkdir::WalkDir;

use crate::cache::ChangeSet;
use crate::content::links::LinkTarget;
use crate::content::loader::{is_markdown_file, Corpus};
use crate::content::{Document, MarkdownRenderer};
use crate::templates::{PageData, TemplateRenderer};
use crate::Site;

/// Static site generator
pub struct Generator {
    site: Site,
    markdown: MarkdownRenderer,
    templates: TemplateRenderer,
}

impl Generator {
    /// Create a new generator
    pub fn new(site: &Site) -> Result<Self> {
        let markdown = MarkdownRenderer::with_config(site.config.markdown.clone());
        let templates = TemplateRenderer::new(&site.templates_dir)?;

        Ok(Self {
            site: site.clone(),
            markdown,
            templates,
        })
    }

    /// Generate the entire site
    pub fn generate(&self, corpus: &Corpus) -> Result<()> {
        fs::create_dir_all(&self.site.output_dir)?;

        self.copy_static_files()?;
        self.copy_content_assets(corpus)?;

        for doc in &corpus.documents {
            self.generate_document(doc, corpus)?;
        }
        self.generate_index(corpus)?;

        tracing::info!("Generated {} pages", corpus.documents.len());
        Ok(())
    }

    /// Regenerate only what a changeset names
    pub fn generate_incremental(&self, corpus: &Corpus, changeset: &ChangeSet) -> Result<()> {
        for output_path in &changeset.deleted {
            self.remove_output(output_path)?;
        }

        if changeset.full_rebuild {
            return self.generate(corpus);
        }

        fs::create_dir_all(&self.site.output_dir)?;

        // Assets are cheap to copy and not tracked by the cache
        self.copy_static_files()?;
        self.copy_content_assets(corpus)?;

        for source in &changeset.changed {
            match corpus.by_source(source) {
                Some(doc) => self.generate_document(doc, corpus)?,
                None => tracing::warn!("Changed document {} is no longer loaded", source),
            }
        }

        if changeset.rebuild_index {
            self.generate_index(corpus)?;
        }

        tracing::info!("Regenerated {} pages", changeset.changed.len());
        Ok(())
    }

    /// Render a document into the data its template sees
    pub fn render_page(&self, doc: &Document, corpus: &Corpus) -> Result<PageData> {
        let resolve = |target: &LinkTarget| self.resolve_target(doc, corpus, target);

        let rendered = self
            .markdown
            .render_with(&doc.body, resolve)
            .with_context(|| format!("Failed to render {}", doc.source))?;
        let summary = match doc.summary() {
            Some(summary) => Some(self.markdown.render_with(&summary, resolve)?.html),
            None => None,
        };

        let path = self.site.config.url_for(&doc.path());
        Ok(PageData {
            title: doc.title.clone(),
            date: doc.date.format("%Y-%m-%d").to_string(),
            updated: doc.updated.map(|d| d.format("%Y-%m-%d").to_string()),
            author: doc.author.clone(),
            description: doc.description.clone(),
            tags: doc.tags.clone(),
            slug: doc.slug.clone(),
            permalink: self.site.config.permalink(&doc.path()),
            path,
            content: rendered.html,
            summary,
            toc: rendered.toc,
            word_count: doc.word_count(),
            reading_time: doc.reading_time(),
        })
    }

    /// Map a local link or image target to its URL in the built site
    fn resolve_target(&self, doc: &Document, corpus: &Corpus, target: &LinkTarget) -> Option<String> {
        let config = &self.site.config;
        match target {
            LinkTarget::Internal { path, .. } => corpus
                .by_source(path.trim_start_matches('/'))
                .map(|d| config.url_for(&d.path())),
            LinkTarget::Relative(path) => {
                let dir = Path::new(&doc.source)
                    .parent()
                    .map(|p| p.to_string_lossy().replace('\\', "/"))
                    .unwrap_or_default();
                let joined = join_relative(&dir, path);
                if is_markdown_file(Path::new(&joined)) {
                    corpus.by_source(&joined).map(|d| config.url_for(&d.path()))
                } else {
                    Some(config.url_for(&joined))
                }
            }
            LinkTarget::SiteAbsolute(path) => Some(config.url_for(path)),
        }
    }

    /// Create a base context with common variables
    fn create_base_context(&self) -> Context {
        let mut context = Context::new();
        context.insert("config", &self.site.config);
        context.insert("root_url", &self.site.config.url_for(""));
        context.insert(
            "current_year",
            &chrono::Local::now().format("%Y").to_string(),
        );
        context
    }

    /// Render and write one document page
    fn generate_document(&self, doc: &Document, corpus: &Corpus) -> Result<()> {
        let page = self.render_page(doc, corpus)?;

        let mut context = self.create_base_context();
        context.insert("page", &page);
        let html = self
            .templates
            .render("page.html", &context)
            .with_context(|| format!("Failed to render template for {}", doc.source))?;

        let output_path = self.site.output_dir.join(output_path(doc));
        write_file(&output_path, &html)?;
        tracing::debug!("Generated page: {:?}", output_path);
        Ok(())
    }

    /// Write the index page listing every document newest first
    fn generate_index(&self, corpus: &Corpus) -> Result<()> {
        let pages = corpus
            .documents
            .iter()
            .map(|doc| {
                let mut page = self.render_page(doc, corpus)?;
                // The index only needs summaries
                page.content.clear();
                Ok(page)
            })
            .collect::<Result<Vec<_>>>()?;

        let mut context = self.create_base_context();
        context.insert("pages", &pages);
        let html = self.templates.render("index.html", &context)?;

        let output_path = self.site.output_dir.join("index.html");
        write_file(&output_path, &html)?;
        tracing::debug!("Generated index: {:?}", output_path);
        Ok(())
    }

    /// Remove a stale page and its directory, if left empty
    fn remove_output(&self, output_path: &str) -> Result<()> {
        let path = self.site.output_dir.join(output_path);
        if path.exists() {
            fs::remove_file(&path)?;
            tracing::debug!("Removed stale page: {:?}", path);
        }
        if let Some(parent) = path.parent() {
            if parent != self.site.output_dir
                && parent.is_dir()
                && fs::read_dir(parent)?.next().is_none()
            {
                fs::remove_dir(parent)?;
            }
        }
        Ok(())
    }

    /// Copy the static directory into the output
    fn copy_static_files(&self) -> Result<()> {
        let static_dir = &self.site.static_dir;
        if !static_dir.is_dir() {
            return Ok(());
        }

        for entry in WalkDir::new(static_dir)
            .follow_links(true)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let path = entry.path();
            if path.is_file() {
                let relative = path.strip_prefix(static_dir)?;
                copy_file(path, &self.site.output_dir.join(relative))?;
            }
        }

        Ok(())
    }

    /// Copy non-Markdown files from the content directory, keeping their layout
    fn copy_content_assets(&self, corpus: &Corpus) -> Result<()> {
        for asset in &corpus.assets {
            let relative = asset.strip_prefix(&self.site.content_dir)?;
            copy_file(asset, &self.site.output_dir.join(relative))?;
        }
        Ok(())
    }
}

/// Output path of a document, relative to the output directory
pub fn output_path(doc: &Document) -> String {
    format!("{}index.html", doc.path())
}

/// Join a relative path onto a directory, folding `.` and `..`
fn join_relative(dir: &str, path: &str) -> String {
    let mut parts: Vec<&str> = dir.split('/').filter(|p| !p.is_empty()).collect();
    for part in path.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            other => parts.push(other),
        }
    }
    parts.join("/")
}

fn write_file(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| anyhow::anyhow!("Failed to create dir {:?}: {}", parent, e))?;
    }
    fs::write(path, content).map_err(|e| anyhow::anyhow!("Failed to write {:?}: {}", path, e))
}

fn copy_file(from: &Path, to: &Path) -> Result<()> {
    if let Some(parent) = to.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::copy(from, to).with_context(|| format!("Failed to copy {:?}", from))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::loader::ContentLoader;
    use tempfile::TempDir;

    fn site(files: &[(&str, &str)]) -> (TempDir, Site) {
        let tmp = TempDir::new().unwrap();
        for (rel, content) in files {
            let path = tmp.path().join(rel);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, content).unwrap();
        }
        let site = Site::new(tmp.path()).unwrap();
        (tmp, site)
    }

    const NUMBA: &str = r#"+++
title = "Speeding up ODE solvers with Numba"
date = 2023-01-28

[extra]
author = "Andy Day"
+++

Short intro.
<!-- more -->
See [the Julia post](@/julia/index.md#results) and ![phase](julia/phase.png).

```python
@njit
def rhs(t, y):
    return -y
```
"#;

    const JULIA: &str = r#"+++
title = "Julia for circadian modeling"
date = 2023-03-02
+++

![phase plot](phase.png)

## Results
"#;

    #[test]
    fn test_join_relative() {
        assert_eq!(join_relative("", "plot.png"), "plot.png");
        assert_eq!(join_relative("julia", "./phase.png"), "julia/phase.png");
        assert_eq!(join_relative("a/b", "../c/d.md"), "a/c/d.md");
        assert_eq!(join_relative("a", "../../x"), "x");
    }

    #[test]
    fn test_generate_site() {
        let (_tmp, site) = site(&[
            ("content/numba.md", NUMBA),
            ("content/julia/index.md", JULIA),
            ("content/julia/phase.png", "png"),
            ("static/style.css", "body {}"),
        ]);
        let corpus = ContentLoader::new(&site).unwrap().load(false).unwrap();
        Generator::new(&site).unwrap().generate(&corpus).unwrap();

        let numba = fs::read_to_string(site.output_dir.join("numba/index.html")).unwrap();
        assert!(numba.contains(r##"<a href="/julia/#results">the Julia post</a>"##));
        assert!(numba.contains(r#"src="/julia/phase.png""#));
        assert!(numba.contains("rhs"));

        let julia = fs::read_to_string(site.output_dir.join("julia/index.html")).unwrap();
        assert!(julia.contains(r#"src="/julia/phase.png""#));
        assert!(julia.contains(r#"id="results""#));

        let index = fs::read_to_string(site.output_dir.join("index.html")).unwrap();
        let julia_pos = index.find("Julia for circadian modeling").unwrap();
        let numba_pos = index.find("Speeding up ODE solvers").unwrap();
        assert!(julia_pos < numba_pos);
        assert!(index.contains("Short intro."));

        assert!(site.output_dir.join("julia/phase.png").is_file());
        assert!(site.output_dir.join("style.css").is_file());
    }

    #[test]
    fn test_render_is_idempotent() {
        let (_tmp, site) = site(&[("content/numba.md", NUMBA)]);
        let corpus = ContentLoader::new(&site).unwrap().load(false).unwrap();
        let generator = Generator::new(&site).unwrap();
        let doc = &corpus.documents[0];

        let first = generator.render_page(doc, &corpus).unwrap();
        let second = generator.render_page(doc, &corpus).unwrap();
        assert_eq!(first.content, second.content);
        assert_eq!(first.path, "/numba/");
        assert_eq!(first.summary.as_deref(), Some("<p>Short intro.</p>\n"));
    }

    #[test]
    fn test_incremental_removes_deleted_pages() {
        let (_tmp, site) = site(&[
            ("content/numba.md", NUMBA),
            ("content/julia/index.md", JULIA),
        ]);
        let generator = Generator::new(&site).unwrap();
        let corpus = ContentLoader::new(&site).unwrap().load(false).unwrap();
        generator.generate(&corpus).unwrap();

        fs::remove_file(site.content_dir.join("julia/index.md")).unwrap();
        let corpus = ContentLoader::new(&site).unwrap().load(false).unwrap();
        let changeset = ChangeSet {
            changed: Vec::new(),
            deleted: vec!["julia/index.html".to_string()],
            rebuild_index: true,
            full_rebuild: false,
        };
        generator.generate_incremental(&corpus, &changeset).unwrap();

        assert!(!site.output_dir.join("julia").exists());
        let index = fs::read_to_string(site.output_dir.join("index.html")).unwrap();
        assert!(!index.contains("Julia for circadian modeling"));
    }
}
