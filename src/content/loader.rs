//! Content loader - loads documents from the content directory

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use super::{sort_documents, ContentError, Document};
use crate::Site;

/// A file that could not be turned into a document
#[derive(Debug)]
pub struct LoadFailure {
    /// Path relative to the content directory
    pub source: String,
    pub path: PathBuf,
    pub error: ContentError,
}

/// Everything found under the content directory
#[derive(Debug, Default)]
pub struct Corpus {
    /// Loaded documents in listing order
    pub documents: Vec<Document>,
    pub failures: Vec<LoadFailure>,
    /// Non-Markdown files, copied verbatim when building
    pub assets: Vec<PathBuf>,
    /// Drafts left out of `documents`
    pub skipped_drafts: usize,
}

impl Corpus {
    /// Look up a document by its content-relative source path
    pub fn by_source(&self, source: &str) -> Option<&Document> {
        let source = source.trim_start_matches("./");
        self.documents.iter().find(|d| d.source == source)
    }
}

/// Loads content from the content directory
pub struct ContentLoader<'a> {
    site: &'a Site,
    ignored: Vec<glob::Pattern>,
}

impl<'a> ContentLoader<'a> {
    /// Create a new content loader
    pub fn new(site: &'a Site) -> Result<Self> {
        let ignored = site
            .config
            .ignored_content
            .iter()
            .map(|pattern| {
                glob::Pattern::new(pattern)
                    .with_context(|| format!("Invalid ignored_content pattern {:?}", pattern))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { site, ignored })
    }

    /// Load every document, keeping drafts only when asked to
    pub fn load(&self, include_drafts: bool) -> Result<Corpus> {
        let content_dir = &self.site.content_dir;
        let mut corpus = Corpus::default();

        if !content_dir.exists() {
            tracing::warn!("Content directory {:?} does not exist", content_dir);
            return Ok(corpus);
        }

        let include_drafts = include_drafts || self.site.config.render_drafts;

        for entry in WalkDir::new(content_dir)
            .follow_links(true)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !is_hidden(e.path()))
            .filter_map(|e| e.ok())
        {
            let path = entry.path();
            if !path.is_file() {
                continue;
            }

            let source = relative_source(content_dir, path);
            if self.is_ignored(&source) {
                tracing::debug!("Ignoring {}", source);
                continue;
            }

            if !is_markdown_file(path) {
                corpus.assets.push(path.to_path_buf());
                continue;
            }

            match load_document(path, &source) {
                Ok(doc) if doc.draft && !include_drafts => {
                    tracing::debug!("Skipping draft {}", source);
                    corpus.skipped_drafts += 1;
                }
                Ok(doc) => corpus.documents.push(doc),
                Err(error) => {
                    tracing::warn!("Failed to load {}: {}", source, error);
                    corpus.failures.push(LoadFailure {
                        source,
                        path: path.to_path_buf(),
                        error,
                    });
                }
            }
        }

        sort_documents(&mut corpus.documents);

        tracing::debug!(
            "Loaded {} documents ({} failed, {} assets)",
            corpus.documents.len(),
            corpus.failures.len(),
            corpus.assets.len()
        );

        Ok(corpus)
    }

    fn is_ignored(&self, source: &str) -> bool {
        self.ignored.iter().any(|p| p.matches(source))
    }
}

/// Load a single document from a file
pub fn load_document(path: &Path, source: &str) -> Result<Document, ContentError> {
    let text = fs::read_to_string(path)?;
    Document::from_source(source, &text)
}

/// Check if a file is a markdown file
pub fn is_markdown_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e == "md" || e == "markdown")
        .unwrap_or(false)
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.starts_with('.'))
        .unwrap_or(false)
}

/// Path relative to the content directory with `/` separators
fn relative_source(content_dir: &Path, path: &Path) -> String {
    path.strip_prefix(content_dir)
        .unwrap_or(path)
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(dir: &Path, rel: &str, content: &str) {
        let path = dir.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn site_with(files: &[(&str, &str)], config: &str) -> (TempDir, Site) {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("config.toml"), config).unwrap();
        for (rel, content) in files {
            write(&tmp.path().join("content"), rel, content);
        }
        let site = Site::new(tmp.path()).unwrap();
        (tmp, site)
    }

    #[test]
    fn test_load_corpus() {
        let (_tmp, site) = site_with(
            &[
                ("numba.md", "+++\ntitle = \"Numba\"\ndate = 2023-01-28\n+++\nBody"),
                ("julia/index.md", "+++\ntitle = \"Julia\"\ndate = 2023-03-02\n+++\nBody"),
                ("julia/phase.png", "png"),
                ("draft.md", "+++\ntitle = \"Draft\"\ndate = 2024-01-01\ndraft = true\n+++\n"),
                ("broken.md", "+++\ntitle = \"Broken\"\n"),
                ("notes.bak.md", "not a document"),
                (".hidden/secret.md", "nope"),
            ],
            "ignored_content = [\"*.bak.md\"]\n",
        );

        let corpus = ContentLoader::new(&site).unwrap().load(false).unwrap();
        let titles: Vec<_> = corpus.documents.iter().map(|d| d.title.as_str()).collect();
        assert_eq!(titles, vec!["Julia", "Numba"]);
        assert_eq!(corpus.documents[0].source, "julia/index.md");
        assert_eq!(corpus.documents[0].slug, "julia");
        assert_eq!(corpus.skipped_drafts, 1);
        assert_eq!(corpus.failures.len(), 1);
        assert_eq!(corpus.failures[0].source, "broken.md");
        assert_eq!(corpus.assets.len(), 1);
        assert!(corpus.by_source("./numba.md").is_some());
    }

    #[test]
    fn test_load_with_drafts() {
        let (_tmp, site) = site_with(
            &[("draft.md", "+++\ntitle = \"Draft\"\ndate = 2024-01-01\ndraft = true\n+++\n")],
            "",
        );
        let corpus = ContentLoader::new(&site).unwrap().load(true).unwrap();
        assert_eq!(corpus.documents.len(), 1);
        assert_eq!(corpus.skipped_drafts, 0);
    }

    #[test]
    fn test_invalid_ignore_pattern() {
        let (_tmp, site) = site_with(&[], "ignored_content = [\"[\"]\n");
        assert!(ContentLoader::new(&site).is_err());
    }

    #[test]
    fn test_is_markdown_file() {
        assert!(is_markdown_file(Path::new("a/b.md")));
        assert!(is_markdown_file(Path::new("b.markdown")));
        assert!(!is_markdown_file(Path::new("b.png")));
    }
}
