//! Content integrity checks
//!
//! Every document must carry a well-formed front-matter block with a non-empty
//! title and a parseable date, its body must be free of broken link and image
//! syntax, and its front matter must survive a serialize/parse round trip.

use anyhow::Result;
use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use crate::content::links::{self, LinkTarget};
use crate::content::loader::{ContentLoader, Corpus};
use crate::content::{Document, Format, FrontMatter};
use crate::Site;

/// How serious a diagnostic is
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Warning => f.write_str("warning"),
            Severity::Error => f.write_str("error"),
        }
    }
}

/// A problem found in one file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// Path relative to the content directory
    pub source: String,
    pub line: Option<usize>,
    pub severity: Severity,
    pub message: String,
}

impl Diagnostic {
    fn new(source: &str, line: Option<usize>, severity: Severity, message: String) -> Self {
        Self {
            source: source.to_string(),
            line,
            severity,
            message,
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.line {
            Some(line) => write!(
                f,
                "{}:{}: {}: {}",
                self.source, line, self.severity, self.message
            ),
            None => write!(f, "{}: {}: {}", self.source, self.severity, self.message),
        }
    }
}

/// Outcome of checking a whole site
#[derive(Debug, Default)]
pub struct Report {
    pub diagnostics: Vec<Diagnostic>,
    /// Number of files inspected (documents plus failures)
    pub files: usize,
}

impl Report {
    pub fn errors(&self) -> usize {
        self.count(Severity::Error)
    }

    pub fn warnings(&self) -> usize {
        self.count(Severity::Warning)
    }

    pub fn has_errors(&self) -> bool {
        self.errors() > 0
    }

    fn count(&self, severity: Severity) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == severity)
            .count()
    }
}

/// Check every document under the content directory
pub fn check_site(site: &Site, include_drafts: bool) -> Result<Report> {
    let corpus = ContentLoader::new(site)?.load(include_drafts)?;
    Ok(check_corpus(site, &corpus))
}

/// Check an already loaded corpus
pub fn check_corpus(site: &Site, corpus: &Corpus) -> Report {
    let mut report = Report {
        files: corpus.documents.len() + corpus.failures.len(),
        ..Default::default()
    };

    for failure in &corpus.failures {
        report.diagnostics.push(Diagnostic::new(
            &failure.source,
            failure.error.line(),
            Severity::Error,
            failure.error.to_string(),
        ));
    }

    for doc in &corpus.documents {
        report.diagnostics.extend(check_document(site, doc));
    }

    let mut by_slug: HashMap<&str, Vec<&Document>> = HashMap::new();
    for doc in &corpus.documents {
        by_slug.entry(doc.slug.as_str()).or_default().push(doc);
    }
    for (slug, docs) in by_slug {
        if docs.len() < 2 {
            continue;
        }
        let sources: Vec<_> = docs.iter().map(|d| d.source.as_str()).collect();
        for doc in &docs {
            report.diagnostics.push(Diagnostic::new(
                &doc.source,
                None,
                Severity::Error,
                format!(
                    "slug `{}` is shared by {}; their pages would overwrite each other",
                    slug,
                    sources.join(", ")
                ),
            ));
        }
    }

    report.diagnostics.sort_by(|a, b| {
        a.source
            .cmp(&b.source)
            .then_with(|| a.line.cmp(&b.line))
            .then_with(|| b.severity.cmp(&a.severity))
    });
    report
}

/// Check a single loaded document
pub fn check_document(site: &Site, doc: &Document) -> Vec<Diagnostic> {
    let mut out = Vec::new();
    let source = doc.source.as_str();

    if doc.format == Format::Yaml {
        out.push(Diagnostic::new(
            source,
            None,
            Severity::Warning,
            "front matter uses `---` YAML; `+++` TOML is expected".to_string(),
        ));
    }

    if doc.author.is_none() {
        let severity = if site.config.check.require_author {
            Severity::Error
        } else {
            Severity::Warning
        };
        out.push(Diagnostic::new(
            source,
            None,
            severity,
            "missing `extra.author`".to_string(),
        ));
    }

    for key in doc.front_matter.other.keys() {
        if key == "author" && doc.front_matter.extra.author.is_none() {
            continue;
        }
        out.push(Diagnostic::new(
            source,
            None,
            Severity::Warning,
            format!("unknown front-matter key `{}`", key),
        ));
    }

    match round_trip(&doc.front_matter) {
        Ok(true) => {}
        Ok(false) => out.push(Diagnostic::new(
            source,
            None,
            Severity::Warning,
            "front matter changes when re-serialized".to_string(),
        )),
        Err(e) => out.push(Diagnostic::new(
            source,
            None,
            Severity::Error,
            format!("front matter cannot be re-serialized: {}", e),
        )),
    }

    for issue in links::check_links(&doc.body, doc.body_line) {
        out.push(Diagnostic::new(
            source,
            Some(issue.line),
            Severity::Error,
            issue.kind.to_string(),
        ));
    }

    if site.config.check.local_links {
        out.extend(check_local_targets(site, doc));
    }

    out
}

/// Whether serializing and re-parsing yields the same front matter
fn round_trip(fm: &FrontMatter) -> Result<bool> {
    let block = fm.to_block()?;
    let reparsed = FrontMatter::parse(&block)?.front_matter;
    Ok(&reparsed == fm)
}

fn check_local_targets(site: &Site, doc: &Document) -> Vec<Diagnostic> {
    let doc_dir = Path::new(&doc.source)
        .parent()
        .map(|p| site.content_dir.join(p))
        .unwrap_or_else(|| site.content_dir.clone());

    links::local_targets(&doc.body, doc.body_line)
        .into_iter()
        .filter_map(|found| {
            let what = if found.image { "image" } else { "link" };
            match &found.target {
                LinkTarget::Internal { path, .. } => {
                    let path = path.trim_start_matches('/');
                    (!site.content_dir.join(path).is_file()).then(|| {
                        Diagnostic::new(
                            &doc.source,
                            Some(found.line),
                            Severity::Error,
                            format!("internal link to missing document @/{}", path),
                        )
                    })
                }
                LinkTarget::Relative(path) => (!doc_dir.join(path).exists()).then(|| {
                    Diagnostic::new(
                        &doc.source,
                        Some(found.line),
                        Severity::Warning,
                        format!("{} target {} does not exist", what, path),
                    )
                }),
                LinkTarget::SiteAbsolute(path) => {
                    let exists = site.static_dir.join(path).exists()
                        || site.content_dir.join(path).exists();
                    (!exists).then(|| {
                        Diagnostic::new(
                            &doc.source,
                            Some(found.line),
                            Severity::Warning,
                            format!("{} target /{} is not in static or content", what, path),
                        )
                    })
                }
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
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

    const GOOD: &str = r#"+++
title = "Speeding up ODE solvers with Numba"
date = 2023-01-28

[extra]
author = "Andy Day"
+++

See [the Julia review](@/julia.md) and ![plot](plot.png).
"#;

    const JULIA: &str = r#"+++
title = "Julia for circadian modeling"
date = 2023-03-02

[extra]
author = "Andy Day"
+++
Body.
"#;

    #[test]
    fn test_clean_site_has_no_diagnostics() {
        let (_tmp, site) = site(&[
            ("content/numba.md", GOOD),
            ("content/julia.md", JULIA),
            ("content/plot.png", "png"),
        ]);
        let report = check_site(&site, false).unwrap();
        assert_eq!(report.files, 2);
        assert_eq!(report.diagnostics, Vec::new());
        assert!(!report.has_errors());
    }

    #[test]
    fn test_reports_problems_with_lines() {
        let bad_links = "+++\ntitle = \"Links\"\ndate = 2023-02-01\nweight = 1\n+++\n\nA [broken](http://x.org\n\nSee @ [missing](@/nope.md).\n";
        let (_tmp, site) = site(&[
            ("content/links.md", bad_links),
            ("content/unclosed.md", "+++\ntitle = \"T\"\n"),
            ("content/nodate.md", "+++\ntitle = \"T\"\n+++\n"),
        ]);
        let report = check_site(&site, false).unwrap();
        let lines: Vec<String> = report.diagnostics.iter().map(|d| d.to_string()).collect();

        assert!(lines.contains(&"links.md: warning: missing `extra.author`".to_string()));
        assert!(lines.contains(&"links.md: warning: unknown front-matter key `weight`".to_string()));
        assert!(lines.iter().any(|l| l.starts_with("links.md:7: error: malformed link")));
        assert!(lines.contains(
            &"links.md:9: error: internal link to missing document @/nope.md".to_string()
        ));
        assert!(lines.iter().any(|l| l.starts_with("unclosed.md:1: error:")));
        assert!(lines.contains(&"nodate.md: error: missing `date`".to_string()));
        assert_eq!(report.errors(), 4);
        assert_eq!(report.warnings(), 2);
    }

    #[test]
    fn test_require_author() {
        let (_tmp, site) = site(&[
            ("config.toml", "[check]\nrequire_author = true\n"),
            ("content/a.md", "+++\ntitle = \"A\"\ndate = 2023-01-01\n+++\n"),
        ]);
        let report = check_site(&site, false).unwrap();
        assert_eq!(report.errors(), 1);
    }

    #[test]
    fn test_duplicate_slugs() {
        let (_tmp, site) = site(&[
            ("content/a/post.md", JULIA),
            ("content/b/post.md", JULIA),
        ]);
        let report = check_site(&site, false).unwrap();
        assert_eq!(report.errors(), 2);
        assert!(report.diagnostics[0].message.contains("slug `post`"));
    }

    #[test]
    fn test_unusable_slug_is_an_error() {
        let (_tmp, site) = site(&[(
            "content/lost.md",
            "+++\ntitle = \"Lost\"\ndate = 2023-01-01\nslug = \"!!!\"\n\n[extra]\nauthor = \"Andy Day\"\n+++\nUnique body text.\n",
        )]);
        let report = check_site(&site, false).unwrap();
        assert_eq!(report.errors(), 1);
        assert_eq!(
            report.diagnostics[0].to_string(),
            "lost.md: error: slug \"!!!\" has no URL-safe characters"
        );
    }

    #[test]
    fn test_missing_relative_image_is_a_warning() {
        let (_tmp, site) = site(&[
            ("content/numba.md", GOOD),
            ("content/julia.md", JULIA),
        ]);
        let report = check_site(&site, false).unwrap();
        assert_eq!(report.errors(), 0);
        assert_eq!(
            report.diagnostics[0].to_string(),
            "numba.md:9: warning: image target plot.png does not exist"
        );
    }
}
