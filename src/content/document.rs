//! The document model

use chrono::NaiveDate;
use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;
use std::path::Path;

use super::blocks::{self, Block};
use super::error::ContentError;
use super::frontmatter::{Format, FrontMatter};
use super::markdown::{MarkdownRenderer, SUMMARY_MARKER};

lazy_static! {
    static ref WORD: Regex = Regex::new(r"[\p{L}\p{N}][\p{L}\p{N}'’_-]*").unwrap();
    static ref FENCE: Regex = Regex::new(r"(?ms)^(```|~~~).*?^(```|~~~)[ \t]*$").unwrap();
}

/// Words read per minute when estimating reading time
const WORDS_PER_MINUTE: usize = 200;

/// The metadata record every document must yield
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Metadata {
    pub title: String,
    pub date: NaiveDate,
    pub author: Option<String>,
}

/// One Markdown article with its front matter
#[derive(Debug, Clone, Serialize)]
pub struct Document {
    /// Title from front matter (never empty)
    pub title: String,

    /// Publication date
    pub date: NaiveDate,

    /// Last updated date
    pub updated: Option<NaiveDate>,

    /// Author from `[extra]`
    pub author: Option<String>,

    pub description: Option<String>,

    pub tags: Vec<String>,

    pub draft: bool,

    /// URL-friendly name
    pub slug: String,

    /// Source file path relative to the content directory, with `/` separators
    pub source: String,

    /// Raw Markdown body after the closing delimiter
    pub body: String,

    /// 1-based line of the source file where the body starts
    pub body_line: usize,

    /// Syntax the front matter was written in
    #[serde(skip)]
    pub format: Format,

    /// Decoded front matter, kept for re-serialization
    #[serde(skip)]
    pub front_matter: FrontMatter,
}

impl Document {
    /// Build a document from its source text
    ///
    /// `source` is the path relative to the content directory.
    pub fn from_source(source: &str, text: &str) -> Result<Self, ContentError> {
        let parsed = FrontMatter::parse(text)?;
        let format = parsed.format.ok_or(ContentError::MissingFrontMatter)?;
        let fm = parsed.front_matter;

        let title = match fm.title.as_deref() {
            None => return Err(ContentError::MissingTitle),
            Some(t) if t.trim().is_empty() => return Err(ContentError::EmptyTitle),
            Some(t) => t.trim().to_string(),
        };

        let date = match fm.date.as_deref() {
            None => return Err(ContentError::MissingDate),
            Some(raw) => fm
                .parse_date()
                .ok_or_else(|| ContentError::InvalidDate(raw.to_string()))?,
        };

        let updated = match fm.updated.as_deref() {
            None => None,
            Some(raw) => Some(
                fm.parse_updated()
                    .ok_or_else(|| ContentError::InvalidUpdated(raw.to_string()))?,
            ),
        };

        let slug = match fm.slug.as_deref() {
            Some(s) if !s.trim().is_empty() => slug::slugify(s),
            _ => slug_from_source(source),
        };
        // An empty slug would render the page over the index
        if slug.is_empty() {
            let raw = fm.slug.clone().unwrap_or_else(|| source.to_string());
            return Err(ContentError::InvalidSlug(raw));
        }

        Ok(Self {
            title,
            date,
            updated,
            author: fm.author().map(str::to_string),
            description: fm.description.clone(),
            tags: fm.tags.clone(),
            draft: fm.draft,
            slug,
            source: source.replace('\\', "/"),
            body: parsed.body.to_string(),
            body_line: parsed.body_line,
            format,
            front_matter: fm,
        })
    }

    /// The `{title, date, author}` record
    pub fn metadata(&self) -> Metadata {
        Metadata {
            title: self.title.clone(),
            date: self.date,
            author: self.author.clone(),
        }
    }

    /// Ordered block-level content of the body
    pub fn blocks(&self) -> Vec<Block> {
        blocks::outline(&self.body)
    }

    /// Body text before the summary marker, if any
    pub fn summary(&self) -> Option<String> {
        MarkdownRenderer::split_summary(&self.body).0
    }

    /// Number of prose words, not counting fenced code
    pub fn word_count(&self) -> usize {
        count_words(&self.body)
    }

    /// Estimated reading time in minutes (at least one)
    pub fn reading_time(&self) -> usize {
        self.word_count().div_ceil(WORDS_PER_MINUTE).max(1)
    }

    /// Site-relative path of the rendered page, e.g. `numba-odes/`
    pub fn path(&self) -> String {
        format!("{}/", self.slug)
    }
}

/// Listing order: newest first, then by title, then by source path
pub fn sort_documents(documents: &mut [Document]) {
    documents.sort_by(|a, b| {
        b.date
            .cmp(&a.date)
            .then_with(|| a.title.cmp(&b.title))
            .then_with(|| a.source.cmp(&b.source))
    });
}

/// Slug derived from the file name, or from the folder for `index.md`
pub fn slug_from_source(source: &str) -> String {
    let path = Path::new(source);
    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("untitled");

    let name = if stem == "index" {
        path.parent()
            .and_then(|p| p.file_name())
            .and_then(|s| s.to_str())
            .unwrap_or(stem)
    } else {
        stem
    };

    // Leading `YYYY-MM-DD-` is dropped from file names
    let name = match (name.get(..10), name.get(10..11), name.get(11..)) {
        (Some(date), Some("-" | "_"), Some(rest))
            if NaiveDate::parse_from_str(date, "%Y-%m-%d").is_ok() =>
        {
            rest
        }
        _ => name,
    };

    slug::slugify(name)
}

/// Count words in Markdown prose, ignoring fenced code blocks
pub fn count_words(markdown: &str) -> usize {
    let prose = FENCE.replace_all(markdown, "");
    let prose = prose.replace(SUMMARY_MARKER, "");
    WORD.find_iter(&prose).count()
}
