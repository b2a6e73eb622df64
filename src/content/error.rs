//! Content errors

use thiserror::Error;

/// Errors raised while splitting or decoding a front-matter block
#[derive(Debug, Error)]
pub enum FrontMatterError {
    #[error("front matter opened with `{delimiter}` on line {line} is never closed")]
    Unclosed { delimiter: &'static str, line: usize },

    #[error("invalid TOML front matter: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("invalid YAML front matter: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("front matter could not be serialized: {0}")]
    Serialize(String),
}

/// Errors that make a file unusable as a document
#[derive(Debug, Error)]
pub enum ContentError {
    #[error("could not read file: {0}")]
    Io(#[from] std::io::Error),

    #[error("missing front matter: a `+++` block must precede the body")]
    MissingFrontMatter,

    #[error(transparent)]
    FrontMatter(#[from] FrontMatterError),

    #[error("missing `title`")]
    MissingTitle,

    #[error("`title` is empty")]
    EmptyTitle,

    #[error("missing `date`")]
    MissingDate,

    #[error("unparseable `date`: {0:?}")]
    InvalidDate(String),

    #[error("unparseable `updated`: {0:?}")]
    InvalidUpdated(String),

    #[error("slug {0:?} has no URL-safe characters")]
    InvalidSlug(String),
}

impl ContentError {
    /// Line in the source file the error points at, when known
    pub fn line(&self) -> Option<usize> {
        match self {
            ContentError::MissingFrontMatter => Some(1),
            ContentError::FrontMatter(FrontMatterError::Unclosed { line, .. }) => Some(*line),
            _ => None,
        }
    }
}
