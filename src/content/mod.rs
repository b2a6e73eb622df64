//! Content module - documents, front matter, and Markdown processing

pub mod blocks;
mod document;
mod error;
mod frontmatter;
pub mod links;
pub mod loader;
mod markdown;

pub use blocks::Block;
pub use document::{count_words, slug_from_source, sort_documents, Document, Metadata};
pub use error::{ContentError, FrontMatterError};
pub use frontmatter::{parse_date_string, Extra, Format, FrontMatter, Parsed};
pub use markdown::{html_escape, MarkdownRenderer, Rendered, TocEntry, SUMMARY_MARKER};
