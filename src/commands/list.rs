//! List documents

use anyhow::Result;

use crate::content::loader::ContentLoader;
use crate::content::Document;
use crate::Site;

/// Print every document, newest first
pub fn run(site: &Site, drafts: bool) -> Result<()> {
    let corpus = ContentLoader::new(site)?.load(drafts)?;

    println!("Documents ({}):", corpus.documents.len());
    for doc in &corpus.documents {
        println!("  {}", format_entry(doc));
    }

    for failure in &corpus.failures {
        tracing::warn!("Skipped {}: {}", failure.source, failure.error);
    }
    if corpus.skipped_drafts > 0 {
        println!("({} drafts hidden, use --drafts)", corpus.skipped_drafts);
    }

    Ok(())
}

/// `YYYY-MM-DD  title  (author, N min) [source]`
pub fn format_entry(doc: &Document) -> String {
    let author = doc.author.as_deref().unwrap_or("unknown author");
    let draft = if doc.draft { " (draft)" } else { "" };
    format!(
        "{}  {}{}  ({}, {} min) [{}]",
        doc.date.format("%Y-%m-%d"),
        doc.title,
        draft,
        author,
        doc.reading_time(),
        doc.source
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_entry() {
        let doc = Document::from_source(
            "unity-events.md",
            "+++\ntitle = \"Decoupling in Unity\"\ndate = 2022-07-03\n\n[extra]\nauthor = \"Andy Day\"\n+++\n\nEvent channels.\n",
        )
        .unwrap();
        assert_eq!(
            format_entry(&doc),
            "2022-07-03  Decoupling in Unity  (Andy Day, 1 min) [unity-events.md]"
        );
    }
}
