//! Block-level outline of a document body

use pulldown_cmark::{CodeBlockKind, Event, Parser, Tag, TagEnd};
use serde::Serialize;
use std::collections::HashMap;

use super::markdown::parser_options;

/// One piece of block-level content, in document order
///
/// Links and images are listed right after the block that contains them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Block {
    Heading { level: u8, text: String, id: String },
    Paragraph { text: String },
    CodeBlock { lang: Option<String>, code: String },
    List { ordered: bool, items: usize },
    Quote { text: String },
    Table { rows: usize },
    Rule,
    Html { html: String },
    Link { dest: String, text: String },
    Image { src: String, alt: String },
}

/// Allocates unique heading anchors
#[derive(Debug, Default)]
pub struct HeadingIds {
    seen: HashMap<String, usize>,
}

impl HeadingIds {
    /// Slug for a heading's text, suffixed when already taken
    pub fn generate(&mut self, text: &str) -> String {
        let base = match slug::slugify(text) {
            s if s.is_empty() => "section".to_string(),
            s => s,
        };
        self.reserve(&base)
    }

    /// Claim an id, suffixing `-1`, `-2`, ... on collision
    pub fn reserve(&mut self, id: &str) -> String {
        let Some(&start) = self.seen.get(id) else {
            self.seen.insert(id.to_string(), 0);
            return id.to_string();
        };

        // A suffixed candidate may already be taken by a literal heading
        let mut count = start;
        let candidate = loop {
            count += 1;
            let candidate = format!("{}-{}", id, count);
            if !self.seen.contains_key(&candidate) {
                break candidate;
            }
        };
        self.seen.insert(id.to_string(), count);
        self.seen.insert(candidate.clone(), 0);
        candidate
    }
}

/// What the outliner is currently collecting text for
enum Capture {
    Heading { level: u8, id: Option<String> },
    Paragraph,
    Code { lang: Option<String> },
    Html,
}

/// Break a Markdown body into its ordered block sequence
pub fn outline(body: &str) -> Vec<Block> {
    let parser = Parser::new_ext(body, parser_options(false));

    let mut blocks = Vec::new();
    let mut ids = HeadingIds::default();
    let mut pending_inline: Vec<Block> = Vec::new();

    let mut capture: Option<Capture> = None;
    let mut text = String::new();

    let mut list_depth = 0usize;
    let mut list_ordered = false;
    let mut list_items = 0usize;
    let mut quote_depth = 0usize;
    let mut quote_text = String::new();
    let mut table_rows = 0usize;
    let mut in_table = false;

    let mut link: Option<(String, String)> = None;
    let mut image: Option<(String, String)> = None;

    for event in parser {
        match event {
            Event::Start(Tag::Heading { level, id, .. }) => {
                capture = Some(Capture::Heading {
                    level: level as u8,
                    id: id.map(|id| id.to_string()),
                });
                text.clear();
            }
            Event::Start(Tag::Paragraph) => {
                if list_depth == 0 && quote_depth == 0 {
                    capture = Some(Capture::Paragraph);
                    text.clear();
                }
            }
            Event::Start(Tag::CodeBlock(kind)) => {
                let lang = match kind {
                    CodeBlockKind::Fenced(info) => info
                        .split(|c: char| c.is_whitespace() || c == ',')
                        .next()
                        .filter(|lang| !lang.is_empty())
                        .map(str::to_string),
                    CodeBlockKind::Indented => None,
                };
                capture = Some(Capture::Code { lang });
                text.clear();
            }
            Event::Start(Tag::HtmlBlock) => {
                capture = Some(Capture::Html);
                text.clear();
            }
            Event::Start(Tag::List(first)) => {
                if list_depth == 0 && quote_depth == 0 {
                    list_ordered = first.is_some();
                    list_items = 0;
                }
                list_depth += 1;
            }
            Event::Start(Tag::Item) => {
                if list_depth == 1 {
                    list_items += 1;
                }
            }
            Event::Start(Tag::BlockQuote { .. }) => {
                if quote_depth == 0 {
                    quote_text.clear();
                }
                quote_depth += 1;
            }
            Event::Start(Tag::Table(_)) => {
                in_table = true;
                table_rows = 0;
            }
            Event::Start(Tag::TableRow) | Event::Start(Tag::TableHead) => {
                if in_table {
                    table_rows += 1;
                }
            }
            Event::Start(Tag::Link { dest_url, .. }) => {
                link = Some((dest_url.to_string(), String::new()));
            }
            Event::Start(Tag::Image { dest_url, .. }) => {
                image = Some((dest_url.to_string(), String::new()));
            }

            Event::End(TagEnd::Heading { .. }) => {
                if let Some(Capture::Heading { level, id }) = capture.take() {
                    let text = text.trim().to_string();
                    let id = match id {
                        Some(explicit) => ids.reserve(&explicit),
                        None => ids.generate(&text),
                    };
                    blocks.push(Block::Heading { level, text, id });
                    blocks.append(&mut pending_inline);
                }
            }
            Event::End(TagEnd::Paragraph) => {
                if let Some(Capture::Paragraph) = capture {
                    capture = None;
                    blocks.push(Block::Paragraph {
                        text: text.trim().to_string(),
                    });
                    blocks.append(&mut pending_inline);
                } else if quote_depth > 0 {
                    quote_text.push('\n');
                }
            }
            Event::End(TagEnd::CodeBlock) => {
                if let Some(Capture::Code { lang }) = capture.take() {
                    blocks.push(Block::CodeBlock {
                        lang,
                        code: std::mem::take(&mut text),
                    });
                }
            }
            Event::End(TagEnd::HtmlBlock) => {
                if let Some(Capture::Html) = capture.take() {
                    blocks.push(Block::Html {
                        html: std::mem::take(&mut text),
                    });
                }
            }
            Event::End(TagEnd::List { .. }) => {
                list_depth = list_depth.saturating_sub(1);
                if list_depth == 0 && quote_depth == 0 {
                    blocks.push(Block::List {
                        ordered: list_ordered,
                        items: list_items,
                    });
                    blocks.append(&mut pending_inline);
                }
            }
            Event::End(TagEnd::BlockQuote { .. }) => {
                quote_depth = quote_depth.saturating_sub(1);
                if quote_depth == 0 {
                    blocks.push(Block::Quote {
                        text: quote_text.trim().to_string(),
                    });
                    blocks.append(&mut pending_inline);
                }
            }
            Event::End(TagEnd::Table) => {
                in_table = false;
                blocks.push(Block::Table { rows: table_rows });
                blocks.append(&mut pending_inline);
            }
            Event::End(TagEnd::Link) => {
                if let Some((dest, text)) = link.take() {
                    pending_inline.push(Block::Link {
                        dest,
                        text: text.trim().to_string(),
                    });
                }
            }
            Event::End(TagEnd::Image) => {
                if let Some((src, alt)) = image.take() {
                    pending_inline.push(Block::Image {
                        src,
                        alt: alt.trim().to_string(),
                    });
                }
            }

            Event::Rule => {
                if list_depth == 0 && quote_depth == 0 {
                    blocks.push(Block::Rule);
                }
            }
            Event::Text(t) | Event::Code(t) | Event::Html(t) | Event::InlineHtml(t) => {
                if let Some((_, alt)) = image.as_mut() {
                    alt.push_str(&t);
                } else if let Some((_, label)) = link.as_mut() {
                    label.push_str(&t);
                }
                if capture.is_some() {
                    text.push_str(&t);
                } else if quote_depth > 0 {
                    quote_text.push_str(&t);
                }
            }
            Event::SoftBreak | Event::HardBreak => {
                if matches!(capture, Some(Capture::Heading { .. } | Capture::Paragraph)) {
                    text.push(' ');
                } else if quote_depth > 0 {
                    quote_text.push(' ');
                }
            }
            _ => {}
        }
    }

    blocks.append(&mut pending_inline);
    blocks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outline_orders_blocks() {
        let body = r#"# Event channels

Decouple senders from receivers with a [ScriptableObject](https://docs.unity3d.com).

![diagram](channels.png)

```csharp
public class VoidEventChannel : ScriptableObject { }
```

- one
- two
  - nested

> Quoted
> text

---
"#;
        let blocks = outline(body);
        assert_eq!(
            blocks,
            vec![
                Block::Heading {
                    level: 1,
                    text: "Event channels".to_string(),
                    id: "event-channels".to_string(),
                },
                Block::Paragraph {
                    text: "Decouple senders from receivers with a ScriptableObject.".to_string(),
                },
                Block::Link {
                    dest: "https://docs.unity3d.com".to_string(),
                    text: "ScriptableObject".to_string(),
                },
                Block::Paragraph {
                    text: "diagram".to_string(),
                },
                Block::Image {
                    src: "channels.png".to_string(),
                    alt: "diagram".to_string(),
                },
                Block::CodeBlock {
                    lang: Some("csharp".to_string()),
                    code: "public class VoidEventChannel : ScriptableObject { }\n".to_string(),
                },
                Block::List {
                    ordered: false,
                    items: 2,
                },
                Block::Quote {
                    text: "Quoted text".to_string(),
                },
                Block::Rule,
            ]
        );
    }

    #[test]
    fn test_heading_ids_are_unique() {
        let mut ids = HeadingIds::default();
        assert_eq!(ids.generate("Results"), "results");
        assert_eq!(ids.generate("Results"), "results-1");
        assert_eq!(ids.generate("Results"), "results-2");
        assert_eq!(ids.generate("???"), "section");

        let mut ids = HeadingIds::default();
        assert_eq!(ids.generate("Setup 1"), "setup-1");
        assert_eq!(ids.generate("Setup"), "setup");
        assert_eq!(ids.generate("Setup"), "setup-2");
        assert_eq!(ids.generate("Setup"), "setup-3");
        assert_eq!(ids.reserve("setup-1"), "setup-1-1");
    }

    #[test]
    fn test_table_rows_counted() {
        let blocks = outline("| solver | time |\n|---|---|\n| numba | 1.2 |\n| scipy | 9.8 |\n");
        assert_eq!(blocks, vec![Block::Table { rows: 3 }]);
    }
}
