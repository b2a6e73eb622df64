//! Markdown rendering with syntax highlighting

use anyhow::Result;
use pulldown_cmark::{html, CodeBlockKind, CowStr, Event, Options, Parser, Tag, TagEnd};
use serde::Serialize;
use syntect::highlighting::ThemeSet;
use syntect::html::highlighted_html_for_string;
use syntect::parsing::SyntaxSet;

use super::blocks::HeadingIds;
use super::links::{self, LinkTarget};
use crate::config::MarkdownConfig;

/// Marker separating the summary from the rest of a document
pub const SUMMARY_MARKER: &str = "<!-- more -->";

/// Parser options shared by rendering, outlining and link checking
pub fn parser_options(smart_punctuation: bool) -> Options {
    let mut options = Options::ENABLE_TABLES
        | Options::ENABLE_FOOTNOTES
        | Options::ENABLE_STRIKETHROUGH
        | Options::ENABLE_TASKLISTS
        | Options::ENABLE_HEADING_ATTRIBUTES
        | Options::ENABLE_GFM;
    if smart_punctuation {
        options |= Options::ENABLE_SMART_PUNCTUATION;
    }
    options
}

/// An entry in a document's table of contents
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TocEntry {
    pub level: u8,
    pub id: String,
    pub title: String,
}

/// Output of rendering one Markdown body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendered {
    pub html: String,
    pub toc: Vec<TocEntry>,
}

/// Markdown renderer with syntax highlighting
pub struct MarkdownRenderer {
    syntax_set: SyntaxSet,
    theme_set: ThemeSet,
    config: MarkdownConfig,
}

impl MarkdownRenderer {
    /// Create a renderer with default settings
    pub fn new() -> Self {
        Self::with_config(MarkdownConfig::default())
    }

    /// Create with custom settings
    pub fn with_config(config: MarkdownConfig) -> Self {
        Self {
            syntax_set: SyntaxSet::load_defaults_newlines(),
            theme_set: ThemeSet::load_defaults(),
            config,
        }
    }

    /// Render markdown to HTML, leaving every destination untouched
    pub fn render(&self, markdown: &str) -> Result<Rendered> {
        self.render_with(markdown, |_| None)
    }

    /// Render markdown to HTML
    ///
    /// `resolve` maps local link and image targets to URLs; fragments and
    /// query strings of the original destination are carried over.
    pub fn render_with<F>(&self, markdown: &str, resolve: F) -> Result<Rendered>
    where
        F: Fn(&LinkTarget) -> Option<String>,
    {
        let parser = Parser::new_ext(markdown, parser_options(self.config.smart_punctuation));

        let mut events: Vec<Event> = Vec::new();
        let mut toc = Vec::new();
        let mut ids = HeadingIds::default();

        let mut in_code_block = false;
        let mut code_block_lang: Option<String> = None;
        let mut code_block_content = String::new();

        // Buffered heading: start tag plus inner events
        let mut heading: Option<(Tag, Vec<Event>)> = None;
        // One entry per open link: whether it was rewritten to raw HTML
        let mut link_stack: Vec<bool> = Vec::new();

        for event in parser {
            if in_code_block {
                match event {
                    Event::End(TagEnd::CodeBlock) => {
                        let highlighted =
                            self.highlight_code(&code_block_content, code_block_lang.as_deref());
                        events.push(Event::Html(CowStr::from(highlighted)));
                        in_code_block = false;
                        code_block_lang = None;
                    }
                    Event::Text(text) => code_block_content.push_str(&text),
                    _ => {}
                }
                continue;
            }

            let event = match event {
                Event::Start(Tag::CodeBlock(kind)) => {
                    in_code_block = true;
                    code_block_lang = match kind {
                        CodeBlockKind::Fenced(info) => info
                            .split(|c: char| c.is_whitespace() || c == ',')
                            .next()
                            .filter(|lang| !lang.is_empty())
                            .map(str::to_string),
                        CodeBlockKind::Indented => None,
                    };
                    code_block_content.clear();
                    continue;
                }
                Event::Start(Tag::Image {
                    link_type,
                    dest_url,
                    title,
                    id,
                }) => Event::Start(Tag::Image {
                    link_type,
                    dest_url: rewrite_destination(dest_url, &resolve),
                    title,
                    id,
                }),
                Event::Start(Tag::Link {
                    link_type,
                    dest_url,
                    title,
                    id,
                }) => {
                    let dest_url = rewrite_destination(dest_url, &resolve);

                    if self.config.external_links_target_blank && links::is_external(&dest_url)
                    {
                        link_stack.push(true);
                        let mut tag = format!(r#"<a href="{}""#, html_escape(&dest_url));
                        if !title.is_empty() {
                            tag.push_str(&format!(r#" title="{}""#, html_escape(&title)));
                        }
                        tag.push_str(r#" target="_blank" rel="noopener">"#);
                        Event::Html(CowStr::from(tag))
                    } else {
                        link_stack.push(false);
                        Event::Start(Tag::Link {
                            link_type,
                            dest_url,
                            title,
                            id,
                        })
                    }
                }
                Event::End(TagEnd::Link) => match link_stack.pop() {
                    Some(true) => Event::Html(CowStr::from("</a>")),
                    _ => Event::End(TagEnd::Link),
                },
                other => other,
            };

            match event {
                Event::Start(tag @ Tag::Heading { .. }) => {
                    heading = Some((tag, Vec::new()));
                }
                Event::End(TagEnd::Heading(level)) => {
                    let Some((tag, inner)) = heading.take() else {
                        continue;
                    };
                    let text = plain_text(&inner);
                    let Tag::Heading {
                        id,
                        classes,
                        attrs,
                        ..
                    } = tag
                    else {
                        continue;
                    };
                    let id = match id {
                        Some(explicit) => ids.reserve(&explicit),
                        None => ids.generate(&text),
                    };
                    toc.push(TocEntry {
                        level: level as u8,
                        id: id.clone(),
                        title: text,
                    });
                    events.push(Event::Start(Tag::Heading {
                        level,
                        id: Some(CowStr::from(id)),
                        classes,
                        attrs,
                    }));
                    events.extend(inner);
                    events.push(Event::End(TagEnd::Heading(level)));
                }
                other => match heading.as_mut() {
                    Some((_, inner)) => inner.push(other),
                    None => events.push(other),
                },
            }
        }

        let mut html_output = String::new();
        html::push_html(&mut html_output, events.into_iter());

        Ok(Rendered {
            html: html_output,
            toc,
        })
    }

    /// Highlight a code block; the code itself is never interpreted
    fn highlight_code(&self, code: &str, lang: Option<&str>) -> String {
        let lang = lang.unwrap_or("text");

        if !self.config.highlight_code {
            return plain_code_block(code, lang);
        }

        let syntax = self
            .syntax_set
            .find_syntax_by_token(lang)
            .or_else(|| self.syntax_set.find_syntax_by_extension(lang))
            .unwrap_or_else(|| self.syntax_set.find_syntax_plain_text());

        let theme = self
            .theme_set
            .themes
            .get(&self.config.highlight_theme)
            .or_else(|| self.theme_set.themes.values().next());

        let Some(theme) = theme else {
            return plain_code_block(code, lang);
        };

        match highlighted_html_for_string(code, &self.syntax_set, syntax, theme) {
            Ok(highlighted) => {
                if self.config.line_numbers {
                    add_line_numbers(&highlighted, lang)
                } else {
                    format!(
                        r#"<figure class="highlight {}">{}</figure>"#,
                        html_escape(lang),
                        highlighted
                    )
                }
            }
            Err(e) => {
                tracing::debug!("Highlighting {} failed: {}", lang, e);
                plain_code_block(code, lang)
            }
        }
    }

    /// Split a body at the summary marker
    ///
    /// Returns the summary (if the marker is present) and the body without the marker.
    pub fn split_summary(content: &str) -> (Option<String>, String) {
        if let Some(pos) = content.find(SUMMARY_MARKER) {
            let summary = content[..pos].trim().to_string();
            let remaining = content[pos + SUMMARY_MARKER.len()..].trim().to_string();
            let full = format!("{}\n\n{}", summary, remaining);
            (Some(summary), full)
        } else {
            (None, content.to_string())
        }
    }
}

impl Default for MarkdownRenderer {
    fn default() -> Self {
        Self::new()
    }
}

/// Replace a local destination with its resolved URL
fn rewrite_destination<'a, F>(dest_url: CowStr<'a>, resolve: &F) -> CowStr<'a>
where
    F: Fn(&LinkTarget) -> Option<String>,
{
    let Some(target) = LinkTarget::classify(&dest_url) else {
        return dest_url;
    };

    match resolve(&target) {
        Some(url) => {
            let suffix = match &target {
                LinkTarget::Internal {
                    fragment: Some(fragment),
                    ..
                } => format!("#{}", fragment),
                LinkTarget::Internal { .. } => String::new(),
                _ => dest_url
                    .find(['#', '?'])
                    .map(|pos| dest_url[pos..].to_string())
                    .unwrap_or_default(),
            };
            CowStr::from(format!("{}{}", url, suffix))
        }
        None => {
            if let LinkTarget::Internal { path, .. } = &target {
                tracing::warn!("Unresolved internal link: @/{}", path);
            }
            dest_url
        }
    }
}

/// Add line numbers to highlighted code
fn add_line_numbers(code: &str, lang: &str) -> String {
    let lines: Vec<&str> = code.lines().collect();

    let gutter = (1..=lines.len())
        .map(|n| format!(r#"<span class="line-number">{}</span>"#, n))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"<figure class="highlight {}"><table><tr><td class="gutter"><pre>{}</pre></td><td class="code">{}</td></tr></table></figure>"#,
        html_escape(lang),
        gutter,
        lines.join("\n")
    )
}

fn plain_code_block(code: &str, lang: &str) -> String {
    format!(
        r#"<pre><code class="language-{}">{}</code></pre>"#,
        html_escape(lang),
        html_escape(code)
    )
}

/// Concatenated text of inline events
fn plain_text(events: &[Event]) -> String {
    let mut text = String::new();
    for event in events {
        match event {
            Event::Text(t) | Event::Code(t) => text.push_str(t),
            Event::SoftBreak | Event::HardBreak => text.push(' '),
            _ => {}
        }
    }
    text.trim().to_string()
}

/// Simple HTML escaping
pub fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}
