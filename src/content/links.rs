//! Link and image integrity checks

use percent_encoding::percent_decode_str;
use pulldown_cmark::{BrokenLink, Event, LinkType, Parser, Tag, TagEnd};
use std::fmt;
use std::ops::Range;

use super::markdown::parser_options;

/// Prefix of links that point at another document in the content directory
pub const INTERNAL_PREFIX: &str = "@/";

/// A syntax problem with a link or image in a body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkIssue {
    /// 1-based line in the source file
    pub line: usize,
    pub kind: LinkIssueKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkIssueKind {
    /// Bracket syntax that did not turn into a link, e.g. `[text](url` without `)`
    Unparsed(String),
    /// `[text][label]` where `label` is never defined
    UndefinedReference(String),
    /// `[text]()` or `![alt]()`
    EmptyDestination { image: bool },
}

impl fmt::Display for LinkIssueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkIssueKind::Unparsed(snippet) => {
                write!(f, "malformed link or image syntax near {:?}", snippet)
            }
            LinkIssueKind::UndefinedReference(label) => {
                write!(f, "reference link uses undefined label [{}]", label)
            }
            LinkIssueKind::EmptyDestination { image: true } => {
                write!(f, "image has an empty source")
            }
            LinkIssueKind::EmptyDestination { image: false } => {
                write!(f, "link has an empty destination")
            }
        }
    }
}

/// Where a link or image destination points
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkTarget {
    /// `@/posts/other.md#anchor`, relative to the content directory
    Internal {
        path: String,
        fragment: Option<String>,
    },
    /// `images/plot.png`, relative to the document's directory
    Relative(String),
    /// `/images/plot.png`, relative to the site root
    SiteAbsolute(String),
}

impl LinkTarget {
    /// Classify a destination; `None` for external URLs and pure fragments
    pub fn classify(dest: &str) -> Option<LinkTarget> {
        let dest = dest.trim();
        if dest.is_empty() || dest.starts_with('#') || is_external(dest) {
            return None;
        }

        if let Some(rest) = dest.strip_prefix(INTERNAL_PREFIX) {
            let (path, fragment) = match rest.split_once('#') {
                Some((path, fragment)) => (path, Some(fragment.to_string())),
                None => (rest, None),
            };
            return Some(LinkTarget::Internal {
                path: decode(path),
                fragment,
            });
        }

        let path = dest.split(['#', '?']).next().unwrap_or_default();
        if path.is_empty() {
            return None;
        }
        let path = decode(path);
        if let Some(rooted) = path.strip_prefix('/') {
            Some(LinkTarget::SiteAbsolute(rooted.to_string()))
        } else {
            Some(LinkTarget::Relative(path))
        }
    }
}

/// Whether a destination leaves the site (has a scheme or is protocol-relative)
pub fn is_external(dest: &str) -> bool {
    if dest.starts_with("//") {
        return true;
    }
    match dest.split_once(':') {
        Some((scheme, _)) => {
            !scheme.is_empty()
                && scheme
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
                && !dest.starts_with(INTERNAL_PREFIX)
        }
        None => false,
    }
}

fn decode(path: &str) -> String {
    percent_decode_str(path).decode_utf8_lossy().into_owned()
}

/// A link or image destination found in a body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalTarget {
    pub line: usize,
    pub image: bool,
    pub target: LinkTarget,
}

/// Translates byte offsets in a body to source-file line numbers
struct LineIndex<'a> {
    body: &'a str,
    first_line: usize,
}

impl LineIndex<'_> {
    fn line(&self, offset: usize) -> usize {
        let offset = offset.min(self.body.len());
        self.first_line + self.body.as_bytes()[..offset].iter().filter(|&&b| b == b'\n').count()
    }
}

/// Find link and image syntax errors outside code
///
/// `body_line` is the source line on which `body` starts.
pub fn check_links(body: &str, body_line: usize) -> Vec<LinkIssue> {
    let index = LineIndex {
        body,
        first_line: body_line,
    };
    let mut issues = Vec::new();
    let mut broken: Vec<(Range<usize>, String)> = Vec::new();

    let callback = |link: BrokenLink| {
        if matches!(link.link_type, LinkType::Reference | LinkType::Collapsed) {
            broken.push((link.span.clone(), link.reference.to_string()));
        }
        None
    };
    let parser =
        Parser::new_with_broken_link_callback(body, parser_options(false), Some(callback));

    // Consecutive text events are joined so split brackets are seen together
    let mut run: Option<Range<usize>> = None;
    let mut in_code_block = false;

    for (event, range) in parser.into_offset_iter() {
        match event {
            Event::Text(_) if !in_code_block => {
                run = Some(match run {
                    Some(run) => run.start..range.end,
                    None => range,
                });
                continue;
            }
            Event::Start(Tag::CodeBlock(_)) => in_code_block = true,
            Event::End(TagEnd::CodeBlock) => in_code_block = false,
            Event::Start(Tag::Link { ref dest_url, .. }) if dest_url.trim().is_empty() => {
                issues.push(LinkIssue {
                    line: index.line(range.start),
                    kind: LinkIssueKind::EmptyDestination { image: false },
                });
            }
            Event::Start(Tag::Image { ref dest_url, .. }) if dest_url.trim().is_empty() => {
                issues.push(LinkIssue {
                    line: index.line(range.start),
                    kind: LinkIssueKind::EmptyDestination { image: true },
                });
            }
            _ => {}
        }
        flush_run(run.take(), &index, &mut issues);
    }
    flush_run(run.take(), &index, &mut issues);

    for (span, label) in broken {
        issues.push(LinkIssue {
            line: index.line(span.start),
            kind: LinkIssueKind::UndefinedReference(label),
        });
    }

    issues.sort_by_key(|issue| issue.line);
    issues
}

/// Report bracket syntax left in a run of text, reading the source so escapes count
fn flush_run(run: Option<Range<usize>>, index: &LineIndex<'_>, issues: &mut Vec<LinkIssue>) {
    let Some(run) = run else {
        return;
    };
    let Some(source) = index.body.get(run.clone()) else {
        return;
    };
    for pattern in ["](", "!["] {
        let found = source
            .match_indices(pattern)
            .map(|(pos, _)| pos)
            .find(|&pos| !is_escaped(index.body, run.start + pos));
        if let Some(pos) = found {
            let snippet: String = source[pos..].chars().take(40).collect();
            issues.push(LinkIssue {
                line: index.line(run.start + pos),
                kind: LinkIssueKind::Unparsed(snippet.trim().to_string()),
            });
            break;
        }
    }
}

/// Whether the byte at `pos` follows an odd number of backslashes
fn is_escaped(body: &str, pos: usize) -> bool {
    body.as_bytes()[..pos]
        .iter()
        .rev()
        .take_while(|&&b| b == b'\\')
        .count()
        % 2
        == 1
}

/// Collect local link and image destinations with their source lines
pub fn local_targets(body: &str, body_line: usize) -> Vec<LocalTarget> {
    let index = LineIndex {
        body,
        first_line: body_line,
    };
    let parser = Parser::new_ext(body, parser_options(false));

    parser
        .into_offset_iter()
        .filter_map(|(event, range)| {
            let (dest, image) = match event {
                Event::Start(Tag::Link { dest_url, .. }) => (dest_url, false),
                Event::Start(Tag::Image { dest_url, .. }) => (dest_url, true),
                _ => return None,
            };
            LinkTarget::classify(&dest).map(|target| LocalTarget {
                line: index.line(range.start),
                image,
                target,
            })
        })
        .collect()
}
