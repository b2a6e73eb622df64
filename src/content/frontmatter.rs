//! Front-matter parsing

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};

use super::error::FrontMatterError;

/// Custom deserializer that handles both a single string and a list of strings
fn string_or_vec<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::{self, SeqAccess, Visitor};
    use std::fmt;

    struct StringOrVec;

    impl<'de> Visitor<'de> for StringOrVec {
        type Value = Vec<String>;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            formatter.write_str("a string or a list of strings")
        }

        fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(vec![value.to_string()])
        }

        fn visit_string<E>(self, value: String) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(vec![value])
        }

        fn visit_seq<S>(self, mut seq: S) -> Result<Self::Value, S::Error>
        where
            S: SeqAccess<'de>,
        {
            let mut vec = Vec::new();
            while let Some(item) = seq.next_element::<String>()? {
                vec.push(item);
            }
            Ok(vec)
        }

        fn visit_none<E>(self) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(Vec::new())
        }

        fn visit_unit<E>(self) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(Vec::new())
        }
    }

    deserializer.deserialize_any(StringOrVec)
}

/// Syntax of a front-matter block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// `+++` delimited TOML
    Toml,
    /// `---` delimited YAML
    Yaml,
}

impl Format {
    pub fn delimiter(self) -> &'static str {
        match self {
            Format::Toml => "+++",
            Format::Yaml => "---",
        }
    }
}

/// Front-matter data from a document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrontMatter {
    pub title: Option<String>,
    pub description: Option<String>,
    pub date: Option<String>,
    pub updated: Option<String>,
    pub draft: bool,
    pub slug: Option<String>,
    #[serde(deserialize_with = "string_or_vec", default)]
    pub tags: Vec<String>,
    pub extra: Extra,

    /// Top-level keys this tool does not know about
    #[serde(flatten)]
    pub other: IndexMap<String, serde_json::Value>,
}

/// The `[extra]` table
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Extra {
    pub author: Option<String>,

    #[serde(flatten)]
    pub fields: IndexMap<String, serde_json::Value>,
}

/// Result of splitting a source file into front matter and body
#[derive(Debug, Clone)]
pub struct Parsed<'a> {
    pub front_matter: FrontMatter,
    /// `None` when the file carries no front-matter block
    pub format: Option<Format>,
    /// Everything after the closing delimiter, untouched
    pub body: &'a str,
    /// 1-based line of the source file where the body starts
    pub body_line: usize,
}

impl FrontMatter {
    /// Split front matter from the body and decode it
    pub fn parse(content: &str) -> Result<Parsed<'_>, FrontMatterError> {
        let content = content.strip_prefix('\u{feff}').unwrap_or(content);

        let mut lines = LineIter::new(content);
        let opening = loop {
            match lines.next() {
                Some(line) if line.text.trim().is_empty() => continue,
                other => break other,
            }
        };

        let Some(opening) = opening else {
            return Ok(Self::no_front_matter(content));
        };

        let format = match opening.text.trim_end() {
            "+++" => Format::Toml,
            "---" => Format::Yaml,
            _ => return Ok(Self::no_front_matter(content)),
        };

        let closing = lines.find(|line| line.text.trim_end() == format.delimiter());
        let Some(closing) = closing else {
            if format == Format::Yaml {
                // An unmatched `---` is a thematic break
                return Ok(Self::no_front_matter(content));
            }
            return Err(FrontMatterError::Unclosed {
                delimiter: format.delimiter(),
                line: opening.number,
            });
        };

        let block = &content[opening.end..closing.start];
        let body = &content[closing.end..];
        let body_line = closing.number + 1;

        let front_matter = match format {
            Format::Toml => Self::parse_toml(block)?,
            Format::Yaml => {
                if !block.trim().is_empty() && !looks_like_yaml(block) {
                    return Ok(Self::no_front_matter(content));
                }
                Self::parse_yaml(block)?
            }
        };

        Ok(Parsed {
            front_matter,
            format: Some(format),
            body,
            body_line,
        })
    }

    fn no_front_matter(content: &str) -> Parsed<'_> {
        Parsed {
            front_matter: FrontMatter::default(),
            format: None,
            body: content,
            body_line: 1,
        }
    }

    fn parse_toml(block: &str) -> Result<Self, FrontMatterError> {
        if block.trim().is_empty() {
            return Ok(FrontMatter::default());
        }
        let table: toml::Table = toml::from_str(block)?;
        let value = datetimes_to_strings(toml::Value::Table(table));
        Ok(value.try_into()?)
    }

    fn parse_yaml(block: &str) -> Result<Self, FrontMatterError> {
        if block.trim().is_empty() {
            return Ok(FrontMatter::default());
        }
        Ok(serde_yaml::from_str(block)?)
    }

    /// Author from `[extra]`, falling back to a top-level `author` key
    pub fn author(&self) -> Option<&str> {
        self.extra
            .author
            .as_deref()
            .or_else(|| self.other.get("author").and_then(|v| v.as_str()))
    }

    /// Parse the date string
    pub fn parse_date(&self) -> Option<NaiveDate> {
        self.date.as_deref().and_then(parse_date_string)
    }

    /// Parse the updated date string
    pub fn parse_updated(&self) -> Option<NaiveDate> {
        self.updated.as_deref().and_then(parse_date_string)
    }

    /// Serialize back into the body of a `+++` block (without delimiters)
    pub fn to_toml(&self) -> Result<String, FrontMatterError> {
        let mut table = toml::Table::new();

        if let Some(title) = &self.title {
            table.insert("title".into(), toml::Value::String(title.clone()));
        }
        if let Some(description) = &self.description {
            table.insert(
                "description".into(),
                toml::Value::String(description.clone()),
            );
        }
        if let Some(date) = &self.date {
            table.insert("date".into(), date_value(date));
        }
        if let Some(updated) = &self.updated {
            table.insert("updated".into(), date_value(updated));
        }
        if self.draft {
            table.insert("draft".into(), toml::Value::Boolean(true));
        }
        if let Some(slug) = &self.slug {
            table.insert("slug".into(), toml::Value::String(slug.clone()));
        }
        if !self.tags.is_empty() {
            let tags = self.tags.iter().cloned().map(toml::Value::String).collect();
            table.insert("tags".into(), toml::Value::Array(tags));
        }
        for (key, value) in &self.other {
            if let Some(value) = json_to_toml(value) {
                table.insert(key.clone(), value);
            }
        }

        let mut extra = toml::Table::new();
        if let Some(author) = &self.extra.author {
            extra.insert("author".into(), toml::Value::String(author.clone()));
        }
        for (key, value) in &self.extra.fields {
            if let Some(value) = json_to_toml(value) {
                extra.insert(key.clone(), value);
            }
        }
        if !extra.is_empty() {
            table.insert("extra".into(), toml::Value::Table(extra));
        }

        toml::to_string(&table).map_err(|e| FrontMatterError::Serialize(e.to_string()))
    }

    /// Serialize as a complete `+++` block followed by a newline
    pub fn to_block(&self) -> Result<String, FrontMatterError> {
        Ok(format!("+++\n{}+++\n", self.to_toml()?))
    }
}

/// A line of the source with its byte span
struct Line<'a> {
    text: &'a str,
    number: usize,
    start: usize,
    end: usize,
}

struct LineIter<'a> {
    content: &'a str,
    offset: usize,
    number: usize,
}

impl<'a> LineIter<'a> {
    fn new(content: &'a str) -> Self {
        Self {
            content,
            offset: 0,
            number: 0,
        }
    }
}

impl<'a> Iterator for LineIter<'a> {
    type Item = Line<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.offset >= self.content.len() {
            return None;
        }
        let rest = &self.content[self.offset..];
        let len = rest.find('\n').map(|i| i + 1).unwrap_or(rest.len());
        let start = self.offset;
        self.offset += len;
        self.number += 1;
        Some(Line {
            text: rest[..len].trim_end_matches(['\n', '\r']),
            number: self.number,
            start,
            end: self.offset,
        })
    }
}

/// Whether a `---` block holds `key: value` lines rather than prose
fn looks_like_yaml(block: &str) -> bool {
    block.lines().any(|line| {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            return false;
        }
        let Some(colon_pos) = trimmed.find(':') else {
            return false;
        };
        let key = &trimmed[..colon_pos];
        let is_valid_key = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
            && !matches!(key, "http" | "https" | "ftp" | "mailto");
        let after_colon = &trimmed[colon_pos + 1..];
        is_valid_key && (after_colon.is_empty() || after_colon.starts_with(' '))
    })
}

/// Replace TOML date/time literals with their string form
fn datetimes_to_strings(value: toml::Value) -> toml::Value {
    match value {
        toml::Value::Datetime(dt) => toml::Value::String(dt.to_string()),
        toml::Value::Array(items) => {
            toml::Value::Array(items.into_iter().map(datetimes_to_strings).collect())
        }
        toml::Value::Table(table) => toml::Value::Table(
            table
                .into_iter()
                .map(|(k, v)| (k, datetimes_to_strings(v)))
                .collect(),
        ),
        other => other,
    }
}

/// Emit a date as a TOML literal when it reads back as the same text,
/// otherwise as a string
fn date_value(s: &str) -> toml::Value {
    match s.parse::<toml::value::Datetime>() {
        Ok(dt) if dt.to_string() == s => toml::Value::Datetime(dt),
        _ => toml::Value::String(s.to_string()),
    }
}

fn json_to_toml(value: &serde_json::Value) -> Option<toml::Value> {
    use serde_json::Value;

    Some(match value {
        Value::Null => return None,
        Value::Bool(b) => toml::Value::Boolean(*b),
        Value::Number(n) => match n.as_i64() {
            Some(i) => toml::Value::Integer(i),
            None => toml::Value::Float(n.as_f64()?),
        },
        Value::String(s) => toml::Value::String(s.clone()),
        Value::Array(items) => toml::Value::Array(items.iter().filter_map(json_to_toml).collect()),
        Value::Object(map) => toml::Value::Table(
            map.iter()
                .filter_map(|(k, v)| json_to_toml(v).map(|v| (k.clone(), v)))
                .collect(),
        ),
    })
}

/// Parse a date string in various formats
pub fn parse_date_string(s: &str) -> Option<NaiveDate> {
    let s = s.trim();

    for fmt in ["%Y-%m-%d", "%Y/%m/%d"] {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return Some(d);
        }
    }

    let formats = [
        "%Y-%m-%d %H:%M:%S",
        "%Y/%m/%d %H:%M:%S",
        "%Y-%m-%d %H:%M",
        "%Y/%m/%d %H:%M",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
    ];
    for fmt in formats {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt.date());
        }
    }

    // RFC 3339 / ISO 8601 with offset
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.date_naive());
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    const ANDY: &str = r#"+++
title = "X"
date = 2023-01-28

[extra]
author = "Andy Day"
+++

Everything here is *opaque* body text.
+++
"#;

    #[test]
    fn test_parse_toml_frontmatter() {
        let parsed = FrontMatter::parse(ANDY).unwrap();
        let fm = &parsed.front_matter;
        assert_eq!(parsed.format, Some(Format::Toml));
        assert_eq!(fm.title.as_deref(), Some("X"));
        assert_eq!(fm.date.as_deref(), Some("2023-01-28"));
        assert_eq!(fm.author(), Some("Andy Day"));
        assert_eq!(fm.parse_date(), NaiveDate::from_ymd_opt(2023, 1, 28));
        assert_eq!(parsed.body_line, 8);
        assert_eq!(
            parsed.body,
            "\nEverything here is *opaque* body text.\n+++\n"
        );
    }

    #[test]
    fn test_quoted_date_and_datetime() {
        let parsed = FrontMatter::parse("+++\ntitle = \"Y\"\ndate = \"2022/11/05\"\n+++\n").unwrap();
        assert_eq!(
            parsed.front_matter.parse_date(),
            NaiveDate::from_ymd_opt(2022, 11, 5)
        );

        let parsed =
            FrontMatter::parse("+++\ntitle = \"Y\"\ndate = 2022-11-05T08:30:00Z\n+++\n").unwrap();
        assert_eq!(
            parsed.front_matter.parse_date(),
            NaiveDate::from_ymd_opt(2022, 11, 5)
        );
    }

    #[test]
    fn test_unclosed_toml_is_an_error() {
        let err = FrontMatter::parse("\n+++\ntitle = \"X\"\n\nbody").unwrap_err();
        assert!(matches!(
            err,
            FrontMatterError::Unclosed {
                delimiter: "+++",
                line: 2
            }
        ));
    }

    #[test]
    fn test_invalid_toml_is_an_error() {
        let err = FrontMatter::parse("+++\ntitle = \n+++\n").unwrap_err();
        assert!(matches!(err, FrontMatterError::Toml(_)));
    }

    #[test]
    fn test_no_front_matter() {
        let parsed = FrontMatter::parse("# Just a heading\n").unwrap();
        assert_eq!(parsed.format, None);
        assert_eq!(parsed.front_matter, FrontMatter::default());
        assert_eq!(parsed.body, "# Just a heading\n");
    }

    #[test]
    fn test_parse_yaml_frontmatter() {
        let content = r#"---
title: Julia for circadian models
date: 2023-03-02 10:30:00
tags: julia
extra:
  author: Andy Day
---

Body.
"#;
        let parsed = FrontMatter::parse(content).unwrap();
        let fm = parsed.front_matter;
        assert_eq!(parsed.format, Some(Format::Yaml));
        assert_eq!(fm.title.as_deref(), Some("Julia for circadian models"));
        assert_eq!(fm.tags, vec!["julia"]);
        assert_eq!(fm.author(), Some("Andy Day"));
        assert_eq!(fm.parse_date(), NaiveDate::from_ymd_opt(2023, 3, 2));
    }

    #[test]
    fn test_markdown_separator_not_yaml() {
        let content = "\n---\n\nCheck out https://example.com and more\n\n---\nMore.\n";
        let parsed = FrontMatter::parse(content).unwrap();
        assert_eq!(parsed.format, None);
        assert!(parsed.body.contains("https://example.com"));
    }

    #[test]
    fn test_unknown_keys_are_kept() {
        let parsed = FrontMatter::parse(
            "+++\ntitle = \"Z\"\nweight = 3\n[extra]\nmath = true\n+++\n",
        )
        .unwrap();
        let fm = parsed.front_matter;
        assert_eq!(fm.other.get("weight"), Some(&serde_json::json!(3)));
        assert_eq!(fm.extra.fields.get("math"), Some(&serde_json::json!(true)));
    }

    #[test]
    fn test_round_trip_is_semantically_identical() {
        let source = r#"+++
date = 2023-01-28
title = "Speeding up ODE solvers with Numba"
tags = ["python", "numba"]
weight = 2
ratio = 0.5

[extra]
toc = true
author = "Andy Day"
cover = { src = "cover.png", alt = "Lorenz attractor" }
+++
"#;
        let first = FrontMatter::parse(source).unwrap().front_matter;
        let block = first.to_block().unwrap();
        let second = FrontMatter::parse(&block).unwrap().front_matter;
        assert_eq!(first, second);
        assert!(block.contains("date = 2023-01-28\n"));
    }

    #[test]
    fn test_round_trip_keeps_quoted_datetime() {
        let source = "+++\ntitle = \"T\"\ndate = \"2023-01-28 10:00:00\"\nupdated = 2023-02-01T08:30:00\n+++\n";
        let first = FrontMatter::parse(source).unwrap().front_matter;
        let block = first.to_block().unwrap();
        let second = FrontMatter::parse(&block).unwrap().front_matter;
        assert_eq!(first, second);
        assert!(block.contains("date = \"2023-01-28 10:00:00\"\n"));
        assert!(block.contains("updated = 2023-02-01T08:30:00\n"));
        assert_eq!(second.parse_date(), NaiveDate::from_ymd_opt(2023, 1, 28));
    }

    #[test]
    fn test_parse_date_string_formats() {
        let expected = NaiveDate::from_ymd_opt(2024, 1, 15);
        assert_eq!(parse_date_string("2024-01-15"), expected);
        assert_eq!(parse_date_string("2024-01-15 10:30:00"), expected);
        assert_eq!(parse_date_string("2024-01-15T10:30:00"), expected);
        assert_eq!(parse_date_string("2024-01-15T10:30:00+02:00"), expected);
        assert_eq!(parse_date_string("January 15"), None);
        assert_eq!(parse_date_string("2024-13-40"), None);
    }
}
