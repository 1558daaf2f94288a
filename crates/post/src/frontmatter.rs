use crate::error::{PostError, Result};
use chrono::{NaiveDate, NaiveDateTime};
use serde_yaml::Value;
use std::collections::BTreeMap;

const MARKER: &str = "---";

/// A document split into its front matter block and body text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitDocument {
    /// Raw text between the delimiter markers, `None` if the document
    /// does not start with one.
    pub block: Option<String>,
    pub body: String,
}

/// Split raw document text into front matter block and body.
///
/// Line endings are normalized (carriage returns stripped) before any
/// marker matching. If the first line is exactly `---`, lines are consumed
/// until the next `---` line; everything between is the block and
/// everything after is the body. An unclosed block swallows the rest of
/// the document (body is empty), matching the lenient split the engine has
/// always used. Without an opening marker the whole text is body.
#[must_use]
pub fn split_document(raw: &str) -> SplitDocument {
    let normalized = raw.replace('\r', "");
    let mut lines = normalized.lines();

    if lines.next() != Some(MARKER) {
        return SplitDocument {
            block: None,
            body: normalized,
        };
    }

    let mut block_lines = Vec::new();
    for line in lines.by_ref() {
        if line == MARKER {
            break;
        }
        block_lines.push(line);
    }

    SplitDocument {
        block: Some(block_lines.join("\n")),
        body: lines.collect::<Vec<_>>().join("\n"),
    }
}

/// Parsed front matter: a loosely-typed key/value mapping with typed
/// accessors for the fields the engine interprets. Keys it does not
/// recognize are preserved and exposed via [`Frontmatter::get`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Frontmatter {
    fields: BTreeMap<String, Value>,
}

impl Frontmatter {
    /// Parse a front matter block as YAML.
    ///
    /// A blank block parses as the empty mapping; any other non-mapping
    /// document is an error (the caller degrades the record, it does not
    /// abort the reload cycle).
    pub fn parse(block: &str) -> Result<Self> {
        if block.trim().is_empty() {
            return Ok(Self::default());
        }

        let value: Value = serde_yaml::from_str(block)?;
        match value {
            Value::Mapping(mapping) => {
                let mut fields = BTreeMap::new();
                for (key, value) in mapping {
                    if let Value::String(key) = key {
                        fields.insert(key, value);
                    }
                }
                Ok(Self { fields })
            }
            Value::Null => Ok(Self::default()),
            _ => Err(PostError::NotAMapping),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Raw access to any field, recognized or not.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    #[must_use]
    pub fn title(&self) -> Option<&str> {
        self.fields.get("title").and_then(Value::as_str)
    }

    /// The `tags` sequence, raw (un-normalized). Non-string entries are
    /// ignored; a missing or non-sequence value yields no tags.
    #[must_use]
    pub fn tags(&self) -> Vec<String> {
        self.fields
            .get("tags")
            .and_then(Value::as_sequence)
            .map(|seq| {
                seq.iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// The `date` field parsed as a calendar date-time. Accepts
    /// `YYYY-MM-DD`, `YYYY-MM-DD HH:MM:SS` and the RFC 3339 `T` form;
    /// date-only values resolve to midnight.
    #[must_use]
    pub fn date(&self) -> Option<NaiveDateTime> {
        let raw = self.fields.get("date").and_then(Value::as_str)?;
        parse_date_value(raw.trim())
    }
}

fn parse_date_value(raw: &str) -> Option<NaiveDateTime> {
    if let Ok(datetime) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S") {
        return Some(datetime);
    }
    if let Ok(datetime) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
        return Some(datetime);
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn splits_block_and_body() {
        let doc = split_document("---\ntitle: Hello\n---\nbody text\nmore");
        assert_eq!(doc.block.as_deref(), Some("title: Hello"));
        assert_eq!(doc.body, "body text\nmore");
    }

    #[test]
    fn no_marker_means_all_body() {
        let doc = split_document("just a body\nwith lines");
        assert_eq!(doc.block, None);
        assert_eq!(doc.body, "just a body\nwith lines");
    }

    #[test]
    fn marker_must_be_first_line() {
        let doc = split_document("\n---\ntitle: x\n---\n");
        assert_eq!(doc.block, None);
    }

    #[test]
    fn unclosed_block_swallows_document() {
        let doc = split_document("---\ntitle: Hello\nno closing marker");
        assert_eq!(doc.block.as_deref(), Some("title: Hello\nno closing marker"));
        assert_eq!(doc.body, "");
    }

    #[test]
    fn carriage_returns_are_stripped() {
        let doc = split_document("---\r\ntitle: Hi\r\n---\r\nbody\r\n");
        assert_eq!(doc.block.as_deref(), Some("title: Hi"));
        assert_eq!(doc.body, "body");
    }

    #[test]
    fn parses_recognized_fields() {
        let meta = Frontmatter::parse("title: Hello\ntags:\n  - One\n  - Two Words\ndate: 2022-03-03").unwrap();
        assert_eq!(meta.title(), Some("Hello"));
        assert_eq!(meta.tags(), vec!["One".to_string(), "Two Words".to_string()]);
        assert_eq!(
            meta.date(),
            NaiveDate::from_ymd_opt(2022, 3, 3).unwrap().and_hms_opt(0, 0, 0)
        );
    }

    #[test]
    fn preserves_unrecognized_fields() {
        let meta = Frontmatter::parse("title: Hi\nauthor: justin").unwrap();
        assert_eq!(
            meta.get("author"),
            Some(&Value::String("justin".to_string()))
        );
    }

    #[test]
    fn blank_block_is_empty_mapping() {
        let meta = Frontmatter::parse("   \n").unwrap();
        assert!(meta.is_empty());
    }

    #[test]
    fn non_mapping_block_is_an_error() {
        assert!(Frontmatter::parse("- just\n- a list").is_err());
    }

    #[test]
    fn malformed_yaml_is_an_error() {
        assert!(Frontmatter::parse("title: [unterminated").is_err());
    }

    #[test]
    fn datetime_forms_parse() {
        let meta = Frontmatter::parse("date: 2022-03-03 12:30:00").unwrap();
        assert_eq!(
            meta.date(),
            NaiveDate::from_ymd_opt(2022, 3, 3).unwrap().and_hms_opt(12, 30, 0)
        );

        let meta = Frontmatter::parse("date: \"2022-03-03T12:30:00\"").unwrap();
        assert_eq!(
            meta.date(),
            NaiveDate::from_ymd_opt(2022, 3, 3).unwrap().and_hms_opt(12, 30, 0)
        );
    }

    #[test]
    fn garbage_date_is_none() {
        let meta = Frontmatter::parse("date: soonish").unwrap();
        assert_eq!(meta.date(), None);
    }
}
