use crate::frontmatter::{split_document, Frontmatter};
use crate::render::Renderer;
use chrono::{NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::Regex;

/// Title substituted when a document's front matter is absent or
/// malformed; the record is still indexed so the presentation layer can
/// surface the breakage.
pub const MISSING_METADATA_TITLE: &str = "!!! missing metadata !!!";

static DATE_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{4})-(\d{2})-(\d{2})-(.+)$").expect("valid date prefix pattern"));

/// Whether a filename stem carries the `YYYY-MM-DD-<name>` prefix. The
/// scanner and the record builder share this pattern so they can never
/// disagree about which files are date-prefixed.
#[must_use]
pub fn has_date_prefix(stem: &str) -> bool {
    DATE_PREFIX.is_match(stem)
}

/// How documents are identified and dated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IndexMode {
    /// Filenames carry a `YYYY-MM-DD-` prefix; posts are looked up by
    /// date hierarchy plus name.
    #[default]
    Hierarchical,
    /// Filenames are plain; dates come from front matter and posts are
    /// looked up by name alone.
    Flat,
}

/// One parsed document. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct Post {
    /// Identifier: the filename stem with the date prefix stripped, or
    /// the whole stem in flat mode.
    pub name: String,
    pub title: String,
    /// Normalized tags (lowercased, spaces replaced with hyphens), in
    /// document order.
    pub tags: Vec<String>,
    pub date: NaiveDateTime,
    /// Rendered body, opaque to the engine.
    pub html: String,
    /// The full front matter mapping, unrecognized keys included.
    pub meta: Frontmatter,
}

/// Outcome of building one record.
#[derive(Debug, Clone, PartialEq)]
pub enum BuildOutcome {
    Built(Post),
    /// The front matter block failed to parse; the record carries the
    /// sentinel title and empty tags so the cycle can still complete.
    Degraded(Post),
    /// The file yields no record this cycle (no usable date). Not an
    /// error.
    Skipped,
}

/// Normalize a tag for storage and lookup: case-folded, internal spaces
/// replaced with hyphens. Storage and query keys go through the same
/// function so they always agree.
#[must_use]
pub fn normalize_tag(tag: &str) -> String {
    tag.trim().to_lowercase().replace(' ', "-")
}

/// Build a record from a candidate file's name and raw text.
///
/// Date derivation, in order:
/// 1. a `YYYY-MM-DD` filename prefix wins regardless of mode;
/// 2. otherwise, in flat mode, the front matter `date` field;
/// 3. otherwise the file is skipped for this cycle.
///
/// A prefix with out-of-range components (month 13, day 99) also skips
/// the file.
#[must_use]
pub fn build_post(
    file_name: &str,
    raw: &str,
    mode: IndexMode,
    renderer: &dyn Renderer,
) -> BuildOutcome {
    let stem = match file_name.rsplit_once('.') {
        Some((stem, _ext)) if !stem.is_empty() => stem,
        _ => file_name,
    };

    let prefix = DATE_PREFIX.captures(stem).and_then(|captures| {
        let year = captures[1].parse().ok()?;
        let month = captures[2].parse().ok()?;
        let day = captures[3].parse().ok()?;
        let date = NaiveDate::from_ymd_opt(year, month, day)?.and_hms_opt(0, 0, 0)?;
        Some((date, captures[4].to_string()))
    });

    let doc = split_document(raw);
    let (meta, degraded) = match doc.block.as_deref() {
        None => (Frontmatter::default(), true),
        Some(block) => match Frontmatter::parse(block) {
            Ok(meta) => (meta, false),
            Err(err) => {
                log::warn!("Malformed front matter in {file_name}: {err}");
                (Frontmatter::default(), true)
            }
        },
    };

    let (name, date) = match prefix {
        Some((date, name)) => (name, date),
        None => {
            let from_meta = match mode {
                IndexMode::Flat => meta.date(),
                IndexMode::Hierarchical => None,
            };
            match from_meta {
                Some(date) => (stem.to_string(), date),
                None => return BuildOutcome::Skipped,
            }
        }
    };

    let title = match meta.title() {
        Some(title) => title.to_string(),
        None => MISSING_METADATA_TITLE.to_string(),
    };
    let tags = meta
        .tags()
        .iter()
        .map(|tag| normalize_tag(tag))
        .collect();

    let post = Post {
        name,
        title,
        tags,
        date,
        html: renderer.render(&doc.body),
        meta,
    };

    if degraded {
        BuildOutcome::Degraded(post)
    } else {
        BuildOutcome::Built(post)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::PlainRenderer;
    use pretty_assertions::assert_eq;

    fn build(file_name: &str, raw: &str, mode: IndexMode) -> BuildOutcome {
        build_post(file_name, raw, mode, &PlainRenderer)
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    #[test]
    fn prefix_supplies_date_and_name() {
        let BuildOutcome::Built(post) = build(
            "2021-01-01-hello.md",
            "---\ntitle: Hello\n---\nbody",
            IndexMode::Hierarchical,
        ) else {
            panic!("expected a built post");
        };
        assert_eq!(post.name, "hello");
        assert_eq!(post.title, "Hello");
        assert_eq!(post.date, date(2021, 1, 1));
        assert_eq!(post.html, "body");
    }

    #[test]
    fn prefix_wins_over_metadata_date() {
        let BuildOutcome::Built(post) = build(
            "2021-01-01-hello.md",
            "---\ntitle: Hello\ndate: 1999-09-09\n---\n",
            IndexMode::Flat,
        ) else {
            panic!("expected a built post");
        };
        assert_eq!(post.date, date(2021, 1, 1));
        assert_eq!(post.name, "hello");
    }

    #[test]
    fn flat_mode_dates_from_metadata() {
        let BuildOutcome::Built(post) = build(
            "launch.md",
            "---\ntitle: Launch\ndate: 2022-03-03\n---\n",
            IndexMode::Flat,
        ) else {
            panic!("expected a built post");
        };
        assert_eq!(post.name, "launch");
        assert_eq!(post.date, date(2022, 3, 3));
    }

    #[test]
    fn flat_mode_without_date_is_skipped() {
        assert_eq!(
            build("launch.md", "---\ntitle: Launch\n---\n", IndexMode::Flat),
            BuildOutcome::Skipped
        );
    }

    #[test]
    fn hierarchical_without_prefix_is_skipped() {
        assert_eq!(
            build("hello.md", "---\ndate: 2022-03-03\n---\n", IndexMode::Hierarchical),
            BuildOutcome::Skipped
        );
    }

    #[test]
    fn out_of_range_prefix_is_skipped() {
        assert_eq!(
            build("2021-13-99-x.md", "---\ntitle: X\n---\n", IndexMode::Hierarchical),
            BuildOutcome::Skipped
        );
    }

    #[test]
    fn missing_block_degrades_with_sentinel() {
        let BuildOutcome::Degraded(post) =
            build("2021-01-01-raw.md", "no front matter here", IndexMode::Hierarchical)
        else {
            panic!("expected a degraded post");
        };
        assert_eq!(post.title, MISSING_METADATA_TITLE);
        assert!(post.tags.is_empty());
        assert_eq!(post.date, date(2021, 1, 1));
    }

    #[test]
    fn malformed_block_degrades_with_sentinel() {
        let BuildOutcome::Degraded(post) = build(
            "2021-01-01-bad.md",
            "---\ntitle: [unterminated\n---\nbody",
            IndexMode::Hierarchical,
        ) else {
            panic!("expected a degraded post");
        };
        assert_eq!(post.title, MISSING_METADATA_TITLE);
        assert!(post.meta.is_empty());
    }

    #[test]
    fn tags_are_normalized_at_build_time() {
        let BuildOutcome::Built(post) = build(
            "2021-01-01-tagged.md",
            "---\ntitle: T\ntags:\n  - Foo Bar\n  - Release\n---\n",
            IndexMode::Hierarchical,
        ) else {
            panic!("expected a built post");
        };
        assert_eq!(post.tags, vec!["foo-bar".to_string(), "release".to_string()]);
    }

    #[test]
    fn normalize_tag_folds_case_and_spaces() {
        assert_eq!(normalize_tag("Foo Bar"), "foo-bar");
        assert_eq!(normalize_tag("  Release  "), "release");
    }
}
