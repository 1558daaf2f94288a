use quill_post::{normalize_tag, IndexMode, Post};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

type DatedNames = BTreeMap<i32, BTreeMap<u32, BTreeMap<u32, HashMap<String, usize>>>>;

/// Name lookup, shaped by the index mode. Months are stored 0-based, the
/// shape the hierarchy has always had; [`PostIndex::post_by_date`] takes
/// calendar months and converts.
#[derive(Debug, Clone, PartialEq)]
enum NameIndex {
    Dated(DatedNames),
    Flat(HashMap<String, usize>),
}

/// The published, queryable index: ordered records plus date and tag
/// lookup structures, all built together from one complete record set.
///
/// A `PostIndex` is never mutated after [`PostIndex::build`]; the reload
/// coordinator replaces the published `Arc<PostIndex>` as a whole, so a
/// reader's snapshot stays valid for as long as it holds the `Arc`.
#[derive(Debug, Clone, PartialEq)]
pub struct PostIndex {
    ordered: Vec<Arc<Post>>,
    names: NameIndex,
    tags: HashMap<String, Vec<usize>>,
}

impl PostIndex {
    #[must_use]
    pub fn empty(mode: IndexMode) -> Self {
        Self::build(mode, Vec::new())
    }

    /// Build the index from a complete record set. Records are sorted by
    /// date descending; the sort is stable, so equal dates keep their
    /// scan order.
    #[must_use]
    pub fn build(mode: IndexMode, mut posts: Vec<Post>) -> Self {
        posts.sort_by(|a, b| b.date.cmp(&a.date));

        let mut names = match mode {
            IndexMode::Hierarchical => NameIndex::Dated(DatedNames::new()),
            IndexMode::Flat => NameIndex::Flat(HashMap::new()),
        };
        let mut tags: HashMap<String, Vec<usize>> = HashMap::new();
        let mut ordered = Vec::with_capacity(posts.len());

        for (position, post) in posts.into_iter().enumerate() {
            match &mut names {
                NameIndex::Dated(years) => {
                    use chrono::Datelike;
                    let date = post.date.date();
                    years
                        .entry(date.year())
                        .or_default()
                        .entry(date.month0())
                        .or_default()
                        .entry(date.day())
                        .or_default()
                        .insert(post.name.clone(), position);
                }
                NameIndex::Flat(by_name) => {
                    by_name.insert(post.name.clone(), position);
                }
            }

            for tag in &post.tags {
                tags.entry(tag.clone()).or_default().push(position);
            }

            ordered.push(Arc::new(post));
        }

        Self {
            ordered,
            names,
            tags,
        }
    }

    #[must_use]
    pub fn mode(&self) -> IndexMode {
        match self.names {
            NameIndex::Dated(_) => IndexMode::Hierarchical,
            NameIndex::Flat(_) => IndexMode::Flat,
        }
    }

    #[must_use]
    pub fn post_count(&self) -> usize {
        self.ordered.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ordered.is_empty()
    }

    /// Record count for a tag; 0 for a tag the index has never seen. The
    /// input goes through the same normalization as stored tags.
    #[must_use]
    pub fn post_count_for_tag(&self, tag: &str) -> usize {
        self.tags
            .get(&normalize_tag(tag))
            .map_or(0, Vec::len)
    }

    /// A contiguous slice of the date-descending sequence. Omitted offset
    /// means the whole sequence; omitted count means to the end;
    /// out-of-range offsets yield an empty result, never an error.
    #[must_use]
    pub fn posts(&self, offset: Option<usize>, count: Option<usize>) -> Vec<Arc<Post>> {
        slice_bounds(self.ordered.len(), offset, count)
            .map(|position| self.ordered[position].clone())
            .collect()
    }

    /// Records carrying a tag, in the tag's stored (date-descending)
    /// order, with the same offset/count semantics as [`Self::posts`].
    #[must_use]
    pub fn posts_for_tag(
        &self,
        tag: &str,
        offset: Option<usize>,
        count: Option<usize>,
    ) -> Vec<Arc<Post>> {
        let Some(positions) = self.tags.get(&normalize_tag(tag)) else {
            return Vec::new();
        };
        slice_bounds(positions.len(), offset, count)
            .map(|i| self.ordered[positions[i]].clone())
            .collect()
    }

    /// Hierarchical lookup by calendar date plus name. `month` is the
    /// calendar (1-based) month. Unknown coordinates, and any lookup
    /// against a flat index, yield `None`.
    #[must_use]
    pub fn post_by_date(&self, year: i32, month: u32, day: u32, name: &str) -> Option<Arc<Post>> {
        let NameIndex::Dated(years) = &self.names else {
            return None;
        };
        let position = *years
            .get(&year)?
            .get(&month.checked_sub(1)?)?
            .get(&day)?
            .get(name)?;
        Some(self.ordered[position].clone())
    }

    /// Flat lookup by name alone. `None` for unknown names and for
    /// hierarchical indexes.
    #[must_use]
    pub fn post_by_name(&self, name: &str) -> Option<Arc<Post>> {
        let NameIndex::Flat(by_name) = &self.names else {
            return None;
        };
        by_name
            .get(name)
            .map(|&position| self.ordered[position].clone())
    }

    /// All tags present in the index, with their record counts.
    #[must_use]
    pub fn tags(&self) -> Vec<(&str, usize)> {
        let mut tags: Vec<(&str, usize)> = self
            .tags
            .iter()
            .map(|(tag, positions)| (tag.as_str(), positions.len()))
            .collect();
        tags.sort_by(|a, b| a.0.cmp(b.0));
        tags
    }
}

// Offset/count slicing shared by the sequence queries: omitted offset is
// the start, omitted count runs to the end, out-of-range clamps to empty.
fn slice_bounds(
    len: usize,
    offset: Option<usize>,
    count: Option<usize>,
) -> std::ops::Range<usize> {
    let start = offset.unwrap_or(0).min(len);
    let end = count.map_or(len, |count| start.saturating_add(count).min(len));
    start..end
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;
    use quill_post::Frontmatter;

    fn post(name: &str, y: i32, m: u32, d: u32, tags: &[&str]) -> Post {
        Post {
            name: name.to_string(),
            title: name.to_uppercase(),
            tags: tags.iter().map(|t| normalize_tag(t)).collect(),
            date: NaiveDate::from_ymd_opt(y, m, d)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap(),
            html: String::new(),
            meta: Frontmatter::default(),
        }
    }

    fn names(posts: &[Arc<Post>]) -> Vec<&str> {
        posts.iter().map(|p| p.name.as_str()).collect()
    }

    #[test]
    fn orders_by_date_descending() {
        let index = PostIndex::build(
            IndexMode::Hierarchical,
            vec![
                post("old", 2021, 1, 1, &[]),
                post("new", 2021, 2, 1, &[]),
                post("mid", 2021, 1, 15, &[]),
            ],
        );
        assert_eq!(names(&index.posts(None, None)), vec!["new", "mid", "old"]);
    }

    #[test]
    fn equal_dates_keep_scan_order() {
        let index = PostIndex::build(
            IndexMode::Hierarchical,
            vec![
                post("a", 2021, 1, 1, &[]),
                post("b", 2021, 1, 1, &[]),
                post("c", 2021, 1, 1, &[]),
            ],
        );
        assert_eq!(names(&index.posts(None, None)), vec!["a", "b", "c"]);
    }

    #[test]
    fn slicing_semantics() {
        let index = PostIndex::build(
            IndexMode::Hierarchical,
            vec![
                post("a", 2021, 3, 1, &[]),
                post("b", 2021, 2, 1, &[]),
                post("c", 2021, 1, 1, &[]),
            ],
        );

        assert_eq!(names(&index.posts(Some(1), None)), vec!["b", "c"]);
        assert_eq!(names(&index.posts(Some(0), Some(1))), vec!["a"]);
        assert_eq!(names(&index.posts(Some(1), Some(10))), vec!["b", "c"]);
        assert_eq!(index.posts(Some(10), None).len(), 0);
        assert_eq!(index.posts(Some(10), Some(5)).len(), 0);
    }

    #[test]
    fn tag_positions_follow_ordered_sequence() {
        let index = PostIndex::build(
            IndexMode::Hierarchical,
            vec![
                post("old", 2021, 1, 1, &["shared"]),
                post("new", 2021, 2, 1, &["shared", "solo"]),
            ],
        );
        assert_eq!(
            names(&index.posts_for_tag("shared", None, None)),
            vec!["new", "old"]
        );
        assert_eq!(index.post_count_for_tag("shared"), 2);
        assert_eq!(index.post_count_for_tag("solo"), 1);
        assert_eq!(index.post_count_for_tag("nope"), 0);
        assert_eq!(index.tags(), vec![("shared", 2), ("solo", 1)]);
    }

    #[test]
    fn tag_lookup_normalizes_input() {
        let index = PostIndex::build(
            IndexMode::Hierarchical,
            vec![post("p", 2021, 1, 1, &["Foo Bar"])],
        );
        assert_eq!(index.post_count_for_tag("Foo Bar"), 1);
        assert_eq!(index.post_count_for_tag("foo-bar"), 1);
        assert_eq!(index.post_count_for_tag("foo bar"), 1);
    }

    #[test]
    fn hierarchical_lookup_uses_calendar_months() {
        let index = PostIndex::build(
            IndexMode::Hierarchical,
            vec![post("hello", 2021, 1, 1, &[])],
        );
        let found = index.post_by_date(2021, 1, 1, "hello").unwrap();
        assert_eq!(found.name, "hello");
        assert!(index.post_by_date(2021, 2, 1, "hello").is_none());
        assert!(index.post_by_date(2021, 0, 1, "hello").is_none());
        assert!(index.post_by_date(2021, 1, 1, "missing").is_none());
        assert!(index.post_by_name("hello").is_none());
    }

    #[test]
    fn flat_lookup_is_by_name_alone() {
        let index = PostIndex::build(IndexMode::Flat, vec![post("launch", 2022, 3, 3, &[])]);
        assert_eq!(index.post_by_name("launch").unwrap().name, "launch");
        assert!(index.post_by_name("missing").is_none());
        assert!(index.post_by_date(2022, 3, 3, "launch").is_none());
    }

    #[test]
    fn empty_index_answers_everything() {
        let index = PostIndex::empty(IndexMode::Hierarchical);
        assert_eq!(index.post_count(), 0);
        assert!(index.is_empty());
        assert!(index.posts(None, None).is_empty());
        assert!(index.posts_for_tag("any", None, None).is_empty());
        assert!(index.post_by_date(2021, 1, 1, "x").is_none());
    }
}
