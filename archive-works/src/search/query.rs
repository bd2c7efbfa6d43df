//! Typed search query model
//!
//! A `SearchQuery` is built fresh per request by the normalizer and handed to
//! the external search index; it is never mutated afterwards.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Comparison operator on a countable field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompareOp {
    Gt,
    Lt,
    Eq,
}

/// A countable-field constraint: comparator plus value or inclusive range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountFilter {
    pub op: CompareOp,
    pub value: u64,
    /// Upper bound when the constraint was written as a range (`100-1000`)
    pub upper: Option<u64>,
}

impl CountFilter {
    /// Parse an operator fragment like `>5000`, `: 100`, `=5-10`
    ///
    /// Leading `:` and `=` both mean equality; a range forces equality with
    /// an upper bound. Returns `None` for fragments that do not parse (the
    /// caller leaves such fragments in the free-text residue untouched).
    pub fn parse(fragment: &str) -> Option<Self> {
        let fragment = fragment.trim();
        let (op, rest) = match fragment.chars().next()? {
            '>' => (CompareOp::Gt, &fragment[1..]),
            '<' => (CompareOp::Lt, &fragment[1..]),
            ':' | '=' => (CompareOp::Eq, &fragment[1..]),
            _ => (CompareOp::Eq, fragment),
        };

        let rest = rest.trim();
        match rest.split_once('-') {
            Some((lo, hi)) => {
                let value = lo.trim().parse().ok()?;
                let upper = hi.trim().parse().ok()?;
                // A range is an inclusive window, so the comparator collapses
                // to equality regardless of how it was written.
                Some(CountFilter {
                    op: CompareOp::Eq,
                    value,
                    upper: Some(upper),
                })
            }
            None => Some(CountFilter {
                op,
                value: rest.parse().ok()?,
                upper: None,
            }),
        }
    }
}

/// The countable search terms, in the order they are extracted from text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CountableField {
    Word,
    Kudo,
    Comment,
    Bookmark,
    Hit,
}

impl CountableField {
    pub const ALL: [CountableField; 5] = [
        CountableField::Word,
        CountableField::Kudo,
        CountableField::Comment,
        CountableField::Bookmark,
        CountableField::Hit,
    ];

    /// The singular term as it appears in query text
    pub fn term(self) -> &'static str {
        match self {
            CountableField::Word => "word",
            CountableField::Kudo => "kudo",
            CountableField::Comment => "comment",
            CountableField::Bookmark => "bookmark",
            CountableField::Hit => "hit",
        }
    }

    /// The normalized field name in the compiled query
    ///
    /// `word` stays singular; the rest pluralize and take a `_count` suffix,
    /// except `hit` -> `hits` which is irregular and preserved exactly.
    pub fn field_name(self) -> &'static str {
        match self {
            CountableField::Word => "word_count",
            CountableField::Kudo => "kudos_count",
            CountableField::Comment => "comments_count",
            CountableField::Bookmark => "bookmarks_count",
            CountableField::Hit => "hits",
        }
    }
}

/// Sortable columns, in resolution order
///
/// `resolve` walks variants in declaration order and returns the first whose
/// label contains the requested name; the declaration order is the tie-break
/// and is deliberately not generalized further.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortColumn {
    BestMatch,
    Author,
    Title,
    DatePosted,
    DateUpdated,
    WordCount,
    Hits,
    Kudos,
    Comments,
    Bookmarks,
}

impl SortColumn {
    pub const ALL: [SortColumn; 10] = [
        SortColumn::BestMatch,
        SortColumn::Author,
        SortColumn::Title,
        SortColumn::DatePosted,
        SortColumn::DateUpdated,
        SortColumn::WordCount,
        SortColumn::Hits,
        SortColumn::Kudos,
        SortColumn::Comments,
        SortColumn::Bookmarks,
    ];

    /// Human-facing label matched against sort directives in query text
    pub fn label(self) -> &'static str {
        match self {
            SortColumn::BestMatch => "Best Match",
            SortColumn::Author => "Author",
            SortColumn::Title => "Title",
            SortColumn::DatePosted => "Date Posted",
            SortColumn::DateUpdated => "Date Updated",
            SortColumn::WordCount => "Word Count",
            SortColumn::Hits => "Hits",
            SortColumn::Kudos => "Kudos",
            SortColumn::Comments => "Comments",
            SortColumn::Bookmarks => "Bookmarks",
        }
    }

    /// Column name the external index sorts on
    pub fn index_key(self) -> &'static str {
        match self {
            SortColumn::BestMatch => "_score",
            SortColumn::Author => "authors_to_sort_on",
            SortColumn::Title => "title_to_sort_on",
            SortColumn::DatePosted => "created_at",
            SortColumn::DateUpdated => "revised_at",
            SortColumn::WordCount => "word_count",
            SortColumn::Hits => "hits",
            SortColumn::Kudos => "kudos_count",
            SortColumn::Comments => "comments_count",
            SortColumn::Bookmarks => "bookmarks_count",
        }
    }

    /// Resolve a (stripped, singularized) field name; first match wins
    pub fn resolve(name: &str) -> Option<Self> {
        let needle = name.to_ascii_lowercase();
        if needle.is_empty() {
            return None;
        }
        Self::ALL
            .iter()
            .copied()
            .find(|col| col.label().to_ascii_lowercase().contains(&needle))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_str(self) -> &'static str {
        match self {
            SortDirection::Asc => "asc",
            SortDirection::Desc => "desc",
        }
    }
}

/// Structured search parameters supplied by the caller
///
/// Fields set here win over values extracted from free text. `filter_ids`
/// already includes any tag/fandom scoping implied by request context; the
/// normalizer deduplicates it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchParams {
    pub word_count: Option<CountFilter>,
    pub kudos_count: Option<CountFilter>,
    pub comments_count: Option<CountFilter>,
    pub bookmarks_count: Option<CountFilter>,
    pub hits: Option<CountFilter>,
    pub sort_column: Option<SortColumn>,
    pub sort_direction: Option<SortDirection>,
    pub page: Option<u32>,
    pub show_restricted: bool,
    pub filter_ids: Vec<Uuid>,
}

/// The canonical compiled search request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchQuery {
    /// Residual free text after extraction; `None` means "no free-text
    /// component", never an exact-match empty string
    pub text: Option<String>,
    pub word_count: Option<CountFilter>,
    pub kudos_count: Option<CountFilter>,
    pub comments_count: Option<CountFilter>,
    pub bookmarks_count: Option<CountFilter>,
    pub hits: Option<CountFilter>,
    pub sort_column: Option<SortColumn>,
    pub sort_direction: Option<SortDirection>,
    pub page: u32,
    pub show_restricted: bool,
    pub filter_ids: Vec<Uuid>,
}

impl SearchQuery {
    pub(crate) fn count_filter(&self, field: CountableField) -> Option<CountFilter> {
        match field {
            CountableField::Word => self.word_count,
            CountableField::Kudo => self.kudos_count,
            CountableField::Comment => self.comments_count,
            CountableField::Bookmark => self.bookmarks_count,
            CountableField::Hit => self.hits,
        }
    }

    pub(crate) fn set_count_filter(&mut self, field: CountableField, filter: CountFilter) {
        let slot = match field {
            CountableField::Word => &mut self.word_count,
            CountableField::Kudo => &mut self.kudos_count,
            CountableField::Comment => &mut self.comments_count,
            CountableField::Bookmark => &mut self.bookmarks_count,
            CountableField::Hit => &mut self.hits,
        };
        *slot = Some(filter);
    }
}
