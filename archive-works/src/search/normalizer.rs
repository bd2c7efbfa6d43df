//! Search-query normalization
//!
//! Parses a free-text search string plus structured filter parameters into a
//! canonical `SearchQuery`. Pure function of its input: no I/O, deterministic,
//! and idempotent on the residual text it returns. Malformed operator
//! fragments are never an error; they stay in the free-text residue untouched.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::search::query::{
    CountFilter, CountableField, SearchParams, SearchQuery, SortColumn, SortDirection,
};

/// One regex per countable term, in extraction order.
///
/// Matches `<term>[s] [_count] [:] <op><int>[-<int>]` case-insensitively,
/// where `<op>` is one of `< > = :`.
static COUNTABLE_PATTERNS: Lazy<Vec<(CountableField, Regex)>> = Lazy::new(|| {
    CountableField::ALL
        .iter()
        .map(|field| {
            let pattern = format!(
                r"(?i){}s?\s*(?:_?count)?\s*:?\s*((?:<|>|=|:)\s*\d+(?:-\d+)?)",
                field.term()
            );
            let re = Regex::new(&pattern).expect("countable term pattern is valid");
            (*field, re)
        })
        .collect()
});

/// Sort directive: `sort[ed] [by] [:] <op> <field> [ascending|descending]`
static SORT_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)sort(?:ed)?\s*(?:by)?\s*:?\s*(<|>|=|:)\s*(\w+)\s*(ascending|descending)?")
        .expect("sort directive pattern is valid")
});

/// Pairing shorthand tokens that must survive tokenization as exact phrases
const CATEGORY_TOKENS: [&str; 4] = ["m/m", "f/f", "f/m", "m/f"];

static CATEGORY_PATTERNS: Lazy<Vec<(&'static str, Regex)>> = Lazy::new(|| {
    CATEGORY_TOKENS
        .iter()
        .map(|token| {
            let pattern = format!("(?:\"|')?{}(?:\"|')?", token);
            let re = Regex::new(&pattern).expect("category token pattern is valid");
            (*token, re)
        })
        .collect()
});

/// Normalize a raw query string plus structured parameters into a compiled
/// `SearchQuery` and a list of non-fatal advisory warnings.
///
/// Structured parameters win over values extracted from text for the
/// countable fields; sort directives found in text replace the structured
/// sort, matching the archive's historical behavior.
pub fn normalize(raw_query: Option<&str>, params: &SearchParams) -> (SearchQuery, Vec<String>) {
    let mut warnings = Vec::new();
    let mut query = SearchQuery {
        text: None,
        word_count: params.word_count,
        kudos_count: params.kudos_count,
        comments_count: params.comments_count,
        bookmarks_count: params.bookmarks_count,
        hits: params.hits,
        sort_column: params.sort_column,
        sort_direction: params.sort_direction,
        page: params.page.unwrap_or(1).max(1),
        show_restricted: params.show_restricted,
        filter_ids: dedup_preserving_order(&params.filter_ids),
    };

    // Empty or whitespace-only queries skip text processing entirely
    let raw = match raw_query {
        Some(raw) if !raw.trim().is_empty() => raw,
        _ => return (query, warnings),
    };

    // Swap escaped entities back to bare operators so countable-term
    // expressions can be recognized; the inverse swap happens at the end.
    let mut text = raw.replace("&gt;", ">").replace("&lt;", "<");

    for (field, re) in COUNTABLE_PATTERNS.iter() {
        let fragment = match re.captures(&text) {
            Some(caps) => caps[1].to_string(),
            None => continue,
        };
        text = re.replace_all(&text, "").into_owned();

        // Structured params win over extracted text terms
        if query.count_filter(*field).is_some() {
            continue;
        }
        match CountFilter::parse(&fragment) {
            Some(filter) => query.set_count_filter(*field, filter),
            None => warnings.push(format!(
                "Could not read the {} constraint '{}'",
                field.field_name(),
                fragment.trim()
            )),
        }
    }

    if let Some(caps) = SORT_PATTERN.captures(&text) {
        let op = caps[1].to_string();
        let field_name = caps[2].to_string();
        let direction_word = caps.get(3).map(|m| m.as_str().to_ascii_lowercase());
        text = SORT_PATTERN.replace_all(&text, "").into_owned();

        // Turn "word_count", "word count" or "words" into just "word"
        let stripped = singularize(&field_name.to_ascii_lowercase().replace("_count", "").replace("count", ""));
        match SortColumn::resolve(&stripped) {
            Some(column) => query.sort_column = Some(column),
            None => warnings.push(format!("Unrecognized sort field '{}'", field_name)),
        }

        // The trailing word wins over the operator when both are present
        let direction_token = direction_word.unwrap_or(op);
        query.sort_direction = parse_sort_direction(&direction_token);
    }

    // Quote pairing shorthand so the index treats it as an exact phrase
    // instead of tokenizing on '/'
    for (token, re) in CATEGORY_PATTERNS.iter() {
        let quoted = format!("\"{}\"", token);
        text = re.replace_all(&text, quoted.as_str()).into_owned();
    }

    // Inverse of the entity swap, keeping residual text safe downstream
    text = text.replace('>', "&gt;").replace('<', "&lt;");

    // Whitespace-only residue means "no free-text component"
    if !text.trim().is_empty() {
        query.text = Some(text);
    }

    (query, warnings)
}

/// Map a direction token to a sort direction
///
/// `>` and `ascending` mean ascending, `<` and `descending` mean descending;
/// a bare `:`/`=` operator carries no direction.
fn parse_sort_direction(token: &str) -> Option<SortDirection> {
    match token {
        ">" | "ascending" => Some(SortDirection::Asc),
        "<" | "descending" => Some(SortDirection::Desc),
        _ => None,
    }
}

/// Naive singularization: strip one trailing `s`
///
/// Sufficient for the sortable vocabulary (`words`, `kudos`, `hits`, ...);
/// the stripped form still matches its column label by substring.
fn singularize(name: &str) -> String {
    match name.strip_suffix('s') {
        Some(stem) if !stem.is_empty() => stem.to_string(),
        _ => name.to_string(),
    }
}

fn dedup_preserving_order<T: PartialEq + Clone>(items: &[T]) -> Vec<T> {
    let mut out: Vec<T> = Vec::with_capacity(items.len());
    for item in items {
        if !out.contains(item) {
            out.push(item.clone());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::query::CompareOp;
    use uuid::Uuid;

    fn normalize_text(raw: &str) -> (SearchQuery, Vec<String>) {
        normalize(Some(raw), &SearchParams::default())
    }

    #[test]
    fn extracts_count_and_sort_leaving_empty_residue() {
        let (query, warnings) = normalize_text("word_count:>5000 sort:kudos descending");

        assert_eq!(
            query.word_count,
            Some(CountFilter {
                op: CompareOp::Gt,
                value: 5000,
                upper: None
            })
        );
        assert_eq!(query.sort_column, Some(SortColumn::Kudos));
        assert_eq!(query.sort_direction, Some(SortDirection::Desc));
        assert_eq!(query.text, None);
        assert!(warnings.is_empty());
    }

    #[test]
    fn extracts_all_countable_terms() {
        let (query, _) =
            normalize_text("hits > 100 kudos: 50 comments = 3 bookmarks <10 words 2000-5000");

        assert_eq!(query.hits.unwrap().op, CompareOp::Gt);
        assert_eq!(query.kudos_count.unwrap().value, 50);
        assert_eq!(query.comments_count.unwrap().op, CompareOp::Eq);
        assert_eq!(query.bookmarks_count.unwrap().op, CompareOp::Lt);
        // Range without an explicit operator does not match; it needs one of : = < >
        assert_eq!(query.word_count, None);
        assert!(query.text.is_some());
    }

    #[test]
    fn range_with_operator_extracts_window() {
        let (query, _) = normalize_text("words: 100-1000");
        assert_eq!(
            query.word_count,
            Some(CountFilter {
                op: CompareOp::Eq,
                value: 100,
                upper: Some(1000)
            })
        );
        assert_eq!(query.text, None);
    }

    #[test]
    fn structured_params_win_over_text_terms() {
        let params = SearchParams {
            word_count: Some(CountFilter {
                op: CompareOp::Lt,
                value: 10,
                upper: None,
            }),
            ..SearchParams::default()
        };
        let (query, _) = normalize(Some("words > 9000"), &params);

        // The caller's value survives; the text term is still removed
        assert_eq!(query.word_count.unwrap().value, 10);
        assert_eq!(query.text, None);
    }

    #[test]
    fn escaped_entities_are_recognized_and_restored() {
        let (query, _) = normalize_text("words &gt; 1000 I &lt;3 you");
        assert_eq!(query.word_count.unwrap().op, CompareOp::Gt);
        assert_eq!(query.text.as_deref(), Some(" I &lt;3 you"));
    }

    #[test]
    fn category_shorthand_is_quoted() {
        let (query, _) = normalize_text("m/m angst");
        assert_eq!(query.text.as_deref(), Some("\"m/m\" angst"));
    }

    #[test]
    fn already_quoted_category_is_untouched() {
        let (query, _) = normalize_text("\"f/f\" fluff");
        assert_eq!(query.text.as_deref(), Some("\"f/f\" fluff"));
    }

    #[test]
    fn sort_operator_maps_to_direction_when_no_word() {
        let (query, _) = normalize_text("sorted by > hits");
        assert_eq!(query.sort_column, Some(SortColumn::Hits));
        assert_eq!(query.sort_direction, Some(SortDirection::Asc));

        let (query, _) = normalize_text("sort: < word_count");
        assert_eq!(query.sort_column, Some(SortColumn::WordCount));
        assert_eq!(query.sort_direction, Some(SortDirection::Desc));
    }

    #[test]
    fn trailing_direction_word_wins_over_operator() {
        let (query, _) = normalize_text("sort: > kudos descending");
        assert_eq!(query.sort_direction, Some(SortDirection::Desc));
    }

    #[test]
    fn unknown_sort_field_warns_and_leaves_no_column() {
        let (query, warnings) = normalize_text("sort: zebras");
        assert_eq!(query.sort_column, None);
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn malformed_fragments_stay_in_residue() {
        let (query, warnings) = normalize_text("wordcount over 9000");
        assert_eq!(query.word_count, None);
        assert_eq!(query.text.as_deref(), Some("wordcount over 9000"));
        assert!(warnings.is_empty());
    }

    #[test]
    fn empty_query_skips_text_processing() {
        let (query, _) = normalize(None, &SearchParams::default());
        assert_eq!(query.text, None);
        assert_eq!(query.page, 1);

        let (query, _) = normalize(Some("   "), &SearchParams::default());
        assert_eq!(query.text, None);
    }

    #[test]
    fn page_is_clamped_to_at_least_one() {
        let params = SearchParams {
            page: Some(0),
            ..SearchParams::default()
        };
        let (query, _) = normalize(None, &params);
        assert_eq!(query.page, 1);
    }

    #[test]
    fn filter_ids_are_deduplicated_in_order() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let params = SearchParams {
            filter_ids: vec![a, b, a],
            ..SearchParams::default()
        };
        let (query, _) = normalize(None, &params);
        assert_eq!(query.filter_ids, vec![a, b]);
    }

    #[test]
    fn normalization_is_idempotent_on_residual_text() {
        let inputs = [
            "word_count:>5000 sort:kudos descending m/m slow burn",
            "I &lt;3 coffee shop AUs",
            "hits < 200 \"f/m\" canon divergence",
            "plain text with no operators at all",
        ];
        for input in inputs {
            let (first, _) = normalize_text(input);
            let (second, _) = normalize(first.text.as_deref(), &SearchParams::default());
            assert_eq!(
                first.text, second.text,
                "residual text changed on second pass for {:?}",
                input
            );
            assert_eq!(second.word_count, None);
            assert_eq!(second.sort_column, None);
        }
    }
}
