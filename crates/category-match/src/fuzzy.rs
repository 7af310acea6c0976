/// Keystroke-time suggestion engine.
///
/// Ranks catalog names against a partially typed query using prefix, substring
/// and (for queries of three or more characters) edit-distance rules. Pure and
/// deterministic: no I/O, no state carried between calls.
use std::cmp::Ordering;
use std::collections::HashSet;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::edit_distance;

const STARTS_WITH_SCORE: i32 = 100;
const CONTAINS_SCORE: i32 = 60;
const FUZZY_SCORE: i32 = 40;
const MAX_FUZZY_DISTANCE: usize = 2;
const MIN_FUZZY_QUERY_CHARS: usize = 3;

/// A ranked catalog name. `distance` is 0 for names matched by prefix or substring.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Suggestion {
    pub name: String,
    pub score: i32,
    pub distance: usize,
}

/// Rank `catalog` against `query`, returning at most `limit` suggestions.
pub fn rank<S: AsRef<str>>(catalog: &[S], query: &str, limit: usize) -> Vec<Suggestion> {
    let query = query.trim().to_lowercase();
    if query.is_empty() || limit == 0 {
        return Vec::new();
    }
    let allow_fuzzy = query.chars().count() >= MIN_FUZZY_QUERY_CHARS;

    let mut seen = HashSet::new();
    let mut ranked: Vec<Suggestion> = catalog
        .iter()
        .map(AsRef::as_ref)
        .filter(|name| seen.insert(*name))
        .filter_map(|name| classify(name, &query, allow_fuzzy))
        .collect();

    ranked.sort_by(compare);
    ranked.truncate(limit);
    ranked
}

/// Names only, in ranked order.
pub fn suggest<S: AsRef<str>>(catalog: &[S], query: &str, limit: usize) -> Vec<String> {
    rank(catalog, query, limit)
        .into_iter()
        .map(|s| s.name)
        .collect()
}

fn classify(name: &str, query: &str, allow_fuzzy: bool) -> Option<Suggestion> {
    let lower = name.to_lowercase();

    let (score, distance) = if lower.starts_with(query) {
        (STARTS_WITH_SCORE, 0)
    } else if lower.contains(query) {
        (CONTAINS_SCORE, 0)
    } else if allow_fuzzy {
        let d = edit_distance::distance(&lower, query);
        if d > MAX_FUZZY_DISTANCE {
            return None;
        }
        // d <= MAX_FUZZY_DISTANCE, so the cast is lossless.
        (FUZZY_SCORE - d as i32, d)
    } else {
        return None;
    };

    Some(Suggestion {
        name: name.to_string(),
        score,
        distance,
    })
}

fn compare(a: &Suggestion, b: &Suggestion) -> Ordering {
    b.score
        .cmp(&a.score)
        .then_with(|| a.distance.cmp(&b.distance))
        .then_with(|| a.name.cmp(&b.name))
}

#[cfg(test)]
mod tests {
    use super::*;

    const CATALOG: &[&str] = &[
        "Background Check",
        "Background Investigation",
        "Asset Search",
        "Surveillance",
        "Missing Persons",
        "Corporate Fraud",
    ];

    #[test]
    fn blank_query_yields_nothing() {
        assert!(suggest(CATALOG, "", 6).is_empty());
        assert!(suggest(CATALOG, "   \t", 6).is_empty());
    }

    #[test]
    fn prefix_matches_rank_first_and_tie_break_by_name() {
        let ranked = rank(CATALOG, "back", 6);
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].name, "Background Check");
        assert_eq!(ranked[1].name, "Background Investigation");
        assert!(ranked.iter().all(|s| s.score == 100 && s.distance == 0));
    }

    #[test]
    fn substring_scores_below_prefix() {
        let ranked = rank(&["Fraud Review", "Corporate Fraud"], "fraud", 6);
        assert_eq!(ranked[0].name, "Fraud Review");
        assert_eq!(ranked[0].score, 100);
        assert_eq!(ranked[1].name, "Corporate Fraud");
        assert_eq!(ranked[1].score, 60);
    }

    #[test]
    fn fuzzy_subtracts_distance() {
        let ranked = rank(CATALOG, "survailance", 6);
        assert_eq!(
            ranked,
            vec![Suggestion {
                name: "Surveillance".to_string(),
                score: 38,
                distance: 2,
            }]
        );
    }

    #[test]
    fn short_query_disables_fuzzy() {
        assert_eq!(suggest(&["xyz"], "xy", 6), vec!["xyz".to_string()]);
        assert!(suggest(&["abc"], "xy", 6).is_empty());
        // "ab" vs "ax" is distance 1 but fuzzy needs three characters
        assert!(suggest(&["ax"], "ab", 6).is_empty());
    }

    #[test]
    fn query_is_trimmed_and_case_folded() {
        assert_eq!(
            suggest(CATALOG, "  MISSING ", 6),
            vec!["Missing Persons".to_string()]
        );
    }

    #[test]
    fn limit_and_dedup() {
        let catalog = ["Alpha", "Alpine", "Alps", "Alpha"];
        assert_eq!(suggest(&catalog, "al", 2).len(), 2);
        assert_eq!(suggest(&catalog, "al", 10).len(), 3);
        assert!(suggest(&catalog, "al", 0).is_empty());
    }

    #[test]
    fn output_keeps_original_casing() {
        assert_eq!(suggest(CATALOG, "asset", 6), vec!["Asset Search".to_string()]);
    }
}
