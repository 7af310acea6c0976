/// Outcome layer over the resolver for a submitted search.
///
/// Screens out requests for illegal surveillance before any network call, then
/// turns an `IntentResult` into something a search page can act on.
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::catalog::Category;
use crate::prompt::MIN_CONFIDENCE;
use crate::resolver::{IntentResult, SemanticResolver, MAX_CLOSE_MATCHES};
use crate::retry::{resolve_with_retry, RetryPolicy};

pub const LEGAL_ALTERNATIVE: &str = "Legal background verification";

const PROHIBITED_PHRASES: &[&str] = &[
    "phone tap", "phone tapping", "tap phone", "tap his phone", "tap her phone",
    "listen to calls", "listen to phone calls", "eavesdrop", "wiretap",
    "hack", "hacking", "hack into", "hack account", "hack email", "hack phone",
    "spy on", "spying on", "spy on phone", "spy on messages",
    "track without consent", "track someone without", "track her", "track him",
    "gps track without",
    "private messages", "access private messages", "read private messages",
    "private emails", "access emails", "read emails without",
    "call logs", "access call logs", "call history without",
    "illegal surveillance", "unauthorized surveillance",
];

const PROHIBITED_MESSAGE: &str = "We don't provide services that involve illegal activities or \
violation of privacy, as they are restricted under government laws.";
const EMPTY_MESSAGE: &str =
    "We didn't find any relevant categories. You can browse here to find what you need.";
const UNAVAILABLE_MESSAGE: &str =
    "We didn't find a relevant category. You can browse all services below.";
const WEAK_MATCH_MESSAGE: &str =
    "We didn't find a strong match for that. You can browse all services below.";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SmartSearchOutcome {
    Prohibited {
        message: String,
        alternative_category: String,
    },
    CategoryNotFound {
        message: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        suggested_categories: Vec<String>,
        /// Set when the miss was caused by a service problem, e.g. "timeout"
        /// or "upstream_status:503".
        #[serde(default, skip_serializing_if = "Option::is_none")]
        failure: Option<String>,
    },
    Resolved {
        category: String,
        intent: String,
        confidence: f64,
    },
}

pub fn is_prohibited(query: &str) -> bool {
    let q = query.trim().to_lowercase();
    PROHIBITED_PHRASES.iter().any(|p| q.contains(p))
}

pub struct SmartSearch {
    resolver: SemanticResolver,
    retry: RetryPolicy,
}

impl SmartSearch {
    pub fn new(resolver: SemanticResolver, retry: RetryPolicy) -> Self {
        Self { resolver, retry }
    }

    pub async fn run(
        &self,
        query: &str,
        catalog: &[Category],
        cancel: &CancellationToken,
    ) -> SmartSearchOutcome {
        let query = query.trim();
        if query.is_empty() {
            return not_found(EMPTY_MESSAGE, Vec::new(), None);
        }
        if is_prohibited(query) {
            info!("smart search refused a prohibited request");
            return SmartSearchOutcome::Prohibited {
                message: PROHIBITED_MESSAGE.to_string(),
                alternative_category: LEGAL_ALTERNATIVE.to_string(),
            };
        }

        let result = resolve_with_retry(&self.resolver, &self.retry, query, catalog, cancel).await;
        classify(result)
    }
}

/// Map a resolution onto a search outcome. A top match below the confidence
/// bar counts as "not found", with close matches offered as suggestions.
pub fn classify(result: IntentResult) -> SmartSearchOutcome {
    if let Some(class) = result.failure_class() {
        return not_found(UNAVAILABLE_MESSAGE, Vec::new(), Some(class.to_string()));
    }

    match result.top_match {
        Some(top) if top.confidence >= f64::from(MIN_CONFIDENCE) => SmartSearchOutcome::Resolved {
            category: top.category,
            intent: result.intent,
            confidence: top.confidence,
        },
        _ => {
            let suggestions = result
                .close_matches
                .into_iter()
                .take(MAX_CLOSE_MATCHES)
                .map(|m| m.category)
                .collect();
            not_found(WEAK_MATCH_MESSAGE, suggestions, None)
        }
    }
}

fn not_found(
    message: &str,
    suggested_categories: Vec<String>,
    failure: Option<String>,
) -> SmartSearchOutcome {
    SmartSearchOutcome::CategoryNotFound {
        message: message.to_string(),
        suggested_categories,
        failure,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FailureClass;
    use crate::resolver::CategoryMatch;

    fn result(top: Option<(&str, f64)>, close: &[(&str, f64)]) -> IntentResult {
        let to_match = |(category, confidence): (&str, f64)| CategoryMatch {
            category: category.to_string(),
            confidence,
        };
        IntentResult {
            intent: "Find where a debtor moved".to_string(),
            top_match: top.map(to_match),
            close_matches: close.iter().copied().map(to_match).collect(),
            reasoning: "Relocation suggests skip tracing.".to_string(),
        }
    }

    #[test]
    fn prohibited_phrases_are_detected() {
        assert!(is_prohibited("How do I HACK INTO my ex's email"));
        assert!(is_prohibited("need to read private messages on her phone"));
        assert!(!is_prohibited("verify a business partner's background"));
    }

    #[test]
    fn confident_top_match_resolves() {
        let outcome = classify(result(Some(("Skip Tracing", 82.0)), &[("Asset Search", 40.0)]));
        assert_eq!(
            outcome,
            SmartSearchOutcome::Resolved {
                category: "Skip Tracing".to_string(),
                intent: "Find where a debtor moved".to_string(),
                confidence: 82.0,
            }
        );
    }

    #[test]
    fn weak_top_match_offers_suggestions() {
        let outcome = classify(result(
            Some(("Skip Tracing", 49.0)),
            &[("Asset Search", 40.0), ("Background Check", 30.0)],
        ));
        match outcome {
            SmartSearchOutcome::CategoryNotFound {
                suggested_categories,
                failure,
                ..
            } => {
                assert_eq!(suggested_categories, ["Asset Search", "Background Check"]);
                assert!(failure.is_none());
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn service_failure_is_reported() {
        let degraded = IntentResult::degraded("q", FailureClass::Timeout, "request timed out");
        match classify(degraded) {
            SmartSearchOutcome::CategoryNotFound { failure, .. } => {
                assert_eq!(failure.as_deref(), Some("timeout"));
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn upstream_status_failure_keeps_the_code() {
        let degraded = IntentResult::degraded("q", FailureClass::UpstreamStatus(503), "overloaded");
        match classify(degraded) {
            SmartSearchOutcome::CategoryNotFound { failure, .. } => {
                assert_eq!(failure.as_deref(), Some("upstream_status:503"));
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[tokio::test]
    async fn blank_and_prohibited_queries_never_reach_the_resolver() {
        // An unconfigured resolver would report `not_configured`; neither path gets that far.
        let search = SmartSearch::new(SemanticResolver::unconfigured(), RetryPolicy::none());
        let catalog = vec![Category::new("1", "Surveillance", None)];
        let cancel = CancellationToken::new();

        match search.run("   ", &catalog, &cancel).await {
            SmartSearchOutcome::CategoryNotFound { failure, .. } => assert!(failure.is_none()),
            other => panic!("unexpected outcome: {other:?}"),
        }

        let outcome = search.run("wiretap my neighbour", &catalog, &cancel).await;
        assert!(matches!(
            outcome,
            SmartSearchOutcome::Prohibited { ref alternative_category, .. }
                if alternative_category == LEGAL_ALTERNATIVE
        ));

        match search.run("find my lost dog", &catalog, &cancel).await {
            SmartSearchOutcome::CategoryNotFound { failure, .. } => {
                assert_eq!(failure.as_deref(), Some("not_configured"));
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn outcome_serializes_with_kind_tag() {
        let json = serde_json::to_value(SmartSearchOutcome::Prohibited {
            message: "m".to_string(),
            alternative_category: LEGAL_ALTERNATIVE.to_string(),
        })
        .unwrap();
        assert_eq!(json["kind"], "prohibited");
        assert_eq!(json["alternative_category"], LEGAL_ALTERNATIVE);
    }
}
