/// Semantic intent resolver.
///
/// One outbound call per invocation, no retries, no shared mutable state. Every
/// path ends in a well-formed `IntentResult`; failures are folded into a
/// degraded result whose `reasoning` carries an `error: <class>: ` prefix.
use std::sync::Arc;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::catalog::{canonical_name, Category};
use crate::error::{FailureClass, ERROR_PREFIX};
use crate::prompt;
use crate::reasoning::{
    prefix_chars, ReasoningClient, ReasoningConfig, ReasoningError, ReasoningService,
};

pub const MAX_CLOSE_MATCHES: usize = 3;
pub const UNABLE_TO_DETERMINE: &str = "Unable to determine the underlying need.";

const LOGGED_RAW_CHARS: usize = 200;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CategoryMatch {
    /// Catalog name, in the catalog's own spelling.
    pub category: String,
    /// 0 to 100.
    pub confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct IntentResult {
    /// What the user actually needs, as restated by the reasoning service.
    pub intent: String,
    pub top_match: Option<CategoryMatch>,
    /// At most three, each strictly below `top_match.confidence`.
    pub close_matches: Vec<CategoryMatch>,
    pub reasoning: String,
}

impl IntentResult {
    pub fn degraded(query: &str, class: FailureClass, detail: &str) -> Self {
        Self {
            intent: query.to_string(),
            top_match: None,
            close_matches: Vec::new(),
            reasoning: class.describe(detail),
        }
    }

    /// `Some` when this result stands for a service or configuration problem
    /// rather than a genuine "no match".
    pub fn failure_class(&self) -> Option<FailureClass> {
        FailureClass::from_reasoning(&self.reasoning)
    }
}

/// Decoded reply. Field names follow the shape requested in `prompt::build`.
/// Wrong types anywhere fail the decode; `closeMatches` is required.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireIntent {
    intent: Option<String>,
    reasoning: Option<String>,
    top_match: Option<WireMatch>,
    close_matches: Vec<WireMatch>,
}

#[derive(Debug, Deserialize)]
struct WireMatch {
    category: Option<String>,
    confidence: Option<f64>,
}

#[derive(Clone)]
pub struct SemanticResolver {
    service: Option<Arc<dyn ReasoningService>>,
}

impl SemanticResolver {
    /// `None` is the explicit "not configured" state: every call degrades
    /// without touching the network.
    pub fn new(service: Option<Arc<dyn ReasoningService>>) -> Self {
        Self { service }
    }

    pub fn unconfigured() -> Self {
        Self::new(None)
    }

    pub fn from_config(config: ReasoningConfig) -> Result<Self, ReasoningError> {
        if !config.is_configured() {
            return Ok(Self::unconfigured());
        }
        let client: Arc<dyn ReasoningService> = Arc::new(ReasoningClient::new(config)?);
        Ok(Self::new(Some(client)))
    }

    pub fn is_configured(&self) -> bool {
        self.service.is_some()
    }

    pub async fn resolve(&self, query: &str, catalog: &[Category]) -> IntentResult {
        self.resolve_with_cancel(query, catalog, &CancellationToken::new())
            .await
    }

    /// Like [`resolve`](Self::resolve), but gives up as soon as `cancel` fires.
    /// The in-flight request future is dropped, which aborts the HTTP exchange.
    pub async fn resolve_with_cancel(
        &self,
        query: &str,
        catalog: &[Category],
        cancel: &CancellationToken,
    ) -> IntentResult {
        if catalog.is_empty() {
            return IntentResult::degraded(
                query,
                FailureClass::EmptyCatalog,
                "no categories available",
            );
        }
        let Some(service) = &self.service else {
            return IntentResult::degraded(
                query,
                FailureClass::NotConfigured,
                "reasoning service credential is absent",
            );
        };

        let request = prompt::build(query, catalog);

        let reply = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                info!("resolution cancelled before the reasoning service replied");
                return IntentResult::degraded(
                    query,
                    FailureClass::Cancelled,
                    "superseded by a newer query",
                );
            }
            reply = service.complete(&request) => reply,
        };

        let text = match reply {
            Ok(text) => text,
            Err(e) => {
                let class = e.failure_class();
                warn!(class = %class, error = %e, "reasoning request failed");
                return IntentResult::degraded(query, class, &e.short_detail());
            }
        };

        let wire: WireIntent = match serde_json::from_str(text.trim()) {
            Ok(wire) => wire,
            Err(e) => {
                warn!(
                    error = %e,
                    raw = %prefix_chars(&text, LOGGED_RAW_CHARS),
                    "reasoning reply does not match the expected shape"
                );
                return IntentResult::degraded(
                    query,
                    FailureClass::MalformedResponse,
                    "malformed response",
                );
            }
        };

        normalize(query, catalog, wire)
    }
}

fn normalize(query: &str, catalog: &[Category], wire: WireIntent) -> IntentResult {
    let top_match = wire.top_match.and_then(|m| validate(catalog, m));
    // With no top match the ceiling is 100, so a close match must still sit below it.
    let ceiling = top_match.as_ref().map_or(100.0, |m| m.confidence);

    let mut close_matches: Vec<CategoryMatch> = Vec::new();
    for candidate in wire.close_matches {
        if close_matches.len() == MAX_CLOSE_MATCHES {
            break;
        }
        let Some(m) = validate(catalog, candidate) else {
            continue;
        };
        if m.confidence >= ceiling {
            continue;
        }
        let repeated = top_match
            .iter()
            .chain(close_matches.iter())
            .any(|seen| seen.category == m.category);
        if !repeated {
            close_matches.push(m);
        }
    }

    let intent = wire
        .intent
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| query.to_string());

    // An upstream explanation must never read like one of our failure markers.
    let reasoning = wire
        .reasoning
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .map(|s| {
            let mut rest = s.as_str();
            while let Some(stripped) = rest.strip_prefix(ERROR_PREFIX) {
                rest = stripped.trim_start();
            }
            rest.to_string()
        })
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| UNABLE_TO_DETERMINE.to_string());

    IntentResult {
        intent,
        top_match,
        close_matches,
        reasoning,
    }
}

fn validate(catalog: &[Category], candidate: WireMatch) -> Option<CategoryMatch> {
    let name = candidate.category?;
    let Some(canonical) = canonical_name(catalog, &name) else {
        if !name.trim().is_empty() {
            debug!(category = %name, "dropping category absent from the catalog");
        }
        return None;
    };
    let confidence = candidate.confidence?.clamp(0.0, 100.0);
    Some(CategoryMatch {
        category: canonical.to_string(),
        confidence,
    })
}
