use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::fuzzy::Suggestion;

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct SuggestCategoriesParams {
    /// The partially typed search text.
    pub query: String,
    /// Maximum number of suggestions to return (default: 6, max: 50).
    pub limit: Option<u32>,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ResolveIntentParams {
    /// The full free-text search the user submitted.
    pub query: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SuggestCategoriesResponse {
    pub suggestions: Vec<Suggestion>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CategorySummary {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CategoryListResponse {
    pub categories: Vec<CategorySummary>,
    /// Whether `resolve_intent` and `smart_search` can reach a reasoning service.
    pub reasoning_configured: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SmartSearchResponse {
    pub outcome: crate::smart_search::SmartSearchOutcome,
}
