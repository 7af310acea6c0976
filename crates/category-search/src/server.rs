/// MCP server exposing category resolution.
///
/// Exposes four tools:
/// - `suggest_categories`: keystroke-time fuzzy suggestions, no network
/// - `resolve_intent`: semantic resolution through the reasoning service
/// - `smart_search`: screened, thresholded resolution for a submitted search
/// - `list_categories`: the current catalog
use std::sync::Arc;

use rmcp::{
    Json, RoleServer, ServerHandler,
    handler::server::router::tool::ToolRouter,
    handler::server::wrapper::Parameters,
    model::*,
    service::RequestContext,
    tool, tool_handler, tool_router,
};
use tracing::info;

use category_match::fuzzy;
use category_match::mcp_api::{
    CategoryListResponse, CategorySummary, ResolveIntentParams, SmartSearchResponse,
    SuggestCategoriesParams, SuggestCategoriesResponse,
};
use category_match::resolver::{IntentResult, SemanticResolver};
use category_match::retry::{resolve_with_retry, RetryPolicy};
use category_match::smart_search::SmartSearch;

use crate::catalog::CatalogSource;
use crate::config::MAX_SUGGEST_LIMIT;

#[derive(Clone)]
pub struct CategorySearchServer {
    catalog: CatalogSource,
    resolver: SemanticResolver,
    smart_search: Arc<SmartSearch>,
    retry: RetryPolicy,
    default_limit: usize,
    tool_router: ToolRouter<CategorySearchServer>,
}

impl CategorySearchServer {
    pub fn new(
        catalog: CatalogSource,
        resolver: SemanticResolver,
        retry: RetryPolicy,
        default_limit: usize,
    ) -> Self {
        let smart_search = Arc::new(SmartSearch::new(resolver.clone(), retry.clone()));
        Self {
            catalog,
            resolver,
            smart_search,
            retry,
            default_limit,
            tool_router: Self::tool_router(),
        }
    }

    fn effective_limit(&self, requested: Option<u32>) -> usize {
        requested
            .map(|n| n as usize)
            .unwrap_or(self.default_limit)
            .clamp(1, MAX_SUGGEST_LIMIT)
    }

    async fn load_catalog(&self) -> Result<Vec<category_match::catalog::Category>, String> {
        self.catalog
            .load()
            .await
            .map_err(|e| format!("catalog unavailable: {e}"))
    }
}

#[tool_router]
impl CategorySearchServer {
    #[tool(description = "Suggest catalog categories for partially typed search text. Prefix matches rank above substring matches, which rank above near-miss spellings (3+ characters). Blank input returns no suggestions.")]
    async fn suggest_categories(
        &self,
        Parameters(params): Parameters<SuggestCategoriesParams>,
    ) -> Result<Json<SuggestCategoriesResponse>, String> {
        let limit = self.effective_limit(params.limit);
        let catalog = self.load_catalog().await?;
        let names: Vec<&str> = catalog.iter().map(|c| c.name.as_str()).collect();
        let suggestions = fuzzy::rank(&names, &params.query, limit);
        Ok(Json(SuggestCategoriesResponse { suggestions }))
    }

    #[tool(description = "Infer what the user actually needs from a full search query and map it to catalog categories with confidence scores (0-100). Never fails on service problems: check `reasoning` for an `error: <class>:` prefix.")]
    async fn resolve_intent(
        &self,
        Parameters(params): Parameters<ResolveIntentParams>,
        context: RequestContext<RoleServer>,
    ) -> Result<Json<IntentResult>, String> {
        let query = params.query.trim().to_string();
        if query.is_empty() {
            return Err("query must not be empty".to_string());
        }
        let catalog = self.load_catalog().await?;

        let result =
            resolve_with_retry(&self.resolver, &self.retry, &query, &catalog, &context.ct).await;
        info!(
            failure = ?result.failure_class(),
            top_match = result.top_match.as_ref().map(|m| m.category.as_str()),
            close_matches = result.close_matches.len(),
            "resolve_intent finished"
        );
        Ok(Json(result))
    }

    #[tool(description = "Run a submitted search: refuses requests for illegal surveillance, otherwise resolves the query and returns `resolved` (confidence >= 50) or `category_not_found` with suggestions.")]
    async fn smart_search(
        &self,
        Parameters(params): Parameters<ResolveIntentParams>,
        context: RequestContext<RoleServer>,
    ) -> Result<Json<SmartSearchResponse>, String> {
        let catalog = self.load_catalog().await?;
        let outcome = self
            .smart_search
            .run(&params.query, &catalog, &context.ct)
            .await;
        Ok(Json(SmartSearchResponse { outcome }))
    }

    #[tool(description = "List the catalog categories currently available for matching.")]
    async fn list_categories(&self) -> Result<Json<CategoryListResponse>, String> {
        let catalog = self.load_catalog().await?;
        let categories = catalog
            .into_iter()
            .map(|c| CategorySummary {
                id: c.id,
                name: c.name,
                description: c.description,
            })
            .collect();
        Ok(Json(CategoryListResponse {
            categories,
            reasoning_configured: self.resolver.is_configured(),
        }))
    }
}

#[tool_handler]
impl ServerHandler for CategorySearchServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2025_06_18,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "category-search".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                title: None,
                icons: None,
                website_url: None,
            },
            instructions: Some(
                "Category resolution MCP server. Call suggest_categories while the user types \
(local, fast), then resolve_intent or smart_search once a full query is submitted. \
list_categories shows the catalog and whether semantic resolution is configured."
                    .to_string(),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn server(default_limit: usize) -> CategorySearchServer {
        CategorySearchServer::new(
            CatalogSource::new("/nonexistent/catalog.json"),
            SemanticResolver::unconfigured(),
            RetryPolicy::none(),
            default_limit,
        )
    }

    #[test]
    fn tools_publish_output_schemas() {
        let tools = CategorySearchServer::tool_router().list_all();
        for name in [
            "suggest_categories",
            "resolve_intent",
            "smart_search",
            "list_categories",
        ] {
            let tool = tools
                .iter()
                .find(|t| t.name == name)
                .unwrap_or_else(|| panic!("missing tool: {name}"));
            assert!(
                tool.output_schema.is_some(),
                "tool {name} should publish output_schema"
            );
        }
    }

    #[test]
    fn suggestion_limit_is_bounded() {
        let s = server(6);
        assert_eq!(s.effective_limit(None), 6);
        assert_eq!(s.effective_limit(Some(0)), 1);
        assert_eq!(s.effective_limit(Some(3)), 3);
        assert_eq!(s.effective_limit(Some(10_000)), MAX_SUGGEST_LIMIT);
    }

    #[tokio::test]
    async fn tools_answer_from_the_catalog_file() {
        let path = std::env::temp_dir().join(format!(
            "category-search-{}-server.json",
            std::process::id()
        ));
        std::fs::write(
            &path,
            r#"[{"id": "1", "name": "Background Check"},
                {"id": "2", "name": "Background Investigation"},
                {"id": "3", "name": "Asset Search", "description": "Find assets"}]"#,
        )
        .expect("write scratch catalog");
        let s = CategorySearchServer::new(
            CatalogSource::new(&path),
            SemanticResolver::unconfigured(),
            RetryPolicy::none(),
            6,
        );

        let Ok(Json(listed)) = s.list_categories().await else {
            panic!("expected the catalog to load");
        };
        assert_eq!(listed.categories.len(), 3);
        assert!(!listed.reasoning_configured);

        let params = SuggestCategoriesParams {
            query: "back".to_string(),
            limit: Some(2),
        };
        let Ok(Json(suggested)) = s.suggest_categories(Parameters(params)).await else {
            panic!("expected suggestions");
        };
        let names: Vec<&str> = suggested.suggestions.iter().map(|x| x.name.as_str()).collect();
        assert_eq!(names, ["Background Check", "Background Investigation"]);

        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn missing_catalog_is_reported_not_panicked() {
        let Err(err) = server(6).list_categories().await else {
            panic!("expected a catalog error");
        };
        assert!(err.starts_with("catalog unavailable"));
    }
}
