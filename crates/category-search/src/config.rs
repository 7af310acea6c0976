use std::path::PathBuf;

use category_match::reasoning::ReasoningConfig;
use category_match::retry::RetryPolicy;

use crate::error::AppError;

const DEFAULT_SUGGEST_LIMIT: usize = 6;
pub const MAX_SUGGEST_LIMIT: usize = 50;

/// Application configuration loaded explicitly from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// JSON array of `{id, name, description}` objects, re-read on every call.
    pub catalog_path: PathBuf,
    pub suggest_default_limit: usize,
    pub reasoning: ReasoningConfig,
    pub retry: RetryPolicy,
}

impl Config {
    /// Required:
    /// - `CATALOG_PATH`: path to the catalog JSON file
    ///
    /// Optional:
    /// - `SUGGEST_DEFAULT_LIMIT` (default: 6, max: 50)
    /// - `REASONING_*` (see `ReasoningConfig::from_env`); without
    ///   `REASONING_API_KEY` the semantic tools answer "not configured"
    /// - `RESOLVE_MAX_RETRIES`, `RESOLVE_RETRY_INITIAL_MS`, `RESOLVE_RETRY_MAX_MS`
    pub fn from_env() -> Result<Self, AppError> {
        let catalog_path = std::env::var("CATALOG_PATH").map_err(|_| {
            AppError::Config("CATALOG_PATH environment variable is required".to_string())
        })?;
        let catalog_path = PathBuf::from(catalog_path);
        if !catalog_path.is_file() {
            return Err(AppError::Config(format!(
                "catalog file not found at {}",
                catalog_path.display()
            )));
        }

        let suggest_default_limit = std::env::var("SUGGEST_DEFAULT_LIMIT")
            .ok()
            .and_then(|s| s.parse::<usize>().ok())
            .unwrap_or(DEFAULT_SUGGEST_LIMIT)
            .clamp(1, MAX_SUGGEST_LIMIT);

        Ok(Self {
            catalog_path,
            suggest_default_limit,
            reasoning: ReasoningConfig::from_env(),
            retry: RetryPolicy::from_env(),
        })
    }
}
