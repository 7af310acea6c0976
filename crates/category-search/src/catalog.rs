/// File-backed catalog provider.
///
/// The file is read on every call so edits show up without a restart; nothing
/// is cached between calls.
use std::path::PathBuf;

use tracing::debug;

use category_match::catalog::{parse_catalog, Category};

use crate::error::AppError;

#[derive(Debug, Clone)]
pub struct CatalogSource {
    path: PathBuf,
}

impl CatalogSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub async fn load(&self) -> Result<Vec<Category>, AppError> {
        let raw = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|source| AppError::CatalogIo {
                path: self.path.display().to_string(),
                source,
            })?;
        let categories = parse_catalog(&raw)?;
        debug!(count = categories.len(), "catalog loaded");
        Ok(categories)
    }
}
