use category_match::error::CatalogError;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("config error: {0}")]
    Config(String),

    #[error("catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("failed to read catalog {path}: {source}")]
    CatalogIo {
        path: String,
        source: std::io::Error,
    },
}
