/// Catalog types and the membership gate applied to reasoning-service output.
use std::collections::HashSet;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::CatalogError;
use crate::sanitize::sanitize;

/// A selectable search category, owned by the catalog provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Category {
    /// Opaque unique identifier.
    pub id: String,
    /// Unique, non-empty display name; the key every result refers to.
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

impl Category {
    pub fn new(id: impl Into<String>, name: impl Into<String>, description: Option<&str>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: description.map(str::to_string),
        }
    }
}

/// Parse a JSON array of categories, rejecting empty or duplicate names.
///
/// Names are compared case-insensitively after trimming, since that is how the
/// validator matches them.
pub fn parse_catalog(json: &str) -> Result<Vec<Category>, CatalogError> {
    let categories: Vec<Category> = serde_json::from_str(json)?;
    let mut seen = HashSet::new();
    for (index, category) in categories.iter().enumerate() {
        let key = fold(&category.name);
        if key.is_empty() {
            return Err(CatalogError::EmptyName { index });
        }
        if !seen.insert(key) {
            return Err(CatalogError::DuplicateName(category.name.clone()));
        }
    }
    Ok(categories)
}

/// True iff some catalog name equals `candidate`, case-insensitively after trimming.
pub fn is_known_category(catalog: &[Category], candidate: &str) -> bool {
    let wanted = fold(candidate);
    !wanted.is_empty() && catalog.iter().any(|c| fold(&c.name) == wanted)
}

/// The catalog's own spelling of `candidate`.
///
/// The reasoning service only ever sees sanitized names, so a name that carried
/// invisible characters comes back without them; both forms are accepted.
pub fn canonical_name<'a>(catalog: &'a [Category], candidate: &str) -> Option<&'a str> {
    let wanted = fold(candidate);
    if wanted.is_empty() {
        return None;
    }
    catalog
        .iter()
        .find(|c| fold(&c.name) == wanted)
        .or_else(|| catalog.iter().find(|c| fold(&sanitize(&c.name)) == wanted))
        .map(|c| c.name.as_str())
}

fn fold(name: &str) -> String {
    name.trim().to_lowercase()
}
