pub mod catalog;
pub mod edit_distance;
pub mod error;
pub mod fuzzy;
pub mod mcp_api;
pub mod prompt;
pub mod reasoning;
pub mod resolver;
pub mod retry;
pub mod sanitize;
pub mod smart_search;
