/// Error types shared by the category matching crates.
///
/// Resolution itself never fails outward: every failure inside the resolver is
/// folded into a degraded `IntentResult` whose `reasoning` starts with
/// `error: <class>: `. `FailureClass` is the parseable form of that prefix.
use std::fmt;

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("category {index} has an empty name")]
    EmptyName { index: usize },

    #[error("duplicate category name: {0}")]
    DuplicateName(String),

    #[error("invalid catalog document: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Machine-readable class of a degraded resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    NotConfigured,
    EmptyCatalog,
    Timeout,
    Network,
    UpstreamStatus(u16),
    UpstreamError,
    MalformedResponse,
    Cancelled,
}

pub const ERROR_PREFIX: &str = "error: ";

impl FailureClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureClass::NotConfigured => "not_configured",
            FailureClass::EmptyCatalog => "empty_catalog",
            FailureClass::Timeout => "timeout",
            FailureClass::Network => "network",
            FailureClass::UpstreamStatus(_) => "upstream_status",
            FailureClass::UpstreamError => "upstream_error",
            FailureClass::MalformedResponse => "malformed_response",
            FailureClass::Cancelled => "cancelled",
        }
    }

    /// Render the `reasoning` text of a degraded result.
    pub fn describe(&self, detail: &str) -> String {
        match self {
            FailureClass::UpstreamStatus(status) => {
                format!("{ERROR_PREFIX}{}: {status}: {detail}", self.as_str())
            }
            _ => format!("{ERROR_PREFIX}{}: {detail}", self.as_str()),
        }
    }

    /// Recover the class from a `reasoning` string. `None` means the text is a
    /// regular (non-error) explanation.
    pub fn from_reasoning(reasoning: &str) -> Option<Self> {
        let rest = reasoning.strip_prefix(ERROR_PREFIX)?;
        let (class, detail) = rest.split_once(": ").unwrap_or((rest, ""));
        let parsed = match class {
            "not_configured" => FailureClass::NotConfigured,
            "empty_catalog" => FailureClass::EmptyCatalog,
            "timeout" => FailureClass::Timeout,
            "network" => FailureClass::Network,
            "upstream_status" => {
                let code = detail.split(':').next()?.trim().parse().ok()?;
                FailureClass::UpstreamStatus(code)
            }
            "upstream_error" => FailureClass::UpstreamError,
            "malformed_response" => FailureClass::MalformedResponse,
            "cancelled" => FailureClass::Cancelled,
            _ => return None,
        };
        Some(parsed)
    }

    /// Worth retrying at the call site: timeouts, network failures and 5xx.
    /// Never 4xx, parse or validation failures.
    pub fn is_transient(&self) -> bool {
        match self {
            FailureClass::Timeout | FailureClass::Network => true,
            FailureClass::UpstreamStatus(status) => (500..600).contains(status),
            _ => false,
        }
    }
}

/// Short label, e.g. `timeout` or `upstream_status:503`.
impl fmt::Display for FailureClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureClass::UpstreamStatus(status) => write!(f, "{}:{status}", self.as_str()),
            _ => f.write_str(self.as_str()),
        }
    }
}
