/// Builds the instruction sent to the reasoning service.
///
/// The field names in [`RESPONSE_SHAPE`] are the contract the resolver's
/// decoder relies on (`resolver::WireIntent`); change both together.
use crate::catalog::Category;
use crate::reasoning::ReasoningRequest;
use crate::sanitize::{escape_quoted, sanitize};

pub const NO_DESCRIPTION: &str = "(no description)";
pub const MIN_CONFIDENCE: u8 = 50;

const DEFAULT_TEMPERATURE: f32 = 0.2;
const FOCUSED_TEMPERATURE: f32 = 0.1;

const RESPONSE_SHAPE: &str = r#"{"intent": "<one sentence>", "reasoning": "<short explanation>", "topMatch": {"category": "<exact name from the list>", "confidence": <0-100>} or null, "closeMatches": [{"category": "<exact name from the list>", "confidence": <0-100>}]}"#;

const ANXIETY: &[&str] = &[
    "worried", "anxious", "concerned", "scared", "afraid", "nervous", "unsure", "confused",
    "don't know", "not sure", "help me", "desperate", "urgent", "asap", "immediately",
    "emergency",
];
const FEAR: &[&str] = &[
    "frightened", "terrified", "fear", "threatened", "danger", "unsafe", "risk", "harm",
];
const DISTRESS: &[&str] = &[
    "missing", "lost", "disappeared", "vanished", "can't find", "cheating", "affair",
    "betrayed", "lied", "lying", "trust", "stealing", "stolen", "fraud", "scam",
];
const URGENCY: &[&str] = &[
    "right away", "today", "tonight", "this week", "quickly", "soon", "now",
];
const DOUBT: &[&str] = &[
    "doubt", "suspicious", "suspect", "uncertain", "question", "wondering", "something wrong",
];
const SENSITIVE_TOPICS: &[&str] = &[
    "missing person", "missing child", "missing kid", "disappeared", "abuse", "domestic",
    "violence", "stalking", "harassment", "cheating", "affair", "infidelity", "betrayal",
    "fraud", "scam", "steal", "theft", "custody", "kidnap",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Intensity {
    Low,
    Medium,
    High,
}

/// Emotional signals in a query. Only shapes the request; never part of a result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmotionalContext {
    pub intensity: Intensity,
    pub signals: Vec<&'static str>,
    pub sensitive: bool,
}

impl EmotionalContext {
    pub fn analyze(query: &str) -> Self {
        let q = query.trim().to_lowercase();

        let mut signals: Vec<&'static str> = Vec::new();
        for signal in [ANXIETY, FEAR, DISTRESS, URGENCY, DOUBT].into_iter().flatten() {
            if q.contains(signal) && !signals.contains(signal) {
                signals.push(*signal);
            }
        }

        let sensitive = SENSITIVE_TOPICS.iter().any(|t| q.contains(t));

        let mut intensity = match signals.len() {
            0 => Intensity::Low,
            1..=3 => Intensity::Medium,
            _ => Intensity::High,
        };
        if sensitive {
            intensity = match intensity {
                Intensity::Low => Intensity::Medium,
                _ => Intensity::High,
            };
        }

        Self {
            intensity,
            signals,
            sensitive,
        }
    }

    pub fn is_emotional(&self) -> bool {
        self.intensity == Intensity::High || self.sensitive
    }
}

/// Render the request for `query` against `catalog`.
///
/// The query and every name/description are sanitized first; the query is then
/// escaped for the quoted slot it occupies in the instruction.
pub fn build(query: &str, catalog: &[Category]) -> ReasoningRequest {
    let query = sanitize(query);
    let emotional = EmotionalContext::analyze(&query);

    let listing = catalog
        .iter()
        .map(|c| {
            let description = c
                .description
                .as_deref()
                .map(sanitize)
                .filter(|d| !d.trim().is_empty())
                .unwrap_or_else(|| NO_DESCRIPTION.to_string());
            format!("\"{}\" - {}", sanitize(&c.name), description.trim())
        })
        .collect::<Vec<_>>()
        .join("\n");

    let guidance = if emotional.is_emotional() {
        "This request carries emotional weight (anxiety, fear, urgency or distress). Be strict:\n\
- choose the most specific category that directly addresses the concern\n\
- avoid broad or generic categories\n\
- if torn between two specific categories, put the second in closeMatches\n\
- if nothing truly fits, return null for topMatch"
    } else {
        "If more than one category could help, list the alternatives in closeMatches."
    };

    let prompt = format!(
        "You route people to the right investigation service.\n\n\
Service categories (use only these exact names):\n{listing}\n\n\
User said: \"{escaped}\"\n\n\
1. State in one sentence what the user actually needs, independent of their wording.\n\
2. Pick the category or categories that best address that need.\n\
3. Give each candidate a confidence from 0 to 100.\n\
4. If no category reaches {MIN_CONFIDENCE}% confidence, set topMatch to null (no match).\n\
5. closeMatches holds at most 3 alternatives, highest confidence first, each below the top match.\n\n\
{guidance}\n\n\
Reply with JSON only, exactly in this shape:\n{RESPONSE_SHAPE}",
        escaped = escape_quoted(&query),
    );

    ReasoningRequest {
        prompt,
        temperature: if emotional.is_emotional() {
            FOCUSED_TEMPERATURE
        } else {
            DEFAULT_TEMPERATURE
        },
        json_only: true,
    }
}
