/// Text hygiene for anything that ends up inside a reasoning-service prompt.
///
/// NFC-normalizes, then strips C0/C1 control characters (keeping `\t` and `\n`)
/// plus zero-width space/joiner/non-joiner and the byte-order mark.
use std::borrow::Cow;
use std::sync::LazyLock;

use regex::Regex;
use unicode_normalization::UnicodeNormalization;

static STRIPPED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[\x00-\x08\x0B-\x1F\x7F-\x9F\x{200B}-\x{200D}\x{FEFF}]").expect("valid regex")
});

pub fn sanitize(input: &str) -> String {
    let normalized: String = input.nfc().collect();
    let stripped = match STRIPPED.replace_all(&normalized, "") {
        Cow::Borrowed(_) => None,
        Cow::Owned(s) => Some(s),
    };
    match stripped {
        // a removed joiner can leave a base char next to its combining mark
        Some(s) => s.nfc().collect(),
        None => normalized,
    }
}

/// Escape for embedding inside a double-quoted string in the instruction text.
pub fn escape_quoted(input: &str) -> String {
    input.replace('\\', "\\\\").replace('"', "\\\"")
}
