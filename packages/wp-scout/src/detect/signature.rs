//! WordPress fingerprints.
//!
//! Pure functions over a response body: no network, no state.

use regex::{RegexSet, RegexSetBuilder};
use serde_json::Value;

/// Body patterns that are strong evidence of WordPress (case-insensitive).
pub const DEFAULT_FINGERPRINTS: &[&str] = &[
    r"/wp-content/",
    r"/wp-includes/",
    r"wp-json",
    r#"<meta[^>]+name=["']generator["'][^>]+content=["']wordpress"#,
    r"wp_enqueue_script",
    r"wp-embed",
    r"powered by wordpress",
    r"<generator>https?://wordpress\.org",
];

/// Regex-set matcher for WordPress fingerprints.
#[derive(Debug, Clone)]
pub struct SignatureMatcher {
    set: RegexSet,
    patterns: Vec<String>,
}

impl Default for SignatureMatcher {
    fn default() -> Self {
        Self::new(DEFAULT_FINGERPRINTS).expect("default fingerprints are valid regexes")
    }
}

impl SignatureMatcher {
    /// Compile a fingerprint set. Matching is case-insensitive.
    pub fn new<I, S>(patterns: I) -> Result<Self, regex::Error>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let patterns: Vec<String> = patterns.into_iter().map(|p| p.as_ref().to_string()).collect();
        let set = RegexSetBuilder::new(&patterns)
            .case_insensitive(true)
            .build()?;
        Ok(Self { set, patterns })
    }

    /// The first fingerprint (in table order) found in `body`.
    pub fn find(&self, body: &str) -> Option<&str> {
        self.set
            .matches(body)
            .iter()
            .next()
            .map(|idx| self.patterns[idx].as_str())
    }

    /// True if any fingerprint occurs in `body`.
    pub fn is_match(&self, body: &str) -> bool {
        self.set.is_match(body)
    }
}

/// Content types whose bodies are worth scanning (HTML, XML feeds, plain text).
pub fn is_textual(mime: Option<&str>) -> bool {
    match mime {
        Some(mime) => {
            mime.starts_with("text/") || mime.ends_with("+xml") || mime.ends_with("/xml")
        }
        None => false,
    }
}

/// Parse a REST introspection response.
///
/// Requires a JSON content type and a body that parses as an object or array.
pub fn parse_rest_body(mime: Option<&str>, body: &str) -> Option<Value> {
    let mime = mime?;
    if !(mime == "application/json" || mime.ends_with("+json")) {
        return None;
    }
    let trimmed = body.trim_start();
    if !(trimmed.starts_with('{') || trimmed.starts_with('[')) {
        return None;
    }
    match serde_json::from_str::<Value>(trimmed) {
        Ok(value @ (Value::Object(_) | Value::Array(_))) => Some(value),
        _ => None,
    }
}

/// The site name advertised by a REST root document (`{"name": ...}`).
pub fn rest_site_name(value: &Value) -> Option<&str> {
    value
        .get("name")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|name| !name.is_empty())
}
