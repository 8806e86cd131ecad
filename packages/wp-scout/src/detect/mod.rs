//! WordPress detection: body fingerprints and the name relevance gate.

pub mod relevance;
pub mod signature;

pub use relevance::{is_relevant, tokenize};
pub use signature::{SignatureMatcher, DEFAULT_FINGERPRINTS};
