//! Core trait abstractions for the scout library.
//!
//! These traits are the seams the crawl engine is tested through: the HTTP
//! transport and the durable result store.

pub mod store;
pub mod transport;
