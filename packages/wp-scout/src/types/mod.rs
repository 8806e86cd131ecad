//! Data types for the scout library.

pub mod config;
pub mod record;
pub mod target;
