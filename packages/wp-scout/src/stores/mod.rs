//! Result store backends.
//!
//! - `CsvResultStore` - crash-safe `name,domain` file (plus `CsvMissLog`)
//! - `MemoryResultStore` - in-memory, for tests

pub mod csv;
pub mod memory;

pub use self::csv::{CsvMissLog, CsvResultStore, MISS_HEADER, RESULT_HEADER};
pub use memory::MemoryResultStore;
