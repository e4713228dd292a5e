//! Pure domain logic for the skin/hair analysis engine.
//!
//! Nothing in this crate performs I/O: it defines the request and report
//! types, the per-kind field schemas and prompts, response extraction and
//! validation, multi-image aggregation, and the fallback report generator.

pub mod aggregation;
pub mod credential;
pub mod error;
pub mod extract;
pub mod fallback;
pub mod hashing;
pub mod prompt;
pub mod report;
pub mod request;
pub mod schema;
pub mod types;
pub mod validation;
