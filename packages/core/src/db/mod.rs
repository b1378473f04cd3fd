//! Content Backend Layer
//!
//! - [`ContentBackend`] - the async seam the search services query through
//! - [`MemoryStore`] - in-process outline graph with a Datalog evaluator
//! - [`BackendError`] - failures raised while parsing or evaluating queries

mod content_backend;
pub mod datalog;
pub mod edn;
mod error;
mod memory_store;

pub use content_backend::{ContentBackend, Tuple};
pub use error::BackendError;
pub use memory_store::{extract_refs, ExtractedRefs, MemoryStore, OutlineNode, OutlinePage};
