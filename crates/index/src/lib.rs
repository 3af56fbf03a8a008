//! # ragpilot Index
//!
//! Builds a line-chunked index of a project's text files and serves keyword
//! retrieval over it. The index is plain JSON (`.ragpilot/index.json` by
//! default); rebuilding reuses chunks of files whose SHA-256 is unchanged.

pub mod builder;
pub mod chunk;
pub mod retriever;
pub mod store;

pub use builder::{IndexBuilder, IndexStats};
pub use chunk::{Chunk, keywords, split_into_chunks};
pub use retriever::{KeywordRetriever, render_chunk};
pub use store::{FileEntry, ProjectIndex};
