//! # ragpilot Core
//!
//! Domain types, capability traits, and error definitions for ragpilot.
//! This crate has **no framework dependencies**: it defines the domain model
//! that every other crate implements against.
//!
//! The context-assembly core (`ragpilot-context`) only ever talks to the
//! capabilities defined here:
//! - [`TokenCounter`]: token cost of a text span
//! - [`Retriever`]: relevance-ranked candidates for a query
//! - [`SpanScorer`]: best contiguous sub-span of a text under a token cap
//! - [`SessionStore`]: read access to the conversation history
//!
//! Concrete implementations live in their own crates and are injected
//! explicitly, never reached through globals.

pub mod error;
pub mod message;
pub mod provider;
pub mod retrieval;
pub mod session;
pub mod token;

// Re-export key types at crate root for ergonomics
pub use error::{Error, Result};
pub use message::{Message, Role, Session, SessionId};
pub use provider::{Provider, ProviderRequest, ProviderResponse, StreamChunk};
pub use retrieval::{RetrievedCandidate, Retriever, Span, SpanScorer};
pub use session::SessionStore;
pub use token::TokenCounter;
