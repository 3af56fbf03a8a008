//! LLM provider implementations for ragpilot.
//!
//! Every provider implements `ragpilot_core::Provider`; the router builds
//! them from configuration.

pub mod openai_compat;
pub mod router;

pub use openai_compat::OpenAiCompatProvider;
pub use router::{ProviderRouter, build_from_config, default_base_url, resolve_model};
