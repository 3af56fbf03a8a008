//! The question-answering agent.
//!
//! One request runs **retrieve → assemble → complete → persist**:
//!
//! 1. **Snapshot** the session history and measure every turn
//! 2. **Retrieve** candidates for the query
//! 3. **Assemble** a prompt that fits the context window
//! 4. **Complete** with the provider, reserving the response budget
//! 5. **Persist** the question and answer to the session
//!
//! Steps 1–3 are [`QaAgent::prepare`], which never calls the model.

pub mod error;
pub mod qa;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use error::AgentError;
pub use qa::{DEFAULT_SYSTEM_PROMPT, QaAgent, QaAnswer};
