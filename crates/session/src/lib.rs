//! Session stores for ragpilot.

pub mod file;
pub mod in_memory;

pub use file::FileSessionStore;
pub use in_memory::InMemorySessionStore;
