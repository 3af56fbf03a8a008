pub mod ask;
pub mod chat;
pub mod config_cmd;
pub mod context;
pub mod index;
pub mod session;
