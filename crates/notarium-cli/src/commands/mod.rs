//! Command implementations

pub mod chat;
pub mod ingest;
pub mod init;
pub mod search;
pub mod status;
