//! Notarium MCP Server
//!
//! Model Context Protocol server exposing the vault index to AI assistants
//! over stdio.

mod protocol;
mod server;
mod tools;

pub use server::{start_server, McpServer};
