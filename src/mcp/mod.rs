// MCP (Model Context Protocol) Server for eSewa
//
// Exposes the payment tools over line-delimited JSON-RPC on stdio.

pub mod protocol;
pub mod server;
pub mod tools;

pub use server::MCPServer;
pub use tools::{dispatch, tool_catalog, ToolOutput};
