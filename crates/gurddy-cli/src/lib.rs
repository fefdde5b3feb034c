//! HTTP client for the gurddy MCP server.

pub mod client;

pub use client::McpClient;
