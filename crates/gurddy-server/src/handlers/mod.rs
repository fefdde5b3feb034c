mod health;
mod mcp;

pub use health::health;
pub use mcp::{mcp_close, mcp_request, server_info, SESSION_HEADER};
