//! HTTP and stdio front-ends for the gurddy MCP server, plus the offline
//! consistency check.

use std::sync::Arc;

use gurddy_mcp::{Dispatcher, RegistryError, ServerIdentity, ToolRegistry};
use gurddy_solvers::{SolverLibrary, TOOLS};

pub mod app_state;
pub mod handlers;
pub mod router;
pub mod session;
pub mod stdio;
pub mod verify;

/// Name announced in `serverInfo`.
pub const SERVER_NAME: &str = "gurddy-mcp";

/// Build the registry from the static catalog and wrap it in a dispatcher.
pub fn build_dispatcher() -> Result<Arc<Dispatcher>, RegistryError> {
    let registry = ToolRegistry::build(TOOLS, &SolverLibrary)?;
    tracing::info!(tools = registry.len(), "tool registry ready");
    Ok(Arc::new(Dispatcher::new(
        Arc::new(registry),
        ServerIdentity::new(SERVER_NAME, env!("CARGO_PKG_VERSION")),
    )))
}
