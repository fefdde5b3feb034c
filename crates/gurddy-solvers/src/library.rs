use std::sync::Arc;

use gurddy_core::{HandlerError, HandlerResolver, ToolHandler};
use serde_json::Value;

use crate::coloring::GraphColoring;
use crate::info::Info;
use crate::queens::NQueens;
use crate::sudoku::Sudoku;
use crate::twenty_four::TwentyFour;

/// Resolves catalog `handler_ref`s to the solvers in this crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct SolverLibrary;

impl HandlerResolver for SolverLibrary {
    fn resolve(&self, handler_ref: &str) -> Option<Arc<dyn ToolHandler>> {
        let handler: Arc<dyn ToolHandler> = match handler_ref {
            "info" => Arc::new(Info),
            "n_queens" => Arc::new(NQueens),
            "graph_coloring" => Arc::new(GraphColoring),
            "sudoku" => Arc::new(Sudoku),
            "twenty_four" => Arc::new(TwentyFour),
            _ => return None,
        };
        Some(handler)
    }
}

/// Run a CPU-bound search off the async worker threads.
pub(crate) async fn blocking<F>(search: F) -> Result<Value, HandlerError>
where
    F: FnOnce() -> Result<Value, HandlerError> + Send + 'static,
{
    tokio::task::spawn_blocking(search)
        .await
        .map_err(|e| HandlerError::Failed(format!("solver task failed: {e}")))?
}
