use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::args::Arguments;
use crate::error::HandlerError;
use crate::types::HandlerParam;

/// An external function backing one tool.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    /// Formal parameters in declaration order. Parameters with a default
    /// value are optional for callers.
    fn parameters(&self) -> &'static [HandlerParam];

    /// Run the handler on arguments that already passed schema validation.
    async fn invoke(&self, args: Arguments) -> Result<Value, HandlerError>;
}

/// Resolves the `handlerRef` of a tool declaration to a handler.
pub trait HandlerResolver: Send + Sync {
    fn resolve(&self, handler_ref: &str) -> Option<Arc<dyn ToolHandler>>;
}
