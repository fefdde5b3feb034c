use async_trait::async_trait;
use gurddy_core::{Arguments, HandlerError, HandlerParam, ToolHandler};
use serde_json::{json, Value};

use crate::catalog::TOOLS;

/// Describes the solver package.
#[derive(Debug, Clone, Copy)]
pub struct Info;

#[async_trait]
impl ToolHandler for Info {
    fn parameters(&self) -> &'static [HandlerParam] {
        &[]
    }

    async fn invoke(&self, _args: Arguments) -> Result<Value, HandlerError> {
        let tools: Vec<Value> = TOOLS
            .iter()
            .map(|t| {
                json!({
                    "name": t.name,
                    "category": t.category,
                    "description": t.description,
                })
            })
            .collect();

        Ok(json!({
            "success": true,
            "package": env!("CARGO_PKG_NAME"),
            "version": env!("CARGO_PKG_VERSION"),
            "tools": tools,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn lists_every_tool() {
        let out = Info.invoke(Arguments::default()).await.unwrap();
        assert_eq!(out["success"], true);
        assert_eq!(out["package"], "gurddy-solvers");
        assert_eq!(out["tools"].as_array().unwrap().len(), TOOLS.len());
    }
}
