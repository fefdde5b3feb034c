use std::collections::HashMap;
use std::sync::Arc;

use gurddy_core::{HandlerResolver, ToolDecl, ToolHandler};
use serde::Serialize;

use crate::error::McpError;
use crate::schema::InputSchema;

/// Definition of an MCP tool exposed to callers.
///
/// Serializes to the `{name, description, inputSchema}` projection used by
/// `tools/list`; `category` and `handler_ref` stay server-side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    #[serde(skip)]
    pub category: String,
    #[serde(rename = "inputSchema")]
    pub input_schema: InputSchema,
    #[serde(skip)]
    pub handler_ref: String,
}

impl ToolDefinition {
    #[must_use]
    pub fn from_decl(decl: &ToolDecl) -> Self {
        Self {
            name: decl.name.to_string(),
            description: decl.description.to_string(),
            category: decl.category.to_string(),
            input_schema: InputSchema::from_decls(decl.params),
            handler_ref: decl.handler_ref.to_string(),
        }
    }
}

/// A tool definition together with its resolved handler.
#[derive(Clone)]
pub struct RegisteredTool {
    pub definition: ToolDefinition,
    pub handler: Arc<dyn ToolHandler>,
}

impl std::fmt::Debug for RegisteredTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisteredTool")
            .field("definition", &self.definition)
            .finish_non_exhaustive()
    }
}

/// Startup failures that leave the registry unusable.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("duplicate tool name: {0}")]
    DuplicateName(String),

    #[error("tool '{tool}' references unknown handler '{handler_ref}'")]
    UnresolvedHandler { tool: String, handler_ref: String },
}

/// Immutable catalog of every tool the server exposes.
///
/// Built once at startup and shared by reference; nothing mutates it
/// afterwards.
#[derive(Debug, Default)]
pub struct ToolRegistry {
    tools: Vec<RegisteredTool>,
    index: HashMap<String, usize>,
}

impl ToolRegistry {
    /// Build the registry from static declarations, resolving every handler.
    pub fn build(
        decls: &[ToolDecl],
        resolver: &dyn HandlerResolver,
    ) -> Result<Self, RegistryError> {
        let mut tools = Vec::with_capacity(decls.len());
        let mut index = HashMap::with_capacity(decls.len());

        for decl in decls {
            let definition = ToolDefinition::from_decl(decl);

            let handler = resolver.resolve(decl.handler_ref).ok_or_else(|| {
                RegistryError::UnresolvedHandler {
                    tool: decl.name.to_string(),
                    handler_ref: decl.handler_ref.to_string(),
                }
            })?;

            if index.insert(definition.name.clone(), tools.len()).is_some() {
                return Err(RegistryError::DuplicateName(definition.name));
            }
            tools.push(RegisteredTool {
                definition,
                handler,
            });
        }

        tracing::debug!(count = tools.len(), "tool registry built");
        Ok(Self { tools, index })
    }

    /// Exact-match lookup by tool name.
    pub fn lookup(&self, name: &str) -> Result<&RegisteredTool, McpError> {
        self.index
            .get(name)
            .and_then(|&i| self.tools.get(i))
            .ok_or_else(|| McpError::ToolNotFound(name.to_string()))
    }

    /// Definitions in declaration order.
    pub fn list(&self) -> impl Iterator<Item = &ToolDefinition> {
        self.tools.iter().map(|t| &t.definition)
    }

    pub fn tools(&self) -> impl Iterator<Item = &RegisteredTool> {
        self.tools.iter()
    }

    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.list().map(|d| d.name.as_str()).collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Distinct categories in order of first appearance.
    #[must_use]
    pub fn categories(&self) -> Vec<&str> {
        let mut seen = Vec::new();
        for def in self.list() {
            if !seen.contains(&def.category.as_str()) {
                seen.push(def.category.as_str());
            }
        }
        seen
    }

    pub fn by_category<'a>(
        &'a self,
        category: &'a str,
    ) -> impl Iterator<Item = &'a ToolDefinition> {
        self.list().filter(move |d| d.category == category)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use async_trait::async_trait;
    use gurddy_core::{Arguments, HandlerError, HandlerParam, ParamDecl, ParamType};
    use serde_json::Value;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Handler that counts invocations and echoes its arguments.
    pub struct CountingHandler {
        pub params: &'static [HandlerParam],
        pub calls: AtomicUsize,
        pub fail: bool,
    }

    impl CountingHandler {
        pub fn new(params: &'static [HandlerParam]) -> Arc<Self> {
            Arc::new(Self {
                params,
                calls: AtomicUsize::new(0),
                fail: false,
            })
        }

        pub fn failing(params: &'static [HandlerParam]) -> Arc<Self> {
            Arc::new(Self {
                params,
                calls: AtomicUsize::new(0),
                fail: true,
            })
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ToolHandler for CountingHandler {
        fn parameters(&self) -> &'static [HandlerParam] {
            self.params
        }

        async fn invoke(&self, args: Arguments) -> Result<Value, HandlerError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(HandlerError::Failed("no solution in budget".into()));
            }
            Ok(serde_json::json!({ "success": true, "echo": Value::Object(args.into_inner()) }))
        }
    }

    /// Resolver over a fixed `handler_ref -> handler` table.
    #[derive(Default)]
    pub struct StubResolver(pub HashMap<&'static str, Arc<dyn ToolHandler>>);

    impl StubResolver {
        pub fn with(mut self, handler_ref: &'static str, handler: Arc<dyn ToolHandler>) -> Self {
            self.0.insert(handler_ref, handler);
            self
        }
    }

    impl HandlerResolver for StubResolver {
        fn resolve(&self, handler_ref: &str) -> Option<Arc<dyn ToolHandler>> {
            self.0.get(handler_ref).cloned()
        }
    }

    pub const QUEENS_PARAMS: &[HandlerParam] = &[HandlerParam::optional("n", ParamType::Integer)];

    pub const COLORING_PARAMS: &[HandlerParam] = &[
        HandlerParam::required("edges", ParamType::Array(&ParamType::Array(&ParamType::Integer))),
        HandlerParam::required("num_vertices", ParamType::Integer),
        HandlerParam::optional("max_colors", ParamType::Integer),
    ];

    pub const DECLS: &[ToolDecl] = &[
        ToolDecl {
            name: "solve_n_queens",
            description: "Place N queens on an NxN board.",
            category: "classic",
            handler_ref: "queens",
            params: &[ParamDecl {
                name: "n",
                ty: ParamType::Integer,
                required: false,
                description: "Board size",
            }],
        },
        ToolDecl {
            name: "solve_graph_coloring",
            description: "Color a graph's vertices.",
            category: "graph",
            handler_ref: "coloring",
            params: &[
                ParamDecl {
                    name: "edges",
                    ty: ParamType::Array(&ParamType::Array(&ParamType::Integer)),
                    required: true,
                    description: "Edges as vertex pairs",
                },
                ParamDecl {
                    name: "num_vertices",
                    ty: ParamType::Integer,
                    required: true,
                    description: "Number of vertices",
                },
                ParamDecl {
                    name: "max_colors",
                    ty: ParamType::Integer,
                    required: false,
                    description: "Maximum colors",
                },
            ],
        },
        ToolDecl {
            name: "info",
            description: "Package information.",
            category: "classic",
            handler_ref: "info",
            params: &[],
        },
    ];

    pub fn resolver() -> StubResolver {
        StubResolver::default()
            .with("queens", CountingHandler::new(QUEENS_PARAMS))
            .with("coloring", CountingHandler::new(COLORING_PARAMS))
            .with("info", CountingHandler::new(&[]))
    }

    pub fn registry() -> ToolRegistry {
        ToolRegistry::build(DECLS, &resolver()).unwrap()
    }

    #[test]
    fn all_tools_defined() {
        let registry = registry();
        assert_eq!(
            registry.names(),
            vec!["solve_n_queens", "solve_graph_coloring", "info"]
        );
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn tools_serialize_without_server_side_fields() {
        let registry = registry();
        let tools: Vec<&ToolDefinition> = registry.list().collect();
        let json = serde_json::to_value(&tools).unwrap();

        let first = json[0].as_object().unwrap();
        let mut keys: Vec<&str> = first.keys().map(String::as_str).collect();
        keys.sort_unstable();
        assert_eq!(keys, vec!["description", "inputSchema", "name"]);
    }

    #[test]
    fn coloring_has_required_params() {
        let registry = registry();
        let coloring = registry.lookup("solve_graph_coloring").unwrap();
        assert_eq!(
            coloring.definition.input_schema.required(),
            ["edges".to_string(), "num_vertices".to_string()]
        );
    }

    #[test]
    fn lookup_is_exact() {
        let registry = registry();
        for name in registry.names() {
            assert_eq!(registry.lookup(name).unwrap().definition.name, name);
        }
        for miss in ["Solve_N_Queens", " info", "info ", "", "nonexistent_tool"] {
            assert_eq!(
                registry.lookup(miss).unwrap_err(),
                McpError::ToolNotFound(miss.to_string())
            );
        }
    }

    #[test]
    fn list_is_stable() {
        let registry = registry();
        let first: Vec<ToolDefinition> = registry.list().cloned().collect();
        let second: Vec<ToolDefinition> = registry.list().cloned().collect();
        assert_eq!(first, second);
    }

    #[test]
    fn categories_in_first_appearance_order() {
        let registry = registry();
        assert_eq!(registry.categories(), vec!["classic", "graph"]);
        let classic: Vec<&str> = registry
            .by_category("classic")
            .map(|d| d.name.as_str())
            .collect();
        assert_eq!(classic, vec!["solve_n_queens", "info"]);
    }

    #[test]
    fn unresolved_handler_fails_build() {
        let partial = StubResolver::default().with("queens", CountingHandler::new(QUEENS_PARAMS));
        let err = ToolRegistry::build(DECLS, &partial).unwrap_err();
        assert_eq!(
            err,
            RegistryError::UnresolvedHandler {
                tool: "solve_graph_coloring".into(),
                handler_ref: "coloring".into(),
            }
        );
    }

    #[test]
    fn duplicate_name_fails_build() {
        let doubled = [DECLS[0], DECLS[0]];
        let err = ToolRegistry::build(&doubled, &resolver()).unwrap_err();
        assert_eq!(err, RegistryError::DuplicateName("solve_n_queens".into()));
    }
}
