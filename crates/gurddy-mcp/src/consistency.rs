//! Offline checks that declared schemas agree with the handlers behind them
//! and with the tools each front-end actually serves.
//!
//! Nothing here runs while serving requests. The `verify` entry point turns
//! a non-empty [`ConsistencyReport`] into a failing exit status.

use std::collections::BTreeSet;
use std::fmt;

use gurddy_core::{HandlerParam, ParamType};
use serde::Deserialize;
use serde_json::Value;

use crate::schema::InputSchema;
use crate::tools::{ToolDefinition, ToolRegistry};

/// A parameter whose schema type and handler type disagree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeMismatch {
    pub param: String,
    pub schema: ParamType,
    pub handler: ParamType,
}

/// Disagreements between one tool's schema and its handler.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolMismatch {
    pub tool: String,
    /// Handler parameters absent from `properties`.
    pub missing_in_schema: BTreeSet<String>,
    /// Properties the handler does not accept.
    pub extra_in_schema: BTreeSet<String>,
    /// Handler parameters without a default that the schema leaves optional.
    pub required_not_declared: BTreeSet<String>,
    /// Schema-required properties the handler treats as optional.
    pub required_but_defaulted: BTreeSet<String>,
    pub type_mismatches: Vec<TypeMismatch>,
}

impl ToolMismatch {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.missing_in_schema.is_empty()
            && self.extra_in_schema.is_empty()
            && self.required_not_declared.is_empty()
            && self.required_but_defaulted.is_empty()
            && self.type_mismatches.is_empty()
    }
}

/// One entry of a front-end's `tools/list` answer.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ListedTool {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "inputSchema", default)]
    pub input_schema: Value,
}

/// The tools one front-end reports serving.
#[derive(Debug, Clone, PartialEq)]
pub struct SurfaceListing {
    pub surface: String,
    pub tools: Vec<ListedTool>,
}

impl SurfaceListing {
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tools.iter().map(|t| t.name.as_str())
    }
}

/// A served tool whose listing differs from its registry definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefinitionDrift {
    pub tool: String,
    pub description: bool,
    pub input_schema: bool,
}

/// A front-end whose tools differ from the registry's.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SurfaceMismatch {
    pub surface: String,
    pub missing: BTreeSet<String>,
    pub unexpected: BTreeSet<String>,
    pub drifted: Vec<DefinitionDrift>,
}

impl SurfaceMismatch {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.missing.is_empty() && self.unexpected.is_empty() && self.drifted.is_empty()
    }
}

/// Everything the validator found. Empty means consistent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConsistencyReport {
    pub tools: Vec<ToolMismatch>,
    pub surfaces: Vec<SurfaceMismatch>,
}

impl ConsistencyReport {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty() && self.surfaces.is_empty()
    }
}

/// Compare one schema against a handler's parameter descriptor.
#[must_use]
pub fn check_tool(tool: &str, schema: &InputSchema, params: &[HandlerParam]) -> ToolMismatch {
    let handler_names: BTreeSet<&str> = params.iter().map(|p| p.name).collect();

    let mut mismatch = ToolMismatch {
        tool: tool.to_string(),
        ..ToolMismatch::default()
    };

    for param in params {
        match schema.property(param.name) {
            None => {
                mismatch.missing_in_schema.insert(param.name.to_string());
            }
            Some(property) if property.ty != param.ty => {
                mismatch.type_mismatches.push(TypeMismatch {
                    param: param.name.to_string(),
                    schema: property.ty,
                    handler: param.ty,
                });
            }
            Some(_) => {}
        }

        let declared_required = schema.is_required(param.name);
        if !param.has_default && !declared_required {
            mismatch.required_not_declared.insert(param.name.to_string());
        }
        if param.has_default && declared_required {
            mismatch.required_but_defaulted.insert(param.name.to_string());
        }
    }

    for (name, _) in schema.properties() {
        if !handler_names.contains(name) {
            mismatch.extra_in_schema.insert(name.to_string());
        }
    }

    mismatch
}

/// Check every registered tool against its resolved handler.
#[must_use]
pub fn check_registry(registry: &ToolRegistry) -> Vec<ToolMismatch> {
    registry
        .tools()
        .map(|t| {
            check_tool(
                &t.definition.name,
                &t.definition.input_schema,
                t.handler.parameters(),
            )
        })
        .filter(|m| !m.is_empty())
        .collect()
}

/// Check that every front-end serves exactly the registry's tools, each
/// with the registry's description and input schema.
#[must_use]
pub fn check_surfaces(
    registry: &ToolRegistry,
    listings: &[SurfaceListing],
) -> Vec<SurfaceMismatch> {
    let expected: BTreeSet<&str> = registry.names().into_iter().collect();

    listings
        .iter()
        .map(|listing| {
            let served: BTreeSet<&str> = listing.names().collect();
            let drifted = listing
                .tools
                .iter()
                .filter_map(|listed| {
                    let tool = registry.lookup(&listed.name).ok()?;
                    definition_drift(&tool.definition, listed)
                })
                .collect();
            SurfaceMismatch {
                surface: listing.surface.clone(),
                missing: expected
                    .difference(&served)
                    .map(|s| (*s).to_string())
                    .collect(),
                unexpected: served
                    .difference(&expected)
                    .map(|s| (*s).to_string())
                    .collect(),
                drifted,
            }
        })
        .filter(|m| !m.is_empty())
        .collect()
}

fn definition_drift(definition: &ToolDefinition, listed: &ListedTool) -> Option<DefinitionDrift> {
    let description = definition.description != listed.description;
    let input_schema = serde_json::to_value(&definition.input_schema)
        .map_or(true, |schema| schema != listed.input_schema);
    (description || input_schema).then(|| DefinitionDrift {
        tool: listed.name.clone(),
        description,
        input_schema,
    })
}

/// Run every check.
#[must_use]
pub fn validate(registry: &ToolRegistry, listings: &[SurfaceListing]) -> ConsistencyReport {
    ConsistencyReport {
        tools: check_registry(registry),
        surfaces: check_surfaces(registry, listings),
    }
}

fn join(set: &BTreeSet<String>) -> String {
    set.iter().map(String::as_str).collect::<Vec<_>>().join(", ")
}

impl fmt::Display for ToolMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "tool {}:", self.tool)?;
        if !self.missing_in_schema.is_empty() {
            writeln!(f, "  missing in schema: {}", join(&self.missing_in_schema))?;
        }
        if !self.extra_in_schema.is_empty() {
            writeln!(f, "  extra in schema: {}", join(&self.extra_in_schema))?;
        }
        if !self.required_not_declared.is_empty() {
            writeln!(
                f,
                "  required by handler, optional in schema: {}",
                join(&self.required_not_declared)
            )?;
        }
        if !self.required_but_defaulted.is_empty() {
            writeln!(
                f,
                "  required in schema, defaulted by handler: {}",
                join(&self.required_but_defaulted)
            )?;
        }
        for t in &self.type_mismatches {
            writeln!(
                f,
                "  type of '{}': schema {} vs handler {}",
                t.param, t.schema, t.handler
            )?;
        }
        Ok(())
    }
}

impl fmt::Display for ConsistencyReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return writeln!(f, "all tool schemas and front-ends are consistent");
        }
        for tool in &self.tools {
            write!(f, "{tool}")?;
        }
        for surface in &self.surfaces {
            writeln!(f, "front-end {}:", surface.surface)?;
            if !surface.missing.is_empty() {
                writeln!(f, "  missing tools: {}", join(&surface.missing))?;
            }
            if !surface.unexpected.is_empty() {
                writeln!(f, "  unexpected tools: {}", join(&surface.unexpected))?;
            }
            for drift in &surface.drifted {
                if drift.description {
                    writeln!(f, "  {}: description differs", drift.tool)?;
                }
                if drift.input_schema {
                    writeln!(f, "  {}: inputSchema differs", drift.tool)?;
                }
            }
        }
        Ok(())
    }
}
