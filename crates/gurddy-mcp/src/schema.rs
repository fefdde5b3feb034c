use gurddy_core::{Arguments, ParamDecl, ParamType};
use serde::ser::{SerializeMap, SerializeStruct};
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};

use crate::error::McpError;

/// One entry of an input schema's `properties`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertySchema {
    pub ty: ParamType,
    pub description: String,
}

impl Serialize for PropertySchema {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut fragment = self.ty.to_schema();
        if let Value::Object(map) = &mut fragment {
            map.insert(
                "description".to_string(),
                Value::String(self.description.clone()),
            );
        }
        fragment.serialize(serializer)
    }
}

/// Object schema describing a tool's arguments.
///
/// Built from parameter declarations, so `required` is always a subset of
/// `properties`. Properties keep their declaration order when serialized.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InputSchema {
    properties: Vec<(String, PropertySchema)>,
    required: Vec<String>,
}

impl InputSchema {
    #[must_use]
    pub fn from_decls(decls: &[ParamDecl]) -> Self {
        let properties = decls
            .iter()
            .map(|d| {
                (
                    d.name.to_string(),
                    PropertySchema {
                        ty: d.ty,
                        description: d.description.to_string(),
                    },
                )
            })
            .collect();
        let required = decls
            .iter()
            .filter(|d| d.required)
            .map(|d| d.name.to_string())
            .collect();
        Self {
            properties,
            required,
        }
    }

    pub fn properties(&self) -> impl Iterator<Item = (&str, &PropertySchema)> {
        self.properties.iter().map(|(name, p)| (name.as_str(), p))
    }

    #[must_use]
    pub fn property(&self, name: &str) -> Option<&PropertySchema> {
        self.properties
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, p)| p)
    }

    #[must_use]
    pub fn required(&self) -> &[String] {
        &self.required
    }

    #[must_use]
    pub fn is_required(&self, name: &str) -> bool {
        self.required.iter().any(|r| r == name)
    }

    /// Check `arguments` against the schema.
    ///
    /// Absent or `null` arguments count as an empty object.
    pub fn validate(&self, arguments: Option<Value>) -> Result<Arguments, ArgumentError> {
        let map = match arguments {
            None | Some(Value::Null) => Map::new(),
            Some(Value::Object(map)) => map,
            Some(_) => return Err(ArgumentError::NotAnObject),
        };

        let missing: Vec<String> = self
            .required
            .iter()
            .filter(|name| !map.contains_key(name.as_str()))
            .cloned()
            .collect();
        if !missing.is_empty() {
            return Err(ArgumentError::MissingRequired(missing));
        }

        for (name, value) in &map {
            let Some(property) = self.property(name) else {
                return Err(ArgumentError::Unexpected(name.clone()));
            };
            if !property.ty.matches(value) {
                return Err(ArgumentError::WrongType {
                    name: name.clone(),
                    expected: property.ty,
                });
            }
        }

        Ok(Arguments::new(map))
    }
}

struct Properties<'a>(&'a [(String, PropertySchema)]);

impl Serialize for Properties<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (name, property) in self.0 {
            map.serialize_entry(name, property)?;
        }
        map.end()
    }
}

impl Serialize for InputSchema {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("InputSchema", 3)?;
        state.serialize_field("type", "object")?;
        state.serialize_field("properties", &Properties(&self.properties))?;
        state.serialize_field("required", &self.required)?;
        state.end()
    }
}

/// Why a `tools/call` argument object was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ArgumentError {
    #[error("arguments must be an object")]
    NotAnObject,

    #[error("missing required argument(s): {}", .0.join(", "))]
    MissingRequired(Vec<String>),

    #[error("unexpected argument '{0}'")]
    Unexpected(String),

    #[error("argument '{name}' must be of type {expected}")]
    WrongType { name: String, expected: ParamType },
}

impl From<ArgumentError> for McpError {
    fn from(err: ArgumentError) -> Self {
        Self::InvalidParams(err.to_string())
    }
}
