use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Unique identifier for a protocol session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub Uuid);

impl SessionId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl std::str::FromStr for SessionId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse().map(Self)
    }
}

/// The closed set of parameter types understood by schemas and handlers.
///
/// Schemas and handler descriptors both speak this type, so checking one
/// against the other is plain structural equality.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
    String,
    Integer,
    Number,
    Boolean,
    Array(&'static ParamType),
    Object,
}

impl ParamType {
    /// JSON Schema `type` keyword for this type.
    #[must_use]
    pub fn json_type(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Array(_) => "array",
            Self::Object => "object",
        }
    }

    /// JSON Schema fragment for this type (nested `items` for arrays).
    #[must_use]
    pub fn to_schema(self) -> Value {
        match self {
            Self::Array(inner) => serde_json::json!({
                "type": "array",
                "items": inner.to_schema(),
            }),
            other => serde_json::json!({ "type": other.json_type() }),
        }
    }

    /// Whether `value` is an instance of this type.
    ///
    /// Integers are accepted where a number is declared, never the reverse.
    #[must_use]
    pub fn matches(self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Integer => value.is_i64() || value.is_u64(),
            Self::Number => value.is_number(),
            Self::Boolean => value.is_boolean(),
            Self::Array(inner) => value
                .as_array()
                .is_some_and(|items| items.iter().all(|item| inner.matches(item))),
            Self::Object => value.is_object(),
        }
    }
}

impl std::fmt::Display for ParamType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Array(inner) => write!(f, "array<{inner}>"),
            other => f.write_str(other.json_type()),
        }
    }
}

/// One formal parameter of a tool handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandlerParam {
    pub name: &'static str,
    pub ty: ParamType,
    /// `true` when the handler falls back to a default if the argument is absent.
    pub has_default: bool,
}

impl HandlerParam {
    #[must_use]
    pub const fn required(name: &'static str, ty: ParamType) -> Self {
        Self {
            name,
            ty,
            has_default: false,
        }
    }

    #[must_use]
    pub const fn optional(name: &'static str, ty: ParamType) -> Self {
        Self {
            name,
            ty,
            has_default: true,
        }
    }
}

/// Static declaration of one schema parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParamDecl {
    pub name: &'static str,
    pub ty: ParamType,
    pub required: bool,
    pub description: &'static str,
}

/// Static declaration of one tool, as shipped in the tool catalog.
#[derive(Debug, Clone, Copy)]
pub struct ToolDecl {
    pub name: &'static str,
    pub description: &'static str,
    pub category: &'static str,
    /// Key the handler resolver maps to an implementation.
    pub handler_ref: &'static str,
    pub params: &'static [ParamDecl],
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn session_id_roundtrip() {
        let id = SessionId::new();
        let json = serde_json::to_string(&id).unwrap();
        let deserialized: SessionId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, deserialized);

        let parsed: SessionId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn integer_is_a_number_but_not_the_reverse() {
        assert!(ParamType::Number.matches(&json!(3)));
        assert!(ParamType::Number.matches(&json!(3.5)));
        assert!(ParamType::Integer.matches(&json!(3)));
        assert!(!ParamType::Integer.matches(&json!(3.5)));
        assert!(!ParamType::Integer.matches(&json!("3")));
    }

    #[test]
    fn nested_arrays_check_every_element() {
        static EDGE: ParamType = ParamType::Array(&ParamType::Integer);
        let edges = ParamType::Array(&EDGE);

        assert!(edges.matches(&json!([[0, 1], [1, 2]])));
        assert!(edges.matches(&json!([])));
        assert!(!edges.matches(&json!([[0, "1"]])));
        assert!(!edges.matches(&json!([0, 1])));
    }

    #[test]
    fn array_schema_has_items() {
        let ty = ParamType::Array(&ParamType::Number);
        assert_eq!(
            ty.to_schema(),
            json!({"type": "array", "items": {"type": "number"}})
        );
        assert_eq!(ty.to_string(), "array<number>");
    }

    #[test]
    fn handler_param_constructors() {
        let p = HandlerParam::optional("max_colors", ParamType::Integer);
        assert!(p.has_default);
        assert!(!HandlerParam::required("n", ParamType::Integer).has_default);
    }
}
