use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::error::HandlerError;

/// Validated tool arguments handed to a handler.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Arguments(Map<String, Value>);

impl Arguments {
    #[must_use]
    pub fn new(map: Map<String, Value>) -> Self {
        Self(map)
    }

    #[must_use]
    pub fn raw(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    /// Decode a required argument.
    pub fn get<T: DeserializeOwned>(&self, name: &str) -> Result<T, HandlerError> {
        let value = self
            .0
            .get(name)
            .ok_or_else(|| HandlerError::MissingArgument(name.to_string()))?;
        decode(name, value)
    }

    /// Decode an argument, falling back to `default` when it is absent or null.
    pub fn get_or<T: DeserializeOwned>(&self, name: &str, default: T) -> Result<T, HandlerError> {
        match self.0.get(name) {
            None | Some(Value::Null) => Ok(default),
            Some(value) => decode(name, value),
        }
    }

    #[must_use]
    pub fn into_inner(self) -> Map<String, Value> {
        self.0
    }
}

impl From<Map<String, Value>> for Arguments {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

fn decode<T: DeserializeOwned>(name: &str, value: &Value) -> Result<T, HandlerError> {
    serde_json::from_value(value.clone()).map_err(|e| HandlerError::invalid(name, e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn args(value: Value) -> Arguments {
        match value {
            Value::Object(map) => Arguments::new(map),
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn required_argument_decodes() {
        let a = args(json!({"edges": [[0, 1], [1, 2]]}));
        let edges: Vec<(usize, usize)> = a.get("edges").unwrap();
        assert_eq!(edges, vec![(0, 1), (1, 2)]);
    }

    #[test]
    fn missing_required_argument() {
        let a = args(json!({}));
        let err = a.get::<i64>("n").unwrap_err();
        assert!(matches!(err, HandlerError::MissingArgument(ref n) if n == "n"));
    }

    #[test]
    fn default_used_for_absent_or_null() {
        assert_eq!(args(json!({})).get_or("n", 8_i64).unwrap(), 8);
        assert_eq!(args(json!({"n": null})).get_or("n", 8_i64).unwrap(), 8);
        assert_eq!(args(json!({"n": 4})).get_or("n", 8_i64).unwrap(), 4);
    }

    #[test]
    fn wrong_shape_is_invalid_argument() {
        let err = args(json!({"n": "four"})).get::<i64>("n").unwrap_err();
        assert!(matches!(err, HandlerError::InvalidArgument { ref name, .. } if name == "n"));
    }
}
