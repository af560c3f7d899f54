use std::sync::Arc;

use serde_json::Value;

use crate::error::{LocationStateError, Result};
use crate::value::StateMap;

/// Converts a store's state to and from its string form in the backing
/// medium. `deserialize(serialize(x))` must reproduce `x`.
pub trait Serializer: Send + Sync {
    fn serialize(&self, state: &StateMap) -> Result<String>;
    fn deserialize(&self, raw: &str) -> Result<StateMap>;
}

/// The default serializer: compact JSON. Anything but a JSON object is
/// rejected on the way in.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonSerializer;

impl Serializer for JsonSerializer {
    fn serialize(&self, state: &StateMap) -> Result<String> {
        serde_json::to_string(state).map_err(|e| LocationStateError::Serialize(e.to_string()))
    }

    fn deserialize(&self, raw: &str) -> Result<StateMap> {
        match serde_json::from_str::<Value>(raw) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(other) => Err(LocationStateError::Deserialize(format!(
                "expected a JSON object, got {}",
                json_kind(&other)
            ))),
            Err(e) => Err(LocationStateError::Deserialize(e.to_string())),
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

type SerializeFn = Arc<dyn Fn(&StateMap) -> Result<String> + Send + Sync>;
type DeserializeFn = Arc<dyn Fn(&str) -> Result<StateMap> + Send + Sync>;

/// A serializer assembled from a pair of closures, for custom encodings
/// (compression, encryption, a shorter URL form) without a new type.
#[derive(Clone)]
pub struct FnSerializer {
    serialize: SerializeFn,
    deserialize: DeserializeFn,
}

impl FnSerializer {
    pub fn new<S, D>(serialize: S, deserialize: D) -> Self
    where
        S: Fn(&StateMap) -> Result<String> + Send + Sync + 'static,
        D: Fn(&str) -> Result<StateMap> + Send + Sync + 'static,
    {
        Self {
            serialize: Arc::new(serialize),
            deserialize: Arc::new(deserialize),
        }
    }
}

impl Serializer for FnSerializer {
    fn serialize(&self, state: &StateMap) -> Result<String> {
        (self.serialize)(state)
    }

    fn deserialize(&self, raw: &str) -> Result<StateMap> {
        (self.deserialize)(raw)
    }
}
