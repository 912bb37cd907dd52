use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::SchemaError;

/// Open view over a stored sidecar. Unknown fields are kept as-is so a
/// document written by a newer normalizer survives a read and re-emit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SidecarEcho {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asset_id: Option<String>,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl SidecarEcho {
    pub fn from_value(value: Value) -> Result<Self, SchemaError> {
        serde_json::from_value(value).map_err(|err| SchemaError::Shape(err.to_string()))
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, SchemaError> {
        serde_json::from_slice(bytes).map_err(|err| SchemaError::Shape(err.to_string()))
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn into_value(self) -> Result<Value, SchemaError> {
        serde_json::to_value(self).map_err(|err| SchemaError::Shape(err.to_string()))
    }
}
