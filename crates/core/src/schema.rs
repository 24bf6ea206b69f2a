//! Survey schema documents: the two patch targets and their defaulting rules.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::patch::{self, PatchBatch, PatchError};

/// Which of the two documents a patch is aimed at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchemaTarget {
    Schema,
    UiSchema,
}

impl SchemaTarget {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Schema => "schema",
            Self::UiSchema => "ui_schema",
        }
    }
}

/// The starting point of every data schema.
pub fn base_schema() -> Value {
    json!({"type": "object", "properties": {}, "required": []})
}

/// The starting point of every UI schema.
pub fn base_ui_schema() -> Value {
    Value::Object(Map::new())
}

/// Bring a stored data schema into patchable shape.
///
/// `null`, `{}` and non-object values become [`base_schema`]. A `properties`
/// member that is not a mapping is reset to an empty one.
pub fn prepare_schema(current: &Value) -> Value {
    let mut doc = match current {
        Value::Object(map) if !map.is_empty() => current.clone(),
        _ => base_schema(),
    };
    if let Some(map) = doc.as_object_mut() {
        if !map.get("properties").is_some_and(Value::is_object) {
            map.insert("properties".into(), Value::Object(Map::new()));
        }
    }
    doc
}

pub fn prepare_ui_schema(current: &Value) -> Value {
    if current.is_null() {
        base_ui_schema()
    } else {
        current.clone()
    }
}

/// A data schema must stay an object with a `properties` mapping.
pub fn check_schema_structure(doc: &Value) -> Result<(), PatchError> {
    let map = doc
        .as_object()
        .ok_or_else(|| PatchError::Structure("schema must be a JSON object".into()))?;
    if !map.get("properties").is_some_and(Value::is_object) {
        return Err(PatchError::Structure(
            "schema must contain a 'properties' object".into(),
        ));
    }
    Ok(())
}

/// Decode and apply a raw patch to one target, with that target's defaulting
/// and post-check.
pub fn apply_to_target(
    target: SchemaTarget,
    current: &Value,
    raw_patch: &Value,
) -> Result<Value, PatchError> {
    let batch = PatchBatch::from_value(raw_patch)?;
    match target {
        SchemaTarget::Schema => {
            let patched = patch::apply(&prepare_schema(current), &batch)?;
            check_schema_structure(&patched)?;
            Ok(patched)
        }
        SchemaTarget::UiSchema => patch::apply(&prepare_ui_schema(current), &batch),
    }
}
