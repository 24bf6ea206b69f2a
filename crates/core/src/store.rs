//! In-memory schema store for one editing session.
//!
//! Holds the working title, data schema and UI schema. Every successful
//! mutation bumps `version`; failed mutations leave the store untouched.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::CoreError;
use crate::patch::PatchError;
use crate::schema::{self, SchemaTarget};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SchemaSnapshot {
    pub title: String,
    pub schema: Value,
    pub ui_schema: Value,
    pub version: u64,
}

#[derive(Debug, Clone)]
pub struct SchemaStore {
    title: String,
    schema: Value,
    ui_schema: Value,
    version: u64,
}

impl SchemaStore {
    /// Build a store from persisted values. A `null` UI schema becomes `{}`.
    pub fn new(title: impl Into<String>, schema: Value, ui_schema: Value) -> Self {
        Self {
            title: title.into(),
            schema,
            ui_schema: schema::prepare_ui_schema(&ui_schema),
            version: 0,
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn schema(&self) -> &Value {
        &self.schema
    }

    pub fn ui_schema(&self) -> &Value {
        &self.ui_schema
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn set_title(&mut self, title: impl Into<String>) {
        self.title = title.into();
        self.version += 1;
    }

    /// Replace the data schema from user-edited text. The text must parse to
    /// a JSON object.
    pub fn replace_schema_text(&mut self, text: &str) -> Result<(), CoreError> {
        let parsed: Value = serde_json::from_str(text)
            .map_err(|e| CoreError::Validation(format!("schema is not valid JSON: {e}")))?;
        if !parsed.is_object() {
            return Err(CoreError::Validation("schema must be a JSON object".into()));
        }
        self.schema = parsed;
        self.version += 1;
        Ok(())
    }

    /// Replace the UI schema from user-edited text. Blank text means `{}`.
    pub fn replace_ui_schema_text(&mut self, text: &str) -> Result<(), CoreError> {
        let parsed = if text.trim().is_empty() {
            Value::Object(Map::new())
        } else {
            serde_json::from_str(text)
                .map_err(|e| CoreError::Validation(format!("UI schema is not valid JSON: {e}")))?
        };
        self.ui_schema = parsed;
        self.version += 1;
        Ok(())
    }

    /// Apply a raw patch batch to one target. Returns the new version.
    pub fn apply_patch(&mut self, target: SchemaTarget, raw_patch: &Value) -> Result<u64, PatchError> {
        match target {
            SchemaTarget::Schema => {
                self.schema = schema::apply_to_target(target, &self.schema, raw_patch)?;
            }
            SchemaTarget::UiSchema => {
                self.ui_schema = schema::apply_to_target(target, &self.ui_schema, raw_patch)?;
            }
        }
        self.version += 1;
        Ok(self.version)
    }

    pub fn snapshot(&self) -> SchemaSnapshot {
        SchemaSnapshot {
            title: self.title.clone(),
            schema: self.schema.clone(),
            ui_schema: self.ui_schema.clone(),
            version: self.version,
        }
    }

    /// Pretty-printed text of one document, as shown in the editor panes.
    pub fn to_pretty_text(&self, target: SchemaTarget) -> String {
        let doc = match target {
            SchemaTarget::Schema => &self.schema,
            SchemaTarget::UiSchema => &self.ui_schema,
        };
        serde_json::to_string_pretty(doc).unwrap_or_else(|_| doc.to_string())
    }
}
