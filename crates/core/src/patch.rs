//! JSON Patch (RFC 6902) engine.
//!
//! A [`PatchBatch`] is decoded from untrusted JSON (typically model output)
//! through a syntactic pre-check, then applied atomically with [`apply`]:
//! every operation runs against a private deep copy and the caller's
//! document is only replaced when the whole batch succeeds.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::pointer::{parse_array_index, resolve_tokens_mut, JsonPointer};

/// Operation names accepted by the pre-check.
pub const VALID_OPS: &[&str] = &["add", "remove", "replace", "move", "copy", "test"];

/// One JSON-Patch operation. The set is closed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum PatchOperation {
    Add { path: String, value: Value },
    Remove { path: String },
    Replace { path: String, value: Value },
    Move { from: String, path: String },
    Copy { from: String, path: String },
    Test { path: String, value: Value },
}

impl PatchOperation {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Add { .. } => "add",
            Self::Remove { .. } => "remove",
            Self::Replace { .. } => "replace",
            Self::Move { .. } => "move",
            Self::Copy { .. } => "copy",
            Self::Test { .. } => "test",
        }
    }

    pub fn path(&self) -> &str {
        match self {
            Self::Add { path, .. }
            | Self::Remove { path }
            | Self::Replace { path, .. }
            | Self::Move { path, .. }
            | Self::Copy { path, .. }
            | Self::Test { path, .. } => path,
        }
    }

    fn from_pointer(&self) -> Option<&str> {
        match self {
            Self::Move { from, .. } | Self::Copy { from, .. } => Some(from),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PatchError {
    #[error("patch must be a JSON array of operations")]
    NotAnArray,

    #[error("operation {index} is malformed: {reason}")]
    Malformed { index: usize, reason: String },

    #[error("operation {index} ({op} {path}) failed: {reason}")]
    Failed {
        index: usize,
        op: &'static str,
        path: String,
        reason: String,
    },

    #[error("operation {index} (test {path}) failed: value does not match")]
    TestFailed { index: usize, path: String },

    #[error("patched document is not a valid schema: {0}")]
    Structure(String),
}

/// An ordered sequence of operations applied all-or-nothing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PatchBatch(Vec<PatchOperation>);

impl PatchBatch {
    pub fn new(operations: Vec<PatchOperation>) -> Self {
        Self(operations)
    }

    /// Decode a batch from raw JSON, rejecting anything outside the closed
    /// operation set before serde sees it.
    pub fn from_value(raw: &Value) -> Result<Self, PatchError> {
        let items = raw.as_array().ok_or(PatchError::NotAnArray)?;

        let mut operations = Vec::with_capacity(items.len());
        for (index, item) in items.iter().enumerate() {
            let malformed = |reason: String| PatchError::Malformed { index, reason };

            let object = item
                .as_object()
                .ok_or_else(|| malformed("operation must be an object".into()))?;

            match object.get("op").and_then(Value::as_str) {
                Some(op) if VALID_OPS.contains(&op) => {}
                Some(op) => return Err(malformed(format!("unknown op '{op}'"))),
                None => return Err(malformed("missing string field 'op'".into())),
            }
            if !object.get("path").is_some_and(Value::is_string) {
                return Err(malformed("missing string field 'path'".into()));
            }

            let operation: PatchOperation =
                serde_json::from_value(item.clone()).map_err(|e| malformed(e.to_string()))?;

            JsonPointer::parse(operation.path()).map_err(|e| malformed(e.to_string()))?;
            if let Some(from) = operation.from_pointer() {
                JsonPointer::parse(from).map_err(|e| malformed(e.to_string()))?;
            }

            operations.push(operation);
        }

        Ok(Self(operations))
    }

    pub fn operations(&self) -> &[PatchOperation] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Apply a batch to a copy of `document`.
///
/// On error the input is untouched and the error names the failing
/// operation's index.
pub fn apply(document: &Value, batch: &PatchBatch) -> Result<Value, PatchError> {
    let mut working = document.clone();
    for (index, operation) in batch.operations().iter().enumerate() {
        apply_one(&mut working, operation).map_err(|failure| match failure {
            OpFailure::TestMismatch => PatchError::TestFailed {
                index,
                path: operation.path().to_string(),
            },
            OpFailure::Reason(reason) => PatchError::Failed {
                index,
                op: operation.name(),
                path: operation.path().to_string(),
                reason,
            },
        })?;
    }
    Ok(working)
}

enum OpFailure {
    TestMismatch,
    Reason(String),
}

impl From<String> for OpFailure {
    fn from(reason: String) -> Self {
        Self::Reason(reason)
    }
}

fn parse_pointer(raw: &str) -> Result<JsonPointer, OpFailure> {
    JsonPointer::parse(raw).map_err(|e| OpFailure::Reason(e.to_string()))
}

fn apply_one(doc: &mut Value, operation: &PatchOperation) -> Result<(), OpFailure> {
    match operation {
        PatchOperation::Add { path, value } => {
            add_at(doc, &parse_pointer(path)?, value.clone())?;
        }
        PatchOperation::Remove { path } => {
            remove_at(doc, &parse_pointer(path)?)?;
        }
        PatchOperation::Replace { path, value } => {
            let pointer = parse_pointer(path)?;
            let target = pointer
                .resolve_mut(doc)
                .ok_or_else(|| "path does not exist".to_string())?;
            *target = value.clone();
        }
        PatchOperation::Move { from, path } => {
            let from = parse_pointer(from)?;
            let to = parse_pointer(path)?;
            if from.resolve(doc).is_none() {
                return Err("'from' path does not exist".to_string().into());
            }
            if from == to {
                return Ok(());
            }
            if from.is_proper_prefix_of(&to) {
                return Err("cannot move a value into one of its own children"
                    .to_string()
                    .into());
            }
            let value = remove_at(doc, &from)?;
            add_at(doc, &to, value)?;
        }
        PatchOperation::Copy { from, path } => {
            let from = parse_pointer(from)?;
            let value = from
                .resolve(doc)
                .cloned()
                .ok_or_else(|| "'from' path does not exist".to_string())?;
            add_at(doc, &parse_pointer(path)?, value)?;
        }
        PatchOperation::Test { path, value } => {
            let actual = parse_pointer(path)?
                .resolve(doc)
                .ok_or_else(|| "path does not exist".to_string())?;
            if !json_equal(actual, value) {
                return Err(OpFailure::TestMismatch);
            }
        }
    }
    Ok(())
}

fn add_at(doc: &mut Value, pointer: &JsonPointer, value: Value) -> Result<(), String> {
    let Some((parent_tokens, last)) = pointer.split_last() else {
        *doc = value;
        return Ok(());
    };
    let parent = resolve_tokens_mut(doc, parent_tokens)
        .ok_or_else(|| "parent path does not exist".to_string())?;

    match parent {
        Value::Object(map) => {
            map.insert(last.to_string(), value);
            Ok(())
        }
        Value::Array(items) => {
            if last == "-" {
                items.push(value);
                return Ok(());
            }
            let index = parse_array_index(last)
                .ok_or_else(|| format!("invalid array index '{last}'"))?;
            if index > items.len() {
                return Err(format!(
                    "array index {index} out of bounds (length {})",
                    items.len()
                ));
            }
            items.insert(index, value);
            Ok(())
        }
        _ => Err("parent is not an object or array".to_string()),
    }
}

fn remove_at(doc: &mut Value, pointer: &JsonPointer) -> Result<Value, String> {
    let (parent_tokens, last) = pointer
        .split_last()
        .ok_or_else(|| "cannot remove the document root".to_string())?;
    let parent = resolve_tokens_mut(doc, parent_tokens)
        .ok_or_else(|| "path does not exist".to_string())?;

    match parent {
        Value::Object(map) => map
            .shift_remove(last)
            .ok_or_else(|| "path does not exist".to_string()),
        Value::Array(items) => match parse_array_index(last) {
            Some(index) if index < items.len() => Ok(items.remove(index)),
            _ => Err("path does not exist".to_string()),
        },
        _ => Err("path does not exist".to_string()),
    }
}

/// JSON deep equality: numbers compare by value (`1 == 1.0`), object member
/// order is ignored.
pub fn json_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => {
            if let (Some(x), Some(y)) = (x.as_i64(), y.as_i64()) {
                x == y
            } else if let (Some(x), Some(y)) = (x.as_u64(), y.as_u64()) {
                x == y
            } else {
                x.as_f64() == y.as_f64()
            }
        }
        (Value::Array(xs), Value::Array(ys)) => {
            xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| json_equal(x, y))
        }
        (Value::Object(xs), Value::Object(ys)) => {
            xs.len() == ys.len()
                && xs
                    .iter()
                    .all(|(k, x)| ys.get(k).is_some_and(|y| json_equal(x, y)))
        }
        _ => a == b,
    }
}
