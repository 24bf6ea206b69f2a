//! Form descriptor rendering and submission validation for the preview pane.
//!
//! [`render`] turns a data schema plus UI schema into a tree of
//! [`FormField`]s the browser draws directly. [`validate_submission`] checks
//! submitted data against the schema with the `jsonschema` crate and merges
//! any server-supplied errors in rjsf `ErrorSchema` shape
//! (`{"field": {"__errors": ["..."]}}`).

use serde::Serialize;
use serde_json::{Map, Value};

use crate::pointer::escape_token;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FormError {
    #[error("invalid schema: {0}")]
    InvalidSchema(String),

    #[error("invalid ui:order: {0}")]
    InvalidOrder(String),
}

/// JSON type of a field, from the schema's `type` keyword.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    String,
    Integer,
    Number,
    Boolean,
    Array,
    Object,
    Unknown,
}

impl FieldKind {
    fn of(schema: &Map<String, Value>) -> Self {
        let type_name = match schema.get("type") {
            Some(Value::String(name)) => Some(name.as_str()),
            Some(Value::Array(names)) => names
                .iter()
                .filter_map(Value::as_str)
                .find(|name| *name != "null"),
            _ => None,
        };
        match type_name {
            Some("string") => Self::String,
            Some("integer") => Self::Integer,
            Some("number") => Self::Number,
            Some("boolean") => Self::Boolean,
            Some("array") => Self::Array,
            Some("object") => Self::Object,
            _ if schema.contains_key("properties") => Self::Object,
            _ => Self::Unknown,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldOption {
    pub value: Value,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FormField {
    pub name: String,
    /// Instance pointer of the field's value in the submitted data.
    pub pointer: String,
    pub kind: FieldKind,
    pub widget: String,
    pub label: String,
    pub description: Option<String>,
    pub help: Option<String>,
    pub placeholder: Option<String>,
    pub required: bool,
    pub hidden: bool,
    pub disabled: bool,
    pub options: Vec<FieldOption>,
    pub initial: Option<Value>,
    pub errors: Vec<String>,
    pub children: Vec<FormField>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FormDescriptor {
    pub title: Option<String>,
    pub description: Option<String>,
    pub fields: Vec<FormField>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    /// Instance pointer of the offending value (`""` for the form itself).
    pub field: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<FieldError>,
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

pub fn render(
    schema: &Value,
    ui_schema: &Value,
    initial_data: Option<&Value>,
    external_errors: Option<&Value>,
) -> Result<FormDescriptor, FormError> {
    let root = schema
        .as_object()
        .ok_or_else(|| FormError::InvalidSchema("schema must be a JSON object".into()))?;

    let empty = Map::new();
    let ui = ui_schema.as_object().unwrap_or(&empty);

    Ok(FormDescriptor {
        title: str_member(root, "title"),
        description: str_member(root, "description"),
        fields: build_fields(root, ui, initial_data, external_errors, "")?,
    })
}

fn build_fields(
    schema: &Map<String, Value>,
    ui: &Map<String, Value>,
    data: Option<&Value>,
    errors: Option<&Value>,
    prefix: &str,
) -> Result<Vec<FormField>, FormError> {
    let empty = Map::new();
    let properties = schema
        .get("properties")
        .and_then(Value::as_object)
        .unwrap_or(&empty);
    let required: Vec<&str> = schema
        .get("required")
        .and_then(Value::as_array)
        .map(|names| names.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();

    let names: Vec<&str> = properties.keys().map(String::as_str).collect();
    let ordered = order_properties(&names, ui.get("ui:order"))?;

    ordered
        .into_iter()
        .map(|name| {
            let property = properties
                .get(name)
                .and_then(Value::as_object)
                .unwrap_or(&empty);
            let field_ui = ui.get(name).and_then(Value::as_object).unwrap_or(&empty);
            build_field(
                name,
                property,
                field_ui,
                required.contains(&name),
                data.and_then(|d| d.get(name)),
                errors.and_then(|e| e.get(name)),
                prefix,
            )
        })
        .collect()
}

fn build_field(
    name: &str,
    schema: &Map<String, Value>,
    ui: &Map<String, Value>,
    required: bool,
    data: Option<&Value>,
    errors: Option<&Value>,
    prefix: &str,
) -> Result<FormField, FormError> {
    let kind = FieldKind::of(schema);
    let pointer = format!("{prefix}/{}", escape_token(name));
    let widget = str_member(ui, "ui:widget").unwrap_or_else(|| default_widget(kind, schema).to_string());

    let children = if kind == FieldKind::Object {
        build_fields(schema, ui, data, errors, &pointer).map_err(|e| match e {
            FormError::InvalidOrder(reason) => FormError::InvalidOrder(format!("{name}: {reason}")),
            other => other,
        })?
    } else {
        Vec::new()
    };

    Ok(FormField {
        name: name.to_string(),
        pointer,
        kind,
        hidden: widget == "hidden",
        widget,
        label: str_member(ui, "ui:title")
            .or_else(|| str_member(schema, "title"))
            .unwrap_or_else(|| name.to_string()),
        description: str_member(ui, "ui:description").or_else(|| str_member(schema, "description")),
        help: str_member(ui, "ui:help"),
        placeholder: str_member(ui, "ui:placeholder"),
        required,
        disabled: bool_member(ui, "ui:disabled") || bool_member(schema, "readOnly"),
        options: field_options(kind, schema),
        initial: data.cloned().or_else(|| schema.get("default").cloned()),
        errors: own_errors(errors),
        children,
    })
}

/// Order property names by `ui:order`.
///
/// Without a `*` entry every property must be listed. Entries naming no
/// property are dropped. At most one `*` is allowed.
fn order_properties<'a>(names: &[&'a str], order: Option<&Value>) -> Result<Vec<&'a str>, FormError> {
    let Some(order) = order else {
        return Ok(names.to_vec());
    };
    let entries = order
        .as_array()
        .ok_or_else(|| FormError::InvalidOrder("must be an array".into()))?
        .iter()
        .map(|entry| {
            entry
                .as_str()
                .ok_or_else(|| FormError::InvalidOrder("entries must be strings".into()))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let wildcards = entries.iter().filter(|entry| **entry == "*").count();
    if wildcards > 1 {
        return Err(FormError::InvalidOrder("contains more than one wildcard".into()));
    }

    let rest: Vec<&str> = names
        .iter()
        .copied()
        .filter(|name| !entries.contains(name))
        .collect();
    if wildcards == 0 {
        if let Some(missing) = rest.first() {
            return Err(FormError::InvalidOrder(format!(
                "does not contain property '{missing}'"
            )));
        }
    }

    let mut ordered = Vec::with_capacity(names.len());
    for entry in entries {
        if entry == "*" {
            ordered.extend(rest.iter().copied());
        } else if let Some(name) = names.iter().find(|name| **name == entry) {
            ordered.push(*name);
        }
    }
    Ok(ordered)
}

fn default_widget(kind: FieldKind, schema: &Map<String, Value>) -> &'static str {
    let has_enum = schema.contains_key("enum") || schema.contains_key("oneOf");
    match kind {
        FieldKind::String if has_enum => "select",
        FieldKind::String => match schema.get("format").and_then(Value::as_str) {
            Some("email") => "email",
            Some("uri") | Some("url") => "url",
            Some("date") => "date",
            Some("date-time") => "datetime",
            Some("data-url") => "file",
            _ => "text",
        },
        FieldKind::Integer | FieldKind::Number if has_enum => "select",
        FieldKind::Integer | FieldKind::Number => "number",
        FieldKind::Boolean => "checkbox",
        FieldKind::Array => {
            let items = schema.get("items").and_then(Value::as_object);
            if items.is_some_and(|items| items.contains_key("enum")) {
                "checkboxes"
            } else if items
                .and_then(|items| items.get("format"))
                .and_then(Value::as_str)
                == Some("data-url")
            {
                "files"
            } else {
                "list"
            }
        }
        FieldKind::Object => "fieldset",
        FieldKind::Unknown => "text",
    }
}

/// Choices from `enum` (or `oneOf` of `const`), or from `items.enum` for arrays.
fn field_options(kind: FieldKind, schema: &Map<String, Value>) -> Vec<FieldOption> {
    let source = if kind == FieldKind::Array {
        schema.get("items").and_then(Value::as_object)
    } else {
        Some(schema)
    };
    let Some(source) = source else {
        return Vec::new();
    };

    if let Some(values) = source.get("enum").and_then(Value::as_array) {
        return values
            .iter()
            .map(|value| FieldOption {
                label: display_label(value),
                value: value.clone(),
            })
            .collect();
    }

    source
        .get("oneOf")
        .and_then(Value::as_array)
        .map(|choices| {
            choices
                .iter()
                .filter_map(Value::as_object)
                .filter_map(|choice| {
                    let value = choice.get("const")?.clone();
                    let label = str_member(choice, "title").unwrap_or_else(|| display_label(&value));
                    Some(FieldOption { value, label })
                })
                .collect()
        })
        .unwrap_or_default()
}

fn display_label(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

fn own_errors(errors: Option<&Value>) -> Vec<String> {
    errors
        .and_then(|e| e.get("__errors"))
        .and_then(Value::as_array)
        .map(|list| list.iter().filter_map(Value::as_str).map(str::to_string).collect())
        .unwrap_or_default()
}

fn str_member(map: &Map<String, Value>, key: &str) -> Option<String> {
    map.get(key).and_then(Value::as_str).map(str::to_string)
}

fn bool_member(map: &Map<String, Value>, key: &str) -> bool {
    map.get(key).and_then(Value::as_bool).unwrap_or(false)
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Validate submitted data and merge extra errors from the server.
///
/// `required` violations are reported on the missing property's own path so
/// the browser can show them next to the field. Schemas whose `$ref` points
/// at a file or URL are rejected as invalid; nothing outside the document is
/// ever fetched.
pub fn validate_submission(
    schema: &Value,
    data: &Value,
    external_errors: Option<&Value>,
) -> Result<ValidationReport, FormError> {
    let validator =
        jsonschema::validator_for(schema).map_err(|e| FormError::InvalidSchema(e.to_string()))?;

    let mut errors: Vec<FieldError> = validator
        .iter_errors(data)
        .map(|error| {
            let mut field = error.instance_path.to_string();
            if let jsonschema::error::ValidationErrorKind::Required { property } = &error.kind {
                if let Some(name) = property.as_str() {
                    field = format!("{field}/{}", escape_token(name));
                }
            }
            FieldError {
                field,
                message: error.to_string(),
            }
        })
        .collect();

    if let Some(extra) = external_errors {
        flatten_error_schema(extra, "", &mut errors);
    }

    Ok(ValidationReport {
        valid: errors.is_empty(),
        errors,
    })
}

/// Flatten an rjsf `ErrorSchema` into pointer-addressed errors.
pub fn flatten_error_schema(error_schema: &Value, prefix: &str, out: &mut Vec<FieldError>) {
    let Some(map) = error_schema.as_object() else {
        return;
    };
    for (key, value) in map {
        if key == "__errors" {
            if let Some(messages) = value.as_array() {
                out.extend(messages.iter().filter_map(Value::as_str).map(|message| FieldError {
                    field: prefix.to_string(),
                    message: message.to_string(),
                }));
            }
        } else {
            flatten_error_schema(value, &format!("{prefix}/{}", escape_token(key)), out);
        }
    }
}
