//! Decoding of model output.
//!
//! The model is asked for `{response, modifications?}` but in practice wraps
//! it in markdown fences or in a `{content: "<json text>"}` envelope. Both
//! are unwrapped here; anything else is a parse error.

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct AssistantReply {
    pub response: String,
    #[serde(default)]
    pub modifications: Option<Modifications>,
}

/// Requested changes. Patches stay raw JSON; the patch engine checks them
/// per target.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Modifications {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default, rename = "schemaPatch")]
    pub schema_patch: Option<Value>,
    #[serde(default, rename = "uiSchemaPatch")]
    pub ui_schema_patch: Option<Value>,
}

#[derive(Debug, thiserror::Error)]
pub enum ReplyParseError {
    #[error("model output is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("model output has an unexpected shape")]
    Shape,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawReply {
    Direct(AssistantReply),
    Envelope { content: String },
}

/// Remove a leading ```` ``` ```` fence (with optional `json` tag) and a
/// trailing one.
pub fn strip_code_fences(raw: &str) -> &str {
    let mut text = raw.trim();
    if let Some(rest) = text.strip_prefix("```") {
        text = rest
            .strip_prefix("json")
            .or_else(|| rest.strip_prefix("JSON"))
            .unwrap_or(rest);
    }
    if let Some(rest) = text.strip_suffix("```") {
        text = rest;
    }
    text.trim()
}

pub fn decode_reply(raw: &str) -> Result<AssistantReply, ReplyParseError> {
    decode_with_depth(raw, 1)
}

fn decode_with_depth(raw: &str, envelopes_left: u8) -> Result<AssistantReply, ReplyParseError> {
    let value: Value = serde_json::from_str(strip_code_fences(raw))?;
    match serde_json::from_value::<RawReply>(value).map_err(|_| ReplyParseError::Shape)? {
        RawReply::Direct(reply) => Ok(reply),
        RawReply::Envelope { content } if envelopes_left > 0 => {
            decode_with_depth(&content, envelopes_left - 1)
        }
        RawReply::Envelope { .. } => Err(ReplyParseError::Shape),
    }
}
