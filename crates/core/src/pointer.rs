//! JSON Pointer (RFC 6901) parsing and resolution.
//!
//! Pointers are parsed once into their unescaped reference tokens and then
//! walked against a [`serde_json::Value`]. Array tokens must be plain decimal
//! indices without leading zeros; the `-` token ("one past the end") never
//! resolves to an existing value and is only meaningful to the patch `add`
//! operation.

use std::fmt;

use serde_json::Value;

/// Errors produced while parsing a pointer string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PointerError {
    #[error("invalid JSON pointer '{0}': must be empty or start with '/'")]
    MissingLeadingSlash(String),

    #[error("invalid JSON pointer '{0}': '~' must be followed by '0' or '1'")]
    InvalidEscape(String),
}

/// A parsed JSON pointer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JsonPointer {
    tokens: Vec<String>,
}

impl JsonPointer {
    /// The pointer to the whole document (`""`).
    pub fn root() -> Self {
        Self { tokens: Vec::new() }
    }

    /// Parse a pointer string into reference tokens.
    pub fn parse(raw: &str) -> Result<Self, PointerError> {
        if raw.is_empty() {
            return Ok(Self::root());
        }
        let rest = raw
            .strip_prefix('/')
            .ok_or_else(|| PointerError::MissingLeadingSlash(raw.to_string()))?;

        let tokens = rest
            .split('/')
            .map(|segment| unescape_token(segment).ok_or_else(|| PointerError::InvalidEscape(raw.to_string())))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { tokens })
    }

    pub fn is_root(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    /// Split into the parent tokens and the final token. `None` for the root.
    pub fn split_last(&self) -> Option<(&[String], &str)> {
        self.tokens
            .split_last()
            .map(|(last, parent)| (parent, last.as_str()))
    }

    /// Returns `true` if `other` points strictly inside the location named by `self`.
    pub fn is_proper_prefix_of(&self, other: &JsonPointer) -> bool {
        self.tokens.len() < other.tokens.len() && other.tokens.starts_with(&self.tokens)
    }

    /// Append a single (unescaped) token, returning a new pointer.
    pub fn child(&self, token: &str) -> Self {
        let mut tokens = self.tokens.clone();
        tokens.push(token.to_string());
        Self { tokens }
    }

    pub fn resolve<'a>(&self, document: &'a Value) -> Option<&'a Value> {
        resolve_tokens(document, &self.tokens)
    }

    pub fn resolve_mut<'a>(&self, document: &'a mut Value) -> Option<&'a mut Value> {
        resolve_tokens_mut(document, &self.tokens)
    }
}

impl fmt::Display for JsonPointer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for token in &self.tokens {
            write!(f, "/{}", escape_token(token))?;
        }
        Ok(())
    }
}

/// Escape a raw key for use as a pointer token (`~` -> `~0`, `/` -> `~1`).
pub fn escape_token(token: &str) -> String {
    token.replace('~', "~0").replace('/', "~1")
}

fn unescape_token(segment: &str) -> Option<String> {
    let mut out = String::with_capacity(segment.len());
    let mut chars = segment.chars();
    while let Some(ch) = chars.next() {
        if ch == '~' {
            match chars.next() {
                Some('0') => out.push('~'),
                Some('1') => out.push('/'),
                _ => return None,
            }
        } else {
            out.push(ch);
        }
    }
    Some(out)
}

/// Parse an array index token. Rejects `-`, signs, and leading zeros.
pub fn parse_array_index(token: &str) -> Option<usize> {
    if token.is_empty() || !token.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if token.len() > 1 && token.starts_with('0') {
        return None;
    }
    token.parse().ok()
}

pub(crate) fn resolve_tokens<'a>(document: &'a Value, tokens: &[String]) -> Option<&'a Value> {
    tokens.iter().try_fold(document, |current, token| match current {
        Value::Object(map) => map.get(token),
        Value::Array(items) => parse_array_index(token).and_then(|i| items.get(i)),
        _ => None,
    })
}

pub(crate) fn resolve_tokens_mut<'a>(
    document: &'a mut Value,
    tokens: &[String],
) -> Option<&'a mut Value> {
    tokens.iter().try_fold(document, |current, token| match current {
        Value::Object(map) => map.get_mut(token),
        Value::Array(items) => parse_array_index(token).and_then(move |i| items.get_mut(i)),
        _ => None,
    })
}
