//! Structured data out of a completion.
//!
//! A completion is free text containing a fenced block tagged `yaml`, `yml`
//! or `json`, anywhere in the text. When the endpoint was asked for
//! schema-constrained output it may also answer with a bare JSON object.
//!
//! Anything else is a contract violation with an explicit kind.

use lazy_static::lazy_static;
use regex::Regex;
use serde_yaml::{Mapping, Value};
use thiserror::Error;

lazy_static! {
    /// Opening fence with a structured-data tag, up to the end of its line.
    static ref OPENING_FENCE: Regex =
        Regex::new(r"```[ \t]*(?:yaml|yml|json)\b[^\n]*\n").unwrap();
}

const CLOSING_FENCE: &str = "```";

/// Completion shapes a caller accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseFormat {
    /// A tagged fenced block only.
    Fenced,
    /// A bare JSON object, else a tagged fenced block.
    JsonOrFenced,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ResponseError {
    #[error("no fenced yaml/json block in completion")]
    MissingFence,

    #[error("fenced block is never closed")]
    UnterminatedFence,

    #[error("fenced block is not valid YAML/JSON: {0}")]
    InvalidSyntax(String),

    #[error("structured block is not a mapping")]
    NotAMapping,

    #[error("mandatory field '{0}' is missing")]
    MissingField(String),
}

/// Rewrites the curly apostrophe (U+2019) to `'`; the appraisal form rejects
/// special characters.
pub fn normalize_punctuation(text: &str) -> String {
    text.replace('\u{2019}', "'")
}

/// Body of the first tagged fenced block, trimmed.
pub fn extract_fenced_block(text: &str) -> Result<&str, ResponseError> {
    let opening = OPENING_FENCE
        .find(text)
        .ok_or(ResponseError::MissingFence)?;
    let rest = &text[opening.end()..];
    let close = rest
        .find(CLOSING_FENCE)
        .ok_or(ResponseError::UnterminatedFence)?;
    Ok(rest[..close].trim())
}

/// Parses the structured part of a completion and checks `required` keys.
pub fn parse_structured(
    text: &str,
    required: &[&str],
    format: ResponseFormat,
) -> Result<Mapping, ResponseError> {
    let direct = match format {
        ResponseFormat::JsonOrFenced => direct_json_object(text),
        ResponseFormat::Fenced => None,
    };
    let mapping = match direct {
        Some(mapping) => mapping,
        None => {
            let block = extract_fenced_block(text)?;
            match serde_yaml::from_str::<Value>(block) {
                Ok(Value::Mapping(mapping)) => mapping,
                Ok(_) => return Err(ResponseError::NotAMapping),
                Err(e) => return Err(ResponseError::InvalidSyntax(e.to_string())),
            }
        }
    };

    if let Some(missing) = required.iter().find(|key| !mapping.contains_key(**key)) {
        return Err(ResponseError::MissingField(missing.to_string()));
    }
    Ok(mapping)
}

/// Schema-constrained endpoints answer with the object itself.
fn direct_json_object(text: &str) -> Option<Mapping> {
    let trimmed = text.trim();
    if !trimmed.starts_with('{') {
        return None;
    }
    match serde_json::from_str::<serde_json::Value>(trimmed) {
        Ok(value @ serde_json::Value::Object(_)) => match serde_yaml::to_value(value) {
            Ok(Value::Mapping(mapping)) => Some(mapping),
            _ => None,
        },
        _ => None,
    }
}

/// Scalar field as text: `null` is empty, numbers and booleans are printed,
/// nested values are rendered as YAML.
pub fn field_text(mapping: &Mapping, key: &str) -> Option<String> {
    let value = mapping.get(key)?;
    Some(match value {
        Value::Null => String::new(),
        Value::String(s) => s.trim().to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => serde_yaml::to_string(other)
            .map(|s| s.trim().to_string())
            .unwrap_or_default(),
    })
}

/// Boolean field, accepting `true`/`false` spelled as strings too.
pub fn field_bool(mapping: &Mapping, key: &str) -> Option<bool> {
    match mapping.get(key)? {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" => Some(true),
            "false" | "no" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FENCED: &str = "Here is the draft:\n```yaml\ncomment: \"Shipped X on time\"\nreason: \"met deadline\"\n```\nThanks!";

    #[test]
    fn test_parses_fenced_yaml() {
        let mapping = parse_structured(FENCED, &["comment"], ResponseFormat::Fenced).unwrap();
        assert_eq!(field_text(&mapping, "comment").unwrap(), "Shipped X on time");
        assert_eq!(field_text(&mapping, "reason").unwrap(), "met deadline");
    }

    #[test]
    fn test_parses_fenced_json() {
        let text = "```json\n{\"comment\": \"Done\", \"reason\": \"r\"}\n```";
        let mapping = parse_structured(text, &["comment"], ResponseFormat::Fenced).unwrap();
        assert_eq!(field_text(&mapping, "comment").unwrap(), "Done");
    }

    #[test]
    fn test_parses_inline_fence() {
        let text = "Sure! ```yaml\ncomment: Shipped X on time\nreason: met deadline\n```";
        let mapping = parse_structured(text, &["comment"], ResponseFormat::Fenced).unwrap();
        assert_eq!(field_text(&mapping, "comment").unwrap(), "Shipped X on time");
        assert_eq!(field_text(&mapping, "reason").unwrap(), "met deadline");
    }

    #[test]
    fn test_accepts_bare_json_object_when_schema_sent() {
        let text = r#" {"comment": "Done", "reason": null} "#;
        let mapping = parse_structured(text, &["comment"], ResponseFormat::JsonOrFenced).unwrap();
        assert_eq!(field_text(&mapping, "comment").unwrap(), "Done");
        assert_eq!(field_text(&mapping, "reason").unwrap(), "");
    }

    #[test]
    fn test_bare_json_object_needs_fence_otherwise() {
        let text = r#"{"comment": "Shipped X on time", "reason": "met deadline"}"#;
        let err = parse_structured(text, &["comment"], ResponseFormat::Fenced).unwrap_err();
        assert_eq!(err, ResponseError::MissingFence);
    }

    #[test]
    fn test_fence_still_read_when_schema_sent() {
        let mapping = parse_structured(FENCED, &["comment"], ResponseFormat::JsonOrFenced).unwrap();
        assert_eq!(field_text(&mapping, "comment").unwrap(), "Shipped X on time");
    }

    #[test]
    fn test_missing_fence() {
        let err = parse_structured("comment: Shipped X on time", &["comment"], ResponseFormat::Fenced).unwrap_err();
        assert_eq!(err, ResponseError::MissingFence);
    }

    #[test]
    fn test_untagged_fence_is_missing() {
        let err = parse_structured("```\ncomment: x\n```", &["comment"], ResponseFormat::Fenced).unwrap_err();
        assert_eq!(err, ResponseError::MissingFence);
    }

    #[test]
    fn test_unterminated_fence() {
        let err = parse_structured("```yaml\ncomment: x\n", &["comment"], ResponseFormat::Fenced).unwrap_err();
        assert_eq!(err, ResponseError::UnterminatedFence);
    }

    #[test]
    fn test_invalid_syntax() {
        let err = parse_structured("```yaml\ncomment: [oops\n```", &["comment"], ResponseFormat::Fenced).unwrap_err();
        assert!(matches!(err, ResponseError::InvalidSyntax(_)));
    }

    #[test]
    fn test_not_a_mapping() {
        let err = parse_structured("```yaml\n- a\n- b\n```", &["comment"], ResponseFormat::Fenced).unwrap_err();
        assert_eq!(err, ResponseError::NotAMapping);
    }

    #[test]
    fn test_missing_required_field() {
        let err = parse_structured("```yaml\nreason: because\n```", &["comment"], ResponseFormat::Fenced).unwrap_err();
        assert_eq!(err, ResponseError::MissingField("comment".to_string()));
    }

    #[test]
    fn test_normalize_curly_apostrophe() {
        assert_eq!(normalize_punctuation("I\u{2019}ve shipped"), "I've shipped");
    }

    #[test]
    fn test_field_bool_spellings() {
        let mapping = parse_structured("```yaml\na: true\nb: \"False\"\nc: maybe\n```", &[], ResponseFormat::Fenced).unwrap();
        assert_eq!(field_bool(&mapping, "a"), Some(true));
        assert_eq!(field_bool(&mapping, "b"), Some(false));
        assert_eq!(field_bool(&mapping, "c"), None);
        assert_eq!(field_bool(&mapping, "d"), None);
    }
}
