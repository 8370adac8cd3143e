//! Decoding of free-form oracle responses.
//!
//! Models wrap their JSON in prose or markdown fences, so the decoder strips
//! a fenced block when present and then keeps the outermost `{...}` span.

use serde_json::{Map, Value};

use crate::error::ParseError;

pub fn parse_json_object(content: &str) -> Result<Map<String, Value>, ParseError> {
    let unfenced = strip_code_fence(content.trim());
    let span = outermost_object(unfenced).ok_or(ParseError::NoJsonObject)?;

    match serde_json::from_str::<Value>(span)? {
        Value::Object(map) => Ok(map),
        _ => Err(ParseError::NoJsonObject),
    }
}

/// Parse the response and pull out one nested object, e.g. `evaluation`.
pub fn parse_nested_object(content: &str, key: &str) -> Result<Map<String, Value>, ParseError> {
    let mut map = parse_json_object(content)?;
    match map.remove(key) {
        Some(Value::Object(inner)) => Ok(inner),
        _ => Err(ParseError::MissingField(key.to_string())),
    }
}

fn strip_code_fence(content: &str) -> &str {
    let (open, skip) = if let Some(pos) = content.find("```json") {
        (pos, "```json".len())
    } else if let Some(pos) = content.find("```") {
        (pos, "```".len())
    } else {
        return content;
    };

    let body_start = open + skip;
    match content[body_start..].find("```") {
        Some(len) => content[body_start..body_start + len].trim(),
        None => content,
    }
}

fn outermost_object(content: &str) -> Option<&str> {
    let start = content.find('{')?;
    let end = content.rfind('}')?;
    (end > start).then(|| &content[start..=end])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_object() {
        let map = parse_json_object(r#"{"events": []}"#).unwrap();
        assert!(map.contains_key("events"));
    }

    #[test]
    fn strips_fences_and_prose() {
        let content = "Here you go:\n```json\n{\"actors\": [{\"name\": \"WHO\"}]}\n```\n\
                       Hope this helps!";
        let map = parse_json_object(content).unwrap();
        assert_eq!(map["actors"][0]["name"], "WHO");
    }

    #[test]
    fn keeps_outermost_braces() {
        let content = r#"Result: {"evaluation": {"overall_confidence": 4}} -- end"#;
        let inner = parse_nested_object(content, "evaluation").unwrap();
        assert_eq!(inner["overall_confidence"], 4);
    }

    #[test]
    fn unterminated_fence_falls_back_to_braces() {
        let content = "```json\n{\"relationships\": []}";
        assert!(parse_json_object(content).is_ok());
    }

    #[test]
    fn reports_missing_object() {
        assert!(matches!(
            parse_json_object("I could not find anything."),
            Err(ParseError::NoJsonObject)
        ));
        assert!(matches!(
            parse_json_object("{ not json }"),
            Err(ParseError::Json(_))
        ));
        assert!(matches!(
            parse_nested_object(r#"{"other": 1}"#, "evaluation"),
            Err(ParseError::MissingField(_))
        ));
    }
}
