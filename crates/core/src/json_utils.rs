//! Helpers for pulling structured payloads out of model replies.

/// Strip markdown code block wrappers from JSON content.
///
/// Handles `` ```json ... ``` ``, `` ``` ... ``` `` and other language identifiers.
#[must_use]
pub fn strip_markdown_json(content: &str) -> &str {
    let trimmed = content.trim();
    if trimmed.starts_with("```") && trimmed.ends_with("```") && trimmed.len() >= 6 {
        let without_prefix = trimmed.strip_prefix("```").unwrap_or(trimmed);
        let without_suffix = without_prefix.strip_suffix("```").unwrap_or(without_prefix);
        return without_suffix
            .split_once('\n')
            .map_or_else(|| without_suffix.trim(), |(_, rest)| rest.trim());
    }
    trimmed
}

/// Returns the outermost `{ ... }` span of a reply, tolerating chatter the
/// model adds around the object.
#[must_use]
pub fn extract_json_object(content: &str) -> Option<&str> {
    let stripped = strip_markdown_json(content);
    let start = stripped.find('{')?;
    let end = stripped.rfind('}')?;
    if end < start {
        return None;
    }
    stripped.get(start..=end)
}

/// Parses a model reply into `T`, accepting fenced or chatty JSON.
///
/// # Errors
/// Returns the `serde_json` error when no object can be decoded.
pub fn parse_model_json<T: serde::de::DeserializeOwned>(content: &str) -> serde_json::Result<T> {
    let candidate = extract_json_object(content).unwrap_or_else(|| strip_markdown_json(content));
    serde_json::from_str(candidate)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_json_block() {
        let input = "```json\n{\"key\": \"value\"}\n```";
        assert_eq!(strip_markdown_json(input), "{\"key\": \"value\"}");
    }

    #[test]
    fn test_strip_plain_block() {
        let input = "```\n{\"key\": \"value\"}\n```";
        assert_eq!(strip_markdown_json(input), "{\"key\": \"value\"}");
    }

    #[test]
    fn test_no_block() {
        let input = "{\"key\": \"value\"}";
        assert_eq!(strip_markdown_json(input), "{\"key\": \"value\"}");
    }

    #[test]
    fn test_bare_fence_is_left_alone() {
        assert_eq!(strip_markdown_json("```"), "```");
    }

    #[test]
    fn test_extract_object_with_chatter() {
        let input = "Конечно! Вот результат: {\"a\": true} Надеюсь, помог.";
        assert_eq!(extract_json_object(input), Some("{\"a\": true}"));
    }

    #[test]
    fn test_extract_object_missing() {
        assert_eq!(extract_json_object("no json here"), None);
        assert_eq!(extract_json_object("} backwards {"), None);
    }

    #[test]
    fn test_parse_model_json_fenced() {
        #[derive(serde::Deserialize)]
        struct Payload {
            ok: bool,
        }
        let parsed: Payload = parse_model_json("```json\n{\"ok\": true}\n```").unwrap();
        assert!(parsed.ok);
        assert!(parse_model_json::<Payload>("not json").is_err());
    }
}
