use crate::errors::{ClickSightError, ClickSightResult};
use crate::grounding::types::{StreamChunk, StreamChunkKind};

/// Parses a raw SSE line (OpenAI-compatible format) into a StreamChunk.
/// Returns None if the line is a keep-alive or non-data line.
pub fn parse_sse_line(line: &str) -> ClickSightResult<Option<StreamChunk>> {
    if line.is_empty() || line.starts_with(':') {
        return Ok(None);
    }

    let data = match line.strip_prefix("data:") {
        Some(d) => d.trim(),
        None => return Ok(None),
    };

    if data == "[DONE]" {
        return Ok(Some(StreamChunk {
            kind: StreamChunkKind::Done,
            content: String::new(),
        }));
    }

    let json: serde_json::Value =
        serde_json::from_str(data).map_err(|e| ClickSightError::SseParsing(e.to_string()))?;

    let Some(first) = json["choices"].as_array().and_then(|c| c.first()) else {
        return Ok(None);
    };
    let delta = &first["delta"];

    // Some serving stacks stream a separate reasoning channel before the answer.
    if let Some(reasoning) = delta["reasoning_content"].as_str() {
        if !reasoning.is_empty() {
            return Ok(Some(StreamChunk {
                kind: StreamChunkKind::Reasoning,
                content: reasoning.to_string(),
            }));
        }
    }

    if let Some(content) = delta["content"].as_str() {
        if !content.is_empty() {
            return Ok(Some(StreamChunk {
                kind: StreamChunkKind::Content,
                content: content.to_string(),
            }));
        }
    }

    if first["finish_reason"].as_str().is_some() {
        return Ok(Some(StreamChunk {
            kind: StreamChunkKind::Done,
            content: String::new(),
        }));
    }

    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_delta() {
        let line = r#"data: {"choices":[{"delta":{"content":"[0.5"},"finish_reason":null}]}"#;
        let chunk = parse_sse_line(line).unwrap().unwrap();
        assert_eq!(chunk.kind, StreamChunkKind::Content);
        assert_eq!(chunk.content, "[0.5");
    }

    #[test]
    fn done_marker_and_finish_reason() {
        let done = parse_sse_line("data: [DONE]").unwrap().unwrap();
        assert_eq!(done.kind, StreamChunkKind::Done);
        let line = r#"data: {"choices":[{"delta":{},"finish_reason":"stop"}]}"#;
        assert_eq!(
            parse_sse_line(line).unwrap().unwrap().kind,
            StreamChunkKind::Done
        );
    }

    #[test]
    fn keep_alives_and_other_fields_are_skipped() {
        assert!(parse_sse_line(": ping").unwrap().is_none());
        assert!(parse_sse_line("event: message").unwrap().is_none());
        assert!(parse_sse_line(r#"data: {"choices":[]}"#).unwrap().is_none());
    }

    #[test]
    fn malformed_json_is_an_error() {
        assert_eq!(
            parse_sse_line("data: {not json").unwrap_err().kind(),
            "sse_parsing"
        );
    }
}
