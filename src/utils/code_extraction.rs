//! Normalization of LLM responses into executable source and final answers.
//!
//! Models are told not to use markdown, but they do anyway; stripping
//! surrounding code fences is mandatory before a response can be treated as
//! raw source. The final pipeline stage's stdout is similarly normalized
//! into a JSON array.

use regex::Regex;
use serde_json::Value;
use thiserror::Error;

/// Errors from parsing the analysis stage's final stdout payload.
#[derive(Debug, Error)]
pub enum AnswerParseError {
    #[error("analysis script produced no output")]
    Empty,

    #[error("analysis output is not valid JSON ({reason}); output starts with: '{preview}'")]
    NotJson { reason: String, preview: String },

    #[error("analysis output is valid JSON but not an array (got {found})")]
    NotArray { found: &'static str },
}

/// Strips surrounding markdown code fences from generated source text.
///
/// Handles the common response shapes: a single fenced block with or
/// without a language tag, and stray fence markers mixed into otherwise
/// plain code. Unfenced text passes through trimmed.
pub fn strip_code_fences(text: &str) -> String {
    let trimmed = text.trim();

    if let Ok(re) = Regex::new(r"(?s)^```[A-Za-z0-9_+-]*[ \t]*\n?(.*?)\n?```$") {
        if let Some(caps) = re.captures(trimmed) {
            return caps[1].trim().to_string();
        }
    }

    // Fallback for fences that do not wrap the whole response cleanly.
    trimmed
        .replace("```python", "")
        .replace("```", "")
        .trim()
        .to_string()
}

/// Parses the final stage's stdout as a single-line JSON array.
pub fn parse_answer_payload(stdout: &str) -> Result<Value, AnswerParseError> {
    let payload = stdout.trim();
    if payload.is_empty() {
        return Err(AnswerParseError::Empty);
    }

    let value: Value = serde_json::from_str(payload).map_err(|e| {
        let preview_len = payload.len().min(80);
        AnswerParseError::NotJson {
            reason: e.to_string(),
            preview: payload[..preview_len].to_string(),
        }
    })?;

    if !value.is_array() {
        return Err(AnswerParseError::NotArray {
            found: json_type_name(&value),
        });
    }

    Ok(value)
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_strip_python_fence() {
        let input = "```python\nimport requests\nprint('ok')\n```";
        assert_eq!(strip_code_fences(input), "import requests\nprint('ok')");
    }

    #[test]
    fn test_strip_bare_fence() {
        let input = "```\nprint('ok')\n```";
        assert_eq!(strip_code_fences(input), "print('ok')");
    }

    #[test]
    fn test_unfenced_code_passes_through() {
        let input = "  import pandas as pd\nprint(len(pd.DataFrame()))  ";
        assert_eq!(
            strip_code_fences(input),
            "import pandas as pd\nprint(len(pd.DataFrame()))"
        );
    }

    #[test]
    fn test_strip_fence_with_surrounding_whitespace() {
        let input = "\n\n```python\nx = 1\n```\n";
        assert_eq!(strip_code_fences(input), "x = 1");
    }

    #[test]
    fn test_stray_fence_markers_removed() {
        let input = "print('a')\n```\nprint('b')";
        let stripped = strip_code_fences(input);
        assert!(!stripped.contains("```"));
        assert!(stripped.contains("print('a')"));
        assert!(stripped.contains("print('b')"));
    }

    #[test]
    fn test_code_with_triple_backtick_free_content_unchanged() {
        let input = "print('hello world')";
        assert_eq!(strip_code_fences(input), input);
    }

    #[test]
    fn test_parse_answer_array() {
        let stdout = "[\"42\", \"Movie X\", \"2021\", \"data:image/png;base64,AAAA\"]\n";
        let value = parse_answer_payload(stdout).unwrap();
        assert_eq!(
            value,
            json!(["42", "Movie X", "2021", "data:image/png;base64,AAAA"])
        );
    }

    #[test]
    fn test_parse_answer_rejects_empty() {
        assert!(matches!(
            parse_answer_payload("   \n"),
            Err(AnswerParseError::Empty)
        ));
    }

    #[test]
    fn test_parse_answer_rejects_invalid_json() {
        let err = parse_answer_payload("Done! The answer is 42.").unwrap_err();
        match err {
            AnswerParseError::NotJson { preview, .. } => {
                assert!(preview.starts_with("Done!"));
            }
            other => panic!("expected NotJson, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_answer_rejects_non_array() {
        let err = parse_answer_payload("{\"answer\": 42}").unwrap_err();
        assert!(matches!(err, AnswerParseError::NotArray { found: "an object" }));
    }
}
