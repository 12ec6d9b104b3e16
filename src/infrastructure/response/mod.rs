use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

static THINK_TAG_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<think>[\s\S]*?</think>|<think\s*/>").unwrap());

static REASONING_TAG_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<reasoning>[\s\S]*?</reasoning>").unwrap());

static INTERNAL_TAG_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<internal>[\s\S]*?</internal>").unwrap());

static CODE_FENCE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"```(?:json|JSON)?\s*([\s\S]*?)```").unwrap());

static MULTIPLE_NEWLINES_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());

/// Cleans LLM response by removing reasoning artifacts and unwanted tags
pub fn clean_llm_response(response: &str) -> String {
    let mut cleaned = response.to_string();

    cleaned = THINK_TAG_PATTERN.replace_all(&cleaned, "").to_string();
    cleaned = REASONING_TAG_PATTERN.replace_all(&cleaned, "").to_string();
    cleaned = INTERNAL_TAG_PATTERN.replace_all(&cleaned, "").to_string();

    cleaned = cleaned.trim().to_string();

    // Collapse multiple consecutive newlines into at most two
    MULTIPLE_NEWLINES_PATTERN
        .replace_all(&cleaned, "\n\n")
        .to_string()
}

/// Pull the first JSON object out of model output.
///
/// Accepts bare JSON, fenced blocks and JSON surrounded by prose. Returns `None`
/// rather than an error when nothing parseable is found.
pub fn extract_json(raw_text: &str) -> Option<Value> {
    let cleaned = clean_llm_response(raw_text);
    let trimmed = cleaned.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Some(value) = parse_object(trimmed) {
        return Some(unwrap_chat_envelope(value));
    }

    for captures in CODE_FENCE_PATTERN.captures_iter(trimmed) {
        if let Some(value) = captures.get(1).and_then(|body| parse_object(body.as_str().trim())) {
            return Some(value);
        }
    }

    scan_for_object(trimmed)
}

fn parse_object(text: &str) -> Option<Value> {
    serde_json::from_str::<Value>(text)
        .ok()
        .filter(Value::is_object)
}

/// Raw chat-completion payloads wrap the content we want.
fn unwrap_chat_envelope(value: Value) -> Value {
    let content = value
        .get("choices")
        .and_then(|choices| choices.get(0))
        .and_then(|choice| choice.get("message"))
        .and_then(|message| message.get("content"))
        .and_then(Value::as_str)
        .map(str::to_string);
    match content {
        Some(content) => extract_json(&content).unwrap_or(value),
        None => value,
    }
}

/// Try every `{` as the start of a balanced object, string-literal aware.
fn scan_for_object(text: &str) -> Option<Value> {
    let bytes = text.as_bytes();
    for (start, _) in text.match_indices('{') {
        let mut depth = 0usize;
        let mut in_string = false;
        let mut escaped = false;
        for (offset, &byte) in bytes[start..].iter().enumerate() {
            if in_string {
                match byte {
                    _ if escaped => escaped = false,
                    b'\\' => escaped = true,
                    b'"' => in_string = false,
                    _ => {}
                }
                continue;
            }
            match byte {
                b'"' => in_string = true,
                b'{' => depth += 1,
                b'}' => {
                    depth -= 1;
                    if depth == 0 {
                        let candidate = &text[start..start + offset + 1];
                        if let Some(value) = parse_object(candidate) {
                            return Some(value);
                        }
                        break;
                    }
                }
                _ => {}
            }
        }
    }
    None
}
