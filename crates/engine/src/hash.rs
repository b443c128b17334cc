//! Prompt hashing and char-safe text clipping.

use serde_json::Value;
use sha2::{Digest, Sha256};

/// Cache key of a request: SHA-256 hex over `[action, prompt, context]`
/// serialized as JSON.
///
/// The JSON array keeps field boundaries unambiguous, so `("ab", "c")` and
/// `("a", "bc")` never share a key.
pub fn prompt_hash(action: &str, prompt: &str, context: &Value) -> String {
    let canonical = serde_json::json!([action, prompt, context]).to_string();
    let digest = Sha256::digest(canonical.as_bytes());
    format!("{digest:x}")
}

/// The first `max_chars` characters of `text`.
pub fn clip(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

pub fn char_len(text: &str) -> usize {
    text.chars().count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn hash_is_stable_hex() {
        let a = prompt_hash("chat", "Olá", &Value::Null);
        let b = prompt_hash("chat", "Olá", &Value::Null);
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn every_component_changes_the_hash() {
        let base = prompt_hash("chat", "Olá", &json!({"banca": "CESGRANRIO"}));
        assert_ne!(base, prompt_hash("generate_document", "Olá", &json!({"banca": "CESGRANRIO"})));
        assert_ne!(base, prompt_hash("chat", "Oi", &json!({"banca": "CESGRANRIO"})));
        assert_ne!(base, prompt_hash("chat", "Olá", &json!({"banca": "FGV"})));
        assert_ne!(base, prompt_hash("chat", "Olá", &Value::Null));
    }

    #[test]
    fn field_boundaries_matter() {
        assert_ne!(
            prompt_hash("chat", "ab", &Value::Null),
            prompt_hash("chatab", "", &Value::Null)
        );
    }

    #[test]
    fn clip_respects_char_boundaries() {
        assert_eq!(clip("questões", 6), "questõ");
        assert_eq!(clip("abc", 10), "abc");
        assert_eq!(clip("", 3), "");
        assert_eq!(char_len("ção"), 3);
    }
}
