//! Request bodies of the two AI endpoints, validated field by field.
//!
//! Bodies arrive as loose JSON. Validation collects every problem instead
//! of stopping at the first, so a 400 reply can list them all.

use crate::action::{Action, ChatAction};
use crate::hash::char_len;
use serde_json::{Map, Value};
use simulai_core::{EngineError, EngineKind, FieldError, Message, Role};
use uuid::Uuid;

/// A validated `unified-ai-engine` request.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineRequest {
    pub action: Action,
    pub prompt: Option<String>,
    pub system_prompt: Option<String>,
    pub messages: Vec<Message>,
    pub context: Option<Value>,
    pub preferred_engine: Option<EngineKind>,
    pub skip_cache: bool,
    /// Accepted for compatibility; the authenticated identity wins.
    pub user_id: Option<String>,
}

impl EngineRequest {
    /// A prompt-only request.
    pub fn new(action: Action, prompt: impl Into<String>) -> Self {
        Self {
            action,
            prompt: Some(prompt.into()),
            system_prompt: None,
            messages: Vec::new(),
            context: None,
            preferred_engine: None,
            skip_cache: false,
            user_id: None,
        }
    }

    pub fn with_preferred_engine(mut self, engine: Option<EngineKind>) -> Self {
        self.preferred_engine = engine;
        self
    }

    pub fn with_skip_cache(mut self, skip: bool) -> Self {
        self.skip_cache = skip;
        self
    }

    pub fn with_context(mut self, context: Value) -> Self {
        self.context = Some(context);
        self
    }

    /// Validate a raw JSON body. `max_chars` bounds `prompt` and `systemPrompt`.
    pub fn from_json(body: &Value, max_chars: usize) -> Result<Self, EngineError> {
        let obj = as_object(body)?;
        let mut errors = Vec::new();

        let action = match present(obj, "action") {
            None => {
                errors.push(FieldError::new("action", "action is required"));
                None
            }
            Some(Value::String(s)) => match s.parse::<Action>() {
                Ok(action) => Some(action),
                Err(_) => {
                    errors.push(FieldError::new("action", one_of(&Action::ALL.map(|a| a.as_str()))));
                    None
                }
            },
            Some(_) => {
                errors.push(FieldError::new("action", "must be a string"));
                None
            }
        };

        let prompt = bounded_string(obj, "prompt", max_chars, &mut errors);
        let system_prompt = bounded_string(obj, "systemPrompt", max_chars, &mut errors);

        let messages = match present(obj, "messages") {
            None => Vec::new(),
            Some(Value::Array(items)) => parse_messages(items, &mut errors),
            Some(_) => {
                errors.push(FieldError::new("messages", "must be an array"));
                Vec::new()
            }
        };

        if prompt.as_deref().is_none_or(str::is_empty) && messages.is_empty() {
            errors.push(FieldError::new("prompt", "prompt or messages is required"));
        }

        let preferred_engine = match present(obj, "preferredEngine") {
            None => None,
            Some(Value::String(s)) => match s.parse::<EngineKind>() {
                Ok(engine) => Some(engine),
                Err(_) => {
                    errors.push(FieldError::new(
                        "preferredEngine",
                        one_of(&EngineKind::ALL.map(|e| e.as_str())),
                    ));
                    None
                }
            },
            Some(_) => {
                errors.push(FieldError::new("preferredEngine", "must be a string"));
                None
            }
        };

        let skip_cache = match present(obj, "skipCache") {
            None => false,
            Some(Value::Bool(b)) => *b,
            Some(_) => {
                errors.push(FieldError::new("skipCache", "must be a boolean"));
                false
            }
        };

        let user_id = match present(obj, "userId") {
            None => None,
            Some(Value::String(s)) => Some(s.clone()),
            Some(_) => {
                errors.push(FieldError::new("userId", "must be a string"));
                None
            }
        };

        match action {
            Some(action) if errors.is_empty() => Ok(Self {
                action,
                prompt,
                system_prompt,
                messages,
                context: present(obj, "context").cloned(),
                preferred_engine,
                skip_cache,
                user_id,
            }),
            _ => Err(EngineError::Validation(errors)),
        }
    }

    /// Text standing in for the prompt in the cache key and preview: the
    /// prompt itself, or the serialized messages when there is none.
    pub fn prompt_text(&self) -> String {
        match &self.prompt {
            Some(prompt) if !prompt.is_empty() => prompt.clone(),
            _ => serde_json::to_string(&self.messages).unwrap_or_default(),
        }
    }
}

/// A validated `ai-agent-chat` request.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatRequest {
    pub message: String,
    pub session_id: Uuid,
    pub action: ChatAction,
    pub context: Option<Value>,
}

impl ChatRequest {
    pub fn from_json(body: &Value, max_chars: usize) -> Result<Self, EngineError> {
        let obj = as_object(body)?;
        let mut errors = Vec::new();

        let message = bounded_string(obj, "message", max_chars, &mut errors);
        if message.as_deref().is_none_or(|m| m.trim().is_empty())
            && !errors.iter().any(|e| e.field == "message")
        {
            errors.push(FieldError::new("message", "message is required"));
        }

        let session_id = match present(obj, "sessionId") {
            None => {
                errors.push(FieldError::new("sessionId", "sessionId is required"));
                None
            }
            Some(Value::String(s)) => match Uuid::parse_str(s) {
                Ok(id) => Some(id),
                Err(_) => {
                    errors.push(FieldError::new("sessionId", "must be a UUID"));
                    None
                }
            },
            Some(_) => {
                errors.push(FieldError::new("sessionId", "must be a UUID"));
                None
            }
        };

        let action = match present(obj, "action") {
            None => ChatAction::default(),
            Some(Value::String(s)) => s.parse::<ChatAction>().unwrap_or_else(|_| {
                errors.push(FieldError::new(
                    "action",
                    one_of(&ChatAction::ALL.map(|a| a.as_str())),
                ));
                ChatAction::default()
            }),
            Some(_) => {
                errors.push(FieldError::new("action", "must be a string"));
                ChatAction::default()
            }
        };

        match (message, session_id) {
            (Some(message), Some(session_id)) if errors.is_empty() => Ok(Self {
                message,
                session_id,
                action,
                context: present(obj, "context").cloned(),
            }),
            _ => Err(EngineError::Validation(errors)),
        }
    }
}

fn as_object(body: &Value) -> Result<&Map<String, Value>, EngineError> {
    body.as_object().ok_or_else(|| {
        EngineError::Validation(vec![FieldError::new("body", "must be a JSON object")])
    })
}

/// A field's value, treating an explicit `null` as absent.
fn present<'a>(obj: &'a Map<String, Value>, key: &str) -> Option<&'a Value> {
    obj.get(key).filter(|v| !v.is_null())
}

fn bounded_string(
    obj: &Map<String, Value>,
    key: &str,
    max_chars: usize,
    errors: &mut Vec<FieldError>,
) -> Option<String> {
    match present(obj, key)? {
        Value::String(s) if char_len(s) > max_chars => {
            errors.push(FieldError::new(
                key,
                format!("must be at most {max_chars} characters"),
            ));
            None
        }
        Value::String(s) => Some(s.clone()),
        _ => {
            errors.push(FieldError::new(key, "must be a string"));
            None
        }
    }
}

fn parse_messages(items: &[Value], errors: &mut Vec<FieldError>) -> Vec<Message> {
    let mut messages = Vec::with_capacity(items.len());
    for (i, item) in items.iter().enumerate() {
        let role = match item.get("role") {
            Some(Value::String(s)) => s.parse::<Role>().ok(),
            _ => None,
        };
        let content = item.get("content").and_then(Value::as_str);

        if role.is_none() {
            errors.push(FieldError::new(
                format!("messages[{i}].role"),
                "must be one of: system, user, assistant",
            ));
        }
        if content.is_none() {
            errors.push(FieldError::new(format!("messages[{i}].content"), "must be a string"));
        }
        if let (Some(role), Some(content)) = (role, content) {
            messages.push(Message::new(role, content));
        }
    }
    messages
}

fn one_of(options: &[&str]) -> String {
    format!("must be one of: {}", options.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fields(err: EngineError) -> Vec<String> {
        match err {
            EngineError::Validation(errors) => errors.into_iter().map(|e| e.field).collect(),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn minimal_request() {
        let req = EngineRequest::from_json(&json!({"action": "chat", "prompt": "Olá"}), 50_000).unwrap();
        assert_eq!(req.action, Action::Chat);
        assert_eq!(req.prompt.as_deref(), Some("Olá"));
        assert!(!req.skip_cache);
        assert!(req.context.is_none());
    }

    #[test]
    fn full_request() {
        let req = EngineRequest::from_json(
            &json!({
                "action": "generate_questions",
                "prompt": "5 questões de matemática financeira",
                "systemPrompt": "Seja objetivo",
                "messages": [{"role": "user", "content": "antes"}],
                "context": {"banca": "CESGRANRIO"},
                "preferredEngine": "gemini",
                "skipCache": true,
                "userId": "u-1"
            }),
            50_000,
        )
        .unwrap();
        assert_eq!(req.preferred_engine, Some(EngineKind::Gemini));
        assert!(req.skip_cache);
        assert_eq!(req.messages.len(), 1);
        assert_eq!(req.context, Some(json!({"banca": "CESGRANRIO"})));
        assert_eq!(req.user_id.as_deref(), Some("u-1"));
    }

    #[test]
    fn missing_action_and_input() {
        let err = EngineRequest::from_json(&json!({}), 50_000).unwrap_err();
        assert_eq!(fields(err), vec!["action", "prompt"]);
    }

    #[test]
    fn every_bad_field_is_reported() {
        let err = EngineRequest::from_json(
            &json!({
                "action": "summarize",
                "prompt": "x".repeat(11),
                "preferredEngine": "openai",
                "skipCache": "yes",
                "messages": [{"role": "robot", "content": 1}]
            }),
            10,
        )
        .unwrap_err();
        assert_eq!(
            fields(err),
            vec![
                "action",
                "prompt",
                "messages[0].role",
                "messages[0].content",
                "prompt",
                "preferredEngine",
                "skipCache"
            ]
        );
    }

    #[test]
    fn length_limit_counts_chars() {
        let ok = EngineRequest::from_json(&json!({"action": "chat", "prompt": "ção"}), 3);
        assert!(ok.is_ok());
        let too_long = EngineRequest::from_json(&json!({"action": "chat", "systemPrompt": "abcd", "prompt": "a"}), 3);
        assert_eq!(fields(too_long.unwrap_err()), vec!["systemPrompt"]);
    }

    #[test]
    fn messages_alone_are_enough() {
        let req = EngineRequest::from_json(
            &json!({"action": "chat", "messages": [{"role": "user", "content": "Oi"}]}),
            50_000,
        )
        .unwrap();
        assert!(req.prompt.is_none());
        assert!(req.prompt_text().contains("Oi"));
    }

    #[test]
    fn nulls_are_absent() {
        let req = EngineRequest::from_json(
            &json!({"action": "chat", "prompt": "a", "context": null, "preferredEngine": null}),
            50_000,
        )
        .unwrap();
        assert!(req.context.is_none());
        assert!(req.preferred_engine.is_none());
    }

    #[test]
    fn non_object_body() {
        assert_eq!(fields(EngineRequest::from_json(&json!([1]), 10).unwrap_err()), vec!["body"]);
    }

    #[test]
    fn chat_request() {
        let id = Uuid::new_v4();
        let req = ChatRequest::from_json(
            &json!({"message": "Explique CDB", "sessionId": id.to_string(), "action": "generate_document"}),
            50_000,
        )
        .unwrap();
        assert_eq!(req.session_id, id);
        assert_eq!(req.action, ChatAction::GenerateDocument);

        let req = ChatRequest::from_json(&json!({"message": "Oi", "sessionId": id.to_string()}), 50_000).unwrap();
        assert_eq!(req.action, ChatAction::Chat);
    }

    #[test]
    fn chat_request_errors() {
        let err = ChatRequest::from_json(
            &json!({"message": "  ", "sessionId": "abc", "action": "generate_questions"}),
            50_000,
        )
        .unwrap_err();
        assert_eq!(fields(err), vec!["message", "sessionId", "action"]);
    }
}
