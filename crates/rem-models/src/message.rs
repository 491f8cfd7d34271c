//! Session message model and the JSON ingestion boundary.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ModelError;

/// Role of a session message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
    Tool,
    System,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
            MessageRole::Tool => "tool",
            MessageRole::System => "system",
        }
    }
}

impl fmt::Display for MessageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MessageRole {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "user" | "human" => Ok(MessageRole::User),
            "assistant" | "ai" => Ok(MessageRole::Assistant),
            "tool" | "function" => Ok(MessageRole::Tool),
            "system" => Ok(MessageRole::System),
            _ => Err(ModelError::UnknownRole(s.to_string())),
        }
    }
}

/// Single message in a session.
///
/// Created once when an agent turn completes. Only `deleted_at` changes
/// afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub tenant_id: String,
    pub session_id: String,
    #[serde(default)]
    pub user_id: Option<String>,
    pub role: MessageRole,
    /// Compact or full content; `None` for content-less turns.
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub tool_name: Option<String>,
    /// Entity key holding the full text when the content was offloaded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_ref: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Message {
    pub fn new(
        tenant_id: impl Into<String>,
        session_id: impl Into<String>,
        role: MessageRole,
        content: Option<String>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            tenant_id: tenant_id.into(),
            session_id: session_id.into(),
            user_id: None,
            role,
            content,
            tool_name: None,
            content_ref: None,
            created_at: Utc::now(),
            deleted_at: None,
        }
    }

    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_tool_name(mut self, tool_name: impl Into<String>) -> Self {
        self.tool_name = Some(tool_name.into());
        self
    }

    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }

    pub fn with_content_ref(mut self, content_ref: impl Into<String>) -> Self {
        self.content_ref = Some(content_ref.into());
        self
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// Message text, empty when the content is null.
    pub fn text(&self) -> &str {
        self.content.as_deref().unwrap_or("")
    }

    /// Normalize a dict-shaped message into a typed record.
    ///
    /// Accepted keys: `role` (required), `content` (string or null),
    /// `tool_name`, `user_id`, `id`, `content_ref` (strings) and
    /// `created_at` (RFC 3339 string or epoch milliseconds). Other keys are
    /// ignored; wrong types are rejected.
    pub fn from_value(
        tenant_id: &str,
        session_id: &str,
        value: &Value,
    ) -> Result<Self, ModelError> {
        let obj = value
            .as_object()
            .ok_or_else(|| ModelError::InvalidMessage("expected a JSON object".to_string()))?;

        let role = match obj.get("role") {
            Some(Value::String(role)) => role.parse::<MessageRole>()?,
            Some(_) => {
                return Err(ModelError::InvalidMessage(
                    "role must be a string".to_string(),
                ));
            }
            None => return Err(ModelError::InvalidMessage("missing role".to_string())),
        };

        let content = optional_string(obj.get("content"), "content")?;
        let mut message = Message::new(tenant_id, session_id, role, content);
        message.tool_name = optional_string(obj.get("tool_name"), "tool_name")?;
        message.user_id = optional_string(obj.get("user_id"), "user_id")?;
        message.content_ref = optional_string(obj.get("content_ref"), "content_ref")?;
        if let Some(id) = optional_string(obj.get("id"), "id")? {
            message.id = id;
        }

        match obj.get("created_at") {
            None | Some(Value::Null) => {}
            Some(Value::String(raw)) => {
                message.created_at = DateTime::parse_from_rfc3339(raw)
                    .map_err(|e| ModelError::InvalidMessage(format!("created_at: {}", e)))?
                    .with_timezone(&Utc);
            }
            Some(Value::Number(num)) => {
                let millis = num.as_i64().ok_or_else(|| {
                    ModelError::InvalidMessage("created_at must be integer millis".to_string())
                })?;
                message.created_at = Utc.timestamp_millis_opt(millis).single().ok_or_else(
                    || ModelError::InvalidMessage(format!("created_at out of range: {}", millis)),
                )?;
            }
            Some(_) => {
                return Err(ModelError::InvalidMessage(
                    "created_at must be a string or number".to_string(),
                ));
            }
        }

        Ok(message)
    }
}

fn optional_string(value: Option<&Value>, field: &str) -> Result<Option<String>, ModelError> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(ModelError::InvalidMessage(format!(
            "{} must be a string or null",
            field
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_value_normalizes_role_and_content() {
        let msg = Message::from_value(
            "t1",
            "s1",
            &json!({"role": "Human", "content": "hello", "extra": 1}),
        )
        .unwrap();
        assert_eq!(msg.role, MessageRole::User);
        assert_eq!(msg.text(), "hello");
        assert_eq!(msg.tenant_id, "t1");
        assert_eq!(msg.session_id, "s1");
    }

    #[test]
    fn test_from_value_accepts_null_content_and_millis() {
        let msg = Message::from_value(
            "t1",
            "s1",
            &json!({"role": "tool", "content": null, "tool_name": "search", "created_at": 1_700_000_000_000i64}),
        )
        .unwrap();
        assert!(msg.content.is_none());
        assert_eq!(msg.tool_name.as_deref(), Some("search"));
        assert_eq!(msg.created_at.timestamp_millis(), 1_700_000_000_000);
    }

    #[test]
    fn test_from_value_rejects_bad_shapes() {
        assert!(Message::from_value("t1", "s1", &json!("text")).is_err());
        assert!(Message::from_value("t1", "s1", &json!({"content": "x"})).is_err());
        assert!(Message::from_value("t1", "s1", &json!({"role": "robot"})).is_err());
        assert!(Message::from_value("t1", "s1", &json!({"role": "user", "content": 3})).is_err());
        assert!(
            Message::from_value("t1", "s1", &json!({"role": "user", "created_at": "yesterday"}))
                .is_err()
        );
    }

    #[test]
    fn test_role_serializes_lowercase() {
        let json = serde_json::to_string(&MessageRole::Assistant).unwrap();
        assert_eq!(json, "\"assistant\"");
    }
}
