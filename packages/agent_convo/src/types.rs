use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Author used for entries produced by the assistant (text and tool calls).
pub const AI_AUTHOR: &str = "ai";
/// Author used for errors reported by the remote side or the connection.
pub const SYSTEM_AUTHOR: &str = "system";
/// Author used for errors raised locally while sending.
pub const ERROR_AUTHOR: &str = "error";

/// Unique identifier for a conversation entry.
///
/// Backed by a random UUID so entries created within the same clock tick
/// still get distinct ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntryId(pub Uuid);

impl EntryId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for EntryId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for EntryId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Human,
    Ai,
    Tool,
    Error,
    Stop,
}

impl std::str::FromStr for EntryKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "human" => Ok(EntryKind::Human),
            "ai" => Ok(EntryKind::Ai),
            "tool" => Ok(EntryKind::Tool),
            "error" => Ok(EntryKind::Error),
            "stop" => Ok(EntryKind::Stop),
            _ => Err(format!("Invalid entry kind: {}", s)),
        }
    }
}

/// Current time in milliseconds since the Unix epoch.
pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// One entry of the conversation log.
///
/// `text` keeps growing while an `Ai` entry is open (`done == Some(false)`)
/// and is never touched again once the entry is sealed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationEntry {
    #[serde(default)]
    pub id: EntryId,

    pub author: String,

    pub text: String,

    #[serde(default = "now_ms")]
    pub timestamp: i64,

    pub kind: EntryKind,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub done: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_args: Option<Value>,
}

impl ConversationEntry {
    fn new(author: impl Into<String>, text: impl Into<String>, kind: EntryKind) -> Self {
        Self {
            id: EntryId::new(),
            author: author.into(),
            text: text.into(),
            timestamp: now_ms(),
            kind,
            done: None,
            tool_name: None,
            tool_args: None,
        }
    }

    pub fn human(own_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(own_id, text, EntryKind::Human)
    }

    /// An assistant entry that still expects deltas.
    pub fn ai_streaming(text: impl Into<String>) -> Self {
        Self {
            done: Some(false),
            ..Self::new(AI_AUTHOR, text, EntryKind::Ai)
        }
    }

    /// An assistant entry that is already sealed.
    pub fn ai_done(text: impl Into<String>) -> Self {
        Self {
            done: Some(true),
            ..Self::new(AI_AUTHOR, text, EntryKind::Ai)
        }
    }

    pub fn tool(name: impl Into<String>, args: Value) -> Self {
        let name = name.into();
        Self {
            tool_name: Some(name.clone()),
            tool_args: Some(args),
            ..Self::new(AI_AUTHOR, format!("Tool call: {}", name), EntryKind::Tool)
        }
    }

    pub fn error(author: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(author, text, EntryKind::Error)
    }

    /// True for an assistant entry that is still receiving deltas.
    pub fn is_open_ai(&self) -> bool {
        self.kind == EntryKind::Ai && self.done == Some(false)
    }

    /// Seal an assistant entry. No-op for other kinds.
    pub fn seal(&mut self) {
        if self.kind == EntryKind::Ai {
            self.done = Some(true);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_unique_within_a_tick() {
        let a = ConversationEntry::human("me", "one");
        let b = ConversationEntry::human("me", "two");
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_tool_entry_carries_name_and_args() {
        let entry = ConversationEntry::tool("search", Value::String("{\"q\":1}".into()));
        assert_eq!(entry.kind, EntryKind::Tool);
        assert_eq!(entry.author, AI_AUTHOR);
        assert_eq!(entry.text, "Tool call: search");
        assert_eq!(entry.tool_name.as_deref(), Some("search"));
        assert!(entry.done.is_none());
    }

    #[test]
    fn test_seal_only_touches_ai() {
        let mut human = ConversationEntry::human("me", "hi");
        human.seal();
        assert!(human.done.is_none());

        let mut ai = ConversationEntry::ai_streaming("partial");
        assert!(ai.is_open_ai());
        ai.seal();
        assert_eq!(ai.done, Some(true));
        assert!(!ai.is_open_ai());
    }

    #[test]
    fn test_entry_serializes_camel_case() {
        let entry = ConversationEntry::tool("lookup", serde_json::json!({"id": 7}));
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["kind"], "tool");
        assert_eq!(json["toolName"], "lookup");
        assert_eq!(json["toolArgs"]["id"], 7);
        assert!(json.get("done").is_none());
    }

    #[test]
    fn test_entry_deserializes_without_id_or_timestamp() {
        let entry: ConversationEntry =
            serde_json::from_str(r#"{"author":"ai","text":"hi","kind":"ai","done":true}"#)
                .unwrap();
        assert_eq!(entry.kind, EntryKind::Ai);
        assert_eq!(entry.done, Some(true));
        assert!(entry.timestamp > 0);
    }

    #[test]
    fn test_kind_from_str() {
        assert_eq!("AI".parse::<EntryKind>(), Ok(EntryKind::Ai));
        assert!("robot".parse::<EntryKind>().is_err());
    }
}
