//! Inbound frame schema.
//!
//! Frames are a loose envelope: every field is optional and a single frame
//! may carry an error, tool invocations, text fragments and a completion
//! flag at the same time.

use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct InboundFrame {
    #[serde(default)]
    pub error: Option<String>,

    #[serde(default)]
    pub metadata: Option<FrameMetadata>,

    #[serde(default)]
    pub done: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FrameMetadata {
    #[serde(default)]
    pub model_request: Option<ModelRequest>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ModelRequest {
    #[serde(default)]
    pub messages: Option<Vec<ModelMessage>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ModelMessage {
    /// LangChain serializers emit this object as `kwargs`.
    #[serde(default, alias = "kwargs")]
    pub role_payload: Option<RolePayload>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RolePayload {
    /// A plain string, or a list of content blocks. See [`RolePayload::text`].
    #[serde(default)]
    pub content: Option<Value>,

    #[serde(default)]
    pub tool_calls: Option<Vec<ToolCall>>,
}

impl RolePayload {
    /// Text carried by `content`.
    ///
    /// Block lists contribute their string elements and the `text` field of
    /// each block; other blocks (images, tool use) add nothing. Content of
    /// any other shape yields `None`.
    pub fn text(&self) -> Option<String> {
        match self.content.as_ref()? {
            Value::String(text) => Some(text.clone()),
            Value::Array(blocks) => Some(
                blocks
                    .iter()
                    .filter_map(|block| match block {
                        Value::String(text) => Some(text.as_str()),
                        other => other.get("text")?.as_str(),
                    })
                    .collect(),
            ),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ToolCall {
    /// Empty when the invocation arrived without a name.
    #[serde(default)]
    pub name: String,

    /// Either a JSON-encoded string or an already decoded object.
    #[serde(default)]
    pub args: Value,
}

impl InboundFrame {
    /// Validate a parsed JSON value against the frame schema.
    ///
    /// Returns `None` when the value does not fit the schema or carries none
    /// of the recognized fields.
    pub fn from_value(value: &Value) -> Option<Self> {
        let frame: InboundFrame = serde_json::from_value(value.clone()).ok()?;
        frame.is_recognized().then_some(frame)
    }

    fn is_recognized(&self) -> bool {
        self.error.is_some() || self.messages().is_some() || self.done.is_some()
    }

    pub fn messages(&self) -> Option<&[ModelMessage]> {
        self.metadata
            .as_ref()?
            .model_request
            .as_ref()?
            .messages
            .as_deref()
    }

    /// Tool invocations in frame order, across all messages.
    pub fn tool_calls(&self) -> impl Iterator<Item = &ToolCall> {
        self.messages()
            .unwrap_or_default()
            .iter()
            .filter_map(|m| m.role_payload.as_ref())
            .filter_map(|p| p.tool_calls.as_deref())
            .flatten()
    }

    /// All text fragments of this frame joined in frame order.
    ///
    /// `None` when the frame carries no messages at all. A frame with
    /// messages but no content yields an empty delta.
    pub fn text_delta(&self) -> Option<String> {
        let messages = self.messages().filter(|m| !m.is_empty())?;
        Some(
            messages
                .iter()
                .filter_map(|m| m.role_payload.as_ref())
                .filter_map(RolePayload::text)
                .collect(),
        )
    }

    pub fn is_completion(&self) -> bool {
        self.done == Some(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_unrecognized_object_is_rejected() {
        assert!(InboundFrame::from_value(&json!({"hello": "world"})).is_none());
        assert!(InboundFrame::from_value(&json!({"metadata": {}})).is_none());
        assert!(InboundFrame::from_value(&json!("just a string")).is_none());
    }

    #[test]
    fn test_wrong_field_type_is_rejected() {
        assert!(InboundFrame::from_value(&json!({"done": "yes"})).is_none());
        assert!(InboundFrame::from_value(&json!({"error": {"code": 1}})).is_none());
    }

    #[test]
    fn test_text_delta_joins_in_order() {
        let frame = InboundFrame::from_value(&json!({
            "metadata": {"model_request": {"messages": [
                {"role_payload": {"content": "Hel"}},
                {"role_payload": {"content": "lo"}},
            ]}}
        }))
        .unwrap();
        assert_eq!(frame.text_delta().as_deref(), Some("Hello"));
        assert!(!frame.is_completion());
    }

    #[test]
    fn test_kwargs_alias() {
        let frame = InboundFrame::from_value(&json!({
            "metadata": {"model_request": {"messages": [
                {"kwargs": {"content": "hi", "tool_calls": [{"name": "a", "args": "{}"}]}}
            ]}}
        }))
        .unwrap();
        assert_eq!(frame.text_delta().as_deref(), Some("hi"));
        assert_eq!(frame.tool_calls().count(), 1);
    }

    #[test]
    fn test_empty_messages_have_no_delta() {
        let frame = InboundFrame::from_value(&json!({
            "metadata": {"model_request": {"messages": []}}
        }))
        .unwrap();
        assert!(frame.text_delta().is_none());
        assert_eq!(frame.tool_calls().count(), 0);
    }

    #[test]
    fn test_content_blocks_are_flattened() {
        let frame = InboundFrame::from_value(&json!({
            "metadata": {"model_request": {"messages": [
                {"kwargs": {"content": [
                    {"type": "text", "text": "Hel"},
                    {"type": "image_url", "image_url": {"url": "data:"}},
                    "lo"
                ]}},
                {"kwargs": {"content": 42}},
            ]}},
            "done": true
        }))
        .unwrap();
        assert_eq!(frame.text_delta().as_deref(), Some("Hello"));
        assert!(frame.is_completion());
    }

    #[test]
    fn test_tool_call_without_name_keeps_frame() {
        let frame = InboundFrame::from_value(&json!({
            "metadata": {"model_request": {"messages": [
                {"role_payload": {"content": "ok", "tool_calls": [{"args": {"q": 1}}]}}
            ]}},
            "done": true
        }))
        .unwrap();
        let call = frame.tool_calls().next().unwrap();
        assert_eq!(call.name, "");
        assert_eq!(call.args, json!({"q": 1}));
        assert!(frame.is_completion());
    }

    #[test]
    fn test_done_false_is_recognized_but_not_completion() {
        let frame = InboundFrame::from_value(&json!({"done": false})).unwrap();
        assert!(!frame.is_completion());
    }
}
