//! UI-facing chat session.
//!
//! [`ChatSession`] owns the conversation log and the streaming flag. Local
//! commands go out through a [`FrameSender`]; transport events come back in
//! as [`SessionEvent`]s and are folded into the log by the stream assembler.

use std::sync::Arc;

use agent_convo::{
    ConversationEntry, ConversationLog, ERROR_AUTHOR, SYSTEM_AUTHOR, StreamAssembler,
};
use chat_transport::{FrameKind, Transport, TransportError};
use serde_json::Value;
use tracing::{debug, info};

/// Where outbound frames go. Implemented by [`Transport`].
pub trait FrameSender: Send + Sync {
    fn send_frame(&self, payload: &str, kind: FrameKind) -> Result<(), TransportError>;
}

impl FrameSender for Transport {
    fn send_frame(&self, payload: &str, kind: FrameKind) -> Result<(), TransportError> {
        self.send(payload, kind)
    }
}

/// Something the transport reported.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// A parsed inbound frame.
    Frame(Value),
    /// A failed open or a socket error.
    Error(String),
    /// A connection was (re)established.
    Opened,
}

/// Read-only view of the session published after every change.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LogSnapshot {
    pub entries: Vec<ConversationEntry>,
    pub streaming: bool,
}

pub struct ChatSession {
    own_id: String,
    log: ConversationLog,
    assembler: StreamAssembler,
    streaming: bool,
    sender: Arc<dyn FrameSender>,
}

impl ChatSession {
    pub fn new(own_id: impl Into<String>, sender: Arc<dyn FrameSender>) -> Self {
        Self {
            own_id: own_id.into(),
            log: ConversationLog::new(),
            assembler: StreamAssembler::new(),
            streaming: false,
            sender,
        }
    }

    pub fn own_id(&self) -> &str {
        &self.own_id
    }

    /// True while an assistant turn is in progress.
    pub fn is_streaming(&self) -> bool {
        self.streaming
    }

    pub fn entries(&self) -> impl Iterator<Item = &ConversationEntry> {
        self.log.iter()
    }

    pub fn snapshot(&self) -> LogSnapshot {
        LogSnapshot {
            entries: self.log.snapshot(),
            streaming: self.streaming,
        }
    }

    /// Append a human entry and send it.
    ///
    /// On a send failure an error entry follows the human entry and the
    /// session does not start streaming.
    pub fn submit_human_text(&mut self, text: &str) {
        self.log.push(ConversationEntry::human(&self.own_id, text));

        match self.sender.send_frame(text, FrameKind::Message) {
            Ok(()) => self.streaming = true,
            Err(err) => {
                debug!(error = %err, "failed to send message");
                self.log.push(ConversationEntry::error(
                    ERROR_AUTHOR,
                    format!("Error while sending: {}", err),
                ));
            }
        }
    }

    /// Ask the remote side to stop the current turn. The log is left as is.
    pub fn cancel_active_turn(&self) {
        if let Err(err) = self.sender.send_frame("", FrameKind::Stop) {
            debug!(error = %err, "failed to send stop");
        }
    }

    /// Apply a transport event. Returns whether the snapshot changed.
    pub fn handle_event(&mut self, event: SessionEvent) -> bool {
        match event {
            SessionEvent::Frame(frame) => {
                let outcome = self.assembler.apply(&mut self.log, frame);
                let was_streaming = self.streaming;
                if outcome.streaming_ended {
                    self.streaming = false;
                }
                outcome.changed_log() || was_streaming != self.streaming
            }
            SessionEvent::Error(message) => {
                self.log.push(ConversationEntry::error(
                    SYSTEM_AUTHOR,
                    format!("Connection error: {}", message),
                ));
                true
            }
            SessionEvent::Opened => {
                info!("chat connection open");
                // A new connection cannot finish a turn started on the old one.
                std::mem::replace(&mut self.streaming, false)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agent_convo::EntryKind;
    use serde_json::json;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingSender {
        sent: Mutex<Vec<(String, FrameKind)>>,
        fail: bool,
    }

    impl FrameSender for RecordingSender {
        fn send_frame(&self, payload: &str, kind: FrameKind) -> Result<(), TransportError> {
            if self.fail {
                let bad: Result<Value, _> = serde_json::from_str("{");
                return Err(TransportError::Encode(bad.unwrap_err()));
            }
            self.sent.lock().unwrap().push((payload.to_string(), kind));
            Ok(())
        }
    }

    fn session() -> (ChatSession, Arc<RecordingSender>) {
        let sender = Arc::new(RecordingSender::default());
        (ChatSession::new("me", sender.clone()), sender)
    }

    fn delta(text: &str) -> SessionEvent {
        SessionEvent::Frame(json!({"metadata": {"model_request": {"messages": [
            {"role_payload": {"content": text}}
        ]}}}))
    }

    #[test]
    fn test_submit_appends_and_sends() {
        let (mut session, sender) = session();
        session.submit_human_text("hello there");

        let entries: Vec<_> = session.entries().collect();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].kind, EntryKind::Human);
        assert_eq!(entries[0].author, "me");
        assert_eq!(entries[0].text, "hello there");
        assert!(session.is_streaming());
        assert_eq!(
            *sender.sent.lock().unwrap(),
            vec![("hello there".to_string(), FrameKind::Message)]
        );
    }

    #[test]
    fn test_send_failure_appends_error_entry() {
        let sender = Arc::new(RecordingSender {
            fail: true,
            ..Default::default()
        });
        let mut session = ChatSession::new("me", sender);
        session.submit_human_text("hello");

        let entries: Vec<_> = session.entries().collect();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].kind, EntryKind::Error);
        assert_eq!(entries[1].author, "error");
        assert!(entries[1].text.starts_with("Error while sending: "));
        assert!(!session.is_streaming());
    }

    #[test]
    fn test_cancel_sends_stop_and_keeps_log() {
        let (mut session, sender) = session();
        session.submit_human_text("question");
        session.handle_event(delta("partial ans"));
        let before = session.snapshot();

        session.cancel_active_turn();

        assert_eq!(session.snapshot(), before);
        let sent = sender.sent.lock().unwrap();
        assert_eq!(sent.last().unwrap(), &(String::new(), FrameKind::Stop));
    }

    #[test]
    fn test_streamed_turn_ends_on_done() {
        let (mut session, _) = session();
        session.submit_human_text("question");

        assert!(session.handle_event(delta("Hel")));
        assert!(session.handle_event(delta("lo")));
        assert!(session.is_streaming());

        assert!(session.handle_event(SessionEvent::Frame(json!({"done": true}))));
        assert!(!session.is_streaming());

        let snapshot = session.snapshot();
        assert_eq!(snapshot.entries.len(), 2);
        assert_eq!(snapshot.entries[1].text, "Hello");
        assert_eq!(snapshot.entries[1].done, Some(true));
    }

    #[test]
    fn test_error_frame_ends_streaming() {
        let (mut session, _) = session();
        session.submit_human_text("question");
        session.handle_event(SessionEvent::Frame(json!({"error": "model overloaded"})));

        assert!(!session.is_streaming());
        let last = session.entries().last().unwrap();
        assert_eq!(last.kind, EntryKind::Error);
        assert_eq!(last.author, "system");
        assert_eq!(last.text, "model overloaded");
    }

    #[test]
    fn test_connection_error_entry() {
        let (mut session, _) = session();
        assert!(session.handle_event(SessionEvent::Error("refused".into())));

        let last = session.entries().last().unwrap();
        assert_eq!(last.kind, EntryKind::Error);
        assert_eq!(last.author, "system");
        assert_eq!(last.text, "Connection error: refused");
    }

    #[test]
    fn test_reopen_clears_stale_streaming() {
        let (mut session, _) = session();
        assert!(!session.handle_event(SessionEvent::Opened));

        session.submit_human_text("question");
        assert!(session.handle_event(SessionEvent::Opened));
        assert!(!session.is_streaming());
    }

    #[test]
    fn test_unchanged_frame_reports_no_change() {
        let (mut session, _) = session();
        // Completion with nothing to seal and no turn in progress.
        assert!(!session.handle_event(SessionEvent::Frame(json!({"done": true}))));
    }
}
