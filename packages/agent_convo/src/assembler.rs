//! Folds inbound frames into the conversation log.
//!
//! Each frame is validated against [`InboundFrame`] and then run through four
//! independent rules, in this order: error, tool calls, text delta,
//! completion. A frame may trigger several of them.

use serde_json::Value;
use tracing::{debug, warn};

use crate::frame::InboundFrame;
use crate::log::ConversationLog;
use crate::types::{ConversationEntry, EntryKind, SYSTEM_AUTHOR};

/// What applying one frame did to the log.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameOutcome {
    /// The assistant turn is over (error, completion, or malformed frame).
    /// The consumer should clear its streaming flag.
    pub streaming_ended: bool,
    /// Number of entries pushed onto the log.
    pub appended: usize,
    /// An existing entry was modified in place.
    pub updated: bool,
}

impl FrameOutcome {
    pub fn changed_log(&self) -> bool {
        self.appended > 0 || self.updated
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct StreamAssembler;

impl StreamAssembler {
    pub fn new() -> Self {
        Self
    }

    /// Apply one parsed frame to `log`.
    pub fn apply(&self, log: &mut ConversationLog, raw: Value) -> FrameOutcome {
        match InboundFrame::from_value(&raw) {
            Some(frame) => self.apply_frame(log, &frame),
            None => self.apply_raw(log, raw),
        }
    }

    fn apply_frame(&self, log: &mut ConversationLog, frame: &InboundFrame) -> FrameOutcome {
        let mut outcome = FrameOutcome::default();

        if let Some(error) = &frame.error {
            debug!(%error, "error frame");
            log.push(ConversationEntry::error(SYSTEM_AUTHOR, error.clone()));
            outcome.appended += 1;
            outcome.streaming_ended = true;
        }

        for call in frame.tool_calls() {
            debug!(tool = %call.name, "tool call frame");
            log.push(ConversationEntry::tool(call.name.clone(), call.args.clone()));
            outcome.appended += 1;
        }

        if let Some(delta) = frame.text_delta() {
            match log.streaming_tail_mut() {
                Some(open) => {
                    open.text.push_str(&delta);
                    outcome.updated = true;
                }
                None => {
                    log.push(ConversationEntry::ai_streaming(delta));
                    outcome.appended += 1;
                }
            }
        }

        if frame.is_completion() {
            outcome.streaming_ended = true;
            if let Some(last) = log.last_mut().filter(|e| e.kind == EntryKind::Ai) {
                if last.done != Some(true) {
                    last.seal();
                    outcome.updated = true;
                }
            }
        }

        outcome
    }

    /// Best-effort fallback for frames that fail structural validation: the
    /// payload is kept in the log rather than dropped.
    fn apply_raw(&self, log: &mut ConversationLog, raw: Value) -> FrameOutcome {
        warn!("inbound frame did not match the expected schema, keeping it raw");

        // The sender's id is not trusted; entries always get a local one.
        let mut candidate = raw.clone();
        if let Some(obj) = candidate.as_object_mut() {
            obj.remove("id");
        }
        let entry = match serde_json::from_value::<ConversationEntry>(candidate) {
            Ok(entry) => entry,
            Err(_) => ConversationEntry::ai_done(raw_text(&raw)),
        };
        log.push(entry);

        FrameOutcome {
            streaming_ended: true,
            appended: 1,
            updated: false,
        }
    }
}

fn raw_text(raw: &Value) -> String {
    match raw {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
