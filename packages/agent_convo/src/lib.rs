//! # Agent Conversations
//!
//! Conversation model and streaming assembly for agent chat sessions.
//!
//! ## Overview
//!
//! An assistant answers over a socket as a sequence of partial frames: text
//! deltas, tool invocations, error reports and completion signals. This crate
//! turns that sequence into an ordered, bounded log of conversation entries:
//! - [`ConversationEntry`] and [`EntryKind`] describe one line of the chat
//! - [`ConversationLog`] keeps the most recent 500 entries, oldest evicted first
//! - [`InboundFrame`] is the loose envelope the remote side sends
//! - [`StreamAssembler`] folds frames into the log
//!
//! It has no knowledge of the transport; frames arrive as parsed
//! `serde_json::Value`s.
//!
//! ## Quick Start
//!
//! ```rust
//! use agent_convo::{ConversationLog, StreamAssembler};
//! use serde_json::json;
//!
//! let assembler = StreamAssembler::new();
//! let mut log = ConversationLog::new();
//!
//! for part in ["Hel", "lo"] {
//!     assembler.apply(
//!         &mut log,
//!         json!({"metadata": {"model_request": {"messages": [
//!             {"role_payload": {"content": part}}
//!         ]}}}),
//!     );
//! }
//! let outcome = assembler.apply(&mut log, json!({"done": true}));
//!
//! assert!(outcome.streaming_ended);
//! assert_eq!(log.len(), 1);
//! assert_eq!(log.last().unwrap().text, "Hello");
//! assert_eq!(log.last().unwrap().done, Some(true));
//! ```

pub mod assembler;
pub mod frame;
pub mod log;
pub mod types;

pub use assembler::{FrameOutcome, StreamAssembler};
pub use frame::{InboundFrame, ModelMessage, RolePayload, ToolCall};
pub use log::{ConversationLog, DEFAULT_LOG_CAPACITY};
pub use types::{
    AI_AUTHOR, ConversationEntry, ERROR_AUTHOR, EntryId, EntryKind, SYSTEM_AUTHOR, now_ms,
};
