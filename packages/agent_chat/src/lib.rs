//! Agent Chat - streaming chat widget core
//!
//! Ties a [`chat_transport::Transport`] to an [`agent_convo`] conversation
//! log and exposes the commands a chat UI needs: submit a message, cancel the
//! active turn, and observe the log as it changes.
//!
//! # Example
//!
//! ```no_run
//! use agent_chat::{WidgetConfig, widget};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = WidgetConfig {
//!         url: "ws://127.0.0.1:8080/ws".to_string(),
//!         ..Default::default()
//!     };
//!     let chat = widget::mount(config);
//!
//!     let mut log = chat.subscribe();
//!     chat.submit("What can you do?").unwrap();
//!
//!     while log.changed().await.is_ok() {
//!         let snapshot = log.borrow_and_update().clone();
//!         if !snapshot.streaming {
//!             break;
//!         }
//!     }
//!
//!     chat.unmount().await;
//! }
//! ```

pub mod config;
pub mod render;
pub mod session;
pub mod validation;
pub mod widget;

pub use config::{WidgetConfig, load_config};
pub use render::Renderer;
pub use session::{ChatSession, FrameSender, LogSnapshot, SessionEvent};
pub use validation::{InputValidator, ValidationError};
pub use widget::{MountedWidget, SubmitError};
