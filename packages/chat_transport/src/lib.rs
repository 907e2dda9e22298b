//! Chat Transport - reconnecting, heartbeating socket connection
//!
//! Keeps one connection to a chat endpoint alive: it pings while open,
//! reconnects with capped multiplicative backoff after failures, and hands
//! every inbound JSON frame to a single registered callback. It knows nothing
//! about what the frames mean.
//!
//! # Example
//!
//! ```no_run
//! use chat_transport::{FrameKind, Transport};
//!
//! #[tokio::main]
//! async fn main() {
//!     let transport = Transport::new("wss://example.invalid/ws/chat");
//!
//!     transport.on_open(|| println!("connected"));
//!     transport.on_message(|frame| println!("frame: {frame}"));
//!     transport.on_error(|err| eprintln!("error: {err}"));
//!     transport.connect();
//!
//!     // Dropped silently while the connection is not open.
//!     transport.send("hello", FrameKind::Message).unwrap();
//!
//!     transport.close();
//! }
//! ```

mod backoff;
pub mod connector;
mod error;
mod frame;
mod transport;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use backoff::Backoff;
pub use connector::{Connector, Link, WsConnector};
pub use error::TransportError;
pub use frame::{FrameKind, OutboundFrame};
pub use transport::{Transport, TransportConfig};
