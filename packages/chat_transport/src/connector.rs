//! The physical-connection seam.
//!
//! A [`Connector`] opens one [`Link`]: a sink for outbound text frames and a
//! stream of inbound text frames. The stream ending means the remote closed
//! the connection. [`WsConnector`] is the WebSocket implementation.

use std::pin::Pin;

use futures::future::{self, BoxFuture};
use futures::{FutureExt, Sink, SinkExt, Stream, StreamExt};
use tokio_tungstenite::tungstenite::Message;
use tracing::debug;

use crate::error::TransportError;

pub type FrameSink = Pin<Box<dyn Sink<String, Error = TransportError> + Send>>;
pub type FrameStream = Pin<Box<dyn Stream<Item = Result<String, TransportError>> + Send>>;

/// One open physical connection.
pub struct Link {
    pub sink: FrameSink,
    pub stream: FrameStream,
}

pub trait Connector: Send + Sync + 'static {
    /// Open a connection to `url`.
    fn connect(&self, url: &str) -> BoxFuture<'static, Result<Link, TransportError>>;
}

/// Opens WebSocket connections with `tokio-tungstenite`.
///
/// Only text messages are surfaced; binary, ping and pong frames are dropped
/// here (tungstenite answers pings on its own).
#[derive(Debug, Clone, Copy, Default)]
pub struct WsConnector;

impl Connector for WsConnector {
    fn connect(&self, url: &str) -> BoxFuture<'static, Result<Link, TransportError>> {
        let url = url.to_string();
        async move {
            let (ws_stream, _) = tokio_tungstenite::connect_async(&url)
                .await
                .map_err(|e| TransportError::connect(&url, e))?;
            let (ws_write, ws_read) = ws_stream.split();

            let sink = ws_write
                .sink_map_err(TransportError::from_tungstenite)
                .with(|text: String| future::ready(Ok::<_, TransportError>(Message::Text(text.into()))));

            let stream = ws_read.filter_map(|msg| {
                future::ready(match msg {
                    Ok(Message::Text(text)) => Some(Ok(text.as_str().to_owned())),
                    Ok(Message::Close(frame)) => {
                        debug!(?frame, "remote sent close frame");
                        None
                    }
                    Ok(_) => None,
                    Err(e) => Some(Err(TransportError::from_tungstenite(e))),
                })
            });

            Ok(Link {
                sink: Box::pin(sink),
                stream: Box::pin(stream),
            })
        }
        .boxed()
    }
}
