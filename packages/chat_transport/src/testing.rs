//! In-memory connector for driving a [`Transport`](crate::Transport) in tests.
//!
//! [`FakeConnector`] follows a queue of [`Plan`]s, one per connection
//! attempt. Every attempt is timestamped on [`Harness::attempts`]; every
//! accepted connection hands its far end to [`Harness::peers`] as a
//! [`RemotePeer`]. Once the queue is empty further attempts are refused.

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Mutex, PoisonError};
use std::task::{Context, Poll};

use futures::channel::{mpsc as link_channel, oneshot};
use futures::future::{self, BoxFuture};
use futures::{FutureExt, Sink, StreamExt};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::connector::{Connector, Link};
use crate::error::TransportError;

/// What the next connection attempt does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Plan {
    Refuse,
    Accept,
    /// Accept, but closing the transport's side blocks until
    /// [`RemotePeer::release_close`] is called or the peer is dropped.
    AcceptHoldingClose,
    /// Accept, but every write reports an error. The frame still reaches
    /// the peer so tests can count attempts.
    AcceptRejectingSends,
    /// Accept, but the connect attempt only completes once
    /// [`RemotePeer::release_connect`] is called or the peer is dropped.
    AcceptWhenReleased,
}

pub struct FakeConnector {
    plans: Mutex<VecDeque<Plan>>,
    attempts: mpsc::UnboundedSender<Instant>,
    peers: mpsc::UnboundedSender<RemotePeer>,
}

/// Test-side view of a [`FakeConnector`].
pub struct Harness {
    pub attempts: mpsc::UnboundedReceiver<Instant>,
    pub peers: mpsc::UnboundedReceiver<RemotePeer>,
}

impl FakeConnector {
    pub fn new(plans: Vec<Plan>) -> (Self, Harness) {
        let (attempts_tx, attempts_rx) = mpsc::unbounded_channel();
        let (peers_tx, peers_rx) = mpsc::unbounded_channel();
        let connector = Self {
            plans: Mutex::new(plans.into()),
            attempts: attempts_tx,
            peers: peers_tx,
        };
        let harness = Harness {
            attempts: attempts_rx,
            peers: peers_rx,
        };
        (connector, harness)
    }

    fn next_plan(&self) -> Plan {
        self.plans
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
            .unwrap_or(Plan::Refuse)
    }

    fn accept(&self, plan: Plan, connect_gate: Option<oneshot::Sender<()>>) -> Link {
        let (sent_tx, sent_rx) = link_channel::unbounded::<String>();
        let (inbound_tx, inbound_rx) = link_channel::unbounded();
        let (gate_tx, gate_rx) = match plan {
            Plan::AcceptHoldingClose => {
                let (tx, rx) = oneshot::channel();
                (Some(tx), Some(rx))
            }
            _ => (None, None),
        };

        let _ = self.peers.send(RemotePeer {
            sent: sent_rx,
            inbound: inbound_tx,
            close_gate: gate_tx,
            connect_gate,
        });
        Link {
            sink: Box::pin(PeerSink {
                sent: sent_tx,
                reject_sends: plan == Plan::AcceptRejectingSends,
                close_gate: gate_rx,
            }),
            stream: Box::pin(inbound_rx),
        }
    }
}

impl Connector for FakeConnector {
    fn connect(&self, url: &str) -> BoxFuture<'static, Result<Link, TransportError>> {
        let _ = self.attempts.send(Instant::now());

        match self.next_plan() {
            Plan::Refuse => {
                future::ready(Err(TransportError::connect(url, "connection refused"))).boxed()
            }
            Plan::AcceptWhenReleased => {
                let (gate_tx, gate_rx) = oneshot::channel::<()>();
                let link = self.accept(Plan::AcceptWhenReleased, Some(gate_tx));
                async move {
                    let _ = gate_rx.await;
                    Ok(link)
                }
                .boxed()
            }
            plan => future::ready(Ok(self.accept(plan, None))).boxed(),
        }
    }
}

/// The transport's end of an accepted connection.
struct PeerSink {
    sent: link_channel::UnboundedSender<String>,
    reject_sends: bool,
    close_gate: Option<oneshot::Receiver<()>>,
}

impl Sink<String> for PeerSink {
    type Error = TransportError;

    fn poll_ready(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn start_send(self: Pin<&mut Self>, item: String) -> Result<(), Self::Error> {
        let delivered = self.sent.unbounded_send(item);
        if self.reject_sends {
            return Err(TransportError::Socket("write rejected".to_string()));
        }
        delivered.map_err(|e| TransportError::Socket(e.to_string()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn poll_close(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        let this = self.get_mut();
        if let Some(gate) = this.close_gate.as_mut() {
            // Released either explicitly or by dropping the peer.
            if Pin::new(gate).poll(cx).is_pending() {
                return Poll::Pending;
            }
            this.close_gate = None;
        }
        this.sent.close_channel();
        Poll::Ready(Ok(()))
    }
}

/// The remote end of one accepted connection. Dropping it hangs up.
pub struct RemotePeer {
    sent: link_channel::UnboundedReceiver<String>,
    inbound: link_channel::UnboundedSender<Result<String, TransportError>>,
    close_gate: Option<oneshot::Sender<()>>,
    connect_gate: Option<oneshot::Sender<()>>,
}

impl RemotePeer {
    /// Next frame the transport wrote, parsed. `None` once the transport
    /// has closed its side.
    pub async fn next_sent(&mut self) -> Option<Value> {
        let text = self.sent.next().await?;
        Some(serde_json::from_str(&text).expect("transport wrote invalid JSON"))
    }

    /// Like [`next_sent`](Self::next_sent) but skips heartbeats.
    pub async fn next_non_ping(&mut self) -> Option<Value> {
        loop {
            let frame = self.next_sent().await?;
            if frame["kind"] != "ping" {
                return Some(frame);
            }
        }
    }

    pub fn push_text(&self, text: impl Into<String>) {
        let _ = self.inbound.unbounded_send(Ok(text.into()));
    }

    pub fn push_json(&self, frame: Value) {
        self.push_text(frame.to_string());
    }

    /// Surface a socket error to the transport.
    pub fn fail(&self, reason: &str) {
        let _ = self
            .inbound
            .unbounded_send(Err(TransportError::Socket(reason.to_string())));
    }

    /// Let a close held by [`Plan::AcceptHoldingClose`] complete.
    pub fn release_close(&mut self) {
        if let Some(gate) = self.close_gate.take() {
            let _ = gate.send(());
        }
    }

    /// Let a connect attempt held by [`Plan::AcceptWhenReleased`] complete.
    pub fn release_connect(&mut self) {
        if let Some(gate) = self.connect_gate.take() {
            let _ = gate.send(());
        }
    }

    pub fn hang_up(self) {}
}
