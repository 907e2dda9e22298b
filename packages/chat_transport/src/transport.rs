//! Connection lifecycle: connect, heartbeat, reconnect with backoff, close.
//!
//! One background task owns the physical link. Socket reads, outbound
//! writes, heartbeat ticks and the reconnect timer are all driven from a
//! single `select!` loop, so callbacks fire one at a time and in delivery
//! order.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::backoff::Backoff;
use crate::connector::{Connector, Link, WsConnector};
use crate::error::TransportError;
use crate::frame::{FrameKind, OutboundFrame};

/// Transport timing knobs.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Delay before the first reconnect attempt, and after every successful open.
    pub initial_reconnect_delay: Duration,
    /// Upper bound for the reconnect delay.
    pub max_reconnect_delay: Duration,
    /// Growth factor applied after every scheduled attempt.
    pub backoff_factor: f64,
    /// Period between heartbeat pings while open.
    pub heartbeat_interval: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            initial_reconnect_delay: Duration::from_millis(20_000),
            max_reconnect_delay: Duration::from_millis(30_000),
            backoff_factor: 1.5,
            heartbeat_interval: Duration::from_millis(1_000),
        }
    }
}

type MessageHandler = Box<dyn FnMut(Value) + Send>;
type OpenHandler = Box<dyn FnMut() + Send>;
type ErrorHandler = Box<dyn FnMut(&TransportError) + Send>;

/// Single-slot callbacks plus the forced-close flag.
///
/// Kept behind one lock so `close()` and callback dispatch cannot interleave:
/// once `close()` has flipped the flag no callback runs.
#[derive(Default)]
struct Handlers {
    message: Option<MessageHandler>,
    open: Option<OpenHandler>,
    error: Option<ErrorHandler>,
    forced_close: bool,
}

struct Shared {
    handlers: Mutex<Handlers>,
    /// Session number of the open connection, `0` while nothing is open.
    /// Frames are stamped with it.
    open_session: AtomicU64,
    /// Last session number handed out. Shared by every connection task so a
    /// task started after `close()` never reuses a number.
    sessions: AtomicU64,
}

impl Shared {
    fn handlers(&self) -> MutexGuard<'_, Handlers> {
        self.handlers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Mark `session` closed unless a newer session has already opened.
    fn clear_open(&self, session: u64) {
        let _ = self
            .open_session
            .compare_exchange(session, 0, Ordering::SeqCst, Ordering::SeqCst);
    }

    fn is_forced_closed(&self) -> bool {
        self.handlers().forced_close
    }

    fn emit_open(&self) {
        let mut handlers = self.handlers();
        if handlers.forced_close {
            return;
        }
        if let Some(cb) = handlers.open.as_mut() {
            cb();
        }
    }

    fn emit_message(&self, frame: Value) {
        let mut handlers = self.handlers();
        if handlers.forced_close {
            return;
        }
        if let Some(cb) = handlers.message.as_mut() {
            cb(frame);
        }
    }

    fn emit_error(&self, err: &TransportError) {
        let mut handlers = self.handlers();
        if handlers.forced_close {
            return;
        }
        if let Some(cb) = handlers.error.as_mut() {
            cb(err);
        }
    }
}

struct Outbound {
    session: u64,
    text: String,
}

struct Worker {
    outbound: mpsc::UnboundedSender<Outbound>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

/// A reconnecting, heartbeating connection to one URL.
///
/// Callbacks registered with [`on_message`](Self::on_message),
/// [`on_open`](Self::on_open) and [`on_error`](Self::on_error) are
/// single-slot: registering again replaces the previous callback. They run on
/// the connection task while an internal lock is held, so they must not
/// register callbacks themselves.
pub struct Transport {
    url: String,
    connector: Arc<dyn Connector>,
    config: TransportConfig,
    shared: Arc<Shared>,
    worker: Mutex<Option<Worker>>,
}

impl Transport {
    /// A WebSocket transport with default timings.
    pub fn new(url: impl Into<String>) -> Self {
        Self::with_connector(url, Arc::new(WsConnector), TransportConfig::default())
    }

    pub fn with_connector(
        url: impl Into<String>,
        connector: Arc<dyn Connector>,
        config: TransportConfig,
    ) -> Self {
        Self {
            url: url.into(),
            connector,
            config,
            shared: Arc::new(Shared {
                handlers: Mutex::new(Handlers::default()),
                open_session: AtomicU64::new(0),
                sessions: AtomicU64::new(0),
            }),
            worker: Mutex::new(None),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Whether a physical connection is currently open.
    pub fn is_open(&self) -> bool {
        self.shared.open_session.load(Ordering::SeqCst) != 0
    }

    /// Start connecting. Clears a previous `close()`.
    ///
    /// If the connection task is already running this only clears the
    /// forced-close flag. Must be called from within a tokio runtime.
    pub fn connect(&self) {
        self.shared.handlers().forced_close = false;

        let mut worker = self.worker();
        if worker.as_ref().is_some_and(|w| !w.task.is_finished()) {
            debug!(url = %self.url, "connect requested while connection task is running");
            return;
        }

        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let task = tokio::spawn(run_connection(ConnectionTask {
            url: self.url.clone(),
            connector: self.connector.clone(),
            config: self.config.clone(),
            shared: self.shared.clone(),
            outbound: outbound_rx,
            cancel: cancel.clone(),
        }));

        info!(url = %self.url, "transport started");
        *worker = Some(Worker {
            outbound: outbound_tx,
            cancel,
            task,
        });
    }

    /// Send `{kind, payload, timestamp}` if the connection is open.
    ///
    /// When it is not open the frame is dropped and `Ok(())` is returned:
    /// nothing is queued and nothing is retried. The only error is a frame
    /// that cannot be encoded.
    pub fn send(&self, payload: &str, kind: FrameKind) -> Result<(), TransportError> {
        let text = OutboundFrame::new(kind, payload).encode()?;

        let session = self.shared.open_session.load(Ordering::SeqCst);
        if session == 0 {
            debug!(?kind, "connection not open, dropping frame");
            return Ok(());
        }

        if let Some(worker) = self.worker().as_ref() {
            if worker.outbound.send(Outbound { session, text }).is_err() {
                debug!(?kind, "connection task gone, dropping frame");
            }
        }
        Ok(())
    }

    /// Close the connection and stop reconnecting.
    ///
    /// Stops the heartbeat and cancels any pending reconnect before
    /// returning. No callback fires afterwards.
    pub fn close(&self) {
        self.shared.handlers().forced_close = true;
        self.shared.open_session.store(0, Ordering::SeqCst);

        if let Some(worker) = self.worker().take() {
            worker.cancel.cancel();
        }
        info!(url = %self.url, "transport closed");
    }

    pub fn on_message(&self, cb: impl FnMut(Value) + Send + 'static) {
        self.shared.handlers().message = Some(Box::new(cb));
    }

    pub fn on_open(&self, cb: impl FnMut() + Send + 'static) {
        self.shared.handlers().open = Some(Box::new(cb));
    }

    pub fn on_error(&self, cb: impl FnMut(&TransportError) + Send + 'static) {
        self.shared.handlers().error = Some(Box::new(cb));
    }

    fn worker(&self) -> MutexGuard<'_, Option<Worker>> {
        self.worker.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for Transport {
    fn drop(&mut self) {
        let worker = self
            .worker
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(worker) = worker {
            worker.cancel.cancel();
        }
    }
}

struct ConnectionTask {
    url: String,
    connector: Arc<dyn Connector>,
    config: TransportConfig,
    shared: Arc<Shared>,
    outbound: mpsc::UnboundedReceiver<Outbound>,
    cancel: CancellationToken,
}

enum SessionEnd {
    Closed,
    Cancelled,
}

async fn run_connection(task: ConnectionTask) {
    let ConnectionTask {
        url,
        connector,
        config,
        shared,
        mut outbound,
        cancel,
    } = task;
    let mut backoff = Backoff::new(
        config.initial_reconnect_delay,
        config.max_reconnect_delay,
        config.backoff_factor,
    );

    loop {
        if shared.is_forced_closed() {
            break;
        }

        let attempt = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            result = connector.connect(&url) => result,
        };

        match attempt {
            Ok(_) if cancel.is_cancelled() => break,
            Ok(link) => {
                backoff.reset();
                let session = shared.sessions.fetch_add(1, Ordering::SeqCst) + 1;
                shared.open_session.store(session, Ordering::SeqCst);
                info!(%url, session, "connection open");
                shared.emit_open();

                let end = run_session(link, session, &config, &shared, &mut outbound, &cancel).await;
                shared.clear_open(session);
                match end {
                    SessionEnd::Cancelled => break,
                    SessionEnd::Closed => info!(%url, session, "connection closed"),
                }
            }
            Err(err) => {
                warn!(%url, error = %err, "failed to open connection");
                shared.emit_error(&err);
            }
        }

        if cancel.is_cancelled() || shared.is_forced_closed() {
            break;
        }

        let delay = backoff.next_delay();
        info!(%url, delay_ms = delay.as_millis() as u64, "scheduling reconnect");
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(delay) => {}
        }
    }

    debug!(%url, "connection task finished");
}

async fn run_session(
    link: Link,
    session: u64,
    config: &TransportConfig,
    shared: &Shared,
    outbound: &mut mpsc::UnboundedReceiver<Outbound>,
    cancel: &CancellationToken,
) -> SessionEnd {
    let Link {
        mut sink,
        mut stream,
    } = link;

    let period = config.heartbeat_interval;
    let mut heartbeat = tokio::time::interval_at(Instant::now() + period, period);
    heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                if let Err(err) = sink.close().await {
                    debug!(error = %err, "error while closing socket");
                }
                return SessionEnd::Cancelled;
            }

            Some(frame) = outbound.recv() => {
                if frame.session != session {
                    debug!(session, stale = frame.session, "discarding frame queued for a previous connection");
                    continue;
                }
                if let Err(err) = sink.send(frame.text).await {
                    warn!(error = %err, "failed to send frame");
                }
            }

            _ = heartbeat.tick() => {
                // A failed ping does not mean the connection is gone; the
                // read side reports that.
                match OutboundFrame::ping().encode() {
                    Ok(ping) => {
                        if let Err(err) = sink.send(ping).await {
                            debug!(error = %err, "heartbeat failed");
                        }
                    }
                    Err(err) => debug!(error = %err, "failed to encode heartbeat"),
                }
            }

            inbound = stream.next() => match inbound {
                Some(Ok(text)) => match serde_json::from_str::<Value>(&text) {
                    Ok(frame) => shared.emit_message(frame),
                    Err(err) => warn!(error = %err, "dropping malformed inbound frame"),
                },
                Some(Err(err)) => {
                    warn!(error = %err, "connection error");
                    shared.emit_error(&err);
                    return SessionEnd::Closed;
                }
                None => return SessionEnd::Closed,
            },
        }
    }
}
