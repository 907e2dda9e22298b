//! Mount/unmount handle for a chat widget.
//!
//! [`mount`] wires a [`Transport`] to a [`ChatSession`] and starts the event
//! loop that owns the session. Transport callbacks only forward into that
//! loop, so frames are applied strictly in delivery order and the log is
//! never shared. Consumers observe the log through a `watch` channel.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chat_transport::{Connector, Transport, WsConnector};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::WidgetConfig;
use crate::session::{ChatSession, FrameSender, LogSnapshot, SessionEvent};
use crate::validation::{InputValidator, ValidationError};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SubmitError {
    #[error(transparent)]
    Invalid(#[from] ValidationError),
    #[error("a response is still streaming")]
    Streaming,
    #[error("chat is disabled")]
    Disabled,
    #[error("chat is no longer mounted")]
    Unmounted,
}

enum Command {
    Submit(String),
    Cancel,
}

/// A running chat widget. Consume it with [`unmount`](Self::unmount).
pub struct MountedWidget {
    config: WidgetConfig,
    validator: InputValidator,
    transport: Arc<Transport>,
    commands: mpsc::UnboundedSender<Command>,
    snapshots: watch::Receiver<LogSnapshot>,
    /// Set by `submit` before the message is queued, cleared by the event
    /// loop once that turn stops streaming or fails to start.
    turn_pending: Arc<AtomicBool>,
    task: JoinHandle<()>,
}

/// Mount a widget talking WebSocket to `config.url`.
///
/// Must be called from within a tokio runtime.
pub fn mount(config: WidgetConfig) -> MountedWidget {
    mount_with_connector(config, Arc::new(WsConnector))
}

pub fn mount_with_connector(config: WidgetConfig, connector: Arc<dyn Connector>) -> MountedWidget {
    let transport = Arc::new(Transport::with_connector(
        config.url.clone(),
        connector,
        config.transport.to_transport_config(),
    ));

    let (events_tx, events_rx) = mpsc::unbounded_channel();
    bridge_callbacks(&transport, events_tx);

    let sender: Arc<dyn FrameSender> = transport.clone();
    let session = ChatSession::new(config.own_id.clone(), sender);
    let (snapshots_tx, snapshots_rx) = watch::channel(session.snapshot());
    let (commands_tx, commands_rx) = mpsc::unbounded_channel();
    let turn_pending = Arc::new(AtomicBool::new(false));

    let task = tokio::spawn(run_event_loop(
        session,
        events_rx,
        commands_rx,
        snapshots_tx,
        turn_pending.clone(),
    ));
    transport.connect();
    info!(url = %config.url, own_id = %config.own_id, "chat widget mounted");

    MountedWidget {
        validator: InputValidator::from_config(&config),
        config,
        transport,
        commands: commands_tx,
        snapshots: snapshots_rx,
        turn_pending,
        task,
    }
}

fn bridge_callbacks(transport: &Transport, events: mpsc::UnboundedSender<SessionEvent>) {
    let tx = events.clone();
    transport.on_message(move |frame| {
        let _ = tx.send(SessionEvent::Frame(frame));
    });

    let tx = events.clone();
    transport.on_open(move || {
        let _ = tx.send(SessionEvent::Opened);
    });

    transport.on_error(move |err| {
        let _ = events.send(SessionEvent::Error(err.to_string()));
    });
}

impl MountedWidget {
    pub fn config(&self) -> &WidgetConfig {
        &self.config
    }

    /// Validate `text` and queue it for sending.
    ///
    /// Only one turn may be in flight: a submission made after an accepted
    /// one and before its response has finished fails with
    /// [`SubmitError::Streaming`], even if the log has not caught up yet.
    pub fn submit(&self, text: &str) -> Result<(), SubmitError> {
        if self.config.disabled {
            return Err(SubmitError::Disabled);
        }
        let text = self.validator.validate(text)?;
        if self
            .turn_pending
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(SubmitError::Streaming);
        }
        self.commands.send(Command::Submit(text)).map_err(|_| {
            self.turn_pending.store(false, Ordering::SeqCst);
            SubmitError::Unmounted
        })
    }

    /// Ask the assistant to stop the current turn.
    pub fn cancel(&self) {
        if self.commands.send(Command::Cancel).is_err() {
            debug!("cancel after event loop stopped");
        }
    }

    /// Current log state, updated after every change.
    pub fn subscribe(&self) -> watch::Receiver<LogSnapshot> {
        self.snapshots.clone()
    }

    /// Close the connection and wait for the event loop to finish.
    pub async fn unmount(self) {
        let Self {
            transport,
            commands,
            task,
            ..
        } = self;

        transport.close();
        drop(commands);
        if let Err(err) = task.await {
            warn!(error = %err, "chat event loop ended abnormally");
        }
        info!("chat widget unmounted");
    }
}

async fn run_event_loop(
    mut session: ChatSession,
    mut events: mpsc::UnboundedReceiver<SessionEvent>,
    mut commands: mpsc::UnboundedReceiver<Command>,
    snapshots: watch::Sender<LogSnapshot>,
    turn_pending: Arc<AtomicBool>,
) {
    loop {
        let changed = tokio::select! {
            Some(event) = events.recv() => {
                let was_streaming = session.is_streaming();
                let changed = session.handle_event(event);
                if was_streaming && !session.is_streaming() {
                    turn_pending.store(false, Ordering::SeqCst);
                }
                changed
            }
            command = commands.recv() => match command {
                Some(Command::Submit(text)) => {
                    if session.is_streaming() {
                        debug!("dropping submission while streaming");
                        false
                    } else {
                        session.submit_human_text(&text);
                        // A send failure leaves the session idle.
                        if !session.is_streaming() {
                            turn_pending.store(false, Ordering::SeqCst);
                        }
                        true
                    }
                }
                Some(Command::Cancel) => {
                    session.cancel_active_turn();
                    false
                }
                None => break,
            },
        };

        if changed {
            snapshots.send_replace(session.snapshot());
        }
    }
    debug!("chat event loop finished");
}
