// SPDX-FileCopyrightText: 2026 Deskline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tokio driver for [`ConnectionMachine`].
//!
//! One task owns the machine, the socket, and both timers. The
//! [`RealtimeChannel`] handle talks to it over an mpsc command queue,
//! observes it through a `watch` of [`ChannelStatus`], and receives
//! inbound events through a `broadcast`. Each socket gets a reader task and
//! a writer task; both tag what they report with the socket generation.

use std::future::Future;

use deskline_core::CredentialReader;
use futures::{SinkExt, StreamExt};
use reqwest::Url;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep_until};
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::endpoint::{ChannelTarget, endpoint_url};
use crate::event::{InboundEvent, OutboundFrame};
use crate::machine::{ChannelAction, ChannelSettings, ChannelStatus, ConnectionMachine};

const EVENT_CAPACITY: usize = 256;

enum Command {
    Connect(ChannelTarget),
    Disconnect,
    Send(OutboundFrame),
}

/// What socket tasks report back to the driver.
enum SocketEvent {
    Opened {
        generation: u64,
        writer: mpsc::UnboundedSender<Message>,
    },
    Frame {
        generation: u64,
        text: String,
    },
    Errored {
        generation: u64,
        error: String,
    },
    Closed {
        generation: u64,
    },
}

struct Socket {
    generation: u64,
    writer: mpsc::UnboundedSender<Message>,
}

/// Handle to a reconnecting realtime channel.
///
/// Dropping the handle stops the driver task and everything it owns.
pub struct RealtimeChannel {
    commands: mpsc::UnboundedSender<Command>,
    events: broadcast::Sender<InboundEvent>,
    status: watch::Receiver<ChannelStatus>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl RealtimeChannel {
    /// Start the driver task. The channel stays disconnected until
    /// [`connect`](Self::connect) is called.
    pub fn spawn(api_base: Url, settings: ChannelSettings, credentials: CredentialReader) -> Self {
        let machine = ConnectionMachine::new(settings);
        let (commands, command_rx) = mpsc::unbounded_channel();
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let (status_tx, status) = watch::channel(machine.status());
        let cancel = CancellationToken::new();
        let (socket_tx, socket_rx) = mpsc::unbounded_channel();

        let driver = Driver {
            machine,
            api_base,
            credentials,
            events: events.clone(),
            status: status_tx,
            socket_tx,
            socket: None,
            ping_at: None,
            reconnect_at: None,
            tasks: Vec::new(),
        };
        let task = tokio::spawn(driver.run(command_rx, socket_rx, cancel.clone()));

        Self {
            commands,
            events,
            status,
            cancel,
            task: Some(task),
        }
    }

    /// Connect to `target`. Without a stored token this does nothing.
    pub fn connect(&self, target: ChannelTarget) {
        let _ = self.commands.send(Command::Connect(target));
    }

    /// Close the socket and cancel both timers. Never triggers a reconnect.
    pub fn disconnect(&self) {
        let _ = self.commands.send(Command::Disconnect);
    }

    /// Send a frame. Dropped with a warning unless the socket is open.
    pub fn send(&self, frame: OutboundFrame) {
        let _ = self.commands.send(Command::Send(frame));
    }

    pub fn subscribe(&self) -> broadcast::Receiver<InboundEvent> {
        self.events.subscribe()
    }

    pub fn status(&self) -> ChannelStatus {
        self.status.borrow().clone()
    }

    /// A receiver that observes every status change.
    pub fn watch_status(&self) -> watch::Receiver<ChannelStatus> {
        self.status.clone()
    }

    /// Stop the driver and wait for it to finish.
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for RealtimeChannel {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

impl std::fmt::Debug for RealtimeChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RealtimeChannel")
            .field("status", &*self.status.borrow())
            .finish_non_exhaustive()
    }
}

struct Driver {
    machine: ConnectionMachine,
    api_base: Url,
    credentials: CredentialReader,
    events: broadcast::Sender<InboundEvent>,
    status: watch::Sender<ChannelStatus>,
    socket_tx: mpsc::UnboundedSender<SocketEvent>,
    socket: Option<Socket>,
    ping_at: Option<Instant>,
    reconnect_at: Option<Instant>,
    tasks: Vec<JoinHandle<()>>,
}

/// Completes at `deadline`, or never when there is none.
fn wait_until(deadline: Option<Instant>) -> impl Future<Output = ()> {
    async move {
        match deadline {
            Some(at) => sleep_until(at).await,
            None => std::future::pending().await,
        }
    }
}

impl Driver {
    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<Command>,
        mut socket_events: mpsc::UnboundedReceiver<SocketEvent>,
        cancel: CancellationToken,
    ) {
        loop {
            let actions = tokio::select! {
                _ = cancel.cancelled() => break,
                command = commands.recv() => match command {
                    Some(command) => self.on_command(command),
                    None => break,
                },
                Some(event) = socket_events.recv() => self.on_socket_event(event),
                _ = wait_until(self.ping_at) => {
                    self.ping_at = None;
                    self.machine.on_ping_timer()
                }
                _ = wait_until(self.reconnect_at) => {
                    self.reconnect_at = None;
                    self.machine.on_reconnect_timer()
                }
            };
            self.execute(actions);
            self.publish();
        }

        let actions = self.machine.disconnect();
        self.execute(actions);
        for task in self.tasks.drain(..) {
            task.abort();
        }
        self.publish();
        debug!("realtime driver stopped");
    }

    fn publish(&self) {
        let status = self.machine.status();
        self.status.send_if_modified(|current| {
            if *current == status {
                false
            } else {
                *current = status;
                true
            }
        });
    }

    fn on_command(&mut self, command: Command) -> Vec<ChannelAction> {
        match command {
            Command::Connect(target) => {
                if self.credentials.access_token().is_none() {
                    debug!(channel = %target, "no stored token, not connecting");
                    return Vec::new();
                }
                self.machine.connect(target)
            }
            Command::Disconnect => {
                info!("realtime channel disconnect requested");
                self.machine.disconnect()
            }
            Command::Send(frame) => {
                self.send_frame(&frame);
                Vec::new()
            }
        }
    }

    fn on_socket_event(&mut self, event: SocketEvent) -> Vec<ChannelAction> {
        match event {
            SocketEvent::Opened { generation, writer } => {
                if generation != self.machine.generation() {
                    let _ = writer.send(Message::Close(None));
                    return Vec::new();
                }
                info!(channel = ?self.machine.target(), "realtime channel open");
                self.socket = Some(Socket { generation, writer });
                self.machine.on_open(generation)
            }
            SocketEvent::Frame { generation, text } => {
                if generation == self.machine.generation() {
                    self.dispatch(&text);
                }
                Vec::new()
            }
            SocketEvent::Errored { generation, error } => {
                if generation == self.machine.generation() {
                    warn!(error = %error, "realtime socket error");
                }
                self.machine.on_error(generation)
            }
            SocketEvent::Closed { generation } => {
                if self.socket.as_ref().is_some_and(|s| s.generation == generation) {
                    self.socket = None;
                }
                let actions = self.machine.on_close(generation);
                if generation == self.machine.generation() {
                    info!(
                        attempt = self.machine.attempt(),
                        state = ?self.machine.state(),
                        "realtime channel closed"
                    );
                }
                actions
            }
        }
    }

    fn dispatch(&self, text: &str) {
        match InboundEvent::parse(text) {
            Ok(InboundEvent::Pong) => trace!("pong"),
            Ok(InboundEvent::Unknown) => debug!(payload = %text, "ignoring unknown realtime event"),
            Ok(event) => {
                // No subscribers is fine.
                let _ = self.events.send(event);
            }
            Err(e) => warn!(error = %e, payload = %text, "dropping malformed realtime payload"),
        }
    }

    fn send_frame(&self, frame: &OutboundFrame) {
        let Some(socket) = self.socket.as_ref().filter(|_| self.machine.is_open()) else {
            warn!(state = ?self.machine.state(), "realtime channel not open, frame dropped");
            return;
        };
        match frame.to_text() {
            Ok(text) => {
                if socket.writer.send(Message::text(text)).is_err() {
                    warn!("realtime writer gone, frame dropped");
                }
            }
            Err(e) => warn!(error = %e, "failed to encode outbound frame"),
        }
    }

    fn execute(&mut self, actions: Vec<ChannelAction>) {
        for action in actions {
            match action {
                ChannelAction::Dial { target, generation } => self.dial(target, generation),
                ChannelAction::CloseSocket { generation } => {
                    if let Some(socket) = self.socket.take_if(|s| s.generation == generation) {
                        let _ = socket.writer.send(Message::Close(None));
                    }
                }
                ChannelAction::ArmPing(after) => self.ping_at = Some(Instant::now() + after),
                ChannelAction::CancelPing => self.ping_at = None,
                ChannelAction::ArmReconnect(after) => {
                    debug!(delay = ?after, attempt = self.machine.attempt(), "reconnect scheduled");
                    self.reconnect_at = Some(Instant::now() + after);
                }
                ChannelAction::CancelReconnect => self.reconnect_at = None,
                ChannelAction::SendPing => self.send_frame(&OutboundFrame::ping()),
            }
        }
        self.tasks.retain(|task| !task.is_finished());
    }

    fn dial(&mut self, target: ChannelTarget, generation: u64) {
        let Some(token) = self.credentials.access_token() else {
            debug!(channel = %target, "no stored token, abandoning dial");
            let actions = self.machine.on_missing_token(generation);
            self.execute(actions);
            return;
        };
        let url = match endpoint_url(&self.api_base, &target, &token) {
            Ok(url) => url,
            Err(e) => {
                warn!(error = %e, "cannot build realtime endpoint");
                let _ = self.socket_tx.send(SocketEvent::Closed { generation });
                return;
            }
        };

        debug!(channel = %target, generation, "dialing realtime endpoint");
        let report = self.socket_tx.clone();
        let task = tokio::spawn(async move {
            let stream = match tokio_tungstenite::connect_async(url.to_string()).await {
                Ok((stream, _response)) => stream,
                Err(e) => {
                    let _ = report.send(SocketEvent::Errored {
                        generation,
                        error: e.to_string(),
                    });
                    let _ = report.send(SocketEvent::Closed { generation });
                    return;
                }
            };

            let (mut sink, mut stream) = stream.split();
            let (writer, mut outbound) = mpsc::unbounded_channel::<Message>();
            if report.send(SocketEvent::Opened { generation, writer }).is_err() {
                return;
            }

            let write = async {
                while let Some(message) = outbound.recv().await {
                    let closing = matches!(message, Message::Close(_));
                    if sink.send(message).await.is_err() || closing {
                        break;
                    }
                }
                let _ = sink.close().await;
            };

            let read = async {
                while let Some(frame) = stream.next().await {
                    match frame {
                        Ok(Message::Text(text)) => {
                            let _ = report.send(SocketEvent::Frame {
                                generation,
                                text: text.as_str().to_owned(),
                            });
                        }
                        Ok(Message::Close(_)) => break,
                        Ok(_) => {}
                        Err(e) => {
                            let _ = report.send(SocketEvent::Errored {
                                generation,
                                error: e.to_string(),
                            });
                            break;
                        }
                    }
                }
            };

            // Either half ending means the socket is done.
            tokio::select! {
                _ = write => {}
                _ = read => {}
            }
            let _ = report.send(SocketEvent::Closed { generation });
        });
        self.tasks.push(task);
    }
}
