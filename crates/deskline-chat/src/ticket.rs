// SPDX-FileCopyrightText: 2026 Deskline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Message thread of a single support ticket.

use chrono::Utc;
use deskline_auth::{ApiClient, ApiRequest};
use deskline_core::{ChatMessage, DesklineError, TicketId};
use deskline_realtime::{InboundEvent, OutboundFrame, RealtimeChannel};
use serde_json::json;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::thread::MessageThread;
use crate::wire::{RawTicketMessage, backend_origin, broadcast_message, decode_list};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TicketThreadSnapshot {
    pub ticket: Option<TicketId>,
    pub thread: MessageThread,
}

/// Loads, replies to, and live-updates the open ticket's thread.
#[derive(Debug, Clone)]
pub struct TicketThreadService {
    api: ApiClient,
    origin: String,
    state: watch::Sender<TicketThreadSnapshot>,
}

impl TicketThreadService {
    pub fn new(api: ApiClient) -> Self {
        let origin = backend_origin(api.base_url().as_str());
        let (state, _) = watch::channel(TicketThreadSnapshot::default());
        Self { api, origin, state }
    }

    pub fn snapshot(&self) -> TicketThreadSnapshot {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<TicketThreadSnapshot> {
        self.state.subscribe()
    }

    /// Open `ticket` and load its history.
    ///
    /// If another ticket was opened before the response arrived the
    /// history is dropped.
    pub async fn load(&self, ticket: TicketId) -> Result<(), DesklineError> {
        self.state.send_modify(|s| {
            s.ticket = Some(ticket);
            s.thread.clear();
        });

        let value = self
            .api
            .send(&ApiRequest::get(format!("tickets/{ticket}/mensajes/")))
            .await?;
        let now = Utc::now();
        let messages: Vec<ChatMessage> = decode_list::<RawTicketMessage>(value, "ticket message")
            .into_iter()
            .map(|raw| raw.normalize(ticket.0, &self.origin, now))
            .collect();

        self.state.send_if_modified(|s| {
            if s.ticket != Some(ticket) {
                debug!(%ticket, "discarding history for ticket no longer open");
                return false;
            }
            let live = std::mem::take(&mut s.thread);
            let mut thread = MessageThread::from_batch(messages);
            for message in live.into_vec() {
                thread.insert(message);
            }
            s.thread = thread;
            true
        });
        Ok(())
    }

    /// Post a reply to `ticket`. Blank text is not sent.
    pub async fn reply(
        &self,
        ticket: TicketId,
        text: &str,
    ) -> Result<Option<ChatMessage>, DesklineError> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(None);
        }
        let raw: RawTicketMessage = self
            .api
            .post_json(&format!("tickets/{ticket}/responder/"), json!({ "texto": text }))
            .await?;
        let message = raw.normalize(ticket.0, &self.origin, Utc::now());
        self.insert_if_open(ticket, message.clone());
        Ok(Some(message))
    }

    /// Send a reply over the ticket's realtime channel.
    pub fn send_via_channel(&self, channel: &RealtimeChannel, text: &str, as_agent: bool) {
        let text = text.trim();
        if text.is_empty() {
            return;
        }
        channel.send(OutboundFrame::TicketChat {
            mensaje: text.to_string(),
            es_agente: as_agent,
        });
    }

    /// Add a broadcast to the open ticket. Returns whether it was new.
    pub fn receive_broadcast(&self, message: ChatMessage) -> bool {
        let ticket = TicketId(message.thread_id);
        self.insert_if_open(ticket, message)
    }

    fn insert_if_open(&self, ticket: TicketId, message: ChatMessage) -> bool {
        self.state.send_if_modified(|s| s.ticket == Some(ticket) && s.thread.insert(message))
    }

    /// Route one realtime event. Ticket sockets carry no ticket id, so
    /// messages are attributed to the open ticket.
    pub fn handle_event(&self, event: &InboundEvent) -> bool {
        let InboundEvent::Message(broadcast) = event else {
            return false;
        };
        let Some(ticket) = self.state.borrow().ticket else {
            return false;
        };
        let mut message = broadcast_message(broadcast, ticket.0, Utc::now());
        message.thread_id = ticket.0;
        for attachment in &mut message.attachments {
            if attachment.url.starts_with('/') {
                attachment.url = format!("{}{}", self.origin, attachment.url);
            }
        }
        self.receive_broadcast(message)
    }

    /// Close the open ticket.
    pub fn clear(&self) {
        self.state.send_replace(TicketThreadSnapshot::default());
    }

    pub fn attach(
        &self,
        mut events: broadcast::Receiver<InboundEvent>,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        let service = self.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    received = events.recv() => match received {
                        Ok(event) => {
                            service.handle_event(&event);
                        }
                        Err(RecvError::Lagged(skipped)) => {
                            warn!(skipped, "ticket listener lagged");
                            let open = service.state.borrow().ticket;
                            if let Some(ticket) = open
                                && let Err(e) = service.load(ticket).await
                            {
                                warn!(%ticket, error = %e, "ticket reload failed");
                            }
                        }
                        Err(RecvError::Closed) => break,
                    },
                }
            }
        })
    }
}
