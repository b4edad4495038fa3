// SPDX-FileCopyrightText: 2026 Deskline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP side of the chat: loads conversations and threads into the
//! [`ConversationStore`] and feeds it realtime broadcasts.

use std::sync::Arc;

use chrono::Utc;
use deskline_auth::{ApiClient, ApiRequest};
use deskline_core::{
    ChatMessage, ConversationId, ConversationSummary, DesklineError, TicketId, UserProfile,
};
use deskline_realtime::{InboundEvent, OutboundFrame, RealtimeChannel};
use serde_json::{Value, json};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::store::{BroadcastOutcome, ConversationStore};
use crate::wire::{RawChatMessage, RawConversation, broadcast_message, decode_list};

const CONVERSATIONS: &str = "chat/conversaciones/";

fn conversation_path(id: ConversationId, action: &str) -> String {
    format!("{CONVERSATIONS}{id}/{action}/")
}

/// Chat operations for the logged-in account.
#[derive(Debug, Clone)]
pub struct ChatService {
    api: ApiClient,
    store: Arc<ConversationStore>,
}

impl ChatService {
    pub fn new(api: ApiClient, store: Arc<ConversationStore>) -> Self {
        Self { api, store }
    }

    pub fn store(&self) -> &Arc<ConversationStore> {
        &self.store
    }

    /// Reload the conversation list.
    pub async fn refresh_conversations(&self) -> Result<Vec<ConversationSummary>, DesklineError> {
        let value: Value = self.api.send(&ApiRequest::get(CONVERSATIONS)).await?;
        let conversations: Vec<ConversationSummary> =
            decode_list::<RawConversation>(value, "conversation")
                .into_iter()
                .map(RawConversation::normalize)
                .collect();
        debug!(count = conversations.len(), "conversations loaded");
        self.store.set_conversations(conversations.clone());
        Ok(conversations)
    }

    /// Open conversation `id`: load its history and mark it read.
    ///
    /// A failure to mark the conversation read is logged, not returned.
    pub async fn select_conversation(&self, id: ConversationId) -> Result<(), DesklineError> {
        self.store.select(id);

        let value = self
            .api
            .send(&ApiRequest::get(conversation_path(id, "mensajes")))
            .await?;
        let now = Utc::now();
        let messages = decode_list::<RawChatMessage>(value, "chat message")
            .into_iter()
            .map(|raw| raw.normalize(id.0, now))
            .collect();
        if !self.store.load_thread(id, messages) {
            debug!(conversation = %id, "selection changed while loading history");
        }

        let mark_read = ApiRequest::patch(conversation_path(id, "leido")).with_body(json!({}));
        if let Err(e) = self.api.send(&mark_read).await {
            warn!(conversation = %id, error = %e, "failed to mark conversation read");
        }
        Ok(())
    }

    /// Send `text` to conversation `id`.
    ///
    /// The server's copy is appended to the open thread right away; the
    /// matching broadcast is then recognized as a duplicate. Blank text is
    /// not sent and yields `None`.
    pub async fn send_message(
        &self,
        id: ConversationId,
        text: &str,
    ) -> Result<Option<ChatMessage>, DesklineError> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(None);
        }
        let raw: RawChatMessage = self
            .api
            .post_json(&conversation_path(id, "enviar_mensaje"), json!({ "texto": text }))
            .await?;
        let message = raw.normalize(id.0, Utc::now());
        self.store.append_local(id, message.clone());
        Ok(Some(message))
    }

    /// Push `text` through the realtime channel instead of HTTP.
    ///
    /// Nothing is appended locally; the message shows up when the server
    /// broadcasts it back.
    pub fn send_via_channel(
        &self,
        channel: &RealtimeChannel,
        id: ConversationId,
        text: &str,
        as_agent: bool,
    ) {
        let text = text.trim();
        if text.is_empty() {
            return;
        }
        channel.send(OutboundFrame::ConversationChat {
            conversation_id: id.0,
            mensaje: text.to_string(),
            es_agente: as_agent,
        });
    }

    /// Start a conversation with an agent, optionally about a ticket.
    pub async fn start_conversation(
        &self,
        agent_id: Option<u64>,
        ticket_id: Option<TicketId>,
    ) -> Result<ConversationSummary, DesklineError> {
        let body = json!({ "agenteId": agent_id, "ticketId": ticket_id });
        let raw: RawConversation = self.api.post_json(CONVERSATIONS, body).await?;
        let conversation = raw.normalize();
        info!(conversation = %conversation.id, "conversation started");
        self.store.upsert_conversation(conversation.clone());
        Ok(conversation)
    }

    /// Start (or reopen) a conversation with the account behind `email`.
    pub async fn start_conversation_by_email(
        &self,
        email: &str,
    ) -> Result<ConversationSummary, DesklineError> {
        let raw: RawConversation = self
            .api
            .post_json(
                &format!("{CONVERSATIONS}por_email/"),
                json!({ "email": email.trim() }),
            )
            .await?;
        let conversation = raw.normalize();
        info!(conversation = %conversation.id, "conversation started by email");
        self.store.upsert_conversation(conversation.clone());
        Ok(conversation)
    }

    /// Search accounts to start a conversation with. A blank query returns
    /// nothing without hitting the server.
    pub async fn search(&self, query: &str) -> Result<Vec<UserProfile>, DesklineError> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }
        let request = ApiRequest::get(format!("{CONVERSATIONS}buscar")).with_query("q", query);
        let value = self.api.send(&request).await?;
        Ok(decode_list(value, "user"))
    }

    /// Route one realtime event into the store.
    pub fn handle_event(&self, event: &InboundEvent) -> Option<BroadcastOutcome> {
        let InboundEvent::Message(broadcast) = event else {
            return None;
        };
        let fallback = self.store.active().map_or(0, |id| id.0);
        let message = broadcast_message(broadcast, fallback, Utc::now());
        Some(self.store.receive_broadcast(message))
    }

    /// Consume chat broadcasts from `events` until cancelled or the
    /// channel goes away.
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
                            warn!(skipped, "chat listener lagged, reloading conversations");
                            if let Err(e) = service.refresh_conversations().await {
                                warn!(error = %e, "conversation reload failed");
                            }
                        }
                        Err(RecvError::Closed) => break,
                    },
                }
            }
            debug!("chat listener stopped");
        })
    }
}
