// SPDX-FileCopyrightText: 2026 Deskline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Wire frames exchanged over the realtime channel.
//!
//! Server -> client frames carry a `type` discriminator:
//! ```json
//! {"type": "message", "conversacionId": 3, "mensaje": "hola", "usuario": "ana", "esAgente": false, "fecha": "..."}
//! {"type": "notification", "id": 12, "titulo": "Nueva respuesta", "ticket_id": 4}
//! {"type": "pending_notification", "notification": {"id": 12, "titulo": "...", "mensaje": "...", "ticket_id": 4, "creada": "..."}}
//! {"type": "notification_read", "id": 12}
//! {"type": "pong"}
//! ```
//!
//! Client -> server frames:
//! ```json
//! {"action": "ping"}
//! {"action": "mark_read", "notification_id": 12}
//! {"mensaje": "hola", "esAgente": false}
//! {"conversacionId": 3, "mensaje": "hola", "esAgente": false}
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A frame pushed by the server.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundEvent {
    /// A chat message broadcast to the room.
    Message(ChatBroadcast),
    /// A notification was created for this account.
    Notification(NotificationPush),
    /// An unread notification replayed right after connecting.
    PendingNotification { notification: PendingNotification },
    /// A notification was marked read elsewhere.
    NotificationRead {
        #[serde(alias = "notification_id")]
        id: u64,
    },
    /// Reply to a keepalive ping.
    Pong,
    /// Any `type` this client does not know about.
    #[serde(other)]
    Unknown,
}

impl InboundEvent {
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Whether this event changes the notification feed.
    pub fn touches_notifications(&self) -> bool {
        matches!(
            self,
            InboundEvent::Notification(_)
                | InboundEvent::PendingNotification { .. }
                | InboundEvent::NotificationRead { .. }
        )
    }
}

/// Chat message as broadcast by the server.
///
/// Broadcasts usually lack a persisted `id`; the text may arrive as either
/// `mensaje` or `texto`.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct ChatBroadcast {
    #[serde(default, rename = "conversacionId")]
    pub conversation_id: Option<u64>,
    #[serde(default)]
    pub id: Option<u64>,
    #[serde(default)]
    pub mensaje: Option<String>,
    #[serde(default)]
    pub texto: Option<String>,
    #[serde(default)]
    pub usuario: Option<String>,
    #[serde(default, rename = "esAgente")]
    pub es_agente: Option<bool>,
    #[serde(default)]
    pub fecha: Option<String>,
    #[serde(default)]
    pub attachments: Vec<Value>,
}

impl ChatBroadcast {
    pub fn text(&self) -> Option<&str> {
        self.mensaje.as_deref().or(self.texto.as_deref())
    }
}

/// Live notification signal. `id` is sometimes a placeholder string.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NotificationPush {
    #[serde(default)]
    pub id: Value,
    #[serde(default)]
    pub titulo: Option<String>,
    #[serde(default)]
    pub ticket_id: Option<u64>,
}

impl NotificationPush {
    /// Numeric id when the server sent a real one.
    pub fn numeric_id(&self) -> Option<u64> {
        self.id.as_u64()
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PendingNotification {
    pub id: u64,
    #[serde(default)]
    pub titulo: Option<String>,
    #[serde(default)]
    pub mensaje: Option<String>,
    #[serde(default)]
    pub ticket_id: Option<u64>,
    #[serde(default)]
    pub creada: Option<String>,
}

/// A frame sent by the client.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum OutboundFrame {
    Action(ClientAction),
    ConversationChat {
        #[serde(rename = "conversacionId")]
        conversation_id: u64,
        mensaje: String,
        #[serde(rename = "esAgente")]
        es_agente: bool,
    },
    TicketChat {
        mensaje: String,
        #[serde(rename = "esAgente")]
        es_agente: bool,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ClientAction {
    Ping,
    MarkRead { notification_id: u64 },
}

impl OutboundFrame {
    pub fn ping() -> Self {
        OutboundFrame::Action(ClientAction::Ping)
    }

    pub fn mark_read(notification_id: u64) -> Self {
        OutboundFrame::Action(ClientAction::MarkRead { notification_id })
    }

    pub fn to_text(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_chat_broadcast_without_id() {
        let event = InboundEvent::parse(
            r#"{"type":"message","conversacionId":3,"mensaje":"hola","usuario":"ana","esAgente":false,"fecha":"2026-01-02T03:04:05+00:00"}"#,
        )
        .unwrap();
        let InboundEvent::Message(msg) = event else {
            panic!("expected message, got {event:?}");
        };
        assert_eq!(msg.conversation_id, Some(3));
        assert_eq!(msg.id, None);
        assert_eq!(msg.text(), Some("hola"));
        assert_eq!(msg.es_agente, Some(false));
    }

    #[test]
    fn texto_is_accepted_for_text() {
        let event = InboundEvent::parse(r#"{"type":"message","texto":"hi","fecha":null}"#).unwrap();
        let InboundEvent::Message(msg) = event else {
            panic!("expected message");
        };
        assert_eq!(msg.text(), Some("hi"));
        assert_eq!(msg.fecha, None);
    }

    #[test]
    fn notification_placeholder_id() {
        let event = InboundEvent::parse(
            r#"{"type":"notification","id":"new_notification","titulo":"x","ticket_id":4}"#,
        )
        .unwrap();
        let InboundEvent::Notification(push) = event else {
            panic!("expected notification");
        };
        assert_eq!(push.numeric_id(), None);
        assert_eq!(push.ticket_id, Some(4));
    }

    #[test]
    fn pending_notification_nested() {
        let event = InboundEvent::parse(
            r#"{"type":"pending_notification","notification":{"id":12,"titulo":"t","mensaje":"m","ticket_id":null,"creada":"2026-01-01T00:00:00Z"}}"#,
        )
        .unwrap();
        assert!(event.touches_notifications());
        assert!(matches!(
            event,
            InboundEvent::PendingNotification { notification } if notification.id == 12
        ));
    }

    #[test]
    fn unknown_type_and_pong() {
        assert_eq!(
            InboundEvent::parse(r#"{"type":"typing"}"#).unwrap(),
            InboundEvent::Unknown
        );
        assert_eq!(InboundEvent::parse(r#"{"type":"pong"}"#).unwrap(), InboundEvent::Pong);
    }

    #[test]
    fn malformed_payloads_error() {
        assert!(InboundEvent::parse("not json").is_err());
        assert!(InboundEvent::parse(r#"{"no_type":1}"#).is_err());
    }

    #[test]
    fn outbound_shapes() {
        let ping: Value = serde_json::from_str(&OutboundFrame::ping().to_text().unwrap()).unwrap();
        assert_eq!(ping, json!({"action": "ping"}));

        let read: Value =
            serde_json::from_str(&OutboundFrame::mark_read(12).to_text().unwrap()).unwrap();
        assert_eq!(read, json!({"action": "mark_read", "notification_id": 12}));

        let chat = OutboundFrame::ConversationChat {
            conversation_id: 3,
            mensaje: "hola".into(),
            es_agente: true,
        };
        let chat: Value = serde_json::from_str(&chat.to_text().unwrap()).unwrap();
        assert_eq!(chat, json!({"conversacionId": 3, "mensaje": "hola", "esAgente": true}));

        let ticket = OutboundFrame::TicketChat {
            mensaje: "hola".into(),
            es_agente: false,
        };
        let ticket: Value = serde_json::from_str(&ticket.to_text().unwrap()).unwrap();
        assert_eq!(ticket, json!({"mensaje": "hola", "esAgente": false}));
    }
}
