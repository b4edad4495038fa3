// SPDX-FileCopyrightText: 2026 Deskline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain types shared across the Deskline crates.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

macro_rules! numeric_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<u64> for $name {
            fn from(value: u64) -> Self {
                Self(value)
            }
        }
    };
}

numeric_id!(
    /// Identifier of a chat conversation.
    ConversationId
);
numeric_id!(
    /// Identifier of a support ticket.
    TicketId
);
numeric_id!(
    /// Server-assigned identifier of a chat or ticket message.
    MessageId
);
numeric_id!(
    /// Identifier of a persistent notification.
    NotificationId
);

/// Account role stored alongside the credential.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
    Admin,
    Agente,
    Usuario,
}

/// Access credential and the longer-lived token it is exchanged with.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub access_token: String,
    pub refresh_token: String,
}

impl Credential {
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("access_token", &"[redacted]")
            .field("refresh_token", &"[redacted]")
            .finish()
    }
}

/// Profile of the logged-in account as returned by the login endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: u64,
    pub username: String,
    pub email: String,
    #[serde(default)]
    pub rol: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
}

/// Everything the client persists between runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredSession {
    #[serde(flatten)]
    pub credential: Credential,
    #[serde(default, rename = "rol")]
    pub role: Option<Role>,
    #[serde(default)]
    pub user: Option<UserProfile>,
}

/// A file attached to a ticket message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub id: Option<u64>,
    pub name: String,
    /// Absolute download URL.
    pub url: String,
    pub content_type: Option<String>,
    pub size: Option<u64>,
    pub uploaded_at: Option<String>,
}

/// A message in a conversation or ticket thread.
///
/// `id` is `None` for realtime broadcasts that the server sent without
/// a persisted identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: Option<MessageId>,
    /// Conversation id for chat threads, ticket id for ticket threads.
    pub thread_id: u64,
    pub sender: String,
    pub sender_full_name: Option<String>,
    pub is_agent: bool,
    pub text: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

impl ChatMessage {
    /// Ordering key within a thread: timestamp, then id for stability.
    pub fn sort_key(&self) -> (DateTime<Utc>, u64) {
        (self.timestamp, self.id.map_or(u64::MAX, |id| id.0))
    }

    /// Whether `other` is the same logical message as `self`.
    ///
    /// Messages with ids compare by id. When either side lacks an id the
    /// sender, text and timestamp must all match.
    pub fn same_message(&self, other: &ChatMessage) -> bool {
        match (self.id, other.id) {
            (Some(a), Some(b)) => a == b,
            _ => {
                self.sender == other.sender
                    && self.text == other.text
                    && self.timestamp == other.timestamp
            }
        }
    }
}

/// Sidebar entry for a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationSummary {
    pub id: ConversationId,
    pub user_id: Option<u64>,
    pub user_name: Option<String>,
    pub user_email: Option<String>,
    pub agent_id: Option<u64>,
    pub agent_name: Option<String>,
    pub agent_email: Option<String>,
    pub ticket_id: Option<TicketId>,
    pub ticket_subject: Option<String>,
    pub last_message: Option<String>,
    pub last_activity: Option<DateTime<Utc>>,
    pub unread: u32,
}

/// A persistent notification addressed to the current account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: NotificationId,
    /// Recipient user id; `0` is the legacy broadcast marker.
    pub recipient_id: u64,
    pub target_role: Option<Role>,
    pub kind: String,
    pub title: String,
    pub message: String,
    pub icon: String,
    pub ticket_id: Option<TicketId>,
    pub read: bool,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub data: serde_json::Value,
}

impl Notification {
    /// Whether this notification should be shown to `user_id` acting as `role`.
    pub fn visible_for(&self, user_id: Option<u64>, role: Option<Role>) -> bool {
        if user_id.is_some_and(|id| id == self.recipient_id) {
            return true;
        }
        if let (Some(target), Some(role)) = (self.target_role, role)
            && target == role
        {
            return true;
        }
        self.recipient_id == 0 && self.target_role.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(id: Option<u64>, text: &str, secs: i64) -> ChatMessage {
        ChatMessage {
            id: id.map(MessageId),
            thread_id: 1,
            sender: "ana".into(),
            sender_full_name: None,
            is_agent: false,
            text: text.into(),
            timestamp: DateTime::from_timestamp(secs, 0).unwrap_or_default(),
            attachments: Vec::new(),
        }
    }

    #[test]
    fn same_message_uses_id_when_both_present() {
        let a = message(Some(7), "hola", 10);
        let b = message(Some(7), "edited", 99);
        let c = message(Some(8), "hola", 10);
        assert!(a.same_message(&b));
        assert!(!a.same_message(&c));
    }

    #[test]
    fn same_message_falls_back_to_fingerprint() {
        let persisted = message(Some(7), "hola", 10);
        let broadcast = message(None, "hola", 10);
        let other = message(None, "hola", 11);
        assert!(persisted.same_message(&broadcast));
        assert!(!persisted.same_message(&other));
    }

    #[test]
    fn stored_session_serializes_flat() {
        let session = StoredSession {
            credential: Credential::new("a", "r"),
            role: Some(Role::Agente),
            user: None,
        };
        let json = serde_json::to_value(&session).unwrap();
        assert_eq!(json["access_token"], "a");
        assert_eq!(json["refresh_token"], "r");
        assert_eq!(json["rol"], "agente");
    }

    #[test]
    fn notification_visibility_rules() {
        let base = Notification {
            id: NotificationId(1),
            recipient_id: 5,
            target_role: None,
            kind: "ticket_response".into(),
            title: "t".into(),
            message: "m".into(),
            icon: "fa-bell".into(),
            ticket_id: None,
            read: false,
            created_at: Utc::now(),
            data: serde_json::Value::Null,
        };
        assert!(base.visible_for(Some(5), None));
        assert!(!base.visible_for(Some(6), Some(Role::Usuario)));

        let role_targeted = Notification {
            recipient_id: 0,
            target_role: Some(Role::Agente),
            ..base.clone()
        };
        assert!(role_targeted.visible_for(Some(6), Some(Role::Agente)));
        assert!(!role_targeted.visible_for(Some(6), Some(Role::Usuario)));

        let broadcast = Notification {
            recipient_id: 0,
            target_role: None,
            ..base
        };
        assert!(broadcast.visible_for(None, None));
    }
}
