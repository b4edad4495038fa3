// SPDX-FileCopyrightText: 2026 Deskline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Canned domain values for tests.

use chrono::{DateTime, Utc};
use deskline_core::{
    ChatMessage, ConversationId, ConversationSummary, Credential, MessageId, Role,
    StoredSession, UserProfile,
};

/// Fixed instant `secs` seconds after the Unix epoch.
pub fn at(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, 0).unwrap_or_default()
}

/// A session for user 7 with the given role.
pub fn session(access: &str, refresh: &str, role: Role) -> StoredSession {
    StoredSession {
        credential: Credential::new(access, refresh),
        role: Some(role),
        user: Some(UserProfile {
            id: 7,
            username: "ana".into(),
            email: "ana@example.com".into(),
            rol: Some(role.to_string()),
            first_name: Some("Ana".into()),
            last_name: None,
        }),
    }
}

/// A chat message in `thread` sent by `sender` at `secs`.
pub fn message(id: Option<u64>, thread: u64, sender: &str, text: &str, secs: i64) -> ChatMessage {
    ChatMessage {
        id: id.map(MessageId),
        thread_id: thread,
        sender: sender.into(),
        sender_full_name: None,
        is_agent: false,
        text: text.into(),
        timestamp: at(secs),
        attachments: Vec::new(),
    }
}

/// A conversation summary with nothing unread.
pub fn conversation(id: u64) -> ConversationSummary {
    ConversationSummary {
        id: ConversationId(id),
        user_id: Some(7),
        user_name: Some("ana".into()),
        user_email: Some("ana@example.com".into()),
        agent_id: Some(2),
        agent_name: Some("soporte".into()),
        agent_email: None,
        ticket_id: None,
        ticket_subject: None,
        last_message: None,
        last_activity: None,
        unread: 0,
    }
}
