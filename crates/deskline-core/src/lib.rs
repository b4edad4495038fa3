// SPDX-FileCopyrightText: 2026 Deskline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Deskline helpdesk client.
//!
//! This crate provides the domain types shared by the session, realtime and
//! chat crates, the workspace error type, and the [`CredentialStore`] trait
//! through which every credential read and write is routed.

pub mod error;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::{AuthFailure, DesklineError};
pub use traits::{CredentialReader, CredentialStore};
pub use types::{
    Attachment, ChatMessage, ConversationId, ConversationSummary, Credential, MessageId,
    Notification, NotificationId, Role, StoredSession, TicketId, UserProfile,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deskline_error_has_all_variants() {
        let _config = DesklineError::Config("test".into());
        let _storage = DesklineError::Storage {
            source: Box::new(std::io::Error::other("test")),
        };
        let _http = DesklineError::Http {
            message: "test".into(),
            source: None,
        };
        let _status = DesklineError::Status {
            status: 500,
            body: "boom".into(),
        };
        let _auth = DesklineError::Auth(AuthFailure::NoRefreshToken);
        let _realtime = DesklineError::Realtime {
            message: "test".into(),
            source: None,
        };
        let _payload = DesklineError::Payload {
            message: "test".into(),
            source: None,
        };
        let _internal = DesklineError::Internal("test".into());
    }

    #[test]
    fn role_round_trips_through_display_and_from_str() {
        use std::str::FromStr;

        for role in [Role::Admin, Role::Agente, Role::Usuario] {
            let s = role.to_string();
            let parsed = Role::from_str(&s).expect("should parse back");
            assert_eq!(role, parsed);
        }
        assert!(Role::from_str("superuser").is_err());
    }

    #[test]
    fn credential_debug_is_redacted() {
        let credential = Credential::new("access-secret", "refresh-secret");
        let debug = format!("{credential:?}");
        assert!(!debug.contains("access-secret"));
        assert!(!debug.contains("refresh-secret"));
        assert!(debug.contains("[redacted]"));
    }
}
