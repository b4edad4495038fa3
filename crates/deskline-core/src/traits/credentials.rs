// SPDX-FileCopyrightText: 2026 Deskline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Credential persistence contract.
//!
//! The stored session is a process-wide singleton. Only the session service
//! (login/logout) and the credential refresher hold an
//! `Arc<dyn CredentialStore>`; every other component gets a
//! [`CredentialReader`], which cannot write.

use std::fmt;
use std::sync::Arc;

use tracing::warn;

use crate::error::DesklineError;
use crate::types::{Role, StoredSession, UserProfile};

/// Backing store for the persisted session.
pub trait CredentialStore: Send + Sync + 'static {
    /// Returns the stored session, or `None` when logged out.
    fn load(&self) -> Result<Option<StoredSession>, DesklineError>;

    /// Replaces the stored session wholesale.
    fn save(&self, session: &StoredSession) -> Result<(), DesklineError>;

    /// Removes every stored value.
    fn clear(&self) -> Result<(), DesklineError>;

    /// Replaces only the access token, keeping the refresh token and role.
    fn update_access(&self, access_token: &str) -> Result<(), DesklineError> {
        let Some(mut session) = self.load()? else {
            return Err(DesklineError::Internal(
                "cannot update access token without a stored session".into(),
            ));
        };
        session.credential.access_token = access_token.to_string();
        self.save(&session)
    }
}

/// Read-only view over a [`CredentialStore`].
///
/// Load failures are logged and reported as "no value", so readers never
/// have to handle storage errors.
#[derive(Clone)]
pub struct CredentialReader {
    store: Arc<dyn CredentialStore>,
}

impl CredentialReader {
    pub fn new(store: Arc<dyn CredentialStore>) -> Self {
        Self { store }
    }

    fn session(&self) -> Option<StoredSession> {
        match self.store.load() {
            Ok(session) => session,
            Err(e) => {
                warn!(error = %e, "failed to read stored session");
                None
            }
        }
    }

    /// Current access token.
    pub fn access_token(&self) -> Option<String> {
        self.session().map(|s| s.credential.access_token)
    }

    /// Role marker stored at login.
    pub fn role(&self) -> Option<Role> {
        self.session().and_then(|s| s.role)
    }

    /// Profile stored at login.
    pub fn user(&self) -> Option<UserProfile> {
        self.session().and_then(|s| s.user)
    }
}

impl fmt::Debug for CredentialReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialReader").finish_non_exhaustive()
    }
}
