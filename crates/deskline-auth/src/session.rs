// SPDX-FileCopyrightText: 2026 Deskline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Login and logout.
//!
//! This is the only component besides the refresher that writes the
//! credential store.

use std::str::FromStr;
use std::sync::Arc;

use deskline_core::{
    Credential, CredentialStore, DesklineError, Role, StoredSession, UserProfile,
};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};

use crate::client::ApiClient;

#[derive(Debug, Deserialize)]
struct LoginResponse {
    access: String,
    refresh: String,
    #[serde(default)]
    user: Option<UserProfile>,
}

/// What a successful login established.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginResult {
    pub role: Option<Role>,
    pub user: Option<UserProfile>,
}

/// Creates and destroys the persisted session.
#[derive(Clone)]
pub struct SessionService {
    api: ApiClient,
    store: Arc<dyn CredentialStore>,
}

impl SessionService {
    pub fn new(api: ApiClient, store: Arc<dyn CredentialStore>) -> Self {
        Self { api, store }
    }

    /// Exchange email and password for a credential pair and persist it.
    pub async fn login(&self, email: &str, password: &str) -> Result<LoginResult, DesklineError> {
        let response: LoginResponse = self
            .api
            .post_json("login/", json!({ "email": email, "password": password }))
            .await?;

        let role = response.user.as_ref().and_then(|user| {
            let raw = user.rol.as_deref()?;
            Role::from_str(raw)
                .inspect_err(|_| warn!(rol = raw, "unrecognized role in login response"))
                .ok()
        });

        self.store.save(&StoredSession {
            credential: Credential::new(response.access, response.refresh),
            role,
            user: response.user.clone(),
        })?;

        info!(
            user = response.user.as_ref().map(|u| u.username.as_str()),
            role = role.map(|r| r.to_string()),
            "logged in"
        );
        Ok(LoginResult {
            role,
            user: response.user,
        })
    }

    /// Drop every stored value.
    pub fn logout(&self) -> Result<(), DesklineError> {
        self.store.clear()?;
        info!("logged out");
        Ok(())
    }

    /// Logged in means both an access token and a role are stored.
    pub fn is_logged_in(&self) -> bool {
        let credentials = self.api.credentials();
        credentials.access_token().is_some() && credentials.role().is_some()
    }

    pub fn role(&self) -> Option<Role> {
        self.api.credentials().role()
    }

    pub fn user(&self) -> Option<UserProfile> {
        self.api.credentials().user()
    }
}

impl std::fmt::Debug for SessionService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionService")
            .field("api", &self.api)
            .finish_non_exhaustive()
    }
}
