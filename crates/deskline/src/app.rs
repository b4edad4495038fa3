// SPDX-FileCopyrightText: 2026 Deskline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Wiring shared by every subcommand.

use std::sync::Arc;

use deskline_auth::{ApiClient, FileCredentialStore, SessionService};
use deskline_config::DesklineConfig;
use deskline_core::{AuthFailure, CredentialStore, DesklineError};
use deskline_realtime::{ChannelSettings, RealtimeChannel};
use tracing::debug;

pub struct App {
    pub config: DesklineConfig,
    pub api: ApiClient,
    store: Arc<dyn CredentialStore>,
}

impl App {
    pub fn new(config: DesklineConfig) -> Result<Self, DesklineError> {
        let path = config.session.credentials_path.clone();
        debug!(path = %path.display(), "using credential file");
        let store: Arc<dyn CredentialStore> = Arc::new(FileCredentialStore::new(path));
        let api = ApiClient::new(&config.api, Arc::clone(&store))?;
        Ok(Self { config, api, store })
    }

    pub fn sessions(&self) -> SessionService {
        SessionService::new(self.api.clone(), Arc::clone(&self.store))
    }

    /// Fails with [`AuthFailure::NotLoggedIn`] unless a session is stored.
    pub fn require_login(&self) -> Result<(), DesklineError> {
        if self.sessions().is_logged_in() {
            Ok(())
        } else {
            Err(AuthFailure::NotLoggedIn.into())
        }
    }

    pub fn realtime(&self) -> RealtimeChannel {
        RealtimeChannel::spawn(
            self.api.base_url().clone(),
            ChannelSettings::from(&self.config.realtime),
            self.api.credentials().clone(),
        )
    }
}
