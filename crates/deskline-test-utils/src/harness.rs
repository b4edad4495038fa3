// SPDX-FileCopyrightText: 2026 Deskline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Wiring for tests that talk to a mock backend.

use std::sync::Arc;

use deskline_auth::{ApiClient, MemoryCredentialStore};
use deskline_config::model::ApiConfig;
use deskline_core::{CredentialStore, DesklineError, Role, StoredSession};

use crate::fixtures;

/// Builder for [`TestHarness`].
pub struct TestHarnessBuilder {
    base_url: String,
    session: Option<StoredSession>,
}

impl TestHarnessBuilder {
    /// Start logged in with the given tokens as an `usuario`.
    pub fn logged_in(mut self, access: &str, refresh: &str) -> Self {
        self.session = Some(fixtures::session(access, refresh, Role::Usuario));
        self
    }

    pub fn with_session(mut self, session: StoredSession) -> Self {
        self.session = Some(session);
        self
    }

    pub fn build(self) -> Result<TestHarness, DesklineError> {
        let store = Arc::new(match self.session {
            Some(session) => MemoryCredentialStore::with_session(session),
            None => MemoryCredentialStore::new(),
        });
        let config = ApiConfig {
            base_url: self.base_url,
            ..ApiConfig::default()
        };
        let api = ApiClient::new(&config, Arc::clone(&store) as Arc<dyn CredentialStore>)?;
        Ok(TestHarness { store, api })
    }
}

/// An API client and the store behind it.
pub struct TestHarness {
    pub store: Arc<MemoryCredentialStore>,
    pub api: ApiClient,
}

impl TestHarness {
    /// Builder targeting `base_url`, typically `MockServer::uri()`.
    pub fn builder(base_url: impl Into<String>) -> TestHarnessBuilder {
        TestHarnessBuilder {
            base_url: base_url.into(),
            session: None,
        }
    }

    /// Store handle as the trait object services expect.
    pub fn dyn_store(&self) -> Arc<dyn CredentialStore> {
        Arc::clone(&self.store) as Arc<dyn CredentialStore>
    }

    /// Currently stored session.
    pub fn session(&self) -> Option<StoredSession> {
        self.store.load().ok().flatten()
    }
}
