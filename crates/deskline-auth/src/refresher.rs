// SPDX-FileCopyrightText: 2026 Deskline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Single-flight exchange of the refresh token for a new access token.
//!
//! State moves `Idle -> Refreshing -> Idle`. The first caller to find the
//! refresher idle spawns the exchange; everyone arriving while it runs
//! parks a `oneshot` sender in the waiter list. When the exchange settles
//! the list is drained and each waiter is resolved exactly once with the
//! same outcome. The exchange runs in its own task, so a caller that is
//! dropped mid-wait cannot leave the others stranded.

use std::mem;
use std::sync::Arc;

use deskline_core::{AuthFailure, CredentialStore};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, oneshot};
use tracing::{debug, info, warn};

type Waiter = oneshot::Sender<Result<String, AuthFailure>>;

enum RefreshState {
    Idle,
    Refreshing(Vec<Waiter>),
}

#[derive(Serialize)]
struct RefreshRequest<'a> {
    refresh: &'a str,
}

#[derive(Deserialize)]
struct RefreshResponse {
    access: String,
}

struct Inner {
    http: reqwest::Client,
    refresh_url: Url,
    store: Arc<dyn CredentialStore>,
    state: Mutex<RefreshState>,
}

/// Shared handle to the refresh cycle. Clones share one state machine.
#[derive(Clone)]
pub struct CredentialRefresher {
    inner: Arc<Inner>,
}

impl CredentialRefresher {
    pub fn new(http: reqwest::Client, refresh_url: Url, store: Arc<dyn CredentialStore>) -> Self {
        Self {
            inner: Arc::new(Inner {
                http,
                refresh_url,
                store,
                state: Mutex::new(RefreshState::Idle),
            }),
        }
    }

    /// Whether an exchange is currently in flight.
    pub async fn is_refreshing(&self) -> bool {
        matches!(*self.inner.state.lock().await, RefreshState::Refreshing(_))
    }

    /// Obtain a fresh access token, joining the in-flight exchange if any.
    ///
    /// On failure the stored session has already been cleared.
    pub async fn refresh(&self) -> Result<String, AuthFailure> {
        let (tx, rx) = oneshot::channel();

        let start = {
            let mut state = self.inner.state.lock().await;
            match &mut *state {
                RefreshState::Refreshing(waiters) => {
                    waiters.push(tx);
                    debug!(queued = waiters.len(), "joining in-flight refresh");
                    false
                }
                RefreshState::Idle => {
                    *state = RefreshState::Refreshing(vec![tx]);
                    true
                }
            }
        };

        if start {
            let inner = Arc::clone(&self.inner);
            tokio::spawn(async move { inner.run_cycle().await });
        }

        rx.await.unwrap_or(Err(AuthFailure::RefreshAborted))
    }
}

impl Inner {
    async fn run_cycle(&self) {
        let outcome = self.exchange().await;

        if let Err(failure) = &outcome {
            warn!(error = %failure, "credential refresh failed, clearing session");
            if let Err(e) = self.store.clear() {
                warn!(error = %e, "failed to clear stored session");
            }
        }

        let waiters = {
            let mut state = self.state.lock().await;
            match mem::replace(&mut *state, RefreshState::Idle) {
                RefreshState::Refreshing(waiters) => waiters,
                RefreshState::Idle => Vec::new(),
            }
        };

        debug!(waiters = waiters.len(), ok = outcome.is_ok(), "refresh settled");
        for waiter in waiters {
            // A closed receiver means that caller went away.
            let _ = waiter.send(outcome.clone());
        }
    }

    async fn exchange(&self) -> Result<String, AuthFailure> {
        let refresh_token = match self.store.load() {
            Ok(Some(session)) if !session.credential.refresh_token.is_empty() => {
                session.credential.refresh_token
            }
            Ok(_) => return Err(AuthFailure::NoRefreshToken),
            Err(e) => {
                warn!(error = %e, "could not read stored session for refresh");
                return Err(AuthFailure::NoRefreshToken);
            }
        };

        let response = self
            .http
            .post(self.refresh_url.clone())
            .json(&RefreshRequest {
                refresh: &refresh_token,
            })
            .send()
            .await
            .map_err(|e| AuthFailure::RefreshTransport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AuthFailure::RefreshRejected {
                status: status.as_u16(),
                body,
            });
        }

        let RefreshResponse { access } = response
            .json()
            .await
            .map_err(|e| AuthFailure::RefreshTransport(format!("invalid refresh response: {e}")))?;

        self.store
            .update_access(&access)
            .map_err(|e| AuthFailure::RefreshTransport(format!("failed to persist token: {e}")))?;
        info!("access credential refreshed");
        Ok(access)
    }
}
