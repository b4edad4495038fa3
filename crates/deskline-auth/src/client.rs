// SPDX-FileCopyrightText: 2026 Deskline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Authenticated REST client.
//!
//! [`ApiClient`] attaches `Authorization: Bearer <token>` to every request
//! whose URL is not on the public allow-list. When the backend answers 401
//! with the token-invalid marker, the client asks the
//! [`CredentialRefresher`] for a new token and replays the request once.

use std::sync::Arc;

use deskline_config::model::ApiConfig;
use deskline_core::{AuthFailure, CredentialReader, CredentialStore, DesklineError};
use reqwest::{Method, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

use crate::refresher::CredentialRefresher;

/// A request description that can be sent more than once.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    /// Path relative to the API base URL, e.g. `chat/conversaciones/`.
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>, body: Value) -> Self {
        Self::new(Method::POST, path).with_body(body)
    }

    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Method::PATCH, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }
}

/// Outcome of a single HTTP exchange, before the guard decides what to do.
enum Exchange {
    Success(Value),
    Failure { status: StatusCode, body: String },
}

/// REST client shared by every service.
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: Url,
    public_paths: Arc<[String]>,
    token_invalid_marker: String,
    credentials: CredentialReader,
    refresher: CredentialRefresher,
}

impl ApiClient {
    /// Build a client for `config`, sharing `store` with the refresher.
    pub fn new(config: &ApiConfig, store: Arc<dyn CredentialStore>) -> Result<Self, DesklineError> {
        let base_url = parse_base_url(&config.base_url)?;
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| DesklineError::Http {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;

        let refresh_url = join_path(&base_url, "token/refresh/")?;
        let refresher = CredentialRefresher::new(http.clone(), refresh_url, Arc::clone(&store));

        Ok(Self {
            http,
            base_url,
            public_paths: config.public_paths.clone().into(),
            token_invalid_marker: config.token_invalid_marker.clone(),
            credentials: CredentialReader::new(store),
            refresher,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn credentials(&self) -> &CredentialReader {
        &self.credentials
    }

    pub fn refresher(&self) -> &CredentialRefresher {
        &self.refresher
    }

    /// Whether `url` is on the public allow-list and must go out unauthenticated.
    pub fn is_public(&self, url: &str) -> bool {
        self.public_paths.iter().any(|p| url.contains(p.as_str()))
    }

    /// Absolute URL for a path relative to the base URL.
    pub fn url_for(&self, path: &str) -> Result<Url, DesklineError> {
        join_path(&self.base_url, path)
    }

    /// Whether a failed response signals an expired or invalid access token.
    fn is_token_invalid(&self, status: StatusCode, body: &str) -> bool {
        if status != StatusCode::UNAUTHORIZED {
            return false;
        }
        let marker = self.token_invalid_marker.as_str();
        match serde_json::from_str::<Value>(body) {
            Ok(json) => {
                let field_has_marker = |field: &str| {
                    json.get(field)
                        .and_then(Value::as_str)
                        .is_some_and(|s| s.contains(marker))
                };
                field_has_marker("code") || field_has_marker("detail")
            }
            Err(_) => body.contains(marker),
        }
    }

    /// Send `request`, recovering once from an expired access token.
    pub async fn send(&self, request: &ApiRequest) -> Result<Value, DesklineError> {
        let mut url = self.url_for(&request.path)?;
        if !request.query.is_empty() {
            url.query_pairs_mut().extend_pairs(&request.query);
        }

        if self.is_public(url.as_str()) {
            return match self.exchange(request, &url, None).await? {
                Exchange::Success(value) => Ok(value),
                Exchange::Failure { status, body } => Err(status_error(status, body)),
            };
        }

        let sent_with = self.credentials.access_token();
        let (status, body) = match self.exchange(request, &url, sent_with.as_deref()).await? {
            Exchange::Success(value) => return Ok(value),
            Exchange::Failure { status, body } => (status, body),
        };

        if !self.is_token_invalid(status, &body) {
            return Err(status_error(status, body));
        }

        // Another caller may already have refreshed while this request was in flight.
        let current = self.credentials.access_token();
        let token = match current {
            Some(current) if sent_with.as_deref() != Some(current.as_str()) => {
                debug!(path = %request.path, "token changed while in flight, replaying");
                current
            }
            _ => {
                debug!(path = %request.path, "access token rejected, refreshing");
                self.refresher.refresh().await?
            }
        };

        match self.exchange(request, &url, Some(&token)).await? {
            Exchange::Success(value) => Ok(value),
            Exchange::Failure { status, body } if status == StatusCode::UNAUTHORIZED => {
                warn!(path = %request.path, "request still unauthorized after refresh");
                Err(AuthFailure::Unauthorized { body }.into())
            }
            Exchange::Failure { status, body } => Err(status_error(status, body)),
        }
    }

    async fn exchange(
        &self,
        request: &ApiRequest,
        url: &Url,
        token: Option<&str>,
    ) -> Result<Exchange, DesklineError> {
        let mut builder = self.http.request(request.method.clone(), url.clone());
        if let Some(token) = token {
            builder = builder.bearer_auth(token);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(|e| DesklineError::Http {
            message: format!("{} {} failed: {e}", request.method, request.path),
            source: Some(Box::new(e)),
        })?;

        let status = response.status();
        let text = response.text().await.map_err(|e| DesklineError::Http {
            message: format!("failed to read response body: {e}"),
            source: Some(Box::new(e)),
        })?;
        debug!(method = %request.method, path = %request.path, status = %status, "response received");

        if !status.is_success() {
            return Ok(Exchange::Failure { status, body: text });
        }
        if text.trim().is_empty() {
            return Ok(Exchange::Success(Value::Null));
        }
        serde_json::from_str(&text)
            .map(Exchange::Success)
            .map_err(|e| DesklineError::Payload {
                message: format!("{} {} returned invalid JSON", request.method, request.path),
                source: Some(Box::new(e)),
            })
    }

    /// Send `request` and decode the body into `T`.
    pub async fn send_json<T: DeserializeOwned>(
        &self,
        request: &ApiRequest,
    ) -> Result<T, DesklineError> {
        let value = self.send(request).await?;
        serde_json::from_value(value).map_err(|e| DesklineError::Payload {
            message: format!("unexpected response shape from {}", request.path),
            source: Some(Box::new(e)),
        })
    }

    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, DesklineError> {
        self.send_json(&ApiRequest::get(path)).await
    }

    pub async fn post_json<T: DeserializeOwned>(
        &self,
        path: &str,
        body: Value,
    ) -> Result<T, DesklineError> {
        self.send_json(&ApiRequest::post(path, body)).await
    }

    pub async fn patch_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, DesklineError> {
        self.send_json(&ApiRequest::patch(path)).await
    }

    pub async fn delete(&self, path: &str) -> Result<(), DesklineError> {
        self.send(&ApiRequest::delete(path)).await.map(|_| ())
    }
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url.as_str())
            .field("public_paths", &self.public_paths)
            .finish_non_exhaustive()
    }
}

fn status_error(status: StatusCode, body: String) -> DesklineError {
    DesklineError::Status {
        status: status.as_u16(),
        body,
    }
}

fn parse_base_url(raw: &str) -> Result<Url, DesklineError> {
    let trimmed = raw.trim().trim_end_matches('/');
    Url::parse(&format!("{trimmed}/"))
        .map_err(|e| DesklineError::Config(format!("invalid api.base_url `{raw}`: {e}")))
}

fn join_path(base: &Url, path: &str) -> Result<Url, DesklineError> {
    base.join(path.trim_start_matches('/'))
        .map_err(|e| DesklineError::Internal(format!("cannot join `{path}` onto {base}: {e}")))
}
