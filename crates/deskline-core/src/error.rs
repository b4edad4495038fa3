// SPDX-FileCopyrightText: 2026 Deskline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Deskline helpdesk client.

use thiserror::Error;

/// The primary error type used across the Deskline crates.
#[derive(Debug, Error)]
pub enum DesklineError {
    /// Configuration errors (invalid TOML, bad URLs, out-of-range values).
    #[error("configuration error: {0}")]
    Config(String),

    /// Credential store errors (file I/O, serialization).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Transport-level HTTP failures (connection refused, body read errors).
    #[error("http error: {message}")]
    Http {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The server answered with a non-success status that is not recoverable here.
    #[error("server returned {status}: {body}")]
    Status { status: u16, body: String },

    /// Authentication failed and could not be recovered by a credential refresh.
    #[error("authentication error: {0}")]
    Auth(AuthFailure),

    /// Realtime channel failures (handshake, socket I/O).
    #[error("realtime error: {message}")]
    Realtime {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A server payload could not be decoded.
    #[error("malformed payload: {message}")]
    Payload {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl DesklineError {
    /// Returns true when the caller should send the user back to the login surface.
    pub fn requires_login(&self) -> bool {
        matches!(self, DesklineError::Auth(_))
    }
}

impl From<AuthFailure> for DesklineError {
    fn from(failure: AuthFailure) -> Self {
        DesklineError::Auth(failure)
    }
}

/// Outcome of a failed credential refresh.
///
/// `Clone` so that one refresh result can be handed to every request that
/// was queued behind it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthFailure {
    /// No session is stored at all.
    #[error("not logged in")]
    NotLoggedIn,

    /// No refresh token is stored; no refresh call was made.
    #[error("no refresh token")]
    NoRefreshToken,

    /// The refresh endpoint answered with a non-success status.
    #[error("refresh rejected with status {status}: {body}")]
    RefreshRejected { status: u16, body: String },

    /// The refresh call failed before a response was received.
    #[error("refresh transport failure: {0}")]
    RefreshTransport(String),

    /// The refresh task ended without publishing an outcome.
    #[error("refresh aborted before completion")]
    RefreshAborted,

    /// A request was still rejected after being replayed with a fresh token.
    #[error("request unauthorized after refresh: {body}")]
    Unauthorized { body: String },
}
