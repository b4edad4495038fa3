// SPDX-FileCopyrightText: 2026 Deskline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Authenticated HTTP access to the helpdesk backend.
//!
//! - [`store`]: memory and file-backed [`CredentialStore`](deskline_core::CredentialStore) implementations
//! - [`client`]: [`ApiClient`], which attaches the bearer credential and recovers from expired tokens
//! - [`refresher`]: [`CredentialRefresher`], the single-flight token exchange
//! - [`session`]: [`SessionService`] for login and logout

pub mod client;
pub mod refresher;
pub mod session;
pub mod store;

pub use client::{ApiClient, ApiRequest};
pub use refresher::CredentialRefresher;
pub use session::{LoginResult, SessionService};
pub use store::{FileCredentialStore, MemoryCredentialStore};
