// SPDX-FileCopyrightText: 2026 Deskline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Deskline integration tests.
//!
//! # Components
//!
//! - [`MockSocketServer`] - in-process WebSocket server that records
//!   handshakes, captures client frames, and pushes server frames
//! - [`TestHarness`] - an [`ApiClient`](deskline_auth::ApiClient) wired to
//!   a memory credential store, pointed at a mock backend
//! - [`fixtures`] - canned domain values

pub mod fixtures;
pub mod harness;
pub mod mock_socket;

pub use harness::TestHarness;
pub use mock_socket::{MockSocketServer, ServerConnection};
