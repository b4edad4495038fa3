// SPDX-FileCopyrightText: 2026 Deskline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Trait definitions shared across the Deskline crates.

pub mod credentials;

pub use credentials::{CredentialReader, CredentialStore};
