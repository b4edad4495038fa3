// SPDX-FileCopyrightText: 2026 Deskline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Socket endpoint construction.

use std::fmt;

use deskline_core::{DesklineError, TicketId};
use reqwest::Url;

/// What a realtime channel is connected to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelTarget {
    /// Chat room attached to one ticket.
    Ticket(TicketId),
    /// Every conversation the account takes part in.
    Chat,
    /// The account's notification stream.
    Notifications,
}

impl ChannelTarget {
    pub fn path(&self) -> String {
        match self {
            ChannelTarget::Ticket(id) => format!("/ws/chat/{id}/"),
            ChannelTarget::Chat => "/ws/chat/".to_string(),
            ChannelTarget::Notifications => "/ws/notifications/".to_string(),
        }
    }
}

impl fmt::Display for ChannelTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelTarget::Ticket(id) => write!(f, "ticket:{id}"),
            ChannelTarget::Chat => f.write_str("chat"),
            ChannelTarget::Notifications => f.write_str("notifications"),
        }
    }
}

/// Socket URL for `target` on the same host as the REST API.
///
/// `https` maps to `wss`, anything else to `ws`. The token travels in the
/// query string.
pub fn endpoint_url(api_base: &Url, target: &ChannelTarget, token: &str) -> Result<Url, DesklineError> {
    let scheme = if api_base.scheme() == "https" { "wss" } else { "ws" };
    let host = api_base.host_str().ok_or_else(|| {
        DesklineError::Config(format!("api base url `{api_base}` has no host"))
    })?;
    let authority = match api_base.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    };

    let mut url = Url::parse(&format!("{scheme}://{authority}{}", target.path())).map_err(|e| {
        DesklineError::Config(format!("cannot build socket url for {target}: {e}"))
    })?;
    url.query_pairs_mut().append_pair("token", token);
    Ok(url)
}
