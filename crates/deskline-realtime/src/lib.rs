// SPDX-FileCopyrightText: 2026 Deskline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Realtime push channel for chat and notifications.
//!
//! The connection lifecycle lives in [`ConnectionMachine`], a pure state
//! machine that returns [`ChannelAction`]s. [`RealtimeChannel`] owns a
//! tokio task that executes those actions against a WebSocket, runs the
//! keepalive and reconnect timers, and fans inbound events out to
//! subscribers.

pub mod channel;
pub mod endpoint;
pub mod event;
pub mod machine;

pub use channel::RealtimeChannel;
pub use endpoint::{ChannelTarget, endpoint_url};
pub use event::{ChatBroadcast, InboundEvent, NotificationPush, OutboundFrame, PendingNotification};
pub use machine::{ChannelAction, ChannelSettings, ChannelState, ChannelStatus, ConnectionMachine};
