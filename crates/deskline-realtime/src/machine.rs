// SPDX-FileCopyrightText: 2026 Deskline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Connection lifecycle as a pure state machine.
//!
//! Methods take events and return the [`ChannelAction`]s the driver must
//! execute. Nothing here touches a socket or a clock, so every transition
//! can be tested directly.
//!
//! ```text
//!                 connect            open
//! Disconnected ───────────> Connecting ─────> Open ──error──> Errored
//!      ^  ^                     │               │                │
//!      │  └── reconnect timer ──┤<──── close ───┴────────────────┘
//!      │      (attempt < max)   │
//!      │                        └── close (attempt == max) ──> Failed
//!      └── disconnect (from any state)
//! ```
//!
//! Every dial gets a fresh socket generation. Events tagged with an older
//! generation belong to a socket that was deliberately abandoned and are
//! ignored, which is what keeps an explicit disconnect from being followed
//! by an automatic reconnect.

use std::time::Duration;

use deskline_config::model::RealtimeConfig;

use crate::endpoint::ChannelTarget;

/// Timing and retry limits for a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelSettings {
    pub ping_interval: Duration,
    pub reconnect_delay: Duration,
    pub max_reconnect_attempts: u32,
}

impl Default for ChannelSettings {
    fn default() -> Self {
        Self::from(&RealtimeConfig::default())
    }
}

impl From<&RealtimeConfig> for ChannelSettings {
    fn from(config: &RealtimeConfig) -> Self {
        Self {
            ping_interval: config.ping_interval(),
            reconnect_delay: config.reconnect_delay(),
            max_reconnect_attempts: config.max_reconnect_attempts,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Disconnected,
    Connecting,
    Open,
    /// The socket reported an error; its close event is still pending.
    Errored,
    /// Reconnect attempts are exhausted. Only an explicit connect restarts.
    Failed,
}

/// Observable snapshot of a channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelStatus {
    pub state: ChannelState,
    pub attempt: u32,
    pub target: Option<ChannelTarget>,
}

/// Work the driver performs on behalf of the machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelAction {
    /// Open a socket to `target`, tagging its events with `generation`.
    Dial {
        target: ChannelTarget,
        generation: u64,
    },
    /// Close the socket of `generation` if it is still around.
    CloseSocket { generation: u64 },
    ArmPing(Duration),
    CancelPing,
    ArmReconnect(Duration),
    CancelReconnect,
    SendPing,
}

#[derive(Debug, Clone)]
pub struct ConnectionMachine {
    settings: ChannelSettings,
    state: ChannelState,
    attempt: u32,
    target: Option<ChannelTarget>,
    generation: u64,
    reconnect_pending: bool,
}

impl ConnectionMachine {
    pub fn new(settings: ChannelSettings) -> Self {
        Self {
            settings,
            state: ChannelState::Disconnected,
            attempt: 0,
            target: None,
            generation: 0,
            reconnect_pending: false,
        }
    }

    pub fn state(&self) -> ChannelState {
        self.state
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn target(&self) -> Option<ChannelTarget> {
        self.target
    }

    /// Generation of the current (or most recent) socket.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_open(&self) -> bool {
        self.state == ChannelState::Open
    }

    pub fn status(&self) -> ChannelStatus {
        ChannelStatus {
            state: self.state,
            attempt: self.attempt,
            target: self.target,
        }
    }

    fn socket_live(&self) -> bool {
        matches!(
            self.state,
            ChannelState::Connecting | ChannelState::Open | ChannelState::Errored
        )
    }

    fn is_current(&self, generation: u64) -> bool {
        generation == self.generation && self.socket_live()
    }

    fn dial(&mut self, target: ChannelTarget) -> ChannelAction {
        self.generation += 1;
        self.state = ChannelState::Connecting;
        self.reconnect_pending = false;
        ChannelAction::Dial {
            target,
            generation: self.generation,
        }
    }

    /// Tear down the current socket and timers without scheduling anything.
    fn teardown(&mut self) -> Vec<ChannelAction> {
        let mut actions = vec![ChannelAction::CancelPing, ChannelAction::CancelReconnect];
        if self.socket_live() {
            actions.push(ChannelAction::CloseSocket {
                generation: self.generation,
            });
        }
        // Anything the old socket still reports is now stale.
        self.generation += 1;
        self.reconnect_pending = false;
        self.state = ChannelState::Disconnected;
        actions
    }

    /// Connect to `target`.
    ///
    /// A no-op while already open or connecting to the same target.
    /// Connecting elsewhere closes the current socket first.
    pub fn connect(&mut self, target: ChannelTarget) -> Vec<ChannelAction> {
        if self.target == Some(target)
            && matches!(self.state, ChannelState::Open | ChannelState::Connecting)
        {
            return Vec::new();
        }

        let mut actions = Vec::new();
        if self.target != Some(target) {
            actions.extend(self.teardown());
            self.attempt = 0;
        } else if self.reconnect_pending || self.socket_live() {
            actions.extend(self.teardown());
        }
        self.target = Some(target);
        actions.push(self.dial(target));
        actions
    }

    /// The socket of `generation` completed its handshake.
    pub fn on_open(&mut self, generation: u64) -> Vec<ChannelAction> {
        if generation != self.generation || self.state != ChannelState::Connecting {
            return Vec::new();
        }
        self.state = ChannelState::Open;
        self.attempt = 0;
        vec![
            ChannelAction::SendPing,
            ChannelAction::ArmPing(self.settings.ping_interval),
        ]
    }

    /// Keepalive timer fired.
    pub fn on_ping_timer(&mut self) -> Vec<ChannelAction> {
        if self.state != ChannelState::Open {
            return Vec::new();
        }
        vec![
            ChannelAction::SendPing,
            ChannelAction::ArmPing(self.settings.ping_interval),
        ]
    }

    /// The socket reported an error. Its close event drives recovery.
    pub fn on_error(&mut self, generation: u64) -> Vec<ChannelAction> {
        if self.is_current(generation) {
            self.state = ChannelState::Errored;
        }
        Vec::new()
    }

    /// The socket of `generation` closed, or its handshake failed.
    pub fn on_close(&mut self, generation: u64) -> Vec<ChannelAction> {
        if !self.is_current(generation) {
            return Vec::new();
        }

        let mut actions = vec![ChannelAction::CancelPing];
        if self.attempt < self.settings.max_reconnect_attempts {
            self.attempt += 1;
            self.state = ChannelState::Disconnected;
            self.reconnect_pending = true;
            actions.push(ChannelAction::ArmReconnect(self.settings.reconnect_delay));
        } else {
            self.state = ChannelState::Failed;
        }
        actions
    }

    /// Reconnect timer fired.
    pub fn on_reconnect_timer(&mut self) -> Vec<ChannelAction> {
        match (self.reconnect_pending, self.target) {
            (true, Some(target)) => vec![self.dial(target)],
            _ => Vec::new(),
        }
    }

    /// A dial was skipped because no credential is stored.
    pub fn on_missing_token(&mut self, generation: u64) -> Vec<ChannelAction> {
        if !self.is_current(generation) {
            return Vec::new();
        }
        self.state = ChannelState::Disconnected;
        self.reconnect_pending = false;
        Vec::new()
    }

    /// Explicit disconnect. Never schedules a reconnect.
    pub fn disconnect(&mut self) -> Vec<ChannelAction> {
        let actions = self.teardown();
        self.target = None;
        self.attempt = 0;
        actions
    }
}
