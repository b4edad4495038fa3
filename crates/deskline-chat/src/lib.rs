// SPDX-FileCopyrightText: 2026 Deskline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Client-side state for conversations, ticket threads, and notifications.
//!
//! Messages reach a thread from two directions: the HTTP response to a
//! local send and the realtime broadcast of the same message. The stores
//! here merge both into one ordered, deduplicated view and publish it
//! through tokio `watch` channels.

pub mod notifications;
pub mod service;
pub mod store;
pub mod thread;
pub mod ticket;
pub mod wire;

pub use notifications::{FeedSnapshot, NotificationFeed, NotificationService};
pub use service::ChatService;
pub use store::{BroadcastOutcome, ChatSnapshot, ConversationStore};
pub use thread::MessageThread;
pub use ticket::{TicketThreadService, TicketThreadSnapshot};
