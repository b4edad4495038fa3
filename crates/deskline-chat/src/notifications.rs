// SPDX-FileCopyrightText: 2026 Deskline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Notification feed: persistent notifications kept in sync by push
//! events, with periodic polling as a fallback when pushes stop coming.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::Utc;
use deskline_auth::{ApiClient, ApiRequest};
use deskline_core::{CredentialReader, DesklineError, Notification, NotificationId, Role};
use deskline_realtime::{InboundEvent, OutboundFrame, RealtimeChannel};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::wire::{RawNotification, decode_list};

const NOTIFICATIONS: &str = "notifications/";

/// Current notifications, newest first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeedSnapshot {
    pub items: Vec<Notification>,
    pub unread: usize,
}

impl FeedSnapshot {
    fn from_items(items: Vec<Notification>) -> Self {
        let unread = items.iter().filter(|n| !n.read).count();
        Self { items, unread }
    }

    /// Notifications addressed to `user_id` acting as `role`.
    pub fn visible(&self, user_id: Option<u64>, role: Option<Role>) -> Vec<&Notification> {
        self.items
            .iter()
            .filter(|n| n.visible_for(user_id, role))
            .collect()
    }
}

#[derive(Debug)]
pub struct NotificationFeed {
    state: watch::Sender<FeedSnapshot>,
}

impl Default for NotificationFeed {
    fn default() -> Self {
        Self::new()
    }
}

impl NotificationFeed {
    pub fn new() -> Self {
        let (state, _) = watch::channel(FeedSnapshot::default());
        Self { state }
    }

    pub fn snapshot(&self) -> FeedSnapshot {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<FeedSnapshot> {
        self.state.subscribe()
    }

    pub fn unread(&self) -> usize {
        self.state.borrow().unread
    }

    /// Replace the feed. Entries repeating an id keep only the first copy.
    pub fn replace_all(&self, notifications: Vec<Notification>) {
        let mut items: Vec<Notification> = Vec::with_capacity(notifications.len());
        for notification in notifications {
            if !items.iter().any(|n| n.id == notification.id) {
                items.push(notification);
            }
        }
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        self.state.send_replace(FeedSnapshot::from_items(items));
    }

    /// Returns `false` when the id is unknown or already read.
    pub fn mark_read(&self, id: NotificationId) -> bool {
        self.modify(|items| match items.iter_mut().find(|n| n.id == id) {
            Some(n) if !n.read => {
                n.read = true;
                true
            }
            _ => false,
        })
    }

    pub fn mark_all_read(&self) -> bool {
        self.modify(|items| {
            let mut changed = false;
            for n in items.iter_mut().filter(|n| !n.read) {
                n.read = true;
                changed = true;
            }
            changed
        })
    }

    pub fn remove(&self, id: NotificationId) -> bool {
        self.modify(|items| {
            let before = items.len();
            items.retain(|n| n.id != id);
            items.len() != before
        })
    }

    pub fn clear(&self) {
        self.state.send_replace(FeedSnapshot::default());
    }

    fn modify(&self, f: impl FnOnce(&mut Vec<Notification>) -> bool) -> bool {
        self.state.send_if_modified(|s| {
            let changed = f(&mut s.items);
            if changed {
                s.unread = s.items.iter().filter(|n| !n.read).count();
            }
            changed
        })
    }
}

#[derive(Debug, Deserialize)]
struct UnreadCount {
    #[serde(default)]
    unread_count: u64,
}

/// Keeps a [`NotificationFeed`] in sync with the backend.
#[derive(Debug, Clone)]
pub struct NotificationService {
    api: ApiClient,
    feed: Arc<NotificationFeed>,
    credentials: CredentialReader,
    last_push: Arc<Mutex<Option<Instant>>>,
}

impl NotificationService {
    pub fn new(api: ApiClient, feed: Arc<NotificationFeed>) -> Self {
        let credentials = api.credentials().clone();
        Self {
            api,
            feed,
            credentials,
            last_push: Arc::new(Mutex::new(None)),
        }
    }

    pub fn feed(&self) -> &Arc<NotificationFeed> {
        &self.feed
    }

    fn logged_in(&self) -> bool {
        self.credentials.access_token().is_some() && self.credentials.role().is_some()
    }

    /// Fetch the full list and replace the feed with it.
    pub async fn reload(&self) -> Result<usize, DesklineError> {
        let value = self.api.send(&ApiRequest::get(NOTIFICATIONS)).await?;
        let now = Utc::now();
        let items: Vec<Notification> = decode_list::<RawNotification>(value, "notification")
            .into_iter()
            .map(|raw| raw.normalize(now))
            .collect();
        let count = items.len();
        self.feed.replace_all(items);
        debug!(count, "notifications reloaded");
        Ok(count)
    }

    /// Mark one notification read locally, on the server, and, when a
    /// channel is given, over the socket so other sessions hear about it.
    pub async fn mark_read(
        &self,
        id: NotificationId,
        channel: Option<&RealtimeChannel>,
    ) -> Result<(), DesklineError> {
        self.feed.mark_read(id);
        if let Some(channel) = channel {
            channel.send(OutboundFrame::mark_read(id.0));
        }
        let request =
            ApiRequest::patch(format!("{NOTIFICATIONS}{id}/marcar_leida/")).with_body(json!({}));
        self.api.send(&request).await.map(|_| ())
    }

    pub async fn mark_all_read(&self) -> Result<(), DesklineError> {
        self.feed.mark_all_read();
        let request = ApiRequest::patch(format!("{NOTIFICATIONS}marcar_todas_leidas/"))
            .with_body(json!({}));
        self.api.send(&request).await.map(|_| ())
    }

    pub async fn delete(&self, id: NotificationId) -> Result<(), DesklineError> {
        self.feed.remove(id);
        self.api.delete(&format!("{NOTIFICATIONS}{id}/")).await
    }

    /// Unread count as the server sees it.
    pub async fn unread_count_remote(&self) -> Result<u64, DesklineError> {
        let count: UnreadCount = self
            .api
            .get_json(&format!("{NOTIFICATIONS}no_leidas/"))
            .await?;
        Ok(count.unread_count)
    }

    /// Apply one realtime event to the feed.
    pub async fn handle_event(&self, event: &InboundEvent) {
        match event {
            InboundEvent::Notification(_) | InboundEvent::PendingNotification { .. } => {
                *self.last_push.lock().unwrap_or_else(PoisonError::into_inner) =
                    Some(Instant::now());
                if let Err(e) = self.reload().await {
                    warn!(error = %e, "notification reload after push failed");
                }
            }
            InboundEvent::NotificationRead { id } => {
                self.feed.mark_read(NotificationId(*id));
            }
            _ => {}
        }
    }

    /// Whether a scheduled poll should be skipped because a push arrived
    /// within the last `interval`.
    fn push_is_recent(&self, interval: Duration) -> bool {
        self.last_push
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some_and(|at| at.elapsed() < interval)
    }

    /// Consume push events and poll every `poll_interval` until cancelled.
    ///
    /// Polls are skipped while logged out and while pushes are arriving.
    pub fn run(
        &self,
        mut events: broadcast::Receiver<InboundEvent>,
        poll_interval: Duration,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        let service = self.clone();
        tokio::spawn(async move {
            let mut poll = tokio::time::interval_at(Instant::now() + poll_interval, poll_interval);
            poll.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut events_open = true;

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = poll.tick() => {
                        if !service.logged_in() {
                            continue;
                        }
                        if service.push_is_recent(poll_interval) {
                            debug!("push seen recently, skipping poll");
                            continue;
                        }
                        if let Err(e) = service.reload().await {
                            warn!(error = %e, "notification poll failed");
                        }
                    }
                    received = events.recv(), if events_open => match received {
                        Ok(event) => service.handle_event(&event).await,
                        Err(RecvError::Lagged(skipped)) => {
                            warn!(skipped, "notification listener lagged, reloading");
                            if let Err(e) = service.reload().await {
                                warn!(error = %e, "notification reload failed");
                            }
                        }
                        Err(RecvError::Closed) => {
                            debug!("event stream closed, polling only");
                            events_open = false;
                        }
                    },
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use deskline_test_utils::fixtures::at;

    fn notification(id: u64, read: bool, secs: i64) -> Notification {
        Notification {
            id: NotificationId(id),
            recipient_id: 7,
            target_role: None,
            kind: "ticket_response".into(),
            title: format!("n{id}"),
            message: String::new(),
            icon: "fa-bell".into(),
            ticket_id: None,
            read,
            created_at: at(secs),
            data: serde_json::Value::Null,
        }
    }

    #[test]
    fn replace_all_dedups_and_orders_newest_first() {
        let feed = NotificationFeed::new();
        feed.replace_all(vec![
            notification(1, false, 10),
            notification(2, true, 30),
            notification(1, false, 10),
            notification(3, false, 20),
        ]);
        let snapshot = feed.snapshot();
        let ids: Vec<_> = snapshot.items.iter().map(|n| n.id.0).collect();
        assert_eq!(ids, [2, 3, 1]);
        assert_eq!(snapshot.unread, 2);
    }

    #[test]
    fn mark_read_updates_counter_once() {
        let feed = NotificationFeed::new();
        feed.replace_all(vec![notification(1, false, 1), notification(2, false, 2)]);
        assert!(feed.mark_read(NotificationId(1)));
        assert!(!feed.mark_read(NotificationId(1)));
        assert!(!feed.mark_read(NotificationId(99)));
        assert_eq!(feed.unread(), 1);

        assert!(feed.mark_all_read());
        assert!(!feed.mark_all_read());
        assert_eq!(feed.unread(), 0);
    }

    #[test]
    fn remove_and_clear() {
        let feed = NotificationFeed::new();
        feed.replace_all(vec![notification(1, false, 1), notification(2, false, 2)]);
        assert!(feed.remove(NotificationId(2)));
        assert!(!feed.remove(NotificationId(2)));
        assert_eq!(feed.unread(), 1);
        feed.clear();
        assert!(feed.snapshot().items.is_empty());
    }

    #[test]
    fn visible_filters_by_recipient_and_role() {
        let feed = NotificationFeed::new();
        let mut for_agents = notification(2, false, 2);
        for_agents.recipient_id = 0;
        for_agents.target_role = Some(Role::Agente);
        feed.replace_all(vec![notification(1, false, 1), for_agents]);

        let snapshot = feed.snapshot();
        assert_eq!(snapshot.visible(Some(7), Some(Role::Usuario)).len(), 1);
        assert_eq!(snapshot.visible(Some(8), Some(Role::Agente)).len(), 1);
        assert_eq!(snapshot.visible(Some(7), Some(Role::Agente)).len(), 2);
    }
}
