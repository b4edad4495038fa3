// SPDX-FileCopyrightText: 2026 Deskline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `deskline notifications`.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Local;
use colored::Colorize;
use deskline_chat::{FeedSnapshot, NotificationFeed, NotificationService};
use deskline_core::{DesklineError, Notification, NotificationId, Role};
use deskline_realtime::ChannelTarget;

use crate::app::App;
use crate::shutdown;

pub async fn show(app: &App, follow: bool) -> Result<(), DesklineError> {
    app.require_login()?;
    let credentials = app.api.credentials();
    let user_id = credentials.user().map(|u| u.id);
    let role = credentials.role();

    let service = NotificationService::new(app.api.clone(), Arc::new(NotificationFeed::new()));
    service.reload().await?;

    let mut printed = HashSet::new();
    let snapshot = service.feed().snapshot();
    if snapshot.visible(user_id, role).is_empty() {
        println!("{}", "no notifications".dimmed());
    }
    print_new(&snapshot, user_id, role, &mut printed);
    if !follow {
        return Ok(());
    }

    let cancel = shutdown::install_signal_handler();
    let channel = app.realtime();
    channel.connect(ChannelTarget::Notifications);
    let worker = service.run(
        channel.subscribe(),
        app.config.notifications.poll_interval(),
        cancel.child_token(),
    );

    let mut changes = service.feed().subscribe();
    changes.borrow_and_update();
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            changed = changes.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = changes.borrow_and_update().clone();
                print_new(&snapshot, user_id, role, &mut printed);
            }
        }
    }

    channel.shutdown().await;
    let _ = worker.await;
    Ok(())
}

fn print_new(
    snapshot: &FeedSnapshot,
    user_id: Option<u64>,
    role: Option<Role>,
    printed: &mut HashSet<NotificationId>,
) {
    // Feed is newest first; print oldest first so the terminal reads top-down.
    for notification in snapshot.visible(user_id, role).into_iter().rev() {
        if printed.insert(notification.id) {
            println!("{}", notification_line(notification));
        }
    }
}

fn notification_line(notification: &Notification) -> String {
    let marker = if notification.read {
        " ".normal()
    } else {
        "●".yellow()
    };
    let time = notification
        .created_at
        .with_timezone(&Local)
        .format("%Y-%m-%d %H:%M");
    let mut line = format!("{marker} {} {}", format!("[{time}]").dimmed(), notification.title.bold());
    if let Some(ticket) = notification.ticket_id {
        line.push_str(&format!(" (ticket #{ticket})"));
    }
    if !notification.message.is_empty() {
        line.push_str(&format!(" - {}", notification.message));
    }
    line
}
