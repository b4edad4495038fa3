// SPDX-FileCopyrightText: 2026 Deskline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `deskline conversations` and `deskline chat`.

use std::sync::Arc;

use chrono::Local;
use colored::Colorize;
use deskline_chat::{ChatService, ConversationStore};
use deskline_core::{ChatMessage, ConversationId, ConversationSummary, DesklineError, Role};
use deskline_realtime::ChannelTarget;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::debug;

use crate::app::App;
use crate::shutdown;

fn service(app: &App) -> ChatService {
    ChatService::new(app.api.clone(), Arc::new(ConversationStore::new()))
}

pub async fn list(app: &App) -> Result<(), DesklineError> {
    app.require_login()?;
    let role = app.api.credentials().role();
    let conversations = service(app).refresh_conversations().await?;
    if conversations.is_empty() {
        println!("{}", "no conversations".dimmed());
    }
    for conversation in &conversations {
        println!("{}", conversation_line(conversation, role));
    }
    Ok(())
}

/// Print conversation `id`, then keep printing new messages and sending
/// stdin lines until Ctrl+C.
pub async fn follow(app: &App, id: ConversationId) -> Result<(), DesklineError> {
    app.require_login()?;
    let chat = service(app);
    chat.refresh_conversations().await?;
    if chat.store().snapshot().conversation(id).is_none() {
        return Err(DesklineError::Config(format!("no conversation with id {id}")));
    }
    chat.select_conversation(id).await?;

    let cancel = shutdown::install_signal_handler();
    let channel = app.realtime();
    channel.connect(ChannelTarget::Chat);
    let listener = chat.attach(channel.subscribe(), cancel.child_token());

    let mut changes = chat.store().subscribe();
    let mut printed: Vec<ChatMessage> = Vec::new();
    print_new(&chat.store().snapshot().thread.into_vec(), &mut printed);
    changes.borrow_and_update();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;
    let mut outcome = Ok(());
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            changed = changes.changed() => {
                if changed.is_err() {
                    break;
                }
                let thread = changes.borrow_and_update().thread.clone();
                print_new(thread.messages(), &mut printed);
            }
            line = lines.next_line(), if stdin_open => match line {
                Ok(Some(line)) => {
                    if let Err(e) = chat.send_message(id, &line).await {
                        if e.requires_login() {
                            outcome = Err(e);
                            break;
                        }
                        eprintln!("{}: {e}", "send failed".red());
                    }
                }
                Ok(None) => {
                    debug!("stdin closed, following only");
                    stdin_open = false;
                }
                Err(e) => {
                    eprintln!("{}: {e}", "stdin".red());
                    stdin_open = false;
                }
            },
        }
    }

    cancel.cancel();
    channel.shutdown().await;
    let _ = listener.await;
    outcome
}

fn print_new(messages: &[ChatMessage], printed: &mut Vec<ChatMessage>) {
    for message in messages {
        if printed.iter().any(|p| p.same_message(message)) {
            continue;
        }
        println!("{}", message_line(message));
        printed.push(message.clone());
    }
}

fn message_line(message: &ChatMessage) -> String {
    let time = message.timestamp.with_timezone(&Local).format("%H:%M");
    let sender = if message.is_agent {
        message.sender.cyan().bold()
    } else {
        message.sender.green().bold()
    };
    format!("{} {sender}: {}", format!("[{time}]").dimmed(), message.text)
}

/// One line per conversation, naming the other party from `role`'s side.
fn conversation_line(conversation: &ConversationSummary, role: Option<Role>) -> String {
    let counterpart = match role {
        Some(Role::Agente) | Some(Role::Admin) => conversation
            .user_name
            .as_deref()
            .or(conversation.user_email.as_deref()),
        _ => conversation
            .agent_name
            .as_deref()
            .or(conversation.agent_email.as_deref()),
    }
    .unwrap_or("?");

    let mut line = format!("#{:<5} {}", conversation.id, counterpart.bold());
    if let Some(subject) = &conversation.ticket_subject {
        line.push_str(&format!(" [{subject}]"));
    }
    if conversation.unread > 0 {
        line.push_str(&format!(" {}", format!("({} unread)", conversation.unread).yellow()));
    }
    if let Some(last) = &conversation.last_message {
        line.push_str(&format!(" - {}", last.dimmed()));
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use deskline_test_utils::fixtures::{conversation, message};

    #[test]
    fn conversation_line_names_the_other_side() {
        let mut summary = conversation(3);
        summary.unread = 2;
        summary.last_message = Some("hola".into());

        let as_user = conversation_line(&summary, Some(Role::Usuario));
        assert!(as_user.contains("soporte"));
        assert!(as_user.contains("2 unread"));
        assert!(as_user.contains("hola"));

        let as_agent = conversation_line(&summary, Some(Role::Agente));
        assert!(as_agent.contains("ana"));
    }

    #[test]
    fn print_new_skips_already_printed() {
        let mut printed = Vec::new();
        let first = message(Some(1), 1, "ana", "a", 10);
        print_new(std::slice::from_ref(&first), &mut printed);
        print_new(&[first, message(None, 1, "bob", "b", 20)], &mut printed);
        assert_eq!(printed.len(), 2);
    }
}
