// SPDX-FileCopyrightText: 2026 Deskline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use colored::Colorize;
use deskline_core::{DesklineError, UserProfile};

use crate::app::App;

pub async fn login(app: &App, email: &str, password: Option<String>) -> Result<(), DesklineError> {
    let password = match password {
        Some(password) => password,
        None => {
            eprint!("password: ");
            rpassword::read_password()
                .map_err(|e| DesklineError::Internal(format!("failed to read password: {e}")))?
        }
    };

    let result = app.sessions().login(email.trim(), &password).await?;
    let name = result
        .user
        .as_ref()
        .map_or_else(|| email.to_string(), display_name);
    let role = result.role.map_or_else(|| "unknown role".to_string(), |r| r.to_string());
    println!("{} as {} ({role})", "logged in".green(), name.bold());
    Ok(())
}

pub fn logout(app: &App) -> Result<(), DesklineError> {
    app.sessions().logout()?;
    println!("{}", "logged out".dimmed());
    Ok(())
}

pub fn whoami(app: &App) {
    let sessions = app.sessions();
    if !sessions.is_logged_in() {
        println!("{}", "not logged in".yellow());
        return;
    }
    let role = sessions.role().map(|r| r.to_string()).unwrap_or_default();
    match sessions.user() {
        Some(user) => println!("{} <{}> ({role})", display_name(&user).bold(), user.email),
        None => println!("logged in ({role})"),
    }
}

/// Full name when the profile has one, username otherwise.
pub fn display_name(user: &UserProfile) -> String {
    let full = [user.first_name.as_deref(), user.last_name.as_deref()]
        .into_iter()
        .flatten()
        .filter(|s| !s.trim().is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    if full.is_empty() {
        user.username.clone()
    } else {
        full
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(first: Option<&str>, last: Option<&str>) -> UserProfile {
        UserProfile {
            id: 1,
            username: "ana".into(),
            email: "ana@example.com".into(),
            rol: None,
            first_name: first.map(str::to_string),
            last_name: last.map(str::to_string),
        }
    }

    #[test]
    fn display_name_prefers_full_name() {
        assert_eq!(display_name(&user(Some("Ana"), Some("Pérez"))), "Ana Pérez");
        assert_eq!(display_name(&user(Some("Ana"), Some(" "))), "Ana");
        assert_eq!(display_name(&user(None, None)), "ana");
    }
}
