// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! System prompt assembly from chat metadata and static policy text.
//!
//! [`build`] is pure: the same inputs always produce the same prompt. Lines
//! are appended in a fixed order and each conditional line is emitted only
//! when the field it mentions is present.

use parley_core::{ChatKind, Sender};

/// An observed group member, identified by handle and display name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RosterMember {
    pub username: Option<String>,
    pub display_name: Option<String>,
}

impl RosterMember {
    /// Members with neither a handle nor a name are tracked but never listed.
    pub fn is_listable(&self) -> bool {
        self.username.is_some() || self.display_name.is_some()
    }

    fn describe(&self) -> String {
        let parts: Vec<String> = [
            self.username.as_ref().map(|u| format!("username: {u}")),
            self.display_name.as_ref().map(|n| format!("name: {n}")),
        ]
        .into_iter()
        .flatten()
        .collect();
        parts.join(" ")
    }
}

impl From<&Sender> for RosterMember {
    fn from(sender: &Sender) -> Self {
        Self {
            username: sender.username.clone(),
            display_name: sender.display_name.clone(),
        }
    }
}

/// Everything the prompt depends on.
#[derive(Debug, Clone, Copy)]
pub struct PromptInputs<'a> {
    pub base_policy: &'a str,
    pub bot_name: Option<&'a str>,
    pub chat_kind: ChatKind,
    /// Author of the message being answered.
    pub speaker: Option<&'a Sender>,
    pub chat_title: Option<&'a str>,
    pub roster: &'a [RosterMember],
}

/// Builds the system prompt for one model call.
pub fn build(inputs: &PromptInputs<'_>) -> String {
    let mut lines: Vec<String> = Vec::new();

    let base = inputs.base_policy.trim_end();
    if !base.is_empty() {
        lines.push(base.to_string());
    }

    if let Some(name) = inputs.bot_name {
        lines.push(format!("Your name is: {name}"));
    }

    let username = inputs.speaker.and_then(|s| s.username.as_deref());
    let display_name = inputs.speaker.and_then(|s| s.display_name.as_deref());

    match inputs.chat_kind {
        ChatKind::Private => {
            lines.push("You are messaging with user in private telegram chat now.".to_string());
            if let Some(u) = username {
                lines.push(format!("User telegram nickname is: {u}."));
            }
            if let Some(n) = display_name {
                lines.push(format!("User name is: {n}."));
            }
        }
        ChatKind::Group | ChatKind::Supergroup => {
            lines.push("You are member of group chat now.".to_string());
            if let Some(u) = username {
                lines.push(format!("The last message was from user nicknamed as: {u}."));
            }
            if let Some(n) = display_name {
                lines.push(format!("The last message was from user named as: {n}."));
            }
            if let Some(title) = inputs.chat_title {
                lines.push(format!("You are member of group chat with name: {title}"));
            }
            if let Some(roster) = roster_line(inputs.roster) {
                lines.push(roster);
            }
        }
        ChatKind::Channel => {}
    }

    lines.join("\n")
}

fn roster_line(roster: &[RosterMember]) -> Option<String> {
    let entries: Vec<String> = roster
        .iter()
        .filter(|m| m.is_listable())
        .map(RosterMember::describe)
        .collect();
    if entries.is_empty() {
        return None;
    }
    Some(format!(
        "Members of this dialogue are: {}. Only members with a username or name are listed.",
        entries.join("; ")
    ))
}
