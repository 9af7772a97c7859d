// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Slash-command parsing and shared-secret checks.

use sha2::{Digest, Sha256};

/// A bot command recognized in message text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `/register <secret>`: authorize the chat with the shared secret.
    Register { secret: Option<String> },
    /// `/unregister`: revoke the chat's authorization.
    Unregister,
    /// `/clear`: drop the chat's conversation context.
    Clear,
}

/// A parsed command together with the bot it was addressed to, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation<'a> {
    pub command: Command,
    pub target: Option<&'a str>,
}

impl Invocation<'_> {
    /// True unless the command names a different bot than `username`.
    ///
    /// An unknown own username accepts every target.
    pub fn is_for(&self, username: Option<&str>) -> bool {
        match (self.target, username) {
            (Some(target), Some(me)) => target.eq_ignore_ascii_case(me.trim_start_matches('@')),
            _ => true,
        }
    }
}

/// Parses `/name[@bot] [args]`. Returns `None` for anything else.
pub fn parse(text: &str) -> Option<Invocation<'_>> {
    let text = text.trim_start();
    let rest = text.strip_prefix('/')?;
    let (head, args) = match rest.split_once(char::is_whitespace) {
        Some((head, args)) => (head, args.trim()),
        None => (rest, ""),
    };
    let (name, target) = match head.split_once('@') {
        Some((name, target)) => (name, Some(target)),
        None => (head, None),
    };

    let command = match name {
        "register" => Command::Register {
            secret: (!args.is_empty()).then(|| args.to_string()),
        },
        "unregister" => Command::Unregister,
        "clear" => Command::Clear,
        _ => return None,
    };
    Some(Invocation { command, target })
}

/// SHA-256 digest of a registration secret.
pub fn secret_digest(secret: &str) -> [u8; 32] {
    Sha256::digest(secret.as_bytes()).into()
}
