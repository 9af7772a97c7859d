// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Splitting of long replies into Telegram-sized messages.

/// Telegram's limit on the text of a single message, in characters.
pub const MAX_MESSAGE_CHARS: usize = 4096;

/// Splits `text` into chunks of at most `max_chars` characters.
///
/// Boundary priority: paragraph, then line, then word, then a hard split.
/// Separators at a boundary are dropped.
pub fn split_message(text: &str, max_chars: usize) -> Vec<&str> {
    let mut chunks = Vec::new();
    let mut rest = text;
    while !rest.is_empty() {
        let (head, tail) = split_at_boundary(rest, max_chars.max(1));
        if !head.is_empty() {
            chunks.push(head);
        }
        rest = tail;
    }
    chunks
}

fn split_at_boundary(text: &str, max_chars: usize) -> (&str, &str) {
    let Some((limit, _)) = text.char_indices().nth(max_chars) else {
        return (text, "");
    };
    let region = &text[..limit];

    if let Some(pos) = region.rfind("\n\n").filter(|&p| p > 0) {
        return (&text[..pos], text[pos + 2..].trim_start_matches('\n'));
    }
    if let Some(pos) = region.rfind('\n').filter(|&p| p > 0) {
        return (&text[..pos], &text[pos + 1..]);
    }
    if let Some(pos) = region.rfind(' ').filter(|&p| p > 0) {
        return (&text[..pos], &text[pos + 1..]);
    }
    (region, &text[limit..])
}
