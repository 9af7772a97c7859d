// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversion of Telegram updates into channel-agnostic [`InboundMessage`]s.
//!
//! No filtering by authorization or addressing happens here; the dispatcher
//! owns those decisions.

use parley_core::{ChatId, ChatKind, InboundMessage, MediaRef, ReplyRef, Sender, StickerRef};
use teloxide::types::{Message, PhotoSize, User, UserId};

/// Telegram re-encodes every photo as JPEG.
const PHOTO_MIME: &str = "image/jpeg";
const STICKER_MIME: &str = "image/webp";

/// True when the message carries anything the bot can answer.
pub fn has_content(msg: &Message) -> bool {
    msg.text().is_some() || msg.caption().is_some() || msg.photo().is_some() || msg.sticker().is_some()
}

/// Maps a Telegram chat onto a [`ChatKind`].
pub fn chat_kind(msg: &Message) -> ChatKind {
    if msg.chat.is_private() {
        ChatKind::Private
    } else if msg.chat.is_supergroup() {
        ChatKind::Supergroup
    } else if msg.chat.is_group() {
        ChatKind::Group
    } else {
        ChatKind::Channel
    }
}

/// Converts a Telegram message into an [`InboundMessage`].
///
/// `bot_id` identifies replies addressed to the bot itself.
pub fn to_inbound_message(msg: &Message, bot_id: Option<UserId>) -> InboundMessage {
    let reply_to = msg.reply_to_message().map(|reply| {
        let sender = reply.from.as_ref().map(|u| u.id);
        ReplyRef {
            sender_id: sender.map(user_id),
            to_self: sender.is_some() && sender == bot_id,
        }
    });

    InboundMessage {
        id: msg.id.0.to_string(),
        chat_id: ChatId(msg.chat.id.0),
        chat_kind: chat_kind(msg),
        chat_title: msg.chat.title().map(str::to_string),
        sender: msg.from.as_ref().map(to_sender).unwrap_or_default(),
        text: msg.text().map(str::to_string),
        caption: msg.caption().map(str::to_string),
        photos: msg
            .photo()
            .map(|sizes| sizes.iter().map(|p| photo_ref(p, PHOTO_MIME)).collect())
            .unwrap_or_default(),
        sticker: msg.sticker().map(|s| StickerRef {
            emoji: s.emoji.clone(),
            thumbnail: s.thumbnail.as_ref().map(|t| photo_ref(t, STICKER_MIME)),
            file: MediaRef {
                file_id: s.file.id.0.clone(),
                width: u32::from(s.width),
                height: u32::from(s.height),
                file_size: s.file.size,
                mime_type: STICKER_MIME.to_string(),
            },
            is_static: !s.is_animated() && !s.is_video(),
        }),
        reply_to,
        timestamp: msg.date,
    }
}

fn to_sender(user: &User) -> Sender {
    let display_name = user.full_name();
    Sender {
        id: Some(user_id(user.id)),
        username: user.username.clone(),
        display_name: (!display_name.trim().is_empty()).then_some(display_name),
    }
}

fn photo_ref(photo: &PhotoSize, mime_type: &str) -> MediaRef {
    MediaRef {
        file_id: photo.file.id.0.clone(),
        width: photo.width,
        height: photo.height,
        file_size: photo.file.size,
        mime_type: mime_type.to_string(),
    }
}

fn user_id(id: UserId) -> i64 {
    i64::try_from(id.0).unwrap_or(i64::MAX)
}
