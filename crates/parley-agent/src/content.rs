// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Normalizes inbound payloads (text, photo, sticker) into model content blocks.

use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use parley_core::types::MediaRef;
use parley_core::{ChannelAdapter, ContentBlock, ImageDetail, InboundMessage, ParleyError};
use regex::Regex;
use tracing::{debug, warn};

/// The pattern that addresses the bot at the start of a group message.
#[derive(Debug, Clone)]
pub struct GroupTrigger {
    anchored: Regex,
}

impl GroupTrigger {
    /// Compiles `pattern`, anchored to the start of the text and followed by
    /// whitespace or the end of the text.
    pub fn new(pattern: &str) -> Result<Self, ParleyError> {
        let anchored = Regex::new(&format!(r"^(?:{pattern})(?:\s+|$)"))
            .map_err(|e| ParleyError::Config(format!("invalid group trigger `{pattern}`: {e}")))?;
        Ok(Self { anchored })
    }

    /// True when `text` starts with the trigger.
    pub fn matches(&self, text: &str) -> bool {
        self.anchored.is_match(text)
    }

    /// Removes a leading trigger match and trims the remainder.
    pub fn strip<'a>(&self, text: &'a str) -> &'a str {
        match self.anchored.find(text) {
            Some(m) => text[m.end()..].trim(),
            None => text.trim(),
        }
    }
}

/// Resolves an [`InboundMessage`] into an ordered list of content blocks.
///
/// Order is text, photo, sticker image, sticker emoji. Media is downloaded
/// through the channel and inlined as a base64 `data:` URI.
pub struct ContentResolver {
    channel: Arc<dyn ChannelAdapter>,
    trigger: GroupTrigger,
    detail: ImageDetail,
}

impl ContentResolver {
    pub fn new(channel: Arc<dyn ChannelAdapter>, trigger: GroupTrigger, detail: ImageDetail) -> Self {
        Self {
            channel,
            trigger,
            detail,
        }
    }

    pub fn trigger(&self) -> &GroupTrigger {
        &self.trigger
    }

    pub async fn resolve(&self, msg: &InboundMessage) -> Vec<ContentBlock> {
        let mut blocks = Vec::new();

        if let Some(text) = self.text_of(msg) {
            blocks.push(ContentBlock::text(text));
        }

        if let Some(photo) = largest(&msg.photos)
            && let Some(block) = self.image_block(msg, photo).await
        {
            blocks.push(block);
        }

        if let Some(sticker) = &msg.sticker {
            let image = match (&sticker.thumbnail, sticker.is_static) {
                (Some(thumb), _) => Some(thumb),
                (None, true) => Some(&sticker.file),
                (None, false) => None,
            };
            if let Some(media) = image
                && let Some(block) = self.image_block(msg, media).await
            {
                blocks.push(block);
            }
            if let Some(emoji) = sticker.emoji.as_deref().filter(|e| !e.trim().is_empty()) {
                blocks.push(ContentBlock::text(emoji));
            }
        }

        debug!(chat_id = %msg.chat_id, blocks = blocks.len(), "content resolved");
        blocks
    }

    fn text_of(&self, msg: &InboundMessage) -> Option<String> {
        let raw = msg.text_or_caption()?;
        let text = if msg.chat_kind.is_group() {
            self.trigger.strip(raw)
        } else {
            raw.trim()
        };
        (!text.is_empty()).then(|| text.to_string())
    }

    async fn image_block(&self, msg: &InboundMessage, media: &MediaRef) -> Option<ContentBlock> {
        match self.channel.fetch_media(media).await {
            Ok(bytes) => Some(ContentBlock::Image {
                url: data_uri(&media.mime_type, &bytes),
                detail: self.detail,
            }),
            Err(e) => {
                warn!(
                    chat_id = %msg.chat_id,
                    file_id = media.file_id.as_str(),
                    error = %e,
                    "media download failed, skipping image"
                );
                None
            }
        }
    }
}

/// Picks the largest resolution by pixel area, then by file size.
fn largest(photos: &[MediaRef]) -> Option<&MediaRef> {
    photos.iter().max_by_key(|p| (p.area(), p.file_size))
}

fn data_uri(mime_type: &str, bytes: &[u8]) -> String {
    format!("data:{mime_type};base64,{}", STANDARD.encode(bytes))
}
