// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common types used across adapter traits and the Parley pipeline.
//!
//! These types form the contract boundary between the transport, the
//! conversation-context engine and the model provider. Nothing here is
//! specific to a particular chat platform or model vendor.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Identifies a chat room. Primary key for authorization and context tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChatId(pub i64);

impl fmt::Display for ChatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for ChatId {
    fn from(id: i64) -> Self {
        ChatId(id)
    }
}

/// Unique identifier for a delivered message.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(pub String);

/// Health status reported by adapter health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Adapter is fully operational.
    Healthy,
    /// Adapter is operational but experiencing issues.
    Degraded(String),
    /// Adapter is not operational.
    Unhealthy(String),
}

/// Identifies the type of adapter.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum AdapterType {
    Channel,
    Provider,
    Registry,
}

// --- Chat metadata ---

/// The kind of chat a message arrived in.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ChatKind {
    Private,
    Group,
    Supergroup,
    Channel,
}

impl ChatKind {
    /// Group and supergroup chats share the same conversational treatment.
    pub fn is_group(self) -> bool {
        matches!(self, ChatKind::Group | ChatKind::Supergroup)
    }

    pub fn is_private(self) -> bool {
        matches!(self, ChatKind::Private)
    }
}

/// The author of an inbound message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sender {
    /// Platform user id, if the message has a sender at all.
    pub id: Option<i64>,
    /// Public handle without the leading `@`.
    pub username: Option<String>,
    /// Human-readable display name.
    pub display_name: Option<String>,
}

/// A downloadable media object held by the transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaRef {
    /// Transport-specific file handle used to fetch the bytes.
    pub file_id: String,
    pub width: u32,
    pub height: u32,
    /// Size in bytes as reported by the transport (0 when unknown).
    pub file_size: u32,
    pub mime_type: String,
}

impl MediaRef {
    /// Pixel area, used to pick the largest available resolution.
    pub fn area(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }
}

/// A sticker attached to an inbound message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StickerRef {
    pub emoji: Option<String>,
    /// Static preview image, if the transport provides one.
    pub thumbnail: Option<MediaRef>,
    /// The full sticker file.
    pub file: MediaRef,
    /// True for raster stickers; animated and video stickers are not images.
    pub is_static: bool,
}

/// Describes the message an inbound message replies to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplyRef {
    pub sender_id: Option<i64>,
    /// True when the replied-to message was sent by this bot.
    pub to_self: bool,
}

/// An inbound message received from a channel adapter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundMessage {
    /// Transport message id.
    pub id: String,
    pub chat_id: ChatId,
    pub chat_kind: ChatKind,
    pub chat_title: Option<String>,
    pub sender: Sender,
    pub text: Option<String>,
    /// Caption attached to a media message.
    pub caption: Option<String>,
    /// Every available resolution of an attached photo.
    #[serde(default)]
    pub photos: Vec<MediaRef>,
    pub sticker: Option<StickerRef>,
    pub reply_to: Option<ReplyRef>,
    pub timestamp: DateTime<Utc>,
}

impl InboundMessage {
    /// Returns the message text, or the media caption when there is no text.
    pub fn text_or_caption(&self) -> Option<&str> {
        self.text.as_deref().or(self.caption.as_deref())
    }
}

/// How the channel should render an outbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OutboundFormat {
    /// Try rich formatting first and fall back to plain text if rejected.
    #[default]
    Markdown,
    /// Send as-is without any formatting.
    Plain,
}

/// An outbound message to be delivered via a channel adapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundMessage {
    pub chat_id: ChatId,
    pub text: String,
    pub reply_to_message_id: Option<String>,
    pub format: OutboundFormat,
}

impl OutboundMessage {
    /// Creates a reply to the given inbound message.
    pub fn reply(inbound: &InboundMessage, text: impl Into<String>) -> Self {
        Self {
            chat_id: inbound.chat_id,
            text: text.into(),
            reply_to_message_id: Some(inbound.id.clone()),
            format: OutboundFormat::Markdown,
        }
    }

    /// Like [`reply`](Self::reply), but delivered without any parse mode.
    pub fn plain_reply(inbound: &InboundMessage, text: impl Into<String>) -> Self {
        Self {
            format: OutboundFormat::Plain,
            ..Self::reply(inbound, text)
        }
    }
}

// --- Conversation types ---

/// Speaker role of a conversation turn.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// Resolution hint passed to vision-capable models.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ImageDetail {
    #[default]
    Auto,
    Low,
    High,
}

/// A single piece of model-neutral message content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text { text: String },
    /// `url` is either a `data:` URI or a remote URI.
    Image { url: String, detail: ImageDetail },
}

impl ContentBlock {
    pub fn text(text: impl Into<String>) -> Self {
        ContentBlock::Text { text: text.into() }
    }

    /// Returns the text of a text block.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            ContentBlock::Text { text } => Some(text),
            ContentBlock::Image { .. } => None,
        }
    }
}

/// One immutable entry of a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: Role,
    pub content: Vec<ContentBlock>,
}

impl ConversationTurn {
    pub fn new(role: Role, content: Vec<ContentBlock>) -> Self {
        Self { role, content }
    }

    pub fn system(text: impl Into<String>) -> Self {
        Self::new(Role::System, vec![ContentBlock::text(text)])
    }

    pub fn user(content: Vec<ContentBlock>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(Role::Assistant, vec![ContentBlock::text(text)])
    }

    /// Concatenates all text blocks, ignoring images.
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(ContentBlock::as_text)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

// --- Provider types ---

/// A request to a chat-completion model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderRequest {
    pub model: String,
    /// Ordered turns; a rendered request always starts with the system turn.
    pub turns: Vec<ConversationTurn>,
}

/// One candidate completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Choice {
    pub role: Role,
    pub content: Option<String>,
}

/// A completion returned by a model provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderResponse {
    pub id: String,
    pub model: String,
    pub choices: Vec<Choice>,
}

impl ProviderResponse {
    /// Returns the first choice's content when it is present and non-empty.
    pub fn first_content(&self) -> Option<&str> {
        self.choices
            .first()
            .and_then(|c| c.content.as_deref())
            .filter(|c| !c.trim().is_empty())
    }
}

// --- Registry types ---

/// A persisted grant allowing a chat to use the bot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationRecord {
    pub chat_id: ChatId,
    /// ISO-8601 timestamp of the latest authorization.
    pub authorized_at: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_kind_group_semantics() {
        assert!(ChatKind::Group.is_group());
        assert!(ChatKind::Supergroup.is_group());
        assert!(!ChatKind::Private.is_group());
        assert!(!ChatKind::Channel.is_group());
        assert!(ChatKind::Private.is_private());
    }

    #[test]
    fn content_block_serializes_tagged() {
        let block = ContentBlock::Image {
            url: "data:image/jpeg;base64,AAAA".into(),
            detail: ImageDetail::Low,
        };
        let json = serde_json::to_value(&block).unwrap();
        assert_eq!(json["type"], "image");
        assert_eq!(json["detail"], "low");
    }

    #[test]
    fn first_content_skips_blank_completion() {
        let response = ProviderResponse {
            id: "r1".into(),
            model: "m".into(),
            choices: vec![Choice {
                role: Role::Assistant,
                content: Some("   ".into()),
            }],
        };
        assert_eq!(response.first_content(), None);

        let empty = ProviderResponse {
            id: "r2".into(),
            model: "m".into(),
            choices: vec![],
        };
        assert_eq!(empty.first_content(), None);
    }

    #[test]
    fn turn_text_joins_text_blocks_only() {
        let turn = ConversationTurn::user(vec![
            ContentBlock::text("look"),
            ContentBlock::Image {
                url: "https://example.com/a.png".into(),
                detail: ImageDetail::Auto,
            },
            ContentBlock::text("🙂"),
        ]);
        assert_eq!(turn.text(), "look\n🙂");
    }

    #[test]
    fn role_round_trips_through_strum() {
        use std::str::FromStr;
        for role in [Role::System, Role::User, Role::Assistant] {
            assert_eq!(Role::from_str(&role.to_string()).unwrap(), role);
        }
    }
}
