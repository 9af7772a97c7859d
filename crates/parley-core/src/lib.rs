// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Parley relay agent.
//!
//! This crate provides the trait definitions, error type, and common types
//! shared by the context engine, the dispatcher, and every collaborator
//! adapter (transport, model provider, authorization registry).

pub mod error;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::ParleyError;
pub use types::{
    AdapterType, AuthorizationRecord, ChatId, ChatKind, Choice, ContentBlock, ConversationTurn,
    HealthStatus, ImageDetail, InboundMessage, MediaRef, MessageId, OutboundFormat,
    OutboundMessage, ProviderRequest, ProviderResponse, ReplyRef, Role, Sender, StickerRef,
};

pub use traits::{AuthRegistry, ChannelAdapter, PluginAdapter, ProviderAdapter};
