// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversation context engine for the Parley relay agent.
//!
//! Keeps one bounded, freshness-limited conversation per chat in memory and
//! assembles the system prompt that precedes it on every model call:
//! - [`prompt`]: pure prompt assembly from chat metadata and policy text
//! - [`conversation`]: the FIFO turn buffer with roster and timestamps
//! - [`store`]: the concurrent chat-to-context map with staleness handling

pub mod clock;
pub mod conversation;
pub mod policy;
pub mod prompt;
pub mod store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use conversation::ConversationContext;
pub use policy::load_base_policy;
pub use prompt::{PromptInputs, RosterMember};
pub use store::{ContextSettings, ContextStore, RenderInputs, SharedContext};
