// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite persistence for the Parley chat authorization registry.
//!
//! The registry is the only durable state of the relay: a single `chats`
//! table keyed by chat id. Conversation history is never persisted.

pub mod database;
pub mod migrations;
pub mod queries;
pub mod registry;

pub use database::Database;
pub use registry::SqliteAuthRegistry;
