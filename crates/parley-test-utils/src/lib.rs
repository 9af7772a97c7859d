// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Parley integration tests.
//!
//! Provides mock adapters and test harness infrastructure for fast,
//! deterministic, CI-runnable tests without Telegram or a model API.
//!
//! # Components
//!
//! - [`MockProvider`] - Mock model provider with scripted replies
//! - [`MockChannel`] - Mock channel with message injection and capture
//! - [`MockRegistry`] - In-memory authorization registry that can be made to fail
//! - [`TestHarness`] - Dispatcher wired to the mocks and a temp SQLite registry

pub mod harness;
pub mod mock_channel;
pub mod mock_provider;
pub mod mock_registry;

pub use harness::{TestHarness, group_message, private_message};
pub use mock_channel::MockChannel;
pub use mock_provider::{MockProvider, MockReply};
pub use mock_registry::MockRegistry;
