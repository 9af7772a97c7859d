// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Parley relay agent.

use std::time::Duration;

use thiserror::Error;

/// The primary error type used across all Parley adapter traits and core operations.
#[derive(Debug, Error)]
pub enum ParleyError {
    /// Configuration errors (invalid TOML, missing required fields, bad patterns).
    #[error("configuration error: {0}")]
    Config(String),

    /// Authorization registry storage errors (disk I/O, query failure, migrations).
    ///
    /// Always propagated to the caller. A registry that cannot be read must
    /// never be treated as granting access.
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Channel adapter errors (connection failure, delivery rejected, media download).
    #[error("channel error: {message}")]
    Channel {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Model provider errors (API failure, malformed completion, transport failure).
    #[error("provider error: {message}")]
    Provider {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The model provider rejected the request because of rate limiting.
    #[error("rate limited by provider{}", format_retry_after(.retry_after))]
    RateLimited { retry_after: Option<Duration> },

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: Duration },
}

impl ParleyError {
    /// Wraps any error as a storage failure.
    pub fn storage<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        ParleyError::Storage {
            source: Box::new(err),
        }
    }

    /// Returns true for the rate-limit variant.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, ParleyError::RateLimited { .. })
    }
}

fn format_retry_after(retry_after: &Option<Duration>) -> String {
    match retry_after {
        Some(d) => format!(" (retry after {}s)", d.as_secs()),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limited_display_includes_retry_after() {
        let err = ParleyError::RateLimited {
            retry_after: Some(Duration::from_secs(20)),
        };
        assert_eq!(err.to_string(), "rate limited by provider (retry after 20s)");
        assert!(err.is_rate_limited());
    }

    #[test]
    fn rate_limited_display_without_retry_after() {
        let err = ParleyError::RateLimited { retry_after: None };
        assert_eq!(err.to_string(), "rate limited by provider");
    }

    #[test]
    fn storage_helper_boxes_source() {
        let err = ParleyError::storage(std::io::Error::other("disk gone"));
        assert!(err.to_string().contains("disk gone"));
        assert!(!err.is_rate_limited());
    }
}
