//! Key Pattern Module
//!
//! Parses the key patterns accepted by `clear_by_pattern`. Only exact names
//! and a single trailing `*` are supported; anything else is rejected rather
//! than guessed at.

use crate::error::{CacheError, Result};

/// A parsed key pattern over logical (un-prefixed) key names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyPattern {
    /// `user_*`
    Prefix(String),
    /// `user_42`
    Exact(String),
}

impl KeyPattern {
    /// Parses an exact key or a prefix ending in a single `*`.
    pub fn parse(pattern: &str) -> Result<Self> {
        if pattern.is_empty() {
            return Err(CacheError::Validation("Pattern cannot be empty".to_string()));
        }

        let (body, wildcard) = match pattern.strip_suffix('*') {
            Some(body) => (body, true),
            None => (pattern, false),
        };

        if body.contains(['*', '?', '[', ']']) {
            return Err(CacheError::Validation(format!(
                "Unsupported pattern '{}': only a trailing '*' is allowed",
                pattern
            )));
        }

        Ok(if wildcard {
            KeyPattern::Prefix(body.to_string())
        } else {
            KeyPattern::Exact(body.to_string())
        })
    }

    /// Tests a logical key name against the pattern.
    pub fn matches(&self, name: &str) -> bool {
        match self {
            KeyPattern::Prefix(prefix) => name.starts_with(prefix.as_str()),
            KeyPattern::Exact(exact) => name == exact,
        }
    }
}
