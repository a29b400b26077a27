//! Id patterns.
//!
//! Fences restrict the ids they react to with shell-style globs (`truck*`,
//! `bus:?`, `[ab]*`). Patterns are compiled once with `globset`; a pattern that
//! fails to compile matches nothing, so one bad fence never interrupts the
//! processing of the others.

use crate::error::{FenceError, Result};
use globset::{Glob, GlobMatcher};

const META_CHARS: [char; 5] = ['*', '?', '[', '{', '\\'];

/// A compiled id pattern.
#[derive(Debug, Clone)]
pub enum Pattern {
    /// `*` or empty: everything matches.
    Any,
    /// No glob metacharacters: plain equality.
    Literal(String),
    Glob(GlobMatcher),
    /// Failed to compile; matches nothing.
    Invalid(String),
}

impl Pattern {
    /// Compile a pattern, reporting compilation failures.
    pub fn try_parse(pattern: &str) -> Result<Self> {
        if pattern.is_empty() || pattern == "*" {
            return Ok(Pattern::Any);
        }
        if !is_glob(pattern) {
            return Ok(Pattern::Literal(pattern.to_string()));
        }
        Glob::new(pattern)
            .map(|glob| Pattern::Glob(glob.compile_matcher()))
            .map_err(|e| FenceError::InvalidPattern {
                pattern: pattern.to_string(),
                reason: e.kind().to_string(),
            })
    }

    /// Compile a pattern, falling back to [`Pattern::Invalid`] on failure.
    pub fn parse(pattern: &str) -> Self {
        match Self::try_parse(pattern) {
            Ok(compiled) => compiled,
            Err(e) => {
                log::warn!("{}; pattern will match nothing", e);
                Pattern::Invalid(pattern.to_string())
            }
        }
    }

    pub fn matches(&self, text: &str) -> bool {
        match self {
            Pattern::Any => true,
            Pattern::Literal(literal) => literal == text,
            Pattern::Glob(matcher) => matcher.is_match(text),
            Pattern::Invalid(_) => false,
        }
    }

    pub fn is_any(&self) -> bool {
        matches!(self, Pattern::Any)
    }

    pub fn as_str(&self) -> &str {
        match self {
            Pattern::Any => "*",
            Pattern::Literal(text) | Pattern::Invalid(text) => text,
            Pattern::Glob(matcher) => matcher.glob().glob(),
        }
    }
}

/// Whether `pattern` contains glob metacharacters.
pub fn is_glob(pattern: &str) -> bool {
    pattern.contains(META_CHARS)
}

/// One-shot match for patterns built at evaluation time.
pub fn matches(pattern: &str, text: &str) -> bool {
    Pattern::try_parse(pattern)
        .map(|compiled| compiled.matches(text))
        .unwrap_or(false)
}
