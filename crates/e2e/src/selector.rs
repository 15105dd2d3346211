//! Element addressing
//!
//! The Adopet markup exposes stable `data-test` attributes, so scenarios
//! address elements as `[data-test="<name>"]`. Any other CSS selector is
//! accepted as long as it is a single non-empty line.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{E2eError, E2eResult};

/// A CSS selector identifying one interactive element
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Selector(String);

fn data_test_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r#"^\[data-test=["']([^"'\]]+)["']\]$"#).expect("data-test pattern is valid")
    })
}

impl Selector {
    /// Parse a raw selector string
    pub fn new(raw: impl Into<String>) -> E2eResult<Self> {
        let raw = raw.into();
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.contains('\n') {
            return Err(E2eError::InvalidSelector(raw));
        }
        Ok(Self(trimmed.to_string()))
    }

    /// `[data-test="<name>"]`, with the name escaped as a CSS string
    pub fn data_test(name: &str) -> Self {
        let mut escaped = String::with_capacity(name.len());
        for c in name.chars() {
            match c {
                '\\' => escaped.push_str("\\\\"),
                '"' => escaped.push_str("\\\""),
                '\n' => escaped.push_str("\\a "),
                c => escaped.push(c),
            }
        }
        Self(format!(r#"[data-test="{}"]"#, escaped))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The attribute value when this is a `data-test` selector
    pub fn data_test_name(&self) -> Option<&str> {
        data_test_pattern()
            .captures(&self.0)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str())
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Selector {
    type Error = E2eError;

    fn try_from(value: String) -> E2eResult<Self> {
        Self::new(value)
    }
}

impl From<Selector> for String {
    fn from(selector: Selector) -> Self {
        selector.0
    }
}
