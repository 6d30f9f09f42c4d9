use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Stable instrument identifier (the ticker). Bars refer to their symbol by id only.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SymbolId(pub String);

impl SymbolId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Checks the id can name a store directory: non-empty, no path
    /// separators, not `.`/`..`.
    pub fn validate(&self) -> Result<(), SymbolIdError> {
        let id = self.0.as_str();
        if id.trim().is_empty() {
            return Err(SymbolIdError::Empty);
        }
        if id.contains(['/', '\\', '\0']) || id.contains("..") || id == "." {
            return Err(SymbolIdError::Invalid(id.to_string()));
        }
        Ok(())
    }
}

impl FromStr for SymbolId {
    type Err = SymbolIdError;

    /// Trimmed, validated id.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let id = Self::new(s.trim());
        id.validate()?;
        Ok(id)
    }
}

impl fmt::Display for SymbolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for SymbolId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum SymbolIdError {
    #[error("symbol id is empty")]
    Empty,

    #[error("symbol id '{0}' contains a path separator or '..'")]
    Invalid(String),
}

/// Descriptive metadata for a symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolInfo {
    pub id: SymbolId,
    #[serde(default)]
    pub company_name: Option<String>,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

impl SymbolInfo {
    pub fn new(id: SymbolId) -> Self {
        Self {
            id,
            company_name: None,
            is_active: true,
        }
    }
}
