//! Opaque instrument identifier.

use crate::domain::error::ConfigValueError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// Engine-defined identifier for a tradable symbol.
///
/// Identifiers are normalised to upper case so `aapl` and `AAPL` key the
/// same per-instrument state.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstrumentId(String);

impl InstrumentId {
    pub fn new(id: &str) -> Self {
        InstrumentId(id.trim().to_uppercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InstrumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for InstrumentId {
    fn from(id: &str) -> Self {
        InstrumentId::new(id)
    }
}

/// Parse a comma-separated instrument list, preserving order. Rejects
/// empty tokens and duplicates (after normalisation).
pub fn parse_instruments(input: &str) -> Result<Vec<InstrumentId>, ConfigValueError> {
    let mut ids = Vec::new();
    let mut seen = HashSet::new();

    for token in input.split(',') {
        let trimmed = token.trim();
        if trimmed.is_empty() {
            return Err(ConfigValueError::EmptyToken);
        }
        let id = InstrumentId::new(trimmed);
        if !seen.insert(id.clone()) {
            return Err(ConfigValueError::Duplicate(id.to_string()));
        }
        ids.push(id);
    }

    Ok(ids)
}
