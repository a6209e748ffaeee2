//! Identity names — the stable key for samples and attendance rows.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::samples::StoreError;

const MAX_NAME_LEN: usize = 64;

/// A unique human-readable name for an enrolled person.
///
/// Immutable once created. The name doubles as the sample directory name
/// and the first column of the attendance ledger, so construction rejects
/// anything that would be unsafe in either place.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identity(String);

impl Identity {
    /// Validate and construct an identity name.
    ///
    /// Accepted: 1–64 chars, ASCII alphanumeric plus space, `-`, `_`, `.`;
    /// leading/trailing whitespace is trimmed; a leading dot is rejected.
    pub fn new(name: impl AsRef<str>) -> Result<Self, StoreError> {
        let name = name.as_ref().trim();

        let reason = if name.is_empty() {
            Some("empty name")
        } else if name.len() > MAX_NAME_LEN {
            Some("name longer than 64 characters")
        } else if name.starts_with('.') {
            Some("name must not start with a dot")
        } else if !name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, ' ' | '-' | '_' | '.'))
        {
            Some("name must be ASCII alphanumeric, space, '-', '_' or '.'")
        } else {
            None
        };

        match reason {
            Some(reason) => Err(StoreError::InvalidIdentity {
                name: name.to_string(),
                reason,
            }),
            None => Ok(Self(name.to_string())),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Identity {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_typical_names() {
        for name in ["alice", "Bob Smith", "maria-jose", "j.doe_2", "X"] {
            assert!(Identity::new(name).is_ok(), "{name} should be accepted");
        }
    }

    #[test]
    fn trims_whitespace() {
        let id = Identity::new("  alice  ").unwrap();
        assert_eq!(id.as_str(), "alice");
    }

    #[test]
    fn rejects_unsafe_names() {
        for name in ["", "   ", ".hidden", "a/b", "a,b", "über", "a\nb"] {
            assert!(Identity::new(name).is_err(), "{name:?} should be rejected");
        }
    }

    #[test]
    fn rejects_overlong_name() {
        let name = "x".repeat(65);
        assert!(Identity::new(&name).is_err());
        assert!(Identity::new("x".repeat(64)).is_ok());
    }
}
