//! Opaque peer identifiers.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Longest peer id string we accept.
const MAX_PEER_ID_LEN: usize = 256;

/// Opaque peer identifier.
///
/// The transport hands us ids as strings; we never interpret their
/// contents, only use them as map keys. Validation happens once, at the
/// reporting boundary — everything past `parse` can assume a well-formed
/// id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeerId(String);

impl PeerId {
    /// Parse a peer id from its string form.
    ///
    /// Rejects ids that are empty, oversized, or contain whitespace or
    /// control characters — none of those can have come from a well-formed
    /// peer announcement, and all of them would mangle the snapshot file.
    pub fn parse(s: &str) -> Result<Self, Error> {
        if s.is_empty() {
            return Err(Error::InvalidArgument("empty peer id".into()));
        }
        if s.len() > MAX_PEER_ID_LEN {
            return Err(Error::InvalidArgument(format!(
                "peer id longer than {MAX_PEER_ID_LEN} bytes"
            )));
        }
        if s.chars().any(|c| c.is_whitespace() || c.is_control()) {
            return Err(Error::InvalidArgument(format!(
                "peer id contains whitespace or control characters: {s:?}"
            )));
        }
        Ok(Self(s.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
