use std::fmt;
use std::str::FromStr;

use alloy::primitives::B256;

use crate::error::NetworkIdError;

/// Identifier of the keeper network, as passed to `getNextJobs` and `work`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetworkId(B256);

impl NetworkId {
    pub fn as_bytes32(&self) -> B256 {
        self.0
    }
}

impl FromStr for NetworkId {
    type Err = NetworkIdError;

    /// `0x` followed by 64 hex digits is taken as the raw identifier. Anything
    /// else is UTF-8, right-padded with zeros to 32 bytes.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(NetworkIdError::Empty);
        }
        if s.len() == 66 && s.starts_with("0x") {
            if let Ok(raw) = s.parse::<B256>() {
                return Ok(Self(raw));
            }
        }
        if s.len() > 32 {
            return Err(NetworkIdError::TooLong(s.to_string()));
        }

        let mut padded = [0u8; 32];
        padded[..s.len()].copy_from_slice(s.as_bytes());
        Ok(Self(B256::from(padded)))
    }
}

impl fmt::Display for NetworkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let trimmed: &[u8] = {
            let end = self.0.iter().rposition(|b| *b != 0).map_or(0, |i| i + 1);
            &self.0[..end]
        };
        match std::str::from_utf8(trimmed) {
            Ok(text) if !text.is_empty() && !text.contains('\0') => write!(f, "{text}"),
            _ => write!(f, "{}", self.0),
        }
    }
}
