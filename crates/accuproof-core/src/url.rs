use crate::error::AccProofError;
use crate::hash::Hash32;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A normalized `acc://<authority>[/path]` URL: trimmed, lowercased,
/// `acc://` scheme enforced, trailing slash removed (spec.md §4.3).
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AccUrl(String);

impl AccUrl {
    /// Normalize an arbitrary input string into a canonical `acc://` URL.
    pub fn normalize(raw: &str) -> Result<Self, AccProofError> {
        let trimmed = raw.trim().to_lowercase();
        let with_scheme = if trimmed.starts_with("acc://") {
            trimmed
        } else if trimmed.starts_with("//") {
            format!("acc:{trimmed}")
        } else {
            format!("acc://{trimmed}")
        };
        if !with_scheme.starts_with("acc://") {
            return Err(AccProofError::NotAccUrl(raw.to_string()));
        }
        let rest = &with_scheme["acc://".len()..];
        if rest.is_empty() {
            return Err(AccProofError::NotAccUrl(raw.to_string()));
        }
        let without_trailing = rest.trim_end_matches('/');
        Ok(Self(format!("acc://{without_trailing}")))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The authority component — everything before the first `/` after
    /// the scheme (e.g. `testtesttest10.acme` for `acc://testtesttest10.acme/data1`).
    pub fn authority(&self) -> &str {
        let rest = &self.0["acc://".len()..];
        rest.split('/').next().unwrap_or(rest)
    }

    /// Join a child path segment onto this URL, producing a fresh
    /// normalized `AccUrl` (e.g. `acc://x.acme` + `main` → `acc://x.acme/main`).
    pub fn join(&self, segment: &str) -> Self {
        let joined = format!("{}/{}", self.0, segment.trim_matches('/'));
        Self::normalize(&joined).expect("joining a validated AccUrl never fails normalization")
    }
}

impl fmt::Display for AccUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for AccUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AccUrl({})", self.0)
    }
}

/// A parsed `acc://<hash>@<scope>` message id, as used to resolve a
/// transaction's inclusion record (spec.md §4.8, G0).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MessageId {
    pub tx_hash: Hash32,
    pub scope: AccUrl,
}

impl MessageId {
    pub fn parse(raw: &str) -> Result<Self, AccProofError> {
        let trimmed = raw.trim();
        let without_scheme = trimmed
            .strip_prefix("acc://")
            .ok_or_else(|| AccProofError::BadMessageId(raw.to_string()))?;
        let (hash_part, scope_part) = without_scheme
            .split_once('@')
            .ok_or_else(|| AccProofError::BadMessageId(raw.to_string()))?;
        let tx_hash = Hash32::from_hex(hash_part)
            .map_err(|_| AccProofError::BadMessageId(raw.to_string()))?;
        let scope = AccUrl::normalize(scope_part)
            .map_err(|_| AccProofError::BadMessageId(raw.to_string()))?;
        Ok(Self { tx_hash, scope })
    }

    pub fn to_string_canonical(&self) -> String {
        format!("acc://{}@{}", self.tx_hash.to_hex(), self.scope.authority())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_trims_lowercases_and_strips_trailing_slash() {
        let url = AccUrl::normalize("  ACC://Testtesttest10.ACME/Data1/ ").unwrap();
        assert_eq!(url.as_str(), "acc://testtesttest10.acme/data1");
    }

    #[test]
    fn bare_authority_gets_scheme() {
        let url = AccUrl::normalize("testtesttest10.acme").unwrap();
        assert_eq!(url.as_str(), "acc://testtesttest10.acme");
    }

    #[test]
    fn authority_extracts_prefix() {
        let url = AccUrl::normalize("acc://testtesttest10.acme/data1").unwrap();
        assert_eq!(url.authority(), "testtesttest10.acme");
    }

    #[test]
    fn message_id_round_trips() {
        let hash = "0".repeat(64);
        let raw = format!("acc://{hash}@testtesttest10.acme");
        let mid = MessageId::parse(&raw).unwrap();
        assert_eq!(mid.tx_hash, Hash32::from_hex(&hash).unwrap());
        assert_eq!(mid.scope.as_str(), "acc://testtesttest10.acme");
    }

    #[test]
    fn message_id_rejects_missing_at() {
        let raw = format!("acc://{}", "0".repeat(64));
        assert!(MessageId::parse(&raw).is_err());
    }
}
