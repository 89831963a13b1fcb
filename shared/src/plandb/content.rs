use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{WireError, WireResult};

/// Length of a plan content digest in bytes
pub const DIGEST_LEN: usize = 16;

/// MD5 digest of a plan's canonical encoding
///
/// Comparing digests is the only way to tell whether a local plan and the
/// copy stored on a remote system differ without transferring the plan.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct PlanDigest([u8; DIGEST_LEN]);

impl PlanDigest {
    pub const fn new(bytes: [u8; DIGEST_LEN]) -> Self {
        Self(bytes)
    }

    /// Digest of the given content
    pub fn of(content: &[u8]) -> Self {
        Self(md5::compute(content).0)
    }

    /// Decode from a wire field; anything other than 16 bytes is rejected
    pub fn from_slice(bytes: &[u8]) -> WireResult<Self> {
        let arr: [u8; DIGEST_LEN] = bytes.try_into().map_err(|_| WireError::InvalidDigestLength {
            expected: DIGEST_LEN,
            actual: bytes.len(),
        })?;
        Ok(Self(arr))
    }

    pub fn as_bytes(&self) -> &[u8; DIGEST_LEN] {
        &self.0
    }

    pub fn to_vec(&self) -> Vec<u8> {
        self.0.to_vec()
    }

    /// Exact byte comparison against an arbitrary slice
    pub fn matches(&self, other: &[u8]) -> bool {
        self.0.as_slice() == other
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for PlanDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for PlanDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PlanDigest({})", self.to_hex())
    }
}

impl From<[u8; DIGEST_LEN]> for PlanDigest {
    fn from(bytes: [u8; DIGEST_LEN]) -> Self {
        Self(bytes)
    }
}

impl AsRef<[u8]> for PlanDigest {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Opaque plan content, addressed by id and digest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanContent {
    pub plan_id: String,
    pub data: Vec<u8>,
}

impl PlanContent {
    pub fn new(plan_id: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            plan_id: plan_id.into(),
            data,
        }
    }

    pub fn digest(&self) -> PlanDigest {
        PlanDigest::of(&self.data)
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_digest_of_known_input() {
        // RFC 1321 test vector
        let digest = PlanDigest::of(b"abc");
        assert_eq!(digest.to_hex(), "900150983cd24fb0d6963f7d28e17f72");
    }

    #[test]
    fn test_from_slice_rejects_wrong_length() {
        assert!(PlanDigest::from_slice(&[0u8; 16]).is_ok());

        match PlanDigest::from_slice(&[0u8; 15]) {
            Err(WireError::InvalidDigestLength { expected, actual }) => {
                assert_eq!(expected, 16);
                assert_eq!(actual, 15);
            }
            other => panic!("Expected InvalidDigestLength, got {:?}", other),
        }
        assert!(PlanDigest::from_slice(&[0u8; 20]).is_err());
    }

    #[test]
    fn test_matches_is_exact() {
        let digest = PlanDigest::new([0xAB; 16]);
        assert!(digest.matches(&[0xAB; 16]));
        assert!(!digest.matches(&[0x00; 16]));
        assert!(!digest.matches(&[0xAB; 15]));
        assert!(!digest.matches(&[0xAB; 17]));
        assert!(!digest.matches(&[]));
    }

    #[test]
    fn test_content_digest_tracks_data() {
        let a = PlanContent::new("p1", b"goto 1".to_vec());
        let b = PlanContent::new("p1", b"goto 2".to_vec());
        assert_ne!(a.digest(), b.digest());
        assert_eq!(a.digest(), PlanContent::new("other", b"goto 1".to_vec()).digest());
        assert_eq!(a.size(), 6);
    }
}
