use serde::{Deserialize, Serialize};
use std::fmt::{Debug, Display, Formatter};
use std::str::{self, FromStr};

/// Size in bytes of a content address.
pub const HASH_SIZE: usize = 20;

/// A 20-byte content address.
///
/// `EMPTY` is the distinguished "no such object" value used throughout the
/// registry (an absent dataset entry, an absent `parents_closure`, an absent
/// `ChunkStore` root).
#[derive(PartialEq, Eq, Clone, Copy, Hash, Default, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Hash([u8; HASH_SIZE]);

impl Hash {
    pub const EMPTY: Hash = Hash([0u8; HASH_SIZE]);

    pub const fn from_bytes(bytes: [u8; HASH_SIZE]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; HASH_SIZE] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::EMPTY
    }
}

/// Computes the content address of `bytes`.
///
/// Content-only: `hash(bytes)` carries no domain-separation prefix. Two
/// chunks with identical bytes collide to the same address, by design —
/// the store is content-addressed, not type-addressed.
pub fn digest(bytes: &[u8]) -> Hash {
    let full = blake3::hash(bytes);
    let mut out = [0u8; HASH_SIZE];
    out.copy_from_slice(&full.as_bytes()[..HASH_SIZE]);
    Hash(out)
}

impl Display for Hash {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let mut buf = [0u8; HASH_SIZE * 2];
        hex::encode_to_slice(self.0, &mut buf).expect("the output is exactly twice the size of the input");
        f.write_str(str::from_utf8(&buf).expect("hex is always valid UTF-8"))
    }
}

impl Debug for Hash {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Hash({self})")
    }
}

impl FromStr for Hash {
    type Err = hex::FromHexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut bytes = [0u8; HASH_SIZE];
        hex::decode_to_slice(s, &mut bytes)?;
        Ok(Hash(bytes))
    }
}

impl AsRef<[u8]> for Hash {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_is_distinct_from_digest() {
        assert_ne!(Hash::EMPTY, digest(b""));
        assert!(Hash::EMPTY.is_empty());
        assert!(!digest(b"x").is_empty());
    }

    #[test]
    fn digest_is_deterministic_and_content_only() {
        assert_eq!(digest(b"hello"), digest(b"hello"));
        assert_ne!(digest(b"hello"), digest(b"world"));
    }

    #[test]
    fn display_round_trips_through_from_str() {
        let h = digest(b"round trip me");
        let s = h.to_string();
        assert_eq!(s.len(), HASH_SIZE * 2);
        assert_eq!(Hash::from_str(&s).unwrap(), h);
    }

    #[test]
    fn from_str_rejects_wrong_length() {
        assert!(Hash::from_str("abcd").is_err());
    }
}
