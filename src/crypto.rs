//! Cryptographic primitives for macaroon tags.
//!
//! The MAC scheme is truncated HMAC-SHA256: each chain step signs a list of
//! message fragments and keeps the first 16 digest bytes. This module wraps
//! the external primitives; it does not implement any cryptography itself.
//!
//! ## Security Properties
//!
//! 1. **Constant-time comparison**: `MacTag` equality goes through
//!    [`subtle::ConstantTimeEq`], so comparing a forged tag against a real
//!    one leaks nothing about where they diverge.
//! 2. **Chained keys**: intermediate tags double as MAC keys for the next
//!    chain step, which is why they are truncated once, at the digest, and
//!    never re-derived from partial state.

use crate::error::{Error, Result};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Length in bytes of a truncated macaroon MAC tag.
pub const MAC_TAG_LEN: usize = 16;

/// A 16-byte truncated HMAC-SHA256 tag.
///
/// Tags are plain values on the wire, but equality is still constant-time:
/// a chain's final tag is exactly what a forger must guess, and a
/// short-circuiting compare would hand them a timing oracle.
#[derive(Clone, Copy)]
pub struct MacTag([u8; MAC_TAG_LEN]);

impl MacTag {
    /// Create a tag from a byte slice. Fails unless it is exactly 16 bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let arr: [u8; MAC_TAG_LEN] = bytes
            .try_into()
            .map_err(|_| Error::InvalidTagLength(bytes.len()))?;
        Ok(Self(arr))
    }

    /// The raw tag bytes.
    pub fn as_bytes(&self) -> &[u8; MAC_TAG_LEN] {
        &self.0
    }

    /// Hex rendering, for fixtures and diagnostics.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl PartialEq for MacTag {
    fn eq(&self, other: &Self) -> bool {
        self.0.ct_eq(&other.0).into()
    }
}

impl Eq for MacTag {}

impl std::fmt::Debug for MacTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "MacTag({})", self.to_hex())
    }
}

/// Compute a truncated HMAC-SHA256 tag over a list of message fragments.
///
/// The fragments are MACed back to back, equivalent to signing their
/// concatenation without materializing it.
pub fn compute_tag(key: &[u8], fragments: &[&[u8]]) -> MacTag {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC accepts keys of any length");
    for fragment in fragments {
        mac.update(fragment);
    }
    let digest = mac.finalize().into_bytes();
    let mut tag = [0u8; MAC_TAG_LEN];
    tag.copy_from_slice(&digest[..MAC_TAG_LEN]);
    MacTag(tag)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fragments_are_equivalent_to_concatenation() {
        let key = b"key";
        let whole = compute_tag(key, &[b"hello world"]);
        let split = compute_tag(key, &[b"hello", b" ", b"world"]);
        assert_eq!(whole, split);
    }

    #[test]
    fn tag_depends_on_key_and_message() {
        let base = compute_tag(b"key", &[b"message"]);
        assert_ne!(base, compute_tag(b"other-key", &[b"message"]));
        assert_ne!(base, compute_tag(b"key", &[b"other message"]));
    }

    #[test]
    fn from_bytes_requires_exact_length() {
        let tag = compute_tag(b"key", &[b"message"]);
        let restored = MacTag::from_bytes(tag.as_bytes()).unwrap();
        assert_eq!(tag, restored);

        assert_eq!(
            MacTag::from_bytes(&[0u8; 15]),
            Err(Error::InvalidTagLength(15))
        );
        assert_eq!(
            MacTag::from_bytes(&[0u8; 32]),
            Err(Error::InvalidTagLength(32))
        );
    }

    #[test]
    fn hex_rendering_is_32_chars() {
        let tag = compute_tag(b"key", &[b"message"]);
        assert_eq!(tag.to_hex().len(), 32);
    }

    #[test]
    fn truncation_keeps_leading_digest_bytes() {
        use hmac::Mac;
        let mut mac = HmacSha256::new_from_slice(b"key").unwrap();
        mac.update(b"message");
        let full = mac.finalize().into_bytes();
        let tag = compute_tag(b"key", &[b"message"]);
        assert_eq!(tag.as_bytes(), &full[..MAC_TAG_LEN]);
    }
}
