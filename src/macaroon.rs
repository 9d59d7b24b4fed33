//! Macaroon: a delegatable capability token with a chained MAC tag.
//!
//! A macaroon ties an ordered caveat sequence to a 16-byte tag computed by
//! folding a truncated HMAC through the sequence: the root key signs the
//! first caveat and every intermediate tag keys the signature of the next
//! caveat. Holders can append caveats (attenuation) because each step only
//! needs the previous tag, but can never remove or reorder them without the
//! root key.
//!
//! Macaroons are immutable value objects. [`Macaroon::extend`] returns a new
//! macaroon; caveat payload bytes stay borrowed from the storage they were
//! built in or deserialized from.
//!
//! ## Wire format
//!
//! One outer CBOR byte string wrapping
//! `array(n), bstr(caveat_0) .. bstr(caveat_n-1), bstr(tag[16])`, using the
//! minimal-length restricted encoding of [`crate::cbor`].

use crate::caveat::{Caveat, CaveatType, Scope};
use crate::cbor;
use crate::context::Context;
use crate::crypto::{self, MacTag, MAC_TAG_LEN};
use crate::error::{Error, Result};

/// Transient per-pass validation state.
///
/// Threads the most recent delegation timestamp through one ordered pass
/// over a caveat sequence. Zero means no timestamp has been seen yet.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ValidationState {
    pub(crate) issued_time: u32,
}

impl ValidationState {
    /// Fresh state for a new validation pass.
    pub fn new() -> Self {
        Self::default()
    }
}

/// The kind of identity recorded by a delegatee caveat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DelegateeKind {
    User,
    App,
    Service,
}

impl DelegateeKind {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            DelegateeKind::User => "user",
            DelegateeKind::App => "app",
            DelegateeKind::Service => "service",
        }
    }
}

/// One identity the token's authority was delegated to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Delegatee<'a> {
    /// Opaque identity bytes, borrowed from the caveat storage.
    pub id: &'a [u8],
    /// User, app or service.
    pub kind: DelegateeKind,
    /// The delegation timestamp in force when this delegatee was recorded.
    pub timestamp: u32,
}

/// The accumulated outcome of a successful validation pass.
///
/// Borrows from the same storage as the caveats it was computed from. A
/// failed pass never yields one of these; callers that need a concrete
/// deny-all value use [`ValidationResult::most_restrictive`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationResult<'a> {
    // Raw accumulated scope value. Caveats compare and raise this directly;
    // the public accessor snaps it to a defined scope, so the snap happens
    // logically once, after the pass.
    pub(crate) granted_scope_raw: u32,
    pub(crate) expiration_time: u32,
    pub(crate) app_commands_only: bool,
    pub(crate) lan_session_id: Option<&'a [u8]>,
    pub(crate) delegatees: Vec<Delegatee<'a>>,
}

impl<'a> ValidationResult<'a> {
    /// A fresh result: full (owner) scope, no expiration, unrestricted.
    pub fn new() -> Self {
        Self {
            granted_scope_raw: Scope::Owner.value(),
            expiration_time: u32::MAX,
            app_commands_only: false,
            lan_session_id: None,
            delegatees: Vec::new(),
        }
    }

    /// The maximally restrictive result: lowest scope, already expired,
    /// app-restricted, nothing attached.
    pub fn most_restrictive() -> ValidationResult<'static> {
        ValidationResult {
            granted_scope_raw: Scope::LowestPossible.value(),
            expiration_time: 0,
            app_commands_only: true,
            lan_session_id: None,
            delegatees: Vec::new(),
        }
    }

    /// The granted scope, snapped to the nearest defined value on the
    /// narrower side.
    pub fn granted_scope(&self) -> Scope {
        Scope::narrowest_at_least(self.granted_scope_raw)
    }

    /// The tightest expiration seen, Unix seconds. `u32::MAX` when no
    /// expiring caveat was present.
    pub fn expiration_time(&self) -> u32 {
        self.expiration_time
    }

    /// Whether an `AppCommandsOnly` caveat restricted the token to the
    /// app command surface.
    pub fn app_commands_only(&self) -> bool {
        self.app_commands_only
    }

    /// The LAN session id attached by a `LanSessionId` caveat, if any.
    pub fn lan_session_id(&self) -> Option<&'a [u8]> {
        self.lan_session_id
    }

    /// The recorded delegatees, in caveat order. At most
    /// [`MAX_DELEGATEES`](crate::MAX_DELEGATEES).
    pub fn delegatees(&self) -> &[Delegatee<'a>] {
        &self.delegatees
    }
}

impl Default for ValidationResult<'_> {
    fn default() -> Self {
        Self::new()
    }
}

/// A delegatable, offline-verifiable capability token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Macaroon<'a> {
    tag: MacTag,
    caveats: Vec<Caveat<'a>>,
}

impl<'a> Macaroon<'a> {
    /// Mint a macaroon from a root key over an ordered caveat sequence.
    ///
    /// Possession of the root key implies authority to mint arbitrary
    /// macaroons, so this is a control-plane operation. At least one caveat
    /// is required; a caveat-less token would be a bare unscoped credential.
    pub fn create_from_root_key(
        root_key: &[u8],
        ctx: &Context<'_>,
        caveats: &[Caveat<'a>],
    ) -> Result<Macaroon<'a>> {
        if root_key.is_empty() {
            return Err(Error::InvalidParameter("root key must not be empty"));
        }
        let tag = chain_tag(root_key, ctx, caveats)?;
        Ok(Macaroon {
            tag,
            caveats: caveats.to_vec(),
        })
    }

    /// Attenuate: produce a new macaroon with `caveat` appended.
    ///
    /// One incremental chain step keyed by the current tag, not a full
    /// recomputation — which is exactly why holders can narrow authority
    /// but cannot forge an extension without a valid tag to start from.
    pub fn extend(&self, ctx: &Context<'_>, caveat: Caveat<'a>) -> Result<Macaroon<'a>> {
        let tag = chain_step(self.tag.as_bytes(), ctx, &caveat)?;
        let mut caveats = self.caveats.clone();
        caveats.push(caveat);
        Ok(Macaroon { tag, caveats })
    }

    /// The macaroon's MAC tag.
    pub fn tag(&self) -> &MacTag {
        &self.tag
    }

    /// The ordered caveat sequence.
    pub fn caveats(&self) -> &[Caveat<'a>] {
        &self.caveats
    }

    /// Verify the tag and evaluate every caveat, in order.
    ///
    /// The MAC chain is recomputed from the root key and compared in
    /// constant time before any caveat is interpreted. On any failure —
    /// tag mismatch, malformed or unknown caveat, policy violation — no
    /// result escapes; the macaroon grants nothing.
    pub fn validate(&self, root_key: &[u8], ctx: &Context<'_>) -> Result<ValidationResult<'a>> {
        if root_key.is_empty() {
            return Err(Error::InvalidParameter("root key must not be empty"));
        }
        let expected = chain_tag(root_key, ctx, &self.caveats)?;
        if expected != self.tag {
            return Err(Error::MacMismatch);
        }

        let mut state = ValidationState::new();
        let mut result = ValidationResult::new();
        for caveat in &self.caveats {
            caveat.validate(ctx, &mut state, &mut result)?;
        }
        Ok(result)
    }

    /// Exact size of the serialized form.
    pub fn serialized_len(&self) -> usize {
        let body = self.body_len();
        cbor::uint_encoded_len(body as u32) + body
    }

    fn body_len(&self) -> usize {
        let mut body = cbor::array_len_encoded_len(self.caveats.len() as u32);
        for caveat in &self.caveats {
            body += cbor::byte_str_encoded_len(caveat.len());
        }
        body + cbor::byte_str_encoded_len(MAC_TAG_LEN)
    }

    /// Serialize into `buf`, returning the bytes written.
    ///
    /// Fails without touching `buf` if it is smaller than
    /// [`serialized_len`](Self::serialized_len).
    pub fn serialize(&self, buf: &mut [u8]) -> Result<usize> {
        let body = self.body_len();
        let total = cbor::uint_encoded_len(body as u32) + body;
        if buf.len() < total {
            return Err(Error::BufferTooSmall {
                needed: total,
                capacity: buf.len(),
            });
        }
        let mut off = cbor::encode_byte_str_len(body as u32, buf)?;
        off += cbor::encode_array_len(self.caveats.len() as u32, &mut buf[off..])?;
        for caveat in &self.caveats {
            off += cbor::encode_byte_str(caveat.as_bytes(), &mut buf[off..])?;
        }
        off += cbor::encode_byte_str(self.tag.as_bytes(), &mut buf[off..])?;
        debug_assert_eq!(off, total);
        Ok(off)
    }

    /// Serialize to an owned buffer.
    pub fn to_vec(&self) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; self.serialized_len()];
        let written = self.serialize(&mut buf)?;
        buf.truncate(written);
        Ok(buf)
    }

    /// Deserialize a macaroon as zero-copy views into `bytes`.
    ///
    /// `bytes` must outlive the macaroon: caveat payloads are not copied.
    /// The decode is structural only — caveat type tags are checked during
    /// [`validate`](Self::validate), so a macaroon carrying an unknown
    /// caveat type deserializes but never validates.
    pub fn deserialize(bytes: &'a [u8]) -> Result<Macaroon<'a>> {
        let (body, consumed) = cbor::decode_byte_str(bytes)?;
        if consumed < bytes.len() {
            return Err(Error::TrailingData {
                remaining: bytes.len() - consumed,
            });
        }
        let (count, mut off) = cbor::decode_array_len(body)?;
        if count == 0 {
            return Err(Error::InvalidParameter(
                "macaroon must carry at least one caveat",
            ));
        }
        // Each caveat item needs at least a one-byte header; a count past
        // the body length cannot be satisfied and is not worth reserving for.
        if count as usize > body.len() {
            return Err(Error::TruncatedInput {
                needed: count as usize,
                available: body.len(),
            });
        }

        let mut caveats = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let (caveat, used) = cbor::decode_byte_str(&body[off..])?;
            caveats.push(Caveat::from_bytes(caveat));
            off += used;
        }

        let (tag_bytes, used) = cbor::decode_byte_str(&body[off..])?;
        if tag_bytes.len() != MAC_TAG_LEN {
            return Err(Error::InvalidTagLength(tag_bytes.len()));
        }
        off += used;
        if off < body.len() {
            return Err(Error::TrailingData {
                remaining: body.len() - off,
            });
        }

        Ok(Macaroon {
            tag: MacTag::from_bytes(tag_bytes)?,
            caveats,
        })
    }
}

/// Fold the MAC chain over a full caveat sequence.
fn chain_tag(root_key: &[u8], ctx: &Context<'_>, caveats: &[Caveat<'_>]) -> Result<MacTag> {
    let (first, rest) = caveats
        .split_first()
        .ok_or(Error::InvalidParameter("at least one caveat is required"))?;
    let mut tag = chain_step(root_key, ctx, first)?;
    for caveat in rest {
        tag = chain_step(tag.as_bytes(), ctx, caveat)?;
    }
    Ok(tag)
}

/// One step of the chain: `MAC(key, bstr-header(caveat) || caveat)`.
///
/// `BleSessionId` caveats additionally sign the length-prefixed session
/// bytes from the context, binding the tag to the active session.
fn chain_step(key: &[u8], ctx: &Context<'_>, caveat: &Caveat<'_>) -> Result<MacTag> {
    let caveat_len = u32::try_from(caveat.len())
        .map_err(|_| Error::InvalidParameter("caveat exceeds 32-bit length"))?;
    let mut head = [0u8; cbor::MAX_HEAD_LEN];
    let head_len = cbor::encode_byte_str_len(caveat_len, &mut head)?;

    // Unknown caveat types still chain over their raw bytes; only the type
    // check during validation rejects them.
    let binds_session = matches!(caveat.caveat_type(), Ok(CaveatType::BleSessionId));
    match ctx.ble_session_id() {
        Some(session_id) if binds_session => {
            let session_len = u32::try_from(session_id.len())
                .map_err(|_| Error::InvalidParameter("session id exceeds 32-bit length"))?;
            let mut session_head = [0u8; cbor::MAX_HEAD_LEN];
            let session_head_len = cbor::encode_byte_str_len(session_len, &mut session_head)?;
            Ok(crypto::compute_tag(
                key,
                &[
                    &head[..head_len],
                    caveat.as_bytes(),
                    &session_head[..session_head_len],
                    session_id,
                ],
            ))
        }
        _ => Ok(crypto::compute_tag(
            key,
            &[&head[..head_len], caveat.as_bytes()],
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_requires_root_key_and_caveats() {
        let mut buf = [0u8; 8];
        let caveat = Caveat::build_scope(Scope::User, &mut buf).unwrap();
        let ctx = Context::new(0);

        assert!(matches!(
            Macaroon::create_from_root_key(&[], &ctx, &[caveat]),
            Err(Error::InvalidParameter(_))
        ));
        assert!(matches!(
            Macaroon::create_from_root_key(&[0u8; 16], &ctx, &[]),
            Err(Error::InvalidParameter(_))
        ));
    }

    #[test]
    fn zero_key_scope_user_example() {
        let root_key = [0u8; 16];
        let mut buf = [0u8; 8];
        let caveat = Caveat::build_scope(Scope::User, &mut buf).unwrap();
        let ctx = Context::new(1000);

        let macaroon = Macaroon::create_from_root_key(&root_key, &ctx, &[caveat]).unwrap();
        let result = macaroon.validate(&root_key, &ctx).unwrap();
        assert_eq!(result.granted_scope(), Scope::User);
        assert_eq!(result.expiration_time(), u32::MAX);
        assert!(!result.app_commands_only());
        assert!(result.delegatees().is_empty());
    }

    #[test]
    fn validate_rejects_wrong_root_key() {
        let mut buf = [0u8; 8];
        let caveat = Caveat::build_scope(Scope::Viewer, &mut buf).unwrap();
        let ctx = Context::new(0);
        let macaroon = Macaroon::create_from_root_key(b"the real key", &ctx, &[caveat]).unwrap();

        assert_eq!(
            macaroon.validate(b"a guessed key", &ctx),
            Err(Error::MacMismatch)
        );
    }

    #[test]
    fn most_restrictive_result_denies_everything() {
        let restrictive = ValidationResult::most_restrictive();
        assert_eq!(restrictive.granted_scope(), Scope::LowestPossible);
        assert_eq!(restrictive.expiration_time(), 0);
        assert!(restrictive.app_commands_only());
    }

    #[test]
    fn serialized_len_matches_serialize() {
        let mut buf = [0u8; 8];
        let caveat = Caveat::build_scope(Scope::Owner, &mut buf).unwrap();
        let ctx = Context::new(0);
        let macaroon = Macaroon::create_from_root_key(b"key", &ctx, &[caveat]).unwrap();

        let mut out = vec![0u8; macaroon.serialized_len()];
        let written = macaroon.serialize(&mut out).unwrap();
        assert_eq!(written, macaroon.serialized_len());

        let mut short = vec![0u8; written - 1];
        assert!(matches!(
            macaroon.serialize(&mut short),
            Err(Error::BufferTooSmall { .. })
        ));
    }
}
