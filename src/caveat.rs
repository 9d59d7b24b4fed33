//! Caveats: typed, immutable restrictions attached to a macaroon.
//!
//! A caveat is a CBOR `(type[, value])` pair living in caller-supplied
//! storage. [`Caveat`] is a thin non-owning view over those bytes; the bytes
//! must outlive every macaroon that references them. Caveats either restrict
//! what a token grants (scope, expiration, TTL) or bind an identity into the
//! MAC chain without changing the grant (nonce, session and token caveats).
//!
//! Construction goes through one per-type `build_*` constructor each, with
//! [`Caveat::buffer_size`] for preallocating the backing storage. Validation
//! is a single dispatcher, [`Caveat::validate`], that threads one
//! [`ValidationState`]/[`ValidationResult`] pair through an ordered pass over
//! a macaroon's caveat sequence.

use crate::cbor;
use crate::context::Context;
use crate::error::{Error, Result};
use crate::macaroon::{Delegatee, DelegateeKind, ValidationResult, ValidationState};
use crate::MAX_DELEGATEES;

/// Seconds in the one-hour TTL window.
pub const TTL_1_HOUR_SECS: u32 = 3_600;

/// Seconds in the 24-hour TTL window.
pub const TTL_24_HOUR_SECS: u32 = 86_400;

/// Narrowest representable scope value; nothing semantic is defined past it.
pub const LOWEST_POSSIBLE_SCOPE: u32 = 127;

/// Privilege scope carried by `Scope` caveats.
///
/// Larger wire values mean narrower privilege, so scope caveats can only ever
/// shrink a grant. `LowestPossible` is the deny-all sentinel used for failed
/// validations and for accumulated values past `Viewer`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum Scope {
    Owner = 2,
    Manager = 8,
    User = 14,
    Viewer = 20,
    LowestPossible = 127,
}

impl Scope {
    /// The numeric wire value of this scope.
    pub fn value(self) -> u32 {
        self as u32
    }

    /// Snap a raw accumulated scope to the nearest defined value on the
    /// narrower side. Values past `Viewer` have no defined narrower scope
    /// and collapse to the sentinel.
    pub fn narrowest_at_least(raw: u32) -> Scope {
        if raw <= Scope::Owner.value() {
            Scope::Owner
        } else if raw <= Scope::Manager.value() {
            Scope::Manager
        } else if raw <= Scope::User.value() {
            Scope::User
        } else if raw <= Scope::Viewer.value() {
            Scope::Viewer
        } else {
            Scope::LowestPossible
        }
    }
}

/// The shape of the value a caveat type carries after its tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ValueShape {
    None,
    Uint,
    Bytes,
}

/// Fixed numeric tags for the known caveat types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CaveatType {
    /// Random bytes making an otherwise-identical token unique.
    Nonce,
    /// Narrows the granted privilege scope.
    Scope,
    /// Absolute expiration, Unix seconds.
    ExpirationAbsolute,
    /// Expires one hour after the preceding delegation timestamp.
    Ttl1Hour,
    /// Expires 24 hours after the preceding delegation timestamp.
    Ttl24Hour,
    /// Time a delegation was performed; must not move backwards.
    DelegationTimestamp,
    /// Records a user identity the token was delegated to.
    DelegateeUser,
    /// Records an app identity; at most one per token.
    DelegateeApp,
    /// Restricts the token to app-surface commands.
    AppCommandsOnly,
    /// Records a service identity; at most one per token.
    DelegateeService,
    /// Binds the MAC to the active BLE session.
    BleSessionId,
    /// Attaches a LAN session identifier to the validation result.
    LanSessionId,
    /// Opaque client authorization token, bound at the MAC level.
    ClientAuthorizationTokenV1,
    /// Opaque server authentication token, bound at the MAC level.
    ServerAuthenticationTokenV1,
}

impl CaveatType {
    /// The fixed numeric tag encoded on the wire.
    pub fn tag(self) -> u32 {
        match self {
            CaveatType::Nonce => 0,
            CaveatType::Scope => 1,
            CaveatType::ExpirationAbsolute => 5,
            CaveatType::Ttl1Hour => 6,
            CaveatType::Ttl24Hour => 7,
            CaveatType::DelegationTimestamp => 8,
            CaveatType::DelegateeUser => 9,
            CaveatType::DelegateeApp => 10,
            CaveatType::AppCommandsOnly => 11,
            CaveatType::DelegateeService => 12,
            CaveatType::BleSessionId => 16,
            CaveatType::LanSessionId => 17,
            CaveatType::ClientAuthorizationTokenV1 => 8193,
            CaveatType::ServerAuthenticationTokenV1 => 8194,
        }
    }

    /// Look up a wire tag. Unknown tags fail closed at every call site.
    pub fn from_tag(tag: u32) -> Option<CaveatType> {
        match tag {
            0 => Some(CaveatType::Nonce),
            1 => Some(CaveatType::Scope),
            5 => Some(CaveatType::ExpirationAbsolute),
            6 => Some(CaveatType::Ttl1Hour),
            7 => Some(CaveatType::Ttl24Hour),
            8 => Some(CaveatType::DelegationTimestamp),
            9 => Some(CaveatType::DelegateeUser),
            10 => Some(CaveatType::DelegateeApp),
            11 => Some(CaveatType::AppCommandsOnly),
            12 => Some(CaveatType::DelegateeService),
            16 => Some(CaveatType::BleSessionId),
            17 => Some(CaveatType::LanSessionId),
            8193 => Some(CaveatType::ClientAuthorizationTokenV1),
            8194 => Some(CaveatType::ServerAuthenticationTokenV1),
            _ => None,
        }
    }

    pub(crate) fn value_shape(self) -> ValueShape {
        match self {
            CaveatType::Ttl1Hour
            | CaveatType::Ttl24Hour
            | CaveatType::AppCommandsOnly
            | CaveatType::BleSessionId => ValueShape::None,
            CaveatType::Scope
            | CaveatType::ExpirationAbsolute
            | CaveatType::DelegationTimestamp => ValueShape::Uint,
            CaveatType::Nonce
            | CaveatType::DelegateeUser
            | CaveatType::DelegateeApp
            | CaveatType::DelegateeService
            | CaveatType::LanSessionId
            | CaveatType::ClientAuthorizationTokenV1
            | CaveatType::ServerAuthenticationTokenV1 => ValueShape::Bytes,
        }
    }
}

enum CaveatValue<'v> {
    None,
    Uint(u32),
    Bytes(&'v [u8]),
}

/// A non-owning view over one encoded caveat.
///
/// Valid for as long as the backing storage (a construction buffer or a
/// serialized macaroon) lives. The type tag is decoded lazily, so a view
/// over arbitrary bytes is cheap to hold and fails closed when used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caveat<'a> {
    bytes: &'a [u8],
}

impl<'a> Caveat<'a> {
    /// Wrap already-encoded caveat bytes without inspecting them.
    pub fn from_bytes(bytes: &'a [u8]) -> Caveat<'a> {
        Caveat { bytes }
    }

    /// The encoded `(type[, value])` bytes.
    pub fn as_bytes(&self) -> &'a [u8] {
        self.bytes
    }

    /// Encoded length in bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// True for a zero-length view; never produced by the constructors.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Exact storage needed to build a caveat of `caveat_type`.
    ///
    /// `value_len` is the payload length for byte-string caveats and ignored
    /// otherwise; integer-valued caveats are sized for the widest encoding.
    pub fn buffer_size(caveat_type: CaveatType, value_len: usize) -> usize {
        cbor::uint_encoded_len(caveat_type.tag())
            + match caveat_type.value_shape() {
                ValueShape::None => 0,
                ValueShape::Uint => cbor::MAX_HEAD_LEN,
                ValueShape::Bytes => cbor::byte_str_encoded_len(value_len),
            }
    }

    fn build(
        caveat_type: CaveatType,
        value: CaveatValue<'_>,
        buf: &'a mut [u8],
    ) -> Result<Caveat<'a>> {
        let needed = cbor::uint_encoded_len(caveat_type.tag())
            + match value {
                CaveatValue::None => 0,
                CaveatValue::Uint(v) => cbor::uint_encoded_len(v),
                CaveatValue::Bytes(b) => cbor::byte_str_encoded_len(b.len()),
            };
        if buf.len() < needed {
            return Err(Error::BufferTooSmall {
                needed,
                capacity: buf.len(),
            });
        }
        let mut used = cbor::encode_uint(caveat_type.tag(), buf)?;
        match value {
            CaveatValue::None => {}
            CaveatValue::Uint(v) => used += cbor::encode_uint(v, &mut buf[used..])?,
            CaveatValue::Bytes(b) => used += cbor::encode_byte_str(b, &mut buf[used..])?,
        }
        let (encoded, _) = buf.split_at_mut(used);
        Ok(Caveat { bytes: encoded })
    }

    /// Build a nonce caveat. Zero-length nonces are permitted.
    pub fn build_nonce(nonce: &[u8], buf: &'a mut [u8]) -> Result<Caveat<'a>> {
        Self::build(CaveatType::Nonce, CaveatValue::Bytes(nonce), buf)
    }

    /// Build a scope caveat narrowing the grant to `scope`.
    pub fn build_scope(scope: Scope, buf: &'a mut [u8]) -> Result<Caveat<'a>> {
        Self::build(CaveatType::Scope, CaveatValue::Uint(scope.value()), buf)
    }

    /// Build an absolute-expiration caveat (Unix seconds).
    pub fn build_expiration_absolute(expiration: u32, buf: &'a mut [u8]) -> Result<Caveat<'a>> {
        Self::build(
            CaveatType::ExpirationAbsolute,
            CaveatValue::Uint(expiration),
            buf,
        )
    }

    /// Build a one-hour TTL caveat, anchored to the preceding delegation
    /// timestamp.
    pub fn build_ttl_1_hour(buf: &'a mut [u8]) -> Result<Caveat<'a>> {
        Self::build(CaveatType::Ttl1Hour, CaveatValue::None, buf)
    }

    /// Build a 24-hour TTL caveat.
    pub fn build_ttl_24_hour(buf: &'a mut [u8]) -> Result<Caveat<'a>> {
        Self::build(CaveatType::Ttl24Hour, CaveatValue::None, buf)
    }

    /// Build a delegation-timestamp caveat (Unix seconds).
    pub fn build_delegation_timestamp(timestamp: u32, buf: &'a mut [u8]) -> Result<Caveat<'a>> {
        Self::build(
            CaveatType::DelegationTimestamp,
            CaveatValue::Uint(timestamp),
            buf,
        )
    }

    /// Build a user-delegatee caveat.
    pub fn build_delegatee_user(id: &[u8], buf: &'a mut [u8]) -> Result<Caveat<'a>> {
        Self::build(CaveatType::DelegateeUser, CaveatValue::Bytes(id), buf)
    }

    /// Build an app-delegatee caveat.
    pub fn build_delegatee_app(id: &[u8], buf: &'a mut [u8]) -> Result<Caveat<'a>> {
        Self::build(CaveatType::DelegateeApp, CaveatValue::Bytes(id), buf)
    }

    /// Build a service-delegatee caveat.
    pub fn build_delegatee_service(id: &[u8], buf: &'a mut [u8]) -> Result<Caveat<'a>> {
        Self::build(CaveatType::DelegateeService, CaveatValue::Bytes(id), buf)
    }

    /// Build an app-commands-only caveat.
    pub fn build_app_commands_only(buf: &'a mut [u8]) -> Result<Caveat<'a>> {
        Self::build(CaveatType::AppCommandsOnly, CaveatValue::None, buf)
    }

    /// Build a BLE session-binding caveat.
    ///
    /// The caveat carries no value; the session bytes come from the
    /// [`Context`] and are mixed into the MAC when the chain is computed.
    pub fn build_ble_session_id(buf: &'a mut [u8]) -> Result<Caveat<'a>> {
        Self::build(CaveatType::BleSessionId, CaveatValue::None, buf)
    }

    /// Build a LAN session-id caveat.
    pub fn build_lan_session_id(session_id: &[u8], buf: &'a mut [u8]) -> Result<Caveat<'a>> {
        Self::build(CaveatType::LanSessionId, CaveatValue::Bytes(session_id), buf)
    }

    /// Build a client-authorization-token caveat.
    pub fn build_client_authorization_token(
        token: &[u8],
        buf: &'a mut [u8],
    ) -> Result<Caveat<'a>> {
        Self::build(
            CaveatType::ClientAuthorizationTokenV1,
            CaveatValue::Bytes(token),
            buf,
        )
    }

    /// Build a server-authentication-token caveat.
    pub fn build_server_authentication_token(
        token: &[u8],
        buf: &'a mut [u8],
    ) -> Result<Caveat<'a>> {
        Self::build(
            CaveatType::ServerAuthenticationTokenV1,
            CaveatValue::Bytes(token),
            buf,
        )
    }

    /// Decode the leading type tag and validate it against the known set.
    pub fn caveat_type(&self) -> Result<CaveatType> {
        let (tag, _) = cbor::decode_uint(self.bytes)?;
        CaveatType::from_tag(tag).ok_or(Error::UnknownCaveatType(tag))
    }

    /// The caveat's integer value. Fails unless this caveat's type carries
    /// an unsigned-integer value.
    pub fn value_uint(&self) -> Result<u32> {
        let caveat_type = self.caveat_type()?;
        if caveat_type.value_shape() != ValueShape::Uint {
            return Err(Error::WrongValueShape {
                caveat_type,
                expected: "unsigned integer",
            });
        }
        let bytes = self.bytes;
        let (_, head) = cbor::decode_uint(bytes)?;
        let (value, _) = cbor::decode_uint(&bytes[head..])?;
        Ok(value)
    }

    /// The caveat's byte-string value, zero-copy. Fails unless this caveat's
    /// type carries a byte-string value.
    pub fn value_bytes(&self) -> Result<&'a [u8]> {
        let caveat_type = self.caveat_type()?;
        if caveat_type.value_shape() != ValueShape::Bytes {
            return Err(Error::WrongValueShape {
                caveat_type,
                expected: "byte string",
            });
        }
        let bytes = self.bytes;
        let (_, head) = cbor::decode_uint(bytes)?;
        let (value, _) = cbor::decode_byte_str(&bytes[head..])?;
        Ok(value)
    }

    /// Validate this caveat as one step of an ordered pass.
    ///
    /// `state` threads the issued time between caveats; `result` accumulates
    /// the grant. An `Err` from any step must abort the whole pass — the
    /// partially populated result is not safe to act on (see
    /// [`ValidationResult::most_restrictive`]).
    pub fn validate(
        &self,
        ctx: &Context<'_>,
        state: &mut ValidationState,
        result: &mut ValidationResult<'a>,
    ) -> Result<()> {
        match self.caveat_type()? {
            // Identity-binding caveats: enforced by the MAC chain, inert here.
            CaveatType::Nonce
            | CaveatType::BleSessionId
            | CaveatType::ClientAuthorizationTokenV1
            | CaveatType::ServerAuthenticationTokenV1 => Ok(()),

            CaveatType::DelegationTimestamp => {
                let timestamp = self.value_uint()?;
                if timestamp < state.issued_time {
                    return Err(Error::TimestampRollback {
                        previous: state.issued_time,
                        current: timestamp,
                    });
                }
                state.issued_time = timestamp;
                Ok(())
            }

            CaveatType::Ttl1Hour => self.check_ttl(ctx, state, result, TTL_1_HOUR_SECS),
            CaveatType::Ttl24Hour => self.check_ttl(ctx, state, result, TTL_24_HOUR_SECS),

            CaveatType::ExpirationAbsolute => {
                let expiration = self.value_uint()?;
                apply_expiration(ctx, result, expiration)
            }

            CaveatType::DelegateeUser => {
                self.push_delegatee(DelegateeKind::User, state, result)
            }
            CaveatType::DelegateeApp => self.push_delegatee(DelegateeKind::App, state, result),
            CaveatType::DelegateeService => {
                self.push_delegatee(DelegateeKind::Service, state, result)
            }

            CaveatType::Scope => {
                let scope = self.value_uint()?;
                if scope > LOWEST_POSSIBLE_SCOPE {
                    return Err(Error::ScopeOutOfRange(scope));
                }
                // Scope caveats only ever narrow the accumulated grant.
                if scope > result.granted_scope_raw {
                    result.granted_scope_raw = scope;
                }
                Ok(())
            }

            CaveatType::AppCommandsOnly => {
                result.app_commands_only = true;
                Ok(())
            }

            CaveatType::LanSessionId => {
                result.lan_session_id = Some(self.value_bytes()?);
                Ok(())
            }
        }
    }

    fn check_ttl(
        &self,
        ctx: &Context<'_>,
        state: &ValidationState,
        result: &mut ValidationResult<'a>,
        window: u32,
    ) -> Result<()> {
        if state.issued_time == 0 {
            return Err(Error::MissingDelegationTimestamp);
        }
        apply_expiration(ctx, result, state.issued_time.saturating_add(window))
    }

    fn push_delegatee(
        &self,
        kind: DelegateeKind,
        state: &ValidationState,
        result: &mut ValidationResult<'a>,
    ) -> Result<()> {
        if state.issued_time == 0 {
            return Err(Error::MissingDelegationTimestamp);
        }
        if result.delegatees.len() >= MAX_DELEGATEES {
            return Err(Error::TooManyDelegatees {
                max: MAX_DELEGATEES,
            });
        }
        // App and service delegatees are singletons; users are only bounded
        // by the overall cap.
        if kind != DelegateeKind::User && result.delegatees.iter().any(|d| d.kind == kind) {
            return Err(Error::DuplicateDelegatee {
                kind: kind.as_str(),
            });
        }
        result.delegatees.push(Delegatee {
            id: self.value_bytes()?,
            kind,
            timestamp: state.issued_time,
        });
        Ok(())
    }
}

fn apply_expiration(
    ctx: &Context<'_>,
    result: &mut ValidationResult<'_>,
    expiration: u32,
) -> Result<()> {
    // Tightest-wins: the result only ever records the earliest expiration.
    if expiration < result.expiration_time {
        result.expiration_time = expiration;
    }
    if ctx.current_time() > expiration {
        return Err(Error::CaveatExpired {
            expiration,
            now: ctx.current_time(),
        });
    }
    Ok(())
}
