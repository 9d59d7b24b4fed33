//! Error types for macaroon-core.
//!
//! Every fallible operation returns a `Result` with a specific, actionable
//! error: the caller can tell a structural problem (short buffer, malformed
//! CBOR) apart from a policy violation (expired caveat, delegatee limit) and
//! from a MAC mismatch. Errors are plain return values; this core keeps no
//! global error state and does no logging.

use crate::caveat::CaveatType;
use thiserror::Error;

/// Result type alias for macaroon operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in macaroon operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    // =========================================================================
    // Parameter & Buffer Errors
    // =========================================================================
    /// A required input was missing or empty where that is disallowed.
    #[error("invalid parameter: {0}")]
    InvalidParameter(&'static str),

    /// The caller-supplied output buffer cannot hold the encoded item.
    ///
    /// Nothing has been written to the buffer; use the sizing helpers to
    /// allocate exactly `needed` bytes and retry.
    #[error("buffer too small: need {needed} bytes, have {capacity}")]
    BufferTooSmall { needed: usize, capacity: usize },

    // =========================================================================
    // CBOR Structure Errors
    // =========================================================================
    /// Input ended before the item it claims to contain.
    #[error("truncated input: need {needed} bytes, have {available}")]
    TruncatedInput { needed: usize, available: usize },

    /// The item's major type does not match what the decoder expected.
    #[error("unexpected CBOR major type {found}, expected {expected}")]
    UnexpectedMajorType { expected: &'static str, found: u8 },

    /// The item uses a major type outside the restricted subset
    /// (uint, byte string, text string, array).
    #[error("unsupported CBOR major type {0}")]
    UnsupportedMajorType(u8),

    /// The header uses an additional-info value this codec never emits:
    /// 8-byte integers (27) or reserved/indefinite forms (28-31).
    #[error("unsupported CBOR additional info {0}")]
    UnsupportedAdditionalInfo(u8),

    /// A text string's payload is not valid UTF-8.
    #[error("text string is not valid UTF-8")]
    InvalidTextString,

    /// A serialized macaroon carried bytes past the end of its body.
    #[error("trailing data after macaroon body: {remaining} bytes")]
    TrailingData { remaining: usize },

    // =========================================================================
    // Caveat Errors
    // =========================================================================
    /// The caveat's leading type tag is not in the known-type set.
    #[error("unknown caveat type tag {0}")]
    UnknownCaveatType(u32),

    /// A typed accessor was called on a caveat whose type carries a
    /// different value shape.
    #[error("caveat type {caveat_type:?} does not carry a {expected} value")]
    WrongValueShape {
        caveat_type: CaveatType,
        expected: &'static str,
    },

    // =========================================================================
    // Validation Errors
    // =========================================================================
    /// The recomputed MAC chain does not match the macaroon's tag.
    ///
    /// Carries no detail about where the chain diverged.
    #[error("MAC tag mismatch")]
    MacMismatch,

    /// The trailing tag item of a serialized macaroon is not 16 bytes,
    /// or a tag was constructed from a slice of the wrong length.
    #[error("invalid MAC tag length {0}, expected 16")]
    InvalidTagLength(usize),

    /// A scope caveat's value exceeds the lowest possible scope.
    #[error("scope value {0} out of range (max 127)")]
    ScopeOutOfRange(u32),

    /// A delegation timestamp moved backwards within the caveat sequence.
    #[error("delegation timestamp rollback: {current} is earlier than {previous}")]
    TimestampRollback { previous: u32, current: u32 },

    /// A TTL or delegatee caveat appeared before any delegation timestamp.
    #[error("caveat requires a preceding delegation timestamp")]
    MissingDelegationTimestamp,

    /// The caveat's expiration has passed.
    #[error("caveat expired at {expiration}, current time {now}")]
    CaveatExpired { expiration: u32, now: u32 },

    /// Adding this delegatee would exceed the per-macaroon cap.
    #[error("too many delegatees, maximum {max}")]
    TooManyDelegatees { max: usize },

    /// A second app or service delegatee was added.
    #[error("duplicate {kind} delegatee")]
    DuplicateDelegatee { kind: &'static str },
}
