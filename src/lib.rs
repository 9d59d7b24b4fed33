//! # macaroon-core
//!
//! Chained-MAC capability tokens (macaroons) with attenuation-only
//! delegation and a restricted canonical CBOR wire format.
//!
//! A macaroon carries an ordered list of caveats and a 16-byte tag. The tag
//! is a truncated HMAC-SHA256 folded through the caveats: the root key signs
//! the first caveat, and each intermediate tag keys the signature of the
//! next. Anyone holding a valid macaroon can append caveats — narrowing what
//! the token grants — but removing or reordering caveats, or forging a token
//! outright, requires the root key.
//!
//! ## Key Concepts
//!
//! - **Caveat**: a typed restriction (scope, expiration, TTL) or an
//!   identity-binding assertion (nonce, session, delegatee) on the token
//! - **Attenuation**: [`Macaroon::extend`] appends one caveat in one
//!   incremental MAC step; authority only ever shrinks
//! - **Validation**: recompute the chain, compare tags in constant time,
//!   then evaluate the caveats in order into a [`ValidationResult`]
//!
//! ## Example
//!
//! ```rust,ignore
//! use macaroon_core::{Caveat, Context, Macaroon, Scope};
//!
//! let mut scope_buf = [0u8; 8];
//! let scope = Caveat::build_scope(Scope::User, &mut scope_buf)?;
//!
//! let ctx = Context::new(now);
//! let token = Macaroon::create_from_root_key(&root_key, &ctx, &[scope])?;
//!
//! // A holder narrows the token further before handing it on.
//! let mut exp_buf = [0u8; 8];
//! let expires = Caveat::build_expiration_absolute(now + 600, &mut exp_buf)?;
//! let narrowed = token.extend(&ctx, expires)?;
//!
//! let grant = narrowed.validate(&root_key, &ctx)?;
//! assert_eq!(grant.granted_scope(), Scope::User);
//! ```
//!
//! This core performs no I/O and no hidden allocation beyond the caveat
//! list itself: caveat payloads and deserialized macaroons are zero-copy
//! views into caller-supplied storage.

pub mod caveat;
pub mod cbor;
pub mod context;
pub mod crypto;
pub mod error;
pub mod macaroon;

// Re-exports for convenience
pub use caveat::{Caveat, CaveatType, Scope, LOWEST_POSSIBLE_SCOPE};
pub use context::Context;
pub use crypto::{MacTag, MAC_TAG_LEN};
pub use error::{Error, Result};
pub use macaroon::{
    Delegatee, DelegateeKind, Macaroon, ValidationResult, ValidationState,
};

/// Maximum delegatees a single validation pass will record.
///
/// The eleventh delegatee caveat fails validation outright rather than being
/// silently dropped.
pub const MAX_DELEGATEES: usize = 10;
