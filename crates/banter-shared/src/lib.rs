//! # banter-shared
//!
//! Wire protocol types and framing shared between the banter relay server
//! and its clients.
//!
//! The crate exposes the [`Envelope`] sum type (one variant per wire
//! message kind), the length-prefixed [`EnvelopeCodec`] used to frame
//! envelopes over TCP, and the password-hashing helper applied before
//! credentials reach the store.

pub mod auth;
pub mod codec;
pub mod constants;
pub mod protocol;

pub use codec::{CodecError, EnvelopeCodec};
pub use protocol::{Attachment, Credentials, Envelope, UserStatus};
