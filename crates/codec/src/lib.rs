//! Deterministic punk codec: six-byte payloads, frozen trait tables, and
//! the seeded generator.
//!
//! A punk's entire visual state fits in six bytes:
//!
//! ```text
//! byte 0 : [ type:3 | background:4 | reserved:1 ]   bits 7..5 type, 4..1 background
//! bytes 1..4 : u32 little-endian attribute bitmap
//! byte 5 : u8 attribute count (= popcount of the bitmap)
//! ```
//!
//! The punk's permanent identity is `SHA-256` over these six bytes
//! ([`punk_id_of`]). Encoding is lossless and reversible: decoding a payload
//! and re-encoding the result reproduces the payload byte for byte
//! ([`verify_integrity`]).
//!
//! The trait tables in [`tables`] are part of the protocol. They are frozen;
//! changing an entry or its position is a breaking protocol change because it
//! silently re-labels every payload already in circulation.

pub mod generator;
pub mod metadata;
pub mod payload;
pub mod tables;

mod error;

pub use error::CodecError;
pub use generator::{GeneratedPunk, generate};
pub use metadata::PunkMetadata;
pub use payload::{PAYLOAD_LEN, decode, decode_verified, encode, punk_id_of, verify_integrity};
pub use tables::{BACKGROUNDS, PunkType};
