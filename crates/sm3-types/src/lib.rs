//! Foundation types for the SM3 toolkit.
//!
//! This crate holds the value types shared by the hashing, Merkle tree and
//! command-line crates. Every other crate in the workspace depends on
//! `sm3-types`.
//!
//! # Key Types
//!
//! - [`Digest`]: 32-byte SM3 output, big-endian serialization of the state words
//! - [`TypeError`]: failures while parsing digests from external input

pub mod digest;
pub mod error;

pub use digest::{Digest, DIGEST_LEN, STATE_WORDS};
pub use error::TypeError;
