//! SM3 hashing and the structures built on it.
//!
//! Provides the SM3 compression function (reference and optimized variants),
//! a streaming Merkle–Damgård hasher, binary Merkle trees with domain-separated
//! hashing and inclusion proofs, and a length-extension demonstration that
//! resumes a hasher from a published digest.
//!
//! The length-extension module exists to show why plain SM3 must not be used
//! as a MAC; it is not an attack toolkit and this crate is not a general
//! cryptographic library.

pub mod compress;
pub mod config;
pub mod error;
pub mod extension;
pub mod hasher;
pub mod merkle;

pub use compress::{compress_optimized, compress_reference, Engine, BLOCK_LEN, IV};
pub use config::TreeConfig;
pub use error::{MerkleError, MerkleResult};
pub use extension::{forge, forge_with, glue_padding, length_extend, Forgery};
pub use hasher::{hash, hash_with, HashState, Phase, Sm3Hasher};
pub use merkle::{
    leaf_hash, node_hash, verify_inclusion_proof, InclusionProof, MerkleNode, MerkleTree, NodeKind,
    NodePosition, Side,
};
pub use sm3_types::Digest;
