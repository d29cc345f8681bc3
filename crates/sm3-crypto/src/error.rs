/// Errors from Merkle tree construction and proof generation.
///
/// Verification never produces an error: a proof that does not reproduce the
/// root is simply `false`.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum MerkleError {
    /// The leaf set was empty.
    #[error("invalid input: cannot build a Merkle tree from zero leaves")]
    InvalidInput,

    /// The requested leaf does not exist.
    #[error("invalid argument: leaf index {index} out of range for {leaf_count} leaves")]
    InvalidArgument { index: usize, leaf_count: usize },

    /// The tree could not be allocated.
    #[error("resource exhausted: cannot allocate {requested} tree nodes")]
    ResourceExhausted { requested: usize },
}

/// Result alias for Merkle operations.
pub type MerkleResult<T> = Result<T, MerkleError>;
