use serde::{Deserialize, Serialize};

/// Tuning for Merkle tree construction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TreeConfig {
    /// Minimum level width hashed on the rayon pool when the `parallel`
    /// feature is enabled. Narrower levels are hashed on the calling thread.
    /// Has no effect without the feature.
    pub parallel_threshold: usize,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            parallel_threshold: 4096,
        }
    }
}

impl TreeConfig {
    /// Hash every level on the calling thread.
    pub fn sequential() -> Self {
        Self {
            parallel_threshold: usize::MAX,
        }
    }
}
