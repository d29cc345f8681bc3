use serde::{Deserialize, Serialize};
use sm3_types::Digest;
use tracing::debug;

use crate::config::TreeConfig;
use crate::error::{MerkleError, MerkleResult};
use crate::hasher::Sm3Hasher;

/// Domain byte prefixed to leaf data.
const LEAF_PREFIX: u8 = 0x00;
/// Domain byte prefixed to a pair of child hashes.
const NODE_PREFIX: u8 = 0x01;

/// Side of a sibling in a Merkle proof path.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Left,
    Right,
}

/// `H(0x00 || data)`.
pub fn leaf_hash(data: &[u8]) -> Digest {
    let mut hasher = Sm3Hasher::new();
    hasher.update(&[LEAF_PREFIX]);
    hasher.update(data);
    hasher.finalize()
}

/// `H(0x01 || left || right)`.
pub fn node_hash(left: &Digest, right: &Digest) -> Digest {
    let mut hasher = Sm3Hasher::new();
    hasher.update(&[NODE_PREFIX]);
    hasher.update(left.as_bytes());
    hasher.update(right.as_bytes());
    hasher.finalize()
}

/// Address of a node in the tree: level 0 holds the leaves, level
/// [`MerkleTree::depth`] holds the root.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NodePosition {
    pub level: usize,
    pub index: usize,
}

/// What a node is, as seen through [`MerkleTree::node`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NodeKind {
    /// A leaf. `index` is the position in the caller's original leaf list;
    /// padding leaves point at the real leaf they duplicate.
    Leaf { index: usize, padding: bool },
    /// An internal node and the positions of its two children.
    Internal {
        left: NodePosition,
        right: NodePosition,
    },
}

/// A node of a built tree.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MerkleNode {
    pub hash: Digest,
    pub kind: NodeKind,
}

impl MerkleNode {
    pub fn is_leaf(&self) -> bool {
        matches!(self.kind, NodeKind::Leaf { .. })
    }
}

/// Binary Merkle tree over SM3 with domain-separated hashing.
///
/// The leaf level is padded to the next power of two by repeating the hash of
/// the last real leaf. This is not RFC 6962's odd-node rule, so roots are not
/// interchangeable with Certificate Transparency style trees.
///
/// Nodes live in an arena, one vector per level, and the whole tree is
/// released at once when dropped.
#[derive(Clone, Debug)]
pub struct MerkleTree {
    /// Level 0 = padded leaves, last level = `[root]`.
    levels: Vec<Vec<Digest>>,
    /// Number of leaves supplied by the caller.
    leaf_count: usize,
}

impl MerkleTree {
    /// Build a tree over `leaves` with the default configuration.
    pub fn build<L: AsRef<[u8]> + Sync>(leaves: &[L]) -> MerkleResult<Self> {
        Self::build_with_config(leaves, &TreeConfig::default())
    }

    /// Build a tree over `leaves`.
    ///
    /// Fails with [`MerkleError::InvalidInput`] for an empty slice and with
    /// [`MerkleError::ResourceExhausted`] if any level cannot be allocated.
    pub fn build_with_config<L: AsRef<[u8]> + Sync>(
        leaves: &[L],
        config: &TreeConfig,
    ) -> MerkleResult<Self> {
        if leaves.is_empty() {
            return Err(MerkleError::InvalidInput);
        }

        let leaf_count = leaves.len();
        let width = leaf_count
            .checked_next_power_of_two()
            .ok_or(MerkleError::ResourceExhausted {
                requested: usize::MAX,
            })?;
        let depth = width.trailing_zeros() as usize;

        let mut levels: Vec<Vec<Digest>> = Vec::new();
        levels
            .try_reserve_exact(depth + 1)
            .map_err(|_| MerkleError::ResourceExhausted { requested: depth + 1 })?;

        let mut base = hash_leaves(leaves, width, config)?;
        let last = base[leaf_count - 1];
        base.resize(width, last);
        levels.push(base);

        while let Some(prev) = levels.last().filter(|level| level.len() > 1) {
            let next = hash_level(prev, config)?;
            levels.push(next);
        }

        debug!(
            leaves = leaf_count,
            padded = width,
            depth,
            "built merkle tree"
        );

        Ok(Self { levels, leaf_count })
    }

    /// The root hash of the tree.
    pub fn root(&self) -> Digest {
        // The last level always holds exactly the root.
        self.levels[self.levels.len() - 1][0]
    }

    /// Number of leaves supplied at construction (before padding).
    pub fn leaf_count(&self) -> usize {
        self.leaf_count
    }

    /// Width of the leaf level after padding.
    pub fn padded_leaf_count(&self) -> usize {
        self.levels[0].len()
    }

    /// `ceil(log2(leaf_count))`; also the length of every inclusion proof.
    pub fn depth(&self) -> usize {
        self.levels.len() - 1
    }

    /// Hash of real leaf `index`, if it exists.
    pub fn leaf(&self, index: usize) -> Option<Digest> {
        (index < self.leaf_count).then(|| self.levels[0][index])
    }

    /// Look up a node by level and position.
    pub fn node(&self, level: usize, index: usize) -> Option<MerkleNode> {
        let hash = *self.levels.get(level)?.get(index)?;
        let kind = if level == 0 {
            NodeKind::Leaf {
                index: index.min(self.leaf_count - 1),
                padding: index >= self.leaf_count,
            }
        } else {
            NodeKind::Internal {
                left: NodePosition {
                    level: level - 1,
                    index: 2 * index,
                },
                right: NodePosition {
                    level: level - 1,
                    index: 2 * index + 1,
                },
            }
        };
        Some(MerkleNode { hash, kind })
    }

    /// Generate an inclusion proof for the leaf at `index`.
    ///
    /// The path has one entry per level, from the leaf's sibling up to the
    /// root's children.
    pub fn proof(&self, index: usize) -> MerkleResult<InclusionProof> {
        if index >= self.leaf_count {
            return Err(MerkleError::InvalidArgument {
                index,
                leaf_count: self.leaf_count,
            });
        }

        let mut path = Vec::with_capacity(self.depth());
        let mut idx = index;

        for level in &self.levels[..self.levels.len() - 1] {
            let side = if idx % 2 == 0 {
                Side::Right
            } else {
                Side::Left
            };
            path.push((level[idx ^ 1], side));
            idx /= 2;
        }

        debug!(index, len = path.len(), "generated inclusion proof");
        Ok(InclusionProof {
            leaf_index: index,
            path,
        })
    }

    /// Index of the first real leaf whose hash equals `target`.
    pub fn position_of(&self, target: &Digest) -> Option<usize> {
        self.levels[0][..self.leaf_count]
            .iter()
            .position(|leaf| leaf == target)
    }

    /// Returns `true` if no real leaf of *this* tree hashes to `target`.
    ///
    /// This is a linear scan over leaves the caller already holds. It is a
    /// convenience check, not a non-membership proof: it gives a verifier
    /// without the full leaf set no guarantee at all.
    pub fn is_absent(&self, target: &Digest) -> bool {
        self.position_of(target).is_none()
    }
}

fn alloc_level(len: usize) -> MerkleResult<Vec<Digest>> {
    let mut level = Vec::new();
    level
        .try_reserve_exact(len)
        .map_err(|_| MerkleError::ResourceExhausted { requested: len })?;
    Ok(level)
}

#[cfg_attr(not(feature = "parallel"), allow(unused_variables))]
fn hash_leaves<L: AsRef<[u8]> + Sync>(
    leaves: &[L],
    width: usize,
    config: &TreeConfig,
) -> MerkleResult<Vec<Digest>> {
    let mut level = alloc_level(width)?;

    #[cfg(feature = "parallel")]
    if leaves.len() >= config.parallel_threshold {
        use rayon::prelude::*;
        level.par_extend(leaves.par_iter().map(|leaf| leaf_hash(leaf.as_ref())));
        return Ok(level);
    }

    level.extend(leaves.iter().map(|leaf| leaf_hash(leaf.as_ref())));
    Ok(level)
}

#[cfg_attr(not(feature = "parallel"), allow(unused_variables))]
fn hash_level(prev: &[Digest], config: &TreeConfig) -> MerkleResult<Vec<Digest>> {
    let mut next = alloc_level(prev.len() / 2)?;

    #[cfg(feature = "parallel")]
    if prev.len() >= config.parallel_threshold {
        use rayon::prelude::*;
        next.par_extend(
            prev.par_chunks_exact(2)
                .map(|pair| node_hash(&pair[0], &pair[1])),
        );
        return Ok(next);
    }

    next.extend(
        prev.chunks_exact(2)
            .map(|pair| node_hash(&pair[0], &pair[1])),
    );
    Ok(next)
}

/// Merkle inclusion proof.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InclusionProof {
    /// Index of the proven leaf in the original leaf list.
    pub leaf_index: usize,
    /// Path of (sibling_hash, sibling_side) pairs from leaf to root.
    pub path: Vec<(Digest, Side)>,
}

impl InclusionProof {
    /// Number of levels covered, equal to the depth of the tree.
    pub fn len(&self) -> usize {
        self.path.len()
    }

    /// `true` for the proof of a single-leaf tree.
    pub fn is_empty(&self) -> bool {
        self.path.is_empty()
    }

    /// Recompute the root from `leaf` along the path.
    pub fn compute_root(&self, leaf: &Digest) -> Digest {
        self.path
            .iter()
            .fold(*leaf, |current, (sibling, side)| match side {
                Side::Left => node_hash(sibling, &current),
                Side::Right => node_hash(&current, sibling),
            })
    }

    /// Verify the proof: recompute the root from the leaf and path.
    pub fn verify(&self, leaf: &Digest, root: &Digest) -> bool {
        self.compute_root(leaf) == *root
    }
}

/// Check that `proof` links `leaf` to `root`.
pub fn verify_inclusion_proof(leaf: &Digest, proof: &InclusionProof, root: &Digest) -> bool {
    proof.verify(leaf, root)
}
