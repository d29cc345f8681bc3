//! Length extension against plain SM3.
//!
//! `finalize` depends only on the chaining words and the processed length, and
//! the digest *is* the chaining words. Given `H(m)` and `len(m)` anyone can
//! therefore compute `H(m || pad(len(m)) || suffix)` without knowing `m`. This
//! is why `H(secret || message)` is not a MAC.

use sm3_types::Digest;

use crate::compress::{Engine, BLOCK_LEN};
use crate::hasher::{hash, Sm3Hasher};

/// The Merkle–Damgård padding SM3 appends to a message of `len` bytes:
/// `0x80`, zero bytes up to 56 mod 64, then the bit length as big-endian u64.
pub fn glue_padding(len: u64) -> Vec<u8> {
    let zeros = (55u64.wrapping_sub(len) % BLOCK_LEN as u64) as usize;
    let mut padding = Vec::with_capacity(1 + zeros + 8);
    padding.push(0x80);
    padding.resize(1 + zeros, 0);
    padding.extend_from_slice(&len.wrapping_mul(8).to_be_bytes());
    padding
}

/// Result of extending a digest.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Forgery {
    /// `H(original || glue_padding || suffix)`.
    pub digest: Digest,
    /// The padding that sits between the original message and the suffix.
    pub glue_padding: Vec<u8>,
}

impl Forgery {
    /// Assemble `original || glue_padding || suffix`, the message the forged
    /// digest belongs to.
    pub fn forged_message(&self, original: &[u8], suffix: &[u8]) -> Vec<u8> {
        let mut message =
            Vec::with_capacity(original.len() + self.glue_padding.len() + suffix.len());
        message.extend_from_slice(original);
        message.extend_from_slice(&self.glue_padding);
        message.extend_from_slice(suffix);
        message
    }

    /// Recompute the forged message's digest from scratch and compare.
    pub fn matches(&self, original: &[u8], suffix: &[u8]) -> bool {
        hash(&self.forged_message(original, suffix)) == self.digest
    }
}

/// Extend `original` (the digest of an unknown `original_len`-byte message)
/// with `suffix`.
pub fn forge(original: &Digest, original_len: u64, suffix: &[u8]) -> Forgery {
    forge_with(Engine::default(), original, original_len, suffix)
}

/// [`forge`] with a chosen compression engine.
pub fn forge_with(engine: Engine, original: &Digest, original_len: u64, suffix: &[u8]) -> Forgery {
    let glue_padding = glue_padding(original_len);
    let blocks = original_len.wrapping_add(glue_padding.len() as u64) / BLOCK_LEN as u64;

    let mut hasher = Sm3Hasher::resume_from_raw_state(original.to_words(), blocks, engine);
    hasher.update(suffix);

    Forgery {
        digest: hasher.finalize(),
        glue_padding,
    }
}

/// `H(m || pad(len(m)) || suffix)` from `H(m)` and `len(m)` alone.
pub fn length_extend(original: &Digest, original_len: u64, suffix: &[u8]) -> Digest {
    forge(original, original_len, suffix).digest
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hasher::hash_with;
    use proptest::prelude::*;

    #[test]
    fn glue_padding_lengths() {
        assert_eq!(glue_padding(0).len(), 64);
        assert_eq!(glue_padding(55).len(), 9);
        assert_eq!(glue_padding(56).len(), 72);
        assert_eq!(glue_padding(64).len(), 64);
        for len in 0..300u64 {
            assert_eq!((len + glue_padding(len).len() as u64) % 64, 0, "len {len}");
        }
    }

    #[test]
    fn glue_padding_layout() {
        let padding = glue_padding(3);
        assert_eq!(padding[0], 0x80);
        assert!(padding[1..padding.len() - 8].iter().all(|&b| b == 0));
        assert_eq!(&padding[padding.len() - 8..], &24u64.to_be_bytes());
    }

    #[test]
    fn secret_prefixed_message_is_extendable() {
        let secret = b"secret_key";
        let message = b"hello world";
        let suffix = b"attack_data";
        let mut original = secret.to_vec();
        original.extend_from_slice(message);

        let forgery = forge(&hash(&original), original.len() as u64, suffix);
        assert!(forgery.matches(&original, suffix));
        assert_eq!(
            forgery.digest,
            hash(&forgery.forged_message(&original, suffix))
        );
    }

    #[test]
    fn empty_suffix_extends_to_padded_message() {
        let original = b"abc";
        let forgery = forge(&hash(original), 3, b"");
        assert!(forgery.matches(original, b""));
    }

    #[test]
    fn reference_engine_forges_identically() {
        let original = b"abcd".repeat(16);
        let digest = hash(&original);
        let fast = forge(&digest, original.len() as u64, b"tail");
        let slow = forge_with(Engine::Reference, &digest, original.len() as u64, b"tail");
        assert_eq!(fast, slow);
        assert_eq!(
            slow.digest,
            hash_with(Engine::Reference, &slow.forged_message(&original, b"tail"))
        );
    }

    #[test]
    fn wrong_length_guess_does_not_match() {
        let original = b"secret_keyhello world";
        let suffix = b"attack_data";
        let wrong = forge(&hash(original), original.len() as u64 + 1, suffix);
        assert!(!wrong.matches(original, suffix));
    }

    #[test]
    fn extension_at_padding_boundaries() {
        for len in [0usize, 1, 55, 56, 63, 64, 65, 119, 120, 127, 128] {
            let original: Vec<u8> = (0..len).map(|i| i as u8).collect();
            for suffix in [&b""[..], b"x", &[0xa5; 64]] {
                let forgery = forge(&hash(&original), len as u64, suffix);
                assert_eq!((len + forgery.glue_padding.len()) % 64, 0, "len {len}");
                assert!(forgery.matches(&original, suffix), "len {len} suffix {}", suffix.len());
            }
        }
    }

    proptest! {
        #[test]
        fn extension_equals_hash_of_glued_message(
            secret in proptest::collection::vec(any::<u8>(), 0..80),
            message in proptest::collection::vec(any::<u8>(), 0..150),
            suffix in proptest::collection::vec(any::<u8>(), 0..150),
        ) {
            let mut original = secret;
            original.extend_from_slice(&message);
            let len = original.len() as u64;

            let extended = length_extend(&hash(&original), len, &suffix);

            let mut glued = original;
            glued.extend_from_slice(&glue_padding(len));
            glued.extend_from_slice(&suffix);
            prop_assert_eq!(extended, hash(&glued));
        }
    }
}
