use std::io;

use sm3_types::Digest;
use tracing::debug;

use crate::compress::{Engine, BLOCK_LEN, IV};

/// Offset of the 64-bit length field inside the final block.
const LENGTH_OFFSET: usize = BLOCK_LEN - 8;

/// Running state of an SM3 computation.
///
/// Holds the chaining words, the number of whole blocks already compressed and
/// up to 63 bytes that have not yet filled a block. Between calls the pending
/// count is always strictly less than [`BLOCK_LEN`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HashState {
    words: [u32; 8],
    blocks: u64,
    buffer: [u8; BLOCK_LEN],
    pending: usize,
}

impl HashState {
    fn initial() -> Self {
        Self::from_raw(IV, 0)
    }

    fn from_raw(words: [u32; 8], blocks: u64) -> Self {
        Self {
            words,
            blocks,
            buffer: [0u8; BLOCK_LEN],
            pending: 0,
        }
    }

    /// Current chaining words.
    pub fn words(&self) -> &[u32; 8] {
        &self.words
    }

    /// Number of 64-byte blocks compressed so far.
    pub fn block_count(&self) -> u64 {
        self.blocks
    }

    /// Bytes buffered but not yet compressed.
    pub fn pending(&self) -> &[u8] {
        &self.buffer[..self.pending]
    }

    /// Total message length absorbed so far, in bits, modulo 2^64.
    pub fn bit_length(&self) -> u64 {
        self.blocks
            .wrapping_mul(BLOCK_LEN as u64 * 8)
            .wrapping_add(self.pending as u64 * 8)
    }
}

/// Lifecycle position of a live hasher.
///
/// There is no `Finalized` variant: [`Sm3Hasher::finalize`] consumes the
/// hasher, so a finished computation cannot be observed or updated again.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    /// Freshly initialized or resumed; nothing absorbed yet.
    Ready,
    /// At least one `update` call has been made.
    Accumulating,
}

/// Streaming SM3 hasher.
///
/// Input may be fed in chunks of any size; the digest depends only on the
/// concatenation of all chunks.
///
/// ```
/// use sm3_crypto::{hash, Sm3Hasher};
///
/// let mut hasher = Sm3Hasher::new();
/// hasher.update(b"a");
/// hasher.update(b"bc");
/// assert_eq!(hasher.finalize(), hash(b"abc"));
/// ```
#[derive(Clone, Debug)]
pub struct Sm3Hasher {
    state: HashState,
    engine: Engine,
    phase: Phase,
}

impl Sm3Hasher {
    /// A hasher at the standard IV using the optimized engine.
    pub fn new() -> Self {
        Self::with_engine(Engine::default())
    }

    /// A hasher at the standard IV using the given engine.
    pub fn with_engine(engine: Engine) -> Self {
        Self {
            state: HashState::initial(),
            engine,
            phase: Phase::Ready,
        }
    }

    /// Resume hashing from raw chaining words and a processed block count.
    ///
    /// This bypasses the IV and is what makes length extension possible: the
    /// words of any published digest are a valid chaining state. It exists for
    /// [`crate::extension`] and for tests; normal hashing goes through
    /// [`Sm3Hasher::new`].
    pub fn resume_from_raw_state(words: [u32; 8], blocks: u64, engine: Engine) -> Self {
        debug!(blocks, engine = engine.name(), "resuming SM3 from raw state");
        Self {
            state: HashState::from_raw(words, blocks),
            engine,
            phase: Phase::Ready,
        }
    }

    /// Compression engine in use.
    pub fn engine(&self) -> Engine {
        self.engine
    }

    /// Current lifecycle phase.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Read-only view of the running state.
    pub fn state(&self) -> &HashState {
        &self.state
    }

    /// Absorb `data`.
    pub fn update(&mut self, data: &[u8]) {
        self.phase = Phase::Accumulating;
        let mut input = data;
        let state = &mut self.state;

        if state.pending > 0 {
            let room = BLOCK_LEN - state.pending;
            if input.len() < room {
                state.buffer[state.pending..state.pending + input.len()].copy_from_slice(input);
                state.pending += input.len();
                return;
            }
            let (head, rest) = input.split_at(room);
            state.buffer[state.pending..].copy_from_slice(head);
            self.engine.compress(&mut state.words, &state.buffer);
            state.blocks = state.blocks.wrapping_add(1);
            state.pending = 0;
            input = rest;
        }

        let mut blocks = input.chunks_exact(BLOCK_LEN);
        for block in &mut blocks {
            let mut full = [0u8; BLOCK_LEN];
            full.copy_from_slice(block);
            self.engine.compress(&mut state.words, &full);
            state.blocks = state.blocks.wrapping_add(1);
        }

        let tail = blocks.remainder();
        state.buffer[..tail.len()].copy_from_slice(tail);
        state.pending = tail.len();
    }

    /// Apply Merkle–Damgård padding and return the digest.
    pub fn finalize(self) -> Digest {
        let Self {
            mut state, engine, ..
        } = self;
        let bits = state.bit_length();
        let mut pos = state.pending;

        state.buffer[pos] = 0x80;
        pos += 1;
        if pos > LENGTH_OFFSET {
            state.buffer[pos..].fill(0);
            engine.compress(&mut state.words, &state.buffer);
            pos = 0;
        }
        state.buffer[pos..LENGTH_OFFSET].fill(0);
        state.buffer[LENGTH_OFFSET..].copy_from_slice(&bits.to_be_bytes());
        engine.compress(&mut state.words, &state.buffer);

        Digest::from_words(state.words)
    }
}

impl Default for Sm3Hasher {
    fn default() -> Self {
        Self::new()
    }
}

impl io::Write for Sm3Hasher {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.update(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// One-shot SM3 of `data` with the optimized engine.
pub fn hash(data: &[u8]) -> Digest {
    hash_with(Engine::Optimized, data)
}

/// One-shot SM3 of `data` with a chosen engine.
pub fn hash_with(engine: Engine, data: &[u8]) -> Digest {
    let mut hasher = Sm3Hasher::with_engine(engine);
    hasher.update(data);
    hasher.finalize()
}
