//! The SM3 compression function.
//!
//! Two implementations live here. [`compress_reference`] is a literal
//! rendering of the standard and is kept as the oracle. [`compress_optimized`]
//! unrolls message expansion, splits the round loop at the constant switch,
//! reads pre-rotated round constants from a compile-time table and renames
//! registers across groups of four rounds instead of shuffling them. The two
//! must agree on every (state, block) pair.

use serde::{Deserialize, Serialize};

/// Size of one compression block in bytes.
pub const BLOCK_LEN: usize = 64;

/// SM3 initial chaining value.
pub const IV: [u32; 8] = [
    0x7380166f, 0x4914b2b9, 0x172442d7, 0xda8a0600, 0xa96f30bc, 0x163138aa, 0xe38dee4d,
    0xb0fb0e4e,
];

/// Round constant for rounds 0..16.
const T_LOW: u32 = 0x79cc4519;
/// Round constant for rounds 16..64.
const T_HIGH: u32 = 0x7a879d8a;

/// `T_j <<< (j mod 32)` for every round, folded at compile time.
const T_ROTATED: [u32; 64] = rotated_constants();

const fn rotated_constants() -> [u32; 64] {
    let mut table = [0u32; 64];
    let mut j = 0;
    while j < 64 {
        let base = if j < 16 { T_LOW } else { T_HIGH };
        table[j] = base.rotate_left((j % 32) as u32);
        j += 1;
    }
    table
}

/// Which compression implementation a hasher drives.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Engine {
    /// Straight-line transcription of the standard.
    Reference,
    /// Unrolled, constant-folded variant. Byte-identical output.
    #[default]
    Optimized,
}

impl Engine {
    /// Compress one block into `state` with this engine.
    #[inline]
    pub fn compress(self, state: &mut [u32; 8], block: &[u8; BLOCK_LEN]) {
        match self {
            Engine::Reference => compress_reference(state, block),
            Engine::Optimized => compress_optimized(state, block),
        }
    }

    /// Lowercase name, as used in configuration files.
    pub fn name(self) -> &'static str {
        match self {
            Engine::Reference => "reference",
            Engine::Optimized => "optimized",
        }
    }
}

#[inline(always)]
fn p0(x: u32) -> u32 {
    x ^ x.rotate_left(9) ^ x.rotate_left(17)
}

#[inline(always)]
fn p1(x: u32) -> u32 {
    x ^ x.rotate_left(15) ^ x.rotate_left(23)
}

#[inline(always)]
fn ff(j: usize, x: u32, y: u32, z: u32) -> u32 {
    if j < 16 {
        x ^ y ^ z
    } else {
        (x & y) | (x & z) | (y & z)
    }
}

#[inline(always)]
fn gg(j: usize, x: u32, y: u32, z: u32) -> u32 {
    if j < 16 {
        x ^ y ^ z
    } else {
        (x & y) | (!x & z)
    }
}

#[inline(always)]
fn load_block(block: &[u8; BLOCK_LEN], w: &mut [u32; 68]) {
    for (word, b) in w.iter_mut().zip(block.chunks_exact(4)) {
        *word = u32::from_be_bytes([b[0], b[1], b[2], b[3]]);
    }
}

#[inline(always)]
fn expand(w: &[u32; 68], j: usize) -> u32 {
    p1(w[j - 16] ^ w[j - 9] ^ w[j - 3].rotate_left(15)) ^ w[j - 13].rotate_left(7) ^ w[j - 6]
}

/// Reference compression: `state = CF(state, block)`.
pub fn compress_reference(state: &mut [u32; 8], block: &[u8; BLOCK_LEN]) {
    let mut w = [0u32; 68];
    load_block(block, &mut w);
    for j in 16..68 {
        w[j] = expand(&w, j);
    }
    let mut w1 = [0u32; 64];
    for j in 0..64 {
        w1[j] = w[j] ^ w[j + 4];
    }

    let [mut a, mut b, mut c, mut d, mut e, mut f, mut g, mut h] = *state;

    for j in 0..64 {
        let t = if j < 16 { T_LOW } else { T_HIGH };
        let a12 = a.rotate_left(12);
        let ss1 = a12
            .wrapping_add(e)
            .wrapping_add(t.rotate_left((j % 32) as u32))
            .rotate_left(7);
        let ss2 = ss1 ^ a12;
        let tt1 = ff(j, a, b, c)
            .wrapping_add(d)
            .wrapping_add(ss2)
            .wrapping_add(w1[j]);
        let tt2 = gg(j, e, f, g)
            .wrapping_add(h)
            .wrapping_add(ss1)
            .wrapping_add(w[j]);
        d = c;
        c = b.rotate_left(9);
        b = a;
        a = tt1;
        h = g;
        g = f.rotate_left(19);
        f = e;
        e = p0(tt2);
    }

    for (s, r) in state.iter_mut().zip([a, b, c, d, e, f, g, h]) {
        *s ^= r;
    }
}

/// One SM3 round without moving registers.
///
/// The new `A` lands in `$d` and the new `E` in `$h`; `$b` and `$f` are
/// rotated in place. The caller passes the registers rotated by one position
/// for the next round, so after four rounds the names line up again.
macro_rules! round {
    ($ff:ident, $gg:ident, $a:ident, $b:ident, $c:ident, $d:ident,
     $e:ident, $f:ident, $g:ident, $h:ident, $w:expr, $j:expr) => {{
        let a12 = $a.rotate_left(12);
        let ss1 = a12.wrapping_add($e).wrapping_add(T_ROTATED[$j]).rotate_left(7);
        let ss2 = ss1 ^ a12;
        $d = $ff($a, $b, $c)
            .wrapping_add($d)
            .wrapping_add(ss2)
            .wrapping_add($w[$j] ^ $w[$j + 4]);
        $h = p0($gg($e, $f, $g)
            .wrapping_add($h)
            .wrapping_add(ss1)
            .wrapping_add($w[$j]));
        $b = $b.rotate_left(9);
        $f = $f.rotate_left(19);
    }};
}

#[inline(always)]
fn xor3(x: u32, y: u32, z: u32) -> u32 {
    x ^ y ^ z
}

#[inline(always)]
fn ff_high(x: u32, y: u32, z: u32) -> u32 {
    (x & y) | (x & z) | (y & z)
}

#[inline(always)]
fn gg_high(x: u32, y: u32, z: u32) -> u32 {
    (x & y) | (!x & z)
}

/// Optimized compression. Produces exactly the output of [`compress_reference`].
pub fn compress_optimized(state: &mut [u32; 8], block: &[u8; BLOCK_LEN]) {
    let mut w = [0u32; 68];
    load_block(block, &mut w);

    let mut j = 16;
    while j < 68 {
        w[j] = expand(&w, j);
        w[j + 1] = expand(&w, j + 1);
        w[j + 2] = expand(&w, j + 2);
        w[j + 3] = expand(&w, j + 3);
        j += 4;
    }

    let [mut a, mut b, mut c, mut d, mut e, mut f, mut g, mut h] = *state;

    let mut j = 0;
    while j < 16 {
        round!(xor3, xor3, a, b, c, d, e, f, g, h, w, j);
        round!(xor3, xor3, d, a, b, c, h, e, f, g, w, j + 1);
        round!(xor3, xor3, c, d, a, b, g, h, e, f, w, j + 2);
        round!(xor3, xor3, b, c, d, a, f, g, h, e, w, j + 3);
        j += 4;
    }
    while j < 64 {
        round!(ff_high, gg_high, a, b, c, d, e, f, g, h, w, j);
        round!(ff_high, gg_high, d, a, b, c, h, e, f, g, w, j + 1);
        round!(ff_high, gg_high, c, d, a, b, g, h, e, f, w, j + 2);
        round!(ff_high, gg_high, b, c, d, a, f, g, h, e, w, j + 3);
        j += 4;
    }

    state[0] ^= a;
    state[1] ^= b;
    state[2] ^= c;
    state[3] ^= d;
    state[4] ^= e;
    state[5] ^= f;
    state[6] ^= g;
    state[7] ^= h;
}
