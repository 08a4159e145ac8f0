// ============================================
// File: crates/ferrolink-fec/src/gf256.rs
// ============================================
//! # GF(2^8) Arithmetic
//!
//! ## Creation Reason
//! All Reed-Solomon math happens in the Galois field GF(2^8) with the
//! primitive polynomial x^8 + x^4 + x^3 + x^2 + 1 (0x11D). Precomputed
//! tables make every field operation a lookup.
//!
//! ## Main Functionality
//! - `GfTables`: exp/log/inverse tables plus the full 256x256 product table
//! - `add_mul`: the coder's hot loop, `dst[i] ^= c * src[i]`
//!
//! ## Table Layout
//! - `exp[0..510]`: `exp[i] = α^i`; doubled so `exp[log a + log b]` needs no
//!   modulo
//! - `log[0..256]`: discrete log; `log[0] = 255` is a sentinel
//! - `inverse[0..256]`: `inverse[x] = α^(255 - log x)`; `inverse[0] = 0`
//! - `mul[a][b]`: full product table, zero row/column included
//!
//! ## ⚠️ Important Note for Next Developer
//! - The tables are built once and shared immutably across threads
//! - The widened `add_mul` loop must produce bit-identical output to the
//!   scalar tail; both paths are exercised by the tests
//!
//! ## Last Modified
//! v0.1.0 - Initial field arithmetic

use std::sync::OnceLock;

// ============================================
// Constants
// ============================================

/// Primitive polynomial x^8 + x^4 + x^3 + x^2 + 1 (reduction mask after
/// dropping the x^8 term).
const POLY: u16 = 0x1D;

/// `log[0]` sentinel: zero has no discrete logarithm.
pub(crate) const LOG_ZERO: u8 = 255;

// ============================================
// GfTables
// ============================================

/// Precomputed GF(2^8) arithmetic tables.
///
/// Built once per process via [`GfTables::shared`] and safely shared across
/// threads; every field operation is a table lookup.
pub(crate) struct GfTables {
    /// `exp[i] = α^i`, doubled to avoid modular reduction.
    pub exp: [u8; 510],
    /// Discrete logarithm; `log[0]` holds the [`LOG_ZERO`] sentinel.
    pub log: [u8; 256],
    /// Multiplicative inverse; `inverse[0] = 0`.
    pub inverse: [u8; 256],
    /// Full product table `mul[a][b] = a * b`.
    pub mul: Box<[[u8; 256]; 256]>,
}

impl GfTables {
    /// Returns the process-wide table set.
    pub fn shared() -> &'static Self {
        static TABLES: OnceLock<GfTables> = OnceLock::new();
        TABLES.get_or_init(Self::build)
    }

    fn build() -> Self {
        let mut exp = [0u8; 510];
        let mut log = [LOG_ZERO; 256];

        let mut value: u16 = 1;
        for i in 0..255 {
            exp[i] = value as u8;
            exp[i + 255] = value as u8;
            log[value as usize] = i as u8;
            value <<= 1;
            if value & 0x100 != 0 {
                value ^= 0x100 | POLY;
            }
        }

        let mut inverse = [0u8; 256];
        for x in 1..=255usize {
            inverse[x] = exp[255 - log[x] as usize];
        }

        let mut mul = Box::new([[0u8; 256]; 256]);
        for a in 1..=255usize {
            let log_a = log[a] as usize;
            for b in 1..=255usize {
                mul[a][b] = exp[log_a + log[b] as usize];
            }
        }

        Self {
            exp,
            log,
            inverse,
            mul,
        }
    }

    /// Field product `a * b`.
    #[inline]
    pub fn mul(&self, a: u8, b: u8) -> u8 {
        self.mul[a as usize][b as usize]
    }

    /// Field quotient `a / b`.
    ///
    /// # Panics
    /// Debug-asserts that `b` is nonzero; zero has no inverse.
    #[inline]
    pub fn div(&self, a: u8, b: u8) -> u8 {
        debug_assert_ne!(b, 0, "division by zero in GF(2^8)");
        self.mul(a, self.inverse[b as usize])
    }
}

// ============================================
// Bulk multiply-accumulate
// ============================================

/// `dst[i] ^= c * src[i]` over the whole slice.
///
/// `c == 0` is a no-op and `c == 1` degenerates to a plain XOR. The main
/// loop batches eight table lookups and folds them into `dst` through a
/// single `u64` XOR; the remainder is handled scalar.
///
/// # Panics
/// Panics if the slice lengths differ.
pub(crate) fn add_mul(tables: &GfTables, src: &[u8], dst: &mut [u8], c: u8) {
    assert_eq!(src.len(), dst.len(), "slice length mismatch");
    if c == 0 {
        return;
    }
    let row = &tables.mul[c as usize];

    let mut dst_chunks = dst.chunks_exact_mut(8);
    let mut src_chunks = src.chunks_exact(8);
    for (d, s) in dst_chunks.by_ref().zip(src_chunks.by_ref()) {
        let looked_up = [
            row[s[0] as usize],
            row[s[1] as usize],
            row[s[2] as usize],
            row[s[3] as usize],
            row[s[4] as usize],
            row[s[5] as usize],
            row[s[6] as usize],
            row[s[7] as usize],
        ];
        let d_arr: [u8; 8] = <[u8; 8]>::try_from(&d[..]).expect("chunk is eight bytes");
        let folded = u64::from_ne_bytes(d_arr) ^ u64::from_ne_bytes(looked_up);
        d.copy_from_slice(&folded.to_ne_bytes());
    }
    for (d, s) in dst_chunks
        .into_remainder()
        .iter_mut()
        .zip(src_chunks.remainder())
    {
        *d ^= row[*s as usize];
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exp_log_roundtrip() {
        let t = GfTables::shared();
        for a in 1u16..=255 {
            let log_a = t.log[a as usize];
            assert_ne!(log_a, LOG_ZERO, "log defined for nonzero {a}");
            assert_eq!(t.exp[log_a as usize], a as u8, "roundtrip failed for {a}");
        }
        assert_eq!(t.log[0], LOG_ZERO);
    }

    #[test]
    fn test_exp_table_is_doubled() {
        let t = GfTables::shared();
        for i in 0..255 {
            assert_eq!(t.exp[i], t.exp[i + 255], "mirror mismatch at {i}");
        }
        assert_eq!(t.exp[0], 1);
    }

    #[test]
    fn test_exp_generates_all_nonzero_elements() {
        let t = GfTables::shared();
        let mut seen = [false; 256];
        for &v in &t.exp[..255] {
            assert!(!seen[v as usize], "duplicate element {v}");
            seen[v as usize] = true;
        }
        assert!(!seen[0], "zero is not generated");
    }

    #[test]
    fn test_inverse_table() {
        let t = GfTables::shared();
        assert_eq!(t.inverse[0], 0);
        assert_eq!(t.inverse[1], 1);
        for a in 1u16..=255 {
            let inv = t.inverse[a as usize];
            assert_eq!(t.mul(a as u8, inv), 1, "a * inv(a) != 1 for {a}");
        }
    }

    #[test]
    fn test_mul_table_matches_log_exp() {
        let t = GfTables::shared();
        for a in (0u16..=255).step_by(5) {
            for b in (0u16..=255).step_by(7) {
                let expected = if a == 0 || b == 0 {
                    0
                } else {
                    t.exp[t.log[a as usize] as usize + t.log[b as usize] as usize]
                };
                assert_eq!(t.mul(a as u8, b as u8), expected, "mul({a}, {b})");
            }
        }
    }

    #[test]
    fn test_mul_is_commutative_and_distributive() {
        let t = GfTables::shared();
        let samples = [(3u8, 7u8, 11u8), (255, 128, 1), (37, 42, 199), (2, 141, 90)];
        for (a, b, c) in samples {
            assert_eq!(t.mul(a, b), t.mul(b, a));
            assert_eq!(t.mul(a, b ^ c), t.mul(a, b) ^ t.mul(a, c));
        }
    }

    #[test]
    fn test_div_inverts_mul() {
        let t = GfTables::shared();
        for a in [1u8, 2, 37, 100, 255] {
            for b in [1u8, 3, 77, 254] {
                assert_eq!(t.div(t.mul(a, b), b), a);
            }
        }
    }

    #[test]
    fn test_add_mul_zero_coefficient_is_noop() {
        let t = GfTables::shared();
        let src = [0xFFu8; 20];
        let mut dst = [0x5Au8; 20];
        add_mul(t, &src, &mut dst, 0);
        assert_eq!(dst, [0x5Au8; 20]);
    }

    #[test]
    fn test_add_mul_one_coefficient_is_xor() {
        let t = GfTables::shared();
        let src: Vec<u8> = (0u8..20).collect();
        let mut dst = vec![0xA5u8; 20];
        let expected: Vec<u8> = dst.iter().zip(&src).map(|(d, s)| d ^ s).collect();
        add_mul(t, &src, &mut dst, 1);
        assert_eq!(dst, expected);
    }

    #[test]
    fn test_add_mul_matches_scalar_reference() {
        let t = GfTables::shared();
        // 71 bytes: exercises both the widened loop and the scalar tail.
        let src: Vec<u8> = (0..71).map(|i| (i as u8).wrapping_mul(37)).collect();
        let mut dst: Vec<u8> = (0..71).map(|i| (i as u8).wrapping_mul(91)).collect();
        let c = 0x8E;

        let expected: Vec<u8> = dst
            .iter()
            .zip(&src)
            .map(|(d, s)| d ^ t.mul(c, *s))
            .collect();
        add_mul(t, &src, &mut dst, c);
        assert_eq!(dst, expected);
    }

    #[test]
    fn test_add_mul_accumulates() {
        let t = GfTables::shared();
        let src = [9u8; 16];
        let mut dst = [0u8; 16];
        add_mul(t, &src, &mut dst, 5);
        let once = dst;
        add_mul(t, &src, &mut dst, 5);
        // Adding the same product twice cancels in characteristic 2.
        assert_eq!(dst, [0u8; 16]);
        assert_ne!(once, [0u8; 16]);
    }
}
