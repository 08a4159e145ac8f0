// ============================================
// File: crates/ferrolink-fec/src/matrix.rs
// ============================================
//! # Encode & Decode Matrices
//!
//! ## Creation Reason
//! Builds the systematic encode matrix and inverts submatrices during
//! decoding. Matrices are dense, row-major `Vec<u8>` over GF(2^8).
//!
//! ## Encode Matrix Construction
//! 1. Build a Vandermonde-style `n x k` matrix: row 0 is `[1, 0, .., 0]`
//!    (the point 0), row `r > 0` evaluates the point `α^(r-1)` at powers
//!    `0..k`
//! 2. Invert the top `k x k` block with the specialized Vandermonde
//!    inversion (synthetic division over the distinct points)
//! 3. Multiply the bottom `(n-k) x k` block by that inverse
//! 4. Overwrite the top block with the identity
//!
//! The result encodes the first `k` output rows as the data itself and the
//! remaining rows as parity, while keeping every `k x k` submatrix
//! invertible.
//!
//! ## ⚠️ Important Note for Next Developer
//! - `invert_vandermonde` relies on the construction's distinct evaluation
//!   points; it is not a general-purpose inversion
//! - `invert_matrix` works on arbitrary matrices and reports
//!   `SingularMatrix` when a pivot column is empty
//!
//! ## Last Modified
//! v0.1.0 - Initial matrix routines

use crate::error::{FecError, Result};
use crate::gf256::GfTables;

// ============================================
// Limits
// ============================================

/// Upper bound on both `k` and `n`: the field has 255 usable evaluation
/// points plus the zero row.
pub(crate) const MAX_SYMBOLS: usize = 256;

// ============================================
// Encode Matrix
// ============================================

/// Builds the systematic `n x k` encode matrix.
///
/// # Errors
/// Returns `InvalidParameters` unless `1 <= k <= n <= 256`.
pub(crate) fn create_encode_matrix(
    tables: &GfTables,
    k: usize,
    n: usize,
) -> Result<Vec<u8>> {
    if k == 0 || k > n || n > MAX_SYMBOLS {
        return Err(FecError::invalid_parameters(format!(
            "require 1 <= k <= n <= {MAX_SYMBOLS}, got k={k}, n={n}"
        )));
    }

    // Vandermonde-style matrix over the points 0, α^0, α^1, ...
    let mut vandermonde = vec![0u8; n * k];
    vandermonde[0] = 1;
    for row in 1..n {
        for col in 0..k {
            vandermonde[row * k + col] = tables.exp[(row - 1) * col % 255];
        }
    }

    // Invert the top block, then project the parity rows through it so the
    // systematic rows come out as the identity.
    let mut top_inverse = vandermonde[..k * k].to_vec();
    invert_vandermonde(tables, &mut top_inverse, k);

    let mut encode = vec![0u8; n * k];
    for row in 0..k {
        encode[row * k + row] = 1;
    }
    for row in k..n {
        for col in 0..k {
            let mut acc = 0u8;
            for j in 0..k {
                acc ^= tables.mul(vandermonde[row * k + j], top_inverse[j * k + col]);
            }
            encode[row * k + col] = acc;
        }
    }
    Ok(encode)
}

// ============================================
// Vandermonde Inversion
// ============================================

/// Inverts a `k x k` Vandermonde matrix in place.
///
/// The matrix must have the shape produced by [`create_encode_matrix`]:
/// row `j` holds the powers of a point `p_j`, all points distinct. Works by
/// building the master polynomial `P(x) = Π (x - p_i)` once, then deriving
/// each column of the inverse from the quotient `P(x) / (x - p_row)` via
/// synthetic division.
pub(crate) fn invert_vandermonde(tables: &GfTables, matrix: &mut [u8], k: usize) {
    debug_assert_eq!(matrix.len(), k * k);
    if k == 1 {
        // Degenerate case: the matrix is [p^0] = [1], its own inverse.
        return;
    }

    // The evaluation points sit in column 1.
    let points: Vec<u8> = (0..k).map(|j| matrix[j * k + 1]).collect();

    // Coefficients of P(x) = Π (x - p_i); the leading coefficient of x^k
    // is an implicit 1. Subtraction equals addition in GF(2^8).
    let mut master = vec![0u8; k];
    master[k - 1] = points[0];
    for i in 1..k {
        let p_i = points[i];
        for j in (k - i)..(k - 1) {
            master[j] ^= tables.mul(p_i, master[j + 1]);
        }
        master[k - 1] ^= p_i;
    }

    let mut quotient = vec![0u8; k];
    for row in 0..k {
        let point = points[row];
        // Synthetic division of P(x) by (x - point); `denominator`
        // accumulates Π_{j != row} (p_row - p_j) along the way.
        let mut denominator = 1u8;
        quotient[k - 1] = 1;
        for i in (0..k - 1).rev() {
            quotient[i] = master[i + 1] ^ tables.mul(point, quotient[i + 1]);
            denominator = tables.mul(point, denominator) ^ quotient[i];
        }
        let scale = tables.inverse[denominator as usize];
        for col in 0..k {
            matrix[col * k + row] = tables.mul(scale, quotient[col]);
        }
    }
}

// ============================================
// General Inversion (Gauss-Jordan)
// ============================================

/// Inverts a `k x k` matrix in place via Gauss-Jordan elimination over an
/// augmented identity.
///
/// # Errors
/// Returns `SingularMatrix` when a pivot column contains no nonzero entry.
pub(crate) fn invert_matrix(tables: &GfTables, matrix: &mut [u8], k: usize) -> Result<()> {
    debug_assert_eq!(matrix.len(), k * k);
    let width = 2 * k;
    let mut augmented = vec![0u8; k * width];
    for row in 0..k {
        augmented[row * width..row * width + k]
            .copy_from_slice(&matrix[row * k..(row + 1) * k]);
        augmented[row * width + k + row] = 1;
    }

    for col in 0..k {
        // Pivot search down the column.
        let pivot_row = (col..k)
            .find(|&row| augmented[row * width + col] != 0)
            .ok_or(FecError::SingularMatrix { column: col })?;
        if pivot_row != col {
            for x in 0..width {
                augmented.swap(pivot_row * width + x, col * width + x);
            }
        }

        // Normalize the pivot row.
        let pivot = augmented[col * width + col];
        if pivot != 1 {
            let inverse = tables.inverse[pivot as usize];
            for x in col..width {
                augmented[col * width + x] = tables.mul(augmented[col * width + x], inverse);
            }
        }

        // Eliminate the column from every other row.
        for row in 0..k {
            if row == col {
                continue;
            }
            let factor = augmented[row * width + col];
            if factor == 0 {
                continue;
            }
            for x in col..width {
                let value = tables.mul(factor, augmented[col * width + x]);
                augmented[row * width + x] ^= value;
            }
        }
    }

    for row in 0..k {
        matrix[row * k..(row + 1) * k]
            .copy_from_slice(&augmented[row * width + k..row * width + width]);
    }
    Ok(())
}

// ============================================
// Decode Matrix
// ============================================

/// Builds the inverted `k x k` decode matrix for the received positions in
/// `index`.
///
/// # Errors
/// Returns `SingularMatrix` if the selected rows are linearly dependent
/// (e.g. a position was listed twice).
pub(crate) fn create_decode_matrix(
    tables: &GfTables,
    encode: &[u8],
    index: &[usize],
    k: usize,
) -> Result<Vec<u8>> {
    let mut decode = vec![0u8; k * k];
    for (row, &position) in index.iter().enumerate() {
        decode[row * k..(row + 1) * k]
            .copy_from_slice(&encode[position * k..(position + 1) * k]);
    }
    invert_matrix(tables, &mut decode, k)?;
    Ok(decode)
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;

    fn multiply(tables: &GfTables, a: &[u8], b: &[u8], k: usize) -> Vec<u8> {
        let mut out = vec![0u8; k * k];
        for row in 0..k {
            for col in 0..k {
                let mut acc = 0u8;
                for j in 0..k {
                    acc ^= tables.mul(a[row * k + j], b[j * k + col]);
                }
                out[row * k + col] = acc;
            }
        }
        out
    }

    fn identity(k: usize) -> Vec<u8> {
        let mut out = vec![0u8; k * k];
        for i in 0..k {
            out[i * k + i] = 1;
        }
        out
    }

    fn vandermonde_top(tables: &GfTables, k: usize) -> Vec<u8> {
        let mut top = vec![0u8; k * k];
        top[0] = 1;
        for row in 1..k {
            for col in 0..k {
                top[row * k + col] = tables.exp[(row - 1) * col % 255];
            }
        }
        top
    }

    #[test]
    fn test_parameter_validation() {
        let t = GfTables::shared();
        assert!(create_encode_matrix(t, 0, 4).is_err());
        assert!(create_encode_matrix(t, 5, 4).is_err());
        assert!(create_encode_matrix(t, 4, 257).is_err());
        assert!(create_encode_matrix(t, 1, 1).is_ok());
        assert!(create_encode_matrix(t, 16, 256).is_ok());
    }

    #[test]
    fn test_encode_matrix_top_is_identity() {
        let t = GfTables::shared();
        for (k, n) in [(1, 3), (4, 6), (10, 14)] {
            let encode = create_encode_matrix(t, k, n).unwrap();
            assert_eq!(&encode[..k * k], identity(k).as_slice(), "k={k}, n={n}");
        }
    }

    #[test]
    fn test_vandermonde_inversion_produces_true_inverse() {
        let t = GfTables::shared();
        for k in [2usize, 3, 5, 8, 17] {
            let original = vandermonde_top(t, k);
            let mut inverted = original.clone();
            invert_vandermonde(t, &mut inverted, k);
            assert_eq!(
                multiply(t, &original, &inverted, k),
                identity(k),
                "inverse check failed for k={k}"
            );
        }
    }

    #[test]
    fn test_general_inversion_produces_true_inverse() {
        let t = GfTables::shared();
        // Parity rows of an encode matrix form invertible submatrices.
        let k = 5;
        let encode = create_encode_matrix(t, k, 2 * k).unwrap();
        let original: Vec<u8> = encode[k * k..2 * k * k].to_vec();
        let mut inverted = original.clone();
        invert_matrix(t, &mut inverted, k).unwrap();
        assert_eq!(multiply(t, &original, &inverted, k), identity(k));
    }

    #[test]
    fn test_inversion_of_identity_is_identity() {
        let t = GfTables::shared();
        let mut m = identity(7);
        invert_matrix(t, &mut m, 7).unwrap();
        assert_eq!(m, identity(7));
    }

    #[test]
    fn test_singular_matrix_is_detected() {
        let t = GfTables::shared();
        // Zero row.
        let mut m = identity(3);
        m[3..6].fill(0);
        assert!(matches!(
            invert_matrix(t, &mut m, 3),
            Err(FecError::SingularMatrix { .. })
        ));

        // Duplicate rows.
        let k = 4;
        let encode = create_encode_matrix(t, k, k + 2).unwrap();
        let decode = create_decode_matrix(t, &encode, &[4, 4, 1, 2], k);
        assert!(matches!(decode, Err(FecError::SingularMatrix { .. })));
    }

    #[test]
    fn test_every_k_subset_of_rows_is_invertible() {
        let t = GfTables::shared();
        let (k, n) = (3, 6);
        let encode = create_encode_matrix(t, k, n).unwrap();
        for a in 0..n {
            for b in (a + 1)..n {
                for c in (b + 1)..n {
                    let decode = create_decode_matrix(t, &encode, &[a, b, c], k);
                    assert!(decode.is_ok(), "subset ({a}, {b}, {c}) not invertible");
                }
            }
        }
    }

    #[test]
    fn test_decode_matrix_restores_data_rows() {
        let t = GfTables::shared();
        let k = 4;
        let encode = create_encode_matrix(t, k, 6).unwrap();
        // All-systematic selection: the decode matrix must be the identity.
        let decode = create_decode_matrix(t, &encode, &[0, 1, 2, 3], k).unwrap();
        assert_eq!(decode, identity(k));
    }
}
