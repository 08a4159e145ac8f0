// ============================================
// File: crates/ferrolink-fec/src/coder.rs
// ============================================
//! # Reed-Solomon Coder
//!
//! ## Creation Reason
//! The user-facing erasure coder: turns `k` data packets into up to `n`
//! coded packets, and reconstructs the data from any `k` survivors.
//!
//! ## Main Functionality
//! - `ReedSolomonCoder`: immutable coder configured with `(k, n)`
//! - `encode`: fills repair packets for requested output positions
//! - `decode`: restores the data packets in place from any `k` positions
//!
//! ## Parallelism
//! Output rows are independent, so both operations split their row set
//! into contiguous chunks and process them on scoped worker threads,
//! bounded by the configured `concurrency`. Cancellation is polled at
//! every row and every inner column step.
//!
//! ## Decode Shuffle
//! Received systematic packets are swapped into their natural slots first;
//! afterwards only parity positions remain to be solved, and the matrix
//! solve writes exactly the missing rows. A swap that would displace a
//! packet already sitting in its own slot means the caller listed a
//! position twice.
//!
//! ## ⚠️ Important Note for Next Developer
//! - Scratch rows come from the byte pool and return on every exit path,
//!   including cancellation, via their drop guards
//! - `decode` mutates `packets`/`index` progressively; on error the caller
//!   must treat the arrays as scrambled
//!
//! ## Last Modified
//! v0.1.0 - Initial coder

use std::sync::Arc;

use tracing::trace;

use ferrolink_common::cancel::CancelToken;
use ferrolink_common::pool::{BytePool, PoolBlock};

use crate::error::{FecError, Result};
use crate::gf256::{add_mul, GfTables};
use crate::matrix::{create_decode_matrix, create_encode_matrix};

// ============================================
// Scratch Buffers
// ============================================

/// Pool-backed scratch row; falls back to the heap when the pool's blocks
/// are too small for the packet length.
enum Scratch {
    Pooled { block: PoolBlock, len: usize },
    Heap(Vec<u8>),
}

impl Scratch {
    fn new(pool: &Arc<BytePool>, len: usize) -> Self {
        if pool.block_size() >= len {
            // Rentals come back zeroed, ready for accumulation.
            Self::Pooled {
                block: pool.rent(),
                len,
            }
        } else {
            Self::Heap(vec![0u8; len])
        }
    }

    fn as_slice(&self) -> &[u8] {
        match self {
            Self::Pooled { block, len } => &block[..*len],
            Self::Heap(buf) => buf,
        }
    }

    fn as_mut_slice(&mut self) -> &mut [u8] {
        match self {
            Self::Pooled { block, len } => &mut block[..*len],
            Self::Heap(buf) => buf,
        }
    }
}

// ============================================
// ReedSolomonCoder
// ============================================

/// Systematic Reed-Solomon erasure coder over GF(2^8).
///
/// Immutable after construction; the encode matrix and the field tables are
/// shared freely across threads.
///
/// # Example
/// ```
/// use ferrolink_common::CancelToken;
/// use ferrolink_fec::ReedSolomonCoder;
///
/// let coder = ReedSolomonCoder::new(2, 3).unwrap();
/// let sources: [&[u8]; 2] = [&[1, 2, 3, 4], &[5, 6, 7, 8]];
/// let mut repairs = vec![vec![0u8; 4]];
/// coder
///     .encode(&sources, &[2], &mut repairs, &CancelToken::new())
///     .unwrap();
/// ```
pub struct ReedSolomonCoder {
    k: usize,
    n: usize,
    concurrency: usize,
    encode_matrix: Vec<u8>,
    tables: &'static GfTables,
    pool: Arc<BytePool>,
}

impl ReedSolomonCoder {
    /// Creates a coder for `k` data packets and `n` total positions.
    ///
    /// # Errors
    /// Returns `InvalidParameters` unless `1 <= k <= n <= 256`.
    pub fn new(k: usize, n: usize) -> Result<Self> {
        let tables = GfTables::shared();
        let encode_matrix = create_encode_matrix(tables, k, n)?;
        Ok(Self {
            k,
            n,
            concurrency: 1,
            encode_matrix,
            tables,
            pool: Arc::new(BytePool::new(64 * 1024)),
        })
    }

    /// Sets the worker bound for encode/decode row processing.
    ///
    /// # Errors
    /// Returns `InvalidParameters` if `concurrency` is zero.
    pub fn with_concurrency(mut self, concurrency: usize) -> Result<Self> {
        if concurrency == 0 {
            return Err(FecError::invalid_parameters("concurrency must be >= 1"));
        }
        self.concurrency = concurrency;
        Ok(self)
    }

    /// Replaces the scratch-buffer pool.
    #[must_use]
    pub fn with_pool(mut self, pool: Arc<BytePool>) -> Self {
        self.pool = pool;
        self
    }

    /// Number of data packets per block.
    #[must_use]
    pub const fn k(&self) -> usize {
        self.k
    }

    /// Total number of coded positions per block.
    #[must_use]
    pub const fn n(&self) -> usize {
        self.n
    }

    // ========================================
    // Encode
    // ========================================

    /// Fills `repairs[row]` with the coded packet for position
    /// `index[row]`.
    ///
    /// Positions below `k` copy the corresponding source verbatim
    /// (systematic); positions `k..n` produce parity.
    ///
    /// # Errors
    /// - `InvalidParameters` on shape mismatches or out-of-range positions
    /// - `Cancelled` if `cancel` fires; repair rows may be partially
    ///   written
    pub fn encode(
        &self,
        sources: &[&[u8]],
        index: &[usize],
        repairs: &mut [Vec<u8>],
        cancel: &CancelToken,
    ) -> Result<()> {
        if sources.len() != self.k {
            return Err(FecError::invalid_parameters(format!(
                "expected {} sources, got {}",
                self.k,
                sources.len()
            )));
        }
        if index.len() != repairs.len() {
            return Err(FecError::invalid_parameters(format!(
                "index has {} entries for {} repair packets",
                index.len(),
                repairs.len()
            )));
        }
        if let Some(&bad) = index.iter().find(|&&position| position >= self.n) {
            return Err(FecError::invalid_parameters(format!(
                "position {bad} out of range for n={}",
                self.n
            )));
        }
        let packet_length = sources.first().map_or(0, |s| s.len());
        if sources.iter().any(|s| s.len() != packet_length)
            || repairs.iter().any(|r| r.len() != packet_length)
        {
            return Err(FecError::invalid_parameters(
                "all packets must share one length",
            ));
        }

        trace!(rows = index.len(), packet_length, "encoding block");
        self.for_each_row(
            repairs,
            index,
            cancel,
            |out, position| self.encode_row(sources, position, out, cancel),
        )
    }

    fn encode_row(
        &self,
        sources: &[&[u8]],
        position: usize,
        out: &mut [u8],
        cancel: &CancelToken,
    ) -> Result<()> {
        if position < self.k {
            out.copy_from_slice(sources[position]);
            return Ok(());
        }
        out.fill(0);
        let coefficients = &self.encode_matrix[position * self.k..(position + 1) * self.k];
        for (source, &coefficient) in sources.iter().zip(coefficients) {
            if cancel.is_cancelled() {
                return Err(FecError::Cancelled);
            }
            add_mul(self.tables, source, out, coefficient);
        }
        Ok(())
    }

    // ========================================
    // Decode
    // ========================================

    /// Reconstructs the `k` data packets in place.
    ///
    /// `packets[row]` holds the packet from global position `index[row]`;
    /// the positions must be `k` distinct values in `0..n`. On success
    /// `packets[i]` is data packet `i` and `index[i] == i`.
    ///
    /// # Errors
    /// - `InvalidParameters` on shape mismatches or out-of-range positions
    /// - `DuplicateIndex` if a position appears twice among the systematic
    ///   slots
    /// - `SingularMatrix` if the positions cannot reconstruct the data
    /// - `Cancelled` if `cancel` fires; the arrays may be left shuffled
    pub fn decode(
        &self,
        packets: &mut [Vec<u8>],
        index: &mut [usize],
        cancel: &CancelToken,
    ) -> Result<()> {
        if packets.len() != self.k || index.len() != self.k {
            return Err(FecError::invalid_parameters(format!(
                "decode needs exactly {} packets and positions",
                self.k
            )));
        }
        if let Some(&bad) = index.iter().find(|&&position| position >= self.n) {
            return Err(FecError::invalid_parameters(format!(
                "position {bad} out of range for n={}",
                self.n
            )));
        }
        let packet_length = packets.first().map_or(0, Vec::len);
        if packets.iter().any(|p| p.len() != packet_length) {
            return Err(FecError::invalid_parameters(
                "all packets must share one length",
            ));
        }

        // Place every received systematic packet into its natural slot.
        shuffle(packets, index, self.k)?;

        let missing: Vec<usize> = (0..self.k).filter(|&row| index[row] >= self.k).collect();
        if missing.is_empty() {
            trace!("decode complete without matrix solve");
            return Ok(());
        }
        trace!(missing = missing.len(), packet_length, "solving for lost packets");

        let decode_matrix =
            create_decode_matrix(self.tables, &self.encode_matrix, index, self.k)?;

        // Solve the missing rows into scratch buffers while the packet
        // array stays readable.
        let mut scratch: Vec<Scratch> = missing
            .iter()
            .map(|_| Scratch::new(&self.pool, packet_length))
            .collect();
        {
            let shared: &[Vec<u8>] = packets;
            self.for_each_row(&mut scratch, &missing, cancel, |out, row| {
                let coefficients = &decode_matrix[row * self.k..(row + 1) * self.k];
                for (packet, &coefficient) in shared.iter().zip(coefficients) {
                    if cancel.is_cancelled() {
                        return Err(FecError::Cancelled);
                    }
                    add_mul(self.tables, packet, out.as_mut_slice(), coefficient);
                }
                Ok(())
            })?;
        }

        for (row, buffer) in missing.into_iter().zip(scratch) {
            packets[row].copy_from_slice(buffer.as_slice());
            index[row] = row;
        }
        Ok(())
    }

    // ========================================
    // Bounded row parallelism
    // ========================================

    /// Runs `work` for every `(item, position)` pair, split across at most
    /// `concurrency` scoped worker threads.
    fn for_each_row<T, F>(
        &self,
        items: &mut [T],
        positions: &[usize],
        cancel: &CancelToken,
        work: F,
    ) -> Result<()>
    where
        T: Send,
        F: Fn(&mut T, usize) -> Result<()> + Sync,
    {
        let rows = items.len();
        if rows == 0 {
            return Ok(());
        }
        let workers = self.concurrency.min(rows);
        if workers <= 1 {
            for (item, &position) in items.iter_mut().zip(positions) {
                if cancel.is_cancelled() {
                    return Err(FecError::Cancelled);
                }
                work(item, position)?;
            }
            return Ok(());
        }

        let per_worker = rows.div_ceil(workers);
        let results: Vec<Result<()>> = std::thread::scope(|scope| {
            let handles: Vec<_> = items
                .chunks_mut(per_worker)
                .zip(positions.chunks(per_worker))
                .map(|(item_chunk, position_chunk)| {
                    let work = &work;
                    scope.spawn(move || {
                        for (item, &position) in item_chunk.iter_mut().zip(position_chunk) {
                            if cancel.is_cancelled() {
                                return Err(FecError::Cancelled);
                            }
                            work(item, position)?;
                        }
                        Ok(())
                    })
                })
                .collect();
            handles
                .into_iter()
                .map(|handle| handle.join().expect("coder worker does not panic"))
                .collect()
        });
        results.into_iter().collect()
    }
}

impl std::fmt::Debug for ReedSolomonCoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReedSolomonCoder")
            .field("k", &self.k)
            .field("n", &self.n)
            .field("concurrency", &self.concurrency)
            .finish_non_exhaustive()
    }
}

// ============================================
// Decode Shuffle
// ============================================

/// Swaps received systematic packets into their natural slots.
///
/// After this pass, `index[i]` is either `i` (data present) or `>= k`
/// (parity standing in for lost data).
fn shuffle(packets: &mut [Vec<u8>], index: &mut [usize], k: usize) -> Result<()> {
    let mut i = 0;
    while i < k {
        let position = index[i];
        if position >= k || position == i {
            i += 1;
            continue;
        }
        if index[position] == position {
            // The target slot already holds its own packet: `position` was
            // listed twice.
            return Err(FecError::DuplicateIndex { index: position });
        }
        packets.swap(i, position);
        index.swap(i, position);
    }
    Ok(())
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, RngCore, SeedableRng};

    fn random_sources(rng: &mut StdRng, k: usize, packet_length: usize) -> Vec<Vec<u8>> {
        (0..k)
            .map(|_| {
                let mut packet = vec![0u8; packet_length];
                rng.fill_bytes(&mut packet);
                packet
            })
            .collect()
    }

    fn as_refs(sources: &[Vec<u8>]) -> Vec<&[u8]> {
        sources.iter().map(Vec::as_slice).collect()
    }

    fn encode_all(
        coder: &ReedSolomonCoder,
        sources: &[Vec<u8>],
        packet_length: usize,
    ) -> Vec<Vec<u8>> {
        let positions: Vec<usize> = (0..coder.n()).collect();
        let mut coded = vec![vec![0u8; packet_length]; coder.n()];
        coder
            .encode(&as_refs(sources), &positions, &mut coded, &CancelToken::new())
            .unwrap();
        coded
    }

    #[test]
    fn test_systematic_prefix_equals_sources() {
        let mut rng = StdRng::seed_from_u64(7);
        let coder = ReedSolomonCoder::new(4, 6).unwrap();
        let sources = random_sources(&mut rng, 4, 64);
        let coded = encode_all(&coder, &sources, 64);
        assert_eq!(&coded[..4], sources.as_slice());
    }

    #[test]
    fn test_two_systematic_losses_recovered_by_parity() {
        let mut rng = StdRng::seed_from_u64(42);
        let coder = ReedSolomonCoder::new(4, 6).unwrap();
        let sources = random_sources(&mut rng, 4, 16);
        let coded = encode_all(&coder, &sources, 16);

        // Lose data packets 0 and 1; stand in parity positions 4 and 5.
        let mut packets = vec![
            coded[4].clone(),
            coded[5].clone(),
            coded[2].clone(),
            coded[3].clone(),
        ];
        let mut index = vec![4, 5, 2, 3];
        coder
            .decode(&mut packets, &mut index, &CancelToken::new())
            .unwrap();

        assert_eq!(packets, sources);
        assert_eq!(index, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_every_k_subset_roundtrips() {
        let mut rng = StdRng::seed_from_u64(3);
        let (k, n) = (3, 6);
        let coder = ReedSolomonCoder::new(k, n).unwrap();
        let sources = random_sources(&mut rng, k, 32);
        let coded = encode_all(&coder, &sources, 32);

        for a in 0..n {
            for b in (a + 1)..n {
                for c in (b + 1)..n {
                    let subset = [a, b, c];
                    let mut packets: Vec<Vec<u8>> =
                        subset.iter().map(|&p| coded[p].clone()).collect();
                    let mut index = subset.to_vec();
                    coder
                        .decode(&mut packets, &mut index, &CancelToken::new())
                        .unwrap();
                    assert_eq!(packets, sources, "subset {subset:?}");
                }
            }
        }
    }

    #[test]
    fn test_k_equals_n_is_pure_passthrough() {
        let mut rng = StdRng::seed_from_u64(11);
        let coder = ReedSolomonCoder::new(5, 5).unwrap();
        let sources = random_sources(&mut rng, 5, 24);
        let coded = encode_all(&coder, &sources, 24);
        assert_eq!(coded, sources);
    }

    #[test]
    fn test_k_of_one() {
        let coder = ReedSolomonCoder::new(1, 4).unwrap();
        let sources: [&[u8]; 1] = [&[0xAB, 0xCD]];
        let mut repairs = vec![vec![0u8; 2]; 4];
        coder
            .encode(&sources, &[0, 1, 2, 3], &mut repairs, &CancelToken::new())
            .unwrap();

        // Any single position must decode back to the data.
        for position in 0..4 {
            let mut packets = vec![repairs[position].clone()];
            let mut index = vec![position];
            coder
                .decode(&mut packets, &mut index, &CancelToken::new())
                .unwrap();
            assert_eq!(packets[0], vec![0xAB, 0xCD]);
        }
    }

    #[test]
    fn test_concurrent_encode_matches_sequential() {
        let mut rng = StdRng::seed_from_u64(23);
        let (k, n) = (8, 16);
        let sequential = ReedSolomonCoder::new(k, n).unwrap();
        let concurrent = ReedSolomonCoder::new(k, n)
            .unwrap()
            .with_concurrency(4)
            .unwrap();
        let sources = random_sources(&mut rng, k, 100);

        let coded_sequential = encode_all(&sequential, &sources, 100);
        let coded_concurrent = encode_all(&concurrent, &sources, 100);
        assert_eq!(coded_sequential, coded_concurrent);
    }

    #[test]
    fn test_concurrent_decode_roundtrips() {
        let mut rng = StdRng::seed_from_u64(31);
        let (k, n) = (8, 12);
        let coder = ReedSolomonCoder::new(k, n)
            .unwrap()
            .with_concurrency(3)
            .unwrap();
        let sources = random_sources(&mut rng, k, 48);
        let coded = encode_all(&coder, &sources, 48);

        // Drop half the data packets.
        let mut packets: Vec<Vec<u8>> = vec![
            coded[8].clone(),
            coded[9].clone(),
            coded[10].clone(),
            coded[11].clone(),
            coded[4].clone(),
            coded[5].clone(),
            coded[6].clone(),
            coded[7].clone(),
        ];
        let mut index = vec![8, 9, 10, 11, 4, 5, 6, 7];
        coder
            .decode(&mut packets, &mut index, &CancelToken::new())
            .unwrap();
        assert_eq!(packets, sources);
    }

    #[test]
    fn test_duplicate_systematic_index_is_detected() {
        let coder = ReedSolomonCoder::new(3, 5).unwrap();
        let mut packets = vec![vec![1u8; 8], vec![2u8; 8], vec![3u8; 8]];
        let mut index = vec![1, 1, 2];
        let err = coder
            .decode(&mut packets, &mut index, &CancelToken::new())
            .unwrap_err();
        assert!(matches!(err, FecError::DuplicateIndex { index: 1 }));
    }

    #[test]
    fn test_duplicate_parity_index_is_singular() {
        let coder = ReedSolomonCoder::new(3, 5).unwrap();
        let mut packets = vec![vec![1u8; 8], vec![2u8; 8], vec![3u8; 8]];
        let mut index = vec![3, 3, 2];
        let err = coder
            .decode(&mut packets, &mut index, &CancelToken::new())
            .unwrap_err();
        assert!(matches!(err, FecError::SingularMatrix { .. }));
    }

    #[test]
    fn test_shape_validation() {
        let coder = ReedSolomonCoder::new(3, 5).unwrap();
        let cancel = CancelToken::new();

        // Wrong source count.
        let sources: [&[u8]; 2] = [&[1, 2], &[3, 4]];
        let mut repairs = vec![vec![0u8; 2]];
        assert!(matches!(
            coder.encode(&sources, &[3], &mut repairs, &cancel),
            Err(FecError::InvalidParameters { .. })
        ));

        // Mismatched packet lengths.
        let sources: [&[u8]; 3] = [&[1, 2], &[3, 4], &[5, 6, 7]];
        assert!(matches!(
            coder.encode(&sources, &[3], &mut repairs, &cancel),
            Err(FecError::InvalidParameters { .. })
        ));

        // Out-of-range position.
        let sources: [&[u8]; 3] = [&[1, 2], &[3, 4], &[5, 6]];
        assert!(matches!(
            coder.encode(&sources, &[5], &mut repairs, &cancel),
            Err(FecError::InvalidParameters { .. })
        ));

        // Bad constructor parameters.
        assert!(ReedSolomonCoder::new(0, 4).is_err());
        assert!(ReedSolomonCoder::new(5, 4).is_err());
        assert!(ReedSolomonCoder::new(2, 300).is_err());
        assert!(ReedSolomonCoder::new(2, 4)
            .unwrap()
            .with_concurrency(0)
            .is_err());
    }

    #[test]
    fn test_cancellation_stops_encode() {
        let mut rng = StdRng::seed_from_u64(5);
        let coder = ReedSolomonCoder::new(4, 8).unwrap();
        let sources = random_sources(&mut rng, 4, 32);
        let mut repairs = vec![vec![0u8; 32]; 4];

        let cancel = CancelToken::new();
        cancel.cancel();
        let err = coder
            .encode(&as_refs(&sources), &[4, 5, 6, 7], &mut repairs, &cancel)
            .unwrap_err();
        assert!(matches!(err, FecError::Cancelled));
    }

    #[test]
    fn test_random_loss_patterns_roundtrip() {
        let mut rng = StdRng::seed_from_u64(97);
        let (k, n) = (10, 14);
        let coder = ReedSolomonCoder::new(k, n).unwrap();
        let sources = random_sources(&mut rng, k, 40);
        let coded = encode_all(&coder, &sources, 40);

        for _ in 0..25 {
            // Pick k random distinct positions.
            let mut positions: Vec<usize> = (0..n).collect();
            for i in (1..positions.len()).rev() {
                let j = rng.gen_range(0..=i);
                positions.swap(i, j);
            }
            positions.truncate(k);

            let mut packets: Vec<Vec<u8>> =
                positions.iter().map(|&p| coded[p].clone()).collect();
            let mut index = positions.clone();
            coder
                .decode(&mut packets, &mut index, &CancelToken::new())
                .unwrap();
            assert_eq!(packets, sources, "positions {positions:?}");
        }
    }
}
