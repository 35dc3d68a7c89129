//! Chunk planning for large uploads.

use chrono::Utc;
use rand::Rng;

use crate::{DriveError, Result};

/// Most chunks one upload may be split into.
pub const MAX_CHUNKS: u64 = 10_000;

/// One contiguous byte range `[start, end)` of a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkRange {
    /// Zero-based chunk index.
    pub index: u64,
    /// First byte of the range.
    pub start: u64,
    /// One past the last byte of the range.
    pub end: u64,
}

impl ChunkRange {
    /// Number of bytes in the range.
    pub fn len(&self) -> u64 {
        self.end - self.start
    }

    /// Whether the range is empty (only for zero-length files).
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// Ordered byte ranges of one chunked upload, plus its session identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkPlan {
    /// Identifier shared by every fragment of the upload.
    pub session_id: String,
    /// Total size in bytes.
    pub size: u64,
    /// Size of every chunk except possibly the last.
    pub chunk_size: u64,
    /// Ranges in index order.
    pub ranges: Vec<ChunkRange>,
}

impl ChunkPlan {
    /// Plan a file of `size` bytes with a fresh session identifier.
    ///
    /// A zero-length file yields one empty chunk.
    pub fn new(size: u64, chunk_size: u64) -> Result<Self> {
        Self::with_session(new_session_id(), size, chunk_size)
    }

    /// Plan a file under an existing session identifier.
    pub fn with_session(session_id: impl Into<String>, size: u64, chunk_size: u64) -> Result<Self> {
        if chunk_size == 0 {
            return Err(DriveError::Validation(
                "chunk size must be greater than zero".to_string(),
            ));
        }

        let count = size.div_ceil(chunk_size).max(1);
        if count > MAX_CHUNKS {
            return Err(DriveError::Validation(format!(
                "{size} bytes in {chunk_size} byte chunks needs {count} chunks, more than {MAX_CHUNKS}"
            )));
        }

        let mut ranges = Vec::with_capacity(count as usize);
        let mut start: u64 = 0;
        loop {
            let end = start.saturating_add(chunk_size).min(size);
            ranges.push(ChunkRange {
                index: ranges.len() as u64,
                start,
                end,
            });
            if end == size {
                break;
            }
            start = end;
        }

        Ok(Self {
            session_id: session_id.into(),
            size,
            chunk_size,
            ranges,
        })
    }

    /// Number of chunks, `ceil(size / chunk_size)` or 1 for an empty file.
    pub fn total_chunks(&self) -> u64 {
        self.ranges.len() as u64
    }
}

/// Generate a collision-resistant upload session identifier.
///
/// Combines the current time in milliseconds with 64 random bits.
pub fn new_session_id() -> String {
    let entropy: u64 = rand::rng().random();
    format!("{}-{:016x}", Utc::now().timestamp_millis(), entropy)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    const GIB: u64 = 1024 * 1024 * 1024;

    fn assert_contiguous(plan: &ChunkPlan) {
        assert_eq!(plan.ranges[0].start, 0);
        assert_eq!(plan.ranges.last().unwrap().end, plan.size);
        for (i, pair) in plan.ranges.windows(2).enumerate() {
            assert_eq!(pair[0].end, pair[1].start);
            assert_eq!(pair[0].index, i as u64);
        }
        for range in &plan.ranges {
            assert!(range.len() <= plan.chunk_size);
        }
    }

    #[test]
    fn test_two_and_a_half_gib() {
        let size = 2 * GIB + GIB / 2;
        let plan = ChunkPlan::new(size, GIB).unwrap();

        assert_eq!(plan.total_chunks(), 3);
        let bounds: Vec<(u64, u64)> = plan.ranges.iter().map(|r| (r.start, r.end)).collect();
        assert_eq!(
            bounds,
            vec![
                (0, 1_073_741_824),
                (1_073_741_824, 2_147_483_648),
                (2_147_483_648, 2_684_354_560)
            ]
        );
    }

    #[test]
    fn test_ranges_cover_size() {
        for (size, chunk_size) in [(1, 1), (10, 3), (9, 3), (7, 100), (1000, 7), (4096, 4096)] {
            let plan = ChunkPlan::new(size, chunk_size).unwrap();
            assert_contiguous(&plan);
            assert_eq!(plan.total_chunks(), size.div_ceil(chunk_size), "size {size}");
        }
    }

    #[test]
    fn test_zero_size_is_one_empty_chunk() {
        let plan = ChunkPlan::new(0, GIB).unwrap();
        assert_eq!(plan.total_chunks(), 1);
        assert!(plan.ranges[0].is_empty());
        assert_contiguous(&plan);
    }

    #[test]
    fn test_zero_chunk_size_rejected() {
        assert!(matches!(
            ChunkPlan::new(10, 0),
            Err(DriveError::Validation(_))
        ));
    }

    #[test]
    fn test_chunk_count_ceiling() {
        assert!(matches!(
            ChunkPlan::new(1 << 62, 1),
            Err(DriveError::Validation(_))
        ));
        assert!(matches!(
            ChunkPlan::new(MAX_CHUNKS + 1, 1),
            Err(DriveError::Validation(_))
        ));

        let plan = ChunkPlan::new(MAX_CHUNKS, 1).unwrap();
        assert_eq!(plan.total_chunks(), MAX_CHUNKS);
    }

    #[test]
    fn test_session_ids_are_distinct() {
        let ids: HashSet<String> = (0..1000).map(|_| new_session_id()).collect();
        assert_eq!(ids.len(), 1000);
    }

    #[test]
    fn test_with_session_keeps_identifier() {
        let plan = ChunkPlan::with_session("abc", 5, 2).unwrap();
        assert_eq!(plan.session_id, "abc");
        assert_eq!(plan.total_chunks(), 3);
    }
}
