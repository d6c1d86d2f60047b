//! Fixed-size partitioning of units into classification batches

use crate::{FeedbackError, Result};
use serde::{Deserialize, Serialize};
use std::ops::Range;

/// Batch size used when nothing else is configured
pub const DEFAULT_BATCH_SIZE: usize = 15;

/// One contiguous slice of the unit sequence
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSpec {
    /// 1-based position, as shown to users ("Batch 2 of 3")
    pub number: usize,
    /// Total number of batches in the run
    pub of: usize,
    pub range: Range<usize>,
}

impl BatchSpec {
    pub fn len(&self) -> usize {
        self.range.len()
    }

    pub fn is_empty(&self) -> bool {
        self.range.is_empty()
    }
}

/// Split `len` items into contiguous ranges of `batch_size`; only the last may be shorter.
pub fn plan(len: usize, batch_size: usize) -> Result<Vec<BatchSpec>> {
    if batch_size == 0 {
        return Err(FeedbackError::Configuration(
            "batch_size must be greater than zero".to_string(),
        ));
    }

    let of = len.div_ceil(batch_size);
    Ok((0..of)
        .map(|i| {
            let start = i * batch_size;
            BatchSpec {
                number: i + 1,
                of,
                range: start..(start + batch_size).min(len),
            }
        })
        .collect())
}

/// Borrowing view of the same partitioning.
pub fn partition<T>(items: &[T], batch_size: usize) -> Result<Vec<&[T]>> {
    if batch_size == 0 {
        return Err(FeedbackError::Configuration(
            "batch_size must be greater than zero".to_string(),
        ));
    }
    Ok(items.chunks(batch_size).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_sizes() {
        let batches = plan(32, 15).unwrap();
        let sizes: Vec<usize> = batches.iter().map(|b| b.len()).collect();
        assert_eq!(sizes, vec![15, 15, 2]);
        assert_eq!(batches[2].number, 3);
        assert_eq!(batches[2].of, 3);
        assert_eq!(batches[2].range, 30..32);
    }

    #[test]
    fn test_empty_input_yields_no_batches() {
        assert!(plan(0, 15).unwrap().is_empty());
        assert!(partition::<u8>(&[], 15).unwrap().is_empty());
    }

    #[test]
    fn test_zero_batch_size_rejected() {
        assert!(plan(10, 0).is_err());
        assert!(partition(&[1, 2, 3], 0).is_err());
    }

    #[test]
    fn test_exact_multiple() {
        let items: Vec<u32> = (0..30).collect();
        let parts = partition(&items, 15).unwrap();
        assert_eq!(parts.len(), 2);
        assert_eq!(parts.concat(), items);
    }
}
