//! Shared claim cursor and one-shot stop signal of a partitioned pool

use crate::core::{CancellationReason, CancellationToken};
use parking_lot::Mutex;

/// The next unclaimed index of a `[start, limit)` range
///
/// Claims hand out disjoint, ascending block offsets. The lock guards only
/// the read-and-advance step.
#[derive(Debug)]
pub struct Cursor {
    position: Mutex<usize>,
    start: usize,
    limit: usize,
    block_size: usize,
}

impl Cursor {
    /// Create a cursor positioned at `start`
    pub fn new(start: usize, limit: usize, block_size: usize) -> Self {
        Self {
            position: Mutex::new(start),
            start,
            limit,
            block_size,
        }
    }

    /// Claim the next block, returning its offset
    ///
    /// Returns `None` once the range is exhausted. Every returned offset is
    /// below `limit`.
    pub fn claim(&self) -> Option<usize> {
        let mut position = self.position.lock();
        if *position >= self.limit {
            return None;
        }
        let offset = *position;
        *position = offset.saturating_add(self.block_size);
        Some(offset)
    }

    /// Current position (approximate while workers are running)
    pub fn position(&self) -> usize {
        *self.position.lock()
    }

    /// Whether every block has been claimed
    pub fn is_exhausted(&self) -> bool {
        self.position() >= self.limit
    }

    /// The `[start, limit)` interval this cursor traverses
    pub fn interval(&self) -> (usize, usize) {
        (self.start, self.limit)
    }

    /// Number of blocks that tile the interval
    pub fn total_blocks(&self) -> usize {
        if self.limit <= self.start {
            0
        } else {
            (self.limit - self.start).div_ceil(self.block_size)
        }
    }
}

/// Write-once stop signal shared by the workers of one pool
///
/// Only the first [`close`](Self::close) has an effect, so a repeated stop
/// request can never double-close the signal.
#[derive(Debug, Clone, Default)]
pub struct StopSignal {
    token: CancellationToken,
}

impl StopSignal {
    /// Create an open signal
    pub fn new() -> Self {
        Self::default()
    }

    /// Close the signal; returns `true` only for the call that closed it
    pub fn close(&self) -> bool {
        self.token
            .cancel_with_reason(CancellationReason::Custom("pool stop requested".to_string()))
    }

    /// Non-blocking check
    #[inline]
    pub fn is_closed(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Token observers can use to follow the signal
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }
}
