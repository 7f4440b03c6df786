//! Block-level dirty-region detection between consecutive frames.
//!
//! Divides the frame into `block_size × block_size` tiles and compares
//! each tile against the previous frame, so only tiles that differ need
//! to be repainted when the screen is mostly static.
//!
//! # Accuracy
//!
//! With [`RowSampling::EveryOther`] the comparison skips alternate rows
//! inside each tile. That makes the diff **conservative-effort, not
//! exhaustive**: a change confined entirely to unsampled rows can be
//! missed until a later frame touches a sampled row. Callers that need
//! an exact diff must use [`RowSampling::Full`] (the default) or force
//! a full-frame update.

use std::cmp;

use crate::frame::buffer::{FrameBuffer, Rect};
use crate::frame::simd::{RowCompareFn, resolve_row_compare};

// ── RowSampling ──────────────────────────────────────────────────

/// How many rows inside a block are actually compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RowSampling {
    /// Compare every row. Exact.
    #[default]
    Full,
    /// Compare every other row. Roughly halves scan cost; best-effort.
    EveryOther,
}

impl RowSampling {
    /// Row increment within a block.
    pub const fn step(self) -> u32 {
        match self {
            RowSampling::Full => 1,
            RowSampling::EveryOther => 2,
        }
    }
}

// ── DiffOutcome ──────────────────────────────────────────────────

/// Result of a detection pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiffOutcome {
    /// The whole frame must be repainted (first frame, forced full
    /// update, or geometry change).
    FullFrame(Rect),
    /// Only these tiles changed.
    Blocks(Vec<Rect>),
    /// Nothing changed since the previous frame.
    Unchanged,
}

impl DiffOutcome {
    /// The rects a delivery should carry, if any.
    pub fn rects(&self) -> Option<Vec<Rect>> {
        match self {
            DiffOutcome::FullFrame(r) => Some(vec![*r]),
            DiffOutcome::Blocks(v) => Some(v.clone()),
            DiffOutcome::Unchanged => None,
        }
    }
}

// ── DirtyRegionDetector ──────────────────────────────────────────

/// Stateful detector that owns the previous-frame snapshot and emits
/// per-block change information.
///
/// The snapshot is private producer-side state; it is never handed to
/// the consumer.
///
/// # Block size
///
/// A block size of **32** matches the repaint granularity of a typical
/// desktop scene: large enough to amortise per-block overhead, small
/// enough to skip unchanged background.
pub struct DirtyRegionDetector {
    previous: Option<FrameBuffer>,
    block_size: u32,
    sampling: RowSampling,
    compare: RowCompareFn,
}

impl DirtyRegionDetector {
    /// Create a detector with the given tile size and sampling policy.
    ///
    /// The block comparator is resolved once here from host
    /// capabilities; scalar and vector paths are verdict-identical, so
    /// the choice never changes output.
    ///
    /// # Panics
    ///
    /// Panics if `block_size` is zero.
    pub fn new(block_size: u32, sampling: RowSampling) -> Self {
        assert!(block_size > 0, "block_size must be > 0");
        Self {
            previous: None,
            block_size,
            sampling,
            compare: resolve_row_compare(),
        }
    }

    /// Reset the detector, forcing the next detection to be full-frame.
    pub fn reset(&mut self) {
        self.previous = None;
    }

    /// Compare `current` against the stored previous frame.
    ///
    /// The first call (or the call after [`reset`](Self::reset)), and
    /// any call where the geometry or pixel format changed, produces a
    /// single full-frame rect: a size change invalidates the positional
    /// meaning of the previous buffer, so per-block comparison is
    /// skipped entirely.
    pub fn detect(&mut self, current: &FrameBuffer) -> DiffOutcome {
        let outcome = match &self.previous {
            Some(prev)
                if prev.extent() == current.extent() && prev.format() == current.format() =>
            {
                self.detect_blocks(current, prev)
            }
            _ => DiffOutcome::FullFrame(Rect::full(current.extent())),
        };

        self.previous = Some(current.clone());
        outcome
    }

    // ── Internal ─────────────────────────────────────────────────

    fn detect_blocks(&self, current: &FrameBuffer, previous: &FrameBuffer) -> DiffOutcome {
        let w = current.width();
        let h = current.height();
        let bs = self.block_size;

        let blocks_x = w.div_ceil(bs);
        let blocks_y = h.div_ceil(bs);

        let mut changed = Vec::new();

        for by in 0..blocks_y {
            for bx in 0..blocks_x {
                let start_x = bx * bs;
                let start_y = by * bs;
                let end_x = cmp::min(start_x + bs, w);
                let end_y = cmp::min(start_y + bs, h);

                if self.block_differs(current, previous, start_x, start_y, end_x, end_y) {
                    changed.push(Rect::new(
                        start_x,
                        start_y,
                        end_x - start_x,
                        end_y - start_y,
                    ));
                }
            }
        }

        if changed.is_empty() {
            return DiffOutcome::Unchanged;
        }

        // Past 80 % changed blocks a single full-frame repaint is
        // cheaper than many small ones. Promotion only widens coverage.
        let total_blocks = (blocks_x * blocks_y) as usize;
        if changed.len() * 5 > total_blocks * 4 {
            return DiffOutcome::FullFrame(Rect::full(current.extent()));
        }

        DiffOutcome::Blocks(changed)
    }

    /// Stride-respecting comparison of one tile, sampled per policy.
    fn block_differs(
        &self,
        current: &FrameBuffer,
        previous: &FrameBuffer,
        start_x: u32,
        start_y: u32,
        end_x: u32,
        end_y: u32,
    ) -> bool {
        let mut y = start_y;
        while y < end_y {
            let cur = current.row_span(y, start_x, end_x);
            let prev = previous.row_span(y, start_x, end_x);
            if (self.compare)(cur, prev) {
                return true;
            }
            y += self.sampling.step();
        }
        false
    }
}

// ── Tests ────────────────────────────────────────────────────────
