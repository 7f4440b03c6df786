//! Frame model and change detection.
//!
//! | Module   | Purpose                                            |
//! |----------|----------------------------------------------------|
//! | `buffer` | Owned fixed-stride pixel buffers and geometry types |
//! | `diff`   | Block-level dirty-region detection                  |
//! | `simd`   | Vectorized row comparison behind the scalar contract |

pub mod buffer;
pub mod diff;
pub mod simd;

// ── Re-exports ───────────────────────────────────────────────────

pub use buffer::{Extent, FrameBuffer, PixelFormat, Rect};
pub use diff::{DiffOutcome, DirtyRegionDetector, RowSampling};
pub use simd::{RowCompareFn, resolve_row_compare, rows_differ_scalar};
