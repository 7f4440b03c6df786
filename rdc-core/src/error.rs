//! Domain-specific error types for the frame-sync core.
//!
//! All fallible operations return `Result<T, SyncError>`.
//! Nothing in this taxonomy is fatal: the worst outcome of any of these
//! conditions is a stale or skipped visual update, never a corrupted
//! buffer, so every variant maps to a local recovery path.

use thiserror::Error;

use crate::frame::Extent;

/// The canonical error type for the frame-sync pipeline.
#[derive(Debug, Error)]
pub enum SyncError {
    // ── Delivery errors ──────────────────────────────────────────
    /// A delivery's generation tag does not match the geometry the
    /// consumer currently holds. Recovered by discarding the delivery
    /// and waiting for the next full-frame update.
    #[error("geometry mismatch: delivery generation {delivery}, current {current}")]
    GeometryMismatch { delivery: u64, current: u64 },

    /// Publish or take attempted after the channel was torn down.
    /// Normally silent (post-disconnect no-op); surfaced only by APIs
    /// that must distinguish "closed" from "empty".
    #[error("frame channel torn down")]
    ChannelTornDown,

    // ── Resize errors ────────────────────────────────────────────
    /// Dynamic resize requested but the session never negotiated the
    /// display-control capability. The negotiator stays idle and the
    /// session keeps its fixed geometry.
    #[error("display-control capability not negotiated")]
    CapabilityUnavailable,

    /// A layout-change commit was rejected by the remote session or
    /// interrupted by teardown. Local geometry is left untouched.
    #[error("resize commit abandoned: {0}")]
    CommitAbandoned(&'static str),

    /// The negotiator was driven out of order (e.g. a commit result
    /// reported while no commit was in flight).
    #[error("invalid negotiator state: {0}")]
    InvalidState(&'static str),

    // ── Buffer errors ────────────────────────────────────────────
    /// A frame buffer failed constructor validation.
    #[error("invalid geometry: {0}")]
    InvalidGeometry(&'static str),

    /// A rectangle does not fit inside the frame it was applied to.
    #[error("rect {x},{y} {width}x{height} exceeds frame bounds {bounds}")]
    RectOutOfBounds {
        x: u32,
        y: u32,
        width: u32,
        height: u32,
        bounds: Extent,
    },
}
