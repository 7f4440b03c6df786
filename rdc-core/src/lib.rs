//! # rdc-core
//!
//! Frame-synchronization core for a remote-desktop client: takes the
//! remote frame buffer an engine decodes on its own thread and hands
//! completed or partially-updated frames to a single-threaded render
//! consumer, detecting which regions actually changed so only those
//! need repainting.
//!
//! ## Architecture
//!
//! ```text
//! ENGINE THREAD (producer)                RENDER THREAD (consumer)
//! ┌──────────────────────────┐           ┌──────────────────────────┐
//! │ on_frame_ready           │           │ poll / paint_ready       │
//! │   ↓                      │           │   ↓                      │
//! │ DirtyRegionDetector      │  single   │ RenderSink.repaint       │
//! │   ↓                      │   slot    │                          │
//! │ FrameSender::publish ────┼──────────►│ request_resize           │
//! │                          │           │ pump_resize ──► engine   │
//! └──────────────────────────┘           └──────────────────────────┘
//! ```
//!
//! This crate contains:
//! - **Frame model**: `FrameBuffer`, `Rect`, `Extent`, `PixelFormat`
//! - **Change detection**: `DirtyRegionDetector` with scalar and SIMD
//!   block comparison sharing one verdict contract
//! - **Handoff**: `FrameChannel` — at most one pending delivery,
//!   overwrite with rect coalescing, generation-tagged
//! - **Resize**: `ResizeNegotiator` — debounced dynamic-resolution
//!   state machine serialized with frame delivery
//! - **Session**: producer/consumer façade over one shared context
//! - **Error**: `SyncError` — typed, `thiserror`-based, all recoverable

pub mod channel;
pub mod error;
pub mod frame;
pub mod resize;
pub mod session;

// ── Re-exports for ergonomic usage ───────────────────────────────

pub use channel::{FrameReceiver, FrameSender, PendingDelivery, frame_channel};
pub use error::SyncError;
pub use frame::{
    DiffOutcome, DirtyRegionDetector, Extent, FrameBuffer, PixelFormat, Rect, RowSampling,
};
pub use resize::{DEFAULT_DEBOUNCE, ResizeNegotiator, ResizePhase};
pub use session::{
    DisplayControl, RenderSink, SessionConfig, SessionConsumer, SessionProducer, session,
};
