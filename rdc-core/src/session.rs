//! Session façade — the producer/consumer boundary of the sync core.
//!
//! [`session`] builds a connected [`SessionProducer`] /
//! [`SessionConsumer`] pair around one shared context (generation
//! counter, frame channel, resize negotiator). The producer half is
//! registered with the protocol engine as its frame/capability callback
//! surface; the consumer half belongs to the render thread. There is no
//! ambient global state: everything the callbacks need travels through
//! the handles.
//!
//! The only data both threads touch is the channel slot and the
//! generation counter, both behind acquire/release accesses sized to a
//! pointer/counter pair — the pixel payload transfers ownership and
//! never aliases.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use tracing::{debug, info, trace};

use crate::channel::{FrameReceiver, FrameSender, PendingDelivery, frame_channel};
use crate::error::SyncError;
use crate::frame::{DiffOutcome, DirtyRegionDetector, Extent, FrameBuffer, Rect, RowSampling};
use crate::resize::{DEFAULT_DEBOUNCE, ResizeNegotiator, ResizePhase};

// ── Collaborator traits ──────────────────────────────────────────

/// Outbound boundary to the protocol engine, used by the resize commit.
///
/// Implemented by the engine integration; registered once at session
/// creation.
pub trait DisplayControl: Send + Sync {
    /// Ask the remote session to relayout its display to `extent`.
    /// Returns `false` on rejection (including transport failure).
    fn request_layout_change(&self, extent: Extent) -> bool;

    /// Reallocate the engine's primary buffer at the acknowledged
    /// geometry. Called only after a successful layout change; must
    /// not call back into the session.
    fn reallocate(&self, extent: Extent);
}

/// Consumer-side collaborator that repaints only the given rects.
pub trait RenderSink {
    fn repaint(&mut self, frame: &FrameBuffer, rects: &[Rect]);
}

// ── SessionConfig ────────────────────────────────────────────────

/// Tuning constants for a session. Not persisted.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Dirty-region tile size in pixels.
    pub block_size: u32,
    /// Row-sampling policy inside a tile.
    pub sampling: RowSampling,
    /// Quiet window before a resize is proposed to the remote.
    pub debounce: Duration,
    /// Geometry the session was negotiated at. Stays current until a
    /// resize commit is accepted.
    pub initial_extent: Extent,
    /// Smallest per-axis size the display-control channel accepts.
    pub min_extent: u32,
    /// Largest per-axis size the display-control channel accepts.
    pub max_extent: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            block_size: 32,
            sampling: RowSampling::Full,
            debounce: DEFAULT_DEBOUNCE,
            initial_extent: Extent::new(1024, 768),
            // Monitor-layout bounds of the display-control channel.
            min_extent: 200,
            max_extent: 8192,
        }
    }
}

// ── Shared context ───────────────────────────────────────────────

struct SessionShared {
    /// Bumped on every accepted resize; tags deliveries so rects are
    /// never interpreted against a buffer of the wrong size.
    generation: AtomicU64,
    negotiator: Mutex<ResizeNegotiator>,
    /// Geometry of the last committed layout.
    geometry: Mutex<Extent>,
    control: Arc<dyn DisplayControl>,
    config: SessionConfig,
}

impl SessionShared {
    fn lock_negotiator(&self) -> std::sync::MutexGuard<'_, ResizeNegotiator> {
        self.negotiator
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_geometry(&self) -> std::sync::MutexGuard<'_, Extent> {
        self.geometry.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Create a connected producer/consumer pair sharing one context.
pub fn session(
    config: SessionConfig,
    control: Arc<dyn DisplayControl>,
) -> (SessionProducer, SessionConsumer) {
    let (tx, rx) = frame_channel();
    let shared = Arc::new(SessionShared {
        generation: AtomicU64::new(0),
        negotiator: Mutex::new(ResizeNegotiator::new(config.debounce)),
        geometry: Mutex::new(config.initial_extent),
        control,
        config: config.clone(),
    });
    let producer = SessionProducer {
        detector: DirtyRegionDetector::new(config.block_size, config.sampling),
        seen_generation: 0,
        tx,
        shared: Arc::clone(&shared),
    };
    let consumer = SessionConsumer { rx, shared };
    (producer, consumer)
}

// ── SessionProducer ──────────────────────────────────────────────

/// Engine-facing half. Lives on the protocol engine's thread; owns the
/// dirty-region detector and the previous-frame snapshot.
pub struct SessionProducer {
    detector: DirtyRegionDetector,
    /// Generation this producer last observed; a bump means a resize
    /// landed and the next delivery must be a full frame.
    seen_generation: u64,
    tx: FrameSender,
    shared: Arc<SessionShared>,
}

impl SessionProducer {
    /// Engine callback: the primary buffer has been (re)written.
    ///
    /// `full_update` bypasses diffing and forces a whole-frame rect.
    /// After a resize the first call publishes a full frame regardless,
    /// re-synchronizing the consumer at the new geometry.
    pub fn on_frame_ready(&mut self, frame: &FrameBuffer, full_update: bool) {
        let generation = self.shared.generation.load(Ordering::Acquire);
        if generation != self.seen_generation {
            trace!(
                from = self.seen_generation,
                to = generation,
                "generation changed, resetting detector"
            );
            self.detector.reset();
            self.seen_generation = generation;
        }
        if full_update {
            self.detector.reset();
        }

        let rects = match self.detector.detect(frame) {
            DiffOutcome::Unchanged => return,
            DiffOutcome::FullFrame(r) => vec![r],
            DiffOutcome::Blocks(v) => v,
        };

        trace!(generation, rects = rects.len(), "publishing delivery");
        self.tx.publish(PendingDelivery {
            frame: frame.clone(),
            rects,
            generation,
        });
    }

    /// Engine callback: capability negotiation finished.
    ///
    /// Without display control the resize machine stays permanently
    /// idle and the session keeps its fixed geometry.
    pub fn on_capability_negotiated(&self, display_control: bool) {
        info!(display_control, "session capabilities negotiated");
        self.shared.lock_negotiator().set_capability(display_control);
    }

    /// Engine callback: the session ended.
    ///
    /// Terminal: the channel is torn down and any in-flight resize is
    /// abandoned with no partial geometry change.
    pub fn on_disconnect(&mut self) {
        info!("session disconnected, tearing down pipeline");
        self.tx.close();
        self.shared.lock_negotiator().abort();
        self.detector.reset();
    }
}

// ── SessionConsumer ──────────────────────────────────────────────

/// Render-thread half. The sole owner of frames after they are taken.
pub struct SessionConsumer {
    rx: FrameReceiver,
    shared: Arc<SessionShared>,
}

impl SessionConsumer {
    /// Non-blocking drain, called on the consumer's own poll cadence
    /// (~10 ms) or after [`paint_ready`](Self::paint_ready).
    ///
    /// A delivery tagged with a generation other than the current one
    /// is dropped here, never surfaced: its rects are meaningless
    /// against the resized surface, and the producer's next delivery
    /// is a full frame anyway.
    pub fn poll(&mut self) -> Option<(FrameBuffer, Vec<Rect>)> {
        let delivery = self.rx.take()?;
        let current = self.shared.generation.load(Ordering::Acquire);
        if delivery.generation != current {
            // Recovered locally, never surfaced to the caller.
            let cause = SyncError::GeometryMismatch {
                delivery: delivery.generation,
                current,
            };
            debug!(%cause, "discarding delivery at poll");
            return None;
        }
        Some((delivery.frame, delivery.rects))
    }

    /// Drain into a [`RenderSink`]. Returns whether anything was
    /// repainted.
    pub fn poll_into(&mut self, sink: &mut dyn RenderSink) -> bool {
        match self.poll() {
            Some((frame, rects)) => {
                sink.repaint(&frame, &rects);
                true
            }
            None => false,
        }
    }

    /// Await the paint-ready signal (or teardown).
    pub async fn paint_ready(&self) {
        self.rx.paint_ready().await;
    }

    /// The rendering surface's available area changed.
    ///
    /// The desired size is clamped to the protocol's supported
    /// monitor bounds before entering the debounce machine.
    pub fn request_resize(&self, width: u32, height: u32) -> Result<(), SyncError> {
        let target = Extent::new(width, height)
            .clamp(self.shared.config.min_extent, self.shared.config.max_extent);
        self.shared
            .lock_negotiator()
            .request(target, Instant::now())
    }

    /// Drive the resize machine: runs the commit protocol when the
    /// debounce window has elapsed.
    ///
    /// On acceptance: the engine buffer is reallocated, the generation
    /// bumped, and any now-stale pending delivery cleared — in that
    /// order, so the consumer can never pair old-size rects with a
    /// new-size buffer. Returns the committed extent, if any.
    pub fn pump_resize(&self, now: Instant) -> Option<Extent> {
        let target = self.shared.lock_negotiator().tick(now)?;

        // The outbound call is made without holding the negotiator
        // lock; a request arriving meanwhile is queued (Committing).
        let accepted = self.shared.control.request_layout_change(target);

        let mut negotiator = self.shared.lock_negotiator();
        if self.rx.is_closed() || negotiator.phase() != ResizePhase::Committing {
            // Teardown raced the commit: abandon it before any side
            // effect, leaving geometry and generation untouched.
            debug!(%target, "resize commit abandoned at teardown");
            negotiator.abort();
            return None;
        }

        if accepted {
            self.shared.control.reallocate(target);
            let generation = self.shared.generation.fetch_add(1, Ordering::AcqRel) + 1;
            self.rx.discard_stale(generation);
            *self.shared.lock_geometry() = target;
            // Cannot fail: the lock is held and the phase checked.
            let extent = negotiator.commit_accepted(now).ok()?;
            info!(%extent, generation, "resize committed");
            Some(extent)
        } else {
            debug!(%target, "layout change rejected by remote");
            let _ = negotiator.commit_rejected(now);
            None
        }
    }

    /// Current geometry generation.
    pub fn generation(&self) -> u64 {
        self.shared.generation.load(Ordering::Acquire)
    }

    /// Geometry of the last committed layout (the initial extent until
    /// a resize is accepted). Combined with the surface's scale factor
    /// — owned by the windowing toolkit — this is what callers use to
    /// compute the desired size passed to
    /// [`request_resize`](Self::request_resize).
    pub fn current_geometry(&self) -> Extent {
        *self.shared.lock_geometry()
    }

    /// Current resize phase (diagnostics).
    pub fn resize_phase(&self) -> ResizePhase {
        self.shared.lock_negotiator().phase()
    }

    /// Consumer-side teardown (local disconnect).
    pub fn close(&self) {
        self.rx.close();
        self.shared.lock_negotiator().abort();
    }

    pub fn is_closed(&self) -> bool {
        self.rx.is_closed()
    }
}

// ── Tests ────────────────────────────────────────────────────────
