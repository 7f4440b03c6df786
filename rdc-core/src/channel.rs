//! Single-slot frame handoff between the producer and consumer threads.
//!
//! The channel holds **at most one** pending delivery. Publishing over
//! an unconsumed delivery overwrites it (union-ing its rects when the
//! generation matches), so a slow consumer drops intermediate frames
//! instead of queueing them: overwrite *is* the backpressure mechanism,
//! which caps memory and keeps the producer from ever blocking on the
//! consumer.
//!
//! The critical section is sized to the slot, never the pixel payload —
//! ownership of a [`FrameBuffer`] transfers through the slot, it does
//! not alias.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::Notify;
use tracing::{debug, trace};

use crate::frame::{FrameBuffer, Rect};

// ── PendingDelivery ──────────────────────────────────────────────

/// The unit exchanged through the channel: a frame snapshot, the rects
/// that changed since the last delivery, and the geometry generation
/// the rects were computed against.
#[derive(Debug, Clone)]
pub struct PendingDelivery {
    pub frame: FrameBuffer,
    pub rects: Vec<Rect>,
    pub generation: u64,
}

// ── Channel internals ────────────────────────────────────────────

struct Shared {
    slot: Mutex<Option<PendingDelivery>>,
    torn_down: AtomicBool,
    /// Paint-ready signal for event-driven consumers.
    paint_ready: Notify,
}

impl Shared {
    fn lock_slot(&self) -> std::sync::MutexGuard<'_, Option<PendingDelivery>> {
        // A poisoned slot only means a panicking thread died mid-swap;
        // the Option inside is still structurally sound.
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn close(&self) {
        self.torn_down.store(true, Ordering::Release);
        self.lock_slot().take();
        // Wake a consumer parked on paint_ready so it observes closure.
        self.paint_ready.notify_waiters();
        debug!("frame channel torn down");
    }

    fn is_closed(&self) -> bool {
        self.torn_down.load(Ordering::Acquire)
    }
}

/// Create a connected producer/consumer pair.
pub fn frame_channel() -> (FrameSender, FrameReceiver) {
    let shared = Arc::new(Shared {
        slot: Mutex::new(None),
        torn_down: AtomicBool::new(false),
        paint_ready: Notify::new(),
    });
    (
        FrameSender {
            shared: Arc::clone(&shared),
        },
        FrameReceiver { shared },
    )
}

// ── FrameSender ──────────────────────────────────────────────────

/// Producer half. Held by the protocol-engine side.
pub struct FrameSender {
    shared: Arc<Shared>,
}

impl FrameSender {
    /// Publish a delivery, replacing any unconsumed one.
    ///
    /// If the displaced delivery carries the same generation, its rects
    /// are folded into the new one so no changed region is silently
    /// lost; the frame payload is always the newest snapshot. A
    /// displaced delivery from an older generation is discarded
    /// outright — its rects are meaningless against the new geometry.
    ///
    /// After teardown this is a no-op.
    pub fn publish(&self, mut delivery: PendingDelivery) {
        {
            let mut slot = self.shared.lock_slot();
            // Checked under the lock: close() clears the slot under
            // the same lock after raising the flag, so a delivery can
            // never be parked in a torn-down channel.
            if self.shared.is_closed() {
                return;
            }
            match slot.take() {
                Some(old) if old.generation == delivery.generation => {
                    trace!(
                        generation = delivery.generation,
                        displaced_rects = old.rects.len(),
                        "coalescing unconsumed delivery"
                    );
                    merge_rects(&mut delivery.rects, old.rects);
                }
                Some(old) => {
                    debug!(
                        stale = old.generation,
                        current = delivery.generation,
                        "discarding stale-generation delivery"
                    );
                }
                None => {}
            }
            *slot = Some(delivery);
        }

        self.shared.paint_ready.notify_one();
    }

    /// Terminal teardown. Safe to race with `publish`/`take`.
    pub fn close(&self) {
        self.shared.close();
    }

    pub fn is_closed(&self) -> bool {
        self.shared.is_closed()
    }
}

// ── FrameReceiver ────────────────────────────────────────────────

/// Consumer half. Held by the render thread.
pub struct FrameReceiver {
    shared: Arc<Shared>,
}

impl FrameReceiver {
    /// Remove and return the pending delivery, if any.
    ///
    /// `None` means "nothing new", not an error; after teardown this
    /// always returns `None`.
    pub fn take(&self) -> Option<PendingDelivery> {
        if self.shared.is_closed() {
            return None;
        }
        self.shared.lock_slot().take()
    }

    /// Drop a pending delivery whose generation no longer matches.
    ///
    /// Called by the resize commit so the consumer can never paint a
    /// rect list computed against a buffer of the old size.
    pub fn discard_stale(&self, current_generation: u64) {
        let mut slot = self.shared.lock_slot();
        if let Some(pending) = slot.as_ref()
            && pending.generation != current_generation
        {
            debug!(
                stale = pending.generation,
                current = current_generation,
                "dropping pending delivery after resize"
            );
            slot.take();
        }
    }

    /// Wait until a delivery is published or the channel is torn down.
    ///
    /// An alternative to fixed-interval polling for consumers that have
    /// a paint-ready signal to hook into.
    pub async fn paint_ready(&self) {
        if self.shared.is_closed() {
            return;
        }
        self.shared.paint_ready.notified().await;
    }

    /// Terminal teardown from the consumer side (disconnect).
    pub fn close(&self) {
        self.shared.close();
    }

    pub fn is_closed(&self) -> bool {
        self.shared.is_closed()
    }

    #[cfg(test)]
    pub(crate) fn slot_is_occupied(&self) -> bool {
        self.shared.lock_slot().is_some()
    }
}

// ── Coalescing ───────────────────────────────────────────────────

/// Fold `displaced` into `rects` so the result covers both sets.
///
/// Exact duplicates and rects already covered by an existing entry are
/// skipped; remaining overlap is permitted (wasteful, not incorrect).
fn merge_rects(rects: &mut Vec<Rect>, displaced: Vec<Rect>) {
    for old in displaced {
        if !rects.iter().any(|r| r.contains_rect(&old)) {
            rects.push(old);
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{Extent, PixelFormat};

    fn delivery(generation: u64, fill: u8, rects: Vec<Rect>) -> PendingDelivery {
        PendingDelivery {
            frame: FrameBuffer::filled(Extent::new(64, 64), PixelFormat::Bgra8, fill),
            rects,
            generation,
        }
    }

    #[test]
    fn empty_channel_reports_nothing_new() {
        let (_tx, rx) = frame_channel();
        assert!(rx.take().is_none());
    }

    #[test]
    fn publish_then_take() {
        let (tx, rx) = frame_channel();
        tx.publish(delivery(0, 1, vec![Rect::new(0, 0, 32, 32)]));
        let got = rx.take().unwrap();
        assert_eq!(got.generation, 0);
        assert_eq!(got.rects, vec![Rect::new(0, 0, 32, 32)]);
        assert!(rx.take().is_none());
    }

    #[test]
    fn same_generation_overwrite_unions_rects() {
        let (tx, rx) = frame_channel();
        let r1 = Rect::new(0, 0, 32, 32);
        let r2 = Rect::new(32, 32, 32, 32);
        tx.publish(delivery(0, 1, vec![r1]));
        tx.publish(delivery(0, 2, vec![r2]));

        let got = rx.take().unwrap();
        // Newest payload, union of rects.
        assert_eq!(got.frame.data()[0], 2);
        assert!(got.rects.contains(&r1));
        assert!(got.rects.contains(&r2));
    }

    #[test]
    fn covered_rects_are_not_duplicated() {
        let (tx, rx) = frame_channel();
        tx.publish(delivery(0, 1, vec![Rect::new(0, 0, 16, 16)]));
        tx.publish(delivery(0, 2, vec![Rect::new(0, 0, 64, 64)]));
        let got = rx.take().unwrap();
        assert_eq!(got.rects, vec![Rect::new(0, 0, 64, 64)]);
    }

    #[test]
    fn cross_generation_overwrite_discards_stale() {
        let (tx, rx) = frame_channel();
        tx.publish(delivery(0, 1, vec![Rect::new(0, 0, 32, 32)]));
        tx.publish(delivery(1, 2, vec![Rect::new(0, 0, 64, 64)]));

        let got = rx.take().unwrap();
        assert_eq!(got.generation, 1);
        assert_eq!(got.rects, vec![Rect::new(0, 0, 64, 64)]);
    }

    #[test]
    fn discard_stale_drops_old_generation_only() {
        let (tx, rx) = frame_channel();
        tx.publish(delivery(0, 1, vec![Rect::new(0, 0, 32, 32)]));
        rx.discard_stale(1);
        assert!(rx.take().is_none());

        tx.publish(delivery(1, 2, vec![Rect::new(0, 0, 64, 64)]));
        rx.discard_stale(1);
        assert!(rx.take().is_some());
    }

    #[test]
    fn publish_after_teardown_is_noop() {
        let (tx, rx) = frame_channel();
        tx.close();
        tx.publish(delivery(0, 1, vec![]));
        assert!(rx.take().is_none());
        assert!(tx.is_closed());
        assert!(rx.is_closed());
    }

    #[test]
    fn teardown_clears_pending_delivery() {
        let (tx, rx) = frame_channel();
        tx.publish(delivery(0, 1, vec![]));
        rx.close();
        assert!(rx.take().is_none());
    }

    #[test]
    fn teardown_races_with_publish_and_take() {
        // Hammer publish/take while teardown fires mid-stream; the only
        // acceptable outcomes are a delivery or None, never a panic.
        for _ in 0..64 {
            let (tx, rx) = frame_channel();
            let producer = std::thread::spawn(move || {
                for i in 0..100u8 {
                    tx.publish(delivery(0, i, vec![Rect::new(0, 0, 1, 1)]));
                    if i == 50 {
                        tx.close();
                    }
                }
            });
            for _ in 0..100 {
                let _ = rx.take();
            }
            producer.join().unwrap();
            assert!(rx.take().is_none());
        }
    }

    #[test]
    fn close_racing_publish_leaves_no_resident_delivery() {
        // Whatever the interleaving, once both sides have finished the
        // slot must be empty: either publish observed the teardown
        // flag, or close cleared the slot afterwards.
        for _ in 0..256 {
            let (tx, rx) = frame_channel();
            let publisher = std::thread::spawn(move || {
                tx.publish(delivery(0, 1, vec![Rect::new(0, 0, 1, 1)]));
            });
            rx.close();
            publisher.join().unwrap();
            assert!(!rx.slot_is_occupied(), "delivery parked after teardown");
        }
    }

    #[tokio::test]
    async fn paint_ready_wakes_on_publish() {
        let (tx, rx) = frame_channel();
        let waiter = tokio::spawn(async move {
            rx.paint_ready().await;
            rx.take()
        });
        tokio::task::yield_now().await;
        tx.publish(delivery(0, 1, vec![Rect::new(0, 0, 8, 8)]));
        let got = tokio::time::timeout(std::time::Duration::from_secs(5), waiter)
            .await
            .expect("timeout")
            .unwrap();
        assert!(got.is_some());
    }

    #[tokio::test]
    async fn paint_ready_returns_after_teardown() {
        let (tx, rx) = frame_channel();
        tx.close();
        // Must not hang.
        rx.paint_ready().await;
    }
}
