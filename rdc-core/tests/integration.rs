//! Integration tests — full session lifecycle: connect, incremental
//! updates, a dynamic resize mid-stream, and teardown, with the
//! producer and consumer on separate threads where it matters.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Instant;

use rdc_core::{
    DisplayControl, Extent, FrameBuffer, PixelFormat, Rect, SessionConfig, SessionConsumer,
    SessionProducer, session,
};

// ── Helpers ──────────────────────────────────────────────────────

/// Engine stand-in: accepts layout changes and remembers the last
/// geometry it was asked to reallocate at.
struct StubEngine {
    accept: bool,
    layout_calls: AtomicUsize,
    reallocated: std::sync::Mutex<Option<Extent>>,
}

impl StubEngine {
    fn new(accept: bool) -> Arc<Self> {
        Arc::new(Self {
            accept,
            layout_calls: AtomicUsize::new(0),
            reallocated: std::sync::Mutex::new(None),
        })
    }
}

impl DisplayControl for StubEngine {
    fn request_layout_change(&self, _extent: Extent) -> bool {
        self.layout_calls.fetch_add(1, Ordering::SeqCst);
        self.accept
    }

    fn reallocate(&self, extent: Extent) {
        *self.reallocated.lock().unwrap() = Some(extent);
    }
}

fn connect(engine: Arc<StubEngine>) -> (SessionProducer, SessionConsumer) {
    let (producer, consumer) = session(SessionConfig::default(), engine);
    producer.on_capability_negotiated(true);
    (producer, consumer)
}

fn black_frame(w: u32, h: u32) -> FrameBuffer {
    FrameBuffer::filled(Extent::new(w, h), PixelFormat::Bgra8, 0)
}

// ── End-to-end scenario ──────────────────────────────────────────

#[test]
fn full_session_scenario() {
    let engine = StubEngine::new(true);
    let (mut producer, mut consumer) = connect(Arc::clone(&engine));

    // Connect: full-frame delivery of a 1024x768 black frame.
    producer.on_frame_ready(&black_frame(1024, 768), true);
    let (fb, rects) = consumer.poll().expect("initial full frame");
    assert_eq!(fb.extent(), Extent::new(1024, 768));
    assert_eq!(rects, vec![Rect::new(0, 0, 1024, 768)]);

    // Engine updates a 64x64 region at (100, 100).
    let mut updated = black_frame(1024, 768);
    updated.write_rect(Rect::new(100, 100, 64, 64), 0xFF).unwrap();
    producer.on_frame_ready(&updated, false);

    let (_, rects) = consumer.poll().expect("incremental delivery");
    for px in [(100, 100), (163, 100), (100, 163), (163, 163)] {
        assert!(
            rects.iter().any(|r| r.contains(px.0, px.1)),
            "update corner {px:?} not covered by {rects:?}"
        );
    }
    // No dirty rect outside the touched vicinity (block-aligned slop
    // of one tile is allowed on each side).
    for r in &rects {
        assert!(r.x >= 64 && r.x + r.width <= 192, "spurious rect {r:?}");
        assert!(r.y >= 64 && r.y + r.height <= 192, "spurious rect {r:?}");
    }

    // Publish another update the consumer does not drain, then resize.
    let mut pending = updated.clone();
    pending.write_rect(Rect::new(0, 0, 8, 8), 0x33).unwrap();
    producer.on_frame_ready(&pending, false);

    consumer.request_resize(1280, 720).unwrap();
    let committed = consumer.pump_resize(Instant::now() + rdc_core::DEFAULT_DEBOUNCE);
    assert_eq!(committed, Some(Extent::new(1280, 720)));
    assert_eq!(consumer.generation(), 1);
    assert_eq!(consumer.current_geometry(), Extent::new(1280, 720));
    assert_eq!(
        *engine.reallocated.lock().unwrap(),
        Some(Extent::new(1280, 720))
    );

    // The undrained old-geometry delivery is unobservable.
    assert!(consumer.poll().is_none());

    // Full-frame delivery at the new geometry resumes the stream.
    producer.on_frame_ready(&black_frame(1280, 720), false);
    let (fb, rects) = consumer.poll().expect("post-resize full frame");
    assert_eq!(fb.extent(), Extent::new(1280, 720));
    assert_eq!(rects, vec![Rect::new(0, 0, 1280, 720)]);

    // Incremental updates work at the new geometry.
    let mut next = black_frame(1280, 720);
    next.write_rect(Rect::new(640, 360, 16, 16), 0x55).unwrap();
    producer.on_frame_ready(&next, false);
    let (_, rects) = consumer.poll().expect("post-resize incremental");
    assert!(rects.iter().any(|r| r.contains(640, 360)));
    assert!(rects[0].area() < 1280 * 720);
}

// ── Coalescing under a slow consumer ─────────────────────────────

#[test]
fn slow_consumer_sees_union_of_missed_updates() {
    let engine = StubEngine::new(true);
    let (mut producer, mut consumer) = connect(engine);

    producer.on_frame_ready(&black_frame(256, 256), true);
    let _ = consumer.poll();

    // Three publishes with no intervening poll; two distinct regions.
    let mut f1 = black_frame(256, 256);
    f1.write_rect(Rect::new(0, 0, 16, 16), 1).unwrap();
    producer.on_frame_ready(&f1, false);

    let mut f2 = f1.clone();
    f2.write_rect(Rect::new(200, 200, 16, 16), 2).unwrap();
    producer.on_frame_ready(&f2, false);

    let (fb, rects) = consumer.poll().expect("coalesced delivery");
    // Newest payload...
    assert_eq!(fb.data(), f2.data());
    // ...and rect knowledge accumulated across both updates.
    assert!(rects.iter().any(|r| r.contains(0, 0)));
    assert!(rects.iter().any(|r| r.contains(200, 200)));
}

// ── Rejection path ───────────────────────────────────────────────

#[test]
fn rejected_resize_keeps_streaming_at_old_geometry() {
    let engine = StubEngine::new(false);
    let (mut producer, mut consumer) = connect(Arc::clone(&engine));

    producer.on_frame_ready(&black_frame(800, 600), true);
    let _ = consumer.poll();

    consumer.request_resize(1920, 1080).unwrap();
    assert!(consumer
        .pump_resize(Instant::now() + rdc_core::DEFAULT_DEBOUNCE)
        .is_none());
    assert_eq!(consumer.generation(), 0);
    assert!(engine.reallocated.lock().unwrap().is_none());

    // Stream continues untouched.
    let mut f = black_frame(800, 600);
    f.write_rect(Rect::new(10, 10, 4, 4), 9).unwrap();
    producer.on_frame_ready(&f, false);
    assert!(consumer.poll().is_some());
}

// ── Teardown racing a commit ─────────────────────────────────────

#[test]
fn teardown_mid_commit_applies_no_geometry_change() {
    let engine = StubEngine::new(true);
    let (mut producer, consumer) = connect(Arc::clone(&engine));

    // Debounce has elapsed, but the session drops before the commit
    // is driven.
    consumer.request_resize(1280, 720).unwrap();
    producer.on_disconnect();

    assert!(consumer
        .pump_resize(Instant::now() + rdc_core::DEFAULT_DEBOUNCE)
        .is_none());

    // The commit was abandoned outright: no outbound call, no
    // reallocation, no generation bump, geometry untouched.
    assert_eq!(engine.layout_calls.load(Ordering::SeqCst), 0);
    assert!(engine.reallocated.lock().unwrap().is_none());
    assert_eq!(consumer.generation(), 0);
    assert_eq!(consumer.current_geometry(), Extent::new(1024, 768));
    assert!(consumer.is_closed());
}

// ── Threaded producer/consumer ───────────────────────────────────

#[test]
fn threaded_handoff_never_tears() {
    // The producer flips the whole frame between two solid colors as
    // fast as it can; every frame the consumer takes must be entirely
    // one color — a mixed buffer would mean the payload aliased.
    let engine = StubEngine::new(true);
    let (mut producer, mut consumer) = connect(engine);

    let stop = Arc::new(AtomicBool::new(false));
    let producer_stop = Arc::clone(&stop);
    let handle = std::thread::spawn(move || {
        let mut color = 0u8;
        while !producer_stop.load(Ordering::Relaxed) {
            producer.on_frame_ready(&black_frame(64, 64), false);
            color = color.wrapping_add(1);
            let f = FrameBuffer::filled(Extent::new(64, 64), PixelFormat::Bgra8, color);
            producer.on_frame_ready(&f, false);
        }
        producer.on_disconnect();
    });

    let mut seen = 0;
    while seen < 200 {
        if let Some((fb, _)) = consumer.poll() {
            let first = fb.data()[0];
            assert!(
                fb.data().iter().all(|&b| b == first),
                "torn frame observed"
            );
            seen += 1;
        } else {
            std::thread::yield_now();
        }
    }

    stop.store(true, Ordering::Relaxed);
    handle.join().unwrap();

    // Post-teardown the channel reports empty forever.
    assert!(consumer.is_closed());
    assert!(consumer.poll().is_none());
}
