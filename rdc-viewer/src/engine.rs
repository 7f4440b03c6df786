//! Loopback protocol engine.
//!
//! Stands in for the remote-desktop engine behind the producer
//! boundary: paints a moving square into its own primary buffer on a
//! dedicated thread and reports each finished frame through
//! `on_frame_ready`, exactly the cadence a decode loop would.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use rdc_core::{DisplayControl, Extent, FrameBuffer, PixelFormat, Rect, SessionProducer};
use tracing::info;

/// Engine stand-in that accepts every layout change.
pub struct LoopbackEngine {
    extent: Mutex<Extent>,
}

impl LoopbackEngine {
    pub fn new(extent: Extent) -> Arc<Self> {
        Arc::new(Self {
            extent: Mutex::new(extent),
        })
    }

    pub fn extent(&self) -> Extent {
        *self.extent.lock().unwrap()
    }
}

impl DisplayControl for LoopbackEngine {
    fn request_layout_change(&self, extent: Extent) -> bool {
        info!(%extent, "engine: layout change accepted");
        true
    }

    fn reallocate(&self, extent: Extent) {
        *self.extent.lock().unwrap() = extent;
    }
}

/// Spawn the engine thread; it runs until `stop` is raised, then
/// reports the disconnect through the producer.
pub fn spawn(
    engine: Arc<LoopbackEngine>,
    mut producer: SessionProducer,
    stop: Arc<AtomicBool>,
) -> JoinHandle<()> {
    std::thread::spawn(move || {
        producer.on_capability_negotiated(true);

        let mut step = 0u32;
        let mut last_extent = engine.extent();
        let mut frame = FrameBuffer::filled(last_extent, PixelFormat::Bgra8, 0);
        producer.on_frame_ready(&frame, true);

        while !stop.load(Ordering::Relaxed) {
            let extent = engine.extent();
            if extent != last_extent {
                // Resize landed: start over at the new geometry.
                frame = FrameBuffer::filled(extent, PixelFormat::Bgra8, 0);
                producer.on_frame_ready(&frame, true);
                last_extent = extent;
                step = 0;
            }

            // A 48x48 square marching diagonally, wrapping at the edges.
            let side = 48.min(extent.width).min(extent.height);
            let x = step.wrapping_mul(8) % (extent.width - side + 1);
            let y = step.wrapping_mul(8) % (extent.height - side + 1);
            frame = FrameBuffer::filled(extent, PixelFormat::Bgra8, 0);
            frame
                .write_rect(Rect::new(x, y, side, side), 0xFF)
                .expect("square stays in bounds");

            producer.on_frame_ready(&frame, false);
            step = step.wrapping_add(1);
            std::thread::sleep(Duration::from_millis(16));
        }

        producer.on_disconnect();
    })
}
