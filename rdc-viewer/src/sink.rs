//! Logging render sink.

use rdc_core::{FrameBuffer, Rect, RenderSink};
use tracing::{debug, info};

/// A [`RenderSink`] that logs what a widget would repaint.
#[derive(Default)]
pub struct TraceSink {
    deliveries: u64,
    repainted_px: u64,
}

impl TraceSink {
    pub fn deliveries(&self) -> u64 {
        self.deliveries
    }

    pub fn repainted_px(&self) -> u64 {
        self.repainted_px
    }
}

impl RenderSink for TraceSink {
    fn repaint(&mut self, frame: &FrameBuffer, rects: &[Rect]) {
        let area: u64 = rects.iter().map(Rect::area).sum();
        self.deliveries += 1;
        self.repainted_px += area;

        let full = frame.width() as u64 * frame.height() as u64;
        if area >= full {
            info!(extent = %frame.extent(), "repaint: full frame");
        } else {
            debug!(
                extent = %frame.extent(),
                rects = rects.len(),
                area,
                "repaint: partial"
            );
        }
    }
}
