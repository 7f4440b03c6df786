//! Frame buffer and geometry types shared across the pipeline.
//!
//! A [`FrameBuffer`] is the unit exchanged between the producer (the
//! protocol engine's decode path) and the consumer (the render thread).
//! Once published into the channel it is immutable: ownership transfers,
//! it never aliases.

use std::fmt;

use crate::error::SyncError;

// ── PixelFormat ──────────────────────────────────────────────────

/// Pixel layout for decoded frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    /// 4 bytes per pixel: Blue, Green, Red, Alpha (GDI/RDP default).
    Bgra8,
    /// 4 bytes per pixel: Red, Green, Blue, Alpha.
    Rgba8,
}

impl PixelFormat {
    /// Bytes consumed by a single pixel in this format.
    pub const fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::Bgra8 | PixelFormat::Rgba8 => 4,
        }
    }
}

// ── Extent ───────────────────────────────────────────────────────

/// A width × height pair in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Extent {
    pub width: u32,
    pub height: u32,
}

impl Extent {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Clamp both axes into `[min, max]`.
    pub fn clamp(self, min: u32, max: u32) -> Self {
        Self {
            width: self.width.clamp(min, max),
            height: self.height.clamp(min, max),
        }
    }
}

impl fmt::Display for Extent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

// ── Rect ─────────────────────────────────────────────────────────

/// A rectangular region of a frame, in pixels.
///
/// Invariant (enforced where rects are produced): `x + width` and
/// `y + height` never exceed the extent of the frame the rect refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// A rect covering an entire frame of the given extent.
    pub const fn full(extent: Extent) -> Self {
        Self {
            x: 0,
            y: 0,
            width: extent.width,
            height: extent.height,
        }
    }

    /// Area in pixels.
    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// Whether the pixel `(px, py)` lies inside this rect.
    pub fn contains(&self, px: u32, py: u32) -> bool {
        px >= self.x && px < self.x + self.width && py >= self.y && py < self.y + self.height
    }

    /// Whether `other` lies entirely inside this rect.
    pub fn contains_rect(&self, other: &Rect) -> bool {
        other.x >= self.x
            && other.y >= self.y
            && other.x + other.width <= self.x + self.width
            && other.y + other.height <= self.y + self.height
    }

    /// Smallest rect covering both `self` and `other`.
    pub fn union(&self, other: &Rect) -> Rect {
        let x0 = self.x.min(other.x);
        let y0 = self.y.min(other.y);
        let x1 = (self.x + self.width).max(other.x + other.width);
        let y1 = (self.y + self.height).max(other.y + other.height);
        Rect::new(x0, y0, x1 - x0, y1 - y0)
    }
}

// ── FrameBuffer ──────────────────────────────────────────────────

/// An owned, fixed-stride pixel buffer plus its dimensions.
///
/// The `data` buffer holds `height` rows of `stride` bytes each.
/// `stride` may exceed `width * bytes_per_pixel` due to row-alignment
/// padding from the decode path.
#[derive(Debug, Clone)]
pub struct FrameBuffer {
    width: u32,
    height: u32,
    stride: u32,
    format: PixelFormat,
    data: Vec<u8>,
}

impl FrameBuffer {
    /// Create a buffer, validating the stride/storage invariants.
    pub fn new(
        width: u32,
        height: u32,
        stride: u32,
        format: PixelFormat,
        data: Vec<u8>,
    ) -> Result<Self, SyncError> {
        if width == 0 || height == 0 {
            return Err(SyncError::InvalidGeometry("width and height must be > 0"));
        }
        if (stride as usize) < width as usize * format.bytes_per_pixel() {
            return Err(SyncError::InvalidGeometry("stride shorter than a pixel row"));
        }
        if data.len() != stride as usize * height as usize {
            return Err(SyncError::InvalidGeometry("storage is not stride * height bytes"));
        }
        Ok(Self {
            width,
            height,
            stride,
            format,
            data,
        })
    }

    /// A tightly-packed buffer of the given extent, every byte `fill`.
    ///
    /// # Panics
    ///
    /// Panics if either axis of `extent` is zero.
    pub fn filled(extent: Extent, format: PixelFormat, fill: u8) -> Self {
        assert!(
            extent.width > 0 && extent.height > 0,
            "extent must be non-zero"
        );
        let stride = extent.width * format.bytes_per_pixel() as u32;
        // Remaining invariants hold by construction.
        Self {
            width: extent.width,
            height: extent.height,
            stride,
            format,
            data: vec![fill; stride as usize * extent.height as usize],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Row pitch in bytes.
    pub fn stride(&self) -> u32 {
        self.stride
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn extent(&self) -> Extent {
        Extent::new(self.width, self.height)
    }

    /// Total byte size the bitmap occupies.
    pub fn byte_len(&self) -> usize {
        self.data.len()
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Row `y`, including padding bytes.
    pub fn row(&self, y: u32) -> &[u8] {
        let start = y as usize * self.stride as usize;
        &self.data[start..start + self.stride as usize]
    }

    /// The pixel bytes of row `y` from column `x0` up to (not
    /// including) column `x1`.
    pub fn row_span(&self, y: u32, x0: u32, x1: u32) -> &[u8] {
        let bpp = self.format.bytes_per_pixel();
        let start = y as usize * self.stride as usize + x0 as usize * bpp;
        let end = y as usize * self.stride as usize + x1 as usize * bpp;
        &self.data[start..end]
    }

    /// Fill a rectangular region with a single byte value.
    ///
    /// Used by the producer-side decode shim and by tests to stage
    /// frame content; fails rather than clipping if `rect` overflows.
    pub fn write_rect(&mut self, rect: Rect, fill: u8) -> Result<(), SyncError> {
        if rect.x + rect.width > self.width || rect.y + rect.height > self.height {
            return Err(SyncError::RectOutOfBounds {
                x: rect.x,
                y: rect.y,
                width: rect.width,
                height: rect.height,
                bounds: self.extent(),
            });
        }
        let bpp = self.format.bytes_per_pixel();
        for y in rect.y..rect.y + rect.height {
            let start = y as usize * self.stride as usize + rect.x as usize * bpp;
            let end = start + rect.width as usize * bpp;
            self.data[start..end].fill(fill);
        }
        Ok(())
    }
}

// ── Tests ────────────────────────────────────────────────────────
