use std::fmt;

use smallvec::SmallVec;

use crate::format::{ChromaOrder, FrameDimensions, MediaFormat};
use crate::plane::PlaneDescriptor;

/// Errors raised when wrapping a buffer whose length does not match its geometry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    LengthMismatch { expected: usize, actual: usize },
}

impl fmt::Display for FrameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameError::LengthMismatch { expected, actual } => {
                write!(f, "frame buffer is {actual} bytes, expected {expected}")
            }
        }
    }
}

impl std::error::Error for FrameError {}

/// Metadata associated with a frame.
///
/// # Example
/// ```rust
/// use edgeview_core::prelude::{FourCc, FrameMeta, MediaFormat, Resolution};
///
/// let fmt = MediaFormat::new(FourCc::YUV_420_888, Resolution::new(640, 480).unwrap());
/// let meta = FrameMeta::new(fmt, 123);
/// assert_eq!(meta.timestamp, 123);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct FrameMeta {
    /// Format describing layout and resolution.
    pub format: MediaFormat,
    /// Timestamp in ticks or nanoseconds (source-defined).
    pub timestamp: u64,
}

impl FrameMeta {
    pub fn new(format: MediaFormat, timestamp: u64) -> Self {
        Self { format, timestamp }
    }
}

/// Where one plane lives inside a [`RawFrame`]'s buffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawPlaneLayout {
    /// Index into the frame's buffer list.
    pub buffer: usize,
    /// Byte offset of the first sample.
    pub offset: usize,
    pub row_stride: usize,
    pub pixel_stride: usize,
}

impl RawPlaneLayout {
    pub fn new(buffer: usize, offset: usize, row_stride: usize, pixel_stride: usize) -> Self {
        Self {
            buffer,
            offset,
            row_stride,
            pixel_stride,
        }
    }
}

/// Frame as handed over by a capture source, before any conversion.
///
/// Planes reference owned buffers by index, so two planes may share one
/// buffer (interleaved chroma) without copying.
///
/// # Example
/// ```rust
/// use edgeview_core::prelude::*;
/// use smallvec::smallvec;
///
/// let fmt = MediaFormat::new(FourCc::YUV_420_888, Resolution::new(2, 2).unwrap());
/// let frame = RawFrame::new(
///     FrameMeta::new(fmt, 0),
///     smallvec![vec![0u8; 4], vec![128u8, 128]],
///     smallvec![
///         RawPlaneLayout::new(0, 0, 2, 1),
///         RawPlaneLayout::new(1, 1, 2, 2),
///         RawPlaneLayout::new(1, 0, 2, 2),
///     ],
/// );
/// assert_eq!(frame.planes().len(), 3);
/// ```
#[derive(Debug, Clone)]
pub struct RawFrame {
    meta: FrameMeta,
    buffers: SmallVec<[Vec<u8>; 3]>,
    layouts: SmallVec<[RawPlaneLayout; 3]>,
}

impl RawFrame {
    pub fn new(
        meta: FrameMeta,
        buffers: SmallVec<[Vec<u8>; 3]>,
        layouts: SmallVec<[RawPlaneLayout; 3]>,
    ) -> Self {
        Self {
            meta,
            buffers,
            layouts,
        }
    }

    pub fn meta(&self) -> &FrameMeta {
        &self.meta
    }

    pub fn layouts(&self) -> &[RawPlaneLayout] {
        &self.layouts
    }

    /// Borrowed plane views in layout order.
    ///
    /// A layout pointing at a missing buffer yields an empty plane, which
    /// later fails bounds validation rather than panicking here.
    pub fn planes(&self) -> SmallVec<[PlaneDescriptor<'_>; 3]> {
        self.layouts
            .iter()
            .map(|layout| {
                let data = self
                    .buffers
                    .get(layout.buffer)
                    .map(Vec::as_slice)
                    .unwrap_or(&[]);
                PlaneDescriptor::with_offset(
                    data,
                    layout.offset,
                    layout.row_stride,
                    layout.pixel_stride,
                )
            })
            .collect()
    }
}

/// Repacked 4:2:0 frame: `width * height` luma bytes followed by
/// `width * height / 2` bytes of interleaved chroma pairs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SemiplanarYuv {
    dims: FrameDimensions,
    order: ChromaOrder,
    data: Vec<u8>,
}

impl SemiplanarYuv {
    /// Wrap an existing buffer; its length must be exactly `dims.semiplanar_len()`.
    pub fn from_vec(
        dims: FrameDimensions,
        order: ChromaOrder,
        data: Vec<u8>,
    ) -> Result<Self, FrameError> {
        if data.len() != dims.semiplanar_len() {
            return Err(FrameError::LengthMismatch {
                expected: dims.semiplanar_len(),
                actual: data.len(),
            });
        }
        Ok(Self { dims, order, data })
    }

    pub fn dims(&self) -> FrameDimensions {
        self.dims
    }

    pub fn order(&self) -> ChromaOrder {
        self.order
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn luma(&self) -> &[u8] {
        &self.data[..self.dims.pixel_count()]
    }

    pub fn chroma(&self) -> &[u8] {
        &self.data[self.dims.pixel_count()..]
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.data
    }
}

/// Packed RGBA frame, 4 bytes per pixel, rows back to back.
///
/// # Example
/// ```rust
/// use edgeview_core::prelude::{FrameDimensions, RgbaFrame};
///
/// let dims = FrameDimensions::new(2, 2).unwrap();
/// let frame = RgbaFrame::from_vec(dims, vec![255; 16]).unwrap();
/// assert_eq!(frame.pixel(1, 1), Some([255, 255, 255, 255]));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RgbaFrame {
    dims: FrameDimensions,
    data: Vec<u8>,
}

impl RgbaFrame {
    /// Wrap an existing buffer; its length must be exactly `dims.rgba_len()`.
    pub fn from_vec(dims: FrameDimensions, data: Vec<u8>) -> Result<Self, FrameError> {
        if data.len() != dims.rgba_len() {
            return Err(FrameError::LengthMismatch {
                expected: dims.rgba_len(),
                actual: data.len(),
            });
        }
        Ok(Self { dims, data })
    }

    /// Black, fully opaque frame.
    pub fn opaque_black(dims: FrameDimensions) -> Self {
        let mut data = vec![0u8; dims.rgba_len()];
        data.chunks_exact_mut(4).for_each(|px| px[3] = 255);
        Self { dims, data }
    }

    pub fn dims(&self) -> FrameDimensions {
        self.dims
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.dims.width() || y >= self.dims.height() {
            return None;
        }
        let idx = (y as usize * self.dims.width() as usize + x as usize) * 4;
        let px = self.data.get(idx..idx + 4)?;
        Some([px[0], px[1], px[2], px[3]])
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.data
    }
}
