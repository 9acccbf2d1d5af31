use edgeview_core::prelude::*;
use rayon::prelude::*;

use crate::CodecError;

const CHANNEL_MAX: i32 = 262_143;

/// Convert one pixel with the fixed-point 4:2:0 coefficients.
///
/// `c1` is the first byte of the block's chroma pair and drives red; `c2` is
/// the second and drives blue. Only integer arithmetic is used, so results
/// are identical on every platform.
///
/// # Example
/// ```rust
/// use edgeview_codec::convert::yuv_to_rgba;
///
/// assert_eq!(yuv_to_rgba(16, 128, 128), [0, 0, 0, 255]);
/// assert_eq!(yuv_to_rgba(255, 128, 128), [255, 255, 255, 255]);
/// ```
#[inline(always)]
pub fn yuv_to_rgba(y: u8, c1: u8, c2: u8) -> [u8; 4] {
    let y = (i32::from(y) - 16).max(0);
    let c1 = i32::from(c1) - 128;
    let c2 = i32::from(c2) - 128;
    let y1192 = 1192 * y;
    let r = y1192 + 1634 * c1;
    let g = y1192 - 833 * c1 - 400 * c2;
    let b = y1192 + 2066 * c2;
    [channel(r), channel(g), channel(b), 0xFF]
}

#[inline(always)]
fn channel(value: i32) -> u8 {
    ((value.clamp(0, CHANNEL_MAX) >> 10) & 0xFF) as u8
}

/// Semiplanar YUV to RGBA converter.
///
/// Each chroma pair is shared by its 2x2 luma block without interpolation.
/// Rows are converted in parallel.
///
/// # Example
/// ```rust
/// use edgeview_codec::convert::ColorConverter;
/// use edgeview_core::prelude::*;
///
/// let dims = FrameDimensions::new(2, 2).unwrap();
/// let yuv = SemiplanarYuv::from_vec(dims, ChromaOrder::Ba, vec![235, 235, 235, 235, 128, 128]).unwrap();
/// let rgba = ColorConverter::new().convert(yuv);
/// assert_eq!(rgba.pixel(1, 1), Some([254, 254, 254, 255]));
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct ColorConverter;

impl ColorConverter {
    pub fn new() -> Self {
        Self
    }

    /// Convert and release the semiplanar buffer.
    pub fn convert(&self, yuv: SemiplanarYuv) -> RgbaFrame {
        let dims = yuv.dims();
        let mut frame = RgbaFrame::opaque_black(dims);
        convert_rows(&yuv, frame.as_bytes_mut());
        frame
    }

    /// Convert into a caller-provided buffer of exactly `dims.rgba_len()` bytes.
    pub fn convert_into(&self, yuv: &SemiplanarYuv, dst: &mut [u8]) -> Result<(), CodecError> {
        let expected = yuv.dims().rgba_len();
        if dst.len() != expected {
            return Err(CodecError::BufferSize {
                expected,
                actual: dst.len(),
            });
        }
        convert_rows(yuv, dst);
        Ok(())
    }
}

fn convert_rows(yuv: &SemiplanarYuv, dst: &mut [u8]) {
    let width = yuv.dims().width() as usize;
    let luma = yuv.luma();
    let chroma = yuv.chroma();
    dst.par_chunks_mut(width * 4)
        .enumerate()
        .for_each(|(row, dst_line)| {
            let y_line = &luma[row * width..][..width];
            // Chroma rows are `width` bytes: width / 2 pairs.
            let c_line = &chroma[(row / 2) * width..][..width];
            let blocks = y_line.chunks_exact(2).zip(c_line.chunks_exact(2));
            for (out, (ys, cs)) in dst_line.chunks_exact_mut(8).zip(blocks) {
                out[..4].copy_from_slice(&yuv_to_rgba(ys[0], cs[0], cs[1]));
                out[4..].copy_from_slice(&yuv_to_rgba(ys[1], cs[0], cs[1]));
            }
        });
}
