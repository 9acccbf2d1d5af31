use edgeview_core::prelude::*;
use rayon::prelude::*;

use crate::CodecError;

/// Copies three strided 4:2:0 planes into one contiguous semiplanar buffer.
///
/// The output holds `width * height` luma bytes followed by one chroma pair
/// per 2x2 luma block. Which chroma plane lands first in a pair is fixed by
/// the repacker's [`ChromaOrder`]; with planes passed as `(U, V)` the default
/// writes `V,U` pairs (NV21).
///
/// Every descriptor is validated before a single byte is written, so a
/// malformed frame fails with an error and never reads out of bounds.
///
/// # Example
/// ```rust
/// use edgeview_codec::repack::YuvRepacker;
/// use edgeview_core::prelude::*;
///
/// let dims = FrameDimensions::new(2, 2).unwrap();
/// let luma = [1u8, 2, 3, 4];
/// let out = YuvRepacker::new(ChromaOrder::Ba)
///     .repack(
///         &PlaneDescriptor::packed(&luma, 2),
///         &PlaneDescriptor::packed(&[7], 1),
///         &PlaneDescriptor::packed(&[9], 1),
///         dims,
///     )
///     .unwrap();
/// assert_eq!(out.as_bytes(), &[1, 2, 3, 4, 9, 7]);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct YuvRepacker {
    order: ChromaOrder,
}

impl YuvRepacker {
    pub fn new(order: ChromaOrder) -> Self {
        Self { order }
    }

    pub fn order(&self) -> ChromaOrder {
        self.order
    }

    /// Repack into a freshly allocated buffer.
    pub fn repack(
        &self,
        luma: &PlaneDescriptor<'_>,
        chroma_a: &PlaneDescriptor<'_>,
        chroma_b: &PlaneDescriptor<'_>,
        dims: FrameDimensions,
    ) -> Result<SemiplanarYuv, CodecError> {
        let mut out = vec![0u8; dims.semiplanar_len()];
        self.repack_into(luma, chroma_a, chroma_b, dims, &mut out)?;
        SemiplanarYuv::from_vec(dims, self.order, out).map_err(
            |FrameError::LengthMismatch { expected, actual }| CodecError::BufferSize {
                expected,
                actual,
            },
        )
    }

    /// Repack a source frame laid out as `[Y, U, V]` planes.
    ///
    /// The frame must be [`FourCc::YUV_420_888`] with even, non-zero sides.
    pub fn repack_frame(&self, frame: &RawFrame) -> Result<SemiplanarYuv, CodecError> {
        let format = frame.meta().format;
        if format.code != FourCc::YUV_420_888 {
            return Err(CodecError::FormatMismatch {
                expected: FourCc::YUV_420_888,
                actual: format.code,
            });
        }
        let dims = FrameDimensions::from_resolution(format.resolution).ok_or(
            CodecError::InvalidDimensions {
                width: format.resolution.width.get(),
                height: format.resolution.height.get(),
            },
        )?;
        let planes = frame.planes();
        let [y, u, v] = match planes.as_slice() {
            [y, u, v, ..] => [y, u, v],
            other => return Err(CodecError::MissingPlanes(other.len())),
        };
        self.repack(y, u, v, dims)
    }

    /// Repack into a caller-provided buffer of exactly `dims.semiplanar_len()` bytes.
    pub fn repack_into(
        &self,
        luma: &PlaneDescriptor<'_>,
        chroma_a: &PlaneDescriptor<'_>,
        chroma_b: &PlaneDescriptor<'_>,
        dims: FrameDimensions,
        dst: &mut [u8],
    ) -> Result<(), CodecError> {
        if dst.len() != dims.semiplanar_len() {
            return Err(CodecError::BufferSize {
                expected: dims.semiplanar_len(),
                actual: dst.len(),
            });
        }
        let width = dims.width() as usize;
        let height = dims.height() as usize;
        let chroma_width = dims.chroma_width();
        let chroma_height = dims.chroma_height();
        validate_plane(0, luma, height, width)?;
        validate_plane(1, chroma_a, chroma_height, chroma_width)?;
        validate_plane(2, chroma_b, chroma_height, chroma_width)?;

        let (luma_dst, chroma_dst) = dst.split_at_mut(dims.pixel_count());
        copy_luma(luma, width, luma_dst);

        let (first, second) = match self.order {
            ChromaOrder::Ab => (chroma_a, chroma_b),
            ChromaOrder::Ba => (chroma_b, chroma_a),
        };
        interleave_chroma(first, second, chroma_width, chroma_dst);
        Ok(())
    }
}

fn validate_plane(
    index: usize,
    plane: &PlaneDescriptor<'_>,
    rows: usize,
    samples: usize,
) -> Result<(), CodecError> {
    let invalid = || CodecError::InvalidStride {
        plane: index,
        row_stride: plane.row_stride(),
        pixel_stride: plane.pixel_stride(),
    };
    if plane.pixel_stride() == 0 {
        return Err(invalid());
    }
    let row_span = (samples - 1)
        .checked_mul(plane.pixel_stride())
        .and_then(|span| span.checked_add(1))
        .ok_or_else(invalid)?;
    if rows > 1 && plane.row_stride() < row_span {
        return Err(invalid());
    }
    let required = plane.required_len(rows, samples).ok_or_else(invalid)?;
    if required > plane.data().len() {
        return Err(CodecError::PlaneTooShort {
            plane: index,
            required,
            actual: plane.data().len(),
        });
    }
    Ok(())
}

fn copy_luma(luma: &PlaneDescriptor<'_>, width: usize, dst: &mut [u8]) {
    let pixel_stride = luma.pixel_stride();
    dst.par_chunks_mut(width)
        .enumerate()
        .for_each(|(row, dst_line)| {
            let src = luma.row(row, width);
            if pixel_stride == 1 {
                dst_line.copy_from_slice(src);
            } else {
                for (d, s) in dst_line.iter_mut().zip(src.iter().step_by(pixel_stride)) {
                    *d = *s;
                }
            }
        });
}

fn interleave_chroma(
    first: &PlaneDescriptor<'_>,
    second: &PlaneDescriptor<'_>,
    chroma_width: usize,
    dst: &mut [u8],
) {
    let first_stride = first.pixel_stride();
    let second_stride = second.pixel_stride();
    dst.par_chunks_mut(chroma_width * 2)
        .enumerate()
        .for_each(|(row, dst_line)| {
            let first_line = first.row(row, chroma_width);
            let second_line = second.row(row, chroma_width);
            let pairs = first_line
                .iter()
                .step_by(first_stride)
                .zip(second_line.iter().step_by(second_stride));
            for (pair, (c1, c2)) in dst_line.chunks_exact_mut(2).zip(pairs) {
                pair[0] = *c1;
                pair[1] = *c2;
            }
        });
}

/// Repack with an explicit chroma order.
pub fn repack(
    luma: &PlaneDescriptor<'_>,
    chroma_a: &PlaneDescriptor<'_>,
    chroma_b: &PlaneDescriptor<'_>,
    dims: FrameDimensions,
    order: ChromaOrder,
) -> Result<SemiplanarYuv, CodecError> {
    YuvRepacker::new(order).repack(luma, chroma_a, chroma_b, dims)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Spread `values` over a buffer with the given strides, filling gaps with 0xEE.
    fn strided(values: &[u8], rows: usize, row_stride: usize, pixel_stride: usize) -> Vec<u8> {
        let per_row = values.len() / rows;
        let mut out = vec![0xEE; rows * row_stride];
        for r in 0..rows {
            for c in 0..per_row {
                out[r * row_stride + c * pixel_stride] = values[r * per_row + c];
            }
        }
        out
    }

    fn dims(w: u32, h: u32) -> FrameDimensions {
        FrameDimensions::new(w, h).unwrap()
    }

    const LUMA_4X2: [u8; 8] = [16, 100, 180, 235, 50, 81, 128, 255];

    #[test]
    fn output_length_independent_of_strides() {
        let d = dims(4, 2);
        let tight = YuvRepacker::default()
            .repack(
                &PlaneDescriptor::packed(&LUMA_4X2, 4),
                &PlaneDescriptor::packed(&[90, 200], 2),
                &PlaneDescriptor::packed(&[240, 60], 2),
                d,
            )
            .unwrap();
        let padded_y = strided(&LUMA_4X2, 2, 16, 1);
        let padded_u = strided(&[90, 200], 1, 32, 3);
        let padded_v = strided(&[240, 60], 1, 32, 3);
        let loose = YuvRepacker::default()
            .repack(
                &PlaneDescriptor::new(&padded_y, 16, 1),
                &PlaneDescriptor::new(&padded_u, 32, 3),
                &PlaneDescriptor::new(&padded_v, 32, 3),
                d,
            )
            .unwrap();
        assert_eq!(tight.as_bytes().len(), 12);
        assert_eq!(tight, loose);
    }

    #[test]
    fn default_order_writes_second_plane_first() {
        let out = YuvRepacker::default()
            .repack(
                &PlaneDescriptor::packed(&LUMA_4X2, 4),
                &PlaneDescriptor::packed(&[90, 200], 2),
                &PlaneDescriptor::packed(&[240, 60], 2),
                dims(4, 2),
            )
            .unwrap();
        assert_eq!(
            out.as_bytes(),
            &[16, 100, 180, 235, 50, 81, 128, 255, 240, 90, 60, 200]
        );
        assert_eq!(out.order(), ChromaOrder::Ba);
    }

    #[test]
    fn ab_order_writes_first_plane_first() {
        let out = repack(
            &PlaneDescriptor::packed(&LUMA_4X2, 4),
            &PlaneDescriptor::packed(&[90, 200], 2),
            &PlaneDescriptor::packed(&[240, 60], 2),
            dims(4, 2),
            ChromaOrder::Ab,
        )
        .unwrap();
        assert_eq!(out.chroma(), &[90, 240, 200, 60]);
    }

    #[test]
    fn fast_and_sparse_paths_agree() {
        let d = dims(6, 4);
        let luma: Vec<u8> = (0..24).map(|v| v * 7).collect();
        let u: Vec<u8> = (0..6).map(|v| 40 + v).collect();
        let v: Vec<u8> = (0..6).map(|v| 200 - v).collect();

        let fast = YuvRepacker::default()
            .repack(
                &PlaneDescriptor::packed(&luma, 6),
                &PlaneDescriptor::packed(&u, 3),
                &PlaneDescriptor::packed(&v, 3),
                d,
            )
            .unwrap();

        let sparse_y = strided(&luma, 4, 14, 2);
        let sparse_u = strided(&u, 2, 8, 2);
        let sparse_v = strided(&v, 2, 8, 2);
        let sparse = YuvRepacker::default()
            .repack(
                &PlaneDescriptor::new(&sparse_y, 14, 2),
                &PlaneDescriptor::new(&sparse_u, 8, 2),
                &PlaneDescriptor::new(&sparse_v, 8, 2),
                d,
            )
            .unwrap();
        assert_eq!(fast.as_bytes(), sparse.as_bytes());
    }

    #[test]
    fn aliased_interleaved_chroma() {
        // One buffer of V,U pairs; V at origin 0, U at origin 1.
        let d = dims(4, 2);
        let shared = [240u8, 90, 60, 200];
        let u = PlaneDescriptor::with_offset(&shared, 1, 4, 2);
        let v = PlaneDescriptor::with_offset(&shared, 0, 4, 2);
        let out = YuvRepacker::default()
            .repack(&PlaneDescriptor::packed(&LUMA_4X2, 4), &u, &v, d)
            .unwrap();
        assert_eq!(out.chroma(), &[240, 90, 60, 200]);
    }

    #[test]
    fn short_luma_fails_before_writing() {
        let mut dst = vec![0xAAu8; 12];
        let err = YuvRepacker::default()
            .repack_into(
                &PlaneDescriptor::packed(&LUMA_4X2[..7], 4),
                &PlaneDescriptor::packed(&[90, 200], 2),
                &PlaneDescriptor::packed(&[240, 60], 2),
                dims(4, 2),
                &mut dst,
            )
            .unwrap_err();
        assert_eq!(
            err,
            CodecError::PlaneTooShort {
                plane: 0,
                required: 8,
                actual: 7
            }
        );
        assert!(dst.iter().all(|b| *b == 0xAA));
    }

    #[test]
    fn short_chroma_by_offset() {
        let shared = [240u8, 90, 60];
        let err = YuvRepacker::default()
            .repack(
                &PlaneDescriptor::packed(&LUMA_4X2, 4),
                &PlaneDescriptor::with_offset(&shared, 1, 4, 2),
                &PlaneDescriptor::with_offset(&shared, 0, 4, 2),
                dims(4, 2),
            )
            .unwrap_err();
        assert_eq!(err.code(), "plane_too_short");
    }

    #[test]
    fn zero_pixel_stride_rejected() {
        let err = YuvRepacker::default()
            .repack(
                &PlaneDescriptor::new(&LUMA_4X2, 4, 0),
                &PlaneDescriptor::packed(&[90, 200], 2),
                &PlaneDescriptor::packed(&[240, 60], 2),
                dims(4, 2),
            )
            .unwrap_err();
        assert!(matches!(err, CodecError::InvalidStride { plane: 0, .. }));
    }

    #[test]
    fn wrong_destination_size() {
        let mut dst = vec![0u8; 11];
        let err = YuvRepacker::default()
            .repack_into(
                &PlaneDescriptor::packed(&LUMA_4X2, 4),
                &PlaneDescriptor::packed(&[90, 200], 2),
                &PlaneDescriptor::packed(&[240, 60], 2),
                dims(4, 2),
                &mut dst,
            )
            .unwrap_err();
        assert_eq!(
            err,
            CodecError::BufferSize {
                expected: 12,
                actual: 11
            }
        );
    }

    #[test]
    fn raw_frame_with_other_format_is_unsupported() {
        let fmt = MediaFormat::new(FourCc::NV12, Resolution::new(4, 2).unwrap());
        let frame = RawFrame::new(
            FrameMeta::new(fmt, 0),
            Default::default(),
            Default::default(),
        );
        let err = YuvRepacker::default().repack_frame(&frame).unwrap_err();
        assert!(err.is_unsupported());
    }

    #[test]
    fn raw_frame_odd_size_and_missing_planes() {
        let odd = MediaFormat::new(FourCc::YUV_420_888, Resolution::new(3, 2).unwrap());
        let frame = RawFrame::new(FrameMeta::new(odd, 0), Default::default(), Default::default());
        assert_eq!(
            YuvRepacker::default().repack_frame(&frame).unwrap_err(),
            CodecError::InvalidDimensions {
                width: 3,
                height: 2
            }
        );

        let even = MediaFormat::new(FourCc::YUV_420_888, Resolution::new(4, 2).unwrap());
        let frame = RawFrame::new(
            FrameMeta::new(even, 0),
            [LUMA_4X2.to_vec()].into_iter().collect(),
            [RawPlaneLayout::new(0, 0, 4, 1)].into_iter().collect(),
        );
        assert_eq!(
            YuvRepacker::default().repack_frame(&frame).unwrap_err(),
            CodecError::MissingPlanes(1)
        );
    }
}
