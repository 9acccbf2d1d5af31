use std::collections::VecDeque;
use std::panic::{AssertUnwindSafe, catch_unwind};

use edgeview_core::prelude::*;
use rayon::prelude::*;

/// Failures a processor may signal. None of them stop the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProcessorError {
    /// The processing routine is not present (e.g. a native library failed to load).
    #[error("processor unavailable")]
    Unavailable,
    #[error("processing failed: {0}")]
    Failed(String),
    /// Input or output length disagrees with the frame geometry.
    #[error("processor buffer is {actual} bytes, expected {expected}")]
    ShapeMismatch { expected: usize, actual: usize },
}

impl ProcessorError {
    /// Stable string code for error classification.
    pub fn code(&self) -> &'static str {
        match self {
            ProcessorError::Unavailable => "unavailable",
            ProcessorError::Failed(_) => "failed",
            ProcessorError::ShapeMismatch { .. } => "shape_mismatch",
        }
    }
}

/// Optional RGBA-to-RGBA pass run on the conversion worker.
///
/// Implementations receive the converted frame's bytes and geometry and
/// return a new buffer of the same length. Errors and panics are contained
/// by [`apply_best_effort`].
///
/// # Example
/// ```rust
/// use edgeview_codec::processor::{FrameProcessor, ProcessorError};
/// use edgeview_core::prelude::FrameDimensions;
///
/// struct Invert;
///
/// impl FrameProcessor for Invert {
///     fn name(&self) -> &'static str {
///         "invert"
///     }
///
///     fn try_process(&self, rgba: &[u8], _dims: FrameDimensions) -> Result<Vec<u8>, ProcessorError> {
///         Ok(rgba
///             .chunks_exact(4)
///             .flat_map(|px| [255 - px[0], 255 - px[1], 255 - px[2], px[3]])
///             .collect())
///     }
/// }
/// ```
pub trait FrameProcessor: Send + Sync + 'static {
    fn name(&self) -> &'static str;

    fn try_process(&self, rgba: &[u8], dims: FrameDimensions) -> Result<Vec<u8>, ProcessorError>;
}

/// Result of a best-effort processing pass.
#[derive(Debug)]
pub enum ProcessOutcome {
    /// Processor output, validated against the input geometry.
    Processed(RgbaFrame),
    /// The untouched input, with the reason the processor was bypassed.
    PassedThrough(RgbaFrame, ProcessorError),
}

impl ProcessOutcome {
    pub fn into_frame(self) -> RgbaFrame {
        match self {
            ProcessOutcome::Processed(frame) | ProcessOutcome::PassedThrough(frame, _) => frame,
        }
    }
}

/// Run `processor` on `frame`, falling back to `frame` itself on any failure.
///
/// Errors, panics and outputs whose length is not `w * h * 4` all result in
/// [`ProcessOutcome::PassedThrough`].
///
/// # Example
/// ```rust
/// use edgeview_codec::processor::{ProcessOutcome, UnavailableProcessor, apply_best_effort};
/// use edgeview_core::prelude::{FrameDimensions, RgbaFrame};
///
/// let frame = RgbaFrame::opaque_black(FrameDimensions::new(2, 2).unwrap());
/// match apply_best_effort(&UnavailableProcessor, frame.clone()) {
///     ProcessOutcome::PassedThrough(out, _) => assert_eq!(out, frame),
///     ProcessOutcome::Processed(_) => unreachable!(),
/// }
/// ```
pub fn apply_best_effort(processor: &dyn FrameProcessor, frame: RgbaFrame) -> ProcessOutcome {
    let dims = frame.dims();
    let result = catch_unwind(AssertUnwindSafe(|| {
        processor.try_process(frame.as_bytes(), dims)
    }));
    match result {
        Ok(Ok(out)) => match RgbaFrame::from_vec(dims, out) {
            Ok(processed) => ProcessOutcome::Processed(processed),
            Err(FrameError::LengthMismatch { expected, actual }) => ProcessOutcome::PassedThrough(
                frame,
                ProcessorError::ShapeMismatch { expected, actual },
            ),
        },
        Ok(Err(err)) => ProcessOutcome::PassedThrough(frame, err),
        Err(_) => ProcessOutcome::PassedThrough(
            frame,
            ProcessorError::Failed(format!("{} panicked", processor.name())),
        ),
    }
}

/// Stand-in for a processor whose backing routine could not be loaded.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnavailableProcessor;

impl FrameProcessor for UnavailableProcessor {
    fn name(&self) -> &'static str {
        "unavailable"
    }

    fn try_process(&self, _rgba: &[u8], _dims: FrameDimensions) -> Result<Vec<u8>, ProcessorError> {
        Err(ProcessorError::Unavailable)
    }
}

/// Canny edge detector over RGBA frames.
///
/// Pipeline: BT.601 grayscale, 3x3 Sobel with L1 magnitude, non-maximum
/// suppression, then double-threshold hysteresis. Output pixels are white
/// on edges and black elsewhere, alpha always 255.
///
/// # Example
/// ```rust
/// use edgeview_codec::processor::{EdgeDetector, FrameProcessor};
/// use edgeview_core::prelude::FrameDimensions;
///
/// let dims = FrameDimensions::new(4, 4).unwrap();
/// let flat = vec![90u8; dims.rgba_len()];
/// let out = EdgeDetector::default().try_process(&flat, dims).unwrap();
/// assert!(out.chunks_exact(4).all(|px| px == [0, 0, 0, 255]));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct EdgeDetector {
    /// Magnitudes above this continue an edge.
    pub low: u32,
    /// Magnitudes above this start an edge.
    pub high: u32,
}

impl Default for EdgeDetector {
    fn default() -> Self {
        Self {
            low: 50,
            high: 150,
        }
    }
}

impl EdgeDetector {
    /// Thresholds are swapped if given out of order.
    pub fn new(low: u32, high: u32) -> Self {
        Self {
            low: low.min(high),
            high: low.max(high),
        }
    }

    fn detect(&self, rgba: &[u8], width: usize, height: usize) -> Vec<u8> {
        let gray: Vec<u8> = rgba
            .par_chunks_exact(4)
            .map(|px| luminance(px[0], px[1], px[2]))
            .collect();

        let mut gradients = vec![(0i32, 0i32); width * height];
        gradients
            .par_chunks_mut(width)
            .enumerate()
            .for_each(|(y, line)| sobel_row(&gray, width, height, y, line));

        let magnitude: Vec<u32> = gradients
            .par_iter()
            .map(|(gx, gy)| gx.unsigned_abs() + gy.unsigned_abs())
            .collect();

        let Self { low, high } = self.sanitized();
        // 0 = suppressed, 1 = weak candidate, 2 = strong.
        let mut class = vec![0u8; width * height];
        class
            .par_chunks_mut(width)
            .enumerate()
            .for_each(|(y, line)| {
                for (x, slot) in line.iter_mut().enumerate() {
                    let idx = y * width + x;
                    let mag = magnitude[idx];
                    if mag <= low {
                        continue;
                    }
                    let (gx, gy) = gradients[idx];
                    let ((dx1, dy1), (dx2, dy2)) = neighbour_offsets(gx, gy);
                    let before = magnitude_at(&magnitude, width, height, x, y, dx1, dy1);
                    let after = magnitude_at(&magnitude, width, height, x, y, dx2, dy2);
                    if mag > before && mag >= after {
                        *slot = if mag > high { 2 } else { 1 };
                    }
                }
            });

        let edges = hysteresis(&class, width, height);
        let mut out = vec![0u8; width * height * 4];
        out.par_chunks_exact_mut(4)
            .zip(edges.par_iter())
            .for_each(|(px, edge)| {
                let v = if *edge { 255 } else { 0 };
                px.copy_from_slice(&[v, v, v, 255]);
            });
        out
    }

    fn sanitized(&self) -> Self {
        Self::new(self.low, self.high)
    }
}

impl FrameProcessor for EdgeDetector {
    fn name(&self) -> &'static str {
        "canny"
    }

    fn try_process(&self, rgba: &[u8], dims: FrameDimensions) -> Result<Vec<u8>, ProcessorError> {
        if rgba.len() != dims.rgba_len() {
            return Err(ProcessorError::ShapeMismatch {
                expected: dims.rgba_len(),
                actual: rgba.len(),
            });
        }
        Ok(self.detect(rgba, dims.width() as usize, dims.height() as usize))
    }
}

#[inline]
fn luminance(r: u8, g: u8, b: u8) -> u8 {
    ((u32::from(r) * 4899 + u32::from(g) * 9617 + u32::from(b) * 1868 + 8192) >> 14) as u8
}

fn sobel_row(gray: &[u8], width: usize, height: usize, y: usize, out: &mut [(i32, i32)]) {
    let at = |x: isize, y: isize| -> i32 {
        let x = x.clamp(0, width as isize - 1) as usize;
        let y = y.clamp(0, height as isize - 1) as usize;
        i32::from(gray[y * width + x])
    };
    let y = y as isize;
    for (x, slot) in out.iter_mut().enumerate() {
        let x = x as isize;
        let gx = (at(x + 1, y - 1) + 2 * at(x + 1, y) + at(x + 1, y + 1))
            - (at(x - 1, y - 1) + 2 * at(x - 1, y) + at(x - 1, y + 1));
        let gy = (at(x - 1, y + 1) + 2 * at(x, y + 1) + at(x + 1, y + 1))
            - (at(x - 1, y - 1) + 2 * at(x, y - 1) + at(x + 1, y - 1));
        *slot = (gx, gy);
    }
}

/// Neighbours along the gradient direction, quantized to 0/45/90/135 degrees.
fn neighbour_offsets(gx: i32, gy: i32) -> ((isize, isize), (isize, isize)) {
    let ax = i64::from(gx.unsigned_abs());
    let ay = i64::from(gy.unsigned_abs());
    // tan(22.5) ~ 0.4142, tan(67.5) ~ 2.4142
    if ay * 10_000 <= ax * 4_142 {
        ((-1, 0), (1, 0))
    } else if ay * 10_000 >= ax * 24_142 {
        ((0, -1), (0, 1))
    } else if (gx > 0) == (gy > 0) {
        ((-1, -1), (1, 1))
    } else {
        ((1, -1), (-1, 1))
    }
}

fn magnitude_at(
    magnitude: &[u32],
    width: usize,
    height: usize,
    x: usize,
    y: usize,
    dx: isize,
    dy: isize,
) -> u32 {
    let nx = x as isize + dx;
    let ny = y as isize + dy;
    if nx < 0 || ny < 0 || nx >= width as isize || ny >= height as isize {
        return 0;
    }
    magnitude[ny as usize * width + nx as usize]
}

fn hysteresis(class: &[u8], width: usize, height: usize) -> Vec<bool> {
    let mut edges = vec![false; width * height];
    let mut pending: VecDeque<usize> = class
        .iter()
        .enumerate()
        .filter(|(_, c)| **c == 2)
        .map(|(idx, _)| idx)
        .collect();
    for idx in &pending {
        edges[*idx] = true;
    }
    while let Some(idx) = pending.pop_front() {
        let x = (idx % width) as isize;
        let y = (idx / width) as isize;
        for dy in -1..=1isize {
            for dx in -1..=1isize {
                let nx = x + dx;
                let ny = y + dy;
                if nx < 0 || ny < 0 || nx >= width as isize || ny >= height as isize {
                    continue;
                }
                let n = ny as usize * width + nx as usize;
                if !edges[n] && class[n] == 1 {
                    edges[n] = true;
                    pending.push_back(n);
                }
            }
        }
    }
    edges
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Failing;

    impl FrameProcessor for Failing {
        fn name(&self) -> &'static str {
            "failing"
        }

        fn try_process(&self, _: &[u8], _: FrameDimensions) -> Result<Vec<u8>, ProcessorError> {
            Err(ProcessorError::Failed("boom".into()))
        }
    }

    struct Panicking;

    impl FrameProcessor for Panicking {
        fn name(&self) -> &'static str {
            "panicking"
        }

        fn try_process(&self, _: &[u8], _: FrameDimensions) -> Result<Vec<u8>, ProcessorError> {
            panic!("processor exploded")
        }
    }

    struct Truncating;

    impl FrameProcessor for Truncating {
        fn name(&self) -> &'static str {
            "truncating"
        }

        fn try_process(&self, rgba: &[u8], _: FrameDimensions) -> Result<Vec<u8>, ProcessorError> {
            Ok(rgba[..rgba.len() - 4].to_vec())
        }
    }

    fn step_image(width: u32, height: u32, edge_x: u32) -> (FrameDimensions, Vec<u8>) {
        let dims = FrameDimensions::new(width, height).unwrap();
        let mut data = Vec::with_capacity(dims.rgba_len());
        for _y in 0..height {
            for x in 0..width {
                let v = if x < edge_x { 0 } else { 255 };
                data.extend_from_slice(&[v, v, v, 255]);
            }
        }
        (dims, data)
    }

    #[test]
    fn vertical_step_gives_single_column() {
        let (dims, data) = step_image(8, 4, 4);
        let out = EdgeDetector::default().try_process(&data, dims).unwrap();
        for y in 0..4usize {
            for x in 0..8usize {
                let px = &out[(y * 8 + x) * 4..][..4];
                let expected = if x == 3 { 255 } else { 0 };
                assert_eq!(px, [expected, expected, expected, 255], "pixel ({x},{y})");
            }
        }
    }

    #[test]
    fn weak_gradient_below_threshold_ignored() {
        let dims = FrameDimensions::new(8, 4).unwrap();
        let mut data = Vec::new();
        for _y in 0..4 {
            for x in 0..8u8 {
                // Step of 10 gives an L1 magnitude of 40, below the low threshold.
                let v = if x < 4 { 100 } else { 110 };
                data.extend_from_slice(&[v, v, v, 255]);
            }
        }
        let out = EdgeDetector::default().try_process(&data, dims).unwrap();
        assert!(out.chunks_exact(4).all(|px| px == [0, 0, 0, 255]));
    }

    #[test]
    fn wrong_input_length_is_shape_mismatch() {
        let dims = FrameDimensions::new(2, 2).unwrap();
        let err = EdgeDetector::default()
            .try_process(&[0u8; 12], dims)
            .unwrap_err();
        assert_eq!(
            err,
            ProcessorError::ShapeMismatch {
                expected: 16,
                actual: 12
            }
        );
    }

    #[test]
    fn thresholds_reordered() {
        assert_eq!(EdgeDetector::new(150, 50), EdgeDetector::default());
    }

    #[test]
    fn best_effort_passes_through_failures() {
        let frame = RgbaFrame::opaque_black(FrameDimensions::new(2, 2).unwrap());
        for processor in [
            &UnavailableProcessor as &dyn FrameProcessor,
            &Failing,
            &Panicking,
            &Truncating,
        ] {
            match apply_best_effort(processor, frame.clone()) {
                ProcessOutcome::PassedThrough(out, err) => {
                    assert_eq!(out, frame);
                    match processor.name() {
                        "unavailable" => assert_eq!(err, ProcessorError::Unavailable),
                        "truncating" => assert_eq!(err.code(), "shape_mismatch"),
                        _ => assert_eq!(err.code(), "failed"),
                    }
                }
                ProcessOutcome::Processed(_) => panic!("{} should not succeed", processor.name()),
            }
        }
    }

    #[test]
    fn best_effort_returns_processed_frame() {
        let (dims, data) = step_image(8, 4, 4);
        let frame = RgbaFrame::from_vec(dims, data).unwrap();
        let out = apply_best_effort(&EdgeDetector::default(), frame).into_frame();
        assert_eq!(out.pixel(3, 0), Some([255, 255, 255, 255]));
        assert_eq!(out.pixel(4, 0), Some([0, 0, 0, 255]));
    }
}
