/// Borrowed view of one strided image plane.
///
/// Sample `(row, col)` lives at
/// `origin + row * row_stride + col * pixel_stride`. Two descriptors may
/// borrow the same bytes at different origins, which is how interleaved
/// chroma arrives from many camera stacks.
///
/// # Example
/// ```rust
/// use edgeview_core::prelude::PlaneDescriptor;
///
/// // Interleaved V,U pairs: U starts one byte in, both step by two.
/// let shared = [10u8, 20, 11, 21];
/// let v = PlaneDescriptor::new(&shared, 4, 2);
/// let u = PlaneDescriptor::with_offset(&shared, 1, 4, 2);
/// assert_eq!(v.sample(0, 1), Some(11));
/// assert_eq!(u.sample(0, 1), Some(21));
/// ```
#[derive(Debug, Clone, Copy)]
pub struct PlaneDescriptor<'a> {
    data: &'a [u8],
    row_stride: usize,
    pixel_stride: usize,
    origin: usize,
}

impl<'a> PlaneDescriptor<'a> {
    pub fn new(data: &'a [u8], row_stride: usize, pixel_stride: usize) -> Self {
        Self::with_offset(data, 0, row_stride, pixel_stride)
    }

    /// Descriptor whose first sample is `origin` bytes into `data`.
    pub fn with_offset(
        data: &'a [u8],
        origin: usize,
        row_stride: usize,
        pixel_stride: usize,
    ) -> Self {
        Self {
            data,
            row_stride,
            pixel_stride,
            origin,
        }
    }

    /// Tightly packed plane: one byte per sample, rows back to back.
    pub fn packed(data: &'a [u8], width: usize) -> Self {
        Self::new(data, width, 1)
    }

    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    pub fn row_stride(&self) -> usize {
        self.row_stride
    }

    pub fn pixel_stride(&self) -> usize {
        self.pixel_stride
    }

    pub fn origin(&self) -> usize {
        self.origin
    }

    /// Minimum backing length needed to address `rows` rows of `samples` samples.
    ///
    /// Returns `None` on arithmetic overflow. Zero rows or samples need nothing.
    pub fn required_len(&self, rows: usize, samples: usize) -> Option<usize> {
        if rows == 0 || samples == 0 {
            return Some(0);
        }
        let last_row = (rows - 1).checked_mul(self.row_stride)?;
        let last_col = (samples - 1).checked_mul(self.pixel_stride)?;
        self.origin
            .checked_add(last_row)?
            .checked_add(last_col)?
            .checked_add(1)
    }

    /// True when every sample of a `rows` x `samples` grid is in bounds.
    pub fn covers(&self, rows: usize, samples: usize) -> bool {
        self.required_len(rows, samples)
            .is_some_and(|needed| needed <= self.data.len())
    }

    /// Byte index of sample `(row, col)`.
    #[inline]
    pub fn index(&self, row: usize, col: usize) -> usize {
        self.origin + row * self.row_stride + col * self.pixel_stride
    }

    #[inline]
    pub fn sample(&self, row: usize, col: usize) -> Option<u8> {
        self.data.get(self.index(row, col)).copied()
    }

    /// Bytes spanning `samples` samples of `row`, including any interleaved
    /// bytes between them when `pixel_stride > 1`.
    ///
    /// Returns an empty slice when the span is out of bounds.
    pub fn row(&self, row: usize, samples: usize) -> &'a [u8] {
        if samples == 0 {
            return &[];
        }
        let start = self.index(row, 0);
        let span = (samples - 1) * self.pixel_stride + 1;
        self.data.get(start..start + span).unwrap_or(&[])
    }
}
