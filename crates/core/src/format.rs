use std::{fmt, num::NonZeroU32, str::FromStr};

/// Four-character code describing a pixel layout.
///
/// # Example
/// ```rust
/// use edgeview_core::prelude::FourCc;
///
/// let fcc = FourCc::new(*b"NV21");
/// assert_eq!(fcc.to_string(), "NV21");
/// assert_eq!(fcc, FourCc::NV21);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FourCc([u8; 4]);

impl FourCc {
    /// Flexible YUV 4:2:0: three planes (Y, U, V) with independent row and pixel strides.
    ///
    /// This is the only layout the conversion pipeline accepts from a source.
    pub const YUV_420_888: FourCc = FourCc::new(*b"Y420");
    /// Semiplanar 4:2:0 with `U,V` chroma pairs.
    pub const NV12: FourCc = FourCc::new(*b"NV12");
    /// Semiplanar 4:2:0 with `V,U` chroma pairs.
    pub const NV21: FourCc = FourCc::new(*b"NV21");
    /// Packed 8-bit RGBA.
    pub const RGBA: FourCc = FourCc::new(*b"RGBA");

    /// Construct from raw bytes.
    pub const fn new(bytes: [u8; 4]) -> Self {
        Self(bytes)
    }

    /// Little-endian u32 encoding.
    pub fn to_u32(self) -> u32 {
        u32::from_le_bytes(self.0)
    }

    /// Try to convert to a printable string.
    pub fn as_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.0).ok()
    }
}

impl From<u32> for FourCc {
    fn from(value: u32) -> Self {
        Self(value.to_le_bytes())
    }
}

impl fmt::Display for FourCc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(s) = self.as_str() {
            write!(f, "{s}")
        } else {
            write!(f, "0x{:08x}", self.to_u32())
        }
    }
}

impl FromStr for FourCc {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = s.as_bytes();
        if bytes.len() != 4 {
            return Err("fourcc must be four ASCII bytes".into());
        }
        let mut arr = [0u8; 4];
        arr.copy_from_slice(bytes);
        Ok(FourCc(arr))
    }
}

/// Resolution reported by a source.
///
/// Any non-zero size is representable here; conversion additionally needs
/// [`FrameDimensions`].
///
/// # Example
/// ```rust
/// use edgeview_core::prelude::Resolution;
///
/// let res = Resolution::new(640, 480).unwrap();
/// assert_eq!(res.width.get(), 640);
/// assert!(Resolution::new(0, 480).is_none());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Resolution {
    /// Width in pixels (non-zero).
    pub width: NonZeroU32,
    /// Height in pixels (non-zero).
    pub height: NonZeroU32,
}

impl Resolution {
    /// Create a resolution, returning `None` if width or height are zero.
    pub fn new(width: u32, height: u32) -> Option<Self> {
        Some(Self {
            width: NonZeroU32::new(width)?,
            height: NonZeroU32::new(height)?,
        })
    }
}

/// Frame size accepted by the 4:2:0 conversion stages.
///
/// Both sides are non-zero and even, so the chroma grid is exactly
/// `width / 2` by `height / 2`.
///
/// # Example
/// ```rust
/// use edgeview_core::prelude::FrameDimensions;
///
/// let dims = FrameDimensions::new(4, 2).unwrap();
/// assert_eq!(dims.semiplanar_len(), 12);
/// assert_eq!(dims.rgba_len(), 32);
/// assert!(FrameDimensions::new(5, 2).is_none());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameDimensions {
    width: u32,
    height: u32,
}

impl FrameDimensions {
    /// Returns `None` unless both sides are non-zero and even.
    pub const fn new(width: u32, height: u32) -> Option<Self> {
        if width == 0 || height == 0 || width % 2 != 0 || height % 2 != 0 {
            return None;
        }
        Some(Self { width, height })
    }

    /// Dimensions of a source resolution, if they fit 4:2:0 subsampling.
    pub fn from_resolution(res: Resolution) -> Option<Self> {
        Self::new(res.width.get(), res.height.get())
    }

    pub const fn width(&self) -> u32 {
        self.width
    }

    pub const fn height(&self) -> u32 {
        self.height
    }

    /// Number of luma samples.
    pub const fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Chroma samples per row.
    pub const fn chroma_width(&self) -> usize {
        self.width as usize / 2
    }

    /// Chroma rows.
    pub const fn chroma_height(&self) -> usize {
        self.height as usize / 2
    }

    /// Byte length of a semiplanar (luma + interleaved chroma) buffer.
    pub const fn semiplanar_len(&self) -> usize {
        self.pixel_count() + self.pixel_count() / 2
    }

    /// Byte length of an RGBA buffer.
    pub const fn rgba_len(&self) -> usize {
        self.pixel_count() * 4
    }

    pub fn resolution(&self) -> Resolution {
        Resolution {
            width: NonZeroU32::MIN.saturating_add(self.width - 1),
            height: NonZeroU32::MIN.saturating_add(self.height - 1),
        }
    }
}

impl fmt::Display for FrameDimensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Byte order of each interleaved chroma pair in a semiplanar buffer.
///
/// The repacker takes two chroma planes, `a` and `b`. The order decides which
/// plane's sample is written first in every pair. The first byte of a pair
/// drives red and the second drives blue during color conversion, so with
/// planes passed as `(U, V)` the default [`ChromaOrder::Ba`] yields `V,U`
/// pairs (NV21), which is what the converter expects.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum ChromaOrder {
    /// Sample from plane `a` first.
    Ab,
    /// Sample from plane `b` first.
    #[default]
    Ba,
}

impl ChromaOrder {
    /// Semiplanar code produced when the chroma planes are passed as `(U, V)`.
    pub fn semiplanar_code(self) -> FourCc {
        match self {
            ChromaOrder::Ab => FourCc::NV12,
            ChromaOrder::Ba => FourCc::NV21,
        }
    }
}

/// Media format of a source frame: layout code plus geometry.
///
/// # Example
/// ```rust
/// use edgeview_core::prelude::{FourCc, MediaFormat, Resolution};
///
/// let fmt = MediaFormat::new(FourCc::YUV_420_888, Resolution::new(1280, 720).unwrap());
/// assert_eq!(fmt.code.to_string(), "Y420");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MediaFormat {
    /// FourCc code describing pixel layout.
    pub code: FourCc,
    /// Resolution of the frame.
    pub resolution: Resolution,
}

impl MediaFormat {
    pub fn new(code: FourCc, resolution: Resolution) -> Self {
        Self { code, resolution }
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for FourCc {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let encoded = self.as_str().unwrap_or("FFFF");
        serializer.serialize_str(encoded)
    }
}

#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for FourCc {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        struct FourCcVisitor;

        impl<'de> serde::de::Visitor<'de> for FourCcVisitor {
            type Value = FourCc;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a 4-character FourCc string")
            }

            fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                FourCc::from_str(v).map_err(E::custom)
            }
        }

        deserializer.deserialize_str(FourCcVisitor)
    }
}
