#![doc = include_str!("../README.md")]

pub mod format;
pub mod frame;
pub mod metrics;
pub mod plane;
pub mod queue;

pub mod prelude {
    pub use crate::{
        format::{ChromaOrder, FourCc, FrameDimensions, MediaFormat, Resolution},
        frame::{FrameError, FrameMeta, RawFrame, RawPlaneLayout, RgbaFrame, SemiplanarYuv},
        metrics::Metrics,
        plane::PlaneDescriptor,
        queue::{FrameSlot, NewestRx, NewestTx, RecvOutcome, SendOutcome, newest},
    };
}
