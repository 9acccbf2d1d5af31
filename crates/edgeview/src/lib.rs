#![doc = include_str!("../README.md")]

pub use edgeview_capture as capture;
pub use edgeview_codec as codec;
pub use edgeview_core as core;

pub mod config;
pub mod metrics;
pub mod render;
pub mod session;

pub mod prelude {
    pub use crate::config::{
        DEFAULT_IDLE_WAIT_MS, DEFAULT_METRICS_WINDOW, EdgeviewConfig, MAX_IDLE_WAIT_MS,
        PipelineTunables, pipeline_tunables, set_pipeline_tunables,
    };
    pub use crate::metrics::{PipelineMetrics, StageMetrics};
    pub use crate::render::{DrawOutcome, FrameReceiver, FrameRenderer, TextureSink};
    pub use crate::session::{
        Pipeline, PipelineBuilder, PipelineError, PipelineState, PipelineStatus,
    };
    pub use edgeview_capture::prelude::*;
    pub use edgeview_codec::prelude::*;
}
