//! Frame submission and presentation.
//!
//! This crate owns the per-frame cycle:
//! - [`WindowRenderer`] acquires a swapchain image, records a command
//!   buffer from a rotating slot pool, submits, and presents
//! - [`SceneTarget`] applies the same record/submit discipline against an
//!   offscreen color+depth framebuffer
//! - the pipeline generators build the immutable pipelines both paths bind

pub mod pipeline_gen;
pub mod scene_target;
pub mod window_renderer;

pub use pipeline_gen::{BlitPipelineGenerator, ConstPipelineGenerator};
pub use scene_target::{SceneDraw, SceneFrameInfo, SceneFrameResult, SceneTarget};
pub use window_renderer::{FrameOutcome, WindowRenderer};

/// How long to wait on a command-slot fence before giving up.
///
/// Every wait in the frame loop is bounded; expiry surfaces as a typed
/// error instead of hanging the host application on a stuck queue.
pub const SLOT_WAIT_TIMEOUT_NS: u64 = 5_000_000_000;

/// How long to wait for the presentation engine to hand over an image.
pub const ACQUIRE_TIMEOUT_NS: u64 = 1_000_000_000;
