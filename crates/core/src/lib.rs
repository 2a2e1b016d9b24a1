//! Core utilities shared across the demo engine.
//!
//! This crate provides foundational types used by every other crate:
//! - Error types and result aliases
//! - Logging initialization
//! - Frame timing

mod error;
mod frame_clock;
mod logging;

pub use error::{Error, Result};
pub use frame_clock::FrameClock;
pub use logging::init_logging;
