//! Platform abstraction layer.
//!
//! This crate provides platform-specific functionality:
//! - Window management via winit
//! - Vulkan surface creation from raw window handles
//!
//! The window owns message dispatch (the winit event loop); rendering code
//! only consumes the window handle, its current client size, and the surface.

mod window;

pub use window::{Surface, Window};

// Re-export winit types that users might need
pub use winit::event::WindowEvent;
pub use winit::event_loop::EventLoop;
