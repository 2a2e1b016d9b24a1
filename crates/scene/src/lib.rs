//! Scene graph and components.
//!
//! This crate provides CPU-side scene bookkeeping:
//! - An arena-based game-object tree with parent/child hierarchy
//! - Local transforms composed through the parent chain
//! - Components owned by their node

pub mod graph;
pub mod transform;

pub use graph::{Component, NodeId, Scene, SceneError};
pub use transform::Transform;
