//! Fundamental types: growable geometry buffers, per-frame counters and
//! GPU-facing uniform blocks.

pub mod frame;
pub mod geometry;
pub mod uniforms;

pub use frame::FrameState;
pub use geometry::{FloatBuffer, GrowableBuffer, IntBuffer};
pub use uniforms::{SceneUniforms, SortUniforms, orientation_sincos};
