//! Real-time renderer for tile-based 3-D scenes.
//!
//! The host feeds per-frame draw submissions through a [`scene::SceneSource`];
//! the renderer stages their geometry, depth-sorts translucent models with a
//! GPU compute pass, renders a directional shadow map and composites the
//! frame together with the host's 2-D interface overlay.

pub mod celestial;
pub mod config;
pub mod constants;
pub mod core;
pub mod error;
pub mod render;
pub mod scene;

pub use config::{ConfigEvent, RendererConfig};
pub use error::RendererError;
pub use render::Renderer;
pub use scene::{
    CameraView, DynamicModel, ModelPlacement, SceneSource, StaticModelRef, TileGeometry,
};
