//! The narrow interface between the host scene/model system and the
//! renderer. The host implements [`SceneSource`]; every frame the renderer
//! asks it for camera parameters, draw submissions and the 2-D UI pixel
//! buffer.

use glam::IVec3;

use crate::constants::{MAX_MODEL_TRIANGLES, UV_FLOATS, VERTEX_INTS};
use crate::core::FrameState;
use crate::render::collector::DrawCollector;

/// Camera and viewport parameters for a frame.
#[derive(Debug, Clone, Copy)]
pub struct CameraView {
    /// Eye position in world-local units
    pub position: glam::Vec3,
    pub yaw: f32,
    pub pitch: f32,
    /// Focal length in pixels; the vertical field of view follows from it
    pub zoom: f32,
    pub canvas_width: u32,
    pub canvas_height: u32,
    /// Player tile position, the centre of the visible scene bounds
    pub player_tile: (i32, i32),
    /// Player height above the ground plane in world-local units
    pub player_height: f32,
}

impl CameraView {
    pub fn aspect(&self) -> f32 {
        self.canvas_width.max(1) as f32 / self.canvas_height.max(1) as f32
    }

    pub fn fov_y(&self) -> f32 {
        2.0 * (self.canvas_height.max(1) as f32 / (2.0 * self.zoom.max(1.0))).atan()
    }
}

/// Tile geometry in world-local coordinates. Tiles never need an intra-model
/// depth sort; they always land in the unordered bucket.
pub struct TileGeometry<'a> {
    pub tile_x: i32,
    pub tile_z: i32,
    /// 4 ints per vertex, 12 per triangle
    pub vertices: &'a [i32],
    /// 4 floats per vertex
    pub uvs: &'a [f32],
}

impl TileGeometry<'_> {
    pub fn triangle_count(&self) -> u32 {
        (self.vertices.len() / (3 * VERTEX_INTS)) as u32
    }
}

/// A dynamic (animated, non-static-scene) model in model-local coordinates.
/// Triangle counts above the large-bucket maximum are clamped at
/// construction, so downstream code never sees an oversized model.
pub struct DynamicModel {
    vertices: Vec<i32>,
    uvs: Vec<f32>,
    triangle_count: u32,
    needs_sort: bool,
}

impl DynamicModel {
    pub fn new(mut vertices: Vec<i32>, mut uvs: Vec<f32>, needs_sort: bool) -> Self {
        let mut triangle_count = (vertices.len() / (3 * VERTEX_INTS)) as u32;
        if triangle_count > MAX_MODEL_TRIANGLES {
            triangle_count = MAX_MODEL_TRIANGLES;
            vertices.truncate(triangle_count as usize * 3 * VERTEX_INTS);
            uvs.truncate(triangle_count as usize * 3 * UV_FLOATS);
        }
        Self {
            vertices,
            uvs,
            triangle_count,
            needs_sort,
        }
    }

    pub fn vertices(&self) -> &[i32] {
        &self.vertices
    }

    pub fn uvs(&self) -> &[f32] {
        &self.uvs
    }

    pub fn triangle_count(&self) -> u32 {
        self.triangle_count
    }

    pub fn needs_sort(&self) -> bool {
        self.needs_sort
    }
}

/// A model living in the pre-uploaded static scene buffer, addressed by
/// offsets into that buffer instead of per-frame triangle data.
#[derive(Debug, Clone, Copy)]
pub struct StaticModelRef {
    /// Offset in vertices into the static scene vertex buffer
    pub vertex_offset: u32,
    pub uv_offset: u32,
    pub triangle_count: u32,
    pub needs_sort: bool,
}

/// Placement of a model submission in the world.
#[derive(Debug, Clone, Copy)]
pub struct ModelPlacement {
    pub position: IVec3,
    /// Binary angle, 0..2048
    pub orientation: i32,
}

/// Per-frame callbacks from the renderer into the host.
pub trait SceneSource {
    fn camera(&self) -> CameraView;

    /// Push this frame's draw submissions into the collector. Called once
    /// per frame between the frame-boundary reset and the sort dispatch.
    fn populate(&mut self, collector: &mut DrawCollector, frame: &mut FrameState);

    /// Canvas-sized ARGB pixel buffer for the 2-D UI overlay, or `None` to
    /// skip the overlay this frame.
    fn ui_pixels(&mut self) -> Option<(&[u32], u32, u32)>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_oversized_model_is_clamped() {
        let triangles = (MAX_MODEL_TRIANGLES + 100) as usize;
        let model = DynamicModel::new(
            vec![0; triangles * 3 * VERTEX_INTS],
            vec![0.0; triangles * 3 * UV_FLOATS],
            true,
        );
        assert_eq!(model.triangle_count(), MAX_MODEL_TRIANGLES);
        assert_eq!(
            model.vertices().len(),
            MAX_MODEL_TRIANGLES as usize * 3 * VERTEX_INTS
        );
    }

    #[test]
    fn test_fov_follows_zoom() {
        let view = CameraView {
            position: glam::Vec3::ZERO,
            yaw: 0.0,
            pitch: 0.0,
            zoom: 512.0,
            canvas_width: 1024,
            canvas_height: 1024,
            player_tile: (52, 52),
            player_height: 0.0,
        };
        // Focal length of half the canvas height gives a 90 degree fov
        assert!((view.fov_y() - std::f32::consts::FRAC_PI_2).abs() < 1e-5);
    }
}
