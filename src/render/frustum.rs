//! Scene bounds and frustum utilities.

use glam::{Mat4, Vec3};

use crate::constants::{MAX_DRAW_DISTANCE, SCENE_UNITS, TILE_UNITS};

/// Axis-aligned horizontal bounds of the visible world, in world-local
/// units: the player's tile plus the draw distance on each side, clamped to
/// the fixed scene size. Drives the shadow-frustum fit and serves as the
/// fallback intersection volume for debug ray casting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SceneBounds {
    pub min_x: i32,
    pub max_x: i32,
    pub min_z: i32,
    pub max_z: i32,
}

impl SceneBounds {
    pub fn from_player(tile_x: i32, tile_z: i32, draw_distance_tiles: i32) -> Self {
        let distance = draw_distance_tiles.clamp(0, MAX_DRAW_DISTANCE) * TILE_UNITS;
        let x = tile_x * TILE_UNITS;
        let z = tile_z * TILE_UNITS;
        Self {
            min_x: (x - distance).max(0),
            max_x: (x + distance).min(SCENE_UNITS),
            min_z: (z - distance).max(0),
            max_z: (z + distance).min(SCENE_UNITS),
        }
    }

    pub fn center(&self) -> (f32, f32) {
        (
            (self.min_x + self.max_x) as f32 / 2.0,
            (self.min_z + self.max_z) as f32 / 2.0,
        )
    }

    /// (dx, dz) span in world-local units.
    pub fn span(&self) -> (f32, f32) {
        (
            (self.max_x - self.min_x) as f32,
            (self.max_z - self.min_z) as f32,
        )
    }

    pub fn clamp_point(&self, p: Vec3) -> Vec3 {
        Vec3::new(
            p.x.clamp(self.min_x as f32, self.max_x as f32),
            p.y,
            p.z.clamp(self.min_z as f32, self.max_z as f32),
        )
    }
}

/// Where the four far-plane frustum corners hit the ground plane (y = 0).
/// Used only by the debug overlay: a corner ray that never reaches the
/// ground falls back to clamping against the scene bounds instead of
/// reporting an error.
pub fn frustum_ground_corners(inv_view_proj: &Mat4, bounds: &SceneBounds) -> [Vec3; 4] {
    let ndc_corners = [
        Vec3::new(-1.0, -1.0, 1.0),
        Vec3::new(1.0, -1.0, 1.0),
        Vec3::new(1.0, 1.0, 1.0),
        Vec3::new(-1.0, 1.0, 1.0),
    ];

    let mut corners = [Vec3::ZERO; 4];
    for (i, ndc) in ndc_corners.iter().enumerate() {
        let near = inv_view_proj.project_point3(Vec3::new(ndc.x, ndc.y, 0.0));
        let far = inv_view_proj.project_point3(*ndc);
        let direction = far - near;

        corners[i] = if direction.y.abs() > 1e-6 {
            let t = -near.y / direction.y;
            if t >= 0.0 {
                bounds.clamp_point(near + direction * t)
            } else {
                // Ray points away from the ground
                bounds.clamp_point(far)
            }
        } else {
            bounds.clamp_point(far)
        };
    }
    corners
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounds_clamp_to_scene() {
        let bounds = SceneBounds::from_player(2, 2, 25);
        assert_eq!(bounds.min_x, 0);
        assert_eq!(bounds.min_z, 0);
        assert_eq!(bounds.max_x, (2 + 25) * TILE_UNITS);

        let far = SceneBounds::from_player(SCENE_TILES_EDGE, SCENE_TILES_EDGE, 25);
        assert_eq!(far.max_x, SCENE_UNITS);
        assert_eq!(far.max_z, SCENE_UNITS);
    }

    const SCENE_TILES_EDGE: i32 = crate::constants::SCENE_TILES - 1;

    #[test]
    fn test_draw_distance_is_clamped() {
        let bounds = SceneBounds::from_player(52, 52, 10_000);
        let capped = SceneBounds::from_player(52, 52, MAX_DRAW_DISTANCE);
        assert_eq!(bounds, capped);
    }

    #[test]
    fn test_span_and_center() {
        let bounds = SceneBounds {
            min_x: 1000,
            max_x: 3000,
            min_z: 0,
            max_z: 4000,
        };
        assert_eq!(bounds.span(), (2000.0, 4000.0));
        assert_eq!(bounds.center(), (2000.0, 2000.0));
    }

    #[test]
    fn test_ground_corners_fall_back_to_bounds() {
        let bounds = SceneBounds {
            min_x: 0,
            max_x: 1000,
            min_z: 0,
            max_z: 1000,
        };
        // Camera looking straight up: no ground intersection anywhere
        let view = Mat4::look_at_rh(Vec3::new(500.0, -100.0, 500.0), Vec3::new(500.0, 0.0, 500.0), Vec3::Z);
        let proj = Mat4::perspective_rh(1.0, 1.0, 0.1, 100.0);
        let inv = (proj * view).inverse();
        for corner in frustum_ground_corners(&inv, &bounds) {
            assert!(corner.x >= 0.0 && corner.x <= 1000.0);
            assert!(corner.z >= 0.0 && corner.z <= 1000.0);
        }
    }
}
