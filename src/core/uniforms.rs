//! GPU uniform blocks. Layouts must match the WGSL structs in
//! `shaders/scene.wgsl`, `shaders/shadow.wgsl` and `shaders/sort.wgsl`.

use bytemuck::{Pod, Zeroable};

use crate::constants::{ORIENTATION_MASK, SINCOS_COUNT};

/// Uniforms for the main colour pass and both shadow passes.
#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
pub struct SceneUniforms {
    pub view_proj: [[f32; 4]; 4],
    pub light_view_proj: [[f32; 4]; 4],
    pub camera_pos: [f32; 3],
    /// Draw distance in world-local units
    pub draw_distance: f32,
    pub sky_color: [f32; 4],
    /// opacity, colour intensity, PCF kernel radius, fade falloff
    pub shadow_params: [f32; 4],
    /// tint mode, distance fade mode, shadow enabled, translucency enabled
    pub modes: [u32; 4],
    pub fog_depth: f32,
    pub time: f32,
    pub _pad: [f32; 2],
}

/// Uniforms for the face-sort compute dispatch: camera transform plus the
/// precomputed sine/cosine lookup table. The table is packed two entries per
/// vec4 to satisfy the 16-byte uniform array stride.
#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
pub struct SortUniforms {
    pub camera_pos: [f32; 3],
    pub _pad: f32,
    pub sincos: [[f32; 4]; SINCOS_COUNT / 2],
}

impl SortUniforms {
    pub fn new(camera_pos: [f32; 3]) -> Box<Self> {
        let mut u = Box::new(Self {
            camera_pos,
            _pad: 0.0,
            sincos: [[0.0; 4]; SINCOS_COUNT / 2],
        });
        for (i, pair) in u.sincos.iter_mut().enumerate() {
            let (s0, c0) = orientation_sincos((2 * i) as i32);
            let (s1, c1) = orientation_sincos((2 * i + 1) as i32);
            *pair = [s0, c0, s1, c1];
        }
        u
    }
}

/// Sine/cosine for a binary-angle orientation (2048 steps per revolution).
/// The CPU transform path and the GPU lookup table both use this, so the two
/// paths produce identical rotations.
pub fn orientation_sincos(orientation: i32) -> (f32, f32) {
    let angle =
        (orientation & ORIENTATION_MASK) as f32 * (std::f32::consts::TAU / SINCOS_COUNT as f32);
    (angle.sin(), angle.cos())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sincos_wraps_binary_angle() {
        assert_eq!(orientation_sincos(0), orientation_sincos(2048));
        let (s, c) = orientation_sincos(512);
        assert!((s - 1.0).abs() < 1e-5);
        assert!(c.abs() < 1e-5);
    }

    #[test]
    fn test_sort_uniforms_table_matches_scalar_path() {
        let u = SortUniforms::new([0.0; 3]);
        for orientation in [0i32, 1, 511, 512, 1024, 2047] {
            let (s, c) = orientation_sincos(orientation);
            let pair = u.sincos[(orientation / 2) as usize];
            let (ts, tc) = if orientation % 2 == 0 {
                (pair[0], pair[1])
            } else {
                (pair[2], pair[3])
            };
            assert_eq!((s, c), (ts, tc));
        }
    }

    #[test]
    fn test_uniform_sizes_are_16_byte_aligned() {
        assert_eq!(std::mem::size_of::<SceneUniforms>() % 16, 0);
        assert_eq!(std::mem::size_of::<SortUniforms>() % 16, 0);
    }
}
