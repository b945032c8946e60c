//! A small self-contained scene: a checkerboard ground, a static pyramid in
//! the scene buffer, an orbiting translucent crystal and a framed interface
//! overlay. Exercises every submission path the renderer has.

use glam::{IVec3, Vec3};

use tilescape::constants::{ATTR_ALPHA_SHIFT, SCENE_TILES, TILE_UNITS};
use tilescape::render::collector::DrawCollector;
use tilescape::core::FrameState;
use tilescape::{
    CameraView, DynamicModel, ModelPlacement, SceneSource, StaticModelRef, TileGeometry,
};

const GRID_RADIUS: i32 = 12;
const CENTER_TILE: i32 = SCENE_TILES / 2;
const UI_WIDTH: u32 = 320;
const UI_HEIGHT: u32 = 240;

/// Packed vertex attribute: bits 0..23 RGB, 24..30 transparency (0 opaque).
fn pack_attr(r: u8, g: u8, b: u8, transparency: u8) -> i32 {
    (((transparency as u32 & 0x7f) << ATTR_ALPHA_SHIFT)
        | ((r as u32) << 16)
        | ((g as u32) << 8)
        | b as u32) as i32
}

struct DemoTile {
    tile_x: i32,
    tile_z: i32,
    vertices: Vec<i32>,
    uvs: Vec<f32>,
}

pub struct DemoScene {
    frame: u64,
    canvas: (u32, u32),
    tiles: Vec<DemoTile>,
    pyramid_ref: StaticModelRef,
    pyramid_model: DynamicModel,
    crystal: DynamicModel,
    ui: Vec<u32>,
}

impl DemoScene {
    pub fn new() -> Self {
        let (pyramid_vertices, pyramid_uvs) = pyramid_geometry();
        let pyramid_ref = StaticModelRef {
            vertex_offset: 0,
            uv_offset: 0,
            triangle_count: (pyramid_vertices.len() / 12) as u32,
            needs_sort: false,
        };
        let pyramid_model = DynamicModel::new(pyramid_vertices, pyramid_uvs, false);

        let (crystal_vertices, crystal_uvs) = crystal_geometry();
        let crystal = DynamicModel::new(crystal_vertices, crystal_uvs, true);

        Self {
            frame: 0,
            canvas: (800, 600),
            tiles: build_ground(),
            pyramid_ref,
            pyramid_model,
            crystal,
            ui: build_overlay(),
        }
    }

    /// Geometry for the one-off static scene upload.
    pub fn static_geometry(&self) -> (Vec<i32>, Vec<f32>) {
        (
            self.pyramid_model.vertices().to_vec(),
            self.pyramid_model.uvs().to_vec(),
        )
    }

    pub fn set_canvas_size(&mut self, width: u32, height: u32) {
        self.canvas = (width.max(1), height.max(1));
    }

    pub fn advance(&mut self) {
        self.frame += 1;
    }
}

impl SceneSource for DemoScene {
    fn camera(&self) -> CameraView {
        let yaw = self.frame as f32 * 0.002;
        let pitch: f32 = 0.9;
        let distance = 2600.0;
        let center = Vec3::new(
            (CENTER_TILE * TILE_UNITS) as f32,
            0.0,
            (CENTER_TILE * TILE_UNITS) as f32,
        );
        let position = center
            + Vec3::new(
                -yaw.sin() * pitch.cos() * distance,
                pitch.sin() * distance,
                yaw.cos() * pitch.cos() * distance,
            );
        CameraView {
            position,
            yaw,
            pitch,
            zoom: 600.0,
            canvas_width: self.canvas.0,
            canvas_height: self.canvas.1,
            player_tile: (CENTER_TILE, CENTER_TILE),
            player_height: 0.0,
        }
    }

    fn populate(&mut self, collector: &mut DrawCollector, frame: &mut FrameState) {
        for tile in &self.tiles {
            collector.push_tile(
                frame,
                &TileGeometry {
                    tile_x: tile.tile_x,
                    tile_z: tile.tile_z,
                    vertices: &tile.vertices,
                    uvs: &tile.uvs,
                },
            );
        }

        let center = IVec3::new(CENTER_TILE * TILE_UNITS, 0, CENTER_TILE * TILE_UNITS);
        let pyramid_placement = ModelPlacement {
            position: center,
            orientation: ((self.frame * 2) & 2047) as i32,
        };
        if collector.compute_enabled() {
            collector.push_static_model(frame, &self.pyramid_ref, pyramid_placement);
        } else {
            collector.push_dynamic_model(frame, &self.pyramid_model, pyramid_placement, 1);
        }

        let orbit = self.frame as f32 * 0.01;
        let crystal_placement = ModelPlacement {
            position: center
                + IVec3::new(
                    (orbit.cos() * 900.0) as i32,
                    260,
                    (orbit.sin() * 900.0) as i32,
                ),
            orientation: ((self.frame * 16) & 2047) as i32,
        };
        collector.push_dynamic_model(frame, &self.crystal, crystal_placement, 2);
    }

    fn ui_pixels(&mut self) -> Option<(&[u32], u32, u32)> {
        Some((&self.ui, UI_WIDTH, UI_HEIGHT))
    }
}

fn build_ground() -> Vec<DemoTile> {
    let mut tiles = Vec::new();
    for tz in (CENTER_TILE - GRID_RADIUS)..(CENTER_TILE + GRID_RADIUS) {
        for tx in (CENTER_TILE - GRID_RADIUS)..(CENTER_TILE + GRID_RADIUS) {
            let attr = if (tx + tz) % 2 == 0 {
                pack_attr(86, 125, 70, 0)
            } else {
                pack_attr(70, 105, 58, 0)
            };
            let (x0, z0) = (tx * TILE_UNITS, tz * TILE_UNITS);
            let (x1, z1) = (x0 + TILE_UNITS, z0 + TILE_UNITS);
            let quad = [
                (x0, z0),
                (x1, z0),
                (x1, z1),
                (x0, z0),
                (x1, z1),
                (x0, z1),
            ];
            let mut vertices = Vec::with_capacity(6 * 4);
            for (x, z) in quad {
                vertices.extend_from_slice(&[x, 0, z, attr]);
            }
            tiles.push(DemoTile {
                tile_x: tx,
                tile_z: tz,
                vertices,
                uvs: vec![0.0; 6 * 4],
            });
        }
    }
    tiles
}

fn pyramid_geometry() -> (Vec<i32>, Vec<f32>) {
    let apex = [0, 420, 0];
    let base = [
        [-200, 0, -200],
        [200, 0, -200],
        [200, 0, 200],
        [-200, 0, 200],
    ];
    let attr = pack_attr(194, 178, 128, 0);
    let mut vertices = Vec::new();
    for i in 0..4 {
        let a = base[i];
        let b = base[(i + 1) % 4];
        for v in [a, b, apex] {
            vertices.extend_from_slice(&[v[0], v[1], v[2], attr]);
        }
    }
    let uvs = vec![0.0; (vertices.len() / 4) * 4];
    (vertices, uvs)
}

fn crystal_geometry() -> (Vec<i32>, Vec<f32>) {
    let top = [0, 200, 0];
    let bottom = [0, -200, 0];
    let ring = [[-140, 0, 0], [0, 0, -140], [140, 0, 0], [0, 0, 140]];
    let attr = pack_attr(120, 180, 255, 48);
    let mut vertices = Vec::new();
    for i in 0..4 {
        let a = ring[i];
        let b = ring[(i + 1) % 4];
        for v in [a, b, top] {
            vertices.extend_from_slice(&[v[0], v[1], v[2], attr]);
        }
        for v in [b, a, bottom] {
            vertices.extend_from_slice(&[v[0], v[1], v[2], attr]);
        }
    }
    let uvs = vec![0.0; (vertices.len() / 4) * 4];
    (vertices, uvs)
}

/// ARGB pixels: a translucent frame with an opaque corner panel, transparent
/// everywhere else.
fn build_overlay() -> Vec<u32> {
    let mut pixels = vec![0u32; (UI_WIDTH * UI_HEIGHT) as usize];
    for y in 0..UI_HEIGHT {
        for x in 0..UI_WIDTH {
            let border = x < 4 || y < 4 || x >= UI_WIDTH - 4 || y >= UI_HEIGHT - 4;
            let panel = x < 72 && y < 56;
            let value = if border {
                0xA020_2020
            } else if panel {
                0xFF30_2A18
            } else {
                0
            };
            pixels[(y * UI_WIDTH + x) as usize] = value;
        }
    }
    pixels
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_populate_fills_every_bucket_path() {
        let mut scene = DemoScene::new();
        let mut collector = DrawCollector::new(true);
        let mut frame = FrameState::default();
        collector.begin_frame(&mut frame);
        scene.populate(&mut collector, &mut frame);
        collector.end_frame();

        let tile_count = (2 * GRID_RADIUS * 2 * GRID_RADIUS) as u32;
        // Tiles plus the pyramid ref plus the crystal
        assert_eq!(frame.dispatch_groups(), tile_count + 2);
        let expected_vertices = tile_count * 6 + 4 * 3 + 8 * 3;
        assert_eq!(frame.vertex_count(), expected_vertices);
    }

    #[test]
    fn test_software_path_substitutes_pyramid() {
        let mut scene = DemoScene::new();
        let mut collector = DrawCollector::new(false);
        let mut frame = FrameState::default();
        collector.begin_frame(&mut frame);
        scene.populate(&mut collector, &mut frame);
        collector.end_frame();

        assert_eq!(frame.dispatch_groups(), 0);
        assert_eq!(
            collector.vertices().slice().len() as u32 / 4,
            frame.vertex_count()
        );
    }

    #[test]
    fn test_overlay_dimensions() {
        let mut scene = DemoScene::new();
        let (pixels, w, h) = scene.ui_pixels().unwrap();
        assert_eq!(pixels.len(), (w * h) as usize);
    }
}
