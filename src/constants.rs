// Scene constants
pub const TILE_UNITS: i32 = 128;
pub const SCENE_TILES: i32 = 104;
pub const SCENE_UNITS: i32 = SCENE_TILES * TILE_UNITS;
pub const MAX_DRAW_DISTANCE: i32 = 90;

// Sort bucket limits. Models above SMALL_MODEL_TRIANGLES go to the large
// bucket; nothing above MAX_MODEL_TRIANGLES is ever enqueued (clamped at
// model construction).
pub const SMALL_MODEL_TRIANGLES: u32 = 512;
pub const MAX_MODEL_TRIANGLES: u32 = 4096;
pub const SORT_WORKGROUP_SIZE: u32 = 256;

// Vertex layout: XYZ + packed attribute as 4 ints, texture id/U/V/spare as 4 floats
pub const VERTEX_INTS: usize = 4;
pub const UV_FLOATS: usize = 4;
pub const VERTEX_BYTES: u64 = (VERTEX_INTS * std::mem::size_of::<i32>()) as u64;
pub const UV_BYTES: u64 = (UV_FLOATS * std::mem::size_of::<f32>()) as u64;

// Binary angle resolution for model orientation (one revolution = 2048 steps)
pub const SINCOS_COUNT: usize = 2048;
pub const ORIENTATION_MASK: i32 = (SINCOS_COUNT - 1) as i32;

// Packed vertex attribute layout: bits 0..23 RGB, 24..30 alpha, 31 material flag
pub const ATTR_ALPHA_SHIFT: u32 = 24;
pub const ATTR_MATERIAL_BIT: u32 = 1 << 31;

// Depth-map clear value meaning "no occluder"
pub const SHADOW_FULLY_LIT: f32 = 1.0;

// Initial element capacity for per-frame geometry buffers
pub const GEOMETRY_INITIAL_CAPACITY: usize = 65536;
