//! Draw submission collector.
//!
//! The scene source pushes tiles and models here every frame. With compute
//! sorting enabled each submission becomes a compact [`ModelDescriptor`] in
//! one of three bucket queues; triangle data for dynamic models is staged
//! into the per-frame geometry buffers and referenced by offset, while
//! static-scene models reference the session-lived pre-uploaded buffer.
//! With compute sorting disabled the triangles are transformed on the CPU
//! and appended directly, and the geometry buffers feed the draw call as-is.

use bytemuck::{Pod, Zeroable};
use rustc_hash::FxHashMap;

use crate::constants::{
    GEOMETRY_INITIAL_CAPACITY, MAX_MODEL_TRIANGLES, ORIENTATION_MASK, SMALL_MODEL_TRIANGLES,
    UV_FLOATS, VERTEX_INTS,
};
use crate::core::uniforms::orientation_sincos;
use crate::core::{FloatBuffer, FrameState, IntBuffer};
use crate::scene::{DynamicModel, ModelPlacement, StaticModelRef, TileGeometry};

/// Descriptor flag marking a model that reads from the static scene buffer
/// rather than the per-frame staging buffers.
pub const FLAG_STATIC_SCENE: i32 = 1 << 30;

/// Size-partitioned compute dispatch queues.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortBucket {
    /// No intra-model sort needed (tile paint, pre-ordered primitives)
    Unordered,
    /// <= 512 triangles
    Small,
    /// <= 4096 triangles
    Large,
}

impl SortBucket {
    /// Bucket assignment, re-derived on every submission; classification is
    /// never cached across frames.
    pub fn classify(triangle_count: u32, needs_sort: bool) -> Self {
        debug_assert!(triangle_count <= MAX_MODEL_TRIANGLES);
        if !needs_sort {
            SortBucket::Unordered
        } else if triangle_count <= SMALL_MODEL_TRIANGLES {
            SortBucket::Small
        } else {
            SortBucket::Large
        }
    }

    pub const ALL: [SortBucket; 3] = [SortBucket::Unordered, SortBucket::Small, SortBucket::Large];

    fn index(self) -> usize {
        match self {
            SortBucket::Unordered => 0,
            SortBucket::Small => 1,
            SortBucket::Large => 2,
        }
    }
}

/// Per-model record consumed by one compute workgroup. Must match the
/// `ModelDescriptor` struct in `shaders/sort.wgsl`.
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct ModelDescriptor {
    /// Offset in vertices into the static scene or staging vertex buffer
    pub vertex_offset: i32,
    pub uv_offset: i32,
    pub triangle_count: i32,
    /// Reserved offset in the shared output buffers, in vertices
    pub dest_offset: i32,
    /// Orientation in the low bits plus [`FLAG_STATIC_SCENE`]
    pub flags: i32,
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

#[derive(Clone, Copy)]
struct StagedModel {
    vertex_offset: i32,
    uv_offset: i32,
}

pub struct DrawCollector {
    compute_enabled: bool,
    vertices: IntBuffer,
    uvs: FloatBuffer,
    buckets: [Vec<ModelDescriptor>; 3],
    /// Dynamic models staged this frame, keyed by the source's identity
    /// hash; a model submitted at several placements stages its triangles
    /// once. Cleared at the frame boundary.
    staged: FxHashMap<u64, StagedModel>,
}

impl DrawCollector {
    pub fn new(compute_enabled: bool) -> Self {
        Self {
            compute_enabled,
            vertices: IntBuffer::new(GEOMETRY_INITIAL_CAPACITY),
            uvs: FloatBuffer::new(GEOMETRY_INITIAL_CAPACITY),
            buckets: [Vec::new(), Vec::new(), Vec::new()],
            staged: FxHashMap::default(),
        }
    }

    pub fn set_compute_enabled(&mut self, enabled: bool) {
        self.compute_enabled = enabled;
    }

    pub fn compute_enabled(&self) -> bool {
        self.compute_enabled
    }

    /// Frame boundary: resets the frame counters and rewinds all per-frame
    /// storage. The previous frame's draw call must already be issued.
    pub fn begin_frame(&mut self, frame: &mut FrameState) {
        frame.begin_frame();
        self.vertices.clear();
        self.uvs.clear();
        for bucket in &mut self.buckets {
            bucket.clear();
        }
        self.staged.clear();
    }

    /// Seal the frame's staged geometry for upload.
    pub fn end_frame(&mut self) {
        self.vertices.flip();
        self.uvs.flip();
    }

    /// Tile paint / tile model geometry, already in world-local coordinates.
    pub fn push_tile(&mut self, frame: &mut FrameState, tile: &TileGeometry) {
        let triangle_count = tile.triangle_count();
        if triangle_count == 0 {
            return;
        }
        if self.compute_enabled {
            let vertex_offset = self.vertices.written() / VERTEX_INTS;
            let uv_offset = self.uvs.written() / UV_FLOATS;
            self.vertices.put_slice(tile.vertices);
            self.uvs.put_slice(tile.uvs);
            let dest_offset = frame.reserve(triangle_count) as i32;
            self.enqueue(
                frame,
                SortBucket::Unordered,
                ModelDescriptor {
                    vertex_offset: vertex_offset as i32,
                    uv_offset: uv_offset as i32,
                    triangle_count: triangle_count as i32,
                    dest_offset,
                    flags: 0,
                    x: 0,
                    y: 0,
                    z: 0,
                },
            );
        } else {
            self.vertices.put_slice(tile.vertices);
            self.uvs.put_slice(tile.uvs);
            frame.reserve(triangle_count);
        }
    }

    /// A model in the pre-uploaded static scene buffer. Ignored on the
    /// software path, which has no access to that buffer; the scene source
    /// re-submits the geometry as a dynamic model instead.
    pub fn push_static_model(
        &mut self,
        frame: &mut FrameState,
        model: &StaticModelRef,
        placement: ModelPlacement,
    ) {
        if !self.compute_enabled || model.triangle_count == 0 {
            return;
        }
        let bucket = SortBucket::classify(model.triangle_count, model.needs_sort);
        let dest_offset = frame.reserve(model.triangle_count) as i32;
        self.enqueue(
            frame,
            bucket,
            ModelDescriptor {
                vertex_offset: model.vertex_offset as i32,
                uv_offset: model.uv_offset as i32,
                triangle_count: model.triangle_count as i32,
                dest_offset,
                flags: (placement.orientation & ORIENTATION_MASK) | FLAG_STATIC_SCENE,
                x: placement.position.x,
                y: placement.position.y,
                z: placement.position.z,
            },
        );
    }

    /// A dynamic model with per-frame triangle data. `hash` is the source's
    /// 64-bit identity; repeated submissions of the same model this frame
    /// reuse the staged triangles.
    pub fn push_dynamic_model(
        &mut self,
        frame: &mut FrameState,
        model: &DynamicModel,
        placement: ModelPlacement,
        hash: u64,
    ) {
        let triangle_count = model.triangle_count();
        if triangle_count == 0 {
            return;
        }
        if self.compute_enabled {
            let staged = if let Some(staged) = self.staged.get(&hash) {
                *staged
            } else {
                let staged = StagedModel {
                    vertex_offset: (self.vertices.written() / VERTEX_INTS) as i32,
                    uv_offset: (self.uvs.written() / UV_FLOATS) as i32,
                };
                self.vertices.put_slice(model.vertices());
                self.uvs.put_slice(model.uvs());
                self.staged.insert(hash, staged);
                staged
            };
            let descriptor = ModelDescriptor {
                vertex_offset: staged.vertex_offset,
                uv_offset: staged.uv_offset,
                triangle_count: triangle_count as i32,
                dest_offset: frame.reserve(triangle_count) as i32,
                flags: placement.orientation & ORIENTATION_MASK,
                x: placement.position.x,
                y: placement.position.y,
                z: placement.position.z,
            };
            let bucket = SortBucket::classify(triangle_count, model.needs_sort());
            self.enqueue(frame, bucket, descriptor);
        } else {
            self.push_transformed(model, placement);
            frame.reserve(triangle_count);
        }
    }

    /// Software path: apply the model transform on the CPU and append the
    /// triangles directly into the draw buffers.
    fn push_transformed(&mut self, model: &DynamicModel, placement: ModelPlacement) {
        let position = placement.position;
        let (sin, cos) = orientation_sincos(placement.orientation);
        let verts = model.vertices();
        self.vertices.ensure_capacity(verts.len());
        for v in verts.chunks_exact(VERTEX_INTS) {
            let (x, y, z) = (v[0] as f32, v[1], v[2] as f32);
            let rx = (x * cos + z * sin).round() as i32;
            let rz = (z * cos - x * sin).round() as i32;
            self.vertices.put4(
                rx + position.x,
                y + position.y,
                rz + position.z,
                v[3],
            );
        }
        self.uvs.put_slice(model.uvs());
    }

    fn enqueue(&mut self, frame: &mut FrameState, bucket: SortBucket, descriptor: ModelDescriptor) {
        match bucket {
            SortBucket::Unordered => frame.unordered_models += 1,
            SortBucket::Small => frame.small_models += 1,
            SortBucket::Large => frame.large_models += 1,
        }
        self.buckets[bucket.index()].push(descriptor);
    }

    pub fn bucket(&self, bucket: SortBucket) -> &[ModelDescriptor] {
        &self.buckets[bucket.index()]
    }

    pub fn vertices(&self) -> &IntBuffer {
        &self.vertices
    }

    pub fn uvs(&self) -> &FloatBuffer {
        &self.uvs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::IVec3;

    fn at(x: i32, y: i32, z: i32, orientation: i32) -> ModelPlacement {
        ModelPlacement {
            position: IVec3::new(x, y, z),
            orientation,
        }
    }

    fn dynamic_model(triangles: usize, needs_sort: bool) -> DynamicModel {
        DynamicModel::new(
            vec![1; triangles * 3 * VERTEX_INTS],
            vec![0.0; triangles * 3 * UV_FLOATS],
            needs_sort,
        )
    }

    #[test]
    fn test_bucket_classification() {
        assert_eq!(SortBucket::classify(2, false), SortBucket::Unordered);
        assert_eq!(SortBucket::classify(4096, false), SortBucket::Unordered);
        assert_eq!(SortBucket::classify(1, true), SortBucket::Small);
        assert_eq!(SortBucket::classify(512, true), SortBucket::Small);
        assert_eq!(SortBucket::classify(513, true), SortBucket::Large);
        assert_eq!(SortBucket::classify(4096, true), SortBucket::Large);
    }

    #[test]
    fn test_output_offset_accounting() {
        let mut collector = DrawCollector::new(true);
        let mut frame = FrameState::default();
        collector.begin_frame(&mut frame);

        let counts = [7u32, 512, 513, 100];
        for (i, &triangles) in counts.iter().enumerate() {
            collector.push_dynamic_model(
                &mut frame,
                &dynamic_model(triangles as usize, true),
                at(0, 0, 0, 0),
                i as u64,
            );
        }
        assert_eq!(frame.vertex_count(), 3 * counts.iter().sum::<u32>());
    }

    #[test]
    fn test_end_to_end_frame_accounting() {
        // One static tile (unordered, 2 triangles) and one dynamic model
        // (small, 10 triangles): two dispatch groups, 36 output vertices.
        let mut collector = DrawCollector::new(true);
        let mut frame = FrameState::default();
        collector.begin_frame(&mut frame);

        let tile_vertices = vec![0i32; 2 * 3 * VERTEX_INTS];
        let tile_uvs = vec![0.0f32; 2 * 3 * UV_FLOATS];
        collector.push_tile(
            &mut frame,
            &TileGeometry {
                tile_x: 10,
                tile_z: 12,
                vertices: &tile_vertices,
                uvs: &tile_uvs,
            },
        );
        collector.push_dynamic_model(
            &mut frame,
            &dynamic_model(10, true),
            at(1280, 0, 1536, 256),
            0xDEAD_BEEF,
        );

        assert_eq!(frame.dispatch_groups(), 2);
        assert_eq!(frame.vertex_count(), 36);
        assert_eq!(collector.bucket(SortBucket::Unordered).len(), 1);
        assert_eq!(collector.bucket(SortBucket::Small).len(), 1);
        assert_eq!(collector.bucket(SortBucket::Large).len(), 0);
    }

    #[test]
    fn test_zero_triangle_model_is_not_enqueued() {
        let mut collector = DrawCollector::new(true);
        let mut frame = FrameState::default();
        collector.begin_frame(&mut frame);
        collector.push_dynamic_model(&mut frame, &dynamic_model(0, true), at(0, 0, 0, 0), 1);
        assert_eq!(frame.dispatch_groups(), 0);
        assert_eq!(frame.vertex_count(), 0);
    }

    #[test]
    fn test_repeated_hash_stages_once() {
        let mut collector = DrawCollector::new(true);
        let mut frame = FrameState::default();
        collector.begin_frame(&mut frame);

        let model = dynamic_model(4, true);
        collector.push_dynamic_model(&mut frame, &model, at(0, 0, 0, 0), 42);
        let staged_after_first = collector.vertices().written();
        collector.push_dynamic_model(&mut frame, &model, at(128, 0, 0, 512), 42);

        assert_eq!(collector.vertices().written(), staged_after_first);
        assert_eq!(collector.bucket(SortBucket::Small).len(), 2);
        assert_eq!(frame.vertex_count(), 2 * 3 * 4);
    }

    #[test]
    fn test_software_path_appends_directly() {
        let mut collector = DrawCollector::new(false);
        let mut frame = FrameState::default();
        collector.begin_frame(&mut frame);
        collector.push_dynamic_model(&mut frame, &dynamic_model(3, true), at(100, 0, 200, 0), 7);
        collector.end_frame();

        assert_eq!(frame.dispatch_groups(), 0);
        assert_eq!(frame.vertex_count(), 9);
        assert_eq!(collector.vertices().slice().len(), 9 * VERTEX_INTS);
        // Identity orientation: translation only
        assert_eq!(collector.vertices().slice()[0], 1 + 100);
        assert_eq!(collector.vertices().slice()[2], 1 + 200);
    }

    #[test]
    fn test_static_ref_keeps_offsets_and_flag() {
        let mut collector = DrawCollector::new(true);
        let mut frame = FrameState::default();
        collector.begin_frame(&mut frame);
        collector.push_static_model(
            &mut frame,
            &StaticModelRef {
                vertex_offset: 300,
                uv_offset: 300,
                triangle_count: 600,
                needs_sort: true,
            },
            at(64, 0, 64, 100),
        );
        let descriptor = collector.bucket(SortBucket::Large)[0];
        assert_eq!(descriptor.vertex_offset, 300);
        assert_ne!(descriptor.flags & FLAG_STATIC_SCENE, 0);
        assert_eq!(descriptor.flags & ORIENTATION_MASK, 100);
        // Nothing staged for static refs
        assert_eq!(collector.vertices().written(), 0);
    }

    #[test]
    fn test_static_ref_ignored_on_software_path() {
        // Reserving output slots here would overrun the draw buffers: the
        // software draw reads exactly the appended triangles.
        let mut collector = DrawCollector::new(false);
        let mut frame = FrameState::default();
        collector.begin_frame(&mut frame);
        collector.push_static_model(
            &mut frame,
            &StaticModelRef {
                vertex_offset: 0,
                uv_offset: 0,
                triangle_count: 12,
                needs_sort: true,
            },
            at(0, 0, 0, 0),
        );
        collector.end_frame();

        assert_eq!(frame.vertex_count(), 0);
        assert_eq!(frame.dispatch_groups(), 0);
        assert_eq!(collector.vertices().slice().len(), 0);
    }
}
