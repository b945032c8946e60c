//! Face sorter: GPU compute dispatch over the three model buckets.
//!
//! Each queued model gets one compute workgroup. The unordered pipeline
//! copies and translates triangles; the small and large pipelines
//! additionally rank-sort them back to front (painter's algorithm) so alpha
//! blending composes correctly without per-triangle depth testing. Sorted
//! triangles land at each model's reserved offset in the shared output
//! buffers, which the main pass then draws in one call.

use crate::constants::{SINCOS_COUNT, UV_BYTES, VERTEX_BYTES};
use crate::core::{FrameState, SortUniforms};
use crate::error::{RendererError, create_shader_checked};
use crate::render::buffer::GpuBuffer;
use crate::render::collector::{DrawCollector, SortBucket};

/// How sort completion is ordered against the main draw call.
///
/// `Barrier` records the dispatches into the frame's own command encoder and
/// relies on the device's usage-scope ordering between the compute writes
/// and the vertex reads. `QueueWait` submits the dispatches on a separate
/// encoder and blocks until the queue drains, for backends where in-encoder
/// ordering is not available. Chosen once at startup, never mixed within a
/// frame. Skipping either form of synchronization is a correctness bug: the
/// draw would read undefined or partially written geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortSync {
    Barrier,
    QueueWait,
}

pub struct FaceSorter {
    sync: SortSync,
    pipelines: [wgpu::ComputePipeline; 3],
    bind_group_layout: wgpu::BindGroupLayout,
    uniforms: GpuBuffer,
    descriptors: [GpuBuffer; 3],
    static_vertices: GpuBuffer,
    static_uvs: GpuBuffer,
    temp_vertices: GpuBuffer,
    temp_uvs: GpuBuffer,
    out_vertices: GpuBuffer,
    out_uvs: GpuBuffer,
    bind_groups: [Option<wgpu::BindGroup>; 3],
    bind_group_generations: [u64; 3],
}

/// Workgroup counts per non-empty bucket, in dispatch order.
pub fn dispatch_plan(frame: &FrameState) -> Vec<(SortBucket, u32)> {
    let counts = [
        (SortBucket::Unordered, frame.unordered_models),
        (SortBucket::Small, frame.small_models),
        (SortBucket::Large, frame.large_models),
    ];
    counts.into_iter().filter(|&(_, n)| n > 0).collect()
}

impl FaceSorter {
    pub fn new(device: &wgpu::Device, sync: SortSync) -> Result<Self, RendererError> {
        let small_source = include_str!("../shaders/sort.wgsl");
        let large_source = small_source.replace(
            "const MAX_TRIS: u32 = 512u;",
            "const MAX_TRIS: u32 = 4096u;",
        );
        let unordered = create_shader_checked(
            device,
            "sort_unordered.wgsl",
            include_str!("../shaders/sort_unordered.wgsl"),
        )?;
        let small = create_shader_checked(device, "sort.wgsl (small)", small_source)?;
        let large = create_shader_checked(device, "sort.wgsl (large)", &large_source)?;

        let storage_entry = |binding: u32, read_only: bool| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::COMPUTE,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Storage { read_only },
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        };
        let bind_group_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("Sort Bind Group Layout"),
                entries: &[
                    // Camera + sine/cosine table
                    wgpu::BindGroupLayoutEntry {
                        binding: 0,
                        visibility: wgpu::ShaderStages::COMPUTE,
                        ty: wgpu::BindingType::Buffer {
                            ty: wgpu::BufferBindingType::Uniform,
                            has_dynamic_offset: false,
                            min_binding_size: None,
                        },
                        count: None,
                    },
                    // Model descriptors for this bucket
                    storage_entry(1, true),
                    // Static scene geometry
                    storage_entry(2, true),
                    storage_entry(3, true),
                    // Per-frame staged geometry
                    storage_entry(4, true),
                    storage_entry(5, true),
                    // Shared output geometry
                    storage_entry(6, false),
                    storage_entry(7, false),
                ],
            });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Sort Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            immediate_size: 0,
        });
        let pipeline = |label, module: &wgpu::ShaderModule| {
            device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: Some(label),
                layout: Some(&pipeline_layout),
                module,
                entry_point: Some("main"),
                compilation_options: Default::default(),
                cache: None,
            })
        };
        let pipelines = [
            pipeline("Sort Pipeline (unordered)", &unordered),
            pipeline("Sort Pipeline (small)", &small),
            pipeline("Sort Pipeline (large)", &large),
        ];

        let storage = wgpu::BufferUsages::STORAGE;
        let geometry = wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::VERTEX;
        Ok(Self {
            sync,
            pipelines,
            bind_group_layout,
            uniforms: GpuBuffer::new(
                device,
                "Sort Uniforms",
                wgpu::BufferUsages::UNIFORM,
                std::mem::size_of::<SortUniforms>() as u64,
            ),
            descriptors: [
                GpuBuffer::new(device, "Model Descriptors (unordered)", storage, 256),
                GpuBuffer::new(device, "Model Descriptors (small)", storage, 256),
                GpuBuffer::new(device, "Model Descriptors (large)", storage, 256),
            ],
            static_vertices: GpuBuffer::new(device, "Static Scene Vertices", storage, 64),
            static_uvs: GpuBuffer::new(device, "Static Scene UVs", storage, 64),
            temp_vertices: GpuBuffer::new(device, "Frame Vertices", geometry, 64),
            temp_uvs: GpuBuffer::new(device, "Frame UVs", geometry, 64),
            out_vertices: GpuBuffer::new(device, "Sorted Vertices", geometry, 64),
            out_uvs: GpuBuffer::new(device, "Sorted UVs", geometry, 64),
            bind_groups: [None, None, None],
            bind_group_generations: [u64::MAX; 3],
        })
    }

    pub fn sync(&self) -> SortSync {
        self.sync
    }

    /// Upload the session-lived static scene geometry. Descriptors with the
    /// static flag read from these buffers by offset.
    pub fn upload_static_scene(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        vertices: &[i32],
        uvs: &[f32],
    ) {
        tracing::info!(
            "uploading static scene: {} vertices",
            vertices.len() / crate::constants::VERTEX_INTS
        );
        self.static_vertices
            .upload(device, queue, bytemuck::cast_slice(vertices));
        self.static_uvs
            .upload(device, queue, bytemuck::cast_slice(uvs));
    }

    /// Upload this frame's descriptors and staged geometry and make sure the
    /// output buffers can hold the frame's reserved vertex count.
    pub fn prepare(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        collector: &DrawCollector,
        frame: &FrameState,
        camera_pos: [f32; 3],
    ) {
        let uniforms = SortUniforms::new(camera_pos);
        self.uniforms
            .upload(device, queue, bytemuck::bytes_of(&*uniforms));

        for (i, bucket) in SortBucket::ALL.into_iter().enumerate() {
            let queued = collector.bucket(bucket);
            if !queued.is_empty() {
                self.descriptors[i].upload(device, queue, bytemuck::cast_slice(queued));
            }
        }

        self.temp_vertices
            .upload(device, queue, collector.vertices().bytes());
        self.temp_uvs.upload(device, queue, collector.uvs().bytes());

        let vertex_count = frame.vertex_count() as u64;
        self.out_vertices
            .ensure_size(device, vertex_count * VERTEX_BYTES);
        self.out_uvs.ensure_size(device, vertex_count * UV_BYTES);

        for i in 0..3 {
            let generation = self.generation_sum(i);
            if self.bind_groups[i].is_none() || self.bind_group_generations[i] != generation {
                self.bind_groups[i] = Some(self.create_bind_group(device, i));
                self.bind_group_generations[i] = generation;
            }
        }
    }

    /// Run the frame's dispatches. With `SortSync::Barrier` the passes are
    /// recorded into `encoder` ahead of the main draw; with
    /// `SortSync::QueueWait` they are submitted immediately and the call
    /// blocks until the device finishes.
    pub fn run(
        &self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        encoder: &mut wgpu::CommandEncoder,
        frame: &FrameState,
    ) {
        if frame.dispatch_groups() == 0 {
            return;
        }
        match self.sync {
            SortSync::Barrier => self.encode(encoder, frame),
            SortSync::QueueWait => {
                let mut sort_encoder =
                    device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
                        label: Some("Sort Encoder"),
                    });
                self.encode(&mut sort_encoder, frame);
                queue.submit(std::iter::once(sort_encoder.finish()));
                let _ = device.poll(wgpu::PollType::wait_indefinitely());
            }
        }
    }

    fn encode(&self, encoder: &mut wgpu::CommandEncoder, frame: &FrameState) {
        let mut cpass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some("Face Sort Pass"),
            timestamp_writes: None,
        });
        for (bucket, groups) in dispatch_plan(frame) {
            let i = match bucket {
                SortBucket::Unordered => 0,
                SortBucket::Small => 1,
                SortBucket::Large => 2,
            };
            if let Some(bind_group) = &self.bind_groups[i] {
                cpass.set_pipeline(&self.pipelines[i]);
                cpass.set_bind_group(0, bind_group, &[]);
                cpass.dispatch_workgroups(groups, 1, 1);
            }
        }
    }

    fn generation_sum(&self, bucket: usize) -> u64 {
        self.uniforms.generation()
            + self.descriptors[bucket].generation()
            + self.static_vertices.generation()
            + self.static_uvs.generation()
            + self.temp_vertices.generation()
            + self.temp_uvs.generation()
            + self.out_vertices.generation()
            + self.out_uvs.generation()
    }

    fn create_bind_group(&self, device: &wgpu::Device, bucket: usize) -> wgpu::BindGroup {
        fn entry(binding: u32, buffer: &GpuBuffer) -> wgpu::BindGroupEntry<'_> {
            wgpu::BindGroupEntry {
                binding,
                resource: buffer.buffer().as_entire_binding(),
            }
        }
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Sort Bind Group"),
            layout: &self.bind_group_layout,
            entries: &[
                entry(0, &self.uniforms),
                entry(1, &self.descriptors[bucket]),
                entry(2, &self.static_vertices),
                entry(3, &self.static_uvs),
                entry(4, &self.temp_vertices),
                entry(5, &self.temp_uvs),
                entry(6, &self.out_vertices),
                entry(7, &self.out_uvs),
            ],
        })
    }

    pub fn out_vertices(&self) -> &wgpu::Buffer {
        self.out_vertices.buffer()
    }

    pub fn out_uvs(&self) -> &wgpu::Buffer {
        self.out_uvs.buffer()
    }

    pub fn temp_vertices(&self) -> &wgpu::Buffer {
        self.temp_vertices.buffer()
    }

    pub fn temp_uvs(&self) -> &wgpu::Buffer {
        self.temp_uvs.buffer()
    }
}

// Compile-time guarantee that the packed sine/cosine table covers the full
// binary-angle range used by descriptor flags.
const _: () = assert!(SINCOS_COUNT == 2048);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dispatch_plan_skips_empty_buckets() {
        let frame = FrameState {
            unordered_models: 1,
            small_models: 1,
            large_models: 0,
            output_offset: 36,
        };
        let plan = dispatch_plan(&frame);
        assert_eq!(
            plan,
            vec![(SortBucket::Unordered, 1), (SortBucket::Small, 1)]
        );
        assert_eq!(plan.iter().map(|&(_, n)| n).sum::<u32>(), 2);
    }

    #[test]
    fn test_dispatch_plan_orders_buckets() {
        let frame = FrameState {
            unordered_models: 4,
            small_models: 2,
            large_models: 1,
            output_offset: 0,
        };
        let buckets: Vec<SortBucket> = dispatch_plan(&frame).into_iter().map(|(b, _)| b).collect();
        assert_eq!(
            buckets,
            vec![SortBucket::Unordered, SortBucket::Small, SortBucket::Large]
        );
    }
}
