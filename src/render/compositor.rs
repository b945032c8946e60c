//! Frame compositing: the main colour pass over the sorted geometry followed
//! by the 2-D interface overlay.
//!
//! The offscreen MSAA and depth targets are recreated only when the canvas
//! size or sample count changes, never per frame. The interface overlay is a
//! canvas-sized ARGB pixel buffer uploaded into a BGRA texture (the byte
//! layouts coincide on little-endian) and alpha-blended over the resolved
//! scene as a full-screen quad.

use crate::config::UiScaling;
use crate::error::{RendererError, create_shader_checked};
use crate::render::vertex_buffer_layouts;

const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;
const UI_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Bgra8Unorm;

/// The interface texture only depends on the pixel dimensions; sampler and
/// scaling-mode changes never invalidate it.
fn ui_texture_stale(existing: Option<(u32, u32)>, width: u32, height: u32) -> bool {
    existing != Some((width, height))
}

pub struct Compositor {
    surface_format: wgpu::TextureFormat,
    scene_shader: wgpu::ShaderModule,
    scene_bind_group_layout: wgpu::BindGroupLayout,
    scene_pipeline_layout: wgpu::PipelineLayout,
    scene_pipeline: wgpu::RenderPipeline,
    scene_bind_group: wgpu::BindGroup,
    ui_bind_group_layout: wgpu::BindGroupLayout,
    ui_pipeline: wgpu::RenderPipeline,
    comparison_sampler: wgpu::Sampler,
    linear_sampler: wgpu::Sampler,
    nearest_sampler: wgpu::Sampler,
    // Bound in place of the shadow maps while shadows are disabled
    placeholder_depth: wgpu::TextureView,
    placeholder_color: wgpu::TextureView,
    size: (u32, u32),
    samples: u32,
    msaa_view: Option<wgpu::TextureView>,
    depth_view: wgpu::TextureView,
    ui_texture: Option<(wgpu::Texture, u32, u32)>,
    ui_bind_group: Option<wgpu::BindGroup>,
    ui_scaling: UiScaling,
}

impl Compositor {
    pub fn new(
        device: &wgpu::Device,
        surface_format: wgpu::TextureFormat,
        uniform_buffer: &wgpu::Buffer,
        width: u32,
        height: u32,
        samples: u32,
    ) -> Result<Self, RendererError> {
        let scene_shader =
            create_shader_checked(device, "scene.wgsl", include_str!("../shaders/scene.wgsl"))?;
        let ui_shader =
            create_shader_checked(device, "ui.wgsl", include_str!("../shaders/ui.wgsl"))?;

        let scene_bind_group_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("Scene Bind Group Layout"),
                entries: &[
                    wgpu::BindGroupLayoutEntry {
                        binding: 0,
                        visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                        ty: wgpu::BindingType::Buffer {
                            ty: wgpu::BufferBindingType::Uniform,
                            has_dynamic_offset: false,
                            min_binding_size: None,
                        },
                        count: None,
                    },
                    wgpu::BindGroupLayoutEntry {
                        binding: 1,
                        visibility: wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Texture {
                            sample_type: wgpu::TextureSampleType::Depth,
                            view_dimension: wgpu::TextureViewDimension::D2,
                            multisampled: false,
                        },
                        count: None,
                    },
                    wgpu::BindGroupLayoutEntry {
                        binding: 2,
                        visibility: wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Comparison),
                        count: None,
                    },
                    wgpu::BindGroupLayoutEntry {
                        binding: 3,
                        visibility: wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Texture {
                            sample_type: wgpu::TextureSampleType::Float { filterable: true },
                            view_dimension: wgpu::TextureViewDimension::D2,
                            multisampled: false,
                        },
                        count: None,
                    },
                    wgpu::BindGroupLayoutEntry {
                        binding: 4,
                        visibility: wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                        count: None,
                    },
                ],
            });
        let scene_pipeline_layout =
            device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("Scene Pipeline Layout"),
                bind_group_layouts: &[&scene_bind_group_layout],
                immediate_size: 0,
            });

        let ui_bind_group_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("UI Bind Group Layout"),
                entries: &[
                    wgpu::BindGroupLayoutEntry {
                        binding: 0,
                        visibility: wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Texture {
                            sample_type: wgpu::TextureSampleType::Float { filterable: true },
                            view_dimension: wgpu::TextureViewDimension::D2,
                            multisampled: false,
                        },
                        count: None,
                    },
                    wgpu::BindGroupLayoutEntry {
                        binding: 1,
                        visibility: wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                        count: None,
                    },
                ],
            });
        let ui_pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("UI Pipeline Layout"),
            bind_group_layouts: &[&ui_bind_group_layout],
            immediate_size: 0,
        });
        let ui_pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("UI Pipeline"),
            layout: Some(&ui_pipeline_layout),
            vertex: wgpu::VertexState {
                module: &ui_shader,
                entry_point: Some("vs_main"),
                buffers: &[],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &ui_shader,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: surface_format,
                    blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState::default(),
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview_mask: None,
            cache: None,
        });

        let comparison_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Shadow Comparison Sampler"),
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            compare: Some(wgpu::CompareFunction::LessEqual),
            ..Default::default()
        });
        let linear_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Linear Sampler"),
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });
        let nearest_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Nearest Sampler"),
            ..Default::default()
        });

        let placeholder = |label, format| {
            device
                .create_texture(&wgpu::TextureDescriptor {
                    label: Some(label),
                    size: wgpu::Extent3d {
                        width: 1,
                        height: 1,
                        depth_or_array_layers: 1,
                    },
                    mip_level_count: 1,
                    sample_count: 1,
                    dimension: wgpu::TextureDimension::D2,
                    format,
                    usage: wgpu::TextureUsages::TEXTURE_BINDING
                        | wgpu::TextureUsages::RENDER_ATTACHMENT,
                    view_formats: &[],
                })
                .create_view(&wgpu::TextureViewDescriptor::default())
        };
        let placeholder_depth = placeholder("Placeholder Shadow Depth", DEPTH_FORMAT);
        let placeholder_color =
            placeholder("Placeholder Translucency", wgpu::TextureFormat::Rgba8Unorm);

        let scene_pipeline = Self::build_scene_pipeline(
            device,
            &scene_shader,
            &scene_pipeline_layout,
            surface_format,
            samples,
        );
        let scene_bind_group = Self::build_scene_bind_group(
            device,
            &scene_bind_group_layout,
            uniform_buffer,
            &comparison_sampler,
            &linear_sampler,
            &placeholder_depth,
            &placeholder_color,
        );

        let (msaa_view, depth_view) = Self::build_targets(
            device,
            surface_format,
            width,
            height,
            samples,
        );

        Ok(Self {
            surface_format,
            scene_shader,
            scene_bind_group_layout,
            scene_pipeline_layout,
            scene_pipeline,
            scene_bind_group,
            ui_bind_group_layout,
            ui_pipeline,
            comparison_sampler,
            linear_sampler,
            nearest_sampler,
            placeholder_depth,
            placeholder_color,
            size: (width, height),
            samples,
            msaa_view,
            depth_view,
            ui_texture: None,
            ui_bind_group: None,
            ui_scaling: UiScaling::Nearest,
        })
    }

    fn build_scene_pipeline(
        device: &wgpu::Device,
        shader: &wgpu::ShaderModule,
        layout: &wgpu::PipelineLayout,
        surface_format: wgpu::TextureFormat,
        samples: u32,
    ) -> wgpu::RenderPipeline {
        device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Scene Pipeline"),
            layout: Some(layout),
            vertex: wgpu::VertexState {
                module: shader,
                entry_point: Some("vs_main"),
                buffers: &vertex_buffer_layouts(),
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: shader,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: surface_format,
                    blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            // Sorted geometry carries both windings; depth handles the rest
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: DEPTH_FORMAT,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::LessEqual,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState {
                count: samples,
                mask: !0,
                alpha_to_coverage_enabled: false,
            },
            multiview_mask: None,
            cache: None,
        })
    }

    fn build_scene_bind_group(
        device: &wgpu::Device,
        layout: &wgpu::BindGroupLayout,
        uniform_buffer: &wgpu::Buffer,
        comparison_sampler: &wgpu::Sampler,
        linear_sampler: &wgpu::Sampler,
        shadow_depth: &wgpu::TextureView,
        translucency: &wgpu::TextureView,
    ) -> wgpu::BindGroup {
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Scene Bind Group"),
            layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: uniform_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(shadow_depth),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::Sampler(comparison_sampler),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: wgpu::BindingResource::TextureView(translucency),
                },
                wgpu::BindGroupEntry {
                    binding: 4,
                    resource: wgpu::BindingResource::Sampler(linear_sampler),
                },
            ],
        })
    }

    fn build_targets(
        device: &wgpu::Device,
        surface_format: wgpu::TextureFormat,
        width: u32,
        height: u32,
        samples: u32,
    ) -> (Option<wgpu::TextureView>, wgpu::TextureView) {
        let target = |label, format| {
            device
                .create_texture(&wgpu::TextureDescriptor {
                    label: Some(label),
                    size: wgpu::Extent3d {
                        width: width.max(1),
                        height: height.max(1),
                        depth_or_array_layers: 1,
                    },
                    mip_level_count: 1,
                    sample_count: samples,
                    dimension: wgpu::TextureDimension::D2,
                    format,
                    usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
                    view_formats: &[],
                })
                .create_view(&wgpu::TextureViewDescriptor::default())
        };
        let msaa_view = if samples > 1 {
            Some(target("MSAA Color Target", surface_format))
        } else {
            None
        };
        (msaa_view, target("Scene Depth Target", DEPTH_FORMAT))
    }

    /// Recreate the offscreen targets if the canvas size or sample count
    /// changed; the pipeline is also rebuilt when the sample count changed.
    pub fn ensure_targets(&mut self, device: &wgpu::Device, width: u32, height: u32, samples: u32) {
        if self.size == (width, height) && self.samples == samples {
            return;
        }
        tracing::debug!(width, height, samples, "recreating frame targets");
        if self.samples != samples {
            self.scene_pipeline = Self::build_scene_pipeline(
                device,
                &self.scene_shader,
                &self.scene_pipeline_layout,
                self.surface_format,
                samples,
            );
        }
        let (msaa_view, depth_view) =
            Self::build_targets(device, self.surface_format, width, height, samples);
        self.msaa_view = msaa_view;
        self.depth_view = depth_view;
        self.size = (width, height);
        self.samples = samples;
    }

    /// Point the scene pass at the current shadow maps, or at the 1x1
    /// placeholders while shadows are off.
    pub fn update_shadow_bindings(
        &mut self,
        device: &wgpu::Device,
        uniform_buffer: &wgpu::Buffer,
        shadow_depth: Option<&wgpu::TextureView>,
        translucency: Option<&wgpu::TextureView>,
    ) {
        self.scene_bind_group = Self::build_scene_bind_group(
            device,
            &self.scene_bind_group_layout,
            uniform_buffer,
            &self.comparison_sampler,
            &self.linear_sampler,
            shadow_depth.unwrap_or(&self.placeholder_depth),
            translucency.unwrap_or(&self.placeholder_color),
        );
    }

    /// Upload the interface pixel buffer. The texture is recreated only when
    /// the pixel dimensions changed; a scaling-mode change swaps the sampler,
    /// which only the bind group references.
    pub fn upload_ui(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        pixels: &[u32],
        width: u32,
        height: u32,
        scaling: UiScaling,
    ) {
        debug_assert_eq!(pixels.len(), (width * height) as usize);
        let recreate = ui_texture_stale(
            self.ui_texture.as_ref().map(|(_, w, h)| (*w, *h)),
            width,
            height,
        );
        if recreate {
            let texture = device.create_texture(&wgpu::TextureDescriptor {
                label: Some("UI Texture"),
                size: wgpu::Extent3d {
                    width,
                    height,
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: UI_FORMAT,
                usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
                view_formats: &[],
            });
            self.ui_texture = Some((texture, width, height));
        }
        let Some((texture, ..)) = &self.ui_texture else {
            return;
        };

        if recreate || self.ui_bind_group.is_none() || self.ui_scaling != scaling {
            let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
            let sampler = match scaling {
                UiScaling::Nearest => &self.nearest_sampler,
                UiScaling::Linear => &self.linear_sampler,
            };
            self.ui_bind_group = Some(device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("UI Bind Group"),
                layout: &self.ui_bind_group_layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: wgpu::BindingResource::TextureView(&view),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: wgpu::BindingResource::Sampler(sampler),
                    },
                ],
            }));
            self.ui_scaling = scaling;
        }

        // ARGB u32 pixels and BGRA8 texels share a byte layout on
        // little-endian, so the buffer uploads without a repack.
        queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            bytemuck::cast_slice(pixels),
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(4 * width),
                rows_per_image: Some(height),
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );
    }

    pub fn discard_ui(&mut self) {
        self.ui_texture = None;
        self.ui_bind_group = None;
    }

    /// Record the main colour pass and the interface overlay pass.
    pub fn composite(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        surface_view: &wgpu::TextureView,
        vertices: &wgpu::Buffer,
        uvs: &wgpu::Buffer,
        vertex_count: u32,
        sky_color: [f32; 3],
    ) {
        let (view, resolve_target) = match &self.msaa_view {
            Some(msaa) => (msaa, Some(surface_view)),
            None => (surface_view, None),
        };
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Scene Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view,
                    depth_slice: None,
                    resolve_target,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color {
                            r: sky_color[0] as f64,
                            g: sky_color[1] as f64,
                            b: sky_color[2] as f64,
                            a: 1.0,
                        }),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth_view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            });
            if vertex_count > 0 {
                pass.set_pipeline(&self.scene_pipeline);
                pass.set_bind_group(0, &self.scene_bind_group, &[]);
                pass.set_vertex_buffer(0, vertices.slice(..));
                pass.set_vertex_buffer(1, uvs.slice(..));
                pass.draw(0..vertex_count, 0..1);
            }
        }

        if let Some(ui_bind_group) = &self.ui_bind_group {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("UI Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: surface_view,
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            });
            pass.set_pipeline(&self.ui_pipeline);
            pass.set_bind_group(0, ui_bind_group, &[]);
            pass.draw(0..6, 0..1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ui_texture_recreated_only_on_resize() {
        assert!(ui_texture_stale(None, 320, 240));
        assert!(ui_texture_stale(Some((320, 240)), 640, 480));
        // Same dimensions keep the texture regardless of scaling mode
        assert!(!ui_texture_stale(Some((320, 240)), 320, 240));
    }
}
