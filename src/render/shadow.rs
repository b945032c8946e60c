//! Directional shadow mapping.
//!
//! Two passes over the frame's sorted geometry, both from the light's point
//! of view: a depth-only pass for opaque faces and an optional colour-filter
//! pass for translucent ones. The light frustum is refit every frame to the
//! visible scene bounds so depth-map resolution is never spent outside the
//! draw distance.

use glam::{Mat4, Vec3};

use crate::config::{CullingMode, ShadowConfig, TintMode};
use crate::constants::SHADOW_FULLY_LIT;
use crate::error::{RendererError, create_shader_checked};
use crate::render::frustum::SceneBounds;
use crate::render::vertex_buffer_layouts;

const SHADOW_DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;
const TRANSLUCENCY_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

/// Floor of `sin(pitch)` when stretching the vertical footprint; keeps the
/// near-horizon projection from degenerating to an infinite strip.
const MIN_PITCH_SIN: f32 = 0.05;

/// How to fit the light's orthographic frustum around the visible scene.
pub trait ShadowFitStrategy: Send {
    /// (width, height) of the orthographic footprint in world-local units.
    fn fit(&self, bounds: &SceneBounds, yaw: f32, pitch: f32) -> (f32, f32);
}

/// Shrinks the footprint as the light yaw approaches a diagonal, where the
/// axis-aligned bounds' rotated silhouette is narrower, and stretches the
/// vertical extent as the light drops towards the horizon. At yaw 0 and
/// pitch straight down both factors are 1 and the footprint is exactly the
/// bounds' span.
pub struct DiagonalFit;

impl ShadowFitStrategy for DiagonalFit {
    fn fit(&self, bounds: &SceneBounds, yaw: f32, pitch: f32) -> (f32, f32) {
        let (span_x, span_z) = bounds.span();
        let yaw_scale = 1.0 / (yaw.sin().abs() + yaw.cos().abs());
        let pitch_scale = 1.0 / pitch.sin().max(MIN_PITCH_SIN);
        (span_x * yaw_scale, span_z * yaw_scale * pitch_scale)
    }
}

/// A light pitch outside (0, pi) puts the sun below the horizon: no shadow
/// passes run and the scene tint switches to night.
pub fn classify_frame(pitch: f32) -> TintMode {
    if pitch > 0.0 && pitch < std::f32::consts::PI {
        TintMode::Day
    } else {
        TintMode::Night
    }
}

/// Unit direction light rays travel, from the light's yaw/pitch. Pitch pi/2
/// is straight down.
pub fn light_direction(yaw: f32, pitch: f32) -> Vec3 {
    Vec3::new(
        yaw.sin() * pitch.cos(),
        -pitch.sin(),
        yaw.cos() * pitch.cos(),
    )
    .normalize()
}

struct ShadowResources {
    config: ShadowConfig,
    depth_view: wgpu::TextureView,
    translucency_view: wgpu::TextureView,
    opaque_pipeline: wgpu::RenderPipeline,
    translucency_pipeline: wgpu::RenderPipeline,
    bind_group: wgpu::BindGroup,
}

/// Owns the shadow map targets and pipelines. Resources exist only while
/// shadows are enabled; disabling them drops the textures entirely rather
/// than keeping dormant allocations.
pub struct ShadowProjector {
    fit: Box<dyn ShadowFitStrategy>,
    resources: Option<ShadowResources>,
}

impl ShadowProjector {
    pub fn new(fit: Box<dyn ShadowFitStrategy>) -> Self {
        Self {
            fit,
            resources: None,
        }
    }

    pub fn enabled(&self) -> bool {
        self.resources.is_some()
    }

    /// Light view-projection for this frame, fitted to the visible bounds
    /// and centred at the player's local height.
    pub fn light_matrix(
        &self,
        bounds: &SceneBounds,
        player_height: f32,
        yaw: f32,
        pitch: f32,
    ) -> Mat4 {
        let direction = light_direction(yaw, pitch);
        let (cx, cz) = bounds.center();
        let center = Vec3::new(cx, player_height, cz);
        // Keep `up` linearly independent of a near-vertical light
        let up = if direction.y.abs() > 0.99 {
            Vec3::Z
        } else {
            Vec3::Y
        };
        let (span_x, span_z) = bounds.span();
        let radius = span_x.max(span_z);
        let view = Mat4::look_to_rh(center - direction * radius, direction, up);
        let (width, height) = self.fit.fit(bounds, yaw, pitch);
        let projection = Mat4::orthographic_rh(
            -width / 2.0,
            width / 2.0,
            -height / 2.0,
            height / 2.0,
            0.0,
            radius * 2.0,
        );
        projection * view
    }

    /// Create or drop the shadow resources to match `config`. Also rebuilds
    /// them when the resolution or translucency culling changed.
    pub fn apply_config(
        &mut self,
        device: &wgpu::Device,
        uniform_buffer: &wgpu::Buffer,
        config: &ShadowConfig,
    ) -> Result<(), RendererError> {
        if !config.enabled {
            if self.resources.take().is_some() {
                tracing::info!("shadows disabled, dropping shadow resources");
            }
            return Ok(());
        }
        if let Some(existing) = &self.resources
            && existing.config == *config
        {
            return Ok(());
        }
        tracing::info!(
            resolution = config.resolution,
            translucency = config.translucency,
            "building shadow resources"
        );
        self.resources = Some(Self::build_resources(device, uniform_buffer, config)?);
        Ok(())
    }

    fn build_resources(
        device: &wgpu::Device,
        uniform_buffer: &wgpu::Buffer,
        config: &ShadowConfig,
    ) -> Result<ShadowResources, RendererError> {
        let shader =
            create_shader_checked(device, "shadow.wgsl", include_str!("../shaders/shadow.wgsl"))?;

        let texture = |label, format| {
            device
                .create_texture(&wgpu::TextureDescriptor {
                    label: Some(label),
                    size: wgpu::Extent3d {
                        width: config.resolution,
                        height: config.resolution,
                        depth_or_array_layers: 1,
                    },
                    mip_level_count: 1,
                    sample_count: 1,
                    dimension: wgpu::TextureDimension::D2,
                    format,
                    usage: wgpu::TextureUsages::RENDER_ATTACHMENT
                        | wgpu::TextureUsages::TEXTURE_BINDING,
                    view_formats: &[],
                })
                .create_view(&wgpu::TextureViewDescriptor::default())
        };
        let depth_view = texture("Shadow Depth Texture", SHADOW_DEPTH_FORMAT);
        let translucency_view = texture("Shadow Translucency Texture", TRANSLUCENCY_FORMAT);

        let bind_group_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("Shadow Bind Group Layout"),
                entries: &[wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                }],
            });
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Shadow Bind Group"),
            layout: &bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            }],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Shadow Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            immediate_size: 0,
        });

        let opaque_pipeline =
            device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some("Shadow Opaque Pipeline"),
                layout: Some(&pipeline_layout),
                vertex: wgpu::VertexState {
                    module: &shader,
                    entry_point: Some("vs_main"),
                    buffers: &vertex_buffer_layouts(),
                    compilation_options: Default::default(),
                },
                fragment: Some(wgpu::FragmentState {
                    module: &shader,
                    entry_point: Some("fs_opaque"),
                    targets: &[],
                    compilation_options: Default::default(),
                }),
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleList,
                    strip_index_format: None,
                    front_face: wgpu::FrontFace::Ccw,
                    cull_mode: Some(wgpu::Face::Back),
                    polygon_mode: wgpu::PolygonMode::Fill,
                    unclipped_depth: false,
                    conservative: false,
                },
                depth_stencil: Some(wgpu::DepthStencilState {
                    format: SHADOW_DEPTH_FORMAT,
                    depth_write_enabled: true,
                    depth_compare: wgpu::CompareFunction::LessEqual,
                    stencil: wgpu::StencilState::default(),
                    bias: wgpu::DepthBiasState::default(),
                }),
                multisample: wgpu::MultisampleState::default(),
                multiview_mask: None,
                cache: None,
            });

        let cull_mode = match config.translucency_culling {
            CullingMode::Off => None,
            CullingMode::Back => Some(wgpu::Face::Back),
            CullingMode::Front => Some(wgpu::Face::Front),
        };
        let translucency_pipeline =
            device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some("Shadow Translucency Pipeline"),
                layout: Some(&pipeline_layout),
                vertex: wgpu::VertexState {
                    module: &shader,
                    entry_point: Some("vs_main"),
                    buffers: &vertex_buffer_layouts(),
                    compilation_options: Default::default(),
                },
                fragment: Some(wgpu::FragmentState {
                    module: &shader,
                    entry_point: Some("fs_translucency"),
                    targets: &[Some(wgpu::ColorTargetState {
                        format: TRANSLUCENCY_FORMAT,
                        blend: Some(wgpu::BlendState {
                            color: wgpu::BlendComponent {
                                src_factor: wgpu::BlendFactor::One,
                                dst_factor: wgpu::BlendFactor::One,
                                operation: wgpu::BlendOperation::ReverseSubtract,
                            },
                            alpha: wgpu::BlendComponent::REPLACE,
                        }),
                        write_mask: wgpu::ColorWrites::COLOR,
                    })],
                    compilation_options: Default::default(),
                }),
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleList,
                    strip_index_format: None,
                    front_face: wgpu::FrontFace::Ccw,
                    cull_mode,
                    polygon_mode: wgpu::PolygonMode::Fill,
                    unclipped_depth: false,
                    conservative: false,
                },
                depth_stencil: None,
                multisample: wgpu::MultisampleState::default(),
                multiview_mask: None,
                cache: None,
            });

        Ok(ShadowResources {
            config: config.clone(),
            depth_view,
            translucency_view,
            opaque_pipeline,
            translucency_pipeline,
            bind_group,
        })
    }

    /// Record this frame's shadow passes. At night both targets are cleared
    /// to "fully lit" and no geometry is drawn.
    pub fn render(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        vertices: &wgpu::Buffer,
        uvs: &wgpu::Buffer,
        vertex_count: u32,
        tint: TintMode,
    ) {
        let Some(res) = &self.resources else {
            return;
        };
        let draw = tint == TintMode::Day && vertex_count > 0;

        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Shadow Opaque Pass"),
                color_attachments: &[],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &res.depth_view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(SHADOW_FULLY_LIT),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            });
            if draw {
                pass.set_pipeline(&res.opaque_pipeline);
                pass.set_bind_group(0, &res.bind_group, &[]);
                pass.set_vertex_buffer(0, vertices.slice(..));
                pass.set_vertex_buffer(1, uvs.slice(..));
                pass.draw(0..vertex_count, 0..1);
            }
        }

        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Shadow Translucency Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &res.translucency_view,
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::WHITE),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            });
            if draw && res.config.translucency {
                pass.set_pipeline(&res.translucency_pipeline);
                pass.set_bind_group(0, &res.bind_group, &[]);
                pass.set_vertex_buffer(0, vertices.slice(..));
                pass.set_vertex_buffer(1, uvs.slice(..));
                pass.draw(0..vertex_count, 0..1);
            }
        }
    }

    pub fn depth_view(&self) -> Option<&wgpu::TextureView> {
        self.resources.as_ref().map(|r| &r.depth_view)
    }

    pub fn translucency_view(&self) -> Option<&wgpu::TextureView> {
        self.resources.as_ref().map(|r| &r.translucency_view)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::{FRAC_PI_2, FRAC_PI_4, PI};

    #[test]
    fn test_fit_is_identity_overhead() {
        let bounds = SceneBounds {
            min_x: 0,
            max_x: 4000,
            min_z: 0,
            max_z: 3000,
        };
        let (w, h) = DiagonalFit.fit(&bounds, 0.0, FRAC_PI_2);
        assert!((w - 4000.0).abs() < 1e-3);
        assert!((h - 3000.0).abs() < 1e-3);
    }

    #[test]
    fn test_fit_shrinks_on_diagonal_yaw() {
        let bounds = SceneBounds {
            min_x: 0,
            max_x: 4000,
            min_z: 0,
            max_z: 4000,
        };
        let (w, _) = DiagonalFit.fit(&bounds, FRAC_PI_4, FRAC_PI_2);
        // 1 / (sin + cos) at 45 degrees = 1 / sqrt(2)
        assert!((w - 4000.0 / 2f32.sqrt()).abs() < 1e-2);
    }

    #[test]
    fn test_fit_stretches_towards_horizon() {
        let bounds = SceneBounds {
            min_x: 0,
            max_x: 1000,
            min_z: 0,
            max_z: 1000,
        };
        let (_, h_noon) = DiagonalFit.fit(&bounds, 0.0, FRAC_PI_2);
        let (_, h_evening) = DiagonalFit.fit(&bounds, 0.0, 0.3);
        assert!(h_evening > h_noon);
    }

    #[test]
    fn test_night_classification() {
        assert_eq!(classify_frame(FRAC_PI_2), TintMode::Day);
        assert_eq!(classify_frame(0.01), TintMode::Day);
        assert_eq!(classify_frame(0.0), TintMode::Night);
        assert_eq!(classify_frame(-0.4), TintMode::Night);
        assert_eq!(classify_frame(PI + 0.1), TintMode::Night);
    }

    #[test]
    fn test_light_direction_noon_points_down() {
        let d = light_direction(0.7, FRAC_PI_2);
        assert!((d.y + 1.0).abs() < 1e-6);
        assert!(d.x.abs() < 1e-6);
    }
}
