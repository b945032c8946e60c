//! Renderer internals: draw collection, GPU face sorting, shadow mapping and
//! frame compositing, tied together by [`Renderer`].

pub mod buffer;
pub mod collector;
pub mod compositor;
pub mod frustum;
pub mod shadow;
pub mod sorter;

use std::sync::Arc;
use std::time::Instant;

use crossbeam_channel::Receiver;
use glam::Mat4;
use parking_lot::RwLock;

use crate::config::{ConfigEvent, RendererConfig, SunMode, TintMode};
use crate::constants::TILE_UNITS;
use crate::core::{FrameState, SceneUniforms};
use crate::error::RendererError;
use crate::render::buffer::GpuBuffer;
use crate::render::collector::DrawCollector;
use crate::render::compositor::Compositor;
use crate::render::frustum::{SceneBounds, frustum_ground_corners};
use crate::render::shadow::{DiagonalFit, ShadowProjector, classify_frame};
use crate::render::sorter::{FaceSorter, SortSync};
use crate::scene::SceneSource;
use crate::celestial::{CelestialClock, CelestialSource};

const NEAR_PLANE: f32 = 50.0;
const FAR_PLANE: f32 = 25_000.0;

/// The two geometry vertex buffers: integer XYZ plus the packed
/// colour/alpha/material attribute, and float material id plus UV.
pub(crate) fn vertex_buffer_layouts() -> [wgpu::VertexBufferLayout<'static>; 2] {
    const POSITION_ATTR: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![0 => Sint32x4];
    const MATERIAL_UV: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![1 => Float32x4];
    [
        wgpu::VertexBufferLayout {
            array_stride: crate::constants::VERTEX_BYTES,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &POSITION_ATTR,
        },
        wgpu::VertexBufferLayout {
            array_stride: crate::constants::UV_BYTES,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &MATERIAL_UV,
        },
    ]
}

pub struct Renderer {
    window: Arc<winit::window::Window>,
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    surface_config: wgpu::SurfaceConfiguration,
    config: Arc<RwLock<RendererConfig>>,
    config_events: Receiver<ConfigEvent>,
    uniforms: GpuBuffer,
    collector: DrawCollector,
    frame: FrameState,
    sorter: FaceSorter,
    shadow: ShadowProjector,
    compositor: Compositor,
    celestial: Box<dyn CelestialSource>,
    started: Instant,
}

impl Renderer {
    pub async fn new(
        window: Arc<winit::window::Window>,
        config: Arc<RwLock<RendererConfig>>,
        config_events: Receiver<ConfigEvent>,
    ) -> Result<Self, RendererError> {
        let size = window.inner_size();
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor::default());
        let surface = instance
            .create_surface(window.clone())
            .map_err(|e| RendererError::Surface(e.to_string()))?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .map_err(|e| RendererError::Adapter(e.to_string()))?;
        let info = adapter.get_info();
        tracing::info!(name = %info.name, backend = ?info.backend, "using adapter");

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("Renderer Device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                memory_hints: wgpu::MemoryHints::default(),
                experimental_features: Default::default(),
                trace: wgpu::Trace::Off,
            })
            .await
            .map_err(|e| RendererError::Device(e.to_string()))?;

        let capabilities = surface.get_capabilities(&adapter);
        let format = capabilities
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .unwrap_or(capabilities.formats[0]);
        let surface_config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: capabilities.present_modes[0],
            alpha_mode: capabilities.alpha_modes[0],
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &surface_config);

        // In-encoder ordering between the sort dispatch and the draw is not
        // dependable on GL-class backends; fall back to a blocking submit.
        let sync = if info.backend == wgpu::Backend::Gl {
            SortSync::QueueWait
        } else {
            SortSync::Barrier
        };
        tracing::info!(?sync, "sort synchronization");

        let uniforms = GpuBuffer::new(
            &device,
            "Scene Uniforms",
            wgpu::BufferUsages::UNIFORM,
            std::mem::size_of::<SceneUniforms>() as u64,
        );

        let snapshot = config.read().clone();
        let collector = DrawCollector::new(snapshot.compute_sort);
        let sorter = FaceSorter::new(&device, sync)?;
        let mut shadow = ShadowProjector::new(Box::new(DiagonalFit));
        shadow.apply_config(&device, uniforms.buffer(), &snapshot.shadows)?;
        let mut compositor = Compositor::new(
            &device,
            format,
            uniforms.buffer(),
            surface_config.width,
            surface_config.height,
            snapshot.antialiasing.sample_count(),
        )?;
        compositor.update_shadow_bindings(
            &device,
            uniforms.buffer(),
            shadow.depth_view(),
            shadow.translucency_view(),
        );

        Ok(Self {
            window,
            surface,
            device,
            queue,
            surface_config,
            config,
            config_events,
            uniforms,
            collector,
            frame: FrameState::default(),
            sorter,
            shadow,
            compositor,
            celestial: Box::new(CelestialClock),
            started: Instant::now(),
        })
    }

    pub fn window(&self) -> &winit::window::Window {
        &self.window
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.surface_config.width = width;
        self.surface_config.height = height;
        self.surface.configure(&self.device, &self.surface_config);
    }

    /// Upload the session's static scene geometry; submissions reference it
    /// by offset until the next upload replaces it.
    pub fn upload_static_scene(&mut self, vertices: &[i32], uvs: &[f32]) {
        self.sorter
            .upload_static_scene(&self.device, &self.queue, vertices, uvs);
    }

    fn apply_config_events(&mut self, snapshot: &RendererConfig) {
        for event in self.config_events.try_iter().collect::<Vec<_>>() {
            match event {
                ConfigEvent::ShadowsChanged => {
                    match self
                        .shadow
                        .apply_config(&self.device, self.uniforms.buffer(), &snapshot.shadows)
                    {
                        Ok(()) => self.compositor.update_shadow_bindings(
                            &self.device,
                            self.uniforms.buffer(),
                            self.shadow.depth_view(),
                            self.shadow.translucency_view(),
                        ),
                        Err(e) => tracing::error!("shadow reconfiguration failed: {e}"),
                    }
                }
                ConfigEvent::AntialiasingChanged => {
                    // Targets are refit below from the new sample count
                    tracing::info!(aa = ?snapshot.antialiasing, "antialiasing changed");
                }
            }
        }
    }

    /// Light yaw/pitch in radians for this frame. At night the moon stands
    /// in for the sun so the light matrix stays continuous.
    fn light_angles(&self, sun: SunMode) -> (f32, f32) {
        match sun {
            SunMode::Fixed { yaw, pitch } => (yaw.to_radians(), pitch.to_radians()),
            SunMode::TimeSynced {
                latitude,
                longitude,
            } => {
                let now = chrono::Utc::now().timestamp_millis();
                let (azimuth, zenith) = self.celestial.sun_position(now, latitude, longitude);
                let pitch = std::f32::consts::FRAC_PI_2 - zenith as f32;
                if pitch > 0.0 {
                    (azimuth as f32, pitch)
                } else {
                    let (azimuth, zenith) = self.celestial.moon_position(now, latitude, longitude);
                    (
                        azimuth as f32,
                        std::f32::consts::FRAC_PI_2 - zenith as f32,
                    )
                }
            }
        }
    }

    pub fn render_frame(
        &mut self,
        scene: &mut dyn SceneSource,
    ) -> Result<(), wgpu::SurfaceError> {
        let snapshot = self.config.read().clone();
        self.apply_config_events(&snapshot);
        self.collector.set_compute_enabled(snapshot.compute_sort);

        let camera = scene.camera();
        self.compositor.ensure_targets(
            &self.device,
            self.surface_config.width,
            self.surface_config.height,
            snapshot.antialiasing.sample_count(),
        );

        let mut frame = std::mem::take(&mut self.frame);
        self.collector.begin_frame(&mut frame);
        scene.populate(&mut self.collector, &mut frame);
        self.collector.end_frame();

        let projection = Mat4::perspective_rh(camera.fov_y(), camera.aspect(), NEAR_PLANE, FAR_PLANE);
        let view = Mat4::from_rotation_x(camera.pitch)
            * Mat4::from_rotation_y(camera.yaw)
            * Mat4::from_translation(-camera.position);
        let view_proj = projection * view;

        let bounds = SceneBounds::from_player(
            camera.player_tile.0,
            camera.player_tile.1,
            snapshot.draw_distance,
        );
        if snapshot.debug_overlay {
            let corners = frustum_ground_corners(&view_proj.inverse(), &bounds);
            tracing::debug!(?corners, "frustum ground footprint");
        }

        let now = chrono::Utc::now().timestamp_millis();
        let (light_yaw, light_pitch) = self.light_angles(snapshot.sun);
        // Day/night follows the sun even when the moon lights the scene
        let sun_pitch = match snapshot.sun {
            SunMode::Fixed { pitch, .. } => pitch.to_radians(),
            SunMode::TimeSynced {
                latitude,
                longitude,
            } => {
                let (_, zenith) = self.celestial.sun_position(now, latitude, longitude);
                std::f32::consts::FRAC_PI_2 - zenith as f32
            }
        };
        let tint = if snapshot.tint_mode == TintMode::Night {
            TintMode::Night
        } else {
            classify_frame(sun_pitch)
        };
        // Moonlight dims the night scene with the lunar phase
        let night_brightness = if tint == TintMode::Night {
            0.4 + 0.6 * self.celestial.moon_illumination(now) as f32
        } else {
            1.0
        };

        let light_view_proj =
            self.shadow
                .light_matrix(&bounds, camera.player_height, light_yaw, light_pitch);
        let draw_distance_units =
            (snapshot.draw_distance.clamp(0, crate::constants::MAX_DRAW_DISTANCE) * TILE_UNITS) as f32;
        let uniforms = SceneUniforms {
            view_proj: view_proj.to_cols_array_2d(),
            light_view_proj: light_view_proj.to_cols_array_2d(),
            camera_pos: camera.position.to_array(),
            draw_distance: draw_distance_units,
            sky_color: [
                snapshot.sky_color[0],
                snapshot.sky_color[1],
                snapshot.sky_color[2],
                night_brightness,
            ],
            shadow_params: [
                snapshot.shadows.opacity,
                snapshot.shadows.color_intensity,
                snapshot.shadows.kernel_size as f32,
                snapshot.shadows.fade_falloff,
            ],
            modes: [
                tint.as_uniform(),
                snapshot.distance_fade.as_uniform(),
                u32::from(self.shadow.enabled()),
                u32::from(self.shadow.enabled() && snapshot.shadows.translucency),
            ],
            fog_depth: snapshot.fog_depth,
            time: self.started.elapsed().as_secs_f32(),
            _pad: [0.0; 2],
        };
        self.uniforms
            .upload(&self.device, &self.queue, bytemuck::bytes_of(&uniforms));

        self.sorter.prepare(
            &self.device,
            &self.queue,
            &self.collector,
            &frame,
            camera.position.to_array(),
        );

        let output = self.surface.get_current_texture()?;
        let surface_view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Frame Encoder"),
            });

        if snapshot.compute_sort {
            self.sorter
                .run(&self.device, &self.queue, &mut encoder, &frame);
        }
        let (vertices, uvs) = if snapshot.compute_sort {
            (self.sorter.out_vertices(), self.sorter.out_uvs())
        } else {
            (self.sorter.temp_vertices(), self.sorter.temp_uvs())
        };

        self.shadow
            .render(&mut encoder, vertices, uvs, frame.vertex_count(), tint);

        if let Some((pixels, width, height)) = scene.ui_pixels() {
            self.compositor.upload_ui(
                &self.device,
                &self.queue,
                pixels,
                width,
                height,
                snapshot.ui_scaling,
            );
        } else {
            self.compositor.discard_ui();
        }
        self.compositor.composite(
            &mut encoder,
            &surface_view,
            vertices,
            uvs,
            frame.vertex_count(),
            snapshot.sky_color,
        );

        self.queue.submit(std::iter::once(encoder.finish()));
        output.present();
        self.frame = frame;
        Ok(())
    }
}
