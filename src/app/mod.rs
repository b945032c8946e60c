//! Demo application: window setup, event loop and runtime config toggles.

mod demo;

use std::sync::Arc;

use parking_lot::RwLock;
use winit::event::{ElementState, Event, KeyEvent, WindowEvent};
use winit::event_loop::EventLoop;
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::WindowBuilder;

use tilescape::config::AntiAliasing;
use tilescape::{ConfigEvent, Renderer, RendererConfig};

use demo::DemoScene;

pub fn run(
    config: RendererConfig,
    width: u32,
    height: u32,
) -> Result<(), Box<dyn std::error::Error>> {
    let event_loop = EventLoop::new()?;
    let window = Arc::new(
        WindowBuilder::new()
            .with_title("tilescape")
            .with_inner_size(winit::dpi::LogicalSize::new(width, height))
            .build(&event_loop)?,
    );

    let config = Arc::new(RwLock::new(config));
    let (config_tx, config_rx) = crossbeam_channel::unbounded();

    let mut renderer = pollster::block_on(Renderer::new(
        window.clone(),
        config.clone(),
        config_rx,
    ))?;
    let mut scene = DemoScene::new();
    let (static_vertices, static_uvs) = scene.static_geometry();
    renderer.upload_static_scene(&static_vertices, &static_uvs);

    let size = window.inner_size();
    scene.set_canvas_size(size.width, size.height);

    event_loop.run(move |event, elwt| match event {
        Event::WindowEvent { window_id, event } if window_id == renderer.window().id() => {
            match event {
                WindowEvent::CloseRequested => elwt.exit(),
                WindowEvent::Resized(size) => {
                    renderer.resize(size.width, size.height);
                    scene.set_canvas_size(size.width, size.height);
                }
                WindowEvent::KeyboardInput {
                    event:
                        KeyEvent {
                            physical_key: PhysicalKey::Code(code),
                            state: ElementState::Pressed,
                            ..
                        },
                    ..
                } => match code {
                    KeyCode::Escape => elwt.exit(),
                    KeyCode::KeyH => {
                        let enabled = {
                            let mut config = config.write();
                            config.shadows.enabled = !config.shadows.enabled;
                            config.shadows.enabled
                        };
                        tracing::info!(enabled, "shadows toggled");
                        let _ = config_tx.send(ConfigEvent::ShadowsChanged);
                    }
                    KeyCode::KeyA => {
                        let aa = {
                            let mut config = config.write();
                            config.antialiasing = match config.antialiasing {
                                AntiAliasing::Off => AntiAliasing::Msaa2,
                                AntiAliasing::Msaa2 => AntiAliasing::Msaa4,
                                AntiAliasing::Msaa4 => AntiAliasing::Msaa8,
                                AntiAliasing::Msaa8 => AntiAliasing::Off,
                            };
                            config.antialiasing
                        };
                        tracing::info!(?aa, "antialiasing cycled");
                        let _ = config_tx.send(ConfigEvent::AntialiasingChanged);
                    }
                    KeyCode::KeyC => {
                        let mut config = config.write();
                        config.compute_sort = !config.compute_sort;
                        tracing::info!(compute = config.compute_sort, "sort path toggled");
                    }
                    _ => {}
                },
                WindowEvent::RedrawRequested => {
                    scene.advance();
                    match renderer.render_frame(&mut scene) {
                        Ok(()) => {}
                        Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                            let size = renderer.window().inner_size();
                            renderer.resize(size.width, size.height);
                        }
                        Err(wgpu::SurfaceError::OutOfMemory) => {
                            tracing::error!("surface out of memory");
                            elwt.exit();
                        }
                        Err(e) => tracing::warn!("frame skipped: {e}"),
                    }
                }
                _ => {}
            }
        }
        Event::AboutToWait => renderer.window().request_redraw(),
        _ => {}
    })?;
    Ok(())
}
