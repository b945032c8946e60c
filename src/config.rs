//! Renderer configuration surface.
//!
//! The renderer only reads these values; the hosting application owns the
//! struct behind an `Arc<RwLock<..>>` and may edit it from any thread.
//! Changes that require GPU resource work (shadow toggle, resolution) are
//! announced over a channel and applied on the rendering thread at the next
//! frame boundary.

use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RendererConfig {
    /// Draw distance in tiles, clamped to [0, MAX_DRAW_DISTANCE]
    pub draw_distance: i32,
    pub antialiasing: AntiAliasing,
    /// GPU face sorting; when off, submissions take the software path
    pub compute_sort: bool,
    pub shadows: ShadowConfig,
    pub sun: SunMode,
    pub tint_mode: TintMode,
    pub distance_fade: DistanceFade,
    pub ui_scaling: UiScaling,
    pub debug_overlay: bool,
    pub sky_color: [f32; 3],
    /// Fog band depth as a fraction of the draw distance
    pub fog_depth: f32,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            draw_distance: 25,
            antialiasing: AntiAliasing::Msaa4,
            compute_sort: true,
            shadows: ShadowConfig::default(),
            sun: SunMode::default(),
            tint_mode: TintMode::Day,
            distance_fade: DistanceFade::Smooth,
            ui_scaling: UiScaling::Linear,
            debug_overlay: false,
            sky_color: [0.53, 0.71, 0.94],
            fog_depth: 0.3,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum AntiAliasing {
    Off,
    Msaa2,
    Msaa4,
    Msaa8,
}

impl AntiAliasing {
    pub fn sample_count(self) -> u32 {
        match self {
            AntiAliasing::Off => 1,
            AntiAliasing::Msaa2 => 2,
            AntiAliasing::Msaa4 => 4,
            AntiAliasing::Msaa8 => 8,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ShadowConfig {
    pub enabled: bool,
    pub translucency: bool,
    pub resolution: u32,
    /// PCF kernel radius in texels
    pub kernel_size: u32,
    pub opacity: f32,
    pub color_intensity: f32,
    /// Fraction of the draw distance over which shadows thin out to nothing
    /// at the far edge, shaped by the distance-fade curve
    pub fade_falloff: f32,
    /// Face culling for the translucency pass only; the opaque pass always
    /// culls back faces
    pub translucency_culling: CullingMode,
}

impl Default for ShadowConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            translucency: true,
            resolution: 2048,
            kernel_size: 2,
            opacity: 0.6,
            color_intensity: 0.5,
            fade_falloff: 0.25,
            translucency_culling: CullingMode::Back,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum CullingMode {
    Off,
    Back,
    Front,
}

/// How the shadow-casting light is driven.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub enum SunMode {
    /// Fixed horizontal/vertical angles in degrees
    Fixed { yaw: f32, pitch: f32 },
    /// Astronomical position for the configured coordinates
    TimeSynced { latitude: f64, longitude: f64 },
}

impl Default for SunMode {
    fn default() -> Self {
        SunMode::Fixed {
            yaw: 30.0,
            pitch: 65.0,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum TintMode {
    Day,
    Night,
}

impl TintMode {
    pub fn as_uniform(self) -> u32 {
        match self {
            TintMode::Day => 0,
            TintMode::Night => 1,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum DistanceFade {
    Off,
    Linear,
    Smooth,
}

impl DistanceFade {
    pub fn as_uniform(self) -> u32 {
        match self {
            DistanceFade::Off => 0,
            DistanceFade::Linear => 1,
            DistanceFade::Smooth => 2,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum UiScaling {
    Nearest,
    Linear,
}

/// Announcement that part of the config changed. GPU work implied by the
/// change is deferred to the rendering thread's frame boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigEvent {
    ShadowsChanged,
    AntialiasingChanged,
}

pub fn save_config(config: &RendererConfig, path: &Path) -> std::io::Result<()> {
    let encoded = bincode::serialize(config)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
    let mut file = File::create(path)?;
    file.write_all(&encoded)
}

pub fn load_config(path: &Path) -> std::io::Result<RendererConfig> {
    let mut file = File::open(path)?;
    let mut encoded = Vec::new();
    file.read_to_end(&mut encoded)?;
    bincode::deserialize(&encoded)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_roundtrip() {
        let dir = std::env::temp_dir().join("tilescape_config_test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("renderer.bin");

        let mut config = RendererConfig::default();
        config.draw_distance = 40;
        config.shadows.resolution = 4096;
        config.shadows.fade_falloff = 0.5;
        config.sun = SunMode::TimeSynced {
            latitude: 51.5,
            longitude: -0.1,
        };

        save_config(&config, &path).unwrap();
        let loaded = load_config(&path).unwrap();
        assert_eq!(loaded.draw_distance, 40);
        assert_eq!(loaded.shadows.resolution, 4096);
        assert_eq!(loaded.shadows.fade_falloff, 0.5);
        assert_eq!(loaded.sun, config.sun);
    }

    #[test]
    fn test_sample_counts() {
        assert_eq!(AntiAliasing::Off.sample_count(), 1);
        assert_eq!(AntiAliasing::Msaa8.sample_count(), 8);
    }
}
