//! Renderer error kinds.
//!
//! Startup failures are fatal to the renderer instance: the caller drops the
//! half-built renderer (releasing all GPU resources) and disables rendering,
//! never retaining partial-start state. Shader compilation failures are a
//! distinct kind from device/context failures since they are fixable without
//! revisiting device setup.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RendererError {
    #[error("no compatible graphics adapter: {0}")]
    Adapter(String),

    #[error("device request failed: {0}")]
    Device(String),

    #[error("surface configuration failed: {0}")]
    Surface(String),

    #[error("shader compilation failed in `{module}`: {message}")]
    Shader {
        module: &'static str,
        message: String,
    },
}

/// Create a shader module, surfacing validation failures as
/// [`RendererError::Shader`] instead of the device's uncaptured-error hook.
pub fn create_shader_checked(
    device: &wgpu::Device,
    label: &'static str,
    source: &str,
) -> Result<wgpu::ShaderModule, RendererError> {
    let scope = device.push_error_scope(wgpu::ErrorFilter::Validation);
    let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(label),
        source: wgpu::ShaderSource::Wgsl(source.into()),
    });
    if let Some(error) = pollster::block_on(scope.pop()) {
        return Err(RendererError::Shader {
            module: label,
            message: error.to_string(),
        });
    }
    Ok(module)
}
