//! Device buffer handle with high-water-mark reallocation.
//!
//! Per-frame transient buffers fluctuate in size below a high-water mark;
//! reallocating them every frame would thrash the allocator. A `GpuBuffer`
//! therefore reallocates only when the requested size exceeds the current
//! allocation and otherwise sub-uploads into the existing one. Reallocation
//! bumps a generation counter so that bind groups referencing the buffer
//! know to rebuild; partial updates never invalidate anything.

/// Size and generation bookkeeping for one allocation, kept apart from the
/// device handle. Reallocation is only ever triggered by growth; shrinking
/// and same-size requests reuse the allocation and leave the generation
/// untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferExtent {
    size: u64,
    generation: u64,
}

impl BufferExtent {
    pub fn new(size: u64) -> Self {
        Self {
            size,
            generation: 0,
        }
    }

    /// Request room for `required` bytes. Returns `true` when the backing
    /// allocation must be replaced, which also bumps the generation.
    pub fn request(&mut self, required: u64) -> bool {
        if required <= self.size {
            return false;
        }
        self.size = required;
        self.generation += 1;
        true
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

pub struct GpuBuffer {
    label: &'static str,
    usage: wgpu::BufferUsages,
    buffer: wgpu::Buffer,
    extent: BufferExtent,
}

impl GpuBuffer {
    pub fn new(
        device: &wgpu::Device,
        label: &'static str,
        usage: wgpu::BufferUsages,
        initial_size: u64,
    ) -> Self {
        let size = initial_size.max(4);
        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size,
            usage: usage | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        Self {
            label,
            usage,
            buffer,
            extent: BufferExtent::new(size),
        }
    }

    /// Upload `data`, reallocating only if it no longer fits.
    pub fn upload(&mut self, device: &wgpu::Device, queue: &wgpu::Queue, data: &[u8]) {
        if data.is_empty() {
            return;
        }
        self.ensure_size(device, data.len() as u64);
        queue.write_buffer(&self.buffer, 0, data);
    }

    /// Guarantee the allocation holds at least `required` bytes.
    pub fn ensure_size(&mut self, device: &wgpu::Device, required: u64) {
        if !self.extent.request(required) {
            return;
        }
        tracing::debug!(
            "reallocating buffer `{}` to {} bytes",
            self.label,
            required
        );
        self.buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(self.label),
            size: required,
            usage: self.usage | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
    }

    pub fn buffer(&self) -> &wgpu::Buffer {
        &self.buffer
    }

    pub fn size(&self) -> u64 {
        self.extent.size()
    }

    /// Bumped on every reallocation; bind groups snapshot this to detect a
    /// stale buffer reference.
    pub fn generation(&self) -> u64 {
        self.extent.generation()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generation_bumps_only_on_growth() {
        let mut extent = BufferExtent::new(64);
        assert!(!extent.request(64));
        assert!(!extent.request(1));
        assert!(!extent.request(0));
        assert_eq!(extent.generation(), 0);

        assert!(extent.request(65));
        assert_eq!(extent.size(), 65);
        assert_eq!(extent.generation(), 1);

        // High-water mark: shrinking keeps the allocation
        assert!(!extent.request(10));
        assert_eq!(extent.size(), 65);
        assert_eq!(extent.generation(), 1);

        assert!(extent.request(200));
        assert_eq!(extent.generation(), 2);
    }

    #[test]
    fn test_generation_snapshot_detects_realloc() {
        // Mirrors the bind-group rebuild check: a snapshot taken before a
        // growth no longer matches, one taken before a shrink still does.
        let mut extent = BufferExtent::new(128);
        let snapshot = extent.generation();
        extent.request(64);
        assert_eq!(extent.generation(), snapshot);
        extent.request(256);
        assert_ne!(extent.generation(), snapshot);
    }
}
