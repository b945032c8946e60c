//! Per-frame bookkeeping shared by the collector, sorter and compositor.

/// Counters for the frame being assembled: how many models were queued into
/// each sort bucket and the running destination offset in the shared output
/// buffers. Passed by reference through the pipeline and reset at exactly one
/// place, `begin_frame`.
#[derive(Debug, Default, Clone, Copy)]
pub struct FrameState {
    pub unordered_models: u32,
    pub small_models: u32,
    pub large_models: u32,
    /// Destination vertex slots reserved so far; doubles as the draw-call
    /// vertex count once the frame's submissions are in.
    pub output_offset: u32,
}

impl FrameState {
    /// Frame boundary: called after the previous frame's draw call has been
    /// issued, before the scene source pushes new submissions.
    pub fn begin_frame(&mut self) {
        *self = FrameState::default();
    }

    /// Reserve destination slots for one model and return its offset.
    /// Every model claims `3 * triangle_count` vertices.
    pub fn reserve(&mut self, triangle_count: u32) -> u32 {
        let offset = self.output_offset;
        self.output_offset += 3 * triangle_count;
        offset
    }

    pub fn vertex_count(&self) -> u32 {
        self.output_offset
    }

    /// Total compute workgroups a frame will dispatch (one per queued model).
    pub fn dispatch_groups(&self) -> u32 {
        self.unordered_models + self.small_models + self.large_models
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reserve_accounting() {
        let mut frame = FrameState::default();
        assert_eq!(frame.reserve(2), 0);
        assert_eq!(frame.reserve(10), 6);
        assert_eq!(frame.reserve(1), 36);
        assert_eq!(frame.vertex_count(), 3 * (2 + 10 + 1));
    }

    #[test]
    fn test_begin_frame_resets_everything() {
        let mut frame = FrameState::default();
        frame.unordered_models = 3;
        frame.small_models = 1;
        frame.large_models = 2;
        frame.reserve(100);
        frame.begin_frame();
        assert_eq!(frame.dispatch_groups(), 0);
        assert_eq!(frame.vertex_count(), 0);
    }
}
