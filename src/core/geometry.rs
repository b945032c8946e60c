//! Growable append-only buffers backing per-frame geometry.
//!
//! Two instances carry a frame's triangles: an `IntBuffer` for vertex data
//! (XYZ + packed attribute, 4 ints per vertex) and a `FloatBuffer` for UV
//! data (4 floats per vertex). Writes append at a cursor; `flip()` marks the
//! buffer readable up to the cursor; `clear()` rewinds without deallocating,
//! so steady-state frames allocate nothing.

use bytemuck::Pod;

pub type IntBuffer = GrowableBuffer<i32>;
pub type FloatBuffer = GrowableBuffer<f32>;

pub struct GrowableBuffer<T> {
    data: Vec<T>,
    cursor: usize,
    limit: usize,
}

impl<T: Pod + Default + Copy> GrowableBuffer<T> {
    pub fn new(initial_capacity: usize) -> Self {
        Self {
            data: vec![T::default(); initial_capacity.max(1)],
            cursor: 0,
            limit: 0,
        }
    }

    /// Guarantee that `extra` more elements fit without losing prior writes.
    /// Growth doubles the capacity, or jumps straight to the required size
    /// when doubling is not enough. Contents up to the cursor are preserved.
    pub fn ensure_capacity(&mut self, extra: usize) {
        let required = self.cursor + extra;
        if required > self.data.len() {
            let new_capacity = required.max(self.data.len() * 2);
            self.data.resize(new_capacity, T::default());
        }
    }

    pub fn put_slice(&mut self, values: &[T]) {
        self.ensure_capacity(values.len());
        self.data[self.cursor..self.cursor + values.len()].copy_from_slice(values);
        self.cursor += values.len();
    }

    pub fn put4(&mut self, a: T, b: T, c: T, d: T) {
        self.put_slice(&[a, b, c, d]);
    }

    /// Mark everything written so far as readable and rewind the read view.
    pub fn flip(&mut self) {
        self.limit = self.cursor;
    }

    /// Reset the write cursor without deallocating.
    pub fn clear(&mut self) {
        self.cursor = 0;
        self.limit = 0;
    }

    /// Readable contents, up to the last `flip()`.
    pub fn slice(&self) -> &[T] {
        &self.data[..self.limit]
    }

    pub fn bytes(&self) -> &[u8] {
        bytemuck::cast_slice(self.slice())
    }

    /// Number of elements written this frame.
    pub fn written(&self) -> usize {
        self.cursor
    }

    pub fn capacity(&self) -> usize {
        self.data.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_growth_preserves_contents() {
        let mut buf = IntBuffer::new(4);
        buf.put_slice(&[1, 2, 3, 4]);
        // Force several growth steps
        for i in 0..1000 {
            buf.put4(i, i + 1, i + 2, i + 3);
        }
        buf.flip();
        assert_eq!(&buf.slice()[..4], &[1, 2, 3, 4]);
        assert_eq!(buf.slice()[4], 0);
        assert_eq!(buf.written(), 4 + 4000);
    }

    #[test]
    fn test_cursor_equals_sum_of_writes() {
        let mut buf = FloatBuffer::new(8);
        let mut expected = 0;
        for len in [1usize, 7, 16, 3, 128] {
            buf.put_slice(&vec![0.5; len]);
            expected += len;
            assert_eq!(buf.written(), expected);
        }
    }

    #[test]
    fn test_capacity_doubles_or_jumps() {
        let mut buf = IntBuffer::new(8);
        buf.put_slice(&[0; 8]);
        buf.ensure_capacity(1);
        assert_eq!(buf.capacity(), 16);
        // Larger than 2x jumps straight to the requirement
        buf.ensure_capacity(1000);
        assert_eq!(buf.capacity(), 8 + 1000);
    }

    #[test]
    fn test_clear_then_rewrite_is_identical() {
        let values: Vec<i32> = (0..512).collect();
        let mut buf = IntBuffer::new(16);
        buf.put_slice(&values);
        buf.flip();
        let first: Vec<u8> = buf.bytes().to_vec();

        buf.clear();
        buf.put_slice(&values);
        buf.flip();
        assert_eq!(buf.bytes(), &first[..]);
    }

    #[test]
    fn test_clear_keeps_allocation() {
        let mut buf = IntBuffer::new(4);
        buf.put_slice(&[0; 4096]);
        let cap = buf.capacity();
        buf.clear();
        assert_eq!(buf.capacity(), cap);
        assert_eq!(buf.written(), 0);
    }
}
