//! Uniform and instance buffer wrappers

use crate::backend::traits::*;
use crate::backend::types::*;
use bytemuck::Pod;
use std::marker::PhantomData;

/// Fixed-size uniform buffer holding one `T`
pub struct UniformBuffer<T: Pod> {
    handle: BufferHandle,
    _marker: PhantomData<T>,
}

impl<T: Pod> UniformBuffer<T> {
    pub fn new<B: GraphicsBackend>(backend: &mut B, label: &str, initial: &T) -> BackendResult<Self> {
        let handle = backend.create_buffer_init(
            &BufferDescriptor {
                label: Some(label.to_string()),
                size: std::mem::size_of::<T>() as u64,
                usage: BufferUsage::UNIFORM | BufferUsage::COPY_DST,
            },
            bytemuck::bytes_of(initial),
        )?;

        Ok(Self {
            handle,
            _marker: PhantomData,
        })
    }

    pub fn handle(&self) -> BufferHandle {
        self.handle
    }

    pub fn update<B: GraphicsBackend>(&self, backend: &mut B, value: &T) {
        backend.write_buffer(self.handle, 0, bytemuck::bytes_of(value));
    }

    pub fn destroy<B: GraphicsBackend>(self, backend: &mut B) {
        backend.destroy_buffer(self.handle);
    }
}

/// Growable vertex buffer for per-instance data
///
/// A frame's instance data is uploaded with one [`InstanceBuffer::upload`]
/// call; draws then bind sub-ranges of it by byte offset.
pub struct InstanceBuffer {
    handle: BufferHandle,
    capacity: u64,
    label: String,
}

impl InstanceBuffer {
    const MIN_CAPACITY: u64 = 4096;

    pub fn new<B: GraphicsBackend>(backend: &mut B, label: &str) -> BackendResult<Self> {
        let handle = Self::allocate(backend, label, Self::MIN_CAPACITY)?;
        Ok(Self {
            handle,
            capacity: Self::MIN_CAPACITY,
            label: label.to_string(),
        })
    }

    fn allocate<B: GraphicsBackend>(backend: &mut B, label: &str, size: u64) -> BackendResult<BufferHandle> {
        backend.create_buffer(&BufferDescriptor {
            label: Some(label.to_string()),
            size,
            usage: BufferUsage::VERTEX | BufferUsage::COPY_DST,
        })
    }

    pub fn handle(&self) -> BufferHandle {
        self.handle
    }

    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    /// Replace the buffer contents, reallocating when `data` does not fit
    pub fn upload<B: GraphicsBackend>(&mut self, backend: &mut B, data: &[u8]) -> BackendResult<()> {
        if data.is_empty() {
            return Ok(());
        }

        let required = data.len() as u64;
        if required > self.capacity {
            let capacity = required.next_power_of_two();
            log::debug!(
                "Growing instance buffer '{}' from {} to {} bytes",
                self.label,
                self.capacity,
                capacity
            );
            let handle = Self::allocate(backend, &self.label, capacity)?;
            backend.destroy_buffer(self.handle);
            self.handle = handle;
            self.capacity = capacity;
        }

        backend.write_buffer(self.handle, 0, data);
        Ok(())
    }

    pub fn destroy<B: GraphicsBackend>(self, backend: &mut B) {
        backend.destroy_buffer(self.handle);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::dummy::DummyBackend;

    #[test]
    fn instance_buffer_grows_to_fit() {
        let mut backend = DummyBackend::new(8, 8);
        let mut buffer = InstanceBuffer::new(&mut backend, "instances").unwrap();
        let first = buffer.handle();

        buffer.upload(&mut backend, &[1u8; 64]).unwrap();
        assert_eq!(buffer.handle(), first);

        buffer.upload(&mut backend, &vec![2u8; 5000]).unwrap();
        assert_ne!(buffer.handle(), first);
        assert_eq!(buffer.capacity(), 8192);
        assert_eq!(backend.live_buffer_count(), 1);
        assert_eq!(backend.buffer_contents(buffer.handle()).unwrap()[4999], 2);
    }

    #[test]
    fn uniform_update_overwrites_contents() {
        let mut backend = DummyBackend::new(8, 8);
        let uniform = UniformBuffer::new(&mut backend, "value", &[1.0f32, 2.0, 3.0, 4.0]).unwrap();
        uniform.update(&mut backend, &[5.0f32, 6.0, 7.0, 8.0]);

        let bytes = backend.buffer_contents(uniform.handle()).unwrap();
        let values: [f32; 4] = bytemuck::pod_read_unaligned(bytes);
        assert_eq!(values, [5.0, 6.0, 7.0, 8.0]);
    }
}
