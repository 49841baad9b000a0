/// Immediate device buffer
///
/// Device buffer whose initial contents are written synchronously at creation
/// through a creation-time mapping. No staging buffer or copy is involved.

use std::ops::{Deref, DerefMut};

use crate::buffers::buffer::GpuBuffer;
use crate::buffers::buffer_factory::BufferFactory;
use crate::buffers::buffer_types::BufferDesc;
use crate::buffers::device_buffer::DeviceBuffer;
use crate::buffers::native_buffer::NativeBuffer;
use crate::error::Result;

pub struct ImmediateDeviceBuffer<'f> {
    buffer: DeviceBuffer<'f>,
    initial_bytes: u64,
}

impl<'f> ImmediateDeviceBuffer<'f> {
    /// Create a device buffer holding `data` at offset 0
    ///
    /// # Errors
    ///
    /// * `InvalidDescriptor` - `data` is empty or the descriptor is invalid
    /// * `OutOfBounds` - `data` is larger than `desc.size`
    pub fn new(factory: &'f BufferFactory, desc: &BufferDesc, data: &[u8]) -> Result<Self> {
        let desc = DeviceBuffer::effective_desc(desc);
        let native = factory.create_buffer_with_sync_write(&desc, data)?;
        Ok(Self {
            buffer: DeviceBuffer::from_native(factory, desc, native),
            initial_bytes: data.len() as u64,
        })
    }

    /// Bytes written at creation
    pub fn initial_bytes(&self) -> u64 {
        self.initial_bytes
    }

    pub fn as_device_buffer(&self) -> &DeviceBuffer<'f> {
        &self.buffer
    }

    pub fn as_device_buffer_mut(&mut self) -> &mut DeviceBuffer<'f> {
        &mut self.buffer
    }

    pub fn into_device_buffer(self) -> DeviceBuffer<'f> {
        self.buffer
    }
}

impl<'f> Deref for ImmediateDeviceBuffer<'f> {
    type Target = DeviceBuffer<'f>;

    fn deref(&self) -> &DeviceBuffer<'f> {
        &self.buffer
    }
}

impl<'f> DerefMut for ImmediateDeviceBuffer<'f> {
    fn deref_mut(&mut self) -> &mut DeviceBuffer<'f> {
        &mut self.buffer
    }
}

impl GpuBuffer for ImmediateDeviceBuffer<'_> {
    fn native_buffer(&self) -> Option<&dyn NativeBuffer> {
        self.buffer.native_buffer()
    }
}

impl std::fmt::Debug for ImmediateDeviceBuffer<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImmediateDeviceBuffer")
            .field("buffer", &self.buffer)
            .field("initial_bytes", &self.initial_bytes)
            .finish()
    }
}

#[cfg(test)]
#[path = "immediate_device_buffer_tests.rs"]
mod tests;
