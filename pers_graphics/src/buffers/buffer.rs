/// User-facing buffer capabilities and the tagged buffer variant
///
/// Every user-facing buffer implements `GpuBuffer` (observation plus access to the
/// native primitive used by transfers). Only the staging buffers implement
/// `MappableBuffer`. `Buffer` gathers all kinds in one value so mapping is only
/// reachable on the variants that support it.

use crate::buffers::buffer_types::{
    AccessPattern, BufferMapRange, BufferState, BufferUsage, MapMode, MemoryLocation,
};
use crate::buffers::deferred_staging_buffer::DeferredStagingBuffer;
use crate::buffers::device_buffer::DeviceBuffer;
use crate::buffers::dynamic_buffer::DynamicBuffer;
use crate::buffers::immediate_device_buffer::ImmediateDeviceBuffer;
use crate::buffers::immediate_staging_buffer::ImmediateStagingBuffer;
use crate::buffers::mapped_data::{MapFuture, MappedData};
use crate::buffers::native_buffer::{NativeBuffer, NativeBufferHandle};

/// Common observation of a user-facing buffer
///
/// Defaults read through to [`native_buffer`](Self::native_buffer); a buffer
/// without a native primitive reports zero, empty and null values.
pub trait GpuBuffer {
    /// Native primitive used as copy endpoint or for binding
    fn native_buffer(&self) -> Option<&dyn NativeBuffer>;

    fn size(&self) -> u64 {
        self.native_buffer().map_or(0, |native| native.size())
    }

    fn usage(&self) -> BufferUsage {
        self.native_buffer().map_or(BufferUsage::empty(), |native| native.usage())
    }

    fn debug_name(&self) -> &str {
        self.native_buffer().map_or("", |native| native.debug_name())
    }

    fn native_handle(&self) -> NativeBufferHandle {
        self.native_buffer().map_or(NativeBufferHandle::NULL, |native| native.native_handle())
    }

    fn state(&self) -> BufferState {
        self.native_buffer().map_or(BufferState::Uninitialized, |native| native.state())
    }

    fn memory_location(&self) -> MemoryLocation {
        self.native_buffer().map_or(MemoryLocation::Auto, |native| native.memory_location())
    }

    fn access_pattern(&self) -> AccessPattern {
        self.native_buffer().map_or(AccessPattern::Static, |native| native.access_pattern())
    }

    fn is_valid(&self) -> bool {
        self.native_buffer().is_some_and(|native| native.is_valid())
    }
}

/// CPU mapping capability of a user-facing buffer
pub trait MappableBuffer: GpuBuffer {
    /// Borrowed view of the current mapping
    fn mapped_data(&self) -> Option<MappedData>;

    /// Request a mapping; the future resolves to a null handle on failure
    fn map_async(&mut self, mode: MapMode, range: BufferMapRange) -> MapFuture;

    /// End the current mapping; idempotent
    fn unmap(&mut self);

    fn is_mapped(&self) -> bool;

    fn is_map_pending(&self) -> bool;

    fn flush_mapped_range(&self, offset: u64, size: u64);

    fn invalidate_mapped_range(&self, offset: u64, size: u64);
}

/// Kind tag of a [`Buffer`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferKind {
    Device,
    ImmediateDevice,
    ImmediateStaging,
    DeferredStaging(MapMode),
    Dynamic,
}

/// Any user-facing buffer
pub enum Buffer<'f> {
    Device(DeviceBuffer<'f>),
    ImmediateDevice(ImmediateDeviceBuffer<'f>),
    ImmediateStaging(ImmediateStagingBuffer),
    DeferredStaging(DeferredStagingBuffer<'f>),
    Dynamic(DynamicBuffer<'f>),
}

impl<'f> Buffer<'f> {
    pub fn kind(&self) -> BufferKind {
        match self {
            Buffer::Device(_) => BufferKind::Device,
            Buffer::ImmediateDevice(_) => BufferKind::ImmediateDevice,
            Buffer::ImmediateStaging(_) => BufferKind::ImmediateStaging,
            Buffer::DeferredStaging(buffer) => BufferKind::DeferredStaging(buffer.mode()),
            Buffer::Dynamic(_) => BufferKind::Dynamic,
        }
    }

    pub fn as_gpu_buffer(&self) -> &dyn GpuBuffer {
        match self {
            Buffer::Device(buffer) => buffer,
            Buffer::ImmediateDevice(buffer) => buffer,
            Buffer::ImmediateStaging(buffer) => buffer,
            Buffer::DeferredStaging(buffer) => buffer,
            Buffer::Dynamic(buffer) => buffer,
        }
    }

    /// Mapping capability, only for staging variants
    pub fn as_mappable(&self) -> Option<&dyn MappableBuffer> {
        match self {
            Buffer::ImmediateStaging(buffer) => Some(buffer),
            Buffer::DeferredStaging(buffer) => Some(buffer),
            _ => None,
        }
    }

    pub fn as_mappable_mut(&mut self) -> Option<&mut dyn MappableBuffer> {
        match self {
            Buffer::ImmediateStaging(buffer) => Some(buffer),
            Buffer::DeferredStaging(buffer) => Some(buffer),
            _ => None,
        }
    }

    pub fn is_mappable(&self) -> bool {
        self.as_mappable().is_some()
    }
}

impl GpuBuffer for Buffer<'_> {
    fn native_buffer(&self) -> Option<&dyn NativeBuffer> {
        self.as_gpu_buffer().native_buffer()
    }

    fn size(&self) -> u64 {
        self.as_gpu_buffer().size()
    }

    fn usage(&self) -> BufferUsage {
        self.as_gpu_buffer().usage()
    }

    fn debug_name(&self) -> &str {
        self.as_gpu_buffer().debug_name()
    }

    fn native_handle(&self) -> NativeBufferHandle {
        self.as_gpu_buffer().native_handle()
    }

    fn state(&self) -> BufferState {
        self.as_gpu_buffer().state()
    }

    fn memory_location(&self) -> MemoryLocation {
        self.as_gpu_buffer().memory_location()
    }

    fn access_pattern(&self) -> AccessPattern {
        self.as_gpu_buffer().access_pattern()
    }

    fn is_valid(&self) -> bool {
        self.as_gpu_buffer().is_valid()
    }
}

impl<'f> From<DeviceBuffer<'f>> for Buffer<'f> {
    fn from(buffer: DeviceBuffer<'f>) -> Self {
        Buffer::Device(buffer)
    }
}

impl<'f> From<ImmediateDeviceBuffer<'f>> for Buffer<'f> {
    fn from(buffer: ImmediateDeviceBuffer<'f>) -> Self {
        Buffer::ImmediateDevice(buffer)
    }
}

impl From<ImmediateStagingBuffer> for Buffer<'_> {
    fn from(buffer: ImmediateStagingBuffer) -> Self {
        Buffer::ImmediateStaging(buffer)
    }
}

impl<'f> From<DeferredStagingBuffer<'f>> for Buffer<'f> {
    fn from(buffer: DeferredStagingBuffer<'f>) -> Self {
        Buffer::DeferredStaging(buffer)
    }
}

impl<'f> From<DynamicBuffer<'f>> for Buffer<'f> {
    fn from(buffer: DynamicBuffer<'f>) -> Self {
        Buffer::Dynamic(buffer)
    }
}

#[cfg(test)]
#[path = "buffer_tests.rs"]
mod tests;
