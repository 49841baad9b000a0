/// Device buffer
///
/// GPU-resident buffer that is never mapped by the CPU. Data gets in and out
/// through recorded copies only, so `COPY_DST` is always part of its usage.

use crate::buffers::buffer::GpuBuffer;
use crate::buffers::buffer_factory::BufferFactory;
use crate::buffers::buffer_types::{BufferCopyDesc, BufferDesc, BufferState, BufferUsage, MemoryLocation};
use crate::buffers::native_buffer::NativeBuffer;
use crate::buffers::transfer;
use crate::error::Result;
use crate::graphics_device::CommandEncoder;
use crate::{pers_bail, pers_debug};

const SOURCE: &str = "pers::DeviceBuffer";

pub struct DeviceBuffer<'f> {
    factory: &'f BufferFactory,
    desc: BufferDesc,
    native: Box<dyn NativeBuffer>,
    transfer_count: u64,
    total_bytes_transferred: u64,
}

impl<'f> DeviceBuffer<'f> {
    /// Create a device buffer
    ///
    /// `COPY_DST` is added to the usage, memory is forced to `DeviceLocal` and
    /// `mapped_at_creation` is cleared.
    pub fn new(factory: &'f BufferFactory, desc: &BufferDesc) -> Result<Self> {
        let desc = Self::effective_desc(desc);
        let native = factory.create_plain_primitive(&desc)?;
        Ok(Self::from_native(factory, desc, native))
    }

    pub(crate) fn effective_desc(desc: &BufferDesc) -> BufferDesc {
        let mut desc = desc.clone();
        desc.usage |= BufferUsage::COPY_DST;
        desc.memory_location = MemoryLocation::DeviceLocal;
        desc.mapped_at_creation = false;
        desc
    }

    /// Wrap a primitive created elsewhere by the factory
    pub(crate) fn from_native(factory: &'f BufferFactory, desc: BufferDesc, native: Box<dyn NativeBuffer>) -> Self {
        Self {
            factory,
            desc,
            native,
            transfer_count: 0,
            total_bytes_transferred: 0,
        }
    }

    /// Record a copy from `source` into this buffer
    ///
    /// # Returns
    ///
    /// Number of bytes recorded
    ///
    /// # Errors
    ///
    /// * `OutOfBounds` - A range exceeds a buffer or is not 4-byte aligned
    /// * `InvalidResource` - `source` lacks `COPY_SRC` or has no native buffer
    /// * `MapContention` - `source` is still mapped
    pub fn copy_from(
        &mut self,
        encoder: &mut dyn CommandEncoder,
        source: &dyn GpuBuffer,
        copy: &BufferCopyDesc,
    ) -> Result<u64> {
        let Some(source) = source.native_buffer() else {
            pers_bail!(InvalidResource, SOURCE, "Copy source for '{}' has no native buffer", self.desc.debug_name);
        };
        let bytes = transfer::record_copy(encoder, source, self.native.as_ref(), copy)?;
        self.count_transfer(bytes);
        Ok(bytes)
    }

    /// Record a copy from this buffer into `destination`
    ///
    /// Requires `COPY_SRC` in this buffer's usage.
    pub fn copy_to(
        &mut self,
        encoder: &mut dyn CommandEncoder,
        destination: &dyn GpuBuffer,
        copy: &BufferCopyDesc,
    ) -> Result<u64> {
        let Some(destination) = destination.native_buffer() else {
            pers_bail!(
                InvalidResource,
                SOURCE,
                "Copy destination for '{}' has no native buffer",
                self.desc.debug_name
            );
        };
        let bytes = transfer::record_copy(encoder, self.native.as_ref(), destination, copy)?;
        self.count_transfer(bytes);
        Ok(bytes)
    }

    fn count_transfer(&mut self, bytes: u64) {
        if bytes > 0 {
            self.transfer_count += 1;
            self.total_bytes_transferred += bytes;
        }
    }

    /// Recreate the buffer with `new_size` bytes; previous contents are discarded
    ///
    /// On failure the current buffer is kept.
    pub fn resize(&mut self, new_size: u64) -> Result<()> {
        if self.native.state() == BufferState::Destroyed {
            pers_bail!(UseAfterDestroy, SOURCE, "Cannot resize destroyed buffer '{}'", self.desc.debug_name);
        }
        let mut desc = self.desc.clone();
        desc.size = new_size;
        let native = self.factory.create_plain_primitive(&desc)?;
        self.native.destroy();
        self.native = native;
        self.desc = desc;
        pers_debug!(SOURCE, "Resized '{}' to {} bytes", self.desc.debug_name, self.native.size());
        Ok(())
    }

    /// Release the GPU resource; the buffer becomes `Destroyed`
    pub fn destroy(&mut self) {
        if self.native.state() != BufferState::Destroyed {
            self.native.destroy();
            pers_debug!(SOURCE, "Destroyed '{}'", self.desc.debug_name);
        }
    }

    /// Number of copies recorded into or out of this buffer
    pub fn transfer_count(&self) -> u64 {
        self.transfer_count
    }

    pub fn total_bytes_transferred(&self) -> u64 {
        self.total_bytes_transferred
    }

    /// Descriptor after forced hints (not the backend-aligned one)
    pub fn desc(&self) -> &BufferDesc {
        &self.desc
    }

    pub fn native(&self) -> &dyn NativeBuffer {
        self.native.as_ref()
    }

    pub fn factory(&self) -> &'f BufferFactory {
        self.factory
    }
}

impl GpuBuffer for DeviceBuffer<'_> {
    fn native_buffer(&self) -> Option<&dyn NativeBuffer> {
        Some(self.native.as_ref())
    }
}

impl Drop for DeviceBuffer<'_> {
    fn drop(&mut self) {
        if self.transfer_count > 0 {
            pers_debug!(
                SOURCE,
                "'{}' released after {} transfers ({} bytes)",
                self.desc.debug_name,
                self.transfer_count,
                self.total_bytes_transferred
            );
        }
    }
}

impl std::fmt::Debug for DeviceBuffer<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceBuffer")
            .field("name", &self.desc.debug_name)
            .field("size", &self.native.size())
            .field("state", &self.native.state())
            .field("transfer_count", &self.transfer_count)
            .finish()
    }
}

#[cfg(test)]
#[path = "device_buffer_tests.rs"]
mod tests;
