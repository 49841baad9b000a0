/// Immediate staging buffer
///
/// Host-visible buffer born mapped, so the first write needs no map round-trip.
/// Single-shot: write, `finalize()` (unmap), then record `upload_to` copies. Once
/// finalized it cannot be mapped again.

use bytemuck::Pod;

use crate::buffers::buffer::{GpuBuffer, MappableBuffer};
use crate::buffers::buffer_factory::BufferFactory;
use crate::buffers::buffer_types::{
    BufferCopyDesc, BufferDesc, BufferMapRange, BufferUsage, MapMode, MemoryLocation,
};
use crate::buffers::mapped_data::{MapFuture, MappedData};
use crate::buffers::native_buffer::{NativeBuffer, NativeMappableBuffer};
use crate::buffers::transfer;
use crate::error::Result;
use crate::graphics_device::CommandEncoder;
use crate::{pers_bail, pers_debug, pers_warn};

const SOURCE: &str = "pers::ImmediateStagingBuffer";

pub struct ImmediateStagingBuffer {
    native: Box<dyn NativeMappableBuffer>,
    bytes_written: u64,
    finalized: bool,
}

impl ImmediateStagingBuffer {
    /// Create a staging buffer mapped for writing
    ///
    /// `COPY_SRC` is added, `mapped_at_creation` is set and an `Auto` memory
    /// location becomes `HostVisible`.
    pub fn new(factory: &BufferFactory, desc: &BufferDesc) -> Result<Self> {
        let mut desc = desc.clone();
        desc.usage |= BufferUsage::COPY_SRC;
        desc.mapped_at_creation = true;
        if desc.memory_location == MemoryLocation::Auto {
            desc.memory_location = MemoryLocation::HostVisible;
        }

        let native = factory.create_mappable_primitive(&desc)?;
        if !native.is_mapped() {
            native.destroy();
            pers_bail!(BackendError, SOURCE, "Staging buffer '{}' was not mapped at creation", desc.debug_name);
        }

        Ok(Self {
            native,
            bytes_written: 0,
            finalized: false,
        })
    }

    /// Copy `data` into the mapping at `offset`
    ///
    /// # Returns
    ///
    /// Number of bytes written
    ///
    /// # Errors
    ///
    /// * `InvalidResource` - The buffer is already finalized
    /// * `OutOfBounds` - The write does not fit; nothing is written
    pub fn write_bytes(&mut self, data: &[u8], offset: u64) -> Result<u64> {
        if self.finalized {
            pers_bail!(
                InvalidResource,
                SOURCE,
                "Cannot write to '{}' after finalize",
                self.native.debug_name()
            );
        }
        let size = self.native.size();
        let len = data.len() as u64;
        let end = match offset.checked_add(len) {
            Some(end) if end <= size => end,
            _ => pers_bail!(
                OutOfBounds,
                SOURCE,
                "Write of {} bytes at offset {} exceeds '{}' size {}",
                len,
                offset,
                self.native.debug_name(),
                size
            ),
        };
        if data.is_empty() {
            return Ok(0);
        }

        let Some(mut mapping) = self.native.mapped_data() else {
            pers_bail!(InvalidResource, SOURCE, "'{}' is not mapped", self.native.debug_name());
        };
        mapping.as_mut_slice()[offset as usize..end as usize].copy_from_slice(data);
        self.bytes_written = self.bytes_written.max(end);
        Ok(len)
    }

    /// Typed write of `data` at byte `offset`
    pub fn write<T: Pod>(&mut self, data: &[T], offset: u64) -> Result<u64> {
        self.write_bytes(bytemuck::cast_slice(data), offset)
    }

    /// Flush and unmap; later calls do nothing
    pub fn finalize(&mut self) {
        if self.finalized {
            return;
        }
        self.native.flush_mapped_range(0, self.bytes_written);
        self.native.unmap();
        self.finalized = true;
        pers_debug!(
            SOURCE,
            "Finalized '{}' with {} bytes written",
            self.native.debug_name(),
            self.bytes_written
        );
    }

    /// Record a copy from this buffer into `target`
    ///
    /// # Errors
    ///
    /// * `InvalidResource` - The buffer is not finalized yet, or `target` has no
    ///   native buffer
    /// * Any transfer error from range or usage validation
    pub fn upload_to(
        &self,
        encoder: &mut dyn CommandEncoder,
        target: &dyn GpuBuffer,
        copy: &BufferCopyDesc,
    ) -> Result<u64> {
        if !self.finalized {
            pers_bail!(
                InvalidResource,
                SOURCE,
                "'{}' must be finalized before upload",
                self.native.debug_name()
            );
        }
        let Some(target) = target.native_buffer() else {
            pers_bail!(InvalidResource, SOURCE, "Upload target has no native buffer");
        };
        transfer::record_copy(encoder, self.native.as_native(), target, copy)
    }

    /// High-water mark of written bytes
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    pub fn native(&self) -> &dyn NativeMappableBuffer {
        self.native.as_ref()
    }
}

impl GpuBuffer for ImmediateStagingBuffer {
    fn native_buffer(&self) -> Option<&dyn NativeBuffer> {
        Some(self.native.as_native())
    }
}

impl MappableBuffer for ImmediateStagingBuffer {
    fn mapped_data(&self) -> Option<MappedData> {
        if self.finalized {
            None
        } else {
            self.native.mapped_data()
        }
    }

    /// Existing creation mapping before finalize, null afterwards
    fn map_async(&mut self, _mode: MapMode, _range: BufferMapRange) -> MapFuture {
        if self.finalized {
            pers_warn!(SOURCE, "'{}' is finalized and cannot be mapped again", self.native.debug_name());
            return MapFuture::null();
        }
        match self.native.mapped_data() {
            Some(mapping) => MapFuture::ready(mapping),
            None => MapFuture::null(),
        }
    }

    fn unmap(&mut self) {
        self.finalize();
    }

    fn is_mapped(&self) -> bool {
        self.native.is_mapped()
    }

    fn is_map_pending(&self) -> bool {
        false
    }

    fn flush_mapped_range(&self, offset: u64, size: u64) {
        self.native.flush_mapped_range(offset, size);
    }

    fn invalidate_mapped_range(&self, offset: u64, size: u64) {
        self.native.invalidate_mapped_range(offset, size);
    }
}

impl Drop for ImmediateStagingBuffer {
    fn drop(&mut self) {
        if !self.finalized && self.native.is_valid() {
            pers_warn!(SOURCE, "'{}' dropped without finalize", self.native.debug_name());
            self.finalize();
        }
    }
}

impl std::fmt::Debug for ImmediateStagingBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImmediateStagingBuffer")
            .field("name", &self.native.debug_name())
            .field("size", &self.native.size())
            .field("bytes_written", &self.bytes_written)
            .field("finalized", &self.finalized)
            .finish()
    }
}

#[cfg(test)]
#[path = "immediate_staging_buffer_tests.rs"]
mod tests;
