/// Deferred staging buffer
///
/// Host-visible buffer created unmapped and mapped asynchronously on demand.
/// The direction is fixed at creation:
///
/// - `MapMode::Write`: `MAP_WRITE | COPY_SRC`, CPU to GPU streaming
/// - `MapMode::Read`: `MAP_READ | COPY_DST`, GPU to CPU readback
///
/// `write_bytes` / `read_bytes` block on a pending map before copying.

use bytemuck::{Pod, Zeroable};

use crate::buffers::buffer::{GpuBuffer, MappableBuffer};
use crate::buffers::buffer_factory::BufferFactory;
use crate::buffers::buffer_types::{
    AccessPattern, BufferCopyDesc, BufferDesc, BufferMapRange, BufferState, BufferUsage, MapMode,
    MemoryLocation,
};
use crate::buffers::mapped_data::{MapFuture, MappedData};
use crate::buffers::native_buffer::{NativeBuffer, NativeMappableBuffer};
use crate::buffers::transfer;
use crate::error::Result;
use crate::graphics_device::CommandEncoder;
use crate::{pers_bail, pers_debug, pers_error, pers_warn};

const SOURCE: &str = "pers::DeferredStagingBuffer";

pub struct DeferredStagingBuffer<'f> {
    factory: &'f BufferFactory,
    desc: BufferDesc,
    mode: MapMode,
    // Declared before `native` so an owned mapping is released first
    held_mapping: Option<MappedData>,
    pending: Option<MapFuture>,
    native: Box<dyn NativeMappableBuffer>,
}

impl<'f> DeferredStagingBuffer<'f> {
    /// Create an unmapped staging buffer for `mode`
    ///
    /// # Errors
    ///
    /// * `InvalidDescriptor` - `mode` is neither `Read` nor `Write`
    pub fn new(factory: &'f BufferFactory, desc: &BufferDesc, mode: MapMode) -> Result<Self> {
        let mut desc = desc.clone();
        match mode {
            MapMode::Read => {
                desc.usage |= BufferUsage::MAP_READ | BufferUsage::COPY_DST;
                if desc.memory_location == MemoryLocation::Auto {
                    desc.memory_location = MemoryLocation::HostCached;
                }
            }
            MapMode::Write => {
                desc.usage |= BufferUsage::MAP_WRITE | BufferUsage::COPY_SRC;
                if desc.memory_location == MemoryLocation::Auto {
                    desc.memory_location = MemoryLocation::HostVisible;
                }
            }
            other => pers_bail!(
                InvalidDescriptor,
                SOURCE,
                "invalid map mode {:?} for deferred staging buffer '{}'",
                other,
                desc.debug_name
            ),
        }
        desc.mapped_at_creation = false;
        if desc.access_pattern == AccessPattern::Static {
            desc.access_pattern = AccessPattern::Staging;
        }

        let native = factory.create_mappable_primitive(&desc)?;
        Ok(Self {
            factory,
            desc,
            mode,
            held_mapping: None,
            pending: None,
            native,
        })
    }

    /// Direction fixed at creation
    pub fn mode(&self) -> MapMode {
        self.mode
    }

    /// Start mapping `range`; the mapping is kept by the buffer until `unmap()`
    ///
    /// `write_bytes` / `read_bytes` wait on it.
    pub fn request_map(&mut self, range: BufferMapRange) -> Result<()> {
        match self.native.state() {
            BufferState::Destroyed => {
                pers_bail!(UseAfterDestroy, SOURCE, "Cannot map destroyed buffer '{}'", self.desc.debug_name)
            }
            BufferState::Mapped | BufferState::MapPending => {
                pers_bail!(MapContention, SOURCE, "'{}' is already mapped or mapping", self.desc.debug_name)
            }
            _ => {}
        }
        let mut future = self.native.map_async(self.mode, range);
        if future.is_ready() && !self.native.is_map_pending() && !self.native.is_mapped() {
            pers_bail!(MapFailure, SOURCE, "Map request for '{}' was rejected", self.desc.debug_name);
        }
        self.pending = Some(future);
        Ok(())
    }

    /// Wait for a pending map and check that a mapping is available
    fn ensure_mapped(&mut self, operation: &str) -> Result<(u64, u64)> {
        if let Some(future) = self.pending.take() {
            let mapping = future.wait();
            if !mapping.is_null() {
                self.held_mapping = Some(mapping);
            }
        } else {
            match self.native.state() {
                BufferState::Destroyed => pers_bail!(
                    UseAfterDestroy,
                    SOURCE,
                    "Cannot {} destroyed buffer '{}'",
                    operation,
                    self.desc.debug_name
                ),
                BufferState::MapPending => {
                    self.native.wait_for_pending_map();
                }
                BufferState::Mapped => {}
                _ => pers_bail!(
                    InvalidResource,
                    SOURCE,
                    "Cannot {} '{}': buffer is neither mapped nor mapping",
                    operation,
                    self.desc.debug_name
                ),
            }
        }

        match self.native.mapped_range() {
            Some(range) => Ok(range),
            None => pers_bail!(MapFailure, SOURCE, "Map of '{}' failed before {}", self.desc.debug_name, operation),
        }
    }

    fn check_range(&self, mapped: (u64, u64), offset: u64, len: u64, operation: &str) -> Result<usize> {
        let (map_offset, map_size) = mapped;
        let fits = offset >= map_offset
            && offset.checked_add(len).is_some_and(|end| end <= map_offset + map_size);
        if !fits {
            pers_bail!(
                OutOfBounds,
                SOURCE,
                "{} of {} bytes at offset {} is outside the mapped range {}+{} of '{}'",
                operation,
                len,
                offset,
                map_offset,
                map_size,
                self.desc.debug_name
            );
        }
        Ok((offset - map_offset) as usize)
    }

    /// Copy `data` into the mapping at buffer `offset` (Write mode)
    pub fn write_bytes(&mut self, data: &[u8], offset: u64) -> Result<u64> {
        if self.mode != MapMode::Write {
            pers_bail!(InvalidResource, SOURCE, "'{}' is a read staging buffer", self.desc.debug_name);
        }
        let mapped = self.ensure_mapped("write")?;
        let start = self.check_range(mapped, offset, data.len() as u64, "Write")?;
        let Some(mut mapping) = self.native.mapped_data() else {
            pers_bail!(MapFailure, SOURCE, "'{}' lost its mapping", self.desc.debug_name);
        };
        mapping.as_mut_slice()[start..start + data.len()].copy_from_slice(data);
        Ok(data.len() as u64)
    }

    pub fn write<T: Pod>(&mut self, data: &[T], offset: u64) -> Result<u64> {
        self.write_bytes(bytemuck::cast_slice(data), offset)
    }

    /// Copy from the mapping at buffer `offset` into `out` (Read mode)
    pub fn read_bytes(&mut self, out: &mut [u8], offset: u64) -> Result<u64> {
        if self.mode != MapMode::Read {
            pers_bail!(InvalidResource, SOURCE, "'{}' is a write staging buffer", self.desc.debug_name);
        }
        let mapped = self.ensure_mapped("read")?;
        let start = self.check_range(mapped, offset, out.len() as u64, "Read")?;
        let Some(mapping) = self.native.mapped_data() else {
            pers_bail!(MapFailure, SOURCE, "'{}' lost its mapping", self.desc.debug_name);
        };
        out.copy_from_slice(&mapping.as_slice()[start..start + out.len()]);
        Ok(out.len() as u64)
    }

    /// Read `count` values of `T` starting at byte `offset`
    pub fn read<T: Pod>(&mut self, offset: u64, count: usize) -> Result<Vec<T>> {
        let mut values = vec![T::zeroed(); count];
        self.read_bytes(bytemuck::cast_slice_mut(&mut values), offset)?;
        Ok(values)
    }

    /// Record a copy from `source` into this buffer (Read mode)
    ///
    /// A current mapping is released first.
    pub fn download_from(
        &mut self,
        encoder: &mut dyn CommandEncoder,
        source: &dyn GpuBuffer,
        copy: &BufferCopyDesc,
    ) -> Result<u64> {
        if self.mode != MapMode::Read {
            pers_bail!(
                InvalidResource,
                SOURCE,
                "download_from requires a read staging buffer, '{}' is {:?}",
                self.desc.debug_name,
                self.mode
            );
        }
        let Some(source) = source.native_buffer() else {
            pers_bail!(InvalidResource, SOURCE, "Download source has no native buffer");
        };
        self.release_before_copy();
        transfer::record_copy(encoder, source, self.native.as_native(), copy)
    }

    /// Record a copy from this buffer into `target` (Write mode)
    ///
    /// A current mapping is released first.
    pub fn upload_to(
        &mut self,
        encoder: &mut dyn CommandEncoder,
        target: &dyn GpuBuffer,
        copy: &BufferCopyDesc,
    ) -> Result<u64> {
        if self.mode != MapMode::Write {
            pers_bail!(
                InvalidResource,
                SOURCE,
                "upload_to requires a write staging buffer, '{}' is {:?}",
                self.desc.debug_name,
                self.mode
            );
        }
        let Some(target) = target.native_buffer() else {
            pers_bail!(InvalidResource, SOURCE, "Upload target has no native buffer");
        };
        self.release_before_copy();
        transfer::record_copy(encoder, self.native.as_native(), target, copy)
    }

    fn release_before_copy(&mut self) {
        if self.native.is_mapped() || self.native.is_map_pending() || self.pending.is_some() {
            pers_warn!(SOURCE, "'{}' is mapped, unmapping before recording a copy", self.desc.debug_name);
            self.release_mapping();
        }
    }

    fn release_mapping(&mut self) {
        self.pending = None;
        self.held_mapping = None;
        self.native.unmap();
    }

    /// Recreate with `new_size` bytes; contents are discarded
    pub fn resize(&mut self, new_size: u64) -> Result<()> {
        if self.native.state() == BufferState::Destroyed {
            pers_bail!(UseAfterDestroy, SOURCE, "Cannot resize destroyed buffer '{}'", self.desc.debug_name);
        }
        let mut desc = self.desc.clone();
        desc.size = new_size;
        let native = self.factory.create_mappable_primitive(&desc)?;
        self.release_mapping();
        self.native.destroy();
        self.native = native;
        self.desc = desc;
        pers_debug!(SOURCE, "Resized '{}' to {} bytes", self.desc.debug_name, self.native.size());
        Ok(())
    }

    pub fn destroy(&mut self) {
        if self.native.state() != BufferState::Destroyed {
            self.pending = None;
            self.held_mapping = None;
            self.native.destroy();
        }
    }

    pub fn desc(&self) -> &BufferDesc {
        &self.desc
    }

    pub fn native(&self) -> &dyn NativeMappableBuffer {
        self.native.as_ref()
    }
}

impl GpuBuffer for DeferredStagingBuffer<'_> {
    fn native_buffer(&self) -> Option<&dyn NativeBuffer> {
        Some(self.native.as_native())
    }
}

impl MappableBuffer for DeferredStagingBuffer<'_> {
    fn mapped_data(&self) -> Option<MappedData> {
        self.native.mapped_data()
    }

    /// Map `range`; `mode` must match the mode fixed at creation
    fn map_async(&mut self, mode: MapMode, range: BufferMapRange) -> MapFuture {
        if mode != self.mode {
            pers_error!(
                SOURCE,
                "Cannot map '{}' for {:?}: buffer was created for {:?}",
                self.desc.debug_name,
                mode,
                self.mode
            );
            return MapFuture::null();
        }
        self.native.map_async(mode, range)
    }

    fn unmap(&mut self) {
        self.release_mapping();
    }

    fn is_mapped(&self) -> bool {
        self.native.is_mapped()
    }

    fn is_map_pending(&self) -> bool {
        self.native.is_map_pending()
    }

    fn flush_mapped_range(&self, offset: u64, size: u64) {
        self.native.flush_mapped_range(offset, size);
    }

    fn invalidate_mapped_range(&self, offset: u64, size: u64) {
        self.native.invalidate_mapped_range(offset, size);
    }
}

impl Drop for DeferredStagingBuffer<'_> {
    fn drop(&mut self) {
        if self.native.is_mapped() {
            pers_warn!(SOURCE, "'{}' dropped while mapped", self.desc.debug_name);
        }
        self.release_mapping();
    }
}

impl std::fmt::Debug for DeferredStagingBuffer<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeferredStagingBuffer")
            .field("name", &self.desc.debug_name)
            .field("mode", &self.mode)
            .field("size", &self.native.size())
            .field("state", &self.native.state())
            .finish()
    }
}

#[cfg(test)]
#[path = "deferred_staging_buffer_tests.rs"]
mod tests;
