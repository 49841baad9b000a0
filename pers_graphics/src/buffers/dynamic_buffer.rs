/// Dynamic (ring) buffer
///
/// N host-visible buffers used round-robin, one per frame in flight. Each frame
/// the caller brackets its writes with `begin_update` / `end_update` on the
/// current slot, binds `current_frame_buffer()` and calls `next_frame()`.
///
/// The caller must make sure the GPU no longer reads the current slot before
/// writing it; this is not tracked here.

use std::sync::atomic::{AtomicU32, Ordering};

use bytemuck::Pod;

use crate::buffers::buffer::GpuBuffer;
use crate::buffers::buffer_factory::BufferFactory;
use crate::buffers::buffer_types::{
    AccessPattern, BufferDesc, BufferMapRange, BufferState, BufferUsage, MapMode, MemoryLocation,
};
use crate::buffers::mapped_data::MappedData;
use crate::buffers::native_buffer::{NativeBuffer, NativeMappableBuffer};
use crate::error::Result;
use crate::{pers_bail, pers_critical, pers_debug, pers_warn};

const SOURCE: &str = "pers::DynamicBuffer";

/// One ring slot: its buffer and the mapping held during an update
struct FrameSlot {
    // Released before the buffer it views
    mapping: Option<MappedData>,
    buffer: Box<dyn NativeMappableBuffer>,
}

/// Proof of an open update on one slot; consumed by `end_update`
#[derive(Debug)]
pub struct UpdateHandle {
    frame_index: u32,
    size: u64,
}

impl UpdateHandle {
    pub fn frame_index(&self) -> u32 {
        self.frame_index
    }

    /// Writable bytes in the slot
    pub fn size(&self) -> u64 {
        self.size
    }
}

pub struct DynamicBuffer<'f> {
    factory: &'f BufferFactory,
    desc: BufferDesc,
    slots: Vec<FrameSlot>,
    frame_count: u32,
    current_frame: AtomicU32,
    update_in_progress: Option<u32>,
    destroyed: bool,
}

impl<'f> DynamicBuffer<'f> {
    pub const DEFAULT_FRAME_COUNT: u32 = 3;
    pub const MAX_FRAME_COUNT: u32 = 10;

    /// Create `frame_count` slots eagerly
    ///
    /// Slot usage gets `MAP_WRITE | COPY_SRC`, access pattern `Dynamic` and
    /// `HostVisible` memory when the location is `Auto`.
    ///
    /// # Errors
    ///
    /// * `InvalidDescriptor` - `frame_count` outside `1..=MAX_FRAME_COUNT` or an
    ///   invalid descriptor
    pub fn new(factory: &'f BufferFactory, desc: &BufferDesc, frame_count: u32) -> Result<Self> {
        if frame_count == 0 || frame_count > Self::MAX_FRAME_COUNT {
            pers_bail!(
                InvalidDescriptor,
                SOURCE,
                "invalid frame count {} for '{}' (expected 1..={})",
                frame_count,
                desc.debug_name,
                Self::MAX_FRAME_COUNT
            );
        }

        let mut desc = desc.clone();
        desc.usage |= BufferUsage::MAP_WRITE | BufferUsage::COPY_SRC;
        desc.access_pattern = AccessPattern::Dynamic;
        desc.mapped_at_creation = false;
        if desc.memory_location == MemoryLocation::Auto {
            desc.memory_location = MemoryLocation::HostVisible;
        }

        let slots = Self::create_slots(factory, &desc, frame_count)?;
        pers_debug!(
            SOURCE,
            "Created '{}' with {} frames of {} bytes",
            desc.debug_name,
            frame_count,
            desc.size
        );

        Ok(Self {
            factory,
            desc,
            slots,
            frame_count,
            current_frame: AtomicU32::new(0),
            update_in_progress: None,
            destroyed: false,
        })
    }

    fn create_slots(factory: &BufferFactory, desc: &BufferDesc, frame_count: u32) -> Result<Vec<FrameSlot>> {
        (0..frame_count)
            .map(|i| {
                let slot_desc = desc.clone().with_debug_name(format!("{}_Frame{}", desc.debug_name, i));
                factory
                    .create_mappable_primitive(&slot_desc)
                    .map(|buffer| FrameSlot { mapping: None, buffer })
            })
            .collect()
    }

    /// Destroy the buffer if its slots no longer match the frame count
    fn check_consistency(&mut self) -> Result<()> {
        if self.destroyed {
            pers_bail!(UseAfterDestroy, SOURCE, "'{}' is destroyed", self.desc.debug_name);
        }
        if self.slots.len() != self.frame_count as usize {
            pers_critical!(
                SOURCE,
                "'{}' has {} slots for {} frames, destroying it",
                self.desc.debug_name,
                self.slots.len(),
                self.frame_count
            );
            self.destroy();
            pers_bail!(UseAfterDestroy, SOURCE, "'{}' was destroyed after a slot mismatch", self.desc.debug_name);
        }
        Ok(())
    }

    /// Map the current slot for writing
    ///
    /// Blocks until the mapping is available.
    ///
    /// # Errors
    ///
    /// * `MapContention` - An update is already open
    /// * `MapFailure` - The backend could not map the slot
    /// * `UseAfterDestroy` - The buffer was destroyed
    pub fn begin_update(&mut self) -> Result<UpdateHandle> {
        self.check_consistency()?;
        if let Some(open) = self.update_in_progress {
            pers_bail!(
                MapContention,
                SOURCE,
                "'{}' already has an open update on frame {}",
                self.desc.debug_name,
                open
            );
        }

        let frame_index = self.current_frame_index();
        let slot = &mut self.slots[frame_index as usize];
        if slot.buffer.is_mapped() || slot.buffer.is_map_pending() {
            slot.mapping = None;
            slot.buffer.unmap();
        }

        let mapping = slot.buffer.map_async(MapMode::Write, BufferMapRange::whole()).wait();
        if mapping.is_null() {
            pers_bail!(
                MapFailure,
                SOURCE,
                "Could not map frame {} of '{}'",
                frame_index,
                self.desc.debug_name
            );
        }
        let size = mapping.size();
        slot.mapping = Some(mapping);
        self.update_in_progress = Some(frame_index);
        Ok(UpdateHandle { frame_index, size })
    }

    fn open_slot(&mut self, handle: &UpdateHandle) -> Result<&mut FrameSlot> {
        if self.update_in_progress != Some(handle.frame_index) {
            pers_bail!(
                InvalidResource,
                SOURCE,
                "Update handle for frame {} of '{}' is not the open update",
                handle.frame_index,
                self.desc.debug_name
            );
        }
        Ok(&mut self.slots[handle.frame_index as usize])
    }

    /// Mapped bytes of the slot under update
    pub fn update_data(&mut self, handle: &UpdateHandle) -> Option<&mut [u8]> {
        let slot = self.open_slot(handle).ok()?;
        slot.mapping
            .as_mut()
            .filter(|mapping| mapping.is_live())
            .map(MappedData::as_mut_slice)
    }

    /// Copy `data` into the slot under update at `offset`
    pub fn write_bytes(&mut self, handle: &UpdateHandle, data: &[u8], offset: u64) -> Result<u64> {
        let name = self.desc.debug_name.clone();
        let slot = self.open_slot(handle)?;
        let Some(mapping) = slot.mapping.as_mut().filter(|mapping| mapping.is_live()) else {
            pers_bail!(MapFailure, SOURCE, "Frame {} of '{}' is not mapped", handle.frame_index, name);
        };
        let len = data.len() as u64;
        let end = match offset.checked_add(len) {
            Some(end) if end <= mapping.size() => end,
            _ => pers_bail!(
                OutOfBounds,
                SOURCE,
                "Write of {} bytes at offset {} exceeds frame size {} of '{}'",
                len,
                offset,
                mapping.size(),
                name
            ),
        };
        mapping.as_mut_slice()[offset as usize..end as usize].copy_from_slice(data);
        Ok(len)
    }

    pub fn write<T: Pod>(&mut self, handle: &UpdateHandle, data: &[T], offset: u64) -> Result<u64> {
        self.write_bytes(handle, bytemuck::cast_slice(data), offset)
    }

    /// Flush the writes and unmap the slot
    pub fn end_update(&mut self, handle: UpdateHandle) -> Result<()> {
        let slot = self.open_slot(&handle)?;
        slot.buffer.flush_mapped_range(0, handle.size);
        slot.mapping = None;
        slot.buffer.unmap();
        self.update_in_progress = None;
        Ok(())
    }

    /// Run `f` over the current slot's bytes between `begin_update` and `end_update`
    pub fn update<F: FnOnce(&mut [u8])>(&mut self, f: F) -> Result<()> {
        let handle = self.begin_update()?;
        if let Some(bytes) = self.update_data(&handle) {
            f(bytes);
        }
        self.end_update(handle)
    }

    /// Buffer of the current frame, for binding
    pub fn current_frame_buffer(&self) -> Option<&dyn NativeMappableBuffer> {
        self.frame_buffer(self.current_frame_index())
    }

    pub fn frame_buffer(&self, index: u32) -> Option<&dyn NativeMappableBuffer> {
        if self.destroyed {
            return None;
        }
        self.slots.get(index as usize).map(|slot| slot.buffer.as_ref())
    }

    pub fn current_frame_index(&self) -> u32 {
        self.current_frame.load(Ordering::Acquire)
    }

    /// Advance to the next slot (modulo the frame count)
    pub fn next_frame(&self) {
        if let Some(open) = self.update_in_progress {
            pers_warn!(
                SOURCE,
                "'{}' advanced while frame {} is still being updated",
                self.desc.debug_name,
                open
            );
        }
        let frame_count = self.frame_count;
        let _ = self
            .current_frame
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |frame| Some((frame + 1) % frame_count));
    }

    pub fn frame_count(&self) -> u32 {
        self.frame_count
    }

    /// Recreate every slot with `new_size` bytes; contents are discarded
    ///
    /// On failure the current slots are kept.
    pub fn resize(&mut self, new_size: u64) -> Result<()> {
        self.check_consistency()?;
        if self.update_in_progress.is_some() {
            pers_bail!(MapContention, SOURCE, "Cannot resize '{}' during an update", self.desc.debug_name);
        }
        let mut desc = self.desc.clone();
        desc.size = new_size;
        let slots = Self::create_slots(self.factory, &desc, self.frame_count)?;
        for slot in self.slots.drain(..) {
            slot.buffer.destroy();
        }
        self.slots = slots;
        self.desc = desc;
        self.current_frame.store(0, Ordering::Release);
        pers_debug!(SOURCE, "Resized '{}' to {} bytes per frame", self.desc.debug_name, new_size);
        Ok(())
    }

    /// Release every slot; the buffer becomes `Destroyed`
    pub fn destroy(&mut self) {
        if self.destroyed {
            return;
        }
        for slot in &mut self.slots {
            slot.mapping = None;
            slot.buffer.destroy();
        }
        self.update_in_progress = None;
        self.destroyed = true;
        pers_debug!(SOURCE, "Destroyed '{}'", self.desc.debug_name);
    }

    pub fn desc(&self) -> &BufferDesc {
        &self.desc
    }

    #[cfg(test)]
    pub(crate) fn drop_slot_for_test(&mut self) {
        self.slots.pop();
    }
}

impl GpuBuffer for DynamicBuffer<'_> {
    fn native_buffer(&self) -> Option<&dyn NativeBuffer> {
        self.current_frame_buffer().map(|buffer| buffer.as_native())
    }

    fn size(&self) -> u64 {
        if self.destroyed { 0 } else { self.desc.size }
    }

    fn state(&self) -> BufferState {
        if self.destroyed {
            BufferState::Destroyed
        } else {
            self.native_buffer().map_or(BufferState::Uninitialized, |native| native.state())
        }
    }

    fn is_valid(&self) -> bool {
        !self.destroyed && self.slots.iter().all(|slot| slot.buffer.is_valid())
    }
}

impl std::fmt::Debug for DynamicBuffer<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DynamicBuffer")
            .field("name", &self.desc.debug_name)
            .field("size", &self.desc.size)
            .field("frame_count", &self.frame_count)
            .field("current_frame", &self.current_frame_index())
            .field("destroyed", &self.destroyed)
            .finish()
    }
}

#[cfg(test)]
#[path = "dynamic_buffer_tests.rs"]
mod tests;
