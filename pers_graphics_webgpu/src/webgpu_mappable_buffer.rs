/// Asynchronous map protocol for `WebGpuBuffer`
///
/// `map_async` moves the buffer to `MapPending` and hands a `MapPromise` to the
/// wgpu callback. The callback runs during a device poll; it resolves the mapped
/// address and completes the promise with an owning handle. If the request was
/// cancelled in the meantime (unmap, destroy) the promise completes null.

use std::ptr::NonNull;
use std::sync::{Arc, Weak};

use pers_graphics::pers::buffers::{
    BufferMapRange, BufferState, MapFuture, MapMode, MapPromise, MappedData, MappingToken,
    NativeBuffer, NativeMappableBuffer,
};
use pers_graphics::pers::DevicePoller;
use pers_graphics::{pers_error, pers_trace, pers_warn};

use crate::webgpu_buffer::{WebGpuBuffer, WebGpuBufferInner, SOURCE};
use crate::webgpu_converters;

/// Upper bound on blocking polls in `wait_for_pending_map`
const MAX_PENDING_POLLS: u32 = 1024;

impl WebGpuBuffer {
    fn check_mapped_range(&self, operation: &str, offset: u64, size: u64) -> bool {
        let map = self.inner.map.lock();
        match map.range {
            Some((map_offset, map_size))
                if map.state == BufferState::Mapped
                    && offset >= map_offset
                    && offset.saturating_add(size) <= map_offset + map_size =>
            {
                true
            }
            _ => {
                pers_error!(
                    SOURCE,
                    "{} of {}+{} outside the mapping of '{}'",
                    operation,
                    offset,
                    size,
                    self.inner.desc.debug_name
                );
                false
            }
        }
    }
}

/// Body of the wgpu map callback
fn complete_map(
    inner: &Weak<WebGpuBufferInner>,
    request: u64,
    mode: wgpu::MapMode,
    offset: u64,
    size: u64,
    result: Result<(), wgpu::BufferAsyncError>,
    promise: MapPromise,
) {
    let Some(inner) = inner.upgrade() else {
        promise.fail();
        return;
    };
    let Some(buffer) = inner.buffer.as_ref() else {
        promise.fail();
        return;
    };

    let mut map = inner.map.lock();
    if map.state != BufferState::MapPending || map.request != request {
        // Cancelled by unmap or destroy
        drop(map);
        promise.fail();
        return;
    }
    if let Err(e) = result {
        map.state = BufferState::Ready;
        drop(map);
        pers_error!(SOURCE, "Map of '{}' failed: {}", inner.desc.debug_name, e);
        promise.fail();
        return;
    }

    let slice = buffer.slice(offset..offset + size);
    let ptr = match mode {
        wgpu::MapMode::Read => {
            let view = slice.get_mapped_range();
            view.as_ptr() as *mut u8
        }
        wgpu::MapMode::Write => {
            let mut view = slice.get_mapped_range_mut();
            view.slice(..).as_raw_element_ptr().as_ptr()
        }
    };
    let Some(ptr) = NonNull::new(ptr) else {
        map.state = BufferState::Ready;
        drop(map);
        buffer.unmap();
        promise.fail();
        return;
    };

    let token = MappingToken::new();
    map.state = BufferState::Mapped;
    map.range = Some((offset, size));
    map.ptr = ptr.as_ptr() as usize;
    map.token = Some(token.clone());
    drop(map);

    pers_trace!(SOURCE, "Mapped '{}' {}+{}", inner.desc.debug_name, offset, size);
    let release = WebGpuBufferInner::release_for(&inner, token.clone());
    promise.complete(MappedData::owned(ptr, size, token, release));
}

impl NativeMappableBuffer for WebGpuBuffer {
    fn mapped_data(&self) -> Option<MappedData> {
        self.inner.map.lock().borrowed_view()
    }

    fn map_async(&self, mode: MapMode, range: BufferMapRange) -> MapFuture {
        let name = &self.inner.desc.debug_name;
        let mut map = self.inner.map.lock();
        match map.state {
            BufferState::Destroyed | BufferState::Uninitialized => {
                pers_error!(SOURCE, "Cannot map invalid buffer '{}'", name);
                return MapFuture::null();
            }
            BufferState::Mapped => {
                pers_warn!(SOURCE, "'{}' is already mapped", name);
                return map.borrowed_view().map_or_else(MapFuture::null, MapFuture::ready);
            }
            BufferState::MapPending => {
                pers_warn!(SOURCE, "'{}' already has a pending map", name);
                return MapFuture::null();
            }
            BufferState::Ready => {}
        }

        let Some(wgpu_mode) = webgpu_converters::map_mode_to_wgpu(mode) else {
            pers_error!(SOURCE, "'{}' cannot be mapped for {:?}", name, mode);
            return MapFuture::null();
        };
        if !self.inner.desc.usage.contains(mode.required_usage()) {
            pers_error!(
                SOURCE,
                "'{}' with usage {:?} cannot be mapped for {:?}",
                name,
                self.inner.desc.usage,
                mode
            );
            return MapFuture::null();
        }
        let (offset, size) = match range.resolve(self.inner.desc.size) {
            Ok((_, 0)) => {
                pers_error!(SOURCE, "Empty map range for '{}'", name);
                return MapFuture::null();
            }
            Ok(resolved) => resolved,
            Err(reason) => {
                pers_error!(SOURCE, "Invalid map range for '{}': {}", name, reason);
                return MapFuture::null();
            }
        };
        let (Some(ctx), Some(buffer)) = (self.ctx.upgrade(), self.inner.buffer.as_ref()) else {
            pers_error!(SOURCE, "Cannot map '{}': device is gone", name);
            return MapFuture::null();
        };

        map.state = BufferState::MapPending;
        map.request += 1;
        let request = map.request;
        drop(map);

        let poller: Arc<dyn DevicePoller> = ctx;
        let (promise, future) = MapFuture::channel(Some(poller));
        let weak = Arc::downgrade(&self.inner);
        buffer
            .slice(offset..offset + size)
            .map_async(wgpu_mode, move |result| {
                complete_map(&weak, request, wgpu_mode, offset, size, result, promise);
            });
        future
    }

    fn unmap(&self) {
        self.inner.unmap();
    }

    fn is_mapped(&self) -> bool {
        self.inner.state() == BufferState::Mapped
    }

    fn is_map_pending(&self) -> bool {
        self.inner.state() == BufferState::MapPending
    }

    fn mapped_range(&self) -> Option<(u64, u64)> {
        let map = self.inner.map.lock();
        if map.state == BufferState::Mapped { map.range } else { None }
    }

    // wgpu host memory is coherent and unmap publishes writes; only the range is checked
    fn flush_mapped_range(&self, offset: u64, size: u64) {
        self.check_mapped_range("Flush", offset, size);
    }

    fn invalidate_mapped_range(&self, offset: u64, size: u64) {
        self.check_mapped_range("Invalidate", offset, size);
    }

    fn wait_for_pending_map(&self) -> BufferState {
        let Some(ctx) = self.ctx.upgrade() else {
            return self.inner.state();
        };
        let mut polls = 0;
        while self.is_map_pending() && polls < MAX_PENDING_POLLS {
            if !ctx.poll(true) {
                break;
            }
            polls += 1;
        }
        self.inner.state()
    }

    fn as_native(&self) -> &dyn NativeBuffer {
        self
    }
}
