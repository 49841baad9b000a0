/// WebGpuBuffer - wgpu implementation of the native buffer primitives
///
/// One type backs both primitives; `mappable` decides whether the mappable
/// interface is exposed. The map state lives behind the pers debug mutex because
/// wgpu map callbacks mutate it from whichever thread polls the device.

use std::any::Any;
use std::ptr::NonNull;
use std::sync::{Arc, Weak};

use pers_graphics::pers::buffers::{
    AccessPattern, BufferDesc, BufferState, BufferUsage, MappedData, MappingToken, MemoryLocation,
    NativeBuffer, NativeBufferHandle, NativeMappableBuffer,
};
use pers_graphics::pers::utils::Mutex;
use pers_graphics::pers_debug;

use crate::webgpu_context::WebGpuContext;

pub(crate) const SOURCE: &str = "pers::WebGpuBuffer";

/// Map bookkeeping; `ptr` is the address of the first mapped byte
#[derive(Debug, Default)]
pub(crate) struct MapState {
    pub(crate) state: BufferState,
    pub(crate) range: Option<(u64, u64)>,
    pub(crate) ptr: usize,
    pub(crate) token: Option<MappingToken>,
    pub(crate) at_creation: bool,
    /// Id of the latest map request; stale callbacks are ignored
    pub(crate) request: u64,
}

impl MapState {
    /// Borrowed handle over the current mapping
    pub(crate) fn borrowed_view(&self) -> Option<MappedData> {
        match (self.state, self.range, &self.token) {
            (BufferState::Mapped, Some((_, size)), Some(token)) => {
                let ptr = NonNull::new(self.ptr as *mut u8)?;
                Some(MappedData::borrowed(ptr, size, token.clone()))
            }
            _ => None,
        }
    }

    fn clear_mapping(&mut self) {
        if let Some(token) = self.token.take() {
            token.invalidate();
        }
        self.range = None;
        self.ptr = 0;
        self.at_creation = false;
    }
}

pub(crate) struct WebGpuBufferInner {
    pub(crate) desc: BufferDesc,
    /// `None` for a buffer that failed creation
    pub(crate) buffer: Option<wgpu::Buffer>,
    pub(crate) map: Mutex<MapState>,
}

impl WebGpuBufferInner {
    pub(crate) fn state(&self) -> BufferState {
        self.map.lock().state
    }

    /// End a mapping or cancel a pending one; idempotent
    pub(crate) fn unmap(&self) {
        let mut map = self.map.lock();
        match map.state {
            BufferState::Mapped | BufferState::MapPending => {
                map.clear_mapping();
                map.state = BufferState::Ready;
                drop(map);
                if let Some(buffer) = &self.buffer {
                    buffer.unmap();
                }
            }
            _ => {}
        }
    }

    /// Release callback for an owning handle: only tears down the mapping it was made for
    pub(crate) fn release_for(inner: &Arc<WebGpuBufferInner>, token: MappingToken) -> impl FnOnce() + Send + 'static {
        let weak = Arc::downgrade(inner);
        move || {
            if token.is_live() {
                if let Some(inner) = weak.upgrade() {
                    inner.unmap();
                }
            }
        }
    }
}

/// Plain or mappable wgpu buffer
pub struct WebGpuBuffer {
    pub(crate) inner: Arc<WebGpuBufferInner>,
    pub(crate) ctx: Weak<WebGpuContext>,
    pub(crate) mappable: bool,
}

impl WebGpuBuffer {
    pub(crate) fn new(desc: &BufferDesc, buffer: wgpu::Buffer, ctx: Weak<WebGpuContext>, mappable: bool) -> Self {
        let mut map = MapState {
            state: BufferState::Ready,
            ..Default::default()
        };
        if desc.mapped_at_creation {
            let ptr = {
                let mut view = buffer.slice(..).get_mapped_range_mut();
                view.slice(..).as_raw_element_ptr().as_ptr()
            };
            map.state = BufferState::Mapped;
            map.range = Some((0, desc.size));
            map.ptr = ptr as usize;
            map.token = Some(MappingToken::new());
            map.at_creation = true;
        }
        Self::with_state(desc, Some(buffer), ctx, mappable, map)
    }

    /// Buffer that failed creation: null handle, `Uninitialized`
    pub(crate) fn invalid(desc: &BufferDesc, ctx: Weak<WebGpuContext>, mappable: bool) -> Self {
        Self::with_state(desc, None, ctx, mappable, MapState::default())
    }

    fn with_state(
        desc: &BufferDesc,
        buffer: Option<wgpu::Buffer>,
        ctx: Weak<WebGpuContext>,
        mappable: bool,
        map: MapState,
    ) -> Self {
        Self {
            inner: Arc::new(WebGpuBufferInner {
                desc: desc.clone(),
                buffer,
                map: Mutex::new("WebGpuBuffer::map", map),
            }),
            ctx,
            mappable,
        }
    }

    /// Underlying wgpu buffer, `None` if creation failed or the buffer is destroyed
    pub fn wgpu_buffer(&self) -> Option<&wgpu::Buffer> {
        if self.is_valid() { self.inner.buffer.as_ref() } else { None }
    }
}

impl NativeBuffer for WebGpuBuffer {
    fn size(&self) -> u64 {
        if self.is_valid() { self.inner.desc.size } else { 0 }
    }

    fn usage(&self) -> BufferUsage {
        self.inner.desc.usage
    }

    fn debug_name(&self) -> &str {
        &self.inner.desc.debug_name
    }

    fn native_handle(&self) -> NativeBufferHandle {
        if self.is_valid() {
            NativeBufferHandle::from_ptr(Arc::as_ptr(&self.inner))
        } else {
            NativeBufferHandle::NULL
        }
    }

    fn state(&self) -> BufferState {
        self.inner.state()
    }

    fn memory_location(&self) -> MemoryLocation {
        self.inner.desc.memory_location
    }

    fn access_pattern(&self) -> AccessPattern {
        self.inner.desc.access_pattern
    }

    fn is_valid(&self) -> bool {
        self.inner.buffer.is_some() && self.inner.state() != BufferState::Destroyed
    }

    fn destroy(&self) {
        {
            let mut map = self.inner.map.lock();
            if map.state == BufferState::Destroyed {
                return;
            }
            map.clear_mapping();
            map.state = BufferState::Destroyed;
        }
        // A pending map completes with an error in its callback
        if let Some(buffer) = &self.inner.buffer {
            buffer.destroy();
        }
        pers_debug!(SOURCE, "Destroyed '{}'", self.inner.desc.debug_name);
    }

    fn creation_mapping(&self) -> Option<MappedData> {
        let map = self.inner.map.lock();
        if map.at_creation { map.borrowed_view() } else { None }
    }

    fn unmap_at_creation(&self) {
        let at_creation = self.inner.map.lock().at_creation;
        if at_creation {
            self.inner.unmap();
        }
    }

    fn as_mappable(&self) -> Option<&dyn NativeMappableBuffer> {
        if self.mappable { Some(self) } else { None }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl std::fmt::Debug for WebGpuBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebGpuBuffer")
            .field("name", &self.inner.desc.debug_name)
            .field("size", &self.inner.desc.size)
            .field("usage", &self.inner.desc.usage)
            .field("mappable", &self.mappable)
            .field("state", &self.inner.state())
            .finish()
    }
}
