/// Mock graphics device for unit tests (no GPU required)
///
/// Buffers are backed by host memory. Map requests are queued and complete when
/// the device is polled (or immediately with spontaneous maps enabled), copies
/// are recorded by the encoder and executed on queue submission.

use std::alloc::{alloc_zeroed, dealloc, Layout};
use std::any::Any;
use std::ptr::NonNull;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use crate::buffers::buffer_factory::BufferFactory;
use crate::buffers::buffer_types::{
    AccessPattern, BufferDesc, BufferMapRange, BufferState, BufferUsage, MapMode, MemoryLocation,
};
use crate::buffers::mapped_data::{MapFuture, MapPromise, MappedData, MappingToken};
use crate::buffers::native_buffer::{NativeBuffer, NativeBufferHandle, NativeMappableBuffer};
use crate::error::Result;
use crate::graphics_device::{
    BackendLimits, BufferBackend, CommandBuffer, CommandEncoder, DevicePoller, LogicalDevice, Queue,
};
use crate::utils::Mutex;
use crate::{pers_bail, pers_error, pers_warn};

const SOURCE: &str = "pers::MockBuffer";

// ============================================================================
// Mock Storage
// ============================================================================

/// Zeroed host allocation standing in for GPU memory
pub struct MockStorage {
    ptr: NonNull<u8>,
    layout: Layout,
    len: usize,
}

// SAFETY: access is serialized by the tests and the map state of the owning buffer.
unsafe impl Send for MockStorage {}
unsafe impl Sync for MockStorage {}

impl MockStorage {
    fn new(len: usize) -> Self {
        let layout = Layout::from_size_align(len.max(1), 256).expect("mock storage layout");
        // SAFETY: layout has a non-zero size.
        let raw = unsafe { alloc_zeroed(layout) };
        let ptr = NonNull::new(raw).expect("mock storage allocation");
        Self { ptr, layout, len }
    }

    fn ptr_at(&self, offset: u64) -> NonNull<u8> {
        // SAFETY: callers pass offsets within the allocation.
        unsafe { NonNull::new_unchecked(self.ptr.as_ptr().add(offset as usize)) }
    }

    pub fn read(&self, offset: usize, len: usize) -> Vec<u8> {
        assert!(offset + len <= self.len);
        // SAFETY: range checked above.
        unsafe { std::slice::from_raw_parts(self.ptr.as_ptr().add(offset), len).to_vec() }
    }

    pub fn write(&self, offset: usize, data: &[u8]) {
        assert!(offset + data.len() <= self.len);
        // SAFETY: range checked above.
        unsafe { std::ptr::copy(data.as_ptr(), self.ptr.as_ptr().add(offset), data.len()) }
    }
}

impl Drop for MockStorage {
    fn drop(&mut self) {
        // SAFETY: allocated in `new` with the same layout.
        unsafe { dealloc(self.ptr.as_ptr(), self.layout) }
    }
}

// ============================================================================
// Mock Buffer
// ============================================================================

#[derive(Debug, Default)]
struct MapState {
    state: BufferState,
    range: Option<(u64, u64)>,
    token: Option<MappingToken>,
    at_creation: bool,
    /// Id of the latest map request; cancelled requests complete with null
    request: u64,
}

pub struct MockBufferInner {
    desc: BufferDesc,
    storage: MockStorage,
    map: Mutex<MapState>,
    valid: bool,
    flush_count: AtomicUsize,
}

impl MockBufferInner {
    fn unmap(&self) {
        let mut map = self.map.lock();
        match map.state {
            BufferState::Mapped => {
                if let Some(token) = map.token.take() {
                    token.invalidate();
                }
                map.range = None;
                map.at_creation = false;
                map.state = BufferState::Ready;
            }
            BufferState::MapPending => map.state = BufferState::Ready,
            _ => {}
        }
    }

    fn state(&self) -> BufferState {
        self.map.lock().state
    }

    /// Release callback for an owning handle: only tears down the mapping it was made for
    fn release_for(inner: &Arc<MockBufferInner>, token: MappingToken) -> impl FnOnce() + Send + 'static {
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

/// Plain or mappable mock primitive
pub struct MockBuffer {
    inner: Arc<MockBufferInner>,
    backend: Weak<MockBackend>,
    mappable: bool,
}

impl MockBuffer {
    fn new(desc: &BufferDesc, backend: Weak<MockBackend>, mappable: bool, valid: bool) -> Self {
        let mut map = MapState {
            state: if valid { BufferState::Ready } else { BufferState::Uninitialized },
            ..Default::default()
        };
        if valid && desc.mapped_at_creation {
            map.state = BufferState::Mapped;
            map.range = Some((0, desc.size));
            map.token = Some(MappingToken::new());
            map.at_creation = true;
        }
        Self {
            inner: Arc::new(MockBufferInner {
                desc: desc.clone(),
                storage: MockStorage::new(if valid { desc.size as usize } else { 0 }),
                map: Mutex::new("MockBuffer::map", map),
                valid,
                flush_count: AtomicUsize::new(0),
            }),
            backend,
            mappable,
        }
    }

    pub fn storage(&self) -> &MockStorage {
        &self.inner.storage
    }

    /// Number of `flush_mapped_range` calls accepted so far
    pub fn flush_count(&self) -> usize {
        self.inner.flush_count.load(Ordering::Relaxed)
    }

    fn borrowed_view(&self, map: &MapState) -> Option<MappedData> {
        match (map.state, map.range, &map.token) {
            (BufferState::Mapped, Some((offset, size)), Some(token)) => Some(MappedData::borrowed(
                self.inner.storage.ptr_at(offset),
                size,
                token.clone(),
            )),
            _ => None,
        }
    }

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

impl NativeBuffer for MockBuffer {
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
        self.inner.valid && self.inner.state() != BufferState::Destroyed
    }

    fn destroy(&self) {
        {
            let mut map = self.inner.map.lock();
            if let Some(token) = map.token.take() {
                token.invalidate();
            }
            map.range = None;
            map.state = BufferState::Destroyed;
        }
        if let Some(backend) = self.backend.upgrade() {
            backend.abort_maps_for(&self.inner);
        }
    }

    fn creation_mapping(&self) -> Option<MappedData> {
        let map = self.inner.map.lock();
        if map.at_creation { self.borrowed_view(&map) } else { None }
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

impl NativeMappableBuffer for MockBuffer {
    fn mapped_data(&self) -> Option<MappedData> {
        let map = self.inner.map.lock();
        self.borrowed_view(&map)
    }

    fn map_async(&self, mode: MapMode, range: BufferMapRange) -> MapFuture {
        let mut map = self.inner.map.lock();
        match map.state {
            BufferState::Destroyed | BufferState::Uninitialized => {
                pers_error!(SOURCE, "Cannot map invalid buffer '{}'", self.inner.desc.debug_name);
                return MapFuture::null();
            }
            BufferState::Mapped => {
                pers_warn!(SOURCE, "'{}' is already mapped", self.inner.desc.debug_name);
                return self.borrowed_view(&map).map_or_else(MapFuture::null, MapFuture::ready);
            }
            BufferState::MapPending => {
                pers_warn!(SOURCE, "'{}' already has a pending map", self.inner.desc.debug_name);
                return MapFuture::null();
            }
            BufferState::Ready => {}
        }
        if mode == MapMode::None || !self.inner.desc.usage.contains(mode.required_usage()) {
            pers_error!(
                SOURCE,
                "'{}' with usage {:?} cannot be mapped for {:?}",
                self.inner.desc.debug_name,
                self.inner.desc.usage,
                mode
            );
            return MapFuture::null();
        }
        let (offset, size) = match range.resolve(self.inner.desc.size) {
            Ok(resolved) => resolved,
            Err(reason) => {
                pers_error!(SOURCE, "Invalid map range for '{}': {}", self.inner.desc.debug_name, reason);
                return MapFuture::null();
            }
        };
        let Some(backend) = self.backend.upgrade() else {
            pers_error!(SOURCE, "Cannot map '{}': device is gone", self.inner.desc.debug_name);
            return MapFuture::null();
        };

        map.state = BufferState::MapPending;
        map.request += 1;
        let request = map.request;
        drop(map);

        let poller: Arc<dyn DevicePoller> = backend.clone();
        let (promise, future) = MapFuture::channel(Some(poller));
        backend.enqueue_map(PendingMap {
            buffer: Arc::downgrade(&self.inner),
            promise,
            offset,
            size,
            request,
        });
        if backend.spontaneous_maps.load(Ordering::Acquire) {
            backend.poll(false);
        }
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

    fn flush_mapped_range(&self, offset: u64, size: u64) {
        if self.check_mapped_range("Flush", offset, size) {
            self.inner.flush_count.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn invalidate_mapped_range(&self, offset: u64, size: u64) {
        self.check_mapped_range("Invalidate", offset, size);
    }

    fn wait_for_pending_map(&self) -> BufferState {
        if self.is_map_pending() {
            if let Some(backend) = self.backend.upgrade() {
                backend.poll(true);
            }
        }
        self.inner.state()
    }

    fn as_native(&self) -> &dyn NativeBuffer {
        self
    }
}

// ============================================================================
// Mock Backend
// ============================================================================

struct PendingMap {
    buffer: Weak<MockBufferInner>,
    promise: MapPromise,
    offset: u64,
    size: u64,
    request: u64,
}

pub struct MockBackend {
    self_weak: Weak<MockBackend>,
    pending_maps: Mutex<Vec<PendingMap>>,
    created_buffers: Mutex<Vec<String>>,
    limits: BackendLimits,
    spontaneous_maps: AtomicBool,
    fail_maps: AtomicBool,
    fail_creation: AtomicBool,
    poll_count: AtomicUsize,
}

impl MockBackend {
    fn new(limits: BackendLimits) -> Arc<Self> {
        Arc::new_cyclic(|self_weak| Self {
            self_weak: self_weak.clone(),
            pending_maps: Mutex::new("MockBackend::pending_maps", Vec::new()),
            created_buffers: Mutex::new("MockBackend::created_buffers", Vec::new()),
            limits,
            spontaneous_maps: AtomicBool::new(false),
            fail_maps: AtomicBool::new(false),
            fail_creation: AtomicBool::new(false),
            poll_count: AtomicUsize::new(0),
        })
    }

    /// Complete map requests inside `map_async` instead of on poll
    pub fn set_spontaneous_maps(&self, enabled: bool) {
        self.spontaneous_maps.store(enabled, Ordering::Release);
    }

    /// Complete every map request with a failure
    pub fn set_fail_maps(&self, enabled: bool) {
        self.fail_maps.store(enabled, Ordering::Release);
    }

    /// Return invalid buffers from creation
    pub fn set_fail_creation(&self, enabled: bool) {
        self.fail_creation.store(enabled, Ordering::Release);
    }

    pub fn pending_map_count(&self) -> usize {
        self.pending_maps.lock().len()
    }

    pub fn poll_count(&self) -> usize {
        self.poll_count.load(Ordering::Relaxed)
    }

    /// Debug names of every buffer created, in order
    pub fn get_created_buffers(&self) -> Vec<String> {
        self.created_buffers.lock().clone()
    }

    fn enqueue_map(&self, pending: PendingMap) {
        self.pending_maps.lock().push(pending);
    }

    fn abort_maps_for(&self, inner: &Arc<MockBufferInner>) {
        let aborted: Vec<PendingMap> = {
            let mut pending = self.pending_maps.lock();
            let (aborted, kept) = pending
                .drain(..)
                .partition(|map| std::ptr::eq(map.buffer.as_ptr(), Arc::as_ptr(inner)));
            *pending = kept;
            aborted
        };
        for map in aborted {
            map.promise.fail();
        }
    }

    fn complete(&self, pending: PendingMap) {
        let Some(inner) = pending.buffer.upgrade() else {
            pending.promise.fail();
            return;
        };
        let token = {
            let mut map = inner.map.lock();
            if map.state != BufferState::MapPending || map.request != pending.request {
                drop(map);
                pending.promise.fail();
                return;
            }
            if self.fail_maps.load(Ordering::Acquire) {
                map.state = BufferState::Ready;
                drop(map);
                pending.promise.fail();
                return;
            }
            let token = MappingToken::new();
            map.state = BufferState::Mapped;
            map.range = Some((pending.offset, pending.size));
            map.token = Some(token.clone());
            token
        };
        let release = MockBufferInner::release_for(&inner, token.clone());
        let ptr = inner.storage.ptr_at(pending.offset);
        pending
            .promise
            .complete(MappedData::owned(ptr, pending.size, token, release));
    }

    fn create(&self, desc: &BufferDesc, mappable: bool) -> MockBuffer {
        let valid = !self.fail_creation.load(Ordering::Acquire);
        if valid {
            self.created_buffers.lock().push(desc.debug_name.clone());
        }
        MockBuffer::new(desc, self.self_weak.clone(), mappable, valid)
    }
}

impl DevicePoller for MockBackend {
    fn poll(&self, _wait: bool) -> bool {
        self.poll_count.fetch_add(1, Ordering::Relaxed);
        let ready: Vec<PendingMap> = self.pending_maps.lock().drain(..).collect();
        for pending in ready {
            self.complete(pending);
        }
        true
    }
}

impl BufferBackend for MockBackend {
    fn create_native_buffer(&self, desc: &BufferDesc) -> Box<dyn NativeBuffer> {
        Box::new(self.create(desc, false))
    }

    fn create_native_mappable_buffer(&self, desc: &BufferDesc) -> Box<dyn NativeMappableBuffer> {
        Box::new(self.create(desc, true))
    }

    fn limits(&self) -> BackendLimits {
        self.limits
    }
}

// ============================================================================
// Mock Command Encoder / Queue
// ============================================================================

struct RecordedCopy {
    source: Arc<MockBufferInner>,
    source_offset: u64,
    destination: Arc<MockBufferInner>,
    destination_offset: u64,
    size: u64,
}

pub struct MockCommandEncoder {
    label: Option<String>,
    copies: Vec<RecordedCopy>,
}

impl MockCommandEncoder {
    pub fn new(label: Option<&str>) -> Self {
        Self {
            label: label.map(str::to_string),
            copies: Vec::new(),
        }
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    fn mock_inner(buffer: &dyn NativeBuffer) -> Result<Arc<MockBufferInner>> {
        match buffer.as_any().downcast_ref::<MockBuffer>() {
            Some(mock) => Ok(Arc::clone(&mock.inner)),
            None => pers_bail!(
                BackendError,
                "pers::MockCommandEncoder",
                "'{}' is not a mock buffer",
                buffer.debug_name()
            ),
        }
    }
}

impl CommandEncoder for MockCommandEncoder {
    fn copy_buffer_to_buffer(
        &mut self,
        source: &dyn NativeBuffer,
        source_offset: u64,
        destination: &dyn NativeBuffer,
        destination_offset: u64,
        size: u64,
    ) -> Result<()> {
        self.copies.push(RecordedCopy {
            source: Self::mock_inner(source)?,
            source_offset,
            destination: Self::mock_inner(destination)?,
            destination_offset,
            size,
        });
        Ok(())
    }

    fn command_count(&self) -> usize {
        self.copies.len()
    }

    fn finish(self: Box<Self>) -> Result<Box<dyn CommandBuffer>> {
        Ok(Box::new(MockCommandBuffer { copies: self.copies }))
    }
}

pub struct MockCommandBuffer {
    copies: Vec<RecordedCopy>,
}

impl CommandBuffer for MockCommandBuffer {
    fn into_any(self: Box<Self>) -> Box<dyn Any + Send> {
        self
    }
}

pub struct MockQueue {
    submissions: AtomicUsize,
    executed_copies: AtomicUsize,
}

impl MockQueue {
    fn new() -> Self {
        Self {
            submissions: AtomicUsize::new(0),
            executed_copies: AtomicUsize::new(0),
        }
    }

    pub fn submission_count(&self) -> usize {
        self.submissions.load(Ordering::Relaxed)
    }

    pub fn executed_copy_count(&self) -> usize {
        self.executed_copies.load(Ordering::Relaxed)
    }
}

impl Queue for MockQueue {
    fn submit(&self, command_buffer: Box<dyn CommandBuffer>) -> Result<()> {
        let Ok(command_buffer) = command_buffer.into_any().downcast::<MockCommandBuffer>() else {
            pers_bail!(BackendError, "pers::MockQueue", "Command buffer was not recorded by the mock");
        };
        for copy in &command_buffer.copies {
            let bytes = copy
                .source
                .storage
                .read(copy.source_offset as usize, copy.size as usize);
            copy.destination
                .storage
                .write(copy.destination_offset as usize, &bytes);
        }
        self.executed_copies
            .fetch_add(command_buffer.copies.len(), Ordering::Relaxed);
        self.submissions.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn wait_idle(&self) -> Result<()> {
        Ok(())
    }
}

// ============================================================================
// Mock Graphics Device
// ============================================================================

pub struct MockGraphicsDevice {
    backend: Arc<MockBackend>,
    factory: BufferFactory,
    queue: MockQueue,
}

impl MockGraphicsDevice {
    pub fn new() -> Self {
        Self::with_limits(BackendLimits::default())
    }

    pub fn with_limits(limits: BackendLimits) -> Self {
        let backend = MockBackend::new(limits);
        let weak = Arc::downgrade(&backend);
        let weak: Weak<dyn BufferBackend> = weak;
        Self {
            factory: BufferFactory::new(weak),
            backend,
            queue: MockQueue::new(),
        }
    }

    pub fn backend(&self) -> &Arc<MockBackend> {
        &self.backend
    }

    pub fn mock_queue(&self) -> &MockQueue {
        &self.queue
    }

    /// Finish `encoder` and submit it
    pub fn submit(&self, encoder: Box<dyn CommandEncoder>) -> Result<()> {
        self.queue.submit(encoder.finish()?)
    }

    /// Current memory contents of a mock buffer
    pub fn read_native(buffer: &dyn NativeBuffer) -> Vec<u8> {
        let mock = buffer
            .as_any()
            .downcast_ref::<MockBuffer>()
            .expect("not a mock buffer");
        mock.storage().read(0, mock.inner.desc.size as usize)
    }

    pub fn flush_count(buffer: &dyn NativeBuffer) -> usize {
        buffer
            .as_any()
            .downcast_ref::<MockBuffer>()
            .map_or(0, MockBuffer::flush_count)
    }
}

impl Default for MockGraphicsDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl LogicalDevice for MockGraphicsDevice {
    fn buffer_factory(&self) -> &BufferFactory {
        &self.factory
    }

    fn create_command_encoder(&self, label: Option<&str>) -> Result<Box<dyn CommandEncoder>> {
        Ok(Box::new(MockCommandEncoder::new(label)))
    }

    fn queue(&self) -> &dyn Queue {
        &self.queue
    }

    fn wait_idle(&self) -> Result<()> {
        self.backend.poll(true);
        Ok(())
    }
}

#[cfg(test)]
#[path = "mock_graphics_device_tests.rs"]
mod tests;
