/// Mapped-data handle and the one-shot map future
///
/// A `MappedData` is a scoped view of a mapped byte range. An owning handle runs
/// its release callback exactly once when dropped (the callback unmaps the
/// buffer); a handle created without a callback only borrows the mapping.
/// Every handle shares a `MappingToken` with its buffer: once the buffer tears the
/// mapping down, slice accessors return empty slices instead of dangling memory.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::ptr::NonNull;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

use bytemuck::Pod;
use futures::channel::oneshot;

use crate::graphics_device::DevicePoller;

/// Upper bound on device polls performed by a blocking wait
const MAX_WAIT_POLLS: u32 = 1024;

// ============================================================================
// MappingToken
// ============================================================================

/// Liveness flag shared by a buffer and the handles over one mapping
#[derive(Debug, Clone)]
pub struct MappingToken(Arc<AtomicBool>);

impl MappingToken {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(true)))
    }

    /// Mark the mapping as torn down
    pub fn invalidate(&self) {
        self.0.store(false, Ordering::Release);
    }

    pub fn is_live(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

impl Default for MappingToken {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// MappedData
// ============================================================================

pub struct MappedData {
    ptr: Option<NonNull<u8>>,
    len: u64,
    token: Option<MappingToken>,
    release: Option<Box<dyn FnOnce() + Send>>,
}

// SAFETY: the pointer addresses mapped memory whose access is governed by this
// handle; the release callback is itself Send.
unsafe impl Send for MappedData {}

impl MappedData {
    /// Handle that owns the mapping and runs `release` when dropped
    pub fn owned(
        ptr: NonNull<u8>,
        len: u64,
        token: MappingToken,
        release: impl FnOnce() + Send + 'static,
    ) -> Self {
        Self {
            ptr: Some(ptr),
            len,
            token: Some(token),
            release: Some(Box::new(release)),
        }
    }

    /// Handle that views a mapping owned elsewhere
    pub fn borrowed(ptr: NonNull<u8>, len: u64, token: MappingToken) -> Self {
        Self {
            ptr: Some(ptr),
            len,
            token: Some(token),
            release: None,
        }
    }

    /// Failure handle: null pointer, zero length
    pub fn null() -> Self {
        Self {
            ptr: None,
            len: 0,
            token: None,
            release: None,
        }
    }

    pub fn is_null(&self) -> bool {
        self.ptr.is_none()
    }

    /// True while the underlying mapping has not been torn down
    pub fn is_live(&self) -> bool {
        self.ptr.is_some() && self.token.as_ref().is_some_and(MappingToken::is_live)
    }

    /// True if dropping this handle releases the mapping
    pub fn is_owner(&self) -> bool {
        self.release.is_some()
    }

    /// Raw pointer to the first mapped byte (null when not live)
    pub fn data(&self) -> *const u8 {
        match self.live_ptr() {
            Some(ptr) => ptr.as_ptr() as *const u8,
            None => std::ptr::null(),
        }
    }

    /// Mutable raw pointer to the first mapped byte (null when not live)
    pub fn data_mut(&mut self) -> *mut u8 {
        match self.live_ptr() {
            Some(ptr) => ptr.as_ptr(),
            None => std::ptr::null_mut(),
        }
    }

    /// Mapped length in bytes (0 for a null handle)
    pub fn size(&self) -> u64 {
        if self.ptr.is_some() { self.len } else { 0 }
    }

    /// Number of whole `T` elements in the mapping (0 once torn down)
    pub fn count<T>(&self) -> usize {
        match std::mem::size_of::<T>() {
            0 => 0,
            elem => self.as_slice().len() / elem,
        }
    }

    pub fn as_slice(&self) -> &[u8] {
        match self.live_ptr() {
            // SAFETY: the mapping is live and spans `len` bytes.
            Some(ptr) => unsafe { std::slice::from_raw_parts(ptr.as_ptr(), self.len as usize) },
            None => &[],
        }
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        match self.live_ptr() {
            // SAFETY: the mapping is live, spans `len` bytes and `&mut self` is unique.
            Some(ptr) => unsafe { std::slice::from_raw_parts_mut(ptr.as_ptr(), self.len as usize) },
            None => &mut [],
        }
    }

    /// Reinterpret the start of the mapping as a `T`
    pub fn as_type<T: Pod>(&self) -> Option<&T> {
        let bytes = self.as_slice().get(..std::mem::size_of::<T>())?;
        bytemuck::try_from_bytes(bytes).ok()
    }

    pub fn as_type_mut<T: Pod>(&mut self) -> Option<&mut T> {
        let size = std::mem::size_of::<T>();
        let bytes = self.as_mut_slice().get_mut(..size)?;
        bytemuck::try_from_bytes_mut(bytes).ok()
    }

    /// Reinterpret the mapping as `[T]` (trailing partial element ignored)
    ///
    /// Returns an empty slice if the mapping is not suitably aligned for `T`.
    pub fn as_array<T: Pod>(&self) -> &[T] {
        let bytes = self.count::<T>() * std::mem::size_of::<T>();
        match self.as_slice().get(..bytes) {
            Some(bytes) => bytemuck::try_cast_slice(bytes).unwrap_or(&[]),
            None => &[],
        }
    }

    pub fn as_array_mut<T: Pod>(&mut self) -> &mut [T] {
        let bytes = self.count::<T>() * std::mem::size_of::<T>();
        match self.as_mut_slice().get_mut(..bytes) {
            Some(bytes) => bytemuck::try_cast_slice_mut(bytes).unwrap_or(&mut []),
            None => &mut [],
        }
    }

    /// Release the mapping now instead of at scope end
    pub fn release(self) {
        drop(self);
    }

    fn live_ptr(&self) -> Option<NonNull<u8>> {
        if self.is_live() { self.ptr } else { None }
    }
}

impl Default for MappedData {
    fn default() -> Self {
        Self::null()
    }
}

impl Drop for MappedData {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl fmt::Debug for MappedData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MappedData")
            .field("ptr", &self.ptr)
            .field("len", &self.len)
            .field("live", &self.is_live())
            .field("owner", &self.is_owner())
            .finish()
    }
}

// ============================================================================
// MapPromise / MapFuture
// ============================================================================

/// Producer half of a map request, completed exactly once by the backend callback
pub struct MapPromise {
    sender: oneshot::Sender<MappedData>,
}

impl MapPromise {
    /// Deliver the mapping
    ///
    /// If the future was dropped the handle is dropped here, which releases an
    /// owning mapping.
    pub fn complete(self, data: MappedData) {
        let _ = self.sender.send(data);
    }

    /// Deliver a null handle
    pub fn fail(self) {
        self.complete(MappedData::null());
    }
}

enum MapFutureState {
    Ready(MappedData),
    Pending(oneshot::Receiver<MappedData>),
    Taken,
}

/// Consumer half of a map request
///
/// Resolves to a `MappedData`; a null handle means the map failed or was
/// abandoned. Implements `Future`, and `wait()` blocks while driving the device
/// through its poller.
pub struct MapFuture {
    state: MapFutureState,
    poller: Option<Arc<dyn DevicePoller>>,
}

impl MapFuture {
    /// Create the future first, then hand the promise to the backend request
    pub fn channel(poller: Option<Arc<dyn DevicePoller>>) -> (MapPromise, MapFuture) {
        let (sender, receiver) = oneshot::channel();
        (
            MapPromise { sender },
            MapFuture {
                state: MapFutureState::Pending(receiver),
                poller,
            },
        )
    }

    /// Future that is already resolved
    pub fn ready(data: MappedData) -> Self {
        Self {
            state: MapFutureState::Ready(data),
            poller: None,
        }
    }

    /// Future already resolved with a null handle
    pub fn null() -> Self {
        Self::ready(MappedData::null())
    }

    /// Check for completion without blocking or polling the device
    pub fn is_ready(&mut self) -> bool {
        match std::mem::replace(&mut self.state, MapFutureState::Taken) {
            MapFutureState::Pending(mut receiver) => match receiver.try_recv() {
                Ok(Some(data)) => {
                    self.state = MapFutureState::Ready(data);
                    true
                }
                Ok(None) => {
                    self.state = MapFutureState::Pending(receiver);
                    false
                }
                Err(oneshot::Canceled) => {
                    self.state = MapFutureState::Ready(MappedData::null());
                    true
                }
            },
            other => {
                self.state = other;
                true
            }
        }
    }

    /// Block until the map resolves
    pub fn wait(mut self) -> MappedData {
        let poller = self.poller.take();
        let mut polls = 0;
        loop {
            if self.is_ready() {
                return match std::mem::replace(&mut self.state, MapFutureState::Taken) {
                    MapFutureState::Ready(data) => data,
                    _ => MappedData::null(),
                };
            }
            match &poller {
                Some(poller) => {
                    if polls >= MAX_WAIT_POLLS || !poller.poll(true) {
                        crate::pers_error!(
                            "pers::MapFuture",
                            "Map request did not complete after {} device polls",
                            polls
                        );
                        return MappedData::null();
                    }
                    polls += 1;
                }
                None => {
                    return match std::mem::replace(&mut self.state, MapFutureState::Taken) {
                        MapFutureState::Pending(receiver) => {
                            pollster::block_on(receiver).unwrap_or_else(|_| MappedData::null())
                        }
                        MapFutureState::Ready(data) => data,
                        MapFutureState::Taken => MappedData::null(),
                    };
                }
            }
        }
    }
}

impl Future for MapFuture {
    type Output = MappedData;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<MappedData> {
        match std::mem::replace(&mut self.state, MapFutureState::Taken) {
            MapFutureState::Ready(data) => Poll::Ready(data),
            MapFutureState::Taken => Poll::Ready(MappedData::null()),
            MapFutureState::Pending(mut receiver) => match Pin::new(&mut receiver).poll(cx) {
                Poll::Ready(result) => Poll::Ready(result.unwrap_or_else(|_| MappedData::null())),
                Poll::Pending => {
                    self.state = MapFutureState::Pending(receiver);
                    Poll::Pending
                }
            },
        }
    }
}

impl fmt::Debug for MapFuture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match self.state {
            MapFutureState::Ready(_) => "ready",
            MapFutureState::Pending(_) => "pending",
            MapFutureState::Taken => "taken",
        };
        f.debug_struct("MapFuture").field("state", &state).finish()
    }
}

#[cfg(test)]
#[path = "mapped_data_tests.rs"]
mod tests;
