/// Native buffer contract implemented by backends
///
/// A backend provides two primitives: a plain buffer and a mappable buffer. The
/// user-facing buffer types in this crate own exactly one primitive each (or one
/// per ring slot) and never reach past this contract.

use std::any::Any;
use std::ffi::c_void;

use crate::buffers::buffer_types::{
    AccessPattern, BufferMapRange, BufferState, BufferUsage, MapMode, MemoryLocation,
};
use crate::buffers::mapped_data::{MapFuture, MappedData};

/// Opaque backend handle; the null handle marks an invalid buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct NativeBufferHandle(usize);

impl NativeBufferHandle {
    pub const NULL: NativeBufferHandle = NativeBufferHandle(0);

    /// Wrap a backend object address
    pub fn from_ptr<T>(ptr: *const T) -> Self {
        Self(ptr as usize)
    }

    pub fn as_ptr(&self) -> *const c_void {
        self.0 as *const c_void
    }

    pub fn is_null(&self) -> bool {
        self.0 == 0
    }
}

/// Backend buffer primitive
///
/// Calls on a destroyed buffer return the failure value of their type (null
/// handle, `false`, `0`).
pub trait NativeBuffer: Send + Sync {
    /// Size in bytes (0 once destroyed)
    fn size(&self) -> u64;

    /// Usage the backend buffer was created with
    fn usage(&self) -> BufferUsage;

    fn debug_name(&self) -> &str;

    /// Backend handle (null if invalid or destroyed)
    fn native_handle(&self) -> NativeBufferHandle;

    fn state(&self) -> BufferState;

    fn memory_location(&self) -> MemoryLocation;

    fn access_pattern(&self) -> AccessPattern;

    /// True for a successfully created, not destroyed buffer
    fn is_valid(&self) -> bool;

    /// Release the backend resource; the buffer becomes `Destroyed`
    ///
    /// A pending map completes with a null handle.
    fn destroy(&self);

    /// Borrowed view of the mapping a buffer was created with
    ///
    /// `Some` only between creation with `mapped_at_creation` and
    /// [`unmap_at_creation`](Self::unmap_at_creation).
    fn creation_mapping(&self) -> Option<MappedData>;

    /// End the creation-time mapping; no-op if there is none
    fn unmap_at_creation(&self);

    /// Mappable view of this buffer, if it is a mappable primitive
    fn as_mappable(&self) -> Option<&dyn NativeMappableBuffer> {
        None
    }

    /// Downcast support for backends matching their own buffer types
    fn as_any(&self) -> &dyn Any;
}

/// Mappable backend buffer primitive
pub trait NativeMappableBuffer: NativeBuffer {
    /// Borrowed view of the current mapping, `None` unless `Mapped`
    fn mapped_data(&self) -> Option<MappedData>;

    /// Request a CPU mapping of `range`
    ///
    /// While mapped, warns and returns a ready future with a borrowed handle over the
    /// existing mapping. While a map is pending, warns and returns a null future.
    fn map_async(&self, mode: MapMode, range: BufferMapRange) -> MapFuture;

    /// End the current mapping; idempotent
    fn unmap(&self);

    fn is_mapped(&self) -> bool;

    fn is_map_pending(&self) -> bool;

    /// `(offset, size)` of the current mapping, `None` unless `Mapped`
    fn mapped_range(&self) -> Option<(u64, u64)>;

    /// Make CPU writes in the range visible to the device (no-op on coherent memory)
    fn flush_mapped_range(&self, offset: u64, size: u64);

    /// Make device writes in the range visible to the CPU (no-op on coherent memory)
    fn invalidate_mapped_range(&self, offset: u64, size: u64);

    /// Block until a pending map resolves; returns the resulting state
    fn wait_for_pending_map(&self) -> BufferState;

    /// This buffer as a plain native buffer
    fn as_native(&self) -> &dyn NativeBuffer;
}

/// A native primitive of either kind, as returned by the factory
pub enum AnyNativeBuffer {
    Plain(Box<dyn NativeBuffer>),
    Mappable(Box<dyn NativeMappableBuffer>),
}

impl AnyNativeBuffer {
    pub fn as_native(&self) -> &dyn NativeBuffer {
        match self {
            AnyNativeBuffer::Plain(buffer) => buffer.as_ref(),
            AnyNativeBuffer::Mappable(buffer) => buffer.as_native(),
        }
    }

    pub fn as_mappable(&self) -> Option<&dyn NativeMappableBuffer> {
        match self {
            AnyNativeBuffer::Plain(_) => None,
            AnyNativeBuffer::Mappable(buffer) => Some(buffer.as_ref()),
        }
    }

    pub fn is_mappable(&self) -> bool {
        matches!(self, AnyNativeBuffer::Mappable(_))
    }

    pub fn into_mappable(self) -> Option<Box<dyn NativeMappableBuffer>> {
        match self {
            AnyNativeBuffer::Plain(_) => None,
            AnyNativeBuffer::Mappable(buffer) => Some(buffer),
        }
    }
}

impl std::fmt::Debug for AnyNativeBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let native = self.as_native();
        f.debug_struct("AnyNativeBuffer")
            .field("mappable", &self.is_mappable())
            .field("name", &native.debug_name())
            .field("size", &native.size())
            .field("state", &native.state())
            .finish()
    }
}
