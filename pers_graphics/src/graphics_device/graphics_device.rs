/// Logical device and buffer backend traits
///
/// The logical device is the root of the ownership tree: it owns the buffer
/// factory, which only keeps a weak reference back to the backend. Backends
/// (wgpu, the test mock) implement `BufferBackend` for primitive creation and
/// `LogicalDevice` for command recording and submission.

use crate::buffers::buffer_factory::BufferFactory;
use crate::buffers::buffer_types::{BufferAlignment, BufferDesc, BufferLimits};
use crate::buffers::native_buffer::{NativeBuffer, NativeMappableBuffer};
use crate::error::Result;
use crate::graphics_device::{CommandEncoder, Queue};

/// Drives backend completion callbacks (map requests, submitted work)
pub trait DevicePoller: Send + Sync {
    /// Process pending callbacks
    ///
    /// # Arguments
    ///
    /// * `wait` - Block until submitted work has completed
    ///
    /// # Returns
    ///
    /// `false` if the device is lost and no further progress is possible
    fn poll(&self, wait: bool) -> bool;
}

/// Limits reported by a backend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackendLimits {
    pub max_buffer_size: u64,
    pub max_uniform_buffer_binding_size: u64,
    pub max_storage_buffer_binding_size: u64,
    pub min_uniform_buffer_offset_alignment: u64,
    pub min_storage_buffer_offset_alignment: u64,
}

impl Default for BackendLimits {
    fn default() -> Self {
        Self {
            max_buffer_size: BufferLimits::MAX_BUFFER_SIZE,
            max_uniform_buffer_binding_size: BufferLimits::MAX_UNIFORM_BUFFER_SIZE,
            max_storage_buffer_binding_size: BufferLimits::MAX_STORAGE_BUFFER_SIZE,
            min_uniform_buffer_offset_alignment: BufferAlignment::UNIFORM_BUFFER_OFFSET,
            min_storage_buffer_offset_alignment: BufferAlignment::STORAGE_BUFFER_OFFSET,
        }
    }
}

/// Backend primitive factory consumed by [`BufferFactory`]
///
/// Descriptors arrive already validated, translated and aligned. Creation never
/// fails loudly: a backend that cannot create the buffer returns one whose
/// `is_valid()` is `false`.
pub trait BufferBackend: DevicePoller {
    /// Create a plain (non-mappable) buffer
    ///
    /// `desc.mapped_at_creation` may be set; the creation mapping is then exposed
    /// through [`NativeBuffer::creation_mapping`].
    fn create_native_buffer(&self, desc: &BufferDesc) -> Box<dyn NativeBuffer>;

    /// Create a mappable buffer
    fn create_native_mappable_buffer(&self, desc: &BufferDesc) -> Box<dyn NativeMappableBuffer>;

    fn limits(&self) -> BackendLimits;
}

/// Logical device interface
///
/// Implemented by backend-specific devices (e.g., `WebGpuLogicalDevice`).
pub trait LogicalDevice: Send + Sync {
    /// Buffer factory owned by this device
    fn buffer_factory(&self) -> &BufferFactory;

    /// Create a command encoder
    ///
    /// # Arguments
    ///
    /// * `label` - Optional debug label
    fn create_command_encoder(&self, label: Option<&str>) -> Result<Box<dyn CommandEncoder>>;

    /// Default queue
    fn queue(&self) -> &dyn Queue;

    /// Block until all submitted work has completed
    fn wait_idle(&self) -> Result<()>;
}
