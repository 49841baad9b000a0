/// Buffer factory
///
/// Long-lived object owned by the logical device. It validates descriptors,
/// applies memory hints and alignment, asks the backend for primitives and
/// composes the user-facing buffer types, which borrow the factory for later
/// recreation. The factory keeps only a weak reference to the backend; once the
/// backend is gone every creation fails with `DeviceMissing`.
///
/// No caching or pooling: every call produces a fresh buffer.

use std::sync::{Arc, Weak};

use crate::buffers::buffer_types::{BufferAlignment, BufferDesc, BufferLimits, BufferUsage, MapMode};
use crate::buffers::deferred_staging_buffer::DeferredStagingBuffer;
use crate::buffers::device_buffer::DeviceBuffer;
use crate::buffers::dynamic_buffer::DynamicBuffer;
use crate::buffers::immediate_device_buffer::ImmediateDeviceBuffer;
use crate::buffers::immediate_staging_buffer::ImmediateStagingBuffer;
use crate::buffers::native_buffer::{AnyNativeBuffer, NativeBuffer, NativeMappableBuffer};
use crate::error::Result;
use crate::graphics_device::{BackendLimits, BufferBackend};
use crate::{pers_bail, pers_debug, pers_err};

const SOURCE: &str = "pers::BufferFactory";

pub struct BufferFactory {
    backend: Weak<dyn BufferBackend>,
}

impl BufferFactory {
    /// Create a factory for `backend`
    ///
    /// # Arguments
    ///
    /// * `backend` - Weak reference to the backend owned by the logical device
    pub fn new(backend: Weak<dyn BufferBackend>) -> Self {
        Self { backend }
    }

    fn backend(&self, operation: &str) -> Result<Arc<dyn BufferBackend>> {
        self.backend.upgrade().ok_or_else(|| {
            pers_err!(DeviceMissing, SOURCE, "Cannot {}: the logical device is gone", operation)
        })
    }

    fn limits(&self) -> Option<BackendLimits> {
        self.backend.upgrade().map(|backend| backend.limits())
    }

    fn validate(&self, desc: &BufferDesc, limits: &BackendLimits) -> Result<()> {
        if let Some(reason) = desc.validation_error() {
            pers_bail!(
                InvalidDescriptor,
                SOURCE,
                "invalid buffer descriptor '{}': {}",
                desc.debug_name,
                reason
            );
        }
        let max = limits.max_buffer_size.min(BufferLimits::MAX_BUFFER_SIZE);
        if desc.size > max {
            pers_bail!(
                InvalidDescriptor,
                SOURCE,
                "invalid buffer descriptor '{}': size {} exceeds the device limit {}",
                desc.debug_name,
                desc.size,
                max
            );
        }
        if desc.usage.contains(BufferUsage::UNIFORM) && desc.size > limits.max_uniform_buffer_binding_size {
            pers_bail!(
                InvalidDescriptor,
                SOURCE,
                "invalid buffer descriptor '{}': uniform size {} exceeds the device limit {}",
                desc.debug_name,
                desc.size,
                limits.max_uniform_buffer_binding_size
            );
        }
        Ok(())
    }

    fn check_created(native: &dyn NativeBuffer, desc: &BufferDesc) -> Result<()> {
        if !native.is_valid() || native.native_handle().is_null() {
            pers_bail!(
                BackendError,
                SOURCE,
                "Backend failed to create buffer '{}' ({} bytes, {:?})",
                desc.debug_name,
                desc.size,
                desc.usage
            );
        }
        Ok(())
    }

    /// Validate, translate and create a plain primitive
    pub(crate) fn create_plain_primitive(&self, desc: &BufferDesc) -> Result<Box<dyn NativeBuffer>> {
        let backend = self.backend("create buffer")?;
        self.validate(desc, &backend.limits())?;
        let backend_desc = desc.to_backend();
        let native = backend.create_native_buffer(&backend_desc);
        Self::check_created(native.as_ref(), &backend_desc)?;
        pers_debug!(SOURCE, "Created buffer '{}' ({} bytes)", backend_desc.debug_name, native.size());
        Ok(native)
    }

    /// Validate, translate and create a mappable primitive (usage as given)
    pub(crate) fn create_mappable_primitive(&self, desc: &BufferDesc) -> Result<Box<dyn NativeMappableBuffer>> {
        let backend = self.backend("create mappable buffer")?;
        self.validate(desc, &backend.limits())?;
        let backend_desc = desc.to_backend();
        let native = backend.create_native_mappable_buffer(&backend_desc);
        Self::check_created(native.as_native(), &backend_desc)?;
        pers_debug!(
            SOURCE,
            "Created mappable buffer '{}' ({} bytes)",
            backend_desc.debug_name,
            native.size()
        );
        Ok(native)
    }

    /// Create a backend primitive
    ///
    /// A mappable primitive is chosen when the translated usage contains a map flag
    /// or the buffer is mapped at creation; otherwise a plain one.
    pub fn create_buffer(&self, desc: &BufferDesc) -> Result<AnyNativeBuffer> {
        if desc.translated_usage().is_host_visible() || desc.mapped_at_creation {
            self.create_mappable_primitive(desc).map(AnyNativeBuffer::Mappable)
        } else {
            self.create_plain_primitive(desc).map(AnyNativeBuffer::Plain)
        }
    }

    /// Create a mappable primitive with both MAP_READ and MAP_WRITE added
    pub fn create_mappable_buffer(&self, desc: &BufferDesc) -> Result<Box<dyn NativeMappableBuffer>> {
        let mut desc = desc.clone();
        desc.usage |= BufferUsage::MAP_ANY;
        self.create_mappable_primitive(&desc)
    }

    /// Create a primitive initialized with `data` through a creation-time mapping
    ///
    /// The descriptor is validated as given; the mapping is internal to this call,
    /// so `mapped_at_creation` need not be set by the caller.
    ///
    /// # Errors
    ///
    /// * `InvalidDescriptor` - `data` is empty or the descriptor is invalid
    /// * `OutOfBounds` - `data` is larger than `desc.size`
    pub fn create_buffer_with_sync_write(&self, desc: &BufferDesc, data: &[u8]) -> Result<Box<dyn NativeBuffer>> {
        if data.is_empty() {
            pers_bail!(InvalidDescriptor, SOURCE, "invalid initial data for '{}': data is empty", desc.debug_name);
        }
        if data.len() as u64 > desc.size {
            pers_bail!(
                OutOfBounds,
                SOURCE,
                "Initial data of {} bytes does not fit buffer '{}' of {} bytes",
                data.len(),
                desc.debug_name,
                desc.size
            );
        }

        let backend = self.backend("create buffer with initial data")?;
        let mut unmapped = desc.clone();
        unmapped.mapped_at_creation = false;
        self.validate(&unmapped, &backend.limits())?;

        let mut backend_desc = unmapped.to_backend();
        backend_desc.mapped_at_creation = true;
        let native = backend.create_native_buffer(&backend_desc);
        Self::check_created(native.as_ref(), &backend_desc)?;

        match native.creation_mapping() {
            Some(mut mapping) if mapping.size() >= data.len() as u64 => {
                mapping.as_mut_slice()[..data.len()].copy_from_slice(data);
            }
            _ => {
                native.destroy();
                pers_bail!(
                    BackendError,
                    SOURCE,
                    "Buffer '{}' was not mapped at creation",
                    backend_desc.debug_name
                );
            }
        }
        native.unmap_at_creation();

        pers_debug!(
            SOURCE,
            "Created buffer '{}' with {} bytes of initial data",
            backend_desc.debug_name,
            data.len()
        );
        Ok(native)
    }

    pub fn create_device_buffer(&self, desc: &BufferDesc) -> Result<DeviceBuffer<'_>> {
        DeviceBuffer::new(self, desc)
    }

    pub fn create_immediate_staging_buffer(&self, desc: &BufferDesc) -> Result<ImmediateStagingBuffer> {
        ImmediateStagingBuffer::new(self, desc)
    }

    pub fn create_deferred_staging_buffer(&self, desc: &BufferDesc, mode: MapMode) -> Result<DeferredStagingBuffer<'_>> {
        DeferredStagingBuffer::new(self, desc, mode)
    }

    pub fn create_immediate_device_buffer(&self, desc: &BufferDesc, data: &[u8]) -> Result<ImmediateDeviceBuffer<'_>> {
        ImmediateDeviceBuffer::new(self, desc, data)
    }

    /// Create a ring of `frame_count` buffers (see [`DynamicBuffer::DEFAULT_FRAME_COUNT`])
    pub fn create_dynamic_buffer(&self, desc: &BufferDesc, frame_count: u32) -> Result<DynamicBuffer<'_>> {
        DynamicBuffer::new(self, desc, frame_count)
    }

    /// Whether `desc` is valid and fits the device limits (no logging)
    pub fn is_supported(&self, desc: &BufferDesc) -> bool {
        match self.limits() {
            Some(limits) => {
                desc.is_valid()
                    && desc.size <= limits.max_buffer_size.min(BufferLimits::MAX_BUFFER_SIZE)
                    && (!desc.usage.contains(BufferUsage::UNIFORM)
                        || desc.size <= limits.max_uniform_buffer_binding_size)
            }
            None => false,
        }
    }

    /// Largest buffer the device accepts (0 if the device is gone)
    pub fn max_buffer_size(&self) -> u64 {
        self.limits()
            .map_or(0, |limits| limits.max_buffer_size.min(BufferLimits::MAX_BUFFER_SIZE))
    }

    /// Offset alignment for bindings of `usage`
    ///
    /// Uniform and storage use at least 256 bytes (raised to the device minimum),
    /// everything else the copy alignment.
    pub fn alignment(&self, usage: BufferUsage) -> u64 {
        let limits = self.limits().unwrap_or_default();
        if usage.contains(BufferUsage::UNIFORM) {
            BufferAlignment::UNIFORM_BUFFER_OFFSET.max(limits.min_uniform_buffer_offset_alignment)
        } else if usage.contains(BufferUsage::STORAGE) {
            BufferAlignment::STORAGE_BUFFER_OFFSET.max(limits.min_storage_buffer_offset_alignment)
        } else {
            BufferAlignment::COPY_BUFFER_OFFSET
        }
    }

    /// True while the backend is alive
    pub fn has_device(&self) -> bool {
        self.backend.strong_count() > 0
    }
}

impl std::fmt::Debug for BufferFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferFactory")
            .field("has_device", &self.has_device())
            .finish()
    }
}

#[cfg(test)]
#[path = "buffer_factory_tests.rs"]
mod tests;
