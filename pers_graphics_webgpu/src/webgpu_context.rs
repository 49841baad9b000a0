/// WebGpuContext - Shared wgpu objects for all backend resources
///
/// Holds the device, queue and adapter description. Buffers keep an `Arc` to it
/// so map futures can drive the device; the buffer factory only keeps a weak
/// reference through the `BufferBackend` trait.

use std::sync::{Arc, Weak};

use pers_graphics::pers::buffers::{BufferDesc, NativeBuffer, NativeMappableBuffer};
use pers_graphics::pers::{BackendLimits, BufferBackend, DevicePoller};
use pers_graphics::{pers_error, pers_trace};

use crate::webgpu_buffer::WebGpuBuffer;
use crate::webgpu_converters;

const SOURCE: &str = "pers::WebGpuContext";

pub struct WebGpuContext {
    /// wgpu logical device
    pub device: wgpu::Device,

    /// Default queue
    pub queue: wgpu::Queue,

    /// Adapter the device was created from
    pub adapter_info: wgpu::AdapterInfo,

    /// Features enabled on the device
    pub features: wgpu::Features,

    /// Limits converted once at creation
    pub(crate) limits: BackendLimits,

    self_weak: Weak<WebGpuContext>,
}

impl WebGpuContext {
    pub(crate) fn new(
        device: wgpu::Device,
        queue: wgpu::Queue,
        adapter_info: wgpu::AdapterInfo,
    ) -> Arc<Self> {
        let features = device.features();
        let limits = webgpu_converters::limits_from_wgpu(&device.limits());
        Arc::new_cyclic(|self_weak| Self {
            device,
            queue,
            adapter_info,
            features,
            limits,
            self_weak: self_weak.clone(),
        })
    }

    pub fn supports_mappable_primary_buffers(&self) -> bool {
        self.features.contains(wgpu::Features::MAPPABLE_PRIMARY_BUFFERS)
    }

    fn create(&self, desc: &BufferDesc, mappable: bool) -> WebGpuBuffer {
        let Some(ctx) = self.self_weak.upgrade() else {
            return WebGpuBuffer::invalid(desc, Weak::new(), mappable);
        };
        if let Some(reason) = webgpu_converters::creation_error(desc, self.features, &self.limits) {
            pers_error!(SOURCE, "Cannot create '{}': {}", desc.debug_name, reason);
            return WebGpuBuffer::invalid(desc, Arc::downgrade(&ctx), mappable);
        }

        let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: webgpu_converters::label(desc),
            size: desc.size,
            usage: webgpu_converters::usage_to_wgpu(desc.usage),
            mapped_at_creation: desc.mapped_at_creation,
        });
        pers_trace!(
            SOURCE,
            "Created '{}' ({} bytes, {:?}, mappable: {})",
            desc.debug_name,
            desc.size,
            desc.usage,
            mappable
        );
        WebGpuBuffer::new(desc, buffer, Arc::downgrade(&ctx), mappable)
    }
}

impl DevicePoller for WebGpuContext {
    fn poll(&self, wait: bool) -> bool {
        let poll_type = if wait {
            wgpu::PollType::Wait { submission_index: None, timeout: None }
        } else {
            wgpu::PollType::Poll
        };
        match self.device.poll(poll_type) {
            Ok(_) => true,
            Err(e) => {
                pers_error!(SOURCE, "Device poll failed: {}", e);
                false
            }
        }
    }
}

impl BufferBackend for WebGpuContext {
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

impl std::fmt::Debug for WebGpuContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebGpuContext")
            .field("adapter", &self.adapter_info.name)
            .field("backend", &self.adapter_info.backend)
            .field("features", &self.features)
            .finish()
    }
}
