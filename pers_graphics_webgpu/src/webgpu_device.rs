/// WebGpuLogicalDevice - wgpu implementation of the LogicalDevice trait
///
/// Owns the shared context, the buffer factory and the queue. The factory only
/// holds a weak reference to the context, so buffers created from it report
/// `DeviceMissing` once the device is gone.

use std::sync::{Arc, Weak};

use pers_graphics::pers::buffers::BufferFactory;
use pers_graphics::pers::{BufferBackend, CommandEncoder, LogicalDevice, Queue, Result};
use pers_graphics::{pers_err, pers_info, pers_warn};

use crate::webgpu_command_encoder::WebGpuCommandEncoder;
use crate::webgpu_context::WebGpuContext;
use crate::webgpu_queue::WebGpuQueue;

const SOURCE: &str = "pers::WebGpuLogicalDevice";

/// Device creation settings
#[derive(Debug, Clone)]
pub struct WebGpuDeviceConfig {
    /// Adapter preference
    pub power_preference: wgpu::PowerPreference,

    /// Use a software adapter
    pub force_fallback_adapter: bool,

    /// Enable `MAPPABLE_PRIMARY_BUFFERS` when the adapter supports it
    ///
    /// Dynamic buffers with uniform, vertex or storage usage need it.
    pub request_mappable_primary_buffers: bool,

    /// Device debug label
    pub label: Option<String>,
}

impl Default for WebGpuDeviceConfig {
    fn default() -> Self {
        Self {
            power_preference: wgpu::PowerPreference::HighPerformance,
            force_fallback_adapter: false,
            request_mappable_primary_buffers: true,
            label: Some("pers device".to_string()),
        }
    }
}

pub struct WebGpuLogicalDevice {
    ctx: Arc<WebGpuContext>,
    factory: BufferFactory,
    queue: WebGpuQueue,
}

impl WebGpuLogicalDevice {
    /// Create a device on the best matching adapter
    ///
    /// # Errors
    ///
    /// * `InitializationFailed` - No adapter matches or the device request fails
    pub fn new(config: WebGpuDeviceConfig) -> Result<Self> {
        pollster::block_on(Self::new_async(config))
    }

    pub async fn new_async(config: WebGpuDeviceConfig) -> Result<Self> {
        let instance = wgpu::Instance::default();
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: config.power_preference,
                compatible_surface: None,
                force_fallback_adapter: config.force_fallback_adapter,
            })
            .await
            .map_err(|e| pers_err!(InitializationFailed, SOURCE, "No suitable adapter: {}", e))?;

        let mut required_features = wgpu::Features::empty();
        if config.request_mappable_primary_buffers {
            if adapter.features().contains(wgpu::Features::MAPPABLE_PRIMARY_BUFFERS) {
                required_features |= wgpu::Features::MAPPABLE_PRIMARY_BUFFERS;
            } else {
                pers_warn!(
                    SOURCE,
                    "Adapter does not support MAPPABLE_PRIMARY_BUFFERS; dynamic buffers are limited to copy usage"
                );
            }
        }

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: config.label.as_deref(),
                required_features,
                required_limits: adapter.limits(),
                memory_hints: wgpu::MemoryHints::Performance,
                ..Default::default()
            })
            .await
            .map_err(|e| pers_err!(InitializationFailed, SOURCE, "Device request failed: {}", e))?;

        let adapter_info = adapter.get_info();
        pers_info!(
            SOURCE,
            "Created device on '{}' ({:?}, {:?})",
            adapter_info.name,
            adapter_info.backend,
            adapter_info.device_type
        );
        Ok(Self::from_context(WebGpuContext::new(device, queue, adapter_info)))
    }

    fn from_context(ctx: Arc<WebGpuContext>) -> Self {
        let weak = Arc::downgrade(&ctx);
        let weak: Weak<dyn BufferBackend> = weak;
        Self {
            factory: BufferFactory::new(weak),
            queue: WebGpuQueue::new(Arc::clone(&ctx)),
            ctx,
        }
    }

    /// Shared wgpu objects
    pub fn context(&self) -> &Arc<WebGpuContext> {
        &self.ctx
    }

    pub fn adapter_info(&self) -> &wgpu::AdapterInfo {
        &self.ctx.adapter_info
    }

    pub fn supports_mappable_primary_buffers(&self) -> bool {
        self.ctx.supports_mappable_primary_buffers()
    }
}

impl LogicalDevice for WebGpuLogicalDevice {
    fn buffer_factory(&self) -> &BufferFactory {
        &self.factory
    }

    fn create_command_encoder(&self, label: Option<&str>) -> Result<Box<dyn CommandEncoder>> {
        Ok(Box::new(WebGpuCommandEncoder::new(&self.ctx, label)))
    }

    fn queue(&self) -> &dyn Queue {
        &self.queue
    }

    fn wait_idle(&self) -> Result<()> {
        self.queue.wait_idle()
    }
}

impl std::fmt::Debug for WebGpuLogicalDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebGpuLogicalDevice")
            .field("ctx", &self.ctx)
            .finish()
    }
}
