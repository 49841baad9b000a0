/*!
# pers graphics - WebGPU Backend

wgpu implementation of the pers graphics layer.

This crate implements the `pers_graphics` device, buffer, command encoder and
queue traits on top of wgpu. Map requests complete through wgpu callbacks that
run while the device is polled; `MapFuture::wait` drives the polling.

## Example

```no_run
use pers_graphics::pers::buffers::{BufferDesc, BufferUsage};
use pers_graphics::pers::LogicalDevice;
use pers_graphics_webgpu::pers::{WebGpuDeviceConfig, WebGpuLogicalDevice};

let device = WebGpuLogicalDevice::new(WebGpuDeviceConfig::default())?;
let vertices = device
    .buffer_factory()
    .create_device_buffer(&BufferDesc::new(1024, BufferUsage::VERTEX))?;
# Ok::<(), pers_graphics::pers::Error>(())
```
*/

// wgpu implementation modules
mod webgpu_context;
mod webgpu_converters;
mod webgpu_buffer;
mod webgpu_mappable_buffer;
mod webgpu_command_encoder;
mod webgpu_queue;
mod webgpu_device;

// Main pers namespace module
pub mod pers {
    pub use crate::webgpu_buffer::WebGpuBuffer;
    pub use crate::webgpu_command_encoder::{WebGpuCommandBuffer, WebGpuCommandEncoder};
    pub use crate::webgpu_context::WebGpuContext;
    pub use crate::webgpu_device::{WebGpuDeviceConfig, WebGpuLogicalDevice};
    pub use crate::webgpu_queue::WebGpuQueue;
}

// Re-export the wgpu version this backend is built against
pub use wgpu;
