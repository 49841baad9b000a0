/// WebGpuCommandEncoder - wgpu implementation of the command encoder traits

use std::any::Any;
use std::sync::Arc;

use pers_graphics::pers::buffers::NativeBuffer;
use pers_graphics::pers::{CommandBuffer, CommandEncoder, Result};
use pers_graphics::{pers_bail, pers_trace};

use crate::webgpu_buffer::WebGpuBuffer;
use crate::webgpu_context::WebGpuContext;

const SOURCE: &str = "pers::WebGpuCommandEncoder";

pub struct WebGpuCommandEncoder {
    encoder: wgpu::CommandEncoder,
    label: Option<String>,
    command_count: usize,
}

impl WebGpuCommandEncoder {
    pub(crate) fn new(ctx: &Arc<WebGpuContext>, label: Option<&str>) -> Self {
        let encoder = ctx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label });
        Self {
            encoder,
            label: label.map(str::to_string),
            command_count: 0,
        }
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    fn wgpu_buffer<'b>(buffer: &'b dyn NativeBuffer, role: &str) -> Result<&'b wgpu::Buffer> {
        let Some(webgpu) = buffer.as_any().downcast_ref::<WebGpuBuffer>() else {
            pers_bail!(BackendError, SOURCE, "Copy {} '{}' is not a wgpu buffer", role, buffer.debug_name());
        };
        match webgpu.wgpu_buffer() {
            Some(wgpu_buffer) => Ok(wgpu_buffer),
            None => pers_bail!(InvalidResource, SOURCE, "Copy {} '{}' is not valid", role, buffer.debug_name()),
        }
    }
}

impl CommandEncoder for WebGpuCommandEncoder {
    fn copy_buffer_to_buffer(
        &mut self,
        source: &dyn NativeBuffer,
        source_offset: u64,
        destination: &dyn NativeBuffer,
        destination_offset: u64,
        size: u64,
    ) -> Result<()> {
        let src = Self::wgpu_buffer(source, "source")?;
        let dst = Self::wgpu_buffer(destination, "destination")?;
        self.encoder
            .copy_buffer_to_buffer(src, source_offset, dst, destination_offset, size);
        self.command_count += 1;
        pers_trace!(
            SOURCE,
            "Recorded copy '{}' -> '{}' ({} bytes)",
            source.debug_name(),
            destination.debug_name(),
            size
        );
        Ok(())
    }

    fn command_count(&self) -> usize {
        self.command_count
    }

    fn finish(self: Box<Self>) -> Result<Box<dyn CommandBuffer>> {
        Ok(Box::new(WebGpuCommandBuffer {
            command_buffer: self.encoder.finish(),
        }))
    }
}

/// Finished wgpu command buffer
pub struct WebGpuCommandBuffer {
    pub(crate) command_buffer: wgpu::CommandBuffer,
}

impl CommandBuffer for WebGpuCommandBuffer {
    fn into_any(self: Box<Self>) -> Box<dyn Any + Send> {
        self
    }
}
