/// WebGpuQueue - wgpu implementation of the Queue trait

use std::sync::Arc;

use pers_graphics::pers::{CommandBuffer, DevicePoller, Queue, Result};
use pers_graphics::{pers_bail, pers_debug};

use crate::webgpu_command_encoder::WebGpuCommandBuffer;
use crate::webgpu_context::WebGpuContext;

const SOURCE: &str = "pers::WebGpuQueue";

pub struct WebGpuQueue {
    ctx: Arc<WebGpuContext>,
}

impl WebGpuQueue {
    pub(crate) fn new(ctx: Arc<WebGpuContext>) -> Self {
        Self { ctx }
    }

    fn unwrap_command_buffer(command_buffer: Box<dyn CommandBuffer>) -> Result<wgpu::CommandBuffer> {
        match command_buffer.into_any().downcast::<WebGpuCommandBuffer>() {
            Ok(webgpu) => Ok(webgpu.command_buffer),
            Err(_) => pers_bail!(BackendError, SOURCE, "Command buffer was not recorded by the wgpu backend"),
        }
    }
}

impl Queue for WebGpuQueue {
    fn submit(&self, command_buffer: Box<dyn CommandBuffer>) -> Result<()> {
        let command_buffer = Self::unwrap_command_buffer(command_buffer)?;
        self.ctx.queue.submit(Some(command_buffer));
        Ok(())
    }

    fn submit_batch(&self, command_buffers: Vec<Box<dyn CommandBuffer>>) -> Result<()> {
        let command_buffers = command_buffers
            .into_iter()
            .map(Self::unwrap_command_buffer)
            .collect::<Result<Vec<_>>>()?;
        pers_debug!(SOURCE, "Submitting {} command buffers", command_buffers.len());
        self.ctx.queue.submit(command_buffers);
        Ok(())
    }

    fn wait_idle(&self) -> Result<()> {
        if !self.ctx.poll(true) {
            pers_bail!(BackendError, SOURCE, "Device lost while waiting for the queue");
        }
        Ok(())
    }
}
