/// Queue trait

use crate::error::Result;
use crate::graphics_device::CommandBuffer;

/// Submission queue
///
/// Submissions from one producer are executed in submission order.
pub trait Queue: Send + Sync {
    /// Submit one command buffer
    fn submit(&self, command_buffer: Box<dyn CommandBuffer>) -> Result<()>;

    /// Submit several command buffers in order
    fn submit_batch(&self, command_buffers: Vec<Box<dyn CommandBuffer>>) -> Result<()> {
        for command_buffer in command_buffers {
            self.submit(command_buffer)?;
        }
        Ok(())
    }

    /// Block until submitted work has completed
    fn wait_idle(&self) -> Result<()>;
}
