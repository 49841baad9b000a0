/// Command encoder and command buffer traits

use std::any::Any;

use crate::buffers::native_buffer::NativeBuffer;
use crate::error::Result;

/// Records GPU commands for later submission
///
/// Commands execute in recording order once the finished command buffer is
/// submitted. `finish` consumes the encoder, so a second finish cannot happen.
pub trait CommandEncoder: Send {
    /// Record a buffer-to-buffer copy
    ///
    /// Arguments are expected to be validated by the transfer protocol; backends
    /// only reject buffers they do not own.
    ///
    /// # Arguments
    ///
    /// * `source` - Buffer with COPY_SRC usage
    /// * `source_offset` - Byte offset in `source`
    /// * `destination` - Buffer with COPY_DST usage
    /// * `destination_offset` - Byte offset in `destination`
    /// * `size` - Bytes to copy
    fn copy_buffer_to_buffer(
        &mut self,
        source: &dyn NativeBuffer,
        source_offset: u64,
        destination: &dyn NativeBuffer,
        destination_offset: u64,
        size: u64,
    ) -> Result<()>;

    /// Number of commands recorded so far
    fn command_count(&self) -> usize;

    /// Finish recording
    fn finish(self: Box<Self>) -> Result<Box<dyn CommandBuffer>>;
}

/// Finished, submittable command buffer
pub trait CommandBuffer: Send {
    /// Downcast support for the queue of the backend that recorded it
    fn into_any(self: Box<Self>) -> Box<dyn Any + Send>;
}
