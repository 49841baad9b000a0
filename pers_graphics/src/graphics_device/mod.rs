/// Graphics device module - device, encoder and queue interfaces

pub mod graphics_device;
pub mod command_encoder;
pub mod queue;

pub use graphics_device::*;
pub use command_encoder::*;
pub use queue::*;

// Mock graphics device for tests (no GPU required)
#[cfg(test)]
pub mod mock_graphics_device;
