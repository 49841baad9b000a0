/*!
# pers graphics

Backend-agnostic buffer subsystem for the pers graphics layer.

This crate defines the typed buffer hierarchy, the buffer factory, the staging
and transfer protocol, the per-frame ring buffer and the asynchronous mapping
protocol. Backends (see `pers_graphics_webgpu`) implement the native buffer,
command encoder and queue traits.

## Architecture

- **LogicalDevice**: Owns the buffer factory, creates command encoders, exposes the queue
- **BufferFactory**: Validates descriptors and creates native primitives and user-facing buffers
- **NativeBuffer / NativeMappableBuffer**: Backend buffer primitives
- **DeviceBuffer**: GPU-resident buffer filled through copies
- **ImmediateStagingBuffer**: Mapped-at-creation upload buffer
- **DeferredStagingBuffer**: Asynchronously mapped upload or readback buffer
- **ImmediateDeviceBuffer**: Device buffer initialized at creation
- **DynamicBuffer**: Ring of per-frame host-visible buffers
- **MappedData / MapFuture**: Scoped mapping handle and one-shot map completion
*/

// Internal modules
mod error;
mod runtime;
pub mod log;
pub mod utils;
pub mod buffers;
pub mod graphics_device;

#[cfg(test)]
mod test_logger;

// Main pers namespace module
pub mod pers {
    // Error types
    pub use crate::error::{Error, Result};

    // Global logger dispatch
    pub use crate::runtime::Runtime;

    // Device, encoder and queue traits
    pub use crate::graphics_device::{
        BackendLimits, BufferBackend, CommandBuffer, CommandEncoder, DevicePoller, LogicalDevice,
        Queue,
    };

    // Logging sub-module (types only, macros live at the crate root)
    pub mod log {
        pub use crate::log::{Logger, LogEntry, LogSeverity, DefaultLogger};
    }

    // Buffer sub-module with every buffer type
    pub mod buffers {
        pub use crate::buffers::*;
    }

    // Utilities
    pub mod utils {
        pub use crate::utils::{Mutex, MutexGuard};
    }
}

// Re-export math library at crate root
pub use glam;
