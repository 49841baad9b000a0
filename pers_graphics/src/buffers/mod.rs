/// Buffer subsystem - typed buffers, factory, mapping and transfers

pub mod buffer_types;
pub mod mapped_data;
pub mod native_buffer;
pub mod transfer;
pub mod buffer;
pub mod device_buffer;
pub mod immediate_staging_buffer;
pub mod deferred_staging_buffer;
pub mod immediate_device_buffer;
pub mod dynamic_buffer;
pub mod buffer_factory;

pub use buffer_types::*;
pub use mapped_data::{MapFuture, MapPromise, MappedData, MappingToken};
pub use native_buffer::{AnyNativeBuffer, NativeBuffer, NativeBufferHandle, NativeMappableBuffer};
pub use transfer::{record_copy, resolve_copy, validate_copy_endpoints, ResolvedCopy};
pub use buffer::{Buffer, BufferKind, GpuBuffer, MappableBuffer};
pub use device_buffer::DeviceBuffer;
pub use immediate_staging_buffer::ImmediateStagingBuffer;
pub use deferred_staging_buffer::DeferredStagingBuffer;
pub use immediate_device_buffer::ImmediateDeviceBuffer;
pub use dynamic_buffer::{DynamicBuffer, UpdateHandle};
pub use buffer_factory::BufferFactory;

#[cfg(test)]
#[path = "scenario_tests.rs"]
mod scenario_tests;
