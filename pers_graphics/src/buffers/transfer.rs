/// Transfer protocol: validation and encoding of buffer-to-buffer copies
///
/// Copies are recorded, never executed immediately. All user-facing transfer
/// operations (`copy_from`, `copy_to`, `upload_to`, `download_from`) go through
/// [`record_copy`], which normalizes `WHOLE_SIZE` and checks usage flags,
/// alignment, bounds and map state before touching the encoder.

use crate::buffers::buffer_types::{BufferAlignment, BufferCopyDesc, BufferState, BufferUsage};
use crate::buffers::native_buffer::NativeBuffer;
use crate::error::{Error, Result};
use crate::graphics_device::CommandEncoder;
use crate::{pers_bail, pers_debug, pers_err, pers_warn};

const SOURCE: &str = "pers::Transfer";

/// Copy region with `WHOLE_SIZE` resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedCopy {
    pub src_offset: u64,
    pub dst_offset: u64,
    pub size: u64,
}

/// Resolve and bounds-check a copy region
///
/// `WHOLE_SIZE` becomes `min(src_size - src_offset, dst_size - dst_offset)`.
/// Offsets and size must be multiples of the copy alignment (4 bytes).
pub fn resolve_copy(src_size: u64, dst_size: u64, copy: &BufferCopyDesc) -> Result<ResolvedCopy> {
    if copy.src_offset > src_size {
        pers_bail!(
            OutOfBounds,
            SOURCE,
            "Copy source offset {} exceeds buffer size {}",
            copy.src_offset,
            src_size
        );
    }
    if copy.dst_offset > dst_size {
        pers_bail!(
            OutOfBounds,
            SOURCE,
            "Copy destination offset {} exceeds buffer size {}",
            copy.dst_offset,
            dst_size
        );
    }

    let size = if copy.size == BufferCopyDesc::WHOLE_SIZE {
        (src_size - copy.src_offset).min(dst_size - copy.dst_offset)
    } else {
        copy.size
    };

    let alignment = BufferAlignment::COPY_BUFFER_OFFSET;
    if copy.src_offset % alignment != 0 || copy.dst_offset % alignment != 0 || size % alignment != 0 {
        pers_bail!(
            OutOfBounds,
            SOURCE,
            "Copy offsets ({}, {}) and size {} must be multiples of {}",
            copy.src_offset,
            copy.dst_offset,
            size,
            alignment
        );
    }

    if copy.src_offset.checked_add(size).map_or(true, |end| end > src_size) {
        pers_bail!(
            OutOfBounds,
            SOURCE,
            "Copy source range exceeds buffer size ({} + {} > {})",
            copy.src_offset,
            size,
            src_size
        );
    }
    if copy.dst_offset.checked_add(size).map_or(true, |end| end > dst_size) {
        pers_bail!(
            OutOfBounds,
            SOURCE,
            "Copy destination range exceeds buffer size ({} + {} > {})",
            copy.dst_offset,
            size,
            dst_size
        );
    }

    Ok(ResolvedCopy {
        src_offset: copy.src_offset,
        dst_offset: copy.dst_offset,
        size,
    })
}

fn check_endpoint(buffer: &dyn NativeBuffer, role: &str, required: BufferUsage) -> Result<()> {
    match buffer.state() {
        BufferState::Destroyed => {
            pers_bail!(UseAfterDestroy, SOURCE, "Copy {} '{}' is destroyed", role, buffer.debug_name());
        }
        BufferState::Mapped | BufferState::MapPending => {
            pers_bail!(
                MapContention,
                SOURCE,
                "Copy {} '{}' must be unmapped before recording a copy",
                role,
                buffer.debug_name()
            );
        }
        _ => {}
    }
    if !buffer.is_valid() {
        pers_bail!(InvalidResource, SOURCE, "Copy {} '{}' is not a valid buffer", role, buffer.debug_name());
    }
    if !buffer.usage().contains(required) {
        pers_bail!(
            InvalidResource,
            SOURCE,
            "Copy {} '{}' lacks {:?} usage",
            role,
            buffer.debug_name(),
            required
        );
    }
    Ok(())
}

/// Check usage flags and state of both copy endpoints
pub fn validate_copy_endpoints(source: &dyn NativeBuffer, destination: &dyn NativeBuffer) -> Result<()> {
    check_endpoint(source, "source", BufferUsage::COPY_SRC)?;
    check_endpoint(destination, "destination", BufferUsage::COPY_DST)?;
    if source.native_handle() == destination.native_handle() {
        return Err(pers_err!(
            InvalidResource,
            SOURCE,
            "Copy source and destination are the same buffer '{}'",
            source.debug_name()
        ));
    }
    Ok(())
}

/// Validate and record a copy
///
/// # Returns
///
/// Number of bytes recorded (0 when the resolved size is zero; nothing is recorded)
pub fn record_copy(
    encoder: &mut dyn CommandEncoder,
    source: &dyn NativeBuffer,
    destination: &dyn NativeBuffer,
    copy: &BufferCopyDesc,
) -> Result<u64> {
    validate_copy_endpoints(source, destination)?;
    let resolved = resolve_copy(source.size(), destination.size(), copy)?;

    if resolved.size == 0 {
        pers_warn!(
            SOURCE,
            "Nothing to copy from '{}' to '{}'",
            source.debug_name(),
            destination.debug_name()
        );
        return Ok(0);
    }

    encoder
        .copy_buffer_to_buffer(
            source,
            resolved.src_offset,
            destination,
            resolved.dst_offset,
            resolved.size,
        )
        .map_err(|err| match err {
            Error::BackendError(msg) => pers_err!(BackendError, SOURCE, "Copy recording failed: {}", msg),
            other => other,
        })?;

    pers_debug!(
        SOURCE,
        "Recorded copy of {} bytes from '{}' to '{}'",
        resolved.size,
        source.debug_name(),
        destination.debug_name()
    );
    Ok(resolved.size)
}

#[cfg(test)]
#[path = "transfer_tests.rs"]
mod tests;
