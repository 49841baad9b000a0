/// Buffer type model: usage flags, hints, states, descriptors and limits
///
/// Pure value logic with no backend dependency. Descriptor validation never
/// panics; it reports the first violated rule as a reason string.

use bitflags::bitflags;

bitflags! {
    /// Buffer usage flags
    ///
    /// `MAP_READ` / `MAP_WRITE` imply the buffer is host-visible.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct BufferUsage: u32 {
        const VERTEX = 1 << 0;
        const INDEX = 1 << 1;
        const UNIFORM = 1 << 2;
        const STORAGE = 1 << 3;
        const COPY_SRC = 1 << 4;
        const COPY_DST = 1 << 5;
        const MAP_READ = 1 << 6;
        const MAP_WRITE = 1 << 7;
        const INDIRECT = 1 << 8;
        const QUERY_RESOLVE = 1 << 9;
    }
}

impl BufferUsage {
    /// Both map flags
    pub const MAP_ANY: BufferUsage = BufferUsage::MAP_READ.union(BufferUsage::MAP_WRITE);

    /// True if either map flag is present
    pub fn is_host_visible(self) -> bool {
        self.intersects(Self::MAP_ANY)
    }

    /// Strongest offset alignment implied by this usage
    ///
    /// First match wins: uniform, storage, vertex, index, else the default.
    pub fn alignment(self) -> u64 {
        if self.contains(Self::UNIFORM) {
            BufferAlignment::UNIFORM_BUFFER_OFFSET
        } else if self.contains(Self::STORAGE) {
            BufferAlignment::STORAGE_BUFFER_OFFSET
        } else if self.contains(Self::VERTEX) {
            BufferAlignment::VERTEX_BUFFER_OFFSET
        } else if self.contains(Self::INDEX) {
            BufferAlignment::INDEX_BUFFER_OFFSET
        } else {
            BufferAlignment::DEFAULT
        }
    }
}

/// Memory placement hint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MemoryLocation {
    /// Let the backend decide
    #[default]
    Auto,
    /// GPU RAM, not CPU addressable
    DeviceLocal,
    /// CPU-writable, GPU-readable
    HostVisible,
    /// CPU-readable, GPU-writable
    HostCached,
    /// Shared memory on integrated GPUs
    Unified,
}

/// Update frequency hint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AccessPattern {
    /// Written once
    #[default]
    Static,
    /// Updated per scene
    Dynamic,
    /// Updated per frame
    Stream,
    /// Transient transfer source or destination
    Staging,
}

/// Buffer lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BufferState {
    #[default]
    Uninitialized,
    Ready,
    Mapped,
    MapPending,
    Destroyed,
}

/// CPU access requested by a map operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MapMode {
    #[default]
    None,
    Read,
    Write,
    ReadWrite,
}

impl MapMode {
    /// Usage flags a buffer needs to be mapped with this mode
    pub fn required_usage(self) -> BufferUsage {
        match self {
            MapMode::None => BufferUsage::empty(),
            MapMode::Read => BufferUsage::MAP_READ,
            MapMode::Write => BufferUsage::MAP_WRITE,
            MapMode::ReadWrite => BufferUsage::MAP_ANY,
        }
    }
}

/// Alignment constants (minimums; a backend may require more)
pub struct BufferAlignment;

impl BufferAlignment {
    pub const UNIFORM_BUFFER_OFFSET: u64 = 256;
    pub const STORAGE_BUFFER_OFFSET: u64 = 256;
    pub const VERTEX_BUFFER_OFFSET: u64 = 4;
    pub const INDEX_BUFFER_OFFSET: u64 = 4;
    pub const COPY_BUFFER_OFFSET: u64 = 4;
    pub const DYNAMIC_OFFSET: u64 = 256;
    pub const DEFAULT: u64 = 16;
    /// Map offsets must be multiples of this
    pub const MAP_OFFSET: u64 = 8;
    /// Map sizes must be multiples of this
    pub const MAP_SIZE: u64 = 4;
}

/// Size limits
pub struct BufferLimits;

impl BufferLimits {
    /// 2 GiB
    pub const MAX_BUFFER_SIZE: u64 = 2_147_483_648;
    /// 64 KiB
    pub const MAX_UNIFORM_BUFFER_SIZE: u64 = 65_536;
    /// 128 MiB
    pub const MAX_STORAGE_BUFFER_SIZE: u64 = 134_217_728;
    pub const MAX_VERTEX_ATTRIBUTES: u32 = 32;
    pub const MAX_VERTEX_BUFFER_STRIDE: u32 = 2048;
}

/// Round `size` up to a multiple of `alignment` (alignment 0 leaves it unchanged)
pub fn align_up(size: u64, alignment: u64) -> u64 {
    if alignment == 0 {
        return size;
    }
    size.div_ceil(alignment).saturating_mul(alignment)
}

/// Descriptor for creating a buffer
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BufferDesc {
    /// Size in bytes
    pub size: u64,
    /// Usage flags
    pub usage: BufferUsage,
    /// Placement hint
    pub memory_location: MemoryLocation,
    /// Update frequency hint
    pub access_pattern: AccessPattern,
    /// Create the buffer already mapped for writing
    pub mapped_at_creation: bool,
    /// Label propagated verbatim to the backend
    pub debug_name: String,
}

impl BufferDesc {
    /// Descriptor with default hints
    pub fn new(size: u64, usage: BufferUsage) -> Self {
        Self {
            size,
            usage,
            ..Default::default()
        }
    }

    pub fn with_debug_name(mut self, name: impl Into<String>) -> Self {
        self.debug_name = name.into();
        self
    }

    pub fn with_memory_location(mut self, location: MemoryLocation) -> Self {
        self.memory_location = location;
        self
    }

    pub fn with_access_pattern(mut self, pattern: AccessPattern) -> Self {
        self.access_pattern = pattern;
        self
    }

    pub fn with_mapped_at_creation(mut self, mapped: bool) -> Self {
        self.mapped_at_creation = mapped;
        self
    }

    /// First violated rule, if any
    pub fn validation_error(&self) -> Option<String> {
        if self.size == 0 {
            return Some("size must be greater than zero".to_string());
        }
        if self.size > BufferLimits::MAX_BUFFER_SIZE {
            return Some(format!(
                "size {} exceeds the maximum buffer size {}",
                self.size,
                BufferLimits::MAX_BUFFER_SIZE
            ));
        }
        if self.usage.is_empty() {
            return Some("usage must not be empty".to_string());
        }
        if self.usage.contains(BufferUsage::UNIFORM)
            && self.size > BufferLimits::MAX_UNIFORM_BUFFER_SIZE
        {
            return Some(format!(
                "uniform buffer size {} exceeds {}",
                self.size,
                BufferLimits::MAX_UNIFORM_BUFFER_SIZE
            ));
        }
        if self.usage.contains(BufferUsage::STORAGE)
            && self.size > BufferLimits::MAX_STORAGE_BUFFER_SIZE
        {
            return Some(format!(
                "storage buffer size {} exceeds {}",
                self.size,
                BufferLimits::MAX_STORAGE_BUFFER_SIZE
            ));
        }
        if self.mapped_at_creation
            && !self.usage.intersects(BufferUsage::MAP_WRITE | BufferUsage::COPY_SRC)
        {
            return Some("mapped_at_creation requires MAP_WRITE or COPY_SRC usage".to_string());
        }
        None
    }

    pub fn is_valid(&self) -> bool {
        self.validation_error().is_none()
    }

    /// `size` rounded up to the alignment implied by `usage`
    pub fn aligned_size(&self, usage: BufferUsage) -> u64 {
        align_up(self.size, usage.alignment())
    }

    /// Usage after memory hints are applied
    ///
    /// HostVisible / HostCached add a map flag when none is present, DeviceLocal
    /// strips both map flags, Auto and Unified leave usage unchanged.
    pub fn translated_usage(&self) -> BufferUsage {
        match self.memory_location {
            MemoryLocation::Auto | MemoryLocation::Unified => self.usage,
            MemoryLocation::DeviceLocal => self.usage - BufferUsage::MAP_ANY,
            MemoryLocation::HostVisible => {
                if self.usage.is_host_visible() {
                    self.usage
                } else {
                    self.usage | BufferUsage::MAP_WRITE
                }
            }
            MemoryLocation::HostCached => {
                if self.usage.is_host_visible() {
                    self.usage
                } else {
                    self.usage | BufferUsage::MAP_READ
                }
            }
        }
    }

    /// Descriptor as handed to a backend: translated usage, aligned size
    pub fn to_backend(&self) -> BufferDesc {
        let usage = self.translated_usage();
        let size = align_up(
            self.aligned_size(self.usage),
            BufferAlignment::COPY_BUFFER_OFFSET,
        );
        BufferDesc {
            size,
            usage,
            ..self.clone()
        }
    }
}

/// Region of a buffer-to-buffer copy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferCopyDesc {
    pub src_offset: u64,
    pub dst_offset: u64,
    /// Bytes to copy, or `WHOLE_SIZE`
    pub size: u64,
}

impl BufferCopyDesc {
    /// Copy as much as both buffers allow
    pub const WHOLE_SIZE: u64 = u64::MAX;

    pub fn new(src_offset: u64, dst_offset: u64, size: u64) -> Self {
        Self { src_offset, dst_offset, size }
    }

    /// Whole-size copy between offset 0 of both buffers
    pub fn whole() -> Self {
        Self::new(0, 0, Self::WHOLE_SIZE)
    }
}

impl Default for BufferCopyDesc {
    fn default() -> Self {
        Self::whole()
    }
}

/// Byte range of a map request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferMapRange {
    pub offset: u64,
    /// Bytes to map, or `WHOLE_BUFFER`
    pub size: u64,
}

impl BufferMapRange {
    /// Map up to the end of the buffer
    pub const WHOLE_BUFFER: u64 = u64::MAX;

    pub fn new(offset: u64, size: u64) -> Self {
        Self { offset, size }
    }

    pub fn whole() -> Self {
        Self::new(0, Self::WHOLE_BUFFER)
    }

    /// Resolve against a buffer of `buffer_size` bytes
    ///
    /// Returns the concrete `(offset, size)` or the reason the range is unusable.
    pub fn resolve(&self, buffer_size: u64) -> Result<(u64, u64), String> {
        if self.offset > buffer_size {
            return Err(format!(
                "map offset {} is past the buffer end {}",
                self.offset, buffer_size
            ));
        }
        let size = if self.size == Self::WHOLE_BUFFER {
            buffer_size - self.offset
        } else {
            self.size
        };
        if self.offset % BufferAlignment::MAP_OFFSET != 0 {
            return Err(format!(
                "map offset {} is not a multiple of {}",
                self.offset,
                BufferAlignment::MAP_OFFSET
            ));
        }
        if size % BufferAlignment::MAP_SIZE != 0 {
            return Err(format!(
                "map size {} is not a multiple of {}",
                size,
                BufferAlignment::MAP_SIZE
            ));
        }
        match self.offset.checked_add(size) {
            Some(end) if end <= buffer_size => Ok((self.offset, size)),
            _ => Err(format!(
                "map range {}+{} exceeds buffer size {}",
                self.offset, size, buffer_size
            )),
        }
    }
}

impl Default for BufferMapRange {
    fn default() -> Self {
        Self::whole()
    }
}

#[cfg(test)]
#[path = "buffer_types_tests.rs"]
mod tests;
