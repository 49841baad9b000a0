//! Unit tests for buffer_types.rs
//!
//! Tests usage flag arithmetic, descriptor validation, alignment and range resolution.

use super::*;

// ============================================================================
// USAGE FLAG TESTS
// ============================================================================

#[test]
fn test_usage_bit_values() {
    assert_eq!(BufferUsage::VERTEX.bits(), 1);
    assert_eq!(BufferUsage::COPY_SRC.bits(), 1 << 4);
    assert_eq!(BufferUsage::MAP_WRITE.bits(), 1 << 7);
    assert_eq!(BufferUsage::QUERY_RESOLVE.bits(), 1 << 9);
}

#[test]
fn test_usage_union_intersection_membership() {
    let usage = BufferUsage::VERTEX | BufferUsage::COPY_DST;
    assert!(usage.contains(BufferUsage::VERTEX));
    assert!(usage.contains(BufferUsage::COPY_DST));
    assert!(!usage.contains(BufferUsage::INDEX));
    assert_eq!(usage & BufferUsage::COPY_DST, BufferUsage::COPY_DST);
    assert!(BufferUsage::default().is_empty());
}

#[test]
fn test_usage_host_visibility() {
    assert!(BufferUsage::MAP_READ.is_host_visible());
    assert!((BufferUsage::MAP_WRITE | BufferUsage::COPY_SRC).is_host_visible());
    assert!(!(BufferUsage::STORAGE | BufferUsage::COPY_DST).is_host_visible());
}

#[test]
fn test_usage_alignment_first_match_wins() {
    assert_eq!(BufferUsage::UNIFORM.alignment(), 256);
    assert_eq!((BufferUsage::UNIFORM | BufferUsage::VERTEX).alignment(), 256);
    assert_eq!(BufferUsage::STORAGE.alignment(), 256);
    assert_eq!(BufferUsage::VERTEX.alignment(), 4);
    assert_eq!(BufferUsage::INDEX.alignment(), 4);
    assert_eq!(BufferUsage::COPY_SRC.alignment(), 16);
}

#[test]
fn test_map_mode_required_usage() {
    assert_eq!(MapMode::Read.required_usage(), BufferUsage::MAP_READ);
    assert_eq!(MapMode::Write.required_usage(), BufferUsage::MAP_WRITE);
    assert_eq!(MapMode::ReadWrite.required_usage(), BufferUsage::MAP_ANY);
    assert!(MapMode::None.required_usage().is_empty());
}

// ============================================================================
// DESCRIPTOR VALIDATION TESTS
// ============================================================================

#[test]
fn test_valid_descriptor() {
    let desc = BufferDesc::new(64, BufferUsage::VERTEX);
    assert!(desc.is_valid());
    assert_eq!(desc.memory_location, MemoryLocation::Auto);
    assert_eq!(desc.access_pattern, AccessPattern::Static);
    assert!(!desc.mapped_at_creation);
}

#[test]
fn test_zero_size_rejected() {
    let desc = BufferDesc::new(0, BufferUsage::VERTEX);
    assert!(!desc.is_valid());
    assert!(desc.validation_error().unwrap().contains("size"));
}

#[test]
fn test_empty_usage_rejected() {
    let desc = BufferDesc::new(16, BufferUsage::empty());
    assert!(!desc.is_valid());
    assert!(desc.validation_error().unwrap().contains("usage"));
}

#[test]
fn test_max_buffer_size_boundary() {
    assert!(BufferDesc::new(BufferLimits::MAX_BUFFER_SIZE, BufferUsage::COPY_DST).is_valid());
    assert!(!BufferDesc::new(BufferLimits::MAX_BUFFER_SIZE + 1, BufferUsage::COPY_DST).is_valid());
}

#[test]
fn test_uniform_size_boundary() {
    assert!(BufferDesc::new(65_536, BufferUsage::UNIFORM).is_valid());
    let over = BufferDesc::new(65_537, BufferUsage::UNIFORM);
    assert!(!over.is_valid());
    assert!(over.validation_error().unwrap().contains("uniform"));
}

#[test]
fn test_storage_size_boundary() {
    assert!(BufferDesc::new(BufferLimits::MAX_STORAGE_BUFFER_SIZE, BufferUsage::STORAGE).is_valid());
    assert!(!BufferDesc::new(BufferLimits::MAX_STORAGE_BUFFER_SIZE + 1, BufferUsage::STORAGE).is_valid());
}

#[test]
fn test_mapped_at_creation_requires_write_path() {
    let bad = BufferDesc::new(64, BufferUsage::VERTEX).with_mapped_at_creation(true);
    assert!(!bad.is_valid());

    let via_copy = BufferDesc::new(64, BufferUsage::COPY_SRC).with_mapped_at_creation(true);
    assert!(via_copy.is_valid());

    let via_map = BufferDesc::new(64, BufferUsage::MAP_WRITE).with_mapped_at_creation(true);
    assert!(via_map.is_valid());
}

#[test]
fn test_size_checked_before_usage() {
    let desc = BufferDesc::new(0, BufferUsage::empty());
    assert!(desc.validation_error().unwrap().contains("size"));
}

// ============================================================================
// ALIGNMENT TESTS
// ============================================================================

#[test]
fn test_aligned_size() {
    let desc = BufferDesc::new(100, BufferUsage::UNIFORM);
    assert_eq!(desc.aligned_size(BufferUsage::UNIFORM), 256);
    assert_eq!(desc.aligned_size(BufferUsage::VERTEX), 100);
    assert_eq!(desc.aligned_size(BufferUsage::COPY_DST), 112);

    let exact = BufferDesc::new(512, BufferUsage::STORAGE);
    assert_eq!(exact.aligned_size(BufferUsage::STORAGE), 512);
}

#[test]
fn test_align_up() {
    assert_eq!(align_up(0, 4), 0);
    assert_eq!(align_up(1, 4), 4);
    assert_eq!(align_up(8, 4), 8);
    assert_eq!(align_up(7, 0), 7);
}

// ============================================================================
// USAGE TRANSLATION TESTS
// ============================================================================

#[test]
fn test_translation_device_local_strips_map_flags() {
    let desc = BufferDesc::new(64, BufferUsage::VERTEX | BufferUsage::MAP_WRITE)
        .with_memory_location(MemoryLocation::DeviceLocal);
    assert_eq!(desc.translated_usage(), BufferUsage::VERTEX);
}

#[test]
fn test_translation_host_hints_add_map_flag() {
    let visible = BufferDesc::new(64, BufferUsage::COPY_SRC)
        .with_memory_location(MemoryLocation::HostVisible);
    assert_eq!(visible.translated_usage(), BufferUsage::COPY_SRC | BufferUsage::MAP_WRITE);

    let cached = BufferDesc::new(64, BufferUsage::COPY_DST)
        .with_memory_location(MemoryLocation::HostCached);
    assert_eq!(cached.translated_usage(), BufferUsage::COPY_DST | BufferUsage::MAP_READ);

    let already = BufferDesc::new(64, BufferUsage::MAP_READ | BufferUsage::COPY_DST)
        .with_memory_location(MemoryLocation::HostVisible);
    assert_eq!(already.translated_usage(), BufferUsage::MAP_READ | BufferUsage::COPY_DST);
}

#[test]
fn test_translation_auto_unchanged() {
    let desc = BufferDesc::new(64, BufferUsage::STORAGE | BufferUsage::MAP_READ);
    assert_eq!(desc.translated_usage(), desc.usage);
}

#[test]
fn test_to_backend_aligns_and_keeps_label() {
    let desc = BufferDesc::new(10, BufferUsage::UNIFORM).with_debug_name("camera");
    let backend = desc.to_backend();
    assert_eq!(backend.size, 256);
    assert_eq!(backend.debug_name, "camera");

    let vertex = BufferDesc::new(6, BufferUsage::VERTEX).to_backend();
    assert_eq!(vertex.size, 8);
}

// ============================================================================
// COPY / MAP RANGE TESTS
// ============================================================================

#[test]
fn test_copy_desc_defaults_to_whole() {
    let copy = BufferCopyDesc::default();
    assert_eq!(copy.src_offset, 0);
    assert_eq!(copy.dst_offset, 0);
    assert_eq!(copy.size, BufferCopyDesc::WHOLE_SIZE);
}

#[test]
fn test_map_range_resolve_whole() {
    assert_eq!(BufferMapRange::whole().resolve(64), Ok((0, 64)));
    assert_eq!(BufferMapRange::new(16, BufferMapRange::WHOLE_BUFFER).resolve(64), Ok((16, 48)));
}

#[test]
fn test_map_range_resolve_explicit() {
    assert_eq!(BufferMapRange::new(0, 16).resolve(16), Ok((0, 16)));
    assert!(BufferMapRange::new(8, 64).resolve(64).is_err());
    assert!(BufferMapRange::new(72, 4).resolve(64).is_err());
}

#[test]
fn test_map_range_alignment() {
    assert!(BufferMapRange::new(4, 8).resolve(64).is_err());
    assert!(BufferMapRange::new(8, 6).resolve(64).is_err());
}
