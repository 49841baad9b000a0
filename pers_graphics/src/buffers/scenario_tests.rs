//! End-to-end buffer scenarios against the mock device
//!
//! Vertex upload, readback, descriptor rejection, uniform overflow, ring
//! rotation and map contention, plus the full staging round trip.

use crate::buffers::*;
use crate::error::Error;
use crate::graphics_device::mock_graphics_device::MockGraphicsDevice;
use crate::graphics_device::LogicalDevice;
use crate::log::LogSeverity;
use crate::test_logger::CapturedLogs;
use glam::Vec4;
use serial_test::serial;

// ============================================================================
// S1 VERTEX UPLOAD
// ============================================================================

#[test]
fn test_vertex_upload() {
    let device = MockGraphicsDevice::new();
    let factory = device.buffer_factory();
    let vertices = factory.create_device_buffer(&BufferDesc::new(64, BufferUsage::VERTEX)).unwrap();
    let mut staging = factory
        .create_immediate_staging_buffer(&BufferDesc::new(64, BufferUsage::COPY_SRC | BufferUsage::MAP_WRITE))
        .unwrap();
    let values: Vec<f32> = (0..16).map(|i| i as f32 * 0.1).collect();

    staging.write(&values, 0).unwrap();
    staging.finalize();
    let mut encoder = device.create_command_encoder(Some("upload")).unwrap();
    staging
        .upload_to(encoder.as_mut(), &vertices, &BufferCopyDesc::new(0, 0, 64))
        .unwrap();
    device.submit(encoder).unwrap();

    assert_eq!(vertices.size(), 64);
    assert!(vertices.usage().contains(BufferUsage::VERTEX | BufferUsage::COPY_DST));
    let contents = MockGraphicsDevice::read_native(vertices.native());
    assert_eq!(contents, bytemuck::cast_slice::<f32, u8>(&values));
}

// ============================================================================
// S2 READBACK
// ============================================================================

#[test]
fn test_readback() {
    let device = MockGraphicsDevice::new();
    let factory = device.buffer_factory();
    let pattern: Vec<u8> = (0x00u8..0x10).collect();
    let source = factory
        .create_immediate_device_buffer(
            &BufferDesc::new(16, BufferUsage::COPY_SRC | BufferUsage::STORAGE),
            &pattern,
        )
        .unwrap();
    let mut readback = factory
        .create_deferred_staging_buffer(&BufferDesc::new(16, BufferUsage::empty()), MapMode::Read)
        .unwrap();

    let mut encoder = device.create_command_encoder(Some("readback")).unwrap();
    readback
        .download_from(encoder.as_mut(), &source, &BufferCopyDesc::new(0, 0, 16))
        .unwrap();
    device.submit(encoder).unwrap();

    let mapping = readback.map_async(MapMode::Read, BufferMapRange::new(0, 16)).wait();
    assert_eq!(&mapping.as_slice()[..16], &pattern[..]);
}

// ============================================================================
// S3 / S4 REJECTION
// ============================================================================

#[test]
#[serial]
fn test_invalid_descriptor_rejected_and_logged() {
    let logs = CapturedLogs::install();
    let device = MockGraphicsDevice::new();

    let result = device.buffer_factory().create_buffer(&BufferDesc::new(0, BufferUsage::VERTEX));

    assert!(matches!(result, Err(Error::InvalidDescriptor(_))));
    assert!(logs.contains(LogSeverity::Error, "invalid"));
}

#[test]
fn test_uniform_overflow_rejected() {
    let device = MockGraphicsDevice::new();

    let result = device
        .buffer_factory()
        .create_buffer(&BufferDesc::new(65_537, BufferUsage::UNIFORM));

    assert!(matches!(result, Err(Error::InvalidDescriptor(_))));
}

// ============================================================================
// S5 RING ROTATION
// ============================================================================

#[test]
fn test_ring_rotation() {
    let device = MockGraphicsDevice::new();
    let mut ring = device
        .buffer_factory()
        .create_dynamic_buffer(&BufferDesc::new(256, BufferUsage::UNIFORM), 3)
        .unwrap();
    let patterns: Vec<Vec<Vec4>> = (0..3)
        .map(|p| vec![Vec4::splat(p as f32 + 1.0); 16])
        .collect();

    for _cycle in 0..3 {
        for pattern in &patterns {
            let handle = ring.begin_update().unwrap();
            ring.write(&handle, pattern, 0).unwrap();
            ring.end_update(handle).unwrap();
            ring.next_frame();
        }
    }

    assert_eq!(ring.current_frame_index(), 0);
    for (index, pattern) in patterns.iter().enumerate() {
        let slot = ring.frame_buffer(index as u32).unwrap();
        let contents = MockGraphicsDevice::read_native(slot.as_native());
        assert_eq!(contents, bytemuck::cast_slice::<Vec4, u8>(pattern));
    }
}

// ============================================================================
// S6 MAP CONTENTION
// ============================================================================

#[test]
#[serial]
fn test_map_contention() {
    let logs = CapturedLogs::install();
    let device = MockGraphicsDevice::new();
    let buffer = device
        .buffer_factory()
        .create_mappable_buffer(&BufferDesc::new(64, BufferUsage::COPY_DST))
        .unwrap();

    let first = buffer.map_async(MapMode::Write, BufferMapRange::whole()).wait();
    let second = buffer.map_async(MapMode::Write, BufferMapRange::whole()).wait();

    assert_eq!(second.data(), first.data());
    assert!(!second.is_owner());
    assert!(buffer.is_mapped());
    assert!(logs.contains(LogSeverity::Warn, "already mapped"));

    drop(second);
    assert!(buffer.is_mapped());
    buffer.unmap();
    assert_eq!(buffer.state(), BufferState::Ready);
    assert!(!first.is_live());
}

// ============================================================================
// ROUND TRIP
// ============================================================================

#[test]
fn test_staging_device_readback_round_trip() {
    let device = MockGraphicsDevice::new();
    let factory = device.buffer_factory();

    for len in [4usize, 20, 64] {
        let bytes: Vec<u8> = (0..len).map(|i| (i * 7 + 3) as u8).collect();
        let mut staging = factory
            .create_immediate_staging_buffer(&BufferDesc::new(64, BufferUsage::MAP_WRITE))
            .unwrap();
        let mut target = factory.create_device_buffer(&BufferDesc::new(64, BufferUsage::COPY_SRC)).unwrap();
        let mut readback = factory
            .create_deferred_staging_buffer(&BufferDesc::new(64, BufferUsage::empty()), MapMode::Read)
            .unwrap();

        staging.write_bytes(&bytes, 0).unwrap();
        staging.finalize();
        let mut encoder = device.create_command_encoder(None).unwrap();
        target.copy_from(encoder.as_mut(), &staging, &BufferCopyDesc::whole()).unwrap();
        readback.download_from(encoder.as_mut(), &target, &BufferCopyDesc::whole()).unwrap();
        device.submit(encoder).unwrap();

        readback.request_map(BufferMapRange::whole()).unwrap();
        let mut out = vec![0u8; len];
        readback.read_bytes(&mut out, 0).unwrap();
        assert_eq!(out, bytes);
    }
}

#[test]
fn test_unmap_k_times_equals_once() {
    let device = MockGraphicsDevice::new();
    device.backend().set_spontaneous_maps(true);
    let buffer = device
        .buffer_factory()
        .create_mappable_buffer(&BufferDesc::new(32, BufferUsage::COPY_SRC))
        .unwrap();
    let mapping = buffer.map_async(MapMode::Read, BufferMapRange::whole()).wait();
    assert!(!mapping.is_null());

    for _ in 0..5 {
        buffer.unmap();
    }

    assert_eq!(buffer.state(), BufferState::Ready);
    assert!(!mapping.is_live());
}
