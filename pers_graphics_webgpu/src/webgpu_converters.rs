/// Conversions between pers buffer types and wgpu types

use pers_graphics::pers::buffers::{BufferDesc, BufferUsage, MapMode};
use pers_graphics::pers::BackendLimits;

/// Translate usage flags bit by bit
pub(crate) fn usage_to_wgpu(usage: BufferUsage) -> wgpu::BufferUsages {
    const PAIRS: [(BufferUsage, wgpu::BufferUsages); 10] = [
        (BufferUsage::VERTEX, wgpu::BufferUsages::VERTEX),
        (BufferUsage::INDEX, wgpu::BufferUsages::INDEX),
        (BufferUsage::UNIFORM, wgpu::BufferUsages::UNIFORM),
        (BufferUsage::STORAGE, wgpu::BufferUsages::STORAGE),
        (BufferUsage::COPY_SRC, wgpu::BufferUsages::COPY_SRC),
        (BufferUsage::COPY_DST, wgpu::BufferUsages::COPY_DST),
        (BufferUsage::MAP_READ, wgpu::BufferUsages::MAP_READ),
        (BufferUsage::MAP_WRITE, wgpu::BufferUsages::MAP_WRITE),
        (BufferUsage::INDIRECT, wgpu::BufferUsages::INDIRECT),
        (BufferUsage::QUERY_RESOLVE, wgpu::BufferUsages::QUERY_RESOLVE),
    ];

    PAIRS
        .iter()
        .filter(|(pers, _)| usage.contains(*pers))
        .fold(wgpu::BufferUsages::empty(), |acc, (_, wgpu)| acc | *wgpu)
}

/// wgpu map mode for a pers map mode
///
/// wgpu maps in exactly one direction, so `None` and `ReadWrite` have no
/// counterpart.
pub(crate) fn map_mode_to_wgpu(mode: MapMode) -> Option<wgpu::MapMode> {
    match mode {
        MapMode::Read => Some(wgpu::MapMode::Read),
        MapMode::Write => Some(wgpu::MapMode::Write),
        MapMode::None | MapMode::ReadWrite => None,
    }
}

pub(crate) fn limits_from_wgpu(limits: &wgpu::Limits) -> BackendLimits {
    BackendLimits {
        max_buffer_size: limits.max_buffer_size,
        max_uniform_buffer_binding_size: limits.max_uniform_buffer_binding_size as u64,
        max_storage_buffer_binding_size: limits.max_storage_buffer_binding_size as u64,
        min_uniform_buffer_offset_alignment: limits.min_uniform_buffer_offset_alignment as u64,
        min_storage_buffer_offset_alignment: limits.min_storage_buffer_offset_alignment as u64,
    }
}

/// Reason wgpu would reject `desc`, checked before creation
///
/// Without `MAPPABLE_PRIMARY_BUFFERS`, MAP_READ may only be combined with
/// COPY_DST and MAP_WRITE only with COPY_SRC.
pub(crate) fn creation_error(desc: &BufferDesc, features: wgpu::Features, limits: &BackendLimits) -> Option<String> {
    if desc.size > limits.max_buffer_size {
        return Some(format!(
            "size {} exceeds the device limit {}",
            desc.size, limits.max_buffer_size
        ));
    }
    if features.contains(wgpu::Features::MAPPABLE_PRIMARY_BUFFERS) {
        return None;
    }
    let usage = desc.usage;
    if usage.contains(BufferUsage::MAP_ANY) {
        return Some("MAP_READ and MAP_WRITE together need MAPPABLE_PRIMARY_BUFFERS".to_string());
    }
    if usage.contains(BufferUsage::MAP_READ) && !(usage - BufferUsage::MAP_READ - BufferUsage::COPY_DST).is_empty() {
        return Some(format!("MAP_READ only combines with COPY_DST, got {:?}", usage));
    }
    if usage.contains(BufferUsage::MAP_WRITE) && !(usage - BufferUsage::MAP_WRITE - BufferUsage::COPY_SRC).is_empty() {
        return Some(format!("MAP_WRITE only combines with COPY_SRC, got {:?}", usage));
    }
    None
}

pub(crate) fn label(desc: &BufferDesc) -> Option<&str> {
    if desc.debug_name.is_empty() { None } else { Some(desc.debug_name.as_str()) }
}

#[cfg(test)]
#[path = "webgpu_converters_tests.rs"]
mod tests;
