use crate::{allocator::find_memory_type, renderer::RenderData};

use vulkanalia::prelude::v1_0::*;
use anyhow::Result;

/// A Vulkan buffer paired with the device memory backing it. The
/// two are created together, bound together, and released
/// together; the pair has a single owner and is moved, never
/// cloned.
pub struct Buffer {
    pub buffer: vk::Buffer,
    pub memory: vk::DeviceMemory,
}

impl Default for Buffer {
    fn default() -> Self {
        Self {
            buffer: vk::Buffer::null(),
            memory: vk::DeviceMemory::null(),
        }
    }
}

impl Buffer {
    /// Releases the buffer and its memory. Safe to call more
    /// than once: the handles are nulled after release and null
    /// handles are skipped.
    pub unsafe fn destroy(&mut self, device: &Device) {
        if self.buffer != vk::Buffer::null() {
            device.destroy_buffer(self.buffer, None);
            self.buffer = vk::Buffer::null();
        }

        if self.memory != vk::DeviceMemory::null() {
            device.free_memory(self.memory, None);
            self.memory = vk::DeviceMemory::null();
        }
    }
}

/// Creates a buffer of the given size and usage, allocates
/// memory with the requested properties for it, and binds the
/// two. One allocation per buffer is wasteful at scale, but
/// this application only ever creates a handful.
pub unsafe fn create_buffer(
    instance: &Instance,
    device: &Device,
    data: &RenderData,
    size: vk::DeviceSize,
    usage: vk::BufferUsageFlags,
    properties: vk::MemoryPropertyFlags,
) -> Result<Buffer> {
    // All buffers are used from the graphics queue only (even
    // transfer copies go through it), so exclusive sharing is
    // always correct here.
    let buffer_info = vk::BufferCreateInfo::builder()
        .size(size)
        .usage(usage)
        .sharing_mode(vk::SharingMode::EXCLUSIVE);

    let buffer = device.create_buffer(&buffer_info, None)?;

    // The driver reports the actual size and alignment
    // constraints plus the memory types able to back this
    // buffer; the allocator picks a concrete type from those.
    let requirements = device.get_buffer_memory_requirements(buffer);
    let memory_properties = instance.get_physical_device_memory_properties(data.physical_device);

    let memory_info = vk::MemoryAllocateInfo::builder()
        .allocation_size(requirements.size)
        .memory_type_index(find_memory_type(
            &memory_properties,
            requirements.memory_type_bits,
            properties,
        )?);

    let memory = device.allocate_memory(&memory_info, None)?;
    device.bind_buffer_memory(buffer, memory, 0)?;

    Ok(Buffer { buffer, memory })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_buffer_is_null() {
        let buffer = Buffer::default();
        assert_eq!(buffer.buffer, vk::Buffer::null());
        assert_eq!(buffer.memory, vk::DeviceMemory::null());
    }
}
