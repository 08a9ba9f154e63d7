use crate::{
    allocator::find_memory_type,
    commands::{begin_single_command, end_single_command},
    renderer::RenderData,
};

use vulkanalia::prelude::v1_0::*;
use anyhow::{anyhow, Result};

/// A Vulkan image paired with the device memory backing it; the
/// image counterpart of `Buffer`, with the same single-owner,
/// idempotent-destroy contract.
pub struct Image {
    pub image: vk::Image,
    pub memory: vk::DeviceMemory,
}

impl Default for Image {
    fn default() -> Self {
        Self {
            image: vk::Image::null(),
            memory: vk::DeviceMemory::null(),
        }
    }
}

impl Image {
    pub unsafe fn destroy(&mut self, device: &Device) {
        if self.image != vk::Image::null() {
            device.destroy_image(self.image, None);
            self.image = vk::Image::null();
        }

        if self.memory != vk::DeviceMemory::null() {
            device.free_memory(self.memory, None);
            self.memory = vk::DeviceMemory::null();
        }
    }
}

/// Creates a 2D image with bound memory, in the undefined
/// layout. Single mip level, single array layer, one sample:
/// everything this renderer samples is a plain flat texture.
pub unsafe fn create_image(
    instance: &Instance,
    device: &Device,
    data: &RenderData,
    width: u32,
    height: u32,
    format: vk::Format,
    tiling: vk::ImageTiling,
    usage: vk::ImageUsageFlags,
    properties: vk::MemoryPropertyFlags,
) -> Result<Image> {
    let info = vk::ImageCreateInfo::builder()
        .image_type(vk::ImageType::_2D)
        .extent(vk::Extent3D { width, height, depth: 1 })
        .mip_levels(1)
        .array_layers(1)
        .format(format)
        .tiling(tiling)
        .initial_layout(vk::ImageLayout::UNDEFINED)
        .usage(usage)
        .samples(vk::SampleCountFlags::_1)
        .sharing_mode(vk::SharingMode::EXCLUSIVE);

    let image = device.create_image(&info, None)?;

    let requirements = device.get_image_memory_requirements(image);
    let memory_properties = instance.get_physical_device_memory_properties(data.physical_device);

    let memory_info = vk::MemoryAllocateInfo::builder()
        .allocation_size(requirements.size)
        .memory_type_index(find_memory_type(
            &memory_properties,
            requirements.memory_type_bits,
            properties,
        )?);

    let memory = device.allocate_memory(&memory_info, None)?;
    device.bind_image_memory(image, memory, 0)?;

    Ok(Image { image, memory })
}

/// Creates a color view over a single-mip 2D image.
pub unsafe fn create_image_view(
    device: &Device,
    image: vk::Image,
    format: vk::Format,
) -> Result<vk::ImageView> {
    let subresource_range = vk::ImageSubresourceRange::builder()
        .aspect_mask(vk::ImageAspectFlags::COLOR)
        .base_mip_level(0)
        .level_count(1)
        .base_array_layer(0)
        .layer_count(1);

    let info = vk::ImageViewCreateInfo::builder()
        .image(image)
        .view_type(vk::ImageViewType::_2D)
        .format(format)
        .subresource_range(subresource_range);

    Ok(device.create_image_view(&info, None)?)
}

/// The access masks and pipeline stages for a layout
/// transition, keyed on the exact (old, new) layout pair.
///
/// Only the two transitions of the texture upload path are
/// registered; any other pair is a logic error and fails hard
/// rather than guessing at masks that would mask a
/// synchronization bug.
pub fn transition_barrier_masks(
    old_layout: vk::ImageLayout,
    new_layout: vk::ImageLayout,
) -> Result<(
    vk::AccessFlags,
    vk::AccessFlags,
    vk::PipelineStageFlags,
    vk::PipelineStageFlags,
)> {
    match (old_layout, new_layout) {
        // Fresh image to copy destination: nothing to wait for,
        // the transition just has to happen before the transfer
        // write.
        (vk::ImageLayout::UNDEFINED, vk::ImageLayout::TRANSFER_DST_OPTIMAL) => Ok((
            vk::AccessFlags::empty(),
            vk::AccessFlags::TRANSFER_WRITE,
            vk::PipelineStageFlags::TOP_OF_PIPE,
            vk::PipelineStageFlags::TRANSFER,
        )),
        // Copy destination to shader input: the transfer write
        // must complete before any fragment shader read.
        (vk::ImageLayout::TRANSFER_DST_OPTIMAL, vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL) => Ok((
            vk::AccessFlags::TRANSFER_WRITE,
            vk::AccessFlags::SHADER_READ,
            vk::PipelineStageFlags::TRANSFER,
            vk::PipelineStageFlags::FRAGMENT_SHADER,
        )),
        _ => Err(anyhow!("Unsupported layout transition!")),
    }
}

/// Records and submits a one-shot pipeline barrier moving the
/// image between layouts.
pub unsafe fn transition_image_layout(
    device: &Device,
    data: &RenderData,
    image: vk::Image,
    old_layout: vk::ImageLayout,
    new_layout: vk::ImageLayout,
) -> Result<()> {
    let (src_access, dst_access, src_stage, dst_stage) =
        transition_barrier_masks(old_layout, new_layout)?;

    let command_buffer = begin_single_command(device, data)?;

    let subresource_range = vk::ImageSubresourceRange::builder()
        .aspect_mask(vk::ImageAspectFlags::COLOR)
        .base_mip_level(0)
        .level_count(1)
        .base_array_layer(0)
        .layer_count(1);

    // No queue family ownership transfer, only a layout change.
    let barrier = vk::ImageMemoryBarrier::builder()
        .old_layout(old_layout)
        .new_layout(new_layout)
        .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .image(image)
        .subresource_range(subresource_range)
        .src_access_mask(src_access)
        .dst_access_mask(dst_access);

    device.cmd_pipeline_barrier(
        command_buffer,
        src_stage,
        dst_stage,
        vk::DependencyFlags::empty(),
        &[] as &[vk::MemoryBarrier],
        &[] as &[vk::BufferMemoryBarrier],
        &[barrier],
    );

    end_single_command(device, data, command_buffer)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn undefined_to_transfer_dst() {
        let (src_access, dst_access, src_stage, dst_stage) = transition_barrier_masks(
            vk::ImageLayout::UNDEFINED,
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
        ).unwrap();

        assert_eq!(src_access, vk::AccessFlags::empty());
        assert_eq!(dst_access, vk::AccessFlags::TRANSFER_WRITE);
        assert_eq!(src_stage, vk::PipelineStageFlags::TOP_OF_PIPE);
        assert_eq!(dst_stage, vk::PipelineStageFlags::TRANSFER);
    }

    #[test]
    fn transfer_dst_to_shader_read() {
        let (src_access, dst_access, src_stage, dst_stage) = transition_barrier_masks(
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        ).unwrap();

        assert_eq!(src_access, vk::AccessFlags::TRANSFER_WRITE);
        assert_eq!(dst_access, vk::AccessFlags::SHADER_READ);
        assert_eq!(src_stage, vk::PipelineStageFlags::TRANSFER);
        assert_eq!(dst_stage, vk::PipelineStageFlags::FRAGMENT_SHADER);
    }

    #[test]
    fn unregistered_transition_fails() {
        assert!(transition_barrier_masks(
            vk::ImageLayout::UNDEFINED,
            vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        ).is_err());

        // The reverse of a registered pair is not registered.
        assert!(transition_barrier_masks(
            vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
        ).is_err());
    }
}
