use crate::{
    buffers::{create_buffer, Buffer},
    commands::{begin_single_command, end_single_command},
    image::{create_image, transition_image_layout, Image},
    renderer::RenderData,
};

use std::ptr::copy_nonoverlapping as memcpy;

use vulkanalia::prelude::v1_0::*;
use anyhow::Result;

/// Uploads a slice to a device-local buffer through a staging
/// buffer: the payload is memcpy'd into host-visible staging
/// memory, copied to the device-local destination with a
/// one-shot command buffer, and the staging pair is released
/// once the copy has drained.
pub unsafe fn upload_buffer<T>(
    instance: &Instance,
    device: &Device,
    data: &RenderData,
    payload: &[T],
    usage: vk::BufferUsageFlags,
) -> Result<Buffer> {
    let size = std::mem::size_of_val(payload) as u64;

    let mut staging = create_buffer(
        instance,
        device,
        data,
        size,
        vk::BufferUsageFlags::TRANSFER_SRC,
        vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
    )?;

    // Host-coherent memory needs no explicit flush; the write
    // is visible to the device at submission.
    let memory = device.map_memory(staging.memory, 0, size, vk::MemoryMapFlags::empty())?;
    memcpy(payload.as_ptr(), memory.cast(), payload.len());
    device.unmap_memory(staging.memory);

    let buffer = create_buffer(
        instance,
        device,
        data,
        size,
        vk::BufferUsageFlags::TRANSFER_DST | usage,
        vk::MemoryPropertyFlags::DEVICE_LOCAL,
    )?;

    copy_buffer(device, data, &staging, &buffer, size)?;
    staging.destroy(device);

    Ok(buffer)
}

unsafe fn copy_buffer(
    device: &Device,
    data: &RenderData,
    source: &Buffer,
    destination: &Buffer,
    size: vk::DeviceSize,
) -> Result<()> {
    let command_buffer = begin_single_command(device, data)?;

    let region = vk::BufferCopy::builder().size(size);
    device.cmd_copy_buffer(command_buffer, source.buffer, destination.buffer, &[region]);

    end_single_command(device, data, command_buffer)
}

/// Uploads raw RGBA8 pixels to a device-local sampled image:
/// staging copy, transition to the transfer layout, buffer to
/// image copy, transition to the shader-read layout.
pub unsafe fn upload_image(
    instance: &Instance,
    device: &Device,
    data: &RenderData,
    pixels: &[u8],
    width: u32,
    height: u32,
) -> Result<Image> {
    let size = pixels.len() as u64;

    let mut staging = create_buffer(
        instance,
        device,
        data,
        size,
        vk::BufferUsageFlags::TRANSFER_SRC,
        vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
    )?;

    let memory = device.map_memory(staging.memory, 0, size, vk::MemoryMapFlags::empty())?;
    memcpy(pixels.as_ptr(), memory.cast(), pixels.len());
    device.unmap_memory(staging.memory);

    let image = create_image(
        instance,
        device,
        data,
        width,
        height,
        vk::Format::R8G8B8A8_SRGB,
        vk::ImageTiling::OPTIMAL,
        vk::ImageUsageFlags::TRANSFER_DST | vk::ImageUsageFlags::SAMPLED,
        vk::MemoryPropertyFlags::DEVICE_LOCAL,
    )?;

    // A fresh image starts in the undefined layout; it has to
    // pass through the transfer-destination layout to receive
    // the copy, and end in the shader-read layout the sampler
    // expects.
    transition_image_layout(
        device,
        data,
        image.image,
        vk::ImageLayout::UNDEFINED,
        vk::ImageLayout::TRANSFER_DST_OPTIMAL,
    )?;

    copy_buffer_to_image(device, data, staging.buffer, image.image, width, height)?;

    transition_image_layout(
        device,
        data,
        image.image,
        vk::ImageLayout::TRANSFER_DST_OPTIMAL,
        vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
    )?;

    staging.destroy(device);

    Ok(image)
}

unsafe fn copy_buffer_to_image(
    device: &Device,
    data: &RenderData,
    buffer: vk::Buffer,
    image: vk::Image,
    width: u32,
    height: u32,
) -> Result<()> {
    let command_buffer = begin_single_command(device, data)?;

    let subresource = vk::ImageSubresourceLayers::builder()
        .aspect_mask(vk::ImageAspectFlags::COLOR)
        .mip_level(0)
        .base_array_layer(0)
        .layer_count(1);

    // Zero row length and image height mean the buffer rows are
    // tightly packed, which is how the PNG decoder lays the
    // pixels out.
    let region = vk::BufferImageCopy::builder()
        .buffer_offset(0)
        .buffer_row_length(0)
        .buffer_image_height(0)
        .image_subresource(subresource)
        .image_offset(vk::Offset3D { x: 0, y: 0, z: 0 })
        .image_extent(vk::Extent3D { width, height, depth: 1 });

    device.cmd_copy_buffer_to_image(
        command_buffer,
        buffer,
        image,
        vk::ImageLayout::TRANSFER_DST_OPTIMAL,
        &[region],
    );

    end_single_command(device, data, command_buffer)
}
