use crate::{queues::QueueFamilyIndices, renderer::RenderData, vertex::INDICES};

use vulkanalia::prelude::v1_0::*;
use anyhow::Result;
use log::*;

/// Creates the two command pools: the main pool holding the
/// long-lived, pre-recorded rendering command buffers, and a
/// transient pool for the short-lived one-shot transfer
/// commands, flagged so the driver can optimize for quick
/// allocation and release.
pub unsafe fn create_command_pools(
    instance: &Instance,
    device: &Device,
    data: &mut RenderData,
) -> Result<()> {
    let indices = QueueFamilyIndices::get(instance, data, data.physical_device)?;

    let info = vk::CommandPoolCreateInfo::builder()
        .flags(vk::CommandPoolCreateFlags::empty())
        .queue_family_index(indices.graphics);

    data.command_pool = device.create_command_pool(&info, None)?;

    let transient_info = vk::CommandPoolCreateInfo::builder()
        .flags(vk::CommandPoolCreateFlags::TRANSIENT)
        .queue_family_index(indices.graphics);

    data.transient_pool = device.create_command_pool(&transient_info, None)?;

    info!("Command pools created.");
    Ok(())
}

/// Allocates one primary command buffer per presentable image
/// and records all of them once. The scene is static, so the
/// commands never change after this; only the uniform buffers
/// they read are rewritten between frames.
pub unsafe fn create_command_buffers(device: &Device, data: &mut RenderData) -> Result<()> {
    let allocate_info = vk::CommandBufferAllocateInfo::builder()
        .command_pool(data.command_pool)
        .level(vk::CommandBufferLevel::PRIMARY)
        .command_buffer_count(data.framebuffers.len() as u32);

    data.command_buffers = device.allocate_command_buffers(&allocate_info)?;

    for (i, command_buffer) in data.command_buffers.iter().enumerate() {
        let begin_info = vk::CommandBufferBeginInfo::builder();
        device.begin_command_buffer(*command_buffer, &begin_info)?;

        let render_area = vk::Rect2D {
            offset: vk::Offset2D { x: 0, y: 0 },
            extent: data.swapchain_extent,
        };

        let clear_value = vk::ClearValue {
            color: vk::ClearColorValue {
                float32: [0.0, 0.0, 0.0, 1.0],
            },
        };

        let clear_values = &[clear_value];
        let render_pass_info = vk::RenderPassBeginInfo::builder()
            .render_pass(data.render_pass)
            .framebuffer(data.framebuffers[i])
            .render_area(render_area)
            .clear_values(clear_values);

        device.cmd_begin_render_pass(
            *command_buffer,
            &render_pass_info,
            vk::SubpassContents::INLINE,
        );

        device.cmd_bind_pipeline(
            *command_buffer,
            vk::PipelineBindPoint::GRAPHICS,
            data.pipeline,
        );

        device.cmd_bind_vertex_buffers(*command_buffer, 0, &[data.vertex_buffer.buffer], &[0]);
        device.cmd_bind_index_buffer(
            *command_buffer,
            data.index_buffer.buffer,
            0,
            vk::IndexType::UINT32,
        );

        // Each command buffer binds the descriptor set of its
        // own image index, so each in-flight frame reads its
        // own uniform buffer.
        device.cmd_bind_descriptor_sets(
            *command_buffer,
            vk::PipelineBindPoint::GRAPHICS,
            data.pipeline_layout,
            0,
            &[data.descriptor_sets[i]],
            &[],
        );

        device.cmd_draw_indexed(*command_buffer, INDICES.len() as u32, 1, 0, 0, 0);

        device.cmd_end_render_pass(*command_buffer);
        device.end_command_buffer(*command_buffer)?;
    }

    info!("Command buffers recorded.");
    Ok(())
}

/// Allocates and begins a one-shot command buffer on the
/// transient pool.
pub unsafe fn begin_single_command(device: &Device, data: &RenderData) -> Result<vk::CommandBuffer> {
    let allocate_info = vk::CommandBufferAllocateInfo::builder()
        .level(vk::CommandBufferLevel::PRIMARY)
        .command_pool(data.transient_pool)
        .command_buffer_count(1);

    let command_buffer = device.allocate_command_buffers(&allocate_info)?[0];

    let begin_info = vk::CommandBufferBeginInfo::builder()
        .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);

    device.begin_command_buffer(command_buffer, &begin_info)?;

    Ok(command_buffer)
}

/// Ends, submits and frees a one-shot command buffer, blocking
/// until the queue has drained it. Transfers only happen during
/// startup, so the stall is acceptable and spares a fence.
pub unsafe fn end_single_command(
    device: &Device,
    data: &RenderData,
    command_buffer: vk::CommandBuffer,
) -> Result<()> {
    device.end_command_buffer(command_buffer)?;

    let command_buffers = &[command_buffer];
    let submit_info = vk::SubmitInfo::builder()
        .command_buffers(command_buffers);

    device.queue_submit(data.graphics_queue, &[submit_info], vk::Fence::null())?;
    device.queue_wait_idle(data.graphics_queue)?;

    device.free_command_buffers(data.transient_pool, command_buffers);

    Ok(())
}
