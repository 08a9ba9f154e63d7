use crate::{
    frame::{FrameSchedule, FrameSlot, MAX_FRAMES_IN_FLIGHT},
    renderer::RenderData,
};

use vulkanalia::prelude::v1_0::*;
use anyhow::Result;
use log::*;

/// Creates the semaphore pair and fence of every frame slot and
/// hands them to the frame schedule.
pub unsafe fn create_sync_objects(device: &Device, data: &mut RenderData) -> Result<()> {
    let semaphore_info = vk::SemaphoreCreateInfo::builder();

    // The fences start signaled: the very first frame on each
    // slot has nothing to wait for, and an unsignaled fence
    // would deadlock the initial wait.
    let fence_info = vk::FenceCreateInfo::builder()
        .flags(vk::FenceCreateFlags::SIGNALED);

    let mut slots = Vec::with_capacity(MAX_FRAMES_IN_FLIGHT);
    for _ in 0..MAX_FRAMES_IN_FLIGHT {
        slots.push(FrameSlot {
            image_available_semaphore: device.create_semaphore(&semaphore_info, None)?,
            render_finished_semaphore: device.create_semaphore(&semaphore_info, None)?,
            in_flight_fence: device.create_fence(&fence_info, None)?,
        });
    }

    data.frames = FrameSchedule::new(slots, data.swapchain_images.len());

    info!("Synchronization objects created.");
    Ok(())
}
