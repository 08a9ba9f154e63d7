use crate::{devices::SuitabilityError, renderer::RenderData};

use vulkanalia::{
    prelude::v1_0::*,
    vk::KhrSurfaceExtension,
};
use anyhow::{anyhow, Result};

/// The indices of the queue families used by the application: a
/// graphics family for rendering and transfer submissions, and a
/// family able to present to the window surface. They are often
/// the same family, but nothing guarantees it.
#[derive(Copy, Clone, Debug)]
pub struct QueueFamilyIndices {
    pub graphics: u32,
    pub present: u32,
}

impl QueueFamilyIndices {
    pub unsafe fn get(
        instance: &Instance,
        data: &RenderData,
        physical_device: vk::PhysicalDevice,
    ) -> Result<Self> {
        let properties = instance.get_physical_device_queue_family_properties(physical_device);

        let graphics = properties
            .iter()
            .position(|p| p.queue_flags.contains(vk::QueueFlags::GRAPHICS))
            .map(|i| i as u32);

        // Presentation support is a property of a (family,
        // surface) pair, so it has to be queried per family.
        let mut present = None;
        for (index, _) in properties.iter().enumerate() {
            if instance.get_physical_device_surface_support_khr(
                physical_device,
                index as u32,
                data.surface,
            )? {
                present = Some(index as u32);
                break;
            }
        }

        if let (Some(graphics), Some(present)) = (graphics, present) {
            Ok(Self { graphics, present })
        } else {
            Err(anyhow!(SuitabilityError("Missing required queue families.")))
        }
    }
}
