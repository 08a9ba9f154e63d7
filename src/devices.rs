use crate::{
    queues::QueueFamilyIndices,
    renderer::{RenderData, PORTABILITY_MACOS_VERSION, VALIDATION_ENABLED, VALIDATION_LAYER},
    swapchain::SwapchainSupport,
};

use std::collections::HashSet;

use vulkanalia::prelude::v1_0::*;
use anyhow::{anyhow, Result};
use thiserror::Error;
use log::*;

/// A fatal mismatch between what the application needs and what
/// the system provides, detected during device selection.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct SuitabilityError(pub &'static str);

/// Device extensions the application cannot run without; only
/// the swapchain extension, which bridges the Vulkan device and
/// the presentation surface.
pub const REQUIRED_EXTENSIONS: &[vk::ExtensionName] = &[vk::KHR_SWAPCHAIN_EXTENSION.name];

/// Selects the first physical device that satisfies every
/// suitability gate. There is no scoring between candidates: any
/// suitable device is good enough for a single fixed pipeline.
pub unsafe fn pick_physical_device(instance: &Instance, data: &mut RenderData) -> Result<()> {
    for physical_device in instance.enumerate_physical_devices()? {
        let properties = instance.get_physical_device_properties(physical_device);

        if let Err(error) = check_physical_device(instance, data, physical_device) {
            warn!("Skipping physical device (`{}`): {}", properties.device_name, error);
        } else {
            info!("Selected physical device (`{}`).", properties.device_name);
            data.physical_device = physical_device;
            return Ok(());
        }
    }

    Err(anyhow!(SuitabilityError("Failed to find suitable physical device.")))
}

unsafe fn check_physical_device(
    instance: &Instance,
    data: &RenderData,
    physical_device: vk::PhysicalDevice,
) -> Result<()> {
    // Queue families first: the device must expose a graphics
    // family and a family able to present to our surface (the
    // lookup itself fails with a suitability error otherwise).
    QueueFamilyIndices::get(instance, data, physical_device)?;

    check_physical_device_extensions(instance, physical_device)?;

    // Swapchain support may exist and still be unusable: a
    // device reporting no formats or no present modes for this
    // surface cannot present anything.
    let support = SwapchainSupport::get(instance, data, physical_device)?;
    if support.formats.is_empty() || support.present_modes.is_empty() {
        return Err(anyhow!(SuitabilityError("Insufficient swapchain support.")));
    }

    // The texture sampler requests anisotropic filtering, an
    // optional feature.
    let features = instance.get_physical_device_features(physical_device);
    if features.sampler_anisotropy != vk::TRUE {
        return Err(anyhow!(SuitabilityError("No sampler anisotropy.")));
    }

    Ok(())
}

unsafe fn check_physical_device_extensions(
    instance: &Instance,
    physical_device: vk::PhysicalDevice,
) -> Result<()> {
    let extensions = instance
        .enumerate_device_extension_properties(physical_device, None)?
        .iter()
        .map(|e| e.extension_name)
        .collect::<HashSet<_>>();

    if REQUIRED_EXTENSIONS.iter().all(|e| extensions.contains(e)) {
        Ok(())
    } else {
        Err(anyhow!(SuitabilityError("Missing required device extensions.")))
    }
}

/// Creates the logical device interfacing the selected physical
/// device, and retrieves the graphics and present queues.
pub unsafe fn create_logical_device(
    entry: &Entry,
    instance: &Instance,
    data: &mut RenderData,
) -> Result<Device> {
    let indices = QueueFamilyIndices::get(instance, data, data.physical_device)?;

    // The graphics and present families are frequently the same
    // family; deduplicate so we do not request the same queue
    // twice.
    let mut unique_indices = HashSet::new();
    unique_indices.insert(indices.graphics);
    unique_indices.insert(indices.present);

    // One queue per family is plenty, since all command buffers
    // are recorded on a single thread. The priority only matters
    // relative to other queues of the same family, but it must
    // be provided even for a single queue.
    let queue_priorities = &[1.0];
    let queue_infos = unique_indices
        .iter()
        .map(|i| {
            vk::DeviceQueueCreateInfo::builder()
                .queue_family_index(*i)
                .queue_priorities(queue_priorities)
        })
        .collect::<Vec<_>>();

    // Device-level layers are deprecated, but some older
    // implementations still require them to match the instance
    // layers.
    let layers = if VALIDATION_ENABLED {
        vec![VALIDATION_LAYER.as_ptr()]
    } else {
        vec![]
    };

    let mut extensions = REQUIRED_EXTENSIONS
        .iter()
        .map(|e| e.as_ptr())
        .collect::<Vec<_>>();

    // Non-conformant implementations (like MoltenVK on macOS)
    // need the portability extensions enabled.
    if cfg!(target_os = "macos") && entry.version()? >= PORTABILITY_MACOS_VERSION {
        extensions.push(vk::KHR_PORTABILITY_ENUMERATION_EXTENSION.name.as_ptr());
    }

    let features = vk::PhysicalDeviceFeatures::builder()
        .sampler_anisotropy(true);

    let info = vk::DeviceCreateInfo::builder()
        .queue_create_infos(&queue_infos)
        .enabled_layer_names(&layers)
        .enabled_extension_names(&extensions)
        .enabled_features(&features);

    let device = instance.create_device(data.physical_device, &info, None)?;

    data.graphics_queue = device.get_device_queue(indices.graphics, 0);
    data.present_queue = device.get_device_queue(indices.present, 0);

    info!("Logical device created.");
    Ok(device)
}
