use crate::{queues::QueueFamilyIndices, renderer::RenderData, image::create_image_view};

use winit::window::Window;
use vulkanalia::{
    prelude::v1_0::*,
    vk::KhrSurfaceExtension,
    vk::KhrSwapchainExtension,
};
use anyhow::Result;
use log::*;

/// Everything the surface reports about its swapchain support:
/// the capabilities (image counts, extents, transforms), the
/// supported pixel formats and the supported present modes.
#[derive(Clone, Debug)]
pub struct SwapchainSupport {
    pub capabilities: vk::SurfaceCapabilitiesKHR,
    pub formats: Vec<vk::SurfaceFormatKHR>,
    pub present_modes: Vec<vk::PresentModeKHR>,
}

impl SwapchainSupport {
    pub unsafe fn get(
        instance: &Instance,
        data: &RenderData,
        physical_device: vk::PhysicalDevice,
    ) -> Result<Self> {
        Ok(Self {
            capabilities: instance
                .get_physical_device_surface_capabilities_khr(physical_device, data.surface)?,
            formats: instance
                .get_physical_device_surface_formats_khr(physical_device, data.surface)?,
            present_modes: instance
                .get_physical_device_surface_present_modes_khr(physical_device, data.surface)?,
        })
    }
}

/// Picks the surface format: 32-bit BGRA with sRGB non-linear
/// color space when available, since it matches both the texture
/// and the expectations of most presentation engines; otherwise
/// whatever the surface lists first.
pub fn choose_surface_format(formats: &[vk::SurfaceFormatKHR]) -> vk::SurfaceFormatKHR {
    formats
        .iter()
        .cloned()
        .find(|f| {
            f.format == vk::Format::B8G8R8A8_SRGB
                && f.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR
        })
        .unwrap_or_else(|| formats[0])
}

/// Picks the present mode: mailbox (triple buffering, latest
/// image wins) when available, else FIFO, the only mode every
/// implementation must support.
pub fn choose_present_mode(present_modes: &[vk::PresentModeKHR]) -> vk::PresentModeKHR {
    present_modes
        .iter()
        .cloned()
        .find(|m| *m == vk::PresentModeKHR::MAILBOX)
        .unwrap_or(vk::PresentModeKHR::FIFO)
}

/// Picks the swapchain extent. Most surfaces dictate their
/// extent exactly; a surface that reports the unbounded marker
/// instead lets the application choose, within the reported
/// bounds, and we choose the window's framebuffer size.
pub fn choose_extent(
    capabilities: &vk::SurfaceCapabilitiesKHR,
    width: u32,
    height: u32,
) -> vk::Extent2D {
    if capabilities.current_extent.width != u32::MAX {
        capabilities.current_extent
    } else {
        vk::Extent2D {
            width: width.clamp(
                capabilities.min_image_extent.width,
                capabilities.max_image_extent.width,
            ),
            height: height.clamp(
                capabilities.min_image_extent.height,
                capabilities.max_image_extent.height,
            ),
        }
    }
}

/// Picks the number of presentable images: one more than the
/// minimum, so the application is not forced to wait on the
/// driver before acquiring another image, capped by the maximum
/// when the surface has one (zero means unbounded).
pub fn image_count(capabilities: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let mut count = capabilities.min_image_count + 1;
    if capabilities.max_image_count != 0 && count > capabilities.max_image_count {
        count = capabilities.max_image_count;
    }
    count
}

pub unsafe fn create_swapchain(
    window: &Window,
    instance: &Instance,
    device: &Device,
    data: &mut RenderData,
) -> Result<()> {
    let indices = QueueFamilyIndices::get(instance, data, data.physical_device)?;
    let support = SwapchainSupport::get(instance, data, data.physical_device)?;

    let surface_format = choose_surface_format(&support.formats);
    let present_mode = choose_present_mode(&support.present_modes);
    let extent = choose_extent(
        &support.capabilities,
        window.inner_size().width,
        window.inner_size().height,
    );
    let min_image_count = image_count(&support.capabilities);

    // When the graphics and present queues belong to different
    // families, the swapchain images are accessed from both;
    // concurrent sharing avoids explicit ownership transfers at
    // the cost of some performance. With a single family,
    // exclusive mode is both correct and optimal.
    let queue_family_indices = [indices.graphics, indices.present];
    let (sharing_mode, queue_family_indices): (_, &[u32]) = if indices.graphics != indices.present {
        (vk::SharingMode::CONCURRENT, &queue_family_indices)
    } else {
        (vk::SharingMode::EXCLUSIVE, &[])
    };

    let info = vk::SwapchainCreateInfoKHR::builder()
        .surface(data.surface)
        .min_image_count(min_image_count)
        .image_format(surface_format.format)
        .image_color_space(surface_format.color_space)
        .image_extent(extent)
        .image_array_layers(1)
        .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
        .image_sharing_mode(sharing_mode)
        .queue_family_indices(queue_family_indices)
        // Pass the surface's current transform through, so the
        // presentation engine applies no extra rotation.
        .pre_transform(support.capabilities.current_transform)
        .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
        .present_mode(present_mode)
        .clipped(true)
        .old_swapchain(vk::SwapchainKHR::null());

    data.swapchain = device.create_swapchain_khr(&info, None)?;
    // The implementation may have created more images than the
    // requested minimum; always query the actual list.
    data.swapchain_images = device.get_swapchain_images_khr(data.swapchain)?;
    data.swapchain_format = surface_format.format;
    data.swapchain_extent = extent;

    info!(
        "Swapchain created ({} images, {:?}, {:?}, {}x{}).",
        data.swapchain_images.len(),
        surface_format.format,
        present_mode,
        extent.width,
        extent.height
    );

    Ok(())
}

/// One color view per presentable image; the framebuffers and
/// the pre-recorded command buffers index into these.
pub unsafe fn create_swapchain_image_views(device: &Device, data: &mut RenderData) -> Result<()> {
    data.swapchain_image_views = data
        .swapchain_images
        .iter()
        .map(|i| create_image_view(device, *i, data.swapchain_format))
        .collect::<Result<Vec<_>>>()?;

    info!("Swapchain image views created.");
    Ok(())
}

/// One framebuffer per presentable image, binding its view as
/// the single color attachment of the render pass.
pub unsafe fn create_framebuffers(device: &Device, data: &mut RenderData) -> Result<()> {
    data.framebuffers = data
        .swapchain_image_views
        .iter()
        .map(|v| {
            let attachments = &[*v];
            let info = vk::FramebufferCreateInfo::builder()
                .render_pass(data.render_pass)
                .attachments(attachments)
                .width(data.swapchain_extent.width)
                .height(data.swapchain_extent.height)
                .layers(1);

            device.create_framebuffer(&info, None)
        })
        .collect::<Result<Vec<_>, _>>()?;

    info!("Framebuffers created.");
    Ok(())
}

/// Tears down the presentation objects in reverse creation
/// order: framebuffers, then the views, then the swapchain
/// itself (which owns the images).
pub unsafe fn destroy_swapchain(device: &Device, data: &RenderData) {
    data.framebuffers
        .iter()
        .for_each(|f| device.destroy_framebuffer(*f, None));
    data.swapchain_image_views
        .iter()
        .for_each(|v| device.destroy_image_view(*v, None));
    device.destroy_swapchain_khr(data.swapchain, None);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn format(format: vk::Format, color_space: vk::ColorSpaceKHR) -> vk::SurfaceFormatKHR {
        vk::SurfaceFormatKHR { format, color_space }
    }

    #[test]
    fn prefers_bgra_srgb() {
        let formats = [
            format(vk::Format::R8G8B8A8_UNORM, vk::ColorSpaceKHR::SRGB_NONLINEAR),
            format(vk::Format::B8G8R8A8_SRGB, vk::ColorSpaceKHR::SRGB_NONLINEAR),
        ];

        let chosen = choose_surface_format(&formats);
        assert_eq!(chosen.format, vk::Format::B8G8R8A8_SRGB);
        assert_eq!(chosen.color_space, vk::ColorSpaceKHR::SRGB_NONLINEAR);
    }

    #[test]
    fn falls_back_to_first_format() {
        let formats = [
            format(vk::Format::R8G8B8A8_UNORM, vk::ColorSpaceKHR::SRGB_NONLINEAR),
            format(vk::Format::R5G6B5_UNORM_PACK16, vk::ColorSpaceKHR::SRGB_NONLINEAR),
        ];

        assert_eq!(choose_surface_format(&formats).format, vk::Format::R8G8B8A8_UNORM);
    }

    #[test]
    fn srgb_format_needs_srgb_color_space() {
        // The right format in the wrong color space does not
        // count as the preferred pair.
        let formats = [
            format(vk::Format::R8G8B8A8_UNORM, vk::ColorSpaceKHR::SRGB_NONLINEAR),
            format(vk::Format::B8G8R8A8_SRGB, vk::ColorSpaceKHR::ADOBERGB_NONLINEAR_EXT),
        ];

        assert_eq!(choose_surface_format(&formats).format, vk::Format::R8G8B8A8_UNORM);
    }

    #[test]
    fn prefers_mailbox_else_fifo() {
        assert_eq!(
            choose_present_mode(&[
                vk::PresentModeKHR::FIFO,
                vk::PresentModeKHR::MAILBOX,
                vk::PresentModeKHR::IMMEDIATE,
            ]),
            vk::PresentModeKHR::MAILBOX
        );

        assert_eq!(
            choose_present_mode(&[vk::PresentModeKHR::FIFO, vk::PresentModeKHR::IMMEDIATE]),
            vk::PresentModeKHR::FIFO
        );
    }

    #[test]
    fn surface_extent_wins_when_bounded() {
        let mut capabilities = vk::SurfaceCapabilitiesKHR::default();
        capabilities.current_extent = vk::Extent2D { width: 800, height: 600 };

        let extent = choose_extent(&capabilities, 1024, 576);
        assert_eq!(extent.width, 800);
        assert_eq!(extent.height, 600);
    }

    #[test]
    fn window_size_is_clamped_when_unbounded() {
        let mut capabilities = vk::SurfaceCapabilitiesKHR::default();
        capabilities.current_extent = vk::Extent2D { width: u32::MAX, height: u32::MAX };
        capabilities.min_image_extent = vk::Extent2D { width: 200, height: 200 };
        capabilities.max_image_extent = vk::Extent2D { width: 800, height: 800 };

        let extent = choose_extent(&capabilities, 1024, 100);
        assert_eq!(extent.width, 800);
        assert_eq!(extent.height, 200);
    }

    #[test]
    fn image_count_is_min_plus_one_capped() {
        let mut capabilities = vk::SurfaceCapabilitiesKHR::default();
        capabilities.min_image_count = 2;
        capabilities.max_image_count = 0;
        assert_eq!(image_count(&capabilities), 3);

        capabilities.max_image_count = 3;
        assert_eq!(image_count(&capabilities), 3);

        capabilities.min_image_count = 3;
        capabilities.max_image_count = 3;
        assert_eq!(image_count(&capabilities), 3);
    }
}
