use crate::{
    buffers::Buffer,
    commands::*,
    descriptors::*,
    devices::*,
    frame::FrameSchedule,
    image::Image,
    pipeline::*,
    swapchain::*,
    sync::*,
    texture::*,
    vertex::*,
};

use std::collections::HashSet;
use std::ptr::copy_nonoverlapping as memcpy;

use winit::window::Window;
use vulkanalia::{
    prelude::v1_0::*,
    window as vk_window,
    loader::{LibloadingLoader, LIBRARY},
    Version,
    vk::ExtDebugUtilsExtension,
    vk::KhrSurfaceExtension,
    vk::KhrSwapchainExtension,
};
use anyhow::{anyhow, Result};
use log::*;

pub const VALIDATION_ENABLED: bool = cfg!(debug_assertions);
pub const VALIDATION_LAYER: vk::ExtensionName = vk::ExtensionName::from_bytes(b"VK_LAYER_KHRONOS_validation");
pub const PORTABILITY_MACOS_VERSION: Version = Version::new(1, 3, 216);

/// All the Vulkan objects needed for rendering, created once at
/// startup and destroyed together at shutdown. Each buffer/image
/// pair is owned by exactly one field here; nothing is shared.
#[derive(Default)]
pub struct RenderData {
    pub surface: vk::SurfaceKHR,
    pub debug_messenger: vk::DebugUtilsMessengerEXT,
    pub physical_device: vk::PhysicalDevice,
    pub graphics_queue: vk::Queue,
    pub present_queue: vk::Queue,
    pub swapchain: vk::SwapchainKHR,
    pub swapchain_images: Vec<vk::Image>,
    pub swapchain_format: vk::Format,
    pub swapchain_extent: vk::Extent2D,
    pub swapchain_image_views: Vec<vk::ImageView>,
    pub framebuffers: Vec<vk::Framebuffer>,
    pub render_pass: vk::RenderPass,
    pub descriptor_set_layout: vk::DescriptorSetLayout,
    pub pipeline_layout: vk::PipelineLayout,
    pub pipeline: vk::Pipeline,
    pub command_pool: vk::CommandPool,
    pub transient_pool: vk::CommandPool,
    pub command_buffers: Vec<vk::CommandBuffer>,
    pub vertex_buffer: Buffer,
    pub index_buffer: Buffer,
    pub texture_image: Image,
    pub texture_image_view: vk::ImageView,
    pub texture_sampler: vk::Sampler,
    pub uniform_buffers: Vec<Buffer>,
    pub descriptor_pool: vk::DescriptorPool,
    pub descriptor_sets: Vec<vk::DescriptorSet>,
    pub frames: FrameSchedule,
}

pub struct Renderer {
    // - Entry: the Vulkan entry point, the first function to
    //   call to load the Vulkan library
    // - Instance: the handle to the Vulkan library, and the
    //   first object to create
    // - Data: all the objects necessary for rendering
    // - Device: the logical device, the interface to the
    //   physical device used to create every other object
    entry: Entry,
    instance: Instance,
    data: RenderData,
    device: Device,
}

impl Renderer {
    pub unsafe fn create(window: &Window) -> Result<Self> {
        // To create a Vulkan instance, we first need a special
        // function loader to load the initial commands from the
        // Vulkan DLL; then an entry point is created with this
        // loader, and the entry point is used to create the
        // instance itself.
        let loader = LibloadingLoader::new(LIBRARY)?;
        let entry = Entry::new(loader).map_err(|b| anyhow!("{}", b))?;
        let mut data = RenderData::default();
        let instance = create_instance(window, &entry, &mut data)?;

        // Vulkan is platform agnostic, so it does not interface
        // with the window system on its own; instead it exposes
        // surface objects, abstract representations of the
        // native window to render images on. Vulkanalia handles
        // the platform differences for us here.
        data.surface = vk_window::create_surface(&instance, window, window)?;
        info!("Surface created.");

        // Next, choose a physical device to render with (the
        // graphics card, most of the time) and create the
        // logical device that interfaces it with the
        // application.
        pick_physical_device(&instance, &mut data)?;
        let device = create_logical_device(&entry, &instance, &mut data)?;

        // The presentation surface manager: negotiate the
        // surface configuration, then create the swapchain and
        // the image views through which its images are accessed.
        create_swapchain(window, &instance, &device, &mut data)?;
        create_swapchain_image_views(&device, &mut data)?;

        // The fixed rendering state, built once: the render pass
        // describing the color attachment, the descriptor layout
        // for the per-frame uniforms and the texture, the
        // graphics pipeline itself, and one framebuffer per
        // presentable image.
        create_render_pass(&device, &mut data)?;
        create_descriptor_set_layout(&device, &mut data)?;
        create_pipeline(&device, &mut data)?;
        create_framebuffers(&device, &mut data)?;

        // Command pools come before any resource upload, since
        // the transfer engine records its one-shot copies on the
        // transient pool.
        create_command_pools(&instance, &device, &mut data)?;

        // Static resources, uploaded through staging buffers to
        // device-local memory: the sampled texture and the quad
        // geometry.
        create_texture_image(TEXTURE_PATH, &instance, &device, &mut data)?;
        create_texture_image_view(&device, &mut data)?;
        create_texture_sampler(&device, &mut data)?;
        create_vertex_buffer(&instance, &device, &mut data)?;
        create_index_buffer(&instance, &device, &mut data)?;

        // Per-image resources: one host-visible uniform buffer
        // and one descriptor set per presentable image, so that
        // no two in-flight frames ever write the same uniforms.
        create_uniform_buffers(&instance, &device, &mut data)?;
        create_descriptor_pool(&device, &mut data)?;
        create_descriptor_sets(&device, &mut data)?;

        // Finally, pre-record one command buffer per presentable
        // image and create the synchronization objects rotated
        // across the frames in flight.
        create_command_buffers(&device, &mut data)?;
        create_sync_objects(&device, &mut data)?;

        Ok(Self { entry, instance, data, device })
    }

    /// Renders one frame: waits for the current frame slot to be
    /// free, acquires a presentable image, updates its uniforms,
    /// submits the pre-recorded command buffer and enqueues the
    /// present request.
    pub unsafe fn render(&mut self, elapsed: f32) -> Result<()> {
        let slot = self.data.frames.current_slot();
        let in_flight_fence = slot.in_flight_fence;
        let image_available = slot.image_available_semaphore;
        let render_finished = slot.render_finished_semaphore;

        // First, wait on the slot's fence: once it is signaled,
        // the submission that last used this slot's command
        // buffer and semaphores has fully completed, so they are
        // free for reuse. The timeout is effectively infinite; a
        // hang here is fatal by design.
        self.device.wait_for_fences(&[in_flight_fence], true, u64::MAX)?;

        // Ask the presentation engine for the next presentable
        // image. The call returns immediately; the slot's
        // "image available" semaphore is signaled device-side
        // once the image is actually ready, so the host never
        // blocks here. The swapchain is fixed-size for the whole
        // process, so a suboptimal or out-of-date result is
        // treated like any other acquisition failure.
        let result = self.device.acquire_next_image_khr(
            self.data.swapchain,
            u64::MAX,
            image_available,
            vk::Fence::null(),
        );

        let image_index = match result {
            Ok((index, _)) => index as usize,
            Err(e) => return Err(anyhow!("Failed to acquire swapchain image: {:?}", e)),
        };

        // The number of presentable images may exceed the number
        // of frame slots, so the image we just acquired can
        // still be the render target of an older slot's
        // submission. The in-flight tracker remembers which slot
        // last rendered into each image; waiting on that slot's
        // fence guarantees no two submissions ever write the
        // same image concurrently.
        if let Some(fence) = self.data.frames.image_in_flight(image_index) {
            self.device.wait_for_fences(&[fence], true, u64::MAX)?;
        }
        self.data.frames.mark_in_flight(image_index);

        // The uniform buffer for this image index is now
        // guaranteed free: it is only ever read by the device
        // after the image-available semaphore signals, and only
        // written here.
        self.update_uniform_buffer(image_index, elapsed)?;

        // The fence is reset strictly after the wait above and
        // right before submission; resetting it any earlier
        // would race a signaled-but-not-yet-reused fence.
        self.device.reset_fences(&[in_flight_fence])?;

        // Submit the command buffer pre-recorded for this image.
        // The submission waits on the image-available semaphore
        // at the color attachment output stage only, so vertex
        // work can start before the image is ready; it signals
        // the render-finished semaphore and the slot's fence on
        // completion.
        let wait_semaphores = &[image_available];
        let wait_stages = &[vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let command_buffers = &[self.data.command_buffers[image_index]];
        let signal_semaphores = &[render_finished];
        let submit_info = vk::SubmitInfo::builder()
            .wait_semaphores(wait_semaphores)
            .wait_dst_stage_mask(wait_stages)
            .command_buffers(command_buffers)
            .signal_semaphores(signal_semaphores);

        self.device.queue_submit(
            self.data.graphics_queue,
            &[submit_info],
            in_flight_fence,
        )?;

        // Enqueue the present request, gated device-side on the
        // render-finished semaphore. Since each slot's semaphore
        // pair is unique to it, presentation order matches
        // submission order across slots.
        let swapchains = &[self.data.swapchain];
        let image_indices = &[image_index as u32];
        let present_info = vk::PresentInfoKHR::builder()
            .wait_semaphores(signal_semaphores)
            .swapchains(swapchains)
            .image_indices(image_indices);

        self.device.queue_present_khr(self.data.present_queue, &present_info)?;

        // Advance to the next frame slot, round-robin.
        self.data.frames.advance();

        Ok(())
    }

    /// Writes fresh matrices into the uniform buffer dedicated
    /// to the given presentable image index.
    unsafe fn update_uniform_buffer(&mut self, image_index: usize, elapsed: f32) -> Result<()> {
        let mvp = mvp_matrices(elapsed, self.data.swapchain_extent);

        // The buffer is host-visible and host-coherent, so a
        // plain map/copy/unmap is enough; no flush is needed.
        let memory = self.device.map_memory(
            self.data.uniform_buffers[image_index].memory,
            0,
            std::mem::size_of::<Mvp>() as u64,
            vk::MemoryMapFlags::empty(),
        )?;

        memcpy(&mvp, memory.cast(), 1);
        self.device.unmap_memory(self.data.uniform_buffers[image_index].memory);

        Ok(())
    }

    pub unsafe fn destroy(&mut self) {
        // Destroying a resource while the device still executes
        // commands referencing it is undefined behavior, so
        // drain all queued work first.
        if let Err(e) = self.device.device_wait_idle() {
            error!("Failed to wait for the device to go idle: {:?}", e);
        }

        self.device.destroy_sampler(self.data.texture_sampler, None);
        self.device.destroy_image_view(self.data.texture_image_view, None);
        self.data.texture_image.destroy(&self.device);

        // Destroying the pool frees the sets allocated from it.
        self.device.destroy_descriptor_pool(self.data.descriptor_pool, None);
        self.device.destroy_descriptor_set_layout(self.data.descriptor_set_layout, None);

        self.data.uniform_buffers
            .iter_mut()
            .for_each(|b| b.destroy(&self.device));
        self.data.index_buffer.destroy(&self.device);
        self.data.vertex_buffer.destroy(&self.device);

        self.data.frames.destroy(&self.device);

        self.device.destroy_command_pool(self.data.command_pool, None);
        self.device.destroy_command_pool(self.data.transient_pool, None);

        destroy_swapchain(&self.device, &self.data);

        self.device.destroy_pipeline(self.data.pipeline, None);
        self.device.destroy_pipeline_layout(self.data.pipeline_layout, None);
        self.device.destroy_render_pass(self.data.render_pass, None);

        self.device.destroy_device(None);
        self.instance.destroy_surface_khr(self.data.surface, None);

        if VALIDATION_ENABLED {
            self.instance.destroy_debug_utils_messenger_ext(self.data.debug_messenger, None);
        }

        self.instance.destroy_instance(None);
        info!("Destroyed the Vulkan instance.");
    }
}

unsafe fn create_instance(window: &Window, entry: &Entry, data: &mut RenderData) -> Result<Instance> {
    // The Vulkan API is designed around minimal driver
    // overhead, so there is very little default error checking;
    // instead, optional "validation layers" hook into API calls
    // to apply additional checks. They can only be used if they
    // are installed on the system, so we first get the list of
    // available layers...
    let available_layers = entry
        .enumerate_instance_layer_properties()?
        .iter()
        .map(|l| l.layer_name)
        .collect::<HashSet<_>>();

    // ...and check that the Khronos validation layer is there
    // when we want it. Running without it in a debug build is a
    // fatal setup error, not something to silently continue
    // past.
    if VALIDATION_ENABLED && !available_layers.contains(&VALIDATION_LAYER) {
        return Err(anyhow!("Validation layer not available."));
    }

    let layers = if VALIDATION_ENABLED {
        vec![VALIDATION_LAYER.as_ptr()]
    } else {
        Vec::new()
    };

    let application_info = vk::ApplicationInfo::builder()
        .application_name(b"ariel-app\0")
        .application_version(vk::make_version(1, 0, 0))
        .engine_name(b"ariel\0")
        .engine_version(vk::make_version(1, 0, 0))
        .api_version(vk::make_version(1, 0, 0));

    // The window system integration is not part of the core
    // API, so the required surface extensions are queried from
    // the windowing collaborator.
    let mut extensions = vk_window::get_required_instance_extensions(window)
        .iter()
        .map(|e| e.as_ptr())
        .collect::<Vec<_>>();

    // The debug utils extension is needed to install a callback
    // for the validation layer messages.
    if VALIDATION_ENABLED {
        extensions.push(vk::EXT_DEBUG_UTILS_EXTENSION.name.as_ptr());
    }

    // Some platforms do not ship a fully conformant Vulkan
    // implementation and need the portability extensions since
    // v1.3.216 of the API; macOS is one of them.
    let flags = if
        cfg!(target_os = "macos") &&
        entry.version()? >= PORTABILITY_MACOS_VERSION
    {
        info!("Enabling extensions for macOS portability.");
        extensions.push(vk::KHR_GET_PHYSICAL_DEVICE_PROPERTIES2_EXTENSION.name.as_ptr());
        extensions.push(vk::KHR_PORTABILITY_ENUMERATION_EXTENSION.name.as_ptr());

        vk::InstanceCreateFlags::ENUMERATE_PORTABILITY_KHR
    } else {
        vk::InstanceCreateFlags::empty()
    };

    let mut info = vk::InstanceCreateInfo::builder()
        .application_info(&application_info)
        .enabled_layer_names(&layers)
        .enabled_extension_names(&extensions)
        .flags(flags);

    // The debug messenger forwards validation messages of every
    // severity and type to our own log macros.
    let mut debug_info = vk::DebugUtilsMessengerCreateInfoEXT::builder()
        .message_severity(vk::DebugUtilsMessageSeverityFlagsEXT::all())
        .message_type(vk::DebugUtilsMessageTypeFlagsEXT::all())
        .user_callback(Some(debug_callback));

    if VALIDATION_ENABLED {
        // Extending the instance info with the debug info also
        // covers messages emitted during instance creation and
        // destruction, when no messenger exists yet.
        info = info.push_next(&mut debug_info);
    }

    let instance = entry.create_instance(&info, None)?;

    if VALIDATION_ENABLED {
        data.debug_messenger = instance.create_debug_utils_messenger_ext(&debug_info, None)?;
    }

    info!("Vulkan instance created.");
    Ok(instance)
}

extern "system" fn debug_callback(
    severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    type_: vk::DebugUtilsMessageTypeFlagsEXT,
    data: *const vk::DebugUtilsMessengerCallbackDataEXT,
    _: *mut std::ffi::c_void,
) -> vk::Bool32 {
    // Route validation layer messages through our log system
    // instead of the standard output, mapped by severity. The
    // 'extern "system"' bit links the function to the system
    // ABI, which Vulkan requires to call it directly.
    let data = unsafe { *data };
    let message = unsafe { std::ffi::CStr::from_ptr(data.message) }.to_string_lossy();

    if severity >= vk::DebugUtilsMessageSeverityFlagsEXT::ERROR {
        error!("({type_:?}) {message}");
    } else if severity >= vk::DebugUtilsMessageSeverityFlagsEXT::WARNING {
        warn!("({type_:?}) {message}");
    } else if severity >= vk::DebugUtilsMessageSeverityFlagsEXT::INFO {
        debug!("({type_:?}) {message}");
    } else {
        trace!("({type_:?}) {message}");
    }

    // Returning true would abort the offending call; that is
    // only useful when testing the layers themselves.
    vk::FALSE
}
