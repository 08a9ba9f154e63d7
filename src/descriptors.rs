use crate::{
    buffers::{create_buffer, Buffer},
    renderer::RenderData,
};

use std::mem::size_of;

use vulkanalia::prelude::v1_0::*;
use glam::{vec3, Mat4, Vec3};
use anyhow::Result;
use log::*;

/// The per-frame uniform data, laid out exactly as the vertex
/// shader block expects: three column-major 4x4 matrices, 16
/// bytes aligned each, which Mat4 already is.
#[repr(C)]
#[derive(Copy, Clone, Debug)]
pub struct Mvp {
    pub model: Mat4,
    pub view: Mat4,
    pub proj: Mat4,
}

/// Computes the frame's matrices from the elapsed time: the
/// model spins a quarter turn per second around Z, the camera
/// looks at the origin from (2,2,2) with Z up, and the
/// projection is a 45° perspective at the swapchain's aspect
/// ratio.
pub fn mvp_matrices(time: f32, extent: vk::Extent2D) -> Mvp {
    let model = Mat4::from_rotation_z(time * 90.0f32.to_radians());

    let view = Mat4::look_at_rh(vec3(2.0, 2.0, 2.0), Vec3::ZERO, Vec3::Z);

    let aspect = extent.width as f32 / extent.height as f32;
    let mut proj = Mat4::perspective_rh(45.0f32.to_radians(), aspect, 0.1, 100.0);

    // The perspective helper assumes OpenGL clip space, where Y
    // points up; Vulkan's points down, so the Y axis of the
    // projection is flipped.
    proj.y_axis.y *= -1.0;

    Mvp { model, view, proj }
}

/// Creates the descriptor set layout: binding 0 is the uniform
/// block read by the vertex shader, binding 1 the combined
/// image sampler read by the fragment shader.
pub unsafe fn create_descriptor_set_layout(device: &Device, data: &mut RenderData) -> Result<()> {
    let ubo_binding = vk::DescriptorSetLayoutBinding::builder()
        .binding(0)
        .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER)
        .descriptor_count(1)
        .stage_flags(vk::ShaderStageFlags::VERTEX);

    let sampler_binding = vk::DescriptorSetLayoutBinding::builder()
        .binding(1)
        .descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
        .descriptor_count(1)
        .stage_flags(vk::ShaderStageFlags::FRAGMENT);

    let bindings = &[ubo_binding, sampler_binding];
    let info = vk::DescriptorSetLayoutCreateInfo::builder()
        .bindings(bindings);

    data.descriptor_set_layout = device.create_descriptor_set_layout(&info, None)?;

    info!("Descriptor set layout created.");
    Ok(())
}

/// One uniform buffer per presentable image, host-visible so
/// the host rewrites it directly each frame. Device-local
/// memory would be faster to read but would drag the whole
/// transfer machinery into the frame loop.
pub unsafe fn create_uniform_buffers(
    instance: &Instance,
    device: &Device,
    data: &mut RenderData,
) -> Result<()> {
    data.uniform_buffers.clear();

    for _ in 0..data.swapchain_images.len() {
        let buffer = create_buffer(
            instance,
            device,
            data,
            size_of::<Mvp>() as u64,
            vk::BufferUsageFlags::UNIFORM_BUFFER,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
        )?;

        data.uniform_buffers.push(buffer);
    }

    info!("Uniform buffers created.");
    Ok(())
}

pub unsafe fn create_descriptor_pool(device: &Device, data: &mut RenderData) -> Result<()> {
    let count = data.swapchain_images.len() as u32;

    let ubo_size = vk::DescriptorPoolSize::builder()
        .type_(vk::DescriptorType::UNIFORM_BUFFER)
        .descriptor_count(count);

    let sampler_size = vk::DescriptorPoolSize::builder()
        .type_(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
        .descriptor_count(count);

    let pool_sizes = &[ubo_size, sampler_size];
    let info = vk::DescriptorPoolCreateInfo::builder()
        .pool_sizes(pool_sizes)
        .max_sets(count);

    data.descriptor_pool = device.create_descriptor_pool(&info, None)?;

    info!("Descriptor pool created.");
    Ok(())
}

/// Allocates and fills one descriptor set per presentable
/// image: each points at that image's uniform buffer and at
/// the shared texture sampler.
pub unsafe fn create_descriptor_sets(device: &Device, data: &mut RenderData) -> Result<()> {
    let layouts = vec![data.descriptor_set_layout; data.swapchain_images.len()];
    let allocate_info = vk::DescriptorSetAllocateInfo::builder()
        .descriptor_pool(data.descriptor_pool)
        .set_layouts(&layouts);

    data.descriptor_sets = device.allocate_descriptor_sets(&allocate_info)?;

    for i in 0..data.swapchain_images.len() {
        let buffer_info = vk::DescriptorBufferInfo::builder()
            .buffer(data.uniform_buffers[i].buffer)
            .offset(0)
            .range(size_of::<Mvp>() as u64)
            .build();

        let image_info = vk::DescriptorImageInfo::builder()
            .image_layout(vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL)
            .image_view(data.texture_image_view)
            .sampler(data.texture_sampler)
            .build();

        let buffer_infos = &[buffer_info];
        let ubo_write = vk::WriteDescriptorSet::builder()
            .dst_set(data.descriptor_sets[i])
            .dst_binding(0)
            .dst_array_element(0)
            .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER)
            .buffer_info(buffer_infos)
            .build();

        let image_infos = &[image_info];
        let sampler_write = vk::WriteDescriptorSet::builder()
            .dst_set(data.descriptor_sets[i])
            .dst_binding(1)
            .dst_array_element(0)
            .descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
            .image_info(image_infos)
            .build();

        device.update_descriptor_sets(
            &[ubo_write, sampler_write],
            &[] as &[vk::CopyDescriptorSet],
        );
    }

    info!("Descriptor sets created.");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const EXTENT: vk::Extent2D = vk::Extent2D { width: 800, height: 600 };

    #[test]
    fn model_starts_at_identity() {
        let mvp = mvp_matrices(0.0, EXTENT);
        assert!(mvp.model.abs_diff_eq(Mat4::IDENTITY, 1e-6));
    }

    #[test]
    fn model_rotates_quarter_turn_per_second() {
        // After two seconds the quad has turned half a circle.
        let mvp = mvp_matrices(2.0, EXTENT);
        let expected = Mat4::from_rotation_z(std::f32::consts::PI);
        assert!(mvp.model.abs_diff_eq(expected, 1e-5));
    }

    #[test]
    fn projection_flips_y() {
        let mvp = mvp_matrices(0.0, EXTENT);
        assert!(mvp.proj.y_axis.y < 0.0);
    }

    #[test]
    fn uniform_block_is_three_matrices() {
        assert_eq!(size_of::<Mvp>(), 3 * size_of::<Mat4>());
    }
}
