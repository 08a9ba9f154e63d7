use crate::{renderer::RenderData, transfer::upload_buffer};

use std::mem::size_of;

use vulkanalia::prelude::v1_0::*;
use glam::{vec2, vec3, Vec2, Vec3};
use lazy_static::lazy_static;
use anyhow::Result;
use log::*;

lazy_static! {
    /// The quad, one vertex per corner, counter-clockwise from
    /// the top left when looked at from the camera side.
    pub static ref VERTICES: Vec<Vertex> = vec![
        Vertex::new(vec3(-0.5, -0.5, 0.0), vec3(1.0, 0.0, 0.0), vec2(1.0, 0.0)),
        Vertex::new(vec3(0.5, -0.5, 0.0), vec3(0.0, 1.0, 0.0), vec2(0.0, 0.0)),
        Vertex::new(vec3(0.5, 0.5, 0.0), vec3(0.0, 0.0, 1.0), vec2(0.0, 1.0)),
        Vertex::new(vec3(-0.5, 0.5, 0.0), vec3(1.0, 1.0, 1.0), vec2(1.0, 1.0)),
    ];
}

/// The quad's two triangles. Four vertices shared between six
/// indices instead of six full vertices; a small saving here,
/// but the mechanism is the interesting part.
pub const INDICES: &[u32] = &[0, 1, 2, 2, 3, 0];

/// An interleaved vertex: position, color and texture
/// coordinates packed together, one binding for everything.
#[repr(C)]
#[derive(Copy, Clone, Debug)]
pub struct Vertex {
    pub pos: Vec3,
    pub color: Vec3,
    pub tex_coord: Vec2,
}

impl Vertex {
    pub const fn new(pos: Vec3, color: Vec3, tex_coord: Vec2) -> Self {
        Self { pos, color, tex_coord }
    }

    /// How the vertex buffer is walked: one vertex per stride,
    /// advancing per vertex (not per instance).
    pub fn binding_description() -> vk::VertexInputBindingDescription {
        vk::VertexInputBindingDescription::builder()
            .binding(0)
            .stride(size_of::<Vertex>() as u32)
            .input_rate(vk::VertexInputRate::VERTEX)
            .build()
    }

    /// Where each shader input location finds its data inside
    /// the stride. The offsets are computed from the field
    /// sizes, so reordering the struct would show up here.
    pub fn attribute_descriptions() -> [vk::VertexInputAttributeDescription; 3] {
        let pos = vk::VertexInputAttributeDescription::builder()
            .binding(0)
            .location(0)
            .format(vk::Format::R32G32B32_SFLOAT)
            .offset(0)
            .build();

        let color = vk::VertexInputAttributeDescription::builder()
            .binding(0)
            .location(1)
            .format(vk::Format::R32G32B32_SFLOAT)
            .offset(size_of::<Vec3>() as u32)
            .build();

        let tex_coord = vk::VertexInputAttributeDescription::builder()
            .binding(0)
            .location(2)
            .format(vk::Format::R32G32_SFLOAT)
            .offset((size_of::<Vec3>() + size_of::<Vec3>()) as u32)
            .build();

        [pos, color, tex_coord]
    }
}

pub unsafe fn create_vertex_buffer(
    instance: &Instance,
    device: &Device,
    data: &mut RenderData,
) -> Result<()> {
    data.vertex_buffer = upload_buffer(
        instance,
        device,
        data,
        VERTICES.as_slice(),
        vk::BufferUsageFlags::VERTEX_BUFFER,
    )?;

    info!("Vertex buffer created.");
    Ok(())
}

pub unsafe fn create_index_buffer(
    instance: &Instance,
    device: &Device,
    data: &mut RenderData,
) -> Result<()> {
    data.index_buffer = upload_buffer(
        instance,
        device,
        data,
        INDICES,
        vk::BufferUsageFlags::INDEX_BUFFER,
    )?;

    info!("Index buffer created.");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vertex_is_tightly_packed() {
        // vec3 + vec3 + vec2 of f32, no padding.
        assert_eq!(size_of::<Vertex>(), 32);
        assert_eq!(Vertex::binding_description().stride, 32);
    }

    #[test]
    fn attribute_layout_matches_fields() {
        let [pos, color, tex_coord] = Vertex::attribute_descriptions();

        assert_eq!(pos.location, 0);
        assert_eq!(pos.format, vk::Format::R32G32B32_SFLOAT);
        assert_eq!(pos.offset, 0);

        assert_eq!(color.location, 1);
        assert_eq!(color.format, vk::Format::R32G32B32_SFLOAT);
        assert_eq!(color.offset, 12);

        assert_eq!(tex_coord.location, 2);
        assert_eq!(tex_coord.format, vk::Format::R32G32_SFLOAT);
        assert_eq!(tex_coord.offset, 24);
    }

    #[test]
    fn quad_indices_reference_all_vertices() {
        assert_eq!(INDICES.len(), 6);
        assert!(INDICES.iter().all(|&i| (i as usize) < VERTICES.len()));
    }
}
