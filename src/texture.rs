use crate::{image::create_image_view, renderer::RenderData, transfer::upload_image};

use std::fs::File;

use vulkanalia::prelude::v1_0::*;
use anyhow::{anyhow, Result};
use log::*;

pub const TEXTURE_PATH: &str = "textures/texture.png";

/// Decodes the texture PNG and uploads it to a device-local
/// sampled image. The rest of the renderer only ever sees raw
/// RGBA8 pixels and dimensions; the decoder stays contained
/// here.
pub unsafe fn create_texture_image(
    path: &str,
    instance: &Instance,
    device: &Device,
    data: &mut RenderData,
) -> Result<()> {
    let file = File::open(path)
        .map_err(|e| anyhow!("Failed to open texture `{}`: {}", path, e))?;

    let decoder = png::Decoder::new(file);
    let mut reader = decoder.read_info()?;

    let mut pixels = vec![0; reader.output_buffer_size()];
    let info = reader.next_frame(&mut pixels)?;

    // The upload path assumes 8-bit RGBA; anything else would
    // need a conversion pass we deliberately do not have.
    if info.color_type != png::ColorType::Rgba || info.bit_depth != png::BitDepth::Eight {
        return Err(anyhow!("Texture `{}` is not 8-bit RGBA.", path));
    }

    pixels.truncate(info.buffer_size());

    data.texture_image = upload_image(
        instance,
        device,
        data,
        &pixels,
        info.width,
        info.height,
    )?;

    info!("Texture image created ({}x{}).", info.width, info.height);
    Ok(())
}

pub unsafe fn create_texture_image_view(device: &Device, data: &mut RenderData) -> Result<()> {
    data.texture_image_view = create_image_view(
        device,
        data.texture_image.image,
        vk::Format::R8G8B8A8_SRGB,
    )?;

    info!("Texture image view created.");
    Ok(())
}

/// Creates the texture sampler: linear filtering both ways,
/// repeat addressing, 16x anisotropy (gated by the device
/// suitability check), normalized coordinates.
pub unsafe fn create_texture_sampler(device: &Device, data: &mut RenderData) -> Result<()> {
    let info = vk::SamplerCreateInfo::builder()
        .mag_filter(vk::Filter::LINEAR)
        .min_filter(vk::Filter::LINEAR)
        .address_mode_u(vk::SamplerAddressMode::REPEAT)
        .address_mode_v(vk::SamplerAddressMode::REPEAT)
        .address_mode_w(vk::SamplerAddressMode::REPEAT)
        .anisotropy_enable(true)
        .max_anisotropy(16.0)
        .border_color(vk::BorderColor::INT_OPAQUE_BLACK)
        .unnormalized_coordinates(false)
        .compare_enable(false)
        .compare_op(vk::CompareOp::ALWAYS)
        .mipmap_mode(vk::SamplerMipmapMode::LINEAR)
        .mip_lod_bias(0.0)
        .min_lod(0.0)
        .max_lod(0.0);

    data.texture_sampler = device.create_sampler(&info, None)?;

    info!("Texture sampler created.");
    Ok(())
}
