use std::fs;
use std::path::PathBuf;

use vulkanalia::prelude::v1_0::*;
use anyhow::{anyhow, Result};

/// Loads compiled SPIR-V bytecode by its logical name. Shaders
/// are read at startup rather than embedded, so rebuilding them
/// does not require rebuilding the application.
pub fn load_shader_bytecode(name: &str) -> Result<Vec<u8>> {
    let path: PathBuf = match name {
        "vertex" => ["shaders", "shader.vert.spv"].iter().collect(),
        "fragment" => ["shaders", "shader.frag.spv"].iter().collect(),
        _ => return Err(anyhow!("Unknown shader `{}`.", name)),
    };

    fs::read(&path).map_err(|e| anyhow!("Failed to read shader `{}`: {}", path.display(), e))
}

/// Wraps SPIR-V bytecode in a shader module. The bytecode is
/// consumed as a slice of 32-bit words, so its byte length and
/// alignment are validated first.
pub unsafe fn create_shader_module(device: &Device, bytecode: &[u8]) -> Result<vk::ShaderModule> {
    let bytecode = Vec::<u8>::from(bytecode);
    let (prefix, code, suffix) = bytecode.align_to::<u32>();
    if !prefix.is_empty() || !suffix.is_empty() {
        return Err(anyhow!("Shader bytecode is not properly aligned."));
    }

    let info = vk::ShaderModuleCreateInfo::builder()
        .code_size(bytecode.len())
        .code(code);

    Ok(device.create_shader_module(&info, None)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_shader_name_is_an_error() {
        assert!(load_shader_bytecode("geometry").is_err());
    }
}
