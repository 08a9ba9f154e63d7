use crate::devices::SuitabilityError;

use vulkanalia::prelude::v1_0::*;
use anyhow::{anyhow, Result};

/// Selects a memory type for a resource allocation.
///
/// Each physical device exposes a fixed array of memory types;
/// after a buffer or image is created, the driver reports which
/// of those types can back it as a bitmask over the array
/// indices. A type is eligible when its bit is set in that mask
/// AND its property flags include everything the caller asked
/// for (a type offering more properties than requested is
/// fine). The lowest eligible index wins, which makes the
/// choice deterministic for a given device.
pub fn find_memory_type(
    memory: &vk::PhysicalDeviceMemoryProperties,
    type_filter: u32,
    properties: vk::MemoryPropertyFlags,
) -> Result<u32> {
    (0..memory.memory_type_count)
        .find(|&i| {
            let suitable = (type_filter & (1 << i)) != 0;
            let memory_type = memory.memory_types[i as usize];
            suitable && memory_type.property_flags.contains(properties)
        })
        .ok_or_else(|| anyhow!(SuitabilityError("Failed to find suitable memory type.")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device_memory(flags: &[vk::MemoryPropertyFlags]) -> vk::PhysicalDeviceMemoryProperties {
        let mut memory = vk::PhysicalDeviceMemoryProperties::default();
        memory.memory_type_count = flags.len() as u32;
        for (i, &f) in flags.iter().enumerate() {
            memory.memory_types[i].property_flags = f;
        }
        memory
    }

    #[test]
    fn picks_lowest_eligible_index() {
        let memory = device_memory(&[
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
        ]);

        let index = find_memory_type(
            &memory,
            0b111,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
        ).unwrap();

        assert_eq!(index, 1);
    }

    #[test]
    fn extra_properties_still_match() {
        // A type with more flags than requested is a superset
        // and must be accepted.
        let memory = device_memory(&[
            vk::MemoryPropertyFlags::DEVICE_LOCAL
                | vk::MemoryPropertyFlags::HOST_VISIBLE
                | vk::MemoryPropertyFlags::HOST_COHERENT,
        ]);

        let index = find_memory_type(&memory, 0b1, vk::MemoryPropertyFlags::HOST_VISIBLE).unwrap();
        assert_eq!(index, 0);
    }

    #[test]
    fn filter_bit_must_be_set() {
        let memory = device_memory(&[
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
        ]);

        // Only the second type is allowed by the filter.
        let index = find_memory_type(&memory, 0b10, vk::MemoryPropertyFlags::DEVICE_LOCAL).unwrap();
        assert_eq!(index, 1);
    }

    #[test]
    fn empty_filter_is_an_error() {
        let memory = device_memory(&[vk::MemoryPropertyFlags::DEVICE_LOCAL]);
        assert!(find_memory_type(&memory, 0, vk::MemoryPropertyFlags::DEVICE_LOCAL).is_err());
    }

    #[test]
    fn missing_properties_are_an_error() {
        let memory = device_memory(&[vk::MemoryPropertyFlags::DEVICE_LOCAL]);
        assert!(find_memory_type(&memory, 0b1, vk::MemoryPropertyFlags::HOST_VISIBLE).is_err());
    }
}
