//! Descriptor set layouts, samplers, and set updates.
//!
//! Descriptor sets themselves are allocated from the pool the device owns;
//! this module wraps the objects with a lifetime of their own (layouts,
//! samplers) and provides the update helpers the blit path uses to point a
//! set at the offscreen color view.

use std::sync::Arc;

use ash::vk;
use tracing::debug;

use crate::device::Device;
use crate::error::RhiResult;

/// Descriptor set layout wrapper.
///
/// Immutable after creation.
pub struct DescriptorSetLayout {
    /// Reference to the logical device.
    device: Arc<Device>,
    /// Vulkan descriptor set layout handle.
    layout: vk::DescriptorSetLayout,
}

impl DescriptorSetLayout {
    /// Creates a new descriptor set layout.
    ///
    /// # Errors
    ///
    /// Returns an error if layout creation fails.
    pub fn new(
        device: Arc<Device>,
        bindings: &[vk::DescriptorSetLayoutBinding],
    ) -> RhiResult<Self> {
        let create_info = vk::DescriptorSetLayoutCreateInfo::default().bindings(bindings);

        let layout = unsafe {
            device
                .handle()
                .create_descriptor_set_layout(&create_info, None)?
        };

        debug!(
            "Created descriptor set layout with {} binding(s)",
            bindings.len()
        );

        Ok(Self { device, layout })
    }

    /// Returns the Vulkan descriptor set layout handle.
    #[inline]
    pub fn handle(&self) -> vk::DescriptorSetLayout {
        self.layout
    }
}

impl Drop for DescriptorSetLayout {
    fn drop(&mut self) {
        unsafe {
            self.device
                .handle()
                .destroy_descriptor_set_layout(self.layout, None);
        }
        debug!("Destroyed descriptor set layout");
    }
}

/// Vulkan sampler wrapper.
///
/// The blit path samples the offscreen target at identical dimensions, so
/// nearest filtering with clamp-to-edge addressing is all it needs.
pub struct Sampler {
    /// Reference to the logical device.
    device: Arc<Device>,
    /// Vulkan sampler handle.
    sampler: vk::Sampler,
}

impl Sampler {
    /// Creates a nearest-filtering, clamp-to-edge sampler.
    ///
    /// # Errors
    ///
    /// Returns an error if sampler creation fails.
    pub fn nearest(device: Arc<Device>) -> RhiResult<Self> {
        let create_info = vk::SamplerCreateInfo::default()
            .mag_filter(vk::Filter::NEAREST)
            .min_filter(vk::Filter::NEAREST)
            .mipmap_mode(vk::SamplerMipmapMode::NEAREST)
            .address_mode_u(vk::SamplerAddressMode::CLAMP_TO_EDGE)
            .address_mode_v(vk::SamplerAddressMode::CLAMP_TO_EDGE)
            .address_mode_w(vk::SamplerAddressMode::CLAMP_TO_EDGE)
            .border_color(vk::BorderColor::FLOAT_TRANSPARENT_BLACK);

        let sampler = unsafe { device.handle().create_sampler(&create_info, None)? };

        debug!("Created sampler");

        Ok(Self { device, sampler })
    }

    /// Returns the Vulkan sampler handle.
    #[inline]
    pub fn handle(&self) -> vk::Sampler {
        self.sampler
    }
}

impl Drop for Sampler {
    fn drop(&mut self) {
        unsafe {
            self.device.handle().destroy_sampler(self.sampler, None);
        }
        debug!("Destroyed sampler");
    }
}

/// Allocates descriptor sets from the device's shared pool.
///
/// # Errors
///
/// Returns an error if the pool is exhausted or allocation fails.
pub fn allocate_sets(
    device: &Device,
    layouts: &[vk::DescriptorSetLayout],
) -> RhiResult<Vec<vk::DescriptorSet>> {
    let alloc_info = vk::DescriptorSetAllocateInfo::default()
        .descriptor_pool(device.descriptor_pool())
        .set_layouts(layouts);

    let sets = unsafe { device.handle().allocate_descriptor_sets(&alloc_info)? };

    debug!("Allocated {} descriptor set(s)", sets.len());

    Ok(sets)
}

/// Frees descriptor sets back to the device's shared pool.
///
/// The pool is created with `FREE_DESCRIPTOR_SET`. The sets must not be
/// referenced by any pending submission.
///
/// # Errors
///
/// Returns an error if the free fails.
pub fn free_sets(device: &Device, sets: &[vk::DescriptorSet]) -> RhiResult<()> {
    unsafe {
        device
            .handle()
            .free_descriptor_sets(device.descriptor_pool(), sets)?;
    }

    debug!("Freed {} descriptor set(s)", sets.len());

    Ok(())
}

/// Writes a combined-image-sampler binding into a descriptor set.
///
/// The caller must guarantee the set is not referenced by any pending
/// submission; the frame loop does this by updating a slot's set only
/// after that slot's fence wait.
pub fn write_combined_image_sampler(
    device: &Device,
    set: vk::DescriptorSet,
    binding: u32,
    view: vk::ImageView,
    layout: vk::ImageLayout,
) {
    let image_info = vk::DescriptorImageInfo::default()
        .image_view(view)
        .image_layout(layout);

    let write = vk::WriteDescriptorSet::default()
        .dst_set(set)
        .dst_binding(binding)
        .descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
        .image_info(std::slice::from_ref(&image_info));

    unsafe {
        device.handle().update_descriptor_sets(&[write], &[]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptor_wrappers_are_send_sync() {
        // Compile-time check for the RAII wrappers
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<DescriptorSetLayout>();
        assert_send_sync::<Sampler>();
    }
}
