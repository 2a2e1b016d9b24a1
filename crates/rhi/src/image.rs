//! Allocated attachment images.
//!
//! The offscreen scene target renders into images the application owns,
//! unlike the swapchain path where the presentation engine owns them.
//! [`AttachmentImage`] bundles the image, its GPU-only allocation, and a
//! matching view, for either a color attachment (also sampled by the blit
//! pass) or a depth attachment.

use std::sync::Arc;

use ash::vk;
use gpu_allocator::MemoryLocation;
use gpu_allocator::vulkan::{Allocation, AllocationCreateDesc, AllocationScheme};
use tracing::debug;

use crate::device::Device;
use crate::error::{RhiError, RhiResult};

/// What the image is attached as.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AttachmentKind {
    /// Color attachment, also usable as a sampled texture.
    Color,
    /// Depth attachment.
    Depth,
}

impl AttachmentKind {
    /// Usage flags for the image.
    fn usage(self) -> vk::ImageUsageFlags {
        match self {
            AttachmentKind::Color => {
                vk::ImageUsageFlags::COLOR_ATTACHMENT | vk::ImageUsageFlags::SAMPLED
            }
            AttachmentKind::Depth => vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT,
        }
    }

    /// Aspect mask for the view.
    fn aspect(self) -> vk::ImageAspectFlags {
        match self {
            AttachmentKind::Color => vk::ImageAspectFlags::COLOR,
            AttachmentKind::Depth => vk::ImageAspectFlags::DEPTH,
        }
    }

    /// Returns a human-readable name.
    fn name(self) -> &'static str {
        match self {
            AttachmentKind::Color => "color",
            AttachmentKind::Depth => "depth",
        }
    }
}

/// GPU-only image with a matching view, used as a render target.
///
/// Destroyed view-first, then image, then the allocation is freed.
pub struct AttachmentImage {
    /// Reference to the logical device.
    device: Arc<Device>,
    /// Vulkan image handle.
    image: vk::Image,
    /// Vulkan image view handle.
    view: vk::ImageView,
    /// GPU memory allocation.
    allocation: Option<Allocation>,
    /// Image format.
    format: vk::Format,
    /// Image dimensions.
    extent: vk::Extent2D,
    /// Attachment kind.
    kind: AttachmentKind,
}

impl AttachmentImage {
    /// Creates an attachment image.
    ///
    /// # Errors
    ///
    /// Returns an error if the dimensions are zero or image, memory, or
    /// view creation fails.
    pub fn new(
        device: Arc<Device>,
        width: u32,
        height: u32,
        format: vk::Format,
        kind: AttachmentKind,
    ) -> RhiResult<Self> {
        if width == 0 || height == 0 {
            return Err(RhiError::InvalidHandle(
                "Attachment dimensions must be greater than 0".to_string(),
            ));
        }

        let extent = vk::Extent2D { width, height };

        let image_info = vk::ImageCreateInfo::default()
            .image_type(vk::ImageType::TYPE_2D)
            .format(format)
            .extent(vk::Extent3D {
                width,
                height,
                depth: 1,
            })
            .mip_levels(1)
            .array_layers(1)
            .samples(vk::SampleCountFlags::TYPE_1)
            .tiling(vk::ImageTiling::OPTIMAL)
            .usage(kind.usage())
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .initial_layout(vk::ImageLayout::UNDEFINED);

        let image = unsafe { device.handle().create_image(&image_info, None)? };

        let requirements = unsafe { device.handle().get_image_memory_requirements(image) };

        let allocation = {
            let mut allocator = device
                .allocator()
                .lock()
                .map_err(|_| RhiError::InvalidHandle("Allocator mutex poisoned".to_string()))?;
            allocator.allocate(&AllocationCreateDesc {
                name: kind.name(),
                requirements,
                location: MemoryLocation::GpuOnly,
                // Optimal tiling is not linear.
                linear: false,
                allocation_scheme: AllocationScheme::GpuAllocatorManaged,
            })?
        };

        unsafe {
            device
                .handle()
                .bind_image_memory(image, allocation.memory(), allocation.offset())?;
        }

        let view_info = vk::ImageViewCreateInfo::default()
            .image(image)
            .view_type(vk::ImageViewType::TYPE_2D)
            .format(format)
            .subresource_range(
                vk::ImageSubresourceRange::default()
                    .aspect_mask(kind.aspect())
                    .base_mip_level(0)
                    .level_count(1)
                    .base_array_layer(0)
                    .layer_count(1),
            );

        let view = unsafe { device.handle().create_image_view(&view_info, None)? };

        debug!(
            "Created {} attachment: {}x{} ({:?})",
            kind.name(),
            width,
            height,
            format
        );

        Ok(Self {
            device,
            image,
            view,
            allocation: Some(allocation),
            format,
            extent,
            kind,
        })
    }

    /// Returns the Vulkan image handle.
    #[inline]
    pub fn image(&self) -> vk::Image {
        self.image
    }

    /// Returns the Vulkan image view handle.
    #[inline]
    pub fn view(&self) -> vk::ImageView {
        self.view
    }

    /// Returns the image format.
    #[inline]
    pub fn format(&self) -> vk::Format {
        self.format
    }

    /// Returns the image extent.
    #[inline]
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }
}

impl Drop for AttachmentImage {
    fn drop(&mut self) {
        unsafe {
            self.device.handle().destroy_image_view(self.view, None);
            self.device.handle().destroy_image(self.image, None);
        }

        if let Some(allocation) = self.allocation.take() {
            if let Ok(mut allocator) = self.device.allocator().lock() {
                if let Err(e) = allocator.free(allocation) {
                    tracing::error!("Failed to free attachment allocation: {:?}", e);
                }
            }
        }

        debug!(
            "Destroyed {} attachment: {}x{}",
            self.kind.name(),
            self.extent.width,
            self.extent.height
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attachment_kind_usage() {
        assert!(
            AttachmentKind::Color
                .usage()
                .contains(vk::ImageUsageFlags::COLOR_ATTACHMENT | vk::ImageUsageFlags::SAMPLED)
        );
        assert!(
            AttachmentKind::Depth
                .usage()
                .contains(vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT)
        );
    }

    #[test]
    fn test_attachment_kind_aspect() {
        assert_eq!(AttachmentKind::Color.aspect(), vk::ImageAspectFlags::COLOR);
        assert_eq!(AttachmentKind::Depth.aspect(), vk::ImageAspectFlags::DEPTH);
    }
}
