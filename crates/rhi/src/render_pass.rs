//! Render pass and framebuffer management.
//!
//! Two fixed render-pass shapes cover the demo:
//! - a presentation pass with a single color attachment cleared on load
//!   and left in `PRESENT_SRC_KHR`, used by the window renderer;
//! - a forward pass with a color attachment handed off in a caller-chosen
//!   layout plus a depth attachment, used by the offscreen scene target.
//!
//! Framebuffers pair a render pass with concrete image views; one exists
//! per swapchain image on the presentation path and exactly one on the
//! offscreen path.

use std::sync::Arc;

use ash::vk;
use tracing::debug;

use crate::device::Device;
use crate::error::RhiResult;

/// Vulkan render pass wrapper.
///
/// Immutable after creation; destroyed on drop. Framebuffers and pipelines
/// created against it must be destroyed first.
pub struct RenderPass {
    /// Reference to the logical device.
    device: Arc<Device>,
    /// Vulkan render pass handle.
    render_pass: vk::RenderPass,
    /// Format of the color attachment.
    color_format: vk::Format,
    /// Format of the depth attachment, when the pass has one.
    depth_format: Option<vk::Format>,
}

impl RenderPass {
    /// Creates the presentation render pass.
    ///
    /// One color attachment matching the swapchain format: cleared on
    /// load, stored, transitioned from `UNDEFINED` to `PRESENT_SRC_KHR`.
    ///
    /// # Errors
    ///
    /// Returns an error if render pass creation fails.
    pub fn presentation(device: Arc<Device>, color_format: vk::Format) -> RhiResult<Self> {
        let attachment = vk::AttachmentDescription {
            format: color_format,
            samples: vk::SampleCountFlags::TYPE_1,
            load_op: vk::AttachmentLoadOp::CLEAR,
            store_op: vk::AttachmentStoreOp::STORE,
            stencil_load_op: vk::AttachmentLoadOp::DONT_CARE,
            stencil_store_op: vk::AttachmentStoreOp::DONT_CARE,
            initial_layout: vk::ImageLayout::UNDEFINED,
            final_layout: vk::ImageLayout::PRESENT_SRC_KHR,
            ..Default::default()
        };

        let color_ref = vk::AttachmentReference {
            attachment: 0,
            layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
        };

        let subpass = vk::SubpassDescription::default()
            .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
            .color_attachments(std::slice::from_ref(&color_ref));

        let create_info = vk::RenderPassCreateInfo::default()
            .attachments(std::slice::from_ref(&attachment))
            .subpasses(std::slice::from_ref(&subpass));

        let render_pass = unsafe { device.handle().create_render_pass(&create_info, None)? };

        debug!("Created presentation render pass ({:?})", color_format);

        Ok(Self {
            device,
            render_pass,
            color_format,
            depth_format: None,
        })
    }

    /// Creates the forward render pass for offscreen scene rendering.
    ///
    /// Attachment 0 is color: cleared, stored, ending in
    /// `final_color_layout` (typically `SHADER_READ_ONLY_OPTIMAL` so a
    /// later pass can sample the result). Attachment 1 is depth: cleared,
    /// ending in `DEPTH_STENCIL_ATTACHMENT_OPTIMAL`.
    ///
    /// # Errors
    ///
    /// Returns an error if render pass creation fails.
    pub fn forward(
        device: Arc<Device>,
        color_format: vk::Format,
        depth_format: vk::Format,
        final_color_layout: vk::ImageLayout,
    ) -> RhiResult<Self> {
        let attachments = [
            vk::AttachmentDescription {
                format: color_format,
                samples: vk::SampleCountFlags::TYPE_1,
                load_op: vk::AttachmentLoadOp::CLEAR,
                store_op: vk::AttachmentStoreOp::STORE,
                stencil_load_op: vk::AttachmentLoadOp::DONT_CARE,
                stencil_store_op: vk::AttachmentStoreOp::DONT_CARE,
                initial_layout: vk::ImageLayout::UNDEFINED,
                final_layout: final_color_layout,
                ..Default::default()
            },
            vk::AttachmentDescription {
                format: depth_format,
                samples: vk::SampleCountFlags::TYPE_1,
                load_op: vk::AttachmentLoadOp::CLEAR,
                store_op: vk::AttachmentStoreOp::STORE,
                stencil_load_op: vk::AttachmentLoadOp::DONT_CARE,
                stencil_store_op: vk::AttachmentStoreOp::DONT_CARE,
                initial_layout: vk::ImageLayout::UNDEFINED,
                final_layout: vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
                ..Default::default()
            },
        ];

        let color_ref = vk::AttachmentReference {
            attachment: 0,
            layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
        };
        let depth_ref = vk::AttachmentReference {
            attachment: 1,
            layout: vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
        };

        let subpass = vk::SubpassDescription::default()
            .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
            .color_attachments(std::slice::from_ref(&color_ref))
            .depth_stencil_attachment(&depth_ref);

        let create_info = vk::RenderPassCreateInfo::default()
            .attachments(&attachments)
            .subpasses(std::slice::from_ref(&subpass));

        let render_pass = unsafe { device.handle().create_render_pass(&create_info, None)? };

        debug!(
            "Created forward render pass ({:?} + {:?}, final layout {:?})",
            color_format, depth_format, final_color_layout
        );

        Ok(Self {
            device,
            render_pass,
            color_format,
            depth_format: Some(depth_format),
        })
    }

    /// Returns the Vulkan render pass handle.
    #[inline]
    pub fn handle(&self) -> vk::RenderPass {
        self.render_pass
    }

    /// Returns the color attachment format.
    #[inline]
    pub fn color_format(&self) -> vk::Format {
        self.color_format
    }

    /// Returns the depth attachment format, if the pass has one.
    #[inline]
    pub fn depth_format(&self) -> Option<vk::Format> {
        self.depth_format
    }
}

impl Drop for RenderPass {
    fn drop(&mut self) {
        unsafe {
            self.device
                .handle()
                .destroy_render_pass(self.render_pass, None);
        }
        debug!("Destroyed render pass");
    }
}

/// Vulkan framebuffer wrapper.
///
/// Binds concrete image views to a render pass at a fixed extent. The
/// views are borrowed handles; the caller keeps them alive for as long as
/// the framebuffer exists.
pub struct Framebuffer {
    /// Reference to the logical device.
    device: Arc<Device>,
    /// Vulkan framebuffer handle.
    framebuffer: vk::Framebuffer,
    /// Framebuffer extent.
    extent: vk::Extent2D,
}

impl Framebuffer {
    /// Creates a framebuffer for the given render pass and attachments.
    ///
    /// `attachments` must match the render pass attachment list in order
    /// and count.
    ///
    /// # Errors
    ///
    /// Returns an error if framebuffer creation fails.
    pub fn new(
        device: Arc<Device>,
        render_pass: &RenderPass,
        attachments: &[vk::ImageView],
        extent: vk::Extent2D,
    ) -> RhiResult<Self> {
        let create_info = vk::FramebufferCreateInfo::default()
            .render_pass(render_pass.handle())
            .attachments(attachments)
            .width(extent.width)
            .height(extent.height)
            .layers(1);

        let framebuffer = unsafe { device.handle().create_framebuffer(&create_info, None)? };

        Ok(Self {
            device,
            framebuffer,
            extent,
        })
    }

    /// Returns the Vulkan framebuffer handle.
    #[inline]
    pub fn handle(&self) -> vk::Framebuffer {
        self.framebuffer
    }

    /// Returns the framebuffer extent.
    #[inline]
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }
}

impl Drop for Framebuffer {
    fn drop(&mut self) {
        unsafe {
            self.device
                .handle()
                .destroy_framebuffer(self.framebuffer, None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_pass_is_send_sync() {
        // Compile-time check that RenderPass is Send + Sync
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<RenderPass>();
        assert_send_sync::<Framebuffer>();
    }
}
