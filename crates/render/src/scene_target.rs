//! Offscreen scene target.
//!
//! Renders scene content into an application-owned color+depth
//! framebuffer instead of a swapchain image, following the same
//! discipline as the window path: wait the completion fence before
//! re-recording, record against the forward render pass, submit with a
//! semaphore the consumer must wait on.
//!
//! The attachments are reallocated lazily whenever the requested
//! dimensions change and reused otherwise.

use std::sync::Arc;

use ash::vk;
use tracing::{debug, info};

use vkdemo_rhi::buffer::Buffer;
use vkdemo_rhi::command::CommandBuffer;
use vkdemo_rhi::device::Device;
use vkdemo_rhi::{RhiError, RhiResult};
use vkdemo_rhi::image::{AttachmentImage, AttachmentKind};
use vkdemo_rhi::pipeline::Pipeline;
use vkdemo_rhi::render_pass::{Framebuffer, RenderPass};
use vkdemo_rhi::sync::{Fence, Semaphore};

use crate::SLOT_WAIT_TIMEOUT_NS;

/// Color format of the offscreen target.
pub const SCENE_COLOR_FORMAT: vk::Format = vk::Format::R8G8B8A8_UNORM;

/// Depth format of the offscreen target.
pub const SCENE_DEPTH_FORMAT: vk::Format = vk::Format::D32_SFLOAT;

/// Per-frame input for the scene pass.
pub struct SceneFrameInfo<'a> {
    /// Requested target width in pixels.
    pub width: u32,
    /// Requested target height in pixels.
    pub height: u32,
    /// Optional semaphore the submission waits on before executing.
    pub wait: Option<vk::Semaphore>,
    /// Draw work to record inside the forward pass, if any.
    pub draw: Option<SceneDraw<'a>>,
}

/// A draw call recorded inside the forward pass.
pub struct SceneDraw<'a> {
    /// Pipeline built against the scene target's render pass.
    pub pipeline: &'a Pipeline,
    /// Vertex buffer bound at binding 0.
    pub vertex_buffer: &'a Buffer,
    /// Number of vertices to draw.
    pub vertex_count: u32,
    /// Fresh vertex data to upload before recording, if any.
    ///
    /// The upload happens after the completion fence wait, so it can
    /// never race a submission still reading the buffer. Requires that
    /// only this pass consumes the buffer.
    pub vertices: Option<&'a [u8]>,
}

/// Result of a scene pass.
///
/// The caller must wait on `signal` before sampling `image` and must keep
/// the target alive until that wait has been submitted.
pub struct SceneFrameResult {
    /// The rendered color image.
    pub image: vk::Image,
    /// View over the color image.
    pub view: vk::ImageView,
    /// Layout the color image was left in.
    pub layout: vk::ImageLayout,
    /// Semaphore signaled when rendering completes.
    pub signal: vk::Semaphore,
}

/// The lazily allocated attachments and their framebuffer.
///
/// Field order matters: the framebuffer references the views and is
/// destroyed first.
struct TargetStorage {
    framebuffer: Framebuffer,
    color: AttachmentImage,
    depth: AttachmentImage,
}

/// Offscreen color+depth render target with its own submission state.
pub struct SceneTarget {
    /// One reusable command buffer, guarded by `fence`.
    command_buffer: CommandBuffer,
    /// Signals when the last submission finished executing.
    fence: Fence,
    /// Signals to the consumer that the color image is ready.
    render_complete: Semaphore,
    /// Current attachments; `None` until the first frame.
    target: Option<TargetStorage>,
    /// Forward render pass (color ending sampled, depth).
    render_pass: RenderPass,
    /// Reference to the logical device.
    device: Arc<Device>,
}

impl SceneTarget {
    /// Creates the scene target.
    ///
    /// No attachments are allocated yet; the first [`render`](Self::render)
    /// call sizes them.
    ///
    /// # Errors
    ///
    /// Returns an error if render pass, command buffer, or sync object
    /// creation fails.
    pub fn new(device: Arc<Device>) -> RhiResult<Self> {
        let render_pass = RenderPass::forward(
            device.clone(),
            SCENE_COLOR_FORMAT,
            SCENE_DEPTH_FORMAT,
            vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        )?;

        let command_buffer = CommandBuffer::new(device.clone())?;
        // Signaled so the first frame's wait passes immediately.
        let fence = Fence::new(device.clone(), true)?;
        let render_complete = Semaphore::new(device.clone())?;

        info!("Scene target created");

        Ok(Self {
            command_buffer,
            fence,
            render_complete,
            target: None,
            render_pass,
            device,
        })
    }

    /// Returns the forward render pass, for building scene pipelines.
    #[inline]
    pub fn render_pass(&self) -> &RenderPass {
        &self.render_pass
    }

    /// Renders one scene frame.
    ///
    /// Waits for the previous submission to finish, reallocates the
    /// attachments if the requested size changed, records the forward
    /// pass (clear plus the optional draw), and submits, waiting on
    /// `info.wait` when present and signaling the completion semaphore
    /// and the internal fence.
    ///
    /// # Errors
    ///
    /// Returns [`RhiError::WaitTimeout`] if the previous submission does
    /// not complete in time, [`RhiError::InvalidHandle`] for zero
    /// dimensions, or the underlying error on any API failure.
    pub fn render(&mut self, info: SceneFrameInfo<'_>) -> RhiResult<SceneFrameResult> {
        if info.width == 0 || info.height == 0 {
            return Err(RhiError::InvalidHandle(
                "Scene target dimensions must be greater than 0".to_string(),
            ));
        }

        // The single reuse-safety rule: never re-record while the GPU may
        // still be reading the buffer.
        self.fence.wait(SLOT_WAIT_TIMEOUT_NS)?;
        self.fence.reset()?;

        self.update_target(info.width, info.height)?;
        let target = self
            .target
            .as_ref()
            .ok_or_else(|| RhiError::InvalidHandle("Scene target not allocated".to_string()))?;

        if let Some(draw) = &info.draw {
            if let Some(vertices) = draw.vertices {
                draw.vertex_buffer.write_data(0, vertices)?;
            }
        }

        self.command_buffer.reset()?;
        self.command_buffer.begin()?;

        let clear_values = [
            vk::ClearValue {
                color: vk::ClearColorValue {
                    float32: [1.0, 1.0, 1.0, 1.0],
                },
            },
            vk::ClearValue {
                depth_stencil: vk::ClearDepthStencilValue {
                    depth: 1.0,
                    stencil: 0,
                },
            },
        ];

        self.command_buffer
            .begin_render_pass(&self.render_pass, &target.framebuffer, &clear_values);

        if let Some(draw) = &info.draw {
            self.command_buffer
                .bind_graphics_pipeline(draw.pipeline.handle());
            self.command_buffer.bind_vertex_buffer(draw.vertex_buffer.handle());
            self.command_buffer
                .set_viewport_scissor(target.framebuffer.extent());
            self.command_buffer.draw(draw.vertex_count, 1, 0, 0);
        }

        self.command_buffer.end_render_pass();
        self.command_buffer.end()?;

        let mut wait_semaphores = Vec::new();
        let mut wait_stages = Vec::new();
        if let Some(wait) = info.wait {
            wait_semaphores.push(wait);
            wait_stages.push(vk::PipelineStageFlags::TOP_OF_PIPE);
        }

        let command_buffers = [self.command_buffer.handle()];
        let signal_semaphores = [self.render_complete.handle()];

        let submit_info = vk::SubmitInfo::default()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores);

        unsafe {
            self.device.handle().queue_submit(
                self.device.graphics_queue(),
                &[submit_info],
                self.fence.handle(),
            )?;
        }

        Ok(SceneFrameResult {
            image: target.color.image(),
            view: target.color.view(),
            layout: vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
            signal: self.render_complete.handle(),
        })
    }

    /// Recreates the completion semaphore.
    ///
    /// Call this when the consumer abandoned a frame without waiting on
    /// the semaphore (a swapchain rebind), leaving it signaled.
    ///
    /// # Errors
    ///
    /// Returns an error if the fence wait or semaphore creation fails.
    pub fn reset_sync(&mut self) -> RhiResult<()> {
        self.fence.wait(SLOT_WAIT_TIMEOUT_NS)?;
        self.render_complete = Semaphore::new(self.device.clone())?;
        debug!("Scene target semaphore reset");
        Ok(())
    }

    /// Reallocates the attachments when the requested size changed.
    fn update_target(&mut self, width: u32, height: u32) -> RhiResult<()> {
        if let Some(target) = &self.target {
            let extent = target.framebuffer.extent();
            if extent.width == width && extent.height == height {
                return Ok(());
            }

            // The previous color image may still be sampled by the
            // presentation path; drain everything before destroying it.
            self.device.wait_idle()?;
            self.target = None;
        }

        let color = AttachmentImage::new(
            self.device.clone(),
            width,
            height,
            SCENE_COLOR_FORMAT,
            AttachmentKind::Color,
        )?;
        let depth = AttachmentImage::new(
            self.device.clone(),
            width,
            height,
            SCENE_DEPTH_FORMAT,
            AttachmentKind::Depth,
        )?;

        let attachments = [color.view(), depth.view()];
        let framebuffer = Framebuffer::new(
            self.device.clone(),
            &self.render_pass,
            &attachments,
            vk::Extent2D { width, height },
        )?;

        info!("Scene target resized to {}x{}", width, height);

        self.target = Some(TargetStorage {
            framebuffer,
            color,
            depth,
        });

        Ok(())
    }
}

impl Drop for SceneTarget {
    fn drop(&mut self) {
        // Drain the pending submission before the command buffer and
        // attachments are destroyed.
        if let Err(e) = self.fence.wait(SLOT_WAIT_TIMEOUT_NS) {
            tracing::error!("Failed to drain scene target during drop: {:?}", e);
        }
        debug!("Scene target destroyed");
    }
}
