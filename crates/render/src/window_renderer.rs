//! Window renderer: the per-frame acquire/record/submit/present cycle.
//!
//! Each frame the renderer:
//! 1. selects the next command-buffer slot round-robin and waits on that
//!    slot's fence before reuse. This wait is the single mechanism that
//!    prevents recording into a buffer the GPU has not finished reading;
//! 2. acquires the next swapchain image, passing the slot's
//!    image-acquired semaphore for the presentation engine to signal;
//! 3. records the presentation pass (clear, then the blit of the scene
//!    image when one is supplied) and submits, waiting on the slot's
//!    image-acquired semaphore at the fragment stage and signaling its
//!    render-complete semaphore plus its fence;
//! 4. presents, gated on the slot's render-complete semaphore.
//!
//! At most one submission per slot is ever in flight; there is no
//! separate flight counter. The pool holds one slot more than there are
//! swapchain images so rotation can never land on the slot tied to the
//! only remaining acquirable image.
//!
//! The synchronization set travels with the slot: because a slot is only
//! reused after its fence signals, its image-acquired semaphore cannot be
//! handed to a new acquire while an earlier submission's wait on it is
//! still pending, and its render-complete semaphore cannot be re-signaled
//! while an earlier present may still wait on it. Frames in different
//! slots overlap freely.
//!
//! An out-of-date or suboptimal swapchain is a recoverable condition
//! ([`FrameOutcome::SwapchainOutOfDate`]); the caller rebinds the
//! swapchain, calls [`WindowRenderer::rebind`], and retries on the next
//! tick.

use std::sync::Arc;

use ash::vk;
use tracing::{debug, error, info, warn};

use vkdemo_rhi::buffer::{Buffer, BufferUsage};
use vkdemo_rhi::command::CommandBuffer;
use vkdemo_rhi::descriptor;
use vkdemo_rhi::device::Device;
use vkdemo_rhi::{RhiError, RhiResult};
use vkdemo_rhi::render_pass::{Framebuffer, RenderPass};
use vkdemo_rhi::swapchain::Swapchain;
use vkdemo_rhi::sync::{Fence, Semaphore};
use vkdemo_rhi::vertex::BlitVertex;

use crate::pipeline_gen::BlitPipelineGenerator;
use crate::scene_target::SceneFrameResult;
use crate::{ACQUIRE_TIMEOUT_NS, SLOT_WAIT_TIMEOUT_NS};

/// Clear color of the presentation pass.
const CLEAR_COLOR: [f32; 4] = [0.0, 1.0, 0.0, 1.0];

/// Outcome of one frame cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameOutcome {
    /// The frame was submitted and queued for presentation.
    Presented {
        /// Index of the swapchain image that was rendered to.
        image_index: u32,
    },
    /// The swapchain no longer matches the surface; nothing was
    /// submitted (or the present reported the mismatch). The caller must
    /// rebind before the next frame.
    SwapchainOutOfDate,
}

/// One reusable command buffer paired with the fence that reports when
/// the GPU has finished executing it, the two semaphores ordering this
/// slot's acquire/submit/present chain, and the descriptor set the blit
/// recording for this slot points at the scene image.
struct CommandSlot {
    buffer: CommandBuffer,
    fence: Fence,
    /// Signaled by the presentation engine when this slot's acquired
    /// image is safe to render into.
    image_acquired: Semaphore,
    /// Signaled by the graphics queue when this slot's rendering
    /// completes; gates the present.
    render_complete: Semaphore,
    blit_set: vk::DescriptorSet,
    device: Arc<Device>,
}

impl CommandSlot {
    fn new(device: &Arc<Device>, blit: &BlitPipelineGenerator) -> RhiResult<Self> {
        let buffer = CommandBuffer::new(device.clone())?;
        // Signaled so the first wait on a never-submitted slot passes.
        let fence = Fence::new(device.clone(), true)?;
        let image_acquired = Semaphore::new(device.clone())?;
        let render_complete = Semaphore::new(device.clone())?;
        let blit_set = descriptor::allocate_sets(device, &[blit.set_layout().handle()])?[0];

        Ok(Self {
            buffer,
            fence,
            image_acquired,
            render_complete,
            blit_set,
            device: device.clone(),
        })
    }
}

impl Drop for CommandSlot {
    fn drop(&mut self) {
        // Return the set to the shared pool; the slot is only dropped
        // after its fence has been drained.
        if let Err(e) = descriptor::free_sets(&self.device, &[self.blit_set]) {
            error!("Failed to free blit descriptor set: {:?}", e);
        }
    }
}

/// Drives the presentation frame cycle for one window.
///
/// Owns the presentation render pass, one framebuffer per swapchain
/// image, and the command-slot pool with its per-slot synchronization
/// sets. The swapchain itself stays with the caller, which also owns the
/// surface and window; their drop order (renderer, swapchain, surface,
/// window) mirrors construction.
pub struct WindowRenderer {
    /// Command-slot pool, one more slot than swapchain images; each slot
    /// carries its own fence, semaphores, and descriptor set.
    slots: Vec<CommandSlot>,
    /// Round-robin cursor into `slots`.
    next_slot: usize,
    /// Blit pipeline bundle (pipeline, layout, set layout, sampler).
    blit: BlitPipelineGenerator,
    /// Full-screen strip vertex buffer for the blit.
    quad: Buffer,
    /// One framebuffer per swapchain image.
    framebuffers: Vec<Framebuffer>,
    /// Presentation render pass matching the swapchain format.
    render_pass: RenderPass,
    /// Current swapchain extent.
    extent: vk::Extent2D,
    /// Reference to the logical device.
    device: Arc<Device>,
}

impl WindowRenderer {
    /// Creates the renderer for a bound swapchain.
    ///
    /// # Errors
    ///
    /// Returns an error if any GPU object creation fails; the caller
    /// treats this as fatal.
    pub fn new(device: Arc<Device>, swapchain: &Swapchain) -> RhiResult<Self> {
        let render_pass = RenderPass::presentation(device.clone(), swapchain.format())?;
        let framebuffers = create_framebuffers(&device, &render_pass, swapchain)?;

        let blit = BlitPipelineGenerator::new(device.clone(), &render_pass, 0)?;
        let quad = Buffer::new_with_data(
            device.clone(),
            BufferUsage::Vertex,
            bytemuck::cast_slice(&BlitVertex::FULLSCREEN_STRIP),
        )?;

        let slot_count = slot_count_for_images(swapchain.image_count() as usize);
        let mut slots = Vec::with_capacity(slot_count);
        for _ in 0..slot_count {
            slots.push(CommandSlot::new(&device, &blit)?);
        }

        info!(
            "Window renderer created: {} swapchain images, {} command slots",
            swapchain.image_count(),
            slot_count
        );

        Ok(Self {
            slots,
            next_slot: 0,
            blit,
            quad,
            framebuffers,
            render_pass,
            extent: swapchain.extent(),
            device,
        })
    }

    /// Runs one acquire/record/submit/present cycle.
    ///
    /// When `source` is given, the frame samples the scene image across
    /// the framebuffer and the submission also waits on the scene pass's
    /// completion semaphore; otherwise the frame is just the clear.
    ///
    /// # Errors
    ///
    /// Returns [`RhiError::WaitTimeout`] when acquisition or the slot
    /// fence wait expires, or the underlying error for any other API
    /// failure. Out-of-date and suboptimal swapchains are not errors;
    /// they surface as [`FrameOutcome::SwapchainOutOfDate`].
    pub fn render_frame(
        &mut self,
        swapchain: &Swapchain,
        source: Option<&SceneFrameResult>,
    ) -> RhiResult<FrameOutcome> {
        // Select the next slot round-robin and make it safe to reuse:
        // once its fence has signaled, its previous submission (and the
        // semaphore waits that submission carried) has fully retired.
        let slot_index = self.next_slot;
        self.next_slot = advance(self.next_slot, self.slots.len());
        let slot = &self.slots[slot_index];

        slot.fence.wait(SLOT_WAIT_TIMEOUT_NS)?;

        // Acquire with this slot's semaphore. Bailing out here leaves the
        // slot intact: the fence is still signaled and nothing was
        // recorded.
        let image_index = match swapchain
            .acquire_next_image(slot.image_acquired.handle(), ACQUIRE_TIMEOUT_NS)
        {
            Ok((index, false)) => index,
            Ok((_, true)) | Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => {
                debug!("Swapchain out of date during acquire");
                return Ok(FrameOutcome::SwapchainOutOfDate);
            }
            Err(vk::Result::TIMEOUT) | Err(vk::Result::NOT_READY) => {
                return Err(RhiError::WaitTimeout("swapchain image"));
            }
            Err(e) => return Err(e.into()),
        };

        slot.fence.reset()?;
        slot.buffer.reset()?;

        // The slot's submission has fully retired, so its descriptor set
        // can be rewritten without racing the GPU.
        if let Some(src) = source {
            descriptor::write_combined_image_sampler(
                &self.device,
                slot.blit_set,
                0,
                src.view,
                src.layout,
            );
        }

        // Record.
        slot.buffer.begin()?;

        let clear_values = [vk::ClearValue {
            color: vk::ClearColorValue {
                float32: CLEAR_COLOR,
            },
        }];
        slot.buffer.begin_render_pass(
            &self.render_pass,
            &self.framebuffers[image_index as usize],
            &clear_values,
        );

        if source.is_some() {
            slot.buffer
                .bind_graphics_pipeline(self.blit.pipeline().handle());
            slot.buffer
                .bind_descriptor_sets(self.blit.layout().handle(), 0, &[slot.blit_set]);
            slot.buffer.bind_vertex_buffer(self.quad.handle());
            slot.buffer.set_viewport_scissor(self.extent);
            slot.buffer.draw(BlitVertex::FULLSCREEN_STRIP.len() as u32, 1, 0, 0);
        }

        slot.buffer.end_render_pass();
        slot.buffer.end()?;

        // Submit, signaling the slot's fence so a future cycle knows when
        // reuse is safe.
        let mut wait_semaphores = vec![slot.image_acquired.handle()];
        let mut wait_stages = vec![vk::PipelineStageFlags::FRAGMENT_SHADER];
        if let Some(src) = source {
            wait_semaphores.push(src.signal);
            wait_stages.push(vk::PipelineStageFlags::FRAGMENT_SHADER);
        }

        let command_buffers = [slot.buffer.handle()];
        let signal_semaphores = [slot.render_complete.handle()];

        let submit_info = vk::SubmitInfo::default()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores);

        unsafe {
            self.device.handle().queue_submit(
                self.device.graphics_queue(),
                &[submit_info],
                slot.fence.handle(),
            )?;
        }

        // Present.
        match swapchain.present(
            self.device.graphics_queue(),
            image_index,
            slot.render_complete.handle(),
        ) {
            Ok(false) => Ok(FrameOutcome::Presented { image_index }),
            Ok(true) | Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => {
                debug!("Swapchain out of date during present");
                Ok(FrameOutcome::SwapchainOutOfDate)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Rebinds the renderer to a recreated swapchain.
    ///
    /// Drains every slot, recreates the framebuffers for the new image
    /// set, resizes the slot pool if the image count changed, and
    /// recreates every slot's semaphores (an abandoned acquire can leave
    /// an image-acquired semaphore signaled).
    ///
    /// # Errors
    ///
    /// Returns an error if draining or recreation fails.
    pub fn rebind(&mut self, swapchain: &Swapchain) -> RhiResult<()> {
        self.drain()?;

        if swapchain.format() != self.render_pass.color_format() {
            warn!(
                "Swapchain format changed across rebind ({:?} -> {:?}); render pass kept",
                self.render_pass.color_format(),
                swapchain.format()
            );
        }

        self.framebuffers.clear();
        self.framebuffers = create_framebuffers(&self.device, &self.render_pass, swapchain)?;
        self.extent = swapchain.extent();

        let slot_count = slot_count_for_images(swapchain.image_count() as usize);
        while self.slots.len() < slot_count {
            self.slots.push(CommandSlot::new(&self.device, &self.blit)?);
        }
        // Dropped slots free their descriptor sets back to the pool.
        self.slots.truncate(slot_count);
        self.next_slot = 0;

        for slot in &mut self.slots {
            slot.image_acquired = Semaphore::new(self.device.clone())?;
            slot.render_complete = Semaphore::new(self.device.clone())?;
        }

        info!(
            "Window renderer rebound: {}x{}, {} command slots",
            self.extent.width,
            self.extent.height,
            self.slots.len()
        );

        Ok(())
    }

    /// Waits on every slot's fence, draining all in-flight work.
    fn drain(&self) -> RhiResult<()> {
        for slot in &self.slots {
            slot.fence.wait(SLOT_WAIT_TIMEOUT_NS)?;
        }
        Ok(())
    }
}

impl Drop for WindowRenderer {
    fn drop(&mut self) {
        // Drain before the slots, sync objects, framebuffers, and render
        // pass are destroyed, in that order.
        if let Err(e) = self.drain() {
            error!("Failed to drain window renderer during drop: {:?}", e);
        }
        info!("Window renderer destroyed");
    }
}

/// Number of command slots for a swapchain with `image_count` images.
///
/// One more slot than images: with `N` images at most `N` frames can be
/// between acquire and present, so an `N + 1`-slot rotation never selects
/// a slot whose submission still holds the only acquirable image.
pub fn slot_count_for_images(image_count: usize) -> usize {
    image_count + 1
}

/// Advances the round-robin cursor.
fn advance(cursor: usize, slot_count: usize) -> usize {
    (cursor + 1) % slot_count
}

/// Creates one framebuffer per swapchain image.
fn create_framebuffers(
    device: &Arc<Device>,
    render_pass: &RenderPass,
    swapchain: &Swapchain,
) -> RhiResult<Vec<Framebuffer>> {
    let mut framebuffers = Vec::with_capacity(swapchain.image_views().len());
    for &view in swapchain.image_views() {
        framebuffers.push(Framebuffer::new(
            device.clone(),
            render_pass,
            &[view],
            swapchain.extent(),
        )?);
    }
    debug!("Created {} framebuffers", framebuffers.len());
    Ok(framebuffers)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slot_count_is_image_count_plus_one() {
        assert_eq!(slot_count_for_images(1), 2);
        assert_eq!(slot_count_for_images(2), 3);
        assert_eq!(slot_count_for_images(3), 4);
    }

    #[test]
    fn test_rotation_visits_all_slots_in_order() {
        let slot_count = slot_count_for_images(2);
        let mut cursor = 0;
        let mut visited = Vec::new();
        for _ in 0..slot_count {
            visited.push(cursor);
            cursor = advance(cursor, slot_count);
        }
        assert_eq!(visited, vec![0, 1, 2]);
        // Wraps back to the first slot.
        assert_eq!(cursor, 0);
    }

    #[test]
    fn test_rotation_reuses_oldest_slot_first() {
        // With N images and N+1 slots, the slot reused on cycle K is the
        // one submitted on cycle K - (N + 1), the oldest in flight.
        let slot_count = slot_count_for_images(3);
        let mut cursor = 0;
        let mut order = Vec::new();
        for _ in 0..(2 * slot_count) {
            order.push(cursor);
            cursor = advance(cursor, slot_count);
        }
        assert_eq!(&order[..slot_count], &order[slot_count..]);
    }

    #[test]
    fn test_frame_outcome_equality() {
        assert_eq!(
            FrameOutcome::Presented { image_index: 1 },
            FrameOutcome::Presented { image_index: 1 }
        );
        assert_ne!(
            FrameOutcome::Presented { image_index: 0 },
            FrameOutcome::SwapchainOutOfDate
        );
    }
}
