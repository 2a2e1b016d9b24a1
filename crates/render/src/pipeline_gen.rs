//! Pipeline generators.
//!
//! Each generator builds one immutable pipeline bundle against a render
//! pass and subpass, owns every object in the bundle, and releases them
//! as a unit on drop. Shader modules are loaded from the `spirv/`
//! directory next to the executable and dropped as soon as the pipeline
//! exists.

use std::sync::Arc;

use ash::vk;
use tracing::info;

use vkdemo_rhi::descriptor::{DescriptorSetLayout, Sampler};
use vkdemo_rhi::device::Device;
use vkdemo_rhi::RhiResult;
use vkdemo_rhi::pipeline::{CullMode, GraphicsPipelineBuilder, Pipeline, PipelineLayout, PrimitiveTopology};
use vkdemo_rhi::render_pass::RenderPass;
use vkdemo_rhi::shader::{Shader, ShaderStage};
use vkdemo_rhi::vertex::{BlitVertex, ColorVertex};

/// Generator for the vertex-color pipeline used by the scene pass.
///
/// One vertex binding (position + color), no descriptors, dynamic
/// viewport and scissor. Culling is disabled so the demo triangle is
/// visible regardless of winding.
pub struct ConstPipelineGenerator {
    pipeline: Pipeline,
    layout: PipelineLayout,
}

impl ConstPipelineGenerator {
    /// Builds the pipeline against `render_pass` at `subpass`.
    ///
    /// Loads `const.vert.spv` and `const.frag.spv`. Construction errors
    /// are typed; the application treats them as fatal at startup.
    pub fn new(device: Arc<Device>, render_pass: &RenderPass, subpass: u32) -> RhiResult<Self> {
        let vert = Shader::load(device.clone(), "const.vert", ShaderStage::Vertex)?;
        let frag = Shader::load(device.clone(), "const.frag", ShaderStage::Fragment)?;

        let layout = PipelineLayout::new(device.clone(), &[], &[])?;

        let pipeline = GraphicsPipelineBuilder::new()
            .vertex_shader(&vert)
            .fragment_shader(&frag)
            .vertex_binding(ColorVertex::binding_description())
            .vertex_attributes(&ColorVertex::attribute_descriptions())
            .cull_mode(CullMode::None)
            .build(device, &layout, render_pass, subpass)?;

        info!("Const pipeline generated");

        Ok(Self { pipeline, layout })
    }

    /// Returns the pipeline.
    #[inline]
    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    /// Returns the pipeline layout.
    #[inline]
    pub fn layout(&self) -> &PipelineLayout {
        &self.layout
    }
}

/// Generator for the full-screen blit pipeline used by the window pass.
///
/// Samples a source image through a combined-image-sampler binding with
/// an immutable nearest sampler and writes it across the framebuffer as a
/// four-vertex triangle strip.
pub struct BlitPipelineGenerator {
    pipeline: Pipeline,
    layout: PipelineLayout,
    set_layout: DescriptorSetLayout,
    sampler: Sampler,
}

impl BlitPipelineGenerator {
    /// Builds the pipeline against `render_pass` at `subpass`.
    ///
    /// Loads `blit.vert.spv` and `blit.frag.spv`.
    pub fn new(device: Arc<Device>, render_pass: &RenderPass, subpass: u32) -> RhiResult<Self> {
        let vert = Shader::load(device.clone(), "blit.vert", ShaderStage::Vertex)?;
        let frag = Shader::load(device.clone(), "blit.frag", ShaderStage::Fragment)?;

        // Source and destination have identical dimensions, so a nearest
        // sampler is exact.
        let sampler = Sampler::nearest(device.clone())?;

        let samplers = [sampler.handle()];
        let binding = vk::DescriptorSetLayoutBinding::default()
            .binding(0)
            .descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
            .descriptor_count(1)
            .stage_flags(vk::ShaderStageFlags::FRAGMENT)
            .immutable_samplers(&samplers);

        let set_layout = DescriptorSetLayout::new(device.clone(), &[binding])?;

        let layout = PipelineLayout::new(device.clone(), &[set_layout.handle()], &[])?;

        let pipeline = GraphicsPipelineBuilder::new()
            .vertex_shader(&vert)
            .fragment_shader(&frag)
            .vertex_binding(BlitVertex::binding_description())
            .vertex_attributes(&BlitVertex::attribute_descriptions())
            .topology(PrimitiveTopology::TriangleStrip)
            .cull_mode(CullMode::None)
            .build(device, &layout, render_pass, subpass)?;

        info!("Blit pipeline generated");

        Ok(Self {
            pipeline,
            layout,
            set_layout,
            sampler,
        })
    }

    /// Returns the pipeline.
    #[inline]
    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    /// Returns the pipeline layout.
    #[inline]
    pub fn layout(&self) -> &PipelineLayout {
        &self.layout
    }

    /// Returns the descriptor set layout for the source binding.
    #[inline]
    pub fn set_layout(&self) -> &DescriptorSetLayout {
        &self.set_layout
    }
}
