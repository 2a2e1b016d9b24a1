//! Vulkan demo - main entry point.
//!
//! Opens one window and drives the frame cycle until it is closed. Every
//! piece of renderer state is constructed explicitly here, in dependency
//! order, and passed down by reference; there is no global application
//! object.

use anyhow::{Context, Result};
use glam::{Quat, Vec3};
use tracing::{debug, error, info};
use winit::application::ApplicationHandler;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::WindowId;

use std::sync::Arc;

use vkdemo_core::FrameClock;
use vkdemo_platform::{Surface, Window};
use vkdemo_render::{
    ConstPipelineGenerator, FrameOutcome, SceneDraw, SceneFrameInfo, SceneTarget, WindowRenderer,
};
use vkdemo_rhi::buffer::{Buffer, BufferUsage};
use vkdemo_rhi::device::Device;
use vkdemo_rhi::instance::Instance;
use vkdemo_rhi::swapchain::Swapchain;
use vkdemo_rhi::vertex::ColorVertex;
use vkdemo_scene::{Component, NodeId, Scene, Transform};

const WINDOW_WIDTH: u32 = 1280;
const WINDOW_HEIGHT: u32 = 720;

/// The demo triangle, in the triangle node's local space.
const TRIANGLE: [ColorVertex; 3] = [
    ColorVertex::new(Vec3::new(0.0, -0.5, 0.5), Vec3::new(1.0, 0.0, 0.0)),
    ColorVertex::new(Vec3::new(0.5, 0.5, 0.5), Vec3::new(0.0, 1.0, 0.0)),
    ColorVertex::new(Vec3::new(-0.5, 0.5, 0.5), Vec3::new(0.0, 0.0, 1.0)),
];

/// Spins its node around the Z axis.
struct Spinner {
    speed: f32,
}

impl Component for Spinner {
    fn name(&self) -> &str {
        "spinner"
    }

    fn update(&mut self, transform: &mut Transform, dt: f32) {
        transform.rotation = (Quat::from_rotation_z(self.speed * dt) * transform.rotation)
            .normalize();
    }
}

/// Everything that depends on the window, in reverse teardown order:
/// renderers and pipelines first, then the swapchain, the surface, the
/// device, and the instance last.
struct RenderState {
    window_renderer: WindowRenderer,
    scene_target: SceneTarget,
    const_pipeline: ConstPipelineGenerator,
    triangle_buffer: Buffer,
    swapchain: Swapchain,
    surface: Surface,
    device: Arc<Device>,
    instance: Instance,
}

impl RenderState {
    fn new(window: &Window) -> Result<Self> {
        let instance =
            Instance::new(cfg!(debug_assertions)).context("Failed to create Vulkan instance")?;
        let device = Device::new(&instance).context("Failed to create device context")?;
        info!("Using device: {}", device.device_name());

        let surface = window.create_surface(instance.entry(), instance.handle())?;

        let swapchain = Swapchain::bind(
            &instance,
            device.clone(),
            surface.handle(),
            window.width(),
            window.height(),
        )
        .context("Failed to bind swapchain")?;

        let scene_target = SceneTarget::new(device.clone())?;
        let const_pipeline = ConstPipelineGenerator::new(device.clone(), scene_target.render_pass(), 0)
            .context("Failed to build scene pipeline")?;

        let triangle_buffer = Buffer::new_with_data(
            device.clone(),
            BufferUsage::Vertex,
            bytemuck::cast_slice(&TRIANGLE),
        )?;

        let window_renderer =
            WindowRenderer::new(device.clone(), &swapchain).context("Failed to create renderer")?;

        Ok(Self {
            window_renderer,
            scene_target,
            const_pipeline,
            triangle_buffer,
            swapchain,
            surface,
            device,
            instance,
        })
    }

    /// Recovery path for an out-of-date swapchain: rebind the chain for
    /// the current window size, then rebind everything that referenced
    /// the old images.
    fn rebind(&mut self, width: u32, height: u32) -> Result<()> {
        self.swapchain
            .rebind(&self.instance, self.surface.handle(), width, height)?;
        self.window_renderer.rebind(&self.swapchain)?;
        // The scene semaphore may have been left signaled by the
        // abandoned frame.
        self.scene_target.reset_sync()?;
        Ok(())
    }
}

struct App {
    window: Option<Window>,
    state: Option<RenderState>,
    scene: Scene,
    triangle_node: NodeId,
    clock: FrameClock,
}

impl App {
    fn new() -> Result<Self> {
        let mut scene = Scene::new();
        let root = scene.add_node("scene");
        let triangle_node = scene.add_child(root, "triangle")?;
        scene.add_component(triangle_node, Box::new(Spinner { speed: 1.0 }))?;

        Ok(Self {
            window: None,
            state: None,
            scene,
            triangle_node,
            clock: FrameClock::new(),
        })
    }

    fn render(&mut self) -> Result<()> {
        let Some(window) = &self.window else {
            return Ok(());
        };
        let Some(state) = &mut self.state else {
            return Ok(());
        };

        let (width, height) = (window.width(), window.height());
        if width == 0 || height == 0 {
            // Minimized; nothing to present.
            return Ok(());
        }

        let dt = self.clock.tick().as_secs_f32();
        self.scene.update(dt);

        if self.clock.frame_count() % 300 == 0 {
            debug!("~{:.0} fps", self.clock.frame_rate());
        }

        // Place the triangle with its world transform; the upload happens
        // inside the scene pass, after its fence wait.
        let world = self.scene.world_matrix(self.triangle_node)?;
        let vertices: Vec<ColorVertex> = TRIANGLE
            .iter()
            .map(|v| ColorVertex::new(world.transform_point3(v.position), v.color))
            .collect();

        let scene_result = state.scene_target.render(SceneFrameInfo {
            width,
            height,
            wait: None,
            draw: Some(SceneDraw {
                pipeline: state.const_pipeline.pipeline(),
                vertex_buffer: &state.triangle_buffer,
                vertex_count: TRIANGLE.len() as u32,
                vertices: Some(bytemuck::cast_slice(&vertices)),
            }),
        })?;

        match state
            .window_renderer
            .render_frame(&state.swapchain, Some(&scene_result))?
        {
            FrameOutcome::Presented { image_index } => {
                debug!("Presented image {}", image_index);
            }
            FrameOutcome::SwapchainOutOfDate => {
                state.rebind(width, height)?;
            }
        }

        Ok(())
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        match Window::new(event_loop, WINDOW_WIDTH, WINDOW_HEIGHT, "Vulkan Demo") {
            Ok(window) => match RenderState::new(&window) {
                Ok(state) => {
                    info!("Initialization complete, entering main loop");
                    self.state = Some(state);
                    self.window = Some(window);
                }
                Err(e) => {
                    error!("Failed to initialize renderer: {:?}", e);
                    event_loop.exit();
                }
            },
            Err(e) => {
                error!("Failed to create window: {}", e);
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                info!("Close requested, shutting down");
                event_loop.exit();
            }
            WindowEvent::Resized(size) => {
                debug!("Window resized to {}x{}", size.width, size.height);
                if let Some(window) = &mut self.window {
                    window.resize(size.width, size.height);
                }
                // The swapchain is rebound when acquire or present
                // reports it out of date.
            }
            WindowEvent::RedrawRequested => {
                if let Err(e) = self.render() {
                    error!("Render error: {:?}", e);
                    event_loop.exit();
                }
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(window) = &self.window {
            window.request_redraw();
        }
    }
}

fn main() -> Result<()> {
    vkdemo_core::init_logging();
    info!("Starting Vulkan demo");

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = App::new()?;
    event_loop.run_app(&mut app)?;

    Ok(())
}
