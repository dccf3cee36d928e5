//! Quad renderer
//!
//! [`QuadRenderer`] owns every Vulkan object of the demo and runs the frame
//! loop. Fields are declared in reverse construction order, so dropping the
//! renderer tears everything down dependents first, the context last.

use ash::vk;
use std::time::Instant;

use crate::config::RendererConfig;
use crate::frame::{self, FrameBackend, FrameCounter, FrameStatus};
use crate::vertex::{Vertex, QUAD_INDICES, QUAD_VERTICES};
use crate::vulkan::{
    record_draw, CommandPool, DescriptorSetLayout, DrawTarget, FrameSyncSet, GraphicsPipeline, RenderPass,
    RenderingSwapchain, ShaderModule, StagedBuffer, SurfaceStatus, UniformBufferObject, UniformBuffers,
    UniformDescriptorSets, VulkanContext, VulkanError, VulkanResult,
};
use crate::window::{wait_for_framebuffer, Window};
use crate::MAX_FRAMES_IN_FLIGHT;

/// Bytes needed for the quad's vertices followed by its indices
const GEOMETRY_BUFFER_SIZE: vk::DeviceSize =
    (QUAD_VERTICES.len() * Vertex::STRIDE + QUAD_INDICES.len() * std::mem::size_of::<u16>()) as vk::DeviceSize;

/// Vulkan renderer for the rotating quad
pub struct QuadRenderer {
    frame_sync: FrameSyncSet,
    descriptor_sets: UniformDescriptorSets,
    uniform_buffers: UniformBuffers,
    geometry: StagedBuffer,
    command_buffers: Vec<vk::CommandBuffer>,
    // Owned for their lifetime only: the pool backs `command_buffers`, the layout backs `pipeline`.
    _command_pool: CommandPool,
    pipeline: GraphicsPipeline,
    _descriptor_layout: DescriptorSetLayout,
    swapchain: RenderingSwapchain,
    render_pass: RenderPass,
    context: VulkanContext,

    frame_counter: FrameCounter,
    fence_timeout_ns: u64,
    start_time: Instant,
    frames_presented: u64,
}

impl QuadRenderer {
    /// Initialize Vulkan for `window` and upload the quad
    pub fn new(window: &mut Window, config: &RendererConfig) -> VulkanResult<Self> {
        config
            .shaders
            .validate()
            .map_err(|e| VulkanError::InitializationFailed(e.to_string()))?;

        let context = VulkanContext::new(window, &config.application_name, config.validation_enabled())?;
        let device = context.raw_device();

        let mut swapchain = RenderingSwapchain::build(&context, wait_for_framebuffer(window))?;

        let render_pass = RenderPass::new_present_pass(device.clone(), swapchain.format())?;

        swapchain.populate_framebuffers(render_pass.handle())?;
        if !swapchain.valid() {
            log::error!("Failed to create framebuffers.");
            return Err(VulkanError::SwapchainInvalid("creation"));
        }

        let descriptor_layout = DescriptorSetLayout::transform_layout(&device)?;

        let pipeline = {
            let vertex_shader = ShaderModule::from_file(device.clone(), &config.shaders.vertex_shader_path)?;
            let fragment_shader = ShaderModule::from_file(device.clone(), &config.shaders.fragment_shader_path)?;
            GraphicsPipeline::new(
                device.clone(),
                render_pass.handle(),
                &vertex_shader,
                &fragment_shader,
                descriptor_layout.handle(),
            )?
        };

        let command_pool = CommandPool::new(device.clone(), context.graphics_queue_family())?;
        let command_buffers = command_pool.allocate_command_buffers(MAX_FRAMES_IN_FLIGHT as u32)?;

        let memory_properties = context.memory_properties();
        let mut geometry = StagedBuffer::allocate(&device, &memory_properties, GEOMETRY_BUFFER_SIZE)?;
        geometry.map()?;
        geometry.put(&QUAD_VERTICES, &QUAD_INDICES)?;
        geometry.unmap()?;
        geometry.staging_to_buffer(&command_pool, context.graphics_queue())?;

        let uniform_buffers = UniformBuffers::new(&device, &memory_properties, MAX_FRAMES_IN_FLIGHT)?;
        let descriptor_sets =
            UniformDescriptorSets::new(device.clone(), &descriptor_layout, &uniform_buffers.descriptor_targets())?;

        let frame_sync = FrameSyncSet::new(&device, MAX_FRAMES_IN_FLIGHT)?;

        log::info!("Renderer ready with {} frames in flight.", MAX_FRAMES_IN_FLIGHT);

        Ok(Self {
            frame_sync,
            descriptor_sets,
            uniform_buffers,
            geometry,
            command_buffers,
            _command_pool: command_pool,
            pipeline,
            _descriptor_layout: descriptor_layout,
            swapchain,
            render_pass,
            context,
            frame_counter: FrameCounter::default(),
            fence_timeout_ns: config.fence_timeout(),
            start_time: Instant::now(),
            frames_presented: 0,
        })
    }

    /// Draw the frame in the current slot, then advance to the next slot
    pub fn draw_frame(&mut self, window: &mut Window) -> VulkanResult<FrameStatus> {
        let slot = self.frame_counter.current();
        let mut resized = window.framebuffer_resized();

        let status = frame::draw_frame(&mut VulkanFrame { renderer: self, window }, slot, &mut resized)?;

        *window.resize_flag() = resized;
        if status != FrameStatus::Skipped {
            self.frames_presented += 1;
        }
        self.frame_counter.advance();
        Ok(status)
    }

    /// Run until the window closes, then drain the device
    pub fn run(&mut self, window: &mut Window) -> VulkanResult<()> {
        let result = loop {
            if window.should_close() {
                break Ok(());
            }
            window.poll_events();

            if let Err(e) = self.draw_frame(window) {
                log::error!("Failed to draw frame: {}", e);
                break Err(e);
            }
        };

        self.context.device.wait_idle()?;
        log::info!(
            "Presented {} frames in {:.1} s.",
            self.frames_presented,
            self.start_time.elapsed().as_secs_f32()
        );
        result
    }

    /// Active frame slot
    pub fn current_frame(&self) -> usize {
        self.frame_counter.current()
    }

    /// Current swapchain extent
    pub fn extent(&self) -> vk::Extent2D {
        self.swapchain.extent()
    }

    fn command_buffer(&self, slot: usize) -> VulkanResult<vk::CommandBuffer> {
        self.command_buffers
            .get(slot)
            .copied()
            .ok_or_else(|| VulkanError::InvalidOperation {
                reason: format!("no command buffer for frame slot {}", slot),
            })
    }
}

impl Drop for QuadRenderer {
    fn drop(&mut self) {
        if let Err(e) = self.context.device.wait_idle() {
            log::error!("Device wait before teardown failed: {}", e);
        }
    }
}

/// The renderer and its window for the duration of one frame
struct VulkanFrame<'a> {
    renderer: &'a mut QuadRenderer,
    window: &'a mut Window,
}

impl FrameBackend for VulkanFrame<'_> {
    fn wait_for_fence(&mut self, slot: usize) -> VulkanResult<()> {
        let timeout_ns = self.renderer.fence_timeout_ns;
        self.renderer.frame_sync.get(slot)?.in_flight.wait(timeout_ns)
    }

    fn acquire_image(&mut self, slot: usize) -> VulkanResult<(Option<u32>, SurfaceStatus)> {
        let semaphore = self.renderer.frame_sync.get(slot)?.image_available.handle();
        self.renderer.swapchain.acquire_next_image(semaphore)
    }

    fn reset_fence(&mut self, slot: usize) -> VulkanResult<()> {
        self.renderer.frame_sync.get(slot)?.in_flight.reset()
    }

    fn reset_command_buffer(&mut self, slot: usize) -> VulkanResult<()> {
        let command_buffer = self.renderer.command_buffer(slot)?;
        unsafe {
            self.renderer
                .context
                .device()
                .reset_command_buffer(command_buffer, vk::CommandBufferResetFlags::empty())
                .map_err(VulkanError::Api)
        }
    }

    fn update_uniforms(&mut self, slot: usize) -> VulkanResult<()> {
        let renderer = &mut *self.renderer;
        let ubo = UniformBufferObject::rotating(renderer.start_time.elapsed().as_secs_f32(), renderer.swapchain.extent());
        renderer.uniform_buffers.update(slot, &ubo)
    }

    fn record(&mut self, slot: usize, image_index: u32) -> VulkanResult<()> {
        let renderer = &*self.renderer;
        let target = DrawTarget {
            render_pass: renderer.render_pass.handle(),
            framebuffer: renderer.swapchain.framebuffer(image_index)?,
            extent: renderer.swapchain.extent(),
            pipeline: renderer.pipeline.handle(),
            pipeline_layout: renderer.pipeline.layout(),
            geometry: renderer.geometry.handle(),
            layout: renderer.geometry.layout(),
            descriptor_set: renderer.descriptor_sets.get(slot)?,
        };
        record_draw(renderer.context.device(), renderer.command_buffer(slot)?, &target)
    }

    fn submit(&mut self, slot: usize) -> VulkanResult<()> {
        let renderer = &*self.renderer;
        let sync = renderer.frame_sync.get(slot)?;

        let wait_semaphores = [sync.image_available.handle()];
        let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let command_buffers = [renderer.command_buffer(slot)?];
        let signal_semaphores = [sync.render_finished.handle()];

        let submit_info = vk::SubmitInfo::builder()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores);

        unsafe {
            renderer
                .context
                .device()
                .queue_submit(renderer.context.graphics_queue(), &[submit_info.build()], sync.in_flight.handle())
                .map_err(VulkanError::Api)
        }
    }

    fn present(&mut self, slot: usize, image_index: u32) -> VulkanResult<SurfaceStatus> {
        let renderer = &*self.renderer;
        let wait = renderer.frame_sync.get(slot)?.render_finished.handle();
        renderer
            .swapchain
            .present(renderer.context.present_queue(), wait, image_index)
    }

    fn rebuild_swapchain(&mut self) -> VulkanResult<()> {
        let renderer = &mut *self.renderer;
        renderer
            .swapchain
            .rebuild(&renderer.context, &mut *self.window, renderer.render_pass.handle())
    }

    fn swapchain_valid(&self) -> bool {
        self.renderer.swapchain.valid()
    }
}
