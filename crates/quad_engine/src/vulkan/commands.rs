//! Command buffer management
//!
//! Command pool ownership, one-shot transfer submission, and recording of the
//! per-frame draw commands.

use ash::{vk, Device};

use super::buffer::StagedLayout;
use super::{VulkanError, VulkanResult};

/// Command pool wrapper with RAII cleanup
pub struct CommandPool {
    device: Device,
    command_pool: vk::CommandPool,
}

impl CommandPool {
    /// Create a pool whose buffers can be reset individually
    pub fn new(device: Device, queue_family_index: u32) -> VulkanResult<Self> {
        let pool_create_info = vk::CommandPoolCreateInfo::builder()
            .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER)
            .queue_family_index(queue_family_index);

        let command_pool = unsafe {
            device.create_command_pool(&pool_create_info, None)
                .map_err(VulkanError::Api)?
        };

        Ok(Self {
            device,
            command_pool,
        })
    }

    /// Allocate primary command buffers
    pub fn allocate_command_buffers(&self, count: u32) -> VulkanResult<Vec<vk::CommandBuffer>> {
        let alloc_info = vk::CommandBufferAllocateInfo::builder()
            .command_pool(self.command_pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(count);

        unsafe {
            self.device.allocate_command_buffers(&alloc_info)
                .map_err(VulkanError::Api)
        }
    }

    /// Record commands with `record`, submit them to `queue` and block until they finish
    pub fn submit_one_time<F>(&self, queue: vk::Queue, record: F) -> VulkanResult<()>
    where
        F: FnOnce(&Device, vk::CommandBuffer),
    {
        let command_buffers = self.allocate_command_buffers(1)?;
        let Some(&command_buffer) = command_buffers.first() else {
            return Err(VulkanError::InvalidOperation {
                reason: "command buffer allocation returned nothing".to_string(),
            });
        };
        let result = self.run_one_time(queue, command_buffer, record);

        unsafe {
            self.device.free_command_buffers(self.command_pool, &command_buffers);
        }
        result
    }

    fn run_one_time<F>(&self, queue: vk::Queue, command_buffer: vk::CommandBuffer, record: F) -> VulkanResult<()>
    where
        F: FnOnce(&Device, vk::CommandBuffer),
    {
        let begin_info = vk::CommandBufferBeginInfo::builder()
            .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);

        unsafe {
            self.device.begin_command_buffer(command_buffer, &begin_info)
                .map_err(VulkanError::Api)?;
        }

        record(&self.device, command_buffer);

        let command_buffers = [command_buffer];
        let submit_info = vk::SubmitInfo::builder().command_buffers(&command_buffers);

        unsafe {
            self.device.end_command_buffer(command_buffer)
                .map_err(VulkanError::Api)?;
            self.device
                .queue_submit(queue, &[submit_info.build()], vk::Fence::null())
                .map_err(VulkanError::Api)?;
            self.device.queue_wait_idle(queue)
                .map_err(VulkanError::Api)
        }
    }

    /// Get the command pool handle
    pub fn handle(&self) -> vk::CommandPool {
        self.command_pool
    }
}

impl Drop for CommandPool {
    fn drop(&mut self) {
        unsafe {
            // Destroying the pool frees every buffer allocated from it.
            self.device.destroy_command_pool(self.command_pool, None);
        }
    }
}

/// Everything one frame's draw commands reference
#[derive(Debug, Clone, Copy)]
pub struct DrawTarget {
    /// Render pass to begin
    pub render_pass: vk::RenderPass,
    /// Framebuffer of the acquired swapchain image
    pub framebuffer: vk::Framebuffer,
    /// Render area and viewport size
    pub extent: vk::Extent2D,
    /// Graphics pipeline to bind
    pub pipeline: vk::Pipeline,
    /// Layout the descriptor set is bound against
    pub pipeline_layout: vk::PipelineLayout,
    /// Device-local buffer holding vertices followed by indices
    pub geometry: vk::Buffer,
    /// Where vertices and indices sit inside `geometry`
    pub layout: StagedLayout,
    /// Uniform buffer descriptor set of the frame slot
    pub descriptor_set: vk::DescriptorSet,
}

/// Clear color of the render pass
pub const CLEAR_COLOR: [f32; 4] = [0.0, 0.0, 0.0, 1.0];

/// Record the quad draw into `command_buffer`
///
/// `Ok` means the buffer is fully recorded and ready to submit.
pub fn record_draw(device: &Device, command_buffer: vk::CommandBuffer, target: &DrawTarget) -> VulkanResult<()> {
    let begin_info = vk::CommandBufferBeginInfo::builder();

    unsafe {
        device.begin_command_buffer(command_buffer, &begin_info)
            .map_err(VulkanError::Api)?;
    }

    let clear_values = [vk::ClearValue {
        color: vk::ClearColorValue { float32: CLEAR_COLOR },
    }];

    let render_pass_info = vk::RenderPassBeginInfo::builder()
        .render_pass(target.render_pass)
        .framebuffer(target.framebuffer)
        .render_area(vk::Rect2D {
            offset: vk::Offset2D { x: 0, y: 0 },
            extent: target.extent,
        })
        .clear_values(&clear_values);

    let viewport = vk::Viewport::builder()
        .x(0.0)
        .y(0.0)
        .width(target.extent.width as f32)
        .height(target.extent.height as f32)
        .min_depth(0.0)
        .max_depth(1.0)
        .build();

    let scissor = vk::Rect2D {
        offset: vk::Offset2D { x: 0, y: 0 },
        extent: target.extent,
    };

    unsafe {
        device.cmd_begin_render_pass(command_buffer, &render_pass_info, vk::SubpassContents::INLINE);
        device.cmd_bind_pipeline(command_buffer, vk::PipelineBindPoint::GRAPHICS, target.pipeline);
        device.cmd_set_viewport(command_buffer, 0, &[viewport]);
        device.cmd_set_scissor(command_buffer, 0, &[scissor]);

        device.cmd_bind_vertex_buffers(command_buffer, 0, &[target.geometry], &[0]);
        device.cmd_bind_index_buffer(
            command_buffer,
            target.geometry,
            target.layout.index_offset(),
            vk::IndexType::UINT16,
        );
        device.cmd_bind_descriptor_sets(
            command_buffer,
            vk::PipelineBindPoint::GRAPHICS,
            target.pipeline_layout,
            0,
            &[target.descriptor_set],
            &[],
        );
        device.cmd_draw_indexed(command_buffer, target.layout.index_count, 1, 0, 0, 0);

        device.cmd_end_render_pass(command_buffer);
        device.end_command_buffer(command_buffer)
            .map_err(VulkanError::Api)
    }
}
