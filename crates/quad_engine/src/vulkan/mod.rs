//! Vulkan backend
//!
//! RAII wrappers over the objects the quad demo needs. Every native call site
//! returns [`VulkanResult`].

pub mod buffer;
pub mod commands;
pub mod context;
pub mod descriptor;
pub mod error;
pub mod pipeline;
pub mod render_pass;
pub mod swapchain;
pub mod sync;
pub mod uniform;

pub use buffer::{Buffer, StagedBuffer, StagedLayout, StagingMemory};
pub use commands::{record_draw, CommandPool, DrawTarget};
pub use context::{LogicalDevice, PhysicalDeviceInfo, QueueFamilies, VulkanContext, VulkanInstance};
pub use descriptor::{DescriptorSetLayout, DescriptorSetLayoutBuilder, UniformDescriptorSets};
pub use error::{SurfaceStatus, VulkanError, VulkanResult};
pub use pipeline::{GraphicsPipeline, ShaderModule};
pub use render_pass::RenderPass;
pub use swapchain::{RenderingSwapchain, SwapchainImages};
pub use sync::{Fence, FrameSync, FrameSyncSet, Semaphore};
pub use uniform::{UniformBufferObject, UniformBuffers};
