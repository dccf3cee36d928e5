//! Vulkan swapchain management
//!
//! [`RenderingSwapchain`] owns the swapchain together with its image views and
//! framebuffers, and rebuilds all three in place when the surface changes.

use ash::extensions::khr::Swapchain as SwapchainLoader;
use ash::{vk, Device};

use super::context::VulkanContext;
use super::error::{classify_acquire, classify_present, SurfaceStatus};
use super::{VulkanError, VulkanResult};
use crate::window::{wait_for_framebuffer, FramebufferSource};

/// Prefer 8-bit sRGB BGRA, otherwise take whatever the surface lists first
pub fn choose_surface_format(formats: &[vk::SurfaceFormatKHR]) -> Option<vk::SurfaceFormatKHR> {
    formats
        .iter()
        .find(|sf| sf.format == vk::Format::B8G8R8A8_SRGB && sf.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR)
        .or_else(|| formats.first())
        .copied()
}

/// Mailbox when offered, otherwise FIFO, which every device supports
pub fn choose_present_mode(present_modes: &[vk::PresentModeKHR]) -> vk::PresentModeKHR {
    present_modes
        .iter()
        .copied()
        .find(|&mode| mode == vk::PresentModeKHR::MAILBOX)
        .unwrap_or(vk::PresentModeKHR::FIFO)
}

/// Surface extent, or the framebuffer size clamped to the surface limits when the surface leaves it open
pub fn choose_extent(caps: &vk::SurfaceCapabilitiesKHR, framebuffer_size: (u32, u32)) -> vk::Extent2D {
    if caps.current_extent.width != u32::MAX {
        return caps.current_extent;
    }

    let (width, height) = framebuffer_size;
    vk::Extent2D {
        width: width.clamp(caps.min_image_extent.width, caps.max_image_extent.width),
        height: height.clamp(caps.min_image_extent.height, caps.max_image_extent.height),
    }
}

/// One image more than the minimum, capped by the maximum when there is one
pub fn choose_image_count(caps: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let desired = caps.min_image_count + 1;
    if caps.max_image_count > 0 {
        desired.min(caps.max_image_count)
    } else {
        desired
    }
}

/// Raw handles owned by a swapchain generation
#[derive(Debug, Default)]
pub struct SwapchainImages {
    /// Swapchain handle
    pub swapchain: vk::SwapchainKHR,
    /// Presentable images, owned by the swapchain
    pub images: Vec<vk::Image>,
    /// One view per image
    pub image_views: Vec<vk::ImageView>,
    /// One framebuffer per view
    pub framebuffers: Vec<vk::Framebuffer>,
}

impl SwapchainImages {
    /// Every handle is non-null and the three arrays are equally long and non-empty
    pub fn valid(&self) -> bool {
        use vk::Handle;

        self.swapchain.as_raw() != 0
            && !self.images.is_empty()
            && self.images.len() == self.image_views.len()
            && self.image_views.len() == self.framebuffers.len()
            && self.images.iter().all(|image| image.as_raw() != 0)
            && self.image_views.iter().all(|view| view.as_raw() != 0)
            && self.framebuffers.iter().all(|framebuffer| framebuffer.as_raw() != 0)
    }
}

/// Swapchain with its image views and framebuffers
pub struct RenderingSwapchain {
    device: Device,
    loader: SwapchainLoader,
    handles: SwapchainImages,
    format: vk::SurfaceFormatKHR,
    extent: vk::Extent2D,
}

impl RenderingSwapchain {
    /// Create the swapchain and its image views; framebuffers come from [`populate_framebuffers`](Self::populate_framebuffers)
    pub fn build(context: &VulkanContext, framebuffer_size: (u32, u32)) -> VulkanResult<Self> {
        let mut swapchain = Self {
            device: context.raw_device(),
            loader: context.swapchain_loader().clone(),
            handles: SwapchainImages::default(),
            format: vk::SurfaceFormatKHR::default(),
            extent: vk::Extent2D::default(),
        };
        // On error the partially built swapchain is released by Drop.
        swapchain.create(context, framebuffer_size)?;
        Ok(swapchain)
    }

    fn create(&mut self, context: &VulkanContext, framebuffer_size: (u32, u32)) -> VulkanResult<()> {
        let physical_device = context.physical_device.device;
        let surface = context.surface.surface;
        let surface_loader = &context.surface.loader;

        let caps = unsafe {
            surface_loader
                .get_physical_device_surface_capabilities(physical_device, surface)
                .map_err(VulkanError::Api)?
        };
        let formats = unsafe {
            surface_loader
                .get_physical_device_surface_formats(physical_device, surface)
                .map_err(VulkanError::Api)?
        };
        let present_modes = unsafe {
            surface_loader
                .get_physical_device_surface_present_modes(physical_device, surface)
                .map_err(VulkanError::Api)?
        };

        let format = choose_surface_format(&formats).ok_or_else(|| {
            VulkanError::InitializationFailed("surface reports no formats".to_string())
        })?;
        let present_mode = choose_present_mode(&present_modes);
        let extent = choose_extent(&caps, framebuffer_size);
        let image_count = choose_image_count(&caps);

        let families = context.physical_device.queue_families;
        let family_indices = [families.graphics, families.present];
        let mut create_info = vk::SwapchainCreateInfoKHR::builder()
            .surface(surface)
            .min_image_count(image_count)
            .image_format(format.format)
            .image_color_space(format.color_space)
            .image_extent(extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
            .pre_transform(caps.current_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(present_mode)
            .clipped(true)
            .old_swapchain(vk::SwapchainKHR::null());

        create_info = if families.graphics == families.present {
            create_info.image_sharing_mode(vk::SharingMode::EXCLUSIVE)
        } else {
            create_info
                .image_sharing_mode(vk::SharingMode::CONCURRENT)
                .queue_family_indices(&family_indices)
        };

        self.handles.swapchain = unsafe {
            self.loader
                .create_swapchain(&create_info, None)
                .map_err(VulkanError::Api)?
        };
        self.format = format;
        self.extent = extent;

        self.handles.images = unsafe {
            self.loader
                .get_swapchain_images(self.handles.swapchain)
                .map_err(VulkanError::Api)?
        };

        for &image in &self.handles.images {
            let create_info = vk::ImageViewCreateInfo::builder()
                .image(image)
                .view_type(vk::ImageViewType::TYPE_2D)
                .format(format.format)
                .components(vk::ComponentMapping {
                    r: vk::ComponentSwizzle::IDENTITY,
                    g: vk::ComponentSwizzle::IDENTITY,
                    b: vk::ComponentSwizzle::IDENTITY,
                    a: vk::ComponentSwizzle::IDENTITY,
                })
                .subresource_range(vk::ImageSubresourceRange {
                    aspect_mask: vk::ImageAspectFlags::COLOR,
                    base_mip_level: 0,
                    level_count: 1,
                    base_array_layer: 0,
                    layer_count: 1,
                });

            let view = unsafe {
                self.device
                    .create_image_view(&create_info, None)
                    .map_err(VulkanError::Api)?
            };
            self.handles.image_views.push(view);
        }

        log::info!(
            "Created swapchain: {} images, {}x{}, {:?}, {:?}.",
            self.handles.images.len(),
            extent.width,
            extent.height,
            format.format,
            present_mode
        );
        Ok(())
    }

    /// Create one framebuffer per image view for `render_pass`
    pub fn populate_framebuffers(&mut self, render_pass: vk::RenderPass) -> VulkanResult<()> {
        for &view in &self.handles.image_views {
            let attachments = [view];
            let create_info = vk::FramebufferCreateInfo::builder()
                .render_pass(render_pass)
                .attachments(&attachments)
                .width(self.extent.width)
                .height(self.extent.height)
                .layers(1);

            let framebuffer = unsafe {
                self.device
                    .create_framebuffer(&create_info, None)
                    .map_err(VulkanError::Api)?
            };
            self.handles.framebuffers.push(framebuffer);
        }
        Ok(())
    }

    /// Whether the swapchain can be rendered to
    pub fn valid(&self) -> bool {
        self.handles.valid()
    }

    /// Replace swapchain, views and framebuffers for the current window size
    ///
    /// Blocks while the window is minimized.
    pub fn rebuild<W: FramebufferSource + ?Sized>(
        &mut self,
        context: &VulkanContext,
        window: &mut W,
        render_pass: vk::RenderPass,
    ) -> VulkanResult<()> {
        let framebuffer_size = wait_for_framebuffer(window);
        context.device.wait_idle()?;

        let old_format = self.format.format;
        self.destroy();
        self.create(context, framebuffer_size)?;
        if self.format.format != old_format {
            log::warn!(
                "Swapchain format changed from {:?} to {:?} on rebuild.",
                old_format,
                self.format.format
            );
        }
        self.populate_framebuffers(render_pass)?;

        log::info!("Swapchain rebuilt.");
        Ok(())
    }

    /// Acquire the next image, signalling `semaphore` when it is ready
    pub fn acquire_next_image(&self, semaphore: vk::Semaphore) -> VulkanResult<(Option<u32>, SurfaceStatus)> {
        let result = unsafe {
            self.loader
                .acquire_next_image(self.handles.swapchain, u64::MAX, semaphore, vk::Fence::null())
        };
        classify_acquire(result)
    }

    /// Queue `image_index` for presentation once `wait` is signaled
    pub fn present(&self, queue: vk::Queue, wait: vk::Semaphore, image_index: u32) -> VulkanResult<SurfaceStatus> {
        let wait_semaphores = [wait];
        let swapchains = [self.handles.swapchain];
        let image_indices = [image_index];

        let present_info = vk::PresentInfoKHR::builder()
            .wait_semaphores(&wait_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        let result = unsafe { self.loader.queue_present(queue, &present_info) };
        classify_present(result)
    }

    /// Framebuffer of swapchain image `image_index`
    pub fn framebuffer(&self, image_index: u32) -> VulkanResult<vk::Framebuffer> {
        self.handles
            .framebuffers
            .get(image_index as usize)
            .copied()
            .ok_or_else(|| VulkanError::InvalidOperation {
                reason: format!("no framebuffer for swapchain image {}", image_index),
            })
    }

    /// Current image extent
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    /// Current surface format
    pub fn format(&self) -> vk::Format {
        self.format.format
    }

    /// Number of swapchain images
    pub fn image_count(&self) -> usize {
        self.handles.images.len()
    }

    fn destroy(&mut self) {
        use vk::Handle;

        unsafe {
            for framebuffer in self.handles.framebuffers.drain(..) {
                self.device.destroy_framebuffer(framebuffer, None);
            }
            for view in self.handles.image_views.drain(..) {
                self.device.destroy_image_view(view, None);
            }
            self.handles.images.clear();
            if self.handles.swapchain.as_raw() != 0 {
                self.loader.destroy_swapchain(self.handles.swapchain, None);
                self.handles.swapchain = vk::SwapchainKHR::null();
            }
        }
    }
}

impl Drop for RenderingSwapchain {
    fn drop(&mut self) {
        self.destroy();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vk::Handle;

    fn caps(min: u32, max: u32) -> vk::SurfaceCapabilitiesKHR {
        vk::SurfaceCapabilitiesKHR {
            min_image_count: min,
            max_image_count: max,
            current_extent: vk::Extent2D { width: u32::MAX, height: u32::MAX },
            min_image_extent: vk::Extent2D { width: 1, height: 1 },
            max_image_extent: vk::Extent2D { width: 1920, height: 1080 },
            ..Default::default()
        }
    }

    fn complete_images(count: u64) -> SwapchainImages {
        SwapchainImages {
            swapchain: vk::SwapchainKHR::from_raw(1),
            images: (0..count).map(|i| vk::Image::from_raw(10 + i)).collect(),
            image_views: (0..count).map(|i| vk::ImageView::from_raw(20 + i)).collect(),
            framebuffers: (0..count).map(|i| vk::Framebuffer::from_raw(30 + i)).collect(),
        }
    }

    #[test]
    fn test_prefers_srgb_bgra() {
        let unorm = vk::SurfaceFormatKHR {
            format: vk::Format::R8G8B8A8_UNORM,
            color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
        };
        let srgb = vk::SurfaceFormatKHR {
            format: vk::Format::B8G8R8A8_SRGB,
            color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
        };

        let format_of = |formats: &[vk::SurfaceFormatKHR]| choose_surface_format(formats).map(|sf| sf.format);

        assert_eq!(format_of(&[unorm, srgb]), Some(vk::Format::B8G8R8A8_SRGB));
        assert_eq!(format_of(&[unorm]), Some(vk::Format::R8G8B8A8_UNORM));
        assert_eq!(format_of(&[]), None);
    }

    #[test]
    fn test_present_mode_falls_back_to_fifo() {
        assert_eq!(
            choose_present_mode(&[vk::PresentModeKHR::FIFO, vk::PresentModeKHR::MAILBOX]),
            vk::PresentModeKHR::MAILBOX
        );
        assert_eq!(
            choose_present_mode(&[vk::PresentModeKHR::IMMEDIATE]),
            vk::PresentModeKHR::FIFO
        );
    }

    #[test]
    fn test_extent_follows_surface_when_fixed() {
        let mut fixed = caps(2, 3);
        fixed.current_extent = vk::Extent2D { width: 800, height: 600 };
        assert_eq!(choose_extent(&fixed, (1024, 768)), fixed.current_extent);
    }

    #[test]
    fn test_extent_clamps_framebuffer_size() {
        let open = caps(2, 3);
        assert_eq!(
            choose_extent(&open, (4000, 600)),
            vk::Extent2D { width: 1920, height: 600 }
        );
    }

    #[test]
    fn test_image_count_respects_maximum() {
        assert_eq!(choose_image_count(&caps(2, 0)), 3);
        assert_eq!(choose_image_count(&caps(2, 8)), 3);
        assert_eq!(choose_image_count(&caps(3, 3)), 3);
    }

    #[test]
    fn test_complete_swapchain_is_valid() {
        assert!(complete_images(3).valid());
    }

    #[test]
    fn test_null_swapchain_is_invalid() {
        let mut handles = complete_images(3);
        handles.swapchain = vk::SwapchainKHR::null();
        assert!(!handles.valid());
        assert!(!SwapchainImages::default().valid());
    }

    #[test]
    fn test_missing_framebuffers_are_invalid() {
        let mut handles = complete_images(3);
        handles.framebuffers.pop();
        assert!(!handles.valid());

        handles.framebuffers.clear();
        assert!(!handles.valid());
    }

    #[test]
    fn test_null_view_is_invalid() {
        let mut handles = complete_images(2);
        handles.image_views[1] = vk::ImageView::null();
        assert!(!handles.valid());
    }
}
