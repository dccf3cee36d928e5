//! Per-frame uniform buffers
//!
//! Each frame slot owns a host-visible buffer that stays mapped for the life of
//! the renderer. A slot is only rewritten after its in-flight fence has
//! signaled, so the GPU never reads a buffer the host is writing.

use ash::{vk, Device};
use bytemuck::{Pod, Zeroable};

use super::buffer::{Buffer, StagingMemory};
use super::{VulkanError, VulkanResult};
use crate::math::{perspective_vk, to_columns, Mat4, Point3, Vec3, Vector3};

/// Transform block read by `quad.vert`, std140 compatible
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct UniformBufferObject {
    /// Model matrix, column-major
    pub model: [[f32; 4]; 4],
    /// View matrix, column-major
    pub view: [[f32; 4]; 4],
    /// Projection matrix, column-major
    pub proj: [[f32; 4]; 4],
}

impl UniformBufferObject {
    /// Size in bytes
    pub const SIZE: vk::DeviceSize = std::mem::size_of::<Self>() as vk::DeviceSize;

    /// Quad spinning about Z at 90° per second, seen from (2, 2, 2)
    pub fn rotating(elapsed_secs: f32, extent: vk::Extent2D) -> Self {
        let angle = elapsed_secs * std::f32::consts::FRAC_PI_2;
        let model = Mat4::from_axis_angle(&Vector3::z_axis(), angle);

        let view = Mat4::look_at_rh(
            &Point3::new(2.0, 2.0, 2.0),
            &Point3::origin(),
            &Vec3::z(),
        );

        let aspect = extent.width as f32 / extent.height.max(1) as f32;
        let proj = perspective_vk(std::f32::consts::FRAC_PI_4, aspect, 0.1, 10.0);

        Self {
            model: to_columns(&model),
            view: to_columns(&view),
            proj: to_columns(&proj),
        }
    }
}

/// Persistently mapped uniform buffers, one per frame slot
pub struct UniformBuffers {
    buffers: Vec<Buffer>,
}

impl UniformBuffers {
    /// Create and map `count` buffers
    pub fn new(
        device: &Device,
        memory_properties: &vk::PhysicalDeviceMemoryProperties,
        count: usize,
    ) -> VulkanResult<Self> {
        let mut buffers = Vec::with_capacity(count);
        for _ in 0..count {
            let mut buffer = Buffer::new(
                device.clone(),
                memory_properties,
                UniformBufferObject::SIZE,
                vk::BufferUsageFlags::UNIFORM_BUFFER,
                vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
            )?;
            buffer.map()?;
            buffers.push(buffer);
        }

        Ok(Self { buffers })
    }

    /// Overwrite the transform of `slot`
    pub fn update(&mut self, slot: usize, ubo: &UniformBufferObject) -> VulkanResult<()> {
        let slots = self.buffers.len();
        let buffer = self.buffers.get_mut(slot).ok_or_else(|| VulkanError::InvalidOperation {
            reason: format!("uniform slot {} out of range ({} slots)", slot, slots),
        })?;
        buffer.write(0, bytemuck::bytes_of(ubo))
    }

    /// `(buffer, range)` pairs for descriptor writes
    pub fn descriptor_targets(&self) -> Vec<(vk::Buffer, vk::DeviceSize)> {
        self.buffers
            .iter()
            .map(|buffer| (buffer.handle(), UniformBufferObject::SIZE))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::Vector4;

    const EXTENT: vk::Extent2D = vk::Extent2D { width: 800, height: 600 };

    fn model_of(ubo: &UniformBufferObject) -> Mat4 {
        Mat4::from(ubo.model)
    }

    #[test]
    fn test_block_is_three_matrices() {
        assert_eq!(UniformBufferObject::SIZE, 192);
    }

    #[test]
    fn test_model_starts_unrotated() {
        let ubo = UniformBufferObject::rotating(0.0, EXTENT);
        assert_relative_eq!(model_of(&ubo), Mat4::identity(), epsilon = 1e-6);
    }

    #[test]
    fn test_model_turns_quarter_per_second() {
        let ubo = UniformBufferObject::rotating(1.0, EXTENT);
        let rotated = model_of(&ubo) * Vector4::new(1.0, 0.0, 0.0, 1.0);
        assert_relative_eq!(rotated, Vector4::new(0.0, 1.0, 0.0, 1.0), epsilon = 1e-5);
    }

    #[test]
    fn test_origin_is_inside_the_view_volume() {
        let ubo = UniformBufferObject::rotating(0.0, EXTENT);
        let clip = Mat4::from(ubo.proj) * Mat4::from(ubo.view) * Vector4::new(0.0, 0.0, 0.0, 1.0);
        let depth = clip.z / clip.w;

        assert_relative_eq!(clip.x, 0.0, epsilon = 1e-5);
        assert_relative_eq!(clip.y, 0.0, epsilon = 1e-5);
        assert!(depth > 0.0 && depth < 1.0);
    }

    #[test]
    fn test_zero_height_extent_does_not_divide_by_zero() {
        let ubo = UniformBufferObject::rotating(0.0, vk::Extent2D { width: 800, height: 0 });
        assert!(ubo.proj.iter().flatten().all(|v| v.is_finite()));
    }
}
