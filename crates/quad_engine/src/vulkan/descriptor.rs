//! Descriptor sets for the per-frame uniform buffers
//!
//! One layout with the transform uniform at binding 0, one pool sized for the
//! frame slots, and one set per slot pointing at that slot's uniform buffer.

use ash::{vk, Device};

use super::{VulkanError, VulkanResult};

/// Descriptor set layout builder for creating reusable layouts
#[derive(Default)]
pub struct DescriptorSetLayoutBuilder {
    bindings: Vec<vk::DescriptorSetLayoutBinding>,
}

impl DescriptorSetLayoutBuilder {
    /// Create a new descriptor set layout builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a uniform buffer binding
    #[must_use]
    pub fn add_uniform_buffer(mut self, binding: u32, stage_flags: vk::ShaderStageFlags) -> Self {
        self.bindings.push(
            vk::DescriptorSetLayoutBinding::builder()
                .binding(binding)
                .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER)
                .descriptor_count(1)
                .stage_flags(stage_flags)
                .build(),
        );
        self
    }

    /// Bindings collected so far
    pub fn bindings(&self) -> &[vk::DescriptorSetLayoutBinding] {
        &self.bindings
    }

    /// Build the descriptor set layout
    pub fn build(self, device: &Device) -> VulkanResult<DescriptorSetLayout> {
        let layout_info = vk::DescriptorSetLayoutCreateInfo::builder().bindings(&self.bindings);

        let layout = unsafe { device.create_descriptor_set_layout(&layout_info, None) }
            .map_err(VulkanError::Api)?;

        Ok(DescriptorSetLayout {
            layout,
            device: device.clone(),
        })
    }
}

/// Descriptor set layout wrapper with automatic cleanup
pub struct DescriptorSetLayout {
    layout: vk::DescriptorSetLayout,
    device: Device,
}

impl DescriptorSetLayout {
    /// Layout of the quad program: the transform uniform, read by the vertex stage
    pub fn transform_layout(device: &Device) -> VulkanResult<Self> {
        DescriptorSetLayoutBuilder::new()
            .add_uniform_buffer(0, vk::ShaderStageFlags::VERTEX)
            .build(device)
    }

    /// Get the Vulkan descriptor set layout handle
    pub fn handle(&self) -> vk::DescriptorSetLayout {
        self.layout
    }
}

impl Drop for DescriptorSetLayout {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_descriptor_set_layout(self.layout, None);
        }
    }
}

/// Pool of uniform buffer descriptor sets, one per frame slot
///
/// Sets are freed together with the pool.
pub struct UniformDescriptorSets {
    pool: vk::DescriptorPool,
    sets: Vec<vk::DescriptorSet>,
    device: Device,
}

impl UniformDescriptorSets {
    /// Allocate one set per `(buffer, range)` and point it at that buffer
    pub fn new(
        device: Device,
        layout: &DescriptorSetLayout,
        buffers: &[(vk::Buffer, vk::DeviceSize)],
    ) -> VulkanResult<Self> {
        let count = buffers.len() as u32;
        let pool_sizes = [vk::DescriptorPoolSize::builder()
            .ty(vk::DescriptorType::UNIFORM_BUFFER)
            .descriptor_count(count)
            .build()];

        let pool_info = vk::DescriptorPoolCreateInfo::builder()
            .max_sets(count)
            .pool_sizes(&pool_sizes);

        let pool = unsafe { device.create_descriptor_pool(&pool_info, None) }
            .map_err(VulkanError::Api)?;

        // Owned from here on so an allocation failure still releases the pool.
        let mut this = Self {
            pool,
            sets: Vec::new(),
            device,
        };

        let layouts = vec![layout.handle(); buffers.len()];
        let alloc_info = vk::DescriptorSetAllocateInfo::builder()
            .descriptor_pool(this.pool)
            .set_layouts(&layouts);

        this.sets = unsafe { this.device.allocate_descriptor_sets(&alloc_info) }
            .map_err(VulkanError::Api)?;

        for (&set, &(buffer, range)) in this.sets.iter().zip(buffers) {
            let buffer_info = [vk::DescriptorBufferInfo::builder()
                .buffer(buffer)
                .offset(0)
                .range(range)
                .build()];

            let write = vk::WriteDescriptorSet::builder()
                .dst_set(set)
                .dst_binding(0)
                .dst_array_element(0)
                .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER)
                .buffer_info(&buffer_info);

            unsafe {
                this.device.update_descriptor_sets(&[write.build()], &[]);
            }
        }

        Ok(this)
    }

    /// Descriptor set of `slot`
    pub fn get(&self, slot: usize) -> VulkanResult<vk::DescriptorSet> {
        self.sets.get(slot).copied().ok_or_else(|| VulkanError::InvalidOperation {
            reason: format!("no descriptor set for frame slot {}", slot),
        })
    }
}

impl Drop for UniformDescriptorSets {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_descriptor_pool(self.pool, None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uniform_binding_for_vertex_stage() {
        let builder = DescriptorSetLayoutBuilder::new().add_uniform_buffer(0, vk::ShaderStageFlags::VERTEX);
        let [binding] = builder.bindings() else {
            panic!("expected exactly one binding");
        };

        assert_eq!(binding.binding, 0);
        assert_eq!(binding.descriptor_type, vk::DescriptorType::UNIFORM_BUFFER);
        assert_eq!(binding.descriptor_count, 1);
        assert_eq!(binding.stage_flags, vk::ShaderStageFlags::VERTEX);
    }
}
