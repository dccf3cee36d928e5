//! Buffer management for vertex, index and uniform data
//!
//! [`Buffer`] owns a buffer with its dedicated allocation. [`StagedBuffer`]
//! pairs a host-visible staging buffer with a device-local destination and
//! enforces the map/put/copy upload protocol.

use ash::{vk, Device};
use std::ptr::NonNull;

use super::commands::CommandPool;
use super::{VulkanError, VulkanResult};
use crate::vertex::Vertex;

/// Find a memory type index matching `type_filter` with all of `properties`
pub fn find_memory_type(
    memory_properties: &vk::PhysicalDeviceMemoryProperties,
    type_filter: u32,
    properties: vk::MemoryPropertyFlags,
) -> VulkanResult<u32> {
    let count = memory_properties.memory_type_count as usize;
    memory_properties.memory_types[..count]
        .iter()
        .enumerate()
        .find(|(i, memory_type)| {
            (type_filter & (1 << i)) != 0 && memory_type.property_flags.contains(properties)
        })
        .map(|(i, _)| i as u32)
        .ok_or(VulkanError::NoSuitableMemoryType)
}

/// Host-writable memory behind a staged upload
pub trait StagingMemory {
    /// Size of the region in bytes
    fn capacity(&self) -> vk::DeviceSize;

    /// Map the whole region for host writes
    fn map(&mut self) -> VulkanResult<()>;

    /// Release the host mapping
    fn unmap(&mut self);

    /// Copy `bytes` into the mapped region at `offset`
    fn write(&mut self, offset: vk::DeviceSize, bytes: &[u8]) -> VulkanResult<()>;
}

/// Buffer wrapper with memory management
pub struct Buffer {
    device: Device,
    buffer: vk::Buffer,
    memory: vk::DeviceMemory,
    size: vk::DeviceSize,
    mapped: Option<NonNull<u8>>,
}

impl Buffer {
    /// Create a new buffer bound to a fresh allocation
    pub fn new(
        device: Device,
        memory_properties: &vk::PhysicalDeviceMemoryProperties,
        size: vk::DeviceSize,
        usage: vk::BufferUsageFlags,
        properties: vk::MemoryPropertyFlags,
    ) -> VulkanResult<Self> {
        let buffer_info = vk::BufferCreateInfo::builder()
            .size(size)
            .usage(usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE);

        let buffer = unsafe {
            device.create_buffer(&buffer_info, None)
                .map_err(VulkanError::Api)?
        };

        let mem_requirements = unsafe { device.get_buffer_memory_requirements(buffer) };

        let memory_type_index = match find_memory_type(
            memory_properties,
            mem_requirements.memory_type_bits,
            properties,
        ) {
            Ok(index) => index,
            Err(e) => {
                unsafe { device.destroy_buffer(buffer, None) };
                return Err(e);
            }
        };

        let alloc_info = vk::MemoryAllocateInfo::builder()
            .allocation_size(mem_requirements.size)
            .memory_type_index(memory_type_index);

        let memory = match unsafe { device.allocate_memory(&alloc_info, None) } {
            Ok(memory) => memory,
            Err(e) => {
                unsafe { device.destroy_buffer(buffer, None) };
                return Err(VulkanError::Api(e));
            }
        };

        if let Err(e) = unsafe { device.bind_buffer_memory(buffer, memory, 0) } {
            unsafe {
                device.destroy_buffer(buffer, None);
                device.free_memory(memory, None);
            }
            return Err(VulkanError::Api(e));
        }

        Ok(Self {
            device,
            buffer,
            memory,
            size,
            mapped: None,
        })
    }

    /// Get buffer handle
    pub fn handle(&self) -> vk::Buffer {
        self.buffer
    }

    /// Get size
    pub fn size(&self) -> vk::DeviceSize {
        self.size
    }

    /// Whether the memory is currently mapped
    pub fn is_mapped(&self) -> bool {
        self.mapped.is_some()
    }
}

impl StagingMemory for Buffer {
    fn capacity(&self) -> vk::DeviceSize {
        self.size
    }

    fn map(&mut self) -> VulkanResult<()> {
        if self.mapped.is_some() {
            return Ok(());
        }
        let ptr = unsafe {
            self.device
                .map_memory(self.memory, 0, self.size, vk::MemoryMapFlags::empty())
                .map_err(VulkanError::Api)?
        };
        self.mapped = NonNull::new(ptr.cast::<u8>());
        if self.mapped.is_none() {
            return Err(VulkanError::InvalidOperation {
                reason: "vkMapMemory returned a null pointer".to_string(),
            });
        }
        Ok(())
    }

    fn unmap(&mut self) {
        if self.mapped.take().is_some() {
            unsafe {
                self.device.unmap_memory(self.memory);
            }
        }
    }

    fn write(&mut self, offset: vk::DeviceSize, bytes: &[u8]) -> VulkanResult<()> {
        let Some(ptr) = self.mapped else {
            return Err(VulkanError::InvalidOperation {
                reason: "buffer memory is not mapped".to_string(),
            });
        };
        let end = offset + bytes.len() as vk::DeviceSize;
        if end > self.size {
            return Err(VulkanError::BufferOverflow {
                requested: end,
                capacity: self.size,
            });
        }
        // The mapping spans the whole buffer and `end <= size` was checked above.
        unsafe {
            std::ptr::copy_nonoverlapping(bytes.as_ptr(), ptr.as_ptr().add(offset as usize), bytes.len());
        }
        Ok(())
    }
}

impl Drop for Buffer {
    fn drop(&mut self) {
        unsafe {
            if self.mapped.take().is_some() {
                self.device.unmap_memory(self.memory);
            }
            self.device.destroy_buffer(self.buffer, None);
            self.device.free_memory(self.memory, None);
        }
    }
}

/// Where `put` placed the geometry inside a staged buffer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StagedLayout {
    /// Number of vertices written
    pub vertex_count: u32,
    /// Bytes of vertex data, which is also the offset of the index data
    pub vertex_bytes: vk::DeviceSize,
    /// Number of indices written
    pub index_count: u32,
    /// Bytes of index data
    pub index_bytes: vk::DeviceSize,
}

impl StagedLayout {
    /// Offset of the first index
    pub const fn index_offset(&self) -> vk::DeviceSize {
        self.vertex_bytes
    }

    /// Total bytes written
    pub const fn total_bytes(&self) -> vk::DeviceSize {
        self.vertex_bytes + self.index_bytes
    }
}

/// Staging buffer paired with a device-local destination
///
/// Writes land in the staging memory between [`map`](Self::map) and
/// [`unmap`](Self::unmap); the destination only sees them after
/// [`staging_to_buffer`](StagedBuffer::staging_to_buffer).
pub struct StagedBuffer<S: StagingMemory = Buffer> {
    staging: S,
    destination: S,
    mapped: bool,
    layout: StagedLayout,
}

impl<S: StagingMemory> StagedBuffer<S> {
    /// Pair an existing staging region with its destination
    pub fn from_parts(staging: S, destination: S) -> Self {
        Self {
            staging,
            destination,
            mapped: false,
            layout: StagedLayout::default(),
        }
    }

    /// Map the staging memory; mapping twice is reported and skipped
    pub fn map(&mut self) -> VulkanResult<()> {
        if self.mapped {
            log::error!("Attempted to map an already mapped vertex buffer.");
            return Ok(());
        }
        self.staging.map()?;
        self.mapped = true;
        Ok(())
    }

    /// Unmap the staging memory; unmapping while unmapped is reported and skipped
    pub fn unmap(&mut self) -> VulkanResult<()> {
        if !self.mapped {
            log::error!("Attempted to unmap an unmapped buffer.");
            return Ok(());
        }
        self.staging.unmap();
        self.mapped = false;
        Ok(())
    }

    /// Whether the staging memory is mapped
    pub fn is_mapped(&self) -> bool {
        self.mapped
    }

    /// Write vertices, then indices immediately after them
    pub fn put(&mut self, vertices: &[Vertex], indices: &[u16]) -> VulkanResult<()> {
        if !self.mapped {
            return Err(VulkanError::InvalidOperation {
                reason: "put called on an unmapped staged buffer".to_string(),
            });
        }

        let vertex_data: &[u8] = bytemuck::cast_slice(vertices);
        let index_data: &[u8] = bytemuck::cast_slice(indices);
        let layout = StagedLayout {
            vertex_count: vertices.len() as u32,
            vertex_bytes: vertex_data.len() as vk::DeviceSize,
            index_count: indices.len() as u32,
            index_bytes: index_data.len() as vk::DeviceSize,
        };

        let capacity = self.staging.capacity();
        if layout.total_bytes() > capacity {
            return Err(VulkanError::BufferOverflow {
                requested: layout.total_bytes(),
                capacity,
            });
        }

        self.staging.write(0, vertex_data)?;
        self.staging.write(layout.index_offset(), index_data)?;
        self.layout = layout;
        Ok(())
    }

    /// Layout recorded by the last successful `put`
    pub fn layout(&self) -> StagedLayout {
        self.layout
    }

    /// Size of both buffers in bytes
    pub fn size(&self) -> vk::DeviceSize {
        self.staging.capacity()
    }

    /// Staging side
    pub fn staging(&self) -> &S {
        &self.staging
    }

    /// Device-local side
    pub fn destination(&self) -> &S {
        &self.destination
    }
}

impl StagedBuffer<Buffer> {
    /// Create a host-visible staging buffer and a device-local vertex/index buffer of `size` bytes
    pub fn allocate(
        device: &Device,
        memory_properties: &vk::PhysicalDeviceMemoryProperties,
        size: vk::DeviceSize,
    ) -> VulkanResult<Self> {
        let staging = Buffer::new(
            device.clone(),
            memory_properties,
            size,
            vk::BufferUsageFlags::TRANSFER_SRC,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
        )?;

        let destination = Buffer::new(
            device.clone(),
            memory_properties,
            size,
            vk::BufferUsageFlags::TRANSFER_DST
                | vk::BufferUsageFlags::VERTEX_BUFFER
                | vk::BufferUsageFlags::INDEX_BUFFER,
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
        )?;

        Ok(Self::from_parts(staging, destination))
    }

    /// Copy the whole staging region into the device-local buffer and wait for it
    pub fn staging_to_buffer(&self, pool: &CommandPool, queue: vk::Queue) -> VulkanResult<()> {
        let region = vk::BufferCopy::builder().size(self.size()).build();
        let (src, dst) = (self.staging.handle(), self.destination.handle());

        pool.submit_one_time(queue, |device, command_buffer| unsafe {
            device.cmd_copy_buffer(command_buffer, src, dst, &[region]);
        })
    }

    /// Device-local buffer handle used for drawing
    pub fn handle(&self) -> vk::Buffer {
        self.destination.handle()
    }
}

impl<S: StagingMemory> Drop for StagedBuffer<S> {
    fn drop(&mut self) {
        if self.mapped {
            self.staging.unmap();
            self.mapped = false;
        }
    }
}
