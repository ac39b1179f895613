//! GPU buffers allocated through VMA

use std::ptr::NonNull;
use std::sync::Arc;

use ash::vk;
use vk_mem::Alloc;

use crate::buffer_write::{total_len, BufferWrite};
use crate::error::{KvfError, KvfResult};
use crate::render::api::RenderApi;
use crate::render::command_buffer::CommandBuffer;

/// Where a buffer's memory lives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BufferType {
    /// Host visible and persistently mapped
    #[default]
    Host,
    /// Device local, written through a staging copy
    Device,
}

/// Parameters shared by every allocation of a [`Buffer`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BufferCreateInfo {
    /// Buffer usage
    pub usage: vk::BufferUsageFlags,
    /// Memory placement
    pub kind: BufferType,
}

impl BufferCreateInfo {
    fn vk_usage(&self) -> vk::BufferUsageFlags {
        match self.kind {
            BufferType::Host => self.usage,
            BufferType::Device => self.usage | vk::BufferUsageFlags::TRANSFER_DST,
        }
    }

    fn allocation_info(&self) -> vk_mem::AllocationCreateInfo {
        vk_mem::AllocationCreateInfo {
            usage: match self.kind {
                BufferType::Host => vk_mem::MemoryUsage::AutoPreferHost,
                BufferType::Device => vk_mem::MemoryUsage::AutoPreferDevice,
            },
            flags: vk_mem::AllocationCreateFlags::HOST_ACCESS_SEQUENTIAL_WRITE,
            ..Default::default()
        }
    }
}

/// Resizable buffer. Shrinking keeps the existing allocation.
pub struct Buffer {
    buffer: vk::Buffer,
    allocation: Option<vk_mem::Allocation>,
    mapped: Option<NonNull<u8>>,
    size: vk::DeviceSize,
    capacity: vk::DeviceSize,
    info: BufferCreateInfo,
    api: Arc<RenderApi>,
}

impl Buffer {
    /// Create a buffer of at least `size` bytes
    pub fn new(api: Arc<RenderApi>, info: BufferCreateInfo, size: vk::DeviceSize) -> KvfResult<Self> {
        let mut ret = Self {
            buffer: vk::Buffer::null(),
            allocation: None,
            mapped: None,
            size: 0,
            capacity: 0,
            info,
            api,
        };
        ret.resize(size)?;
        Ok(ret)
    }

    /// Set the usable size, reallocating only when `size` exceeds the capacity
    pub fn resize(&mut self, size: vk::DeviceSize) -> KvfResult<()> {
        let size = size.max(1);
        if size <= self.capacity {
            self.size = size;
            return Ok(());
        }
        self.destroy();

        let buffer_info = vk::BufferCreateInfo::builder()
            .size(size)
            .usage(self.info.vk_usage())
            .sharing_mode(vk::SharingMode::EXCLUSIVE);
        let allocator = self.api.allocator();
        let (buffer, mut allocation) = unsafe {
            allocator
                .create_buffer(&buffer_info, &self.info.allocation_info())
                .map_err(KvfError::Api)?
        };
        if self.info.kind == BufferType::Host {
            match unsafe { allocator.map_memory(&mut allocation) } {
                Ok(ptr) => self.mapped = NonNull::new(ptr),
                Err(err) => {
                    unsafe { allocator.destroy_buffer(buffer, &mut allocation) };
                    return Err(KvfError::Api(err));
                }
            }
        }
        self.buffer = buffer;
        self.allocation = Some(allocation);
        self.size = size;
        self.capacity = size;
        Ok(())
    }

    fn destroy(&mut self) {
        if let Some(mut allocation) = self.allocation.take() {
            let allocator = self.api.allocator();
            unsafe {
                if self.mapped.take().is_some() {
                    allocator.unmap_memory(&mut allocation);
                }
                allocator.destroy_buffer(self.buffer, &mut allocation);
            }
        }
        self.buffer = vk::Buffer::null();
        self.size = 0;
        self.capacity = 0;
    }

    /// Write `write` at byte `offset` without resizing
    pub fn write_in_place(&mut self, write: BufferWrite<'_>, offset: vk::DeviceSize) -> KvfResult<()> {
        if write.is_empty() {
            return Ok(());
        }
        let end = offset + write.len() as vk::DeviceSize;
        if end > self.size {
            return Err(KvfError::invalid(format!(
                "buffer write of {} bytes at {offset} exceeds size {}",
                write.len(),
                self.size
            )));
        }
        if let Some(mapped) = self.mapped_bytes() {
            mapped[offset as usize..end as usize].copy_from_slice(write.bytes());
            return Ok(());
        }
        self.staged_write(write, offset)
    }

    fn staged_write(&self, write: BufferWrite<'_>, offset: vk::DeviceSize) -> KvfResult<()> {
        let staging_info = BufferCreateInfo {
            usage: vk::BufferUsageFlags::TRANSFER_SRC,
            kind: BufferType::Host,
        };
        let mut staging = Self::new(Arc::clone(&self.api), staging_info, write.len() as vk::DeviceSize)?;
        staging.write_in_place(write, 0)?;

        let cmd = CommandBuffer::new(Arc::clone(&self.api))?;
        let regions = [vk::BufferCopy2::builder()
            .src_offset(0)
            .dst_offset(offset)
            .size(write.len() as vk::DeviceSize)
            .build()];
        let copy_info = vk::CopyBufferInfo2::builder()
            .src_buffer(staging.handle())
            .dst_buffer(self.buffer)
            .regions(&regions);
        unsafe { self.api.device().cmd_copy_buffer2(cmd.handle(), &copy_info) };
        cmd.submit_and_wait()
    }

    /// Resize to fit `write` and write it at the start
    pub fn overwrite(&mut self, write: BufferWrite<'_>) -> KvfResult<()> {
        self.resize(write.len() as vk::DeviceSize)?;
        self.write_in_place(write, 0)
    }

    /// Resize to fit every write and write them back to back
    pub fn overwrite_contiguous(&mut self, writes: &[BufferWrite<'_>]) -> KvfResult<()> {
        self.resize(total_len(writes) as vk::DeviceSize)?;
        if self.mapped.is_some() {
            let mut offset = 0;
            for write in writes {
                self.write_in_place(*write, offset)?;
                offset += write.len() as vk::DeviceSize;
            }
            return Ok(());
        }
        let bytes: Vec<u8> = writes.iter().flat_map(|write| write.bytes().iter().copied()).collect();
        self.write_in_place(BufferWrite::from_bytes(&bytes), 0)
    }

    /// Host view of the buffer, if it is mapped
    pub fn mapped_bytes(&mut self) -> Option<&mut [u8]> {
        let mapped = self.mapped?;
        // SAFETY: the mapping covers `capacity >= size` bytes and lives as long as the allocation.
        Some(unsafe { std::slice::from_raw_parts_mut(mapped.as_ptr(), self.size as usize) })
    }

    /// Descriptor covering the whole buffer
    pub fn descriptor_info(&self) -> vk::DescriptorBufferInfo {
        vk::DescriptorBufferInfo {
            buffer: self.buffer,
            offset: 0,
            range: self.size,
        }
    }

    /// Buffer handle
    pub fn handle(&self) -> vk::Buffer {
        self.buffer
    }

    /// Usable size in bytes
    pub fn size(&self) -> vk::DeviceSize {
        self.size
    }

    /// Allocated size in bytes
    pub fn capacity(&self) -> vk::DeviceSize {
        self.capacity
    }

    /// Creation parameters
    pub fn info(&self) -> BufferCreateInfo {
        self.info
    }
}

impl Drop for Buffer {
    fn drop(&mut self) {
        self.destroy();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_buffers_are_transfer_targets() {
        let info = BufferCreateInfo {
            usage: vk::BufferUsageFlags::VERTEX_BUFFER,
            kind: BufferType::Device,
        };
        assert!(info.vk_usage().contains(vk::BufferUsageFlags::TRANSFER_DST));
        assert!(matches!(info.allocation_info().usage, vk_mem::MemoryUsage::AutoPreferDevice));

        let host = BufferCreateInfo {
            kind: BufferType::Host,
            ..info
        };
        assert_eq!(host.vk_usage(), vk::BufferUsageFlags::VERTEX_BUFFER);
        assert!(matches!(host.allocation_info().usage, vk_mem::MemoryUsage::AutoPreferHost));
    }
}
