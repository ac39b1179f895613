//! RAII wrappers for Vulkan synchronization objects

use std::time::Duration;

use ash::{vk, Device};

use crate::error::{KvfError, KvfResult};

/// Default timeout for fence waits
pub const FENCE_TIMEOUT: Duration = Duration::from_secs(5);

/// GPU-GPU synchronization primitive with automatic resource management
pub struct Semaphore {
    device: Device,
    semaphore: vk::Semaphore,
}

impl Semaphore {
    /// Create a new binary semaphore
    pub fn new(device: Device) -> KvfResult<Self> {
        let create_info = vk::SemaphoreCreateInfo::builder();

        let semaphore = unsafe { device.create_semaphore(&create_info, None).map_err(KvfError::Api)? };

        Ok(Self { device, semaphore })
    }

    /// Get the semaphore handle
    pub fn handle(&self) -> vk::Semaphore {
        self.semaphore
    }
}

impl Drop for Semaphore {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_semaphore(self.semaphore, None);
        }
    }
}

/// Fence wrapper with RAII cleanup
pub struct Fence {
    device: Device,
    fence: vk::Fence,
}

impl Fence {
    /// Create a new fence
    pub fn new(device: Device, signaled: bool) -> KvfResult<Self> {
        let flags = if signaled {
            vk::FenceCreateFlags::SIGNALED
        } else {
            vk::FenceCreateFlags::empty()
        };

        let create_info = vk::FenceCreateInfo::builder().flags(flags);

        let fence = unsafe { device.create_fence(&create_info, None).map_err(KvfError::Api)? };

        Ok(Self { device, fence })
    }

    /// Wait for the fence to be signaled
    pub fn wait(&self, timeout: Duration) -> KvfResult<()> {
        wait_for_fence(&self.device, self.fence, timeout)
    }

    /// Reset fence
    pub fn reset(&self) -> KvfResult<()> {
        unsafe { self.device.reset_fences(&[self.fence]).map_err(KvfError::Api) }
    }

    /// Get the fence handle
    pub fn handle(&self) -> vk::Fence {
        self.fence
    }
}

impl Drop for Fence {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_fence(self.fence, None);
        }
    }
}

/// Block until `fence` is signaled. A timeout is reported as [`KvfError::FenceTimeout`].
pub fn wait_for_fence(device: &Device, fence: vk::Fence, timeout: Duration) -> KvfResult<()> {
    let nanos = u64::try_from(timeout.as_nanos()).unwrap_or(u64::MAX);
    match unsafe { device.wait_for_fences(&[fence], true, nanos) } {
        Ok(()) => Ok(()),
        Err(vk::Result::TIMEOUT) => Err(KvfError::FenceTimeout),
        Err(err) => Err(KvfError::Api(err)),
    }
}
