//! One-shot command buffers for uploads and other blocking GPU work

use std::sync::Arc;
use std::time::Duration;

use ash::vk;

use super::api::RenderApi;
use super::sync::{Fence, FENCE_TIMEOUT};
use crate::error::{KvfError, KvfResult};

/// Command buffer recorded once, submitted and waited on
pub struct CommandBuffer {
    pool: vk::CommandPool,
    cmd: vk::CommandBuffer,
    api: Arc<RenderApi>,
}

impl CommandBuffer {
    /// Allocate from a transient pool and begin recording
    pub fn new(api: Arc<RenderApi>) -> KvfResult<Self> {
        let device = api.device();
        let pool_info = vk::CommandPoolCreateInfo::builder()
            .flags(vk::CommandPoolCreateFlags::TRANSIENT)
            .queue_family_index(api.queue_family());
        let pool = unsafe { device.create_command_pool(&pool_info, None).map_err(KvfError::Api)? };

        let alloc_info = vk::CommandBufferAllocateInfo::builder()
            .command_pool(pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(1);
        let begin_info = vk::CommandBufferBeginInfo::builder().flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
        let begun = unsafe {
            device.allocate_command_buffers(&alloc_info).and_then(|buffers| {
                device.begin_command_buffer(buffers[0], &begin_info)?;
                Ok(buffers[0])
            })
        };
        match begun {
            Ok(cmd) => Ok(Self { pool, cmd, api }),
            Err(err) => {
                unsafe { device.destroy_command_pool(pool, None) };
                Err(KvfError::Api(err))
            }
        }
    }

    /// Command buffer handle to record into
    pub fn handle(&self) -> vk::CommandBuffer {
        self.cmd
    }

    /// End recording, submit, and block until the GPU finishes
    pub fn submit_and_wait(self) -> KvfResult<()> {
        self.submit_and_wait_timeout(FENCE_TIMEOUT)
    }

    /// [`CommandBuffer::submit_and_wait`] with an explicit timeout
    pub fn submit_and_wait_timeout(self, timeout: Duration) -> KvfResult<()> {
        let device = self.api.device();
        unsafe { device.end_command_buffer(self.cmd).map_err(KvfError::Api)? };

        let fence = Fence::new(device.clone(), false)?;
        let cmd_infos = [vk::CommandBufferSubmitInfo::builder().command_buffer(self.cmd).build()];
        let submits = [vk::SubmitInfo2::builder().command_buffer_infos(&cmd_infos).build()];
        self.api.queue_submit(&submits, fence.handle())?;
        fence.wait(timeout)
    }
}

impl Drop for CommandBuffer {
    fn drop(&mut self) {
        unsafe { self.api.device().destroy_command_pool(self.pool, None) };
    }
}
