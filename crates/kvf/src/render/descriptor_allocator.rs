//! Per-frame descriptor set allocation
//!
//! Sets are allocated from a growing list of pools and released all at once by [`DescriptorAllocator::reset`].

use std::sync::Arc;

use ash::vk;

use super::api::RenderApi;
use crate::error::{KvfError, KvfResult};

/// Pool sizes and set count used for each new pool
#[derive(Debug, Clone)]
pub struct DescriptorPoolInfo {
    /// Descriptors per type in each pool
    pub pool_sizes: Vec<vk::DescriptorPoolSize>,
    /// Maximum sets per pool
    pub max_sets: u32,
}

fn check_layouts(layouts: &[vk::DescriptorSetLayout]) -> KvfResult<()> {
    if layouts.is_empty() {
        return Err(KvfError::invalid("no descriptor set layouts to allocate"));
    }
    Ok(())
}

/// Whether a failed allocation should move on to another pool
fn is_pool_exhausted(err: vk::Result) -> bool {
    matches!(err, vk::Result::ERROR_OUT_OF_POOL_MEMORY | vk::Result::ERROR_FRAGMENTED_POOL)
}

/// Pool to retry in after pool `index` ran out, and whether it must be created first
fn next_pool(index: usize, pool_count: usize) -> (usize, bool) {
    let next = index + 1;
    (next, next >= pool_count)
}

/// Hands out descriptor sets for one frame
pub struct DescriptorAllocator {
    pools: Vec<vk::DescriptorPool>,
    index: usize,
    info: DescriptorPoolInfo,
    api: Arc<RenderApi>,
}

impl DescriptorAllocator {
    /// Create an allocator with one pool ready
    pub fn new(api: Arc<RenderApi>, info: DescriptorPoolInfo) -> KvfResult<Self> {
        let mut ret = Self {
            pools: Vec::new(),
            index: 0,
            info,
            api,
        };
        let pool = ret.create_pool()?;
        ret.pools.push(pool);
        Ok(ret)
    }

    fn create_pool(&self) -> KvfResult<vk::DescriptorPool> {
        let create_info = vk::DescriptorPoolCreateInfo::builder()
            .pool_sizes(&self.info.pool_sizes)
            .max_sets(self.info.max_sets);
        unsafe {
            self.api
                .device()
                .create_descriptor_pool(&create_info, None)
                .map_err(KvfError::Api)
        }
    }

    fn try_allocate(&self, layouts: &[vk::DescriptorSetLayout]) -> Result<Vec<vk::DescriptorSet>, vk::Result> {
        let alloc_info = vk::DescriptorSetAllocateInfo::builder()
            .descriptor_pool(self.pools[self.index])
            .set_layouts(layouts);
        unsafe { self.api.device().allocate_descriptor_sets(&alloc_info) }
    }

    /// Allocate one set per layout, moving to the next pool when the current one is exhausted
    pub fn allocate(&mut self, layouts: &[vk::DescriptorSetLayout]) -> KvfResult<Vec<vk::DescriptorSet>> {
        check_layouts(layouts)?;
        match self.try_allocate(layouts) {
            Ok(sets) => Ok(sets),
            Err(err) if is_pool_exhausted(err) => {
                let (next, create) = next_pool(self.index, self.pools.len());
                if create {
                    let pool = self.create_pool()?;
                    self.pools.push(pool);
                    log::debug!("Descriptor pool count: {}", self.pools.len());
                }
                self.index = next;
                self.try_allocate(layouts).map_err(KvfError::Api)
            }
            Err(err) => Err(KvfError::Api(err)),
        }
    }

    /// Release every set and rewind to the first pool
    pub fn reset(&mut self) -> KvfResult<()> {
        for &pool in &self.pools {
            unsafe {
                self.api
                    .device()
                    .reset_descriptor_pool(pool, vk::DescriptorPoolResetFlags::empty())
                    .map_err(KvfError::Api)?;
            }
        }
        self.index = 0;
        Ok(())
    }
}

impl Drop for DescriptorAllocator {
    fn drop(&mut self) {
        for pool in self.pools.drain(..) {
            unsafe { self.api.device().destroy_descriptor_pool(pool, None) };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_layouts_are_rejected() {
        assert!(matches!(check_layouts(&[]), Err(KvfError::InvalidOperation { .. })));
        assert!(check_layouts(&[vk::DescriptorSetLayout::null()]).is_ok());
    }

    #[test]
    fn test_only_exhausted_pools_retry() {
        assert!(is_pool_exhausted(vk::Result::ERROR_OUT_OF_POOL_MEMORY));
        assert!(is_pool_exhausted(vk::Result::ERROR_FRAGMENTED_POOL));
        assert!(!is_pool_exhausted(vk::Result::ERROR_OUT_OF_DEVICE_MEMORY));
        assert!(!is_pool_exhausted(vk::Result::ERROR_DEVICE_LOST));
    }

    #[test]
    fn test_next_pool_grows_then_reuses_after_rewind() {
        // One pool, exhausted: a second one is created.
        assert_eq!(next_pool(0, 1), (1, true));
        // Second pool exhausted too: a third one.
        assert_eq!(next_pool(1, 2), (2, true));
        // After a reset the cursor is back at 0 and the existing pools are reused.
        assert_eq!(next_pool(0, 3), (1, false));
        assert_eq!(next_pool(1, 3), (2, false));
        assert_eq!(next_pool(2, 3), (3, true));
    }
}
