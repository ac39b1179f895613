//! Per-frame scratch buffers, reused frame over frame

use std::collections::HashMap;
use std::sync::Arc;

use ash::vk;

use super::api::RenderApi;
use crate::error::KvfResult;
use crate::vma::{Buffer, BufferCreateInfo, BufferType};

/// Growing list of items handed out in order and rewound each frame
#[derive(Debug)]
pub struct ScratchPool<T> {
    items: Vec<T>,
    cursor: usize,
}

impl<T> Default for ScratchPool<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            cursor: 0,
        }
    }
}

impl<T> ScratchPool<T> {
    /// Hand out the item at the cursor, creating one with `create` past the end
    pub fn next_or_insert_with<E>(&mut self, create: impl FnOnce() -> Result<T, E>) -> Result<&mut T, E> {
        if self.cursor == self.items.len() {
            self.items.push(create()?);
        }
        let index = self.cursor;
        self.cursor += 1;
        Ok(&mut self.items[index])
    }

    /// Make every item available again
    pub fn rewind(&mut self) {
        self.cursor = 0;
    }

    /// Items handed out since the last rewind
    pub fn in_use(&self) -> usize {
        self.cursor
    }

    /// Items created so far
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether no item was ever created
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Host buffers keyed by usage, for one frame in flight
pub struct BufferAllocator {
    pools: HashMap<vk::BufferUsageFlags, ScratchPool<Buffer>>,
    api: Arc<RenderApi>,
}

impl BufferAllocator {
    /// Create an empty allocator
    pub fn new(api: Arc<RenderApi>) -> Self {
        Self {
            pools: HashMap::new(),
            api,
        }
    }

    /// Next free buffer for `usage`, resized to `size` unless `size` is zero
    pub fn allocate(&mut self, usage: vk::BufferUsageFlags, size: vk::DeviceSize) -> KvfResult<&mut Buffer> {
        let api = &self.api;
        let buffer = self.pools.entry(usage).or_default().next_or_insert_with(|| {
            Buffer::new(
                Arc::clone(api),
                BufferCreateInfo {
                    usage,
                    kind: BufferType::Host,
                },
                size,
            )
        })?;
        if size > 0 {
            buffer.resize(size)?;
        }
        Ok(buffer)
    }

    /// Rewind every usage's cursor
    pub fn reset(&mut self) {
        self.pools.values_mut().for_each(ScratchPool::rewind);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_reuses_after_rewind() {
        let mut pool = ScratchPool::default();
        let mut created = 0;
        for _ in 0..3 {
            pool.next_or_insert_with(|| {
                created += 1;
                Ok::<_, ()>(created)
            })
            .unwrap();
        }
        assert_eq!((pool.len(), pool.in_use()), (3, 3));

        pool.rewind();
        assert_eq!(pool.in_use(), 0);
        let first = *pool.next_or_insert_with(|| Ok::<_, ()>(99)).unwrap();
        assert_eq!(first, 1);
        assert_eq!(pool.len(), 3);
    }

    #[test]
    fn test_pool_grows_past_end() {
        let mut pool = ScratchPool::default();
        *pool.next_or_insert_with(|| Ok::<_, ()>(String::from("a"))).unwrap() += "!";
        pool.rewind();
        assert_eq!(pool.next_or_insert_with(|| Ok::<_, ()>(String::new())).unwrap().as_str(), "a!");
        assert_eq!(pool.next_or_insert_with(|| Ok::<_, ()>(String::from("b"))).unwrap().as_str(), "b");
        assert_eq!(pool.len(), 2);
    }

    #[test]
    fn test_pool_propagates_create_error() {
        let mut pool: ScratchPool<u32> = ScratchPool::default();
        assert_eq!(pool.next_or_insert_with(|| Err("nope")).unwrap_err(), "nope");
        assert!(pool.is_empty());
        assert_eq!(pool.in_use(), 0);
    }
}
