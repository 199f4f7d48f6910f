use std::marker::PhantomData;

use ash::vk;

use lumen_gfx::resources::buffer::GfxBuffer;

use crate::bindless::{BindlessError, INVALID_BINDLESS_INDEX};
use crate::gpu_resources::{BufferHandle, GpuResources};

/// 容量不足时按照 1.5 倍增长，直到满足 required；永远不会缩小
#[inline]
pub fn grown_capacity(current: usize, required: usize) -> usize {
    if required <= current {
        return current;
    }
    let mut capacity = current.max(1);
    while capacity < required {
        capacity = (capacity + capacity / 2).max(capacity + 1);
    }
    capacity
}

/// 每帧由 CPU 重写的 storage buffer，元素数量变化时自动扩容
///
/// 扩容时创建新的 buffer 并注册到 bindless，旧的 buffer 交给 `GpuResources` 延迟销毁，
/// 所以扩容之后 `bindless_index` 会变化，需要在扩容之后再写入 push constant。
pub struct ElasticStorageBuffer<T: bytemuck::Pod> {
    name: String,
    handle: BufferHandle,
    /// 元素个数
    capacity: usize,
    len: usize,
    _marker: PhantomData<T>,
}
// new & init
impl<T: bytemuck::Pod> ElasticStorageBuffer<T> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            handle: BufferHandle::null(),
            capacity: 0,
            len: 0,
            _marker: PhantomData,
        }
    }
}
// getters
impl<T: bytemuck::Pod> ElasticStorageBuffer<T> {
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn handle(&self) -> BufferHandle {
        self.handle
    }

    /// 还没有分配时返回 `INVALID_BINDLESS_INDEX`
    #[inline]
    pub fn bindless_index(&self) -> u32 {
        if self.handle.is_null() { INVALID_BINDLESS_INDEX } else { self.handle.index() }
    }
}
// update
impl<T: bytemuck::Pod> ElasticStorageBuffer<T> {
    /// 返回是否发生了扩容
    pub fn reserve(&mut self, gpu: &mut GpuResources, required: usize, frame_id: u64) -> Result<bool, BindlessError> {
        if required <= self.capacity && !self.handle.is_null() {
            return Ok(false);
        }

        // 至少分配 1 个元素，保证 bindless 下标始终有效
        let new_capacity = grown_capacity(self.capacity, required.max(1));
        let byte_size = (new_capacity * size_of::<T>()) as vk::DeviceSize;
        let buffer = GfxBuffer::new_mapped_storage(byte_size, format!("{}-{}", self.name, new_capacity))?;
        let new_handle = gpu.add_buffer(buffer)?;

        if !self.handle.is_null() {
            gpu.retire_buffer(self.handle, frame_id);
        }
        log::debug!("{}: grow {} -> {} elements", self.name, self.capacity, new_capacity);

        self.handle = new_handle;
        self.capacity = new_capacity;
        Ok(true)
    }

    /// 整体重写数据
    pub fn upload(&mut self, gpu: &mut GpuResources, data: &[T], frame_id: u64) -> Result<(), BindlessError> {
        let _span = tracy_client::span!("ElasticStorageBuffer::upload");
        self.reserve(gpu, data.len(), frame_id)?;
        if let Some(buffer) = gpu.buffer(self.handle) {
            buffer.transfer_data_by_mmap(data)?;
        }
        self.len = data.len();
        Ok(())
    }

    pub fn release(&mut self, gpu: &mut GpuResources, frame_id: u64) {
        if !self.handle.is_null() {
            gpu.retire_buffer(self.handle, frame_id);
        }
        self.handle = BufferHandle::null();
        self.capacity = 0;
        self.len = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grows_by_half_until_enough() {
        assert_eq!(grown_capacity(0, 1), 1);
        // 1 -> 2 -> 3 -> 4 -> 6
        assert_eq!(grown_capacity(0, 5), 6);
        assert_eq!(grown_capacity(4, 5), 6);
        assert_eq!(grown_capacity(4, 7), 9);
        assert_eq!(grown_capacity(100, 101), 150);
        assert_eq!(grown_capacity(1, 2), 2);
    }

    #[test]
    fn never_shrinks() {
        assert_eq!(grown_capacity(64, 3), 64);
        assert_eq!(grown_capacity(64, 0), 64);
        assert_eq!(grown_capacity(64, 64), 64);
    }

    #[test]
    fn capacity_is_monotonic_over_a_workload() {
        let workload = [3usize, 10, 2, 40, 0, 41, 39, 1000, 7, 1001];
        let mut capacity = 0;
        for required in workload {
            let next = grown_capacity(capacity, required);
            assert!(next >= capacity);
            assert!(next >= required);
            capacity = next;
        }
        assert!(capacity >= 1001);
    }
}
