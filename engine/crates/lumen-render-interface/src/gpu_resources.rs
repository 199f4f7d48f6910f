use ash::vk;

use lumen_gfx::resources::buffer::GfxBuffer;
use lumen_gfx::resources::texture::GfxTexture;

use crate::bindless::{BindlessCapacity, BindlessDescriptorTable, BindlessError, BindlessKind};
use crate::handle::{Handle, HandleRegistry};

pub type BufferHandle = Handle<GfxBuffer>;
pub type TextureHandle = Handle<GfxTexture>;

/// 引擎持有的所有 GPU buffer 和 texture
///
/// 句柄的 index 同时也是资源在 bindless 数组中的下标，shader 直接使用 `handle.index()`。
/// buffer 按照 usage 决定写入 storage 数组还是 uniform 数组。
///
/// 资源的销毁通过 `retire` 延迟到所有可能引用它的帧都完成之后，
/// 在每一帧 fence 等待完成后调用 `reclaim`。
pub struct GpuResources {
    buffers: HandleRegistry<GfxBuffer>,
    textures: HandleRegistry<GfxTexture>,
    bindless: BindlessDescriptorTable,
    frames_in_flight: u64,
}
// new & init
impl GpuResources {
    pub fn new(capacity: BindlessCapacity, frames_in_flight: usize) -> Result<Self, BindlessError> {
        Ok(Self {
            buffers: HandleRegistry::new(),
            textures: HandleRegistry::new(),
            bindless: BindlessDescriptorTable::new(capacity)?,
            frames_in_flight: frames_in_flight as u64,
        })
    }
}
// getters
impl GpuResources {
    #[inline]
    pub fn bindless(&self) -> &BindlessDescriptorTable {
        &self.bindless
    }

    #[inline]
    pub fn buffer(&self, handle: BufferHandle) -> Option<&GfxBuffer> {
        self.buffers.get(handle)
    }

    #[inline]
    pub fn texture(&self, handle: TextureHandle) -> Option<&GfxTexture> {
        self.textures.get(handle)
    }

    #[inline]
    pub fn has_buffer(&self, handle: BufferHandle) -> bool {
        self.buffers.has(handle)
    }

    #[inline]
    pub fn has_texture(&self, handle: TextureHandle) -> bool {
        self.textures.has(handle)
    }

    #[inline]
    pub fn buffer_count(&self) -> usize {
        self.buffers.len()
    }

    #[inline]
    pub fn texture_count(&self) -> usize {
        self.textures.len()
    }

    /// 还在等待 GPU 完成的资源数量
    #[inline]
    pub fn retired_count(&self) -> usize {
        self.buffers.retired_count() + self.textures.retired_count()
    }
}
// update
impl GpuResources {
    /// vertex/index buffer 这类没有 storage/uniform usage 的 buffer 只占用句柄，不写入 bindless
    pub fn add_buffer(&mut self, buffer: GfxBuffer) -> Result<BufferHandle, BindlessError> {
        let kinds = buffer_kinds(buffer.usage());

        // 先检查容量，失败时 buffer 直接释放，不占用句柄
        let index = self.buffers.next_index();
        for kind in &kinds {
            self.bindless.capacity().check(*kind, index)?;
        }
        for kind in &kinds {
            if *kind == BindlessKind::UniformBuffer {
                self.bindless.bind_uniform_buffer(index, &buffer)?;
            } else {
                self.bindless.bind_storage_buffer(index, &buffer)?;
            }
        }

        let handle = self.buffers.emplace(buffer);
        debug_assert_eq!(handle.index(), index);
        Ok(handle)
    }

    pub fn add_texture(&mut self, texture: GfxTexture) -> Result<TextureHandle, BindlessError> {
        let index = self.textures.next_index();
        if let Err(e) = self.bindless.bind_texture(index, &texture) {
            texture.destroy();
            return Err(e);
        }
        let handle = self.textures.emplace(texture);
        debug_assert_eq!(handle.index(), index);
        Ok(handle)
    }

    /// 句柄立即失效，资源在 frames_in_flight 帧之后才会销毁
    #[inline]
    pub fn retire_buffer(&mut self, handle: BufferHandle, frame_id: u64) -> bool {
        self.buffers.retire(handle, frame_id)
    }

    #[inline]
    pub fn retire_texture(&mut self, handle: TextureHandle, frame_id: u64) -> bool {
        self.textures.retire(handle, frame_id)
    }

    /// 销毁所有已经不可能被 GPU 引用的资源
    pub fn reclaim(&mut self, current_frame_id: u64) {
        let _span = tracy_client::span!("GpuResources::reclaim");
        let buffers = self.buffers.reclaim(current_frame_id, self.frames_in_flight);
        let textures = self.textures.reclaim(current_frame_id, self.frames_in_flight);
        if !buffers.is_empty() || !textures.is_empty() {
            log::debug!(
                "frame {}: reclaim {} buffers, {} textures",
                current_frame_id,
                buffers.len(),
                textures.len()
            );
        }
        drop(buffers);
        textures.into_iter().for_each(GfxTexture::destroy);
    }
}
// destroy
impl GpuResources {
    /// 调用之前需要保证 device idle
    pub fn destroy(mut self) {
        drop(self.buffers.drain());
        self.textures.drain().into_iter().for_each(GfxTexture::destroy);
    }
}

/// buffer 可以写入哪些 bindless 数组
fn buffer_kinds(usage: vk::BufferUsageFlags) -> Vec<BindlessKind> {
    let mut kinds = Vec::with_capacity(2);
    if usage.contains(vk::BufferUsageFlags::STORAGE_BUFFER) {
        kinds.push(BindlessKind::StorageBuffer);
    }
    if usage.contains(vk::BufferUsageFlags::UNIFORM_BUFFER) {
        kinds.push(BindlessKind::UniformBuffer);
    }
    kinds
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffer_usage_selects_arrays() {
        assert_eq!(buffer_kinds(vk::BufferUsageFlags::STORAGE_BUFFER), vec![BindlessKind::StorageBuffer]);
        assert_eq!(
            buffer_kinds(vk::BufferUsageFlags::UNIFORM_BUFFER | vk::BufferUsageFlags::TRANSFER_DST),
            vec![BindlessKind::UniformBuffer]
        );
        assert_eq!(
            buffer_kinds(vk::BufferUsageFlags::STORAGE_BUFFER | vk::BufferUsageFlags::UNIFORM_BUFFER),
            vec![BindlessKind::StorageBuffer, BindlessKind::UniformBuffer]
        );
        assert!(buffer_kinds(vk::BufferUsageFlags::VERTEX_BUFFER).is_empty());
    }
}
