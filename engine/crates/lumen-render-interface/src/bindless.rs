use std::fmt::Display;

use ash::vk;

use lumen_gfx::GfxError;
use lumen_gfx::commands::command_buffer::GfxCommandBuffer;
use lumen_gfx::descriptors::descriptor_pool::GfxDescriptorPool;
use lumen_gfx::descriptors::descriptor_set::{GfxDescriptorBinding, GfxDescriptorSet, GfxDescriptorSetLayout};
use lumen_gfx::descriptors::descriptor_write::GfxWriteDescriptorSet;
use lumen_gfx::gfx::Gfx;
use lumen_gfx::pipelines::graphics_pipeline::GfxPipelineLayout;
use lumen_gfx::resources::buffer::GfxBuffer;
use lumen_gfx::resources::texture::GfxTexture;

/// shader 读到这个下标时表示资源不存在
pub const INVALID_BINDLESS_INDEX: u32 = u32::MAX;

/// bindless 表中的三个数组，binding 编号和 shader 中的声明一致
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BindlessKind {
    StorageBuffer,
    UniformBuffer,
    Texture,
}
impl BindlessKind {
    pub const ALL: [BindlessKind; 3] = [Self::StorageBuffer, Self::UniformBuffer, Self::Texture];

    #[inline]
    pub fn binding(self) -> u32 {
        match self {
            Self::StorageBuffer => 0,
            Self::UniformBuffer => 1,
            Self::Texture => 2,
        }
    }

    #[inline]
    pub fn descriptor_type(self) -> vk::DescriptorType {
        match self {
            Self::StorageBuffer => vk::DescriptorType::STORAGE_BUFFER,
            Self::UniformBuffer => vk::DescriptorType::UNIFORM_BUFFER,
            Self::Texture => vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
        }
    }
}
impl Display for BindlessKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::StorageBuffer => write!(f, "storage-buffer"),
            Self::UniformBuffer => write!(f, "uniform-buffer"),
            Self::Texture => write!(f, "texture"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BindlessError {
    #[error("bindless {kind} index {index} exceeds capacity {capacity}")]
    CapacityExceeded { kind: BindlessKind, index: u32, capacity: u32 },

    #[error("bindless {kind} requested {requested} descriptors, device limit is {limit}")]
    DeviceLimit { kind: BindlessKind, requested: u32, limit: u32 },

    #[error("buffer {name} has no usage compatible with bindless {kind}")]
    WrongKind { kind: BindlessKind, name: String },

    #[error(transparent)]
    Gfx(#[from] GfxError),
}

/// 每个数组的容量
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BindlessCapacity {
    pub storage_buffers: u32,
    pub uniform_buffers: u32,
    pub textures: u32,
}
impl BindlessCapacity {
    #[inline]
    pub fn of(&self, kind: BindlessKind) -> u32 {
        match kind {
            BindlessKind::StorageBuffer => self.storage_buffers,
            BindlessKind::UniformBuffer => self.uniform_buffers,
            BindlessKind::Texture => self.textures,
        }
    }

    /// 写入 index 之前的检查
    #[inline]
    pub fn check(&self, kind: BindlessKind, index: u32) -> Result<(), BindlessError> {
        let capacity = self.of(kind);
        if index >= capacity {
            return Err(BindlessError::CapacityExceeded { kind, index, capacity });
        }
        Ok(())
    }

    /// 创建 descriptor set layout 之前，确认容量没有超过硬件的限制
    pub fn check_limits(&self, max_buffers: u32, max_images: u32) -> Result<(), BindlessError> {
        for kind in BindlessKind::ALL {
            let limit = match kind {
                BindlessKind::Texture => max_images,
                _ => max_buffers,
            };
            let requested = self.of(kind);
            if requested > limit {
                return Err(BindlessError::DeviceLimit { kind, requested, limit });
            }
        }
        Ok(())
    }
}

/// 全局唯一的 bindless descriptor set，绑定在 set 0
///
/// - binding 0: storage buffer 数组
/// - binding 1: uniform buffer 数组
/// - binding 2: combined image sampler 数组
///
/// 使用 UPDATE_AFTER_BIND + PARTIALLY_BOUND，
/// 未写入的槽位不能被 shader 访问，in-flight 的帧不使用的槽位可以随时更新。
pub struct BindlessDescriptorTable {
    capacity: BindlessCapacity,
    layout: GfxDescriptorSetLayout,
    set: GfxDescriptorSet,
    _pool: GfxDescriptorPool,
}
// new & init
impl BindlessDescriptorTable {
    pub fn new(capacity: BindlessCapacity) -> Result<Self, BindlessError> {
        let _span = tracy_client::span!("BindlessDescriptorTable::new");
        let pdevice = Gfx::get().physical_device();
        capacity.check_limits(pdevice.max_bindless_buffers(), pdevice.max_bindless_images())?;

        let binding_flags = vk::DescriptorBindingFlags::PARTIALLY_BOUND
            | vk::DescriptorBindingFlags::UPDATE_AFTER_BIND
            | vk::DescriptorBindingFlags::UPDATE_UNUSED_WHILE_PENDING;
        let bindings = BindlessKind::ALL.map(|kind| GfxDescriptorBinding {
            binding: kind.binding(),
            descriptor_type: kind.descriptor_type(),
            descriptor_count: capacity.of(kind),
            stage_flags: vk::ShaderStageFlags::ALL,
            flags: binding_flags,
        });
        let layout = GfxDescriptorSetLayout::new(
            vk::DescriptorSetLayoutCreateFlags::UPDATE_AFTER_BIND_POOL,
            &bindings,
            "bindless",
        )?;

        let pool_sizes = BindlessKind::ALL.map(|kind| vk::DescriptorPoolSize {
            ty: kind.descriptor_type(),
            descriptor_count: capacity.of(kind),
        });
        let pool = GfxDescriptorPool::new(vk::DescriptorPoolCreateFlags::UPDATE_AFTER_BIND, 1, &pool_sizes, "bindless")?;
        let set = GfxDescriptorSet::new(&pool, &layout, "bindless")?;

        log::info!(
            "bindless table: {} storage buffers, {} uniform buffers, {} textures",
            capacity.storage_buffers,
            capacity.uniform_buffers,
            capacity.textures
        );

        Ok(Self {
            capacity,
            layout,
            set,
            _pool: pool,
        })
    }
}
// getters
impl BindlessDescriptorTable {
    #[inline]
    pub fn layout(&self) -> &GfxDescriptorSetLayout {
        &self.layout
    }

    #[inline]
    pub fn set(&self) -> &GfxDescriptorSet {
        &self.set
    }

    #[inline]
    pub fn capacity(&self) -> &BindlessCapacity {
        &self.capacity
    }
}
// update
impl BindlessDescriptorTable {
    pub fn bind_storage_buffer(&self, index: u32, buffer: &GfxBuffer) -> Result<(), BindlessError> {
        self.bind_buffer(BindlessKind::StorageBuffer, index, buffer)
    }

    pub fn bind_uniform_buffer(&self, index: u32, buffer: &GfxBuffer) -> Result<(), BindlessError> {
        self.bind_buffer(BindlessKind::UniformBuffer, index, buffer)
    }

    pub fn bind_texture(&self, index: u32, texture: &GfxTexture) -> Result<(), BindlessError> {
        self.capacity.check(BindlessKind::Texture, index)?;
        let write = GfxWriteDescriptorSet::images(
            self.set.handle(),
            BindlessKind::Texture.binding(),
            index,
            BindlessKind::Texture.descriptor_type(),
            vec![
                vk::DescriptorImageInfo::default()
                    .sampler(texture.sampler().handle())
                    .image_view(texture.image_view().handle())
                    .image_layout(vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL),
            ],
        );
        Gfx::get().gfx_device().write_descriptor_sets(std::slice::from_ref(&write));
        Ok(())
    }

    fn bind_buffer(&self, kind: BindlessKind, index: u32, buffer: &GfxBuffer) -> Result<(), BindlessError> {
        self.capacity.check(kind, index)?;
        let required_usage = match kind {
            BindlessKind::StorageBuffer => vk::BufferUsageFlags::STORAGE_BUFFER,
            BindlessKind::UniformBuffer => vk::BufferUsageFlags::UNIFORM_BUFFER,
            BindlessKind::Texture => vk::BufferUsageFlags::empty(),
        };
        if !buffer.usage().contains(required_usage) || required_usage.is_empty() {
            return Err(BindlessError::WrongKind {
                kind,
                name: buffer.debug_name().to_string(),
            });
        }

        let write = GfxWriteDescriptorSet::buffers(
            self.set.handle(),
            kind.binding(),
            index,
            kind.descriptor_type(),
            vec![
                vk::DescriptorBufferInfo::default()
                    .buffer(buffer.vk_buffer())
                    .offset(0)
                    .range(vk::WHOLE_SIZE),
            ],
        );
        Gfx::get().gfx_device().write_descriptor_sets(std::slice::from_ref(&write));
        Ok(())
    }

    /// 绑定到 set 0，每个 command buffer 录制开始时调用一次
    #[inline]
    pub fn bind_global(&self, cmd: &GfxCommandBuffer, bind_point: vk::PipelineBindPoint, layout: &GfxPipelineLayout) {
        cmd.bind_descriptor_sets(bind_point, layout.handle(), 0, &[self.set.handle()]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CAPACITY: BindlessCapacity = BindlessCapacity {
        storage_buffers: 8,
        uniform_buffers: 2,
        textures: 16,
    };

    #[test]
    fn bindings_are_fixed() {
        assert_eq!(BindlessKind::ALL.map(|k| k.binding()), [0, 1, 2]);
        assert_eq!(BindlessKind::Texture.descriptor_type(), vk::DescriptorType::COMBINED_IMAGE_SAMPLER);
    }

    #[test]
    fn index_past_capacity_is_rejected() {
        assert!(CAPACITY.check(BindlessKind::StorageBuffer, 7).is_ok());
        assert!(matches!(
            CAPACITY.check(BindlessKind::StorageBuffer, 8),
            Err(BindlessError::CapacityExceeded {
                kind: BindlessKind::StorageBuffer,
                index: 8,
                capacity: 8
            })
        ));
        assert!(CAPACITY.check(BindlessKind::UniformBuffer, 2).is_err());
        assert!(CAPACITY.check(BindlessKind::Texture, 15).is_ok());
    }

    #[test]
    fn device_limits() {
        assert!(CAPACITY.check_limits(8, 16).is_ok());
        assert!(matches!(
            CAPACITY.check_limits(7, 16),
            Err(BindlessError::DeviceLimit {
                kind: BindlessKind::StorageBuffer,
                requested: 8,
                limit: 7
            })
        ));
        assert!(matches!(
            CAPACITY.check_limits(8, 15),
            Err(BindlessError::DeviceLimit {
                kind: BindlessKind::Texture,
                ..
            })
        ));
    }
}
