use ash::vk;
use ash::vk::Handle;
use vk_mem::{Alloc, Allocation};

use crate::error::{GfxError, GfxResult};
use crate::{
    commands::{barrier::GfxImageBarrier, command_buffer::GfxCommandBuffer},
    foundation::debug_messenger::DebugType,
    gfx::Gfx,
    resources::buffer::GfxBuffer,
};

/// Vulkan 格式相关的工具类
pub struct VulkanFormatUtils;
impl VulkanFormatUtils {
    /// 每个像素需要的字节数，不支持的格式返回 None
    pub fn pixel_size_in_bytes(format: vk::Format) -> Option<usize> {
        match format {
            vk::Format::R8_UNORM | vk::Format::R8_SRGB => Some(1),
            vk::Format::R8G8_UNORM => Some(2),
            vk::Format::R8G8B8A8_UNORM
            | vk::Format::R8G8B8A8_SRGB
            | vk::Format::B8G8R8A8_UNORM
            | vk::Format::B8G8R8A8_SRGB
            | vk::Format::R32_SFLOAT => Some(4),
            vk::Format::R16G16B16A16_SFLOAT | vk::Format::R16G16B16A16_UNORM => Some(8),
            vk::Format::R32G32B32A32_SFLOAT => Some(16),
            _ => None,
        }
    }

    #[inline]
    pub fn is_depth_format(format: vk::Format) -> bool {
        matches!(
            format,
            vk::Format::D16_UNORM
                | vk::Format::D32_SFLOAT
                | vk::Format::D16_UNORM_S8_UINT
                | vk::Format::D24_UNORM_S8_UINT
                | vk::Format::D32_SFLOAT_S8_UINT
        )
    }

    /// 完整 mip 链的长度
    #[inline]
    pub fn full_mip_levels(width: u32, height: u32) -> u32 {
        32 - width.max(height).max(1).leading_zeros()
    }
}

/// 由 VMA 分配的 2D image
///
/// # Destroy
///
/// 需要手动调用 `destroy` 释放资源
pub struct GfxImage {
    handle: vk::Image,
    /// destroy 之后为 None
    allocation: Option<Allocation>,

    extent: vk::Extent3D,
    format: vk::Format,
    mip_levels: u32,

    name: String,
}
// getter
impl GfxImage {
    #[inline]
    pub fn width(&self) -> u32 {
        self.extent.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.extent.height
    }

    #[inline]
    pub fn extent_2d(&self) -> vk::Extent2D {
        vk::Extent2D {
            width: self.extent.width,
            height: self.extent.height,
        }
    }

    #[inline]
    pub fn handle(&self) -> vk::Image {
        self.handle
    }

    #[inline]
    pub fn format(&self) -> vk::Format {
        self.format
    }

    #[inline]
    pub fn mip_levels(&self) -> u32 {
        self.mip_levels
    }
}
// new & init
impl GfxImage {
    pub fn new(
        image_info: &GfxImageCreateInfo,
        alloc_info: &vk_mem::AllocationCreateInfo,
        debug_name: &str,
    ) -> GfxResult<Self> {
        let allocator = Gfx::get().allocator();
        let gfx_device = Gfx::get().gfx_device();
        let (image, alloc) = unsafe { allocator.create_image(&image_info.as_info(), alloc_info)? };
        let image = Self {
            handle: image,
            allocation: Some(alloc),
            extent: image_info.inner.extent,
            format: image_info.inner.format,
            mip_levels: image_info.inner.mip_levels,
            name: debug_name.to_string(),
        };
        gfx_device.set_debug_name(&image, debug_name);
        Ok(image)
    }

    /// 使用 device memory 的 image，常用于 render target
    #[inline]
    pub fn new_device_local(image_info: &GfxImageCreateInfo, debug_name: &str) -> GfxResult<Self> {
        Self::new(
            image_info,
            &vk_mem::AllocationCreateInfo {
                usage: vk_mem::MemoryUsage::AutoPreferDevice,
                ..Default::default()
            },
            debug_name,
        )
    }
}
impl DebugType for GfxImage {
    fn debug_type_name() -> &'static str {
        "GfxImage2D"
    }

    fn vk_handle(&self) -> impl vk::Handle {
        self.handle
    }
}
// destroy
impl GfxImage {
    pub fn destroy(mut self) {
        self.destroy_mut();
    }
    pub fn destroy_mut(&mut self) {
        log::debug!("Destroying GfxImage: {}", self.name);

        if let Some(mut allocation) = self.allocation.take() {
            unsafe { Gfx::get().allocator().destroy_image(self.handle, &mut allocation) };
        }
        self.handle = vk::Image::null();
    }
}
impl Drop for GfxImage {
    fn drop(&mut self) {
        debug_assert!(self.handle.is_null(), "GfxImage must be destroyed manually: {}", self.name);
    }
}
// tools
impl GfxImage {
    /// 将 data 写入 mip 0，并生成剩余的 mip；结束后 image 处于 SHADER_READ_ONLY_OPTIMAL
    ///
    /// 返回的 stage buffer 需要保留到命令执行完成
    ///
    /// # 实现步骤
    /// 1. 创建一个 staging buffer，用于存放待复制的数据
    /// 2. 进行图像布局转换，将 staging buffer 的数据复制到 mip 0
    /// 3. 逐级 blit 生成 mipmap
    /// 4. 将所有 mip 转换为 shader 可读
    pub fn transfer_data(&self, command_buffer: &GfxCommandBuffer, data: &[u8]) -> GfxResult<GfxBuffer> {
        let pixel_size = VulkanFormatUtils::pixel_size_in_bytes(self.format())
            .ok_or_else(|| GfxError::UnsupportedFormat(vec![self.format()]))?;
        let expected = pixel_size * (self.width() * self.height()) as usize;
        if data.len() != expected {
            return Err(GfxError::ImageDataSize {
                expected,
                actual: data.len(),
            });
        }

        let stage_buffer =
            GfxBuffer::new_stage_buffer(size_of_val(data) as vk::DeviceSize, format!("{}-stage-buffer", self.name))?;
        stage_buffer.write_bytes(0, data)?;

        let image_barrier = GfxImageBarrier::new()
            .image(self.handle)
            .src_mask(vk::PipelineStageFlags2::TOP_OF_PIPE, vk::AccessFlags2::empty())
            .dst_mask(vk::PipelineStageFlags2::TRANSFER, vk::AccessFlags2::TRANSFER_WRITE)
            .layout_transfer(vk::ImageLayout::UNDEFINED, vk::ImageLayout::TRANSFER_DST_OPTIMAL)
            .image_aspect_flag(vk::ImageAspectFlags::COLOR)
            .mip_range(0, self.mip_levels);
        command_buffer.image_memory_barrier(vk::DependencyFlags::empty(), std::slice::from_ref(&image_barrier));

        let buffer_image_copy = vk::BufferImageCopy2::default()
            .buffer_offset(0)
            .buffer_row_length(0)
            .buffer_image_height(0)
            .image_offset(vk::Offset3D { x: 0, y: 0, z: 0 })
            .image_extent(self.extent)
            .image_subresource(vk::ImageSubresourceLayers {
                aspect_mask: vk::ImageAspectFlags::COLOR,
                mip_level: 0,
                base_array_layer: 0,
                layer_count: 1,
            });
        command_buffer.cmd_copy_buffer_to_image(
            &vk::CopyBufferToImageInfo2::default()
                .src_buffer(stage_buffer.vk_buffer())
                .dst_image(self.handle)
                .dst_image_layout(vk::ImageLayout::TRANSFER_DST_OPTIMAL)
                .regions(std::slice::from_ref(&buffer_image_copy)),
        );

        self.generate_mipmaps(command_buffer);

        Ok(stage_buffer)
    }

    /// 要求所有 mip 处于 TRANSFER_DST_OPTIMAL，mip 0 已经写入数据
    fn generate_mipmaps(&self, command_buffer: &GfxCommandBuffer) {
        let mut mip_width = self.width() as i32;
        let mut mip_height = self.height() as i32;

        for level in 1..self.mip_levels {
            // 上一级 mip 作为 blit 的 src
            let to_src = GfxImageBarrier::new()
                .image(self.handle)
                .src_mask(vk::PipelineStageFlags2::TRANSFER, vk::AccessFlags2::TRANSFER_WRITE)
                .dst_mask(vk::PipelineStageFlags2::TRANSFER, vk::AccessFlags2::TRANSFER_READ)
                .layout_transfer(vk::ImageLayout::TRANSFER_DST_OPTIMAL, vk::ImageLayout::TRANSFER_SRC_OPTIMAL)
                .image_aspect_flag(vk::ImageAspectFlags::COLOR)
                .mip_range(level - 1, 1);
            command_buffer.image_memory_barrier(vk::DependencyFlags::empty(), std::slice::from_ref(&to_src));

            let next_width = (mip_width / 2).max(1);
            let next_height = (mip_height / 2).max(1);
            let blit = vk::ImageBlit2::default()
                .src_offsets([
                    vk::Offset3D::default(),
                    vk::Offset3D {
                        x: mip_width,
                        y: mip_height,
                        z: 1,
                    },
                ])
                .src_subresource(vk::ImageSubresourceLayers {
                    aspect_mask: vk::ImageAspectFlags::COLOR,
                    mip_level: level - 1,
                    base_array_layer: 0,
                    layer_count: 1,
                })
                .dst_offsets([
                    vk::Offset3D::default(),
                    vk::Offset3D {
                        x: next_width,
                        y: next_height,
                        z: 1,
                    },
                ])
                .dst_subresource(vk::ImageSubresourceLayers {
                    aspect_mask: vk::ImageAspectFlags::COLOR,
                    mip_level: level,
                    base_array_layer: 0,
                    layer_count: 1,
                });
            command_buffer.cmd_blit_image(
                &vk::BlitImageInfo2::default()
                    .src_image(self.handle)
                    .src_image_layout(vk::ImageLayout::TRANSFER_SRC_OPTIMAL)
                    .dst_image(self.handle)
                    .dst_image_layout(vk::ImageLayout::TRANSFER_DST_OPTIMAL)
                    .regions(std::slice::from_ref(&blit))
                    .filter(vk::Filter::LINEAR),
            );

            let to_read = GfxImageBarrier::new()
                .image(self.handle)
                .src_mask(vk::PipelineStageFlags2::TRANSFER, vk::AccessFlags2::TRANSFER_READ)
                .dst_mask(vk::PipelineStageFlags2::FRAGMENT_SHADER, vk::AccessFlags2::SHADER_READ)
                .layout_transfer(vk::ImageLayout::TRANSFER_SRC_OPTIMAL, vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL)
                .image_aspect_flag(vk::ImageAspectFlags::COLOR)
                .mip_range(level - 1, 1);
            command_buffer.image_memory_barrier(vk::DependencyFlags::empty(), std::slice::from_ref(&to_read));

            mip_width = next_width;
            mip_height = next_height;
        }

        // 最后一级 mip 只作为 blit 的 dst
        let last = GfxImageBarrier::new()
            .image(self.handle)
            .src_mask(vk::PipelineStageFlags2::TRANSFER, vk::AccessFlags2::TRANSFER_WRITE)
            .dst_mask(vk::PipelineStageFlags2::FRAGMENT_SHADER, vk::AccessFlags2::SHADER_READ)
            .layout_transfer(vk::ImageLayout::TRANSFER_DST_OPTIMAL, vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL)
            .image_aspect_flag(vk::ImageAspectFlags::COLOR)
            .mip_range(self.mip_levels - 1, 1);
        command_buffer.image_memory_barrier(vk::DependencyFlags::empty(), std::slice::from_ref(&last));
    }
}

pub struct GfxImageCreateInfo {
    inner: vk::ImageCreateInfo<'static>,
}
impl GfxImageCreateInfo {
    #[inline]
    pub fn new_image_2d_info(extent: vk::Extent2D, format: vk::Format, usage: vk::ImageUsageFlags) -> Self {
        Self {
            inner: vk::ImageCreateInfo {
                image_type: vk::ImageType::TYPE_2D,
                format,
                extent: extent.into(),
                mip_levels: 1,
                array_layers: 1,
                samples: vk::SampleCountFlags::TYPE_1,
                tiling: vk::ImageTiling::OPTIMAL,
                usage,
                sharing_mode: vk::SharingMode::EXCLUSIVE,
                // 这里只能是 UNDEFINED 或者 PREINITIALIZED
                initial_layout: vk::ImageLayout::UNDEFINED,
                ..Default::default()
            },
        }
    }

    #[inline]
    pub fn as_info(&self) -> vk::ImageCreateInfo<'_> {
        self.inner
    }

    // builder
    #[inline]
    pub fn mip_levels(mut self, mip_levels: u32) -> Self {
        self.inner.mip_levels = mip_levels.max(1);
        self
    }

    // builder
    #[inline]
    pub fn samples(mut self, samples: vk::SampleCountFlags) -> Self {
        self.inner.samples = samples;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mip_chain_length_covers_largest_side() {
        assert_eq!(VulkanFormatUtils::full_mip_levels(1, 1), 1);
        assert_eq!(VulkanFormatUtils::full_mip_levels(256, 256), 9);
        assert_eq!(VulkanFormatUtils::full_mip_levels(300, 17), 9);
        assert_eq!(VulkanFormatUtils::full_mip_levels(0, 0), 1);
    }

    #[test]
    fn pixel_sizes() {
        assert_eq!(VulkanFormatUtils::pixel_size_in_bytes(vk::Format::R8G8B8A8_SRGB), Some(4));
        assert_eq!(VulkanFormatUtils::pixel_size_in_bytes(vk::Format::R16G16B16A16_SFLOAT), Some(8));
        assert_eq!(VulkanFormatUtils::pixel_size_in_bytes(vk::Format::BC7_SRGB_BLOCK), None);
        assert!(VulkanFormatUtils::is_depth_format(vk::Format::D32_SFLOAT));
    }
}
