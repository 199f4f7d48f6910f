use ash::vk;

use lumen_gfx::gfx::Gfx;
use lumen_gfx::resources::image::{GfxImage, GfxImageCreateInfo};
use lumen_gfx::resources::image_view::{GfxImageView, GfxImageViewDesc};
use lumen_gfx::resources::texture::GfxTexture;
use lumen_gfx::sampler::GfxSamplerDesc;
use lumen_render_interface::gpu_resources::{GpuResources, TextureHandle};
use lumen_render_interface::settings::{DefaultRendererSettings, FrameSettings};

use crate::bloom::{bloom_chain_length, bloom_mip_extent};
use crate::error::{RenderError, RenderResult};

/// 所有 frame slot 共用的离屏 target，尺寸跟随 swapchain
///
/// HDR color 和 bloom mip 注册在 bindless 中，后续 pass 通过下标采样；
/// depth 只作为 attachment 使用。
///
/// # Destroy
///
/// 需要手动调用 `destroy`
pub struct RenderTargets {
    settings: FrameSettings,

    hdr_color: TextureHandle,

    depth_image: GfxImage,
    depth_view: GfxImageView,

    /// 每一级 mip 是一张单独的 texture，mip k 的尺寸为窗口的 1/2^(k+1)
    bloom_mips: Vec<TextureHandle>,
}
// new & init
impl RenderTargets {
    pub fn new(gpu: &mut GpuResources, extent: vk::Extent2D) -> RenderResult<Self> {
        let _span = tracy_client::span!("RenderTargets::new");

        let depth_format = Gfx::get().find_supported_format(
            DefaultRendererSettings::DEPTH_FORMAT_CANDIDATES,
            vk::ImageTiling::OPTIMAL,
            vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT,
        )?;
        let settings = FrameSettings {
            color_format: DefaultRendererSettings::HDR_COLOR_FORMAT,
            depth_format,
            frame_extent: extent,
        };

        let hdr_color = Self::create_color_target(gpu, settings.color_format, extent, "hdr-color")?;
        let (depth_image, depth_view) = Self::create_depth_image(depth_format, extent)?;

        let chain_length = bloom_chain_length(extent.width);
        let mut bloom_mips = Vec::with_capacity(chain_length as usize);
        for mip in 0..chain_length {
            let mip_extent = bloom_mip_extent(extent, mip);
            bloom_mips.push(Self::create_color_target(
                gpu,
                settings.color_format,
                mip_extent,
                &format!("bloom-mip-{}", mip),
            )?);
        }

        log::info!(
            "render targets: {}x{}, depth format {:?}, bloom chain {}",
            extent.width,
            extent.height,
            depth_format,
            chain_length
        );
        Ok(Self {
            settings,
            hdr_color,
            depth_image,
            depth_view,
            bloom_mips,
        })
    }

    /// 可以作为 attachment 也可以被采样
    fn create_color_target(
        gpu: &mut GpuResources,
        format: vk::Format,
        extent: vk::Extent2D,
        name: &str,
    ) -> RenderResult<TextureHandle> {
        let image_info = GfxImageCreateInfo::new_image_2d_info(
            extent,
            format,
            vk::ImageUsageFlags::COLOR_ATTACHMENT | vk::ImageUsageFlags::SAMPLED,
        );
        let image = GfxImage::new_device_local(&image_info, name)?;
        let texture = GfxTexture::new(image, &GfxSamplerDesc::linear_clamp(), name)?;
        Ok(gpu.add_texture(texture)?)
    }

    fn create_depth_image(format: vk::Format, extent: vk::Extent2D) -> RenderResult<(GfxImage, GfxImageView)> {
        let image_info =
            GfxImageCreateInfo::new_image_2d_info(extent, format, vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT);
        let image = GfxImage::new_device_local(&image_info, "depth")?;
        let view_desc = GfxImageViewDesc::new_2d(format, vk::ImageAspectFlags::DEPTH);
        match GfxImageView::new(image.handle(), view_desc, "depth") {
            Ok(view) => Ok((image, view)),
            Err(e) => {
                image.destroy();
                Err(e.into())
            }
        }
    }

    /// 尺寸发生变化时重新创建；调用之前需要保证 GPU 不再使用旧的 target
    pub fn rebuild(&mut self, gpu: &mut GpuResources, extent: vk::Extent2D, frame_id: u64) -> RenderResult<()> {
        let new_targets = Self::new(gpu, extent)?;
        let old_targets = std::mem::replace(self, new_targets);
        old_targets.destroy(gpu, frame_id);
        Ok(())
    }
}
// getters
impl RenderTargets {
    #[inline]
    pub fn settings(&self) -> &FrameSettings {
        &self.settings
    }

    #[inline]
    pub fn extent(&self) -> vk::Extent2D {
        self.settings.frame_extent
    }

    #[inline]
    pub fn hdr_color(&self) -> TextureHandle {
        self.hdr_color
    }

    #[inline]
    pub fn depth_image(&self) -> vk::Image {
        self.depth_image.handle()
    }

    #[inline]
    pub fn depth_view(&self) -> vk::ImageView {
        self.depth_view.handle()
    }

    #[inline]
    pub fn bloom_mips(&self) -> &[TextureHandle] {
        &self.bloom_mips
    }

    #[inline]
    pub fn bloom_chain_length(&self) -> u32 {
        self.bloom_mips.len() as u32
    }

    /// 注册在 bindless 中的 target 必须仍然存活
    pub fn texture<'a>(&self, gpu: &'a GpuResources, handle: TextureHandle) -> RenderResult<&'a GfxTexture> {
        gpu.texture(handle).ok_or(RenderError::MissingRenderTarget(handle.index()))
    }
}
// destroy
impl RenderTargets {
    /// bindless 中的 texture 延迟销毁，depth 立即销毁
    pub fn destroy(self, gpu: &mut GpuResources, frame_id: u64) {
        let Self {
            hdr_color,
            depth_image,
            depth_view,
            bloom_mips,
            ..
        } = self;
        gpu.retire_texture(hdr_color, frame_id);
        bloom_mips.into_iter().for_each(|mip| {
            gpu.retire_texture(mip, frame_id);
        });
        depth_view.destroy();
        depth_image.destroy();
    }
}
