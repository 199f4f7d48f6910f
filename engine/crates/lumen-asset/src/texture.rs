use std::path::{Path, PathBuf};

use ash::vk;
use rayon::prelude::*;

use lumen_gfx::gfx::Gfx;
use lumen_gfx::resources::image::{GfxImage, GfxImageCreateInfo, VulkanFormatUtils};
use lumen_gfx::resources::texture::GfxTexture;
use lumen_gfx::sampler::GfxSamplerDesc;
use lumen_render_interface::gpu_resources::{GpuResources, TextureHandle};

use crate::error::AssetError;

/// 解析之后的图片：宽、高、通道数以及紧密排列的像素
#[derive(Clone, Debug)]
pub struct ImageData {
    pub width: u32,
    pub height: u32,
    pub channels: u8,
    pub pixels: Vec<u8>,
}
impl ImageData {
    pub fn validate(&self) -> Result<(), AssetError> {
        let expected = self.width as usize * self.height as usize * self.channels as usize;
        if self.width == 0 || self.height == 0 || !(1..=4).contains(&self.channels) || self.pixels.len() != expected {
            return Err(AssetError::InvalidImageData {
                width: self.width,
                height: self.height,
                channels: self.channels,
                expected,
                actual: self.pixels.len(),
            });
        }
        Ok(())
    }

    /// GPU 上统一使用 4 通道；灰度复制到 rgb，缺失的 alpha 补 255
    pub fn to_rgba8(&self) -> Vec<u8> {
        let channels = self.channels as usize;
        if channels == 4 {
            return self.pixels.clone();
        }

        let mut rgba = Vec::with_capacity(self.width as usize * self.height as usize * 4);
        for px in self.pixels.chunks_exact(channels) {
            match px {
                [l] => rgba.extend_from_slice(&[*l, *l, *l, 255]),
                [l, a] => rgba.extend_from_slice(&[*l, *l, *l, *a]),
                [r, g, b] => rgba.extend_from_slice(&[*r, *g, *b, 255]),
                _ => unreachable!("channels validated to be in 1..=4"),
            }
        }
        rgba
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorSpace {
    /// base color、emissive 等颜色贴图
    Srgb,
    /// normal、roughness 等数据贴图
    Linear,
}

/// 上传纹理时的配置
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextureConfig {
    pub color_space: ColorSpace,
    pub filter: vk::Filter,
    pub wrap: vk::SamplerAddressMode,
    /// 0 表示关闭
    pub anisotropy: u32,
    pub generate_mips: bool,
}
impl Default for TextureConfig {
    fn default() -> Self {
        Self {
            color_space: ColorSpace::Srgb,
            filter: vk::Filter::LINEAR,
            wrap: vk::SamplerAddressMode::REPEAT,
            anisotropy: 8,
            generate_mips: true,
        }
    }
}
impl TextureConfig {
    pub fn linear() -> Self {
        Self {
            color_space: ColorSpace::Linear,
            ..Default::default()
        }
    }

    #[inline]
    pub fn format(&self) -> vk::Format {
        match self.color_space {
            ColorSpace::Srgb => vk::Format::R8G8B8A8_SRGB,
            ColorSpace::Linear => vk::Format::R8G8B8A8_UNORM,
        }
    }

    #[inline]
    pub fn mip_levels(&self, width: u32, height: u32) -> u32 {
        if self.generate_mips { VulkanFormatUtils::full_mip_levels(width, height) } else { 1 }
    }

    pub fn sampler_desc(&self) -> GfxSamplerDesc {
        let mipmap_mode = if self.filter == vk::Filter::NEAREST {
            vk::SamplerMipmapMode::NEAREST
        } else {
            vk::SamplerMipmapMode::LINEAR
        };
        GfxSamplerDesc {
            mag_filter: self.filter,
            min_filter: self.filter,
            address_mode_u: self.wrap,
            address_mode_v: self.wrap,
            address_mode_w: self.wrap,
            max_anisotropy: self.anisotropy,
            compare_op: None,
            mipmap_mode,
        }
    }
}

pub fn decode_image(path: &Path) -> Result<ImageData, AssetError> {
    let _span = tracy_client::span!("decode_image");
    let img = image::open(path).map_err(|source| AssetError::Decode {
        path: path.display().to_string(),
        source,
    })?;
    let rgba = img.to_rgba8();
    Ok(ImageData {
        width: rgba.width(),
        height: rgba.height(),
        channels: 4,
        pixels: rgba.into_raw(),
    })
}

/// 在 rayon 线程池中并行解码，返回之前所有解码任务都已经完成
pub fn decode_images_parallel(paths: &[PathBuf]) -> Vec<Result<ImageData, AssetError>> {
    let _span = tracy_client::span!("decode_images_parallel");
    paths.par_iter().map(|path| decode_image(path)).collect()
}

/// 同步上传：创建 image，写入 mip 0 并生成 mip，创建 sampler，最后注册到 bindless
pub fn upload_texture(
    gpu: &mut GpuResources,
    image: &ImageData,
    config: &TextureConfig,
    name: &str,
) -> Result<TextureHandle, AssetError> {
    let _span = tracy_client::span!("upload_texture");
    image.validate()?;
    let rgba = image.to_rgba8();

    let extent = vk::Extent2D {
        width: image.width,
        height: image.height,
    };
    let image_info = GfxImageCreateInfo::new_image_2d_info(
        extent,
        config.format(),
        vk::ImageUsageFlags::SAMPLED | vk::ImageUsageFlags::TRANSFER_DST | vk::ImageUsageFlags::TRANSFER_SRC,
    )
    .mip_levels(config.mip_levels(image.width, image.height));
    let gfx_image = GfxImage::new_device_local(&image_info, name)?;

    let uploaded = Gfx::get()
        .one_time_exec(|cmd| gfx_image.transfer_data(cmd, &rgba), &format!("{}-upload", name))
        .and_then(|stage| stage);
    match uploaded {
        Ok(stage_buffer) => drop(stage_buffer),
        Err(e) => {
            gfx_image.destroy();
            return Err(e.into());
        }
    }

    let texture = GfxTexture::new(gfx_image, &config.sampler_desc(), name)?;
    let handle = gpu.add_texture(texture)?;
    log::info!(
        "texture {} uploaded: {}x{}, {:?}, bindless index {}",
        name,
        image.width,
        image.height,
        config.color_space,
        handle.index()
    );
    Ok(handle)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_checks_pixel_count() {
        let ok = ImageData {
            width: 2,
            height: 2,
            channels: 3,
            pixels: vec![0; 12],
        };
        assert!(ok.validate().is_ok());

        let short = ImageData {
            pixels: vec![0; 11],
            ..ok.clone()
        };
        assert!(matches!(
            short.validate(),
            Err(AssetError::InvalidImageData {
                expected: 12,
                actual: 11,
                ..
            })
        ));

        let bad_channels = ImageData {
            channels: 5,
            pixels: vec![0; 20],
            ..ok
        };
        assert!(bad_channels.validate().is_err());
    }

    #[test]
    fn expands_to_rgba() {
        let gray = ImageData {
            width: 2,
            height: 1,
            channels: 1,
            pixels: vec![10, 20],
        };
        assert_eq!(gray.to_rgba8(), vec![10, 10, 10, 255, 20, 20, 20, 255]);

        let rgb = ImageData {
            width: 1,
            height: 1,
            channels: 3,
            pixels: vec![1, 2, 3],
        };
        assert_eq!(rgb.to_rgba8(), vec![1, 2, 3, 255]);

        let gray_alpha = ImageData {
            width: 1,
            height: 1,
            channels: 2,
            pixels: vec![7, 100],
        };
        assert_eq!(gray_alpha.to_rgba8(), vec![7, 7, 7, 100]);
    }

    #[test]
    fn config_selects_format_and_sampler() {
        let config = TextureConfig::default();
        assert_eq!(config.format(), vk::Format::R8G8B8A8_SRGB);
        assert_eq!(TextureConfig::linear().format(), vk::Format::R8G8B8A8_UNORM);
        assert_eq!(config.mip_levels(256, 64), 9);

        let nearest = TextureConfig {
            filter: vk::Filter::NEAREST,
            wrap: vk::SamplerAddressMode::CLAMP_TO_EDGE,
            anisotropy: 0,
            generate_mips: false,
            ..config
        };
        assert_eq!(nearest.mip_levels(256, 64), 1);
        let desc = nearest.sampler_desc();
        assert_eq!(desc.mipmap_mode, vk::SamplerMipmapMode::NEAREST);
        assert_eq!(desc.address_mode_v, vk::SamplerAddressMode::CLAMP_TO_EDGE);
        assert_eq!(desc.max_anisotropy, 0);
    }

    #[test]
    fn missing_file_is_a_decode_error() {
        let results = decode_images_parallel(&[PathBuf::from("definitely/not/here.png")]);
        assert_eq!(results.len(), 1);
        assert!(matches!(results[0], Err(AssetError::Decode { .. })));
    }
}
