use ash::vk;

use crate::error::GfxResult;
use crate::resources::{
    image::GfxImage,
    image_view::{GfxImageView, GfxImageViewDesc},
};
use crate::sampler::{GfxSampler, GfxSamplerDesc};

/// image + view + sampler，shader 里作为 combined image sampler 使用
///
/// # Destroy
///
/// 需要手动调用 `destroy`
pub struct GfxTexture {
    image: GfxImage,
    image_view: GfxImageView,
    sampler: GfxSampler,
}
// new & init
impl GfxTexture {
    pub fn new(image: GfxImage, sampler_desc: &GfxSamplerDesc, name: &str) -> GfxResult<Self> {
        let view_desc = GfxImageViewDesc::new_2d(image.format(), vk::ImageAspectFlags::COLOR)
            .mip_range(0, image.mip_levels());
        let image_view = match GfxImageView::new(image.handle(), view_desc, name) {
            Ok(view) => view,
            Err(e) => {
                image.destroy();
                return Err(e);
            }
        };
        let sampler = match GfxSampler::new(sampler_desc, name) {
            Ok(sampler) => sampler,
            Err(e) => {
                image_view.destroy();
                image.destroy();
                return Err(e);
            }
        };

        Ok(Self {
            image,
            image_view,
            sampler,
        })
    }
}
// getters
impl GfxTexture {
    #[inline]
    pub fn image(&self) -> &GfxImage {
        &self.image
    }

    #[inline]
    pub fn image_view(&self) -> &GfxImageView {
        &self.image_view
    }

    #[inline]
    pub fn sampler(&self) -> &GfxSampler {
        &self.sampler
    }
}
// destroy
impl GfxTexture {
    pub fn destroy(self) {
        let Self {
            image,
            image_view,
            sampler,
        } = self;
        image_view.destroy();
        image.destroy();
        drop(sampler);
    }
}
