use std::rc::Rc;

use ash::vk;
use glam::Vec2;

use lumen_crate_tools::config::BloomConfig;
use lumen_gfx::basic::color::LabelColor;
use lumen_gfx::pipelines::graphics_pipeline::{GfxBlendStates, GfxGraphicsPipeline, GfxPipelineLayout};
use lumen_gfx::pipelines::rendering_info::{GfxAttachment, GfxRenderingInfo};
use lumen_gfx::resources::texture::GfxTexture;
use lumen_render_interface::bindless::BindlessDescriptorTable;
use lumen_render_interface::gpu_resources::TextureHandle;
use lumen_render_interface::pipeline_variants::CullModes;
use lumen_render_interface::push_constants::PushConstantPacker;
use lumen_render_interface::settings::FrameSettings;

use crate::bloom::{BloomSource, BloomStep, bloom_mip_extent};
use crate::error::{RenderError, RenderResult};
use crate::frame_plan::FramePlan;
use crate::passes::{
    PassContext, PipelineBinder, VariantPipelineDesc, build_pipeline, color_barrier, fixed_state, full_rect,
    set_viewport_scissor,
};
use crate::push::cmd_push;
use crate::render_targets::RenderTargets;
use crate::shader_library::{ShaderLibrary, ShaderNames};

/// upsample 的 tent filter 半径，单位是 texel
const UPSAMPLE_RADIUS: f32 = 1.0;

/// 逐级 downsample 到 bloom mip chain，再逐级 additive upsample 回 mip 0
///
/// 每一步都是一次全屏三角形绘制。调用前 HDR color 处于 SHADER_READ_ONLY，
/// 结束后所有 bloom mip 处于 SHADER_READ_ONLY，供 composite 采样。
///
/// push constant（fragment）：
/// - downsample：src texture, texel size, threshold, knee, extract
/// - upsample：src texture, texel size, radius
pub struct BloomPass {
    downsample: GfxGraphicsPipeline,
    downsample_layout: Rc<GfxPipelineLayout>,

    upsample: GfxGraphicsPipeline,
    upsample_layout: Rc<GfxPipelineLayout>,
}
// new & init
impl BloomPass {
    pub fn new(
        settings: &FrameSettings,
        bindless: &BindlessDescriptorTable,
        shaders: &mut ShaderLibrary,
    ) -> RenderResult<Self> {
        let _span = tracy_client::span!("BloomPass::new");
        let set_layouts = [bindless.layout().handle()];
        let vs = shaders.get(ShaderNames::FULLSCREEN_VS)?;
        let down_fs = shaders.get(ShaderNames::BLOOM_DOWN_FS)?;
        let up_fs = shaders.get(ShaderNames::BLOOM_UP_FS)?;
        let no_depth = fixed_state(CullModes::NONE, None, false);

        let downsample_layout =
            Rc::new(GfxPipelineLayout::from_shaders(&set_layouts, &[&vs, &down_fs], "bloom-downsample")?);
        let downsample = build_pipeline(
            &VariantPipelineDesc {
                name: "bloom-downsample",
                shaders: &[&vs, &down_fs],
                color_formats: vec![settings.color_format],
                depth_format: None,
                blend: GfxBlendStates::opaque(),
            },
            &no_depth,
            &downsample_layout,
            "bloom-downsample",
        )?;

        let upsample_layout =
            Rc::new(GfxPipelineLayout::from_shaders(&set_layouts, &[&vs, &up_fs], "bloom-upsample")?);
        let upsample = build_pipeline(
            &VariantPipelineDesc {
                name: "bloom-upsample",
                shaders: &[&vs, &up_fs],
                color_formats: vec![settings.color_format],
                depth_format: None,
                blend: GfxBlendStates::additive(),
            },
            &no_depth,
            &upsample_layout,
            "bloom-upsample",
        )?;

        Ok(Self {
            downsample,
            downsample_layout,
            upsample,
            upsample_layout,
        })
    }
}
// draw
impl BloomPass {
    pub fn draw(
        &self,
        ctx: &PassContext,
        plan: &FramePlan,
        targets: &RenderTargets,
        config: &BloomConfig,
    ) -> RenderResult<()> {
        if plan.bloom.is_empty() {
            return Ok(());
        }
        let _span = tracy_client::span!("BloomPass::draw");
        let cmd = ctx.cmd;
        cmd.begin_label("bloom", LabelColor::COLOR_PASS);

        let mut binder = PipelineBinder::new(cmd, ctx.gpu);
        for step in &plan.bloom {
            match *step {
                BloomStep::Downsample { src, dst_mip } => {
                    let (src_handle, src_extent) = match src {
                        BloomSource::SceneColor => (targets.hdr_color(), targets.extent()),
                        BloomSource::Mip(mip) => (mip_handle(targets, mip)?, bloom_mip_extent(targets.extent(), mip)),
                    };
                    let dst = targets.texture(ctx.gpu, mip_handle(targets, dst_mip)?)?;

                    let mut packer = PushConstantPacker::new();
                    packer
                        .push(src_handle.index())?
                        .push(texel_size(src_extent))?
                        .push(config.threshold)?
                        .push(config.knee)?
                        .push(u32::from(src == BloomSource::SceneColor))?;

                    // downsample 完全覆盖 dst，不需要保留之前的内容
                    self.draw_step(
                        ctx,
                        &mut binder,
                        dst,
                        vk::ImageLayout::UNDEFINED,
                        GfxAttachment::color_dont_care(dst.image_view().handle()),
                        &self.downsample,
                        &self.downsample_layout,
                        &packer,
                    );
                }
                BloomStep::Upsample { src_mip, dst_mip } => {
                    let src_handle = mip_handle(targets, src_mip)?;
                    let dst = targets.texture(ctx.gpu, mip_handle(targets, dst_mip)?)?;

                    let mut packer = PushConstantPacker::new();
                    packer
                        .push(src_handle.index())?
                        .push(texel_size(bloom_mip_extent(targets.extent(), src_mip)))?
                        .push(UPSAMPLE_RADIUS)?;

                    self.draw_step(
                        ctx,
                        &mut binder,
                        dst,
                        vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
                        GfxAttachment::color_load(dst.image_view().handle()),
                        &self.upsample,
                        &self.upsample_layout,
                        &packer,
                    );
                }
            }
        }

        cmd.end_label();
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn draw_step(
        &self,
        ctx: &PassContext,
        binder: &mut PipelineBinder,
        dst: &GfxTexture,
        dst_layout: vk::ImageLayout,
        attachment: GfxAttachment,
        pipeline: &GfxGraphicsPipeline,
        layout: &GfxPipelineLayout,
        packer: &PushConstantPacker,
    ) {
        let cmd = ctx.cmd;
        let dst_image = dst.image().handle();
        let dst_extent = dst.image().extent_2d();

        cmd.image_memory_barrier(
            vk::DependencyFlags::empty(),
            &[color_barrier(dst_image, dst_layout, vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)],
        );

        cmd.cmd_begin_rendering(&GfxRenderingInfo::new(vec![attachment], None, full_rect(dst_extent)));
        set_viewport_scissor(cmd, dst_extent);
        binder.bind(pipeline);
        cmd_push(cmd, layout, packer);
        cmd.cmd_draw(3, 1, 0, 0);
        cmd.end_rendering();

        cmd.image_memory_barrier(
            vk::DependencyFlags::empty(),
            &[color_barrier(
                dst_image,
                vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
                vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
            )],
        );
    }
}

#[inline]
fn mip_handle(targets: &RenderTargets, mip: u32) -> RenderResult<TextureHandle> {
    targets.bloom_mips().get(mip as usize).copied().ok_or(RenderError::MissingRenderTarget(mip))
}

#[inline]
fn texel_size(extent: vk::Extent2D) -> Vec2 {
    Vec2::new(1.0 / extent.width.max(1) as f32, 1.0 / extent.height.max(1) as f32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn texel_size_is_reciprocal_of_extent() {
        let texel = texel_size(vk::Extent2D { width: 960, height: 540 });
        assert!((texel.x - 1.0 / 960.0).abs() < f32::EPSILON);
        assert!((texel.y - 1.0 / 540.0).abs() < f32::EPSILON);
        assert!(texel_size(vk::Extent2D { width: 0, height: 0 }).is_finite());
    }

    /// 和 bloom_down.frag 约定的布局：texel size 对齐到 8 字节
    #[test]
    fn downsample_push_layout() {
        let mut packer = PushConstantPacker::new();
        packer
            .push(3u32)
            .unwrap()
            .push(Vec2::new(0.5, 0.25))
            .unwrap()
            .push(1.0f32)
            .unwrap()
            .push(0.5f32)
            .unwrap()
            .push(1u32)
            .unwrap();
        assert_eq!(packer.len(), 28);
        assert_eq!(&packer.bytes()[8..12], &0.5f32.to_ne_bytes());
        assert_eq!(&packer.bytes()[24..28], &1u32.to_ne_bytes());
    }
}
