use std::rc::Rc;

use ash::vk;

use lumen_gfx::basic::color::LabelColor;
use lumen_gfx::pipelines::graphics_pipeline::{GfxBlendStates, GfxGraphicsPipeline, GfxPipelineLayout};
use lumen_gfx::pipelines::rendering_info::{GfxAttachment, GfxRenderingInfo};
use lumen_render_interface::bindless::BindlessDescriptorTable;
use lumen_render_interface::pipeline_variants::CullModes;
use lumen_render_interface::push_constants::PushConstantPacker;

use crate::error::RenderResult;
use crate::passes::{
    PassContext, PipelineBinder, VariantPipelineDesc, build_pipeline, fixed_state, full_rect, set_viewport_scissor,
};
use crate::push::cmd_push;
use crate::shader_library::{ShaderLibrary, ShaderNames};

/// composite 的输入，都是 bindless 下标
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompositeInputs {
    pub hdr_color: u32,
    /// 关闭 bloom 时为 `u32::MAX`
    pub bloom: u32,
    pub bloom_intensity: f32,
}

/// HDR color 叠加 bloom mip 0，tonemap 之后写入 swapchain image
///
/// push constant（fragment）：hdr texture, bloom texture, intensity
pub struct CompositePass {
    pipeline: GfxGraphicsPipeline,
    pipeline_layout: Rc<GfxPipelineLayout>,
    /// pipeline 创建时的 swapchain format，发生变化时需要重建
    color_format: vk::Format,
}
// new & init
impl CompositePass {
    pub fn new(
        swapchain_format: vk::Format,
        bindless: &BindlessDescriptorTable,
        shaders: &mut ShaderLibrary,
    ) -> RenderResult<Self> {
        let _span = tracy_client::span!("CompositePass::new");
        let vs = shaders.get(ShaderNames::FULLSCREEN_VS)?;
        let fs = shaders.get(ShaderNames::COMPOSITE_FS)?;

        let pipeline_layout =
            Rc::new(GfxPipelineLayout::from_shaders(&[bindless.layout().handle()], &[&vs, &fs], "composite")?);
        let pipeline = build_pipeline(
            &VariantPipelineDesc {
                name: "composite",
                shaders: &[&vs, &fs],
                color_formats: vec![swapchain_format],
                depth_format: None,
                blend: GfxBlendStates::opaque(),
            },
            &fixed_state(CullModes::NONE, None, false),
            &pipeline_layout,
            "composite",
        )?;

        Ok(Self {
            pipeline,
            pipeline_layout,
            color_format: swapchain_format,
        })
    }
}
// getters
impl CompositePass {
    #[inline]
    pub fn color_format(&self) -> vk::Format {
        self.color_format
    }
}
// draw
impl CompositePass {
    /// 调用前 swapchain image 处于 COLOR_ATTACHMENT，HDR color 和 bloom 处于 SHADER_READ_ONLY
    pub fn draw(&self, ctx: &PassContext, swapchain_view: vk::ImageView, inputs: &CompositeInputs) -> RenderResult<()> {
        let _span = tracy_client::span!("CompositePass::draw");
        let cmd = ctx.cmd;
        cmd.begin_label("composite", LabelColor::COLOR_STAGE);

        // 全屏三角形覆盖所有像素
        let rendering_info =
            GfxRenderingInfo::new(vec![GfxAttachment::color_dont_care(swapchain_view)], None, full_rect(ctx.extent));
        cmd.cmd_begin_rendering(&rendering_info);
        set_viewport_scissor(cmd, ctx.extent);

        PipelineBinder::new(cmd, ctx.gpu).bind(&self.pipeline);
        let mut packer = PushConstantPacker::new();
        packer.push(inputs.hdr_color)?.push(inputs.bloom)?.push(inputs.bloom_intensity)?;
        cmd_push(cmd, &self.pipeline_layout, &packer);
        cmd.cmd_draw(3, 1, 0, 0);

        cmd.end_rendering();
        cmd.end_label();
        Ok(())
    }
}
