use std::rc::Rc;

use ash::vk;

use lumen_gfx::basic::color::LabelColor;
use lumen_gfx::pipelines::graphics_pipeline::{GfxBlendStates, GfxPipelineLayout};
use lumen_gfx::pipelines::reflection::VertexSemantic;
use lumen_gfx::pipelines::rendering_info::{GfxAttachment, GfxRenderingInfo};
use lumen_render_interface::bindless::BindlessDescriptorTable;
use lumen_render_interface::pipeline_variants::{
    CullModes, DepthFuncs, FillModes, PipelineVariants, RasterState, SampleCounts, Toggles,
};
use lumen_render_interface::push_constants::PushConstantPacker;

use crate::error::RenderResult;
use crate::frame_plan::FramePlan;
use crate::passes::{
    PassContext, PipelineBinder, PipelineRegistry, VariantPipelineDesc, VariantSetHandle, bind_mesh, full_rect,
    mesh_raster_state, register_variant_pipelines, resolve_variants, set_viewport_scissor,
};
use crate::push::cmd_push;
use crate::shader_library::{ShaderLibrary, ShaderNames};

/// 只写 depth 的 pass，之后的 main pass 在不透明物体上只需要 LESS_OR_EQUAL 通过一次
///
/// push constant（vertex）：globals, transforms, model_id
pub struct DepthPrepass {
    pipelines: VariantSetHandle,
    pipeline_layout: Rc<GfxPipelineLayout>,
    semantics: Vec<VertexSemantic>,
}
impl DepthPrepass {
    /// fill {FILL, LINE} x cull {NONE, BACK}
    pub fn variants() -> PipelineVariants {
        PipelineVariants {
            fill: FillModes::FILL | FillModes::LINE,
            cull: CullModes::NONE | CullModes::BACK,
            samples: SampleCounts::X1,
            depth_func: DepthFuncs::LESS,
            depth_test: Toggles::ON,
            depth_write: Toggles::ON,
        }
    }

    fn base_state() -> RasterState {
        RasterState {
            fill: FillModes::FILL,
            cull: CullModes::BACK,
            samples: SampleCounts::X1,
            depth_func: DepthFuncs::LESS,
            depth_test: Toggles::ON,
            depth_write: Toggles::ON,
        }
    }

    pub fn new(
        depth_format: vk::Format,
        bindless: &BindlessDescriptorTable,
        shaders: &mut ShaderLibrary,
        registry: &mut PipelineRegistry,
    ) -> RenderResult<Self> {
        let _span = tracy_client::span!("DepthPrepass::new");
        let vs = shaders.get(ShaderNames::DEPTH_VS)?;

        let pipeline_layout = Rc::new(GfxPipelineLayout::from_shaders(
            &[bindless.layout().handle()],
            &[&vs],
            "depth-prepass",
        )?);
        let pipelines = register_variant_pipelines(
            registry,
            Self::variants(),
            &VariantPipelineDesc {
                name: "depth-prepass",
                shaders: &[&vs],
                color_formats: vec![],
                depth_format: Some(depth_format),
                blend: GfxBlendStates::opaque(),
            },
            &pipeline_layout,
        )?;

        Ok(Self {
            pipelines,
            semantics: vs.reflection.vertex_semantics(),
            pipeline_layout,
        })
    }

    pub fn draw(&self, ctx: &PassContext, plan: &FramePlan, depth_view: vk::ImageView) -> RenderResult<()> {
        let _span = tracy_client::span!("DepthPrepass::draw");
        let pipelines = resolve_variants(ctx.pipelines, self.pipelines)?;
        let cmd = ctx.cmd;
        cmd.begin_label("depth-prepass", LabelColor::COLOR_PASS);

        let rendering_info =
            GfxRenderingInfo::new(vec![], Some(GfxAttachment::depth_clear(depth_view, 1.0)), full_rect(ctx.extent));
        cmd.cmd_begin_rendering(&rendering_info);
        set_viewport_scissor(cmd, ctx.extent);

        let mut packer = PushConstantPacker::new();
        packer.push(ctx.buffers.globals)?.push(ctx.buffers.transforms)?.mark_separator();

        let mut binder = PipelineBinder::new(cmd, ctx.gpu);
        for &draw_index in &plan.prepass {
            let draw = &ctx.data.draws[draw_index];
            let state = mesh_raster_state(Self::base_state(), draw, ctx.wireframe);
            let Some(pipeline) = pipelines.get(&state) else {
                continue;
            };
            let Some(index_count) = bind_mesh(cmd, ctx.assets, draw, &self.semantics) else {
                continue;
            };
            binder.bind(pipeline);

            packer.truncate_to_separator().push(draw.model_id)?;
            cmd_push(cmd, &self.pipeline_layout, &packer);
            cmd.draw_indexed(index_count, 0, 1, 0, 0);
        }

        cmd.end_rendering();
        cmd.end_label();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn four_variants_cover_wireframe_and_culling() {
        let variants = DepthPrepass::variants();
        assert_eq!(variants.variant_count(), 4);

        let base = DepthPrepass::base_state();
        assert_eq!(variants.index_of(&base), Some(2));
        let wire = RasterState {
            fill: FillModes::LINE,
            cull: CullModes::NONE,
            ..base
        };
        assert_eq!(variants.index_of(&wire), Some(1));
        assert_eq!(variants.decode(1), Some(wire));
    }
}
