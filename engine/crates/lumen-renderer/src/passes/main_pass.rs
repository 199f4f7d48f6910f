use std::rc::Rc;

use ash::vk;

use lumen_gfx::basic::color::LabelColor;
use lumen_gfx::pipelines::graphics_pipeline::{GfxBlendStates, GfxGraphicsPipeline, GfxPipelineLayout};
use lumen_gfx::pipelines::reflection::VertexSemantic;
use lumen_gfx::pipelines::rendering_info::{GfxAttachment, GfxRenderingInfo};
use lumen_render_interface::bindless::BindlessDescriptorTable;
use lumen_render_interface::pipeline_variants::{
    CullModes, DepthFuncs, FillModes, PipelineVariants, RasterState, SampleCounts, Toggles,
};
use lumen_render_interface::push_constants::PushConstantPacker;
use lumen_render_interface::settings::FrameSettings;
use lumen_scene::components::text::RenderMode;

use crate::error::RenderResult;
use crate::frame_plan::{FramePlan, MainDraw};
use crate::gather::MeshDraw;
use crate::passes::{
    PassContext, PipelineBinder, PipelineRegistry, VariantPipelineDesc, VariantSetHandle, bind_mesh, build_pipeline,
    fixed_state, full_rect, mesh_raster_state, register_variant_pipelines, resolve_variants, set_viewport_scissor,
};
use crate::push::cmd_push;
use crate::shader_library::{ShaderLibrary, ShaderNames};

/// main pass 的 attachment
pub struct MainTargets {
    pub hdr_view: vk::ImageView,
    /// depth prepass 写入的 depth，这里只读
    pub depth_view: vk::ImageView,
    pub clear_color: [f32; 4],
}

/// 天空盒、不透明物体、透明物体、粒子、文字，全部绘制到 HDR color target
///
/// push constant 布局：
/// - skybox（vertex + fragment）：globals, skybox texture
/// - mesh（vertex）：globals, transforms, model_id；（fragment）：base_color, emissive,
///   metallic, roughness, base_color texture, globals, directional, point, spot
/// - particle（vertex + fragment）：globals, particles, first_particle, texture
/// - text（vertex）：globals, transforms, text_advance, text_glyphs, first_glyph, model_id, size, mode；
///   （fragment）：color, atlas
pub struct MainPass {
    skybox: GfxGraphicsPipeline,
    skybox_layout: Rc<GfxPipelineLayout>,

    opaque: VariantSetHandle,
    transparent: VariantSetHandle,
    mesh_layout: Rc<GfxPipelineLayout>,
    mesh_semantics: Vec<VertexSemantic>,

    particles: GfxGraphicsPipeline,
    particle_layout: Rc<GfxPipelineLayout>,

    text_world: GfxGraphicsPipeline,
    text_screen: GfxGraphicsPipeline,
    text_layout: Rc<GfxPipelineLayout>,
}
// new & init
impl MainPass {
    /// 不透明物体的 depth 已经由 prepass 写入，所以这里都不写 depth
    pub fn mesh_variants() -> PipelineVariants {
        PipelineVariants {
            fill: FillModes::FILL | FillModes::LINE,
            cull: CullModes::NONE | CullModes::BACK,
            samples: SampleCounts::X1,
            depth_func: DepthFuncs::LESS_OR_EQUAL,
            depth_test: Toggles::ON,
            depth_write: Toggles::OFF,
        }
    }

    fn mesh_base_state() -> RasterState {
        fixed_state(CullModes::BACK, Some(DepthFuncs::LESS_OR_EQUAL), false)
    }

    pub fn new(
        settings: &FrameSettings,
        bindless: &BindlessDescriptorTable,
        shaders: &mut ShaderLibrary,
        registry: &mut PipelineRegistry,
    ) -> RenderResult<Self> {
        let _span = tracy_client::span!("MainPass::new");
        let set_layouts = [bindless.layout().handle()];
        let color_formats = vec![settings.color_format];
        let depth_format = Some(settings.depth_format);

        // skybox：z = 1 的全屏三角形，只在 depth 仍然是清除值的地方通过
        let skybox_vs = shaders.get(ShaderNames::SKYBOX_VS)?;
        let skybox_fs = shaders.get(ShaderNames::SKYBOX_FS)?;
        let skybox_layout =
            Rc::new(GfxPipelineLayout::from_shaders(&set_layouts, &[&skybox_vs, &skybox_fs], "skybox")?);
        let skybox = build_pipeline(
            &VariantPipelineDesc {
                name: "skybox",
                shaders: &[&skybox_vs, &skybox_fs],
                color_formats: color_formats.clone(),
                depth_format,
                blend: GfxBlendStates::opaque(),
            },
            &fixed_state(CullModes::NONE, Some(DepthFuncs::LESS_OR_EQUAL), false),
            &skybox_layout,
            "skybox",
        )?;

        let mesh_vs = shaders.get(ShaderNames::MESH_VS)?;
        let mesh_fs = shaders.get(ShaderNames::MESH_FS)?;
        let mesh_layout = Rc::new(GfxPipelineLayout::from_shaders(&set_layouts, &[&mesh_vs, &mesh_fs], "mesh")?);
        let opaque = register_variant_pipelines(
            registry,
            Self::mesh_variants(),
            &VariantPipelineDesc {
                name: "mesh-opaque",
                shaders: &[&mesh_vs, &mesh_fs],
                color_formats: color_formats.clone(),
                depth_format,
                blend: GfxBlendStates::opaque(),
            },
            &mesh_layout,
        )?;
        let transparent = register_variant_pipelines(
            registry,
            Self::mesh_variants(),
            &VariantPipelineDesc {
                name: "mesh-transparent",
                shaders: &[&mesh_vs, &mesh_fs],
                color_formats: color_formats.clone(),
                depth_format,
                blend: GfxBlendStates::alpha(),
            },
            &mesh_layout,
        )?;

        let particle_vs = shaders.get(ShaderNames::PARTICLE_VS)?;
        let particle_fs = shaders.get(ShaderNames::PARTICLE_FS)?;
        let particle_layout =
            Rc::new(GfxPipelineLayout::from_shaders(&set_layouts, &[&particle_vs, &particle_fs], "particle")?);
        let particles = build_pipeline(
            &VariantPipelineDesc {
                name: "particle",
                shaders: &[&particle_vs, &particle_fs],
                color_formats: color_formats.clone(),
                depth_format,
                blend: GfxBlendStates::additive(),
            },
            &fixed_state(CullModes::NONE, Some(DepthFuncs::LESS_OR_EQUAL), false),
            &particle_layout,
            "particle",
        )?;

        let text_vs = shaders.get(ShaderNames::TEXT_VS)?;
        let text_fs = shaders.get(ShaderNames::TEXT_FS)?;
        let text_layout = Rc::new(GfxPipelineLayout::from_shaders(&set_layouts, &[&text_vs, &text_fs], "text")?);
        let text_desc = VariantPipelineDesc {
            name: "text",
            shaders: &[&text_vs, &text_fs],
            color_formats,
            depth_format,
            blend: GfxBlendStates::alpha(),
        };
        let text_world = build_pipeline(
            &text_desc,
            &fixed_state(CullModes::NONE, Some(DepthFuncs::LESS_OR_EQUAL), false),
            &text_layout,
            "text-world",
        )?;
        // 屏幕空间的文字总是覆盖在场景之上
        let text_screen =
            build_pipeline(&text_desc, &fixed_state(CullModes::NONE, None, false), &text_layout, "text-screen")?;

        Ok(Self {
            skybox,
            skybox_layout,
            opaque,
            transparent,
            mesh_layout,
            mesh_semantics: mesh_vs.reflection.vertex_semantics(),
            particles,
            particle_layout,
            text_world,
            text_screen,
            text_layout,
        })
    }
}
// draw
impl MainPass {
    /// 严格按照 `plan.main` 的顺序绘制
    pub fn draw(
        &self,
        ctx: &PassContext,
        plan: &FramePlan,
        targets: &MainTargets,
        skybox_texture: u32,
    ) -> RenderResult<()> {
        let _span = tracy_client::span!("MainPass::draw");
        let cmd = ctx.cmd;
        cmd.begin_label("main-pass", LabelColor::COLOR_PASS);

        let rendering_info = GfxRenderingInfo::new(
            vec![GfxAttachment::color_clear(targets.hdr_view, targets.clear_color)],
            Some(GfxAttachment::depth_load(targets.depth_view)),
            full_rect(ctx.extent),
        );
        cmd.cmd_begin_rendering(&rendering_info);
        set_viewport_scissor(cmd, ctx.extent);

        let mut binder = PipelineBinder::new(cmd, ctx.gpu);
        for entry in &plan.main {
            match *entry {
                MainDraw::Skybox => self.draw_skybox(ctx, &mut binder, skybox_texture)?,
                MainDraw::Opaque(index) => {
                    self.draw_mesh(ctx, &mut binder, self.opaque, &ctx.data.draws[index])?;
                }
                MainDraw::Transparent(index) => {
                    self.draw_mesh(ctx, &mut binder, self.transparent, &ctx.data.draws[index])?;
                }
                MainDraw::Particles(index) => self.draw_particles(ctx, &mut binder, index)?,
                MainDraw::Text(index) => self.draw_text(ctx, &mut binder, index)?,
            }
        }

        cmd.end_rendering();
        cmd.end_label();
        Ok(())
    }

    fn draw_skybox(&self, ctx: &PassContext, binder: &mut PipelineBinder, skybox_texture: u32) -> RenderResult<()> {
        binder.bind(&self.skybox);

        let mut packer = PushConstantPacker::new();
        packer.push(ctx.buffers.globals)?.push(skybox_texture)?;
        cmd_push(ctx.cmd, &self.skybox_layout, &packer);
        ctx.cmd.cmd_draw(3, 1, 0, 0);
        Ok(())
    }

    fn draw_mesh(
        &self,
        ctx: &PassContext,
        binder: &mut PipelineBinder,
        pipelines: VariantSetHandle,
        draw: &MeshDraw,
    ) -> RenderResult<()> {
        let pipelines = resolve_variants(ctx.pipelines, pipelines)?;
        let state = mesh_raster_state(Self::mesh_base_state(), draw, ctx.wireframe);
        let Some(pipeline) = pipelines.get(&state) else {
            return Ok(());
        };
        let Some(index_count) = bind_mesh(ctx.cmd, ctx.assets, draw, &self.mesh_semantics) else {
            return Ok(());
        };
        binder.bind(pipeline);

        let buffers = &ctx.buffers;
        let mut packer = PushConstantPacker::new();
        packer.push(buffers.globals)?.push(buffers.transforms)?.push(draw.model_id)?.mark_separator();
        packer
            .push(draw.base_color)?
            .push(draw.emissive)?
            .push(draw.metallic)?
            .push(draw.roughness)?
            .push(draw.base_color_texture)?
            .push(buffers.globals)?
            .push(buffers.directional_lights)?
            .push(buffers.point_lights)?
            .push(buffers.spot_lights)?;
        cmd_push(ctx.cmd, &self.mesh_layout, &packer);
        ctx.cmd.draw_indexed(index_count, 0, 1, 0, 0);
        Ok(())
    }

    /// 每个粒子展开成两个三角形
    fn draw_particles(&self, ctx: &PassContext, binder: &mut PipelineBinder, index: usize) -> RenderResult<()> {
        let draw = &ctx.data.particle_draws[index];
        binder.bind(&self.particles);

        let mut packer = PushConstantPacker::new();
        packer
            .push(ctx.buffers.globals)?
            .push(ctx.buffers.particles)?
            .push(draw.first_particle)?
            .push(draw.texture)?;
        cmd_push(ctx.cmd, &self.particle_layout, &packer);
        ctx.cmd.cmd_draw(draw.vertex_count(), 1, 0, 0);
        Ok(())
    }

    /// 每个字形展开成两个三角形
    fn draw_text(&self, ctx: &PassContext, binder: &mut PipelineBinder, index: usize) -> RenderResult<()> {
        let draw = &ctx.data.text_draws[index];
        let (pipeline, mode) = match draw.mode {
            RenderMode::World => (&self.text_world, 0u32),
            RenderMode::Screen => (&self.text_screen, 1u32),
        };
        binder.bind(pipeline);

        let buffers = &ctx.buffers;
        let mut packer = PushConstantPacker::new();
        packer
            .push(buffers.globals)?
            .push(buffers.transforms)?
            .push(buffers.text_advance)?
            .push(buffers.text_glyphs)?
            .push(draw.first_glyph)?
            .push(draw.model_id)?
            .push(draw.size)?
            .push(mode)?
            .mark_separator();
        packer.push(draw.color)?.push(draw.atlas)?;
        cmd_push(ctx.cmd, &self.text_layout, &packer);
        ctx.cmd.cmd_draw(draw.vertex_count(), 1, 0, 0);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec4;
    use lumen_render_interface::push_constants::PUSH_CONSTANT_CAPACITY;

    #[test]
    fn mesh_variants_never_write_depth() {
        let variants = MainPass::mesh_variants();
        assert_eq!(variants.variant_count(), 4);
        assert!(variants.iter().all(|s| !s.depth_write_enabled()));
        assert!(variants.index_of(&MainPass::mesh_base_state()).is_some());
    }

    /// 和 mesh.frag 约定的布局：fragment 数据从 16 字节处开始
    #[test]
    fn mesh_push_layout() {
        let mut packer = PushConstantPacker::new();
        packer.push(0u32).unwrap().push(1u32).unwrap().push(2u32).unwrap().mark_separator();
        packer
            .push(Vec4::ONE)
            .unwrap()
            .push(Vec4::ZERO)
            .unwrap()
            .push(0.5f32)
            .unwrap()
            .push(0.5f32)
            .unwrap()
            .push(u32::MAX)
            .unwrap()
            .push(0u32)
            .unwrap()
            .push(1u32)
            .unwrap()
            .push(2u32)
            .unwrap()
            .push(3u32)
            .unwrap();
        assert_eq!(packer.separator(), 12);
        assert_eq!(packer.len(), 76);
        assert!(packer.len() <= PUSH_CONSTANT_CAPACITY);
        // base_color 对齐到 16
        assert_eq!(&packer.bytes()[16..20], &1.0f32.to_ne_bytes());
    }
}
