//! 一帧中的各个 pass，每个 pass 持有自己的 pipeline，在 `draw` 中录制命令

pub mod bloom_pass;
pub mod composite_pass;
pub mod depth_prepass;
pub mod main_pass;

use std::rc::Rc;

use ash::vk;

use lumen_asset::asset_hub::AssetHub;
use lumen_gfx::commands::barrier::{GfxBarrierMask, GfxImageBarrier};
use lumen_gfx::commands::command_buffer::GfxCommandBuffer;
use lumen_gfx::error::GfxResult;
use lumen_gfx::pipelines::graphics_pipeline::{GfxGraphicsPipeline, GfxGraphicsPipelineCreateInfo, GfxPipelineLayout};
use lumen_gfx::pipelines::reflection::VertexSemantic;
use lumen_gfx::pipelines::shader::ShaderBlob;
use lumen_render_interface::gpu_resources::GpuResources;
use lumen_render_interface::handle::{Handle, HandleRegistry};
use lumen_render_interface::pipeline_variants::{
    CullModes, DepthFuncs, FillModes, PipelineVariantSet, PipelineVariants, RasterState, SampleCounts, Toggles,
};

use crate::error::{RenderError, RenderResult};
use crate::frame_buffers::BufferIndices;
use crate::gather::{FrameData, MeshDraw};

/// 录制 pass 时需要读取的数据
pub struct PassContext<'a> {
    pub cmd: &'a GfxCommandBuffer,
    pub gpu: &'a GpuResources,
    pub assets: &'a AssetHub,
    pub pipelines: &'a PipelineRegistry,
    pub data: &'a FrameData,
    pub buffers: BufferIndices,
    pub extent: vk::Extent2D,
    pub wireframe: bool,
}

#[inline]
pub(crate) fn full_rect(extent: vk::Extent2D) -> vk::Rect2D {
    vk::Rect2D {
        offset: vk::Offset2D::default(),
        extent,
    }
}

/// 投影矩阵已经翻转了 y 轴，这里使用正常的 viewport
pub(crate) fn set_viewport_scissor(cmd: &GfxCommandBuffer, extent: vk::Extent2D) {
    cmd.cmd_set_viewport(
        0,
        &[vk::Viewport {
            x: 0.0,
            y: 0.0,
            width: extent.width as f32,
            height: extent.height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        }],
    );
    cmd.cmd_set_scissor(0, &[full_rect(extent)]);
}

/// 某个 layout 作为 barrier 的 src 或者 dst 时对应的 stage 和 access
///
/// 离开 UNDEFINED 时需要等待之前所有可能读取这个 image 的 stage（上一帧的采样和 attachment 访问）
fn layout_stage_access(layout: vk::ImageLayout, as_src: bool) -> (vk::PipelineStageFlags2, vk::AccessFlags2) {
    let fragment_tests = vk::PipelineStageFlags2::EARLY_FRAGMENT_TESTS | vk::PipelineStageFlags2::LATE_FRAGMENT_TESTS;
    match layout {
        vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL if as_src => (
            vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT,
            vk::AccessFlags2::COLOR_ATTACHMENT_WRITE,
        ),
        vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL => (
            vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT,
            vk::AccessFlags2::COLOR_ATTACHMENT_READ | vk::AccessFlags2::COLOR_ATTACHMENT_WRITE,
        ),
        vk::ImageLayout::DEPTH_ATTACHMENT_OPTIMAL if as_src => {
            (fragment_tests, vk::AccessFlags2::DEPTH_STENCIL_ATTACHMENT_WRITE)
        }
        vk::ImageLayout::DEPTH_ATTACHMENT_OPTIMAL => (
            fragment_tests,
            vk::AccessFlags2::DEPTH_STENCIL_ATTACHMENT_READ | vk::AccessFlags2::DEPTH_STENCIL_ATTACHMENT_WRITE,
        ),
        vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL if as_src => {
            (vk::PipelineStageFlags2::FRAGMENT_SHADER, vk::AccessFlags2::NONE)
        }
        vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL => {
            (vk::PipelineStageFlags2::FRAGMENT_SHADER, vk::AccessFlags2::SHADER_SAMPLED_READ)
        }
        vk::ImageLayout::PRESENT_SRC_KHR => (vk::PipelineStageFlags2::BOTTOM_OF_PIPE, vk::AccessFlags2::NONE),
        _ => (
            vk::PipelineStageFlags2::FRAGMENT_SHADER
                | vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT
                | fragment_tests,
            vk::AccessFlags2::NONE,
        ),
    }
}

/// 单个 mip、单个 layer 的 layout 转换
pub(crate) fn layout_barrier(
    image: vk::Image,
    aspect: vk::ImageAspectFlags,
    from: vk::ImageLayout,
    to: vk::ImageLayout,
) -> GfxImageBarrier {
    let (src_stage, src_access) = layout_stage_access(from, true);
    let (dst_stage, dst_access) = layout_stage_access(to, false);
    GfxImageBarrier::new()
        .image(image)
        .image_aspect_flag(aspect)
        .layout_transfer(from, to)
        .mask(GfxBarrierMask {
            src_stage,
            dst_stage,
            src_access,
            dst_access,
        })
}

#[inline]
pub(crate) fn color_barrier(image: vk::Image, from: vk::ImageLayout, to: vk::ImageLayout) -> GfxImageBarrier {
    layout_barrier(image, vk::ImageAspectFlags::COLOR, from, to)
}

/// 绑定 vertex buffer 和 index buffer，返回 index 数量
///
/// mesh 在收集之后失效，或者缺少 shader 需要的顶点属性时返回 None，这个 draw 被跳过
pub(crate) fn bind_mesh(
    cmd: &GfxCommandBuffer,
    assets: &AssetHub,
    draw: &MeshDraw,
    semantics: &[VertexSemantic],
) -> Option<u32> {
    let mesh = assets.mesh(draw.mesh)?;
    let vertex_buffers = mesh.vertex_buffers_for(semantics)?;
    let offsets = vec![0; vertex_buffers.len()];
    cmd.cmd_bind_vertex_buffers(0, &vertex_buffers, &offsets);
    cmd.cmd_bind_index_buffer(mesh.index_buffer(), 0, vk::IndexType::UINT32);
    Some(mesh.index_count())
}

/// 一组共享 shader 和 attachment 的 pipeline，只有光栅化配置不同
pub(crate) struct VariantPipelineDesc<'a> {
    pub name: &'a str,
    pub shaders: &'a [&'a ShaderBlob],
    pub color_formats: Vec<vk::Format>,
    pub depth_format: Option<vk::Format>,
    /// 每个 color attachment 使用相同的 blend
    pub blend: vk::PipelineColorBlendAttachmentState,
}

pub type GraphicsVariants = PipelineVariantSet<GfxGraphicsPipeline>;
pub type VariantSetHandle = Handle<GraphicsVariants>;

/// 所有 pass 的 pipeline 变体集合，pass 自己只保存句柄
pub type PipelineRegistry = HandleRegistry<GraphicsVariants>;

/// 为每个变体创建一个 pipeline，整组放入 registry
pub(crate) fn register_variant_pipelines(
    registry: &mut PipelineRegistry,
    variants: PipelineVariants,
    desc: &VariantPipelineDesc,
    layout: &Rc<GfxPipelineLayout>,
) -> GfxResult<VariantSetHandle> {
    let set = PipelineVariantSet::build(variants, |index, state| {
        build_pipeline(desc, state, layout, &format!("{}-{}", desc.name, index))
    })?;
    log::debug!("{}: {} pipeline variants", desc.name, set.len());
    Ok(registry.emplace(set))
}

/// 句柄失效意味着 registry 先于 pass 被清空
pub(crate) fn resolve_variants<P>(
    registry: &HandleRegistry<PipelineVariantSet<P>>,
    handle: Handle<PipelineVariantSet<P>>,
) -> RenderResult<&PipelineVariantSet<P>> {
    registry.get(handle).ok_or(RenderError::StaleVariantSet(handle.index()))
}

pub(crate) fn build_pipeline(
    desc: &VariantPipelineDesc,
    state: &RasterState,
    layout: &Rc<GfxPipelineLayout>,
    debug_name: &str,
) -> GfxResult<GfxGraphicsPipeline> {
    let mut ci = GfxGraphicsPipelineCreateInfo::default();
    ci.attach_info(desc.color_formats.clone(), desc.depth_format);
    for blob in desc.shaders {
        ci.shader_stage(blob);
    }
    ci.color_blend(vec![desc.blend; desc.color_formats.len()])
        .polygon_mode(state.polygon_mode())
        .cull_mode(state.cull_mode(), vk::FrontFace::COUNTER_CLOCKWISE)
        .msaa_sample(state.sample_count())
        .depth_test(
            state.depth_test_enabled().then(|| state.compare_op()),
            state.depth_write_enabled(),
        );
    GfxGraphicsPipeline::new(&ci, layout.clone(), debug_name)
}

/// 不需要变体的 pipeline：实心填充、单采样
pub(crate) fn fixed_state(cull: CullModes, depth_func: Option<DepthFuncs>, depth_write: bool) -> RasterState {
    RasterState {
        fill: FillModes::FILL,
        cull,
        samples: SampleCounts::X1,
        depth_func: depth_func.unwrap_or(DepthFuncs::ALWAYS),
        depth_test: if depth_func.is_some() { Toggles::ON } else { Toggles::OFF },
        depth_write: if depth_write { Toggles::ON } else { Toggles::OFF },
    }
}

/// 只在 pipeline 或者 pipeline layout 变化时重新绑定
///
/// push constant range 不同的 layout 之间 set 0 不兼容，所以 layout 变化时重新绑定 bindless set
pub(crate) struct PipelineBinder<'a> {
    cmd: &'a GfxCommandBuffer,
    gpu: &'a GpuResources,
    pipeline: vk::Pipeline,
    layout: vk::PipelineLayout,
}
impl<'a> PipelineBinder<'a> {
    pub fn new(cmd: &'a GfxCommandBuffer, gpu: &'a GpuResources) -> Self {
        Self {
            cmd,
            gpu,
            pipeline: vk::Pipeline::null(),
            layout: vk::PipelineLayout::null(),
        }
    }

    pub fn bind(&mut self, pipeline: &GfxGraphicsPipeline) {
        if pipeline.handle() != self.pipeline {
            self.cmd.cmd_bind_pipeline(vk::PipelineBindPoint::GRAPHICS, pipeline.handle());
            self.pipeline = pipeline.handle();
        }
        if pipeline.layout().handle() != self.layout {
            self.gpu.bindless().bind_global(self.cmd, vk::PipelineBindPoint::GRAPHICS, pipeline.layout());
            self.layout = pipeline.layout().handle();
        }
    }
}

/// mesh pipeline 的变体选择：线框模式使用 LINE，双面材质不做剔除
#[inline]
pub(crate) fn mesh_raster_state(base: RasterState, draw: &MeshDraw, wireframe: bool) -> RasterState {
    RasterState {
        fill: if wireframe { FillModes::LINE } else { FillModes::FILL },
        cull: if draw.double_sided { CullModes::NONE } else { CullModes::BACK },
        ..base
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::passes::depth_prepass::DepthPrepass;

    fn variant_set() -> PipelineVariantSet<u32> {
        PipelineVariantSet::build(DepthPrepass::variants(), |index, _| Ok::<_, ()>(index)).unwrap()
    }

    #[test]
    fn variant_set_resolves_through_its_handle() {
        let mut registry = HandleRegistry::new();
        let handle = registry.emplace(variant_set());

        let set = resolve_variants(&registry, handle).unwrap();
        assert_eq!(set.len(), 4);
        assert_eq!(set.get_by_index(1), Some(&1));
    }

    #[test]
    fn stale_variant_set_handle_misses() {
        let mut registry = HandleRegistry::new();
        let old = registry.emplace(variant_set());
        assert!(registry.erase(old).is_some());

        // 新的集合复用同一个 slot，旧句柄仍然失效
        let new = registry.emplace(variant_set());
        assert_eq!(new.index(), old.index());
        assert!(matches!(resolve_variants(&registry, old), Err(RenderError::StaleVariantSet(i)) if i == old.index()));
        assert!(resolve_variants(&registry, new).is_ok());
    }

    #[test]
    fn wireframe_and_double_sided_pick_variant_axes() {
        let base = RasterState {
            fill: FillModes::FILL,
            cull: CullModes::BACK,
            samples: SampleCounts::X1,
            depth_func: DepthFuncs::LESS,
            depth_test: Toggles::ON,
            depth_write: Toggles::ON,
        };
        let mut draw = crate::gather::tests::sample_draw();
        assert_eq!(mesh_raster_state(base, &draw, false), base);

        draw.double_sided = true;
        let state = mesh_raster_state(base, &draw, true);
        assert_eq!(state.fill, FillModes::LINE);
        assert_eq!(state.cull, CullModes::NONE);
        assert_eq!(state.depth_func, DepthFuncs::LESS);
    }

    #[test]
    fn barriers_wait_for_the_previous_access() {
        let to_read = color_barrier(
            vk::Image::null(),
            vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
            vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        );
        let inner = to_read.inner();
        assert_eq!(inner.src_stage_mask, vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT);
        assert_eq!(inner.src_access_mask, vk::AccessFlags2::COLOR_ATTACHMENT_WRITE);
        assert_eq!(inner.dst_access_mask, vk::AccessFlags2::SHADER_SAMPLED_READ);

        let depth = layout_barrier(
            vk::Image::null(),
            vk::ImageAspectFlags::DEPTH,
            vk::ImageLayout::UNDEFINED,
            vk::ImageLayout::DEPTH_ATTACHMENT_OPTIMAL,
        );
        let inner = depth.inner();
        assert!(inner.src_stage_mask.contains(vk::PipelineStageFlags2::LATE_FRAGMENT_TESTS));
        assert_eq!(inner.src_access_mask, vk::AccessFlags2::NONE);
        assert_eq!(inner.subresource_range.aspect_mask, vk::ImageAspectFlags::DEPTH);

        let present = color_barrier(
            vk::Image::null(),
            vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
            vk::ImageLayout::PRESENT_SRC_KHR,
        );
        assert_eq!(present.inner().dst_stage_mask, vk::PipelineStageFlags2::BOTTOM_OF_PIPE);
    }

    #[test]
    fn fixed_state_without_depth_disables_test() {
        let state = fixed_state(CullModes::NONE, None, false);
        assert!(!state.depth_test_enabled());
        assert!(!state.depth_write_enabled());
        assert_eq!(state.cull_mode(), vk::CullModeFlags::NONE);

        let sky = fixed_state(CullModes::NONE, Some(DepthFuncs::LESS_OR_EQUAL), false);
        assert_eq!(sky.compare_op(), vk::CompareOp::LESS_OR_EQUAL);
    }
}
