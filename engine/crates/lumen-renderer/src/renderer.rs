use ash::vk;
use glam::{Mat4, UVec4, Vec4};
use raw_window_handle::{RawDisplayHandle, RawWindowHandle};

use lumen_asset::asset_hub::AssetHub;
use lumen_asset::mesh::MeshHandle;
use lumen_crate_tools::config::{EngineConfig, PresentModeConfig};
use lumen_gfx::commands::command_buffer::GfxCommandBuffer;
use lumen_gfx::commands::submit_info::GfxSubmitInfo;
use lumen_gfx::error::GfxResult;
use lumen_gfx::gfx::Gfx;
use lumen_gfx::swapchain::render_swapchain::{GfxRenderSwapchain, GfxSwapchainStatus};
use lumen_gfx::swapchain::surface::GfxSurface;
use lumen_render_interface::bindless::{BindlessCapacity, INVALID_BINDLESS_INDEX};
use lumen_render_interface::frame_context::FrameContext;
use lumen_render_interface::frame_counter::FrameCounter;
use lumen_render_interface::frame_ring::FrameRing;
use lumen_render_interface::gpu_resources::{GpuResources, TextureHandle};
use lumen_render_interface::settings::DefaultRendererSettings;
use lumen_scene::camera::Camera;
use lumen_scene::scene_manager::SceneManager;

use crate::error::RenderResult;
use crate::frame_buffers::{BufferIndices, FrameBuffers};
use crate::frame_plan::{FramePlan, FrameStats};
use crate::gather::{AssetLookup, FrameData, LiveAssets};
use crate::gpu_data::FrameGlobals;
use crate::passes::bloom_pass::BloomPass;
use crate::passes::composite_pass::{CompositeInputs, CompositePass};
use crate::passes::depth_prepass::DepthPrepass;
use crate::passes::main_pass::{MainPass, MainTargets};
use crate::passes::{PassContext, PipelineRegistry, color_barrier, layout_barrier};
use crate::render_targets::RenderTargets;
use crate::shader_library::ShaderLibrary;

/// 渲染器核心
///
/// 持有 swapchain、帧环、所有 pass 以及 GPU 资源表，每次 `render_frame` 完成一帧的全部工作。
///
/// # 渲染流程
/// ```ignore
/// renderer.render_frame(&scene, &camera)?;
/// // 1. 等待当前 slot 的 fence，回收延迟销毁的资源
/// // 2. acquire swapchain image
/// // 3. 收集场景，透明物体由远到近排序，上传本帧数据
/// // 4. depth prepass -> main pass -> bloom -> composite
/// // 5. submit，present
/// ```
///
/// # Destroy
///
/// 需要手动调用 `destroy`
pub struct Renderer {
    config: EngineConfig,

    frame_counter: FrameCounter,
    frame_ring: FrameRing<FrameContext>,
    /// 和 frame ring 的 slot 一一对应
    frame_buffers: Vec<FrameBuffers>,

    gpu: GpuResources,
    assets: AssetHub,

    swapchain: GfxRenderSwapchain,
    render_targets: RenderTargets,

    shaders: ShaderLibrary,
    /// depth prepass 和 main pass 的 pipeline 变体，pass 中只保存句柄
    pipelines: PipelineRegistry,
    depth_prepass: DepthPrepass,
    main_pass: MainPass,
    bloom_pass: BloomPass,
    composite_pass: CompositePass,

    /// 窗口当前的物理尺寸，为 0 时表示最小化
    window_extent: vk::Extent2D,
    /// 窗口尺寸变化之后，在下一帧开始时重建 swapchain
    pending_extent: Option<vk::Extent2D>,

    last_stats: FrameStats,
}
// new & init
impl Renderer {
    /// 调用之前需要先执行 `Gfx::init`
    pub fn new(
        config: EngineConfig,
        raw_display_handle: RawDisplayHandle,
        raw_window_handle: RawWindowHandle,
        window_extent: vk::Extent2D,
    ) -> RenderResult<Self> {
        let _span = tracy_client::span!("Renderer::new");
        let fif_count = config.renderer.frames_in_flight();

        let mut gpu = GpuResources::new(
            BindlessCapacity {
                storage_buffers: config.bindless.max_buffers,
                uniform_buffers: config.bindless.max_buffers,
                textures: config.bindless.max_images,
            },
            fif_count,
        )?;

        let surface = GfxSurface::new(raw_display_handle, raw_window_handle)?;
        let swapchain = GfxRenderSwapchain::new(surface, present_mode(config.renderer.present_mode), window_extent)?;
        let render_targets = RenderTargets::new(&mut gpu, swapchain.extent())?;

        let mut shaders = ShaderLibrary::new(&config.shaders.directory);
        let mut pipelines = PipelineRegistry::new();
        let depth_prepass = DepthPrepass::new(
            render_targets.settings().depth_format,
            gpu.bindless(),
            &mut shaders,
            &mut pipelines,
        )?;
        let main_pass = MainPass::new(render_targets.settings(), gpu.bindless(), &mut shaders, &mut pipelines)?;
        let bloom_pass = BloomPass::new(render_targets.settings(), gpu.bindless(), &mut shaders)?;
        let composite_pass = CompositePass::new(swapchain.format(), gpu.bindless(), &mut shaders)?;
        log::info!("{} shaders loaded from {}", shaders.loaded_count(), shaders.directory().display());

        let slots = (0..fif_count).map(FrameContext::new).collect::<GfxResult<Vec<_>>>()?;
        let frame_buffers =
            (0..fif_count).map(|slot| FrameBuffers::new(&mut gpu, slot)).collect::<RenderResult<Vec<_>>>()?;
        let frame_ring = FrameRing::new(slots, config.renderer.fence_timeout_ns());

        log::info!(
            "renderer created: {} frames in flight, wireframe {}, bloom {}",
            fif_count,
            config.renderer.wireframe,
            config.bloom.enabled
        );
        Ok(Self {
            frame_counter: FrameCounter::new(0, fif_count),
            frame_ring,
            frame_buffers,
            gpu,
            assets: AssetHub::new(),
            swapchain,
            render_targets,
            shaders,
            pipelines,
            depth_prepass,
            main_pass,
            bloom_pass,
            composite_pass,
            window_extent,
            pending_extent: None,
            last_stats: FrameStats::default(),
            config,
        })
    }
}
// getters
impl Renderer {
    #[inline]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    #[inline]
    pub fn frame_id(&self) -> u64 {
        self.frame_counter.frame_id()
    }

    #[inline]
    pub fn swapchain_extent(&self) -> vk::Extent2D {
        self.swapchain.extent()
    }

    #[inline]
    pub fn assets(&self) -> &AssetHub {
        &self.assets
    }

    #[inline]
    pub fn gpu(&self) -> &GpuResources {
        &self.gpu
    }

    /// 上传 mesh 和 texture 时需要同时修改两者
    #[inline]
    pub fn upload_context(&mut self) -> (&mut AssetHub, &mut GpuResources) {
        (&mut self.assets, &mut self.gpu)
    }

    #[inline]
    pub fn last_stats(&self) -> &FrameStats {
        &self.last_stats
    }

    #[inline]
    pub fn wireframe(&self) -> bool {
        self.config.renderer.wireframe
    }
}
// update
impl Renderer {
    #[inline]
    pub fn set_wireframe(&mut self, wireframe: bool) {
        if self.config.renderer.wireframe != wireframe {
            log::info!("wireframe: {}", wireframe);
        }
        self.config.renderer.wireframe = wireframe;
    }

    /// 只记录新的尺寸，下一帧开始时才重建
    #[inline]
    pub fn resize(&mut self, window_extent: vk::Extent2D) {
        self.window_extent = window_extent;
        self.pending_extent = Some(window_extent);
    }

    /// 句柄立即失效，GPU buffer 等到使用它的帧都完成之后才销毁
    #[inline]
    pub fn retire_mesh(&mut self, handle: MeshHandle) -> bool {
        self.assets.retire_mesh(handle, self.frame_counter.frame_id())
    }

    /// 同时移除路径缓存，之后再次加载同一路径会重新上传
    #[inline]
    pub fn retire_texture(&mut self, handle: TextureHandle) -> bool {
        self.assets.retire_texture(&mut self.gpu, handle, self.frame_counter.frame_id())
    }
}
// draw
impl Renderer {
    /// 渲染一帧并 present
    ///
    /// 窗口最小化或者 swapchain 过期时返回 `Ok(None)`，这两种情况都不是错误
    pub fn render_frame(&mut self, scene: &SceneManager, camera: &Camera) -> RenderResult<Option<FrameStats>> {
        let _span = tracy_client::span!("Renderer::render_frame");

        if is_minimized(self.window_extent) {
            return Ok(None);
        }
        if let Some(extent) = self.pending_extent.take() {
            self.recreate(extent)?;
        }

        // 1. 等待 slot 空闲，此时该 slot 上一次提交的数据都不再被 GPU 使用
        let cmd = self.frame_ring.begin_frame()?.command_buffer().clone();
        let frame_id = self.frame_counter.frame_id();
        let slot = self.frame_ring.current_index();
        self.gpu.reclaim(frame_id);
        self.assets.reclaim(frame_id, self.frame_counter.fif_count() as u64);

        // 2. acquire
        let acquire_status = self
            .swapchain
            .acquire_next_image(self.frame_ring.current().image_acquired(), DefaultRendererSettings::ACQUIRE_TIMEOUT_NS)?;
        if acquire_status == GfxSwapchainStatus::OutOfDate {
            self.frame_ring.abandon_frame()?;
            self.recreate(self.window_extent)?;
            return Ok(None);
        }

        // 3. gather & upload
        let (data, skybox_texture) = {
            let _span = tracy_client::span!("gather");
            let lookup = LiveAssets {
                hub: &self.assets,
                gpu: &self.gpu,
            };
            let mut data = FrameData::gather(scene, camera, &lookup);
            data.sort_transparent();
            let skybox_texture = scene.skybox().map_or(INVALID_BINDLESS_INDEX, |t| lookup.texture_index(t));
            (data, skybox_texture)
        };
        let globals = frame_globals(camera, self.render_targets.extent(), &data);
        let buffers = self.frame_buffers[slot].upload(&mut self.gpu, &data, &globals, frame_id)?;

        let bloom_chain = self.config.bloom.enabled.then(|| self.render_targets.bloom_chain_length());
        let plan = FramePlan::build(&data, bloom_chain);

        // 4. record
        debug_assert!(self.frame_ring.outstanding_count() < self.frame_ring.len());
        self.record(&cmd, &data, &plan, buffers, skybox_texture)?;

        // 5. submit
        let queue = Gfx::get().gfx_queue();
        self.frame_ring.submit_with(|frame| {
            let submit_info = GfxSubmitInfo::new(std::slice::from_ref(frame.command_buffer()))
                .wait(frame.image_acquired(), vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT)
                .signal(frame.render_finished(), vk::PipelineStageFlags2::ALL_COMMANDS);
            queue.submit(&[submit_info], Some(frame.fence()))
        })?;

        // 6. present
        let present_status = self.swapchain.present_image(queue, &[self.frame_ring.current().render_finished()])?;

        let stats = FrameStats::new(&data, &plan);
        log::debug!("{} {:?}", self.frame_counter.frame_name(), stats);
        self.last_stats = stats;

        self.frame_ring.advance();
        self.frame_counter.next_frame();

        if acquire_status.need_recreate() || present_status.need_recreate() {
            self.recreate(self.window_extent)?;
        }
        Ok(Some(stats))
    }

    fn record(
        &self,
        cmd: &GfxCommandBuffer,
        data: &FrameData,
        plan: &FramePlan,
        buffers: BufferIndices,
        skybox_texture: u32,
    ) -> RenderResult<()> {
        let _span = tracy_client::span!("Renderer::record");
        let targets = &self.render_targets;
        let hdr = targets.texture(&self.gpu, targets.hdr_color())?;
        let hdr_image = hdr.image().handle();
        let depth_image = targets.depth_image();
        let swapchain_image = self.swapchain.current_image();

        cmd.begin(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT, &self.frame_counter.frame_name())?;
        let ctx = PassContext {
            cmd,
            gpu: &self.gpu,
            assets: &self.assets,
            pipelines: &self.pipelines,
            data,
            buffers,
            extent: targets.extent(),
            wireframe: self.config.renderer.wireframe,
        };

        // 上一帧的内容不需要保留
        cmd.image_memory_barrier(
            vk::DependencyFlags::empty(),
            &[
                layout_barrier(
                    depth_image,
                    vk::ImageAspectFlags::DEPTH,
                    vk::ImageLayout::UNDEFINED,
                    vk::ImageLayout::DEPTH_ATTACHMENT_OPTIMAL,
                ),
                color_barrier(hdr_image, vk::ImageLayout::UNDEFINED, vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL),
            ],
        );
        self.depth_prepass.draw(&ctx, plan, targets.depth_view())?;

        cmd.image_memory_barrier(
            vk::DependencyFlags::empty(),
            &[layout_barrier(
                depth_image,
                vk::ImageAspectFlags::DEPTH,
                vk::ImageLayout::DEPTH_ATTACHMENT_OPTIMAL,
                vk::ImageLayout::DEPTH_ATTACHMENT_OPTIMAL,
            )],
        );
        self.main_pass.draw(
            &ctx,
            plan,
            &MainTargets {
                hdr_view: hdr.image_view().handle(),
                depth_view: targets.depth_view(),
                clear_color: self.config.renderer.clear_color,
            },
            skybox_texture,
        )?;

        cmd.image_memory_barrier(
            vk::DependencyFlags::empty(),
            &[color_barrier(
                hdr_image,
                vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
                vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
            )],
        );
        self.bloom_pass.draw(&ctx, plan, targets, &self.config.bloom)?;

        cmd.image_memory_barrier(
            vk::DependencyFlags::empty(),
            &[color_barrier(swapchain_image, vk::ImageLayout::UNDEFINED, vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)],
        );
        let bloom = match targets.bloom_mips().first() {
            Some(mip) if !plan.bloom.is_empty() => mip.index(),
            _ => INVALID_BINDLESS_INDEX,
        };
        self.composite_pass.draw(
            &ctx,
            self.swapchain.current_image_view().handle(),
            &CompositeInputs {
                hdr_color: targets.hdr_color().index(),
                bloom,
                bloom_intensity: self.config.bloom.intensity,
            },
        )?;
        cmd.image_memory_barrier(
            vk::DependencyFlags::empty(),
            &[color_barrier(
                swapchain_image,
                vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
                vk::ImageLayout::PRESENT_SRC_KHR,
            )],
        );

        cmd.end()?;
        Ok(())
    }

    /// 重建 swapchain 以及和尺寸相关的 target
    fn recreate(&mut self, window_extent: vk::Extent2D) -> RenderResult<()> {
        let _span = tracy_client::span!("Renderer::recreate");
        if is_minimized(window_extent) {
            // 恢复窗口之后会再收到一次 resize
            return Ok(());
        }

        self.frame_ring.wait_all()?;
        Gfx::get().wait_idle()?;

        self.swapchain.recreate(window_extent)?;
        let extent = self.swapchain.extent();
        if extent != self.render_targets.extent() {
            self.render_targets.rebuild(&mut self.gpu, extent, self.frame_counter.frame_id())?;
        }
        if self.swapchain.format() != self.composite_pass.color_format() {
            log::info!("swapchain format changed to {:?}", self.swapchain.format());
            self.composite_pass = CompositePass::new(self.swapchain.format(), self.gpu.bindless(), &mut self.shaders)?;
        }
        log::info!("swapchain recreated: {}x{}", extent.width, extent.height);
        Ok(())
    }
}
// destroy
impl Renderer {
    /// 等待 GPU 完成之后销毁所有资源，之后才能销毁 `Gfx`
    pub fn destroy(mut self) {
        let _span = tracy_client::span!("Renderer::destroy");
        if let Err(e) = self.frame_ring.wait_all() {
            log::error!("failed to wait frames before destroy: {}", e);
        }
        if let Err(e) = Gfx::get().wait_idle() {
            log::error!("failed to wait device idle before destroy: {}", e);
        }

        let frame_id = self.frame_counter.frame_id();
        for buffers in self.frame_buffers.drain(..) {
            buffers.release(&mut self.gpu, frame_id);
        }
        self.render_targets.destroy(&mut self.gpu, frame_id);

        drop(self.depth_prepass);
        drop(self.main_pass);
        drop(self.bloom_pass);
        drop(self.composite_pass);
        drop(self.pipelines.drain());
        self.shaders.clear();

        self.frame_ring.into_slots().into_iter().for_each(FrameContext::destroy);
        self.swapchain.destroy();
        self.assets.destroy();
        self.gpu.destroy();
    }
}

#[inline]
fn is_minimized(extent: vk::Extent2D) -> bool {
    extent.width == 0 || extent.height == 0
}

fn present_mode(config: PresentModeConfig) -> vk::PresentModeKHR {
    match config {
        PresentModeConfig::Mailbox => vk::PresentModeKHR::MAILBOX,
        PresentModeConfig::Fifo => vk::PresentModeKHR::FIFO,
        PresentModeConfig::Immediate => vk::PresentModeKHR::IMMEDIATE,
    }
}

/// 本帧的相机矩阵和光源数量
pub fn frame_globals(camera: &Camera, extent: vk::Extent2D, data: &FrameData) -> FrameGlobals {
    let width = extent.width.max(1) as f32;
    let height = extent.height.max(1) as f32;
    let view_proj = camera.view_projection(width / height);

    FrameGlobals {
        view_proj,
        inv_view_proj: view_proj.inverse(),
        // 像素坐标，原点在左上角；Vulkan 的 NDC y 轴向下，不需要翻转
        screen_proj: Mat4::orthographic_rh(0.0, width, 0.0, height, -1.0, 1.0),
        camera_position: camera.position.extend(1.0),
        viewport: Vec4::new(width, height, 1.0 / width, 1.0 / height),
        counts: UVec4::new(
            data.directional_lights.len() as u32,
            data.point_lights.len() as u32,
            data.spot_lights.len() as u32,
            data.particles.len() as u32,
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gather::tests::{MockAssets, opaque_and_transparent};
    use glam::{Vec2, Vec3};

    #[test]
    fn screen_projection_maps_pixels_to_ndc() {
        let extent = vk::Extent2D { width: 800, height: 600 };
        let globals = frame_globals(&Camera::default(), extent, &FrameData::default());

        let top_left = globals.screen_proj.project_point3(Vec3::ZERO);
        let bottom_right = globals.screen_proj.project_point3(Vec3::new(800.0, 600.0, 0.0));
        assert!((Vec2::new(top_left.x, top_left.y) - Vec2::new(-1.0, -1.0)).length() < 1e-5);
        assert!((Vec2::new(bottom_right.x, bottom_right.y) - Vec2::new(1.0, 1.0)).length() < 1e-5);
        assert_eq!(globals.viewport, Vec4::new(800.0, 600.0, 1.0 / 800.0, 1.0 / 600.0));
    }

    #[test]
    fn globals_count_gathered_lights() {
        let assets = MockAssets {
            mesh_count: 1,
            fonts: vec![],
        };
        let data = FrameData::gather(&opaque_and_transparent(), &Camera::default(), &assets);
        let globals = frame_globals(&Camera::default(), vk::Extent2D { width: 4, height: 4 }, &data);
        assert_eq!(globals.counts.x as usize, data.directional_lights.len());
        assert_eq!(globals.counts.w as usize, data.particles.len());

        let round_trip = globals.inv_view_proj * globals.view_proj;
        assert!(round_trip.abs_diff_eq(Mat4::IDENTITY, 1e-4));
    }

    #[test]
    fn zero_sized_window_is_minimized() {
        assert!(is_minimized(vk::Extent2D { width: 0, height: 720 }));
        assert!(is_minimized(vk::Extent2D { width: 1280, height: 0 }));
        assert!(!is_minimized(vk::Extent2D { width: 1, height: 1 }));
    }

    #[test]
    fn present_mode_follows_config() {
        assert_eq!(present_mode(PresentModeConfig::Fifo), vk::PresentModeKHR::FIFO);
        assert_eq!(present_mode(PresentModeConfig::Mailbox), vk::PresentModeKHR::MAILBOX);
    }
}
