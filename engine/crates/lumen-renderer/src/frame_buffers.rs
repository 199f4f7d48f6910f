use ash::vk;
use glam::Mat4;

use lumen_gfx::resources::buffer::GfxBuffer;
use lumen_render_interface::elastic::ElasticStorageBuffer;
use lumen_render_interface::frame_counter::slot_label;
use lumen_render_interface::gpu_resources::{BufferHandle, GpuResources};

use crate::error::RenderResult;
use crate::gather::FrameData;
use crate::gpu_data::{
    FrameGlobals, GpuDirectionalLight, GpuGlyph, GpuParticle, GpuPointLight, GpuSpotLight, GpuTextAdvance,
};

/// 本帧各个 buffer 在 bindless 中的下标，写入 push constant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferIndices {
    pub globals: u32,
    pub transforms: u32,
    pub directional_lights: u32,
    pub point_lights: u32,
    pub spot_lights: u32,
    pub particles: u32,
    pub text_advance: u32,
    pub text_glyphs: u32,
}

/// 一个 frame slot 独占的 CPU 写入 buffer
///
/// GPU 可能还在读取其他 slot 的数据，所以每个 slot 各有一份。
pub struct FrameBuffers {
    globals: BufferHandle,

    transforms: ElasticStorageBuffer<Mat4>,
    directional_lights: ElasticStorageBuffer<GpuDirectionalLight>,
    point_lights: ElasticStorageBuffer<GpuPointLight>,
    spot_lights: ElasticStorageBuffer<GpuSpotLight>,
    particles: ElasticStorageBuffer<GpuParticle>,
    text_advance: ElasticStorageBuffer<GpuTextAdvance>,
    text_glyphs: ElasticStorageBuffer<GpuGlyph>,
}
// new & init
impl FrameBuffers {
    pub fn new(gpu: &mut GpuResources, slot: usize) -> RenderResult<Self> {
        let label = slot_label(slot);
        let globals = GfxBuffer::new(
            size_of::<FrameGlobals>() as vk::DeviceSize,
            vk::BufferUsageFlags::UNIFORM_BUFFER,
            Some(16),
            true,
            format!("frame-{}-globals", label),
        )?;

        Ok(Self {
            globals: gpu.add_buffer(globals)?,
            transforms: ElasticStorageBuffer::new(format!("frame-{}-transforms", label)),
            directional_lights: ElasticStorageBuffer::new(format!("frame-{}-directional-lights", label)),
            point_lights: ElasticStorageBuffer::new(format!("frame-{}-point-lights", label)),
            spot_lights: ElasticStorageBuffer::new(format!("frame-{}-spot-lights", label)),
            particles: ElasticStorageBuffer::new(format!("frame-{}-particles", label)),
            text_advance: ElasticStorageBuffer::new(format!("frame-{}-text-advance", label)),
            text_glyphs: ElasticStorageBuffer::new(format!("frame-{}-text-glyphs", label)),
        })
    }
}
// update
impl FrameBuffers {
    /// 扩容之后 bindless 下标可能变化，所以下标在上传之后才确定
    pub fn upload(
        &mut self,
        gpu: &mut GpuResources,
        data: &FrameData,
        globals: &FrameGlobals,
        frame_id: u64,
    ) -> RenderResult<BufferIndices> {
        let _span = tracy_client::span!("FrameBuffers::upload");

        if let Some(buffer) = gpu.buffer(self.globals) {
            buffer.transfer_data_by_mmap(std::slice::from_ref(globals))?;
        }
        self.transforms.upload(gpu, &data.transforms, frame_id)?;
        self.directional_lights.upload(gpu, &data.directional_lights, frame_id)?;
        self.point_lights.upload(gpu, &data.point_lights, frame_id)?;
        self.spot_lights.upload(gpu, &data.spot_lights, frame_id)?;
        self.particles.upload(gpu, &data.particles, frame_id)?;
        self.text_advance.upload(gpu, &data.text_advance, frame_id)?;
        self.text_glyphs.upload(gpu, &data.text_glyphs, frame_id)?;

        Ok(BufferIndices {
            globals: self.globals.index(),
            transforms: self.transforms.bindless_index(),
            directional_lights: self.directional_lights.bindless_index(),
            point_lights: self.point_lights.bindless_index(),
            spot_lights: self.spot_lights.bindless_index(),
            particles: self.particles.bindless_index(),
            text_advance: self.text_advance.bindless_index(),
            text_glyphs: self.text_glyphs.bindless_index(),
        })
    }

    /// 所有 buffer 交给 `GpuResources` 延迟销毁
    pub fn release(mut self, gpu: &mut GpuResources, frame_id: u64) {
        gpu.retire_buffer(self.globals, frame_id);
        self.transforms.release(gpu, frame_id);
        self.directional_lights.release(gpu, frame_id);
        self.point_lights.release(gpu, frame_id);
        self.spot_lights.release(gpu, frame_id);
        self.particles.release(gpu, frame_id);
        self.text_advance.release(gpu, frame_id);
        self.text_glyphs.release(gpu, frame_id);
    }
}
