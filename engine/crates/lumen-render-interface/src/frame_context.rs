use ash::vk;

use lumen_gfx::GfxError;
use lumen_gfx::commands::command_buffer::GfxCommandBuffer;
use lumen_gfx::commands::command_pool::GfxCommandPool;
use lumen_gfx::commands::fence::GfxFence;
use lumen_gfx::commands::semaphore::GfxSemaphore;
use lumen_gfx::error::GfxResult;
use lumen_gfx::gfx::Gfx;

use crate::frame_counter::slot_label;
use crate::frame_ring::FrameSync;

/// 一个 frame slot 拥有的 GPU 对象
///
/// - image_acquired：swapchain image 可用时 signal，submit 等待它
/// - render_finished：submit 完成时 signal，present 等待它
/// - fence：创建时就是 signaled，第一次 begin_frame 不会阻塞
///
/// # Destroy
///
/// 需要手动调用 `destroy`
pub struct FrameContext {
    command_pool: GfxCommandPool,
    command_buffer: GfxCommandBuffer,
    image_acquired: GfxSemaphore,
    render_finished: GfxSemaphore,
    fence: GfxFence,
}
// new & init
impl FrameContext {
    pub fn new(slot: usize) -> GfxResult<Self> {
        let label = slot_label(slot);
        let command_pool = GfxCommandPool::new(
            Gfx::get().gfx_queue().queue_family().clone(),
            vk::CommandPoolCreateFlags::TRANSIENT,
            &format!("frame-{}", label),
        )?;
        let command_buffer = GfxCommandBuffer::new(&command_pool, &format!("frame-{}-main", label))?;

        Ok(Self {
            command_pool,
            command_buffer,
            image_acquired: GfxSemaphore::new(&format!("frame-{}-image-acquired", label))?,
            render_finished: GfxSemaphore::new(&format!("frame-{}-render-finished", label))?,
            fence: GfxFence::new(true, &format!("frame-{}-fence", label))?,
        })
    }
}
// getters
impl FrameContext {
    #[inline]
    pub fn command_buffer(&self) -> &GfxCommandBuffer {
        &self.command_buffer
    }

    #[inline]
    pub fn image_acquired(&self) -> &GfxSemaphore {
        &self.image_acquired
    }

    #[inline]
    pub fn render_finished(&self) -> &GfxSemaphore {
        &self.render_finished
    }

    #[inline]
    pub fn fence(&self) -> &GfxFence {
        &self.fence
    }
}
impl FrameSync for FrameContext {
    #[inline]
    fn wait_fence(&mut self, timeout_ns: u64) -> Result<bool, GfxError> {
        let _span = tracy_client::span!("FrameContext::wait_fence");
        self.fence.wait(timeout_ns)
    }

    #[inline]
    fn reset_fence(&mut self) -> Result<(), GfxError> {
        self.fence.reset()
    }

    #[inline]
    fn reset_commands(&mut self) -> Result<(), GfxError> {
        self.command_pool.reset_all_buffers()
    }
}
// destroy
impl FrameContext {
    pub fn destroy(self) {
        let Self {
            command_pool,
            command_buffer,
            image_acquired,
            render_finished,
            fence,
        } = self;
        command_pool.free_command_buffers(vec![command_buffer]);
        command_pool.destroy();
        image_acquired.destroy();
        render_finished.destroy();
        fence.destroy();
    }
}
