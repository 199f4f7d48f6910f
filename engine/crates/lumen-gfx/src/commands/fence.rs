use ash::vk;

use crate::error::GfxResult;
use crate::{foundation::debug_messenger::DebugType, gfx::Gfx};

/// # Destroy
/// 不应该实现 Drop，因为可以 Clone，需要手动 destroy
#[derive(Clone)]
pub struct GfxFence {
    fence: vk::Fence,
}

impl DebugType for GfxFence {
    fn debug_type_name() -> &'static str {
        "GfxFence"
    }

    fn vk_handle(&self) -> impl vk::Handle {
        self.fence
    }
}

// 创建与销毁
impl GfxFence {
    /// # param
    /// * signaled - 是否创建时就 signaled
    pub fn new(signaled: bool, debug_name: &str) -> GfxResult<Self> {
        let gfx_device = Gfx::get().gfx_device();
        let fence_flags = if signaled { vk::FenceCreateFlags::SIGNALED } else { vk::FenceCreateFlags::empty() };
        let fence = unsafe { gfx_device.create_fence(&vk::FenceCreateInfo::default().flags(fence_flags), None)? };

        let fence = Self { fence };
        gfx_device.set_debug_name(&fence, debug_name);
        Ok(fence)
    }
    #[inline]
    pub fn destroy(self) {
        let gfx_device = Gfx::get().gfx_device();
        unsafe {
            gfx_device.destroy_fence(self.fence, None);
        }
    }
}

// getters
impl GfxFence {
    #[inline]
    pub fn handle(&self) -> vk::Fence {
        self.fence
    }
}

// tools
impl GfxFence {
    /// 阻塞等待 fence
    ///
    /// return: fence 是否已经 signaled，超时返回 false
    #[inline]
    pub fn wait(&self, timeout_ns: u64) -> GfxResult<bool> {
        let gfx_device = Gfx::get().gfx_device();
        let result = unsafe { gfx_device.wait_for_fences(std::slice::from_ref(&self.fence), true, timeout_ns) };
        match result {
            Ok(()) => Ok(true),
            Err(vk::Result::TIMEOUT) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    #[inline]
    pub fn reset(&self) -> GfxResult<()> {
        let gfx_device = Gfx::get().gfx_device();
        unsafe {
            gfx_device.reset_fences(std::slice::from_ref(&self.fence))?;
        }
        Ok(())
    }
}
