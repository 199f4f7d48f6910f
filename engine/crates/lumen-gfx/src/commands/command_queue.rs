use std::rc::Rc;

use ash::vk;
use itertools::Itertools;

use crate::commands::{fence::GfxFence, submit_info::GfxSubmitInfo};
use crate::error::GfxResult;
use crate::foundation::debug_messenger::DebugType;
use crate::foundation::device::GfxDevice;

#[derive(Debug, Clone)]
pub struct GfxQueueFamily {
    pub name: String,
    pub queue_family_index: u32,
    pub queue_flags: vk::QueueFlags,
    pub queue_count: u32,
}

pub struct GfxCommandQueue {
    pub(crate) vk_queue: vk::Queue,
    pub(crate) queue_family: GfxQueueFamily,
    pub(crate) device_functions: Rc<GfxDevice>,
}
// getters
impl GfxCommandQueue {
    #[inline]
    pub fn handle(&self) -> vk::Queue {
        self.vk_queue
    }

    #[inline]
    pub fn queue_family(&self) -> &GfxQueueFamily {
        &self.queue_family
    }
}
// tools
impl GfxCommandQueue {
    /// fence 会在所有 submit 执行完成后 signal
    pub fn submit(&self, batches: &[GfxSubmitInfo], fence: Option<&GfxFence>) -> GfxResult<()> {
        let _span = tracy_client::span!("GfxCommandQueue::submit");
        let batches = batches.iter().map(|b| b.submit_info()).collect_vec();
        unsafe {
            self.device_functions.queue_submit2(
                self.vk_queue,
                &batches,
                fence.map_or(vk::Fence::null(), |f| f.handle()),
            )?;
        }
        Ok(())
    }

    #[inline]
    pub fn wait_idle(&self) -> GfxResult<()> {
        unsafe { self.device_functions.queue_wait_idle(self.vk_queue)? };
        Ok(())
    }
}
impl DebugType for GfxCommandQueue {
    fn debug_type_name() -> &'static str {
        "GfxCommandQueue"
    }

    fn vk_handle(&self) -> impl vk::Handle {
        self.vk_queue
    }
}
