use ash::vk;

use crate::error::GfxResult;
use crate::{foundation::debug_messenger::DebugType, gfx::Gfx};

/// 描述符池
///
/// 由它分配出来的 descriptor set 跟随 pool 一起释放
pub struct GfxDescriptorPool {
    handle: vk::DescriptorPool,
    name: String,
}
impl GfxDescriptorPool {
    pub fn new(
        flags: vk::DescriptorPoolCreateFlags,
        max_sets: u32,
        pool_sizes: &[vk::DescriptorPoolSize],
        name: impl AsRef<str>,
    ) -> GfxResult<Self> {
        let create_info = vk::DescriptorPoolCreateInfo::default().flags(flags).max_sets(max_sets).pool_sizes(pool_sizes);

        let gfx_device = Gfx::get().gfx_device();
        let handle = unsafe { gfx_device.create_descriptor_pool(&create_info, None)? };
        let pool = Self {
            handle,
            name: name.as_ref().to_string(),
        };
        gfx_device.set_debug_name(&pool, name);
        Ok(pool)
    }

    #[inline]
    pub fn handle(&self) -> vk::DescriptorPool {
        self.handle
    }
}
impl Drop for GfxDescriptorPool {
    fn drop(&mut self) {
        log::info!("Destroying GfxDescriptorPool: {}", self.name);
        unsafe { Gfx::get().gfx_device().destroy_descriptor_pool(self.handle, None) };
    }
}
impl DebugType for GfxDescriptorPool {
    fn debug_type_name() -> &'static str {
        "GfxDescriptorPool"
    }

    fn vk_handle(&self) -> impl vk::Handle {
        self.handle
    }
}
