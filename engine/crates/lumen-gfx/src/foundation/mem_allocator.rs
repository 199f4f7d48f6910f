use std::ops::Deref;

use ash::vk;

use crate::error::GfxResult;

/// VMA 内存分配器
///
/// 所有 buffer 和 image 的显存都通过它分配
pub struct GfxMemAllocator {
    allocator: Option<vk_mem::Allocator>,
}
// new & init
impl GfxMemAllocator {
    pub fn new(instance: &ash::Instance, pdevice: vk::PhysicalDevice, device: &ash::Device) -> GfxResult<Self> {
        let mut create_info = vk_mem::AllocatorCreateInfo::new(instance, device, pdevice);
        create_info.vulkan_api_version = vk::API_VERSION_1_3;

        let allocator = unsafe { vk_mem::Allocator::new(create_info)? };
        Ok(Self {
            allocator: Some(allocator),
        })
    }
}
// destroy
impl GfxMemAllocator {
    /// 必须在 device 销毁之前调用
    pub fn destroy(&mut self) {
        log::info!("destroying vma allocator");
        self.allocator = None;
    }
}
impl Deref for GfxMemAllocator {
    type Target = vk_mem::Allocator;

    #[inline]
    fn deref(&self) -> &Self::Target {
        self.allocator.as_ref().expect("allocator already destroyed")
    }
}
