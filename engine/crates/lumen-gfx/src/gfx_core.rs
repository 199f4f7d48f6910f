use std::{ffi::CStr, rc::Rc};

use ash::vk;

use crate::commands::command_queue::{GfxCommandQueue, GfxQueueFamily};
use crate::error::GfxResult;
use crate::foundation::{
    device::GfxDevice, instance::GfxInstance, mem_allocator::GfxMemAllocator, physical_device::GfxPhysicalDevice,
};

/// Vulkan 核心对象，按照创建顺序排列
///
/// 销毁时按照相反的顺序进行
pub struct GfxCore {
    /// vulkan 动态库的函数入口
    pub(crate) vk_entry: ash::Entry,
    pub(crate) instance: GfxInstance,
    pub(crate) physical_device: GfxPhysicalDevice,
    pub(crate) gfx_device: Rc<GfxDevice>,
    pub(crate) allocator: GfxMemAllocator,

    /// 全能 queue：graphics, compute, transfer, present
    pub(crate) gfx_queue: GfxCommandQueue,
}
// new & init
impl GfxCore {
    pub fn new(app_name: &str, engine_name: &str, instance_extra_exts: Vec<&'static CStr>) -> GfxResult<Self> {
        let _span = tracy_client::span!("GfxCore::new");

        let vk_entry = unsafe { ash::Entry::load()? };
        let instance = GfxInstance::new(&vk_entry, app_name, engine_name, instance_extra_exts)?;
        let physical_device = GfxPhysicalDevice::new_descrete_physical_device(instance.ash_instance())?;

        let gfx_queue_family = physical_device.gfx_queue_family.clone();
        let queue_priorities = [1.0];
        let queue_create_infos = [vk::DeviceQueueCreateInfo::default()
            .queue_family_index(gfx_queue_family.queue_family_index)
            .queue_priorities(&queue_priorities)];

        let gfx_device =
            Rc::new(GfxDevice::new(instance.ash_instance(), physical_device.vk_handle, &queue_create_infos)?);
        let allocator = GfxMemAllocator::new(instance.ash_instance(), physical_device.vk_handle, &gfx_device)?;

        let gfx_queue = Self::create_queue(&gfx_device, gfx_queue_family);

        Ok(Self {
            vk_entry,
            instance,
            physical_device,
            gfx_device,
            allocator,
            gfx_queue,
        })
    }

    fn create_queue(gfx_device: &Rc<GfxDevice>, queue_family: GfxQueueFamily) -> GfxCommandQueue {
        let vk_queue = unsafe { gfx_device.get_device_queue(queue_family.queue_family_index, 0) };
        let queue = GfxCommandQueue {
            vk_queue,
            queue_family,
            device_functions: gfx_device.clone(),
        };
        gfx_device.set_debug_name(&queue, "gfx-queue");
        queue
    }
}
// destroy
impl GfxCore {
    pub fn destroy(mut self) {
        let _span = tracy_client::span!("GfxCore::destroy");

        self.allocator.destroy();
        self.gfx_device.destroy();
        self.physical_device.destroy();
        self.instance.destroy();
    }
}
