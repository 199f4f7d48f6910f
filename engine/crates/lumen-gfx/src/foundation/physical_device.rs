use std::ffi::CStr;

use ash::vk;
use itertools::Itertools;

use crate::commands::command_queue::GfxQueueFamily;
use crate::error::{GfxError, GfxResult};
use crate::foundation::debug_messenger::DebugType;

/// 表示一张物理显卡
pub struct GfxPhysicalDevice {
    pub(crate) vk_handle: vk::PhysicalDevice,

    /// 当前 gpu 的基础属性
    pub(crate) basic_props: vk::PhysicalDeviceProperties,

    /// 当前 gpu 的 descriptor indexing 属性，用于检查 bindless 容量
    pub(crate) descriptor_indexing_props: vk::PhysicalDeviceDescriptorIndexingProperties<'static>,

    pub(crate) gfx_queue_family: GfxQueueFamily,
}

impl GfxPhysicalDevice {
    /// 优先选择独立显卡，如果没有则选择第一个可用的显卡
    pub fn new_descrete_physical_device(instance: &ash::Instance) -> GfxResult<Self> {
        let pdevices = unsafe { instance.enumerate_physical_devices()? };
        pdevices
            .iter()
            .filter_map(|pdevice| GfxPhysicalDevice::new(*pdevice, instance))
            // 优先使用独立显卡
            .find_or_first(GfxPhysicalDevice::is_descrete_gpu)
            .ok_or(GfxError::NoSuitableDevice)
    }

    /// 不满足要求（没有全能 queue family）的 gpu 返回 None
    fn new(pdevice: vk::PhysicalDevice, instance: &ash::Instance) -> Option<Self> {
        unsafe {
            let mut indexing_props = vk::PhysicalDeviceDescriptorIndexingProperties::default();
            let mut pdevice_props2 = vk::PhysicalDeviceProperties2::default().push_next(&mut indexing_props);
            instance.get_physical_device_properties2(pdevice, &mut pdevice_props2);

            let basic_props = pdevice_props2.properties;
            let physical_device_name = CStr::from_ptr(basic_props.device_name.as_ptr());
            log::info!("found gpu: {:?}", physical_device_name);

            indexing_props.p_next = std::ptr::null_mut();
            log::debug!("physical device descriptor indexing props:\n{:#?}", indexing_props);

            let queue_familiy_props = instance.get_physical_device_queue_family_properties(pdevice);
            log::debug!("physical device: queue family props:\n{:#?}", queue_familiy_props);

            // 全能的 Queue：graphics, compute, transfer
            let required = vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE | vk::QueueFlags::TRANSFER;
            let gfx_queue_family = queue_familiy_props
                .iter()
                .enumerate()
                .find(|(_, props)| props.queue_flags.contains(required))
                .map(|(family_idx, props)| GfxQueueFamily {
                    name: "gfx".to_string(),
                    queue_family_index: family_idx as u32,
                    queue_flags: props.queue_flags,
                    queue_count: props.queue_count,
                });
            let Some(gfx_queue_family) = gfx_queue_family else {
                log::warn!("gpu {:?} has no graphics queue family, skipped", physical_device_name);
                return None;
            };

            Some(Self {
                vk_handle: pdevice,
                basic_props,
                descriptor_indexing_props: indexing_props,
                gfx_queue_family,
            })
        }
    }

    pub fn destroy(self) {
        // 无需销毁
    }

    #[inline]
    /// 当前 gpu 是否是独立显卡
    pub fn is_descrete_gpu(&self) -> bool {
        self.basic_props.device_type == vk::PhysicalDeviceType::DISCRETE_GPU
    }

    #[inline]
    pub fn vk_handle(&self) -> vk::PhysicalDevice {
        self.vk_handle
    }

    #[inline]
    pub fn max_anisotropy(&self) -> f32 {
        self.basic_props.limits.max_sampler_anisotropy
    }

    /// update-after-bind 的 descriptor set 中，单个 stage 可以访问的 sampled image 上限
    #[inline]
    pub fn max_bindless_images(&self) -> u32 {
        self.descriptor_indexing_props.max_per_stage_descriptor_update_after_bind_samplers
            .min(self.descriptor_indexing_props.max_per_stage_descriptor_update_after_bind_sampled_images)
    }

    /// update-after-bind 的 descriptor set 中，单个 stage 可以访问的 storage/uniform buffer 上限
    #[inline]
    pub fn max_bindless_buffers(&self) -> u32 {
        self.descriptor_indexing_props.max_per_stage_descriptor_update_after_bind_storage_buffers
            .min(self.descriptor_indexing_props.max_per_stage_descriptor_update_after_bind_uniform_buffers)
    }
}

impl DebugType for GfxPhysicalDevice {
    fn debug_type_name() -> &'static str {
        "GfxPhysicalDevice"
    }

    fn vk_handle(&self) -> impl vk::Handle {
        self.vk_handle
    }
}
