use ash::vk;

use crate::descriptors::descriptor_pool::GfxDescriptorPool;
use crate::error::GfxResult;
use crate::{foundation::debug_messenger::DebugType, gfx::Gfx};

/// 描述符集布局中的一个 binding
#[derive(Debug, Clone, Copy)]
pub struct GfxDescriptorBinding {
    pub binding: u32,
    pub descriptor_type: vk::DescriptorType,
    pub descriptor_count: u32,
    pub stage_flags: vk::ShaderStageFlags,
    pub flags: vk::DescriptorBindingFlags,
}

/// 描述符集布局
pub struct GfxDescriptorSetLayout {
    layout: vk::DescriptorSetLayout,
    bindings: Vec<GfxDescriptorBinding>,
}
impl GfxDescriptorSetLayout {
    pub fn new(
        flags: vk::DescriptorSetLayoutCreateFlags,
        bindings: &[GfxDescriptorBinding],
        debug_name: impl AsRef<str>,
    ) -> GfxResult<Self> {
        let vk_bindings = bindings
            .iter()
            .map(|b| {
                vk::DescriptorSetLayoutBinding::default()
                    .binding(b.binding)
                    .descriptor_type(b.descriptor_type)
                    .descriptor_count(b.descriptor_count)
                    .stage_flags(b.stage_flags)
            })
            .collect::<Vec<_>>();
        let binding_flags = bindings.iter().map(|b| b.flags).collect::<Vec<_>>();
        let mut bind_flags_ci = vk::DescriptorSetLayoutBindingFlagsCreateInfo::default().binding_flags(&binding_flags);

        let create_info = vk::DescriptorSetLayoutCreateInfo::default()
            .flags(flags)
            .bindings(&vk_bindings)
            .push_next(&mut bind_flags_ci);

        let gfx_device = Gfx::get().gfx_device();
        let layout = unsafe { gfx_device.create_descriptor_set_layout(&create_info, None)? };
        let layout = Self {
            layout,
            bindings: bindings.to_vec(),
        };
        gfx_device.set_debug_name(&layout, debug_name);
        Ok(layout)
    }

    #[inline]
    pub fn handle(&self) -> vk::DescriptorSetLayout {
        self.layout
    }

    #[inline]
    pub fn bindings(&self) -> &[GfxDescriptorBinding] {
        &self.bindings
    }
}
impl Drop for GfxDescriptorSetLayout {
    fn drop(&mut self) {
        unsafe {
            Gfx::get().gfx_device().destroy_descriptor_set_layout(self.layout, None);
        }
    }
}
impl DebugType for GfxDescriptorSetLayout {
    fn debug_type_name() -> &'static str {
        "GfxDescriptorSetLayout"
    }

    fn vk_handle(&self) -> impl vk::Handle {
        self.layout
    }
}

/// 描述符集
///
/// # Destroy
///
/// 跟随 descriptor pool 一起销毁
pub struct GfxDescriptorSet {
    handle: vk::DescriptorSet,
}
impl GfxDescriptorSet {
    pub fn new(
        descriptor_pool: &GfxDescriptorPool,
        layout: &GfxDescriptorSetLayout,
        debug_name: impl AsRef<str>,
    ) -> GfxResult<Self> {
        let set_layouts = [layout.handle()];
        let alloc_info =
            vk::DescriptorSetAllocateInfo::default().descriptor_pool(descriptor_pool.handle()).set_layouts(&set_layouts);
        let gfx_device = Gfx::get().gfx_device();
        let descriptor_set = unsafe { gfx_device.allocate_descriptor_sets(&alloc_info)?[0] };
        let set = Self { handle: descriptor_set };
        gfx_device.set_debug_name(&set, debug_name);
        Ok(set)
    }

    #[inline]
    pub fn handle(&self) -> vk::DescriptorSet {
        self.handle
    }
}
impl DebugType for GfxDescriptorSet {
    fn debug_type_name() -> &'static str {
        "GfxDescriptorSet"
    }

    fn vk_handle(&self) -> impl vk::Handle {
        self.handle
    }
}
