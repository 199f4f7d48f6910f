use std::ffi::CStr;

use ash::vk;

use crate::commands::{
    command_buffer::GfxCommandBuffer, command_pool::GfxCommandPool, command_queue::GfxCommandQueue,
    fence::GfxFence, submit_info::GfxSubmitInfo,
};
use crate::error::{GfxError, GfxResult};
use crate::foundation::{
    device::GfxDevice, mem_allocator::GfxMemAllocator, physical_device::GfxPhysicalDevice,
};
use crate::gfx_core::GfxCore;

static mut G_GFX: Option<Gfx> = None;

/// Vulkan 设备级对象的单例
///
/// 单线程使用：所有的 GPU 资源都在渲染线程上创建和销毁
pub struct Gfx {
    gfx_core: GfxCore,

    /// 用于一次性命令（上传数据、生成 mipmap 等）的 command pool
    temp_graphics_command_pool: GfxCommandPool,
}
// new & init
impl Gfx {
    pub fn init(app_name: &str, instance_extra_exts: Vec<&'static CStr>) -> GfxResult<()> {
        let _span = tracy_client::span!("Gfx::init");

        let gfx_core = GfxCore::new(app_name, "Lumen", instance_extra_exts)?;
        let temp_graphics_command_pool = GfxCommandPool::new_internal(
            &gfx_core.gfx_device,
            gfx_core.gfx_queue.queue_family().clone(),
            vk::CommandPoolCreateFlags::TRANSIENT,
            "gfx-graphics-temp",
        )?;

        unsafe {
            G_GFX = Some(Self {
                gfx_core,
                temp_graphics_command_pool,
            });
        }
        log::info!("gfx initialized");
        Ok(())
    }

    /// # Panic
    /// 在 `init` 之前或者 `destroy` 之后调用
    #[inline]
    pub fn get() -> &'static Gfx {
        unsafe {
            let gfx = &*std::ptr::addr_of!(G_GFX);
            gfx.as_ref().expect("Gfx is not initialized")
        }
    }

    #[inline]
    pub fn is_initialized() -> bool {
        unsafe { (*std::ptr::addr_of!(G_GFX)).is_some() }
    }
}
// destroy
impl Gfx {
    /// 调用之前，所有的 GPU 资源都应该已经释放
    pub fn destroy() {
        let _span = tracy_client::span!("Gfx::destroy");

        let gfx = unsafe { (*std::ptr::addr_of_mut!(G_GFX)).take() };
        let Some(mut gfx) = gfx else {
            log::warn!("Gfx::destroy called without init");
            return;
        };
        gfx.temp_graphics_command_pool.destroy_internal(&gfx.gfx_core.gfx_device);
        gfx.gfx_core.destroy();
        log::info!("gfx destroyed");
    }
}
// getters
impl Gfx {
    #[inline]
    pub fn gfx_device(&self) -> &GfxDevice {
        &self.gfx_core.gfx_device
    }

    #[inline]
    pub fn allocator(&self) -> &GfxMemAllocator {
        &self.gfx_core.allocator
    }

    #[inline]
    pub fn physical_device(&self) -> &GfxPhysicalDevice {
        &self.gfx_core.physical_device
    }

    #[inline]
    pub fn gfx_queue(&self) -> &GfxCommandQueue {
        &self.gfx_core.gfx_queue
    }

    #[inline]
    pub fn vk_entry(&self) -> &ash::Entry {
        &self.gfx_core.vk_entry
    }

    #[inline]
    pub fn ash_instance(&self) -> &ash::Instance {
        self.gfx_core.instance.ash_instance()
    }
}
// tools
impl Gfx {
    /// 立即执行某个 command，并同步等待执行结果
    pub fn one_time_exec<F, R>(&self, func: F, name: &str) -> GfxResult<R>
    where
        F: FnOnce(&GfxCommandBuffer) -> R,
    {
        let _span = tracy_client::span!("Gfx::one_time_exec");

        let command_buffer = GfxCommandBuffer::new(&self.temp_graphics_command_pool, name)?;
        command_buffer.begin(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT, name)?;
        let result = func(&command_buffer);
        command_buffer.end()?;

        let fence = GfxFence::new(false, name)?;
        let submitted = self
            .gfx_queue()
            .submit(&[GfxSubmitInfo::new(std::slice::from_ref(&command_buffer))], Some(&fence))
            .and_then(|_| fence.wait(u64::MAX).map(|_| ()));

        fence.destroy();
        self.temp_graphics_command_pool.free_command_buffers(vec![command_buffer]);
        submitted?;

        Ok(result)
    }

    /// 从 candidates 中找到第一个满足 features 的 format
    pub fn find_supported_format(
        &self,
        candidates: &[vk::Format],
        tiling: vk::ImageTiling,
        features: vk::FormatFeatureFlags,
    ) -> GfxResult<vk::Format> {
        candidates
            .iter()
            .copied()
            .find(|&format| {
                let props = unsafe {
                    self.ash_instance()
                        .get_physical_device_format_properties(self.physical_device().vk_handle(), format)
                };
                match tiling {
                    vk::ImageTiling::LINEAR => props.linear_tiling_features.contains(features),
                    vk::ImageTiling::OPTIMAL => props.optimal_tiling_features.contains(features),
                    _ => false,
                }
            })
            .ok_or_else(|| GfxError::UnsupportedFormat(candidates.to_vec()))
    }

    #[inline]
    pub fn wait_idle(&self) -> GfxResult<()> {
        self.gfx_device().wait_idle()
    }
}
