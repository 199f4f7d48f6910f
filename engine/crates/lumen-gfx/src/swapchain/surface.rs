use ash::vk;

use crate::error::GfxResult;
use crate::foundation::debug_messenger::DebugType;
use crate::gfx::Gfx;

pub struct GfxSurface {
    pub(crate) handle: vk::SurfaceKHR,
    pub(crate) pf: ash::khr::surface::Instance,
}

impl GfxSurface {
    pub fn new(
        raw_display_handle: raw_window_handle::RawDisplayHandle,
        raw_window_handle: raw_window_handle::RawWindowHandle,
    ) -> GfxResult<Self> {
        let gfx = Gfx::get();
        let surface_pf = ash::khr::surface::Instance::new(gfx.vk_entry(), gfx.ash_instance());

        let surface = unsafe {
            ash_window::create_surface(gfx.vk_entry(), gfx.ash_instance(), raw_display_handle, raw_window_handle, None)?
        };

        let surface = GfxSurface {
            handle: surface,
            pf: surface_pf,
        };
        gfx.gfx_device().set_debug_name(&surface, "main");

        Ok(surface)
    }
}

// getters
impl GfxSurface {
    pub fn get_capabilities(&self) -> GfxResult<vk::SurfaceCapabilitiesKHR> {
        let pdevice = Gfx::get().physical_device().vk_handle();
        Ok(unsafe { self.pf.get_physical_device_surface_capabilities(pdevice, self.handle)? })
    }

    pub fn get_formats(&self) -> GfxResult<Vec<vk::SurfaceFormatKHR>> {
        let pdevice = Gfx::get().physical_device().vk_handle();
        Ok(unsafe { self.pf.get_physical_device_surface_formats(pdevice, self.handle)? })
    }

    pub fn get_present_modes(&self) -> GfxResult<Vec<vk::PresentModeKHR>> {
        let pdevice = Gfx::get().physical_device().vk_handle();
        Ok(unsafe { self.pf.get_physical_device_surface_present_modes(pdevice, self.handle)? })
    }
}

impl Drop for GfxSurface {
    fn drop(&mut self) {
        unsafe { self.pf.destroy_surface(self.handle, None) }
    }
}

impl DebugType for GfxSurface {
    fn debug_type_name() -> &'static str {
        "GfxSurface"
    }
    fn vk_handle(&self) -> impl vk::Handle {
        self.handle
    }
}
