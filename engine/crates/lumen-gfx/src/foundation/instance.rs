use std::ffi::{CStr, CString};

use ash::vk;
use itertools::Itertools;

use crate::error::GfxResult;
use crate::foundation::debug_messenger::GfxDebugMsger;

pub struct GfxInstance {
    pub(crate) ash_instance: ash::Instance,
}
// new & init
impl GfxInstance {
    pub fn new(
        vk_pf: &ash::Entry,
        app_name: &str,
        engine_name: &str,
        extra_exts: Vec<&'static CStr>,
    ) -> GfxResult<Self> {
        let _span = tracy_client::span!("GfxInstance::new");

        let app_name = CString::new(app_name).unwrap_or_default();
        let engine_name = CString::new(engine_name).unwrap_or_default();
        let app_info = vk::ApplicationInfo::default()
            .application_name(app_name.as_c_str())
            .application_version(vk::make_api_version(0, 1, 0, 0))
            .engine_name(engine_name.as_c_str())
            .engine_version(vk::make_api_version(0, 1, 0, 0))
            .api_version(vk::API_VERSION_1_3);

        let mut exts = Self::basic_instance_exts();
        exts.extend(extra_exts);
        let exts = exts.into_iter().unique().collect_vec();
        log::info!("instance exts: {:?}", exts);
        let ext_ptrs = exts.iter().map(|e| e.as_ptr()).collect_vec();

        let layers = Self::basic_instance_layers(vk_pf);
        log::info!("instance layers: {:?}", layers);
        let layer_ptrs = layers.iter().map(|l| l.as_ptr()).collect_vec();

        // 让 instance 创建和销毁期间的消息也能被捕获
        let mut debug_ci = GfxDebugMsger::debug_utils_messenger_ci();
        let instance_ci = vk::InstanceCreateInfo::default()
            .application_info(&app_info)
            .enabled_extension_names(&ext_ptrs)
            .enabled_layer_names(&layer_ptrs)
            .push_next(&mut debug_ci);

        let ash_instance = unsafe { vk_pf.create_instance(&instance_ci, None)? };

        Ok(Self { ash_instance })
    }

    fn basic_instance_exts() -> Vec<&'static CStr> {
        vec![ash::ext::debug_utils::NAME]
    }

    /// debug 模式下开启 validation layer（如果本机安装了的话）
    fn basic_instance_layers(vk_pf: &ash::Entry) -> Vec<&'static CStr> {
        const VALIDATION_LAYER: &CStr = c"VK_LAYER_KHRONOS_validation";
        if !cfg!(debug_assertions) {
            return vec![];
        }

        let available = unsafe { vk_pf.enumerate_instance_layer_properties() }.unwrap_or_default();
        let has_validation = available
            .iter()
            .any(|layer| unsafe { CStr::from_ptr(layer.layer_name.as_ptr()) } == VALIDATION_LAYER);
        if has_validation {
            vec![VALIDATION_LAYER]
        } else {
            log::warn!("validation layer is not available");
            vec![]
        }
    }

    pub fn destroy(self) {
        log::info!("destroying instance");
        unsafe {
            self.ash_instance.destroy_instance(None);
        }
    }
}
// getters
impl GfxInstance {
    #[inline]
    pub fn ash_instance(&self) -> &ash::Instance {
        &self.ash_instance
    }
}
