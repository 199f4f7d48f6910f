use std::ffi::CString;
use std::path::Path;

use ash::vk;

use crate::error::{GfxError, GfxResult};
use crate::pipelines::reflection::ShaderReflection;
use crate::{foundation::debug_messenger::DebugType, gfx::Gfx};

/// 编译好的 shader：spv 字节码以及反射摘要
///
/// shader 的编译由外部工具完成，这里只消费编译产物
#[derive(Clone)]
pub struct ShaderBlob {
    pub name: String,
    pub code: Vec<u32>,
    pub reflection: ShaderReflection,
}
impl ShaderBlob {
    /// 从 `dir` 中读取 `<name>.spv` 以及 `<name>.json`
    pub fn load(dir: &Path, name: &str) -> GfxResult<Self> {
        let spv_path = dir.join(format!("{name}.spv"));
        let json_path = dir.join(format!("{name}.json"));

        let io_err = |path: &Path| {
            let path = path.display().to_string();
            move |source| GfxError::ShaderIo { path, source }
        };

        let mut spv_file = std::fs::File::open(&spv_path).map_err(io_err(&spv_path))?;
        let code = ash::util::read_spv(&mut spv_file).map_err(io_err(&spv_path))?;

        let json_text = std::fs::read_to_string(&json_path).map_err(io_err(&json_path))?;
        let reflection =
            ShaderReflection::from_json_str(&json_text).map_err(|source| GfxError::ShaderReflection {
                path: json_path.display().to_string(),
                source,
            })?;

        log::debug!("loaded shader {} ({} words)", name, code.len());
        Ok(Self {
            name: name.to_string(),
            code,
            reflection,
        })
    }

    #[inline]
    pub fn entry_point(&self) -> CString {
        CString::new(self.reflection.entry_point.as_str()).unwrap_or_else(|_| c"main".to_owned())
    }
}

/// # Destroy
///
/// 需要手动调用 `destroy` 方法来释放资源。
pub struct GfxShaderModule {
    handle: vk::ShaderModule,

    #[cfg(debug_assertions)]
    destroyed: bool,
}
impl GfxShaderModule {
    pub fn new(blob: &ShaderBlob) -> GfxResult<Self> {
        let gfx_device = Gfx::get().gfx_device();
        let shader_module_info = vk::ShaderModuleCreateInfo::default().code(&blob.code);

        let shader_module = unsafe { gfx_device.create_shader_module(&shader_module_info, None)? };
        let shader_module = Self {
            handle: shader_module,

            #[cfg(debug_assertions)]
            destroyed: false,
        };
        gfx_device.set_debug_name(&shader_module, &blob.name);
        Ok(shader_module)
    }

    #[inline]
    pub fn handle(&self) -> vk::ShaderModule {
        self.handle
    }

    #[inline]
    pub fn destroy(mut self) {
        let gfx_device = Gfx::get().gfx_device();
        unsafe {
            gfx_device.destroy_shader_module(self.handle, None);
        }
        #[cfg(debug_assertions)]
        {
            self.destroyed = true;
        }
    }
}
impl Drop for GfxShaderModule {
    fn drop(&mut self) {
        #[cfg(debug_assertions)]
        debug_assert!(self.destroyed, "ShaderModule must be destroyed manually before drop.");
    }
}
impl DebugType for GfxShaderModule {
    fn debug_type_name() -> &'static str {
        "GfxShaderModule"
    }

    fn vk_handle(&self) -> impl vk::Handle {
        self.handle
    }
}
