use std::collections::HashMap;
use std::path::{Path, PathBuf};

use lumen_gfx::error::GfxResult;
use lumen_gfx::pipelines::shader::ShaderBlob;

/// renderer 用到的所有 shader 名称，对应 `<directory>/<name>.spv` 和 `<name>.json`
pub struct ShaderNames;
impl ShaderNames {
    pub const DEPTH_VS: &'static str = "depth.vert";
    pub const MESH_VS: &'static str = "mesh.vert";
    pub const MESH_FS: &'static str = "mesh.frag";
    pub const SKYBOX_VS: &'static str = "skybox.vert";
    pub const SKYBOX_FS: &'static str = "skybox.frag";
    pub const PARTICLE_VS: &'static str = "particle.vert";
    pub const PARTICLE_FS: &'static str = "particle.frag";
    pub const TEXT_VS: &'static str = "text.vert";
    pub const TEXT_FS: &'static str = "text.frag";
    pub const FULLSCREEN_VS: &'static str = "fullscreen.vert";
    pub const BLOOM_DOWN_FS: &'static str = "bloom_down.frag";
    pub const BLOOM_UP_FS: &'static str = "bloom_up.frag";
    pub const COMPOSITE_FS: &'static str = "composite.frag";
}

/// 按名称缓存已经读取的 shader
pub struct ShaderLibrary {
    directory: PathBuf,
    blobs: HashMap<String, ShaderBlob>,
}
impl ShaderLibrary {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        let directory = directory.into();
        log::info!("shader directory: {}", directory.display());
        Self {
            directory,
            blobs: HashMap::new(),
        }
    }

    #[inline]
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    #[inline]
    pub fn loaded_count(&self) -> usize {
        self.blobs.len()
    }

    /// 第一次使用时从磁盘读取
    pub fn get(&mut self, name: &str) -> GfxResult<ShaderBlob> {
        if let Some(blob) = self.blobs.get(name) {
            return Ok(blob.clone());
        }
        let blob = ShaderBlob::load(&self.directory, name)?;
        self.blobs.insert(name.to_string(), blob.clone());
        Ok(blob)
    }

    /// pipeline 全部创建完成之后可以释放字节码
    pub fn clear(&mut self) {
        self.blobs.clear();
    }
}
