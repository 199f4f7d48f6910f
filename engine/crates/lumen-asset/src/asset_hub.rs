use std::collections::HashMap;
use std::path::PathBuf;

use itertools::Itertools;

use lumen_render_interface::gpu_resources::{GpuResources, TextureHandle};
use lumen_render_interface::handle::HandleRegistry;

use crate::error::AssetError;
use crate::font::{Font, FontHandle};
use crate::mesh::{GpuMesh, MeshData, MeshHandle};
use crate::texture::{ImageData, TextureConfig, decode_images_parallel, upload_texture};

/// 一次纹理加载请求
#[derive(Debug, Clone)]
pub struct TextureRequest {
    pub path: PathBuf,
    pub config: TextureConfig,
}

/// 资产中心：mesh 和 font 的句柄表，以及按路径去重的纹理缓存
///
/// 纹理本身由 `GpuResources` 持有，这里只记录路径到句柄的映射。
pub struct AssetHub {
    meshes: HandleRegistry<GpuMesh>,
    fonts: HandleRegistry<Font>,
    texture_cache: HashMap<PathBuf, TextureHandle>,
}
impl Default for AssetHub {
    fn default() -> Self {
        Self::new()
    }
}
// new & init
impl AssetHub {
    pub fn new() -> Self {
        Self {
            meshes: HandleRegistry::new(),
            fonts: HandleRegistry::new(),
            texture_cache: HashMap::new(),
        }
    }
}
// getters
impl AssetHub {
    #[inline]
    pub fn mesh(&self, handle: MeshHandle) -> Option<&GpuMesh> {
        self.meshes.get(handle)
    }

    #[inline]
    pub fn font(&self, handle: FontHandle) -> Option<&Font> {
        self.fonts.get(handle)
    }

    #[inline]
    pub fn has_mesh(&self, handle: MeshHandle) -> bool {
        self.meshes.has(handle)
    }

    #[inline]
    pub fn has_font(&self, handle: FontHandle) -> bool {
        self.fonts.has(handle)
    }

    /// 只返回仍然有效的句柄
    #[inline]
    pub fn cached_texture(&self, gpu: &GpuResources, path: &PathBuf) -> Option<TextureHandle> {
        self.texture_cache.get(path).copied().filter(|handle| gpu.has_texture(*handle))
    }

    #[inline]
    pub fn mesh_count(&self) -> usize {
        self.meshes.len()
    }
}
// tools
impl AssetHub {
    /// 上传 mesh 数据，position 缺失或者数据不一致时返回错误
    pub fn upload_mesh(&mut self, data: &MeshData) -> Result<MeshHandle, AssetError> {
        let mesh = GpuMesh::upload(data)?;
        Ok(self.meshes.emplace(mesh))
    }

    #[inline]
    pub fn add_font(&mut self, font: Font) -> FontHandle {
        log::info!("font {} registered: {} glyphs", font.name(), font.glyphs().len());
        self.fonts.emplace(font)
    }

    pub fn upload_texture(
        &mut self,
        gpu: &mut GpuResources,
        image: &ImageData,
        config: &TextureConfig,
        name: &str,
    ) -> Result<TextureHandle, AssetError> {
        upload_texture(gpu, image, config, name)
    }

    /// 批量加载纹理：先在线程池中并行解码，等待全部解码完成之后，在当前线程依次上传
    ///
    /// 已经加载过的路径直接返回缓存的句柄。返回值和 requests 一一对应。
    pub fn load_textures(
        &mut self,
        gpu: &mut GpuResources,
        requests: &[TextureRequest],
    ) -> Vec<Result<TextureHandle, AssetError>> {
        let _span = tracy_client::span!("AssetHub::load_textures");
        // 被 retire 的纹理需要重新加载
        self.purge_texture_cache(|handle| gpu.has_texture(handle));

        let pending = requests
            .iter()
            .map(|r| r.path.clone())
            .filter(|path| !self.texture_cache.contains_key(path))
            .unique()
            .collect_vec();
        let mut decoded: HashMap<PathBuf, Result<ImageData, AssetError>> =
            pending.iter().cloned().zip(decode_images_parallel(&pending)).collect();

        requests
            .iter()
            .map(|request| {
                if let Some(handle) = self.texture_cache.get(&request.path) {
                    return Ok(*handle);
                }
                // 同一个路径出现多次，并且第一次已经失败
                let image = decoded.remove(&request.path).unwrap_or_else(|| {
                    Err(AssetError::Io {
                        path: request.path.display().to_string(),
                        source: std::io::Error::other("already failed in this batch"),
                    })
                })?;
                let name = request.path.display().to_string();
                let handle = upload_texture(gpu, &image, &request.config, &name)?;
                self.texture_cache.insert(request.path.clone(), handle);
                Ok(handle)
            })
            .collect()
    }

    /// 句柄立即失效，GPU buffer 在 frames_in_flight 帧之后释放
    #[inline]
    pub fn retire_mesh(&mut self, handle: MeshHandle, frame_id: u64) -> bool {
        self.meshes.retire(handle, frame_id)
    }

    /// 纹理句柄立即失效，缓存中指向它的路径也一起移除
    pub fn retire_texture(&mut self, gpu: &mut GpuResources, handle: TextureHandle, frame_id: u64) -> bool {
        self.forget_cached_texture(handle);
        gpu.retire_texture(handle, frame_id)
    }

    /// 返回移除的条目数量
    fn forget_cached_texture(&mut self, handle: TextureHandle) -> usize {
        let before = self.texture_cache.len();
        self.texture_cache.retain(|_, cached| *cached != handle);
        before - self.texture_cache.len()
    }

    /// 丢弃已经失效的缓存条目，返回丢弃的数量
    fn purge_texture_cache(&mut self, is_live: impl Fn(TextureHandle) -> bool) -> usize {
        let before = self.texture_cache.len();
        self.texture_cache.retain(|path, handle| {
            let live = is_live(*handle);
            if !live {
                log::debug!("texture cache: drop stale entry {}", path.display());
            }
            live
        });
        before - self.texture_cache.len()
    }

    #[inline]
    pub fn remove_font(&mut self, handle: FontHandle) -> Option<Font> {
        self.fonts.erase(handle)
    }

    pub fn reclaim(&mut self, current_frame_id: u64, frames_in_flight: u64) {
        let meshes = self.meshes.reclaim(current_frame_id, frames_in_flight);
        if !meshes.is_empty() {
            log::debug!("frame {}: reclaim {} meshes", current_frame_id, meshes.len());
        }
    }
}
// destroy
impl AssetHub {
    /// 调用之前需要保证 device idle；纹理随 `GpuResources` 一起销毁
    pub fn destroy(mut self) {
        drop(self.meshes.drain());
        drop(self.fonts.drain());
        self.texture_cache.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cached(hub: &mut AssetHub, path: &str, handle: TextureHandle) {
        hub.texture_cache.insert(PathBuf::from(path), handle);
    }

    #[test]
    fn retired_texture_leaves_the_cache() {
        let mut hub = AssetHub::new();
        let checker = TextureHandle::from_raw(3, 0);
        let sky = TextureHandle::from_raw(4, 0);
        cached(&mut hub, "uv_checker.png", checker);
        cached(&mut hub, "checker_alias.png", checker);
        cached(&mut hub, "sky.png", sky);

        assert_eq!(hub.forget_cached_texture(checker), 2);
        assert!(!hub.texture_cache.contains_key(&PathBuf::from("uv_checker.png")));
        assert_eq!(hub.texture_cache.get(&PathBuf::from("sky.png")), Some(&sky));
        assert_eq!(hub.forget_cached_texture(checker), 0);
    }

    #[test]
    fn stale_cache_entries_are_reloaded() {
        let mut hub = AssetHub::new();
        let stale = TextureHandle::from_raw(2, 0);
        let live = TextureHandle::from_raw(2, 1);
        cached(&mut hub, "old.png", stale);
        cached(&mut hub, "new.png", live);

        // slot 2 已经进入第 1 代，第 0 代的句柄失效
        let dropped = hub.purge_texture_cache(|handle| handle == live);
        assert_eq!(dropped, 1);
        assert!(!hub.texture_cache.contains_key(&PathBuf::from("old.png")));
        assert_eq!(hub.texture_cache.get(&PathBuf::from("new.png")), Some(&live));
    }
}
