use std::path::{Path, PathBuf};

/// 统一资源路径管理
///
/// 所有路径基于工作区根目录（通过 `CARGO_MANIFEST_DIR` 推导）。
///
/// # 使用示例
/// ```ignore
/// let texture = LumenPath::assets_path("uv_checker.png"); // assets/uv_checker.png
/// let shader = LumenPath::shader_path("mesh.vert");        // shaders/mesh.vert
/// ```
pub struct LumenPath {}
impl LumenPath {
    /// 获取工作区根目录
    pub fn workspace_path() -> PathBuf {
        // 当前 crate 位于工作区根目录下的一级目录
        let manifest_dir = Path::new(env!("CARGO_MANIFEST_DIR"));
        manifest_dir.parent().unwrap_or(manifest_dir).to_path_buf()
    }

    /// 获取 `assets/` 目录下的文件路径
    pub fn assets_path(filename: &str) -> PathBuf {
        Self::workspace_path().join("assets").join(filename)
    }

    /// 获取 `shaders/` 目录下的文件路径
    pub fn shader_path(filename: &str) -> PathBuf {
        Self::workspace_path().join("shaders").join(filename)
    }

    /// 工作区根目录下的默认配置文件
    pub fn config_path(filename: &str) -> PathBuf {
        Self::workspace_path().join(filename)
    }
}
