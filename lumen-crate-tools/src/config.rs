use std::path::{Path, PathBuf};

use serde::Deserialize;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// 引擎的全部配置，对应 `lumen.toml`
///
/// 每个 section 都可以省略，省略时使用默认值
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    pub window: WindowConfig,
    pub renderer: RendererConfig,
    pub bindless: BindlessConfig,
    pub bloom: BloomConfig,
    pub shaders: ShaderConfig,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct WindowConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
}
impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "Lumen".to_string(),
            width: 1280,
            height: 720,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PresentModeConfig {
    Mailbox,
    Fifo,
    Immediate,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct RendererConfig {
    /// 同时在 GPU 上执行的帧数
    pub frames_in_flight: usize,
    /// 等待 fence 的超时时间，超时视为致命错误
    pub fence_timeout_ms: u64,
    pub present_mode: PresentModeConfig,
    pub wireframe: bool,
    pub clear_color: [f32; 4],
}
impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            frames_in_flight: 3,
            fence_timeout_ms: 2000,
            present_mode: PresentModeConfig::Mailbox,
            wireframe: false,
            clear_color: [0.0, 0.0, 0.0, 1.0],
        }
    }
}
impl RendererConfig {
    pub const MAX_FRAMES_IN_FLIGHT: usize = 4;

    #[inline]
    pub fn frames_in_flight(&self) -> usize {
        self.frames_in_flight.clamp(1, Self::MAX_FRAMES_IN_FLIGHT)
    }

    #[inline]
    pub fn fence_timeout_ns(&self) -> u64 {
        self.fence_timeout_ms.saturating_mul(1_000_000)
    }
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct BindlessConfig {
    pub max_buffers: u32,
    pub max_images: u32,
}
impl Default for BindlessConfig {
    fn default() -> Self {
        Self {
            max_buffers: 4096,
            max_images: 4096,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq)]
#[serde(default)]
pub struct BloomConfig {
    pub enabled: bool,
    /// 亮度阈值，低于该值的像素不参与 bloom
    pub threshold: f32,
    /// 阈值附近的软过渡宽度
    pub knee: f32,
    pub intensity: f32,
}
impl Default for BloomConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            threshold: 1.0,
            knee: 0.5,
            intensity: 0.04,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct ShaderConfig {
    /// 存放 spv 以及反射信息的目录
    pub directory: PathBuf,
}
impl Default for ShaderConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("shaders"),
        }
    }
}

// load
impl EngineConfig {
    pub const DEFAULT_FILE_NAME: &'static str = "lumen.toml";

    /// 文件不存在时返回默认配置，格式错误时返回 Err
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            log::info!("config file {} not found, using defaults", path.display());
            return Ok(Self::default());
        }

        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        log::info!("loaded config from {}", path.display());
        Ok(config)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_yields_defaults() {
        let config = EngineConfig::from_toml_str("").unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.renderer.frames_in_flight(), 3);
        assert_eq!(config.bindless.max_buffers, 4096);
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config = EngineConfig::from_toml_str(
            r#"
            [renderer]
            frames_in_flight = 2
            present_mode = "fifo"

            [bloom]
            threshold = 0.8
            "#,
        )
        .unwrap();

        assert_eq!(config.renderer.frames_in_flight(), 2);
        assert_eq!(config.renderer.present_mode, PresentModeConfig::Fifo);
        assert_eq!(config.renderer.fence_timeout_ms, 2000);
        assert_eq!(config.bloom.threshold, 0.8);
        assert_eq!(config.bloom.knee, 0.5);
        assert_eq!(config.window.width, 1280);
    }

    #[test]
    fn frames_in_flight_is_clamped() {
        let config = EngineConfig::from_toml_str("[renderer]\nframes_in_flight = 0").unwrap();
        assert_eq!(config.renderer.frames_in_flight(), 1);

        let config = EngineConfig::from_toml_str("[renderer]\nframes_in_flight = 16").unwrap();
        assert_eq!(config.renderer.frames_in_flight(), RendererConfig::MAX_FRAMES_IN_FLIGHT);
    }

    #[test]
    fn malformed_document_is_an_error() {
        assert!(EngineConfig::from_toml_str("[renderer]\nframes_in_flight = \"three\"").is_err());
    }

    #[test]
    fn missing_file_yields_defaults() {
        let config = EngineConfig::load("/definitely/not/here/lumen.toml").unwrap();
        assert_eq!(config, EngineConfig::default());
    }
}
