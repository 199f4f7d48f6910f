use ash::vk;

/// GFX 层的错误
///
/// 这里的错误在引擎层面基本都是致命的：设备对象创建失败、显存不足、驱动拒绝等
#[derive(Debug, thiserror::Error)]
pub enum GfxError {
    #[error("failed to load vulkan library: {0}")]
    Loading(#[from] ash::LoadingError),

    #[error("vulkan call failed: {0}")]
    Vulkan(#[from] vk::Result),

    #[error("no physical device satisfies the engine requirements")]
    NoSuitableDevice,

    #[error("no queue family supports graphics + compute + transfer")]
    NoGraphicsQueue,

    #[error("none of the candidate formats is supported: {0:?}")]
    UnsupportedFormat(Vec<vk::Format>),

    #[error("failed to read shader {path}: {source}")]
    ShaderIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid shader reflection {path}: {source}")]
    ShaderReflection {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("pipeline creation failed for {name}: {result}")]
    PipelineCreation { name: String, result: vk::Result },

    #[error("image data size mismatch: expected {expected} bytes, got {actual} bytes")]
    ImageDataSize { expected: usize, actual: usize },
}

pub type GfxResult<T> = Result<T, GfxError>;
