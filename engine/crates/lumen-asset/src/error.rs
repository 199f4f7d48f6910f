use lumen_gfx::GfxError;
use lumen_gfx::pipelines::reflection::VertexSemantic;
use lumen_render_interface::bindless::BindlessError;

#[derive(Debug, thiserror::Error)]
pub enum AssetError {
    #[error("failed to decode image {path}: {source}")]
    Decode {
        path: String,
        #[source]
        source: image::ImageError,
    },

    #[error("invalid image data: {width}x{height} with {channels} channels needs {expected} bytes, got {actual}")]
    InvalidImageData {
        width: u32,
        height: u32,
        channels: u8,
        expected: usize,
        actual: usize,
    },

    #[error("mesh {name} has no position attribute")]
    MissingPosition { name: String },

    #[error("mesh {name}: attribute {semantic:?} has {actual} elements, expected {expected}")]
    AttributeLength {
        name: String,
        semantic: VertexSemantic,
        expected: usize,
        actual: usize,
    },

    #[error("mesh {name}: attribute {semantic:?} has the wrong element type")]
    AttributeType { name: String, semantic: VertexSemantic },

    #[error("mesh {name}: index {index} out of range for {vertex_count} vertices")]
    IndexOutOfRange { name: String, index: u32, vertex_count: usize },

    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid font metrics {path}: {source}")]
    FontParse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Gfx(#[from] GfxError),

    #[error(transparent)]
    Bindless(#[from] BindlessError),
}
