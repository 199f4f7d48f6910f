pub mod graphics_pipeline;
pub mod reflection;
pub mod rendering_info;
pub mod shader;
