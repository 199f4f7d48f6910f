//! 每帧的渲染流程
//!
//! [`renderer::Renderer`] 是唯一的入口：收集场景、排序、上传、录制各个 pass、提交并 present。
//! 收集和绘制顺序（[`gather`]、[`frame_plan`]、[`bloom`]）是纯 CPU 逻辑，不需要 GPU 就能测试。

pub mod bloom;
pub mod error;
pub mod frame_buffers;
pub mod frame_plan;
pub mod gather;
pub mod gpu_data;
pub mod passes;
pub mod push;
pub mod render_targets;
pub mod renderer;
pub mod shader_library;
