//! 渲染器和 GPU 之间的边界层
//!
//! 这里的结构大多是纯 CPU 的数据结构（句柄表、变体编码、push constant 打包、帧环），
//! 只有 bindless 描述符表、gpu 资源表和 frame context 直接持有 Vulkan 对象。

pub mod bindless;
pub mod elastic;
pub mod frame_context;
pub mod frame_counter;
pub mod frame_ring;
pub mod gpu_resources;
pub mod handle;
pub mod pipeline_variants;
pub mod push_constants;
pub mod settings;
