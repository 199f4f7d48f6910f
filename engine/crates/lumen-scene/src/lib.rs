//! CPU 侧的场景数据
//!
//! 组件按种类存放在 [`scene_manager::SceneManager`] 的 slotmap 中，
//! renderer 每帧通过它提供的查询接口遍历 mesh、光源、粒子和文字。

pub mod camera;
pub mod components;
pub mod scene_manager;
