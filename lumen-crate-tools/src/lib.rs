//! Lumen 工具集
//!
//! 提供日志初始化、引擎配置加载、资源路径管理等通用工具。

pub mod config;
pub mod init_log;
pub mod resource;
