//! Kiln 工具集
//!
//! 提供日志初始化、资源路径管理、引擎配置等通用工具。
//!
//! # KilnPath
//! 基于工作区根目录的统一路径管理，避免硬编码相对路径。
//!
//! # EngineConfig
//! 资源加载引擎的运行参数，可通过 TOML 文件覆盖。

pub mod config;
pub mod init_log;
pub mod resource;
