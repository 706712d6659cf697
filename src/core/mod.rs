//! 核心功能模块
//!
//! 提供与具体图形 API 无关的基础设施：日志、配置和错误处理。
//!
//! # 模块组织
//!
//! - `log`：基于 tracing 的日志初始化与同步日志宏
//! - `config`：从 TOML 加载帧资源环、模拟引擎和场景配置
//! - `error`：统一错误类型

pub mod log;
pub mod config;
pub mod error;

pub use error::{Result, DistFrameError};
pub use config::Config;
