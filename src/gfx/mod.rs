//! 图形后端模块
//!
//! 实现 `renderer::sync` 中的 `DeviceFence` / `CommandQueue` 接口。
//! 目前只提供在 CPU 上模拟执行引擎的软件后端。

pub mod software;
