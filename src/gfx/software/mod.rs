//! 软件后端
//!
//! 在 CPU 上模拟命令队列与栅栏：
//! - `SoftwareFence`：条件变量实现的栅栏，支持设备移除和故障注入
//! - `SoftwareQueue`：独立线程上的 FIFO 执行引擎
//! - `ManualQueue`：由调用方手动推进的确定性队列

pub mod engine;
pub mod fence;
pub mod manual;

pub use engine::SoftwareQueue;
pub use fence::SoftwareFence;
pub use manual::ManualQueue;
