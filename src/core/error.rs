//! 错误处理模块
//!
//! 定义了帧资源环与栅栏同步中使用的统一错误类型。
//!
//! # 错误分类
//!
//! - `ConfigError`：配置文件加载与校验失败
//! - `GraphicsError`：启动阶段的资源创建失败、命令提交失败
//! - `SyncError`：稳态运行中的栅栏等待失败与栅栏值异常
//!
//! 启动阶段的错误不可恢复；等待超时可由调用方决定重试或退出；
//! 设备丢失与栅栏回退一律视为致命错误。

use std::fmt;
use std::time::Duration;

/// 统一的 Result 类型
pub type Result<T> = std::result::Result<T, DistFrameError>;

/// DistFrame 的错误类型
#[derive(Debug)]
pub enum DistFrameError {
    /// 配置错误
    Config(ConfigError),

    /// 图形设备层错误
    Graphics(GraphicsError),

    /// 栅栏同步错误
    Sync(SyncError),

    /// IO 错误
    Io(std::io::Error),

    /// 初始化错误
    Initialization(String),

    /// 运行时错误
    Runtime(String),
}

/// 配置相关的错误
#[derive(Debug)]
pub enum ConfigError {
    /// 配置文件未找到
    FileNotFound(String),

    /// 配置文件解析失败
    ParseError(String),

    /// 配置值无效
    InvalidValue { field: String, reason: String },
}

/// 设备层相关的错误
#[derive(Debug)]
pub enum GraphicsError {
    /// 栅栏、命令分配器或帧资源创建失败
    ResourceCreation(String),

    /// 命令提交或 Signal 失败
    CommandExecution(String),
}

/// 栅栏同步相关的错误
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
    /// 在超时时间内没有观察到执行引擎推进到目标值
    WaitTimeout {
        target: u64,
        completed: u64,
        timeout: Duration,
    },

    /// 执行引擎报告设备已移除
    DeviceLost { target: u64 },

    /// 已完成值小于之前观察到的值
    FenceRegression { previous: u64, observed: u64 },

    /// 已完成值超过了 CPU 发出过的最大值
    FenceAhead { completed: u64, issued: u64 },

    /// Release 的栅栏值小于槽位当前记录的值
    StaleRelease { slot: usize, current: u64, attempted: u64 },

    /// Release 的栅栏值从未由 Signal 发出
    UnissuedFenceValue { slot: usize, value: u64, issued: u64 },

    /// Release 的栅栏值与该槽位本次 Signal 得到的值不同
    MismatchedRelease { slot: usize, signaled: u64, attempted: u64 },

    /// 槽位索引越界
    InvalidSlot { slot: usize, count: usize },
}

impl DistFrameError {
    /// 是否为致命错误
    ///
    /// 只有等待超时可以重试同一帧，其余错误重试也会得到相同结果，
    /// 或者意味着设备状态已不可信。
    pub fn is_fatal(&self) -> bool {
        !self.is_timeout()
    }

    /// 是否为等待超时
    pub fn is_timeout(&self) -> bool {
        matches!(self, DistFrameError::Sync(SyncError::WaitTimeout { .. }))
    }

    /// 是否为设备丢失
    pub fn is_device_lost(&self) -> bool {
        matches!(self, DistFrameError::Sync(SyncError::DeviceLost { .. }))
    }
}

impl fmt::Display for DistFrameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DistFrameError::Config(e) => write!(f, "Configuration error: {}", e),
            DistFrameError::Graphics(e) => write!(f, "Graphics error: {}", e),
            DistFrameError::Sync(e) => write!(f, "Synchronization error: {}", e),
            DistFrameError::Io(e) => write!(f, "IO error: {}", e),
            DistFrameError::Initialization(msg) => write!(f, "Initialization error: {}", msg),
            DistFrameError::Runtime(msg) => write!(f, "Runtime error: {}", msg),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::FileNotFound(path) => write!(f, "Config file not found: {}", path),
            ConfigError::ParseError(msg) => write!(f, "Failed to parse config: {}", msg),
            ConfigError::InvalidValue { field, reason } => {
                write!(f, "Invalid value for '{}': {}", field, reason)
            }
        }
    }
}

impl fmt::Display for GraphicsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GraphicsError::ResourceCreation(msg) => write!(f, "Resource creation failed: {}", msg),
            GraphicsError::CommandExecution(msg) => write!(f, "Command execution failed: {}", msg),
        }
    }
}

impl fmt::Display for SyncError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncError::WaitTimeout { target, completed, timeout } => write!(
                f,
                "Timed out after {:?} waiting for fence {} (completed: {})",
                timeout, target, completed
            ),
            SyncError::DeviceLost { target } => {
                write!(f, "Device lost while waiting for fence {}", target)
            }
            SyncError::FenceRegression { previous, observed } => write!(
                f,
                "Fence completed value went backwards: {} -> {}",
                previous, observed
            ),
            SyncError::FenceAhead { completed, issued } => write!(
                f,
                "Fence completed value {} exceeds highest issued value {}",
                completed, issued
            ),
            SyncError::StaleRelease { slot, current, attempted } => write!(
                f,
                "Slot {} released with fence {} older than its current fence {}",
                slot, attempted, current
            ),
            SyncError::UnissuedFenceValue { slot, value, issued } => write!(
                f,
                "Slot {} released with fence {} which was never signaled (last issued: {})",
                slot, value, issued
            ),
            SyncError::MismatchedRelease { slot, signaled, attempted } => write!(
                f,
                "Slot {} released with fence {} but its submission signaled {}",
                slot, attempted, signaled
            ),
            SyncError::InvalidSlot { slot, count } => {
                write!(f, "Slot index {} out of range (slot count: {})", slot, count)
            }
        }
    }
}

impl std::error::Error for DistFrameError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DistFrameError::Io(e) => Some(e),
            DistFrameError::Config(e) => Some(e),
            DistFrameError::Graphics(e) => Some(e),
            DistFrameError::Sync(e) => Some(e),
            _ => None,
        }
    }
}

impl std::error::Error for ConfigError {}
impl std::error::Error for GraphicsError {}
impl std::error::Error for SyncError {}

impl From<std::io::Error> for DistFrameError {
    fn from(err: std::io::Error) -> Self {
        DistFrameError::Io(err)
    }
}

impl From<ConfigError> for DistFrameError {
    fn from(err: ConfigError) -> Self {
        DistFrameError::Config(err)
    }
}

impl From<GraphicsError> for DistFrameError {
    fn from(err: GraphicsError) -> Self {
        DistFrameError::Graphics(err)
    }
}

impl From<SyncError> for DistFrameError {
    fn from(err: SyncError) -> Self {
        DistFrameError::Sync(err)
    }
}
