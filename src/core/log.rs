//! 日志系统模块
//!
//! 基于 `tracing` 提供结构化的日志记录功能。
//! 栅栏与帧资源相关的事件统一记录在 `dist_frame::sync` 目标下，
//! 可以通过 `RUST_LOG=dist_frame::sync=debug` 单独打开。
//!
//! # 使用示例
//!
//! ```no_run
//! use dist_frame::core::{log, config::LogLevel};
//!
//! log::init_logger(LogLevel::Info, false, None);
//! tracing::info!(frame_count = 3, "Frame ring created");
//! ```

use std::path::Path;
use tracing::Level;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    prelude::*,
    EnvFilter,
};

use super::config::LogLevel;

/// 初始化日志系统
///
/// 必须在程序开始时调用一次。设置了 `RUST_LOG` 时优先使用环境变量。
///
/// # 参数
///
/// * `level` - 日志级别
/// * `file_output` - 是否输出到文件
/// * `log_file_path` - 日志文件路径（可选，默认为 "distframe.log"）
pub fn init_logger(level: LogLevel, file_output: bool, log_file_path: Option<&str>) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(Level::from(level).as_str().to_ascii_lowercase()));

    if file_output {
        let log_path = log_file_path.unwrap_or("distframe.log");
        let path = Path::new(log_path);
        let directory = path.parent().unwrap_or(Path::new("."));
        let filename = path
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("distframe.log");

        // 每天滚动
        let file_appender = RollingFileAppender::new(Rotation::DAILY, directory, filename);

        let console_layer = fmt::layer()
            .with_target(true)
            .with_thread_ids(false)
            .with_thread_names(true)
            .with_ansi(true);

        let file_layer = fmt::layer()
            .with_target(true)
            .with_thread_names(true)
            .with_ansi(false)
            .with_writer(file_appender);

        tracing_subscriber::registry()
            .with(filter)
            .with(console_layer)
            .with(file_layer)
            .init();
    } else {
        let fmt_layer = fmt::layer()
            .with_target(true)
            .with_thread_ids(false)
            .with_thread_names(true)
            .with_span_events(FmtSpan::CLOSE)
            .with_ansi(true);

        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer)
            .init();
    }
}

/// 同步日志 - Debug 级别
#[macro_export]
macro_rules! sync_debug {
    ($($arg:tt)*) => {
        tracing::debug!(target: "dist_frame::sync", $($arg)*)
    };
}

/// 同步日志 - Warn 级别
#[macro_export]
macro_rules! sync_warn {
    ($($arg:tt)*) => {
        tracing::warn!(target: "dist_frame::sync", $($arg)*)
    };
}

/// 同步日志 - Error 级别
#[macro_export]
macro_rules! sync_error {
    ($($arg:tt)*) => {
        tracing::error!(target: "dist_frame::sync", $($arg)*)
    };
}

impl From<LogLevel> for Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => Level::TRACE,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Info => Level::INFO,
            LogLevel::Warn => Level::WARN,
            LogLevel::Error => Level::ERROR,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_conversion() {
        assert_eq!(Level::from(LogLevel::Info), Level::INFO);
        assert_eq!(Level::from(LogLevel::Error), Level::ERROR);
        assert_eq!(Level::from(LogLevel::Trace).as_str(), "TRACE");
    }
}
