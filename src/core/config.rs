//! 配置管理模块
//!
//! 提供帧资源环、模拟执行引擎、演示场景和日志的配置加载与校验。
//! 支持从 TOML 配置文件加载，也支持命令行参数覆盖。
//!
//! # 配置文件格式 (config.toml)
//!
//! ```toml
//! [frames]
//! frame_count = 3          # 帧资源数量 N
//! wait_timeout_ms = 2000   # 栅栏等待上限
//!
//! [engine]
//! gpu_frame_ms = 8         # 模拟执行引擎处理一帧的耗时
//! cpu_frame_ms = 2         # 模拟 CPU 录制一帧的耗时
//!
//! [scene]
//! object_count = 16
//! frames_to_run = 240
//! edit_interval = 30
//!
//! [logging]
//! level = "info"           # trace, debug, info, warn, error
//! file_output = false
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use super::error::{ConfigError, Result};

/// 配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// 帧资源环配置
    #[serde(default)]
    pub frames: FrameConfig,

    /// 模拟执行引擎配置
    #[serde(default)]
    pub engine: EngineConfig,

    /// 演示场景配置
    #[serde(default)]
    pub scene: SceneConfig,

    /// 日志配置
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// 帧资源环配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrameConfig {
    /// 帧资源数量（N），1 表示每帧都等待 GPU 空闲
    #[serde(default = "default_frame_count")]
    pub frame_count: usize,

    /// 单次栅栏等待的上限（毫秒）
    #[serde(default = "default_wait_timeout_ms")]
    pub wait_timeout_ms: u64,
}

/// 模拟执行引擎配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// 执行引擎处理一帧工作的耗时（毫秒）
    #[serde(default = "default_gpu_frame_ms")]
    pub gpu_frame_ms: u64,

    /// CPU 录制一帧的耗时（毫秒）
    #[serde(default = "default_cpu_frame_ms")]
    pub cpu_frame_ms: u64,
}

/// 演示场景配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SceneConfig {
    /// 场景中的物体数量
    #[serde(default = "default_object_count")]
    pub object_count: usize,

    /// 运行的帧数
    #[serde(default = "default_frames_to_run")]
    pub frames_to_run: u64,

    /// 每隔多少帧修改一次物体数据
    #[serde(default = "default_edit_interval")]
    pub edit_interval: u64,
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// 日志级别
    #[serde(default = "default_log_level")]
    pub level: LogLevel,

    /// 是否输出到文件
    #[serde(default = "default_file_output")]
    pub file_output: bool,

    /// 日志文件路径
    #[serde(default = "default_log_file")]
    pub log_file: String,
}

/// 日志级别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

// 默认值函数
fn default_frame_count() -> usize { 3 }
fn default_wait_timeout_ms() -> u64 { 2000 }
fn default_gpu_frame_ms() -> u64 { 8 }
fn default_cpu_frame_ms() -> u64 { 2 }
fn default_object_count() -> usize { 16 }
fn default_frames_to_run() -> u64 { 240 }
fn default_edit_interval() -> u64 { 30 }
fn default_log_level() -> LogLevel { LogLevel::Info }
fn default_file_output() -> bool { false }
fn default_log_file() -> String { "distframe.log".to_string() }

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            frame_count: default_frame_count(),
            wait_timeout_ms: default_wait_timeout_ms(),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            gpu_frame_ms: default_gpu_frame_ms(),
            cpu_frame_ms: default_cpu_frame_ms(),
        }
    }
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            object_count: default_object_count(),
            frames_to_run: default_frames_to_run(),
            edit_interval: default_edit_interval(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file_output: default_file_output(),
            log_file: default_log_file(),
        }
    }
}

impl FrameConfig {
    /// 栅栏等待上限
    pub fn wait_timeout(&self) -> Duration {
        Duration::from_millis(self.wait_timeout_ms)
    }
}

impl EngineConfig {
    pub fn gpu_frame_time(&self) -> Duration {
        Duration::from_millis(self.gpu_frame_ms)
    }

    pub fn cpu_frame_time(&self) -> Duration {
        Duration::from_millis(self.cpu_frame_ms)
    }
}

impl Config {
    /// 从配置文件加载
    ///
    /// # 示例
    ///
    /// ```no_run
    /// use dist_frame::core::Config;
    ///
    /// let config = Config::from_file("config.toml")?;
    /// # Ok::<(), dist_frame::core::DistFrameError>(())
    /// ```
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_str = path.as_ref().to_string_lossy().to_string();

        let contents = std::fs::read_to_string(path)
            .map_err(|_| ConfigError::FileNotFound(path_str.clone()))?;

        Self::from_toml_str(&contents)
    }

    /// 从 TOML 字符串解析
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        toml::from_str(contents).map_err(|e| ConfigError::ParseError(e.to_string()).into())
    }

    /// 从配置文件加载，如果文件不存在或无法解析则使用默认配置
    pub fn from_file_or_default<P: AsRef<Path>>(path: P) -> Self {
        Self::from_file(path).unwrap_or_default()
    }

    /// 保存配置到文件
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let contents = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::ParseError(e.to_string()))?;

        std::fs::write(path, contents)?;
        Ok(())
    }

    /// 从命令行参数覆盖配置
    ///
    /// 支持的参数：
    /// - `--frames <value>`: 运行的帧数
    /// - `--frame-count <value>`: 帧资源数量
    /// - `--timeout-ms <value>`: 栅栏等待上限
    /// - `--gpu-ms <value>`: 模拟执行引擎每帧耗时
    pub fn apply_args<I>(&mut self, args: I)
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let args: Vec<String> = args.into_iter().map(|s| s.as_ref().to_string()).collect();

        if let Some(frames) = arg_value(&args, "--frames") {
            self.scene.frames_to_run = frames;
        }

        if let Some(count) = arg_value(&args, "--frame-count") {
            self.frames.frame_count = count;
        }

        if let Some(timeout) = arg_value(&args, "--timeout-ms") {
            self.frames.wait_timeout_ms = timeout;
        }

        if let Some(gpu_ms) = arg_value(&args, "--gpu-ms") {
            self.engine.gpu_frame_ms = gpu_ms;
        }
    }

    /// 验证配置的有效性
    pub fn validate(&self) -> Result<()> {
        if self.frames.frame_count == 0 {
            return Err(ConfigError::InvalidValue {
                field: "frames.frame_count".to_string(),
                reason: "At least one frame resource is required".to_string(),
            }
            .into());
        }

        // 0 会让每次等待立即超时
        if self.frames.wait_timeout_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "frames.wait_timeout_ms".to_string(),
                reason: "Wait timeout must be greater than 0".to_string(),
            }
            .into());
        }

        if self.scene.object_count == 0 {
            return Err(ConfigError::InvalidValue {
                field: "scene.object_count".to_string(),
                reason: "Scene must contain at least one object".to_string(),
            }
            .into());
        }

        Ok(())
    }
}

fn arg_value<T: std::str::FromStr>(args: &[String], name: &str) -> Option<T> {
    let idx = args.iter().position(|a| a == name)?;
    args.get(idx + 1)?.parse().ok()
}
