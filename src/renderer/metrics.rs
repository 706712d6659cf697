//! 帧统计模块
//!
//! FrameMetrics 跟踪帧率、获取帧资源的次数以及因背压产生的等待。

use std::time::{Duration, Instant};

/// 帧统计
#[derive(Debug, Clone)]
pub struct FrameMetrics {
    /// 累计获取帧资源的次数
    acquired: u64,
    /// 需要等待 GPU 的次数
    stalls: u64,
    /// 累计等待时间
    total_wait: Duration,
    /// 单次最长等待
    max_wait: Duration,
    // 帧率窗口
    window_frames: u32,
    window_start: Instant,
    fps: f32,
}

impl FrameMetrics {
    pub fn new() -> Self {
        Self {
            acquired: 0,
            stalls: 0,
            total_wait: Duration::ZERO,
            max_wait: Duration::ZERO,
            window_frames: 0,
            window_start: Instant::now(),
            fps: 0.0,
        }
    }

    /// 记录一次成功的获取
    pub fn record_acquire(&mut self) {
        self.acquired += 1;
        self.window_frames += 1;

        let now = Instant::now();
        let elapsed = now.duration_since(self.window_start);

        // 每秒更新一次 FPS
        if elapsed >= Duration::from_secs(1) {
            self.fps = self.window_frames as f32 / elapsed.as_secs_f32();
            self.window_frames = 0;
            self.window_start = now;
        }
    }

    /// 记录一次因槽位仍在使用而产生的等待
    pub fn record_wait(&mut self, waited: Duration) {
        self.stalls += 1;
        self.total_wait += waited;
        self.max_wait = self.max_wait.max(waited);
    }

    pub fn acquired(&self) -> u64 {
        self.acquired
    }

    pub fn stalls(&self) -> u64 {
        self.stalls
    }

    pub fn total_wait(&self) -> Duration {
        self.total_wait
    }

    pub fn max_wait(&self) -> Duration {
        self.max_wait
    }

    /// 平均每次等待的时长
    pub fn average_wait(&self) -> Duration {
        if self.stalls == 0 {
            Duration::ZERO
        } else {
            let nanos = self.total_wait.as_nanos() / u128::from(self.stalls);
            Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX))
        }
    }

    /// 获取当前 FPS（每秒刷新）
    pub fn fps(&self) -> f32 {
        self.fps
    }
}

impl Default for FrameMetrics {
    fn default() -> Self {
        Self::new()
    }
}
