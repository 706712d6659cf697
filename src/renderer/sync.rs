//! GPU 同步机制模块
//!
//! 提供 CPU 与异步执行引擎之间的栅栏同步原语。
//! 对应 DistEngine 中 `mFence` / `mCurrentFence` / `FlushCommandQueue` 的组合。
//!
//! # 分层
//!
//! - [`DeviceFence`] / [`CommandQueue`]：设备层提供的原语（外部实现）
//! - [`FenceCounter`]：帧资源池依赖的抽象接口，测试中可以替换为确定性的假实现
//! - [`FenceManager`]：基于 `DeviceFence` 的生产实现，负责单调递增、回退检测和超时
//!
//! # 有序性
//!
//! 提交通道严格 FIFO：栅栏值 K 完成意味着所有 `<= K` 的值都已完成，
//! 因此判断槽位能否复用只需要一次整数比较。

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::core::error::{Result, SyncError};
use crate::{sync_debug, sync_error, sync_warn};

/// 设备移除后 `GetCompletedValue` 返回的值
pub const DEVICE_REMOVED_VALUE: u64 = u64::MAX;

/// Fence 值
///
/// 用于CPU-GPU同步的单调递增值。0 保留表示"从未提交"。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FenceValue(u64);

impl FenceValue {
    /// 从未提交
    pub const NONE: Self = Self(0);

    /// 创建新的Fence值
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// 获取内部值
    pub const fn value(&self) -> u64 {
        self.0
    }

    /// 是否为保留值 0
    pub const fn is_none(&self) -> bool {
        self.0 == 0
    }

    /// 下一个Fence值
    pub const fn next(&self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for FenceValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 设备层等待结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitStatus {
    /// 栅栏已经到达目标值
    Signaled,
    /// 超时
    TimedOut,
    /// 设备已移除，栅栏永远不会再推进
    DeviceRemoved,
}

/// 设备栅栏原语
///
/// 相当于 `ID3D12Fence::GetCompletedValue` 加上
/// `SetEventOnCompletion` + `WaitForSingleObject` 的组合。
pub trait DeviceFence: Send + Sync {
    /// 执行引擎已确认完成的最大值；设备移除时返回 [`DEVICE_REMOVED_VALUE`]
    fn completed_value(&self) -> u64;

    /// 阻塞直到 `completed_value() >= value`、超时或设备移除
    fn wait_for_value(&self, value: u64, timeout: Duration) -> WaitStatus;
}

impl<F: DeviceFence + ?Sized> DeviceFence for Arc<F> {
    fn completed_value(&self) -> u64 {
        (**self).completed_value()
    }

    fn wait_for_value(&self, value: u64, timeout: Duration) -> WaitStatus {
        (**self).wait_for_value(value, timeout)
    }
}

/// 命令队列
///
/// 提交顺序即执行顺序。
pub trait CommandQueue {
    /// 录制好的工作
    type Work;

    /// 将录制好的工作加入队列
    fn submit(&mut self, work: Self::Work) -> Result<()>;

    /// 请求执行引擎在之前提交的工作完成后把栅栏推进到 `value`
    fn signal(&mut self, value: FenceValue) -> Result<()>;
}

/// 栅栏计数器
///
/// 帧资源池只通过这个接口与执行引擎交互。
/// 只支持单个 CPU 提交线程。
pub trait FenceCounter {
    /// 通过 `queue` 发出下一个栅栏值并返回它
    fn signal<Q>(&mut self, queue: &mut Q) -> Result<FenceValue>
    where
        Q: CommandQueue + ?Sized;

    /// 最近一次 `signal` 发出的值
    fn last_signaled(&self) -> FenceValue;

    /// 执行引擎已确认完成的最大值（非阻塞）
    fn completed_value(&self) -> Result<FenceValue>;

    /// 阻塞直到 `completed_value() >= value` 或超时
    ///
    /// `value` 为 0 时立即成功。
    fn wait_until(&self, value: FenceValue, timeout: Duration) -> Result<()>;

    /// 检查特定Fence值是否已完成
    fn is_completed(&self, value: FenceValue) -> Result<bool> {
        Ok(self.completed_value()? >= value)
    }

    /// 刷新命令队列：发出新值并等待它完成
    fn flush<Q>(&mut self, queue: &mut Q, timeout: Duration) -> Result<FenceValue>
    where
        Q: CommandQueue + ?Sized,
    {
        let value = self.signal(queue)?;
        self.wait_until(value, timeout)?;
        Ok(value)
    }
}

/// Fence 管理器
///
/// 基于设备栅栏的 [`FenceCounter`] 实现。
///
/// # 示例
///
/// ```no_run
/// use std::time::Duration;
/// use dist_frame::gfx::software::{ManualQueue, SoftwareFence};
/// use dist_frame::renderer::sync::{FenceCounter, FenceManager};
///
/// let fence = SoftwareFence::shared();
/// let mut queue = ManualQueue::<()>::immediate(fence.clone());
/// let mut fences = FenceManager::new(fence);
///
/// let value = fences.signal(&mut queue)?;
/// fences.wait_until(value, Duration::from_millis(100))?;
/// # Ok::<(), dist_frame::core::DistFrameError>(())
/// ```
pub struct FenceManager<F> {
    fence: F,
    /// 最近发出的值（CPU侧）
    current_value: u64,
    /// 最近观察到的已完成值，用于回退检测
    last_completed: AtomicU64,
}

impl<F: DeviceFence> FenceManager<F> {
    /// 创建新的Fence管理器
    ///
    /// 设备栅栏必须以 0 作为初始值创建。
    pub fn new(fence: F) -> Self {
        Self {
            fence,
            current_value: 0,
            last_completed: AtomicU64::new(0),
        }
    }

    /// 底层设备栅栏
    pub fn device_fence(&self) -> &F {
        &self.fence
    }

    /// 读取设备栅栏并校验单调性
    ///
    /// `target` 只用于设备丢失时的错误信息。
    fn observe(&self, target: u64) -> Result<u64> {
        let observed = self.fence.completed_value();

        if observed == DEVICE_REMOVED_VALUE {
            sync_error!(fence = target, "Device removed while reading fence");
            return Err(SyncError::DeviceLost { target }.into());
        }

        let previous = self.last_completed.load(Ordering::Acquire);
        if observed < previous {
            sync_error!(previous, observed, "Fence completed value went backwards");
            return Err(SyncError::FenceRegression { previous, observed }.into());
        }

        if observed > self.current_value {
            sync_error!(
                completed = observed,
                issued = self.current_value,
                "Fence completed value is ahead of issued values"
            );
            return Err(SyncError::FenceAhead {
                completed: observed,
                issued: self.current_value,
            }
            .into());
        }

        self.last_completed.fetch_max(observed, Ordering::AcqRel);
        Ok(observed)
    }
}

impl<F: DeviceFence> FenceCounter for FenceManager<F> {
    fn signal<Q>(&mut self, queue: &mut Q) -> Result<FenceValue>
    where
        Q: CommandQueue + ?Sized,
    {
        // 即使 Signal 失败，这个值也视为已消耗，保证不会重复发出
        self.current_value += 1;
        let value = FenceValue::new(self.current_value);
        queue.signal(value)?;
        Ok(value)
    }

    fn last_signaled(&self) -> FenceValue {
        FenceValue::new(self.current_value)
    }

    fn completed_value(&self) -> Result<FenceValue> {
        self.observe(self.current_value).map(FenceValue::new)
    }

    fn wait_until(&self, value: FenceValue, timeout: Duration) -> Result<()> {
        if value.is_none() {
            return Ok(());
        }

        let target = value.value();
        let deadline = Instant::now() + timeout;

        loop {
            let completed = self.observe(target)?;
            if completed >= target {
                return Ok(());
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                sync_warn!(fence = target, completed, ?timeout, "Fence wait timed out");
                return Err(SyncError::WaitTimeout { target, completed, timeout }.into());
            }

            sync_debug!(fence = target, completed, "Waiting for fence");
            match self.fence.wait_for_value(target, remaining) {
                // 重新读取一次，顺带做回退检测
                WaitStatus::Signaled => continue,
                WaitStatus::TimedOut => {
                    let completed = self.observe(target)?;
                    if completed >= target {
                        return Ok(());
                    }
                    sync_warn!(fence = target, completed, ?timeout, "Fence wait timed out");
                    return Err(SyncError::WaitTimeout { target, completed, timeout }.into());
                }
                WaitStatus::DeviceRemoved => {
                    sync_error!(fence = target, "Device removed during fence wait");
                    return Err(SyncError::DeviceLost { target }.into());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfx::software::{ManualQueue, SoftwareFence};

    const SHORT: Duration = Duration::from_millis(50);

    #[test]
    fn test_fence_value() {
        let fence = FenceValue::new(1);
        assert_eq!(fence.value(), 1);
        assert_eq!(fence.next().value(), 2);
        assert!(FenceValue::NONE.is_none());
        assert!(FenceValue::new(1) < FenceValue::new(2));
        assert_eq!(FenceValue::default(), FenceValue::NONE);
    }

    #[test]
    fn test_signal_is_strictly_monotonic() {
        let fence = SoftwareFence::shared();
        let mut queue = ManualQueue::<()>::new(fence.clone());
        let mut manager = FenceManager::new(fence);

        let values: Vec<u64> = (0..5)
            .map(|_| manager.signal(&mut queue).unwrap().value())
            .collect();

        assert_eq!(values, vec![1, 2, 3, 4, 5]);
        assert_eq!(queue.signaled(), &[1, 2, 3, 4, 5]);
        assert_eq!(manager.last_signaled(), FenceValue::new(5));
    }

    #[test]
    fn test_wait_returns_once_target_completes() {
        let fence = SoftwareFence::shared();
        let mut queue = ManualQueue::<()>::new(fence.clone());
        let mut manager = FenceManager::new(fence.clone());

        for _ in 0..5 {
            manager.signal(&mut queue).unwrap();
        }

        // 4 和 5 已经发出但尚未完成，不影响等待 3
        fence.complete_to(3);
        manager.wait_until(FenceValue::new(3), SHORT).unwrap();
        assert_eq!(manager.completed_value().unwrap(), FenceValue::new(3));
        assert!(!manager.is_completed(FenceValue::new(4)).unwrap());
    }

    #[test]
    fn test_wait_on_zero_is_noop() {
        let fence = SoftwareFence::shared();
        let manager = FenceManager::new(fence);
        manager.wait_until(FenceValue::NONE, Duration::ZERO).unwrap();
    }

    #[test]
    fn test_wait_wakes_on_background_completion() {
        let fence = SoftwareFence::shared();
        let mut queue = ManualQueue::<()>::new(fence.clone());
        let mut manager = FenceManager::new(fence.clone());
        let value = manager.signal(&mut queue).unwrap();

        let background = fence.clone();
        let handle = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            background.complete_to(1);
        });

        manager.wait_until(value, Duration::from_secs(5)).unwrap();
        handle.join().unwrap();
    }

    #[test]
    fn test_frozen_engine_times_out() {
        let fence = SoftwareFence::shared();
        let mut queue = ManualQueue::<()>::new(fence.clone());
        let mut manager = FenceManager::new(fence.clone());

        for _ in 0..10 {
            manager.signal(&mut queue).unwrap();
        }
        fence.complete_to(9);

        let start = Instant::now();
        let err = manager
            .wait_until(FenceValue::new(10), Duration::from_millis(500))
            .unwrap_err();
        let elapsed = start.elapsed();

        assert!(err.is_timeout());
        assert!(elapsed >= Duration::from_millis(450), "returned too early: {:?}", elapsed);
        assert!(elapsed < Duration::from_secs(3), "returned too late: {:?}", elapsed);
        assert!(matches!(
            err,
            crate::core::DistFrameError::Sync(SyncError::WaitTimeout { target: 10, completed: 9, .. })
        ));
    }

    #[test]
    fn test_device_removed_is_reported() {
        let fence = SoftwareFence::shared();
        let mut queue = ManualQueue::<()>::new(fence.clone());
        let mut manager = FenceManager::new(fence.clone());
        let value = manager.signal(&mut queue).unwrap();

        fence.remove_device();

        let err = manager.wait_until(value, Duration::from_secs(5)).unwrap_err();
        assert!(err.is_device_lost());
        assert!(manager.completed_value().unwrap_err().is_device_lost());
    }

    #[test]
    fn test_device_removed_during_wait() {
        let fence = SoftwareFence::shared();
        let mut queue = ManualQueue::<()>::new(fence.clone());
        let mut manager = FenceManager::new(fence.clone());
        let value = manager.signal(&mut queue).unwrap();

        let background = fence.clone();
        let handle = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            background.remove_device();
        });

        let start = Instant::now();
        let err = manager.wait_until(value, Duration::from_secs(5)).unwrap_err();
        handle.join().unwrap();

        assert!(err.is_device_lost());
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_regression_is_fatal() {
        let fence = SoftwareFence::shared();
        let mut queue = ManualQueue::<()>::new(fence.clone());
        let mut manager = FenceManager::new(fence.clone());
        for _ in 0..3 {
            manager.signal(&mut queue).unwrap();
        }

        fence.complete_to(3);
        assert_eq!(manager.completed_value().unwrap().value(), 3);

        fence.force_completed(2);
        let err = manager.completed_value().unwrap_err();
        assert!(err.is_fatal());
        assert!(matches!(
            err,
            crate::core::DistFrameError::Sync(SyncError::FenceRegression { previous: 3, observed: 2 })
        ));
    }

    #[test]
    fn test_completed_ahead_of_issued() {
        let fence = SoftwareFence::shared();
        let manager = FenceManager::new(fence.clone());
        fence.force_completed(4);

        let err = manager.completed_value().unwrap_err();
        assert!(matches!(
            err,
            crate::core::DistFrameError::Sync(SyncError::FenceAhead { completed: 4, issued: 0 })
        ));
    }

    #[test]
    fn test_flush_waits_for_new_value() {
        let fence = SoftwareFence::shared();
        let mut queue = ManualQueue::<()>::immediate(fence.clone());
        let mut manager = FenceManager::new(fence);

        manager.signal(&mut queue).unwrap();
        let flushed = manager.flush(&mut queue, SHORT).unwrap();
        assert_eq!(flushed, FenceValue::new(2));
        assert!(manager.is_completed(flushed).unwrap());
    }
}
