//! CPU 侧栅栏
//!
//! 用互斥锁加条件变量模拟 `ID3D12Fence` 与完成事件。

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::renderer::sync::{DeviceFence, WaitStatus, DEVICE_REMOVED_VALUE};

#[derive(Debug, Default)]
struct FenceState {
    completed: u64,
    device_removed: bool,
}

/// 软件栅栏
///
/// 由执行引擎线程推进，由 CPU 提交线程读取和等待。
#[derive(Debug, Default)]
pub struct SoftwareFence {
    state: Mutex<FenceState>,
    completion: Condvar,
}

impl SoftwareFence {
    pub fn new() -> Self {
        Self::default()
    }

    /// 创建可在引擎线程与提交线程之间共享的栅栏
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// 把已完成值推进到 `value`，只会前进不会后退
    pub fn complete_to(&self, value: u64) {
        let mut state = self.state.lock();
        if value > state.completed {
            state.completed = value;
            self.completion.notify_all();
        }
    }

    /// 直接覆盖已完成值，可以让它后退，用于注入驱动故障
    pub fn force_completed(&self, value: u64) {
        let mut state = self.state.lock();
        state.completed = value;
        self.completion.notify_all();
    }

    /// 模拟设备移除，唤醒所有等待者
    pub fn remove_device(&self) {
        let mut state = self.state.lock();
        state.device_removed = true;
        self.completion.notify_all();
    }

    pub fn is_device_removed(&self) -> bool {
        self.state.lock().device_removed
    }
}

impl DeviceFence for SoftwareFence {
    fn completed_value(&self) -> u64 {
        let state = self.state.lock();
        if state.device_removed {
            DEVICE_REMOVED_VALUE
        } else {
            state.completed
        }
    }

    fn wait_for_value(&self, value: u64, timeout: Duration) -> WaitStatus {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock();

        loop {
            if state.device_removed {
                return WaitStatus::DeviceRemoved;
            }
            if state.completed >= value {
                return WaitStatus::Signaled;
            }
            if self.completion.wait_until(&mut state, deadline).timed_out() {
                return if state.device_removed {
                    WaitStatus::DeviceRemoved
                } else if state.completed >= value {
                    WaitStatus::Signaled
                } else {
                    WaitStatus::TimedOut
                };
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_complete_to_never_goes_backwards() {
        let fence = SoftwareFence::new();
        fence.complete_to(5);
        fence.complete_to(3);
        assert_eq!(fence.completed_value(), 5);

        fence.force_completed(3);
        assert_eq!(fence.completed_value(), 3);
    }

    #[test]
    fn test_wait_status() {
        let fence = SoftwareFence::new();
        fence.complete_to(2);
        assert_eq!(fence.wait_for_value(2, Duration::ZERO), WaitStatus::Signaled);
        assert_eq!(
            fence.wait_for_value(3, Duration::from_millis(10)),
            WaitStatus::TimedOut
        );

        fence.remove_device();
        assert_eq!(fence.completed_value(), DEVICE_REMOVED_VALUE);
        assert_eq!(fence.wait_for_value(3, Duration::from_secs(1)), WaitStatus::DeviceRemoved);
    }
}
