//! 手动推进的命令队列
//!
//! 不启动线程，已完成值完全由调用方控制，用于确定性测试。

use std::sync::Arc;

use crate::core::error::{GraphicsError, Result};
use crate::renderer::sync::{CommandQueue, FenceValue};

use super::fence::SoftwareFence;

/// 手动队列
///
/// - [`ManualQueue::new`]：Signal 只记录值，由测试调用 [`SoftwareFence::complete_to`] 推进
/// - [`ManualQueue::immediate`]：Signal 立即完成，相当于无限快的 GPU
pub struct ManualQueue<W> {
    fence: Arc<SoftwareFence>,
    auto_complete: bool,
    submitted: Vec<W>,
    signaled: Vec<u64>,
}

impl<W> ManualQueue<W> {
    pub fn new(fence: Arc<SoftwareFence>) -> Self {
        Self {
            fence,
            auto_complete: false,
            submitted: Vec::new(),
            signaled: Vec::new(),
        }
    }

    pub fn immediate(fence: Arc<SoftwareFence>) -> Self {
        Self {
            auto_complete: true,
            ..Self::new(fence)
        }
    }

    pub fn fence(&self) -> &Arc<SoftwareFence> {
        &self.fence
    }

    /// 已提交的工作，按提交顺序
    pub fn submitted(&self) -> &[W] {
        &self.submitted
    }

    /// 已请求的 Signal 值，按请求顺序
    pub fn signaled(&self) -> &[u64] {
        &self.signaled
    }

    /// 完成到最早的 `count` 个 Signal 值为止
    pub fn complete_signals(&self, count: usize) {
        if let Some(&value) = self.signaled.iter().take(count).last() {
            self.fence.complete_to(value);
        }
    }

    /// 完成所有已请求的 Signal
    pub fn complete_all(&self) {
        if let Some(&value) = self.signaled.last() {
            self.fence.complete_to(value);
        }
    }
}

impl<W> CommandQueue for ManualQueue<W> {
    type Work = W;

    fn submit(&mut self, work: W) -> Result<()> {
        if self.fence.is_device_removed() {
            return Err(GraphicsError::CommandExecution("Device removed".to_string()).into());
        }
        self.submitted.push(work);
        Ok(())
    }

    fn signal(&mut self, value: FenceValue) -> Result<()> {
        if self.fence.is_device_removed() {
            return Err(GraphicsError::CommandExecution("Device removed".to_string()).into());
        }
        self.signaled.push(value.value());
        if self.auto_complete {
            self.fence.complete_to(value.value());
        }
        Ok(())
    }
}
