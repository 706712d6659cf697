//! 渲染器模块
//!
//! 本模块提供帧资源环以及驱动它的渲染循环，与具体的执行引擎无关。
//! 执行引擎通过 `sync` 中的 `CommandQueue` / `DeviceFence` 接口接入，
//! 具体实现在 `gfx` 模块中。
//!
//! # 架构设计
//!
//! - `RenderLoop`：持有命令队列和帧资源池，完成一帧的完整流程
//! - `FrameResourcePool`：N 个槽位的轮转与背压
//! - `FenceCounter`：CPU 与执行引擎之间唯一的同步点
//! - `DirtyPropagator`：把 CPU 侧修改传播到所有槽位的副本
//!
//! # 一帧的流程
//!
//! ```text
//! acquire_next ──▶ record ──▶ submit ──▶ signal ──▶ release
//!   (可能等待)     (CPU 写入)   (入队)     (发出栅栏)   (标记槽位)
//! ```

use std::time::Duration;

use crate::core::error::Result;
use crate::{sync_debug, sync_error};

// 通用渲染器组件（与具体执行引擎无关）
pub mod sync;
pub mod resource;
pub mod dirty;
pub mod command;
pub mod metrics;

use metrics::FrameMetrics;
use resource::{FrameResource, FrameResourcePool, PayloadBuffer};
use sync::{CommandQueue, FenceCounter, FenceValue};

/// 一帧的录制上下文
///
/// 只在 `RenderLoop::run_frame` 的录制回调中存在，
/// 此时槽位已经确认空闲，可以放心写入。
pub struct FrameContext<'a, T> {
    frame_number: u64,
    slot_index: usize,
    previous_fence: FenceValue,
    resources: &'a mut T,
}

impl<T> FrameContext<'_, T> {
    /// 帧号，从 0 开始
    pub fn frame_number(&self) -> u64 {
        self.frame_number
    }

    /// 本帧使用的槽位
    pub fn slot_index(&self) -> usize {
        self.slot_index
    }

    /// 槽位上一次提交时的栅栏值
    pub fn previous_fence(&self) -> FenceValue {
        self.previous_fence
    }

    pub fn resources(&mut self) -> &mut T {
        &mut *self.resources
    }
}

impl<C> FrameContext<'_, FrameResource<C>> {
    pub fn recording_context(&mut self) -> &mut C {
        self.resources.recording_context_mut()
    }

    pub fn payload(&mut self, index: usize) -> Option<&mut PayloadBuffer> {
        self.resources.payload_mut(index)
    }

    /// 同时借用录制上下文和全部数据缓冲区
    pub fn split(&mut self) -> (&mut C, &mut [PayloadBuffer]) {
        self.resources.split_mut()
    }
}

/// 渲染循环
///
/// 持有命令队列和帧资源池。丢弃时会尽力等待执行引擎处理完所有已提交的工作，
/// 保证槽位资源不会在执行引擎仍在读取时被释放。
pub struct RenderLoop<Q: CommandQueue, T, F: FenceCounter> {
    queue: Q,
    pool: FrameResourcePool<T, F>,
    frame_number: u64,
    flush_timeout: Duration,
    shut_down: bool,
}

impl<Q: CommandQueue, T, F: FenceCounter> RenderLoop<Q, T, F> {
    /// 创建渲染循环
    ///
    /// flush 使用与帧资源池相同的等待上限。
    pub fn new(queue: Q, pool: FrameResourcePool<T, F>) -> Self {
        let flush_timeout = pool.wait_timeout();
        Self {
            queue,
            pool,
            frame_number: 0,
            flush_timeout,
            shut_down: false,
        }
    }

    /// 执行一帧
    ///
    /// 获取槽位（可能等待），调用 `record` 录制工作，提交、发出栅栏值并标记槽位。
    /// 返回本帧的栅栏值。
    ///
    /// - `record` 或提交失败时，槽位保持原来的栅栏值
    /// - 提交成功但 Signal 失败时，槽位被标记为消耗掉的栅栏值，
    ///   执行引擎永远不会到达它，之后获取该槽位会超时而不是复用它
    pub fn run_frame<R>(&mut self, record: R) -> Result<FenceValue>
    where
        R: FnOnce(&mut FrameContext<'_, T>) -> Result<Q::Work>,
    {
        let frame_number = self.frame_number;
        let mut slot = self.pool.acquire_next()?;
        let slot_index = slot.index();

        let work = {
            let mut context = FrameContext {
                frame_number,
                slot_index,
                previous_fence: slot.previous_fence_value(),
                resources: slot.resources_mut(),
            };
            record(&mut context)?
        };

        self.queue.submit(work)?;
        let value = slot.signal(&mut self.queue)?;
        slot.release(value)?;

        self.frame_number += 1;
        Ok(value)
    }

    /// 等待执行引擎处理完所有已提交的工作
    pub fn flush(&mut self) -> Result<FenceValue> {
        let value = self.pool.fence_mut().flush(&mut self.queue, self.flush_timeout)?;
        sync_debug!(fence = value.value(), "Command queue flushed");
        Ok(value)
    }

    /// 窗口大小改变等需要重建槽位资源的场景
    ///
    /// 先 flush，再逐个重建。
    pub fn resize<M>(&mut self, rebuild: M) -> Result<()>
    where
        M: FnMut(usize, &mut T) -> Result<()>,
    {
        self.flush()?;
        self.pool.for_each_idle_mut(rebuild)
    }

    /// 显式关闭：flush 后再释放资源
    pub fn shutdown(mut self) -> Result<()> {
        let result = self.flush().map(|_| ());
        self.shut_down = true;
        result
    }

    /// 已完成的帧数
    pub fn frame_number(&self) -> u64 {
        self.frame_number
    }

    pub fn pool(&self) -> &FrameResourcePool<T, F> {
        &self.pool
    }

    pub fn pool_mut(&mut self) -> &mut FrameResourcePool<T, F> {
        &mut self.pool
    }

    pub fn queue(&self) -> &Q {
        &self.queue
    }

    pub fn queue_mut(&mut self) -> &mut Q {
        &mut self.queue
    }

    pub fn metrics(&self) -> &FrameMetrics {
        self.pool.metrics()
    }
}

impl<Q: CommandQueue, T, F: FenceCounter> Drop for RenderLoop<Q, T, F> {
    fn drop(&mut self) {
        if self.shut_down {
            return;
        }
        if let Err(e) = self.pool.wait_until_idle() {
            sync_error!(error = %e, "Failed to wait for GPU idle before releasing frame resources");
        }
    }
}
