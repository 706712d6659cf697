//! 帧资源模块
//!
//! 提供每帧独立的资源集合与帧资源池。
//! 借鉴 DistEngine 的 FrameResource 与 UploadBuffer 设计。
//!
//! # 帧资源环
//!
//! 帧资源池持有固定数量（N）的槽位，按轮转顺序交给 CPU 录制。
//! 每个槽位记录最后一次提交时的栅栏值：
//!
//! - 栅栏值为 0 或已完成：`Free`，可以复用
//! - 栅栏值尚未完成：`InFlight`，执行引擎可能仍在读取它的数据
//!
//! [`FrameResourcePool::acquire_next`] 在下一个槽位仍在使用时阻塞等待，
//! 这是唯一的背压点，CPU 因此最多领先执行引擎 N - 1 帧。
//!
//! ```text
//! 帧 F   : CPU 正在写入 slot[F % N]
//! 帧 F-1 : GPU 可能正在读取 slot[(F-1) % N]
//! ...
//! 帧 F-N : 已完成，slot[F % N] 可以复用
//! ```

use std::time::{Duration, Instant};

use bytemuck::Pod;

use crate::core::error::{DistFrameError, GraphicsError, Result, SyncError};
use crate::{sync_debug, sync_error};

use super::metrics::FrameMetrics;
use super::sync::{CommandQueue, FenceCounter, FenceValue};

/// 常量缓冲区对齐要求（字节）
pub const CONSTANT_BUFFER_ALIGNMENT: u64 = 256;

/// 缓冲区使用类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferUsageType {
    /// 常量缓冲区（每个元素按 256 字节对齐）
    Constant,
    /// 结构化缓冲区
    Structured,
}

/// 缓冲区描述信息
#[derive(Debug, Clone)]
pub struct BufferDescriptor {
    /// 单个元素的原始大小（字节）
    pub element_size: u64,
    /// 元素数量
    pub element_count: usize,
    /// 使用类型
    pub usage: BufferUsageType,
    /// 调试名称（可选）
    pub name: Option<String>,
}

impl BufferDescriptor {
    /// 为类型 `T` 创建描述符
    pub fn for_type<T>(element_count: usize, usage: BufferUsageType) -> Self {
        Self {
            element_size: std::mem::size_of::<T>() as u64,
            element_count,
            usage,
            name: None,
        }
    }

    /// 设置调试名称
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// 对齐后的元素步长
    pub fn stride(&self) -> u64 {
        if self.usage == BufferUsageType::Constant {
            (self.element_size + CONSTANT_BUFFER_ALIGNMENT - 1) & !(CONSTANT_BUFFER_ALIGNMENT - 1)
        } else {
            self.element_size
        }
    }

    /// 总大小
    pub fn total_size(&self) -> u64 {
        self.stride() * self.element_count as u64
    }
}

/// 每帧数据缓冲区
///
/// 对应 DistEngine 的 `UploadBuffer<T>`：CPU 每帧写入，GPU 读取。
/// 每个槽位持有自己的一份，不会在槽位之间共享。
#[derive(Debug, Clone)]
pub struct PayloadBuffer {
    descriptor: BufferDescriptor,
    stride: u64,
    data: Vec<u8>,
}

impl PayloadBuffer {
    /// 根据描述符分配缓冲区
    pub fn new(descriptor: BufferDescriptor) -> Result<Self> {
        if descriptor.element_count == 0 || descriptor.element_size == 0 {
            return Err(GraphicsError::ResourceCreation(format!(
                "Payload buffer {:?} must have a non-zero size",
                descriptor.name
            ))
            .into());
        }

        let stride = descriptor.stride();
        let total = usize::try_from(descriptor.total_size()).map_err(|_| {
            GraphicsError::ResourceCreation("Payload buffer too large".to_string())
        })?;

        Ok(Self {
            descriptor,
            stride,
            data: vec![0; total],
        })
    }

    /// 为 `T` 类型的元素分配缓冲区
    pub fn for_type<T: Pod>(element_count: usize, usage: BufferUsageType) -> Result<Self> {
        Self::new(BufferDescriptor::for_type::<T>(element_count, usage))
    }

    pub fn descriptor(&self) -> &BufferDescriptor {
        &self.descriptor
    }

    pub fn element_count(&self) -> usize {
        self.descriptor.element_count
    }

    /// 对齐后的元素步长
    pub fn stride(&self) -> u64 {
        self.stride
    }

    pub fn total_size(&self) -> u64 {
        self.data.len() as u64
    }

    /// 计算元素在缓冲区中的偏移量
    pub fn element_offset(&self, index: usize) -> Option<u64> {
        (index < self.descriptor.element_count).then(|| self.stride * index as u64)
    }

    fn element_range<T>(&self, index: usize) -> Result<std::ops::Range<usize>> {
        let size = std::mem::size_of::<T>();
        if size as u64 > self.stride {
            return Err(DistFrameError::Runtime(format!(
                "Element of {} bytes does not fit stride {} of {:?}",
                size, self.stride, self.descriptor.name
            )));
        }
        let offset = self.element_offset(index).ok_or_else(|| {
            DistFrameError::Runtime(format!(
                "Element {} out of range for {:?} ({} elements)",
                index, self.descriptor.name, self.descriptor.element_count
            ))
        })? as usize;
        Ok(offset..offset + size)
    }

    /// 写入一个元素
    pub fn copy_data<T: Pod>(&mut self, index: usize, value: &T) -> Result<()> {
        let range = self.element_range::<T>(index)?;
        self.data[range].copy_from_slice(bytemuck::bytes_of(value));
        Ok(())
    }

    /// 读取一个元素
    pub fn read<T: Pod>(&self, index: usize) -> Result<T> {
        let range = self.element_range::<T>(index)?;
        Ok(bytemuck::pod_read_unaligned(&self.data[range]))
    }

    /// 原始字节
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }
}

/// 帧资源
///
/// 一个槽位的内容：独占的录制上下文加上按顺序排列的每帧数据缓冲区。
#[derive(Debug)]
pub struct FrameResource<C> {
    recording: C,
    payloads: Vec<PayloadBuffer>,
}

impl<C> FrameResource<C> {
    pub fn new(recording: C, payloads: Vec<PayloadBuffer>) -> Self {
        Self { recording, payloads }
    }

    pub fn recording_context(&self) -> &C {
        &self.recording
    }

    pub fn recording_context_mut(&mut self) -> &mut C {
        &mut self.recording
    }

    pub fn payload(&self, index: usize) -> Option<&PayloadBuffer> {
        self.payloads.get(index)
    }

    pub fn payload_mut(&mut self, index: usize) -> Option<&mut PayloadBuffer> {
        self.payloads.get_mut(index)
    }

    pub fn payload_count(&self) -> usize {
        self.payloads.len()
    }

    /// 同时借用录制上下文和全部数据缓冲区
    pub fn split_mut(&mut self) -> (&mut C, &mut [PayloadBuffer]) {
        (&mut self.recording, &mut self.payloads)
    }
}

/// 槽位状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    /// 可以复用
    Free,
    /// 执行引擎可能仍在使用
    InFlight,
}

/// 帧资源槽位
#[derive(Debug)]
pub struct FrameSlot<T> {
    index: usize,
    resources: T,
    /// 最后一次提交时的栅栏值，0 表示从未提交
    fence_value: FenceValue,
}

impl<T> FrameSlot<T> {
    fn new(index: usize, resources: T) -> Self {
        Self {
            index,
            resources,
            fence_value: FenceValue::NONE,
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn resources(&self) -> &T {
        &self.resources
    }

    pub fn fence_value(&self) -> FenceValue {
        self.fence_value
    }

    /// 在已完成值为 `completed` 时的状态
    pub fn state(&self, completed: FenceValue) -> SlotState {
        if self.fence_value.is_none() || self.fence_value <= completed {
            SlotState::Free
        } else {
            SlotState::InFlight
        }
    }

    /// 记录提交时的栅栏值
    ///
    /// 返回 `false` 表示与当前值相同，未做修改。
    fn stamp(&mut self, value: FenceValue, issued: FenceValue) -> Result<bool> {
        if value < self.fence_value {
            sync_error!(
                slot = self.index,
                current = self.fence_value.value(),
                attempted = value.value(),
                "Frame resource released with a stale fence value"
            );
            return Err(SyncError::StaleRelease {
                slot: self.index,
                current: self.fence_value.value(),
                attempted: value.value(),
            }
            .into());
        }

        if value == self.fence_value && !value.is_none() {
            return Ok(false);
        }

        if value.is_none() || value > issued {
            sync_error!(
                slot = self.index,
                fence = value.value(),
                issued = issued.value(),
                "Frame resource released with a fence value that was never signaled"
            );
            return Err(SyncError::UnissuedFenceValue {
                slot: self.index,
                value: value.value(),
                issued: issued.value(),
            }
            .into());
        }

        self.fence_value = value;
        Ok(true)
    }
}

/// 已获取的槽位
///
/// 持有槽位的独占访问权，直到调用 [`SlotHandle::release`] 或被丢弃。
pub struct SlotHandle<'a, T, F: FenceCounter> {
    slot: &'a mut FrameSlot<T>,
    fence: &'a mut F,
    signaled: Option<FenceValue>,
    released: bool,
}

impl<'a, T, F: FenceCounter> SlotHandle<'a, T, F> {
    /// 槽位索引
    pub fn index(&self) -> usize {
        self.slot.index
    }

    pub fn resources(&self) -> &T {
        &self.slot.resources
    }

    pub fn resources_mut(&mut self) -> &mut T {
        &mut self.slot.resources
    }

    /// 槽位上一次提交时的栅栏值（此时已经完成）
    pub fn previous_fence_value(&self) -> FenceValue {
        self.slot.fence_value
    }

    /// 通过 `queue` 为本次提交发出栅栏值
    ///
    /// 必须在提交录制好的工作之后调用。
    /// Signal 失败时，已经提交的工作可能仍会读取这个槽位，
    /// 因此槽位会被标记为本次消耗掉的栅栏值，之后获取它只会等待或超时。
    pub fn signal<Q>(&mut self, queue: &mut Q) -> Result<FenceValue>
    where
        Q: CommandQueue + ?Sized,
    {
        match self.fence.signal(queue) {
            Ok(value) => {
                self.signaled = Some(value);
                Ok(value)
            }
            Err(e) => {
                let consumed = self.fence.last_signaled();
                if consumed > self.slot.fence_value {
                    self.slot.fence_value = consumed;
                }
                // 槽位已经标记，不再需要 release
                self.released = true;
                sync_error!(
                    slot = self.slot.index,
                    fence = consumed.value(),
                    error = %e,
                    "Signal failed after submission, frame resource kept in flight"
                );
                Err(e)
            }
        }
    }

    /// 用本次提交的栅栏值标记槽位，交还给帧资源池
    ///
    /// 调用过 [`SlotHandle::signal`] 时只接受它返回的值。
    pub fn release(mut self, value: FenceValue) -> Result<()> {
        if let Some(signaled) = self.signaled {
            if value != signaled {
                sync_error!(
                    slot = self.slot.index,
                    signaled = signaled.value(),
                    attempted = value.value(),
                    "Frame resource released with a fence value from another submission"
                );
                return Err(SyncError::MismatchedRelease {
                    slot: self.slot.index,
                    signaled: signaled.value(),
                    attempted: value.value(),
                }
                .into());
            }
        }

        let issued = self.fence.last_signaled();
        self.slot.stamp(value, issued)?;
        self.released = true;
        sync_debug!(slot = self.slot.index, fence = value.value(), "Frame resource released");
        Ok(())
    }
}

impl<C, F: FenceCounter> SlotHandle<'_, FrameResource<C>, F> {
    /// 槽位独占的录制上下文
    pub fn recording_context(&mut self) -> &mut C {
        self.slot.resources.recording_context_mut()
    }

    /// 第 `index` 个每帧数据缓冲区
    pub fn payload(&mut self, index: usize) -> Option<&mut PayloadBuffer> {
        self.slot.resources.payload_mut(index)
    }
}

impl<T, F: FenceCounter> Drop for SlotHandle<'_, T, F> {
    fn drop(&mut self) {
        if let (Some(value), false) = (self.signaled, self.released) {
            sync_error!(
                slot = self.slot.index,
                fence = value.value(),
                "Frame resource signaled but never released"
            );
        }
    }
}

/// 帧资源池
///
/// 管理 N 个帧资源槽位的轮转使用，N 在创建时固定。
/// N = 1 时每一帧都要等待上一帧完成，相当于每帧 flush。
pub struct FrameResourcePool<T, F: FenceCounter> {
    slots: Vec<FrameSlot<T>>,
    /// 最近交出的槽位
    cursor: usize,
    fence: F,
    wait_timeout: Duration,
    metrics: FrameMetrics,
}

impl<T, F: FenceCounter> FrameResourcePool<T, F> {
    /// 创建新的帧资源池
    ///
    /// # 参数
    ///
    /// * `resources` - 每个槽位的资源，数量即 N
    /// * `fence` - 栅栏计数器
    /// * `wait_timeout` - 单次等待的上限
    pub fn new(resources: Vec<T>, fence: F, wait_timeout: Duration) -> Result<Self> {
        if resources.is_empty() {
            return Err(GraphicsError::ResourceCreation(
                "At least one frame resource is required".to_string(),
            )
            .into());
        }

        let slots: Vec<_> = resources
            .into_iter()
            .enumerate()
            .map(|(index, resources)| FrameSlot::new(index, resources))
            .collect();

        sync_debug!(count = slots.len(), ?wait_timeout, "Frame resource pool created");

        Ok(Self {
            // 第一次获取得到槽位 0
            cursor: slots.len() - 1,
            slots,
            fence,
            wait_timeout,
            metrics: FrameMetrics::new(),
        })
    }

    /// 逐个创建 `count` 个槽位的资源，任何一个失败都会中止创建
    pub fn from_fn<B>(count: usize, fence: F, wait_timeout: Duration, mut build: B) -> Result<Self>
    where
        B: FnMut(usize) -> Result<T>,
    {
        let resources = (0..count).map(&mut build).collect::<Result<Vec<_>>>()?;
        Self::new(resources, fence, wait_timeout)
    }

    /// 获取下一个槽位
    ///
    /// 如果该槽位上一次提交的工作尚未完成，阻塞等待直到完成或超时。
    /// 等待失败时游标保持不变，重试会再次等待同一个槽位。
    pub fn acquire_next(&mut self) -> Result<SlotHandle<'_, T, F>> {
        let previous_cursor = self.cursor;
        self.cursor = (self.cursor + 1) % self.slots.len();
        let index = self.cursor;
        let pending = self.slots[index].fence_value;

        if let Err(e) = self.wait_for_slot(index, pending) {
            self.cursor = previous_cursor;
            return Err(e);
        }

        self.metrics.record_acquire();

        Ok(SlotHandle {
            slot: &mut self.slots[index],
            fence: &mut self.fence,
            signaled: None,
            released: false,
        })
    }

    fn wait_for_slot(&mut self, index: usize, pending: FenceValue) -> Result<()> {
        if pending.is_none() {
            return Ok(());
        }

        let completed = self.fence.completed_value()?;
        if completed >= pending {
            return Ok(());
        }

        sync_debug!(
            slot = index,
            fence = pending.value(),
            completed = completed.value(),
            "Waiting for GPU (frame resource in use)"
        );

        let start = Instant::now();
        let result = self.fence.wait_until(pending, self.wait_timeout);
        let waited = start.elapsed();
        self.metrics.record_wait(waited);

        if result.is_ok() {
            sync_debug!(slot = index, ?waited, "GPU wait completed");
        }
        result
    }

    /// 用提交时的栅栏值标记槽位
    ///
    /// 与当前值相同时不做任何修改；小于当前值或从未发出的值会返回错误。
    pub fn release(&mut self, slot: usize, value: FenceValue) -> Result<()> {
        let count = self.slots.len();
        let issued = self.fence.last_signaled();
        let slot = self
            .slots
            .get_mut(slot)
            .ok_or(SyncError::InvalidSlot { slot, count })?;

        if slot.stamp(value, issued)? {
            sync_debug!(slot = slot.index, fence = value.value(), "Frame resource released");
        }
        Ok(())
    }

    /// 槽位数量（N）
    pub fn frame_count(&self) -> usize {
        self.slots.len()
    }

    /// 最近交出的槽位索引
    pub fn current_index(&self) -> usize {
        self.cursor
    }

    /// 根据索引获取槽位
    pub fn get(&self, index: usize) -> Option<&FrameSlot<T>> {
        self.slots.get(index)
    }

    /// 槽位当前状态
    pub fn slot_state(&self, index: usize) -> Result<SlotState> {
        let count = self.slots.len();
        let slot = self
            .slots
            .get(index)
            .ok_or(SyncError::InvalidSlot { slot: index, count })?;
        Ok(slot.state(self.fence.completed_value()?))
    }

    /// 执行引擎可能仍在使用的槽位数量
    pub fn in_flight_count(&self) -> Result<usize> {
        let completed = self.fence.completed_value()?;
        Ok(self
            .slots
            .iter()
            .filter(|slot| slot.state(completed) == SlotState::InFlight)
            .count())
    }

    /// 等待所有槽位上已提交的工作完成
    pub fn wait_until_idle(&self) -> Result<()> {
        let newest = self
            .slots
            .iter()
            .map(|slot| slot.fence_value)
            .max()
            .unwrap_or(FenceValue::NONE);
        self.fence.wait_until(newest, self.wait_timeout)
    }

    /// 在所有槽位都空闲时逐个修改资源（例如窗口大小改变后重建）
    pub fn for_each_idle_mut<M>(&mut self, mut modify: M) -> Result<()>
    where
        M: FnMut(usize, &mut T) -> Result<()>,
    {
        let in_flight = self.in_flight_count()?;
        if in_flight > 0 {
            return Err(DistFrameError::Runtime(format!(
                "Cannot modify frame resources while {} are in flight",
                in_flight
            )));
        }

        for slot in &mut self.slots {
            modify(slot.index, &mut slot.resources)?;
        }
        Ok(())
    }

    pub fn fence(&self) -> &F {
        &self.fence
    }

    pub fn fence_mut(&mut self) -> &mut F {
        &mut self.fence
    }

    pub fn wait_timeout(&self) -> Duration {
        self.wait_timeout
    }

    pub fn metrics(&self) -> &FrameMetrics {
        &self.metrics
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfx::software::{ManualQueue, SoftwareFence};
    use crate::renderer::sync::{DeviceFence, FenceManager};
    use std::sync::Arc;

    type TestPool = FrameResourcePool<usize, FenceManager<Arc<SoftwareFence>>>;

    fn pool(count: usize, timeout: Duration) -> (TestPool, ManualQueue<usize>) {
        let fence = SoftwareFence::shared();
        let queue = ManualQueue::new(fence.clone());
        let pool = FrameResourcePool::new((0..count).collect(), FenceManager::new(fence), timeout)
            .unwrap();
        (pool, queue)
    }

    /// 提交一帧：获取槽位、提交、signal、release
    fn submit_frame(pool: &mut TestPool, queue: &mut ManualQueue<usize>) -> Result<(usize, FenceValue)> {
        let mut slot = pool.acquire_next()?;
        let index = slot.index();
        queue.submit(index)?;
        let value = slot.signal(queue)?;
        slot.release(value)?;
        Ok((index, value))
    }

    #[test]
    fn test_buffer_descriptor_alignment() {
        let desc = BufferDescriptor {
            element_size: 100,
            element_count: 1,
            usage: BufferUsageType::Constant,
            name: None,
        };
        assert_eq!(desc.stride(), 256);

        let desc2 = BufferDescriptor { element_size: 300, ..desc.clone() };
        assert_eq!(desc2.stride(), 512);

        let desc3 = BufferDescriptor { usage: BufferUsageType::Structured, ..desc };
        assert_eq!(desc3.stride(), 100);
    }

    #[test]
    fn test_payload_buffer_roundtrip() {
        let mut buffer = PayloadBuffer::for_type::<[f32; 4]>(10, BufferUsageType::Constant).unwrap();
        assert_eq!(buffer.stride(), 256);
        assert_eq!(buffer.total_size(), 2560);
        assert_eq!(buffer.element_offset(3), Some(768));
        assert_eq!(buffer.element_offset(10), None);

        buffer.copy_data(3, &[1.0f32, 2.0, 3.0, 4.0]).unwrap();
        assert_eq!(buffer.read::<[f32; 4]>(3).unwrap(), [1.0, 2.0, 3.0, 4.0]);
        assert_eq!(buffer.read::<[f32; 4]>(2).unwrap(), [0.0; 4]);

        assert!(buffer.copy_data(10, &[0.0f32; 4]).is_err());
        // 超过步长的元素放不下
        assert!(buffer.copy_data(0, &[0u8; 512]).is_err());
    }

    #[test]
    fn test_payload_buffer_requires_size() {
        assert!(PayloadBuffer::for_type::<u32>(0, BufferUsageType::Structured).is_err());
    }

    #[test]
    fn test_empty_pool_is_rejected() {
        let fence = SoftwareFence::shared();
        let result = FrameResourcePool::<u32, _>::new(Vec::new(), FenceManager::new(fence), Duration::from_millis(10));
        assert!(matches!(
            result,
            Err(DistFrameError::Graphics(GraphicsError::ResourceCreation(_)))
        ));
    }

    #[test]
    fn test_from_fn_propagates_creation_failure() {
        let fence = SoftwareFence::shared();
        let result = FrameResourcePool::from_fn(3, FenceManager::new(fence), Duration::from_millis(10), |i| {
            if i == 2 {
                Err(GraphicsError::ResourceCreation("allocator".to_string()).into())
            } else {
                Ok(i)
            }
        });
        assert!(result.is_err());
    }

    #[test]
    fn test_round_robin_order() {
        for count in 1..=4 {
            let fence = SoftwareFence::shared();
            let mut queue = ManualQueue::<usize>::immediate(fence.clone());
            let mut pool = FrameResourcePool::new(
                (0..count).collect::<Vec<_>>(),
                FenceManager::new(fence),
                Duration::from_millis(100),
            )
            .unwrap();

            let mut visits = Vec::new();
            for _ in 0..2 * count {
                let mut slot = pool.acquire_next().unwrap();
                visits.push(slot.index());
                let value = slot.signal(&mut queue).unwrap();
                slot.release(value).unwrap();
            }

            let expected: Vec<usize> = (0..count).chain(0..count).collect();
            assert_eq!(visits, expected, "N = {}", count);
        }
    }

    #[test]
    fn test_infinitely_fast_engine_never_blocks() {
        let fence = SoftwareFence::shared();
        let mut queue = ManualQueue::<usize>::immediate(fence.clone());
        let mut pool = FrameResourcePool::new(vec![0, 1], FenceManager::new(fence), Duration::from_millis(100)).unwrap();

        for _ in 0..100 {
            let mut slot = pool.acquire_next().unwrap();
            let value = slot.signal(&mut queue).unwrap();
            slot.release(value).unwrap();
        }

        assert_eq!(pool.metrics().acquired(), 100);
        assert_eq!(pool.metrics().stalls(), 0);
    }

    #[test]
    fn test_in_flight_never_exceeds_n_minus_one() {
        for count in 1..=4 {
            let (mut pool, mut queue) = pool(count, Duration::from_millis(5));

            for frame in 0..24 {
                // 引擎每三帧只完成到倒数第二个 Signal
                if frame % 3 == 0 {
                    queue.complete_signals(queue.signaled().len().saturating_sub(1));
                }

                let mut slot = match pool.acquire_next() {
                    Ok(slot) => slot,
                    Err(e) => {
                        // 引擎追上之后下一帧再获取
                        assert!(e.is_timeout());
                        queue.complete_all();
                        continue;
                    }
                };

                // 开始录制时，尚未完成的提交最多 N - 1 个
                let completed = queue.fence().completed_value();
                let outstanding = queue.signaled().iter().filter(|&&v| v > completed).count();
                assert!(outstanding < count, "N = {}, outstanding = {}", count, outstanding);

                let index = slot.index();
                queue.submit(index).unwrap();
                let value = slot.signal(&mut queue).unwrap();
                slot.release(value).unwrap();
            }
        }
    }

    #[test]
    fn test_in_flight_bound_at_acquire() {
        let count = 3;
        let (mut pool, mut queue) = pool(count, Duration::from_millis(20));

        for _ in 0..count {
            submit_frame(&mut pool, &mut queue).unwrap();
        }
        assert_eq!(pool.in_flight_count().unwrap(), count);

        // 引擎完成最早的一帧，下一次获取无需等待
        queue.complete_signals(1);
        {
            let slot = pool.acquire_next().unwrap();
            assert_eq!(slot.index(), 0);
        }
        assert_eq!(pool.in_flight_count().unwrap(), count - 1);
        assert_eq!(pool.slot_state(0).unwrap(), SlotState::Free);
        assert_eq!(pool.slot_state(1).unwrap(), SlotState::InFlight);
    }

    #[test]
    fn test_acquire_blocks_until_slot_completes() {
        let fence = SoftwareFence::shared();
        let mut queue = ManualQueue::<usize>::new(fence.clone());
        let mut pool = FrameResourcePool::new(vec![0, 1], FenceManager::new(fence.clone()), Duration::from_secs(5)).unwrap();

        submit_frame(&mut pool, &mut queue).unwrap();
        submit_frame(&mut pool, &mut queue).unwrap();

        let background = fence.clone();
        let handle = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(30));
            background.complete_to(1);
        });

        let start = Instant::now();
        let slot = pool.acquire_next().unwrap();
        assert_eq!(slot.index(), 0);
        drop(slot);
        handle.join().unwrap();

        assert!(start.elapsed() >= Duration::from_millis(20));
        assert_eq!(pool.metrics().stalls(), 1);
    }

    #[test]
    fn test_timeout_keeps_cursor() {
        let (mut pool, mut queue) = pool(2, Duration::from_millis(20));
        submit_frame(&mut pool, &mut queue).unwrap();
        submit_frame(&mut pool, &mut queue).unwrap();
        assert_eq!(pool.current_index(), 1);

        let err = pool.acquire_next().err().unwrap();
        assert!(err.is_timeout());
        assert_eq!(pool.current_index(), 1);

        // 引擎恢复后重试得到同一个槽位
        queue.complete_all();
        let slot = pool.acquire_next().unwrap();
        assert_eq!(slot.index(), 0);
    }

    #[test]
    fn test_single_slot_serializes() {
        let (mut pool, mut queue) = pool(1, Duration::from_millis(20));
        let (index, value) = submit_frame(&mut pool, &mut queue).unwrap();
        assert_eq!((index, value), (0, FenceValue::new(1)));

        // 上一帧未完成时不能开始录制下一帧
        assert!(pool.acquire_next().err().unwrap().is_timeout());

        queue.complete_all();
        let (index, value) = submit_frame(&mut pool, &mut queue).unwrap();
        assert_eq!((index, value), (0, FenceValue::new(2)));
    }

    #[test]
    fn test_release_same_value_is_noop() {
        let (mut pool, mut queue) = pool(2, Duration::from_millis(20));
        let (index, value) = submit_frame(&mut pool, &mut queue).unwrap();

        pool.release(index, value).unwrap();
        assert_eq!(pool.get(index).unwrap().fence_value(), value);
    }

    #[test]
    fn test_release_older_value_is_rejected() {
        let (mut pool, mut queue) = pool(2, Duration::from_millis(20));
        submit_frame(&mut pool, &mut queue).unwrap();
        let (index, value) = submit_frame(&mut pool, &mut queue).unwrap();
        assert_eq!(value, FenceValue::new(2));

        let err = pool.release(index, FenceValue::new(1)).unwrap_err();
        assert!(matches!(
            err,
            DistFrameError::Sync(SyncError::StaleRelease { slot: 1, current: 2, attempted: 1 })
        ));
        assert_eq!(pool.get(index).unwrap().fence_value(), value);
    }

    #[test]
    fn test_release_value_from_another_submission_is_rejected() {
        let (mut pool, mut queue) = pool(2, Duration::from_millis(20));
        let (_, first) = submit_frame(&mut pool, &mut queue).unwrap();

        {
            let mut slot = pool.acquire_next().unwrap();
            queue.submit(slot.index()).unwrap();
            let second = slot.signal(&mut queue).unwrap();
            assert_eq!(second, FenceValue::new(2));

            let err = slot.release(first).unwrap_err();
            assert!(matches!(
                err,
                DistFrameError::Sync(SyncError::MismatchedRelease { slot: 1, signaled: 2, attempted: 1 })
            ));
            assert!(err.is_fatal());
        }

        // 槽位没有被错误的值标记，引擎完成 1 之后也不会被当作空闲
        assert_eq!(pool.get(1).unwrap().fence_value(), FenceValue::NONE);
        queue.complete_signals(1);
        assert_eq!(pool.slot_state(0).unwrap(), SlotState::Free);
        pool.release(1, FenceValue::new(2)).unwrap();
        assert_eq!(pool.slot_state(1).unwrap(), SlotState::InFlight);
    }

    #[test]
    fn test_release_unissued_value_is_rejected() {
        let (mut pool, mut queue) = pool(2, Duration::from_millis(20));
        submit_frame(&mut pool, &mut queue).unwrap();

        assert!(matches!(
            pool.release(1, FenceValue::new(5)),
            Err(DistFrameError::Sync(SyncError::UnissuedFenceValue { .. }))
        ));
        assert!(matches!(
            pool.release(1, FenceValue::NONE),
            Err(DistFrameError::Sync(SyncError::UnissuedFenceValue { .. }))
        ));
        assert!(matches!(
            pool.release(7, FenceValue::new(1)),
            Err(DistFrameError::Sync(SyncError::InvalidSlot { slot: 7, count: 2 }))
        ));
    }

    #[test]
    fn test_frame_resource_accessors() {
        let fence = SoftwareFence::shared();
        let mut queue = ManualQueue::<()>::immediate(fence.clone());
        let mut pool = FrameResourcePool::from_fn(2, FenceManager::new(fence), Duration::from_millis(20), |i| {
            Ok(FrameResource::new(
                format!("allocator {}", i),
                vec![PayloadBuffer::for_type::<u32>(4, BufferUsageType::Structured)?],
            ))
        })
        .unwrap();

        let mut slot = pool.acquire_next().unwrap();
        assert_eq!(slot.recording_context().as_str(), "allocator 0");
        slot.payload(0).unwrap().copy_data(2, &42u32).unwrap();
        assert!(slot.payload(1).is_none());
        let value = slot.signal(&mut queue).unwrap();
        slot.release(value).unwrap();

        let stored = pool.get(0).unwrap().resources().payload(0).unwrap();
        assert_eq!(stored.read::<u32>(2).unwrap(), 42);
        assert_eq!(pool.get(1).unwrap().resources().payload(0).unwrap().read::<u32>(2).unwrap(), 0);
    }

    #[test]
    fn test_wait_idle_and_rebuild() {
        let (mut pool, mut queue) = pool(3, Duration::from_millis(20));
        for _ in 0..3 {
            submit_frame(&mut pool, &mut queue).unwrap();
        }

        assert!(pool.for_each_idle_mut(|_, value| {
            *value += 10;
            Ok(())
        })
        .is_err());
        assert!(pool.wait_until_idle().unwrap_err().is_timeout());

        queue.complete_all();
        pool.wait_until_idle().unwrap();
        pool.for_each_idle_mut(|_, value| {
            *value += 10;
            Ok(())
        })
        .unwrap();
        assert_eq!(*pool.get(2).unwrap().resources(), 12);
    }
}
