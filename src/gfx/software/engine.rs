//! 软件执行引擎
//!
//! 在独立线程上按 FIFO 顺序消费提交的工作和 Signal 请求，
//! 以模拟一个异步运行的 GPU 命令队列。工作的实际"执行"由调用方提供的执行器完成。

use std::collections::VecDeque;
use std::sync::Arc;
use std::thread::JoinHandle;

use parking_lot::{Condvar, Mutex};
use tracing::{debug, trace, warn};

use crate::core::error::{GraphicsError, Result};
use crate::renderer::sync::{CommandQueue, FenceValue};

use super::fence::SoftwareFence;

enum Packet<W> {
    Work(W),
    Signal(u64),
}

struct EngineState<W> {
    packets: VecDeque<Packet<W>>,
    paused: bool,
    shutdown: bool,
}

struct Shared<W> {
    state: Mutex<EngineState<W>>,
    wake: Condvar,
}

/// 软件命令队列
///
/// `Signal(v)` 与工作共享同一个 FIFO，因此 v 完成时之前提交的工作一定已经执行完。
pub struct SoftwareQueue<W: Send + 'static> {
    shared: Arc<Shared<W>>,
    fence: Arc<SoftwareFence>,
    worker: Option<JoinHandle<()>>,
}

impl<W: Send + 'static> SoftwareQueue<W> {
    /// 启动执行引擎线程
    ///
    /// `executor` 在引擎线程上按提交顺序处理每一份工作。
    pub fn new<E>(executor: E) -> Result<Self>
    where
        E: FnMut(W) + Send + 'static,
    {
        let shared = Arc::new(Shared {
            state: Mutex::new(EngineState {
                packets: VecDeque::new(),
                paused: false,
                shutdown: false,
            }),
            wake: Condvar::new(),
        });
        let fence = SoftwareFence::shared();

        let worker = {
            let shared = Arc::clone(&shared);
            let fence = Arc::clone(&fence);
            std::thread::Builder::new()
                .name("software-engine".to_string())
                .spawn(move || run_engine(shared, fence, executor))
                .map_err(|e| {
                    GraphicsError::ResourceCreation(format!("Failed to start software engine: {}", e))
                })?
        };

        debug!("Software engine started");

        Ok(Self {
            shared,
            fence,
            worker: Some(worker),
        })
    }

    /// 引擎推进的栅栏
    pub fn fence(&self) -> Arc<SoftwareFence> {
        Arc::clone(&self.fence)
    }

    /// 暂停消费，模拟 GPU 卡住
    pub fn pause(&self) {
        self.shared.state.lock().paused = true;
    }

    /// 恢复消费
    pub fn resume(&self) {
        self.shared.state.lock().paused = false;
        self.shared.wake.notify_all();
    }

    /// 模拟设备丢失：丢弃尚未执行的工作，栅栏不再推进
    pub fn lose_device(&self) {
        let dropped = {
            let mut state = self.shared.state.lock();
            let dropped = state.packets.len();
            state.packets.clear();
            dropped
        };
        self.fence.remove_device();
        warn!(dropped, "Software engine device lost");
    }

    /// 队列中尚未处理的包数量
    pub fn pending(&self) -> usize {
        self.shared.state.lock().packets.len()
    }

    fn push(&self, packet: Packet<W>) -> Result<()> {
        if self.fence.is_device_removed() {
            return Err(GraphicsError::CommandExecution("Device removed".to_string()).into());
        }
        self.shared.state.lock().packets.push_back(packet);
        self.shared.wake.notify_one();
        Ok(())
    }
}

impl<W: Send + 'static> CommandQueue for SoftwareQueue<W> {
    type Work = W;

    fn submit(&mut self, work: W) -> Result<()> {
        self.push(Packet::Work(work))
    }

    fn signal(&mut self, value: FenceValue) -> Result<()> {
        self.push(Packet::Signal(value.value()))
    }
}

impl<W: Send + 'static> Drop for SoftwareQueue<W> {
    fn drop(&mut self) {
        self.shared.state.lock().shutdown = true;
        self.shared.wake.notify_all();

        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!("Software engine thread panicked");
            }
        }
        debug!("Software engine stopped");
    }
}

fn run_engine<W, E>(shared: Arc<Shared<W>>, fence: Arc<SoftwareFence>, mut executor: E)
where
    E: FnMut(W),
{
    loop {
        let packet = {
            let mut state = shared.state.lock();
            loop {
                if state.shutdown {
                    return;
                }
                if !state.paused {
                    if let Some(packet) = state.packets.pop_front() {
                        break packet;
                    }
                }
                shared.wake.wait(&mut state);
            }
        };

        match packet {
            Packet::Work(work) => executor(work),
            Packet::Signal(value) => {
                // 执行期间可能已经发生设备丢失
                if fence.is_device_removed() {
                    continue;
                }
                trace!(fence = value, "Software engine reached signal");
                fence.complete_to(value);
            }
        }
    }
}
