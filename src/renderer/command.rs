//! 命令录制模块
//!
//! 每个帧资源持有一个独占的 [`CommandRecorder`]，相当于 DX12 的 CommandAllocator
//! 加上在其上录制的 CommandList。录制器只有在所属帧资源被帧资源池交出之后才能重置，
//! 这一前提由帧资源池的栅栏等待保证。
//!
//! # 状态机
//!
//! ```text
//! Initial ──reset──▶ Recording ──finish──▶ Executable ──reset──▶ Recording
//! ```

use crate::core::error::{DistFrameError, GraphicsError, Result};

/// 录制器状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecorderState {
    /// 从未录制
    Initial,
    /// 正在录制
    Recording,
    /// 已完成录制，内容已交给提交方
    Executable,
}

/// 录制的命令
///
/// 只描述帧资源环关心的数据依赖：命令引用了哪一个槽位里的哪一块数据。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// 绑定槽位中的 pass 常量
    SetPassConstants { payload: usize },
    /// 使用槽位中的物体常量绘制一个物体
    DrawObject { object: usize, payload: usize },
    /// 调试标记
    Marker(String),
}

/// 录制完成、可提交的命令列表
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandList {
    /// 帧号
    pub frame: u64,
    /// 录制所用的帧资源槽位
    pub slot: usize,
    /// 命令
    pub commands: Vec<Command>,
}

/// 命令录制器
#[derive(Debug)]
pub struct CommandRecorder {
    slot: usize,
    state: RecorderState,
    commands: Vec<Command>,
    /// 累计重置次数
    resets: u64,
}

impl CommandRecorder {
    /// 为指定槽位创建录制器
    pub fn new(slot: usize) -> Self {
        Self {
            slot,
            state: RecorderState::Initial,
            commands: Vec::new(),
            resets: 0,
        }
    }

    /// 重置并开始录制
    ///
    /// 丢弃上一次录制的内容。
    pub fn reset(&mut self) {
        self.commands.clear();
        self.state = RecorderState::Recording;
        self.resets += 1;
    }

    /// 录制一条命令
    pub fn record(&mut self, command: Command) -> Result<()> {
        if self.state != RecorderState::Recording {
            return Err(DistFrameError::Graphics(GraphicsError::CommandExecution(format!(
                "Recorder for slot {} is not recording ({:?})",
                self.slot, self.state
            ))));
        }
        self.commands.push(command);
        Ok(())
    }

    /// 结束录制并取出命令列表
    pub fn finish(&mut self, frame: u64) -> Result<CommandList> {
        if self.state != RecorderState::Recording {
            return Err(DistFrameError::Graphics(GraphicsError::CommandExecution(format!(
                "Recorder for slot {} cannot finish from {:?}",
                self.slot, self.state
            ))));
        }
        self.state = RecorderState::Executable;
        Ok(CommandList {
            frame,
            slot: self.slot,
            commands: std::mem::take(&mut self.commands),
        })
    }

    pub fn state(&self) -> RecorderState {
        self.state
    }

    pub fn slot(&self) -> usize {
        self.slot
    }

    pub fn resets(&self) -> u64 {
        self.resets
    }
}
