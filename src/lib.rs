//! DistFrame - 帧资源环与 CPU/GPU 栅栏同步
//!
//! DistFrame 让 CPU 在录制第 F 帧的同时，执行引擎异步地处理之前的帧，
//! 又保证任何一个槽位的资源不会在执行引擎读取时被 CPU 覆盖。
//!
//! # 模块结构
//!
//! - `core`: 核心功能模块（日志、配置、错误处理）
//! - `renderer`: 帧资源池、栅栏计数器、脏标记传播和渲染循环
//! - `gfx`: 执行引擎后端（软件模拟）
//! - `scene`: 演示场景
//!
//! # 使用示例
//!
//! ```no_run
//! use std::time::Duration;
//! use dist_frame::gfx::software::SoftwareQueue;
//! use dist_frame::renderer::resource::FrameResourcePool;
//! use dist_frame::renderer::sync::FenceManager;
//! use dist_frame::renderer::RenderLoop;
//!
//! let queue = SoftwareQueue::new(|_: usize| {})?;
//! let fences = FenceManager::new(queue.fence());
//! let pool = FrameResourcePool::new(vec![(); 3], fences, Duration::from_secs(2))?;
//! let mut render_loop = RenderLoop::new(queue, pool);
//!
//! for _ in 0..10 {
//!     render_loop.run_frame(|frame| Ok(frame.slot_index()))?;
//! }
//! render_loop.shutdown()?;
//! # Ok::<(), dist_frame::core::DistFrameError>(())
//! ```

pub mod core;
pub mod gfx;
pub mod renderer;
pub mod scene;
