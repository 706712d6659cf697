//! DistFrame - 帧资源环演示程序
//!
//! 在软件执行引擎上运行演示场景：CPU 录制第 F 帧的同时，
//! 执行引擎在独立线程上处理之前的帧。
//!
//! # 使用方法
//!
//! ```bash
//! # 使用配置文件
//! cargo run
//!
//! # 双缓冲、GPU 每帧 16ms（命令行覆盖）
//! cargo run -- --frame-count 2 --gpu-ms 16
//! ```
//!
//! # 架构概览
//!
//! ```text
//! ┌─────────────┐
//! │   main.rs   │  应用程序入口
//! └──────┬──────┘
//!        │
//! ┌──────▼──────┐
//! │ RenderLoop  │  acquire → record → submit → signal → release
//! └──────┬──────┘
//!        │
//!   ┌────┴─────┐
//!   │          │
//! ┌─▼───┐  ┌───▼────┐
//! │ Pool│  │ Engine │  帧资源池 / 软件执行引擎
//! └─────┘  └────────┘
//! ```

use std::time::Instant;

use anyhow::Context;
use tracing::{debug, error, info, trace, warn};

use dist_frame::core::{log, Config};
use dist_frame::gfx::software::SoftwareQueue;
use dist_frame::renderer::command::CommandList;
use dist_frame::renderer::resource::FrameResourcePool;
use dist_frame::renderer::sync::FenceManager;
use dist_frame::renderer::RenderLoop;
use dist_frame::scene::DemoScene;

/// 每隔多少帧输出一次统计
const METRICS_INTERVAL: u64 = 60;

/// 应用程序入口点
///
/// # 初始化流程
///
/// 1. 加载配置文件（config.toml）
/// 2. 应用命令行参数覆盖
/// 3. 初始化日志系统
/// 4. 启动软件执行引擎并创建帧资源池
/// 5. 运行指定数量的帧
/// 6. flush 后退出
///
/// # 命令行参数
///
/// - `--frames <value>`: 运行的帧数
/// - `--frame-count <value>`: 帧资源数量 N
/// - `--timeout-ms <value>`: 栅栏等待上限
/// - `--gpu-ms <value>`: 模拟执行引擎每帧耗时
fn main() {
    // 1. 加载配置（在初始化日志之前）
    let mut config = Config::from_file_or_default("config.toml");

    // 2. 应用命令行参数
    config.apply_args(std::env::args());

    // 3. 验证配置
    if let Err(e) = config.validate() {
        eprintln!("Invalid configuration: {}", e);
        std::process::exit(1);
    }

    // 4. 初始化日志系统
    let log_file = config
        .logging
        .file_output
        .then(|| config.logging.log_file.as_str());
    log::init_logger(config.logging.level, config.logging.file_output, log_file);
    info!("DistFrame starting...");
    info!(version = env!("CARGO_PKG_VERSION"), "Application initialized");

    if let Err(e) = run(&config) {
        error!("{:#}", e);
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run(config: &Config) -> anyhow::Result<()> {
    let frame_count = config.frames.frame_count;
    let wait_timeout = config.frames.wait_timeout();
    let gpu_frame_time = config.engine.gpu_frame_time();
    let cpu_frame_time = config.engine.cpu_frame_time();

    info!(
        frame_count,
        wait_timeout_ms = config.frames.wait_timeout_ms,
        gpu_frame_ms = config.engine.gpu_frame_ms,
        cpu_frame_ms = config.engine.cpu_frame_ms,
        "Frame ring configuration"
    );

    // 5. 启动执行引擎
    let queue = SoftwareQueue::new(move |list: CommandList| {
        std::thread::sleep(gpu_frame_time);
        trace!(
            frame = list.frame,
            slot = list.slot,
            commands = list.commands.len(),
            "Command list executed"
        );
    })
    .context("Failed to start execution engine")?;

    // 6. 创建场景和帧资源池
    let mut scene = DemoScene::new(&config.scene, frame_count).context("Failed to create demo scene")?;
    let fences = FenceManager::new(queue.fence());
    let pool = FrameResourcePool::from_fn(frame_count, fences, wait_timeout, |slot| {
        scene.create_frame_resource(slot)
    })
    .context("Failed to create frame resources")?;
    let mut render_loop = RenderLoop::new(queue, pool);

    info!(
        objects = scene.object_count(),
        frames = config.scene.frames_to_run,
        "Entering frame loop..."
    );

    // 7. 帧循环
    let start = Instant::now();
    let mut last_frame = Instant::now();
    let mut last_updated = None;

    while render_loop.frame_number() < config.scene.frames_to_run {
        let frame = render_loop.frame_number();
        let now = Instant::now();
        let delta_time = now.duration_since(last_frame).as_secs_f32();
        last_frame = now;

        // 超时重试同一帧时不重复更新
        if last_updated != Some(frame) {
            scene.update(frame, delta_time);
            last_updated = Some(frame);
        }

        let result = render_loop.run_frame(|context| {
            std::thread::sleep(cpu_frame_time);
            scene.record(context, delta_time)
        });

        match result {
            Ok(fence) => debug!(frame, fence = fence.value(), "Frame submitted"),
            Err(e) if e.is_timeout() => {
                warn!(frame, error = %e, "Frame skipped, retrying");
                continue;
            }
            Err(e) => return Err(e).context(format!("Frame {} failed", frame)),
        }

        if frame > 0 && frame % METRICS_INTERVAL == 0 {
            let metrics = render_loop.metrics();
            info!(
                frame,
                fps = metrics.fps(),
                stalls = metrics.stalls(),
                average_wait_us = metrics.average_wait().as_micros() as u64,
                "Frame statistics"
            );
        }
    }

    // 8. 统计并关闭
    let metrics = render_loop.metrics().clone();
    render_loop.shutdown().context("Failed to flush command queue on shutdown")?;

    info!(
        frames = metrics.acquired(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        stalls = metrics.stalls(),
        total_wait_ms = metrics.total_wait().as_millis() as u64,
        max_wait_ms = metrics.max_wait().as_millis() as u64,
        edits = scene.edits(),
        settled = scene.is_settled(),
        "DistFrame finished"
    );

    Ok(())
}
