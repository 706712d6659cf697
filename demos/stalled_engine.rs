//! 执行引擎卡顿演示
//!
//! 演示帧资源池的背压：执行引擎暂停后，CPU 最多领先 N - 1 帧，
//! 之后获取槽位会超时；引擎恢复后渲染循环继续运行。
//!
//! # 运行方式
//!
//! ```bash
//! cargo run --example stalled_engine
//! ```

use std::time::Duration;

use dist_frame::core::DistFrameError;
use dist_frame::gfx::software::SoftwareQueue;
use dist_frame::renderer::resource::FrameResourcePool;
use dist_frame::renderer::sync::FenceManager;
use dist_frame::renderer::RenderLoop;

fn main() -> Result<(), DistFrameError> {
    println!("=== DistFrame 执行引擎卡顿演示 ===\n");

    let frame_count = 3;
    let queue = SoftwareQueue::new(|_: usize| std::thread::sleep(Duration::from_millis(2)))?;
    let fences = FenceManager::new(queue.fence());
    let pool = FrameResourcePool::new(vec![(); frame_count], fences, Duration::from_millis(100))?;
    let mut render_loop = RenderLoop::new(queue, pool);

    // === 1. 正常运行 ===
    println!("--- 1. 正常运行 ---");
    for _ in 0..6 {
        let fence = render_loop.run_frame(|frame| Ok(frame.slot_index()))?;
        println!("✓ 帧 {} 提交，栅栏值 {}", render_loop.frame_number() - 1, fence);
    }
    render_loop.flush()?;
    println!();

    // === 2. 暂停执行引擎 ===
    println!("--- 2. 暂停执行引擎 ---");
    render_loop.queue().pause();
    for _ in 0..frame_count + 1 {
        match render_loop.run_frame(|frame| Ok(frame.slot_index())) {
            Ok(fence) => println!(
                "✓ 帧 {} 提交，栅栏值 {}，在途 {}",
                render_loop.frame_number() - 1,
                fence,
                render_loop.pool().in_flight_count()?
            ),
            Err(e) if e.is_timeout() => println!("✗ 获取槽位超时（可恢复）: {}", e),
            Err(e) => return Err(e),
        }
    }
    println!();

    // === 3. 恢复执行引擎 ===
    println!("--- 3. 恢复执行引擎 ---");
    render_loop.queue().resume();
    let fence = render_loop.run_frame(|frame| Ok(frame.slot_index()))?;
    println!("✓ 帧 {} 提交，栅栏值 {}\n", render_loop.frame_number() - 1, fence);

    let metrics = render_loop.metrics();
    println!("获取次数: {}", metrics.acquired());
    println!("等待次数: {}", metrics.stalls());
    println!("最长等待: {:?}", metrics.max_wait());

    render_loop.shutdown()?;
    println!("\n=== 演示完成 ===");
    Ok(())
}
