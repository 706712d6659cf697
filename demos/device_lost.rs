//! 设备丢失演示
//!
//! 演示致命错误的处理：设备丢失后栅栏不再推进，
//! 等待立即以 `DeviceLost` 失败，而不是一直阻塞。
//!
//! # 运行方式
//!
//! ```bash
//! cargo run --example device_lost
//! ```

use std::time::Duration;

use dist_frame::core::DistFrameError;
use dist_frame::gfx::software::SoftwareQueue;
use dist_frame::renderer::resource::FrameResourcePool;
use dist_frame::renderer::sync::FenceManager;
use dist_frame::renderer::RenderLoop;

fn main() -> Result<(), DistFrameError> {
    println!("=== DistFrame 设备丢失演示 ===\n");

    let queue = SoftwareQueue::new(|_: usize| std::thread::sleep(Duration::from_millis(20)))?;
    let fences = FenceManager::new(queue.fence());
    let pool = FrameResourcePool::new(vec![(); 2], fences, Duration::from_secs(2))?;
    let mut render_loop = RenderLoop::new(queue, pool);

    // === 1. 提交两帧后设备丢失 ===
    println!("--- 1. 提交两帧 ---");
    for _ in 0..2 {
        let fence = render_loop.run_frame(|frame| Ok(frame.slot_index()))?;
        println!("✓ 栅栏值 {}", fence);
    }
    render_loop.queue().lose_device();
    println!("设备丢失，未执行的工作被丢弃\n");

    // === 2. 等待立即失败 ===
    println!("--- 2. 继续渲染 ---");
    match render_loop.run_frame(|frame| Ok(frame.slot_index())) {
        Ok(fence) => println!("意外成功: {}", fence),
        Err(e) => {
            println!("✗ {}", e);
            println!("致命错误: {}", e.is_fatal());
            println!("设备丢失: {}", e.is_device_lost());
        }
    }

    // === 3. 关闭 ===
    println!("\n--- 3. 关闭 ---");
    if let Err(e) = render_loop.shutdown() {
        println!("flush 失败: {}", e);
    }

    println!("\n=== 演示完成 ===");
    Ok(())
}
