//! 演示场景
//!
//! 一组排成网格的旋转物体。物体常量只在被修改时通过 `DirtyPropagator`
//! 写入各个槽位，pass 常量每帧都写入当前槽位。
//!
//! # 槽位数据布局
//!
//! - payload 0：pass 常量，1 个元素
//! - payload 1：物体常量，每个物体 1 个元素

pub mod transform;

use bytemuck::{Pod, Zeroable};
use nalgebra::{Matrix4, Point3, Vector3};
use tracing::{debug, trace};

use crate::core::config::SceneConfig;
use crate::core::error::{DistFrameError, Result};
use crate::renderer::command::{Command, CommandList, CommandRecorder};
use crate::renderer::dirty::DirtyPropagator;
use crate::renderer::resource::{BufferDescriptor, BufferUsageType, FrameResource, PayloadBuffer};
use crate::renderer::FrameContext;

pub use transform::Transform;

/// pass 常量所在的 payload
pub const PASS_PAYLOAD: usize = 0;
/// 物体常量所在的 payload
pub const OBJECT_PAYLOAD: usize = 1;

/// 每次修改旋转的角度（度数）
const EDIT_ROTATION_DEGREES: f32 = 15.0;

/// 演示场景使用的帧资源
pub type SceneFrameResource = FrameResource<CommandRecorder>;

/// 物体常量
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct ObjectConstants {
    pub world: [[f32; 4]; 4],
    pub color: [f32; 4],
}

/// pass 常量
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct PassConstants {
    pub view_proj: [[f32; 4]; 4],
    pub eye_pos: [f32; 4],
    pub total_time: f32,
    pub delta_time: f32,
    pub frame: u32,
    pub _padding: u32,
}

struct SceneObject {
    transform: Transform,
    color: [f32; 4],
}

impl SceneObject {
    fn constants(&mut self) -> ObjectConstants {
        ObjectConstants {
            world: *self.transform.world_matrix().as_ref(),
            color: self.color,
        }
    }
}

/// 演示场景
pub struct DemoScene {
    objects: Vec<SceneObject>,
    dirty: DirtyPropagator<usize, ObjectConstants>,
    eye: Point3<f32>,
    view_proj: Matrix4<f32>,
    edit_interval: u64,
    total_time: f32,
    edits: u64,
}

impl DemoScene {
    /// 创建场景，`frame_count` 必须与帧资源池的槽位数量一致
    ///
    /// 所有物体初始都标记为脏，前 N 帧会把它们写入每个槽位。
    pub fn new(config: &SceneConfig, frame_count: usize) -> Result<Self> {
        if config.object_count == 0 {
            return Err(DistFrameError::Initialization(
                "Demo scene requires at least one object".to_string(),
            ));
        }

        let columns = (config.object_count as f32).sqrt().ceil() as usize;
        let mut dirty = DirtyPropagator::new(frame_count)?;
        let mut objects = Vec::with_capacity(config.object_count);

        for i in 0..config.object_count {
            let (row, column) = (i / columns, i % columns);
            let position = Vector3::new(
                column as f32 * 2.0 - columns as f32,
                0.0,
                row as f32 * 2.0 - columns as f32,
            );
            let mut transform = Transform::with_position(position);
            transform.set_scale(Vector3::new(0.5, 0.5, 0.5));

            let t = i as f32 / config.object_count as f32;
            let mut object = SceneObject {
                transform,
                color: [t, 1.0 - t, 0.5, 1.0],
            };
            dirty.mark_dirty(i, object.constants());
            objects.push(object);
        }

        let eye = Point3::new(0.0, columns as f32 * 1.5, columns as f32 * 3.0);
        let view = Matrix4::look_at_rh(&eye, &Point3::origin(), &Vector3::y());
        let projection = Matrix4::new_perspective(16.0 / 9.0, std::f32::consts::FRAC_PI_4, 0.1, 100.0);

        debug!(objects = objects.len(), frame_count, "Demo scene created");

        Ok(Self {
            objects,
            dirty,
            eye,
            view_proj: projection * view,
            edit_interval: config.edit_interval,
            total_time: 0.0,
            edits: 0,
        })
    }

    /// 为一个槽位创建帧资源
    pub fn create_frame_resource(&self, slot: usize) -> Result<SceneFrameResource> {
        let pass = PayloadBuffer::new(
            BufferDescriptor::for_type::<PassConstants>(1, BufferUsageType::Constant)
                .with_name(format!("PassConstants[{}]", slot)),
        )?;
        let objects = PayloadBuffer::new(
            BufferDescriptor::for_type::<ObjectConstants>(
                self.objects.len(),
                BufferUsageType::Constant,
            )
            .with_name(format!("ObjectConstants[{}]", slot)),
        )?;
        Ok(FrameResource::new(CommandRecorder::new(slot), vec![pass, objects]))
    }

    /// CPU 侧更新
    ///
    /// 每隔 `edit_interval` 帧旋转一个物体。`edit_interval` 为 0 时从不修改。
    pub fn update(&mut self, frame_number: u64, delta_time: f32) {
        self.total_time += delta_time;

        if self.edit_interval == 0 || frame_number == 0 || frame_number % self.edit_interval != 0 {
            return;
        }

        let index = (self.edits % self.objects.len() as u64) as usize;
        self.edits += 1;

        let object = &mut self.objects[index];
        object
            .transform
            .add_euler_angle(Vector3::new(0.0, EDIT_ROTATION_DEGREES, 0.0));
        self.dirty.mark_dirty(index, object.constants());

        debug!(frame = frame_number, object = index, "Object edited");
    }

    /// 把本帧数据写入当前槽位并录制命令
    pub fn record(
        &mut self,
        context: &mut FrameContext<'_, SceneFrameResource>,
        delta_time: f32,
    ) -> Result<CommandList> {
        let frame_number = context.frame_number();
        let slot_index = context.slot_index();
        let (recorder, payloads) = context.split();

        recorder.reset();

        let pass = PassConstants {
            view_proj: *self.view_proj.as_ref(),
            eye_pos: [self.eye.x, self.eye.y, self.eye.z, 1.0],
            total_time: self.total_time,
            delta_time,
            frame: frame_number as u32,
            _padding: 0,
        };
        payload_at(payloads, PASS_PAYLOAD)?.copy_data(0, &pass)?;
        recorder.record(Command::SetPassConstants { payload: PASS_PAYLOAD })?;

        let object_buffer = payload_at(payloads, OBJECT_PAYLOAD)?;
        let written = self
            .dirty
            .tick(slot_index, |&object, constants, _| object_buffer.copy_data(object, constants))?;
        if written > 0 {
            trace!(slot = slot_index, written, "Object constants propagated");
        }

        for object in 0..self.objects.len() {
            recorder.record(Command::DrawObject {
                object,
                payload: OBJECT_PAYLOAD,
            })?;
        }

        recorder.finish(frame_number)
    }

    /// 物体常量是否已经写入所有槽位
    pub fn is_settled(&self) -> bool {
        self.dirty.is_settled()
    }

    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    /// 物体当前的常量
    pub fn object_constants(&self, index: usize) -> Option<ObjectConstants> {
        self.dirty.get(&index).map(|entry| *entry.value())
    }

    /// 累计修改次数
    pub fn edits(&self) -> u64 {
        self.edits
    }
}

fn payload_at(payloads: &mut [PayloadBuffer], index: usize) -> Result<&mut PayloadBuffer> {
    let count = payloads.len();
    payloads.get_mut(index).ok_or_else(|| {
        DistFrameError::Runtime(format!("Payload {} missing (frame resource has {})", index, count))
    })
}
