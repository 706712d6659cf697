//! 物体变换
//!
//! 参考 DistEngine 的 Transform 类实现
//! 管理物体的位置、旋转和缩放，世界矩阵按需重新计算

use nalgebra::{Matrix4, Vector3};

/// 物体变换
#[derive(Debug, Clone)]
pub struct Transform {
    /// 位置
    position: Vector3<f32>,

    /// 欧拉角（度数）
    euler_angle: Vector3<f32>,

    /// 缩放
    scale: Vector3<f32>,

    /// 世界矩阵缓存
    world_matrix: Matrix4<f32>,

    /// 世界矩阵是否需要更新
    world_dirty: bool,
}

impl Transform {
    pub fn new() -> Self {
        Self {
            position: Vector3::zeros(),
            euler_angle: Vector3::zeros(),
            scale: Vector3::new(1.0, 1.0, 1.0),
            world_matrix: Matrix4::identity(),
            world_dirty: true,
        }
    }

    /// 创建带位置的 Transform
    pub fn with_position(position: Vector3<f32>) -> Self {
        let mut transform = Self::new();
        transform.position = position;
        transform
    }

    pub fn position(&self) -> &Vector3<f32> {
        &self.position
    }

    pub fn euler_angle(&self) -> &Vector3<f32> {
        &self.euler_angle
    }

    /// 设置缩放
    pub fn set_scale(&mut self, scale: Vector3<f32>) {
        self.scale = scale;
        self.world_dirty = true;
    }

    /// 添加旋转偏移（度数）
    pub fn add_euler_angle(&mut self, offset: Vector3<f32>) {
        self.euler_angle += offset;
        self.world_dirty = true;
    }

    /// 获取世界矩阵
    pub fn world_matrix(&mut self) -> Matrix4<f32> {
        if self.world_dirty {
            self.update_world_matrix();
        }
        self.world_matrix
    }

    fn update_world_matrix(&mut self) {
        let pitch = self.euler_angle.x.to_radians();
        let yaw = self.euler_angle.y.to_radians();
        let roll = self.euler_angle.z.to_radians();

        let translation = Matrix4::new_translation(&self.position);
        let rotation = Matrix4::from_axis_angle(&Vector3::z_axis(), roll)
            * Matrix4::from_axis_angle(&Vector3::y_axis(), yaw)
            * Matrix4::from_axis_angle(&Vector3::x_axis(), pitch);
        let scale = Matrix4::new_nonuniform_scaling(&self.scale);

        // T * R * S
        self.world_matrix = translation * rotation * scale;
        self.world_dirty = false;
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::new()
    }
}
