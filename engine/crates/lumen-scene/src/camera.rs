use glam::{EulerRot, Mat4, Vec3};

/// 透视相机
///
/// 没有旋转时看向 -Z，yaw 绕世界 Y 轴，pitch 绕相机 X 轴；
/// 投影矩阵使用 Vulkan 的裁剪空间约定：深度范围 [0, 1]，NDC 的 y 轴向下。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    pub position: Vec3,

    pub yaw_deg: f32,
    pub pitch_deg: f32,

    /// 垂直方向的视场角
    pub fov_deg: f32,
    pub near: f32,
    pub far: f32,
}
impl Default for Camera {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            yaw_deg: 0.0,
            pitch_deg: 0.0,
            fov_deg: 60.0,
            near: 0.1,
            far: 1000.0,
        }
    }
}
impl Camera {
    const CAMERA_UP: Vec3 = Vec3::Y;

    /// YXZ 表示 Y(yaw)-X(Pitch)-Z(Roll) 的旋转顺序
    const CAMERA_EULER: EulerRot = EulerRot::YXZ;

    const CAMERA_FORWARD: Vec3 = Vec3::NEG_Z;

    const CAMERA_RIGHT: Vec3 = Vec3::X;

    const K_PITCH: f32 = 89.5;

    #[inline]
    fn rotation(&self) -> Mat4 {
        Mat4::from_euler(Self::CAMERA_EULER, self.yaw_deg.to_radians(), self.pitch_deg.to_radians(), 0.0)
    }

    #[inline]
    pub fn forward(&self) -> Vec3 {
        self.rotation().transform_vector3(Self::CAMERA_FORWARD)
    }

    #[inline]
    pub fn right(&self) -> Vec3 {
        self.rotation().transform_vector3(Self::CAMERA_RIGHT)
    }

    #[inline]
    pub fn up(&self) -> Vec3 {
        self.rotation().transform_vector3(Self::CAMERA_UP)
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_to_rh(self.position, self.forward(), Self::CAMERA_UP)
    }

    pub fn projection_matrix(&self, aspect: f32) -> Mat4 {
        let mut proj = Mat4::perspective_rh(self.fov_deg.to_radians(), aspect, self.near, self.far);
        proj.y_axis.y *= -1.0;
        proj
    }

    #[inline]
    pub fn view_projection(&self, aspect: f32) -> Mat4 {
        self.projection_matrix(aspect) * self.view_matrix()
    }

    /// 到某一点的距离的平方，用于透明物体排序
    #[inline]
    pub fn distance_squared(&self, point: Vec3) -> f32 {
        self.position.distance_squared(point)
    }
}
// update
impl Camera {
    /// 朝相机看向的方向进行移动
    pub fn move_forward(&mut self, length: f32) {
        self.position += self.forward() * length;
    }

    pub fn move_right(&mut self, length: f32) {
        self.position += self.right() * length;
    }

    /// 朝世界的 Up 进行移动
    pub fn move_up(&mut self, length: f32) {
        self.position += Self::CAMERA_UP * length;
    }

    pub fn rotate_yaw(&mut self, angle: f32) {
        self.yaw_deg = (self.yaw_deg + angle).rem_euclid(360.0);
    }

    pub fn rotate_pitch(&mut self, angle: f32) {
        self.pitch_deg = (self.pitch_deg + angle).clamp(-Self::K_PITCH, Self::K_PITCH);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec4;

    fn approx(a: Vec3, b: Vec3) -> bool {
        (a - b).length() < 1e-5
    }

    #[test]
    fn default_looks_down_negative_z() {
        let camera = Camera::default();
        assert!(approx(camera.forward(), Vec3::NEG_Z));
        assert!(approx(camera.right(), Vec3::X));

        let mut turned = camera;
        turned.rotate_yaw(90.0);
        assert!(approx(turned.forward(), Vec3::NEG_X));
    }

    #[test]
    fn pitch_is_clamped_and_yaw_wraps() {
        let mut camera = Camera::default();
        camera.rotate_pitch(120.0);
        assert_eq!(camera.pitch_deg, 89.5);
        camera.rotate_yaw(-30.0);
        assert_eq!(camera.yaw_deg, 330.0);
    }

    #[test]
    fn projection_uses_vulkan_clip_space() {
        let camera = Camera {
            near: 1.0,
            far: 10.0,
            ..Default::default()
        };
        let view_proj = camera.view_projection(1.0);

        // 近平面上的点深度为 0，远平面上的点深度为 1
        let near = view_proj * Vec4::new(0.0, 0.0, -1.0, 1.0);
        let far = view_proj * Vec4::new(0.0, 0.0, -10.0, 1.0);
        assert!((near.z / near.w).abs() < 1e-5);
        assert!((far.z / far.w - 1.0).abs() < 1e-5);

        // 相机上方的点在 NDC 中 y < 0
        let above = view_proj * Vec4::new(0.0, 1.0, -5.0, 1.0);
        assert!(above.y / above.w < 0.0);
    }

    #[test]
    fn distance_is_squared() {
        let camera = Camera::default();
        assert_eq!(camera.distance_squared(Vec3::new(0.0, 3.0, -4.0)), 25.0);
    }
}
