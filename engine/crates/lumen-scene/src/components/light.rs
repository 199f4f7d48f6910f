use glam::Vec3;

/// 光源的位置和朝向来自同一个实体上的 `Transform`
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Light {
    Directional {
        color: Vec3,
        intensity: f32,
    },
    Point {
        color: Vec3,
        intensity: f32,
        range: f32,
    },
    Spot {
        color: Vec3,
        intensity: f32,
        range: f32,
        /// 弧度
        inner_angle: f32,
        outer_angle: f32,
    },
}
impl Light {
    #[inline]
    pub fn kind(&self) -> LightKind {
        match self {
            Light::Directional { .. } => LightKind::Directional,
            Light::Point { .. } => LightKind::Point,
            Light::Spot { .. } => LightKind::Spot,
        }
    }

    /// 颜色乘以强度
    #[inline]
    pub fn radiance(&self) -> Vec3 {
        match *self {
            Light::Directional { color, intensity }
            | Light::Point { color, intensity, .. }
            | Light::Spot { color, intensity, .. } => color * intensity,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LightKind {
    Directional,
    Point,
    Spot,
}
