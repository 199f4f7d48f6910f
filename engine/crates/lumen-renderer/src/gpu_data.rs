//! shader 通过 bindless 读取的 buffer 元素，布局遵循 std430
//!
//! 所有 3 分量的数据都扩展成 vec4，避免 vec3 的 16 字节对齐带来的隐式 padding。

use glam::{Mat4, UVec4, Vec2, Vec4};

use lumen_asset::font::Glyph;
use lumen_scene::components::light::Light;
use lumen_scene::components::transform::Transform;

/// w 分量未使用
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct GpuDirectionalLight {
    /// 光线传播的方向
    pub direction: Vec4,
    pub radiance: Vec4,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct GpuPointLight {
    /// xyz: position, w: range
    pub position_range: Vec4,
    pub radiance: Vec4,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct GpuSpotLight {
    /// xyz: position, w: range
    pub position_range: Vec4,
    /// xyz: direction, w: cos(outer_angle)
    pub direction_outer: Vec4,
    /// xyz: radiance, w: cos(inner_angle)
    pub radiance_inner: Vec4,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct GpuParticle {
    /// xyz: position, w: size
    pub position_size: Vec4,
    pub color: Vec4,
}

/// 一个排版好的字形 quad（"text-advance"）
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct GpuTextAdvance {
    /// 笔的位置，已经乘过 size
    pub pen: Vec2,
    /// 在 glyph 表中的全局下标
    pub glyph: u32,
    pub _padding: u32,
}

/// 字形度量表（"text-glyphs"），所有字体的字形依次排列
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct GpuGlyph {
    /// em 单位：left, bottom, right, top
    pub plane_bounds: Vec4,
    /// 归一化的 atlas uv
    pub uv_bounds: Vec4,
}

/// 每帧一份的 uniform buffer
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct FrameGlobals {
    pub view_proj: Mat4,
    pub inv_view_proj: Mat4,
    /// 屏幕像素坐标到裁剪空间，Screen 模式的文字使用
    pub screen_proj: Mat4,
    /// w 未使用
    pub camera_position: Vec4,
    /// width, height, 1/width, 1/height
    pub viewport: Vec4,
    /// directional, point, spot, particle
    pub counts: UVec4,
}

// 转换
impl GpuDirectionalLight {
    pub fn new(transform: &Transform, light: &Light) -> Self {
        Self {
            direction: transform.forward().extend(0.0),
            radiance: light.radiance().extend(0.0),
        }
    }
}
impl GpuPointLight {
    pub fn new(transform: &Transform, range: f32, light: &Light) -> Self {
        Self {
            position_range: transform.translation.extend(range),
            radiance: light.radiance().extend(0.0),
        }
    }
}
impl GpuSpotLight {
    pub fn new(transform: &Transform, range: f32, inner_angle: f32, outer_angle: f32, light: &Light) -> Self {
        Self {
            position_range: transform.translation.extend(range),
            direction_outer: transform.forward().extend(outer_angle.cos()),
            radiance_inner: light.radiance().extend(inner_angle.cos()),
        }
    }
}
impl From<&Glyph> for GpuGlyph {
    fn from(glyph: &Glyph) -> Self {
        Self {
            plane_bounds: glyph.plane_bounds.to_vec4(),
            uv_bounds: glyph.uv_bounds.to_vec4(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn std430_sizes() {
        assert_eq!(size_of::<GpuDirectionalLight>(), 32);
        assert_eq!(size_of::<GpuPointLight>(), 32);
        assert_eq!(size_of::<GpuSpotLight>(), 48);
        assert_eq!(size_of::<GpuParticle>(), 32);
        assert_eq!(size_of::<GpuTextAdvance>(), 16);
        assert_eq!(size_of::<GpuGlyph>(), 32);
        assert_eq!(size_of::<FrameGlobals>(), 3 * 64 + 3 * 16);
    }

    #[test]
    fn spot_light_stores_cosines() {
        let light = Light::Spot {
            color: glam::Vec3::ONE,
            intensity: 2.0,
            range: 5.0,
            inner_angle: 0.0,
            outer_angle: std::f32::consts::FRAC_PI_2,
        };
        let gpu = GpuSpotLight::new(&Transform::default(), 5.0, 0.0, std::f32::consts::FRAC_PI_2, &light);
        assert_eq!(gpu.position_range.w, 5.0);
        assert_eq!(gpu.radiance_inner, Vec4::new(2.0, 2.0, 2.0, 1.0));
        assert!(gpu.direction_outer.w.abs() < 1e-6);
        assert_eq!(gpu.direction_outer.truncate(), glam::Vec3::NEG_Z);
    }
}
