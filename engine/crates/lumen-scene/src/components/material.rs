use glam::Vec4;

use lumen_render_interface::gpu_resources::TextureHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AlphaMode {
    #[default]
    Opaque,
    /// 参与排序，在所有不透明物体之后绘制
    Blend,
}

/// CPU 侧的材质数据
#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    pub base_color: Vec4,
    pub emissive: Vec4,
    pub metallic: f32,
    pub roughness: f32,
    pub alpha_mode: AlphaMode,
    pub double_sided: bool,

    /// None 或者句柄已经失效时绘制为无纹理
    pub base_color_texture: Option<TextureHandle>,
}
impl Default for Material {
    fn default() -> Self {
        Self {
            base_color: Vec4::ONE,
            emissive: Vec4::ZERO,
            metallic: 0.0,
            roughness: 0.5,
            alpha_mode: AlphaMode::Opaque,
            double_sided: false,
            base_color_texture: None,
        }
    }
}
impl Material {
    #[inline]
    pub fn is_transparent(&self) -> bool {
        self.alpha_mode == AlphaMode::Blend
    }

    pub fn transparent(base_color: Vec4) -> Self {
        Self {
            base_color,
            alpha_mode: AlphaMode::Blend,
            ..Default::default()
        }
    }
}
