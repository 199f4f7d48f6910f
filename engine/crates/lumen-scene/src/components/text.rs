use glam::Vec4;

use lumen_asset::font::FontHandle;

/// 文字在哪个空间中排版
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RenderMode {
    /// 跟随 transform 放在世界空间中，参与深度测试
    #[default]
    World,
    /// transform 的 x/y 是屏幕像素坐标，不做深度测试
    Screen,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextRun {
    pub text: String,
    pub font: FontHandle,
    /// World 模式下是世界单位，Screen 模式下是像素
    pub size: f32,
    pub color: Vec4,
}
impl TextRun {
    pub fn new(text: impl Into<String>, font: FontHandle, size: f32) -> Self {
        Self {
            text: text.into(),
            font,
            size,
            color: Vec4::ONE,
        }
    }
}
