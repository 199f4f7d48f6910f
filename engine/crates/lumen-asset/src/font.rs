use std::collections::HashMap;
use std::path::Path;

use glam::{Vec2, Vec4};
use serde::Deserialize;

use lumen_render_interface::gpu_resources::TextureHandle;
use lumen_render_interface::handle::Handle;

use crate::error::AssetError;

pub type FontHandle = Handle<Font>;

/// 以 em 为单位的矩形，y 轴向上
#[derive(Debug, Clone, Copy, PartialEq, Default, Deserialize)]
pub struct Bounds {
    pub left: f32,
    pub bottom: f32,
    pub right: f32,
    pub top: f32,
}
impl Bounds {
    #[inline]
    pub fn to_vec4(self) -> Vec4 {
        Vec4::new(self.left, self.bottom, self.right, self.top)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
struct GlyphJson {
    unicode: u32,
    advance: f32,
    #[serde(default)]
    plane_bounds: Option<Bounds>,
    /// 像素坐标
    #[serde(default)]
    atlas_bounds: Option<Bounds>,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
struct AtlasJson {
    width: f32,
    height: f32,
}

/// 字体图集工具导出的 metrics 文件
#[derive(Debug, Clone, PartialEq, Deserialize)]
struct FontJson {
    atlas: AtlasJson,
    line_height: f32,
    glyphs: Vec<GlyphJson>,
}

/// 一个字形的度量信息，atlas uv 已经归一化
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Glyph {
    pub codepoint: char,
    pub advance: f32,
    pub plane_bounds: Bounds,
    pub uv_bounds: Bounds,
}

/// 排版结果中的一个字形
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlacedGlyph {
    /// 笔的位置，单位和 size 相同，y 轴向上
    pub pen: Vec2,
    /// 在 `Font::glyphs` 中的下标
    pub glyph_index: u32,
}

/// 字形表 + 图集纹理
pub struct Font {
    name: String,
    line_height: f32,
    glyphs: Vec<Glyph>,
    lookup: HashMap<char, u32>,
    atlas: TextureHandle,
}
// new & init
impl Font {
    pub fn from_json_str(name: &str, text: &str, atlas: TextureHandle) -> Result<Self, serde_json::Error> {
        let json: FontJson = serde_json::from_str(text)?;
        let uv_scale = |b: Bounds| Bounds {
            left: b.left / json.atlas.width,
            right: b.right / json.atlas.width,
            bottom: b.bottom / json.atlas.height,
            top: b.top / json.atlas.height,
        };

        let glyphs: Vec<Glyph> = json
            .glyphs
            .iter()
            .filter_map(|g| {
                Some(Glyph {
                    codepoint: char::from_u32(g.unicode)?,
                    advance: g.advance,
                    // 空格之类的字形没有 bounds
                    plane_bounds: g.plane_bounds.unwrap_or_default(),
                    uv_bounds: g.atlas_bounds.map(uv_scale).unwrap_or_default(),
                })
            })
            .collect();
        let lookup = glyphs.iter().enumerate().map(|(i, g)| (g.codepoint, i as u32)).collect();

        Ok(Self {
            name: name.to_string(),
            line_height: json.line_height,
            glyphs,
            lookup,
            atlas,
        })
    }

    pub fn load(path: &Path, atlas: TextureHandle) -> Result<Self, AssetError> {
        let text = std::fs::read_to_string(path).map_err(|source| AssetError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let name = path.file_stem().map(|s| s.to_string_lossy().to_string()).unwrap_or_default();
        Self::from_json_str(&name, &text, atlas).map_err(|source| AssetError::FontParse {
            path: path.display().to_string(),
            source,
        })
    }
}
// getters
impl Font {
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn line_height(&self) -> f32 {
        self.line_height
    }

    #[inline]
    pub fn atlas(&self) -> TextureHandle {
        self.atlas
    }

    #[inline]
    pub fn glyphs(&self) -> &[Glyph] {
        &self.glyphs
    }

    #[inline]
    pub fn glyph_index(&self, c: char) -> Option<u32> {
        self.lookup.get(&c).copied()
    }
}
// tools
impl Font {
    /// 从原点开始水平排版，`\n` 换行；字体中没有的字符使用 '?'，'?' 也没有时跳过
    pub fn layout(&self, text: &str, size: f32) -> Vec<PlacedGlyph> {
        let fallback = self.glyph_index('?');
        let mut pen = Vec2::ZERO;
        let mut placed = Vec::with_capacity(text.len());
        for c in text.chars() {
            if c == '\n' {
                pen.x = 0.0;
                pen.y -= self.line_height * size;
                continue;
            }
            let Some(glyph_index) = self.glyph_index(c).or(fallback) else {
                continue;
            };
            let glyph = &self.glyphs[glyph_index as usize];
            // 没有 bounds 的字形（空格）只推进笔的位置，不产生 quad
            if glyph.plane_bounds != Bounds::default() {
                placed.push(PlacedGlyph { pen, glyph_index });
            }
            pen.x += glyph.advance * size;
        }
        placed
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) const METRICS: &str = r#"{
        "atlas": { "width": 64, "height": 32 },
        "line_height": 1.25,
        "glyphs": [
            { "unicode": 32, "advance": 0.25 },
            { "unicode": 63, "advance": 0.5,
              "plane_bounds": { "left": 0.0, "bottom": 0.0, "right": 0.5, "top": 0.7 },
              "atlas_bounds": { "left": 32, "bottom": 0, "right": 48, "top": 16 } },
            { "unicode": 65, "advance": 0.6,
              "plane_bounds": { "left": 0.0, "bottom": 0.0, "right": 0.6, "top": 0.7 },
              "atlas_bounds": { "left": 0, "bottom": 0, "right": 16, "top": 16 } }
        ]
    }"#;

    pub(crate) fn test_font() -> Font {
        Font::from_json_str("test", METRICS, TextureHandle::null()).unwrap()
    }

    #[test]
    fn atlas_bounds_are_normalized() {
        let font = test_font();
        let a = font.glyphs()[font.glyph_index('A').unwrap() as usize];
        assert_eq!(a.uv_bounds.right, 0.25);
        assert_eq!(a.uv_bounds.top, 0.5);
        assert_eq!(font.line_height(), 1.25);
    }

    #[test]
    fn layout_advances_pen() {
        let font = test_font();
        let placed = font.layout("A A", 2.0);
        // 空格不产生 quad，但推进 0.25 * 2
        assert_eq!(placed.len(), 2);
        assert_eq!(placed[0].pen, Vec2::ZERO);
        assert_eq!(placed[1].pen, Vec2::new(1.2 + 0.5, 0.0));
    }

    #[test]
    fn layout_uses_fallback_and_newlines() {
        let font = test_font();
        let placed = font.layout("Z\nA", 1.0);
        assert_eq!(placed.len(), 2);
        assert_eq!(placed[0].glyph_index, font.glyph_index('?').unwrap());
        assert_eq!(placed[1].pen, Vec2::new(0.0, -1.25));
    }
}
