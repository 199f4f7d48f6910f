use std::borrow::Cow;
use std::collections::HashMap;

use ash::vk;
use glam::{UVec4, Vec2, Vec3, Vec4};
use itertools::Itertools;

use lumen_gfx::pipelines::reflection::VertexSemantic;
use lumen_gfx::resources::buffer::GfxBuffer;
use lumen_render_interface::handle::Handle;

use crate::error::AssetError;

pub type MeshHandle = Handle<GpuMesh>;

/// 一个顶点属性数组，元素类型由语义决定
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeData {
    Vec2(Vec<Vec2>),
    Vec3(Vec<Vec3>),
    Vec4(Vec<Vec4>),
    UVec4(Vec<UVec4>),
}
impl AttributeData {
    #[inline]
    pub fn len(&self) -> usize {
        match self {
            Self::Vec2(v) => v.len(),
            Self::Vec3(v) => v.len(),
            Self::Vec4(v) => v.len(),
            Self::UVec4(v) => v.len(),
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    fn bytes(&self) -> &[u8] {
        match self {
            Self::Vec2(v) => bytemuck::cast_slice(v),
            Self::Vec3(v) => bytemuck::cast_slice(v),
            Self::Vec4(v) => bytemuck::cast_slice(v),
            Self::UVec4(v) => bytemuck::cast_slice(v),
        }
    }

    /// 语义要求的元素类型
    fn matches(&self, semantic: VertexSemantic) -> bool {
        matches!(
            (semantic, self),
            (VertexSemantic::Position | VertexSemantic::Normal, Self::Vec3(_))
                | (VertexSemantic::Uv0 | VertexSemantic::Uv1, Self::Vec2(_))
                | (
                    VertexSemantic::Tangent | VertexSemantic::Color | VertexSemantic::Weights,
                    Self::Vec4(_)
                )
                | (VertexSemantic::Joints, Self::UVec4(_))
        )
    }
}

/// 解析后的 mesh：按语义存放的顶点属性数组 + 三角形索引
#[derive(Debug, Clone, Default)]
pub struct MeshData {
    pub name: String,
    pub attributes: HashMap<VertexSemantic, AttributeData>,
    pub indices: Vec<u32>,
}
impl MeshData {
    pub fn new(name: impl Into<String>, positions: Vec<Vec3>, indices: Vec<u32>) -> Self {
        let mut attributes = HashMap::new();
        attributes.insert(VertexSemantic::Position, AttributeData::Vec3(positions));
        Self {
            name: name.into(),
            attributes,
            indices,
        }
    }

    // builder
    pub fn with_attribute(mut self, semantic: VertexSemantic, data: AttributeData) -> Self {
        self.attributes.insert(semantic, data);
        self
    }

    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.attributes.get(&VertexSemantic::Position).map_or(0, AttributeData::len)
    }

    /// position 必须存在，其他属性的长度必须和 position 一致，索引不能越界
    pub fn validate(&self) -> Result<(), AssetError> {
        let Some(position) = self.attributes.get(&VertexSemantic::Position) else {
            return Err(AssetError::MissingPosition { name: self.name.clone() });
        };
        let vertex_count = position.len();

        for (semantic, data) in self.attributes.iter().sorted_by_key(|(s, _)| **s as u8) {
            if !data.matches(*semantic) {
                return Err(AssetError::AttributeType {
                    name: self.name.clone(),
                    semantic: *semantic,
                });
            }
            if data.len() != vertex_count {
                return Err(AssetError::AttributeLength {
                    name: self.name.clone(),
                    semantic: *semantic,
                    expected: vertex_count,
                    actual: data.len(),
                });
            }
        }

        if let Some(&index) = self.indices.iter().find(|&&i| i as usize >= vertex_count) {
            return Err(AssetError::IndexOutOfRange {
                name: self.name.clone(),
                index,
                vertex_count,
            });
        }
        Ok(())
    }

    /// 某个语义的顶点数据；缺失的属性使用默认值填充，shader 可以始终读取到完整的输入
    pub fn vertex_bytes(&self, semantic: VertexSemantic) -> Cow<'_, [u8]> {
        if let Some(data) = self.attributes.get(&semantic) {
            return Cow::Borrowed(data.bytes());
        }

        let n = self.vertex_count();
        let bytes: Vec<u8> = match semantic {
            VertexSemantic::Position => Vec::new(),
            VertexSemantic::Normal => bytemuck::cast_slice(&vec![Vec3::Z; n]).to_vec(),
            VertexSemantic::Tangent => bytemuck::cast_slice(&vec![Vec4::new(1.0, 0.0, 0.0, 1.0); n]).to_vec(),
            VertexSemantic::Uv0 | VertexSemantic::Uv1 => bytemuck::cast_slice(&vec![Vec2::ZERO; n]).to_vec(),
            VertexSemantic::Color => bytemuck::cast_slice(&vec![Vec4::ONE; n]).to_vec(),
            VertexSemantic::Joints => bytemuck::cast_slice(&vec![UVec4::ZERO; n]).to_vec(),
            VertexSemantic::Weights => bytemuck::cast_slice(&vec![Vec4::X; n]).to_vec(),
        };
        Cow::Owned(bytes)
    }
}

/// GPU 上的 mesh：每个语义一个 vertex buffer（SoA）+ 一个 u32 index buffer
pub struct GpuMesh {
    name: String,
    vertex_count: u32,
    index_count: u32,
    vertex_buffers: Vec<(VertexSemantic, GfxBuffer)>,
    index_buffer: GfxBuffer,
}
// new & init
impl GpuMesh {
    pub fn upload(data: &MeshData) -> Result<Self, AssetError> {
        let _span = tracy_client::span!("GpuMesh::upload");
        data.validate()?;

        let mut vertex_buffers = Vec::with_capacity(VertexSemantic::ALL.len());
        for semantic in VertexSemantic::ALL {
            let bytes = data.vertex_bytes(semantic);
            let buffer = GfxBuffer::new_device_local(
                bytes.len() as vk::DeviceSize,
                vk::BufferUsageFlags::VERTEX_BUFFER,
                format!("{}-{:?}", data.name, semantic),
            )?;
            buffer.transfer_data_sync(&*bytes)?;
            vertex_buffers.push((semantic, buffer));
        }

        let index_buffer = GfxBuffer::new_device_local(
            (data.indices.len() * size_of::<u32>()) as vk::DeviceSize,
            vk::BufferUsageFlags::INDEX_BUFFER,
            format!("{}-indices", data.name),
        )?;
        index_buffer.transfer_data_sync(&data.indices)?;

        log::info!(
            "mesh {} uploaded: {} vertices, {} indices",
            data.name,
            data.vertex_count(),
            data.indices.len()
        );
        Ok(Self {
            name: data.name.clone(),
            vertex_count: data.vertex_count() as u32,
            index_count: data.indices.len() as u32,
            vertex_buffers,
            index_buffer,
        })
    }
}
// getters
impl GpuMesh {
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn vertex_count(&self) -> u32 {
        self.vertex_count
    }

    #[inline]
    pub fn index_count(&self) -> u32 {
        self.index_count
    }

    #[inline]
    pub fn index_buffer(&self) -> &GfxBuffer {
        &self.index_buffer
    }

    #[inline]
    pub fn vertex_buffer(&self, semantic: VertexSemantic) -> Option<&GfxBuffer> {
        self.vertex_buffers.iter().find(|(s, _)| *s == semantic).map(|(_, b)| b)
    }

    /// 按照 pipeline 的顶点输入顺序排列的 vertex buffer
    pub fn vertex_buffers_for(&self, semantics: &[VertexSemantic]) -> Option<Vec<vk::Buffer>> {
        semantics.iter().map(|s| self.vertex_buffer(*s).map(GfxBuffer::vk_buffer)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triangle() -> MeshData {
        MeshData::new("triangle", vec![Vec3::ZERO, Vec3::X, Vec3::Y], vec![0, 1, 2])
    }

    #[test]
    fn position_is_required() {
        let mut mesh = triangle();
        mesh.attributes.remove(&VertexSemantic::Position);
        assert!(matches!(mesh.validate(), Err(AssetError::MissingPosition { .. })));
        assert!(triangle().validate().is_ok());
    }

    #[test]
    fn attribute_lengths_must_match() {
        let mesh = triangle().with_attribute(VertexSemantic::Uv0, AttributeData::Vec2(vec![Vec2::ZERO; 2]));
        assert!(matches!(
            mesh.validate(),
            Err(AssetError::AttributeLength {
                semantic: VertexSemantic::Uv0,
                expected: 3,
                actual: 2,
                ..
            })
        ));
    }

    #[test]
    fn attribute_type_must_match_semantic() {
        let mesh = triangle().with_attribute(VertexSemantic::Normal, AttributeData::Vec4(vec![Vec4::ZERO; 3]));
        assert!(matches!(
            mesh.validate(),
            Err(AssetError::AttributeType {
                semantic: VertexSemantic::Normal,
                ..
            })
        ));
    }

    #[test]
    fn indices_must_be_in_range() {
        let mut mesh = triangle();
        mesh.indices.push(3);
        assert!(matches!(mesh.validate(), Err(AssetError::IndexOutOfRange { index: 3, .. })));
    }

    #[test]
    fn missing_attributes_get_defaults() {
        let mesh = triangle();
        let normals = mesh.vertex_bytes(VertexSemantic::Normal);
        assert_eq!(normals.len(), 3 * 12);
        let expected: &[u8] = bytemuck::cast_slice(&[Vec3::Z; 3]);
        assert_eq!(&*normals, expected);

        let colors = mesh.vertex_bytes(VertexSemantic::Color);
        assert_eq!(colors.len(), 3 * 16);
        assert!(matches!(mesh.vertex_bytes(VertexSemantic::Position), Cow::Borrowed(_)));
    }
}
