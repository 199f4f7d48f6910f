use ash::vk;
use itertools::Itertools;
use serde::Deserialize;

/// 顶点属性的语义，每种语义有固定的格式，mesh 上传时也按照这个格式存放
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VertexSemantic {
    Position,
    Normal,
    Tangent,
    Uv0,
    Uv1,
    Color,
    Joints,
    Weights,
}
impl VertexSemantic {
    pub const ALL: [VertexSemantic; 8] = [
        Self::Position,
        Self::Normal,
        Self::Tangent,
        Self::Uv0,
        Self::Uv1,
        Self::Color,
        Self::Joints,
        Self::Weights,
    ];

    #[inline]
    pub fn format(self) -> vk::Format {
        match self {
            Self::Position | Self::Normal => vk::Format::R32G32B32_SFLOAT,
            Self::Tangent | Self::Color | Self::Weights => vk::Format::R32G32B32A32_SFLOAT,
            Self::Uv0 | Self::Uv1 => vk::Format::R32G32_SFLOAT,
            Self::Joints => vk::Format::R32G32B32A32_UINT,
        }
    }

    /// 每个顶点占用的字节数
    #[inline]
    pub fn stride(self) -> u32 {
        match self {
            Self::Position | Self::Normal => 12,
            Self::Tangent | Self::Color | Self::Weights | Self::Joints => 16,
            Self::Uv0 | Self::Uv1 => 8,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShaderStageKind {
    Vertex,
    Fragment,
}
impl ShaderStageKind {
    #[inline]
    pub fn vk_stage(self) -> vk::ShaderStageFlags {
        match self {
            Self::Vertex => vk::ShaderStageFlags::VERTEX,
            Self::Fragment => vk::ShaderStageFlags::FRAGMENT,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct VertexInputReflection {
    pub location: u32,
    pub semantic: VertexSemantic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DescriptorKind {
    StorageBuffer,
    UniformBuffer,
    CombinedImageSampler,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct DescriptorBindingReflection {
    pub set: u32,
    pub binding: u32,
    pub kind: DescriptorKind,
}

/// shader 编译器输出的反射摘要
///
/// 和 spv 放在一起，文件名为 `<name>.json`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ShaderReflection {
    pub stage: ShaderStageKind,
    #[serde(default = "ShaderReflection::default_entry_point")]
    pub entry_point: String,
    #[serde(default)]
    pub vertex_inputs: Vec<VertexInputReflection>,
    #[serde(default)]
    pub descriptor_bindings: Vec<DescriptorBindingReflection>,
    /// 当前 stage 使用的 push constant 区间
    #[serde(default)]
    pub push_constant_offset: u32,
    #[serde(default)]
    pub push_constant_size: u32,
}
impl ShaderReflection {
    fn default_entry_point() -> String {
        "main".to_string()
    }

    pub fn from_json_str(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// 每个顶点属性单独使用一个 binding（SoA 布局），binding 序号按照 location 排序
    pub fn vertex_input_state(&self) -> (Vec<vk::VertexInputBindingDescription>, Vec<vk::VertexInputAttributeDescription>) {
        let inputs = self.sorted_vertex_inputs();
        let bindings = inputs
            .iter()
            .enumerate()
            .map(|(binding, input)| {
                vk::VertexInputBindingDescription::default()
                    .binding(binding as u32)
                    .stride(input.semantic.stride())
                    .input_rate(vk::VertexInputRate::VERTEX)
            })
            .collect_vec();
        let attributes = inputs
            .iter()
            .enumerate()
            .map(|(binding, input)| {
                vk::VertexInputAttributeDescription::default()
                    .location(input.location)
                    .binding(binding as u32)
                    .format(input.semantic.format())
                    .offset(0)
            })
            .collect_vec();
        (bindings, attributes)
    }

    /// 顶点 buffer 的绑定顺序
    pub fn vertex_semantics(&self) -> Vec<VertexSemantic> {
        self.sorted_vertex_inputs().iter().map(|input| input.semantic).collect_vec()
    }

    fn sorted_vertex_inputs(&self) -> Vec<VertexInputReflection> {
        self.vertex_inputs.iter().copied().sorted_by_key(|input| input.location).collect_vec()
    }

    #[inline]
    pub fn push_constant_range(&self) -> Option<vk::PushConstantRange> {
        (self.push_constant_size > 0).then(|| {
            vk::PushConstantRange::default()
                .stage_flags(self.stage.vk_stage())
                .offset(self.push_constant_offset)
                .size(self.push_constant_size)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MESH_VS: &str = r#"{
        "stage": "vertex",
        "vertex_inputs": [
            { "location": 2, "semantic": "uv0" },
            { "location": 0, "semantic": "position" },
            { "location": 1, "semantic": "normal" }
        ],
        "descriptor_bindings": [ { "set": 0, "binding": 0, "kind": "storage_buffer" } ],
        "push_constant_offset": 0,
        "push_constant_size": 16
    }"#;

    #[test]
    fn parses_summary_with_defaults() {
        let reflection = ShaderReflection::from_json_str(MESH_VS).unwrap();
        assert_eq!(reflection.stage, ShaderStageKind::Vertex);
        assert_eq!(reflection.entry_point, "main");
        assert_eq!(reflection.vertex_inputs.len(), 3);
        assert_eq!(reflection.descriptor_bindings[0].kind, DescriptorKind::StorageBuffer);
    }

    #[test]
    fn vertex_bindings_follow_location_order() {
        let reflection = ShaderReflection::from_json_str(MESH_VS).unwrap();
        let (bindings, attributes) = reflection.vertex_input_state();

        assert_eq!(
            reflection.vertex_semantics(),
            vec![VertexSemantic::Position, VertexSemantic::Normal, VertexSemantic::Uv0]
        );
        assert_eq!(bindings.len(), 3);
        assert_eq!(bindings[0].stride, 12);
        assert_eq!(bindings[2].stride, 8);
        assert_eq!(attributes[2].location, 2);
        assert_eq!(attributes[2].binding, 2);
        assert_eq!(attributes[2].format, vk::Format::R32G32_SFLOAT);
    }

    #[test]
    fn push_constant_range_covers_stage_slice() {
        let reflection = ShaderReflection::from_json_str(
            r#"{ "stage": "fragment", "push_constant_offset": 16, "push_constant_size": 32 }"#,
        )
        .unwrap();
        let range = reflection.push_constant_range().unwrap();
        assert_eq!(range.stage_flags, vk::ShaderStageFlags::FRAGMENT);
        assert_eq!(range.offset, 16);
        assert_eq!(range.size, 32);

        let no_push = ShaderReflection::from_json_str(r#"{ "stage": "fragment" }"#).unwrap();
        assert!(no_push.push_constant_range().is_none());
    }
}
