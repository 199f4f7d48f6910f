use crate::bloom::{BloomStep, bloom_steps};
use crate::gather::FrameData;

/// main pass 中的一次绘制，下标指向 `FrameData` 中对应的数组
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MainDraw {
    Skybox,
    Opaque(usize),
    Transparent(usize),
    Particles(usize),
    Text(usize),
}
impl MainDraw {
    #[inline]
    pub fn is_mesh(&self) -> bool {
        matches!(self, Self::Opaque(_) | Self::Transparent(_))
    }
}

/// 一帧中所有 pass 的绘制顺序
///
/// 录制命令时严格按照这里的顺序执行，和 GPU 无关，可以直接测试
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FramePlan {
    /// depth prepass 只绘制不透明物体，下标指向 `FrameData::draws`
    pub prepass: Vec<usize>,
    pub main: Vec<MainDraw>,
    pub bloom: Vec<BloomStep>,
}
impl FramePlan {
    /// `bloom_chain` 为 None 表示关闭 bloom，composite 仍然执行
    pub fn build(data: &FrameData, bloom_chain: Option<u32>) -> Self {
        let opaque = 0..data.opaque_count;
        let transparent = data.opaque_count..data.draws.len();

        let main = std::iter::once(MainDraw::Skybox)
            .chain(opaque.clone().map(MainDraw::Opaque))
            .chain(transparent.map(MainDraw::Transparent))
            .chain((0..data.particle_draws.len()).map(MainDraw::Particles))
            .chain((0..data.text_draws.len()).map(MainDraw::Text))
            .collect();

        Self {
            prepass: opaque.collect(),
            main,
            bloom: bloom_chain.map(bloom_steps).unwrap_or_default(),
        }
    }

    #[inline]
    pub fn main_mesh_draws(&self) -> impl Iterator<Item = &MainDraw> {
        self.main.iter().filter(|d| d.is_mesh())
    }
}

/// 一帧的统计信息，debug 级别输出
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FrameStats {
    pub prepass_draws: usize,
    pub opaque_draws: usize,
    pub transparent_draws: usize,
    pub particle_vertices: u32,
    pub text_vertices: u32,
    pub bloom_steps: usize,
    pub skipped_draws: usize,
}
impl FrameStats {
    pub fn new(data: &FrameData, plan: &FramePlan) -> Self {
        Self {
            prepass_draws: plan.prepass.len(),
            opaque_draws: data.opaque_count,
            transparent_draws: data.transparent_count(),
            particle_vertices: data.particle_draws.iter().map(|d| d.vertex_count()).sum(),
            text_vertices: data.text_draws.iter().map(|d| d.vertex_count()).sum(),
            bloom_steps: plan.bloom.len(),
            skipped_draws: data.skipped,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gather::tests::{MockAssets, opaque_and_transparent};
    use lumen_scene::camera::Camera;

    fn gathered() -> FrameData {
        let assets = MockAssets {
            mesh_count: 1,
            fonts: vec![],
        };
        let mut data = FrameData::gather(&opaque_and_transparent(), &Camera::default(), &assets);
        data.sort_transparent();
        data
    }

    #[test]
    fn one_opaque_one_transparent_end_to_end() {
        let data = gathered();
        let plan = FramePlan::build(&data, Some(3));

        // prepass 只有不透明物体
        assert_eq!(plan.prepass.len(), 1);
        assert!(!data.draws[plan.prepass[0]].transparent);

        // main pass：天空盒在最前，透明物体在最后
        assert_eq!(plan.main[0], MainDraw::Skybox);
        let meshes: Vec<_> = plan.main_mesh_draws().copied().collect();
        assert_eq!(meshes.len(), 2);
        assert_eq!(meshes[0], MainDraw::Opaque(0));
        assert_eq!(meshes[1], MainDraw::Transparent(1));
        assert!(data.draws[1].transparent);

        assert_eq!(plan.bloom.len(), 5);
    }

    #[test]
    fn particles_and_text_follow_meshes() {
        let mut data = gathered();
        data.particle_draws.push(crate::gather::ParticleDraw {
            first_particle: 0,
            alive_count: 2,
            texture: u32::MAX,
        });
        let plan = FramePlan::build(&data, None);

        assert_eq!(plan.main.last(), Some(&MainDraw::Particles(0)));
        assert!(plan.bloom.is_empty());

        let stats = FrameStats::new(&data, &plan);
        assert_eq!(stats.particle_vertices, 12);
        assert_eq!(stats.transparent_draws, 1);
        assert_eq!(stats.prepass_draws, 1);
    }

    #[test]
    fn empty_scene_still_draws_skybox() {
        let plan = FramePlan::build(&FrameData::default(), Some(1));
        assert_eq!(plan.main, vec![MainDraw::Skybox]);
        assert!(plan.prepass.is_empty());
        assert_eq!(plan.bloom.len(), 1);
    }
}
