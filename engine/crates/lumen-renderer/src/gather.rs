use std::collections::{HashMap, VecDeque};

use glam::{Mat4, Vec4};

use lumen_asset::asset_hub::AssetHub;
use lumen_asset::font::{Font, FontHandle};
use lumen_asset::mesh::MeshHandle;
use lumen_render_interface::bindless::INVALID_BINDLESS_INDEX;
use lumen_render_interface::gpu_resources::{GpuResources, TextureHandle};
use lumen_scene::camera::Camera;
use lumen_scene::components::light::Light;
use lumen_scene::components::text::RenderMode;
use lumen_scene::scene_manager::SceneManager;

use crate::gpu_data::{GpuDirectionalLight, GpuGlyph, GpuParticle, GpuPointLight, GpuSpotLight, GpuTextAdvance};

/// 收集阶段需要查询的资产信息
pub trait AssetLookup {
    /// mesh 已经失效时返回 None
    fn mesh_index_count(&self, mesh: MeshHandle) -> Option<u32>;
    fn font(&self, font: FontHandle) -> Option<&Font>;
    /// texture 已经失效时返回 `INVALID_BINDLESS_INDEX`
    fn texture_index(&self, texture: TextureHandle) -> u32;
}

/// 运行时使用的查询：mesh 和 font 来自 `AssetHub`，texture 来自 `GpuResources`
pub struct LiveAssets<'a> {
    pub hub: &'a AssetHub,
    pub gpu: &'a GpuResources,
}
impl AssetLookup for LiveAssets<'_> {
    #[inline]
    fn mesh_index_count(&self, mesh: MeshHandle) -> Option<u32> {
        self.hub.mesh(mesh).map(|m| m.index_count())
    }

    #[inline]
    fn font(&self, font: FontHandle) -> Option<&Font> {
        self.hub.font(font)
    }

    #[inline]
    fn texture_index(&self, texture: TextureHandle) -> u32 {
        if self.gpu.texture(texture).is_some() { texture.index() } else { INVALID_BINDLESS_INDEX }
    }
}

/// 一次 mesh 绘制
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeshDraw {
    pub mesh: MeshHandle,
    /// 在 transforms buffer 中的下标
    pub model_id: u32,
    pub index_count: u32,

    pub base_color: Vec4,
    pub emissive: Vec4,
    pub metallic: f32,
    pub roughness: f32,
    /// bindless 下标，没有纹理时为 `INVALID_BINDLESS_INDEX`
    pub base_color_texture: u32,
    pub double_sided: bool,
    pub transparent: bool,

    /// 到相机距离的平方
    pub distance_sq: f32,
}

/// 一个发射器：`alive_count * 6` 个顶点的非索引绘制
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParticleDraw {
    pub first_particle: u32,
    pub alive_count: u32,
    pub texture: u32,
}
impl ParticleDraw {
    #[inline]
    pub fn vertex_count(&self) -> u32 {
        self.alive_count * 6
    }
}

/// 一段文字：`glyph_count * 6` 个顶点的非索引绘制
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextDraw {
    pub first_glyph: u32,
    pub glyph_count: u32,
    pub model_id: u32,
    pub atlas: u32,
    pub size: f32,
    pub color: Vec4,
    pub mode: RenderMode,
}
impl TextDraw {
    #[inline]
    pub fn vertex_count(&self) -> u32 {
        self.glyph_count * 6
    }
}

/// 一帧的 CPU 侧数据，每帧重新构建
#[derive(Debug, Default)]
pub struct FrameData {
    /// 前 `opaque_count` 个是不透明物体，之后是透明物体
    pub draws: VecDeque<MeshDraw>,
    pub opaque_count: usize,

    pub transforms: Vec<Mat4>,

    pub directional_lights: Vec<GpuDirectionalLight>,
    pub point_lights: Vec<GpuPointLight>,
    pub spot_lights: Vec<GpuSpotLight>,

    pub particles: Vec<GpuParticle>,
    pub particle_draws: Vec<ParticleDraw>,

    pub text_advance: Vec<GpuTextAdvance>,
    pub text_glyphs: Vec<GpuGlyph>,
    pub text_draws: Vec<TextDraw>,

    /// 因为资产失效而跳过的绘制
    pub skipped: usize,
}
// getters
impl FrameData {
    #[inline]
    pub fn opaque_draws(&self) -> impl Iterator<Item = &MeshDraw> {
        self.draws.iter().take(self.opaque_count)
    }

    #[inline]
    pub fn transparent_draws(&self) -> impl Iterator<Item = &MeshDraw> {
        self.draws.iter().skip(self.opaque_count)
    }

    #[inline]
    pub fn transparent_count(&self) -> usize {
        self.draws.len() - self.opaque_count
    }
}
// tools
impl FrameData {
    /// 遍历一次场景，填充所有 CPU 侧数组
    pub fn gather(scene: &SceneManager, camera: &Camera, assets: &impl AssetLookup) -> Self {
        let _span = tracy_client::span!("FrameData::gather");
        let mut data = Self::default();
        data.gather_lights(scene);
        data.gather_meshes(scene, camera, assets);
        data.gather_particles(scene, assets);
        data.gather_texts(scene, assets);

        if data.skipped > 0 {
            log::debug!("gather: skipped {} draws with missing assets", data.skipped);
        }
        data
    }

    /// 只对透明物体按照距离从远到近排序，稳定排序
    pub fn sort_transparent(&mut self) {
        let _span = tracy_client::span!("FrameData::sort_transparent");
        let opaque_count = self.opaque_count;
        self.draws.make_contiguous()[opaque_count..]
            .sort_by(|a, b| b.distance_sq.total_cmp(&a.distance_sq));
    }

    fn gather_lights(&mut self, scene: &SceneManager) {
        for (transform, light) in scene.lights() {
            match *light {
                Light::Directional { .. } => {
                    self.directional_lights.push(GpuDirectionalLight::new(transform, light));
                }
                Light::Point { range, .. } => {
                    self.point_lights.push(GpuPointLight::new(transform, range, light));
                }
                Light::Spot {
                    range,
                    inner_angle,
                    outer_angle,
                    ..
                } => {
                    self.spot_lights.push(GpuSpotLight::new(transform, range, inner_angle, outer_angle, light));
                }
            }
        }
    }

    /// 不透明物体放在 deque 前端，透明物体放在后端
    fn gather_meshes(&mut self, scene: &SceneManager, camera: &Camera, assets: &impl AssetLookup) {
        for (transform, mesh, material) in scene.mesh_draws() {
            let Some(index_count) = assets.mesh_index_count(mesh) else {
                self.skipped += 1;
                continue;
            };

            let model_id = self.transforms.len() as u32;
            self.transforms.push(transform.matrix());

            let draw = MeshDraw {
                mesh,
                model_id,
                index_count,
                base_color: material.base_color,
                emissive: material.emissive,
                metallic: material.metallic,
                roughness: material.roughness,
                base_color_texture: material
                    .base_color_texture
                    .map_or(INVALID_BINDLESS_INDEX, |t| assets.texture_index(t)),
                double_sided: material.double_sided,
                transparent: material.is_transparent(),
                distance_sq: camera.distance_squared(transform.translation),
            };
            if draw.transparent {
                self.draws.push_back(draw);
            } else {
                self.draws.push_front(draw);
                self.opaque_count += 1;
            }
        }
    }

    fn gather_particles(&mut self, scene: &SceneManager, assets: &impl AssetLookup) {
        for (_transform, emitter, texture) in scene.emitters() {
            if emitter.alive_count() == 0 {
                continue;
            }
            let first_particle = self.particles.len() as u32;
            let size = emitter.config().size;
            self.particles.extend(emitter.particles().iter().map(|p| GpuParticle {
                position_size: p.position.extend(size),
                color: emitter.color_of(p),
            }));
            self.particle_draws.push(ParticleDraw {
                first_particle,
                alive_count: emitter.alive_count() as u32,
                texture: texture.map_or(INVALID_BINDLESS_INDEX, |t| assets.texture_index(t)),
            });
        }
    }

    /// 每个字体的字形表只上传一次，glyph 下标加上字体在表中的起点
    fn gather_texts(&mut self, scene: &SceneManager, assets: &impl AssetLookup) {
        let mut font_bases: HashMap<FontHandle, u32> = HashMap::new();

        for (transform, run, mode) in scene.texts() {
            let Some(font) = assets.font(run.font) else {
                self.skipped += 1;
                continue;
            };
            let placed = font.layout(&run.text, run.size);
            if placed.is_empty() {
                continue;
            }

            let glyph_base = *font_bases.entry(run.font).or_insert_with(|| {
                let base = self.text_glyphs.len() as u32;
                self.text_glyphs.extend(font.glyphs().iter().map(GpuGlyph::from));
                base
            });

            let model_id = self.transforms.len() as u32;
            self.transforms.push(transform.matrix());

            let first_glyph = self.text_advance.len() as u32;
            self.text_advance.extend(placed.iter().map(|g| GpuTextAdvance {
                pen: g.pen,
                glyph: glyph_base + g.glyph_index,
                _padding: 0,
            }));
            self.text_draws.push(TextDraw {
                first_glyph,
                glyph_count: placed.len() as u32,
                model_id,
                atlas: assets.texture_index(font.atlas()),
                size: run.size,
                color: run.color,
                mode,
            });
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use glam::Vec3;
    use lumen_scene::components::material::Material;
    use lumen_scene::components::particle::{EmitterConfig, ParticleEmitter};
    use lumen_scene::components::text::TextRun;
    use lumen_scene::components::transform::Transform;

    /// 不需要 GPU 的资产表：index 小于 mesh_count 的 mesh 有效
    pub(crate) struct MockAssets {
        pub mesh_count: u32,
        pub fonts: Vec<(FontHandle, Font)>,
    }
    impl AssetLookup for MockAssets {
        fn mesh_index_count(&self, mesh: MeshHandle) -> Option<u32> {
            (mesh.index() < self.mesh_count).then_some(36)
        }

        fn font(&self, font: FontHandle) -> Option<&Font> {
            self.fonts.iter().find(|(h, _)| *h == font).map(|(_, f)| f)
        }

        fn texture_index(&self, texture: TextureHandle) -> u32 {
            if texture.is_null() { INVALID_BINDLESS_INDEX } else { texture.index() }
        }
    }

    const FONT_METRICS: &str = r#"{
        "atlas": { "width": 32, "height": 16 },
        "line_height": 1.2,
        "glyphs": [
            { "unicode": 32, "advance": 0.3 },
            { "unicode": 63, "advance": 0.5,
              "plane_bounds": { "left": 0.0, "bottom": 0.0, "right": 0.5, "top": 0.7 },
              "atlas_bounds": { "left": 16, "bottom": 0, "right": 32, "top": 16 } },
            { "unicode": 65, "advance": 0.6,
              "plane_bounds": { "left": 0.0, "bottom": 0.0, "right": 0.6, "top": 0.7 },
              "atlas_bounds": { "left": 0, "bottom": 0, "right": 16, "top": 16 } }
        ]
    }"#;

    pub(crate) fn test_font() -> Font {
        Font::from_json_str("test", FONT_METRICS, TextureHandle::null()).unwrap()
    }

    pub(crate) fn mesh(index: u32) -> MeshHandle {
        MeshHandle::from_raw(index, 0)
    }

    pub(crate) fn sample_draw() -> MeshDraw {
        MeshDraw {
            mesh: mesh(0),
            model_id: 0,
            index_count: 36,
            base_color: Vec4::ONE,
            emissive: Vec4::ZERO,
            metallic: 0.0,
            roughness: 0.5,
            base_color_texture: INVALID_BINDLESS_INDEX,
            double_sided: false,
            transparent: false,
            distance_sq: 0.0,
        }
    }

    /// 一个不透明物体在 z = -10，一个透明物体在 z = -5
    pub(crate) fn opaque_and_transparent() -> SceneManager {
        let mut scene = SceneManager::new();
        let opaque = scene.add_material(Material::default());
        let glass = scene.add_material(Material::transparent(Vec4::new(1.0, 1.0, 1.0, 0.5)));
        scene.add_mesh_instance(Transform::from_translation(Vec3::new(0.0, 0.0, -10.0)), mesh(0), opaque);
        scene.add_mesh_instance(Transform::from_translation(Vec3::new(0.0, 0.0, -5.0)), mesh(0), glass);
        scene
    }

    fn assets() -> MockAssets {
        MockAssets {
            mesh_count: 1,
            fonts: vec![],
        }
    }

    #[test]
    fn opaque_front_transparent_back() {
        let mut scene = opaque_and_transparent();
        let glass = scene.add_material(Material::transparent(Vec4::ONE));
        let opaque = scene.add_material(Material::default());
        scene.add_mesh_instance(Transform::default(), mesh(0), glass);
        scene.add_mesh_instance(Transform::default(), mesh(0), opaque);

        let data = FrameData::gather(&scene, &Camera::default(), &assets());
        assert_eq!(data.draws.len(), 4);
        assert_eq!(data.opaque_count, 2);
        assert!(data.opaque_draws().all(|d| !d.transparent));
        assert!(data.transparent_draws().all(|d| d.transparent));
    }

    #[test]
    fn every_draw_owns_one_transform() {
        let scene = opaque_and_transparent();
        let data = FrameData::gather(&scene, &Camera::default(), &assets());
        assert_eq!(data.transforms.len(), 2);

        let mut model_ids: Vec<u32> = data.draws.iter().map(|d| d.model_id).collect();
        model_ids.sort();
        assert_eq!(model_ids, vec![0, 1]);
        for draw in &data.draws {
            let translation = data.transforms[draw.model_id as usize].w_axis.truncate();
            assert_eq!(translation.length_squared(), draw.distance_sq);
        }
    }

    #[test]
    fn transparent_sorted_back_to_front() {
        let mut scene = SceneManager::new();
        let glass = scene.add_material(Material::transparent(Vec4::ONE));
        for z in [-2.0, -8.0, -4.0] {
            scene.add_mesh_instance(Transform::from_translation(Vec3::new(0.0, 0.0, z)), mesh(0), glass);
        }
        let opaque = scene.add_material(Material::default());
        scene.add_mesh_instance(Transform::from_translation(Vec3::new(0.0, 0.0, -1.0)), mesh(0), opaque);

        let mut data = FrameData::gather(&scene, &Camera::default(), &assets());
        data.sort_transparent();

        let distances: Vec<f32> = data.transparent_draws().map(|d| d.distance_sq).collect();
        assert_eq!(distances, vec![64.0, 16.0, 4.0]);
        assert_eq!(data.draws[0].distance_sq, 1.0);
    }

    #[test]
    fn missing_assets_are_skipped() {
        let mut scene = opaque_and_transparent();
        let mat = scene.add_material(Material {
            base_color_texture: Some(TextureHandle::null()),
            ..Default::default()
        });
        scene.add_mesh_instance(Transform::default(), mesh(7), mat);
        scene.add_mesh_instance(Transform::default(), mesh(0), mat);
        scene.add_text(
            Transform::default(),
            TextRun::new("lost", FontHandle::from_raw(3, 0), 1.0),
            RenderMode::Screen,
        );

        let data = FrameData::gather(&scene, &Camera::default(), &assets());
        assert_eq!(data.skipped, 2);
        assert_eq!(data.draws.len(), 3);
        assert_eq!(data.transforms.len(), 3);
        // 失效的纹理退化为无纹理绘制
        assert_eq!(data.draws[0].base_color_texture, INVALID_BINDLESS_INDEX);
    }

    #[test]
    fn lights_go_to_their_own_arrays() {
        let mut scene = SceneManager::new();
        scene.add_light(
            Transform::default(),
            Light::Directional {
                color: Vec3::ONE,
                intensity: 1.0,
            },
        );
        for _ in 0..2 {
            scene.add_light(
                Transform::from_translation(Vec3::Y),
                Light::Point {
                    color: Vec3::ONE,
                    intensity: 3.0,
                    range: 4.0,
                },
            );
        }
        let data = FrameData::gather(&scene, &Camera::default(), &assets());
        assert_eq!(data.directional_lights.len(), 1);
        assert_eq!(data.point_lights.len(), 2);
        assert!(data.spot_lights.is_empty());
        assert_eq!(data.point_lights[0].position_range, Vec4::new(0.0, 1.0, 0.0, 4.0));
    }

    #[test]
    fn particles_and_text_are_packed() {
        let mut scene = SceneManager::new();
        let config = EmitterConfig {
            spawn_rate: 3.0,
            velocity_jitter: 0.0,
            ..Default::default()
        };
        scene.add_emitter(Transform::default(), ParticleEmitter::new(config, 0));
        scene.add_emitter(Transform::default(), ParticleEmitter::new(config, 1));
        scene.update(1.0);

        let font_handle = FontHandle::from_raw(0, 0);
        scene.add_text(Transform::default(), TextRun::new("AA", font_handle, 1.0), RenderMode::World);
        scene.add_text(Transform::default(), TextRun::new("A", font_handle, 1.0), RenderMode::Screen);

        let assets = MockAssets {
            mesh_count: 0,
            fonts: vec![(font_handle, test_font())],
        };
        let data = FrameData::gather(&scene, &Camera::default(), &assets);

        assert_eq!(data.particles.len(), 6);
        assert_eq!(data.particle_draws[1].first_particle, 3);
        assert_eq!(data.particle_draws[1].vertex_count(), 18);

        // 同一个字体的字形表只出现一次
        assert_eq!(data.text_glyphs.len(), 3);
        assert_eq!(data.text_advance.len(), 3);
        assert_eq!(data.text_draws[1].first_glyph, 2);
        assert_eq!(data.text_draws[0].vertex_count(), 12);
        assert_eq!(data.text_draws[1].mode, RenderMode::Screen);
        assert_eq!(data.transforms.len(), 2);
    }
}
