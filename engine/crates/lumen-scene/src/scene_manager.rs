use slotmap::SlotMap;

use lumen_asset::mesh::MeshHandle;
use lumen_render_interface::gpu_resources::TextureHandle;

use crate::components::light::Light;
use crate::components::material::Material;
use crate::components::particle::ParticleEmitter;
use crate::components::text::{RenderMode, TextRun};
use crate::components::transform::Transform;

slotmap::new_key_type! {
    pub struct MaterialKey;
    pub struct InstanceKey;
    pub struct LightKey;
    pub struct EmitterKey;
    pub struct TextKey;
}

/// 场景中一个使用 mesh 绘制的物体
#[derive(Debug, Clone, Copy)]
pub struct MeshInstance {
    pub transform: Transform,
    pub mesh: MeshHandle,
    pub material: MaterialKey,
}

pub struct EmitterInstance {
    pub transform: Transform,
    pub emitter: ParticleEmitter,
}

#[derive(Debug, Clone)]
pub struct TextInstance {
    pub transform: Transform,
    pub run: TextRun,
    pub mode: RenderMode,
}

/// 在 CPU 侧管理场景数据
#[derive(Default)]
pub struct SceneManager {
    all_mats: SlotMap<MaterialKey, Material>,
    all_instances: SlotMap<InstanceKey, MeshInstance>,
    all_lights: SlotMap<LightKey, (Transform, Light)>,
    all_emitters: SlotMap<EmitterKey, EmitterInstance>,
    all_texts: SlotMap<TextKey, TextInstance>,

    /// None 时天空盒使用程序化的渐变
    skybox: Option<TextureHandle>,

    default_material: Material,
}
// new & init
impl SceneManager {
    pub fn new() -> Self {
        Self::default()
    }
}
// getters
impl SceneManager {
    #[inline]
    pub fn material(&self, key: MaterialKey) -> Option<&Material> {
        self.all_mats.get(key)
    }

    #[inline]
    pub fn material_mut(&mut self, key: MaterialKey) -> Option<&mut Material> {
        self.all_mats.get_mut(key)
    }

    #[inline]
    pub fn instance_mut(&mut self, key: InstanceKey) -> Option<&mut MeshInstance> {
        self.all_instances.get_mut(key)
    }

    #[inline]
    pub fn emitter_mut(&mut self, key: EmitterKey) -> Option<&mut EmitterInstance> {
        self.all_emitters.get_mut(key)
    }

    #[inline]
    pub fn text_mut(&mut self, key: TextKey) -> Option<&mut TextInstance> {
        self.all_texts.get_mut(key)
    }

    #[inline]
    pub fn skybox(&self) -> Option<TextureHandle> {
        self.skybox
    }

    #[inline]
    pub fn instance_count(&self) -> usize {
        self.all_instances.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.all_instances.is_empty()
            && self.all_lights.is_empty()
            && self.all_emitters.is_empty()
            && self.all_texts.is_empty()
    }
}
// 供 renderer 遍历的查询
impl SceneManager {
    /// (transform, mesh, material)；材质已经被删除的物体使用默认材质
    pub fn mesh_draws(&self) -> impl Iterator<Item = (&Transform, MeshHandle, &Material)> + '_ {
        self.all_instances.values().map(|inst| {
            let material = self.all_mats.get(inst.material).unwrap_or(&self.default_material);
            (&inst.transform, inst.mesh, material)
        })
    }

    pub fn lights(&self) -> impl Iterator<Item = (&Transform, &Light)> + '_ {
        self.all_lights.values().map(|(t, l)| (t, l))
    }

    /// (transform, emitter, texture)
    pub fn emitters(&self) -> impl Iterator<Item = (&Transform, &ParticleEmitter, Option<TextureHandle>)> + '_ {
        self.all_emitters.values().map(|e| (&e.transform, &e.emitter, e.emitter.texture()))
    }

    pub fn texts(&self) -> impl Iterator<Item = (&Transform, &TextRun, RenderMode)> + '_ {
        self.all_texts.values().map(|t| (&t.transform, &t.run, t.mode))
    }
}
// update
impl SceneManager {
    pub fn add_material(&mut self, material: Material) -> MaterialKey {
        self.all_mats.insert(material)
    }

    pub fn add_mesh_instance(&mut self, transform: Transform, mesh: MeshHandle, material: MaterialKey) -> InstanceKey {
        self.all_instances.insert(MeshInstance {
            transform,
            mesh,
            material,
        })
    }

    pub fn add_light(&mut self, transform: Transform, light: Light) -> LightKey {
        self.all_lights.insert((transform, light))
    }

    pub fn add_emitter(&mut self, transform: Transform, emitter: ParticleEmitter) -> EmitterKey {
        log::debug!(
            "emitter added: {} particles/s, at most {} alive",
            emitter.config().spawn_rate,
            emitter.config().max_particles
        );
        self.all_emitters.insert(EmitterInstance { transform, emitter })
    }

    pub fn add_text(&mut self, transform: Transform, run: TextRun, mode: RenderMode) -> TextKey {
        self.all_texts.insert(TextInstance { transform, run, mode })
    }

    #[inline]
    pub fn set_skybox(&mut self, texture: Option<TextureHandle>) {
        self.skybox = texture;
    }

    pub fn remove_material(&mut self, key: MaterialKey) -> Option<Material> {
        self.all_mats.remove(key)
    }

    pub fn remove_instance(&mut self, key: InstanceKey) -> Option<MeshInstance> {
        self.all_instances.remove(key)
    }

    pub fn remove_light(&mut self, key: LightKey) -> Option<(Transform, Light)> {
        self.all_lights.remove(key)
    }

    pub fn remove_emitter(&mut self, key: EmitterKey) -> Option<EmitterInstance> {
        self.all_emitters.remove(key)
    }

    pub fn remove_text(&mut self, key: TextKey) -> Option<TextInstance> {
        self.all_texts.remove(key)
    }

    /// 推进所有粒子发射器
    pub fn update(&mut self, dt: f32) {
        let _span = tracy_client::span!("SceneManager::update");
        for inst in self.all_emitters.values_mut() {
            inst.emitter.update(dt, inst.transform.translation);
        }
    }

    pub fn clear(&mut self) {
        log::info!(
            "scene cleared: {} instances, {} lights, {} emitters, {} texts",
            self.all_instances.len(),
            self.all_lights.len(),
            self.all_emitters.len(),
            self.all_texts.len()
        );
        self.all_mats.clear();
        self.all_instances.clear();
        self.all_lights.clear();
        self.all_emitters.clear();
        self.all_texts.clear();
        self.skybox = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::particle::EmitterConfig;
    use glam::{Vec3, Vec4};

    #[test]
    fn draws_fall_back_to_default_material() {
        let mut scene = SceneManager::new();
        let mat = scene.add_material(Material::transparent(Vec4::splat(0.5)));
        scene.add_mesh_instance(Transform::default(), MeshHandle::null(), mat);
        assert!(scene.mesh_draws().all(|(_, _, m)| m.is_transparent()));

        scene.remove_material(mat);
        let (_, _, m) = scene.mesh_draws().next().unwrap();
        assert_eq!(*m, Material::default());
    }

    #[test]
    fn update_moves_emitters_from_their_transform() {
        let mut scene = SceneManager::new();
        let config = EmitterConfig {
            spawn_rate: 2.0,
            velocity_jitter: 0.0,
            ..Default::default()
        };
        scene.add_emitter(
            Transform::from_translation(Vec3::new(1.0, 0.0, 0.0)),
            ParticleEmitter::new(config, 0),
        );
        scene.update(1.0);

        let (_, emitter, texture) = scene.emitters().next().unwrap();
        assert_eq!(emitter.alive_count(), 2);
        assert_eq!(emitter.particles()[0].position, Vec3::new(1.0, 0.0, 0.0));
        assert!(texture.is_none());
        assert!(!scene.is_empty());
    }

    #[test]
    fn clear_empties_every_table() {
        let mut scene = SceneManager::new();
        let mat = scene.add_material(Material::default());
        scene.add_mesh_instance(Transform::default(), MeshHandle::null(), mat);
        scene.add_emitter(Transform::default(), ParticleEmitter::new(EmitterConfig::default(), 7));
        scene.set_skybox(Some(TextureHandle::from_raw(0, 0)));

        scene.clear();
        assert!(scene.is_empty());
        assert!(scene.mesh_draws().next().is_none());
        assert!(scene.emitters().next().is_none());
        assert!(scene.skybox().is_none());
    }
}
