//! 演示场景：地面、若干不透明和透明的立方体、三种光源、一个粒子发射器以及两段文字

use glam::{Quat, Vec2, Vec3, Vec4};

use lumen_asset::asset_hub::{AssetHub, TextureRequest};
use lumen_asset::font::Font;
use lumen_asset::mesh::{AttributeData, MeshData};
use lumen_asset::texture::TextureConfig;
use lumen_crate_tools::resource::LumenPath;
use lumen_gfx::pipelines::reflection::VertexSemantic;
use lumen_render_interface::gpu_resources::GpuResources;
use lumen_scene::components::light::Light;
use lumen_scene::components::material::Material;
use lumen_scene::components::particle::{EmitterConfig, ParticleEmitter};
use lumen_scene::components::text::{RenderMode, TextRun};
use lumen_scene::components::transform::Transform;
use lumen_scene::scene_manager::SceneManager;

/// 中心在原点、边长为 1 的立方体，每个面 4 个顶点
fn cube_mesh() -> MeshData {
    let faces = [
        (Vec3::X, Vec3::Y),
        (Vec3::NEG_X, Vec3::Y),
        (Vec3::Y, Vec3::NEG_Z),
        (Vec3::NEG_Y, Vec3::Z),
        (Vec3::Z, Vec3::Y),
        (Vec3::NEG_Z, Vec3::Y),
    ];
    let mut positions = Vec::with_capacity(24);
    let mut normals = Vec::with_capacity(24);
    let mut uvs = Vec::with_capacity(24);
    let mut indices = Vec::with_capacity(36);

    for (normal, up) in faces {
        let right = up.cross(normal);
        let base = positions.len() as u32;
        for (u, v) in [(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)] {
            positions.push(normal * 0.5 + right * (u - 0.5) + up * (v - 0.5));
            normals.push(normal);
            uvs.push(Vec2::new(u, 1.0 - v));
        }
        indices.extend([base, base + 1, base + 2, base, base + 2, base + 3]);
    }

    MeshData::new("cube", positions, indices)
        .with_attribute(VertexSemantic::Normal, AttributeData::Vec3(normals))
        .with_attribute(VertexSemantic::Uv0, AttributeData::Vec2(uvs))
}

/// xz 平面上边长为 size 的正方形
fn plane_mesh(size: f32) -> MeshData {
    let half = size * 0.5;
    let positions = vec![
        Vec3::new(-half, 0.0, half),
        Vec3::new(half, 0.0, half),
        Vec3::new(half, 0.0, -half),
        Vec3::new(-half, 0.0, -half),
    ];
    let uvs = vec![Vec2::new(0.0, size), Vec2::new(size, size), Vec2::new(size, 0.0), Vec2::ZERO];
    MeshData::new("plane", positions, vec![0, 1, 2, 0, 2, 3])
        .with_attribute(VertexSemantic::Normal, AttributeData::Vec3(vec![Vec3::Y; 4]))
        .with_attribute(VertexSemantic::Uv0, AttributeData::Vec2(uvs))
}

/// 纹理和字体缺失时只输出警告，对应的物体退化为无纹理或者不绘制
pub fn build(assets: &mut AssetHub, gpu: &mut GpuResources) -> anyhow::Result<SceneManager> {
    let _span = tracy_client::span!("demo_scene::build");
    let mut scene = SceneManager::new();

    let cube = assets.upload_mesh(&cube_mesh())?;
    let plane = assets.upload_mesh(&plane_mesh(20.0))?;

    let requests = [
        TextureRequest {
            path: LumenPath::assets_path("uv_checker.png"),
            config: TextureConfig::default(),
        },
        TextureRequest {
            path: LumenPath::assets_path("skybox.hdr.png"),
            config: TextureConfig::default(),
        },
        TextureRequest {
            path: LumenPath::assets_path("fonts/roboto.png"),
            config: TextureConfig {
                generate_mips: false,
                ..TextureConfig::linear()
            },
        },
    ];
    let mut textures = assets.load_textures(gpu, &requests).into_iter().zip(&requests).map(|(result, request)| {
        result
            .inspect_err(|e| log::warn!("texture {} unavailable: {}", request.path.display(), e))
            .ok()
    });
    let checker = textures.next().flatten();
    let skybox = textures.next().flatten();
    let font_atlas = textures.next().flatten();
    scene.set_skybox(skybox);

    // 地面和不透明物体
    let ground = scene.add_material(Material {
        base_color_texture: checker,
        roughness: 0.9,
        ..Default::default()
    });
    scene.add_mesh_instance(Transform::default(), plane, ground);

    let metal = scene.add_material(Material {
        base_color: Vec4::new(0.95, 0.64, 0.54, 1.0),
        metallic: 1.0,
        roughness: 0.3,
        ..Default::default()
    });
    let glowing = scene.add_material(Material {
        base_color: Vec4::new(0.1, 0.1, 0.1, 1.0),
        emissive: Vec4::new(4.0, 1.5, 0.4, 0.0),
        ..Default::default()
    });
    for (i, material) in [metal, ground, glowing].into_iter().enumerate() {
        let x = (i as f32 - 1.0) * 2.0;
        let transform = Transform::from_translation(Vec3::new(x, 0.5, -4.0))
            .with_rotation(Quat::from_rotation_y(i as f32 * 0.4));
        scene.add_mesh_instance(transform, cube, material);
    }

    // 透明物体，排序之后由远到近绘制
    for (i, color) in [Vec4::new(0.2, 0.6, 1.0, 0.4), Vec4::new(1.0, 0.3, 0.3, 0.5)].into_iter().enumerate() {
        let material = scene.add_material(Material {
            double_sided: true,
            ..Material::transparent(color)
        });
        let transform =
            Transform::from_translation(Vec3::new(i as f32 * 1.2 - 0.6, 1.0, -1.5 - i as f32 * 1.5))
                .with_scale(Vec3::splat(0.8));
        scene.add_mesh_instance(transform, cube, material);
    }

    // 光源
    scene.add_light(
        Transform::default().with_rotation(Quat::from_euler(glam::EulerRot::YXZ, 0.6, -0.9, 0.0)),
        Light::Directional {
            color: Vec3::new(1.0, 0.96, 0.9),
            intensity: 2.5,
        },
    );
    scene.add_light(
        Transform::from_translation(Vec3::new(2.0, 1.5, -2.5)),
        Light::Point {
            color: Vec3::new(0.3, 0.6, 1.0),
            intensity: 6.0,
            range: 6.0,
        },
    );
    scene.add_light(
        Transform::from_translation(Vec3::new(-2.0, 3.0, -4.0))
            .with_rotation(Quat::from_rotation_x(-std::f32::consts::FRAC_PI_2)),
        Light::Spot {
            color: Vec3::new(1.0, 0.8, 0.5),
            intensity: 10.0,
            range: 8.0,
            inner_angle: 0.3,
            outer_angle: 0.5,
        },
    );

    // 粒子
    scene.add_emitter(
        Transform::from_translation(Vec3::new(2.0, 1.0, -4.0)),
        ParticleEmitter::new(
            EmitterConfig {
                start_color: Vec4::new(3.0, 1.2, 0.3, 1.0),
                end_color: Vec4::new(1.0, 0.1, 0.0, 0.0),
                ..Default::default()
            },
            7,
        ),
    );

    // 文字
    if let Some(atlas) = font_atlas {
        match Font::load(&LumenPath::assets_path("fonts/roboto.json"), atlas) {
            Ok(font) => {
                let font = assets.add_font(font);
                scene.add_text(
                    Transform::from_translation(Vec3::new(-2.0, 2.0, -5.0)),
                    TextRun::new("Lumen", font, 0.6),
                    RenderMode::World,
                );
                scene.add_text(
                    Transform::from_translation(Vec3::new(16.0, 32.0, 0.0)),
                    TextRun {
                        color: Vec4::new(1.0, 1.0, 1.0, 0.8),
                        ..TextRun::new("WASD/QE move, RMB look, F1 wireframe", font, 20.0)
                    },
                    RenderMode::Screen,
                );
            }
            Err(e) => log::warn!("font unavailable: {}", e),
        }
    }

    log::info!("demo scene: {} mesh instances", scene.instance_count());
    Ok(scene)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn procedural_meshes_are_valid() {
        let cube = cube_mesh();
        cube.validate().unwrap();
        assert_eq!(cube.vertex_count(), 24);
        assert_eq!(cube.indices.len(), 36);

        let plane = plane_mesh(4.0);
        plane.validate().unwrap();
        assert_eq!(plane.vertex_count(), 4);
    }

    /// 每个面按照逆时针环绕，法线朝外
    #[test]
    fn cube_faces_wind_outwards() {
        let cube = cube_mesh();
        let Some(AttributeData::Vec3(positions)) = cube.attributes.get(&VertexSemantic::Position) else {
            panic!("cube has positions");
        };
        let Some(AttributeData::Vec3(normals)) = cube.attributes.get(&VertexSemantic::Normal) else {
            panic!("cube has normals");
        };
        for triangle in cube.indices.chunks(3) {
            let [a, b, c] = [0, 1, 2].map(|i| positions[triangle[i] as usize]);
            let face_normal = (b - a).cross(c - a).normalize();
            assert!(face_normal.dot(normals[triangle[0] as usize]) > 0.99);
        }
    }
}
