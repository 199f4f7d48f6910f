use glam::{Vec3, Vec4};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use lumen_render_interface::gpu_resources::TextureHandle;

/// 发射器的参数
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EmitterConfig {
    /// 每秒产生的粒子数量
    pub spawn_rate: f32,
    /// 秒
    pub lifetime: f32,
    pub initial_velocity: Vec3,
    /// 初速度每个分量上的随机扰动幅度
    pub velocity_jitter: f32,
    pub gravity: Vec3,
    pub size: f32,
    pub start_color: Vec4,
    pub end_color: Vec4,
    pub max_particles: usize,
}
impl Default for EmitterConfig {
    fn default() -> Self {
        Self {
            spawn_rate: 32.0,
            lifetime: 2.0,
            initial_velocity: Vec3::Y,
            velocity_jitter: 0.25,
            gravity: Vec3::new(0.0, -0.5, 0.0),
            size: 0.05,
            start_color: Vec4::ONE,
            end_color: Vec4::new(1.0, 1.0, 1.0, 0.0),
            max_particles: 256,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Particle {
    /// 世界空间
    pub position: Vec3,
    pub velocity: Vec3,
    pub age: f32,
}

/// CPU 模拟的粒子发射器
///
/// 数据每帧由 renderer 整体上传，GPU 侧每个粒子展开成 6 个顶点的 quad。
pub struct ParticleEmitter {
    config: EmitterConfig,
    particles: Vec<Particle>,
    spawn_accumulator: f32,
    rng: StdRng,
    texture: Option<TextureHandle>,
}
// new & init
impl ParticleEmitter {
    pub fn new(config: EmitterConfig, seed: u64) -> Self {
        Self {
            particles: Vec::with_capacity(config.max_particles),
            config,
            spawn_accumulator: 0.0,
            rng: StdRng::seed_from_u64(seed),
            texture: None,
        }
    }

    #[inline]
    pub fn with_texture(mut self, texture: TextureHandle) -> Self {
        self.texture = Some(texture);
        self
    }
}
// getters
impl ParticleEmitter {
    #[inline]
    pub fn config(&self) -> &EmitterConfig {
        &self.config
    }

    #[inline]
    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    #[inline]
    pub fn alive_count(&self) -> usize {
        self.particles.len()
    }

    #[inline]
    pub fn texture(&self) -> Option<TextureHandle> {
        self.texture
    }

    /// 根据年龄在 start_color 和 end_color 之间插值
    #[inline]
    pub fn color_of(&self, particle: &Particle) -> Vec4 {
        let t = (particle.age / self.config.lifetime.max(f32::EPSILON)).clamp(0.0, 1.0);
        self.config.start_color.lerp(self.config.end_color, t)
    }
}
// update
impl ParticleEmitter {
    /// 推进 dt 秒：移除死亡的粒子，积分其余粒子，然后在 origin 处产生新粒子
    pub fn update(&mut self, dt: f32, origin: Vec3) {
        let _span = tracy_client::span!("ParticleEmitter::update");
        let lifetime = self.config.lifetime;
        let gravity = self.config.gravity;

        self.particles.retain_mut(|p| {
            p.age += dt;
            if p.age >= lifetime {
                return false;
            }
            p.velocity += gravity * dt;
            p.position += p.velocity * dt;
            true
        });

        self.spawn_accumulator += self.config.spawn_rate * dt;
        let room = self.config.max_particles.saturating_sub(self.particles.len());
        let spawn_count = (self.spawn_accumulator.floor() as usize).min(room);
        self.spawn_accumulator -= self.spawn_accumulator.floor();

        for _ in 0..spawn_count {
            let particle = Particle {
                position: origin,
                velocity: self.config.initial_velocity + self.jitter(),
                age: 0.0,
            };
            self.particles.push(particle);
        }
    }

    fn jitter(&mut self) -> Vec3 {
        let j = self.config.velocity_jitter;
        if j <= 0.0 {
            return Vec3::ZERO;
        }
        Vec3::new(
            self.rng.gen_range(-j..=j),
            self.rng.gen_range(-j..=j),
            self.rng.gen_range(-j..=j),
        )
    }

    pub fn clear(&mut self) {
        self.particles.clear();
        self.spawn_accumulator = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn still_config() -> EmitterConfig {
        EmitterConfig {
            spawn_rate: 10.0,
            lifetime: 1.0,
            initial_velocity: Vec3::X,
            velocity_jitter: 0.0,
            gravity: Vec3::ZERO,
            max_particles: 8,
            ..Default::default()
        }
    }

    #[test]
    fn spawns_at_rate_and_caps_at_max() {
        let mut emitter = ParticleEmitter::new(
            EmitterConfig {
                lifetime: 10.0,
                ..still_config()
            },
            7,
        );
        emitter.update(0.5, Vec3::ZERO);
        assert_eq!(emitter.alive_count(), 5);

        emitter.update(0.5, Vec3::ZERO);
        assert_eq!(emitter.alive_count(), 8);
    }

    #[test]
    fn particles_expire_after_lifetime() {
        let mut emitter = ParticleEmitter::new(
            EmitterConfig {
                spawn_rate: 4.0,
                ..still_config()
            },
            1,
        );
        emitter.update(0.5, Vec3::ZERO);
        assert_eq!(emitter.alive_count(), 2);

        // 停止产生新粒子之后，旧粒子在 lifetime 之后全部消失
        emitter.config.spawn_rate = 0.0;
        emitter.update(0.6, Vec3::ZERO);
        assert_eq!(emitter.alive_count(), 2);
        emitter.update(0.5, Vec3::ZERO);
        assert_eq!(emitter.alive_count(), 0);
    }

    #[test]
    fn integrates_velocity() {
        let mut emitter = ParticleEmitter::new(
            EmitterConfig {
                spawn_rate: 1.0,
                ..still_config()
            },
            3,
        );
        emitter.update(1.0, Vec3::new(0.0, 5.0, 0.0));
        assert_eq!(emitter.particles()[0].position, Vec3::new(0.0, 5.0, 0.0));

        emitter.config.spawn_rate = 0.0;
        emitter.update(0.5, Vec3::ZERO);
        assert_eq!(emitter.particles()[0].position, Vec3::new(0.5, 5.0, 0.0));
        assert_eq!(emitter.color_of(&emitter.particles()[0]).w, 0.5);
    }

    #[test]
    fn same_seed_gives_same_particles() {
        let config = EmitterConfig {
            velocity_jitter: 1.0,
            ..still_config()
        };
        let mut a = ParticleEmitter::new(config, 42);
        let mut b = ParticleEmitter::new(config, 42);
        a.update(0.5, Vec3::ZERO);
        b.update(0.5, Vec3::ZERO);
        assert_eq!(a.particles(), b.particles());
    }
}
