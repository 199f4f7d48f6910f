pub mod light;
pub mod material;
pub mod particle;
pub mod text;
pub mod transform;
