pub mod asset_hub;
pub mod error;
pub mod font;
pub mod mesh;
pub mod texture;
