use lumen_asset::error::AssetError;
use lumen_gfx::GfxError;
use lumen_render_interface::bindless::BindlessError;
use lumen_render_interface::frame_ring::FrameRingError;
use lumen_render_interface::push_constants::PushConstantError;

/// renderer 返回的错误都是致命的，可恢复的情况（失效的句柄、swapchain 过期）不会走到这里
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error(transparent)]
    Gfx(#[from] GfxError),

    #[error(transparent)]
    Bindless(#[from] BindlessError),

    #[error(transparent)]
    PushConstant(#[from] PushConstantError),

    #[error(transparent)]
    FrameRing(#[from] FrameRingError),

    #[error(transparent)]
    Asset(#[from] AssetError),

    #[error("render target at bindless slot {0} is no longer registered")]
    MissingRenderTarget(u32),

    #[error("pipeline variant set at slot {0} is no longer registered")]
    StaleVariantSet(u32),
}

pub type RenderResult<T> = Result<T, RenderError>;
