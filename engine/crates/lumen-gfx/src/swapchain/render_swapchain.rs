use ash::vk;
use ash::vk::Handle;
use itertools::Itertools;

use crate::commands::command_queue::GfxCommandQueue;
use crate::commands::semaphore::GfxSemaphore;
use crate::error::GfxResult;
use crate::gfx::Gfx;
use crate::resources::image_view::{GfxImageView, GfxImageViewDesc};
use crate::swapchain::surface::GfxSurface;

/// acquire 或者 present 的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GfxSwapchainStatus {
    Optimal,
    /// 仍然可以使用，但是应该重建
    Suboptimal,
    /// 必须重建之后才能继续使用
    OutOfDate,
}
impl GfxSwapchainStatus {
    #[inline]
    pub fn need_recreate(self) -> bool {
        self != Self::Optimal
    }
}

pub struct GfxRenderSwapchain {
    surface: GfxSurface,
    swapchain_handle: vk::SwapchainKHR,

    swapchain_images: Vec<vk::Image>,
    swapchain_image_views: Vec<GfxImageView>,
    swapchain_image_index: usize,

    surface_format: vk::SurfaceFormatKHR,
    present_mode: vk::PresentModeKHR,
    swapchain_extent: vk::Extent2D,
}

// new & init
impl GfxRenderSwapchain {
    pub fn new(
        surface: GfxSurface,
        preferred_present_mode: vk::PresentModeKHR,
        window_physical_extent: vk::Extent2D,
    ) -> GfxResult<Self> {
        let surface_format = Self::choose_surface_format(&surface.get_formats()?);
        let present_mode = Self::choose_present_mode(&surface.get_present_modes()?, preferred_present_mode);
        log::info!("swapchain surface format: {:?}, present mode: {:?}", surface_format, present_mode);

        let mut swapchain = Self {
            surface,
            swapchain_handle: vk::SwapchainKHR::null(),
            swapchain_images: vec![],
            swapchain_image_views: vec![],
            swapchain_image_index: 0,
            surface_format,
            present_mode,
            swapchain_extent: window_physical_extent,
        };
        swapchain.build(window_physical_extent)?;
        Ok(swapchain)
    }

    /// 调用之前需要保证 GPU 不再使用旧的 swapchain image
    pub fn recreate(&mut self, window_physical_extent: vk::Extent2D) -> GfxResult<()> {
        let _span = tracy_client::span!("GfxRenderSwapchain::recreate");
        self.build(window_physical_extent)
    }

    fn build(&mut self, window_physical_extent: vk::Extent2D) -> GfxResult<()> {
        let surface_capabilities = self.surface.get_capabilities()?;

        // 确定 window 的 extent 尺寸
        let extent = Self::calculate_swapchain_extent(&surface_capabilities, window_physical_extent);
        log::info!(
            "create swapchain:
            surface current extent: {}x{}, min extent: {}x{}, max extent: {}x{}
            window physical extent: {}x{}
            final swapchain extent: {}x{}",
            surface_capabilities.current_extent.width,
            surface_capabilities.current_extent.height,
            surface_capabilities.min_image_extent.width,
            surface_capabilities.min_image_extent.height,
            surface_capabilities.max_image_extent.width,
            surface_capabilities.max_image_extent.height,
            window_physical_extent.width,
            window_physical_extent.height,
            extent.width,
            extent.height
        );

        let old_swapchain = self.swapchain_handle;
        let swapchain_handle = self.create_swapchain(&surface_capabilities, extent, old_swapchain)?;

        let gfx_device = Gfx::get().gfx_device();
        self.swapchain_image_views.drain(..).for_each(GfxImageView::destroy);
        if !old_swapchain.is_null() {
            unsafe { gfx_device.swapchain.destroy_swapchain(old_swapchain, None) };
        }
        self.swapchain_handle = swapchain_handle;

        let images = unsafe { gfx_device.swapchain.get_swapchain_images(swapchain_handle)? };
        let mut image_views = Vec::with_capacity(images.len());
        for (idx, image) in images.iter().enumerate() {
            let view_desc = GfxImageViewDesc::new_2d(self.surface_format.format, vk::ImageAspectFlags::COLOR);
            image_views.push(GfxImageView::new(*image, view_desc, format!("swapchain-{idx}"))?);
        }

        self.swapchain_images = images;
        self.swapchain_image_views = image_views;
        self.swapchain_image_index = 0;
        self.swapchain_extent = extent;
        Ok(())
    }

    fn create_swapchain(
        &self,
        surface_capabilities: &vk::SurfaceCapabilitiesKHR,
        extent: vk::Extent2D,
        old_swapchain: vk::SwapchainKHR,
    ) -> GfxResult<vk::SwapchainKHR> {
        // max_image_count == 0，表示不限制 image 数量
        let image_count = if surface_capabilities.max_image_count == 0 {
            surface_capabilities.min_image_count + 1
        } else {
            u32::min(surface_capabilities.max_image_count, surface_capabilities.min_image_count + 1)
        };

        let create_info = vk::SwapchainCreateInfoKHR::default()
            .surface(self.surface.handle)
            .min_image_count(image_count)
            .image_format(self.surface_format.format)
            .image_color_space(self.surface_format.color_space)
            .image_extent(extent)
            .image_array_layers(1)
            // TRANSFER_DST 用于 Nsight 分析
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT | vk::ImageUsageFlags::TRANSFER_DST)
            .pre_transform(surface_capabilities.current_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(self.present_mode)
            .image_sharing_mode(vk::SharingMode::EXCLUSIVE)
            .clipped(true)
            .old_swapchain(old_swapchain);

        let gfx_device = Gfx::get().gfx_device();
        let swapchain_handle = unsafe { gfx_device.swapchain.create_swapchain(&create_info, None)? };
        gfx_device.set_object_debug_name(swapchain_handle, "main");
        Ok(swapchain_handle)
    }
}

// getters
impl GfxRenderSwapchain {
    #[inline]
    pub fn extent(&self) -> vk::Extent2D {
        self.swapchain_extent
    }

    #[inline]
    pub fn format(&self) -> vk::Format {
        self.surface_format.format
    }

    #[inline]
    pub fn image_count(&self) -> usize {
        self.swapchain_images.len()
    }

    #[inline]
    pub fn current_image(&self) -> vk::Image {
        self.swapchain_images[self.swapchain_image_index]
    }

    #[inline]
    pub fn current_image_view(&self) -> &GfxImageView {
        &self.swapchain_image_views[self.swapchain_image_index]
    }
}

// tools
impl GfxRenderSwapchain {
    /// 如果 surface_capabilities.current_extent 包含特殊值 0xFFFFFFFF，则表示可以自己设置交换链的 extent
    pub fn calculate_swapchain_extent(
        surface_capabilities: &vk::SurfaceCapabilitiesKHR,
        window_physical_extent: vk::Extent2D,
    ) -> vk::Extent2D {
        let surface_extent = surface_capabilities.current_extent;
        if surface_extent.width == u32::MAX || surface_extent.height == u32::MAX {
            let width = window_physical_extent
                .width
                .clamp(surface_capabilities.min_image_extent.width, surface_capabilities.max_image_extent.width);
            let height = window_physical_extent
                .height
                .clamp(surface_capabilities.min_image_extent.height, surface_capabilities.max_image_extent.height);
            vk::Extent2D { width, height }
        } else {
            surface_extent
        }
    }

    /// 优先 B8G8R8A8_SRGB，其次第一个可用的格式
    pub fn choose_surface_format(formats: &[vk::SurfaceFormatKHR]) -> vk::SurfaceFormatKHR {
        formats
            .iter()
            .copied()
            .find_or_first(|f| {
                f.format == vk::Format::B8G8R8A8_SRGB && f.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR
            })
            .unwrap_or(vk::SurfaceFormatKHR {
                format: vk::Format::B8G8R8A8_SRGB,
                color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
            })
    }

    /// FIFO 是一定支持的
    pub fn choose_present_mode(modes: &[vk::PresentModeKHR], preferred: vk::PresentModeKHR) -> vk::PresentModeKHR {
        if modes.contains(&preferred) { preferred } else { vk::PresentModeKHR::FIFO }
    }
}

// update
impl GfxRenderSwapchain {
    /// semaphore 会在 image 可用时 signal
    pub fn acquire_next_image(&mut self, semaphore: &GfxSemaphore, timeout: u64) -> GfxResult<GfxSwapchainStatus> {
        let _span = tracy_client::span!("GfxRenderSwapchain::acquire_next_image");
        let result = unsafe {
            Gfx::get().gfx_device().swapchain.acquire_next_image(
                self.swapchain_handle,
                timeout,
                semaphore.handle(),
                vk::Fence::null(),
            )
        };

        match result {
            Ok((image_index, is_suboptimal)) => {
                self.swapchain_image_index = image_index as usize;
                if is_suboptimal {
                    log::warn!("swapchain acquire image index {} is not optimal", image_index);
                    Ok(GfxSwapchainStatus::Suboptimal)
                } else {
                    Ok(GfxSwapchainStatus::Optimal)
                }
            }
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => {
                log::warn!("swapchain is out of date when acquire next image");
                Ok(GfxSwapchainStatus::OutOfDate)
            }
            Err(e) => Err(e.into()),
        }
    }

    pub fn present_image(
        &self,
        queue: &GfxCommandQueue,
        wait_semaphores: &[&GfxSemaphore],
    ) -> GfxResult<GfxSwapchainStatus> {
        let _span = tracy_client::span!("GfxRenderSwapchain::present_image");
        let wait_semaphores = wait_semaphores.iter().map(|s| s.handle()).collect_vec();
        let image_indices = [self.swapchain_image_index as u32];
        let present_info = vk::PresentInfoKHR::default()
            .wait_semaphores(&wait_semaphores)
            .image_indices(&image_indices)
            .swapchains(std::slice::from_ref(&self.swapchain_handle));

        let result = unsafe { Gfx::get().gfx_device().swapchain.queue_present(queue.handle(), &present_info) };
        match result {
            Ok(false) => Ok(GfxSwapchainStatus::Optimal),
            Ok(true) => {
                log::warn!("swapchain present image index {} is not optimal", self.swapchain_image_index);
                Ok(GfxSwapchainStatus::Suboptimal)
            }
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => {
                log::warn!("swapchain is out of date when present image");
                Ok(GfxSwapchainStatus::OutOfDate)
            }
            Err(e) => Err(e.into()),
        }
    }
}

// destroy
impl GfxRenderSwapchain {
    pub fn destroy(mut self) {
        self.swapchain_image_views.drain(..).for_each(GfxImageView::destroy);
        unsafe {
            let gfx_device = Gfx::get().gfx_device();
            gfx_device.swapchain.destroy_swapchain(self.swapchain_handle, None);
        }
        self.swapchain_handle = vk::SwapchainKHR::null();
    }
}
impl Drop for GfxRenderSwapchain {
    fn drop(&mut self) {
        debug_assert!(self.swapchain_handle.is_null(), "GfxRenderSwapchain must be destroyed manually");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_surface_extent_wins() {
        let caps = vk::SurfaceCapabilitiesKHR {
            current_extent: vk::Extent2D { width: 800, height: 600 },
            ..Default::default()
        };
        let extent = GfxRenderSwapchain::calculate_swapchain_extent(&caps, vk::Extent2D { width: 1, height: 1 });
        assert_eq!((extent.width, extent.height), (800, 600));
    }

    #[test]
    fn free_surface_extent_is_clamped() {
        let caps = vk::SurfaceCapabilitiesKHR {
            current_extent: vk::Extent2D {
                width: u32::MAX,
                height: u32::MAX,
            },
            min_image_extent: vk::Extent2D { width: 16, height: 16 },
            max_image_extent: vk::Extent2D {
                width: 4096,
                height: 2048,
            },
            ..Default::default()
        };
        let extent =
            GfxRenderSwapchain::calculate_swapchain_extent(&caps, vk::Extent2D { width: 8, height: 9000 });
        assert_eq!((extent.width, extent.height), (16, 2048));
    }

    #[test]
    fn present_mode_falls_back_to_fifo() {
        let modes = [vk::PresentModeKHR::FIFO, vk::PresentModeKHR::IMMEDIATE];
        assert_eq!(
            GfxRenderSwapchain::choose_present_mode(&modes, vk::PresentModeKHR::MAILBOX),
            vk::PresentModeKHR::FIFO
        );
        assert_eq!(
            GfxRenderSwapchain::choose_present_mode(&modes, vk::PresentModeKHR::IMMEDIATE),
            vk::PresentModeKHR::IMMEDIATE
        );
    }

    #[test]
    fn surface_format_prefers_srgb() {
        let formats = [
            vk::SurfaceFormatKHR {
                format: vk::Format::R8G8B8A8_UNORM,
                color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
            },
            vk::SurfaceFormatKHR {
                format: vk::Format::B8G8R8A8_SRGB,
                color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
            },
        ];
        assert_eq!(GfxRenderSwapchain::choose_surface_format(&formats).format, vk::Format::B8G8R8A8_SRGB);
        assert_eq!(GfxRenderSwapchain::choose_surface_format(&formats[..1]).format, vk::Format::R8G8B8A8_UNORM);
    }
}
