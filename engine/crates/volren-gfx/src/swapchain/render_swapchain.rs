use ash::vk;
use ash::vk::Handle;
use itertools::Itertools;

use crate::{
    commands::semaphore::GfxSemaphore,
    error::{GfxError, GfxResult, VkResultExt},
    foundation::device::GfxDevice,
    swapchain::surface::GfxSurface,
};

/// 创建 swapchain 所需的参数
#[derive(Clone, Copy, Debug)]
pub struct GfxSwapchainDesc {
    pub present_mode: vk::PresentModeKHR,
    pub prefer_srgb: bool,
    pub image_count: u32,
    /// 窗口的物理尺寸
    pub window_extent: vk::Extent2D,
}

/// acquire 的结果
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GfxAcquire {
    /// 获取到了 image；`suboptimal` 时仍然可以渲染，但之后需要重建
    Acquired { suboptimal: bool },
    /// 需要先重建 swapchain
    OutOfDate,
}

pub struct GfxRenderSwapchain {
    swapchain_handle: vk::SwapchainKHR,

    swapchain_images: Vec<vk::Image>,
    swapchain_image_index: usize,

    surface_format: vk::SurfaceFormatKHR,
    present_mode: vk::PresentModeKHR,
    swapchain_extent: vk::Extent2D,
}

// new & init
impl GfxRenderSwapchain {
    /// `old_swapchain` 不为 null 时，会在新的 swapchain 创建之后被销毁
    pub fn new(
        device: &GfxDevice,
        pdevice: vk::PhysicalDevice,
        surface: &GfxSurface,
        desc: &GfxSwapchainDesc,
        old_swapchain: vk::SwapchainKHR,
    ) -> GfxResult<Self> {
        let _span = tracy_client::span!("GfxRenderSwapchain::new");

        let surface_capabilities = surface.capabilities(pdevice)?;
        let surface_format = choose_surface_format(&surface.formats(pdevice)?, desc.prefer_srgb).ok_or_else(|| {
            GfxError::MissingExtension {
                kind: "surface format",
                name: "any".to_string(),
            }
        })?;
        let present_mode = choose_present_mode(&surface.present_modes(pdevice)?, desc.present_mode);

        // 如果 surface_capabilities.current_extent 包含特殊值 0xFFFFFFFF，则表示可以自己设置交换链的 extent
        let extent = calculate_swapchain_extent(&surface_capabilities, desc.window_extent);
        let image_count = choose_image_count(&surface_capabilities, desc.image_count);
        log::info!(
            "create swapchain:
            surface current extent: {}x{}, min extent: {}x{}, max extent: {}x{}
            window physical extent: {}x{}
            final swapchain extent: {}x{}, image count: {}, format: {:?}, present mode: {:?}",
            surface_capabilities.current_extent.width,
            surface_capabilities.current_extent.height,
            surface_capabilities.min_image_extent.width,
            surface_capabilities.min_image_extent.height,
            surface_capabilities.max_image_extent.width,
            surface_capabilities.max_image_extent.height,
            desc.window_extent.width,
            desc.window_extent.height,
            extent.width,
            extent.height,
            image_count,
            surface_format.format,
            present_mode
        );

        let create_info = vk::SwapchainCreateInfoKHR::default()
            .surface(surface.handle())
            .min_image_count(image_count)
            .image_format(surface_format.format)
            .image_color_space(surface_format.color_space)
            .image_extent(extent)
            .image_array_layers(1)
            // TRANSFER_DST 用于 Nsight 分析
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT | vk::ImageUsageFlags::TRANSFER_DST)
            .pre_transform(surface_capabilities.current_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(present_mode)
            .image_sharing_mode(vk::SharingMode::EXCLUSIVE)
            .clipped(true)
            .old_swapchain(old_swapchain);

        let swapchain_handle =
            unsafe { device.swapchain().create_swapchain(&create_info, None) }.vk_context("create swapchain")?;
        device.set_object_debug_name(swapchain_handle, "main");
        if !old_swapchain.is_null() {
            unsafe { device.swapchain().destroy_swapchain(old_swapchain, None) };
        }

        let images = unsafe { device.swapchain().get_swapchain_images(swapchain_handle) }
            .vk_context("get swapchain images")?;
        for (i, image) in images.iter().enumerate() {
            device.set_object_debug_name(*image, format!("swapchain-image-{i}"));
        }

        Ok(Self {
            swapchain_handle,
            swapchain_images: images,
            swapchain_image_index: 0,
            surface_format,
            present_mode,
            swapchain_extent: extent,
        })
    }

    /// 交出 handle，作为新 swapchain 的 `old_swapchain`，之后 self 不再可用
    pub fn retire(&mut self) -> vk::SwapchainKHR {
        self.swapchain_images.clear();
        std::mem::replace(&mut self.swapchain_handle, vk::SwapchainKHR::null())
    }

    pub fn destroy(mut self, device: &GfxDevice) {
        log::info!("destroying swapchain");
        unsafe {
            device.swapchain().destroy_swapchain(self.swapchain_handle, None);
        }
        self.swapchain_handle = vk::SwapchainKHR::null();
    }
}

impl Drop for GfxRenderSwapchain {
    fn drop(&mut self) {
        debug_assert!(self.swapchain_handle.is_null(), "swapchain dropped without destroy");
    }
}

// getters
impl GfxRenderSwapchain {
    #[inline]
    pub fn images(&self) -> &[vk::Image] {
        &self.swapchain_images
    }

    #[inline]
    pub fn extent(&self) -> vk::Extent2D {
        self.swapchain_extent
    }

    #[inline]
    pub fn format(&self) -> vk::Format {
        self.surface_format.format
    }

    #[inline]
    pub fn present_mode(&self) -> vk::PresentModeKHR {
        self.present_mode
    }

    #[inline]
    pub fn current_image_index(&self) -> usize {
        self.swapchain_image_index
    }
}

// update
impl GfxRenderSwapchain {
    /// `OutOfDate` 时没有获取到 image，semaphore 也不会被 signal
    pub fn acquire_next_image(&mut self, device: &GfxDevice, semaphore: &GfxSemaphore) -> GfxResult<GfxAcquire> {
        let result = unsafe {
            device.swapchain().acquire_next_image(
                self.swapchain_handle,
                u64::MAX,
                semaphore.handle(),
                vk::Fence::null(),
            )
        };

        match result {
            Ok((image_index, is_suboptimal)) => {
                if is_suboptimal {
                    log::warn!("swapchain acquire image index {} is not optimal", image_index);
                }
                self.swapchain_image_index = image_index as usize;
                Ok(GfxAcquire::Acquired {
                    suboptimal: is_suboptimal,
                })
            }
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => {
                log::warn!("swapchain is out of date when acquire next image");
                Ok(GfxAcquire::OutOfDate)
            }
            Err(e) => Err(GfxError::from_vk("acquire next image", e)),
        }
    }

    /// 返回是否需要重建 swapchain
    pub fn present_image(
        &self,
        device: &GfxDevice,
        queue: vk::Queue,
        wait_semaphores: &[GfxSemaphore],
    ) -> GfxResult<bool> {
        let wait_semaphores = wait_semaphores.iter().map(|s| s.handle()).collect_vec();
        let image_indices = [self.swapchain_image_index as u32];
        let present_info = vk::PresentInfoKHR::default()
            .wait_semaphores(&wait_semaphores)
            .image_indices(&image_indices)
            .swapchains(std::slice::from_ref(&self.swapchain_handle));

        match unsafe { device.swapchain().queue_present(queue, &present_info) } {
            Ok(is_suboptimal) => {
                if is_suboptimal {
                    log::warn!("swapchain present image index {} is not optimal", self.swapchain_image_index);
                }
                Ok(is_suboptimal)
            }
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => {
                log::warn!("swapchain is out of date when present image");
                Ok(true)
            }
            Err(e) => Err(GfxError::from_vk("queue present", e)),
        }
    }
}

/// 优先选择 B8G8R8A8 / R8G8B8A8 的 sRGB（或者 UNORM）格式，否则使用第一个
pub fn choose_surface_format(available: &[vk::SurfaceFormatKHR], prefer_srgb: bool) -> Option<vk::SurfaceFormatKHR> {
    let preferred: [vk::Format; 2] = if prefer_srgb {
        [vk::Format::B8G8R8A8_SRGB, vk::Format::R8G8B8A8_SRGB]
    } else {
        [vk::Format::B8G8R8A8_UNORM, vk::Format::R8G8B8A8_UNORM]
    };

    preferred
        .iter()
        .find_map(|format| {
            available.iter().find(|f| f.format == *format && f.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR)
        })
        .or_else(|| available.first())
        .copied()
}

/// 不支持时退回到 FIFO，FIFO 总是可用
pub fn choose_present_mode(available: &[vk::PresentModeKHR], desired: vk::PresentModeKHR) -> vk::PresentModeKHR {
    if available.contains(&desired) { desired } else { vk::PresentModeKHR::FIFO }
}

/// 在 surface 允许的范围内使用 `desired` 个 image；`max_image_count == 0` 表示不限制
pub fn choose_image_count(surface_capabilities: &vk::SurfaceCapabilitiesKHR, desired: u32) -> u32 {
    let count = desired.max(surface_capabilities.min_image_count);
    if surface_capabilities.max_image_count == 0 { count } else { count.min(surface_capabilities.max_image_count) }
}

/// 确定 window 的 extent 尺寸
///
/// 如果 surface_capabilities.current_extent 包含特殊值 0xFFFFFFFF，则表示可以自己设置交换链的 extent
pub fn calculate_swapchain_extent(
    surface_capabilities: &vk::SurfaceCapabilitiesKHR,
    window_physical_extent: vk::Extent2D,
) -> vk::Extent2D {
    let surface_extent = surface_capabilities.current_extent;
    if surface_extent.width == 0xFFFFFFFF || surface_extent.height == 0xFFFFFFFF {
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

#[cfg(test)]
mod tests {
    use super::*;

    fn surface_format(format: vk::Format) -> vk::SurfaceFormatKHR {
        vk::SurfaceFormatKHR {
            format,
            color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
        }
    }

    fn caps(min: u32, max: u32) -> vk::SurfaceCapabilitiesKHR {
        vk::SurfaceCapabilitiesKHR {
            min_image_count: min,
            max_image_count: max,
            current_extent: vk::Extent2D {
                width: 0xFFFFFFFF,
                height: 0xFFFFFFFF,
            },
            min_image_extent: vk::Extent2D { width: 1, height: 1 },
            max_image_extent: vk::Extent2D {
                width: 4096,
                height: 4096,
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_prefers_srgb() {
        let available = [surface_format(vk::Format::B8G8R8A8_UNORM), surface_format(vk::Format::B8G8R8A8_SRGB)];
        assert_eq!(choose_surface_format(&available, true).unwrap().format, vk::Format::B8G8R8A8_SRGB);
        assert_eq!(choose_surface_format(&available, false).unwrap().format, vk::Format::B8G8R8A8_UNORM);

        let available = [surface_format(vk::Format::A2B10G10R10_UNORM_PACK32)];
        assert_eq!(choose_surface_format(&available, true).unwrap().format, vk::Format::A2B10G10R10_UNORM_PACK32);
        assert!(choose_surface_format(&[], true).is_none());
    }

    #[test]
    fn test_present_mode_falls_back_to_fifo() {
        let available = [vk::PresentModeKHR::FIFO, vk::PresentModeKHR::IMMEDIATE];
        assert_eq!(choose_present_mode(&available, vk::PresentModeKHR::IMMEDIATE), vk::PresentModeKHR::IMMEDIATE);
        assert_eq!(choose_present_mode(&available, vk::PresentModeKHR::MAILBOX), vk::PresentModeKHR::FIFO);
    }

    #[test]
    fn test_image_count_is_clamped() {
        assert_eq!(choose_image_count(&caps(2, 8), 3), 3);
        assert_eq!(choose_image_count(&caps(4, 8), 3), 4);
        assert_eq!(choose_image_count(&caps(2, 2), 3), 2);
        assert_eq!(choose_image_count(&caps(2, 0), 3), 3);
    }

    #[test]
    fn test_extent_follows_window_when_surface_is_undefined() {
        let extent = calculate_swapchain_extent(&caps(2, 3), vk::Extent2D { width: 8000, height: 600 });
        assert_eq!(extent, vk::Extent2D { width: 4096, height: 600 });

        let mut fixed = caps(2, 3);
        fixed.current_extent = vk::Extent2D { width: 800, height: 600 };
        assert_eq!(calculate_swapchain_extent(&fixed, vk::Extent2D { width: 1, height: 1 }), fixed.current_extent);
    }
}
