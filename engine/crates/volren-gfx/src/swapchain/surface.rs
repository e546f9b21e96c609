use ash::vk;

use crate::{
    error::{GfxResult, VkResultExt},
    foundation::{debug_messenger::DebugType, instance::GfxInstance},
};

pub struct GfxSurface {
    pub(crate) handle: vk::SurfaceKHR,
    pub(crate) pf: ash::khr::surface::Instance,
}

// new & init
impl GfxSurface {
    pub fn new(
        vk_entry: &ash::Entry,
        instance: &GfxInstance,
        raw_display_handle: raw_window_handle::RawDisplayHandle,
        raw_window_handle: raw_window_handle::RawWindowHandle,
    ) -> GfxResult<Self> {
        let pf = ash::khr::surface::Instance::new(vk_entry, instance.ash_instance());
        let handle = unsafe {
            ash_window::create_surface(vk_entry, instance.ash_instance(), raw_display_handle, raw_window_handle, None)
        }
        .vk_context("create surface")?;

        Ok(Self { handle, pf })
    }

    pub fn destroy(self) {
        log::info!("destroying surface");
        unsafe { self.pf.destroy_surface(self.handle, None) }
    }
}

// getters
impl GfxSurface {
    #[inline]
    pub fn handle(&self) -> vk::SurfaceKHR {
        self.handle
    }

    #[inline]
    pub fn pf(&self) -> &ash::khr::surface::Instance {
        &self.pf
    }

    pub fn capabilities(&self, pdevice: vk::PhysicalDevice) -> GfxResult<vk::SurfaceCapabilitiesKHR> {
        unsafe { self.pf.get_physical_device_surface_capabilities(pdevice, self.handle) }
            .vk_context("get surface capabilities")
    }

    pub fn formats(&self, pdevice: vk::PhysicalDevice) -> GfxResult<Vec<vk::SurfaceFormatKHR>> {
        unsafe { self.pf.get_physical_device_surface_formats(pdevice, self.handle) }.vk_context("get surface formats")
    }

    pub fn present_modes(&self, pdevice: vk::PhysicalDevice) -> GfxResult<Vec<vk::PresentModeKHR>> {
        unsafe { self.pf.get_physical_device_surface_present_modes(pdevice, self.handle) }
            .vk_context("get surface present modes")
    }
}

impl DebugType for GfxSurface {
    fn debug_type_name() -> &'static str {
        "GfxSurface"
    }
    fn vk_handle(&self) -> impl vk::Handle {
        self.handle
    }
}
