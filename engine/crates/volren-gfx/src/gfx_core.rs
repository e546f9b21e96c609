use std::rc::Rc;

use crate::{
    config::GfxConfig,
    error::{GfxResult, VkResultExt},
    foundation::{
        debug_messenger::GfxDebugMsger, device::GfxDevice, instance::GfxInstance, mem_allocator::GfxMemAllocator,
        physical_device::GfxPhysicalDevice,
    },
    swapchain::surface::GfxSurface,
};

/// 与窗口无关的 Vulkan 基础对象，以及窗口的 surface
pub struct GfxCore {
    /// vk 基础函数的接口
    ///
    /// 在 drop 之后，会卸载 dll，因此需要确保该字段最后 drop
    pub(crate) vk_entry: ash::Entry,

    pub(crate) instance: GfxInstance,
    pub(crate) debug_msger: Option<GfxDebugMsger>,
    pub(crate) surface: GfxSurface,
    pub(crate) physical_device: GfxPhysicalDevice,

    /// 多个组件需要共享相同的设备函数指针（GfxCommandQueue、GfxCommandPool 等）
    pub(crate) device: Rc<GfxDevice>,

    pub(crate) allocator: GfxMemAllocator,
}

// 创建与销毁
impl GfxCore {
    pub fn new(
        config: &GfxConfig,
        raw_display_handle: raw_window_handle::RawDisplayHandle,
        raw_window_handle: raw_window_handle::RawWindowHandle,
    ) -> GfxResult<Self> {
        let _span = tracy_client::span!("GfxCore::new");

        let vk_entry = unsafe { ash::Entry::load() }?;
        let surface_exts =
            ash_window::enumerate_required_extensions(raw_display_handle).vk_context("enumerate surface exts")?;
        let instance = GfxInstance::new(&vk_entry, &config.app_name, config.enable_validation, surface_exts)?;
        let debug_msger = if config.enable_validation {
            Some(GfxDebugMsger::new(&vk_entry, instance.ash_instance())?)
        } else {
            None
        };

        let surface = GfxSurface::new(&vk_entry, &instance, raw_display_handle, raw_window_handle)?;
        let physical_device = GfxPhysicalDevice::select(instance.ash_instance(), surface.pf(), surface.handle())?;
        let device = Rc::new(GfxDevice::new(&instance, &physical_device)?);
        let allocator = match GfxMemAllocator::new(&instance, &physical_device, &device) {
            Ok(allocator) => allocator,
            Err(e) => {
                device.destroy();
                return Err(e);
            }
        };

        // 在 device 之前创建的 vk::Handle
        {
            device.set_object_debug_name(instance.vk_instance(), "GfxInstance");
            device.set_debug_name(&physical_device, physical_device.device_name());
            device.set_debug_name(&surface, "main");
            device.set_debug_name(&*device, "main");
        }

        Ok(Self {
            vk_entry,
            instance,
            debug_msger,
            surface,
            physical_device,
            device,
            allocator,
        })
    }

    /// 调用之前需要确保所有持有 device 的对象都已经销毁
    pub fn destroy(self) {
        self.allocator.destroy();
        self.device.destroy();
        self.surface.destroy();
        if let Some(debug_msger) = self.debug_msger {
            debug_msger.destroy();
        }
        self.physical_device.destroy();
        self.instance.destroy();
        drop(self.vk_entry);
    }
}
