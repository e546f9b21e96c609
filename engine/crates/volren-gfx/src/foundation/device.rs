use ash::vk;
use itertools::Itertools;
use std::cell::Cell;
use std::{
    ffi::{CStr, CString},
    ops::Deref,
};

use crate::{
    error::{GfxResult, VkResultExt},
    foundation::{debug_messenger::DebugType, instance::GfxInstance, physical_device::GfxPhysicalDevice},
};

/// Vulkan 逻辑设备封装
///
/// 包含核心设备 API 以及扩展的函数指针。
/// 这些函数指针在应用生命周期中保持不变，通过 `Rc<GfxDevice>` 共享。
///
/// # 扩展支持
/// - Swapchain (KHR)
/// - Descriptor Buffer (EXT)：shader visible 的描述符表
/// - Debug Utils (EXT)：仅在开启 validation 时可用
pub struct GfxDevice {
    /// 核心 Vulkan 设备 API
    pub(crate) device: ash::Device,
    /// 交换链扩展 API
    pub(crate) swapchain: ash::khr::swapchain::Device,
    /// 描述符 buffer 扩展 API
    pub(crate) descriptor_buffer: ash::ext::descriptor_buffer::Device,
    /// 调试工具扩展 API
    pub(crate) debug_utils: Option<ash::ext::debug_utils::Device>,

    #[cfg(debug_assertions)]
    destroyed: Cell<bool>,
}

// 构造与销毁
impl GfxDevice {
    pub fn new(instance: &GfxInstance, pdevice: &GfxPhysicalDevice) -> GfxResult<Self> {
        let _span = tracy_client::span!("GfxDevice::new");

        // device 所需的所有 extension
        let device_exts = GfxPhysicalDevice::REQUIRED_DEVICE_EXTS.iter().map(|e| e.as_ptr()).collect_vec();
        log::info!(
            "device exts: {}",
            GfxPhysicalDevice::REQUIRED_DEVICE_EXTS.iter().map(|ext| format!("\n\t{:?}", ext)).join("")
        );

        // device 所需的所有 features
        let mut vk12_features =
            vk::PhysicalDeviceVulkan12Features::default().timeline_semaphore(true).buffer_device_address(true);
        let mut vk13_features =
            vk::PhysicalDeviceVulkan13Features::default().synchronization2(true).dynamic_rendering(true);
        let mut descriptor_buffer_features =
            vk::PhysicalDeviceDescriptorBufferFeaturesEXT::default().descriptor_buffer(true);
        let mut all_features = vk::PhysicalDeviceFeatures2::default()
            .push_next(&mut vk12_features)
            .push_next(&mut vk13_features)
            .push_next(&mut descriptor_buffer_features);

        // Single queue：所有的工作都在同一个 queue 上，CPU 侧的状态追踪才是有效的
        let queue_create_infos = [vk::DeviceQueueCreateInfo::default()
            .queue_family_index(pdevice.gfx_queue_family.queue_family_index)
            .queue_priorities(&[1.0])];

        let device_create_info = vk::DeviceCreateInfo::default()
            .queue_create_infos(&queue_create_infos)
            .enabled_extension_names(&device_exts)
            .push_next(&mut all_features);

        let ash_instance = instance.ash_instance();
        let device = unsafe { ash_instance.create_device(pdevice.vk_handle, &device_create_info, None) }
            .vk_context("create device")?;

        let swapchain = ash::khr::swapchain::Device::new(ash_instance, &device);
        let descriptor_buffer = ash::ext::descriptor_buffer::Device::new(ash_instance, &device);
        let debug_utils =
            instance.debug_utils_enabled.then(|| ash::ext::debug_utils::Device::new(ash_instance, &device));

        Ok(Self {
            device,
            swapchain,
            descriptor_buffer,
            debug_utils,

            #[cfg(debug_assertions)]
            destroyed: Cell::new(false),
        })
    }

    pub fn destroy(&self) {
        log::info!("destroying device");

        #[cfg(debug_assertions)]
        self.destroyed.set(true);

        unsafe {
            self.device.destroy_device(None);
        }
    }
}

// getters
impl GfxDevice {
    #[inline]
    pub fn vk_handle(&self) -> vk::Device {
        self.device.handle()
    }
    #[inline]
    pub fn swapchain(&self) -> &ash::khr::swapchain::Device {
        &self.swapchain
    }
    #[inline]
    pub fn descriptor_buffer(&self) -> &ash::ext::descriptor_buffer::Device {
        &self.descriptor_buffer
    }
    #[inline]
    pub fn debug_utils(&self) -> Option<&ash::ext::debug_utils::Device> {
        self.debug_utils.as_ref()
    }
}

// tools
impl GfxDevice {
    pub fn set_object_debug_name<T: vk::Handle + Copy>(&self, handle: T, name: impl AsRef<str>) {
        let Some(debug_utils) = &self.debug_utils else {
            return;
        };
        let Ok(name) = CString::new(name.as_ref()) else {
            return;
        };
        Self::set_name(debug_utils, handle, &name);
    }

    pub fn set_debug_name<T: DebugType>(&self, handle: &T, name: impl AsRef<str>) {
        let Some(debug_utils) = &self.debug_utils else {
            return;
        };
        let Ok(debug_name) = CString::new(format!("{}::{}", T::debug_type_name(), name.as_ref())) else {
            return;
        };
        Self::set_name(debug_utils, handle.vk_handle(), &debug_name);
    }

    fn set_name<T: vk::Handle>(debug_utils: &ash::ext::debug_utils::Device, handle: T, name: &CStr) {
        let result = unsafe {
            debug_utils.set_debug_utils_object_name(
                &vk::DebugUtilsObjectNameInfoEXT::default().object_name(name).object_handle(handle),
            )
        };
        if let Err(e) = result {
            log::warn!("failed to set debug name {:?}: {:?}", name, e);
        }
    }

    #[inline]
    pub fn wait_idle(&self) -> GfxResult<()> {
        unsafe { self.device.device_wait_idle() }.vk_context("device wait idle")
    }
}

impl Deref for GfxDevice {
    type Target = ash::Device;
    fn deref(&self) -> &Self::Target {
        &self.device
    }
}
impl Drop for GfxDevice {
    fn drop(&mut self) {
        #[cfg(debug_assertions)]
        debug_assert!(self.destroyed.get(), "GfxDevice must be destroyed before being dropped.");
    }
}
impl DebugType for GfxDevice {
    fn debug_type_name() -> &'static str {
        "GfxDevice"
    }
    fn vk_handle(&self) -> impl vk::Handle {
        self.device.handle()
    }
}
