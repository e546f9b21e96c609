use std::{ffi::CStr, ptr::null_mut};

use ash::vk;
use itertools::Itertools;

use crate::{
    error::{GfxError, GfxResult, VkResultExt},
    foundation::debug_messenger::DebugType,
};

#[derive(Clone, Debug)]
pub struct GfxQueueFamily {
    pub name: String,
    pub queue_family_index: u32,
    pub queue_flags: vk::QueueFlags,
    pub queue_count: u32,
}

/// 表示一张物理显卡
pub struct GfxPhysicalDevice {
    pub(crate) vk_handle: vk::PhysicalDevice,

    /// 当前 gpu 的基础属性
    pub(crate) basic_props: vk::PhysicalDeviceProperties,

    /// 决定了 shader visible 描述符表中每个 slot 的大小
    pub(crate) descriptor_buffer_props: vk::PhysicalDeviceDescriptorBufferPropertiesEXT<'static>,

    /// 同时支持 graphics、compute、transfer 以及 present 的 queue family
    pub(crate) gfx_queue_family: GfxQueueFamily,
}

impl GfxPhysicalDevice {
    /// 设备必须支持的扩展
    pub const REQUIRED_DEVICE_EXTS: [&'static CStr; 2] = [ash::khr::swapchain::NAME, ash::ext::descriptor_buffer::NAME];

    /// 选择一张满足要求的显卡
    ///
    /// 跳过软件实现（CPU）的设备，优先选择独立显卡
    pub fn select(
        instance: &ash::Instance,
        surface_pf: &ash::khr::surface::Instance,
        surface: vk::SurfaceKHR,
    ) -> GfxResult<Self> {
        let pdevices = unsafe { instance.enumerate_physical_devices() }.vk_context("enumerate physical devices")?;

        let mut rejected = Vec::new();
        let mut candidates = Vec::new();
        for pdevice in pdevices {
            match Self::new(pdevice, instance, surface_pf, surface) {
                Ok(Some(gpu)) => candidates.push(gpu),
                Ok(None) => {}
                Err(reason) => rejected.push(reason.to_string()),
            }
        }

        candidates
            .into_iter()
            .filter_map(|gpu| adapter_rank(gpu.basic_props.device_type).map(|rank| (rank, gpu)))
            .min_by_key(|(rank, _)| *rank)
            .map(|(_, gpu)| {
                log::info!(
                    "select gpu: {:?}, vendor id: {:#x}, device id: {:#x}",
                    gpu.device_name(),
                    gpu.basic_props.vendor_id,
                    gpu.basic_props.device_id
                );
                gpu
            })
            .ok_or_else(|| GfxError::NoSuitableAdapter(rejected.join("; ")))
    }

    /// 收集显卡的信息，不满足要求时返回原因
    ///
    /// `Ok(None)` 表示是软件实现的设备，直接跳过
    fn new(
        pdevice: vk::PhysicalDevice,
        instance: &ash::Instance,
        surface_pf: &ash::khr::surface::Instance,
        surface: vk::SurfaceKHR,
    ) -> GfxResult<Option<Self>> {
        unsafe {
            let mut descriptor_buffer_props = vk::PhysicalDeviceDescriptorBufferPropertiesEXT::default();
            let mut pdevice_props2 = vk::PhysicalDeviceProperties2::default().push_next(&mut descriptor_buffer_props);
            instance.get_physical_device_properties2(pdevice, &mut pdevice_props2);
            let basic_props = pdevice_props2.properties;
            descriptor_buffer_props.p_next = null_mut();

            let device_name = CStr::from_ptr(basic_props.device_name.as_ptr()).to_string_lossy().into_owned();
            log::info!("found gpu: {:?}, type: {:?}", device_name, basic_props.device_type);

            if basic_props.device_type == vk::PhysicalDeviceType::CPU {
                return Ok(None);
            }
            let reject = |reason: String| Err(GfxError::NoSuitableAdapter(format!("{device_name}: {reason}")));

            if basic_props.api_version < vk::API_VERSION_1_3 {
                return reject("vulkan 1.3 is required".to_string());
            }

            // 找到当前 gpu 支持的 extensions
            let device_extensions =
                instance.enumerate_device_extension_properties(pdevice).vk_context("enumerate device exts")?;
            let device_extension_names =
                device_extensions.iter().map(|ext| CStr::from_ptr(ext.extension_name.as_ptr())).collect_vec();
            log::debug!(
                "physical device supports extensions: {}",
                device_extension_names.iter().map(|ext| ext.to_string_lossy()).join("\n")
            );
            if let Some(missing) =
                Self::REQUIRED_DEVICE_EXTS.iter().find(|required| !device_extension_names.contains(*required))
            {
                return reject(format!("missing extension {:?}", missing));
            }

            if !Self::supports_required_features(instance, pdevice) {
                return reject("missing required features".to_string());
            }

            // 全能的 Queue：graphics, compute, transfer, present
            let queue_family_props = instance.get_physical_device_queue_family_properties(pdevice);
            let mut gfx_queue_family = None;
            for (family_idx, props) in queue_family_props.iter().enumerate() {
                let required = vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE | vk::QueueFlags::TRANSFER;
                if !props.queue_flags.contains(required) {
                    continue;
                }
                let present_supported = surface_pf
                    .get_physical_device_surface_support(pdevice, family_idx as u32, surface)
                    .vk_context("get surface support")?;
                if present_supported {
                    gfx_queue_family = Some(GfxQueueFamily {
                        name: "gfx".to_string(),
                        queue_family_index: family_idx as u32,
                        queue_flags: props.queue_flags,
                        queue_count: props.queue_count,
                    });
                    break;
                }
            }
            let Some(gfx_queue_family) = gfx_queue_family else {
                return reject("no queue family supports graphics and present".to_string());
            };

            Ok(Some(Self {
                vk_handle: pdevice,
                basic_props,
                descriptor_buffer_props,
                gfx_queue_family,
            }))
        }
    }

    unsafe fn supports_required_features(instance: &ash::Instance, pdevice: vk::PhysicalDevice) -> bool {
        let mut vk12 = vk::PhysicalDeviceVulkan12Features::default();
        let mut vk13 = vk::PhysicalDeviceVulkan13Features::default();
        let mut descriptor_buffer = vk::PhysicalDeviceDescriptorBufferFeaturesEXT::default();
        let mut features2 = vk::PhysicalDeviceFeatures2::default()
            .push_next(&mut vk12)
            .push_next(&mut vk13)
            .push_next(&mut descriptor_buffer);
        unsafe { instance.get_physical_device_features2(pdevice, &mut features2) };

        vk12.timeline_semaphore == vk::TRUE
            && vk12.buffer_device_address == vk::TRUE
            && vk13.synchronization2 == vk::TRUE
            && vk13.dynamic_rendering == vk::TRUE
            && descriptor_buffer.descriptor_buffer == vk::TRUE
    }

    pub fn destroy(self) {
        // 无需销毁
    }
}

// getters
impl GfxPhysicalDevice {
    #[inline]
    pub fn vk_handle(&self) -> vk::PhysicalDevice {
        self.vk_handle
    }

    pub fn device_name(&self) -> String {
        unsafe { CStr::from_ptr(self.basic_props.device_name.as_ptr()) }.to_string_lossy().into_owned()
    }

    #[inline]
    pub fn limits(&self) -> &vk::PhysicalDeviceLimits {
        &self.basic_props.limits
    }

    #[inline]
    pub fn descriptor_buffer_props(&self) -> &vk::PhysicalDeviceDescriptorBufferPropertiesEXT<'static> {
        &self.descriptor_buffer_props
    }

    #[inline]
    pub fn gfx_queue_family(&self) -> &GfxQueueFamily {
        &self.gfx_queue_family
    }

    /// texture 上传时 staging buffer 的行对齐
    #[inline]
    pub fn copy_row_pitch_alignment(&self) -> u64 {
        self.limits().optimal_buffer_copy_row_pitch_alignment.max(1)
    }

    /// texture 上传时 staging buffer 的起始位置对齐
    #[inline]
    pub fn copy_offset_alignment(&self) -> u64 {
        self.limits().optimal_buffer_copy_offset_alignment.max(1)
    }
}

/// 显卡的优先级，数值越小越优先；`None` 表示不可用
pub fn adapter_rank(device_type: vk::PhysicalDeviceType) -> Option<u32> {
    match device_type {
        vk::PhysicalDeviceType::DISCRETE_GPU => Some(0),
        vk::PhysicalDeviceType::INTEGRATED_GPU => Some(1),
        vk::PhysicalDeviceType::VIRTUAL_GPU => Some(2),
        vk::PhysicalDeviceType::CPU => None,
        _ => Some(3),
    }
}

impl DebugType for GfxPhysicalDevice {
    fn debug_type_name() -> &'static str {
        "GfxPhysicalDevice"
    }

    fn vk_handle(&self) -> impl vk::Handle {
        self.vk_handle
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_software_adapter_is_skipped() {
        assert_eq!(adapter_rank(vk::PhysicalDeviceType::CPU), None);
    }

    #[test]
    fn test_discrete_gpu_preferred() {
        let types = [
            vk::PhysicalDeviceType::INTEGRATED_GPU,
            vk::PhysicalDeviceType::CPU,
            vk::PhysicalDeviceType::DISCRETE_GPU,
            vk::PhysicalDeviceType::OTHER,
        ];
        let best = types.iter().filter_map(|t| adapter_rank(*t).map(|r| (r, *t))).min_by_key(|(r, _)| *r);
        assert_eq!(best.map(|(_, t)| t), Some(vk::PhysicalDeviceType::DISCRETE_GPU));
    }
}
