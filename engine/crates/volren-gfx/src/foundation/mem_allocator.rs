use std::ops::Deref;

use ash::vk;

use crate::{
    error::{GfxResult, VkResultExt},
    foundation::{device::GfxDevice, instance::GfxInstance, physical_device::GfxPhysicalDevice},
};

/// 通用的 GPU 内存分配器（VMA）
pub struct GfxMemAllocator {
    inner: vk_mem::Allocator,
}

impl GfxMemAllocator {
    /// vma 在创建时会拷贝 Instance 与 Device 的函数指针，
    /// 因此需要在 device 创建完成之后再创建，并且先于 device 销毁
    pub fn new(instance: &GfxInstance, pdevice: &GfxPhysicalDevice, device: &GfxDevice) -> GfxResult<Self> {
        let mut vma_ci = vk_mem::AllocatorCreateInfo::new(instance.ash_instance(), &device.device, pdevice.vk_handle);
        vma_ci.vulkan_api_version = vk::API_VERSION_1_3;
        // descriptor buffer 以及 buffer 的 CBV/SRV 都需要 device address
        vma_ci.flags = vk_mem::AllocatorCreateFlags::BUFFER_DEVICE_ADDRESS;

        let vma = unsafe { vk_mem::Allocator::new(vma_ci) }.vk_context("create vma allocator")?;

        Ok(Self { inner: vma })
    }

    pub fn destroy(self) {
        log::info!("destroying vma allocator");
        // 通过 drop 触发销毁
    }
}

impl Deref for GfxMemAllocator {
    type Target = vk_mem::Allocator;
    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}
