use ash::vk;

use crate::{
    error::{GfxError, GfxResult, VkResultExt},
    foundation::{debug_messenger::DebugType, device::GfxDevice},
};

/// # Destroy
/// 可以 Clone，因此不实现 Drop，需要手动 destroy
#[derive(Clone, Copy, Debug)]
pub struct GfxSemaphore {
    semaphore: vk::Semaphore,
}

// 创建与销毁
impl GfxSemaphore {
    /// binary semaphore，只用于 swapchain 的 acquire 与 present
    pub fn new(device: &GfxDevice, debug_name: &str) -> GfxResult<Self> {
        let semaphore = unsafe { device.create_semaphore(&vk::SemaphoreCreateInfo::default(), None) }
            .vk_context("create semaphore")?;

        let semaphore = Self { semaphore };
        device.set_debug_name(&semaphore, debug_name);
        Ok(semaphore)
    }

    pub fn new_timeline(device: &GfxDevice, initial_value: u64, debug_name: &str) -> GfxResult<Self> {
        let mut timeline_type_ci = vk::SemaphoreTypeCreateInfo::default()
            .semaphore_type(vk::SemaphoreType::TIMELINE)
            .initial_value(initial_value);
        let timeline_semaphore_ci = vk::SemaphoreCreateInfo::default().push_next(&mut timeline_type_ci);
        let semaphore = unsafe { device.create_semaphore(&timeline_semaphore_ci, None) }
            .vk_context("create timeline semaphore")?;

        let semaphore = Self { semaphore };
        device.set_debug_name(&semaphore, debug_name);
        Ok(semaphore)
    }

    #[inline]
    pub fn destroy(self, device: &GfxDevice) {
        unsafe {
            device.destroy_semaphore(self.semaphore, None);
        }
    }
}

// getters
impl GfxSemaphore {
    #[cfg(test)]
    pub(crate) fn from_raw_for_test(raw: u64) -> Self {
        use ash::vk::Handle;
        Self {
            semaphore: vk::Semaphore::from_raw(raw),
        }
    }


    #[inline]
    pub fn handle(&self) -> vk::Semaphore {
        self.semaphore
    }
}

// tools
impl GfxSemaphore {
    /// GPU 已经完成的 timeline 值
    #[inline]
    pub fn timeline_value(&self, device: &GfxDevice) -> GfxResult<u64> {
        unsafe { device.get_semaphore_counter_value(self.semaphore) }.vk_context("get semaphore counter value")
    }

    /// 阻塞直到 timeline 的值达到 `timeline_value`
    pub fn wait_timeline(&self, device: &GfxDevice, timeline_value: u64, timeout_ns: u64) -> GfxResult<()> {
        let wait_semaphore = [self.semaphore];
        let wait_info = vk::SemaphoreWaitInfo::default()
            .semaphores(&wait_semaphore)
            .values(std::slice::from_ref(&timeline_value));
        match unsafe { device.wait_semaphores(&wait_info, timeout_ns) } {
            Ok(()) => Ok(()),
            Err(vk::Result::TIMEOUT) => Err(GfxError::FenceTimeout {
                value: timeline_value,
                timeout_ns,
            }),
            Err(e) => Err(GfxError::from_vk("wait semaphores", e)),
        }
    }
}

impl DebugType for GfxSemaphore {
    fn debug_type_name() -> &'static str {
        "GfxSemaphore"
    }

    fn vk_handle(&self) -> impl vk::Handle {
        self.semaphore
    }
}
