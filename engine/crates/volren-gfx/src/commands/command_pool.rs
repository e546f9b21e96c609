use std::rc::Rc;

use ash::vk;

use crate::{
    error::{GfxResult, VkResultExt},
    foundation::{debug_messenger::DebugType, device::GfxDevice},
};

/// command pool 是和 queue family 绑定的，而不是和 queue 绑定的
///
/// 每个 frame slot 持有一个，相当于 D3D12 的 command allocator
pub struct GfxCommandPool {
    handle: vk::CommandPool,
    device: Rc<GfxDevice>,

    debug_name: String,
    valid: bool,
}
// init & destroy
impl GfxCommandPool {
    pub fn new(
        device: Rc<GfxDevice>,
        queue_family_index: u32,
        flags: vk::CommandPoolCreateFlags,
        debug_name: &str,
    ) -> GfxResult<Self> {
        let pool = unsafe {
            device.create_command_pool(
                &vk::CommandPoolCreateInfo::default().queue_family_index(queue_family_index).flags(flags),
                None,
            )
        }
        .vk_context("create command pool")?;

        let command_pool = Self {
            handle: pool,
            device,
            debug_name: debug_name.to_string(),
            valid: true,
        };
        command_pool.device.set_debug_name(&command_pool, debug_name);
        Ok(command_pool)
    }

    pub fn destroy(mut self) {
        unsafe {
            self.device.destroy_command_pool(self.handle, None);
        }
        self.valid = false;
    }
}

// getters
impl GfxCommandPool {
    #[inline]
    pub fn handle(&self) -> vk::CommandPool {
        self.handle
    }

    #[inline]
    pub fn device(&self) -> &Rc<GfxDevice> {
        &self.device
    }
}

// tools
impl GfxCommandPool {
    /// 这个调用并不会释放 command buffer，而是将 pool 内的 command buffer 设置到初始状态
    ///
    /// 调用之前必须确保 GPU 已经不再使用 pool 内的任何 command buffer
    pub fn reset_all_buffers(&self) -> GfxResult<()> {
        unsafe { self.device.reset_command_pool(self.handle, vk::CommandPoolResetFlags::empty()) }
            .vk_context("reset command pool")
    }
}

impl DebugType for GfxCommandPool {
    fn debug_type_name() -> &'static str {
        "GfxCommandPool"
    }

    fn vk_handle(&self) -> impl vk::Handle {
        self.handle
    }
}

impl Drop for GfxCommandPool {
    fn drop(&mut self) {
        assert!(!self.valid, "CommandPool must be destroyed manually: {}", self.debug_name);
        log::debug!("dropping CommandPool: {}", self.debug_name);
    }
}
