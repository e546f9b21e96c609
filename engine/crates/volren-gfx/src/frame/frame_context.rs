use std::rc::Rc;

use ash::vk;

use crate::{
    commands::{command_buffer::GfxCommandBuffer, command_pool::GfxCommandPool, semaphore::GfxSemaphore},
    error::GfxResult,
    foundation::device::GfxDevice,
};

/// 一个 frame slot 录制命令所需的对象
pub struct GfxFrameContext {
    command_pool: GfxCommandPool,
    command_buffer: GfxCommandBuffer,

    /// swapchain acquire 使用的 binary semaphore
    image_available: GfxSemaphore,
}

// new & init
impl GfxFrameContext {
    pub fn new(device: Rc<GfxDevice>, queue_family_index: u32, slot: usize) -> GfxResult<Self> {
        let command_pool = GfxCommandPool::new(
            device.clone(),
            queue_family_index,
            vk::CommandPoolCreateFlags::TRANSIENT,
            &format!("frame-{slot}"),
        )?;
        let command_buffer = GfxCommandBuffer::new(&command_pool, &format!("frame-{slot}"))?;
        let image_available = GfxSemaphore::new(&device, &format!("image-available-{slot}"))?;

        Ok(Self {
            command_pool,
            command_buffer,
            image_available,
        })
    }

    pub fn destroy(self) {
        self.image_available.destroy(self.command_pool.device());
        self.command_pool.destroy();
    }
}

// getters
impl GfxFrameContext {
    #[inline]
    pub fn command_buffer(&self) -> &GfxCommandBuffer {
        &self.command_buffer
    }

    #[inline]
    pub fn image_available(&self) -> &GfxSemaphore {
        &self.image_available
    }
}

// tools
impl GfxFrameContext {
    /// GPU 已经完成该 slot 的工作之后才能调用
    pub fn reset(&self) -> GfxResult<()> {
        self.command_pool.reset_all_buffers()
    }
}
