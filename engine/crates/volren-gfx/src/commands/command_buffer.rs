use std::ffi::CString;
use std::rc::Rc;

use ash::vk;

use crate::{
    basic::color::LabelColor,
    commands::command_pool::GfxCommandPool,
    error::{GfxResult, VkResultExt},
    foundation::{debug_messenger::DebugType, device::GfxDevice},
};

/// 命令缓冲封装
///
/// 生命周期由所属的 [`GfxCommandPool`] 管理，pool 销毁时一起释放。
///
/// # 使用示例
/// ```ignore
/// let cmd = GfxCommandBuffer::new(&pool, "frame-0")?;
/// cmd.begin(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT, "frame-0")?;
/// cmd.pipeline_barrier(&image_barriers, &[]);
/// cmd.end()?;
/// ```
#[derive(Clone)]
pub struct GfxCommandBuffer {
    vk_handle: vk::CommandBuffer,
    device: Rc<GfxDevice>,
}
// new & init
impl GfxCommandBuffer {
    pub fn new(command_pool: &GfxCommandPool, debug_name: &str) -> GfxResult<Self> {
        let info = vk::CommandBufferAllocateInfo::default()
            .command_pool(command_pool.handle())
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(1);

        let device = command_pool.device().clone();
        let command_buffer =
            unsafe { device.allocate_command_buffers(&info) }.vk_context("allocate command buffer")?[0];
        let cmd_buffer = GfxCommandBuffer {
            vk_handle: command_buffer,
            device,
        };
        cmd_buffer.device.set_debug_name(&cmd_buffer, debug_name);
        Ok(cmd_buffer)
    }
}
// Basic 命令
impl GfxCommandBuffer {
    /// 开始录制 command
    ///
    /// 自动设置 debug label
    #[inline]
    pub fn begin(&self, usage_flag: vk::CommandBufferUsageFlags, debug_label_name: &str) -> GfxResult<()> {
        unsafe {
            self.device.begin_command_buffer(self.vk_handle, &vk::CommandBufferBeginInfo::default().flags(usage_flag))
        }
        .vk_context("begin command buffer")?;
        self.begin_label(debug_label_name, LabelColor::COLOR_CMD);
        Ok(())
    }

    /// 结束录制 command，相当于 close
    #[inline]
    pub fn end(&self) -> GfxResult<()> {
        self.end_label();
        unsafe { self.device.end_command_buffer(self.vk_handle) }.vk_context("end command buffer")
    }
}
// getters
impl GfxCommandBuffer {
    #[inline]
    pub fn vk_handle(&self) -> vk::CommandBuffer {
        self.vk_handle
    }
}
// 数据传输类型
impl GfxCommandBuffer {
    /// - command type: action
    /// - 支持的 queue：transfer，graphics，compute
    #[inline]
    pub fn cmd_copy_buffer(&self, src: vk::Buffer, dst: vk::Buffer, regions: &[vk::BufferCopy]) {
        unsafe {
            self.device.cmd_copy_buffer(self.vk_handle, src, dst, regions);
        }
    }

    /// dst image 必须处于 `TRANSFER_DST_OPTIMAL`
    ///
    /// - command type: action
    /// - 支持的 queue：transfer，graphics，compute
    #[inline]
    pub fn cmd_copy_buffer_to_image(&self, src: vk::Buffer, dst: vk::Image, regions: &[vk::BufferImageCopy]) {
        unsafe {
            self.device.cmd_copy_buffer_to_image(
                self.vk_handle,
                src,
                dst,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                regions,
            );
        }
    }
}
// 绘制类型的命令
impl GfxCommandBuffer {
    /// - command type: action, state
    /// - supported queue types: graphics
    #[inline]
    pub fn cmd_begin_rendering(&self, render_info: &vk::RenderingInfo) {
        unsafe {
            self.device.cmd_begin_rendering(self.vk_handle, render_info);
        }
    }

    /// - command type: action, state
    /// - supported queue types: graphics
    #[inline]
    pub fn cmd_end_rendering(&self) {
        unsafe {
            self.device.cmd_end_rendering(self.vk_handle);
        }
    }

    /// 绑定 shader visible 的描述符表
    ///
    /// - command type: state
    /// - supported queue types: graphics, compute
    #[inline]
    pub fn cmd_bind_descriptor_buffers(&self, binding_infos: &[vk::DescriptorBufferBindingInfoEXT]) {
        unsafe {
            self.device.descriptor_buffer().cmd_bind_descriptor_buffers(self.vk_handle, binding_infos);
        }
    }
}
// 同步相关命令
impl GfxCommandBuffer {
    /// 一次 driver 调用提交所有的 barrier
    ///
    /// - command type: synchronize
    /// - supported queue types: graphics, compute, transfer
    pub fn pipeline_barrier(
        &self,
        image_barriers: &[vk::ImageMemoryBarrier2],
        buffer_barriers: &[vk::BufferMemoryBarrier2],
    ) {
        if image_barriers.is_empty() && buffer_barriers.is_empty() {
            return;
        }

        let dependency_info = vk::DependencyInfo::default()
            .image_memory_barriers(image_barriers)
            .buffer_memory_barriers(buffer_barriers);
        unsafe {
            self.device.cmd_pipeline_barrier2(self.vk_handle, &dependency_info);
        }
    }
}
// debug 相关命令
impl GfxCommandBuffer {
    /// - command type: state, action
    /// - supported queue type: graphics, compute
    #[inline]
    pub fn begin_label(&self, label_name: &str, label_color: glam::Vec4) {
        let (Some(debug_utils), Ok(name)) = (self.device.debug_utils(), CString::new(label_name)) else {
            return;
        };
        unsafe {
            debug_utils.cmd_begin_debug_utils_label(
                self.vk_handle,
                &vk::DebugUtilsLabelEXT::default().label_name(name.as_c_str()).color(label_color.into()),
            );
        }
    }

    /// - command type: state, action
    /// - supported queue type: graphics, compute
    #[inline]
    pub fn end_label(&self) {
        if let Some(debug_utils) = self.device.debug_utils() {
            unsafe {
                debug_utils.cmd_end_debug_utils_label(self.vk_handle);
            }
        }
    }
}
impl DebugType for GfxCommandBuffer {
    fn debug_type_name() -> &'static str {
        "GfxCommandBuffer"
    }

    fn vk_handle(&self) -> impl vk::Handle {
        self.vk_handle
    }
}
