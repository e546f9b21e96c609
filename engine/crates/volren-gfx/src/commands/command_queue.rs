use std::rc::Rc;

use ash::vk;
use itertools::Itertools;

use crate::{
    commands::{
        command_buffer::GfxCommandBuffer, fence_counter::GfxFenceCounter, semaphore::GfxSemaphore,
        submit_info::GfxSubmitInfo,
    },
    error::{GfxResult, VkResultExt},
    foundation::{debug_messenger::DebugType, device::GfxDevice, physical_device::GfxQueueFamily},
    frame::frame_ring::GfxFenceWait,
};

/// 对单个硬件 queue 的封装
///
/// 使用一个 timeline semaphore 作为 fence：
/// - `signal` 返回当前的 fence 值并自增
/// - `wait_for_completion` 阻塞直到 GPU 完成该值
pub struct GfxCommandQueue {
    vk_queue: vk::Queue,
    queue_family: GfxQueueFamily,
    device: Rc<GfxDevice>,

    timeline: GfxSemaphore,
    fence_counter: GfxFenceCounter,
    wait_timeout_ns: u64,
}

// new & init
impl GfxCommandQueue {
    pub fn new(device: Rc<GfxDevice>, queue_family: GfxQueueFamily, wait_timeout_ns: u64) -> GfxResult<Self> {
        let vk_queue = unsafe { device.get_device_queue(queue_family.queue_family_index, 0) };
        let timeline = GfxSemaphore::new_timeline(&device, 0, "queue-fence")?;

        let queue = Self {
            vk_queue,
            queue_family,
            device,
            timeline,
            fence_counter: GfxFenceCounter::new(),
            wait_timeout_ns,
        };
        queue.device.set_debug_name(&queue, queue.queue_family.name.as_str());
        log::info!("gfx queue's queue family:\n{:#?}", queue.queue_family);

        Ok(queue)
    }

    /// 调用之前需要确保 GPU 已经空闲
    pub fn destroy(self) {
        self.timeline.destroy(&self.device);
    }
}

// getters
impl GfxCommandQueue {
    #[inline]
    pub fn queue_family(&self) -> &GfxQueueFamily {
        &self.queue_family
    }

    #[inline]
    pub fn handle(&self) -> vk::Queue {
        self.vk_queue
    }

    /// 最近一次 signal 的 fence 值
    #[inline]
    pub fn last_signaled_value(&self) -> u64 {
        self.fence_counter.last_issued()
    }
}

// tools
impl GfxCommandQueue {
    /// 结束录制并提交
    pub fn submit(&self, command_buffer: &GfxCommandBuffer) -> GfxResult<()> {
        command_buffer.end()?;
        self.submit_batches(&[GfxSubmitInfo::new(std::slice::from_ref(command_buffer))])
    }

    /// 提交已经结束录制的 command buffer，可以附带 semaphore
    pub fn submit_batches(&self, batches: &[GfxSubmitInfo]) -> GfxResult<()> {
        // batches 的存在是有必要的，submit_infos 引用的 batches 的内存
        let submit_infos = batches.iter().map(|b| b.submit_info()).collect_vec();
        unsafe { self.device.queue_submit2(self.vk_queue, &submit_infos, vk::Fence::null()) }
            .vk_context("queue submit")
    }

    /// 在 queue 上 signal 当前的 fence 值，返回该值并自增
    ///
    /// 第一个返回值是 1
    /// 提交失败时计数不变
    pub fn signal(&mut self) -> GfxResult<u64> {
        let (device, vk_queue, timeline) = (&self.device, self.vk_queue, &self.timeline);
        self.fence_counter.issue_with(|value| {
            let batch = GfxSubmitInfo::new(&[]).signal(timeline, vk::PipelineStageFlags2::ALL_COMMANDS, Some(value));
            unsafe { device.queue_submit2(vk_queue, &[batch.submit_info()], vk::Fence::null()) }
                .vk_context("queue signal")
        })
    }

    /// GPU 已经完成的 fence 值
    pub fn completed_value(&mut self) -> GfxResult<u64> {
        let value = self.timeline.timeline_value(&self.device)?;
        self.fence_counter.observe_completed(value);
        Ok(value)
    }

    /// 阻塞直到 GPU 完成 `value`；`value` 为 0 时立即返回
    pub fn wait_for_completion(&mut self, value: u64) -> GfxResult<()> {
        if self.fence_counter.is_complete(value) {
            return Ok(());
        }
        if self.completed_value()? >= value {
            return Ok(());
        }

        let _span = tracy_client::span!("GfxCommandQueue::wait_for_completion");
        self.timeline.wait_timeline(&self.device, value, self.wait_timeout_ns)?;
        self.fence_counter.observe_completed(value);
        Ok(())
    }

    /// 等待最近一次 signal 完成
    pub fn wait_idle(&mut self) -> GfxResult<()> {
        self.wait_for_completion(self.fence_counter.last_issued())
    }
}

// debug 相关命令
impl GfxCommandQueue {
    pub fn begin_label(&self, label_name: &str, label_color: glam::Vec4) {
        let (Some(debug_utils), Ok(name)) = (self.device.debug_utils(), std::ffi::CString::new(label_name)) else {
            return;
        };
        unsafe {
            debug_utils.queue_begin_debug_utils_label(
                self.vk_queue,
                &vk::DebugUtilsLabelEXT::default().label_name(name.as_c_str()).color(label_color.into()),
            );
        }
    }

    pub fn end_label(&self) {
        if let Some(debug_utils) = self.device.debug_utils() {
            unsafe {
                debug_utils.queue_end_debug_utils_label(self.vk_queue);
            }
        }
    }
}

impl GfxFenceWait for GfxCommandQueue {
    fn wait_for_completion(&mut self, value: u64) -> GfxResult<()> {
        GfxCommandQueue::wait_for_completion(self, value)
    }
}

impl DebugType for GfxCommandQueue {
    fn debug_type_name() -> &'static str {
        "GfxCommandQueue"
    }
    fn vk_handle(&self) -> impl vk::Handle {
        self.vk_queue
    }
}
