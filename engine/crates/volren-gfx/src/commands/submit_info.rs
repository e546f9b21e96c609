use ash::vk;
use itertools::Itertools;

use crate::commands::{command_buffer::GfxCommandBuffer, semaphore::GfxSemaphore};

/// Gfx 关于 submitInfo 的封装，更易用
#[derive(Default)]
pub struct GfxSubmitInfo {
    command_buffers: Vec<vk::CommandBufferSubmitInfo<'static>>,
    wait_infos: Vec<vk::SemaphoreSubmitInfo<'static>>,
    signal_infos: Vec<vk::SemaphoreSubmitInfo<'static>>,
}

impl GfxSubmitInfo {
    pub fn new(commands: &[GfxCommandBuffer]) -> Self {
        let command_buffers = commands
            .iter()
            .map(|cmd| vk::CommandBufferSubmitInfo::default().command_buffer(cmd.vk_handle()))
            .collect_vec();

        Self {
            command_buffers,
            wait_infos: vec![],
            signal_infos: vec![],
        }
    }

    /// 返回的结构体引用了 self 内部的数组
    #[inline]
    pub fn submit_info(&self) -> vk::SubmitInfo2<'_> {
        vk::SubmitInfo2::default()
            .command_buffer_infos(&self.command_buffers)
            .wait_semaphore_infos(&self.wait_infos)
            .signal_semaphore_infos(&self.signal_infos)
    }

    /// binary semaphore 的 value 填 `None`
    #[inline]
    pub fn wait(mut self, semaphore: &GfxSemaphore, stage: vk::PipelineStageFlags2, value: Option<u64>) -> Self {
        self.wait_infos.push(
            vk::SemaphoreSubmitInfo::default()
                .semaphore(semaphore.handle())
                .stage_mask(stage)
                .value(value.unwrap_or_default()),
        );
        self
    }

    /// binary semaphore 的 value 填 `None`
    #[inline]
    pub fn signal(mut self, semaphore: &GfxSemaphore, stage: vk::PipelineStageFlags2, value: Option<u64>) -> Self {
        self.signal_infos.push(
            vk::SemaphoreSubmitInfo::default()
                .semaphore(semaphore.handle())
                .stage_mask(stage)
                .value(value.unwrap_or_default()),
        );
        self
    }

    #[inline]
    pub fn command_buffer_count(&self) -> usize {
        self.command_buffers.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ash::vk::Handle;

    #[test]
    fn test_submit_info_references_all_arrays() {
        let acquire = GfxSemaphore::from_raw_for_test(1);
        let finished = GfxSemaphore::from_raw_for_test(2);
        let submit = GfxSubmitInfo::new(&[])
            .wait(&acquire, vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT, None)
            .signal(&finished, vk::PipelineStageFlags2::ALL_COMMANDS, Some(7));

        let info = submit.submit_info();
        assert_eq!(info.command_buffer_info_count, 0);
        assert_eq!(info.wait_semaphore_info_count, 1);
        assert_eq!(info.signal_semaphore_info_count, 1);
        let signal = unsafe { *info.p_signal_semaphore_infos };
        assert_eq!(signal.value, 7);
        assert_eq!(signal.semaphore.as_raw(), 2);
    }
}
