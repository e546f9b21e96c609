use ash::vk;
use itertools::Itertools;

use crate::{commands::command_buffer::GfxCommandBuffer, state::resource_state::GfxResourceState};

/// barrier 作用的对象
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GfxBarrierTarget {
    Image { image: vk::Image, aspect: vk::ImageAspectFlags },
    Buffer { buffer: vk::Buffer },
}

/// 记录了当前状态的资源
pub trait GfxStateTracked {
    fn current_state(&self) -> GfxResourceState;
    fn set_current_state(&mut self, state: GfxResourceState);
    fn barrier_target(&self) -> GfxBarrierTarget;
}

/// 一次状态转换
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GfxTransition {
    pub target: GfxBarrierTarget,
    pub before: GfxResourceState,
    pub after: GfxResourceState,
}

impl GfxTransition {
    /// 整个 image 的所有 mip 和 layer 一起转换，不做 queue family 转移
    fn image_barrier(&self, image: vk::Image, aspect: vk::ImageAspectFlags) -> vk::ImageMemoryBarrier2<'static> {
        let before = self.before.access_state();
        let after = self.after.access_state();
        vk::ImageMemoryBarrier2::default()
            .src_stage_mask(before.stage)
            .src_access_mask(before.src_access())
            .dst_stage_mask(after.stage)
            .dst_access_mask(after.access)
            .old_layout(before.layout)
            .new_layout(after.layout)
            .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .image(image)
            .subresource_range(vk::ImageSubresourceRange {
                aspect_mask: aspect,
                base_mip_level: 0,
                level_count: vk::REMAINING_MIP_LEVELS,
                base_array_layer: 0,
                layer_count: vk::REMAINING_ARRAY_LAYERS,
            })
    }

    /// 覆盖整个 buffer
    fn buffer_barrier(&self, buffer: vk::Buffer) -> vk::BufferMemoryBarrier2<'static> {
        let before = self.before.access_state();
        let after = self.after.access_state();
        vk::BufferMemoryBarrier2::default()
            .src_stage_mask(before.stage)
            .src_access_mask(before.src_access())
            .dst_stage_mask(after.stage)
            .dst_access_mask(after.access)
            .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .buffer(buffer)
            .offset(0)
            .size(vk::WHOLE_SIZE)
    }
}

/// 把资源转换到 `after` 状态
///
/// 状态相同时什么都不做；否则向 batch 追加一个 barrier，并立即更新资源记录的状态，
/// 使得同一个 batch 中后续的转换看到的是新的状态。
///
/// 返回是否追加了 barrier
///
/// # panic
/// `after` 为 `Undefined` 时 panic
pub fn transition(
    resource: &mut impl GfxStateTracked,
    after: GfxResourceState,
    batch: &mut GfxBarrierBatch,
) -> bool {
    assert_ne!(after, GfxResourceState::Undefined, "can not transition a resource into Undefined");

    let before = resource.current_state();
    if before == after {
        return false;
    }

    batch.transitions.push(GfxTransition {
        target: resource.barrier_target(),
        before,
        after,
    });
    resource.set_current_state(after);
    true
}

/// CPU 通过 map 写入之后，直接把记录的状态设为 `after`
///
/// host 写入在 queue submit 时对 device 可见，不需要 barrier
pub fn assume_after_host_write(resource: &mut impl GfxStateTracked, after: GfxResourceState) {
    assert_ne!(after, GfxResourceState::Undefined, "can not transition a resource into Undefined");
    resource.set_current_state(after);
}

/// 一组待提交的 barrier，通过一次 driver 调用提交
#[derive(Default, Debug)]
pub struct GfxBarrierBatch {
    transitions: Vec<GfxTransition>,
}

impl GfxBarrierBatch {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn transitions(&self) -> &[GfxTransition] {
        &self.transitions
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.transitions.is_empty()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.transitions.len()
    }

    /// 把所有的转换展开为 Vulkan barrier
    pub fn build_barriers(&self) -> (Vec<vk::ImageMemoryBarrier2<'static>>, Vec<vk::BufferMemoryBarrier2<'static>>) {
        let (images, buffers): (Vec<&GfxTransition>, Vec<&GfxTransition>) =
            self.transitions.iter().partition(|t| matches!(t.target, GfxBarrierTarget::Image { .. }));

        let image_barriers = images
            .iter()
            .filter_map(|t| match t.target {
                GfxBarrierTarget::Image { image, aspect } => Some(t.image_barrier(image, aspect)),
                GfxBarrierTarget::Buffer { .. } => None,
            })
            .collect_vec();
        let buffer_barriers = buffers
            .iter()
            .filter_map(|t| match t.target {
                GfxBarrierTarget::Buffer { buffer } => Some(t.buffer_barrier(buffer)),
                GfxBarrierTarget::Image { .. } => None,
            })
            .collect_vec();

        (image_barriers, buffer_barriers)
    }

    /// 录制到 command buffer 中并清空；batch 为空时不录制任何命令
    pub fn flush(&mut self, cmd: &GfxCommandBuffer) {
        if self.is_empty() {
            return;
        }
        let (image_barriers, buffer_barriers) = self.build_barriers();
        cmd.pipeline_barrier(&image_barriers, &buffer_barriers);
        self.transitions.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ash::vk::Handle;

    struct FakeTexture {
        state: GfxResourceState,
        image: vk::Image,
    }

    impl GfxStateTracked for FakeTexture {
        fn current_state(&self) -> GfxResourceState {
            self.state
        }
        fn set_current_state(&mut self, state: GfxResourceState) {
            self.state = state;
        }
        fn barrier_target(&self) -> GfxBarrierTarget {
            GfxBarrierTarget::Image {
                image: self.image,
                aspect: vk::ImageAspectFlags::COLOR,
            }
        }
    }

    struct FakeBuffer {
        state: GfxResourceState,
    }

    impl GfxStateTracked for FakeBuffer {
        fn current_state(&self) -> GfxResourceState {
            self.state
        }
        fn set_current_state(&mut self, state: GfxResourceState) {
            self.state = state;
        }
        fn barrier_target(&self) -> GfxBarrierTarget {
            GfxBarrierTarget::Buffer {
                buffer: vk::Buffer::from_raw(7),
            }
        }
    }

    fn texture(state: GfxResourceState) -> FakeTexture {
        FakeTexture {
            state,
            image: vk::Image::from_raw(42),
        }
    }

    #[test]
    fn test_same_state_is_noop() {
        let mut tex = texture(GfxResourceState::ShaderResource);
        let mut batch = GfxBarrierBatch::new();
        assert!(!transition(&mut tex, GfxResourceState::ShaderResource, &mut batch));
        assert!(batch.is_empty());
        assert_eq!(tex.state, GfxResourceState::ShaderResource);
    }

    #[test]
    fn test_different_state_adds_one_barrier() {
        let mut tex = texture(GfxResourceState::RenderTarget);
        let mut batch = GfxBarrierBatch::new();
        assert!(transition(&mut tex, GfxResourceState::ShaderResource, &mut batch));

        assert_eq!(batch.len(), 1);
        assert_eq!(batch.transitions()[0].before, GfxResourceState::RenderTarget);
        assert_eq!(batch.transitions()[0].after, GfxResourceState::ShaderResource);
        assert_eq!(tex.state, GfxResourceState::ShaderResource);
    }

    #[test]
    fn test_state_updates_immediately_within_batch() {
        let mut tex = texture(GfxResourceState::Undefined);
        let mut batch = GfxBarrierBatch::new();
        transition(&mut tex, GfxResourceState::CopyDest, &mut batch);
        transition(&mut tex, GfxResourceState::CopyDest, &mut batch);
        transition(&mut tex, GfxResourceState::ShaderResource, &mut batch);

        assert_eq!(batch.len(), 2);
        assert_eq!(batch.transitions()[1].before, GfxResourceState::CopyDest);
    }

    #[test]
    fn test_build_barriers_splits_images_and_buffers() {
        let mut tex = texture(GfxResourceState::Undefined);
        let mut buf = FakeBuffer {
            state: GfxResourceState::CopyDest,
        };
        let mut batch = GfxBarrierBatch::new();
        transition(&mut tex, GfxResourceState::RenderTarget, &mut batch);
        transition(&mut buf, GfxResourceState::VertexAndConstantBuffer, &mut batch);

        let (images, buffers) = batch.build_barriers();
        assert_eq!(images.len(), 1);
        assert_eq!(buffers.len(), 1);

        let image = &images[0];
        assert_eq!(image.image.as_raw(), 42);
        assert_eq!(image.old_layout, vk::ImageLayout::UNDEFINED);
        assert_eq!(image.new_layout, vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL);
        assert_eq!(image.subresource_range.aspect_mask, vk::ImageAspectFlags::COLOR);

        let buffer = &buffers[0];
        assert_eq!(buffer.buffer.as_raw(), 7);
        assert_eq!(buffer.src_access_mask, vk::AccessFlags2::TRANSFER_WRITE);
        assert_eq!(buffer.dst_stage_mask, GfxResourceState::VertexAndConstantBuffer.access_state().stage);
    }

    #[test]
    fn test_barriers_cover_whole_resource() {
        let mut tex = texture(GfxResourceState::CopyDest);
        let mut buf = FakeBuffer {
            state: GfxResourceState::CopyDest,
        };
        let mut batch = GfxBarrierBatch::new();
        transition(&mut tex, GfxResourceState::ShaderResource, &mut batch);
        transition(&mut buf, GfxResourceState::ShaderResource, &mut batch);

        let (images, buffers) = batch.build_barriers();
        let range = images[0].subresource_range;
        assert_eq!((range.base_mip_level, range.level_count), (0, vk::REMAINING_MIP_LEVELS));
        assert_eq!((range.base_array_layer, range.layer_count), (0, vk::REMAINING_ARRAY_LAYERS));
        assert_eq!(images[0].src_queue_family_index, vk::QUEUE_FAMILY_IGNORED);
        assert_eq!(images[0].dst_queue_family_index, vk::QUEUE_FAMILY_IGNORED);

        assert_eq!((buffers[0].offset, buffers[0].size), (0, vk::WHOLE_SIZE));
        assert_eq!(buffers[0].src_queue_family_index, vk::QUEUE_FAMILY_IGNORED);
    }

    #[test]
    fn test_host_write_records_final_state() {
        let mut buf = FakeBuffer {
            state: GfxResourceState::GenericRead,
        };
        assume_after_host_write(&mut buf, GfxResourceState::VertexAndConstantBuffer);
        assert_eq!(buf.state, GfxResourceState::VertexAndConstantBuffer);

        // 之后的转换从新的状态开始
        let mut batch = GfxBarrierBatch::new();
        assert!(!transition(&mut buf, GfxResourceState::VertexAndConstantBuffer, &mut batch));
        assert!(transition(&mut buf, GfxResourceState::CopySource, &mut batch));
        assert_eq!(batch.transitions()[0].before, GfxResourceState::VertexAndConstantBuffer);
    }

    #[test]
    #[should_panic(expected = "Undefined")]
    fn test_transition_to_undefined_panics() {
        let mut tex = texture(GfxResourceState::RenderTarget);
        let mut batch = GfxBarrierBatch::new();
        transition(&mut tex, GfxResourceState::Undefined, &mut batch);
    }
}
