//! 资源状态定义
//!
//! 每种状态对应一组 Vulkan 的 pipeline stage、access mask 和 image layout。
//! buffer 只使用 stage 和 access。

use ash::vk;

/// 资源当前（或者期望）的访问状态
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum GfxResourceState {
    /// 刚创建的 texture，内容未定义。只能作为 barrier 的 before
    #[default]
    Undefined,
    /// 可用于任何操作，但性能可能不是最优
    Common,
    /// upload heap 上的 buffer：CPU 写入，GPU 读取
    GenericRead,
    VertexAndConstantBuffer,
    RenderTarget,
    DepthWrite,
    DepthRead,
    ShaderResource,
    UnorderedAccess,
    CopyDest,
    CopySource,
    Present,
}

/// 一个状态展开后的 Vulkan 同步参数
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct GfxAccessState {
    pub stage: vk::PipelineStageFlags2,
    pub access: vk::AccessFlags2,
    pub layout: vk::ImageLayout,
}

impl GfxAccessState {
    #[inline]
    pub const fn new(stage: vk::PipelineStageFlags2, access: vk::AccessFlags2, layout: vk::ImageLayout) -> Self {
        Self { stage, access, layout }
    }

    /// 写操作的 access flags
    const WRITE_ACCESS: vk::AccessFlags2 = vk::AccessFlags2::from_raw(
        vk::AccessFlags2::SHADER_STORAGE_WRITE.as_raw()
            | vk::AccessFlags2::COLOR_ATTACHMENT_WRITE.as_raw()
            | vk::AccessFlags2::DEPTH_STENCIL_ATTACHMENT_WRITE.as_raw()
            | vk::AccessFlags2::TRANSFER_WRITE.as_raw()
            | vk::AccessFlags2::HOST_WRITE.as_raw()
            | vk::AccessFlags2::MEMORY_WRITE.as_raw(),
    );

    #[inline]
    pub fn is_write(&self) -> bool {
        self.access.intersects(Self::WRITE_ACCESS)
    }

    /// 用于 barrier src 的 access：只需要让写操作可见
    #[inline]
    pub fn src_access(&self) -> vk::AccessFlags2 {
        self.access & Self::WRITE_ACCESS
    }
}

const SHADER_STAGES: vk::PipelineStageFlags2 = vk::PipelineStageFlags2::from_raw(
    vk::PipelineStageFlags2::VERTEX_SHADER.as_raw()
        | vk::PipelineStageFlags2::FRAGMENT_SHADER.as_raw()
        | vk::PipelineStageFlags2::COMPUTE_SHADER.as_raw(),
);

const DEPTH_STAGES: vk::PipelineStageFlags2 = vk::PipelineStageFlags2::from_raw(
    vk::PipelineStageFlags2::EARLY_FRAGMENT_TESTS.as_raw() | vk::PipelineStageFlags2::LATE_FRAGMENT_TESTS.as_raw(),
);

impl GfxResourceState {
    pub const fn access_state(self) -> GfxAccessState {
        match self {
            // 第一次使用的 back buffer 也从这里开始，src stage 需要覆盖 acquire semaphore 的等待阶段
            GfxResourceState::Undefined => GfxAccessState::new(
                vk::PipelineStageFlags2::ALL_COMMANDS,
                vk::AccessFlags2::NONE,
                vk::ImageLayout::UNDEFINED,
            ),
            GfxResourceState::Common => GfxAccessState::new(
                vk::PipelineStageFlags2::ALL_COMMANDS,
                vk::AccessFlags2::from_raw(
                    vk::AccessFlags2::MEMORY_READ.as_raw() | vk::AccessFlags2::MEMORY_WRITE.as_raw(),
                ),
                vk::ImageLayout::GENERAL,
            ),
            GfxResourceState::GenericRead => GfxAccessState::new(
                vk::PipelineStageFlags2::ALL_COMMANDS,
                vk::AccessFlags2::MEMORY_READ,
                vk::ImageLayout::GENERAL,
            ),
            GfxResourceState::VertexAndConstantBuffer => GfxAccessState::new(
                vk::PipelineStageFlags2::from_raw(
                    vk::PipelineStageFlags2::VERTEX_ATTRIBUTE_INPUT.as_raw() | SHADER_STAGES.as_raw(),
                ),
                vk::AccessFlags2::from_raw(
                    vk::AccessFlags2::VERTEX_ATTRIBUTE_READ.as_raw() | vk::AccessFlags2::UNIFORM_READ.as_raw(),
                ),
                vk::ImageLayout::UNDEFINED,
            ),
            GfxResourceState::RenderTarget => GfxAccessState::new(
                vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT,
                vk::AccessFlags2::from_raw(
                    vk::AccessFlags2::COLOR_ATTACHMENT_READ.as_raw()
                        | vk::AccessFlags2::COLOR_ATTACHMENT_WRITE.as_raw(),
                ),
                vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
            ),
            GfxResourceState::DepthWrite => GfxAccessState::new(
                DEPTH_STAGES,
                vk::AccessFlags2::from_raw(
                    vk::AccessFlags2::DEPTH_STENCIL_ATTACHMENT_READ.as_raw()
                        | vk::AccessFlags2::DEPTH_STENCIL_ATTACHMENT_WRITE.as_raw(),
                ),
                vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
            ),
            GfxResourceState::DepthRead => GfxAccessState::new(
                vk::PipelineStageFlags2::from_raw(DEPTH_STAGES.as_raw() | SHADER_STAGES.as_raw()),
                vk::AccessFlags2::from_raw(
                    vk::AccessFlags2::DEPTH_STENCIL_ATTACHMENT_READ.as_raw()
                        | vk::AccessFlags2::SHADER_SAMPLED_READ.as_raw(),
                ),
                vk::ImageLayout::DEPTH_STENCIL_READ_ONLY_OPTIMAL,
            ),
            GfxResourceState::ShaderResource => GfxAccessState::new(
                SHADER_STAGES,
                vk::AccessFlags2::from_raw(
                    vk::AccessFlags2::SHADER_SAMPLED_READ.as_raw() | vk::AccessFlags2::SHADER_STORAGE_READ.as_raw(),
                ),
                vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
            ),
            GfxResourceState::UnorderedAccess => GfxAccessState::new(
                SHADER_STAGES,
                vk::AccessFlags2::from_raw(
                    vk::AccessFlags2::SHADER_STORAGE_READ.as_raw() | vk::AccessFlags2::SHADER_STORAGE_WRITE.as_raw(),
                ),
                vk::ImageLayout::GENERAL,
            ),
            GfxResourceState::CopyDest => GfxAccessState::new(
                vk::PipelineStageFlags2::TRANSFER,
                vk::AccessFlags2::TRANSFER_WRITE,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            ),
            GfxResourceState::CopySource => GfxAccessState::new(
                vk::PipelineStageFlags2::TRANSFER,
                vk::AccessFlags2::TRANSFER_READ,
                vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
            ),
            // stage 与 acquire semaphore 的等待阶段一致，保证 present -> render target 的依赖链
            GfxResourceState::Present => GfxAccessState::new(
                vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT,
                vk::AccessFlags2::NONE,
                vk::ImageLayout::PRESENT_SRC_KHR,
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_src_access_drops_reads() {
        let rt = GfxResourceState::RenderTarget.access_state();
        assert!(rt.is_write());
        assert_eq!(rt.src_access(), vk::AccessFlags2::COLOR_ATTACHMENT_WRITE);

        let srv = GfxResourceState::ShaderResource.access_state();
        assert!(!srv.is_write());
        assert_eq!(srv.src_access(), vk::AccessFlags2::NONE);
    }

    #[test]
    fn test_layouts() {
        assert_eq!(GfxResourceState::Undefined.access_state().layout, vk::ImageLayout::UNDEFINED);
        assert_eq!(GfxResourceState::Present.access_state().layout, vk::ImageLayout::PRESENT_SRC_KHR);
        assert_eq!(GfxResourceState::CopyDest.access_state().layout, vk::ImageLayout::TRANSFER_DST_OPTIMAL);
        assert_eq!(GfxResourceState::UnorderedAccess.access_state().layout, vk::ImageLayout::GENERAL);
        assert_eq!(GfxResourceState::default(), GfxResourceState::Undefined);
    }
}
