//! 根据描述计算各个 view 的参数，不涉及任何 Vulkan 调用

use ash::vk;

use crate::{
    error::{GfxError, GfxResult},
    resources::{
        desc::{GfxBufferDesc, GfxTextureDimension, GfxViewFlags},
        format::bytes_per_texel,
    },
};

/// raw view 的元素大小
pub const RAW_ELEMENT_SIZE: u32 = 4;

/// buffer 的某个 view 在描述符中的参数
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GfxBufferViewLayout {
    pub descriptor_type: vk::DescriptorType,
    /// texel buffer 的格式
    pub format: vk::Format,
    pub element_size: u32,
    pub num_elements: u64,
    /// 描述符覆盖的字节数
    pub range: u64,
}

/// 计算 buffer 的 `view` 的参数，`view` 只能包含一个 flag
///
/// - CBV：覆盖整个（对齐后的）buffer
/// - raw：4 字节元素，个数为 `size / 4`
/// - typed：个数为 `size / stride`
pub fn buffer_view_layout(desc: &GfxBufferDesc, view: GfxViewFlags, aligned_size: u64) -> GfxResult<GfxBufferViewLayout> {
    let requested_size = desc.requested_size();

    if view == GfxViewFlags::CBV {
        return Ok(GfxBufferViewLayout {
            descriptor_type: vk::DescriptorType::UNIFORM_BUFFER,
            format: vk::Format::UNDEFINED,
            element_size: aligned_size as u32,
            num_elements: 1,
            range: aligned_size,
        });
    }

    let is_uav = match view {
        v if v == GfxViewFlags::SRV => false,
        v if v == GfxViewFlags::UAV => true,
        _ => {
            return Err(GfxError::InvalidDescription(format!(
                "buffer `{}` can not have a {:?} view",
                desc.name, view
            )));
        }
    };

    if desc.raw {
        let num_elements = requested_size / RAW_ELEMENT_SIZE as u64;
        return Ok(GfxBufferViewLayout {
            descriptor_type: vk::DescriptorType::STORAGE_BUFFER,
            format: vk::Format::UNDEFINED,
            element_size: RAW_ELEMENT_SIZE,
            num_elements,
            range: num_elements * RAW_ELEMENT_SIZE as u64,
        });
    }

    let typed = desc.format != vk::Format::UNDEFINED;
    let element_size = if desc.stride > 0 {
        desc.stride
    } else if typed {
        bytes_per_texel(desc.format).unwrap_or(0)
    } else {
        0
    };
    if element_size == 0 {
        return Err(GfxError::InvalidDescription(format!(
            "buffer `{}` needs a stride for its {:?} view",
            desc.name, view
        )));
    }

    let num_elements = requested_size / element_size as u64;
    let descriptor_type = match (typed, is_uav) {
        (true, false) => vk::DescriptorType::UNIFORM_TEXEL_BUFFER,
        (true, true) => vk::DescriptorType::STORAGE_TEXEL_BUFFER,
        (false, _) => vk::DescriptorType::STORAGE_BUFFER,
    };

    Ok(GfxBufferViewLayout {
        descriptor_type,
        format: desc.format,
        element_size,
        num_elements,
        range: num_elements * element_size as u64,
    })
}

/// buffer 需要的全部 view，按 SRV、UAV、CBV 的顺序
///
/// 每个条目对应 CBV/SRV/UAV 表中的一个 slot，任意一个 view 无效时整体失败
pub fn buffer_view_plan(desc: &GfxBufferDesc, aligned_size: u64) -> GfxResult<Vec<(GfxViewFlags, GfxBufferViewLayout)>> {
    [GfxViewFlags::SRV, GfxViewFlags::UAV, GfxViewFlags::CBV]
        .into_iter()
        .filter(|view| desc.views.contains(*view))
        .map(|view| buffer_view_layout(desc, view, aligned_size).map(|layout| (view, layout)))
        .collect()
}

/// buffer 的 usage：根据 view 推导，并且总是可以作为 copy 的源和目标
pub fn buffer_usage(views: GfxViewFlags, typed: bool) -> vk::BufferUsageFlags {
    let mut usage = vk::BufferUsageFlags::TRANSFER_SRC
        | vk::BufferUsageFlags::TRANSFER_DST
        | vk::BufferUsageFlags::VERTEX_BUFFER
        | vk::BufferUsageFlags::INDEX_BUFFER
        | vk::BufferUsageFlags::SHADER_DEVICE_ADDRESS;
    if views.contains(GfxViewFlags::CBV) {
        usage |= vk::BufferUsageFlags::UNIFORM_BUFFER;
    }
    if views.contains(GfxViewFlags::SRV) {
        usage |= if typed { vk::BufferUsageFlags::UNIFORM_TEXEL_BUFFER } else { vk::BufferUsageFlags::STORAGE_BUFFER };
    }
    if views.contains(GfxViewFlags::UAV) {
        usage |= if typed { vk::BufferUsageFlags::STORAGE_TEXEL_BUFFER } else { vk::BufferUsageFlags::STORAGE_BUFFER };
    }
    usage
}

/// texture 的 usage：根据 view 推导，并且总是可以作为 copy 的源和目标
pub fn image_usage(views: GfxViewFlags) -> vk::ImageUsageFlags {
    let mut usage = vk::ImageUsageFlags::TRANSFER_SRC | vk::ImageUsageFlags::TRANSFER_DST;
    if views.contains(GfxViewFlags::SRV) {
        usage |= vk::ImageUsageFlags::SAMPLED;
    }
    if views.contains(GfxViewFlags::UAV) {
        usage |= vk::ImageUsageFlags::STORAGE;
    }
    if views.contains(GfxViewFlags::RTV) {
        usage |= vk::ImageUsageFlags::COLOR_ATTACHMENT;
    }
    if views.contains(GfxViewFlags::DSV) {
        usage |= vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT;
    }
    usage
}

#[inline]
pub fn image_type(dimension: GfxTextureDimension) -> vk::ImageType {
    match dimension {
        GfxTextureDimension::Tex2D => vk::ImageType::TYPE_2D,
        GfxTextureDimension::Tex3D => vk::ImageType::TYPE_3D,
    }
}

/// SRV/UAV 的 view type 随维度变化；RTV/DSV 总是 2D
#[inline]
pub fn image_view_type(dimension: GfxTextureDimension) -> vk::ImageViewType {
    match dimension {
        GfxTextureDimension::Tex2D => vk::ImageViewType::TYPE_2D,
        GfxTextureDimension::Tex3D => vk::ImageViewType::TYPE_3D,
    }
}

/// 创建资源时确定的 clear value，开始渲染时作为 attachment 的 clear value
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum GfxClearValue {
    Color([f32; 4]),
    DepthStencil { depth: f32, stencil: u32 },
}

impl GfxClearValue {
    pub fn vk_clear_value(self) -> vk::ClearValue {
        match self {
            GfxClearValue::Color(float32) => vk::ClearValue {
                color: vk::ClearColorValue { float32 },
            },
            GfxClearValue::DepthStencil { depth, stencil } => vk::ClearValue {
                depth_stencil: vk::ClearDepthStencilValue { depth, stencil },
            },
        }
    }
}

/// DSV：depth 1.0，stencil 0；RTV：黑色，alpha 为 1
pub fn optimized_clear_value(views: GfxViewFlags) -> Option<GfxClearValue> {
    if views.contains(GfxViewFlags::DSV) {
        Some(GfxClearValue::DepthStencil {
            depth: 1.0,
            stencil: 0,
        })
    } else if views.contains(GfxViewFlags::RTV) {
        Some(GfxClearValue::Color([0.0, 0.0, 0.0, 1.0]))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        basic::align::{RESOURCE_ALIGNMENT, align_up},
        descriptors::descriptor_allocator::GfxDescriptorAllocator,
    };

    #[test]
    fn test_cube_vertex_buffer_raw_srv() {
        let desc = GfxBufferDesc::new_elements("cube", 36, 12).views(GfxViewFlags::SRV).raw(true);
        let aligned = align_up(desc.requested_size(), RESOURCE_ALIGNMENT);
        assert_eq!(aligned, 512);

        let layout = buffer_view_layout(&desc, GfxViewFlags::SRV, aligned).unwrap();
        assert_eq!(layout.num_elements, 108);
        assert_eq!(layout.element_size, 4);
        assert_eq!(layout.descriptor_type, vk::DescriptorType::STORAGE_BUFFER);
    }

    #[test]
    fn test_cube_plan_has_one_view() {
        let desc = GfxBufferDesc::new_elements("cube", 36, 12).views(GfxViewFlags::SRV).raw(true);
        let plan = buffer_view_plan(&desc, align_up(desc.requested_size(), RESOURCE_ALIGNMENT)).unwrap();
        assert_eq!(plan.len(), 1);
        assert_eq!(plan[0].0, GfxViewFlags::SRV);
        assert_eq!(plan[0].1.num_elements, 108);
    }

    #[test]
    fn test_plan_one_slot_per_view() {
        let desc = GfxBufferDesc::new("particles", 1024)
            .stride(16)
            .views(GfxViewFlags::SRV | GfxViewFlags::UAV | GfxViewFlags::CBV);
        let plan = buffer_view_plan(&desc, 1024).unwrap();
        let kinds = plan.iter().map(|(view, _)| *view).collect::<Vec<_>>();
        assert_eq!(kinds, vec![GfxViewFlags::SRV, GfxViewFlags::UAV, GfxViewFlags::CBV]);

        let mut heap = GfxDescriptorAllocator::new("cbv_srv_uav", 16, 64, 0, Some(0x1000));
        let before = heap.allocated_count();
        let descriptors = plan.iter().map(|_| heap.allocate()).collect::<Vec<_>>();
        assert_eq!(heap.allocated_count() - before, plan.len() as u32);
        assert!(descriptors.windows(2).all(|w| w[0].index != w[1].index));

        // 没有 view 的 buffer 不占用 slot
        let desc = GfxBufferDesc::new("staging", 256);
        assert!(buffer_view_plan(&desc, 256).unwrap().is_empty());
    }

    #[test]
    fn test_plan_fails_as_a_whole() {
        let desc = GfxBufferDesc::new("bad", 64).views(GfxViewFlags::SRV | GfxViewFlags::CBV);
        assert!(buffer_view_plan(&desc, 256).is_err());
    }

    #[test]
    fn test_typed_srv_uses_stride() {
        let desc = GfxBufferDesc::new("positions", 432).stride(12).views(GfxViewFlags::SRV);
        let layout = buffer_view_layout(&desc, GfxViewFlags::SRV, 512).unwrap();
        assert_eq!(layout.num_elements, 36);
        assert_eq!(layout.range, 432);

        let desc = GfxBufferDesc::new("texels", 64).format(vk::Format::R32_SFLOAT).views(GfxViewFlags::UAV);
        let layout = buffer_view_layout(&desc, GfxViewFlags::UAV, 256).unwrap();
        assert_eq!(layout.num_elements, 16);
        assert_eq!(layout.descriptor_type, vk::DescriptorType::STORAGE_TEXEL_BUFFER);
    }

    #[test]
    fn test_cbv_covers_aligned_size() {
        let desc = GfxBufferDesc::new("per-frame", 88).views(GfxViewFlags::CBV);
        let layout = buffer_view_layout(&desc, GfxViewFlags::CBV, 256).unwrap();
        assert_eq!(layout.range, 256);
        assert_eq!(layout.descriptor_type, vk::DescriptorType::UNIFORM_BUFFER);
    }

    #[test]
    fn test_structured_without_stride_is_rejected() {
        let desc = GfxBufferDesc::new("bad", 64).views(GfxViewFlags::SRV);
        assert!(matches!(
            buffer_view_layout(&desc, GfxViewFlags::SRV, 256),
            Err(GfxError::InvalidDescription(_))
        ));
        assert!(buffer_view_layout(&desc, GfxViewFlags::RTV, 256).is_err());
    }

    #[test]
    fn test_clear_values() {
        assert_eq!(
            optimized_clear_value(GfxViewFlags::DSV),
            Some(GfxClearValue::DepthStencil {
                depth: 1.0,
                stencil: 0
            })
        );
        assert_eq!(
            optimized_clear_value(GfxViewFlags::RTV | GfxViewFlags::SRV),
            Some(GfxClearValue::Color([0.0, 0.0, 0.0, 1.0]))
        );
        assert_eq!(optimized_clear_value(GfxViewFlags::SRV), None);
    }

    #[test]
    fn test_usage_follows_views() {
        let usage = image_usage(GfxViewFlags::RTV | GfxViewFlags::SRV);
        assert!(usage.contains(vk::ImageUsageFlags::COLOR_ATTACHMENT | vk::ImageUsageFlags::SAMPLED));
        assert!(!usage.contains(vk::ImageUsageFlags::STORAGE));

        let usage = buffer_usage(GfxViewFlags::CBV, false);
        assert!(usage.contains(vk::BufferUsageFlags::UNIFORM_BUFFER));
        assert!(!usage.contains(vk::BufferUsageFlags::STORAGE_BUFFER));
        assert_eq!(image_view_type(GfxTextureDimension::Tex3D), vk::ImageViewType::TYPE_3D);
    }
}
