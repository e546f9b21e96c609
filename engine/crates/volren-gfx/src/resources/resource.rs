use std::ptr::NonNull;

use ash::vk;

use crate::{
    descriptors::descriptor_allocator::GfxDescriptor,
    error::{GfxError, GfxResult, VkResultExt},
    foundation::{device::GfxDevice, mem_allocator::GfxMemAllocator},
    resources::{
        desc::{GfxResidency, GfxTextureDimension},
        format::GfxTextureFormats,
        mapped::GfxMapped,
        view_layout::GfxClearValue,
    },
    state::{
        resource_state::GfxResourceState,
        state_tracker::{GfxBarrierTarget, GfxStateTracked},
    },
};

/// 资源的内存来源
pub enum GfxMemory {
    /// 由 VMA 分配
    Allocated(vk_mem::Allocation),
    /// 外部资源（例如 swapchain image），不管理其内存生命周期
    External,
}

pub enum GfxResourceKind {
    Buffer {
        handle: vk::Buffer,
        residency: GfxResidency,
        device_address: vk::DeviceAddress,
        stride: u32,
    },
    Texture {
        handle: vk::Image,
        dimension: GfxTextureDimension,
        extent: vk::Extent3D,
        formats: GfxTextureFormats,
        aspect: vk::ImageAspectFlags,
        clear_value: Option<GfxClearValue>,
    },
}

/// 资源持有的 view，每种最多一个
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct GfxResourceViews {
    pub srv: Option<GfxDescriptor>,
    pub uav: Option<GfxDescriptor>,
    pub cbv: Option<GfxDescriptor>,
    pub rtv: Option<GfxDescriptor>,
    pub dsv: Option<GfxDescriptor>,
}

impl GfxResourceViews {
    /// shader 通过这个 index 访问资源：优先 SRV，其次 UAV，最后 CBV
    #[inline]
    pub fn descriptor_index(&self) -> Option<u32> {
        self.srv.or(self.uav).or(self.cbv).map(|d| d.index)
    }
}

/// buffer 或者 texture
///
/// 由请求者独占，需要在 GPU 不再使用之后通过 [`crate::gfx::Gfx::destroy_resource`] 销毁
pub struct GfxResource {
    name: String,
    kind: GfxResourceKind,
    memory: GfxMemory,

    /// buffer 为对齐后的字节数，texture 为 allocation 的字节数
    size: u64,
    current_state: GfxResourceState,
    views: GfxResourceViews,

    /// SRV/UAV/RTV/DSV 对应的 image view，随资源一起销毁
    image_views: Vec<vk::ImageView>,

    #[cfg(debug_assertions)]
    destroyed: bool,
}

// new & init
impl GfxResource {
    pub(crate) fn new(
        name: String,
        kind: GfxResourceKind,
        memory: GfxMemory,
        size: u64,
        views: GfxResourceViews,
        image_views: Vec<vk::ImageView>,
    ) -> Self {
        Self {
            name,
            kind,
            memory,
            size,
            current_state: GfxResourceState::Undefined,
            views,
            image_views,

            #[cfg(debug_assertions)]
            destroyed: false,
        }
    }

    /// 调用之前需要确保 GPU 已经不再使用该资源
    pub fn destroy(mut self, device: &GfxDevice, allocator: &GfxMemAllocator) {
        log::debug!("destroying resource `{}`", self.name);
        unsafe {
            for view in self.image_views.drain(..) {
                device.destroy_image_view(view, None);
            }
            if let GfxMemory::Allocated(allocation) = &mut self.memory {
                match &self.kind {
                    GfxResourceKind::Buffer { handle, .. } => allocator.destroy_buffer(*handle, allocation),
                    GfxResourceKind::Texture { handle, .. } => allocator.destroy_image(*handle, allocation),
                }
            }
        }

        #[cfg(debug_assertions)]
        {
            self.destroyed = true;
        }
    }
}

// 创建过程中使用
impl GfxResource {
    #[inline]
    pub(crate) fn set_views(&mut self, views: GfxResourceViews) {
        self.views = views;
    }

    #[inline]
    pub(crate) fn push_image_view(&mut self, view: vk::ImageView) {
        self.image_views.push(view);
    }
}

impl Drop for GfxResource {
    fn drop(&mut self) {
        // 初始化失败时，已经创建的资源会直接 drop，只记录泄漏而不 panic，避免掩盖原本的错误
        #[cfg(debug_assertions)]
        if !self.destroyed {
            log::error!("resource `{}` dropped without destroy", self.name);
        }
    }
}

// getters
impl GfxResource {
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn kind(&self) -> &GfxResourceKind {
        &self.kind
    }

    #[inline]
    pub fn size(&self) -> u64 {
        self.size
    }

    #[inline]
    pub fn current_state(&self) -> GfxResourceState {
        self.current_state
    }

    #[inline]
    pub fn views(&self) -> &GfxResourceViews {
        &self.views
    }

    #[inline]
    pub fn descriptor_index(&self) -> Option<u32> {
        self.views.descriptor_index()
    }

    /// # panic
    /// 不是 buffer 时 panic
    pub fn vk_buffer(&self) -> vk::Buffer {
        match &self.kind {
            GfxResourceKind::Buffer { handle, .. } => *handle,
            GfxResourceKind::Texture { .. } => panic!("resource `{}` is not a buffer", self.name),
        }
    }

    /// buffer 的 element stride，texture 为 0
    pub fn stride(&self) -> u32 {
        match &self.kind {
            GfxResourceKind::Buffer { stride, .. } => *stride,
            GfxResourceKind::Texture { .. } => 0,
        }
    }

    pub fn device_address(&self) -> Option<vk::DeviceAddress> {
        match &self.kind {
            GfxResourceKind::Buffer { device_address, .. } => Some(*device_address),
            GfxResourceKind::Texture { .. } => None,
        }
    }

    /// # panic
    /// 不是 texture 时 panic
    pub fn vk_image(&self) -> vk::Image {
        match &self.kind {
            GfxResourceKind::Texture { handle, .. } => *handle,
            GfxResourceKind::Buffer { .. } => panic!("resource `{}` is not a texture", self.name),
        }
    }

    pub fn extent(&self) -> Option<vk::Extent3D> {
        match &self.kind {
            GfxResourceKind::Texture { extent, .. } => Some(*extent),
            GfxResourceKind::Buffer { .. } => None,
        }
    }

    pub fn formats(&self) -> Option<&GfxTextureFormats> {
        match &self.kind {
            GfxResourceKind::Texture { formats, .. } => Some(formats),
            GfxResourceKind::Buffer { .. } => None,
        }
    }

    pub fn aspect(&self) -> vk::ImageAspectFlags {
        match &self.kind {
            GfxResourceKind::Texture { aspect, .. } => *aspect,
            GfxResourceKind::Buffer { .. } => vk::ImageAspectFlags::empty(),
        }
    }

    pub fn clear_value(&self) -> Option<GfxClearValue> {
        match &self.kind {
            GfxResourceKind::Texture { clear_value, .. } => *clear_value,
            GfxResourceKind::Buffer { .. } => None,
        }
    }
}

// tools
impl GfxResource {
    /// map 整个 buffer，返回的 guard drop 时 unmap
    ///
    /// 只有 upload / readback 的 buffer 可以 map
    pub fn map<'a>(&'a mut self, allocator: &'a GfxMemAllocator) -> GfxResult<GfxMapped<'a>> {
        let residency = match &self.kind {
            GfxResourceKind::Buffer { residency, .. } => *residency,
            GfxResourceKind::Texture { .. } => GfxResidency::Device,
        };
        let GfxMemory::Allocated(allocation) = &mut self.memory else {
            return Err(GfxError::InvalidDescription(format!("resource `{}` is not allocated by vma", self.name)));
        };
        if !residency.is_host_visible() {
            return Err(GfxError::InvalidDescription(format!("resource `{}` is not host visible", self.name)));
        }

        let ptr = unsafe { allocator.map_memory(allocation) }.vk_context("map resource")?;
        let Some(ptr) = NonNull::new(ptr) else {
            unsafe { allocator.unmap_memory(allocation) };
            return Err(GfxError::from_vk("map resource", vk::Result::ERROR_MEMORY_MAP_FAILED));
        };
        Ok(unsafe { GfxMapped::new(allocator, allocation, ptr, self.size as usize, &self.name) })
    }
}

impl GfxStateTracked for GfxResource {
    #[inline]
    fn current_state(&self) -> GfxResourceState {
        self.current_state
    }

    #[inline]
    fn set_current_state(&mut self, state: GfxResourceState) {
        self.current_state = state;
    }

    fn barrier_target(&self) -> GfxBarrierTarget {
        match &self.kind {
            GfxResourceKind::Buffer { handle, .. } => GfxBarrierTarget::Buffer { buffer: *handle },
            GfxResourceKind::Texture { handle, aspect, .. } => GfxBarrierTarget::Image {
                image: *handle,
                aspect: *aspect,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptors::descriptor_allocator::GfxDescriptorAllocator;

    #[test]
    fn test_descriptor_index_prefers_srv() {
        let mut heap = GfxDescriptorAllocator::new("test", 8, 64, 0x1000, Some(0x2000));
        let cbv = heap.allocate();
        let uav = heap.allocate();
        let srv = heap.allocate();

        let views = GfxResourceViews {
            cbv: Some(cbv),
            ..Default::default()
        };
        assert_eq!(views.descriptor_index(), Some(cbv.index));

        let views = GfxResourceViews {
            cbv: Some(cbv),
            uav: Some(uav),
            ..Default::default()
        };
        assert_eq!(views.descriptor_index(), Some(uav.index));

        let views = GfxResourceViews {
            cbv: Some(cbv),
            uav: Some(uav),
            srv: Some(srv),
            ..Default::default()
        };
        assert_eq!(views.descriptor_index(), Some(srv.index));
        assert_eq!(GfxResourceViews::default().descriptor_index(), None);
    }
}
