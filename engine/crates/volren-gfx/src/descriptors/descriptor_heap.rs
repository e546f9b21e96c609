use std::ptr::NonNull;

use ash::vk;
use vk_mem::Alloc;

use crate::{
    basic::align::align_up,
    descriptors::descriptor_allocator::{GfxDescriptor, GfxDescriptorAllocator},
    error::{GfxResult, VkResultExt},
    foundation::{device::GfxDevice, mem_allocator::GfxMemAllocator, physical_device::GfxPhysicalDevice},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GfxDescriptorHeapKind {
    /// shader visible，存放 CBV/SRV/UAV
    CbvSrvUav,
    Rtv,
    Dsv,
}

/// 各种描述符在 descriptor buffer 中占用的字节数
#[derive(Debug, Clone, Copy, Default)]
pub struct GfxDescriptorSizes {
    pub sampled_image: usize,
    pub storage_image: usize,
    pub uniform_texel_buffer: usize,
    pub storage_texel_buffer: usize,
    pub uniform_buffer: usize,
    pub storage_buffer: usize,
}

impl GfxDescriptorSizes {
    pub fn from_props(props: &vk::PhysicalDeviceDescriptorBufferPropertiesEXT) -> Self {
        Self {
            sampled_image: props.sampled_image_descriptor_size,
            storage_image: props.storage_image_descriptor_size,
            uniform_texel_buffer: props.uniform_texel_buffer_descriptor_size,
            storage_texel_buffer: props.storage_texel_buffer_descriptor_size,
            uniform_buffer: props.uniform_buffer_descriptor_size,
            storage_buffer: props.storage_buffer_descriptor_size,
        }
    }

    pub fn size_of(&self, ty: vk::DescriptorType) -> usize {
        match ty {
            vk::DescriptorType::SAMPLED_IMAGE => self.sampled_image,
            vk::DescriptorType::STORAGE_IMAGE => self.storage_image,
            vk::DescriptorType::UNIFORM_TEXEL_BUFFER => self.uniform_texel_buffer,
            vk::DescriptorType::STORAGE_TEXEL_BUFFER => self.storage_texel_buffer,
            vk::DescriptorType::UNIFORM_BUFFER => self.uniform_buffer,
            vk::DescriptorType::STORAGE_BUFFER => self.storage_buffer,
            _ => panic!("descriptor type {:?} can not be placed in the resource heap", ty),
        }
    }

    /// 每个 slot 的大小：能容纳任意一种资源描述符
    pub fn handle_stride(&self, alignment: usize) -> usize {
        let max_size = [
            self.sampled_image,
            self.storage_image,
            self.uniform_texel_buffer,
            self.storage_texel_buffer,
            self.uniform_buffer,
            self.storage_buffer,
        ]
        .into_iter()
        .max()
        .unwrap_or(0);

        align_up(max_size.max(1) as u64, alignment.max(1) as u64) as usize
    }
}

enum GfxDescriptorStorage {
    /// host visible 的 descriptor buffer，常驻 map
    DescriptorBuffer {
        buffer: vk::Buffer,
        allocation: vk_mem::Allocation,
        mapped: NonNull<u8>,
        device_address: vk::DeviceAddress,
        sizes: GfxDescriptorSizes,
    },
    /// 只在 CPU 侧使用的 attachment view 表
    ViewTable { slots: Box<[vk::ImageView]> },
}

/// 固定容量的描述符表
///
/// 底层由 [`GfxDescriptorAllocator`] 进行 bump 分配，slot 永不回收
pub struct GfxDescriptorHeap {
    kind: GfxDescriptorHeapKind,
    allocator: GfxDescriptorAllocator,
    storage: GfxDescriptorStorage,
}

// new & init
impl GfxDescriptorHeap {
    /// 创建 shader visible 的 CBV/SRV/UAV 表
    pub fn new_shader_visible(
        device: &GfxDevice,
        mem_allocator: &GfxMemAllocator,
        pdevice: &GfxPhysicalDevice,
        capacity: u32,
    ) -> GfxResult<Self> {
        let props = pdevice.descriptor_buffer_props();
        let sizes = GfxDescriptorSizes::from_props(props);
        let handle_stride = sizes.handle_stride(props.descriptor_buffer_offset_alignment as usize);

        let buffer_ci = vk::BufferCreateInfo::default()
            .size(capacity as u64 * handle_stride as u64)
            .usage(vk::BufferUsageFlags::RESOURCE_DESCRIPTOR_BUFFER_EXT | vk::BufferUsageFlags::SHADER_DEVICE_ADDRESS);
        let alloc_ci = vk_mem::AllocationCreateInfo {
            usage: vk_mem::MemoryUsage::AutoPreferDevice,
            flags: vk_mem::AllocationCreateFlags::HOST_ACCESS_SEQUENTIAL_WRITE,
            ..Default::default()
        };

        let (buffer, mut allocation) =
            unsafe { mem_allocator.create_buffer(&buffer_ci, &alloc_ci) }.vk_context("create descriptor buffer")?;
        let mapped = unsafe { mem_allocator.map_memory(&mut allocation) }.vk_context("map descriptor buffer")?;
        let Some(mapped) = NonNull::new(mapped) else {
            unsafe { mem_allocator.destroy_buffer(buffer, &mut allocation) };
            return Err(crate::error::GfxError::from_vk("map descriptor buffer", vk::Result::ERROR_MEMORY_MAP_FAILED));
        };
        let device_address =
            unsafe { device.get_buffer_device_address(&vk::BufferDeviceAddressInfo::default().buffer(buffer)) };
        device.set_object_debug_name(buffer, "descriptor-heap-cbv-srv-uav");

        log::info!(
            "create cbv/srv/uav descriptor heap: capacity {}, stride {} bytes, address {:#x}",
            capacity,
            handle_stride,
            device_address
        );

        Ok(Self {
            kind: GfxDescriptorHeapKind::CbvSrvUav,
            allocator: GfxDescriptorAllocator::new(
                "cbv-srv-uav",
                capacity,
                handle_stride,
                mapped.as_ptr() as usize,
                Some(device_address),
            ),
            storage: GfxDescriptorStorage::DescriptorBuffer {
                buffer,
                allocation,
                mapped,
                device_address,
                sizes,
            },
        })
    }

    /// 创建 RTV 或者 DSV 表
    pub fn new_view_table(kind: GfxDescriptorHeapKind, capacity: u32) -> Self {
        assert_ne!(kind, GfxDescriptorHeapKind::CbvSrvUav, "cbv/srv/uav heap must be shader visible");
        let slots = vec![vk::ImageView::null(); capacity as usize].into_boxed_slice();
        let name = match kind {
            GfxDescriptorHeapKind::Rtv => "rtv",
            _ => "dsv",
        };
        log::info!("create {} descriptor heap: capacity {}", name, capacity);

        Self {
            kind,
            allocator: GfxDescriptorAllocator::new(
                name,
                capacity,
                size_of::<vk::ImageView>(),
                slots.as_ptr() as usize,
                None,
            ),
            storage: GfxDescriptorStorage::ViewTable { slots },
        }
    }

    pub fn destroy(self, mem_allocator: &GfxMemAllocator) {
        log::info!("destroying {} descriptor heap", self.allocator.name());
        if let GfxDescriptorStorage::DescriptorBuffer {
            buffer, mut allocation, ..
        } = self.storage
        {
            unsafe {
                mem_allocator.unmap_memory(&mut allocation);
                mem_allocator.destroy_buffer(buffer, &mut allocation);
            }
        }
    }
}

// getters
impl GfxDescriptorHeap {
    #[inline]
    pub fn kind(&self) -> GfxDescriptorHeapKind {
        self.kind
    }
    #[inline]
    pub fn allocated_count(&self) -> u32 {
        self.allocator.allocated_count()
    }
    #[inline]
    pub fn capacity(&self) -> u32 {
        self.allocator.capacity()
    }
    #[inline]
    pub fn handle_stride(&self) -> usize {
        self.allocator.handle_stride()
    }
}

// tools
impl GfxDescriptorHeap {
    /// # panic
    /// 超出容量时 panic
    #[inline]
    pub fn allocate(&mut self) -> GfxDescriptor {
        self.allocator.allocate()
    }

    /// 向 shader visible 表的 slot 写入一个资源描述符
    pub fn write_descriptor(
        &self,
        device: &GfxDevice,
        mem_allocator: &GfxMemAllocator,
        descriptor: &GfxDescriptor,
        get_info: &vk::DescriptorGetInfoEXT,
    ) -> GfxResult<()> {
        let GfxDescriptorStorage::DescriptorBuffer {
            allocation,
            mapped,
            sizes,
            ..
        } = &self.storage
        else {
            panic!("{:?} heap is not shader visible", self.kind);
        };
        assert!(descriptor.index < self.allocator.allocated_count(), "descriptor is not allocated from this heap");

        let size = sizes.size_of(get_info.ty);
        let offset = descriptor.index as usize * self.allocator.handle_stride();
        unsafe {
            let dst = std::slice::from_raw_parts_mut(mapped.as_ptr().add(offset), size);
            device.descriptor_buffer().get_descriptor(get_info, dst);
        }
        mem_allocator.flush_allocation(allocation, offset as u64, size as u64).vk_context("flush descriptor heap")
    }

    /// 向 RTV/DSV 表的 slot 写入 attachment view
    pub fn write_view(&mut self, descriptor: &GfxDescriptor, view: vk::ImageView) {
        let kind = self.kind;
        let GfxDescriptorStorage::ViewTable { slots } = &mut self.storage else {
            panic!("{:?} heap does not store attachment views", kind);
        };
        slots[descriptor.index as usize] = view;
    }

    /// 读取 RTV/DSV 表中的 attachment view
    pub fn view(&self, descriptor: &GfxDescriptor) -> vk::ImageView {
        let GfxDescriptorStorage::ViewTable { slots } = &self.storage else {
            panic!("{:?} heap does not store attachment views", self.kind);
        };
        slots[descriptor.index as usize]
    }

    /// 用于 `cmd_bind_descriptor_buffers`
    pub fn binding_info(&self) -> Option<vk::DescriptorBufferBindingInfoEXT<'static>> {
        match &self.storage {
            GfxDescriptorStorage::DescriptorBuffer { device_address, .. } => Some(
                vk::DescriptorBufferBindingInfoEXT::default()
                    .address(*device_address)
                    .usage(vk::BufferUsageFlags::RESOURCE_DESCRIPTOR_BUFFER_EXT),
            ),
            GfxDescriptorStorage::ViewTable { .. } => None,
        }
    }
}

/// 设备持有的三张描述符表
pub struct GfxDescriptorHeaps {
    pub cbv_srv_uav: GfxDescriptorHeap,
    pub rtv: GfxDescriptorHeap,
    pub dsv: GfxDescriptorHeap,
}

impl GfxDescriptorHeaps {
    pub fn destroy(self, mem_allocator: &GfxMemAllocator) {
        self.cbv_srv_uav.destroy(mem_allocator);
        self.rtv.destroy(mem_allocator);
        self.dsv.destroy(mem_allocator);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sizes() -> GfxDescriptorSizes {
        GfxDescriptorSizes {
            sampled_image: 32,
            storage_image: 32,
            uniform_texel_buffer: 16,
            storage_texel_buffer: 16,
            uniform_buffer: 24,
            storage_buffer: 24,
        }
    }

    #[test]
    fn test_handle_stride_fits_largest_descriptor() {
        assert_eq!(sizes().handle_stride(1), 32);
        assert_eq!(sizes().handle_stride(64), 64);
        assert_eq!(sizes().size_of(vk::DescriptorType::UNIFORM_BUFFER), 24);
    }

    #[test]
    fn test_view_table_roundtrip() {
        let mut rtv = GfxDescriptorHeap::new_view_table(GfxDescriptorHeapKind::Rtv, 3);
        let d0 = rtv.allocate();
        let d1 = rtv.allocate();
        assert_eq!(d1.cpu_handle.0 - d0.cpu_handle.0, size_of::<vk::ImageView>());
        assert!(d0.gpu_handle.is_none());
        assert_eq!(rtv.binding_info().map(|_| ()), None);

        use ash::vk::Handle;
        let view = vk::ImageView::from_raw(0xabcd);
        rtv.write_view(&d1, view);
        assert_eq!(rtv.view(&d1), view);
        assert_eq!(rtv.view(&d0), vk::ImageView::null());
    }

    #[test]
    #[should_panic(expected = "exhausted")]
    fn test_view_table_overflow() {
        let mut dsv = GfxDescriptorHeap::new_view_table(GfxDescriptorHeapKind::Dsv, 1);
        dsv.allocate();
        dsv.allocate();
    }
}
