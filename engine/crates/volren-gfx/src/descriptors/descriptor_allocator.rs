use ash::vk;

/// 描述符在 CPU 侧的地址
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GfxCpuDescriptorHandle(pub usize);

/// 描述符在 GPU 侧的地址，只有 shader visible 的表才有
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GfxGpuDescriptorHandle(pub vk::DeviceAddress);

/// 描述符表中的一个 slot，一旦分配就不会改变，也不会回收
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GfxDescriptor {
    pub cpu_handle: GfxCpuDescriptorHandle,
    pub gpu_handle: Option<GfxGpuDescriptorHandle>,
    /// 在表中的下标，shader 中通过这个下标访问资源
    pub index: u32,
}

/// 固定容量的 bump 分配器
///
/// `handle = start + index * handle_stride`。不是线程安全的，只在初始化和创建资源时使用
#[derive(Debug)]
pub struct GfxDescriptorAllocator {
    name: &'static str,
    capacity: u32,
    handle_stride: usize,
    cpu_start: usize,
    gpu_start: Option<vk::DeviceAddress>,
    next_index: u32,
}

// new & init
impl GfxDescriptorAllocator {
    pub fn new(
        name: &'static str,
        capacity: u32,
        handle_stride: usize,
        cpu_start: usize,
        gpu_start: Option<vk::DeviceAddress>,
    ) -> Self {
        Self {
            name,
            capacity,
            handle_stride,
            cpu_start,
            gpu_start,
            next_index: 0,
        }
    }
}

// getters
impl GfxDescriptorAllocator {
    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }
    #[inline]
    pub fn capacity(&self) -> u32 {
        self.capacity
    }
    #[inline]
    pub fn allocated_count(&self) -> u32 {
        self.next_index
    }
    #[inline]
    pub fn handle_stride(&self) -> usize {
        self.handle_stride
    }
    #[inline]
    pub fn is_shader_visible(&self) -> bool {
        self.gpu_start.is_some()
    }
}

// tools
impl GfxDescriptorAllocator {
    /// 分配下一个 slot
    ///
    /// # panic
    /// 超出容量时 panic，描述符表不会扩容
    pub fn allocate(&mut self) -> GfxDescriptor {
        assert!(
            self.next_index < self.capacity,
            "descriptor heap `{}` exhausted: capacity is {}",
            self.name,
            self.capacity
        );

        let index = self.next_index;
        self.next_index += 1;

        GfxDescriptor {
            cpu_handle: self.cpu_handle(index),
            gpu_handle: self.gpu_handle(index),
            index,
        }
    }

    #[inline]
    pub fn cpu_handle(&self, index: u32) -> GfxCpuDescriptorHandle {
        GfxCpuDescriptorHandle(self.cpu_start + index as usize * self.handle_stride)
    }

    #[inline]
    pub fn gpu_handle(&self, index: u32) -> Option<GfxGpuDescriptorHandle> {
        self.gpu_start.map(|start| GfxGpuDescriptorHandle(start + index as u64 * self.handle_stride as u64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_indices_strictly_increase() {
        let mut heap = GfxDescriptorAllocator::new("srv", 1024, 64, 0x1000, Some(0x8000_0000));
        let descriptors = (0..100).map(|_| heap.allocate()).collect::<Vec<_>>();

        for (i, d) in descriptors.iter().enumerate() {
            assert_eq!(d.index, i as u32);
            assert_eq!(d.cpu_handle, GfxCpuDescriptorHandle(0x1000 + i * 64));
            assert_eq!(d.gpu_handle, Some(GfxGpuDescriptorHandle(0x8000_0000 + i as u64 * 64)));
        }
        assert!(descriptors.windows(2).all(|w| w[0].index < w[1].index));
        assert_eq!(heap.allocated_count(), 100);
    }

    #[test]
    fn test_cpu_only_heap_has_no_gpu_handle() {
        let mut heap = GfxDescriptorAllocator::new("rtv", 3, 8, 0x40, None);
        assert!(!heap.is_shader_visible());
        let d = heap.allocate();
        assert_eq!(d.gpu_handle, None);
        assert_eq!(d.cpu_handle, GfxCpuDescriptorHandle(0x40));
    }

    #[test]
    fn test_fill_to_capacity() {
        let mut heap = GfxDescriptorAllocator::new("dsv", 4, 8, 0, None);
        for _ in 0..4 {
            heap.allocate();
        }
        assert_eq!(heap.allocated_count(), heap.capacity());
    }

    #[test]
    #[should_panic(expected = "exhausted")]
    fn test_allocate_past_capacity_panics() {
        let mut heap = GfxDescriptorAllocator::new("rtv", 3, 8, 0, None);
        for _ in 0..4 {
            heap.allocate();
        }
    }
}
