use std::{
    ops::{Deref, DerefMut},
    ptr::NonNull,
};

use ash::vk;

use crate::foundation::mem_allocator::GfxMemAllocator;

/// host visible 资源在作用域内的 map
///
/// drop 时 flush 并 unmap，因此任何退出路径上都会 unmap
pub struct GfxMapped<'a> {
    allocator: &'a GfxMemAllocator,
    allocation: &'a mut vk_mem::Allocation,
    ptr: NonNull<u8>,
    len: usize,
    name: &'a str,
}

impl<'a> GfxMapped<'a> {
    /// 调用者需要保证 `ptr` 是 `allocation` map 之后得到的地址，并且至少有 `len` 字节
    pub(crate) unsafe fn new(
        allocator: &'a GfxMemAllocator,
        allocation: &'a mut vk_mem::Allocation,
        ptr: NonNull<u8>,
        len: usize,
        name: &'a str,
    ) -> Self {
        Self {
            allocator,
            allocation,
            ptr,
            len,
            name,
        }
    }

    /// 把 `value` 写到 `offset` 处
    ///
    /// # panic
    /// 超出范围时 panic
    pub fn write_pod<T: bytemuck::Pod>(&mut self, offset: usize, value: &T) {
        let bytes = bytemuck::bytes_of(value);
        self[offset..offset + bytes.len()].copy_from_slice(bytes);
    }
}

impl Deref for GfxMapped<'_> {
    type Target = [u8];
    fn deref(&self) -> &Self::Target {
        unsafe { std::slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }
}

impl DerefMut for GfxMapped<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        unsafe { std::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len) }
    }
}

impl Drop for GfxMapped<'_> {
    fn drop(&mut self) {
        // non-coherent 的内存需要 flush；coherent 的内存 vma 会直接忽略
        if let Err(e) = self.allocator.flush_allocation(&*self.allocation, 0, vk::WHOLE_SIZE) {
            log::error!("failed to flush `{}`: {:?}", self.name, e);
        }
        unsafe { self.allocator.unmap_memory(&mut *self.allocation) };
    }
}
