pub mod descriptor_allocator;
pub mod descriptor_heap;
