pub mod command_buffer;
pub mod command_pool;
pub mod command_queue;
pub mod fence_counter;
pub mod semaphore;
pub mod submit_info;
