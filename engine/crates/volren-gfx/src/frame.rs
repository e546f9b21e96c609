pub mod frame_context;
pub mod frame_ring;
