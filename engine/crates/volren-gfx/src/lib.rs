//! Volren 的 GFX 层
//!
//! 在 Vulkan 之上提供一个精简的 GPU 资源与帧同步核心：
//! - [`descriptors`]：固定容量的描述符表，bump 分配，永不回收
//! - [`commands`]：基于 timeline semaphore 的提交队列
//! - [`resources`]：根据声明式的描述创建 buffer / texture 以及它们的 view
//! - [`state`]：资源状态追踪，只在状态变化时生成 barrier
//! - [`frame`]：`FRAMES_IN_FLIGHT` 帧的 ring
//! - [`gfx_core`]：instance、surface、device 以及内存分配器
//! - [`gfx`]：把上面这些组合起来的 [`gfx::Gfx`]
//!
//! 没有任何全局单例，所有对象都通过显式传入的 [`config::GfxConfig`] 构造。

pub mod basic;
pub mod commands;
pub mod config;
pub mod descriptors;
pub mod error;
pub mod foundation;
pub mod frame;
pub mod gfx;
pub mod gfx_core;
pub mod resources;
pub mod state;
pub mod swapchain;
