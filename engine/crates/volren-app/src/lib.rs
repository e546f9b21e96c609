//! 体渲染应用
//!
//! 在 [`volren_gfx`] 之上创建体渲染需要的资源，并在每一帧中录制 front/back face 的
//! 捕获 pass 以及 back buffer 的 clear。

pub mod config;
pub mod constants;
pub mod cube;
pub mod render_app;
pub mod volume;
pub mod volume_app;
