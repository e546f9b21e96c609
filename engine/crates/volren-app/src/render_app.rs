use anyhow::Context;
use ash::vk;
use raw_window_handle::{RawDisplayHandle, RawWindowHandle};
use volren_crate_tools::init_log::init_log;
use volren_gfx::gfx::Gfx;

use crate::{config::AppConfig, volume_app::VolumeApp};

pub fn panic_handler(info: &std::panic::PanicHookInfo) {
    log::error!("{}", info);
}

/// 窗口与渲染之间的桥：持有 [`Gfx`] 以及体渲染的资源
///
/// 窗口创建之后才能初始化，销毁顺序与创建顺序相反
pub struct RenderApp {
    config: AppConfig,

    /// 先于 `gfx` 销毁
    volume_app: Option<VolumeApp>,
    gfx: Option<Gfx>,
}
// new & init
impl RenderApp {
    pub fn init_env() {
        std::panic::set_hook(Box::new(panic_handler));

        init_log();

        tracy_client::Client::start();
        tracy_client::set_thread_name!("RenderThread");
    }

    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            volume_app: None,
            gfx: None,
        }
    }

    pub fn init_after_window(
        &mut self,
        raw_display_handle: RawDisplayHandle,
        raw_window_handle: RawWindowHandle,
        window_extent: [u32; 2],
    ) -> anyhow::Result<()> {
        let _span = tracy_client::span!("RenderApp::init_after_window");

        let extent = vk::Extent2D {
            width: window_extent[0],
            height: window_extent[1],
        };
        let mut gfx = Gfx::new(self.config.gfx.clone(), raw_display_handle, raw_window_handle, extent)
            .context("create gfx")?;
        let volume_app = match VolumeApp::new(&mut gfx, &self.config) {
            Ok(volume_app) => volume_app,
            Err(e) => {
                // 已经创建的资源随 Gfx 一起丢弃
                drop(gfx);
                return Err(e);
            }
        };

        self.volume_app = Some(volume_app);
        self.gfx = Some(gfx);
        Ok(())
    }

    #[inline]
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    #[inline]
    pub fn is_initialized(&self) -> bool {
        self.gfx.is_some()
    }
}
// update
impl RenderApp {
    /// 渲染一帧；窗口还没有创建时什么都不做
    pub fn big_update(&mut self) -> anyhow::Result<()> {
        let (Some(gfx), Some(volume_app)) = (self.gfx.as_mut(), self.volume_app.as_mut()) else {
            return Ok(());
        };

        volume_app.render(gfx)?;
        tracy_client::frame_mark();
        Ok(())
    }

    pub fn on_window_resized(&mut self, width: u32, height: u32) -> anyhow::Result<()> {
        let Some(gfx) = self.gfx.as_mut() else {
            return Ok(());
        };
        log::info!("window resized: {}x{}", width, height);
        gfx.resize(width, height).context("resize swapchain")
    }
}
// destroy
impl RenderApp {
    /// 等待 GPU 空闲，先销毁体渲染的资源，再销毁 Gfx
    pub fn destroy(&mut self) -> anyhow::Result<()> {
        let Some(mut gfx) = self.gfx.take() else {
            return Ok(());
        };

        let result = match self.volume_app.take() {
            Some(volume_app) => volume_app.destroy(&mut gfx),
            None => Ok(()),
        };
        drop(gfx);

        log::info!("render app destroyed");
        result
    }
}
