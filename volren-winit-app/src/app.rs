use anyhow::Context;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use volren_app::{config::AppConfig, render_app::RenderApp};
use winit::{
    application::ApplicationHandler,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, EventLoop},
    window::{Window, WindowId},
};

pub struct WinitApp {
    render_app: RenderApp,

    window: Option<Window>,

    /// 事件回调中出现的第一个错误，事件循环结束之后返回
    error: Option<anyhow::Error>,
}
// 总的 main 函数
impl WinitApp {
    /// 整个程序的入口
    pub fn run() -> anyhow::Result<()> {
        RenderApp::init_env();

        let config = AppConfig::load()?;
        let event_loop = EventLoop::new().context("create event loop")?;

        let mut app = Self {
            render_app: RenderApp::new(config),
            window: None,
            error: None,
        };

        let run_result = event_loop.run_app(&mut app);
        log::info!("end run.");

        let destroy_result = app.destroy();
        if let Some(e) = app.error.take() {
            return Err(e);
        }
        run_result.context("run event loop")?;
        destroy_result
    }
}
// new & init
impl WinitApp {
    /// 在 window 创建之后调用，初始化 Gfx 以及体渲染的资源
    fn init_after_window(&mut self, event_loop: &ActiveEventLoop) -> anyhow::Result<()> {
        let window = Self::create_window(event_loop, self.render_app.config())?;
        let size = window.inner_size();

        self.render_app.init_after_window(
            window.display_handle()?.as_raw(),
            window.window_handle()?.as_raw(),
            [size.width, size.height],
        )?;

        self.window = Some(window);
        Ok(())
    }

    fn create_window(event_loop: &ActiveEventLoop, config: &AppConfig) -> anyhow::Result<Window> {
        let window_attr = Window::default_attributes()
            .with_title(config.window.title.clone())
            .with_inner_size(winit::dpi::PhysicalSize::new(config.window.width, config.window.height));

        event_loop.create_window(window_attr).context("create window")
    }

    /// 记录错误并退出事件循环
    fn exit_on_error(&mut self, event_loop: &ActiveEventLoop, result: anyhow::Result<()>) {
        if let Err(e) = result {
            log::error!("{:#}", e);
            self.error.get_or_insert(e);
            event_loop.exit();
        }
    }
}
// destroy
impl WinitApp {
    /// Gfx 需要在 window 之前销毁
    fn destroy(&mut self) -> anyhow::Result<()> {
        let result = self.render_app.destroy();
        self.window = None;
        result
    }
}
// 各种 winit 的事件处理
impl ApplicationHandler for WinitApp {
    // 建议在这里创建 window 和 Gfx
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        log::info!("winit event: resumed");
        if self.window.is_some() {
            return;
        }

        let result = self.init_after_window(event_loop);
        self.exit_on_error(event_loop, result);
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _window_id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                log::info!("close requested");
                event_loop.exit();
            }
            WindowEvent::Resized(size) => {
                let result = self.render_app.on_window_resized(size.width, size.height);
                self.exit_on_error(event_loop, result);
            }
            WindowEvent::RedrawRequested => {
                let result = self.render_app.big_update();
                self.exit_on_error(event_loop, result);
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(window) = self.window.as_ref() {
            window.request_redraw();
        }
    }

    fn suspended(&mut self, _event_loop: &ActiveEventLoop) {
        log::warn!("winit event: suspended");
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        log::info!("loop exiting");
    }
}
