use std::ffi::CStr;
use std::time::Instant;

use ash::vk;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use winit::application::ApplicationHandler;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, EventLoop};
use winit::keyboard::KeyCode;
use winit::window::{Window, WindowId};

use lumen_crate_tools::config::EngineConfig;
use lumen_gfx::gfx::Gfx;
use lumen_renderer::renderer::Renderer;
use lumen_scene::camera::Camera;
use lumen_scene::scene_manager::SceneManager;

use crate::demo_scene;
use crate::input::{CameraController, InputState};

pub struct WinitApp {
    config: EngineConfig,

    window: Option<Window>,
    renderer: Option<Renderer>,

    scene: SceneManager,
    camera: Camera,
    camera_controller: CameraController,
    input: InputState,

    last_tick: Instant,
    /// 事件循环中出现的致命错误，循环结束之后返回给 main
    fatal: Option<anyhow::Error>,
}
// 总的 main 函数
impl WinitApp {
    /// 整个程序的入口
    pub fn run(config: EngineConfig) -> anyhow::Result<()> {
        let event_loop = EventLoop::new()?;

        let mut app = Self {
            config,
            window: None,
            renderer: None,
            scene: SceneManager::new(),
            camera: Camera {
                position: glam::Vec3::new(0.0, 1.6, 3.0),
                pitch_deg: -10.0,
                ..Default::default()
            },
            camera_controller: CameraController::default(),
            input: InputState::default(),
            last_tick: Instant::now(),
            fatal: None,
        };

        event_loop.run_app(&mut app)?;
        log::info!("end run.");

        let fatal = app.fatal.take();
        app.destroy();
        fatal.map_or(Ok(()), Err)
    }
}
// new & init
impl WinitApp {
    /// 在 window 创建之后调用，初始化 Gfx、Renderer 和场景
    fn init_after_window(&mut self, event_loop: &ActiveEventLoop) -> anyhow::Result<()> {
        let _span = tracy_client::span!("WinitApp::init_after_window");
        let window_config = &self.config.window;
        let window_attr = Window::default_attributes()
            .with_title(window_config.title.clone())
            .with_inner_size(winit::dpi::LogicalSize::new(window_config.width, window_config.height));
        let window = event_loop.create_window(window_attr)?;

        let raw_display_handle = window.display_handle()?.as_raw();
        let raw_window_handle = window.window_handle()?.as_raw();

        // 追加 window system 需要的 extension，例如 khr::Surface
        let extra_instance_ext = ash_window::enumerate_required_extensions(raw_display_handle)?
            .iter()
            .map(|ext| unsafe { CStr::from_ptr(*ext) })
            .collect();
        Gfx::init(&window_config.title, extra_instance_ext)?;

        let size = window.inner_size();
        let mut renderer = Renderer::new(
            self.config.clone(),
            raw_display_handle,
            raw_window_handle,
            vk::Extent2D {
                width: size.width,
                height: size.height,
            },
        )?;

        let (assets, gpu) = renderer.upload_context();
        self.scene = demo_scene::build(assets, gpu)?;

        self.renderer = Some(renderer);
        self.window = Some(window);
        self.last_tick = Instant::now();
        Ok(())
    }
}
// update
impl WinitApp {
    fn tick(&mut self) -> anyhow::Result<()> {
        let _span = tracy_client::span!("WinitApp::tick");
        let Some(renderer) = self.renderer.as_mut() else {
            return Ok(());
        };

        let now = Instant::now();
        let dt = (now - self.last_tick).as_secs_f32();
        self.last_tick = now;

        if self.input.just_pressed(KeyCode::F1) {
            renderer.set_wireframe(!renderer.wireframe());
        }
        self.camera_controller.update(&mut self.camera, &self.input, dt);
        self.scene.update(dt);

        renderer.render_frame(&self.scene, &self.camera)?;
        self.input.end_frame();

        tracy_client::frame_mark();
        Ok(())
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, error: anyhow::Error) {
        log::error!("fatal: {:#}", error);
        self.fatal = Some(error);
        event_loop.exit();
    }
}
// destroy
impl WinitApp {
    fn destroy(mut self) {
        if let Some(renderer) = self.renderer.take() {
            renderer.destroy();
        }
        self.scene.clear();
        self.window = None;
        if Gfx::is_initialized() {
            Gfx::destroy();
        }
    }
}
// 各种 winit 的事件处理
impl ApplicationHandler for WinitApp {
    // 建议在这里创建 window 和 Renderer
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        log::info!("winit event: resumed");
        if self.window.is_some() {
            return;
        }
        if let Err(e) = self.init_after_window(event_loop) {
            self.fail(event_loop, e);
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _window_id: WindowId, event: WindowEvent) {
        self.input.handle_event(&event);

        match event {
            WindowEvent::CloseRequested => {
                event_loop.exit();
            }
            WindowEvent::Resized(size) => {
                if let Some(renderer) = self.renderer.as_mut() {
                    renderer.resize(vk::Extent2D {
                        width: size.width,
                        height: size.height,
                    });
                }
            }
            WindowEvent::RedrawRequested => {
                if self.input.is_pressed(KeyCode::Escape) {
                    event_loop.exit();
                    return;
                }
                if let Err(e) = self.tick() {
                    self.fail(event_loop, e);
                }
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
