//! Windowed frame loop
//!
//! [`Engine`] owns the window, a wgpu-backed [`Renderer`] and a free-fly
//! [`Camera`]. Each frame it applies pending resizes, moves the camera from
//! input (WASD, Q/E, right mouse drag), lets the [`Application`] queue draws
//! and renders.

use crate::backend::traits::BackendError;
use crate::backend::wgpu_backend::WgpuBackend;
use crate::renderer::{RenderError, RenderResult, Renderer};
use crate::scene::{Camera, CameraMovement};
use crate::window::{Key, KeyAction, Window, WinitWindow};
use crate::EngineConfig;
use glam::Vec3;
use std::time::Instant;
use thiserror::Error;
use winit::{
    error::{EventLoopError, OsError},
    event::{Event, WindowEvent},
    event_loop::{ControlFlow, EventLoop},
};

/// Fatal engine errors
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Event loop error: {0}")]
    EventLoop(#[from] EventLoopError),
    #[error("Failed to create window: {0}")]
    Window(#[from] OsError),
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error(transparent)]
    Render(#[from] RenderError),
}

/// Application callbacks driven by [`Engine::run`]
pub trait Application {
    /// Create renderables and lights; called once before the first frame
    fn init(&mut self, renderer: &mut Renderer<WgpuBackend>, camera: &mut Camera) -> RenderResult<()>;

    /// Per-frame logic after the built-in camera controls
    fn update(&mut self, _window: &dyn Window, _camera: &mut Camera, _dt: f32) {}

    /// Queue this frame's draws; `time` is seconds since start
    fn render(&mut self, renderer: &mut Renderer<WgpuBackend>, time: f32);
}

const KEY_MOVEMENTS: [(Key, CameraMovement); 6] = [
    (Key::W, CameraMovement::Forward),
    (Key::S, CameraMovement::Backward),
    (Key::A, CameraMovement::Left),
    (Key::D, CameraMovement::Right),
    (Key::E, CameraMovement::Up),
    (Key::Q, CameraMovement::Down),
];

/// Window, renderer and camera
pub struct Engine {
    window: WinitWindow,
    renderer: Renderer<WgpuBackend>,
    camera: Camera,
    start: Instant,
    last_frame: Instant,
}

impl Engine {
    pub fn new(event_loop: &EventLoop<()>, config: EngineConfig) -> Result<Self, EngineError> {
        let window = WinitWindow::new(event_loop, &config.title, config.width, config.height)?;
        let backend = WgpuBackend::new(
            window.window_arc(),
            window.width(),
            window.height(),
            config.vsync,
        )?;
        let renderer = Renderer::new(backend, config.renderer)?;

        let (width, height) = renderer.size();
        let camera = Camera::new(Vec3::new(0.0, 1.0, -5.0), width as f32 / height as f32);

        let now = Instant::now();
        Ok(Self {
            window,
            renderer,
            camera,
            start: now,
            last_frame: now,
        })
    }

    pub fn renderer(&self) -> &Renderer<WgpuBackend> {
        &self.renderer
    }

    pub fn renderer_mut(&mut self) -> &mut Renderer<WgpuBackend> {
        &mut self.renderer
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    /// Create the window and renderer, then run `app` until the window closes
    pub fn run<A: Application>(config: EngineConfig, mut app: A) -> Result<(), EngineError> {
        let event_loop = EventLoop::new()?;
        let mut engine = Self::new(&event_loop, config)?;
        app.init(&mut engine.renderer, &mut engine.camera)?;

        let mut result = Ok(());
        event_loop.run(|event, elwt| {
            elwt.set_control_flow(ControlFlow::Poll);

            match event {
                Event::WindowEvent { event, .. } => {
                    engine.window.handle_event(&event);

                    if let WindowEvent::RedrawRequested = event {
                        if let Err(e) = engine.frame(&mut app) {
                            log::error!("Frame failed: {}", e);
                            result = Err(e.into());
                            elwt.exit();
                        }
                    }
                }
                Event::DeviceEvent { event, .. } => {
                    engine.window.handle_device_event(&event);
                }
                Event::AboutToWait => {
                    if engine.window.should_close() {
                        elwt.exit();
                    } else {
                        engine.window.request_redraw();
                    }
                }
                _ => {}
            }
        })?;

        engine.renderer.shutdown();
        log::info!("Engine shut down");
        result
    }

    fn frame<A: Application>(&mut self, app: &mut A) -> RenderResult<()> {
        if let Some((width, height)) = self.window.take_resize() {
            self.renderer.resize(width, height)?;
            if width > 0 && height > 0 {
                self.camera.set_aspect(width as f32 / height as f32);
            }
        }

        let now = Instant::now();
        let dt = now.duration_since(self.last_frame).as_secs_f32();
        self.last_frame = now;

        self.update_camera(dt);
        app.update(&self.window, &mut self.camera, dt);

        self.renderer.set_view_matrix(self.camera.view_matrix());
        self.renderer
            .set_projection_matrix(self.camera.projection_matrix());
        app.render(&mut self.renderer, now.duration_since(self.start).as_secs_f32());
        let drawn = self.renderer.draw();

        self.window.end_frame();
        drawn
    }

    fn update_camera(&mut self, dt: f32) {
        if self.window.is_key_event(Key::Escape, KeyAction::Press) {
            self.window.request_close();
        }

        for (key, movement) in KEY_MOVEMENTS {
            if self.window.is_key_event(key, KeyAction::Held) {
                self.camera.move_in(movement, dt);
            }
        }

        if self.window.is_key_event(Key::MouseRight, KeyAction::Held) {
            self.camera.look(self.window.mouse_delta());
        }
    }
}
