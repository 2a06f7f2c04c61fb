//! Preview window — `winit` event loop pumped from the capture loop, `pixels` surface.

use m021_hw::Frame;
use pixels::{Pixels, SurfaceTexture};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use winit::application::ApplicationHandler;
use winit::dpi::LogicalSize;
use winit::event::{ElementState, KeyEvent, WindowEvent};
use winit::event_loop::{ActiveEventLoop, EventLoop};
use winit::keyboard::{Key, NamedKey};
use winit::platform::pump_events::{EventLoopExtPumpEvents, PumpStatus};
use winit::window::WindowId;

/// Key code reported for Escape, and for the window being closed.
pub const KEY_ESCAPE: u32 = 27;

/// Pumps allowed for the platform to deliver `Resumed` and create the window.
const STARTUP_PUMPS: usize = 16;

#[derive(Error, Debug)]
pub enum DisplayError {
    #[error("event loop: {0}")]
    EventLoop(String),
    #[error("window creation failed: {0}")]
    Window(String),
    #[error("render failed: {0}")]
    Render(String),
    #[error("surface resize failed: {0}")]
    Texture(String),
    #[error("window not available")]
    NoWindow,
}

/// Something frames can be shown on and key presses read from.
pub trait DisplaySurface {
    /// Show one frame. The frame is not retained past the call.
    fn show(&mut self, frame: &Frame) -> Result<(), DisplayError>;

    /// Process window events for up to `delay` and return the oldest pending key code.
    fn wait_key(&mut self, delay: Duration) -> Result<Option<u32>, DisplayError>;

    /// Destroy the window. Idempotent.
    fn close(&mut self);
}

/// Map a logical key to an ASCII-style code; unmapped keys are ignored.
pub fn key_code(key: &Key) -> Option<u32> {
    match key {
        Key::Named(NamedKey::Escape) => Some(KEY_ESCAPE),
        Key::Named(NamedKey::Enter) => Some(13),
        Key::Named(NamedKey::Tab) => Some(9),
        Key::Named(NamedKey::Backspace) => Some(8),
        Key::Named(NamedKey::Space) => Some(32),
        Key::Character(s) => s.chars().next().map(|c| c as u32),
        _ => None,
    }
}

/// Copy packed BGR24 into an RGBA8 surface buffer.
pub fn bgr_to_rgba(bgr: &[u8], rgba: &mut [u8]) {
    for (src, dst) in bgr.chunks_exact(3).zip(rgba.chunks_exact_mut(4)) {
        dst[0] = src[2];
        dst[1] = src[1];
        dst[2] = src[0];
        dst[3] = 0xFF;
    }
}

fn render(pixels: &Pixels<'_>) -> Result<(), DisplayError> {
    pixels
        .render()
        .map_err(|e| DisplayError::Render(e.to_string()))
}

/// Native preview window.
pub struct Window {
    event_loop: EventLoop<()>,
    state: WindowState,
}

struct WindowState {
    title: String,
    initial_size: LogicalSize<f64>,
    window: Option<Arc<winit::window::Window>>,
    pixels: Option<Pixels<'static>>,
    buffer_size: (u32, u32),
    keys: VecDeque<u32>,
    error: Option<DisplayError>,
}

impl Window {
    /// Create a window titled `title`, sized for `width`x`height` frames times `scale`.
    pub fn open(title: &str, width: u32, height: u32, scale: u32) -> Result<Self, DisplayError> {
        let event_loop =
            EventLoop::new().map_err(|e| DisplayError::EventLoop(e.to_string()))?;
        let mut window = Self {
            event_loop,
            state: WindowState {
                title: title.to_string(),
                initial_size: LogicalSize::new(
                    f64::from(width * scale),
                    f64::from(height * scale),
                ),
                window: None,
                pixels: None,
                buffer_size: (width, height),
                keys: VecDeque::new(),
                error: None,
            },
        };

        for _ in 0..STARTUP_PUMPS {
            window.pump(Duration::ZERO)?;
            if window.state.window.is_some() {
                break;
            }
        }

        let Some(handle) = window.state.window.clone() else {
            return Err(DisplayError::NoWindow);
        };
        let size = handle.inner_size();
        let surface = SurfaceTexture::new(size.width.max(1), size.height.max(1), handle);
        let pixels = Pixels::new(width, height, surface)
            .map_err(|e| DisplayError::Render(format!("failed to create surface: {e}")))?;
        window.state.pixels = Some(pixels);

        tracing::info!(title, width, height, "display window opened");
        Ok(window)
    }

    fn pump(&mut self, timeout: Duration) -> Result<(), DisplayError> {
        let status = self
            .event_loop
            .pump_app_events(Some(timeout), &mut self.state);
        if let PumpStatus::Exit(code) = status {
            tracing::debug!(code, "event loop exited");
            self.state.keys.push_back(KEY_ESCAPE);
        }
        match self.state.error.take() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl WindowState {
    fn render(&self) -> Result<(), DisplayError> {
        match &self.pixels {
            Some(pixels) => render(pixels),
            None => Ok(()),
        }
    }
}

impl ApplicationHandler for WindowState {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        let attrs = winit::window::Window::default_attributes()
            .with_title(self.title.clone())
            .with_inner_size(self.initial_size);
        match event_loop.create_window(attrs) {
            Ok(window) => self.window = Some(Arc::new(window)),
            Err(e) => self.error = Some(DisplayError::Window(e.to_string())),
        }
    }

    fn window_event(&mut self, _event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => self.keys.push_back(KEY_ESCAPE),
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        state: ElementState::Pressed,
                        logical_key,
                        ..
                    },
                ..
            } => {
                if let Some(code) = key_code(&logical_key) {
                    self.keys.push_back(code);
                }
            }
            WindowEvent::Resized(size) if size.width > 0 && size.height > 0 => {
                if let Some(pixels) = self.pixels.as_mut() {
                    if let Err(e) = pixels.resize_surface(size.width, size.height) {
                        self.error = Some(DisplayError::Texture(e.to_string()));
                    }
                }
            }
            WindowEvent::RedrawRequested => {
                if let Err(e) = self.render() {
                    self.error = Some(e);
                }
            }
            _ => {}
        }
    }
}

impl DisplaySurface for Window {
    fn show(&mut self, frame: &Frame) -> Result<(), DisplayError> {
        let state = &mut self.state;
        let pixels = state.pixels.as_mut().ok_or(DisplayError::NoWindow)?;

        if state.buffer_size != (frame.width, frame.height) {
            pixels
                .resize_buffer(frame.width, frame.height)
                .map_err(|e| DisplayError::Texture(e.to_string()))?;
            state.buffer_size = (frame.width, frame.height);
        }

        bgr_to_rgba(&frame.data, pixels.frame_mut());
        render(pixels)
    }

    fn wait_key(&mut self, delay: Duration) -> Result<Option<u32>, DisplayError> {
        if self.state.window.is_some() {
            self.pump(delay)?;
        }
        Ok(self.state.keys.pop_front())
    }

    fn close(&mut self) {
        // The surface borrows the window, so it goes first.
        self.state.pixels = None;
        if self.state.window.take().is_some() {
            let _ = self.pump(Duration::ZERO);
            tracing::debug!("display window closed");
        }
    }
}

impl Drop for Window {
    fn drop(&mut self) {
        self.close();
    }
}
