use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;
use std::time::Instant;

use winit::dpi::PhysicalPosition;
use winit::event::{ElementState, MouseButton, WindowEvent};
use winit::keyboard::Key;
use winit::window::Window;

use crate::frame::{FrameScheduler, FrameTicket};
use crate::gpu::{WgpuBackend, WindowCanvas};
use crate::surface::{Status, SurfaceManager};
use crate::visibility::{Rect, ViewportObserver, VisibilityGate};

/// Surface manager specialised for native windows.
pub type WindowSurfaceManager = SurfaceManager<WgpuBackend, WindowCanvas, WindowFrameScheduler>;

/// Cursor tracking for one window, in window physical pixels.
#[derive(Debug, Default, Clone)]
pub(crate) struct PointerState {
    position: Option<PhysicalPosition<f64>>,
    pressed_anchor: Option<PhysicalPosition<f64>>,
    is_pressed: bool,
}

impl PointerState {
    pub fn position(&self) -> Option<PhysicalPosition<f64>> {
        self.position
    }

    pub fn is_pressed(&self) -> bool {
        self.is_pressed
    }

    pub fn handle_cursor_moved(&mut self, position: PhysicalPosition<f64>) {
        self.position = Some(position);
        if self.is_pressed {
            self.pressed_anchor.get_or_insert(position);
        }
    }

    pub fn handle_left(&mut self) {
        self.position = None;
        self.pressed_anchor = None;
        self.is_pressed = false;
    }

    /// Returns `true` when this event completes a click inside the window.
    pub fn handle_button(&mut self, state: ElementState) -> bool {
        match state {
            ElementState::Pressed => {
                self.is_pressed = true;
                self.pressed_anchor = self.position;
                false
            }
            ElementState::Released => {
                let clicked = self.is_pressed && self.pressed_anchor.is_some();
                self.is_pressed = false;
                self.pressed_anchor = None;
                clicked && self.position.is_some()
            }
        }
    }
}

/// Frame scheduler backed by `Window::request_redraw`.
///
/// The queued ticket is handed back to the manager when the window's next
/// `RedrawRequested` arrives.
#[derive(Debug)]
pub struct WindowFrameScheduler {
    window: Arc<Window>,
    queued: Option<FrameTicket>,
}

impl WindowFrameScheduler {
    pub fn new(window: Arc<Window>) -> Self {
        Self {
            window,
            queued: None,
        }
    }

    pub fn queued(&self) -> Option<FrameTicket> {
        self.queued
    }

    pub fn take_queued(&mut self) -> Option<FrameTicket> {
        self.queued.take()
    }
}

impl FrameScheduler for WindowFrameScheduler {
    fn request_frame(&mut self, ticket: FrameTicket) {
        self.queued = Some(ticket);
        self.window.request_redraw();
    }

    fn cancel_frame(&mut self, ticket: FrameTicket) {
        if self.queued == Some(ticket) {
            self.queued = None;
        }
    }
}

/// What a window event means to the page hosting the canvas.
#[derive(Debug, Clone, PartialEq)]
pub enum CanvasInput {
    Clicked,
    Key(Key),
    CloseRequested,
}

/// A window whose canvas is driven by a [`WindowSurfaceManager`].
///
/// Translates winit window events into manager inputs: resize, hover from
/// cursor enter/leave, visibility from the window's screen rectangle and
/// occlusion, and frame delivery from redraw requests.
pub struct CanvasWindow {
    manager: WindowSurfaceManager,
    gate: VisibilityGate,
}

impl CanvasWindow {
    pub fn new(
        manager: WindowSurfaceManager,
        observer: &Rc<RefCell<ViewportObserver>>,
        now: Instant,
    ) -> Self {
        let bounds = window_rect(manager.canvas().window());
        let gate = VisibilityGate::attach(observer, bounds);
        let mut canvas_window = Self { manager, gate };
        let visible = canvas_window.gate.is_visible();
        canvas_window.manager.set_visible(visible, now);
        canvas_window
    }

    pub fn window(&self) -> &Arc<Window> {
        self.manager.canvas().window()
    }

    pub fn manager(&self) -> &WindowSurfaceManager {
        &self.manager
    }

    pub fn manager_mut(&mut self) -> &mut WindowSurfaceManager {
        &mut self.manager
    }

    pub fn status(&self) -> Status {
        self.manager.status()
    }

    pub fn mount(&mut self, now: Instant) {
        self.manager.mount(now);
    }

    pub fn poll(&mut self, now: Instant) {
        self.manager.poll(now);
    }

    /// Applies a visibility recomputation reported by the shared observer.
    pub fn apply_visibility(&mut self, visible: bool, now: Instant) {
        self.manager.set_visible(visible, now);
    }

    pub fn gate(&self) -> &VisibilityGate {
        &self.gate
    }

    pub fn refresh_bounds(&mut self, now: Instant) {
        let bounds = window_rect(self.manager.canvas().window());
        if let Some(visible) = self.gate.update_bounds(bounds) {
            self.manager.set_visible(visible, now);
        }
    }

    pub fn handle_event(&mut self, event: &WindowEvent, now: Instant) -> Option<CanvasInput> {
        match event {
            WindowEvent::Resized(_) | WindowEvent::ScaleFactorChanged { .. } => {
                self.refresh_bounds(now);
                self.manager.handle_resize(now);
                None
            }
            WindowEvent::Moved(_) => {
                self.refresh_bounds(now);
                None
            }
            WindowEvent::Occluded(occluded) => {
                if let Some(visible) = self.gate.set_occluded(*occluded) {
                    self.manager.set_visible(visible, now);
                }
                None
            }
            WindowEvent::CursorEntered { .. } => {
                self.manager.set_hovered(true, now);
                None
            }
            WindowEvent::CursorLeft { .. } => {
                self.manager.canvas().handle_cursor_left();
                self.manager.set_hovered(false, now);
                None
            }
            WindowEvent::CursorMoved { position, .. } => {
                self.manager.canvas().handle_cursor_moved(*position);
                None
            }
            WindowEvent::MouseInput {
                state,
                button: MouseButton::Left,
                ..
            } => self
                .manager
                .canvas()
                .handle_mouse_button(*state)
                .then_some(CanvasInput::Clicked),
            WindowEvent::DroppedFile(path) => {
                self.manager.canvas().handle_dropped_file(path.clone());
                None
            }
            WindowEvent::KeyboardInput { event, .. }
                if event.state == ElementState::Pressed && !event.repeat =>
            {
                Some(CanvasInput::Key(event.logical_key.clone()))
            }
            WindowEvent::CloseRequested => Some(CanvasInput::CloseRequested),
            WindowEvent::RedrawRequested => {
                if let Some(ticket) = self.manager.scheduler_mut().take_queued() {
                    self.manager.on_frame(ticket, now);
                }
                None
            }
            _ => None,
        }
    }
}

/// Screen rectangle of a window's client area in physical pixels.
///
/// Platforms that do not report window positions (Wayland) place the window
/// at the origin.
pub fn window_rect(window: &Window) -> Rect {
    let size = window.inner_size();
    let origin = window
        .inner_position()
        .unwrap_or(PhysicalPosition::new(0, 0));
    Rect::new(
        f64::from(origin.x),
        f64::from(origin.y),
        f64::from(size.width),
        f64::from(size.height),
    )
}
