//! A backend without a native window.
//!
//! Draws into a command list and keeps presentation state in memory. Useful for tests and for
//! driving a view tree offscreen.

use crate::backend::{Backend, BackendError, Canvas, StandardCursor, WindowDescription};
use crate::color::Color;
use crate::controller::{ControllerId, SharedController};
use crate::rect::Rect;
use cgmath::{EuclideanSpace, Point2};
use log::debug;

/// A recorded canvas operation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DrawCommand {
    FillRect(Rect, Color),
    StrokeRect(Rect, f64, Color),
    PushClip(Rect),
    PopClip,
}

/// A canvas that records what is drawn.
///
/// Fills entirely outside the current clip region are dropped.
#[derive(Debug, Default)]
pub struct RecordingCanvas {
    commands: Vec<DrawCommand>,
    clip_stack: Vec<Option<Rect>>,
}

impl RecordingCanvas {
    pub fn new() -> RecordingCanvas {
        RecordingCanvas::default()
    }

    pub fn commands(&self) -> &[DrawCommand] {
        &self.commands
    }

    /// Returns all commands recorded so far and starts over.
    pub fn take_commands(&mut self) -> Vec<DrawCommand> {
        self.clip_stack.clear();
        std::mem::replace(&mut self.commands, Vec::new())
    }

    /// The current clip region; `Some(None)` if everything is clipped.
    fn clip(&self) -> Option<Option<Rect>> {
        self.clip_stack.last().copied()
    }

    fn is_visible(&self, rect: Rect) -> bool {
        match self.clip() {
            None => true,
            Some(None) => false,
            Some(Some(clip)) => clip.intersects(rect),
        }
    }
}

impl Canvas for RecordingCanvas {
    fn fill_rect(&mut self, rect: Rect, color: Color) {
        if self.is_visible(rect) {
            self.commands.push(DrawCommand::FillRect(rect, color));
        }
    }

    fn stroke_rect(&mut self, rect: Rect, width: f64, color: Color) {
        if self.is_visible(rect) {
            self.commands.push(DrawCommand::StrokeRect(rect, width, color));
        }
    }

    fn push_clip(&mut self, rect: Rect) {
        let clip = match self.clip() {
            None => Some(rect),
            Some(None) => None,
            Some(Some(clip)) => clip.intersect(rect),
        };
        self.clip_stack.push(clip);
        self.commands.push(DrawCommand::PushClip(rect));
    }

    fn pop_clip(&mut self) {
        self.clip_stack.pop();
        self.commands.push(DrawCommand::PopClip);
    }
}

/// The in-memory stand-in for a native window.
#[derive(Debug, Clone, PartialEq)]
pub struct HeadlessWindow {
    pub title: String,

    /// Client area in screen coordinates.
    pub viewport: Rect,

    pub visible: bool,
}

/// Backend calls concerning popups and modals, in the order they happened.
#[derive(Debug, Clone, PartialEq)]
pub enum PresentationEvent {
    PresentPopup(Point2<f64>, ControllerId),
    DismissPopup,
    PresentModal(String, ControllerId),
    DismissModal,
}

#[derive(Debug)]
pub struct HeadlessBackend {
    window: HeadlessWindow,
    canvas: RecordingCanvas,
    cursor: StandardCursor,
    needs_render: bool,
    repaint_requests: Vec<Rect>,
    flips: usize,
    last_frame: Vec<DrawCommand>,
    popup: Option<SharedController>,
    modal: Option<SharedController>,
    presentation_events: Vec<PresentationEvent>,
}

impl HeadlessBackend {
    /// Creates a backend for a window matching the description.
    pub fn new(description: &WindowDescription) -> Result<HeadlessBackend, BackendError> {
        description.validate()?;
        debug!(
            "creating headless window {:?} of size {:?}",
            description.title, description.size
        );

        Ok(HeadlessBackend {
            window: HeadlessWindow {
                title: description.title.clone(),
                viewport: Rect::new(description.position, description.size),
                visible: description.visible,
            },
            canvas: RecordingCanvas::new(),
            cursor: StandardCursor::Arrow,
            needs_render: false,
            repaint_requests: Vec::new(),
            flips: 0,
            last_frame: Vec::new(),
            popup: None,
            modal: None,
            presentation_events: Vec::new(),
        })
    }

    /// Returns whether a render was requested and resets the flag.
    pub fn take_needs_render(&mut self) -> bool {
        std::mem::replace(&mut self.needs_render, false)
    }

    pub fn needs_render(&self) -> bool {
        self.needs_render
    }

    pub fn repaint_requests(&self) -> &[Rect] {
        &self.repaint_requests
    }

    pub fn cursor(&self) -> StandardCursor {
        self.cursor
    }

    /// Number of presented frames.
    pub fn flips(&self) -> usize {
        self.flips
    }

    /// Everything drawn in the most recently presented frame.
    pub fn last_frame(&self) -> &[DrawCommand] {
        &self.last_frame
    }

    pub fn popup(&self) -> Option<&SharedController> {
        self.popup.as_ref()
    }

    pub fn modal(&self) -> Option<&SharedController> {
        self.modal.as_ref()
    }

    pub fn presentation_events(&self) -> &[PresentationEvent] {
        &self.presentation_events
    }

    /// Moves or resizes the client area.
    pub fn set_viewport(&mut self, viewport: Rect) {
        self.window.viewport = viewport;
        self.needs_render = true;
    }
}

impl Backend for HeadlessBackend {
    type Window = HeadlessWindow;
    type Canvas = RecordingCanvas;

    fn display_window(&self) -> &HeadlessWindow {
        &self.window
    }

    fn canvas(&mut self) -> &mut RecordingCanvas {
        &mut self.canvas
    }

    fn geometry(&self) -> Rect {
        self.window.viewport
    }

    fn viewport(&self) -> Rect {
        self.window.viewport
    }

    fn make_current(&self) {}

    fn flip(&mut self, _interval: i32) {
        self.flips += 1;
        self.needs_render = false;
        self.last_frame = self.canvas.take_commands();
    }

    fn update(&mut self, _rect: Rect) {
        self.flips += 1;
        self.last_frame = self.canvas.take_commands();
    }

    fn request_repaint(&mut self, rect: Rect) {
        self.repaint_requests.push(rect);
    }

    fn set_needs_render(&mut self) {
        self.needs_render = true;
    }

    fn set_cursor(&mut self, cursor: StandardCursor) {
        self.cursor = cursor;
    }

    fn client_to_screen_pos(&self, pos: Point2<f64>) -> Point2<f64> {
        pos + self.window.viewport.origin.to_vec()
    }

    fn screen_to_client_pos(&self, pos: Point2<f64>) -> Point2<f64> {
        pos - self.window.viewport.origin.to_vec()
    }

    fn present_popup(&mut self, pos: Point2<f64>, controller: &SharedController) {
        let id = controller.lock().id();
        self.presentation_events
            .push(PresentationEvent::PresentPopup(pos, id));
        self.popup = Some(SharedController::clone(controller));
    }

    fn dismiss_popup(&mut self) {
        self.presentation_events.push(PresentationEvent::DismissPopup);
        self.popup = None;
    }

    fn present_modal(&mut self, title: &str, controller: &SharedController) {
        let id = controller.lock().id();
        self.presentation_events
            .push(PresentationEvent::PresentModal(title.to_string(), id));
        self.modal = Some(SharedController::clone(controller));
    }

    fn dismiss_modal(&mut self) {
        self.presentation_events.push(PresentationEvent::DismissModal);
        self.modal = None;
    }
}
