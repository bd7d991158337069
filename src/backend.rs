//! Traits for backends.
//!
//! A backend wraps one native window and its rendering context (e.g. a Win32 window with a WGL
//! context) and is what a [`ViewTree`](crate::ViewTree) talks to for everything platform-specific.

use crate::color::Color;
use crate::controller::SharedController;
use crate::rect::Rect;
use cgmath::{Point2, Vector2};
use thiserror::Error;

/// A drawing surface for the current frame.
pub trait Canvas {
    fn fill_rect(&mut self, rect: Rect, color: Color);

    /// Strokes the inside of the rectangle with a line of the given width.
    fn stroke_rect(&mut self, rect: Rect, width: f64, color: Color);

    /// Intersects the clip region with the rectangle until the matching `pop_clip`.
    fn push_clip(&mut self, rect: Rect);

    fn pop_clip(&mut self);
}

/// Cursors every backend can show.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StandardCursor {
    Arrow,
    Appstarting,
    Cross,
    Hand,
    IBeam,
    No,
    SizeAll,
    SizeNESW,
    SizeNS,
    SizeNWSE,
    SizeWE,
    UpArrow,
    Wait,
}

impl Default for StandardCursor {
    fn default() -> StandardCursor {
        StandardCursor::Arrow
    }
}

/// A backend implementation.
///
/// All methods are called on the thread that owns the native window.
pub trait Backend {
    /// The native window wrapper.
    type Window;

    /// The canvas type used for rendering.
    type Canvas: Canvas;

    /// Returns the display window.
    fn display_window(&self) -> &Self::Window;

    /// Returns the canvas for the current frame.
    fn canvas(&mut self) -> &mut Self::Canvas;

    /// The window frame in screen coordinates.
    fn geometry(&self) -> Rect;

    /// The client area; the origin is in screen coordinates.
    fn viewport(&self) -> Rect;

    /// Makes the window’s rendering context current.
    fn make_current(&self);

    /// Presents the back buffer. `interval` is the swap interval (0: don’t wait for vsync).
    fn flip(&mut self, interval: i32);

    /// Copies a region of the back buffer to the front buffer.
    fn update(&mut self, rect: Rect);

    /// Asks the window system to send a paint event for the region.
    fn request_repaint(&mut self, rect: Rect);

    /// Signals that the view tree needs to be rendered again.
    ///
    /// Must only schedule a repaint; never render synchronously. May be called many times before
    /// the next paint.
    fn set_needs_render(&mut self) {
        let viewport = self.viewport();
        self.request_repaint(viewport.with_origin(Point2::new(0., 0.)));
    }

    fn set_cursor(&mut self, cursor: StandardCursor);

    /// Maps from client to screen coordinates.
    fn client_to_screen_pos(&self, pos: Point2<f64>) -> Point2<f64>;

    /// Maps from screen to client coordinates.
    fn screen_to_client_pos(&self, pos: Point2<f64>) -> Point2<f64>;

    /// Shows a popup for the controller at the given client coordinates.
    fn present_popup(&mut self, pos: Point2<f64>, controller: &SharedController);

    /// Hides the current popup.
    fn dismiss_popup(&mut self);

    /// Shows a modal window for the controller.
    fn present_modal(&mut self, title: &str, controller: &SharedController);

    /// Hides the current modal.
    fn dismiss_modal(&mut self);
}

/// Errors that may occur when creating a backend.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("invalid window size {width}x{height}")]
    InvalidSize { width: f64, height: f64 },

    #[error("failed to create window: {0}")]
    WindowCreationFailed(String),

    #[error("failed to create rendering context: {0}")]
    ContextCreationFailed(String),

    #[error("failed to make rendering context current: {0}")]
    MakeCurrentFailed(String),
}

/// Describes the window a backend should create.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowDescription {
    pub title: String,

    /// Position of the client area in screen coordinates.
    pub position: Point2<f64>,

    /// Size of the client area.
    pub size: Vector2<f64>,

    pub visible: bool,
    pub resizable: bool,

    /// Popup windows have no decorations and don’t appear in the task bar.
    pub popup: bool,

    /// Swap interval used when presenting frames.
    pub swap_interval: i32,
}

impl Default for WindowDescription {
    fn default() -> WindowDescription {
        WindowDescription {
            title: String::new(),
            position: Point2::new(0., 0.),
            size: Vector2::new(640., 480.),
            visible: true,
            resizable: true,
            popup: false,
            swap_interval: 1,
        }
    }
}

impl WindowDescription {
    pub fn new(title: &str, size: Vector2<f64>) -> WindowDescription {
        WindowDescription {
            title: title.to_string(),
            size,
            ..WindowDescription::default()
        }
    }

    pub fn with_position(mut self, position: Point2<f64>) -> WindowDescription {
        self.position = position;
        self
    }

    pub fn with_visible(mut self, visible: bool) -> WindowDescription {
        self.visible = visible;
        self
    }

    pub fn with_resizable(mut self, resizable: bool) -> WindowDescription {
        self.resizable = resizable;
        self
    }

    pub fn with_popup(mut self, popup: bool) -> WindowDescription {
        self.popup = popup;
        self
    }

    pub fn with_swap_interval(mut self, interval: i32) -> WindowDescription {
        self.swap_interval = interval;
        self
    }

    /// Checks that the description can be turned into a window.
    pub fn validate(&self) -> Result<(), BackendError> {
        let (width, height) = (self.size.x, self.size.y);
        if !(width.is_finite() && height.is_finite()) || width <= 0. || height <= 0. {
            return Err(BackendError::InvalidSize { width, height });
        }
        Ok(())
    }
}
