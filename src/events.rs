//! Events.

use crate::controller::{PresentationKind, Presenter, SharedController};
use crate::rect::Rect;
use crate::view::ViewId;
use crate::view_tree::Request;
use cgmath::{Point2, Vector2};
use crossbeam::channel::Sender;
use log::warn;

/// Window activation changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActivationChange {
    /// The window became the active window.
    Activated,
    /// The window is no longer the active window.
    Deactivated,
}

/// Types of pointing devices or mechanisms.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerDevice {
    /// Touch input from a finger or something of the sort; is expected to be imprecise.
    Touch = 0,

    /// Pen input.
    Pen = 1,

    /// Any indirect input mechanism, such as a mouse or a trackpad.
    Cursor = 2,
}

impl PointerDevice {
    /// If true, the input mechanism is precise and can hit small targets.
    pub fn is_precise(&self) -> bool {
        match self {
            PointerDevice::Touch => false,
            PointerDevice::Pen | PointerDevice::Cursor => true,
        }
    }
}

/// Pointer buttons.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerButton {
    /// No button; e.g. for hover movement.
    None,
    Primary,
    Secondary,
    Middle,
}

/// The phase of a pointer event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerPhase {
    Down,
    Move,
    Up,
}

/// A pointer event.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerEvent {
    pub phase: PointerPhase,

    /// Event location in the window (client) coordinate system.
    pub location: Point2<f64>,

    pub button: PointerButton,

    /// The device type that emitted this pointer event.
    pub device: PointerDevice,

    pub modifiers: KeyModifiers,
}

impl PointerEvent {
    /// Creates a primary-button cursor event.
    pub fn new(phase: PointerPhase, location: Point2<f64>) -> PointerEvent {
        PointerEvent {
            phase,
            location,
            button: match phase {
                PointerPhase::Move => PointerButton::None,
                _ => PointerButton::Primary,
            },
            device: PointerDevice::Cursor,
            modifiers: KeyModifiers::default(),
        }
    }
}

/// Modifier key state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct KeyModifiers {
    /// Whether any shift key is pressed.
    pub shift: bool,

    /// Whether any control key is pressed.
    pub control: bool,

    /// Whether any option key or alt key is pressed.
    pub option: bool,

    /// Whether any command key or meta key is pressed.
    pub command: bool,
}

/// Keyboard layout-independent identifiers for the keys the view tree cares about.
///
/// Text input arrives as `Char`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyCode {
    Char(char),
    Return,
    Tab,
    Space,
    Delete,
    ForwardDelete,
    Escape,
    LeftArrow,
    RightArrow,
    UpArrow,
    DownArrow,
    Home,
    End,
    PageUp,
    PageDown,
    Function(u8),
}

/// A key event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEvent {
    pub code: KeyCode,
    pub modifiers: KeyModifiers,

    /// True for key presses (and repeats), false for releases.
    pub pressed: bool,

    pub repeat: bool,
}

impl KeyEvent {
    pub fn pressed(code: KeyCode) -> KeyEvent {
        KeyEvent {
            code,
            modifiers: KeyModifiers::default(),
            pressed: true,
            repeat: false,
        }
    }

    pub fn released(code: KeyCode) -> KeyEvent {
        KeyEvent {
            pressed: false,
            ..KeyEvent::pressed(code)
        }
    }

    pub fn with_modifiers(self, modifiers: KeyModifiers) -> KeyEvent {
        KeyEvent { modifiers, ..self }
    }
}

/// Handed to view callbacks.
///
/// Views never modify the view tree while an event is being dispatched; everything done through
/// the context is queued and carried out by the tree once the dispatch has unwound.
#[derive(Debug)]
pub struct EventContext {
    view: ViewId,
    geometry: Rect,
    requests: Sender<Request>,
    presenter: Option<Presenter>,
}

impl EventContext {
    pub(crate) fn new(requests: Sender<Request>, presenter: Option<Presenter>) -> EventContext {
        EventContext {
            view: ViewId::nil(),
            geometry: Rect::zero(),
            requests,
            presenter,
        }
    }

    pub(crate) fn set_view(&mut self, view: ViewId, geometry: Rect) {
        self.view = view;
        self.geometry = geometry;
    }

    /// The view receiving the callback.
    pub fn view(&self) -> ViewId {
        self.view
    }

    /// The view’s margin box in window coordinates.
    pub fn geometry(&self) -> Rect {
        self.geometry
    }

    /// Converts a point in window coordinates to the view’s coordinate system.
    pub fn local_point(&self, point: Point2<f64>) -> Point2<f64> {
        let Vector2 { x, y } = point - self.geometry.origin;
        Point2::new(x, y)
    }

    fn send(&self, request: Request) {
        if self.requests.send(request).is_err() {
            warn!("view tree is gone; dropping request from {:?}", self.view);
        }
    }

    /// Requests keyboard focus for the view.
    pub fn request_focus(&self) {
        self.send(Request::Focus(self.view));
    }

    /// Gives up keyboard focus, if the view has it.
    pub fn release_focus(&self) {
        self.send(Request::ReleaseFocus(self.view));
    }

    pub fn focus_next(&self) {
        self.send(Request::FocusStep { forward: true });
    }

    pub fn focus_previous(&self) {
        self.send(Request::FocusStep { forward: false });
    }

    /// Asks for the tree to be rendered again.
    pub fn set_needs_render(&self) {
        self.send(Request::Invalidate);
    }

    /// Presents a controller as a popup at the given window coordinates.
    pub fn present_popup(&self, pos: Point2<f64>, controller: SharedController) {
        self.send(Request::PresentPopup(pos, controller));
    }

    /// Presents a controller as a modal.
    pub fn present_modal(&self, title: &str, controller: SharedController) {
        self.send(Request::PresentModal(title.to_string(), controller));
    }

    /// Dismisses whatever popup this tree is presenting.
    pub fn dismiss_popup(&self) {
        self.send(Request::Dismiss(PresentationKind::Popup, None));
    }

    /// Dismisses whatever modal this tree is presenting.
    pub fn dismiss_modal(&self) {
        self.send(Request::Dismiss(PresentationKind::Modal, None));
    }

    /// Ends the presentation of the controller this view belongs to, if it is being presented as
    /// a popup or modal.
    pub fn dismiss(&self) {
        match &self.presenter {
            Some(presenter) => presenter.dismiss(),
            None => warn!("dismiss called from {:?}, which is not presented", self.view),
        }
    }
}
