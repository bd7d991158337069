use crate::backend::{Canvas, StandardCursor};
use crate::color::Color;
use crate::events::{ActivationChange, EventContext, KeyEvent, PointerEvent};
use crate::rect::Rect;
use bitflags::bitflags;
use cgmath::{Point2, Vector2};
use core::any::Any;
use core::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// A unique identifier for a view.
///
/// (this is just a UUID)
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ViewId(u32, u16, u16, [u8; 8]);

impl ViewId {
    pub(crate) fn new() -> ViewId {
        let uuid = Uuid::new_v4();
        let (a, b, c, d) = uuid.as_fields();
        ViewId(a, b, c, *d)
    }

    pub(crate) fn nil() -> ViewId {
        ViewId(0, 0, 0, [0; 8])
    }
}

/// Implements the `ViewBehavior` trait for a given type.
///
/// Syntax:
///
/// ```text
/// impl_behavior! {
///     TypeName;
///     (put overridden callbacks like render() here, using normal rust syntax)
/// }
/// ```
#[macro_export]
macro_rules! impl_behavior {
    (
        $(#[$attr:meta])*
        $struct:ty;
        $($extra:tt)*
    ) => {
        $(#[$attr])*
        impl $crate::ViewBehavior for $struct {
            fn as_any(&self) -> &dyn ::core::any::Any {
                self
            }

            fn as_any_mut(&mut self) -> &mut dyn ::core::any::Any {
                self
            }

            $($extra)*
        }
    };
}

/// What a view does: how it draws itself and how it reacts to input.
///
/// Subviews are drawn by the view tree after `render` returns. Callbacks that handle events
/// return true if they consumed the event; otherwise it bubbles up to the superview.
///
/// This trait should probably be implemented using the [`impl_behavior`] macro.
pub trait ViewBehavior: Any + fmt::Debug + Send {
    /// For downcasting.
    fn as_any(&self) -> &dyn Any;

    /// For downcasting.
    fn as_any_mut(&mut self) -> &mut dyn Any;

    /// Draws the view’s own content.
    ///
    /// Must not block; anything slow needs to happen elsewhere.
    fn render(&self, canvas: &mut dyn Canvas, info: &RenderInfo) {
        draw_style(canvas, info);
    }

    fn pointer_event(&mut self, event: &PointerEvent, ctx: &mut EventContext) -> bool {
        let _ = (event, ctx);
        false
    }

    fn key_event(&mut self, event: &KeyEvent, ctx: &mut EventContext) -> bool {
        let _ = (event, ctx);
        false
    }

    fn focus_gained(&mut self, ctx: &mut EventContext) {
        let _ = ctx;
    }

    fn focus_lost(&mut self, ctx: &mut EventContext) {
        let _ = ctx;
    }

    fn activation_changed(&mut self, change: ActivationChange, ctx: &mut EventContext) {
        let _ = (change, ctx);
    }
}

impl_behavior! {
    /// A plain view that only draws its style.
    ();
}

/// Passed to [`ViewBehavior::render`].
#[derive(Debug)]
pub struct RenderInfo<'a> {
    pub id: ViewId,

    /// The view’s margin box in window coordinates.
    pub geometry: Rect,

    pub style: &'a Style,

    /// True if the view has keyboard focus.
    pub focused: bool,
}

/// Draws background and border as described by the style.
pub fn draw_style(canvas: &mut dyn Canvas, info: &RenderInfo) {
    if info.geometry.is_empty() {
        return;
    }
    let style = info.style;
    let background = style.background.with_opacity(style.opacity);
    if !background.is_transparent() {
        canvas.fill_rect(info.geometry, background);
    }
    if let Some((width, color)) = style.border {
        let color = color.with_opacity(style.opacity);
        if width > 0. && !color.is_transparent() {
            canvas.stroke_rect(info.geometry, width, color);
        }
    }
}

bitflags! {
    /// Input capabilities of a view.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ViewFlags: u8 {
        /// The view may receive keyboard focus (by pointer press or tab traversal).
        const FOCUSABLE = 0x01;
        /// The view is a hit-test target for pointer events.
        const POINTER = 0x02;
    }
}

impl Default for ViewFlags {
    fn default() -> ViewFlags {
        ViewFlags::POINTER
    }
}

/// Visual and layout properties of a view.
#[derive(Debug, Clone)]
pub struct Style {
    /// Background color with which the margin box will be filled.
    pub background: Color,

    /// Border (width, color).
    pub border: Option<(f64, Color)>,

    /// Whether subviews will be clipped to the view’s margin box, both when drawing and when
    /// hit-testing.
    pub clip_contents: bool,

    pub opacity: f64,

    /// Cursor shown while the pointer is over this view. Inherited from the superview if None.
    pub cursor: Option<StandardCursor>,

    /// Layout handler for the subviews.
    pub layout: Arc<dyn Layout>,
}

impl Default for Style {
    fn default() -> Self {
        Style {
            background: Color::TRANSPARENT,
            border: None,
            clip_contents: false,
            opacity: 1.,
            cursor: None,
            layout: Arc::new(()),
        }
    }
}

/// A layout delegate.
pub trait Layout: fmt::Debug + Send + Sync {
    /// Performs layout.
    ///
    /// - `bounds`: the view’s own margin box in window coordinates.
    /// - `frames`: the frames the (visible) subviews asked for, in order.
    ///
    /// Returns a margin box in window coordinates for each frame.
    fn layout(&self, bounds: Rect, frames: &[Rect]) -> Vec<Rect>;
}

/// Positioned layout.
///
/// Subview frames are relative to the superview’s origin and kept as they are.
impl Layout for () {
    fn layout(&self, bounds: Rect, frames: &[Rect]) -> Vec<Rect> {
        frames.iter().map(|frame| *frame + bounds.origin).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    Horizontal,
    Vertical,
}

/// Stacks subviews along an axis.
///
/// Each subview keeps its frame’s extent along the axis and is stretched across the other one.
/// Frame origins are ignored.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StackLayout {
    pub axis: Axis,
    pub spacing: f64,
}

impl Layout for StackLayout {
    fn layout(&self, bounds: Rect, frames: &[Rect]) -> Vec<Rect> {
        let mut cursor = 0.;
        let mut result = Vec::with_capacity(frames.len());
        for frame in frames {
            let rect = match self.axis {
                Axis::Horizontal => Rect::new(
                    Point2::new(bounds.origin.x + cursor, bounds.origin.y),
                    Vector2::new(frame.size.x, bounds.size.y),
                ),
                Axis::Vertical => Rect::new(
                    Point2::new(bounds.origin.x, bounds.origin.y + cursor),
                    Vector2::new(bounds.size.x, frame.size.y),
                ),
            };
            cursor += match self.axis {
                Axis::Horizontal => frame.size.x,
                Axis::Vertical => frame.size.y,
            } + self.spacing;
            result.push(rect);
        }
        result
    }
}

/// A view that is not part of any view graph, along with its subviews.
///
/// Owning a `View` means it has no superview; it can only be put into a graph by handing it over
/// (see [`ViewGraph::add_subview`](crate::ViewGraph::add_subview)) and comes back out through
/// [`ViewGraph::detach`](crate::ViewGraph::detach).
#[derive(Debug)]
pub struct View {
    pub(crate) id: ViewId,
    pub(crate) frame: Rect,
    pub(crate) style: Style,
    pub(crate) flags: ViewFlags,
    pub(crate) hidden: bool,
    pub(crate) behavior: Box<dyn ViewBehavior>,
    pub(crate) subviews: Vec<View>,
}

impl View {
    /// Creates a plain view.
    pub fn new() -> View {
        View::with_behavior(())
    }

    pub fn with_behavior<B: ViewBehavior>(behavior: B) -> View {
        View::with_boxed_behavior(Box::new(behavior))
    }

    pub fn with_boxed_behavior(behavior: Box<dyn ViewBehavior>) -> View {
        View {
            id: ViewId::new(),
            frame: Rect::zero(),
            style: Style::default(),
            flags: ViewFlags::default(),
            hidden: false,
            behavior,
            subviews: Vec::new(),
        }
    }

    pub fn id(&self) -> ViewId {
        self.id
    }

    /// Sets the frame; under positioned layout this is relative to the superview.
    pub fn frame(mut self, frame: Rect) -> View {
        self.frame = frame;
        self
    }

    pub fn style(mut self, style: Style) -> View {
        self.style = style;
        self
    }

    pub fn flags(mut self, flags: ViewFlags) -> View {
        self.flags = flags;
        self
    }

    pub fn hidden(mut self, hidden: bool) -> View {
        self.hidden = hidden;
        self
    }

    /// Adds a subview and returns self.
    pub fn subview(mut self, view: View) -> View {
        self.add_subview(view);
        self
    }

    /// Appends a subview and returns its id.
    pub fn add_subview(&mut self, view: View) -> ViewId {
        let id = view.id;
        self.subviews.push(view);
        id
    }

    pub fn subviews(&self) -> &[View] {
        &self.subviews
    }

    pub fn behavior<T: ViewBehavior>(&self) -> Option<&T> {
        self.behavior.as_any().downcast_ref()
    }

    pub fn behavior_mut<T: ViewBehavior>(&mut self) -> Option<&mut T> {
        self.behavior.as_any_mut().downcast_mut()
    }
}

impl Default for View {
    fn default() -> View {
        View::new()
    }
}

#[test]
fn test_stack_layout() {
    let layout = StackLayout {
        axis: Axis::Vertical,
        spacing: 2.,
    };
    let bounds = Rect::from_xywh(10., 20., 100., 100.);
    let frames = [
        Rect::from_xywh(0., 0., 5., 10.),
        Rect::from_xywh(50., 50., 5., 30.),
    ];
    assert_eq!(
        layout.layout(bounds, &frames),
        vec![
            Rect::from_xywh(10., 20., 100., 10.),
            Rect::from_xywh(10., 32., 100., 30.),
        ],
        "subviews should be stacked vertically and stretched horizontally"
    );
}

#[test]
fn test_draw_style() {
    use crate::headless::{DrawCommand, RecordingCanvas};

    let style = Style {
        background: Color::WHITE,
        border: Some((1., Color::BLACK)),
        opacity: 0.5,
        ..Style::default()
    };
    let geometry = Rect::from_xywh(0., 0., 4., 4.);
    let mut canvas = RecordingCanvas::new();
    draw_style(
        &mut canvas,
        &RenderInfo {
            id: ViewId::new(),
            geometry,
            style: &style,
            focused: false,
        },
    );
    assert_eq!(
        canvas.commands(),
        &[
            DrawCommand::FillRect(geometry, Color::rgba(1., 1., 1., 0.5)),
            DrawCommand::StrokeRect(geometry, 1., Color::rgba(0., 0., 0., 0.5)),
        ]
    );
}

#[test]
fn test_draw_style_skips_empty_views() {
    use crate::headless::RecordingCanvas;

    let style = Style {
        background: Color::WHITE,
        ..Style::default()
    };
    let mut canvas = RecordingCanvas::new();
    draw_style(
        &mut canvas,
        &RenderInfo {
            id: ViewId::new(),
            geometry: Rect::from_xywh(5., 5., 0., 10.),
            style: &style,
            focused: false,
        },
    );
    assert!(canvas.commands().is_empty());
}
