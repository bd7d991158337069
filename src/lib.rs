//! View tree core.
//!
//! # Conceptual overview
//! Twig manages the views of a native window: which views exist, which one has keyboard focus,
//! in which order they are drawn, and which controllers are shown as popups or modals. Everything
//! platform-specific is left to a [`Backend`].
//!
//! ## Views
//! A [`View`] is a rectangle with a style, some flags, a behavior and an ordered list of subviews.
//! The behavior ([`ViewBehavior`]) decides how the view draws itself and how it reacts to input.
//! A view that isn’t part of a graph is an owned value that can be built up and moved around
//! freely; once added to a [`ViewGraph`] it is referred to by its [`ViewId`].
//!
//! ## View controllers
//! A [`ViewController`] owns a root view and everything below it. Controllers are shared
//! ([`SharedController`]) because a tree holds on to its root controller, and a tree presenting a
//! controller as a popup or modal holds on to that one too. A controller is the root of at most
//! one tree at a time.
//!
//! ## View trees
//! A [`ViewTree`] sits between one window’s backend and its root controller. It renders views in
//! document order (superviews before subviews, earlier siblings before later ones), dispatches
//! activation changes, pointer events and key events, and keeps track of the focus view.
//!
//! Views never call into the tree while it is dispatching to them. Instead, they ask for things
//! through an [`EventContext`]; the tree carries out those requests once the current dispatch
//! has completed. A controller let go of during a dispatch (e.g. a popup dismissing itself from
//! one of its own event handlers) therefore stays alive until the dispatch has unwound.
//!
//! Events bubble: pointer events start at the topmost view under the pointer and key events start
//! at the focus view, then go up through the superviews until one of them handles the event.
//!
//! ## Coordinate System
//! The origin is at the top left corner of the window’s client area and positive y points down.
//! View geometry is always in window coordinates; backends map to and from screen coordinates.

pub mod backend;
pub mod color;
mod controller;
pub mod events;
pub mod headless;
mod rect;
#[macro_use]
mod view;
mod view_graph;
mod view_tree;

pub use backend::{Backend, BackendError, Canvas, StandardCursor, WindowDescription};
pub use color::Color;
pub use controller::{ControllerId, PresentationKind, SharedController, ViewController};
pub use events::{
    ActivationChange, EventContext, KeyCode, KeyEvent, KeyModifiers, PointerButton, PointerDevice,
    PointerEvent, PointerPhase,
};
pub use rect::Rect;
pub use view::{
    draw_style, Axis, Layout, RenderInfo, StackLayout, Style, View, ViewBehavior, ViewFlags, ViewId,
};
pub use view_graph::ViewGraph;
pub use view_tree::ViewTree;
