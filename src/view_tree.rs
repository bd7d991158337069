use crate::backend::{Backend, Canvas, StandardCursor};
use crate::controller::{ControllerId, PresentationKind, Presenter, SharedController};
use crate::events::{ActivationChange, EventContext, KeyCode, KeyEvent, PointerEvent, PointerPhase};
use crate::rect::Rect;
use crate::view::{View, ViewBehavior, ViewId};
use crate::view_graph::ViewGraph;
use cgmath::{EuclideanSpace, Point2};
use crossbeam::channel::{self, Receiver, Sender, TryRecvError};
use log::{debug, trace, warn};
use std::sync::Arc;

/// Things views and controllers ask of a view tree.
///
/// Requests are queued and carried out once the current dispatch has completed.
#[derive(Debug)]
pub(crate) enum Request {
    /// Something changed; lay out and render again.
    Invalidate,
    Focus(ViewId),
    ReleaseFocus(ViewId),
    FocusStep { forward: bool },
    PresentPopup(Point2<f64>, SharedController),
    PresentModal(String, SharedController),
    /// Dismisses the popup or modal; if a controller is given, only if it is the one presented.
    Dismiss(PresentationKind, Option<ControllerId>),
}

/// An active popup or modal.
#[derive(Debug)]
struct Presentation {
    controller: SharedController,
    id: ControllerId,
}

/// Manages a tree of views for one native window.
///
/// The tree owns its root view controller and whatever it currently presents as a popup or modal,
/// keeps track of keyboard focus, and routes rendering and input between the views and the
/// backend.
///
/// Everything happens on the thread that owns the window. Views never call into the tree
/// directly; see [`EventContext`].
pub struct ViewTree<B: Backend> {
    backend: B,
    root: Option<SharedController>,
    popup: Option<Presentation>,
    modal: Option<Presentation>,
    requests: Sender<Request>,
    request_recv: Receiver<Request>,
    /// Controllers let go of during a dispatch; dropped once it completes.
    released: Vec<SharedController>,
    dispatch_depth: usize,
    cursor: Option<StandardCursor>,
}

impl<B: Backend> ViewTree<B> {
    /// Creates an empty view tree on top of a backend.
    pub fn new(backend: B) -> ViewTree<B> {
        let (requests, request_recv) = channel::unbounded();
        ViewTree {
            backend,
            root: None,
            popup: None,
            modal: None,
            requests,
            request_recv,
            released: Vec::new(),
            dispatch_depth: 0,
            cursor: None,
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// Returns the display window used.
    pub fn display_window(&self) -> &B::Window {
        self.backend.display_window()
    }

    /// The view receiving keyboard events, if any.
    pub fn focus_view(&self) -> Option<ViewId> {
        self.root
            .as_ref()
            .and_then(|root| root.lock().views().focus())
    }

    /// The view controller at the root of the tree.
    pub fn view_controller(&self) -> Option<&SharedController> {
        self.root.as_ref()
    }

    /// Runs a closure with the root controller’s view graph.
    pub fn with_views<R>(&self, f: impl FnOnce(&ViewGraph) -> R) -> Option<R> {
        self.root.as_ref().map(|root| f(root.lock().views()))
    }

    /// The controller currently presented as a popup.
    pub fn popup_controller(&self) -> Option<&SharedController> {
        self.popup.as_ref().map(|p| &p.controller)
    }

    /// The controller currently presented as a modal.
    pub fn modal_controller(&self) -> Option<&SharedController> {
        self.modal.as_ref().map(|p| &p.controller)
    }

    /// Sets the root view controller.
    ///
    /// The previous controller loses focus and is let go of before the new one is attached.
    /// Setting the controller that is already installed does nothing.
    ///
    /// # Panics
    /// - if the new controller is installed in another view tree
    pub fn set_view_controller(&mut self, controller: Option<SharedController>) {
        match (&self.root, &controller) {
            (Some(current), Some(new)) if Arc::ptr_eq(current, new) => {
                trace!("set_view_controller: controller is already installed");
                return;
            }
            (None, None) => return,
            _ => (),
        }

        self.begin_dispatch();
        if let Some(old) = self.root.take() {
            {
                let mut old_controller = old.lock();
                debug!("uninstalling view controller {:?}", old_controller.id());
                if let Some(focus) = old_controller.views().focus() {
                    let mut ctx = self.event_context(old_controller.presenter().cloned());
                    let views = old_controller.views_mut();
                    views.set_focus(None);
                    ctx.set_view(focus, views.geometry(focus));
                    views.behavior_dyn_mut(focus).focus_lost(&mut ctx);
                }
                old_controller.uninstall();
            }
            self.released.push(old);
        }

        if let Some(new) = controller {
            {
                let mut new_controller = new.lock();
                debug!("installing view controller {:?}", new_controller.id());
                new_controller.install(self.requests.clone());
            }
            self.root = Some(new);
        }
        self.cursor = None;
        self.backend.set_needs_render();
        self.end_dispatch();
    }

    /// Adds a subview to the root controller’s root view.
    ///
    /// # Panics
    /// - if no view controller is installed
    pub fn add_subview(&mut self, view: View) -> ViewId {
        let root = self
            .root
            .as_ref()
            .expect("add_subview called on a view tree without a view controller");
        let id = root.lock().add_subview(view);
        self.poll();
        id
    }

    /// Creates a view with the behavior and adds it to the root view.
    pub fn add_subview_with<T: ViewBehavior>(&mut self, behavior: T) -> ViewId {
        self.add_subview(View::with_behavior(behavior))
    }

    /// Detaches a view from the root controller’s graph.
    ///
    /// If the focus view is part of the detached subtree, it is notified and focus is cleared.
    ///
    /// # Panics
    /// - if no view controller is installed, or for the root view and unknown views
    pub fn remove_view(&mut self, id: ViewId) -> View {
        let root = Arc::clone(
            self.root
                .as_ref()
                .expect("remove_view called on a view tree without a view controller"),
        );
        let focus = root.lock().views().focus();
        if let Some(focus) = focus {
            if root.lock().views().is_ancestor(id, focus) {
                self.set_focus_view(None);
            }
        }
        let view = root.lock().views_mut().detach(id);
        self.poll();
        view
    }

    /// Sets or clears the focus.
    ///
    /// The previous focus view is notified before the new one. Does nothing if the view already
    /// has focus.
    ///
    /// # Panics
    /// - if the view is not part of this tree
    pub fn set_focus_view(&mut self, view: Option<ViewId>) {
        self.begin_dispatch();
        self.apply_focus(view);
        self.end_dispatch();
    }

    /// Moves focus to the next focusable view in document order.
    pub fn focus_next(&mut self) {
        self.begin_dispatch();
        self.step_focus(true);
        self.end_dispatch();
    }

    /// Moves focus to the previous focusable view in document order.
    pub fn focus_previous(&mut self) {
        self.begin_dispatch();
        self.step_focus(false);
        self.end_dispatch();
    }

    fn apply_focus(&mut self, view: Option<ViewId>) {
        let root = match &self.root {
            Some(root) => Arc::clone(root),
            None => {
                assert!(
                    view.is_none(),
                    "set_focus_view called on a view tree without a view controller"
                );
                return;
            }
        };

        let mut controller = root.lock();
        let previous = controller.views().focus();
        if previous == view {
            return;
        }
        if let Some(id) = view {
            assert!(
                controller.views().contains(id),
                "cannot focus {:?}: not part of this view tree",
                id
            );
        }
        debug!("focus: {:?} -> {:?}", previous, view);

        let mut ctx = self.event_context(controller.presenter().cloned());
        let views = controller.views_mut();
        views.set_focus(view);
        if let Some(previous) = previous {
            ctx.set_view(previous, views.geometry(previous));
            views.behavior_dyn_mut(previous).focus_lost(&mut ctx);
        }
        if let Some(view) = view {
            ctx.set_view(view, views.geometry(view));
            views.behavior_dyn_mut(view).focus_gained(&mut ctx);
        }
        drop(controller);
        self.backend.set_needs_render();
    }

    /// Returns true if focus moved.
    fn step_focus(&mut self, forward: bool) -> bool {
        let (chain, current) = match &self.root {
            Some(root) => {
                let controller = root.lock();
                (controller.views().focus_chain(), controller.views().focus())
            }
            None => return false,
        };
        if chain.is_empty() {
            return false;
        }

        let len = chain.len();
        let index = match chain.iter().position(|id| Some(*id) == current) {
            Some(i) if forward => (i + 1) % len,
            Some(i) => (i + len - 1) % len,
            None if forward => 0,
            None => len - 1,
        };
        if current == Some(chain[index]) {
            return false;
        }
        self.apply_focus(Some(chain[index]));
        true
    }

    /// Renders the root view into the canvas, confined to `margin_box`.
    ///
    /// Views are drawn in document order, so later siblings draw on top of earlier ones.
    pub fn render(&mut self, canvas: &mut dyn Canvas, margin_box: Rect) {
        if let Some(root) = &self.root {
            root.lock().views_mut().render(canvas, margin_box);
        }
    }

    /// Renders into the backend’s canvas, filling the client area, and presents the frame.
    pub fn paint(&mut self, interval: i32) {
        self.backend.make_current();
        let viewport = self.backend.viewport();
        let margin_box = viewport.with_origin(Point2::new(0., 0.));
        if let Some(root) = &self.root {
            let canvas = self.backend.canvas();
            root.lock().views_mut().render(canvas, margin_box);
        }
        self.backend.flip(interval);
    }

    /// Tells every view that the window was activated or deactivated.
    pub fn dispatch_activation_change(&mut self, change: ActivationChange) {
        self.begin_dispatch();
        if let Some(root) = self.root.clone() {
            let mut controller = root.lock();
            let mut ctx = self.event_context(controller.presenter().cloned());
            let views = controller.views_mut();
            for id in views.document_order() {
                ctx.set_view(id, views.geometry(id));
                views.behavior_dyn_mut(id).activation_changed(change, &mut ctx);
            }
        }
        self.end_dispatch();
    }

    /// Dispatches a pointer event to the view under the pointer.
    ///
    /// Pressing on a view focuses it (or its closest focusable superview). The event bubbles up
    /// from the target until a view handles it. Returns true if it was handled.
    pub fn dispatch_pointer(&mut self, event: &PointerEvent) -> bool {
        self.begin_dispatch();
        let handled = self.deliver_pointer(event);
        self.end_dispatch();
        handled
    }

    fn deliver_pointer(&mut self, event: &PointerEvent) -> bool {
        let root = match &self.root {
            Some(root) => Arc::clone(root),
            None => return false,
        };

        let (target, cursor, focus_target) = {
            let controller = root.lock();
            let views = controller.views();
            let target = views.hit_test(event.location);
            let cursor = target.and_then(|id| views.cursor(id)).unwrap_or_default();
            let focus_target = match (target, event.phase) {
                (Some(id), PointerPhase::Down) => views.focusable_ancestor(id),
                _ => None,
            };
            (target, cursor, focus_target)
        };

        if self.cursor != Some(cursor) {
            self.cursor = Some(cursor);
            self.backend.set_cursor(cursor);
        }
        if let Some(focus_target) = focus_target {
            self.apply_focus(Some(focus_target));
        }

        let target = match target {
            Some(target) => target,
            None => return false,
        };
        let mut controller = root.lock();
        let mut ctx = self.event_context(controller.presenter().cloned());
        let views = controller.views_mut();
        let mut current = Some(target);
        while let Some(id) = current {
            if !views.contains(id) {
                break;
            }
            ctx.set_view(id, views.geometry(id));
            if views.behavior_dyn_mut(id).pointer_event(event, &mut ctx) {
                trace!("pointer event handled by {:?}", id);
                return true;
            }
            current = views.superview(id);
        }
        false
    }

    /// Dispatches a key event to the focus view, bubbling up until a view handles it.
    ///
    /// An unhandled Tab press moves focus (backwards with Shift). Returns true if the event was
    /// handled.
    pub fn dispatch_key(&mut self, event: &KeyEvent) -> bool {
        self.begin_dispatch();
        let mut handled = self.deliver_key(event);
        if !handled && event.pressed && event.code == KeyCode::Tab {
            handled = self.step_focus(!event.modifiers.shift);
        }
        self.end_dispatch();
        handled
    }

    fn deliver_key(&mut self, event: &KeyEvent) -> bool {
        let root = match &self.root {
            Some(root) => Arc::clone(root),
            None => return false,
        };
        let mut controller = root.lock();
        let mut ctx = self.event_context(controller.presenter().cloned());
        let views = controller.views_mut();
        let mut current = views.focus();
        while let Some(id) = current {
            ctx.set_view(id, views.geometry(id));
            if views.behavior_dyn_mut(id).key_event(event, &mut ctx) {
                return true;
            }
            current = views.superview(id);
        }
        false
    }

    /// Map from client to screen coordinates.
    pub fn client_to_screen_pos(&self, pos: Point2<f64>) -> Point2<f64> {
        self.backend.client_to_screen_pos(pos)
    }

    /// Map from screen to client coordinates.
    pub fn screen_to_client_pos(&self, pos: Point2<f64>) -> Point2<f64> {
        self.backend.screen_to_client_pos(pos)
    }

    /// Maps a point in a view’s coordinate system to screen coordinates.
    ///
    /// Returns None if the view is not part of the tree.
    pub fn view_to_screen_pos(&self, view: ViewId, pos: Point2<f64>) -> Option<Point2<f64>> {
        let root = self.root.as_ref()?;
        let origin = {
            let controller = root.lock();
            if !controller.views().contains(view) {
                return None;
            }
            controller.views().geometry(view).origin
        };
        Some(self.backend.client_to_screen_pos(pos + origin.to_vec()))
    }

    /// Shows a controller as a popup at the given client coordinates.
    ///
    /// A popup that is already showing is dismissed first.
    ///
    /// # Panics
    /// - if the controller is already presented elsewhere (by this tree or another one)
    pub fn present_popup(&mut self, pos: Point2<f64>, controller: SharedController) {
        self.begin_dispatch();
        self.apply_present(PresentationKind::Popup, controller, |backend, c| {
            backend.present_popup(pos, c)
        });
        self.end_dispatch();
    }

    /// Hides the popup, if one is showing.
    pub fn dismiss_popup(&mut self) {
        self.begin_dispatch();
        self.apply_dismiss(PresentationKind::Popup, None);
        self.end_dispatch();
    }

    /// Shows a controller as a modal.
    ///
    /// A modal that is already showing is dismissed first.
    ///
    /// # Panics
    /// - if the controller is already presented elsewhere (by this tree or another one)
    pub fn present_modal(&mut self, title: &str, controller: SharedController) {
        self.begin_dispatch();
        self.apply_present(PresentationKind::Modal, controller, |backend, c| {
            backend.present_modal(title, c)
        });
        self.end_dispatch();
    }

    /// Hides the modal, if one is showing.
    pub fn dismiss_modal(&mut self) {
        self.begin_dispatch();
        self.apply_dismiss(PresentationKind::Modal, None);
        self.end_dispatch();
    }

    fn presentation_mut(&mut self, kind: PresentationKind) -> &mut Option<Presentation> {
        match kind {
            PresentationKind::Popup => &mut self.popup,
            PresentationKind::Modal => &mut self.modal,
        }
    }

    fn apply_present<F>(&mut self, kind: PresentationKind, controller: SharedController, present: F)
    where
        F: FnOnce(&mut B, &SharedController),
    {
        if self.presentation_mut(kind).is_some() {
            self.apply_dismiss(kind, None);
        }

        let id = {
            let mut c = controller.lock();
            let id = c.id();
            assert!(
                c.presentation().is_none(),
                "{:?} is already presented as a {:?}",
                id,
                c.presentation()
            );
            c.set_presenter(Some(Presenter {
                requests: self.requests.clone(),
                kind,
                controller: id,
            }));
            id
        };
        debug!("presenting {:?} as {:?}", id, kind);
        present(&mut self.backend, &controller);
        *self.presentation_mut(kind) = Some(Presentation { controller, id });
    }

    fn apply_dismiss(&mut self, kind: PresentationKind, expected: Option<ControllerId>) {
        let is_match = match (&*self.presentation_mut(kind), expected) {
            (None, _) => false,
            (Some(_), None) => true,
            (Some(presentation), Some(id)) => presentation.id == id,
        };
        if !is_match {
            trace!("dismiss {:?}: nothing to dismiss", kind);
            return;
        }

        if let Some(presentation) = self.presentation_mut(kind).take() {
            debug!("dismissing {:?} {:?}", kind, presentation.id);
            match kind {
                PresentationKind::Popup => self.backend.dismiss_popup(),
                PresentationKind::Modal => self.backend.dismiss_modal(),
            }
            presentation.controller.lock().set_presenter(None);
            self.released.push(presentation.controller);
        }
    }

    /// Carries out everything views and controllers asked for since the last call, and tells the
    /// backend if a render is needed.
    ///
    /// Backends should call this once per iteration of their event loop.
    pub fn poll(&mut self) {
        self.begin_dispatch();
        self.end_dispatch();
    }

    fn begin_dispatch(&mut self) {
        self.dispatch_depth += 1;
    }

    fn end_dispatch(&mut self) {
        if self.dispatch_depth > 1 {
            self.dispatch_depth -= 1;
            return;
        }

        // still counted as dispatching, so controllers released here are kept alive until the
        // queue is empty
        self.process_requests();
        self.dispatch_depth = 0;
        if !self.released.is_empty() {
            trace!("releasing {} view controller(s)", self.released.len());
            self.released.clear();
        }
    }

    fn process_requests(&mut self) {
        let mut needs_render = false;
        loop {
            let request = match self.request_recv.try_recv() {
                Ok(request) => request,
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            };
            trace!("processing {:?}", request);

            match request {
                Request::Invalidate => needs_render = true,
                Request::Focus(id) => {
                    if self.contains_view(id) {
                        self.apply_focus(Some(id));
                    } else {
                        warn!("dropping focus request for {:?}: not part of this tree", id);
                    }
                }
                Request::ReleaseFocus(id) => {
                    if self.focus_view() == Some(id) {
                        self.apply_focus(None);
                    }
                }
                Request::FocusStep { forward } => {
                    self.step_focus(forward);
                }
                Request::PresentPopup(pos, controller) => {
                    self.apply_present(PresentationKind::Popup, controller, |backend, c| {
                        backend.present_popup(pos, c)
                    })
                }
                Request::PresentModal(title, controller) => {
                    self.apply_present(PresentationKind::Modal, controller, |backend, c| {
                        backend.present_modal(&title, c)
                    })
                }
                Request::Dismiss(kind, expected) => self.apply_dismiss(kind, expected),
            }
        }

        if needs_render {
            self.backend.set_needs_render();
        }
    }

    fn contains_view(&self, id: ViewId) -> bool {
        self.root
            .as_ref()
            .map_or(false, |root| root.lock().views().contains(id))
    }

    fn event_context(&self, presenter: Option<Presenter>) -> EventContext {
        EventContext::new(self.requests.clone(), presenter)
    }
}

impl<B: Backend> Drop for ViewTree<B> {
    fn drop(&mut self) {
        self.apply_dismiss(PresentationKind::Popup, None);
        self.apply_dismiss(PresentationKind::Modal, None);
        if let Some(root) = self.root.take() {
            root.lock().uninstall();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::WindowDescription;
    use crate::color::Color;
    use crate::controller::ViewController;
    use crate::events::KeyModifiers;
    use crate::headless::{DrawCommand, HeadlessBackend, PresentationEvent, RecordingCanvas};
    use crate::view::{RenderInfo, Style, ViewFlags};
    use cgmath::Vector2;
    use parking_lot::Mutex;

    type Log = Arc<Mutex<Vec<String>>>;

    /// Records everything that happens to it.
    #[derive(Debug)]
    struct Recorder {
        name: &'static str,
        log: Log,
        handles_pointer: bool,
        handles_keys: bool,
    }

    impl Recorder {
        fn new(name: &'static str, log: &Log) -> Recorder {
            Recorder {
                name,
                log: Arc::clone(log),
                handles_pointer: false,
                handles_keys: false,
            }
        }

        fn push(&self, what: &str) {
            self.log.lock().push(format!("{} {}", what, self.name));
        }
    }

    impl_behavior! {
        Recorder;
        fn render(&self, _canvas: &mut dyn Canvas, _info: &RenderInfo) {
            self.push("render");
        }
        fn pointer_event(&mut self, event: &PointerEvent, _ctx: &mut EventContext) -> bool {
            self.push(&format!("pointer {:?}", event.phase));
            self.handles_pointer
        }
        fn key_event(&mut self, event: &KeyEvent, _ctx: &mut EventContext) -> bool {
            self.push(&format!("key {:?}", event.code));
            self.handles_keys
        }
        fn focus_gained(&mut self, _ctx: &mut EventContext) {
            self.push("gained");
        }
        fn focus_lost(&mut self, _ctx: &mut EventContext) {
            self.push("lost");
        }
        fn activation_changed(&mut self, change: ActivationChange, _ctx: &mut EventContext) {
            self.push(&format!("{:?}", change));
        }
    }

    /// Dismisses its own controller when pressed.
    #[derive(Debug)]
    struct DismissButton;

    impl_behavior! {
        DismissButton;
        fn pointer_event(&mut self, event: &PointerEvent, ctx: &mut EventContext) -> bool {
            if event.phase == PointerPhase::Down {
                ctx.dismiss();
            }
            true
        }
    }

    /// Opens a popup when pressed.
    #[derive(Debug)]
    struct PopupButton(SharedController);

    impl_behavior! {
        PopupButton;
        fn pointer_event(&mut self, event: &PointerEvent, ctx: &mut EventContext) -> bool {
            ctx.present_popup(event.location, Arc::clone(&self.0));
            true
        }
    }

    fn backend() -> HeadlessBackend {
        HeadlessBackend::new(&WindowDescription::new("test", Vector2::new(100., 100.))).unwrap()
    }

    fn new_log() -> Log {
        Arc::new(Mutex::new(Vec::new()))
    }

    fn take(log: &Log) -> Vec<String> {
        std::mem::replace(&mut *log.lock(), Vec::new())
    }

    fn recorder(name: &'static str, log: &Log) -> View {
        View::with_behavior(Recorder::new(name, log))
    }

    fn focusable(view: View) -> View {
        view.flags(ViewFlags::FOCUSABLE | ViewFlags::POINTER)
    }

    fn tree_with(root: View) -> (ViewTree<HeadlessBackend>, SharedController) {
        let mut tree = ViewTree::new(backend());
        let controller = ViewController::new(root).into_shared();
        tree.set_view_controller(Some(Arc::clone(&controller)));
        (tree, controller)
    }

    fn bounds() -> Rect {
        Rect::from_xywh(0., 0., 100., 100.)
    }

    #[test]
    fn test_render_document_order() {
        let log = new_log();
        let root = recorder("root", &log)
            .subview(
                recorder("A", &log)
                    .subview(recorder("A1", &log))
                    .subview(recorder("A2", &log)),
            )
            .subview(recorder("B", &log));
        let (mut tree, _) = tree_with(root);

        let mut canvas = RecordingCanvas::new();
        tree.render(&mut canvas, bounds());
        assert_eq!(
            take(&log),
            vec!["render root", "render A", "render A1", "render A2", "render B"],
            "every view should be rendered once, parents first"
        );
    }

    #[test]
    fn test_render_skips_hidden_subtree() {
        let log = new_log();
        let root = recorder("root", &log)
            .subview(
                recorder("A", &log)
                    .hidden(true)
                    .subview(recorder("A1", &log)),
            )
            .subview(recorder("B", &log));
        let (mut tree, _) = tree_with(root);

        tree.render(&mut RecordingCanvas::new(), bounds());
        assert_eq!(take(&log), vec!["render root", "render B"]);
    }

    #[test]
    fn test_paint_presents_frame() {
        let log = new_log();
        let (mut tree, _) = tree_with(recorder("root", &log));
        tree.paint(1);
        assert_eq!(take(&log), vec!["render root"]);
        assert_eq!(tree.backend().flips(), 1);
        assert!(!tree.backend().needs_render());
    }

    #[test]
    fn test_paint_keeps_one_frame() {
        let root = View::new().style(Style {
            background: Color::WHITE,
            ..Style::default()
        });
        let (mut tree, _) = tree_with(root);
        tree.paint(1);
        tree.paint(1);

        assert_eq!(tree.backend().flips(), 2);
        assert_eq!(
            tree.backend().last_frame(),
            &[
                DrawCommand::PushClip(bounds()),
                DrawCommand::FillRect(bounds(), Color::WHITE),
                DrawCommand::PopClip,
            ],
            "only the last frame should be kept"
        );
        assert!(tree.backend_mut().canvas().commands().is_empty());
    }

    #[test]
    fn test_render_clips() {
        let filled = |color: Color| Style {
            background: color,
            ..Style::default()
        };
        let clipper = Rect::from_xywh(10., 10., 20., 20.);
        let root = View::new()
            .style(filled(Color::WHITE))
            .subview(
                View::new()
                    .frame(clipper)
                    .style(Style {
                        clip_contents: true,
                        ..filled(Color::BLACK)
                    })
                    .subview(
                        View::new()
                            .frame(Rect::from_xywh(40., 40., 5., 5.))
                            .style(filled(Color::WHITE)),
                    ),
            )
            .subview(
                View::new()
                    .frame(Rect::from_xywh(150., 150., 10., 10.))
                    .style(filled(Color::BLACK)),
            );
        let (mut tree, _) = tree_with(root);

        let mut canvas = RecordingCanvas::new();
        tree.render(&mut canvas, bounds());
        assert_eq!(
            canvas.take_commands(),
            vec![
                DrawCommand::PushClip(bounds()),
                DrawCommand::FillRect(bounds(), Color::WHITE),
                DrawCommand::FillRect(clipper, Color::BLACK),
                DrawCommand::PushClip(clipper),
                DrawCommand::PopClip,
                DrawCommand::PopClip,
            ],
            "views outside the margin box or a clipping superview should not be drawn"
        );
    }

    #[test]
    fn test_replaced_controller_is_not_rendered() {
        let log = new_log();
        let (mut tree, old) = tree_with(recorder("old", &log));
        tree.render(&mut RecordingCanvas::new(), bounds());
        assert_eq!(take(&log), vec!["render old"]);

        let new = ViewController::new(recorder("new", &log)).into_shared();
        tree.set_view_controller(Some(Arc::clone(&new)));
        tree.render(&mut RecordingCanvas::new(), bounds());
        assert_eq!(take(&log), vec!["render new"], "old root must not be rendered anymore");
        assert!(!old.lock().is_installed());
        assert!(new.lock().is_installed());
        assert_eq!(Arc::strong_count(&old), 1, "tree should have let go of the old root");
    }

    #[test]
    fn test_replacing_controller_clears_focus() {
        let log = new_log();
        let (mut tree, old) = tree_with(recorder("old", &log));
        let a = tree.add_subview(focusable(recorder("A", &log)));
        tree.set_focus_view(Some(a));
        take(&log);

        tree.set_view_controller(Some(ViewController::default().into_shared()));
        assert_eq!(take(&log), vec!["lost A"]);
        assert_eq!(tree.focus_view(), None);
        assert_eq!(old.lock().views().focus(), None);
    }

    #[test]
    fn test_set_same_controller_is_noop() {
        let log = new_log();
        let (mut tree, controller) = tree_with(recorder("root", &log));
        let a = tree.add_subview(recorder("A", &log));
        tree.set_focus_view(Some(a));
        take(&log);

        tree.set_view_controller(Some(Arc::clone(&controller)));
        assert_eq!(tree.focus_view(), Some(a), "focus should be kept");
        assert!(take(&log).is_empty());
        assert!(controller.lock().is_installed());
    }

    #[test]
    #[should_panic(expected = "already installed")]
    fn test_controller_in_two_trees() {
        let (_tree, controller) = tree_with(View::new());
        let mut other = ViewTree::new(backend());
        other.set_view_controller(Some(controller));
    }

    #[test]
    #[should_panic(expected = "without a view controller")]
    fn test_add_subview_without_controller() {
        let mut tree = ViewTree::new(backend());
        tree.add_subview(View::new());
    }

    #[test]
    fn test_add_subview_requests_render() {
        let (mut tree, _) = tree_with(View::new());
        tree.backend_mut().take_needs_render();
        let id = tree.add_subview_with(());
        assert!(tree.backend_mut().take_needs_render());
        assert_eq!(tree.with_views(|views| views.superview(id)).flatten(), tree.with_views(|v| v.root()));
    }

    #[test]
    fn test_direct_edits_request_render_on_poll() {
        let (mut tree, controller) = tree_with(View::new());
        tree.backend_mut().take_needs_render();
        controller.lock().add_subview(View::new());
        assert!(!tree.backend().needs_render(), "render is only requested when polled");
        tree.poll();
        assert!(tree.backend_mut().take_needs_render());
    }

    #[test]
    fn test_focus_change_order() {
        let log = new_log();
        let (mut tree, _) = tree_with(View::new());
        let a = tree.add_subview(recorder("A", &log));
        let b = tree.add_subview(recorder("B", &log));

        tree.set_focus_view(Some(a));
        assert_eq!(take(&log), vec!["gained A"]);
        tree.set_focus_view(Some(b));
        assert_eq!(take(&log), vec!["lost A", "gained B"], "lost before gained");
        assert_eq!(tree.focus_view(), Some(b));
        tree.set_focus_view(None);
        assert_eq!(take(&log), vec!["lost B"]);
        assert_eq!(tree.focus_view(), None);
    }

    #[test]
    fn test_focus_is_idempotent() {
        let log = new_log();
        let (mut tree, _) = tree_with(View::new());
        let a = tree.add_subview(recorder("A", &log));

        tree.set_focus_view(Some(a));
        tree.set_focus_view(Some(a));
        assert_eq!(take(&log), vec!["gained A"], "refocusing must not notify again");
        assert_eq!(tree.focus_view(), Some(a));
    }

    #[test]
    #[should_panic(expected = "not part of this view tree")]
    fn test_focus_foreign_view() {
        let (mut tree, _) = tree_with(View::new());
        tree.set_focus_view(Some(View::new().id()));
    }

    #[test]
    fn test_detaching_focus_clears_it() {
        let log = new_log();
        let (mut tree, controller) = tree_with(View::new());
        let a = tree.add_subview(recorder("A", &log));
        let a1 = controller.lock().views_mut().add_subview(a, recorder("A1", &log));
        tree.set_focus_view(Some(a1));

        // detached behind the tree’s back
        let detached = controller.lock().views_mut().detach(a);
        assert_eq!(tree.focus_view(), None);

        // and through the tree, which notifies
        let a = tree.add_subview(detached);
        tree.set_focus_view(Some(a1));
        take(&log);
        let _ = tree.remove_view(a);
        assert_eq!(take(&log), vec!["lost A1"]);
        assert_eq!(tree.focus_view(), None);
    }

    #[test]
    fn test_tab_traversal() {
        let log = new_log();
        let (mut tree, _) = tree_with(View::new());
        let a = tree.add_subview(focusable(recorder("A", &log)));
        let _plain = tree.add_subview(recorder("plain", &log));
        let b = tree.add_subview(focusable(recorder("B", &log)));

        assert!(tree.dispatch_key(&KeyEvent::pressed(KeyCode::Tab)));
        assert_eq!(tree.focus_view(), Some(a));
        tree.dispatch_key(&KeyEvent::pressed(KeyCode::Tab));
        assert_eq!(tree.focus_view(), Some(b));
        tree.dispatch_key(&KeyEvent::pressed(KeyCode::Tab));
        assert_eq!(tree.focus_view(), Some(a), "traversal should wrap around");

        let shift = KeyModifiers {
            shift: true,
            ..KeyModifiers::default()
        };
        tree.dispatch_key(&KeyEvent::pressed(KeyCode::Tab).with_modifiers(shift));
        assert_eq!(tree.focus_view(), Some(b));
        tree.focus_previous();
        assert_eq!(tree.focus_view(), Some(a));
        tree.focus_next();
        assert_eq!(tree.focus_view(), Some(b));
    }

    #[test]
    fn test_tab_without_focusable_views() {
        let mut tree = ViewTree::new(backend());
        assert!(!tree.dispatch_key(&KeyEvent::pressed(KeyCode::Tab)), "no view controller");

        tree.set_view_controller(Some(ViewController::default().into_shared()));
        tree.add_subview(View::new());
        assert!(!tree.dispatch_key(&KeyEvent::pressed(KeyCode::Tab)), "nothing focusable");

        let a = tree.add_subview(focusable(View::new()));
        assert!(tree.dispatch_key(&KeyEvent::pressed(KeyCode::Tab)));
        assert_eq!(tree.focus_view(), Some(a));
        assert!(
            !tree.dispatch_key(&KeyEvent::pressed(KeyCode::Tab)),
            "focus cannot move away from the only focusable view"
        );
        assert_eq!(tree.focus_view(), Some(a));
    }

    #[test]
    fn test_key_events_bubble() {
        let log = new_log();
        let mut outer = Recorder::new("outer", &log);
        outer.handles_keys = true;
        let root = View::new().subview(View::with_behavior(outer).subview(recorder("inner", &log)));
        let (mut tree, controller) = tree_with(root);
        let inner = {
            let c = controller.lock();
            let outer = c.views().subviews(c.root_view())[0];
            c.views().subviews(outer)[0]
        };

        assert!(!tree.dispatch_key(&KeyEvent::pressed(KeyCode::Char('a'))), "no focus view");
        tree.set_focus_view(Some(inner));
        take(&log);
        assert!(tree.dispatch_key(&KeyEvent::pressed(KeyCode::Char('a'))));
        assert_eq!(take(&log), vec!["key Char('a') inner", "key Char('a') outer"]);
    }

    #[test]
    fn test_pointer_press_focuses_and_bubbles() {
        let log = new_log();
        let (mut tree, _) = tree_with(View::new());
        let field = tree.add_subview(
            focusable(recorder("field", &log))
                .frame(Rect::from_xywh(10., 10., 50., 20.))
                .subview(recorder("label", &log).frame(Rect::from_xywh(0., 0., 10., 10.))),
        );
        tree.render(&mut RecordingCanvas::new(), bounds());
        take(&log);

        let handled = tree.dispatch_pointer(&PointerEvent::new(PointerPhase::Down, Point2::new(12., 12.)));
        assert!(!handled);
        assert_eq!(
            take(&log),
            vec!["gained field", "pointer Down label", "pointer Down field"]
        );
        assert_eq!(tree.focus_view(), Some(field));

        tree.dispatch_pointer(&PointerEvent::new(PointerPhase::Down, Point2::new(90., 90.)));
        assert_eq!(tree.focus_view(), Some(field), "pressing the background keeps focus");
    }

    #[test]
    fn test_pointer_updates_cursor() {
        let (mut tree, _) = tree_with(View::new());
        tree.add_subview(
            View::new()
                .frame(Rect::from_xywh(0., 0., 50., 50.))
                .style(Style {
                    cursor: Some(StandardCursor::IBeam),
                    ..Default::default()
                })
                .subview(View::new().frame(Rect::from_xywh(0., 0., 10., 10.))),
        );
        tree.render(&mut RecordingCanvas::new(), bounds());

        tree.dispatch_pointer(&PointerEvent::new(PointerPhase::Move, Point2::new(5., 5.)));
        assert_eq!(tree.backend().cursor(), StandardCursor::IBeam, "cursor is inherited");
        tree.dispatch_pointer(&PointerEvent::new(PointerPhase::Move, Point2::new(75., 75.)));
        assert_eq!(tree.backend().cursor(), StandardCursor::Arrow);
    }

    #[test]
    fn test_activation_reaches_every_view() {
        let log = new_log();
        let root = recorder("root", &log)
            .subview(recorder("A", &log).hidden(true).subview(recorder("A1", &log)))
            .subview(recorder("B", &log));
        let (mut tree, _) = tree_with(root);

        tree.dispatch_activation_change(ActivationChange::Deactivated);
        assert_eq!(
            take(&log),
            vec![
                "Deactivated root",
                "Deactivated A",
                "Deactivated A1",
                "Deactivated B"
            ]
        );
    }

    #[test]
    fn test_popup_replaces_popup() {
        let (mut tree, _) = tree_with(View::new());
        let first = ViewController::default().into_shared();
        let second = ViewController::default().into_shared();
        let (first_id, second_id) = (first.lock().id(), second.lock().id());

        tree.present_popup(Point2::new(1., 2.), Arc::clone(&first));
        tree.present_popup(Point2::new(3., 4.), Arc::clone(&second));

        assert!(Arc::ptr_eq(tree.popup_controller().unwrap(), &second));
        assert_eq!(first.lock().presentation(), None);
        assert_eq!(second.lock().presentation(), Some(PresentationKind::Popup));
        assert_eq!(
            tree.backend().presentation_events(),
            &[
                PresentationEvent::PresentPopup(Point2::new(1., 2.), first_id),
                PresentationEvent::DismissPopup,
                PresentationEvent::PresentPopup(Point2::new(3., 4.), second_id),
            ]
        );
        assert_eq!(Arc::strong_count(&first), 1, "replaced popup should be released");
    }

    #[test]
    fn test_dismiss_twice_is_noop() {
        let (mut tree, _) = tree_with(View::new());
        tree.dismiss_popup();
        tree.present_popup(Point2::new(0., 0.), ViewController::default().into_shared());
        tree.dismiss_popup();
        tree.dismiss_popup();
        tree.dismiss_modal();

        let dismissals = tree
            .backend()
            .presentation_events()
            .iter()
            .filter(|e| **e == PresentationEvent::DismissPopup)
            .count();
        assert_eq!(dismissals, 1);
        assert!(tree.popup_controller().is_none());
    }

    #[test]
    fn test_present_same_popup_again() {
        let (mut tree, _) = tree_with(View::new());
        let popup = ViewController::default().into_shared();
        let id = popup.lock().id();

        tree.present_popup(Point2::new(1., 1.), Arc::clone(&popup));
        tree.present_popup(Point2::new(2., 2.), Arc::clone(&popup));
        assert_eq!(
            tree.backend().presentation_events(),
            &[
                PresentationEvent::PresentPopup(Point2::new(1., 1.), id),
                PresentationEvent::DismissPopup,
                PresentationEvent::PresentPopup(Point2::new(2., 2.), id),
            ]
        );
        assert_eq!(popup.lock().presentation(), Some(PresentationKind::Popup));

        // the popup can still dismiss itself
        popup.lock().dismiss();
        tree.poll();
        assert!(tree.popup_controller().is_none());
        assert_eq!(popup.lock().presentation(), None);
    }

    #[test]
    #[should_panic(expected = "already presented")]
    fn test_present_modal_as_popup() {
        let (mut tree, _) = tree_with(View::new());
        let controller = ViewController::default().into_shared();
        tree.present_modal("Settings", Arc::clone(&controller));
        tree.present_popup(Point2::new(0., 0.), controller);
    }

    #[test]
    #[should_panic(expected = "already presented")]
    fn test_present_popup_in_two_trees() {
        let (mut a, _) = tree_with(View::new());
        let (mut b, _) = tree_with(View::new());
        let controller = ViewController::default().into_shared();
        a.present_popup(Point2::new(0., 0.), Arc::clone(&controller));
        b.present_popup(Point2::new(0., 0.), controller);
    }

    #[test]
    fn test_popup_and_modal_are_independent() {
        let (mut tree, _) = tree_with(View::new());
        let popup = ViewController::default().into_shared();
        let modal = ViewController::default().with_title("Settings").into_shared();
        let modal_id = modal.lock().id();

        tree.present_popup(Point2::new(0., 0.), Arc::clone(&popup));
        tree.present_modal("Settings", Arc::clone(&modal));
        assert!(tree.popup_controller().is_some());
        assert!(tree.modal_controller().is_some());

        tree.dismiss_popup();
        assert!(tree.popup_controller().is_none());
        assert!(Arc::ptr_eq(tree.modal_controller().unwrap(), &modal));
        assert!(tree
            .backend()
            .presentation_events()
            .contains(&PresentationEvent::PresentModal("Settings".into(), modal_id)));
        assert!(Arc::ptr_eq(tree.backend().modal().unwrap(), &modal));
    }

    #[test]
    fn test_dismiss_from_inside_popup_is_deferred() {
        let (mut tree, _) = tree_with(View::new());

        // the backend hosts the popup in a tree of its own
        let popup = ViewController::new(
            View::with_behavior(DismissButton).frame(Rect::from_xywh(0., 0., 10., 10.)),
        )
        .into_shared();
        let mut popup_tree = ViewTree::new(backend());
        popup_tree.set_view_controller(Some(Arc::clone(&popup)));
        popup_tree.render(&mut RecordingCanvas::new(), bounds());

        tree.present_popup(Point2::new(5., 5.), Arc::clone(&popup));
        assert!(popup_tree.dispatch_pointer(&PointerEvent::new(PointerPhase::Down, Point2::new(1., 1.))));
        assert!(
            tree.popup_controller().is_some(),
            "dismissal happens when the presenting tree gets to it"
        );

        tree.poll();
        assert!(tree.popup_controller().is_none());
        assert!(tree.backend().popup().is_none());
        assert_eq!(popup.lock().presentation(), None);
        assert_eq!(Arc::strong_count(&popup), 2, "only the test and the popup tree remain");

        // a stale dismissal must not touch a newer popup
        let newer = ViewController::default().into_shared();
        tree.present_popup(Point2::new(0., 0.), Arc::clone(&newer));
        popup.lock().dismiss();
        tree.poll();
        assert!(Arc::ptr_eq(tree.popup_controller().unwrap(), &newer));
    }

    #[test]
    fn test_present_popup_from_view() {
        let popup = ViewController::default().into_shared();
        let (mut tree, _) = tree_with(View::new());
        tree.add_subview(
            View::with_behavior(PopupButton(Arc::clone(&popup)))
                .frame(Rect::from_xywh(0., 0., 20., 20.)),
        );
        tree.render(&mut RecordingCanvas::new(), bounds());

        tree.dispatch_pointer(&PointerEvent::new(PointerPhase::Down, Point2::new(4., 6.)));
        assert!(Arc::ptr_eq(tree.popup_controller().unwrap(), &popup));
        assert_eq!(
            tree.backend().presentation_events(),
            &[PresentationEvent::PresentPopup(Point2::new(4., 6.), popup.lock().id())]
        );
    }

    #[test]
    fn test_view_to_screen() {
        let description = WindowDescription::new("test", Vector2::new(100., 100.))
            .with_position(Point2::new(200., 100.));
        let mut tree = ViewTree::new(HeadlessBackend::new(&description).unwrap());
        tree.set_view_controller(Some(ViewController::default().into_shared()));
        let a = tree.add_subview(View::new().frame(Rect::from_xywh(10., 20., 5., 5.)));
        tree.paint(0);

        assert_eq!(
            tree.view_to_screen_pos(a, Point2::new(1., 1.)),
            Some(Point2::new(211., 121.))
        );
        assert_eq!(tree.view_to_screen_pos(View::new().id(), Point2::new(0., 0.)), None);
    }

    #[test]
    fn test_drop_uninstalls() {
        let (tree, controller) = tree_with(View::new());
        drop(tree);
        assert!(!controller.lock().is_installed());
        assert_eq!(Arc::strong_count(&controller), 1);
    }
}
