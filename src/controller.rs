use crate::view::{View, ViewId};
use crate::view_graph::ViewGraph;
use crate::view_tree::Request;
use crossbeam::channel::Sender;
use log::{trace, warn};
use parking_lot::Mutex;
use std::sync::Arc;
use uuid::Uuid;

/// A view controller shared between the application and the view trees it is installed in or
/// presented by.
pub type SharedController = Arc<Mutex<ViewController>>;

/// A unique identifier for a view controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ControllerId(Uuid);

impl ControllerId {
    fn new() -> ControllerId {
        ControllerId(Uuid::new_v4())
    }
}

/// Ways a view tree can present a controller outside of its own root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PresentationKind {
    Popup,
    Modal,
}

/// Connects a presented controller back to the tree presenting it.
#[derive(Debug, Clone)]
pub(crate) struct Presenter {
    pub(crate) requests: Sender<Request>,
    pub(crate) kind: PresentationKind,
    pub(crate) controller: ControllerId,
}

impl Presenter {
    pub(crate) fn dismiss(&self) {
        let request = Request::Dismiss(self.kind, Some(self.controller));
        if self.requests.send(request).is_err() {
            warn!("presenting view tree is gone; cannot dismiss {:?}", self.controller);
        }
    }
}

/// Owns a root view and everything below it.
///
/// A controller is installed into at most one view tree at a time (as that tree’s root), and may
/// additionally be presented by another tree as a popup or modal.
#[derive(Debug)]
pub struct ViewController {
    id: ControllerId,
    title: String,
    views: ViewGraph,
    presenter: Option<Presenter>,
}

impl ViewController {
    pub fn new(root: View) -> ViewController {
        ViewController {
            id: ControllerId::new(),
            title: String::new(),
            views: ViewGraph::new(root),
            presenter: None,
        }
    }

    pub fn with_title(mut self, title: &str) -> ViewController {
        self.title = title.to_string();
        self
    }

    pub fn into_shared(self) -> SharedController {
        Arc::new(Mutex::new(self))
    }

    pub fn id(&self) -> ControllerId {
        self.id
    }

    /// Title used for window chrome when presented as a modal.
    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn set_title(&mut self, title: &str) {
        self.title = title.to_string();
    }

    pub fn root_view(&self) -> ViewId {
        self.views.root()
    }

    pub fn views(&self) -> &ViewGraph {
        &self.views
    }

    pub fn views_mut(&mut self) -> &mut ViewGraph {
        &mut self.views
    }

    /// Appends a view to the root view.
    pub fn add_subview(&mut self, view: View) -> ViewId {
        let root = self.views.root();
        self.views.add_subview(root, view)
    }

    /// True if the controller is the root of some view tree.
    pub fn is_installed(&self) -> bool {
        self.views.is_linked()
    }

    /// How the controller is currently being presented, if at all.
    pub fn presentation(&self) -> Option<PresentationKind> {
        self.presenter.as_ref().map(|presenter| presenter.kind)
    }

    /// Asks the presenting tree to end this controller’s popup or modal presentation.
    ///
    /// Does nothing if the controller isn’t presented. The presenting tree carries this out the
    /// next time it processes requests.
    pub fn dismiss(&self) {
        match &self.presenter {
            Some(presenter) => presenter.dismiss(),
            None => trace!("dismiss: {:?} is not presented", self.id),
        }
    }

    pub(crate) fn presenter(&self) -> Option<&Presenter> {
        self.presenter.as_ref()
    }

    pub(crate) fn set_presenter(&mut self, presenter: Option<Presenter>) {
        self.presenter = presenter;
    }

    /// Called when a view tree adopts this controller as its root.
    ///
    /// # Panics
    /// - if the controller is already installed in a view tree
    pub(crate) fn install(&mut self, requests: Sender<Request>) {
        assert!(
            !self.is_installed(),
            "{:?} is already installed in a view tree",
            self.id
        );
        self.views.set_invalidation(Some(requests));
    }

    /// Called when a view tree lets go of this controller.
    pub(crate) fn uninstall(&mut self) {
        self.views.set_focus(None);
        self.views.set_invalidation(None);
    }
}

impl Default for ViewController {
    fn default() -> ViewController {
        ViewController::new(View::new())
    }
}
