use crate::backend::{Canvas, StandardCursor};
use crate::rect::Rect;
use crate::view::{RenderInfo, Style, View, ViewBehavior, ViewFlags, ViewId};
use crate::view_tree::Request;
use cgmath::Point2;
use crossbeam::channel::Sender;
use log::trace;
use std::collections::HashMap;
use std::sync::Arc;

/// A node in the view graph.
#[derive(Debug)]
struct ViewNode {
    behavior: Box<dyn ViewBehavior>,
    /// The immediate superview.
    superview: Option<ViewId>,
    /// An ordered list of all subviews. Later subviews are drawn on top.
    subviews: Vec<ViewId>,
    /// The frame requested by the view.
    frame: Rect,
    /// The margin box in window coordinates, as computed by the last layout pass.
    geometry: Rect,
    style: Style,
    flags: ViewFlags,
    hidden: bool,
}

/// The views of one view controller: a root view and all of its descendants.
///
/// Views are stored by id; superview links are plain ids and thus never own anything.
#[derive(Debug)]
pub struct ViewGraph {
    nodes: HashMap<ViewId, ViewNode>,
    root: ViewId,
    /// The view with keyboard focus, if this graph belongs to a view tree.
    focus: Option<ViewId>,
    /// The margin box of the last layout pass.
    laid_out_in: Option<Rect>,
    needs_layout: bool,
    /// Where invalidation is reported while the graph is installed in a view tree.
    invalidation: Option<Sender<Request>>,
}

impl ViewGraph {
    /// Creates a graph with the given view (and its subviews) as the root.
    pub fn new(root: View) -> ViewGraph {
        let mut graph = ViewGraph {
            nodes: HashMap::new(),
            root: root.id,
            focus: None,
            laid_out_in: None,
            needs_layout: true,
            invalidation: None,
        };
        graph.insert(None, root);
        graph
    }

    /// Inserts a view and its subviews.
    fn insert(&mut self, superview: Option<ViewId>, view: View) -> ViewId {
        let View {
            id,
            frame,
            style,
            flags,
            hidden,
            behavior,
            subviews,
        } = view;
        debug_assert!(!self.nodes.contains_key(&id), "view inserted twice");

        self.nodes.insert(
            id,
            ViewNode {
                behavior,
                superview,
                subviews: Vec::with_capacity(subviews.len()),
                frame,
                geometry: Rect::zero(),
                style,
                flags,
                hidden,
            },
        );

        for subview in subviews {
            let subview_id = self.insert(Some(id), subview);
            self.node_mut(id).subviews.push(subview_id);
        }
        id
    }

    /// Removes a view and its subviews from the node map and reassembles them.
    ///
    /// Does *not* remove the view from the superview’s `subviews` list.
    fn extract(&mut self, id: ViewId) -> View {
        let node = self.nodes.remove(&id).expect("extracting nonexistent view");
        if self.focus == Some(id) {
            trace!("focus view {:?} left the graph; clearing focus", id);
            self.focus = None;
        }

        let subviews = node
            .subviews
            .into_iter()
            .map(|subview| self.extract(subview))
            .collect();

        View {
            id,
            frame: node.frame,
            style: node.style,
            flags: node.flags,
            hidden: node.hidden,
            behavior: node.behavior,
            subviews,
        }
    }

    fn node(&self, id: ViewId) -> &ViewNode {
        match self.nodes.get(&id) {
            Some(node) => node,
            None => panic!("{:?} is not part of this view graph", id),
        }
    }

    fn node_mut(&mut self, id: ViewId) -> &mut ViewNode {
        match self.nodes.get_mut(&id) {
            Some(node) => node,
            None => panic!("{:?} is not part of this view graph", id),
        }
    }

    /// Marks the graph as needing layout and asks the owning tree for a render.
    pub fn invalidate(&mut self) {
        self.needs_layout = true;
        if let Some(sender) = &self.invalidation {
            // the tree holds the receiver for as long as it holds the sender
            let _ = sender.send(Request::Invalidate);
        }
    }

    pub(crate) fn set_invalidation(&mut self, sender: Option<Sender<Request>>) {
        self.invalidation = sender;
        self.needs_layout = true;
    }

    pub(crate) fn is_linked(&self) -> bool {
        self.invalidation.is_some()
    }

    pub fn root(&self) -> ViewId {
        self.root
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn contains(&self, id: ViewId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn superview(&self, id: ViewId) -> Option<ViewId> {
        self.nodes.get(&id).and_then(|node| node.superview)
    }

    pub fn subviews(&self, id: ViewId) -> &[ViewId] {
        &self.node(id).subviews
    }

    /// Returns true if `ancestor` is `id` or one of its superviews.
    pub fn is_ancestor(&self, ancestor: ViewId, id: ViewId) -> bool {
        let mut current = Some(id);
        while let Some(view) = current {
            if view == ancestor {
                return true;
            }
            current = self.superview(view);
        }
        false
    }

    /// Appends a view to a superview’s subviews.
    ///
    /// # Panics
    /// - if the superview is not part of this graph
    pub fn add_subview(&mut self, superview: ViewId, view: View) -> ViewId {
        assert!(
            self.contains(superview),
            "cannot add a subview to {:?}: not part of this view graph",
            superview
        );
        let id = self.insert(Some(superview), view);
        self.node_mut(superview).subviews.push(id);
        self.invalidate();
        id
    }

    /// Removes a view (and its subviews) from its superview and hands it back.
    ///
    /// Clears focus if the focused view is part of the removed subtree.
    ///
    /// # Panics
    /// - if the view is the root view or not part of this graph
    pub fn detach(&mut self, id: ViewId) -> View {
        assert!(id != self.root, "the root view cannot be detached");
        let superview = self
            .node(id)
            .superview
            .expect("non-root view without a superview");
        self.node_mut(superview).subviews.retain(|subview| *subview != id);
        let view = self.extract(id);
        self.invalidate();
        view
    }

    /// The view’s requested frame.
    pub fn frame(&self, id: ViewId) -> Rect {
        self.node(id).frame
    }

    pub fn set_frame(&mut self, id: ViewId, frame: Rect) {
        self.node_mut(id).frame = frame;
        self.invalidate();
    }

    /// The view’s margin box in window coordinates from the last layout pass.
    pub fn geometry(&self, id: ViewId) -> Rect {
        self.node(id).geometry
    }

    pub fn style(&self, id: ViewId) -> &Style {
        &self.node(id).style
    }

    pub fn set_style(&mut self, id: ViewId, style: Style) {
        self.node_mut(id).style = style;
        self.invalidate();
    }

    pub fn flags(&self, id: ViewId) -> ViewFlags {
        self.node(id).flags
    }

    pub fn set_flags(&mut self, id: ViewId, flags: ViewFlags) {
        self.node_mut(id).flags = flags;
    }

    pub fn is_hidden(&self, id: ViewId) -> bool {
        self.node(id).hidden
    }

    pub fn set_hidden(&mut self, id: ViewId, hidden: bool) {
        let node = self.node_mut(id);
        if node.hidden != hidden {
            node.hidden = hidden;
            self.invalidate();
        }
    }

    /// Returns true if neither the view nor any of its superviews is hidden.
    pub fn is_visible(&self, id: ViewId) -> bool {
        let mut current = Some(id);
        while let Some(view) = current {
            match self.nodes.get(&view) {
                Some(node) if !node.hidden => current = node.superview,
                _ => return false,
            }
        }
        true
    }

    pub fn behavior<T: ViewBehavior>(&self, id: ViewId) -> Option<&T> {
        self.nodes
            .get(&id)
            .and_then(|node| node.behavior.as_any().downcast_ref())
    }

    pub fn behavior_mut<T: ViewBehavior>(&mut self, id: ViewId) -> Option<&mut T> {
        self.nodes
            .get_mut(&id)
            .and_then(|node| node.behavior.as_any_mut().downcast_mut())
    }

    pub(crate) fn behavior_dyn_mut(&mut self, id: ViewId) -> &mut dyn ViewBehavior {
        &mut *self.node_mut(id).behavior
    }

    /// The view with keyboard focus.
    pub fn focus(&self) -> Option<ViewId> {
        self.focus
    }

    pub(crate) fn set_focus(&mut self, focus: Option<ViewId>) {
        debug_assert!(focus.map_or(true, |id| self.contains(id)));
        self.focus = focus;
    }

    /// All views in document order: superviews before subviews, subviews in order.
    pub fn document_order(&self) -> Vec<ViewId> {
        let mut order = Vec::with_capacity(self.nodes.len());
        self.collect(self.root, false, &mut order);
        order
    }

    /// Like `document_order`, but skips hidden views and everything inside them.
    pub fn visible_order(&self) -> Vec<ViewId> {
        let mut order = Vec::with_capacity(self.nodes.len());
        self.collect(self.root, true, &mut order);
        order
    }

    fn collect(&self, id: ViewId, skip_hidden: bool, order: &mut Vec<ViewId>) {
        let node = self.node(id);
        if skip_hidden && node.hidden {
            return;
        }
        order.push(id);
        for subview in &node.subviews {
            self.collect(*subview, skip_hidden, order);
        }
    }

    /// Visible, focusable views in tab order.
    pub fn focus_chain(&self) -> Vec<ViewId> {
        self.visible_order()
            .into_iter()
            .filter(|id| self.node(*id).flags.contains(ViewFlags::FOCUSABLE))
            .collect()
    }

    /// The view itself or its closest superview that can receive focus.
    pub fn focusable_ancestor(&self, id: ViewId) -> Option<ViewId> {
        let mut current = Some(id);
        while let Some(view) = current {
            let node = self.node(view);
            if node.flags.contains(ViewFlags::FOCUSABLE) {
                return Some(view);
            }
            current = node.superview;
        }
        None
    }

    /// The cursor of the view itself or of its closest superview that declares one.
    pub fn cursor(&self, id: ViewId) -> Option<StandardCursor> {
        let mut current = Some(id);
        while let Some(view) = current {
            let node = self.node(view);
            if node.style.cursor.is_some() {
                return node.style.cursor;
            }
            current = node.superview;
        }
        None
    }

    /// Returns the topmost visible view accepting pointer input at the given window coordinates.
    ///
    /// Uses the geometry of the last layout pass.
    pub fn hit_test(&self, point: Point2<f64>) -> Option<ViewId> {
        self.hit_test_node(self.root, point)
    }

    fn hit_test_node(&self, id: ViewId, point: Point2<f64>) -> Option<ViewId> {
        let node = self.node(id);
        if node.hidden {
            return None;
        }
        let inside = node.geometry.contains(point);
        if node.style.clip_contents && !inside {
            return None;
        }
        // later subviews are on top
        for subview in node.subviews.iter().rev() {
            if let Some(hit) = self.hit_test_node(*subview, point) {
                return Some(hit);
            }
        }
        if inside && node.flags.contains(ViewFlags::POINTER) {
            Some(id)
        } else {
            None
        }
    }

    /// Lays out all views if anything changed since the last pass.
    pub fn layout(&mut self, margin_box: Rect) {
        if !self.needs_layout && self.laid_out_in == Some(margin_box) {
            return;
        }
        trace!("laying out view graph in {:?}", margin_box);
        self.needs_layout = false;
        self.laid_out_in = Some(margin_box);

        let mut stack = vec![(self.root, margin_box)];
        while let Some((id, geometry)) = stack.pop() {
            let node = self.node_mut(id);
            node.geometry = geometry;
            let layout = Arc::clone(&node.style.layout);
            let subviews = node.subviews.clone();

            let visible: Vec<_> = subviews
                .iter()
                .copied()
                .filter(|subview| !self.node(*subview).hidden)
                .collect();
            let frames: Vec<_> = visible.iter().map(|s| self.node(*s).frame).collect();
            let mut geometries = layout.layout(geometry, &frames).into_iter();

            for subview in subviews {
                let subview_geometry = if self.node(subview).hidden {
                    self.node(subview).frame + geometry.origin
                } else {
                    geometries
                        .next()
                        .unwrap_or_else(|| self.node(subview).frame + geometry.origin)
                };
                stack.push((subview, subview_geometry));
            }
        }
    }

    /// Lays out and draws all visible views in document order, confined to `margin_box`.
    pub fn render(&mut self, canvas: &mut dyn Canvas, margin_box: Rect) {
        self.layout(margin_box);
        canvas.push_clip(margin_box);
        self.render_node(self.root, canvas);
        canvas.pop_clip();
    }

    fn render_node(&self, id: ViewId, canvas: &mut dyn Canvas) {
        let node = self.node(id);
        if node.hidden {
            return;
        }
        node.behavior.render(
            canvas,
            &RenderInfo {
                id,
                geometry: node.geometry,
                style: &node.style,
                focused: self.focus == Some(id),
            },
        );

        if node.style.clip_contents {
            canvas.push_clip(node.geometry);
        }
        for subview in &node.subviews {
            self.render_node(*subview, canvas);
        }
        if node.style.clip_contents {
            canvas.pop_clip();
        }
    }
}
