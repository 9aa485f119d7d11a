//! Contracts the detector needs from the host's UI-tree provider and input layer.
//!
//! Node handles are owned values handed out by the provider. The detector only
//! borrows them for the duration of one classification and never stores them.

use serde::{Deserialize, Serialize};

use super::types::Bounds;

pub trait UiNode: Sized {
    /// Identity of the app that owns the tree this node belongs to.
    fn app_id(&self) -> Option<String>;

    fn text(&self) -> Option<String>;

    fn bounds_in_screen(&self) -> Bounds;

    /// Bounds of the window that owns this node, if the provider still has it.
    fn window_bounds(&self) -> Option<Bounds>;

    fn is_visible_to_user(&self) -> bool;

    fn is_clickable(&self) -> bool;

    fn parent(&self) -> Option<Self>;

    /// Provider-side text search over this node and its descendants.
    ///
    /// Providers may match loosely (substring, case-folded); callers that need
    /// an exact label filter the result themselves.
    fn find_by_text(&self, label: &str) -> Vec<Self>;
}

/// Source of the currently focused window's tree, used by on-demand checks.
pub trait TreeProvider {
    type Node: UiNode;

    fn active_window_root(&mut self) -> Option<Self::Node>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PointerPhase {
    Down,
    Up,
}

pub trait ActivationSink<N> {
    /// Ask the provider to perform the node's click action. Returns false if
    /// the provider refused.
    fn invoke(&mut self, node: &N) -> bool;

    /// Inject one phase of a synthetic pointer gesture at a screen point.
    fn pointer(&mut self, phase: PointerPhase, x: i32, y: i32) -> bool;
}

/// One UI-change notification. Either part may be missing when the provider
/// could not resolve it.
#[derive(Debug, Clone)]
pub struct UiEvent<N> {
    pub app: Option<String>,
    pub source: Option<N>,
}

impl<N> UiEvent<N> {
    pub fn new(app: impl Into<String>, source: N) -> Self {
        Self {
            app: Some(app.into()),
            source: Some(source),
        }
    }
}
