//! In-memory UI tree captured as JSON.
//!
//! Used to replay recorded traces and to drive the detector without a live
//! provider. A `SnapshotNode` is a shared tree plus a child-index path, so it
//! can walk to its parent the way a live node handle does.

use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

use super::node::{ActivationSink, PointerPhase, TreeProvider, UiEvent, UiNode};
use super::types::Bounds;

fn default_visible() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotElement {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    pub bounds: Bounds,
    #[serde(default = "default_visible")]
    pub visible: bool,
    #[serde(default)]
    pub clickable: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<SnapshotElement>,
}

impl SnapshotElement {
    pub fn new(bounds: Bounds) -> Self {
        Self {
            text: None,
            bounds,
            visible: true,
            clickable: false,
            children: Vec::new(),
        }
    }

    pub fn with_text(mut self, text: &str) -> Self {
        self.text = Some(text.to_string());
        self
    }

    pub fn clickable(mut self) -> Self {
        self.clickable = true;
        self
    }

    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }

    pub fn child(mut self, child: SnapshotElement) -> Self {
        self.children.push(child);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotTree {
    pub app: String,
    /// Missing when the window was already gone at capture time.
    #[serde(default)]
    pub window: Option<Bounds>,
    pub root: SnapshotElement,
}

impl SnapshotTree {
    pub fn new(app: &str, window: Bounds, root: SnapshotElement) -> Self {
        Self {
            app: app.to_string(),
            window: Some(window),
            root,
        }
    }

    pub fn root_node(self: &Arc<Self>) -> SnapshotNode {
        SnapshotNode {
            tree: Arc::clone(self),
            path: Vec::new(),
        }
    }

    /// A change notification whose source is this tree's root.
    pub fn event(self: &Arc<Self>) -> UiEvent<SnapshotNode> {
        UiEvent::new(self.app.clone(), self.root_node())
    }
}

#[derive(Debug, Clone)]
pub struct SnapshotNode {
    tree: Arc<SnapshotTree>,
    path: Vec<usize>,
}

impl SnapshotNode {
    pub fn path(&self) -> &[usize] {
        &self.path
    }

    fn element(&self) -> &SnapshotElement {
        self.path
            .iter()
            .fold(&self.tree.root, |element, idx| &element.children[*idx])
    }

    fn at(&self, path: Vec<usize>) -> Self {
        Self {
            tree: Arc::clone(&self.tree),
            path,
        }
    }
}

fn collect_matches(
    element: &SnapshotElement,
    needle: &str,
    path: &mut Vec<usize>,
    out: &mut Vec<Vec<usize>>,
) {
    if let Some(text) = &element.text {
        if text.to_lowercase().contains(needle) {
            out.push(path.clone());
        }
    }
    for (idx, child) in element.children.iter().enumerate() {
        path.push(idx);
        collect_matches(child, needle, path, out);
        path.pop();
    }
}

impl UiNode for SnapshotNode {
    fn app_id(&self) -> Option<String> {
        Some(self.tree.app.clone())
    }

    fn text(&self) -> Option<String> {
        self.element().text.clone()
    }

    fn bounds_in_screen(&self) -> Bounds {
        self.element().bounds
    }

    fn window_bounds(&self) -> Option<Bounds> {
        self.tree.window
    }

    fn is_visible_to_user(&self) -> bool {
        self.element().visible
    }

    fn is_clickable(&self) -> bool {
        self.element().clickable
    }

    fn parent(&self) -> Option<Self> {
        let (_, parent) = self.path.split_last()?;
        Some(self.at(parent.to_vec()))
    }

    fn find_by_text(&self, label: &str) -> Vec<Self> {
        let needle = label.to_lowercase();
        let mut path = self.path.clone();
        let mut found = Vec::new();
        collect_matches(self.element(), &needle, &mut path, &mut found);
        found.into_iter().map(|p| self.at(p)).collect()
    }
}

/// Provider whose focused window is whatever tree was shown last.
#[derive(Debug, Clone, Default)]
pub struct SnapshotProvider {
    current: Arc<Mutex<Option<Arc<SnapshotTree>>>>,
}

impl SnapshotProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn show(&self, tree: Arc<SnapshotTree>) {
        if let Ok(mut current) = self.current.lock() {
            *current = Some(tree);
        }
    }
}

impl TreeProvider for SnapshotProvider {
    type Node = SnapshotNode;

    fn active_window_root(&mut self) -> Option<SnapshotNode> {
        let current = self.current.lock().ok()?;
        current.as_ref().map(|tree| tree.root_node())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Activation {
    Invoke {
        app: String,
        path: Vec<usize>,
        bounds: Bounds,
    },
    Pointer {
        phase: PointerPhase,
        x: i32,
        y: i32,
    },
}

/// Sink that performs nothing and remembers every request.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    log: Arc<Mutex<Vec<Activation>>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn activations(&self) -> Vec<Activation> {
        self.log.lock().map(|log| log.clone()).unwrap_or_default()
    }

    fn push(&self, activation: Activation) -> bool {
        match self.log.lock() {
            Ok(mut log) => {
                log.push(activation);
                true
            }
            Err(_) => false,
        }
    }
}

impl ActivationSink<SnapshotNode> for RecordingSink {
    fn invoke(&mut self, node: &SnapshotNode) -> bool {
        self.push(Activation::Invoke {
            app: node.tree.app.clone(),
            path: node.path.clone(),
            bounds: node.bounds_in_screen(),
        })
    }

    fn pointer(&mut self, phase: PointerPhase, x: i32, y: i32) -> bool {
        self.push(Activation::Pointer { phase, x, y })
    }
}
