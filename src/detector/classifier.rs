//! Node classifier: runs the rule chain on one candidate and picks how to
//! activate it.
//!
//! Clickability never gates acceptance. Plenty of decorative elements are
//! marked clickable, so it only decides whether the node, its parent or a
//! synthetic tap carries the activation.

use thiserror::Error;
use tracing::{debug, warn};

use super::node::{ActivationSink, PointerPhase, UiNode};
use super::rules::{check_region, check_size, check_text};
use super::types::{ActivationKind, Bounds, CheckOutcome, Rejection, RejectionKind};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClassifyError {
    #[error("owning window bounds unavailable")]
    WindowUnavailable,
    #[error("provider panicked: {0}")]
    ProviderPanic(String),
}

/// Classify `node` into `outcome`, stopping at the first failing stage.
///
/// The outcome keeps whatever was measured before a failure. With `activate`
/// false the activation kind is still decided but nothing is sent to `sink`.
pub fn classify<N, S>(
    node: &N,
    outcome: &mut CheckOutcome,
    sink: &mut S,
    activate: bool,
) -> Result<(), ClassifyError>
where
    N: UiNode,
    S: ActivationSink<N> + ?Sized,
{
    if !node.is_visible_to_user() {
        outcome.reject(Rejection::plain(RejectionKind::Invisible));
        return Ok(());
    }

    let text = node.text().unwrap_or_default();
    if let Err(rejection) = check_text(&text, outcome) {
        outcome.reject(rejection);
        return Ok(());
    }

    let bounds = node.bounds_in_screen();
    outcome.bounds = Some(bounds);
    let window = node.window_bounds().ok_or(ClassifyError::WindowUnavailable)?;

    if let Err(rejection) = check_region(&bounds, &window) {
        outcome.reject(rejection);
        return Ok(());
    }
    if let Err(rejection) = check_size(&bounds, &window, outcome) {
        outcome.reject(rejection);
        return Ok(());
    }

    outcome.accepted = true;
    choose_activation(node, &bounds, &window, outcome, sink, activate);
    Ok(())
}

fn choose_activation<N, S>(
    node: &N,
    bounds: &Bounds,
    window: &Bounds,
    outcome: &mut CheckOutcome,
    sink: &mut S,
    activate: bool,
) where
    N: UiNode,
    S: ActivationSink<N> + ?Sized,
{
    if node.is_clickable() {
        outcome.activation = ActivationKind::DirectInvoke;
        if activate && !sink.invoke(node) {
            warn!(app = %outcome.source_app, "direct invoke refused");
        }
        return;
    }

    let mut parent_axis = None;
    if let Some(parent) = node.parent() {
        let parent_bounds = parent.bounds_in_screen();
        outcome.parent_bounds = Some(parent_bounds);
        if parent.is_clickable() {
            match check_size(&parent_bounds, window, outcome) {
                Ok(()) => {
                    outcome.bounds = Some(parent_bounds);
                    outcome.activation = ActivationKind::DirectInvoke;
                    outcome.activation_fault = Some(Rejection::plain(RejectionKind::NotClickable));
                    if activate && !sink.invoke(&parent) {
                        warn!(app = %outcome.source_app, "parent invoke refused");
                    }
                    return;
                }
                Err(rejection) => parent_axis = rejection.axis,
            }
        }
    }

    outcome.activation_fault = Some(Rejection {
        kind: RejectionKind::ParentFault,
        axis: parent_axis,
    });
    outcome.activation = ActivationKind::SyntheticPointerEvent;
    if activate {
        let (x, y) = (screen_coord(bounds.center_x()), screen_coord(bounds.center_y()));
        debug!(x, y, "synthesizing tap");
        let down = sink.pointer(PointerPhase::Down, x, y);
        let up = sink.pointer(PointerPhase::Up, x, y);
        if !(down && up) {
            warn!(app = %outcome.source_app, x, y, "synthetic tap not delivered");
        }
    }
}

/// Clamp a computed point onto the pointer layer's coordinate range.
fn screen_coord(value: i64) -> i32 {
    value.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::detector::snapshot::{
        Activation, RecordingSink, SnapshotElement, SnapshotNode, SnapshotTree,
    };
    use crate::detector::types::Axis;

    const PHONE: Bounds = Bounds::new(0, 0, 1080, 2400);

    fn label_in(parent: SnapshotElement, label: SnapshotElement) -> SnapshotNode {
        let root = SnapshotElement::new(PHONE).child(parent.child(label));
        let tree = Arc::new(SnapshotTree::new("com.video.app", PHONE, root));
        tree.root_node().find_by_text("跳过").remove(0)
    }

    fn run(node: &SnapshotNode, activate: bool) -> (CheckOutcome, Vec<Activation>) {
        let mut sink = RecordingSink::new();
        let mut outcome = CheckOutcome::new("com.video.app");
        classify(node, &mut outcome, &mut sink, activate).expect("classify");
        (outcome, sink.activations())
    }

    #[test]
    fn left_side_label_is_rejected_on_location() {
        let node = label_in(
            SnapshotElement::new(PHONE),
            SnapshotElement::new(Bounds::from_edges(200, 1800, 400, 1900))
                .with_text("跳过")
                .clickable(),
        );
        let (outcome, activations) = run(&node, true);
        assert!(!outcome.accepted);
        assert_eq!(
            outcome.rejection,
            Some(Rejection::on(RejectionKind::IllegalLocation, Axis::Transverse))
        );
        assert_eq!(outcome.bounds, Some(Bounds::from_edges(200, 1800, 400, 1900)));
        assert!(activations.is_empty());
    }

    #[test]
    fn clickable_corner_label_is_invoked_directly() {
        let node = label_in(
            SnapshotElement::new(PHONE),
            SnapshotElement::new(Bounds::new(825, 170, 150, 60))
                .with_text("跳过")
                .clickable(),
        );
        let (outcome, activations) = run(&node, true);
        assert!(outcome.accepted);
        assert!(outcome.rejection.is_none());
        assert!(outcome.is_portrait_window);
        assert_eq!(outcome.activation, ActivationKind::DirectInvoke);
        assert_eq!(
            activations,
            vec![Activation::Invoke {
                app: "com.video.app".to_string(),
                path: vec![0, 0],
                bounds: Bounds::new(825, 170, 150, 60),
            }]
        );
    }

    #[test]
    fn hidden_label_stops_before_text() {
        let node = label_in(
            SnapshotElement::new(PHONE),
            SnapshotElement::new(Bounds::new(825, 170, 150, 60))
                .with_text("跳过")
                .hidden(),
        );
        let (outcome, _) = run(&node, true);
        assert_eq!(outcome.rejection, Some(Rejection::plain(RejectionKind::Invisible)));
        assert!(outcome.text.is_none());
    }

    #[test]
    fn clickable_parent_stands_in_for_label() {
        let node = label_in(
            SnapshotElement::new(Bounds::new(800, 150, 200, 100)).clickable(),
            SnapshotElement::new(Bounds::new(825, 170, 150, 60)).with_text("跳过"),
        );
        let (outcome, activations) = run(&node, true);
        assert!(outcome.accepted);
        assert_eq!(outcome.activation, ActivationKind::DirectInvoke);
        assert_eq!(outcome.bounds, Some(Bounds::new(800, 150, 200, 100)));
        assert_eq!(outcome.parent_bounds, Some(Bounds::new(800, 150, 200, 100)));
        assert_eq!(
            outcome.activation_fault,
            Some(Rejection::plain(RejectionKind::NotClickable))
        );
        assert!(matches!(
            activations.as_slice(),
            [Activation::Invoke { path, .. }] if path == &vec![0]
        ));
    }

    #[test]
    fn oversized_parent_falls_back_to_tap() {
        let node = label_in(
            SnapshotElement::new(Bounds::new(0, 0, 1080, 400)).clickable(),
            SnapshotElement::new(Bounds::new(825, 170, 150, 60)).with_text("跳过"),
        );
        let (outcome, activations) = run(&node, true);
        assert!(outcome.accepted);
        assert_eq!(outcome.activation, ActivationKind::SyntheticPointerEvent);
        assert_eq!(outcome.bounds, Some(Bounds::new(825, 170, 150, 60)));
        assert_eq!(
            outcome.activation_fault,
            Some(Rejection::on(RejectionKind::ParentFault, Axis::Transverse))
        );
        assert_eq!(
            activations,
            vec![
                Activation::Pointer {
                    phase: PointerPhase::Down,
                    x: 900,
                    y: 200
                },
                Activation::Pointer {
                    phase: PointerPhase::Up,
                    x: 900,
                    y: 200
                },
            ]
        );
    }

    #[test]
    fn dry_run_decides_without_activating() {
        let node = label_in(
            SnapshotElement::new(PHONE),
            SnapshotElement::new(Bounds::new(825, 170, 150, 60)).with_text("跳过"),
        );
        let (outcome, activations) = run(&node, false);
        assert!(outcome.accepted);
        assert_eq!(outcome.activation, ActivationKind::SyntheticPointerEvent);
        assert!(activations.is_empty());
    }

    #[test]
    fn missing_window_is_an_error() {
        let root = SnapshotElement::new(PHONE)
            .child(SnapshotElement::new(Bounds::new(825, 170, 150, 60)).with_text("跳过"));
        let mut tree = SnapshotTree::new("com.video.app", PHONE, root);
        tree.window = None;
        let node = Arc::new(tree).root_node().find_by_text("跳过").remove(0);

        let mut outcome = CheckOutcome::new("com.video.app");
        let err = classify(&node, &mut outcome, &mut RecordingSink::new(), true).unwrap_err();
        assert_eq!(err, ClassifyError::WindowUnavailable);
        assert!(outcome.bounds.is_some());
    }
}
