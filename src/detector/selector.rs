use super::classifier::{classify, ClassifyError};
use super::node::{ActivationSink, UiNode};
use super::types::{Axis, CheckOutcome, Rejection, RejectionKind};

/// Find the single node under `root` labelled exactly `label` and classify it.
///
/// No match rejects as `IllegalTarget|Portrait`, several matches as
/// `IllegalTarget|Transverse`; neither case reaches the classifier.
pub fn select<N, S>(
    root: &N,
    label: &str,
    outcome: &mut CheckOutcome,
    sink: &mut S,
    activate: bool,
) -> Result<(), ClassifyError>
where
    N: UiNode,
    S: ActivationSink<N> + ?Sized,
{
    let mut candidates: Vec<N> = root
        .find_by_text(label)
        .into_iter()
        .filter(|node| node.text().as_deref() == Some(label))
        .collect();

    match candidates.len() {
        0 => {
            outcome.reject(Rejection::on(RejectionKind::IllegalTarget, Axis::Portrait));
            Ok(())
        }
        1 => {
            let node = candidates.remove(0);
            classify(&node, outcome, sink, activate)
        }
        _ => {
            outcome.reject(Rejection::on(RejectionKind::IllegalTarget, Axis::Transverse));
            Ok(())
        }
    }
}
