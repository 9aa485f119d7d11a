//! Monitor loop body: turns UI-change notifications into classification
//! attempts, counts acceptances once per foreground app and journals the
//! result.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use tracing::{debug, info, warn};

use super::classifier::ClassifyError;
use super::node::{ActivationSink, TreeProvider, UiEvent, UiNode};
use super::selector::select;
use super::types::CheckOutcome;
use crate::config::WatchConfig;
use crate::error::WatchError;
use crate::journal::RecordJournal;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// The event carried no app identity or no source node.
    Unresolved,
    /// Host, launcher, platform or trusted system app.
    Ignored,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Dropped(DropReason),
    Checked { accepted: bool, counted: bool },
    Failed,
}

#[derive(Debug)]
pub struct Monitor {
    config: WatchConfig,
    last_app: Option<String>,
    /// Set when the foreground app changed since the last processed event,
    /// cleared once an acceptance has been counted for it.
    distinct: bool,
    outcome: CheckOutcome,
}

impl Monitor {
    pub fn new(config: WatchConfig) -> Self {
        Self {
            config,
            last_app: None,
            distinct: false,
            outcome: CheckOutcome::default(),
        }
    }

    /// Outcome of the most recent attempt.
    pub fn last_outcome(&self) -> &CheckOutcome {
        &self.outcome
    }

    pub fn on_event<N, S>(
        &mut self,
        event: UiEvent<N>,
        sink: &mut S,
        journal: &mut RecordJournal,
    ) -> Disposition
    where
        N: UiNode,
        S: ActivationSink<N> + ?Sized,
    {
        let (Some(app), Some(source)) = (event.app, event.source) else {
            return Disposition::Dropped(DropReason::Unresolved);
        };

        if self.last_app.as_deref() != Some(app.as_str()) {
            self.distinct = true;
            self.last_app = Some(app.clone());
        }

        if self.config.is_ignored_app(&app) {
            debug!(app, "ignoring event from filtered app");
            return Disposition::Dropped(DropReason::Ignored);
        }

        self.outcome.reset(&app);
        let label = self.config.skip_label.as_str();
        let outcome = &mut self.outcome;
        let result = guarded(|| select(&source, label, outcome, sink, true));
        drop(source);

        if let Err(err) = result {
            self.outcome.mark_internal_error();
            warn!(app, %err, "classification failed");
            journal.log(format!("check failed for {app}: {err}; {}", self.outcome));
            return Disposition::Failed;
        }

        let accepted = self.outcome.accepted;
        let mut counted = false;
        if accepted && self.distinct {
            let total = journal.record(&self.outcome);
            self.distinct = false;
            counted = true;
            info!(app, total, activation = ?self.outcome.activation, "skip control accepted");
        }

        if !self.outcome.is_target_missing() {
            journal.log_decision(&self.outcome);
        }

        Disposition::Checked { accepted, counted }
    }

    /// One-shot check of the focused window, outside the dedup logic.
    ///
    /// Always journals the outcome, including a missing or ambiguous target,
    /// and never touches the accepted total.
    pub fn check_now<P, S>(
        &self,
        provider: &mut P,
        sink: &mut S,
        journal: &mut RecordJournal,
    ) -> Result<CheckOutcome, WatchError>
    where
        P: TreeProvider,
        S: ActivationSink<P::Node> + ?Sized,
    {
        let root = provider
            .active_window_root()
            .ok_or(WatchError::ProviderUnavailable)?;
        let app = root.app_id().unwrap_or_default();

        let mut outcome = CheckOutcome::new(&app);
        let label = self.config.skip_label.as_str();
        let result = guarded(|| select(&root, label, &mut outcome, sink, true));
        drop(root);

        if let Err(err) = result {
            outcome.mark_internal_error();
            warn!(app, %err, "manual check failed");
            journal.log(format!("manual check failed for {app}: {err}"));
        }
        journal.log_decision(&outcome);
        Ok(outcome)
    }
}

/// Run one classification, turning a provider panic into an error.
fn guarded<F>(f: F) -> Result<(), ClassifyError>
where
    F: FnOnce() -> Result<(), ClassifyError>,
{
    panic::catch_unwind(AssertUnwindSafe(f))
        .unwrap_or_else(|payload| Err(ClassifyError::ProviderPanic(panic_message(&*payload))))
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::detector::snapshot::{
        RecordingSink, SnapshotElement, SnapshotNode, SnapshotProvider, SnapshotTree,
    };
    use crate::detector::node::PointerPhase;
    use crate::detector::types::{Axis, Bounds, Rejection, RejectionKind};
    use crate::journal::EntryKind;

    const PHONE: Bounds = Bounds::new(0, 0, 1080, 2400);

    fn skip_tree(app: &str) -> Arc<SnapshotTree> {
        let root = SnapshotElement::new(PHONE).child(
            SnapshotElement::new(Bounds::new(825, 170, 150, 60))
                .with_text("跳过")
                .clickable(),
        );
        Arc::new(SnapshotTree::new(app, PHONE, root))
    }

    fn plain_tree(app: &str) -> Arc<SnapshotTree> {
        let root = SnapshotElement::new(PHONE)
            .child(SnapshotElement::new(Bounds::new(0, 0, 1080, 200)).with_text("Home"));
        Arc::new(SnapshotTree::new(app, PHONE, root))
    }

    fn left_skip_tree(app: &str) -> Arc<SnapshotTree> {
        let root = SnapshotElement::new(PHONE).child(
            SnapshotElement::new(Bounds::from_edges(200, 1800, 400, 1900)).with_text("跳过"),
        );
        Arc::new(SnapshotTree::new(app, PHONE, root))
    }

    fn setup() -> (Monitor, RecordingSink, RecordJournal) {
        (
            Monitor::new(WatchConfig::default()),
            RecordingSink::new(),
            RecordJournal::default(),
        )
    }

    #[test]
    fn repeated_acceptance_from_same_app_counts_once() {
        let (mut monitor, mut sink, mut journal) = setup();
        let tree = skip_tree("com.video.app");

        let first = monitor.on_event(tree.event(), &mut sink, &mut journal);
        let second = monitor.on_event(tree.event(), &mut sink, &mut journal);

        assert_eq!(first, Disposition::Checked { accepted: true, counted: true });
        assert_eq!(second, Disposition::Checked { accepted: true, counted: false });
        assert_eq!(journal.accepted_total(), 1);
        // both attempts activated and were summarized
        assert_eq!(sink.activations().len(), 2);
        let kinds: Vec<_> = journal.entries().map(|e| e.kind).collect();
        assert_eq!(
            kinds,
            vec![EntryKind::Record, EntryKind::Decision, EntryKind::Decision]
        );
    }

    #[test]
    fn app_switch_rearms_counting() {
        let (mut monitor, mut sink, mut journal) = setup();
        let video = skip_tree("com.video.app");

        monitor.on_event(video.event(), &mut sink, &mut journal);
        monitor.on_event(plain_tree("com.android.launcher3").event(), &mut sink, &mut journal);
        let back = monitor.on_event(video.event(), &mut sink, &mut journal);

        assert_eq!(back, Disposition::Checked { accepted: true, counted: true });
        assert_eq!(journal.accepted_total(), 2);
    }

    #[test]
    fn switch_before_acceptance_still_counts_first_acceptance() {
        let (mut monitor, mut sink, mut journal) = setup();
        monitor.on_event(plain_tree("com.video.app").event(), &mut sink, &mut journal);
        monitor.on_event(skip_tree("com.video.app").event(), &mut sink, &mut journal);
        assert_eq!(journal.accepted_total(), 1);
    }

    #[test]
    fn unresolved_events_are_dropped_silently() {
        let (mut monitor, mut sink, mut journal) = setup();
        let tree = skip_tree("com.video.app");
        let no_app = UiEvent {
            app: None,
            source: Some(tree.root_node()),
        };
        let no_source: UiEvent<SnapshotNode> = UiEvent {
            app: Some("com.video.app".to_string()),
            source: None,
        };
        assert_eq!(
            monitor.on_event(no_app, &mut sink, &mut journal),
            Disposition::Dropped(DropReason::Unresolved)
        );
        assert_eq!(
            monitor.on_event(no_source, &mut sink, &mut journal),
            Disposition::Dropped(DropReason::Unresolved)
        );
        assert!(journal.is_empty());
    }

    #[test]
    fn filtered_apps_are_never_inspected() {
        let (mut monitor, mut sink, mut journal) = setup();
        for app in ["com.android.launcher3", "android", "com.android.systemui"] {
            assert_eq!(
                monitor.on_event(skip_tree(app).event(), &mut sink, &mut journal),
                Disposition::Dropped(DropReason::Ignored)
            );
        }
        assert!(sink.activations().is_empty());
        assert!(journal.is_empty());
    }

    #[test]
    fn missing_target_is_not_journaled() {
        let (mut monitor, mut sink, mut journal) = setup();
        let result = monitor.on_event(plain_tree("com.video.app").event(), &mut sink, &mut journal);
        assert_eq!(result, Disposition::Checked { accepted: false, counted: false });
        assert!(journal.is_empty());
    }

    #[test]
    fn ambiguous_target_is_not_journaled() {
        let (mut monitor, mut sink, mut journal) = setup();
        let root = SnapshotElement::new(PHONE)
            .child(
                SnapshotElement::new(Bounds::new(825, 170, 150, 60))
                    .with_text("跳过")
                    .clickable(),
            )
            .child(
                SnapshotElement::new(Bounds::new(825, 2200, 150, 60))
                    .with_text("跳过")
                    .clickable(),
            );
        let tree = Arc::new(SnapshotTree::new("com.video.app", PHONE, root));

        let result = monitor.on_event(tree.event(), &mut sink, &mut journal);
        assert_eq!(result, Disposition::Checked { accepted: false, counted: false });
        assert_eq!(
            monitor.last_outcome().rejection,
            Some(Rejection::on(RejectionKind::IllegalTarget, Axis::Transverse))
        );
        assert!(journal.is_empty());
        assert!(sink.activations().is_empty());
    }

    #[test]
    fn rejected_candidate_is_journaled_but_not_counted() {
        let (mut monitor, mut sink, mut journal) = setup();
        monitor.on_event(left_skip_tree("com.video.app").event(), &mut sink, &mut journal);

        assert_eq!(journal.accepted_total(), 0);
        assert_eq!(
            monitor.last_outcome().rejection,
            Some(Rejection::on(RejectionKind::IllegalLocation, Axis::Transverse))
        );
        let entry = journal.entries().next().expect("decision");
        assert_eq!(entry.kind, EntryKind::Decision);
        assert!(entry.text.contains("IllegalLocation|Transverse"));
    }

    #[test]
    fn missing_window_marks_internal_error_and_continues() {
        let (mut monitor, mut sink, mut journal) = setup();
        let mut broken = (*skip_tree("com.video.app")).clone();
        broken.window = None;
        let broken = Arc::new(broken);

        assert_eq!(
            monitor.on_event(broken.event(), &mut sink, &mut journal),
            Disposition::Failed
        );
        assert_eq!(
            monitor.last_outcome().rejection,
            Some(Rejection::plain(RejectionKind::InternalError))
        );
        assert!(journal
            .entries()
            .any(|e| e.kind == EntryKind::Log && e.text.contains("check failed")));

        let next = monitor.on_event(skip_tree("com.video.app").event(), &mut sink, &mut journal);
        assert_eq!(next, Disposition::Checked { accepted: true, counted: true });
    }

    struct PanickingNode;

    impl UiNode for PanickingNode {
        fn app_id(&self) -> Option<String> {
            None
        }
        fn text(&self) -> Option<String> {
            None
        }
        fn bounds_in_screen(&self) -> Bounds {
            Bounds::default()
        }
        fn window_bounds(&self) -> Option<Bounds> {
            None
        }
        fn is_visible_to_user(&self) -> bool {
            false
        }
        fn is_clickable(&self) -> bool {
            false
        }
        fn parent(&self) -> Option<Self> {
            None
        }
        fn find_by_text(&self, _label: &str) -> Vec<Self> {
            panic!("node recycled");
        }
    }

    struct NullSink;

    impl ActivationSink<PanickingNode> for NullSink {
        fn invoke(&mut self, _node: &PanickingNode) -> bool {
            false
        }
        fn pointer(&mut self, _phase: PointerPhase, _x: i32, _y: i32) -> bool {
            false
        }
    }

    #[test]
    fn provider_panic_is_contained() {
        let mut monitor = Monitor::new(WatchConfig::default());
        let mut journal = RecordJournal::default();
        let result = monitor.on_event(
            UiEvent::new("com.video.app", PanickingNode),
            &mut NullSink,
            &mut journal,
        );
        assert_eq!(result, Disposition::Failed);
        let entry = journal.entries().next().expect("log");
        assert!(entry.text.contains("node recycled"));
    }

    #[test]
    fn manual_check_logs_everything_and_counts_nothing() {
        let monitor = Monitor::new(WatchConfig::default());
        let mut journal = RecordJournal::default();
        let mut sink = RecordingSink::new();
        let mut provider = SnapshotProvider::new();

        provider.show(plain_tree("com.video.app"));
        let missing = monitor
            .check_now(&mut provider, &mut sink, &mut journal)
            .expect("check");
        assert!(missing.is_target_missing());

        provider.show(skip_tree("com.video.app"));
        let hit = monitor
            .check_now(&mut provider, &mut sink, &mut journal)
            .expect("check");
        assert!(hit.accepted);

        assert_eq!(journal.len(), 2);
        assert_eq!(journal.accepted_total(), 0);
        assert_eq!(sink.activations().len(), 1);
    }

    #[test]
    fn manual_check_without_window_reports_unavailable() {
        let monitor = Monitor::new(WatchConfig::default());
        let mut journal = RecordJournal::default();
        let result = monitor.check_now(
            &mut SnapshotProvider::new(),
            &mut RecordingSink::new(),
            &mut journal,
        );
        assert!(matches!(result, Err(WatchError::ProviderUnavailable)));
        assert!(journal.is_empty());
    }
}
