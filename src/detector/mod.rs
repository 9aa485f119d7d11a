//! Skip control detection: rules, classifier, target selection and the
//! monitor loop that drives them.

pub mod classifier;
pub mod monitor;
pub mod node;
pub mod rules;
pub mod selector;
pub mod snapshot;
pub mod state;
pub mod types;

pub use classifier::{classify, ClassifyError};
pub use monitor::{Disposition, DropReason, Monitor};
pub use node::{ActivationSink, PointerPhase, TreeProvider, UiEvent, UiNode};
pub use selector::select;
pub use state::{MonitorAction, MonitorState, MonitorStateError, MonitorStateMachine};
pub use types::{ActivationKind, Axis, Bounds, CheckOutcome, Rejection, RejectionKind};
