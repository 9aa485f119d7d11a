use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorState {
    Idle,
    Running,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorAction {
    Start,
    Stop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum MonitorStateError {
    #[error("cannot {action:?} monitor while {from:?}")]
    InvalidTransition {
        from: MonitorState,
        action: MonitorAction,
    },
}

#[derive(Debug)]
pub struct MonitorStateMachine {
    state: MonitorState,
}

impl MonitorStateMachine {
    pub fn new() -> Self {
        Self {
            state: MonitorState::Idle,
        }
    }

    pub fn current(&self) -> MonitorState {
        self.state
    }

    fn transition(
        &mut self,
        from: MonitorState,
        to: MonitorState,
        action: MonitorAction,
    ) -> Result<(), MonitorStateError> {
        if self.state == from {
            self.state = to;
            Ok(())
        } else {
            Err(MonitorStateError::InvalidTransition {
                from: self.state,
                action,
            })
        }
    }

    pub fn start(&mut self) -> Result<(), MonitorStateError> {
        self.transition(MonitorState::Idle, MonitorState::Running, MonitorAction::Start)
    }

    pub fn stop(&mut self) -> Result<(), MonitorStateError> {
        self.transition(MonitorState::Running, MonitorState::Idle, MonitorAction::Stop)
    }

    /// Drop back to idle from any state.
    pub fn force_idle(&mut self) {
        self.state = MonitorState::Idle;
    }
}

impl Default for MonitorStateMachine {
    fn default() -> Self {
        Self::new()
    }
}
