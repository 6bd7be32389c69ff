// crates/engine/src/domain/session.rs
use std::sync::Arc;

use serde::Serialize;

use super::error::{EngineError, EngineResult};

/// Which workflow a session runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Capture,
    Verify,
}

impl Flow {
    pub fn stages(self) -> &'static [Stage] {
        match self {
            Flow::Capture => &[Stage::Canonicalize, Stage::Hash, Stage::Sign],
            Flow::Verify => &[Stage::Canonicalize, Stage::Hash, Stage::Verify],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Stage {
    Canonicalize,
    Hash,
    Sign,
    Verify,
}

impl Stage {
    pub fn label(self) -> &'static str {
        match self {
            Stage::Canonicalize => "Canonicalizing media",
            Stage::Hash => "Computing fingerprint",
            Stage::Sign => "Signing fingerprint",
            Stage::Verify => "Verifying signature",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StageStatus {
    Pending,
    Processing,
    Complete,
    Failed,
}

/// Emitted to the UI layer whenever a stage changes status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressEvent {
    pub stage_index: usize,
    pub stage_label: &'static str,
    pub status: StageStatus,
}

/// Receiver of progress events. Implemented by UI bridges (and test recorders).
pub trait ProgressListener: Send + Sync {
    fn on_progress(&self, event: ProgressEvent);
}

/// `Idle -> Processing -> {Success | Result}`; any failure returns to `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Processing(Stage),
    /// Capture finished with a record.
    Success,
    /// Verification finished with a verdict.
    Result,
}

/// Messages pipeline stages send to the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    Begin,
    StageComplete,
    Fail,
    Reset,
}

/// Finite-state tracker owned by an orchestrator. Stages run strictly in order
/// and are never resumed: a failure aborts the whole run.
pub struct SessionMachine {
    flow: Flow,
    state: SessionState,
    statuses: Vec<StageStatus>,
    cursor: usize,
    listener: Option<Arc<dyn ProgressListener>>,
}

impl SessionMachine {
    pub fn new(flow: Flow, listener: Option<Arc<dyn ProgressListener>>) -> Self {
        Self {
            flow,
            state: SessionState::Idle,
            statuses: vec![StageStatus::Pending; flow.stages().len()],
            cursor: 0,
            listener,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn statuses(&self) -> &[StageStatus] {
        &self.statuses
    }

    pub fn apply(&mut self, event: SessionEvent) -> EngineResult<()> {
        match (self.state, event) {
            (SessionState::Idle, SessionEvent::Begin) => {
                self.statuses.fill(StageStatus::Pending);
                self.cursor = 0;
                self.enter(0);
                Ok(())
            }
            (SessionState::Processing(_), SessionEvent::StageComplete) => {
                self.set_status(self.cursor, StageStatus::Complete);
                let next = self.cursor + 1;
                if next < self.statuses.len() {
                    self.enter(next);
                } else {
                    self.state = match self.flow {
                        Flow::Capture => SessionState::Success,
                        Flow::Verify => SessionState::Result,
                    };
                }
                Ok(())
            }
            (SessionState::Processing(_), SessionEvent::Fail) => {
                self.set_status(self.cursor, StageStatus::Failed);
                self.state = SessionState::Idle;
                Ok(())
            }
            (SessionState::Success | SessionState::Result, SessionEvent::Reset) => {
                self.state = SessionState::Idle;
                Ok(())
            }
            (state, event) => Err(EngineError::Config(format!(
                "invalid session transition: {event:?} in {state:?}"
            ))),
        }
    }

    fn enter(&mut self, index: usize) {
        self.cursor = index;
        self.state = SessionState::Processing(self.flow.stages()[index]);
        self.set_status(index, StageStatus::Processing);
    }

    fn set_status(&mut self, index: usize, status: StageStatus) {
        self.statuses[index] = status;
        if let Some(listener) = &self.listener {
            let stage = self.flow.stages()[index];
            listener.on_progress(ProgressEvent {
                stage_index: index,
                stage_label: stage.label(),
                status,
            });
        }
    }
}
