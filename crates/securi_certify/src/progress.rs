//! Progress reporting.

use crate::state::{StateTag, WorkflowState};
use uuid::Uuid;

/// One state change of an attempt
#[derive(Debug, Clone, Copy)]
pub struct Transition<'a> {
    /// Attempt identifier, shared by every transition of one attempt
    pub attempt: Uuid,
    /// State left
    pub from: StateTag,
    /// State entered
    pub to: &'a WorkflowState,
}

/// Receives every transition as it happens
pub trait ProgressListener: Send + Sync {
    /// Called after the workflow enters `transition.to`
    fn on_transition(&self, transition: &Transition<'_>);
}

impl<F> ProgressListener for F
where
    F: Fn(&Transition<'_>) + Send + Sync,
{
    fn on_transition(&self, transition: &Transition<'_>) {
        self(transition);
    }
}
