//! Request state machine.
//!
//! `draft -> formed -> {completed, rejected}` plus `draft -> deleted`.
//! Terminal states have no outgoing transitions. Every `(status, action)` pair
//! outside the table is rejected with [`AppError::InvalidTransition`].

use crate::{entity::RequestStatus, error::AppError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestAction {
    /// Add, update or remove a line, or edit draft details.
    EditDraft,
    Form,
    Delete,
    Accept,
    Reject,
}

impl RequestAction {
    pub fn label(&self) -> &'static str {
        match self {
            RequestAction::EditDraft => "edit",
            RequestAction::Form => "form",
            RequestAction::Delete => "delete",
            RequestAction::Accept => "accept",
            RequestAction::Reject => "reject",
        }
    }
}

/// Status reached by applying `action` to a request in `current`.
pub fn next_status(current: RequestStatus, action: RequestAction) -> Result<RequestStatus, AppError> {
    use RequestAction as A;
    use RequestStatus as S;

    match (current, action) {
        (S::Draft, A::EditDraft) => Ok(S::Draft),
        (S::Draft, A::Form) => Ok(S::Formed),
        (S::Draft, A::Delete) => Ok(S::Deleted),
        (S::Formed, A::Accept) => Ok(S::Completed),
        (S::Formed, A::Reject) => Ok(S::Rejected),
        (status, action) => Err(AppError::InvalidTransition {
            status: status.label(),
            action: action.label(),
        }),
    }
}
