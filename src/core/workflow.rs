//! Status transition tables
//!
//! Each register's status enum carries its own static table of legal next
//! statuses. Staying in the current status is always allowed so that an
//! update which repeats the status is a no-op rather than an error.

use std::fmt::Display;
use std::str::FromStr;

use crate::core::error::{RegisterError, Result};

/// A status enum with a static transition table
pub trait WorkflowStatus: Copy + Eq + Display + FromStr<Err = String> + 'static {
    /// Every status, in display order
    const ALL: &'static [Self];

    /// Statuses reachable in one step from `self`
    fn allowed_transitions(self) -> &'static [Self];

    /// A status with no outgoing edges
    fn is_terminal(self) -> bool {
        self.allowed_transitions().is_empty()
    }

    /// Sheet labels of every status, for error messages and help text
    fn labels() -> Vec<String> {
        Self::ALL.iter().map(|s| s.to_string()).collect()
    }
}

/// Check if a status transition is valid
pub fn is_valid_transition<S: WorkflowStatus>(from: S, to: S) -> bool {
    from == to || from.allowed_transitions().contains(&to)
}

/// Fail with `InvalidTransition` naming the rejected pair
pub fn check_transition<S: WorkflowStatus>(from: S, to: S) -> Result<()> {
    if is_valid_transition(from, to) {
        Ok(())
    } else {
        Err(RegisterError::InvalidTransition {
            from: from.to_string(),
            to: to.to_string(),
        })
    }
}

/// Parse a requested status, mapping unknown labels to `InvalidValue`
pub fn parse_status<S: WorkflowStatus>(value: &str) -> Result<S> {
    value.parse().map_err(|_| {
        RegisterError::invalid(
            "status",
            format!(
                "'{}' is not one of: {}",
                value,
                S::labels().join(", ")
            ),
        )
    })
}
