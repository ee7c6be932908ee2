// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Workflow / run filter applied before output.

use crate::message::ReplicationMessage;

/// Conjunctive filter on workflow id and run id.
///
/// An unset criterion matches everything. A set criterion requires
/// equality. A history task without history-v2 attributes carries no ids,
/// so it only passes a filter with no criteria at all.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageFilter {
    workflow_id: Option<String>,
    run_id: Option<String>,
}

impl MessageFilter {
    /// Build a filter. Empty strings count as unset.
    pub fn new(workflow_id: Option<String>, run_id: Option<String>) -> Self {
        Self {
            workflow_id: workflow_id.filter(|s| !s.is_empty()),
            run_id: run_id.filter(|s| !s.is_empty()),
        }
    }

    /// A filter that accepts every message.
    pub fn accept_all() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.workflow_id.is_none() && self.run_id.is_none()
    }

    pub fn matches(&self, message: &ReplicationMessage) -> bool {
        if self.is_empty() {
            return true;
        }
        criterion_matches(self.workflow_id.as_deref(), message.workflow_id())
            && criterion_matches(self.run_id.as_deref(), message.run_id())
    }
}

fn criterion_matches(wanted: Option<&str>, actual: Option<&str>) -> bool {
    match wanted {
        None => true,
        Some(wanted) => actual == Some(wanted),
    }
}
