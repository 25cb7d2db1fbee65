//! Correction engine
//!
//! - `planner` - translates validation errors into an ordered,
//!   conflict-free plan of tree edits
//! - `strategies` - the per-error-class translation rules
//! - `coerce` - rule-based value coercion for data-type repairs
//! - `executor` - applies the plan to the document tree and re-validates

mod coerce;
mod executor;
mod planner;
mod strategies;

pub use executor::{CorrectionResult, Executor};
pub use planner::Planner;

use serde::Serialize;

use crate::errors::{ErrorKind, PriorityClass};

/// Kind of tree edit a correction performs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ActionType {
    AddElement,
    RemoveElement,
    MoveElement,
    ModifyElement,
    AddAttribute,
    RemoveAttribute,
    ModifyAttribute,
    ChangeTextContent,
    ReorderElements,
    FixNamespace,
}

/// Unit of repair produced by the planner
#[derive(Debug, Clone, Serialize)]
pub struct CorrectionAction {
    pub action_type: ActionType,
    /// Canonical path of the target element
    pub path: String,
    pub element_name: String,
    pub attribute_name: Option<String>,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
    pub related_error_kind: ErrorKind,
    pub applied: bool,
    pub failure_reason: Option<String>,
}

impl CorrectionAction {
    pub fn new(
        action_type: ActionType,
        path: impl AsRef<str>,
        element_name: impl AsRef<str>,
        related_error_kind: ErrorKind,
    ) -> Self {
        Self {
            action_type,
            path: path.as_ref().to_string(),
            element_name: element_name.as_ref().to_string(),
            attribute_name: None,
            old_value: None,
            new_value: None,
            related_error_kind,
            applied: false,
            failure_reason: None,
        }
    }

    pub fn attribute(mut self, name: impl AsRef<str>) -> Self {
        self.attribute_name = Some(name.as_ref().to_string());
        self
    }

    pub fn old_value(mut self, value: impl AsRef<str>) -> Self {
        self.old_value = Some(value.as_ref().to_string());
        self
    }

    pub fn new_value(mut self, value: impl AsRef<str>) -> Self {
        self.new_value = Some(value.as_ref().to_string());
        self
    }

    /// Priority class inherited from the related error kind
    pub fn priority_class(&self) -> PriorityClass {
        self.related_error_kind.priority_class()
    }

    /// Depth of the target path, in steps
    pub fn depth(&self) -> usize {
        self.path.split('/').filter(|s| !s.is_empty()).count()
    }

    /// Parent path of the target, for locality grouping
    pub fn parent_path(&self) -> String {
        match self.path.rfind('/') {
            Some(0) | None => "/".to_string(),
            Some(i) => self.path[..i].to_string(),
        }
    }

    pub(crate) fn supersede(&mut self) {
        self.applied = false;
        self.failure_reason = Some("superseded".to_string());
    }
}

/// Priority-labeled bag of actions applied as a unit
#[derive(Debug, Clone, Serialize)]
pub struct CorrectionGroup {
    pub class: PriorityClass,
    pub actions: Vec<CorrectionAction>,
}

/// Ordered, conflict-free plan of tree edits
#[derive(Debug, Clone, Default, Serialize)]
pub struct CorrectionPlan {
    pub groups: Vec<CorrectionGroup>,
}

impl CorrectionPlan {
    pub fn is_empty(&self) -> bool {
        self.action_count() == 0
    }

    /// Number of live (not superseded) actions
    pub fn action_count(&self) -> usize {
        self.iter().filter(|a| a.failure_reason.is_none()).count()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CorrectionAction> {
        self.groups.iter().flat_map(|g| g.actions.iter())
    }
}
