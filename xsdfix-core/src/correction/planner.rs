//! Correction planner
//!
//! Translates the validator's error list into an ordered, conflict-free
//! plan. Ordering rules matter for correctness: non-add edits run
//! deepest-first so removals never invalidate shallower sibling indexes,
//! while additions run ancestors-first so parents exist before their
//! children are created.

use std::collections::HashSet;

use tracing::debug;

use crate::correction::strategies::{PlanContext, STRATEGIES};
use crate::correction::{ActionType, CorrectionAction, CorrectionGroup, CorrectionPlan};
use crate::errors::{PriorityClass, Severity, ValidationError};
use crate::schema::Schema;
use crate::tree::Document;

/// Maps validation errors to an executable correction plan
pub struct Planner<'a> {
    schema: &'a Schema,
}

impl<'a> Planner<'a> {
    pub fn new(schema: &'a Schema) -> Self {
        Self { schema }
    }

    pub fn plan(&self, errors: &[ValidationError], doc: &Document) -> CorrectionPlan {
        let ctx = PlanContext {
            schema: self.schema,
            doc,
        };

        // step 1: translate
        let mut actions: Vec<CorrectionAction> = Vec::new();
        for error in errors.iter().filter(|e| e.severity == Severity::Error) {
            for strategy in STRATEGIES {
                if strategy.can_correct(error.kind) {
                    actions.extend(strategy.plan(error, &ctx));
                }
            }
        }

        // steps 2-3: prioritize and order; stable sort keeps translation
        // order on ties and clusters same-parent actions together
        actions.sort_by(|a, b| ordering_key(a).cmp(&ordering_key(b)));

        // step 4: conflict resolution
        resolve_conflicts(&mut actions);

        // step 5: partition into priority groups
        let mut groups: Vec<CorrectionGroup> = Vec::new();
        for class in [
            PriorityClass::Critical,
            PriorityClass::Structural,
            PriorityClass::DataQuality,
            PriorityClass::Optional,
        ] {
            let members: Vec<CorrectionAction> = actions
                .iter()
                .filter(|a| a.priority_class() == class)
                .cloned()
                .collect();
            if !members.is_empty() {
                groups.push(CorrectionGroup {
                    class,
                    actions: members,
                });
            }
        }

        let plan = CorrectionPlan { groups };
        debug!(actions = plan.action_count(), "correction plan built");
        plan
    }
}

/// (class priority, depth ordering, parent path, sibling ordering) sort key
///
/// Deepest-first for non-add actions; ancestors-first for additions.
/// Among same-depth siblings, destructive edits run on the highest index
/// first so earlier removals never shift a pending target.
fn ordering_key(action: &CorrectionAction) -> (u8, i64, String, i64) {
    let priority = action.related_error_kind.priority();
    let depth = action.depth() as i64;
    let (depth_key, sibling_key) = if action.action_type == ActionType::AddElement {
        (depth, 0)
    } else {
        (i64::MAX - depth, i64::MAX - sibling_index(&action.path))
    };
    (priority, depth_key, action.parent_path(), sibling_key)
}

/// Trailing `[n]` of a canonical path, 1 when elided
fn sibling_index(path: &str) -> i64 {
    path.rsplit('/')
        .next()
        .and_then(|seg| seg.split_once('['))
        .and_then(|(_, rest)| rest.strip_suffix(']'))
        .and_then(|n| n.parse().ok())
        .unwrap_or(1)
}

fn resolve_conflicts(actions: &mut [CorrectionAction]) {
    // AddElement beats RemoveElement on the same path
    let add_paths: HashSet<String> = actions
        .iter()
        .filter(|a| a.action_type == ActionType::AddElement)
        .map(|a| a.path.clone())
        .collect();
    for action in actions.iter_mut() {
        if action.action_type == ActionType::RemoveElement && add_paths.contains(&action.path) {
            action.supersede();
        }
    }

    // only the first modification of a text node survives
    let mut seen_text: HashSet<String> = HashSet::new();
    for action in actions.iter_mut() {
        if action.action_type == ActionType::ChangeTextContent
            && action.failure_reason.is_none()
            && !seen_text.insert(action.path.clone())
        {
            action.supersede();
        }
    }

    // likewise per attribute
    let mut seen_attrs: HashSet<(String, String)> = HashSet::new();
    for action in actions.iter_mut() {
        if action.action_type == ActionType::ModifyAttribute && action.failure_reason.is_none() {
            let key = (
                action.path.clone(),
                action.attribute_name.clone().unwrap_or_default(),
            );
            if !seen_attrs.insert(key) {
                action.supersede();
            }
        }
    }

    // one reorder per parent; it subsumes moves among that parent's children
    let mut seen_reorders: HashSet<String> = HashSet::new();
    for action in actions.iter_mut() {
        if action.action_type == ActionType::ReorderElements {
            if !seen_reorders.insert(action.path.clone()) {
                action.supersede();
            }
        }
    }
    for action in actions.iter_mut() {
        if action.action_type == ActionType::MoveElement
            && seen_reorders.contains(&action.parent_path())
        {
            action.supersede();
        }
    }
}
