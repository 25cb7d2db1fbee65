//! Correction executor
//!
//! Applies a plan to the document tree, group by group, action by
//! action. Individual action failures are recorded and never abort the
//! run; only loading or saving the document is fatal to the caller.

use std::time::Instant;

use serde::Serialize;
use tracing::{debug, warn};
use xmltree::{Element, XMLNode};

use crate::correction::strategies::{element_for_path, expected_child_order};
use crate::correction::{coerce, ActionType, CorrectionAction, CorrectionPlan};
use crate::schema::{ContentModel, Schema, SchemaRef};
use crate::tree::{element_children, Document, InsertPosition};
use crate::validator::ValidationResult;

/// Depth cap when generating default subtrees
const MAX_GENERATED_DEPTH: usize = 8;

/// Outcome of one repair run
#[derive(Debug, Serialize)]
pub struct CorrectionResult {
    pub success: bool,
    pub no_changes_required: bool,
    pub message: Option<String>,
    pub applied: Vec<CorrectionAction>,
    pub failed: Vec<CorrectionAction>,
    pub time_ms: u64,
    pub before_validation: ValidationResult,
    pub after_validation: Option<ValidationResult>,
}

impl CorrectionResult {
    pub fn applied_count(&self) -> usize {
        self.applied.len()
    }

    pub fn failed_count(&self) -> usize {
        self.failed.len()
    }

    /// Error-count reduction achieved by the run, when known
    pub fn improvement(&self) -> Option<i64> {
        self.after_validation
            .as_ref()
            .map(|after| self.before_validation.errors.len() as i64 - after.errors.len() as i64)
    }
}

/// Applies correction actions to a mutable document tree
pub struct Executor<'a> {
    schema: &'a Schema,
}

impl<'a> Executor<'a> {
    pub fn new(schema: &'a Schema) -> Self {
        Self { schema }
    }

    /// Apply every action in plan order; returns (applied, failed)
    pub fn execute(
        &self,
        doc: &mut Document,
        plan: CorrectionPlan,
    ) -> (Vec<CorrectionAction>, Vec<CorrectionAction>) {
        let started = Instant::now();
        let mut applied = Vec::new();
        let mut failed = Vec::new();

        for group in plan.groups {
            for mut action in group.actions {
                if action.failure_reason.is_some() {
                    failed.push(action);
                    continue;
                }
                match self.apply(doc, &action) {
                    Ok(()) => {
                        action.applied = true;
                        applied.push(action);
                    }
                    Err(reason) => {
                        warn!(
                            action = ?action.action_type,
                            path = %action.path,
                            %reason,
                            "correction action failed"
                        );
                        action.failure_reason = Some(reason);
                        failed.push(action);
                    }
                }
            }
        }

        debug!(
            applied = applied.len(),
            failed = failed.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "plan executed"
        );
        (applied, failed)
    }

    fn apply(&self, doc: &mut Document, action: &CorrectionAction) -> Result<(), String> {
        match action.action_type {
            ActionType::AddElement => self.add_element(doc, action),
            ActionType::RemoveElement => {
                if doc.remove(&action.path) {
                    Ok(())
                } else {
                    Err("target element not found".to_string())
                }
            }
            ActionType::MoveElement => {
                let dest = action
                    .new_value
                    .as_deref()
                    .ok_or("no destination path")?;
                if doc.move_element(&action.path, dest, InsertPosition::LastChild) {
                    Ok(())
                } else {
                    Err(format!("could not move element to '{}'", dest))
                }
            }
            ActionType::ModifyElement => {
                if doc.strip_whitespace_text(&action.path) {
                    Ok(())
                } else {
                    Err("target element not found".to_string())
                }
            }
            ActionType::AddAttribute | ActionType::ModifyAttribute => {
                let name = action.attribute_name.as_deref().ok_or("no attribute name")?;
                let value = action.new_value.as_deref().ok_or("no attribute value")?;
                if doc.set_attribute(&action.path, name, value) {
                    Ok(())
                } else {
                    Err("target element not found".to_string())
                }
            }
            ActionType::RemoveAttribute => {
                let name = action.attribute_name.as_deref().ok_or("no attribute name")?;
                if doc.remove_attribute(&action.path, name) {
                    Ok(())
                } else {
                    Err("attribute not present".to_string())
                }
            }
            ActionType::ChangeTextContent => {
                let value = action.new_value.as_deref().ok_or("no replacement value")?;
                if doc.set_text(&action.path, value) {
                    Ok(())
                } else {
                    Err("target element not found".to_string())
                }
            }
            ActionType::ReorderElements => {
                let order: Vec<String> = action
                    .new_value
                    .as_deref()
                    .ok_or("no expected order")?
                    .split(',')
                    .map(str::to_string)
                    .collect();
                if doc.reorder_children(&action.path, &order) {
                    Ok(())
                } else {
                    Err("target element not found".to_string())
                }
            }
            ActionType::FixNamespace => {
                if doc.strip_prefix(&action.path) {
                    Ok(())
                } else {
                    Err("target element not found".to_string())
                }
            }
        }
    }

    /// Insert a generated element at its schema-determined position
    fn add_element(&self, doc: &mut Document, action: &CorrectionAction) -> Result<(), String> {
        let parent_ref = element_for_path(self.schema, &action.path);
        let child_ref =
            parent_ref.and_then(|p| self.schema.find_child(p, &action.element_name));

        let new_elem = match child_ref {
            Some(c) => self.build_default_element(c, action.new_value.as_deref(), 0),
            None => {
                let mut elem = Element::new(&action.element_name);
                if let Some(value) = &action.new_value {
                    elem.children.push(XMLNode::Text(value.clone()));
                }
                elem
            }
        };

        let order = parent_ref
            .map(|p| expected_child_order(self.schema, p))
            .unwrap_or_default();
        let insert_at = {
            let parent = doc
                .find_element(&action.path)
                .ok_or("parent element not found")?;
            insertion_index(parent, &order, &action.element_name)
        };

        if doc.insert_child_at(&action.path, new_elem, insert_at) {
            Ok(())
        } else {
            Err("parent element not found".to_string())
        }
    }

    /// Generate an element with default content, recursing into required
    /// children of complex types
    fn build_default_element(
        &self,
        r: SchemaRef,
        text_override: Option<&str>,
        depth: usize,
    ) -> Element {
        let definition = self.schema.element(r);
        let mut elem = Element::new(&definition.name);

        for decl in &definition.attributes {
            if decl.usage == crate::schema::AttributeUse::Required {
                let value = decl
                    .effective_default()
                    .map(str::to_string)
                    .unwrap_or_else(|| {
                        crate::schema::builtins::default_for_type(&decl.type_name).to_string()
                    });
                elem.attributes.insert(decl.name.clone(), value);
            }
        }

        match &definition.content {
            ContentModel::Simple(_) => {
                let text = text_override
                    .map(str::to_string)
                    .unwrap_or_else(|| coerce::default_content(definition));
                if !text.is_empty() {
                    elem.children.push(XMLNode::Text(text));
                }
            }
            ContentModel::Complex(_) if depth < MAX_GENERATED_DEPTH => {
                for &child in &definition.children {
                    let child_def = self.schema.element(child);
                    for _ in 0..child_def.min_occurs {
                        elem.children
                            .push(XMLNode::Element(self.build_default_element(
                                child,
                                None,
                                depth + 1,
                            )));
                    }
                }
            }
            _ => {}
        }
        elem
    }
}

/// Element-child index to insert `name` at, per the declared order
fn insertion_index(parent: &Element, order: &[String], name: &str) -> usize {
    let target = order.iter().position(|n| n == name);
    let Some(target) = target else {
        return element_children(parent).count();
    };
    let mut index = 0;
    for child in element_children(parent) {
        match order.iter().position(|n| n == &child.name) {
            // stop at the first child declared after the new element
            Some(position) if position > target => break,
            _ => index += 1,
        }
    }
    index
}
