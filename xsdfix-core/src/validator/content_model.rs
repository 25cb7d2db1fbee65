//! Content-model conformance
//!
//! Expands a complex type's group into a flat list of child slots and
//! replays the observed child sequence against it at end-element time.
//! Ordering uses first-match-wins against the expected order; ties break
//! on the slot's declaration index.

use crate::schema::{Compositor, GroupMember, GroupNode, MaxOccurs, Schema};

/// One slot of the expanded content model
#[derive(Debug, Clone)]
pub(crate) struct ChildSpec {
    /// Accepted element names; more than one for choice slots
    pub names: Vec<String>,
    pub min: u32,
    pub max: MaxOccurs,
}

impl ChildSpec {
    fn accepts(&self, name: &str) -> bool {
        self.names.iter().any(|n| n == name)
    }
}

/// Expanded content model of one complex type
#[derive(Debug, Clone)]
pub(crate) struct ContentCheck {
    pub compositor: Compositor,
    pub specs: Vec<ChildSpec>,
    pub group_min: u32,
}

impl ContentCheck {
    /// Aggregate scaled occurrence bound for a child name across every
    /// slot that accepts it; `None` when no slot does
    pub(crate) fn max_for(&self, name: &str) -> Option<MaxOccurs> {
        let mut total: Option<MaxOccurs> = None;
        for spec in self.specs.iter().filter(|s| s.accepts(name)) {
            total = Some(match (total, spec.max) {
                (None, max) => max,
                (Some(MaxOccurs::Bounded(a)), MaxOccurs::Bounded(b)) => {
                    MaxOccurs::Bounded(a.saturating_add(b))
                }
                _ => MaxOccurs::Unbounded,
            });
        }
        total
    }
}

/// A slot that ended up under its minimum after replay
#[derive(Debug, Clone)]
pub(crate) struct Shortfall {
    pub names: Vec<String>,
    pub observed: u32,
    pub min: u32,
}

/// Result of replaying an observed child sequence
#[derive(Debug, Default)]
pub(crate) struct ReplayOutcome {
    pub shortfalls: Vec<Shortfall>,
    /// Child names that appeared after their slot had been passed
    pub order_violations: Vec<String>,
}

/// Expand a group into flat child slots
pub(crate) fn expand(schema: &Schema, group: &GroupNode) -> ContentCheck {
    let mut specs = Vec::new();
    match group.compositor {
        Compositor::Sequence => {
            expand_sequence(schema, group, group.min_occurs, group.max_occurs, &mut specs);
        }
        Compositor::Choice | Compositor::All => {
            // the group's own bounds wrap every member's quantification
            for member in &group.members {
                let mut slot = match member {
                    GroupMember::Element(r) => {
                        let elem = schema.element(*r);
                        ChildSpec {
                            names: vec![elem.name.clone()],
                            min: elem.min_occurs,
                            max: elem.max_occurs,
                        }
                    }
                    GroupMember::Group(nested) => collapse_to_slot(schema, nested),
                };
                slot.min = if group.compositor == Compositor::All {
                    scale_min(slot.min, group.min_occurs)
                } else {
                    // choice members are individually optional
                    0
                };
                slot.max = scale_max(slot.max, group.max_occurs);
                specs.push(slot);
            }
        }
    }
    ContentCheck {
        compositor: group.compositor,
        specs,
        group_min: group.min_occurs,
    }
}

fn expand_sequence(
    schema: &Schema,
    group: &GroupNode,
    outer_min: u32,
    outer_max: MaxOccurs,
    specs: &mut Vec<ChildSpec>,
) {
    for member in &group.members {
        match member {
            GroupMember::Element(r) => {
                let elem = schema.element(*r);
                specs.push(ChildSpec {
                    names: vec![elem.name.clone()],
                    min: scale_min(elem.min_occurs, outer_min),
                    max: scale_max(elem.max_occurs, outer_max),
                });
            }
            GroupMember::Group(nested) => match nested.compositor {
                Compositor::Sequence => {
                    let min = scale_min(nested.min_occurs, outer_min);
                    let max = scale_max(nested.max_occurs, outer_max);
                    expand_sequence(schema, nested, min, max, specs);
                }
                // nested choice or all collapses to one unordered slot
                Compositor::Choice | Compositor::All => {
                    let mut slot = collapse_to_slot(schema, nested);
                    slot.min = scale_min(slot.min, outer_min);
                    slot.max = scale_max(slot.max, outer_max);
                    specs.push(slot);
                }
            },
        }
    }
}

/// Collapse a group to a single slot accepting any of its element names
fn collapse_to_slot(schema: &Schema, group: &GroupNode) -> ChildSpec {
    fn collect_names(schema: &Schema, group: &GroupNode, out: &mut Vec<String>) {
        for member in &group.members {
            match member {
                GroupMember::Element(r) => out.push(schema.element(*r).name.clone()),
                GroupMember::Group(nested) => collect_names(schema, nested, out),
            }
        }
    }
    let mut names = Vec::new();
    collect_names(schema, group, &mut names);
    let member_max = group
        .members
        .iter()
        .map(|m| match m {
            GroupMember::Element(r) => schema.element(*r).max_occurs,
            GroupMember::Group(_) => MaxOccurs::Unbounded,
        })
        .fold(MaxOccurs::Bounded(1), max_of);
    ChildSpec {
        names,
        min: group.min_occurs,
        max: scale_max(member_max, group.max_occurs),
    }
}

fn scale_min(member_min: u32, group_min: u32) -> u32 {
    if group_min == 0 {
        0
    } else {
        member_min.saturating_mul(group_min)
    }
}

fn scale_max(member_max: MaxOccurs, group_max: MaxOccurs) -> MaxOccurs {
    match (member_max, group_max) {
        (MaxOccurs::Bounded(a), MaxOccurs::Bounded(b)) => {
            MaxOccurs::Bounded(a.saturating_mul(b.max(1)))
        }
        _ => MaxOccurs::Unbounded,
    }
}

fn max_of(a: MaxOccurs, b: MaxOccurs) -> MaxOccurs {
    match (a, b) {
        (MaxOccurs::Bounded(x), MaxOccurs::Bounded(y)) => MaxOccurs::Bounded(x.max(y)),
        _ => MaxOccurs::Unbounded,
    }
}

/// Replay the observed child names against the expanded model
pub(crate) fn replay(check: &ContentCheck, observed: &[String]) -> ReplayOutcome {
    match check.compositor {
        Compositor::Sequence => replay_sequence(check, observed),
        Compositor::Choice => replay_choice(check, observed),
        Compositor::All => replay_all(check, observed),
    }
}

fn replay_sequence(check: &ContentCheck, observed: &[String]) -> ReplayOutcome {
    let specs = &check.specs;
    let mut counts = vec![0u32; specs.len()];
    let mut pos = 0usize;
    let mut outcome = ReplayOutcome::default();

    for name in observed {
        // stay in the current slot while it still accepts
        if pos < specs.len()
            && specs[pos].accepts(name)
            && specs[pos].max.admits(counts[pos] + 1)
        {
            counts[pos] += 1;
            continue;
        }
        // first-match-wins scan forward
        if let Some(j) = (pos + 1..specs.len()).find(|&j| specs[j].accepts(name)) {
            pos = j;
            counts[j] += 1;
            continue;
        }
        // a slot we already passed: out of order
        if let Some(j) = (0..pos.min(specs.len())).find(|&j| specs[j].accepts(name)) {
            counts[j] += 1;
            outcome.order_violations.push(name.clone());
            continue;
        }
        // names unknown to the model were reported at start-element
    }

    for (spec, &count) in specs.iter().zip(&counts) {
        if count < spec.min {
            outcome.shortfalls.push(Shortfall {
                names: spec.names.clone(),
                observed: count,
                min: spec.min,
            });
        }
    }
    outcome
}

fn replay_choice(check: &ContentCheck, observed: &[String]) -> ReplayOutcome {
    let mut outcome = ReplayOutcome::default();
    let total = observed
        .iter()
        .filter(|name| check.specs.iter().any(|s| s.accepts(name)))
        .count() as u32;
    if total < check.group_min {
        let names = check
            .specs
            .iter()
            .flat_map(|s| s.names.iter().cloned())
            .collect();
        outcome.shortfalls.push(Shortfall {
            names,
            observed: total,
            min: check.group_min,
        });
    }
    outcome
}

fn replay_all(check: &ContentCheck, observed: &[String]) -> ReplayOutcome {
    let mut outcome = ReplayOutcome::default();
    for spec in &check.specs {
        let count = observed.iter().filter(|name| spec.accepts(name)).count() as u32;
        if count < spec.min {
            outcome.shortfalls.push(Shortfall {
                names: spec.names.clone(),
                observed: count,
                min: spec.min,
            });
        }
    }
    outcome
}
