//! Schema resolution (pass B)
//!
//! Materializes the raw declaration tables into the flat element arena.
//! Type references are looked up by local name, `ref=` occurrences get
//! their own arena node so `minOccurs`/`maxOccurs` on the reference can
//! override the referent, and simple-type restriction chains collapse
//! into a base built-in plus a merged facet list.
//!
//! Reference cycles are broken with placeholder nodes: a global element
//! reserves its arena slot before its children are materialized, and any
//! occurrence that needs a still-in-progress referent is backfilled once
//! the referent is complete.

use std::collections::{HashMap, HashSet};

use tracing::{debug, warn};

use crate::error::{FixError, Result};
use crate::schema::builtins;
use crate::schema::parser::{
    RawAttribute, RawComplexType, RawElement, RawGroup, RawMember, RawSchema, RawSimpleType,
    RawSimpleVariant,
};
use crate::schema::{
    AttributeDecl, Compositor, Constraint, ContentModel, GroupMember, GroupNode, MaxOccurs, Schema,
    SchemaElement, SchemaRef, SchemaWarning, VIRTUAL_ROOT_NAME,
};

/// Maximum depth of simple-type base chains before giving up
const MAX_TYPE_DEPTH: usize = 16;

pub(super) fn resolve(raw: RawSchema) -> Result<Schema> {
    Resolver::new(raw).run()
}

struct Resolver {
    raw: RawSchema,
    /// Global element name -> index into `raw.elements`
    raw_globals: HashMap<String, usize>,
    arena: Vec<SchemaElement>,
    /// Finished or in-progress global materializations
    memo: HashMap<String, SchemaRef>,
    in_progress: HashSet<String>,
    /// Occurrence nodes waiting for a cyclic referent to finish
    fixups: Vec<(SchemaRef, String)>,
    warnings: Vec<SchemaWarning>,
}

impl Resolver {
    fn new(raw: RawSchema) -> Self {
        let raw_globals = raw
            .elements
            .iter()
            .enumerate()
            .filter_map(|(i, e)| e.name.clone().map(|n| (n, i)))
            .collect();
        Self {
            raw,
            raw_globals,
            arena: Vec::new(),
            memo: HashMap::new(),
            in_progress: HashSet::new(),
            fixups: Vec::new(),
            warnings: Vec::new(),
        }
    }

    fn run(mut self) -> Result<Schema> {
        let global_names: Vec<String> = self
            .raw
            .elements
            .iter()
            .filter_map(|e| e.name.clone())
            .collect();

        let mut globals = HashMap::new();
        for name in &global_names {
            let r = self.materialize_global(name)?;
            globals.insert(name.clone(), r);
        }
        self.apply_fixups();

        let root = self.select_root(&global_names, &globals);
        self.check_consistency();

        debug!(
            elements = self.arena.len(),
            globals = globals.len(),
            warnings = self.warnings.len(),
            "schema resolved"
        );

        let target_namespace = self.raw.target_namespace.clone();
        Ok(Schema::new(
            self.arena,
            root,
            globals,
            target_namespace,
            self.warnings,
        ))
    }

    /// Prefer the first global element not referenced by any declaration;
    /// synthesize a virtual root otherwise.
    fn select_root(
        &mut self,
        global_names: &[String],
        globals: &HashMap<String, SchemaRef>,
    ) -> SchemaRef {
        let referenced = self.collect_references();
        let unreferenced = global_names
            .iter()
            .find(|n| !referenced.contains(builtins::local_name(n)));

        if let Some(name) = unreferenced {
            return globals[name];
        }

        let children: Vec<SchemaRef> = global_names.iter().map(|n| globals[n]).collect();
        let mut root = SchemaElement::named(VIRTUAL_ROOT_NAME);
        root.type_name = "complexType".to_string();
        root.content = ContentModel::Complex(GroupNode {
            compositor: Compositor::Sequence,
            min_occurs: 1,
            max_occurs: MaxOccurs::Bounded(1),
            members: children.iter().copied().map(GroupMember::Element).collect(),
        });
        root.children = children;
        self.arena.push(root);
        SchemaRef(self.arena.len() as u32 - 1)
    }

    /// Every element name mentioned by a `ref=` anywhere in the schema
    fn collect_references(&self) -> HashSet<String> {
        fn walk_group(group: &RawGroup, out: &mut HashSet<String>) {
            for member in &group.members {
                match member {
                    RawMember::Element(e) => walk_element(e, out),
                    RawMember::Group(g) => walk_group(g, out),
                }
            }
        }
        fn walk_complex(ct: &RawComplexType, out: &mut HashSet<String>) {
            if let Some(group) = &ct.group {
                walk_group(group, out);
            }
        }
        fn walk_element(e: &RawElement, out: &mut HashSet<String>) {
            if let Some(r) = &e.ref_name {
                out.insert(builtins::local_name(r).to_string());
            }
            if let Some(ct) = &e.inline_complex {
                walk_complex(ct, out);
            }
        }

        let mut out = HashSet::new();
        for e in &self.raw.elements {
            walk_element(e, &mut out);
        }
        for ct in self.raw.complex_types.values() {
            walk_complex(ct, &mut out);
        }
        out
    }

    fn alloc(&mut self, name: &str) -> SchemaRef {
        self.arena.push(SchemaElement::named(name));
        SchemaRef(self.arena.len() as u32 - 1)
    }

    /// Materialize a named global element exactly once
    fn materialize_global(&mut self, name: &str) -> Result<SchemaRef> {
        let local = builtins::local_name(name).to_string();
        if let Some(&r) = self.memo.get(&local) {
            return Ok(r);
        }
        let raw_index =
            *self
                .raw_globals
                .get(&local)
                .ok_or_else(|| FixError::UnresolvedReference {
                    name: local.clone(),
                })?;

        let r = self.alloc(&local);
        self.memo.insert(local.clone(), r);
        self.in_progress.insert(local.clone());

        let raw_elem = self.raw.elements[raw_index].clone();
        self.build_element_into(r, &raw_elem)?;

        self.in_progress.remove(&local);
        debug!(element = %local, "global element materialized");
        Ok(r)
    }

    /// Materialize one occurrence of a group member element
    fn materialize_member(&mut self, raw_elem: &RawElement) -> Result<SchemaRef> {
        if let Some(ref_name) = &raw_elem.ref_name {
            let local = builtins::local_name(ref_name).to_string();
            if self.in_progress.contains(&local) {
                // cyclic reference: thin occurrence node, backfilled later
                let r = self.alloc(&local);
                self.arena[r.index()].min_occurs = raw_elem.min_occurs;
                self.arena[r.index()].max_occurs = raw_elem.max_occurs;
                self.fixups.push((r, local));
                return Ok(r);
            }
            let global = self.materialize_global(&local)?;
            // min/max on the reference override the referent for this occurrence
            let mut node = self.arena[global.index()].clone();
            node.min_occurs = raw_elem.min_occurs;
            node.max_occurs = raw_elem.max_occurs;
            self.arena.push(node);
            return Ok(SchemaRef(self.arena.len() as u32 - 1));
        }

        let name = raw_elem.name.clone().unwrap_or_default();
        let r = self.alloc(&name);
        self.build_element_into(r, raw_elem)?;
        Ok(r)
    }

    /// Copy everything except the occurrence bounds from finished referents
    fn apply_fixups(&mut self) {
        for (r, name) in std::mem::take(&mut self.fixups) {
            if let Some(&global) = self.memo.get(&name) {
                let source = self.arena[global.index()].clone();
                let node = &mut self.arena[r.index()];
                node.type_name = source.type_name;
                node.default_value = source.default_value;
                node.fixed_value = source.fixed_value;
                node.constraints = source.constraints;
                node.attributes = source.attributes;
                node.content = source.content;
                node.children = source.children;
            }
        }
    }

    /// Fill an allocated arena node from a raw element declaration
    fn build_element_into(&mut self, target: SchemaRef, raw_elem: &RawElement) -> Result<()> {
        let mut node = SchemaElement::named(raw_elem.name.clone().unwrap_or_default());
        node.min_occurs = raw_elem.min_occurs;
        node.max_occurs = raw_elem.max_occurs;
        node.default_value = raw_elem.default.clone();
        node.fixed_value = raw_elem.fixed.clone();
        // fixed implies required
        if node.fixed_value.is_some() && node.min_occurs == 0 {
            node.min_occurs = 1;
        }

        if let Some(type_name) = &raw_elem.type_name {
            self.apply_named_type(&mut node, type_name)?;
        } else if let Some(inline) = &raw_elem.inline_complex {
            node.type_name = "complexType".to_string();
            self.apply_complex_type(&mut node, &inline.clone())?;
        } else if let Some(inline) = &raw_elem.inline_simple {
            let (base, constraints) = self.resolve_simple_variant(&inline.variant, 0);
            node.type_name = base.clone();
            node.content = ContentModel::Simple(base);
            node.constraints = constraints;
        } else {
            // untyped element: unconstrained text content
            node.type_name = "string".to_string();
            node.content = ContentModel::Simple("string".to_string());
        }

        self.arena[target.index()] = node;
        Ok(())
    }

    /// Resolve a `type="qname"` reference on an element
    fn apply_named_type(&mut self, node: &mut SchemaElement, type_name: &str) -> Result<()> {
        let local = builtins::local_name(type_name).to_string();

        if builtins::is_builtin(&local) {
            node.type_name = local.clone();
            node.content = ContentModel::Simple(local);
            return Ok(());
        }

        if let Some(st) = self.raw.simple_types.get(&local).cloned() {
            let (base, constraints) = self.resolve_simple_type(&st, 0);
            node.type_name = local;
            node.content = ContentModel::Simple(base);
            node.constraints = constraints;
            return Ok(());
        }

        if let Some(ct) = self.raw.complex_types.get(&local).cloned() {
            node.type_name = local;
            self.apply_complex_type(node, &ct)?;
            return Ok(());
        }

        warn!(type_name = %local, element = %node.name, "unresolved type reference, treating as string");
        self.warnings.push(SchemaWarning {
            element: node.name.clone(),
            message: format!("unresolved type reference '{}'", local),
        });
        node.type_name = "string".to_string();
        node.content = ContentModel::Simple("string".to_string());
        Ok(())
    }

    /// Build content model and attributes from a complex type definition
    fn apply_complex_type(&mut self, node: &mut SchemaElement, ct: &RawComplexType) -> Result<()> {
        for raw_at in &ct.attributes {
            if let Some(decl) = self.resolve_attribute(raw_at) {
                node.attributes.push(decl);
            }
        }

        match &ct.group {
            Some(raw_group) => {
                let group = self.build_group(raw_group)?;
                let mut children = Vec::new();
                collect_group_elements(&group, &mut children);
                // first declaration wins for same-named children
                let mut seen = HashSet::new();
                children.retain(|&r| seen.insert(self.arena[r.index()].name.clone()));
                node.children = children;
                node.content = ContentModel::Complex(group);
            }
            None => {
                node.content = ContentModel::Empty;
            }
        }
        Ok(())
    }

    fn build_group(&mut self, raw_group: &RawGroup) -> Result<GroupNode> {
        let mut group = GroupNode {
            compositor: raw_group.compositor,
            min_occurs: raw_group.min_occurs,
            max_occurs: raw_group.max_occurs,
            members: Vec::new(),
        };
        for member in &raw_group.members {
            match member {
                RawMember::Element(raw_elem) => {
                    let r = self.materialize_member(raw_elem)?;
                    group.members.push(GroupMember::Element(r));
                }
                RawMember::Group(nested) => {
                    let nested = self.build_group(nested)?;
                    group.members.push(GroupMember::Group(nested));
                }
            }
        }
        Ok(group)
    }

    /// Resolve an attribute declaration, following global `ref=` lookups
    fn resolve_attribute(&mut self, raw_at: &RawAttribute) -> Option<AttributeDecl> {
        let resolved;
        let raw_at = if let Some(ref_name) = &raw_at.ref_name {
            let local = builtins::local_name(ref_name).to_string();
            match self.raw.attributes.get(&local) {
                Some(global) => {
                    resolved = global.clone();
                    &resolved
                }
                None => {
                    self.warnings.push(SchemaWarning {
                        element: local.clone(),
                        message: format!("unresolved attribute reference '{}'", local),
                    });
                    return None;
                }
            }
        } else {
            raw_at
        };

        let name = raw_at.name.clone()?;
        let (type_name, constraints) = match (&raw_at.type_name, &raw_at.inline_simple) {
            (Some(t), _) => {
                let local = builtins::local_name(t).to_string();
                if builtins::is_builtin(&local) {
                    (local, Vec::new())
                } else if let Some(st) = self.raw.simple_types.get(&local).cloned() {
                    self.resolve_simple_type(&st, 0)
                } else {
                    ("string".to_string(), Vec::new())
                }
            }
            (None, Some(st)) => self.resolve_simple_type(&st.clone(), 0),
            (None, None) => ("string".to_string(), Vec::new()),
        };

        Some(AttributeDecl {
            name,
            type_name,
            usage: raw_at.usage,
            default: raw_at.default.clone(),
            fixed: raw_at.fixed.clone(),
            constraints,
        })
    }

    /// Collapse a simple type into (base built-in, merged facets)
    fn resolve_simple_type(&mut self, st: &RawSimpleType, depth: usize) -> (String, Vec<Constraint>) {
        self.resolve_simple_variant(&st.variant, depth)
    }

    fn resolve_simple_variant(
        &mut self,
        variant: &RawSimpleVariant,
        depth: usize,
    ) -> (String, Vec<Constraint>) {
        if depth > MAX_TYPE_DEPTH {
            self.warnings.push(SchemaWarning {
                element: String::new(),
                message: "simple type base chain too deep, treating as string".to_string(),
            });
            return ("string".to_string(), Vec::new());
        }

        match variant {
            RawSimpleVariant::Restriction {
                base,
                facets,
                enumerations,
            } => {
                let mut constraints = Vec::new();
                let base_local = builtins::local_name(base).to_string();
                let resolved_base = if builtins::is_builtin(&base_local) {
                    base_local
                } else if let Some(parent) = self.raw.simple_types.get(&base_local).cloned() {
                    let (deep_base, parent_constraints) =
                        self.resolve_simple_type(&parent, depth + 1);
                    constraints.extend(parent_constraints);
                    deep_base
                } else {
                    "string".to_string()
                };
                constraints.extend(facets.iter().cloned());
                if !enumerations.is_empty() {
                    constraints.push(Constraint::Enumeration(enumerations.clone()));
                }
                (resolved_base, constraints)
            }
            RawSimpleVariant::Union { member_types } => {
                // approximate: a union admits its member type names
                let members = member_types
                    .iter()
                    .map(|t| builtins::local_name(t).to_string())
                    .collect();
                ("string".to_string(), vec![Constraint::Enumeration(members)])
            }
            RawSimpleVariant::List { item_type: _ } => {
                // item types are not validated; accept any whitespace list
                ("string".to_string(), vec![Constraint::Pattern(".*".to_string())])
            }
        }
    }

    /// Verify the facet invariants; violations warn but never fail
    fn check_consistency(&mut self) {
        let mut warnings = Vec::new();
        for element in &self.arena {
            check_element_facets(element, &mut warnings);
        }
        for w in &warnings {
            warn!(element = %w.element, message = %w.message, "schema consistency warning");
        }
        self.warnings.extend(warnings);
    }
}

fn collect_group_elements(group: &GroupNode, out: &mut Vec<SchemaRef>) {
    for member in &group.members {
        match member {
            GroupMember::Element(r) => out.push(*r),
            GroupMember::Group(nested) => collect_group_elements(nested, out),
        }
    }
}

fn check_element_facets(element: &SchemaElement, warnings: &mut Vec<SchemaWarning>) {
    let mut push = |message: String| {
        warnings.push(SchemaWarning {
            element: element.name.clone(),
            message,
        });
    };

    if let MaxOccurs::Bounded(max) = element.max_occurs {
        if element.min_occurs > max {
            push(format!(
                "minOccurs {} exceeds maxOccurs {}",
                element.min_occurs, max
            ));
        }
    }

    let numeric = |c: &Constraint| -> Option<f64> {
        match c {
            Constraint::MinInclusive(v)
            | Constraint::MaxInclusive(v)
            | Constraint::MinExclusive(v)
            | Constraint::MaxExclusive(v) => v.parse().ok(),
            _ => None,
        }
    };
    let find = |kind: fn(&Constraint) -> bool| element.constraints.iter().find(|c| kind(c));

    let min_len = find(|c| matches!(c, Constraint::MinLength(_)));
    let max_len = find(|c| matches!(c, Constraint::MaxLength(_)));
    if let (Some(Constraint::MinLength(lo)), Some(Constraint::MaxLength(hi))) = (min_len, max_len) {
        if lo > hi {
            push(format!("minLength {} exceeds maxLength {}", lo, hi));
        }
    }

    let min_inc = find(|c| matches!(c, Constraint::MinInclusive(_))).and_then(numeric);
    let max_inc = find(|c| matches!(c, Constraint::MaxInclusive(_))).and_then(numeric);
    let min_exc = find(|c| matches!(c, Constraint::MinExclusive(_))).and_then(numeric);
    let max_exc = find(|c| matches!(c, Constraint::MaxExclusive(_))).and_then(numeric);

    if let (Some(lo), Some(hi)) = (min_inc, max_inc) {
        if lo > hi {
            push(format!("minInclusive {} exceeds maxInclusive {}", lo, hi));
        }
    }
    if let (Some(lo), Some(hi)) = (min_exc, max_exc) {
        if lo >= hi {
            push(format!(
                "minExclusive {} not below maxExclusive {}",
                lo, hi
            ));
        }
    }
    if let (Some(lo), Some(hi)) = (min_inc, max_exc) {
        if lo >= hi {
            push(format!(
                "minInclusive {} not below maxExclusive {}",
                lo, hi
            ));
        }
    }
    if let (Some(lo), Some(hi)) = (min_exc, max_inc) {
        if lo >= hi {
            push(format!(
                "minExclusive {} not below maxInclusive {}",
                lo, hi
            ));
        }
    }

    for c in &element.constraints {
        if let Constraint::Enumeration(values) = c {
            if values.is_empty() {
                push("empty enumeration".to_string());
            }
        }
    }
}
