//! Mutable document tree
//!
//! Wraps an xmltree document and exposes the edit primitives the
//! correction executor needs. Elements are addressed by canonical
//! `/name[n]` paths (1-based sibling index, `[1]` elided). Every
//! operation returns whether it succeeded and leaves the tree untouched
//! on failure.

use std::fs;
use std::io::Write;
use std::path::Path;

use xmltree::{Element, EmitterConfig, XMLNode};

use crate::error::{FixError, Result};

/// Where to place an inserted or moved element relative to a reference
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertPosition {
    Before,
    After,
    FirstChild,
    LastChild,
}

/// One step of a canonical path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathStep {
    pub name: String,
    /// 1-based index among same-named siblings
    pub index: usize,
}

/// Parse a canonical `/a/b[2]/c` path into steps
pub fn parse_path(path: &str) -> Option<Vec<PathStep>> {
    if !path.starts_with('/') {
        return None;
    }
    let mut steps = Vec::new();
    for segment in path.split('/').skip(1) {
        if segment.is_empty() {
            continue;
        }
        let step = match segment.split_once('[') {
            Some((name, rest)) => {
                let index: usize = rest.strip_suffix(']')?.parse().ok()?;
                if index == 0 || name.is_empty() {
                    return None;
                }
                PathStep {
                    name: name.to_string(),
                    index,
                }
            }
            None => PathStep {
                name: segment.to_string(),
                index: 1,
            },
        };
        steps.push(step);
    }
    Some(steps)
}

/// Parsed XML document with its surrounding prolog/epilog nodes
#[derive(Debug, Clone)]
pub struct Document {
    /// Comments and processing instructions before the root element
    pub prolog: Vec<XMLNode>,
    pub root: Element,
    /// Nodes after the root element
    pub epilog: Vec<XMLNode>,
}

impl Document {
    /// Parse a document from a string
    pub fn from_str(xml: &str) -> Result<Self> {
        let nodes = Element::parse_all(xml.as_bytes())?;
        let mut prolog = Vec::new();
        let mut root = None;
        let mut epilog = Vec::new();
        for node in nodes {
            match node {
                XMLNode::Element(e) if root.is_none() => root = Some(e),
                other => {
                    if root.is_none() {
                        prolog.push(other);
                    } else {
                        epilog.push(other);
                    }
                }
            }
        }
        let root = root.ok_or_else(|| {
            FixError::XmlParse("document contains no root element".to_string())
        })?;
        Ok(Self {
            prolog,
            root,
            epilog,
        })
    }

    /// Load a document from disk
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| FixError::FileRead {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_str(&content)
    }

    /// Serialize with an XML declaration and 2-space indentation
    pub fn write<W: Write>(&self, mut writer: W) -> Result<()> {
        let emit = |w: &mut W, s: &str| -> Result<()> {
            w.write_all(s.as_bytes())
                .map_err(|e| FixError::Serialize(e.to_string()))
        };
        emit(&mut writer, "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n")?;
        for node in &self.prolog {
            write_outer_node(&mut writer, node)?;
        }
        let config = EmitterConfig::new()
            .perform_indent(true)
            .indent_string("  ")
            .write_document_declaration(false);
        self.root
            .write_with_config(&mut writer, config)
            .map_err(|e| FixError::Serialize(e.to_string()))?;
        emit(&mut writer, "\n")?;
        for node in &self.epilog {
            write_outer_node(&mut writer, node)?;
        }
        Ok(())
    }

    /// Serialize into a string
    pub fn to_xml_string(&self) -> Result<String> {
        let mut out = Vec::new();
        self.write(&mut out)?;
        String::from_utf8(out).map_err(|e| FixError::Serialize(e.to_string()))
    }

    /// Write the document to a file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let mut out = Vec::new();
        self.write(&mut out)?;
        fs::write(path, out).map_err(|e| FixError::FileWrite {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Resolve a canonical path to the unique element it names
    pub fn find_element(&self, path: &str) -> Option<&Element> {
        let steps = parse_path(path)?;
        let mut steps = steps.iter();
        let first = steps.next()?;
        if first.name != self.root.name || first.index != 1 {
            return None;
        }
        let mut current = &self.root;
        for step in steps {
            current = nth_child(current, &step.name, step.index)?;
        }
        Some(current)
    }

    /// Mutable variant of [`Document::find_element`]
    pub fn find_element_mut(&mut self, path: &str) -> Option<&mut Element> {
        let steps = parse_path(path)?;
        let mut steps = steps.iter();
        let first = steps.next()?;
        if first.name != self.root.name || first.index != 1 {
            return None;
        }
        let mut current = &mut self.root;
        for step in steps {
            current = nth_child_mut(current, &step.name, step.index)?;
        }
        Some(current)
    }

    /// Insert `new` relative to the element at `ref_path`
    pub fn insert(&mut self, new: Element, ref_path: &str, pos: InsertPosition) -> bool {
        match pos {
            InsertPosition::FirstChild | InsertPosition::LastChild => {
                let Some(parent) = self.find_element_mut(ref_path) else {
                    return false;
                };
                match pos {
                    InsertPosition::FirstChild => parent.children.insert(0, XMLNode::Element(new)),
                    _ => parent.children.push(XMLNode::Element(new)),
                }
                true
            }
            InsertPosition::Before | InsertPosition::After => {
                let Some(steps) = parse_path(ref_path) else {
                    return false;
                };
                let Some((last, parent_steps)) = steps.split_last() else {
                    return false;
                };
                if parent_steps.is_empty() {
                    // cannot insert siblings of the root
                    return false;
                }
                let Some(parent) = self.resolve_steps_mut(parent_steps) else {
                    return false;
                };
                let Some(node_index) = node_position(parent, &last.name, last.index) else {
                    return false;
                };
                let at = match pos {
                    InsertPosition::Before => node_index,
                    _ => node_index + 1,
                };
                parent.children.insert(at, XMLNode::Element(new));
                true
            }
        }
    }

    /// Insert `new` as a child of `parent_path` before the element child
    /// at `element_index` (counting element nodes only)
    pub fn insert_child_at(&mut self, parent_path: &str, new: Element, element_index: usize) -> bool {
        let Some(parent) = self.find_element_mut(parent_path) else {
            return false;
        };
        let mut seen = 0usize;
        let mut at = parent.children.len();
        for (i, node) in parent.children.iter().enumerate() {
            if matches!(node, XMLNode::Element(_)) {
                if seen == element_index {
                    at = i;
                    break;
                }
                seen += 1;
            }
        }
        parent.children.insert(at, XMLNode::Element(new));
        true
    }

    /// Unlink and drop the element at `path`
    pub fn remove(&mut self, path: &str) -> bool {
        self.detach(path).is_some()
    }

    /// Detach the element at `path` and return it
    pub fn detach(&mut self, path: &str) -> Option<Element> {
        let steps = parse_path(path)?;
        let (last, parent_steps) = steps.split_last()?;
        if parent_steps.is_empty() {
            // never detach the root
            return None;
        }
        let parent = self.resolve_steps_mut(parent_steps)?;
        let node_index = node_position(parent, &last.name, last.index)?;
        match parent.children.remove(node_index) {
            XMLNode::Element(e) => Some(e),
            _ => unreachable!("node_position only returns element positions"),
        }
    }

    /// Detach the element at `from_path` and re-insert it at `ref_path`
    ///
    /// The target is verified before anything is detached, so a failed
    /// move leaves the tree unchanged.
    pub fn move_element(&mut self, from_path: &str, ref_path: &str, pos: InsertPosition) -> bool {
        if from_path == ref_path || ref_path.starts_with(&format!("{}/", from_path)) {
            return false;
        }
        if self.find_element(from_path).is_none() || self.find_element(ref_path).is_none() {
            return false;
        }
        let Some(detached) = self.detach(from_path) else {
            return false;
        };
        // the reference may have shifted an index after the detach
        if self.insert(detached.clone(), ref_path, pos) {
            return true;
        }
        let reinserted = self.insert(detached, from_path_parent(from_path), InsertPosition::LastChild);
        debug_assert!(reinserted, "re-attachment to the original parent");
        false
    }

    /// Reorder element children of `parent_path`: for each name in
    /// `desired_order`, matching children move to the end in their
    /// original relative order. Whitespace-only text between children is
    /// dropped; other children keep their place ahead of the reordered
    /// block.
    pub fn reorder_children(&mut self, parent_path: &str, desired_order: &[String]) -> bool {
        let Some(parent) = self.find_element_mut(parent_path) else {
            return false;
        };
        parent.children.retain(|node| match node {
            XMLNode::Text(t) => !t.trim().is_empty(),
            _ => true,
        });
        for name in desired_order {
            let mut matching = Vec::new();
            let mut rest = Vec::new();
            for node in parent.children.drain(..) {
                match &node {
                    XMLNode::Element(e) if &e.name == name => matching.push(node),
                    _ => rest.push(node),
                }
            }
            rest.extend(matching);
            parent.children = rest;
        }
        true
    }

    /// Replace all direct text content with a single text node
    pub fn set_text(&mut self, path: &str, text: &str) -> bool {
        let Some(element) = self.find_element_mut(path) else {
            return false;
        };
        element
            .children
            .retain(|node| !matches!(node, XMLNode::Text(_) | XMLNode::CData(_)));
        element.children.push(XMLNode::Text(text.to_string()));
        true
    }

    pub fn set_attribute(&mut self, path: &str, name: &str, value: &str) -> bool {
        let Some(element) = self.find_element_mut(path) else {
            return false;
        };
        element
            .attributes
            .insert(name.to_string(), value.to_string());
        true
    }

    pub fn remove_attribute(&mut self, path: &str, name: &str) -> bool {
        let Some(element) = self.find_element_mut(path) else {
            return false;
        };
        element.attributes.remove(name).is_some()
    }

    /// Strip whitespace-only text nodes from the element's direct children
    pub fn strip_whitespace_text(&mut self, path: &str) -> bool {
        let Some(element) = self.find_element_mut(path) else {
            return false;
        };
        element.children.retain(|node| match node {
            XMLNode::Text(t) => !t.trim().is_empty(),
            _ => true,
        });
        true
    }

    /// Rename the element, dropping any namespace prefix
    pub fn strip_prefix(&mut self, path: &str) -> bool {
        let Some(element) = self.find_element_mut(path) else {
            return false;
        };
        element.prefix = None;
        true
    }

    /// Clone the element at `path`; a shallow clone keeps attributes but
    /// drops children
    pub fn clone_element(&self, path: &str, deep: bool) -> Option<Element> {
        let element = self.find_element(path)?;
        let mut cloned = element.clone();
        if !deep {
            cloned.children.clear();
        }
        Some(cloned)
    }

    fn resolve_steps_mut(&mut self, steps: &[PathStep]) -> Option<&mut Element> {
        let (first, rest) = steps.split_first()?;
        if first.name != self.root.name || first.index != 1 {
            return None;
        }
        let mut current = &mut self.root;
        for step in rest {
            current = nth_child_mut(current, &step.name, step.index)?;
        }
        Some(current)
    }
}

/// Iterate the element children of an element
pub fn element_children(parent: &Element) -> impl Iterator<Item = &Element> {
    parent.children.iter().filter_map(|node| match node {
        XMLNode::Element(e) => Some(e),
        _ => None,
    })
}

/// Direct text content of an element, trimmed
pub fn text_of(element: &Element) -> String {
    let mut out = String::new();
    for node in &element.children {
        match node {
            XMLNode::Text(t) | XMLNode::CData(t) => out.push_str(t),
            _ => {}
        }
    }
    out.trim().to_string()
}

fn nth_child<'e>(parent: &'e Element, name: &str, index: usize) -> Option<&'e Element> {
    element_children(parent).filter(|e| e.name == name).nth(index - 1)
}

fn nth_child_mut<'e>(parent: &'e mut Element, name: &str, index: usize) -> Option<&'e mut Element> {
    parent
        .children
        .iter_mut()
        .filter_map(|node| match node {
            XMLNode::Element(e) if e.name == name => Some(e),
            _ => None,
        })
        .nth(index - 1)
}

/// Position in `children` of the `index`-th element named `name`
fn node_position(parent: &Element, name: &str, index: usize) -> Option<usize> {
    let mut seen = 0usize;
    for (i, node) in parent.children.iter().enumerate() {
        if let XMLNode::Element(e) = node {
            if e.name == name {
                seen += 1;
                if seen == index {
                    return Some(i);
                }
            }
        }
    }
    None
}

fn from_path_parent(path: &str) -> &str {
    match path.rfind('/') {
        Some(0) | None => "/",
        Some(i) => &path[..i],
    }
}

fn write_outer_node<W: Write>(writer: &mut W, node: &XMLNode) -> Result<()> {
    let text = match node {
        XMLNode::Comment(c) => format!("<!--{}-->\n", c),
        XMLNode::ProcessingInstruction(name, Some(data)) => format!("<?{} {}?>\n", name, data),
        XMLNode::ProcessingInstruction(name, None) => format!("<?{}?>\n", name),
        _ => return Ok(()),
    };
    writer
        .write_all(text.as_bytes())
        .map_err(|e| FixError::Serialize(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = r#"<?xml version="1.0"?>
<!-- catalog export -->
<library>
  <name>City Library</name>
  <books>
    <book>Dune</book>
    <book>Solaris</book>
  </books>
</library>"#;

    fn doc() -> Document {
        Document::from_str(DOC).unwrap()
    }

    #[test]
    fn path_parsing() {
        let steps = parse_path("/library/books/book[2]").unwrap();
        assert_eq!(steps.len(), 3);
        assert_eq!(steps[2].name, "book");
        assert_eq!(steps[2].index, 2);
        assert!(parse_path("library").is_none());
        assert!(parse_path("/a/b[0]").is_none());
        assert_eq!(parse_path("/").unwrap().len(), 0);
    }

    #[test]
    fn find_by_canonical_path() {
        let doc = doc();
        let book = doc.find_element("/library/books/book[2]").unwrap();
        assert_eq!(text_of(book), "Solaris");
        // absent index means the first sibling
        let book = doc.find_element("/library/books/book").unwrap();
        assert_eq!(text_of(book), "Dune");
        assert!(doc.find_element("/library/books/book[3]").is_none());
        assert!(doc.find_element("/wrong").is_none());
    }

    #[test]
    fn sibling_paths_are_distinct() {
        let doc = doc();
        let first = doc.find_element("/library/books/book[1]").unwrap();
        let second = doc.find_element("/library/books/book[2]").unwrap();
        assert_ne!(text_of(first), text_of(second));
    }

    #[test]
    fn insert_positions() {
        let mut doc = doc();
        assert!(doc.insert(
            Element::new("established"),
            "/library",
            InsertPosition::FirstChild
        ));
        let first = element_children(&doc.root).next().unwrap();
        assert_eq!(first.name, "established");

        assert!(doc.insert(
            Element::new("isbn"),
            "/library/books/book[2]",
            InsertPosition::After
        ));
        let books = doc.find_element("/library/books").unwrap();
        let names: Vec<_> = element_children(books).map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["book", "book", "isbn"]);
    }

    #[test]
    fn remove_and_detach() {
        let mut doc = doc();
        assert!(doc.remove("/library/books/book[2]"));
        let books = doc.find_element("/library/books").unwrap();
        assert_eq!(element_children(books).count(), 1);
        // root never detaches
        assert!(!doc.remove("/library"));
    }

    #[test]
    fn move_element_detaches_then_inserts() {
        let mut doc = doc();
        assert!(doc.move_element(
            "/library/books/book[1]",
            "/library",
            InsertPosition::LastChild
        ));
        let names: Vec<_> = element_children(&doc.root).map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["name", "books", "book"]);

        // moving into one's own subtree fails and leaves the tree intact
        let before = doc.to_xml_string().unwrap();
        assert!(!doc.move_element("/library/books", "/library/books", InsertPosition::After));
        assert_eq!(doc.to_xml_string().unwrap(), before);
    }

    #[test]
    fn reorder_children_by_name() {
        let xml = "<employee><age>30</age><email>x@y.z</email><firstName>J</firstName><lastName>D</lastName></employee>";
        let mut doc = Document::from_str(xml).unwrap();
        let order: Vec<String> = ["firstName", "lastName", "age", "email"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert!(doc.reorder_children("/employee", &order));
        let names: Vec<_> = element_children(&doc.root).map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["firstName", "lastName", "age", "email"]);
    }

    #[test]
    fn reorder_keeps_unknown_children() {
        let xml = "<r><b/><x/><a/></r>";
        let mut doc = Document::from_str(xml).unwrap();
        let order: Vec<String> = ["a", "b"].iter().map(|s| s.to_string()).collect();
        assert!(doc.reorder_children("/r", &order));
        let names: Vec<_> = element_children(&doc.root).map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["x", "a", "b"]);
    }

    #[test]
    fn set_text_replaces_all_text_nodes() {
        let mut doc = doc();
        assert!(doc.set_text("/library/name", "Town Library"));
        let name = doc.find_element("/library/name").unwrap();
        assert_eq!(text_of(name), "Town Library");
        assert_eq!(
            name.children
                .iter()
                .filter(|n| matches!(n, XMLNode::Text(_)))
                .count(),
            1
        );
    }

    #[test]
    fn attribute_edits() {
        let mut doc = doc();
        assert!(doc.set_attribute("/library", "established", "1901"));
        assert_eq!(
            doc.root.attributes.get("established").map(String::as_str),
            Some("1901")
        );
        assert!(doc.remove_attribute("/library", "established"));
        assert!(!doc.remove_attribute("/library", "established"));
    }

    #[test]
    fn serialization_keeps_prolog_comment() {
        let doc = doc();
        let out = doc.to_xml_string().unwrap();
        assert!(out.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
        assert!(out.contains("<!-- catalog export -->"));
        assert!(out.contains("<book>Dune</book>"));
    }

    #[test]
    fn clone_shallow_and_deep() {
        let doc = doc();
        let deep = doc.clone_element("/library/books", true).unwrap();
        assert_eq!(element_children(&deep).count(), 2);
        let shallow = doc.clone_element("/library/books", false).unwrap();
        assert_eq!(element_children(&shallow).count(), 0);
    }
}
