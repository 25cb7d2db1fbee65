//! XSD declaration parsing (pass A)
//!
//! Walks the schema document once and registers every global `element`,
//! `complexType`, `simpleType` and `attribute` declaration into symbol
//! tables keyed by local name. Nothing is resolved here; forward and
//! cyclic references are handled by the resolution pass.

use std::collections::HashMap;
use std::io::BufRead;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::error::{FixError, Result};
use crate::schema::{AttributeUse, Compositor, Constraint, MaxOccurs};

/// Raw global declarations collected by pass A
#[derive(Debug, Default)]
pub(super) struct RawSchema {
    pub target_namespace: Option<String>,
    /// Global elements in declaration order; order drives root selection
    pub elements: Vec<RawElement>,
    pub complex_types: HashMap<String, RawComplexType>,
    pub simple_types: HashMap<String, RawSimpleType>,
    pub attributes: HashMap<String, RawAttribute>,
}

/// Unresolved element declaration or reference
#[derive(Debug, Default, Clone)]
pub(super) struct RawElement {
    pub name: Option<String>,
    pub type_name: Option<String>,
    pub ref_name: Option<String>,
    pub min_occurs: u32,
    pub max_occurs: MaxOccurs,
    pub default: Option<String>,
    pub fixed: Option<String>,
    pub inline_complex: Option<RawComplexType>,
    pub inline_simple: Option<RawSimpleType>,
}

#[derive(Debug, Default, Clone)]
pub(super) struct RawComplexType {
    pub name: Option<String>,
    pub group: Option<RawGroup>,
    pub attributes: Vec<RawAttribute>,
}

#[derive(Debug, Clone)]
pub(super) struct RawGroup {
    pub compositor: Compositor,
    pub min_occurs: u32,
    pub max_occurs: MaxOccurs,
    pub members: Vec<RawMember>,
}

#[derive(Debug, Clone)]
pub(super) enum RawMember {
    Element(RawElement),
    Group(RawGroup),
}

#[derive(Debug, Clone)]
pub(super) enum RawSimpleVariant {
    Restriction {
        base: String,
        facets: Vec<Constraint>,
        enumerations: Vec<String>,
    },
    Union {
        member_types: Vec<String>,
    },
    List {
        item_type: String,
    },
}

#[derive(Debug, Clone)]
pub(super) struct RawSimpleType {
    pub name: Option<String>,
    pub variant: RawSimpleVariant,
}

#[derive(Debug, Default, Clone)]
pub(super) struct RawAttribute {
    pub name: Option<String>,
    pub ref_name: Option<String>,
    pub type_name: Option<String>,
    pub usage: AttributeUse,
    pub default: Option<String>,
    pub fixed: Option<String>,
    pub inline_simple: Option<RawSimpleType>,
}

/// Parse an XSD document into raw declaration tables
pub(super) fn parse_declarations(xsd: &str) -> Result<RawSchema> {
    let reader = Reader::from_str(xsd);
    SchemaParser::new(reader).parse().map_err(|e| match e {
        FixError::XmlParse(msg) => FixError::SchemaParse(msg),
        other => other,
    })
}

/// XSD declaration parser state
struct SchemaParser<B: BufRead> {
    reader: Reader<B>,
    model: RawSchema,
}

impl<B: BufRead> SchemaParser<B> {
    fn new(reader: Reader<B>) -> Self {
        Self {
            reader,
            model: RawSchema::default(),
        }
    }

    /// Find the root `<schema>` element and collect its declarations
    fn parse(mut self) -> Result<RawSchema> {
        let mut buf = Vec::new();
        let mut saw_schema = false;
        loop {
            match self.reader.read_event_into(&mut buf)? {
                Event::Start(ev) if ev.local_name().as_ref() == b"schema" => {
                    saw_schema = true;
                    self.parse_schema_attributes(&ev)?;
                    self.parse_schema_content()?;
                    break;
                }
                Event::Empty(ev) if ev.local_name().as_ref() == b"schema" => {
                    // empty schema declares nothing
                    saw_schema = true;
                    self.parse_schema_attributes(&ev)?;
                    break;
                }
                Event::Start(ev) | Event::Empty(ev) => {
                    let name = String::from_utf8_lossy(ev.local_name().as_ref()).into_owned();
                    return Err(FixError::SchemaStructure(format!(
                        "root element is '{}', expected 'schema'",
                        name
                    )));
                }
                Event::Eof => break,
                _ => {}
            }
            buf.clear();
        }
        if !saw_schema {
            return Err(FixError::SchemaStructure(
                "document contains no 'schema' root element".to_string(),
            ));
        }
        Ok(self.model)
    }

    fn parse_schema_attributes(&mut self, e: &BytesStart) -> Result<()> {
        for attr in e.attributes().with_checks(false) {
            let attr = attr?;
            if attr.key.as_ref() == b"targetNamespace" {
                self.model.target_namespace = Some(attr.unescape_value()?.into_owned());
            }
        }
        Ok(())
    }

    /// Register every top-level declaration under `<schema>`
    fn parse_schema_content(&mut self) -> Result<()> {
        let mut buf = Vec::new();
        loop {
            match self.reader.read_event_into(&mut buf)? {
                Event::Start(e) => match e.local_name().as_ref() {
                    b"element" => {
                        let elem = self.parse_element(&e, true)?;
                        self.model.elements.push(elem);
                    }
                    b"complexType" => {
                        let ct = self.parse_complex_type(&e, true)?;
                        if let Some(name) = ct.name.clone() {
                            self.model.complex_types.insert(name, ct);
                        }
                    }
                    b"simpleType" => {
                        let st = self.parse_simple_type(&e, true)?;
                        if let Some(name) = st.name.clone() {
                            self.model.simple_types.insert(name, st);
                        }
                    }
                    b"attribute" => {
                        let at = self.parse_attribute(&e, true)?;
                        if let Some(name) = at.name.clone() {
                            self.model.attributes.insert(name, at);
                        }
                    }
                    // annotation, import, include, group, notation
                    _ => self.skip_element()?,
                },
                Event::Empty(e) => match e.local_name().as_ref() {
                    b"element" => {
                        let elem = self.parse_element(&e, false)?;
                        self.model.elements.push(elem);
                    }
                    b"complexType" => {
                        let ct = self.parse_complex_type(&e, false)?;
                        if let Some(name) = ct.name.clone() {
                            self.model.complex_types.insert(name, ct);
                        }
                    }
                    b"attribute" => {
                        let at = self.parse_attribute(&e, false)?;
                        if let Some(name) = at.name.clone() {
                            self.model.attributes.insert(name, at);
                        }
                    }
                    _ => {}
                },
                Event::End(e) if e.local_name().as_ref() == b"schema" => break,
                Event::Eof => break,
                _ => {}
            }
            buf.clear();
        }
        Ok(())
    }

    /// Parse an `<element>` declaration or reference
    ///
    /// Handles both forms:
    /// - type reference: `<element name="founded" type="xs:int"/>`
    /// - inline type: `<element name="library"><complexType>...</complexType></element>`
    ///
    /// `has_content` is true for Start events, false for Empty ones.
    fn parse_element(&mut self, e: &BytesStart, has_content: bool) -> Result<RawElement> {
        let mut elem = RawElement {
            min_occurs: 1,
            max_occurs: MaxOccurs::default(),
            ..Default::default()
        };

        for attr in e.attributes().with_checks(false) {
            let attr = attr?;
            let val = attr.unescape_value()?;
            match attr.key.as_ref() {
                b"name" => elem.name = Some(val.into_owned()),
                b"type" => elem.type_name = Some(val.into_owned()),
                b"ref" => elem.ref_name = Some(val.into_owned()),
                b"minOccurs" => elem.min_occurs = val.parse().unwrap_or(1),
                b"maxOccurs" => elem.max_occurs = MaxOccurs::parse(&val),
                b"default" => elem.default = Some(val.into_owned()),
                b"fixed" => elem.fixed = Some(val.into_owned()),
                _ => {}
            }
        }

        if has_content {
            let mut buf = Vec::new();
            loop {
                match self.reader.read_event_into(&mut buf)? {
                    Event::Start(e) if e.local_name().as_ref() == b"complexType" => {
                        elem.inline_complex = Some(self.parse_complex_type(&e, true)?);
                    }
                    Event::Empty(e) if e.local_name().as_ref() == b"complexType" => {
                        elem.inline_complex = Some(self.parse_complex_type(&e, false)?);
                    }
                    Event::Start(e) if e.local_name().as_ref() == b"simpleType" => {
                        elem.inline_simple = Some(self.parse_simple_type(&e, true)?);
                    }
                    Event::Start(_) => self.skip_element()?,
                    Event::End(e) if e.local_name().as_ref() == b"element" => break,
                    Event::Eof => break,
                    _ => {}
                }
                buf.clear();
            }
        }

        Ok(elem)
    }

    /// Parse a `<complexType>` definition
    fn parse_complex_type(&mut self, e: &BytesStart, has_content: bool) -> Result<RawComplexType> {
        let mut ct = RawComplexType {
            name: e
                .try_get_attribute("name")?
                .map(|a| a.unescape_value())
                .transpose()?
                .map(|v| v.into_owned()),
            ..Default::default()
        };

        if !has_content {
            return Ok(ct);
        }

        let mut buf = Vec::new();
        loop {
            match self.reader.read_event_into(&mut buf)? {
                Event::Start(e) => match e.local_name().as_ref() {
                    b"sequence" => ct.group = Some(self.parse_group(Compositor::Sequence, &e)?),
                    b"choice" => ct.group = Some(self.parse_group(Compositor::Choice, &e)?),
                    b"all" => ct.group = Some(self.parse_group(Compositor::All, &e)?),
                    b"attribute" => {
                        let at = self.parse_attribute(&e, true)?;
                        ct.attributes.push(at);
                    }
                    // simpleContent, complexContent, anyAttribute
                    _ => self.skip_element()?,
                },
                Event::Empty(e) => match e.local_name().as_ref() {
                    b"sequence" | b"choice" | b"all" => {}
                    b"attribute" => {
                        let at = self.parse_attribute(&e, false)?;
                        ct.attributes.push(at);
                    }
                    _ => {}
                },
                Event::End(e) if e.local_name().as_ref() == b"complexType" => break,
                Event::Eof => break,
                _ => {}
            }
            buf.clear();
        }

        Ok(ct)
    }

    /// Parse a `sequence`, `choice` or `all` compositor
    ///
    /// Each recursion level consumes its own matching End event, so nested
    /// compositors with the same tag name do not confuse the loop.
    fn parse_group(&mut self, compositor: Compositor, e: &BytesStart) -> Result<RawGroup> {
        let mut group = RawGroup {
            compositor,
            min_occurs: 1,
            max_occurs: MaxOccurs::default(),
            members: Vec::new(),
        };

        for attr in e.attributes().with_checks(false) {
            let attr = attr?;
            let val = attr.unescape_value()?;
            match attr.key.as_ref() {
                b"minOccurs" => group.min_occurs = val.parse().unwrap_or(1),
                b"maxOccurs" => group.max_occurs = MaxOccurs::parse(&val),
                _ => {}
            }
        }

        let end_tag: &[u8] = match compositor {
            Compositor::Sequence => b"sequence",
            Compositor::Choice => b"choice",
            Compositor::All => b"all",
        };

        let mut buf = Vec::new();
        loop {
            match self.reader.read_event_into(&mut buf)? {
                Event::Start(e) => match e.local_name().as_ref() {
                    b"element" => {
                        let elem = self.parse_element(&e, true)?;
                        group.members.push(RawMember::Element(elem));
                    }
                    b"sequence" => {
                        let nested = self.parse_group(Compositor::Sequence, &e)?;
                        group.members.push(RawMember::Group(nested));
                    }
                    b"choice" => {
                        let nested = self.parse_group(Compositor::Choice, &e)?;
                        group.members.push(RawMember::Group(nested));
                    }
                    b"all" => {
                        let nested = self.parse_group(Compositor::All, &e)?;
                        group.members.push(RawMember::Group(nested));
                    }
                    _ => self.skip_element()?,
                },
                Event::Empty(e) if e.local_name().as_ref() == b"element" => {
                    let elem = self.parse_element(&e, false)?;
                    group.members.push(RawMember::Element(elem));
                }
                Event::End(e) if e.local_name().as_ref() == end_tag => break,
                Event::Eof => break,
                _ => {}
            }
            buf.clear();
        }

        Ok(group)
    }

    /// Parse a `<simpleType>` definition
    ///
    /// Restrictions carry the facets used for validation. Unions collapse
    /// to an enumeration of their member type names and lists to a
    /// catch-all pattern; both are resolved-pass concerns recorded here
    /// as variants.
    fn parse_simple_type(&mut self, e: &BytesStart, has_content: bool) -> Result<RawSimpleType> {
        let name = e
            .try_get_attribute("name")?
            .map(|a| a.unescape_value())
            .transpose()?
            .map(|v| v.into_owned());

        let mut variant = RawSimpleVariant::Restriction {
            base: "string".to_string(),
            facets: Vec::new(),
            enumerations: Vec::new(),
        };

        if has_content {
            let mut buf = Vec::new();
            loop {
                match self.reader.read_event_into(&mut buf)? {
                    Event::Start(e) if e.local_name().as_ref() == b"restriction" => {
                        variant = self.parse_restriction(&e)?;
                    }
                    Event::Empty(e) if e.local_name().as_ref() == b"restriction" => {
                        let base = self.attr_or(&e, "base", "string")?;
                        variant = RawSimpleVariant::Restriction {
                            base,
                            facets: Vec::new(),
                            enumerations: Vec::new(),
                        };
                    }
                    Event::Start(e) if e.local_name().as_ref() == b"list" => {
                        let item_type = self.attr_or(&e, "itemType", "string")?;
                        variant = RawSimpleVariant::List { item_type };
                        self.skip_element()?;
                    }
                    Event::Empty(e) if e.local_name().as_ref() == b"list" => {
                        let item_type = self.attr_or(&e, "itemType", "string")?;
                        variant = RawSimpleVariant::List { item_type };
                    }
                    Event::Start(e) if e.local_name().as_ref() == b"union" => {
                        let member_types = self.union_members(&e)?;
                        variant = RawSimpleVariant::Union { member_types };
                        self.skip_element()?;
                    }
                    Event::Empty(e) if e.local_name().as_ref() == b"union" => {
                        let member_types = self.union_members(&e)?;
                        variant = RawSimpleVariant::Union { member_types };
                    }
                    Event::Start(_) => self.skip_element()?,
                    Event::End(e) if e.local_name().as_ref() == b"simpleType" => break,
                    Event::Eof => break,
                    _ => {}
                }
                buf.clear();
            }
        }

        Ok(RawSimpleType { name, variant })
    }

    fn union_members(&self, e: &BytesStart) -> Result<Vec<String>> {
        Ok(e.try_get_attribute("memberTypes")?
            .map(|a| a.unescape_value())
            .transpose()?
            .map(|v| v.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default())
    }

    /// Parse a `<restriction>` and collect its facets
    ///
    /// Enumeration facets accumulate separately so the resolver can merge
    /// them into a single enumeration constraint.
    fn parse_restriction(&mut self, e: &BytesStart) -> Result<RawSimpleVariant> {
        let base = self.attr_or(e, "base", "string")?;
        let mut facets = Vec::new();
        let mut enumerations = Vec::new();

        let mut buf = Vec::new();
        loop {
            match self.reader.read_event_into(&mut buf)? {
                Event::Empty(e) => {
                    self.collect_facet(&e, &mut facets, &mut enumerations)?;
                }
                Event::Start(e) => {
                    // facet carrying an annotation child
                    self.collect_facet(&e, &mut facets, &mut enumerations)?;
                    self.skip_element()?;
                }
                Event::End(e) if e.local_name().as_ref() == b"restriction" => break,
                Event::Eof => break,
                _ => {}
            }
            buf.clear();
        }

        Ok(RawSimpleVariant::Restriction {
            base,
            facets,
            enumerations,
        })
    }

    fn collect_facet(
        &self,
        e: &BytesStart,
        facets: &mut Vec<Constraint>,
        enumerations: &mut Vec<String>,
    ) -> Result<()> {
        let value = match e.try_get_attribute("value")? {
            Some(a) => a.unescape_value()?.into_owned(),
            None => return Ok(()),
        };
        match e.local_name().as_ref() {
            b"enumeration" => enumerations.push(value),
            b"pattern" => facets.push(Constraint::Pattern(value)),
            b"minLength" => {
                if let Ok(len) = value.parse() {
                    facets.push(Constraint::MinLength(len));
                }
            }
            b"maxLength" => {
                if let Ok(len) = value.parse() {
                    facets.push(Constraint::MaxLength(len));
                }
            }
            b"length" => {
                if let Ok(len) = value.parse::<u32>() {
                    facets.push(Constraint::MinLength(len));
                    facets.push(Constraint::MaxLength(len));
                }
            }
            b"minInclusive" => facets.push(Constraint::MinInclusive(value)),
            b"maxInclusive" => facets.push(Constraint::MaxInclusive(value)),
            b"minExclusive" => facets.push(Constraint::MinExclusive(value)),
            b"maxExclusive" => facets.push(Constraint::MaxExclusive(value)),
            b"totalDigits" => {
                if let Ok(digits) = value.parse() {
                    facets.push(Constraint::TotalDigits(digits));
                }
            }
            b"fractionDigits" => {
                if let Ok(digits) = value.parse() {
                    facets.push(Constraint::FractionDigits(digits));
                }
            }
            b"whiteSpace" => facets.push(Constraint::WhiteSpace(value)),
            _ => {} // unknown facet
        }
        Ok(())
    }

    /// Parse an `<attribute>` declaration
    fn parse_attribute(&mut self, e: &BytesStart, has_content: bool) -> Result<RawAttribute> {
        let mut at = RawAttribute::default();

        for attr in e.attributes().with_checks(false) {
            let attr = attr?;
            let val = attr.unescape_value()?;
            match attr.key.as_ref() {
                b"name" => at.name = Some(val.into_owned()),
                b"ref" => at.ref_name = Some(val.into_owned()),
                b"type" => at.type_name = Some(val.into_owned()),
                b"use" => at.usage = AttributeUse::parse(&val),
                b"default" => at.default = Some(val.into_owned()),
                b"fixed" => at.fixed = Some(val.into_owned()),
                _ => {}
            }
        }

        if has_content {
            let mut buf = Vec::new();
            loop {
                match self.reader.read_event_into(&mut buf)? {
                    Event::Start(e) if e.local_name().as_ref() == b"simpleType" => {
                        at.inline_simple = Some(self.parse_simple_type(&e, true)?);
                    }
                    Event::Start(_) => self.skip_element()?,
                    Event::End(e) if e.local_name().as_ref() == b"attribute" => break,
                    Event::Eof => break,
                    _ => {}
                }
                buf.clear();
            }
        }

        Ok(at)
    }

    fn attr_or(&self, e: &BytesStart, name: &str, fallback: &str) -> Result<String> {
        Ok(e.try_get_attribute(name)?
            .map(|a| a.unescape_value())
            .transpose()?
            .map(|v| v.into_owned())
            .unwrap_or_else(|| fallback.to_string()))
    }

    /// Skip the current element and all its content
    ///
    /// Maintains a depth counter so nested elements with the same name
    /// are handled correctly.
    fn skip_element(&mut self) -> Result<()> {
        let mut buf = Vec::new();
        let mut depth = 1;
        loop {
            match self.reader.read_event_into(&mut buf)? {
                Event::Start(_) => depth += 1,
                Event::End(_) => {
                    depth -= 1;
                    if depth == 0 {
                        break;
                    }
                }
                Event::Eof => break,
                _ => {}
            }
            buf.clear();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registers_global_declarations() {
        let xsd = r#"
        <schema xmlns="http://www.w3.org/2001/XMLSchema"
                targetNamespace="http://example.org/library">
            <element name="library" type="LibraryType"/>
            <complexType name="LibraryType">
                <sequence>
                    <element name="name" type="string"/>
                    <element name="books" type="BooksType"/>
                </sequence>
            </complexType>
            <complexType name="BooksType">
                <sequence>
                    <element name="book" type="string" minOccurs="0" maxOccurs="unbounded"/>
                </sequence>
            </complexType>
            <simpleType name="IsbnType">
                <restriction base="string">
                    <pattern value="\d{3}-\d{10}"/>
                </restriction>
            </simpleType>
        </schema>
        "#;

        let raw = parse_declarations(xsd).unwrap();
        assert_eq!(
            raw.target_namespace.as_deref(),
            Some("http://example.org/library")
        );
        assert_eq!(raw.elements.len(), 1);
        assert_eq!(raw.elements[0].name.as_deref(), Some("library"));
        assert!(raw.complex_types.contains_key("LibraryType"));
        assert!(raw.complex_types.contains_key("BooksType"));
        assert!(raw.simple_types.contains_key("IsbnType"));

        let books = &raw.complex_types["BooksType"];
        let group = books.group.as_ref().unwrap();
        assert_eq!(group.compositor, Compositor::Sequence);
        match &group.members[0] {
            RawMember::Element(e) => {
                assert_eq!(e.min_occurs, 0);
                assert_eq!(e.max_occurs, MaxOccurs::Unbounded);
            }
            RawMember::Group(_) => panic!("expected element member"),
        }
    }

    #[test]
    fn parses_inline_complex_type() {
        let xsd = r#"
        <xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
            <xs:element name="employee">
                <xs:complexType>
                    <xs:sequence>
                        <xs:element name="firstName" type="xs:string"/>
                        <xs:element name="lastName" type="xs:string"/>
                    </xs:sequence>
                </xs:complexType>
            </xs:element>
        </xs:schema>
        "#;

        let raw = parse_declarations(xsd).unwrap();
        let elem = &raw.elements[0];
        assert_eq!(elem.name.as_deref(), Some("employee"));
        let inline = elem.inline_complex.as_ref().unwrap();
        assert_eq!(inline.group.as_ref().unwrap().members.len(), 2);
    }

    #[test]
    fn merges_restriction_facets() {
        let xsd = r#"
        <schema xmlns="http://www.w3.org/2001/XMLSchema">
            <simpleType name="AgeType">
                <restriction base="int">
                    <minInclusive value="18"/>
                    <maxInclusive value="65"/>
                </restriction>
            </simpleType>
            <simpleType name="DeptType">
                <restriction base="string">
                    <enumeration value="Engineering"/>
                    <enumeration value="Marketing"/>
                </restriction>
            </simpleType>
        </schema>
        "#;

        let raw = parse_declarations(xsd).unwrap();
        match &raw.simple_types["AgeType"].variant {
            RawSimpleVariant::Restriction { base, facets, .. } => {
                assert_eq!(base, "int");
                assert_eq!(facets.len(), 2);
            }
            _ => panic!("expected restriction"),
        }
        match &raw.simple_types["DeptType"].variant {
            RawSimpleVariant::Restriction { enumerations, .. } => {
                assert_eq!(enumerations, &["Engineering", "Marketing"]);
            }
            _ => panic!("expected restriction"),
        }
    }

    #[test]
    fn rejects_non_schema_root() {
        let err = parse_declarations("<definitions/>").unwrap_err();
        assert!(matches!(err, FixError::SchemaStructure(_)));
    }

    #[test]
    fn parses_attribute_declarations() {
        let xsd = r#"
        <schema xmlns="http://www.w3.org/2001/XMLSchema">
            <complexType name="BookType">
                <sequence>
                    <element name="title" type="string"/>
                </sequence>
                <attribute name="isbn" type="string" use="required"/>
                <attribute name="edition" type="int" default="1"/>
            </complexType>
        </schema>
        "#;

        let raw = parse_declarations(xsd).unwrap();
        let book = &raw.complex_types["BookType"];
        assert_eq!(book.attributes.len(), 2);
        assert_eq!(book.attributes[0].usage, AttributeUse::Required);
        assert_eq!(book.attributes[1].default.as_deref(), Some("1"));
    }
}
