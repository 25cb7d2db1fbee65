//! Correction strategies
//!
//! One strategy per error class, registered in a compile-time table.
//! Each strategy translates an error into zero or more actions; the
//! planner owns ordering, conflict resolution and grouping.

use crate::correction::coerce;
use crate::correction::{ActionType, CorrectionAction};
use crate::errors::{ErrorKind, ValidationError};
use crate::schema::{ContentModel, Schema, SchemaRef};
use crate::tree::{self, Document};

/// Shared lookup context while planning
pub(crate) struct PlanContext<'a> {
    pub schema: &'a Schema,
    pub doc: &'a Document,
}

pub(crate) trait CorrectionStrategy: Sync {
    fn name(&self) -> &'static str;
    fn can_correct(&self, kind: ErrorKind) -> bool;
    fn plan(&self, error: &ValidationError, ctx: &PlanContext<'_>) -> Vec<CorrectionAction>;
}

/// The fixed strategy registration table
pub(crate) const STRATEGIES: &[&dyn CorrectionStrategy] = &[
    &MissingContentStrategy,
    &OrderingStrategy,
    &CardinalityStrategy,
    &DataTypeStrategy,
    &AttributeContentStrategy,
];

/// Resolve a canonical document path to its schema element
pub(crate) fn element_for_path(schema: &Schema, path: &str) -> Option<SchemaRef> {
    let steps = tree::parse_path(path)?;
    let mut iter = steps.iter();
    let first = iter.next()?;
    let root = schema.root();
    let mut current = if schema.has_virtual_root() {
        schema.find_child(root, &first.name)?
    } else if schema.element(root).name == first.name {
        root
    } else {
        return None;
    };
    for step in iter {
        current = schema.find_child(current, &step.name)?;
    }
    Some(current)
}

/// Expected child-name order of an element's content model
pub(crate) fn expected_child_order(schema: &Schema, r: SchemaRef) -> Vec<String> {
    schema
        .element(r)
        .children
        .iter()
        .map(|&c| schema.element(c).name.clone())
        .collect()
}

fn add_missing_elements(
    error: &ValidationError,
    ctx: &PlanContext<'_>,
    kind: ErrorKind,
) -> Vec<CorrectionAction> {
    let observed: u32 = error
        .actual_value
        .as_deref()
        .and_then(|v| v.parse().ok())
        .unwrap_or(0);
    let child = element_for_path(ctx.schema, &error.path)
        .and_then(|parent| ctx.schema.find_child(parent, &error.element_name));
    let min = child
        .map(|c| ctx.schema.element(c).min_occurs)
        .unwrap_or(1);
    let count = min.saturating_sub(observed).max(1);

    let default = child.map(|c| {
        let elem = ctx.schema.element(c);
        match &elem.content {
            ContentModel::Simple(_) => coerce::default_content(elem),
            _ => String::new(),
        }
    });

    (0..count)
        .map(|_| {
            let mut action = CorrectionAction::new(
                ActionType::AddElement,
                &error.path,
                &error.element_name,
                kind,
            );
            if let Some(value) = &default {
                if !value.is_empty() {
                    action = action.new_value(value.clone());
                }
            }
            action
        })
        .collect()
}

/// Missing elements, missing attributes, empty required content
struct MissingContentStrategy;

impl CorrectionStrategy for MissingContentStrategy {
    fn name(&self) -> &'static str {
        "missing-content"
    }

    fn can_correct(&self, kind: ErrorKind) -> bool {
        matches!(
            kind,
            ErrorKind::MissingRequiredElement
                | ErrorKind::MissingRequiredAttribute
                | ErrorKind::EmptyRequiredContent
        )
    }

    fn plan(&self, error: &ValidationError, ctx: &PlanContext<'_>) -> Vec<CorrectionAction> {
        match error.kind {
            ErrorKind::MissingRequiredElement => {
                add_missing_elements(error, ctx, ErrorKind::MissingRequiredElement)
            }
            ErrorKind::MissingRequiredAttribute => {
                let Some(attribute) = error.attribute_name.clone() else {
                    return Vec::new();
                };
                let value = element_for_path(ctx.schema, &error.path)
                    .map(|r| ctx.schema.element(r))
                    .and_then(|elem| elem.attributes.iter().find(|d| d.name == attribute))
                    .map(|decl| {
                        decl.effective_default()
                            .map(str::to_string)
                            .unwrap_or_else(|| {
                                crate::schema::builtins::default_for_type(&decl.type_name)
                                    .to_string()
                            })
                    })
                    .unwrap_or_default();
                vec![CorrectionAction::new(
                    ActionType::AddAttribute,
                    &error.path,
                    &error.element_name,
                    ErrorKind::MissingRequiredAttribute,
                )
                .attribute(attribute)
                .new_value(value)]
            }
            ErrorKind::EmptyRequiredContent => {
                let Some(r) = element_for_path(ctx.schema, &error.path) else {
                    return Vec::new();
                };
                let value = coerce::default_content(ctx.schema.element(r));
                vec![CorrectionAction::new(
                    ActionType::ChangeTextContent,
                    &error.path,
                    &error.element_name,
                    ErrorKind::EmptyRequiredContent,
                )
                .old_value("")
                .new_value(value)]
            }
            _ => Vec::new(),
        }
    }
}

/// Ordering violations and misplaced elements
struct OrderingStrategy;

impl CorrectionStrategy for OrderingStrategy {
    fn name(&self) -> &'static str {
        "ordering"
    }

    fn can_correct(&self, kind: ErrorKind) -> bool {
        matches!(
            kind,
            ErrorKind::InvalidElementOrder | ErrorKind::UnexpectedElement
        )
    }

    fn plan(&self, error: &ValidationError, ctx: &PlanContext<'_>) -> Vec<CorrectionAction> {
        match error.kind {
            ErrorKind::InvalidElementOrder => {
                let Some(r) = element_for_path(ctx.schema, &error.path) else {
                    return Vec::new();
                };
                let order = expected_child_order(ctx.schema, r);
                let parent_name = error
                    .path
                    .rsplit('/')
                    .next()
                    .map(|s| s.split('[').next().unwrap_or(s).to_string())
                    .unwrap_or_default();
                vec![CorrectionAction::new(
                    ActionType::ReorderElements,
                    &error.path,
                    parent_name,
                    ErrorKind::InvalidElementOrder,
                )
                .new_value(order.join(","))]
            }
            ErrorKind::UnexpectedElement => {
                // walk ancestors for one that accepts this element name
                let mut ancestor = parent_of(&error.path);
                while ancestor != "/" {
                    let grandparent = parent_of(&ancestor);
                    if grandparent == "/" {
                        break;
                    }
                    if let Some(r) = element_for_path(ctx.schema, &grandparent) {
                        if ctx.schema.find_child(r, &error.element_name).is_some() {
                            return vec![CorrectionAction::new(
                                ActionType::MoveElement,
                                &error.path,
                                &error.element_name,
                                ErrorKind::UnexpectedElement,
                            )
                            .new_value(grandparent)];
                        }
                    }
                    ancestor = grandparent;
                }
                vec![CorrectionAction::new(
                    ActionType::RemoveElement,
                    &error.path,
                    &error.element_name,
                    ErrorKind::UnexpectedElement,
                )]
            }
            _ => Vec::new(),
        }
    }
}

/// Occurrence counts outside their bounds
struct CardinalityStrategy;

impl CorrectionStrategy for CardinalityStrategy {
    fn name(&self) -> &'static str {
        "cardinality"
    }

    fn can_correct(&self, kind: ErrorKind) -> bool {
        matches!(
            kind,
            ErrorKind::TooFewOccurrences | ErrorKind::TooManyOccurrences
        )
    }

    fn plan(&self, error: &ValidationError, ctx: &PlanContext<'_>) -> Vec<CorrectionAction> {
        match error.kind {
            ErrorKind::TooFewOccurrences => {
                add_missing_elements(error, ctx, ErrorKind::TooFewOccurrences)
            }
            // one error per surplus occurrence, each removing its own path
            ErrorKind::TooManyOccurrences => vec![CorrectionAction::new(
                ActionType::RemoveElement,
                &error.path,
                &error.element_name,
                ErrorKind::TooManyOccurrences,
            )],
            _ => Vec::new(),
        }
    }
}

/// Text values that fail their simple type
struct DataTypeStrategy;

impl CorrectionStrategy for DataTypeStrategy {
    fn name(&self) -> &'static str {
        "data-type"
    }

    fn can_correct(&self, kind: ErrorKind) -> bool {
        matches!(
            kind,
            ErrorKind::InvalidDataType
                | ErrorKind::InvalidFormat
                | ErrorKind::PatternMismatch
                | ErrorKind::InvalidValueRange
                | ErrorKind::ConstraintViolation
        )
    }

    fn plan(&self, error: &ValidationError, ctx: &PlanContext<'_>) -> Vec<CorrectionAction> {
        let Some(r) = element_for_path(ctx.schema, &error.path) else {
            return Vec::new();
        };
        let element = ctx.schema.element(r);
        let old = error
            .actual_value
            .clone()
            .or_else(|| ctx.doc.find_element(&error.path).map(tree::text_of))
            .unwrap_or_default();

        let coerced = if let Some(fixed) = &element.fixed_value {
            Some(fixed.clone())
        } else {
            coerce::coerce(&old, coerce::base_type_of(element), &element.constraints)
        };

        let mut action = CorrectionAction::new(
            ActionType::ChangeTextContent,
            &error.path,
            &error.element_name,
            error.kind,
        )
        .old_value(old);
        match coerced {
            Some(value) => action = action.new_value(value),
            None => action.failure_reason = Some("value could not be coerced".to_string()),
        }
        vec![action]
    }
}

/// Attribute repairs and content cleanups
struct AttributeContentStrategy;

impl CorrectionStrategy for AttributeContentStrategy {
    fn name(&self) -> &'static str {
        "attribute-content"
    }

    fn can_correct(&self, kind: ErrorKind) -> bool {
        matches!(
            kind,
            ErrorKind::InvalidAttributeValue
                | ErrorKind::UnexpectedAttribute
                | ErrorKind::InvalidContentModel
                | ErrorKind::UndefinedPrefix
        )
    }

    fn plan(&self, error: &ValidationError, ctx: &PlanContext<'_>) -> Vec<CorrectionAction> {
        match error.kind {
            ErrorKind::InvalidAttributeValue => {
                let Some(attribute) = error.attribute_name.clone() else {
                    return Vec::new();
                };
                let decl = element_for_path(ctx.schema, &error.path)
                    .map(|r| ctx.schema.element(r))
                    .and_then(|elem| elem.attributes.iter().find(|d| d.name == attribute).cloned());
                let old = error.actual_value.clone().unwrap_or_default();
                let coerced = match &decl {
                    Some(decl) => match &decl.fixed {
                        Some(fixed) => Some(fixed.clone()),
                        None => coerce::coerce(&old, &decl.type_name, &decl.constraints),
                    },
                    None => None,
                };
                let mut action = CorrectionAction::new(
                    ActionType::ModifyAttribute,
                    &error.path,
                    &error.element_name,
                    ErrorKind::InvalidAttributeValue,
                )
                .attribute(attribute)
                .old_value(old);
                match coerced {
                    Some(value) => action = action.new_value(value),
                    None => {
                        action.failure_reason = Some("value could not be coerced".to_string())
                    }
                }
                vec![action]
            }
            ErrorKind::UnexpectedAttribute => {
                let Some(attribute) = error.attribute_name.clone() else {
                    return Vec::new();
                };
                vec![CorrectionAction::new(
                    ActionType::RemoveAttribute,
                    &error.path,
                    &error.element_name,
                    ErrorKind::UnexpectedAttribute,
                )
                .attribute(attribute)]
            }
            ErrorKind::InvalidContentModel => vec![CorrectionAction::new(
                ActionType::ModifyElement,
                &error.path,
                &error.element_name,
                ErrorKind::InvalidContentModel,
            )],
            ErrorKind::UndefinedPrefix => vec![CorrectionAction::new(
                ActionType::FixNamespace,
                &error.path,
                &error.element_name,
                ErrorKind::UndefinedPrefix,
            )
            .old_value(error.actual_value.clone().unwrap_or_default())],
            _ => Vec::new(),
        }
    }
}

fn parent_of(path: &str) -> String {
    match path.rfind('/') {
        Some(0) | None => "/".to_string(),
        Some(i) => path[..i].to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::compile_schema_str;
    use crate::validator::Validator;

    const EMPLOYEE_XSD: &str = r#"
    <schema xmlns="http://www.w3.org/2001/XMLSchema">
        <element name="employee">
            <complexType>
                <sequence>
                    <element name="firstName" type="string"/>
                    <element name="lastName" type="string"/>
                    <element name="age" type="AgeType" minOccurs="0"/>
                    <element name="email" type="string" minOccurs="0"/>
                </sequence>
            </complexType>
        </element>
        <simpleType name="AgeType">
            <restriction base="int">
                <minInclusive value="18"/>
                <maxInclusive value="65"/>
            </restriction>
        </simpleType>
    </schema>
    "#;

    fn plan_for(xsd: &str, xml: &str) -> Vec<CorrectionAction> {
        let schema = compile_schema_str(xsd).unwrap();
        let result = Validator::new(&schema).validate_str(xml);
        let doc = Document::from_str(xml).unwrap();
        let ctx = PlanContext {
            schema: &schema,
            doc: &doc,
        };
        result
            .errors
            .iter()
            .flat_map(|e| {
                STRATEGIES
                    .iter()
                    .filter(|s| s.can_correct(e.kind))
                    .flat_map(|s| s.plan(e, &ctx))
                    .collect::<Vec<_>>()
            })
            .collect()
    }

    #[test]
    fn missing_element_becomes_add() {
        let actions = plan_for(EMPLOYEE_XSD, "<employee><firstName>J</firstName></employee>");
        let add: Vec<_> = actions
            .iter()
            .filter(|a| a.action_type == ActionType::AddElement)
            .collect();
        assert_eq!(add.len(), 1);
        assert_eq!(add[0].element_name, "lastName");
        assert_eq!(add[0].path, "/employee");
    }

    #[test]
    fn order_violation_becomes_reorder_with_expected_order() {
        let actions = plan_for(
            EMPLOYEE_XSD,
            "<employee><age>30</age><email>x@y.z</email><firstName>J</firstName><lastName>D</lastName></employee>",
        );
        let reorder = actions
            .iter()
            .find(|a| a.action_type == ActionType::ReorderElements)
            .unwrap();
        assert_eq!(reorder.path, "/employee");
        assert_eq!(
            reorder.new_value.as_deref(),
            Some("firstName,lastName,age,email")
        );
    }

    #[test]
    fn range_violation_coerces_toward_bound() {
        let actions = plan_for(
            EMPLOYEE_XSD,
            "<employee><firstName>J</firstName><lastName>D</lastName><age>70</age></employee>",
        );
        let change = actions
            .iter()
            .find(|a| a.action_type == ActionType::ChangeTextContent)
            .unwrap();
        assert_eq!(change.new_value.as_deref(), Some("65"));
        assert_eq!(change.old_value.as_deref(), Some("70"));
    }

    #[test]
    fn unexpected_element_moves_to_accepting_ancestor() {
        let xsd = r#"
        <schema xmlns="http://www.w3.org/2001/XMLSchema">
            <element name="library">
                <complexType>
                    <sequence>
                        <element name="book" type="string" minOccurs="0" maxOccurs="unbounded"/>
                        <element name="shelf" minOccurs="0">
                            <complexType>
                                <sequence>
                                    <element name="label" type="string"/>
                                </sequence>
                            </complexType>
                        </element>
                    </sequence>
                </complexType>
            </element>
        </schema>
        "#;
        // book misplaced under shelf; library accepts it
        let actions = plan_for(
            xsd,
            "<library><shelf><label>A</label><book>Dune</book></shelf></library>",
        );
        let mv = actions
            .iter()
            .find(|a| a.action_type == ActionType::MoveElement)
            .unwrap();
        assert_eq!(mv.path, "/library/shelf/book");
        assert_eq!(mv.new_value.as_deref(), Some("/library"));
    }

    #[test]
    fn unexpected_element_without_home_is_removed() {
        let actions = plan_for(
            EMPLOYEE_XSD,
            "<employee><firstName>J</firstName><lastName>D</lastName><intruder/></employee>",
        );
        assert!(actions
            .iter()
            .any(|a| a.action_type == ActionType::RemoveElement && a.element_name == "intruder"));
    }

    #[test]
    fn every_supported_error_yields_an_action() {
        let actions = plan_for(
            EMPLOYEE_XSD,
            "<employee><lastName>D</lastName><age>banana</age></employee>",
        );
        // missing firstName, order irrelevant, age invalid
        assert!(actions
            .iter()
            .any(|a| a.action_type == ActionType::AddElement));
        assert!(actions
            .iter()
            .any(|a| a.action_type == ActionType::ChangeTextContent));
    }
}
