//! Structural checks on a query tree before it is sent to the server.

use log::warn;

use crate::ast::{FieldNode, QueryNode};
use crate::error::QueryError;
use crate::field_key::FieldSpec;
use crate::operator::OperatorKind;

/// Logic nodes need at least two children; field nodes need a known operator
/// with a value of the shape that operator takes.
pub fn validate(node: &QueryNode) -> Result<(), QueryError> {
    match node {
        QueryNode::Field(field) => validate_field(field),
        QueryNode::Logic(logic) => {
            if logic.children.len() < 2 {
                let e = QueryError::malformed(format!(
                    "\"{}\" node needs at least two children, found {}",
                    logic.logic.as_str(),
                    logic.children.len()
                ));
                warn!("{}", e);
                return Err(e);
            }
            logic.children.iter().try_for_each(validate)
        }
    }
}

fn validate_field(field: &FieldNode) -> Result<(), QueryError> {
    let name = field
        .id
        .clone()
        .or_else(|| {
            let ids = field.id_choices.as_ref()?;
            FieldSpec::new(ids.iter().cloned()).map(|spec| spec.to_string())
        })
        .unwrap_or_default();

    if let OperatorKind::Other(uid) = field.operator.kind() {
        return Err(QueryError::InvalidCondition {
            field: name,
            reason: format!("unknown operator {}", uid),
        });
    }

    if !field.operator.check(field.value.as_ref()) {
        return Err(QueryError::InvalidCondition {
            reason: format!("operator {} cannot take {}", field.operator, describe_value(field)),
            field: name,
        });
    }

    Ok(())
}

fn describe_value(field: &FieldNode) -> String {
    match &field.value {
        None => "no value".to_string(),
        Some(value) => serde_json::to_string(value).unwrap_or_default(),
    }
}
