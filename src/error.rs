use thiserror::Error;

use crate::ast::ConceptId;

/// Errors raised while translating between datasources and query trees.
///
/// `EmptyDatasource` is a user-input problem and should be shown as a
/// validation message. The other variants mean the form-naming contract and
/// this crate disagree and are worth reporting as defects.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum QueryError {
    #[error("No value has been specified{}", empty_field_suffix(.key))]
    EmptyDatasource { key: Option<String> },
    #[error("Unable to determine field {field} in concept {concept_id}")]
    UnresolvedField { field: String, concept_id: ConceptId },
    #[error("Malformed query node: {0}")]
    MalformedQuery(String),
    #[error("Invalid condition on field {field}: {reason}")]
    InvalidCondition { field: String, reason: String },
}

fn empty_field_suffix(key: &Option<String>) -> String {
    match key {
        Some(key) => format!(" for {}", key),
        None => ".".to_string(),
    }
}

impl QueryError {
    pub(crate) fn malformed(message: impl Into<String>) -> Self {
        QueryError::MalformedQuery(message.into())
    }

    /// Input errors are recoverable by correcting the form.
    pub fn is_user_input(&self) -> bool {
        matches!(self, QueryError::EmptyDatasource { .. })
    }
}
