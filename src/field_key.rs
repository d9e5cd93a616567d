//! Field-key grammar shared by the query builder and its inverse.
//!
//! A datasource key names one form control of a concept:
//!
//! ```text
//! <concept>_<fieldspec>                 simple field
//! <concept>_<fieldspec>_input0|input1   one end of a compound control
//! <concept>_<fieldspec>_operator        operator selector
//! <id>OR<id>[OR<id>...]                 variable-field selector (no concept)
//! ```
//!
//! `<fieldspec>` is either a single field id or several ids joined with `OR`,
//! which marks a variable field. Ids are kept sorted by numeric value so that
//! the same set of ids always formats to the same key.

use std::cmp::Ordering;
use std::fmt;

use crate::ast::ConceptId;
use crate::lexer::Lexer;
use crate::parser::{ParseError, Parser};

const OR_SEPARATOR: &str = "OR";

/// The field id (or the ordered set of candidate ids) a key refers to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldSpec {
    ids: Vec<String>,
}

impl FieldSpec {
    /// Builds a spec from field ids, sorting them by numeric value.
    /// Returns `None` for an empty id list.
    pub fn new<I, S>(ids: I) -> Option<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut ids: Vec<String> = ids.into_iter().map(Into::into).collect();
        if ids.is_empty() {
            return None;
        }
        ids.sort_by(|a, b| numeric_cmp(a, b));
        Some(Self { ids })
    }

    pub fn single(id: impl Into<String>) -> Self {
        Self { ids: vec![id.into()] }
    }

    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    /// A variable field offers more than one candidate id.
    pub fn is_variable(&self) -> bool {
        self.ids.len() > 1
    }
}

impl Ord for FieldSpec {
    fn cmp(&self, other: &Self) -> Ordering {
        for (a, b) in self.ids.iter().zip(other.ids.iter()) {
            match numeric_cmp(a, b) {
                Ordering::Equal => continue,
                ord => return ord,
            }
        }
        self.ids
            .len()
            .cmp(&other.ids.len())
            .then_with(|| self.ids.cmp(&other.ids))
    }
}

impl PartialOrd for FieldSpec {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for FieldSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.ids.join(OR_SEPARATOR))
    }
}

/// Which sub-part of a compound control a value belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Suffix {
    Input0,
    Input1,
    Operator,
}

impl Suffix {
    pub fn as_str(&self) -> &'static str {
        match self {
            Suffix::Input0 => "input0",
            Suffix::Input1 => "input1",
            Suffix::Operator => "operator",
        }
    }
}

/// A key that belongs to a concept's form control.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldKey {
    /// `None` when the key starts with a bare `_`.
    pub concept_id: Option<ConceptId>,
    pub spec: FieldSpec,
    pub suffix: Option<Suffix>,
}

impl fmt::Display for FieldKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(concept_id) = self.concept_id {
            write!(f, "{}", concept_id)?;
        }
        write!(f, "_{}", self.spec)?;
        if let Some(suffix) = self.suffix {
            write!(f, "_{}", suffix.as_str())?;
        }
        Ok(())
    }
}

/// The shape of a datasource key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyShape {
    Field(FieldKey),
    /// Chooses which concrete id a variable field resolves to.
    VariableSelector(FieldSpec),
}

pub fn parse_field_key(key: &str) -> Result<KeyShape, ParseError> {
    let tokens: Vec<_> = Lexer::new(key).collect();
    Parser::new(&tokens).parse()
}

pub fn format_field_key<S: AsRef<str>>(
    concept_id: Option<ConceptId>,
    field_ids: &[S],
    suffix: Option<Suffix>,
) -> Option<String> {
    let spec = FieldSpec::new(field_ids.iter().map(|id| id.as_ref().to_string()))?;
    Some(
        FieldKey {
            concept_id,
            spec,
            suffix,
        }
        .to_string(),
    )
}

/// Orders two digit strings by numeric value without parsing them.
pub fn numeric_cmp(a: &str, b: &str) -> Ordering {
    let a = a.trim_start_matches('0');
    let b = b.trim_start_matches('0');
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field(key: &str) -> FieldKey {
        match parse_field_key(key).unwrap() {
            KeyShape::Field(field) => field,
            other => panic!("Expected a field key, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_simple_field() {
        let key = field("93_170");
        assert_eq!(key.concept_id, Some(93));
        assert_eq!(key.spec.ids(), ["170"]);
        assert_eq!(key.suffix, None);
    }

    #[test]
    fn test_parse_suffixes() {
        assert_eq!(field("50_157_input0").suffix, Some(Suffix::Input0));
        assert_eq!(field("50_157_input1").suffix, Some(Suffix::Input1));
        assert_eq!(field("50_157_operator").suffix, Some(Suffix::Operator));
    }

    #[test]
    fn test_parse_variable_field() {
        let key = field("1_152OR142OR151_input1");
        assert_eq!(key.concept_id, Some(1));
        assert_eq!(key.spec.ids(), ["142", "151", "152"]);
        assert!(key.spec.is_variable());
    }

    #[test]
    fn test_parse_missing_concept() {
        let key = field("_143");
        assert_eq!(key.concept_id, None);
        assert_eq!(key.to_string(), "_143");
    }

    #[test]
    fn test_parse_variable_selector() {
        let shape = parse_field_key("142OR151OR152").unwrap();
        let spec = FieldSpec::new(["142", "151", "152"]).unwrap();
        assert_eq!(shape, KeyShape::VariableSelector(spec));
    }

    #[test]
    fn test_rejects_malformed_keys() {
        for key in ["", "143", "32_", "32_32_", "32_32_value", "1OR2_3", "a_b", "32_32_operator_x"] {
            assert!(parse_field_key(key).is_err(), "{} should not parse", key);
        }
    }

    #[test]
    fn test_format_sorts_ids() {
        let formatted = format_field_key(Some(1), &["152", "9", "142"], Some(Suffix::Operator));
        assert_eq!(formatted.as_deref(), Some("1_9OR142OR152_operator"));
        assert_eq!(format_field_key::<&str>(Some(1), &[], None), None);
    }

    #[test]
    fn test_format_then_parse_is_stable() {
        let formatted = format_field_key(Some(7), &["20", "3"], Some(Suffix::Input0)).unwrap();
        assert_eq!(field(&formatted).to_string(), formatted);
    }

    #[test]
    fn test_numeric_cmp() {
        assert_eq!(numeric_cmp("9", "10"), Ordering::Less);
        assert_eq!(numeric_cmp("010", "10"), Ordering::Equal);
        assert_eq!(numeric_cmp("151", "142"), Ordering::Greater);
    }
}
