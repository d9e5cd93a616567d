//! Operators understood by the query server.
//!
//! Every operator has a base kind and may be negated; on the wire it is a uid
//! string such as `exact`, `-in` or `range`. Unknown uids are kept verbatim so
//! that a tree received from the server can be sent back unchanged.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::ast::{Scalar, Value};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum OperatorKind {
    Exact,
    IExact,
    Contains,
    IContains,
    Lt,
    Gt,
    Lte,
    Gte,
    IsNull,
    In,
    Range,
    Other(String),
}

/// How an operator expects its value to be shaped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatorClass {
    /// One scalar value.
    Primitive,
    /// A list of values (`in`) or two endpoints (`range`).
    Sequence,
    /// No value at all.
    NullTest,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Operator {
    kind: OperatorKind,
    negated: bool,
}

impl Operator {
    pub const EXACT: Operator = Operator::new(OperatorKind::Exact, false);
    pub const IN: Operator = Operator::new(OperatorKind::In, false);
    pub const NOT_IN: Operator = Operator::new(OperatorKind::In, true);
    pub const RANGE: Operator = Operator::new(OperatorKind::Range, false);
    pub const IS_NULL: Operator = Operator::new(OperatorKind::IsNull, false);

    pub const fn new(kind: OperatorKind, negated: bool) -> Self {
        Self { kind, negated }
    }

    pub fn parse(uid: &str) -> Self {
        let (negated, name) = match uid.strip_prefix('-') {
            Some(name) => (true, name),
            None => (false, uid),
        };
        let kind = match name {
            "exact" => OperatorKind::Exact,
            "iexact" => OperatorKind::IExact,
            "contains" => OperatorKind::Contains,
            "icontains" => OperatorKind::IContains,
            "lt" => OperatorKind::Lt,
            "gt" => OperatorKind::Gt,
            "lte" => OperatorKind::Lte,
            "gte" => OperatorKind::Gte,
            "isnull" => OperatorKind::IsNull,
            "in" => OperatorKind::In,
            "range" => OperatorKind::Range,
            other => OperatorKind::Other(other.to_string()),
        };
        Self { kind, negated }
    }

    pub fn kind(&self) -> &OperatorKind {
        &self.kind
    }

    pub fn negated(&self) -> bool {
        self.negated
    }

    pub fn negate(&self) -> Self {
        Self::new(self.kind.clone(), !self.negated)
    }

    pub fn class(&self) -> OperatorClass {
        match self.kind {
            OperatorKind::IsNull => OperatorClass::NullTest,
            OperatorKind::In | OperatorKind::Range => OperatorClass::Sequence,
            _ => OperatorClass::Primitive,
        }
    }

    /// The `in` / `-in` family.
    pub fn is_choice(&self) -> bool {
        self.kind == OperatorKind::In
    }

    pub fn is_null_test(&self) -> bool {
        self.class() == OperatorClass::NullTest
    }

    /// Operators whose operands are compared by magnitude.
    pub fn is_ordered(&self) -> bool {
        matches!(
            self.kind,
            OperatorKind::Lt | OperatorKind::Gt | OperatorKind::Lte | OperatorKind::Gte | OperatorKind::Range
        )
    }

    /// The per-value operator a multi-value choice splits into:
    /// `in` becomes `exact` and `-in` becomes `-exact`.
    pub fn element_operator(&self) -> Option<Operator> {
        self.is_choice()
            .then(|| Operator::new(OperatorKind::Exact, self.negated))
    }

    /// Checks that `value` has the shape this operator expects.
    pub fn check(&self, value: Option<&Value>) -> bool {
        match (&self.kind, value) {
            (OperatorKind::Other(_), _) => true,
            (OperatorKind::IsNull, None) => true,
            (OperatorKind::IsNull, Some(Value::Scalar(Scalar::Bool(_)))) => true,
            (OperatorKind::IsNull, Some(_)) => false,
            (OperatorKind::Range, Some(Value::List(values))) => values.len() == 2,
            (OperatorKind::In, Some(Value::List(values))) => !values.is_empty(),
            (OperatorKind::Range | OperatorKind::In, _) => false,
            (_, Some(Value::Scalar(scalar))) => !scalar.is_null(),
            (_, _) => false,
        }
    }

    pub fn verbose_name(&self) -> String {
        let name = match self.kind {
            OperatorKind::Exact | OperatorKind::IExact => "is equal to",
            OperatorKind::Contains | OperatorKind::IContains => "contains the text",
            OperatorKind::Lt => "is less than",
            OperatorKind::Gt => "is greater than",
            OperatorKind::Lte => "is less than or equal to",
            OperatorKind::Gte => "is greater than or equal to",
            OperatorKind::IsNull => "is null",
            OperatorKind::In => "is either",
            OperatorKind::Range => "is between",
            OperatorKind::Other(ref name) => return format!("{}{}", if self.negated { "not " } else { "" }, name),
        };
        if !self.negated {
            return name.to_string();
        }
        match self.kind {
            OperatorKind::Exact | OperatorKind::IExact => "is not equal to".to_string(),
            OperatorKind::Contains | OperatorKind::IContains => "does not contain".to_string(),
            OperatorKind::In => "is not".to_string(),
            _ => name.replacen("is ", "is not ", 1),
        }
    }

    /// Human-readable rendering of this operator applied to `value`.
    pub fn text(&self, value: Option<&Value>) -> String {
        match (self.class(), value) {
            (OperatorClass::NullTest, _) => self.stringify(&Scalar::Null),
            (_, Some(Value::List(values))) if self.kind == OperatorKind::In => {
                let words: Vec<String> = values.iter().map(|v| self.stringify(v)).collect();
                match words.split_last() {
                    Some((last, [])) => {
                        format!("{} {}", Operator::new(OperatorKind::Exact, self.negated).verbose_name(), last)
                    }
                    Some((last, rest)) => format!("{} {} or {}", self.verbose_name(), rest.join(", "), last),
                    None => self.verbose_name(),
                }
            }
            (_, Some(Value::List(values))) if self.kind == OperatorKind::Range => {
                let words: Vec<String> = values.iter().map(|v| self.stringify(v)).collect();
                format!("{} {}", self.verbose_name(), words.join(" and "))
            }
            (_, Some(Value::List(values))) => {
                let words: Vec<String> = values.iter().map(|v| self.stringify(v)).collect();
                format!("{} {}", self.verbose_name(), words.join(", "))
            }
            (_, Some(Value::Scalar(scalar))) => format!("{} {}", self.verbose_name(), self.stringify(scalar)),
            (_, None) => self.verbose_name(),
        }
    }

    fn stringify(&self, scalar: &Scalar) -> String {
        match scalar {
            Scalar::Null if self.negated => "has any value".to_string(),
            Scalar::Null => "has no value".to_string(),
            Scalar::Bool(true) => "Yes".to_string(),
            Scalar::Bool(false) => "No".to_string(),
            Scalar::Number(n) => n.to_string(),
            Scalar::String(s) => s.clone(),
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.negated {
            write!(f, "-")?;
        }
        match &self.kind {
            OperatorKind::Exact => write!(f, "exact"),
            OperatorKind::IExact => write!(f, "iexact"),
            OperatorKind::Contains => write!(f, "contains"),
            OperatorKind::IContains => write!(f, "icontains"),
            OperatorKind::Lt => write!(f, "lt"),
            OperatorKind::Gt => write!(f, "gt"),
            OperatorKind::Lte => write!(f, "lte"),
            OperatorKind::Gte => write!(f, "gte"),
            OperatorKind::IsNull => write!(f, "isnull"),
            OperatorKind::In => write!(f, "in"),
            OperatorKind::Range => write!(f, "range"),
            OperatorKind::Other(name) => write!(f, "{}", name),
        }
    }
}

impl FromStr for Operator {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Operator::parse(s))
    }
}

impl Serialize for Operator {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Operator {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let uid = String::deserialize(deserializer)?;
        Ok(Operator::parse(&uid))
    }
}
