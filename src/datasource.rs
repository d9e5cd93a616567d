//! Flat key/value state of a concept's form controls.

use std::collections::btree_map;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::ast::{Scalar, Value};
use crate::error::QueryError;
use crate::operator::Operator;

const OPERATOR_KEY_SUFFIX: &str = "_operator";

/// Form-control name → value.
///
/// Keys follow the grammar in [`crate::field_key`]; values are scalars or
/// lists of scalars. Iteration is in key order, so nothing downstream depends
/// on the order edits were made in.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Datasource {
    entries: BTreeMap<String, Value>,
}

impl Datasource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.entries.insert(key.into(), value.into())
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.entries.remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, Value> {
        self.entries.iter()
    }

    /// Applies one edit made to a form control.
    ///
    /// A missing or `null` value means the control no longer applies (it was
    /// hidden, typically after an operator change) and removes the key. Lists
    /// compare as sets. Returns whether the datasource changed.
    pub fn apply_change(&mut self, key: &str, value: Option<Value>) -> bool {
        let value = match value {
            Some(value) if !value.is_null() => value,
            _ => return self.entries.remove(key).is_some(),
        };

        let unchanged = match (self.entries.get(key), &value) {
            (Some(Value::List(current)), Value::List(new)) => same_members(current, new),
            (Some(current), _) => *current == value,
            (None, _) => false,
        };
        if unchanged {
            return false;
        }

        self.entries.insert(key.to_string(), value);
        true
    }

    /// A datasource can become a query only when it is non-empty, holds no
    /// empty value, and carries at least one constraint. An operator key on
    /// its own is a constraint only for the null tests.
    pub fn check_complete(&self) -> Result<(), QueryError> {
        if self.is_empty() {
            return Err(QueryError::EmptyDatasource { key: None });
        }

        if let Some((key, _)) = self.iter().find(|(_, value)| value.is_empty()) {
            return Err(QueryError::EmptyDatasource { key: Some(key.clone()) });
        }

        let constrained = self.iter().any(|(key, value)| {
            if !key.ends_with(OPERATOR_KEY_SUFFIX) {
                return true;
            }
            value
                .as_str()
                .map(|uid| Operator::parse(uid).is_null_test())
                .unwrap_or(false)
        });
        if !constrained {
            return Err(QueryError::EmptyDatasource { key: None });
        }

        Ok(())
    }
}

fn same_members(current: &[Scalar], new: &[Scalar]) -> bool {
    current.len() == new.len() && new.iter().all(|value| current.contains(value))
}

impl<'a> IntoIterator for &'a Datasource {
    type Item = (&'a String, &'a Value);
    type IntoIter = btree_map::Iter<'a, String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Datasource {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}
