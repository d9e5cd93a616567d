//! The set of per-concept constraints that make up a session query.

use indexmap::IndexMap;
use log::debug;

use crate::ast::{ConceptId, LogicNode, LogicType, QueryNode};
use crate::builder::datasource_from_query;
use crate::datasource::Datasource;
use crate::error::QueryError;

/// What [`CriteriaSet::upsert`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CriterionChange {
    Added,
    Updated,
}

/// Constraints keyed by concept id, in the order they were first added.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CriteriaSet {
    criteria: IndexMap<ConceptId, QueryNode>,
}

impl CriteriaSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a concept's constraint, replacing any earlier one in place.
    pub fn upsert(&mut self, node: QueryNode) -> Result<CriterionChange, QueryError> {
        let concept_id = node
            .concept_id()
            .ok_or_else(|| QueryError::malformed("criterion without concept_id"))?;
        let change = match self.criteria.insert(concept_id, node) {
            Some(_) => CriterionChange::Updated,
            None => CriterionChange::Added,
        };
        debug!("criterion for concept {}: {:?}", concept_id, change);
        Ok(change)
    }

    pub fn remove(&mut self, concept_id: ConceptId) -> Option<QueryNode> {
        self.criteria.shift_remove(&concept_id)
    }

    pub fn clear(&mut self) {
        self.criteria.clear();
    }

    pub fn get(&self, concept_id: ConceptId) -> Option<&QueryNode> {
        self.criteria.get(&concept_id)
    }

    pub fn len(&self) -> usize {
        self.criteria.len()
    }

    pub fn is_empty(&self) -> bool {
        self.criteria.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ConceptId, &QueryNode)> {
        self.criteria.iter().map(|(concept_id, node)| (*concept_id, node))
    }

    /// The query for the whole session: nothing, the only constraint, or an
    /// "and" of every constraint.
    pub fn session_query(&self) -> Option<QueryNode> {
        match self.criteria.len() {
            0 => None,
            1 => self.criteria.values().next().cloned(),
            _ => Some(QueryNode::Logic(LogicNode {
                logic: LogicType::And,
                concept_id: None,
                children: self.criteria.values().cloned().collect(),
            })),
        }
    }

    /// Restores a saved session query. A root with a concept id is a single
    /// constraint; a root without one holds a constraint per child.
    pub fn load(store: &QueryNode) -> Result<Self, QueryError> {
        let mut set = Self::new();
        match store {
            QueryNode::Logic(logic) if logic.concept_id.is_none() => {
                for child in &logic.children {
                    set.upsert(child.clone())?;
                }
            }
            _ => {
                set.upsert(store.clone())?;
            }
        }
        Ok(set)
    }

    /// The datasource that reproduces a saved constraint in its form.
    pub fn datasource_for(&self, concept_id: ConceptId) -> Result<Option<Datasource>, QueryError> {
        self.get(concept_id).map(datasource_from_query).transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn node(json: serde_json::Value) -> QueryNode {
        serde_json::from_value(json).unwrap()
    }

    fn hearing() -> QueryNode {
        node(json!({"concept_id": 93, "id": "170", "operator": "exact", "value": false}))
    }

    fn audiogram() -> QueryNode {
        node(json!({"concept_id": 50, "id": "157", "operator": "range", "value": [3.6, 5.9]}))
    }

    #[test]
    fn test_upsert() {
        let mut set = CriteriaSet::new();
        assert_eq!(set.upsert(hearing()), Ok(CriterionChange::Added));
        assert_eq!(set.upsert(audiogram()), Ok(CriterionChange::Added));

        let updated = node(json!({"concept_id": 93, "id": "170", "operator": "exact", "value": true}));
        assert_eq!(set.upsert(updated.clone()), Ok(CriterionChange::Updated));
        assert_eq!(set.len(), 2);
        assert_eq!(set.get(93), Some(&updated));
        assert_eq!(set.iter().map(|(id, _)| id).collect::<Vec<_>>(), vec![93, 50]);

        let anonymous = node(json!({"id": "170", "operator": "exact", "value": true}));
        assert!(matches!(set.upsert(anonymous), Err(QueryError::MalformedQuery(_))));
    }

    #[test]
    fn test_session_query() {
        let mut set = CriteriaSet::new();
        assert_eq!(set.session_query(), None);

        set.upsert(hearing()).unwrap();
        assert_eq!(set.session_query(), Some(hearing()));

        set.upsert(audiogram()).unwrap();
        let expected = node(json!({"type": "and", "children": [
            {"concept_id": 93, "id": "170", "operator": "exact", "value": false},
            {"concept_id": 50, "id": "157", "operator": "range", "value": [3.6, 5.9]}
        ]}));
        assert_eq!(set.session_query(), Some(expected));

        assert_eq!(set.remove(93), Some(hearing()));
        assert_eq!(set.remove(93), None);
        assert_eq!(set.session_query(), Some(audiogram()));

        set.clear();
        assert!(set.is_empty());
    }

    #[test]
    fn test_load() {
        let single = CriteriaSet::load(&audiogram()).unwrap();
        assert_eq!(single.len(), 1);

        let expansion = node(json!({"type": "or", "concept_id": 93, "children": [
            {"concept_id": 93, "id": "170", "operator": "exact", "value": false},
            {"concept_id": 93, "id": "170", "operator": "exact", "value": true}
        ]}));
        let set = CriteriaSet::load(&expansion).unwrap();
        assert_eq!(set.get(93), Some(&expansion));

        let mut saved = CriteriaSet::new();
        saved.upsert(expansion).unwrap();
        saved.upsert(audiogram()).unwrap();
        let restored = CriteriaSet::load(&saved.session_query().unwrap()).unwrap();
        assert_eq!(restored, saved);
    }

    #[test]
    fn test_datasource_for() {
        let mut set = CriteriaSet::new();
        set.upsert(audiogram()).unwrap();

        let source = set.datasource_for(50).unwrap().unwrap();
        assert_eq!(
            serde_json::to_value(&source).unwrap(),
            json!({"50_157_input0": 3.6, "50_157_input1": 5.9, "50_157_operator": "range"})
        );
        assert_eq!(set.datasource_for(93), Ok(None));
    }
}
