//! Translation between a concept's datasource and its query tree.
//!
//! ```text
//! build_query()
//!   ├─ Datasource::check_complete()
//!   ├─ collect_fields()        key → (fieldspec, val0 | val1 | op | pk)
//!   │    └─ operator keys attach in a second pass
//!   ├─ synthesize()            one Field node per fieldspec
//!   ├─ expand()                multi-value in / -in on single-assertion datatypes
//!   └─ one node, or an "and" of all of them
//!
//! datasource_from_query()
//!   ├─ Field node → <concept>_<fieldspec>[_inputN] + _operator (+ selector key)
//!   └─ Logic node → children, or the collapsed choice an expansion came from
//! ```

use std::collections::BTreeMap;

use log::{debug, trace, warn};

use crate::ast::{ConceptId, FieldNode, LogicNode, LogicType, QueryNode, Scalar, Value};
use crate::config::{Datatype, DatatypeLookup, ExpansionPolicy, QueryConfig};
use crate::datasource::Datasource;
use crate::error::QueryError;
use crate::field_key::{parse_field_key, FieldKey, FieldSpec, KeyShape, Suffix};
use crate::operator::{Operator, OperatorKind};

/// Values gathered for one fieldspec while scanning a datasource.
#[derive(Debug, Default)]
struct FieldValues {
    val0: Option<Value>,
    val1: Option<Value>,
    op: Option<Operator>,
    /// Concrete id chosen for a variable field.
    pk: Option<String>,
}

/// Builds query trees from datasources for one field catalog.
pub struct QueryBuilder<'a> {
    lookup: &'a dyn DatatypeLookup,
    policy: ExpansionPolicy,
}

impl<'a> QueryBuilder<'a> {
    pub fn new(lookup: &'a dyn DatatypeLookup) -> Self {
        Self {
            lookup,
            policy: ExpansionPolicy::default(),
        }
    }

    pub fn with_policy(lookup: &'a dyn DatatypeLookup, policy: ExpansionPolicy) -> Self {
        Self { lookup, policy }
    }

    pub fn from_config(config: &'a QueryConfig) -> Self {
        Self {
            lookup: config,
            policy: config.expand_datatypes.clone(),
        }
    }

    /// Translates the datasource of the active concept into a query tree.
    pub fn build_query(&self, concept_id: ConceptId, datasource: &Datasource) -> Result<QueryNode, QueryError> {
        datasource.check_complete()?;

        let mut nodes = Vec::new();
        for (spec, values) in collect_fields(datasource) {
            let field = self.synthesize(concept_id, &spec, values)?;
            nodes.push(self.expand(concept_id, field));
        }

        if nodes.len() == 1 {
            return Ok(nodes.remove(0));
        }
        if nodes.is_empty() {
            // Every key that carried a value failed to parse.
            return Err(QueryError::EmptyDatasource { key: None });
        }

        Ok(QueryNode::Logic(LogicNode {
            logic: LogicType::And,
            concept_id: Some(concept_id),
            children: nodes,
        }))
    }

    fn synthesize(&self, concept_id: ConceptId, spec: &FieldSpec, values: FieldValues) -> Result<FieldNode, QueryError> {
        let unresolved = || {
            warn!("unable to determine field {} in concept {}", spec, concept_id);
            QueryError::UnresolvedField {
                field: spec.to_string(),
                concept_id,
            }
        };

        let (id, id_choices) = if spec.is_variable() {
            let Some(pk) = values.pk else {
                return Err(unresolved());
            };
            (pk, Some(spec.ids().to_vec()))
        } else {
            (spec.ids()[0].clone(), None)
        };
        let numeric = self.lookup.datatype(&id) == Some(Datatype::Number);

        let val0 = values.val0.filter(|v| !v.is_null());
        let val1 = values.val1.filter(|v| !v.is_null());

        let (operator, value) = match (val0, val1, values.op) {
            (Some(Value::Scalar(low)), Some(Value::Scalar(high)), Some(op)) => {
                let range = vec![low.coerce_number(), high.coerce_number()];
                (op, Some(Value::List(range)))
            }
            (Some(Value::Scalar(scalar)), None, Some(op)) => {
                let scalar = if numeric || op.is_ordered() { scalar.coerce_number() } else { scalar };
                (op, Some(Value::Scalar(scalar)))
            }
            (Some(Value::List(choices)), _, op) => {
                let choices = if numeric {
                    choices.into_iter().map(Scalar::coerce_number).collect()
                } else {
                    choices
                };
                (op.unwrap_or(Operator::IN), Some(Value::List(choices)))
            }
            (None, None, Some(op)) => (op, None),
            (Some(Value::Scalar(scalar)), None, None) => {
                let scalar = if numeric { scalar.coerce_number() } else { scalar };
                (Operator::EXACT, Some(Value::Scalar(scalar)))
            }
            _ => return Err(unresolved()),
        };

        trace!("field {} of concept {} resolved to {} {:?}", spec, concept_id, operator, value);

        Ok(FieldNode {
            concept_id: Some(concept_id),
            id: Some(id),
            id_choices,
            operator,
            value,
        })
    }

    /// Splits a multi-value choice into one node per value when the field's
    /// datatype cannot hold a list on the server. `in` joins the values with
    /// "or", `-in` with "and"; a `null` value becomes a null test.
    fn expand(&self, concept_id: ConceptId, field: FieldNode) -> QueryNode {
        let Some(element_operator) = field.operator.element_operator() else {
            return QueryNode::Field(field);
        };
        let datatype = field.id.as_deref().and_then(|id| self.lookup.datatype(id));
        if !self.policy.expands(datatype) {
            return QueryNode::Field(field);
        }

        let values = match &field.value {
            Some(Value::List(values)) if !values.is_empty() => values.clone(),
            Some(Value::Scalar(scalar)) => vec![scalar.clone()],
            _ => return QueryNode::Field(field),
        };

        let negated = field.operator.negated();
        let mut children: Vec<QueryNode> = values
            .into_iter()
            .map(|value| {
                let (operator, value) = if value.is_null() {
                    (Operator::new(OperatorKind::IsNull, negated), None)
                } else {
                    (element_operator.clone(), Some(Value::Scalar(value)))
                };
                QueryNode::Field(FieldNode {
                    operator,
                    value,
                    ..field.clone()
                })
            })
            .collect();

        debug!(
            "expanded {} values of field {:?} in concept {}",
            children.len(),
            field.id,
            concept_id
        );

        if children.len() == 1 {
            return children.remove(0);
        }

        QueryNode::Logic(LogicNode {
            logic: if negated { LogicType::And } else { LogicType::Or },
            concept_id: Some(concept_id),
            children,
        })
    }
}

/// Groups datasource keys by fieldspec. Operator keys are attached after
/// every value key has been seen, and only to fieldspecs that carry a value,
/// except for null tests which need none.
fn collect_fields(datasource: &Datasource) -> BTreeMap<FieldSpec, FieldValues> {
    let mut fields: BTreeMap<FieldSpec, FieldValues> = BTreeMap::new();
    let mut operators = Vec::new();

    for (key, value) in datasource {
        match parse_field_key(key) {
            Ok(KeyShape::Field(FieldKey { spec, suffix, .. })) => match suffix {
                None | Some(Suffix::Input0) => fields.entry(spec).or_default().val0 = Some(value.clone()),
                Some(Suffix::Input1) => fields.entry(spec).or_default().val1 = Some(value.clone()),
                Some(Suffix::Operator) => operators.push((spec, value)),
            },
            Ok(KeyShape::VariableSelector(spec)) => match selected_id(value) {
                Some(pk) => fields.entry(spec).or_default().pk = Some(pk),
                None => debug!("variable field selector {} holds no id: {:?}", key, value),
            },
            Err(e) => debug!("skipping datasource key {}: {}", key, e),
        }
    }

    for (spec, value) in operators {
        let Some(uid) = value.as_str() else {
            debug!("operator for field {} is not a string: {:?}", spec, value);
            continue;
        };
        let op = Operator::parse(uid);
        match fields.get_mut(&spec) {
            Some(field) => field.op = Some(op),
            None if op.is_null_test() => {
                fields.insert(
                    spec,
                    FieldValues {
                        op: Some(op),
                        ..Default::default()
                    },
                );
            }
            // An optional field may keep its operator after its value was cleared.
            None => debug!("ignoring operator {} for field {} without a value", op, spec),
        }
    }

    fields
}

fn selected_id(value: &Value) -> Option<String> {
    match value {
        Value::Scalar(Scalar::String(id)) if !id.is_empty() => Some(id.clone()),
        Value::Scalar(Scalar::Number(id)) => Some(id.to_string()),
        _ => None,
    }
}

/// Translates a query tree into the datasource that rebuilds it, so saved
/// constraints can be loaded back into their forms.
pub fn datasource_from_query(node: &QueryNode) -> Result<Datasource, QueryError> {
    let mut datasource = Datasource::new();
    write_node(node, None, &mut datasource).inspect_err(|e| warn!("{}", e))?;
    Ok(datasource)
}

/// Convenience wrapper around [`QueryBuilder::build_query`] with the default
/// expansion policy.
pub fn build_query(
    concept_id: ConceptId,
    datasource: &Datasource,
    lookup: &dyn DatatypeLookup,
) -> Result<QueryNode, QueryError> {
    QueryBuilder::new(lookup).build_query(concept_id, datasource)
}

fn write_node(node: &QueryNode, inherited: Option<ConceptId>, datasource: &mut Datasource) -> Result<(), QueryError> {
    match node {
        QueryNode::Field(field) => write_field(field, field.concept_id.or(inherited), datasource),
        QueryNode::Logic(logic) => {
            let concept_id = logic.concept_id.or(inherited);
            if let Some(choice) = collapse_expansion(logic) {
                return write_field(&choice, choice.concept_id.or(concept_id), datasource);
            }
            for child in &logic.children {
                write_node(child, concept_id, datasource)?;
            }
            Ok(())
        }
    }
}

fn write_field(field: &FieldNode, concept_id: Option<ConceptId>, datasource: &mut Datasource) -> Result<(), QueryError> {
    let spec = match (&field.id, &field.id_choices) {
        (_, Some(choices)) => {
            let spec = FieldSpec::new(choices.iter().cloned())
                .ok_or_else(|| QueryError::malformed("empty id_choices"))?;
            // Variable fields are grouped under the full candidate list; the
            // selector key records which one was picked.
            if let Some(id) = &field.id {
                datasource.insert(spec.to_string(), id.as_str());
            }
            spec
        }
        (Some(id), None) => FieldSpec::single(id.clone()),
        (None, None) => return Err(QueryError::malformed("missing id and id_choices")),
    };

    let key = FieldKey {
        concept_id,
        spec,
        suffix: None,
    };
    let with_suffix = |suffix: Suffix| {
        FieldKey {
            suffix: Some(suffix),
            ..key.clone()
        }
        .to_string()
    };

    match &field.value {
        // Range endpoints go to the two inputs of a compound control; any other
        // list stays under the plain key.
        Some(Value::List(bounds)) if *field.operator.kind() == OperatorKind::Range && bounds.len() == 2 => {
            datasource.insert(with_suffix(Suffix::Input0), bounds[0].clone());
            datasource.insert(with_suffix(Suffix::Input1), bounds[1].clone());
        }
        Some(value) if !value.is_null() => {
            datasource.insert(key.to_string(), value.clone());
        }
        _ => {}
    }

    datasource.insert(with_suffix(Suffix::Operator), field.operator.to_string());
    Ok(())
}

/// Recognizes a Logic node produced by [`QueryBuilder::expand`] and returns
/// the single choice constraint it came from.
fn collapse_expansion(logic: &LogicNode) -> Option<FieldNode> {
    let mut fields = logic.children.iter().map(|child| match child {
        QueryNode::Field(field) => Some(field),
        QueryNode::Logic(_) => None,
    });
    let first = fields.next()??;
    if logic.children.len() < 2 {
        return None;
    }

    let negated = first.operator.negated();
    let expected = if negated { LogicType::And } else { LogicType::Or };
    if logic.logic != expected {
        return None;
    }

    let mut values = Vec::with_capacity(logic.children.len());
    for field in std::iter::once(Some(first)).chain(fields) {
        let field = field?;
        if field.id != first.id || field.id_choices != first.id_choices || field.concept_id != first.concept_id {
            return None;
        }
        if field.operator.negated() != negated {
            return None;
        }
        match (field.operator.kind(), &field.value) {
            (OperatorKind::Exact, Some(Value::Scalar(scalar))) if !scalar.is_null() => values.push(scalar.clone()),
            (OperatorKind::IsNull, None) => values.push(Scalar::Null),
            _ => return None,
        }
    }

    Some(FieldNode {
        operator: Operator::new(OperatorKind::In, negated),
        value: Some(Value::List(values)),
        ..first.clone()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn catalog() -> QueryConfig {
        QueryConfig::default()
            .with_field("170", Datatype::Boolean)
            .with_field("171", Datatype::NullBoolean)
            .with_field("119", Datatype::String)
            .with_field("157", Datatype::Number)
            .with_field("143", Datatype::Boolean)
            .with_field("151", Datatype::Number)
    }

    fn ds(json: serde_json::Value) -> Datasource {
        serde_json::from_value(json).unwrap()
    }

    fn node(json: serde_json::Value) -> QueryNode {
        serde_json::from_value(json).unwrap()
    }

    fn build(concept_id: ConceptId, json: serde_json::Value) -> Result<QueryNode, QueryError> {
        let config = catalog();
        QueryBuilder::from_config(&config).build_query(concept_id, &ds(json))
    }

    fn assert_equivalent(actual: &QueryNode, expected: serde_json::Value) {
        let expected = node(expected);
        assert!(
            actual.equivalent(&expected),
            "\nactual:   {}\nexpected: {}",
            serde_json::to_string(actual).unwrap(),
            serde_json::to_string(&expected).unwrap()
        );
    }

    #[test]
    fn test_empty_datasources() {
        for case in [json!({}), json!({"32_32": null}), json!({"32_32": []}), json!({"32_32_operator": "exact"})] {
            let result = build(32, case.clone());
            assert!(
                matches!(result, Err(QueryError::EmptyDatasource { .. })),
                "{} should be rejected, got {:?}",
                case,
                result
            );
        }
    }

    #[test]
    fn test_isnull_without_value() {
        let query = build(32, json!({"32_32_operator": "isnull"})).unwrap();
        assert_eq!(
            serde_json::to_value(&query).unwrap(),
            json!({"concept_id": 32, "id": "32", "operator": "isnull"})
        );
    }

    #[test]
    fn test_boolean_single_select() {
        let query = build(93, json!({"93_170": [false]})).unwrap();
        assert_equivalent(&query, json!({"concept_id": 93, "id": "170", "operator": "exact", "value": false}));
    }

    #[test]
    fn test_boolean_multi_select_inclusive() {
        let query = build(93, json!({"93_170": [false, true]})).unwrap();
        assert_equivalent(
            &query,
            json!({"type": "or", "concept_id": 93, "children": [
                {"concept_id": 93, "id": "170", "operator": "exact", "value": false},
                {"concept_id": 93, "id": "170", "operator": "exact", "value": true}
            ]}),
        );
    }

    #[test]
    fn test_boolean_multi_select_negated() {
        let query = build(93, json!({"93_170": [false, true], "93_170_operator": "-in"})).unwrap();
        assert_equivalent(
            &query,
            json!({"type": "and", "concept_id": 93, "children": [
                {"concept_id": 93, "id": "170", "operator": "-exact", "value": false},
                {"concept_id": 93, "id": "170", "operator": "-exact", "value": true}
            ]}),
        );
    }

    #[test]
    fn test_nullboolean_null_becomes_null_test() {
        let query = build(93, json!({"93_171": [null, true]})).unwrap();
        assert_equivalent(
            &query,
            json!({"type": "or", "concept_id": 93, "children": [
                {"concept_id": 93, "id": "171", "operator": "isnull"},
                {"concept_id": 93, "id": "171", "operator": "exact", "value": true}
            ]}),
        );
    }

    #[test]
    fn test_choice_field_not_expanded() {
        let query = build(43, json!({"43_119": ["Air", "Bone"]})).unwrap();
        assert_eq!(
            serde_json::to_value(&query).unwrap(),
            json!({"concept_id": 43, "id": "119", "operator": "in", "value": ["Air", "Bone"]})
        );
    }

    #[test]
    fn test_expansion_follows_policy() {
        let config = catalog();
        let builder = QueryBuilder::with_policy(&config, ExpansionPolicy::never());
        let query = builder.build_query(93, &ds(json!({"93_170": [false, true]}))).unwrap();
        assert_equivalent(
            &query,
            json!({"concept_id": 93, "id": "170", "operator": "in", "value": [false, true]}),
        );

        let strings = ExpansionPolicy::new([Datatype::String]);
        let builder = QueryBuilder::with_policy(&config, strings);
        let query = builder.build_query(43, &ds(json!({"43_119": ["Air", "Bone"]}))).unwrap();
        assert_equivalent(
            &query,
            json!({"type": "or", "concept_id": 43, "children": [
                {"concept_id": 43, "id": "119", "operator": "exact", "value": "Air"},
                {"concept_id": 43, "id": "119", "operator": "exact", "value": "Bone"}
            ]}),
        );
    }

    #[test]
    fn test_unknown_datatype_not_expanded() {
        let empty: BTreeMap<String, Datatype> = BTreeMap::new();
        let query = build_query(93, &ds(json!({"93_170": [false, true]})), &empty).unwrap();
        assert_equivalent(
            &query,
            json!({"concept_id": 93, "id": "170", "operator": "in", "value": [false, true]}),
        );
    }

    #[test]
    fn test_range_field() {
        let query = build(
            50,
            json!({"50_157_input0": "3.6", "50_157_input1": "5.9", "50_157_operator": "range"}),
        )
        .unwrap();
        assert_eq!(
            serde_json::to_value(&query).unwrap(),
            json!({"concept_id": 50, "id": "157", "operator": "range", "value": [3.6, 5.9]})
        );
    }

    #[test]
    fn test_scalar_comparison_is_numeric() {
        let query = build(50, json!({"50_158_input0": "12", "50_158_operator": "gte"})).unwrap();
        assert_equivalent(&query, json!({"concept_id": 50, "id": "158", "operator": "gte", "value": 12}));

        let query = build(50, json!({"50_159": "12", "50_159_operator": "exact"})).unwrap();
        assert_equivalent(&query, json!({"concept_id": 50, "id": "159", "operator": "exact", "value": "12"}));
    }

    #[test]
    fn test_variable_field_resolution() {
        let query = build(
            1,
            json!({
                "1_142OR151OR152_input0": "24.7",
                "1_142OR151OR152_input1": "50.6",
                "1_142OR151OR152_operator": "range",
                "1_143": true,
                "142OR151OR152": "151"
            }),
        )
        .unwrap();
        assert_equivalent(
            &query,
            json!({"type": "and", "concept_id": 1, "children": [
                {"concept_id": 1, "id": "143", "operator": "exact", "value": true},
                {"concept_id": 1, "id": "151", "operator": "range", "value": [24.7, 50.6],
                 "id_choices": ["142", "151", "152"]}
            ]}),
        );
    }

    #[test]
    fn test_variable_field_without_selection() {
        let result = build(1, json!({"1_142OR151_input0": "1", "1_142OR151_input1": "2", "1_142OR151_operator": "range"}));
        assert_eq!(
            result,
            Err(QueryError::UnresolvedField { field: "142OR151".to_string(), concept_id: 1 })
        );
    }

    #[test]
    fn test_unresolved_field() {
        let result = build(50, json!({"50_157_input1": "5.9"}));
        assert_eq!(
            result,
            Err(QueryError::UnresolvedField { field: "157".to_string(), concept_id: 50 })
        );
    }

    #[test]
    fn test_stale_operator_is_ignored() {
        let query = build(43, json!({"43_119": ["Air"], "43_120_operator": "exact"})).unwrap();
        assert_equivalent(&query, json!({"concept_id": 43, "id": "119", "operator": "in", "value": ["Air"]}));
    }

    #[test]
    fn test_unparseable_keys_are_skipped() {
        let query = build(93, json!({"93_170": [true], "csrf_token": "abc"})).unwrap();
        assert_equivalent(&query, json!({"concept_id": 93, "id": "170", "operator": "exact", "value": true}));

        let result = build(93, json!({"csrf_token": "abc"}));
        assert!(matches!(result, Err(QueryError::EmptyDatasource { .. })));
    }

    #[test]
    fn test_key_order_does_not_matter() {
        let forward: Datasource = [
            ("142OR151", Value::from("151")),
            ("1_142OR151_input0", Value::from("1")),
            ("1_142OR151_input1", Value::from("2")),
            ("1_142OR151_operator", Value::from("range")),
        ]
        .into_iter()
        .collect();
        let backward: Datasource = forward.iter().rev().map(|(k, v)| (k.clone(), v.clone())).collect();

        let config = catalog();
        let builder = QueryBuilder::from_config(&config);
        assert_eq!(builder.build_query(1, &forward), builder.build_query(1, &backward));
    }

    #[test]
    fn test_datasource_from_range_query() {
        let source = datasource_from_query(&node(json!({
            "concept_id": 50, "id": "157", "operator": "range", "value": [3.6, 5.9]
        })))
        .unwrap();
        assert_eq!(
            serde_json::to_value(&source).unwrap(),
            json!({"50_157_input0": 3.6, "50_157_input1": 5.9, "50_157_operator": "range"})
        );
    }

    #[test]
    fn test_datasource_from_variable_field() {
        let source = datasource_from_query(&node(json!({
            "concept_id": 1, "id": "151", "operator": "gt", "value": 24.7,
            "id_choices": ["152", "142", "151"]
        })))
        .unwrap();
        assert_eq!(
            serde_json::to_value(&source).unwrap(),
            json!({"142OR151OR152": "151", "1_142OR151OR152": 24.7, "1_142OR151OR152_operator": "gt"})
        );
    }

    #[test]
    fn test_datasource_from_nested_query() {
        let source = datasource_from_query(&node(json!({
            "type": "and", "concept_id": 7, "children": [
                {"id": "119", "operator": "-in", "value": ["Air"]},
                {"id": "120", "operator": "-isnull"}
            ]
        })))
        .unwrap();
        assert_eq!(
            serde_json::to_value(&source).unwrap(),
            json!({"7_119": ["Air"], "7_119_operator": "-in", "7_120_operator": "-isnull"})
        );
    }

    #[test]
    fn test_datasource_from_malformed_query() {
        let field = FieldNode {
            concept_id: Some(1),
            id: None,
            id_choices: None,
            operator: Operator::EXACT,
            value: Some(Value::from(1)),
        };
        assert!(matches!(
            datasource_from_query(&QueryNode::Field(field)),
            Err(QueryError::MalformedQuery(_))
        ));
    }

    #[test]
    fn test_datasource_from_list_under_plain_operator() {
        let source = datasource_from_query(&node(json!({
            "concept_id": 43, "id": "119", "operator": "exact", "value": ["Air"]
        })))
        .unwrap();
        assert_eq!(
            serde_json::to_value(&source).unwrap(),
            json!({"43_119": ["Air"], "43_119_operator": "exact"})
        );

        let source = datasource_from_query(&node(json!({
            "concept_id": 50, "id": "157", "operator": "range", "value": [1, 2, 3]
        })))
        .unwrap();
        assert_eq!(
            serde_json::to_value(&source).unwrap(),
            json!({"50_157": [1, 2, 3], "50_157_operator": "range"})
        );
    }

    #[test]
    fn test_round_trip() {
        let config = catalog();
        let builder = QueryBuilder::from_config(&config);
        let cases = [
            (32, json!({"32_32_operator": "isnull"})),
            (93, json!({"93_170": [false]})),
            (93, json!({"93_170": [false, true]})),
            (93, json!({"93_170": [false, true], "93_170_operator": "-in"})),
            (93, json!({"93_171": [null, false, true]})),
            (43, json!({"43_119": ["Air", "Bone"]})),
            (43, json!({"43_119": ["Air", "Bone"], "43_119_operator": "-in"})),
            (50, json!({"50_157_input0": "3.6", "50_157_input1": "5.9", "50_157_operator": "range"})),
            (50, json!({"50_157_input0": "3.6", "50_157_operator": "lt"})),
            (50, json!({"50_160": "Normal", "50_160_operator": "icontains"})),
            (43, json!({"43_119": ["Air"], "43_119_operator": "exact"})),
            (43, json!({"43_119": ["Air", "Bone", "Mixed"], "43_119_operator": "exact"})),
            (50, json!({"50_157": ["3.6", "5.9"], "50_157_operator": "range"})),
            (93, json!({"93_170": [true], "93_171": [false, true], "93_172_operator": "-isnull"})),
            (
                1,
                json!({
                    "1_142OR151OR152_input0": "24.7",
                    "1_142OR151OR152_input1": "50.6",
                    "1_142OR151OR152_operator": "range",
                    "1_143": true,
                    "142OR151OR152": "151"
                }),
            ),
        ];

        for (concept_id, case) in cases {
            let query = builder.build_query(concept_id, &ds(case.clone())).unwrap();
            let source = datasource_from_query(&query).unwrap();
            let rebuilt = builder.build_query(concept_id, &source).unwrap();
            assert!(
                query.equivalent(&rebuilt),
                "round trip of {} changed\n{}\ninto\n{}",
                case,
                serde_json::to_string(&query).unwrap(),
                serde_json::to_string(&rebuilt).unwrap()
            );
        }
    }
}
