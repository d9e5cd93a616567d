//! 查询树（query AST）
//!
//! 与服务器交换的 JSON 结构：字段节点 `{concept_id, id, operator, value}`
//! 或逻辑节点 `{type, concept_id, children}`。

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Number, Value as Json};

use crate::error::QueryError;
use crate::operator::Operator;

/// 概念 id
pub type ConceptId = i64;

/// 标量值
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Null,
    Bool(bool),
    Number(Number),
    String(String),
}

/// 数据源或字段节点中的值：标量或标量列表
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Scalar(Scalar),
    List(Vec<Scalar>),
}

/// 查询树节点
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum QueryNode {
    Logic(LogicNode),
    Field(FieldNode),
}

/// 对单个字段的约束, 例如：`{"id": "157", "operator": "range", "value": [3.6, 5.9]}`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldNode {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub concept_id: Option<ConceptId>,
    /// 变量字段时为用户选择的具体 id
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// 变量字段的候选 id 列表
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id_choices: Option<Vec<String>>,
    pub operator: Operator,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

/// 逻辑组合节点
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogicNode {
    #[serde(rename = "type")]
    pub logic: LogicType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub concept_id: Option<ConceptId>,
    pub children: Vec<QueryNode>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogicType {
    And,
    Or,
}

impl LogicType {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogicType::And => "and",
            LogicType::Or => "or",
        }
    }
}

impl Scalar {
    pub fn is_null(&self) -> bool {
        matches!(self, Scalar::Null)
    }

    /// 非有限的浮点数无法表示为 JSON 数字, 返回 `Null`
    pub fn from_f64(value: f64) -> Self {
        Number::from_f64(value).map_or(Scalar::Null, Scalar::Number)
    }

    /// 将看起来像数字的字符串转换为数字, 其他值保持不变
    pub fn coerce_number(self) -> Self {
        let Scalar::String(text) = &self else {
            return self;
        };
        let trimmed = text.trim();
        if let Ok(int) = trimmed.parse::<i64>() {
            return Scalar::Number(Number::from(int));
        }
        match trimmed.parse::<f64>().ok().and_then(Number::from_f64) {
            Some(number) => Scalar::Number(number),
            None => self,
        }
    }
}

impl From<bool> for Scalar {
    fn from(value: bool) -> Self {
        Scalar::Bool(value)
    }
}

impl From<i64> for Scalar {
    fn from(value: i64) -> Self {
        Scalar::Number(Number::from(value))
    }
}

impl From<&str> for Scalar {
    fn from(value: &str) -> Self {
        Scalar::String(value.to_string())
    }
}

impl From<String> for Scalar {
    fn from(value: String) -> Self {
        Scalar::String(value)
    }
}

macro_rules! scalar_value_from {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Value {
                fn from(value: $ty) -> Self {
                    Value::Scalar(value.into())
                }
            }
        )*
    };
}

scalar_value_from!(Scalar, bool, i64, &str, String);

impl From<Vec<Scalar>> for Value {
    fn from(values: Vec<Scalar>) -> Self {
        Value::List(values)
    }
}

impl Value {
    pub fn null() -> Self {
        Value::Scalar(Scalar::Null)
    }

    /// `null`、空字符串或空列表
    pub fn is_empty(&self) -> bool {
        match self {
            Value::Scalar(Scalar::Null) => true,
            Value::Scalar(Scalar::String(s)) => s.is_empty(),
            Value::Scalar(_) => false,
            Value::List(values) => values.is_empty(),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Scalar(Scalar::Null))
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Scalar(Scalar::String(s)) => Some(s),
            _ => None,
        }
    }
}

impl QueryNode {
    /// 从服务器返回的 JSON 解析查询树
    pub fn from_value(value: Json) -> Result<Self, QueryError> {
        let mut map = match value {
            Json::Object(map) => map,
            other => return Err(QueryError::malformed(format!("expected an object, found {}", other))),
        };

        if let Some(kind) = map.remove("type") {
            let logic = match kind.as_str() {
                Some("and") => LogicType::And,
                Some("or") => LogicType::Or,
                _ => return Err(QueryError::malformed(format!("unknown logic type {}", kind))),
            };
            let concept_id = take_concept_id(&mut map)?;
            let children = match map.remove("children") {
                Some(Json::Array(items)) => items
                    .into_iter()
                    .map(QueryNode::from_value)
                    .collect::<Result<Vec<_>, _>>()?,
                Some(other) => {
                    return Err(QueryError::malformed(format!("children must be a list, found {}", other)))
                }
                None => return Err(QueryError::malformed("logic node without children")),
            };
            return Ok(QueryNode::Logic(LogicNode {
                logic,
                concept_id,
                children,
            }));
        }

        if map.contains_key("children") {
            return Err(QueryError::malformed("children without a logic type"));
        }

        let operator = match map.remove("operator") {
            Some(Json::String(uid)) => Operator::parse(&uid),
            Some(other) => return Err(QueryError::malformed(format!("operator must be a string, found {}", other))),
            None => return Err(QueryError::malformed("missing operator")),
        };
        let id = match map.remove("id") {
            None | Some(Json::Null) => None,
            Some(id) => Some(id_text(id)?),
        };
        let id_choices = match map.remove("id_choices") {
            None | Some(Json::Null) => None,
            Some(Json::Array(ids)) => Some(ids.into_iter().map(id_text).collect::<Result<Vec<_>, _>>()?),
            Some(other) => return Err(QueryError::malformed(format!("id_choices must be a list, found {}", other))),
        };
        if id.is_none() && id_choices.is_none() {
            return Err(QueryError::malformed("missing id and id_choices"));
        }
        let value = match map.remove("value") {
            None | Some(Json::Null) => None,
            Some(value) => Some(
                serde_json::from_value::<Value>(value)
                    .map_err(|e| QueryError::malformed(format!("invalid value: {}", e)))?,
            ),
        };

        Ok(QueryNode::Field(FieldNode {
            concept_id: take_concept_id(&mut map)?,
            id,
            id_choices,
            operator,
            value,
        }))
    }

    pub fn concept_id(&self) -> Option<ConceptId> {
        match self {
            QueryNode::Field(field) => field.concept_id,
            QueryNode::Logic(logic) => logic.concept_id,
        }
    }

    /// 结构相等，忽略子节点顺序
    pub fn equivalent(&self, other: &QueryNode) -> bool {
        self.canonical() == other.canonical()
    }

    /// 子节点按序列化结果排序后的副本
    pub fn canonical(&self) -> QueryNode {
        match self {
            QueryNode::Field(_) => self.clone(),
            QueryNode::Logic(logic) => {
                let mut children: Vec<(String, QueryNode)> = logic
                    .children
                    .iter()
                    .map(|child| {
                        let child = child.canonical();
                        (serde_json::to_string(&child).unwrap_or_default(), child)
                    })
                    .collect();
                children.sort_by(|a, b| a.0.cmp(&b.0));
                QueryNode::Logic(LogicNode {
                    logic: logic.logic,
                    concept_id: logic.concept_id,
                    children: children.into_iter().map(|(_, child)| child).collect(),
                })
            }
        }
    }

    /// 人类可读的描述, 例如 `field 157 is between 3.6 and 5.9`
    pub fn describe(&self) -> String {
        match self {
            QueryNode::Field(field) => {
                let id = field.id.clone().unwrap_or_else(|| field.id_choices.clone().unwrap_or_default().join("/"));
                format!("field {} {}", id, field.operator.text(field.value.as_ref()))
            }
            QueryNode::Logic(logic) => {
                let parts: Vec<String> = logic
                    .children
                    .iter()
                    .map(|child| match child {
                        QueryNode::Logic(_) => format!("({})", child.describe()),
                        QueryNode::Field(_) => child.describe(),
                    })
                    .collect();
                parts.join(&format!(" {} ", logic.logic.as_str()))
            }
        }
    }
}

impl<'de> Deserialize<'de> for QueryNode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Json::deserialize(deserializer)?;
        QueryNode::from_value(value).map_err(serde::de::Error::custom)
    }
}

fn take_concept_id(map: &mut Map<String, Json>) -> Result<Option<ConceptId>, QueryError> {
    match map.remove("concept_id") {
        None | Some(Json::Null) => Ok(None),
        Some(Json::Number(n)) => n
            .as_i64()
            .map(Some)
            .ok_or_else(|| QueryError::malformed(format!("invalid concept_id {}", n))),
        Some(Json::String(s)) => s
            .parse::<ConceptId>()
            .map(Some)
            .map_err(|_| QueryError::malformed(format!("invalid concept_id {}", s))),
        Some(other) => Err(QueryError::malformed(format!("invalid concept_id {}", other))),
    }
}

/// 字段 id 可能以数字或字符串形式出现
fn id_text(id: Json) -> Result<String, QueryError> {
    match id {
        Json::String(s) => Ok(s),
        Json::Number(n) => Ok(n.to_string()),
        other => Err(QueryError::malformed(format!("invalid field id {}", other))),
    }
}
