//! SQL compiler that renders query trees to PostgreSQL using sea-query.

use std::collections::BTreeSet;

use log::debug;
use sea_query::{Asterisk, Expr, Func, Iden, JoinType, PostgresQueryBuilder, SelectStatement, SimpleExpr, Value};
use thiserror::Error;

use crate::ast::{FieldNode, LogicNode, LogicType, QueryNode, Scalar, Value as AstValue};
use crate::config::QueryConfig;
use crate::operator::OperatorKind;

/// Configuration for SQL optimization
#[derive(Debug, Clone)]
pub struct OptimizationConfig {
    /// Number of `exact` alternatives on one field at which an OR becomes an IN clause
    pub max_or_conditions_for_in: usize,
    /// Maximum number of IN values before splitting into UNION
    pub max_in_values: usize,
}

impl Default for OptimizationConfig {
    fn default() -> Self {
        Self {
            max_or_conditions_for_in: 5,
            max_in_values: 1000,
        }
    }
}

/// Table identifier for sea-query
#[derive(Debug, Clone)]
pub struct TableName(pub String);

impl Iden for TableName {
    fn unquoted(&self, s: &mut dyn std::fmt::Write) {
        write!(s, "{}", self.0).unwrap();
    }
}

/// Column identifier wrapper
#[derive(Debug, Clone)]
pub struct ColumnName(pub String);

impl Iden for ColumnName {
    fn unquoted(&self, s: &mut dyn std::fmt::Write) {
        write!(s, "{}", self.0).unwrap();
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message}")]
pub struct CompileError {
    pub message: String,
}

impl CompileError {
    fn new(message: String) -> Self {
        Self { message }
    }
}

/// Represents an optimization applied during compilation
#[derive(Debug, Clone, PartialEq)]
pub enum Optimization {
    OrToIn { field: String, value_count: usize },
    InToUnion { field: String, total_values: usize, union_count: usize },
}

/// Result of SQL compilation with optimization information
#[derive(Debug)]
pub struct CompileResult {
    pub sql: String,
    pub optimizations: Vec<Optimization>,
}

/// State collected while walking one tree.
#[derive(Default)]
struct Compilation {
    optimizations: Vec<Optimization>,
    joined_tables: BTreeSet<String>,
}

/// SQL Compiler that converts query trees to SQL queries
pub struct SqlCompiler {
    config: OptimizationConfig,
    schema: QueryConfig,
}

impl Default for SqlCompiler {
    fn default() -> Self {
        Self::new()
    }
}

impl SqlCompiler {
    pub fn new() -> Self {
        Self::from_config(&QueryConfig::default())
    }

    pub fn with_config(config: OptimizationConfig) -> Self {
        Self {
            config,
            schema: QueryConfig::default(),
        }
    }

    /// Takes the table, column and threshold settings from a query config
    pub fn from_config(schema: &QueryConfig) -> Self {
        Self {
            config: OptimizationConfig {
                max_or_conditions_for_in: schema.max_or_conditions_for_in,
                max_in_values: schema.max_in_values,
            },
            schema: schema.clone(),
        }
    }

    /// Compile a query tree into optimized SQL
    pub fn compile(&self, node: &QueryNode) -> Result<CompileResult, CompileError> {
        let mut state = Compilation::default();
        let condition = self.compile_node(node, &mut state)?;

        let base = &self.schema.base_table;
        let mut select = SelectStatement::new();
        select.from(TableName(base.clone()));
        select.column(Asterisk);

        // Fields stored outside the base table
        for table in &state.joined_tables {
            select.join(
                JoinType::InnerJoin,
                TableName(table.clone()),
                Expr::col((TableName(base.clone()), ColumnName("id".to_string())))
                    .equals((TableName(table.clone()), ColumnName("id".to_string()))),
            );
        }

        select.and_where(condition);

        let sql = select.to_string(PostgresQueryBuilder);
        debug!("compiled query: {}", sql);

        Ok(CompileResult {
            sql,
            optimizations: state.optimizations,
        })
    }

    fn compile_node(&self, node: &QueryNode, state: &mut Compilation) -> Result<SimpleExpr, CompileError> {
        match node {
            QueryNode::Field(field) => self.compile_field(field, state),
            QueryNode::Logic(logic) => {
                if logic.logic == LogicType::Or {
                    if let Some(in_expr) = self.try_optimize_or_to_in(logic, state)? {
                        return Ok(in_expr);
                    }
                }
                let conditions = logic
                    .children
                    .iter()
                    .map(|child| self.compile_node(child, state))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(self.combine_conditions(logic.logic, conditions))
            }
        }
    }

    /// Try to optimize an OR of `exact` tests on one field to an IN clause
    fn try_optimize_or_to_in(&self, logic: &LogicNode, state: &mut Compilation) -> Result<Option<SimpleExpr>, CompileError> {
        let Some((field, values)) = self.extract_equality_values_from_or(logic) else {
            return Ok(None);
        };
        if values.len() < self.config.max_or_conditions_for_in {
            return Ok(None);
        }

        let in_values = values
            .into_iter()
            .map(scalar_to_value)
            .collect::<Result<Vec<_>, _>>()?;
        let column = self.column_name(field)?;
        state.optimizations.push(Optimization::OrToIn {
            field: column,
            value_count: in_values.len(),
        });

        Ok(Some(self.column(field, state)?.is_in(in_values)))
    }

    /// The field and values of an OR whose children all test one field for equality
    fn extract_equality_values_from_or<'a>(&self, logic: &'a LogicNode) -> Option<(&'a FieldNode, Vec<&'a Scalar>)> {
        let mut target: Option<&FieldNode> = None;
        let mut values = Vec::new();

        for child in &logic.children {
            let QueryNode::Field(field) = child else {
                return None;
            };
            if *field.operator.kind() != OperatorKind::Exact || field.operator.negated() {
                return None;
            }
            match target {
                Some(first) if first.id != field.id => return None,
                _ => target = Some(field),
            }
            match &field.value {
                Some(AstValue::Scalar(scalar)) if !scalar.is_null() => values.push(scalar),
                _ => return None,
            }
        }

        target.map(|field| (field, values))
    }

    /// Combine multiple conditions with AND / OR
    fn combine_conditions(&self, logic: LogicType, conditions: Vec<SimpleExpr>) -> SimpleExpr {
        let identity = logic == LogicType::And;
        conditions
            .into_iter()
            .reduce(|acc, expr| match logic {
                LogicType::And => acc.and(expr),
                LogicType::Or => acc.or(expr),
            })
            .unwrap_or_else(|| Expr::val(identity).into())
    }

    /// Compile a single field constraint
    fn compile_field(&self, field: &FieldNode, state: &mut Compilation) -> Result<SimpleExpr, CompileError> {
        let col = self.column(field, state)?;
        let negated = field.operator.negated();
        let shape_error = || {
            CompileError::new(format!(
                "operator {} on field {} has a value of the wrong shape",
                field.operator,
                field.id.as_deref().unwrap_or_default()
            ))
        };

        let expr = match (field.operator.kind(), field.value.as_ref()) {
            (OperatorKind::IsNull, value) => {
                let wants_null = !matches!(value, Some(AstValue::Scalar(Scalar::Bool(false))));
                return Ok(if wants_null != negated { col.is_null() } else { col.is_not_null() });
            }
            (OperatorKind::Exact, Some(AstValue::Scalar(Scalar::Null))) => {
                return Ok(if negated { col.is_not_null() } else { col.is_null() });
            }
            (OperatorKind::Exact, Some(AstValue::Scalar(scalar))) => {
                let val = scalar_to_value(scalar)?;
                return Ok(if negated { col.ne(val) } else { col.eq(val) });
            }
            (OperatorKind::IExact, Some(AstValue::Scalar(scalar))) => {
                Expr::expr(Func::lower(col)).eq(text(scalar).to_lowercase())
            }
            (OperatorKind::Contains, Some(AstValue::Scalar(scalar))) => col.like(format!("%{}%", text(scalar))),
            (OperatorKind::IContains, Some(AstValue::Scalar(scalar))) => {
                Expr::expr(Func::lower(col)).like(format!("%{}%", text(scalar).to_lowercase()))
            }
            (OperatorKind::Lt, Some(AstValue::Scalar(scalar))) => col.lt(scalar_to_value(scalar)?),
            (OperatorKind::Gt, Some(AstValue::Scalar(scalar))) => col.gt(scalar_to_value(scalar)?),
            (OperatorKind::Lte, Some(AstValue::Scalar(scalar))) => col.lte(scalar_to_value(scalar)?),
            (OperatorKind::Gte, Some(AstValue::Scalar(scalar))) => col.gte(scalar_to_value(scalar)?),
            (OperatorKind::Range, Some(AstValue::List(bounds))) => {
                let [low, high] = bounds.as_slice() else {
                    return Err(shape_error());
                };
                let (low, high) = (scalar_to_value(low)?, scalar_to_value(high)?);
                return Ok(if negated { col.not_between(low, high) } else { col.between(low, high) });
            }
            (OperatorKind::In, Some(AstValue::List(choices))) => {
                return self.compile_in(field, choices, state);
            }
            (OperatorKind::Other(uid), _) => {
                return Err(CompileError::new(format!("operator {} has no SQL form", uid)));
            }
            _ => return Err(shape_error()),
        };

        Ok(if negated { expr.not() } else { expr })
    }

    fn compile_in(&self, field: &FieldNode, choices: &[Scalar], state: &mut Compilation) -> Result<SimpleExpr, CompileError> {
        let in_values = choices
            .iter()
            .filter(|choice| !choice.is_null())
            .map(scalar_to_value)
            .collect::<Result<Vec<_>, _>>()?;
        let with_null = in_values.len() < choices.len();

        // Check if we need to split large IN clauses into UNION
        if in_values.len() > self.config.max_in_values {
            state.optimizations.push(Optimization::InToUnion {
                field: self.column_name(field)?,
                total_values: in_values.len(),
                union_count: in_values.len().div_ceil(self.config.max_in_values),
            });
            // For now, we'll keep the IN clause but log the optimization opportunity
        }

        let negated = field.operator.negated();
        let in_expr = match (in_values.is_empty(), negated) {
            (true, _) => None,
            (false, false) => Some(self.column(field, state)?.is_in(in_values)),
            (false, true) => Some(self.column(field, state)?.is_not_in(in_values)),
        };
        let null_expr = match (with_null, negated) {
            (false, _) => None,
            (true, false) => Some(self.column(field, state)?.is_null()),
            (true, true) => Some(self.column(field, state)?.is_not_null()),
        };

        match (in_expr, null_expr) {
            (Some(in_expr), Some(null_expr)) if negated => Ok(in_expr.and(null_expr)),
            (Some(in_expr), Some(null_expr)) => Ok(in_expr.or(null_expr)),
            (Some(expr), None) | (None, Some(expr)) => Ok(expr),
            (None, None) => Err(CompileError::new(format!(
                "operator {} on field {} has no values",
                field.operator,
                field.id.as_deref().unwrap_or_default()
            ))),
        }
    }

    fn column_name(&self, field: &FieldNode) -> Result<String, CompileError> {
        let id = field_id(field)?;
        Ok(self.schema.column_name(id))
    }

    /// Column reference for a field, qualified by its table
    fn column(&self, field: &FieldNode, state: &mut Compilation) -> Result<Expr, CompileError> {
        let id = field_id(field)?;
        let column = ColumnName(self.schema.column_name(id));
        let table = match self.schema.table_name(id) {
            Some(table) if table != self.schema.base_table => {
                state.joined_tables.insert(table.to_string());
                table.to_string()
            }
            _ => self.schema.base_table.clone(),
        };
        Ok(Expr::col((TableName(table), column)))
    }
}

fn field_id(field: &FieldNode) -> Result<&str, CompileError> {
    field
        .id
        .as_deref()
        .ok_or_else(|| CompileError::new("variable field has no selected id".to_string()))
}

fn text(scalar: &Scalar) -> String {
    match scalar {
        Scalar::String(s) => s.clone(),
        Scalar::Number(n) => n.to_string(),
        Scalar::Bool(b) => b.to_string(),
        Scalar::Null => String::new(),
    }
}

/// Convert a query scalar to a sea-query Value
fn scalar_to_value(scalar: &Scalar) -> Result<Value, CompileError> {
    match scalar {
        Scalar::Bool(b) => Ok(Value::Bool(Some(*b))),
        Scalar::Number(n) => match (n.as_i64(), n.as_f64()) {
            (Some(int), _) => Ok(Value::BigInt(Some(int))),
            (None, Some(float)) => Ok(Value::Double(Some(float))),
            (None, None) => Err(CompileError::new(format!("number {} is out of range", n))),
        },
        Scalar::String(s) => Ok(Value::String(Some(Box::new(s.clone())))),
        Scalar::Null => Err(CompileError::new("null cannot be compared".to_string())),
    }
}
