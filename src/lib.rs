//! Translation between concept form state ("datasources") and the boolean
//! query trees exchanged with the query server.

pub mod ast;
pub mod builder;
pub mod config;
pub mod datasource;
pub mod error;
pub mod field_key;
pub mod lexer;
pub mod operator;
pub mod parser;
pub mod session;
pub mod sql_compiler;
pub mod token;
pub mod validate;

pub use ast::{ConceptId, FieldNode, LogicNode, LogicType, QueryNode, Scalar, Value};
pub use builder::{build_query, datasource_from_query, QueryBuilder};
pub use config::{Datatype, DatatypeLookup, ExpansionPolicy, QueryConfig};
pub use datasource::Datasource;
pub use error::QueryError;
pub use field_key::{format_field_key, parse_field_key, FieldKey, FieldSpec, KeyShape, Suffix};
pub use operator::Operator;
pub use session::{CriteriaSet, CriterionChange};
pub use validate::validate;
