//! 配置模块，负责加载JSON配置文件
//!
//! 配置描述每个字段的数据类型（决定多值约束是否需要拆分）以及
//! 编译 SQL 时使用的表和列。

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {0}")]
    Missing(String),
    #[error("cannot read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// 字段的数据类型标签
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Datatype {
    String,
    Number,
    Boolean,
    NullBoolean,
    Date,
    Time,
    DateTime,
    #[serde(other)]
    Other,
}

/// 根据字段 id 查询数据类型
pub trait DatatypeLookup {
    fn datatype(&self, field_id: &str) -> Option<Datatype>;
}

impl DatatypeLookup for HashMap<String, Datatype> {
    fn datatype(&self, field_id: &str) -> Option<Datatype> {
        self.get(field_id).copied()
    }
}

impl DatatypeLookup for BTreeMap<String, Datatype> {
    fn datatype(&self, field_id: &str) -> Option<Datatype> {
        self.get(field_id).copied()
    }
}

/// 哪些数据类型的 `in` / `-in` 多值约束需要拆分为逐值的字段节点
///
/// 服务器对字符串选择字段原生支持列表值；布尔类字段只接受单个断言。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExpansionPolicy {
    datatypes: BTreeSet<Datatype>,
}

impl ExpansionPolicy {
    pub fn new<I: IntoIterator<Item = Datatype>>(datatypes: I) -> Self {
        Self {
            datatypes: datatypes.into_iter().collect(),
        }
    }

    /// 不拆分任何字段
    pub fn never() -> Self {
        Self::new([])
    }

    /// 未知数据类型的字段不拆分
    pub fn expands(&self, datatype: Option<Datatype>) -> bool {
        datatype.is_some_and(|datatype| self.datatypes.contains(&datatype))
    }
}

impl Default for ExpansionPolicy {
    fn default() -> Self {
        Self::new([Datatype::Boolean, Datatype::NullBoolean])
    }
}

/// 单个字段的配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldConfig {
    pub datatype: Datatype,
    /// 数据库列名，缺省为 `field_<id>`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<String>,
    /// 所在的表，缺省为主表
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table: Option<String>,
}

/// 查询配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryConfig {
    /// 字段 id 到字段配置的映射
    #[serde(default)]
    pub fields: HashMap<String, FieldConfig>,
    #[serde(default)]
    pub expand_datatypes: ExpansionPolicy,
    #[serde(default = "default_base_table")]
    pub base_table: String,
    #[serde(default = "default_max_or_conditions_for_in")]
    pub max_or_conditions_for_in: usize,
    #[serde(default = "default_max_in_values")]
    pub max_in_values: usize,
}

fn default_base_table() -> String {
    "patients".to_string()
}

fn default_max_or_conditions_for_in() -> usize {
    5
}

fn default_max_in_values() -> usize {
    1000
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            fields: HashMap::new(),
            expand_datatypes: ExpansionPolicy::default(),
            base_table: default_base_table(),
            max_or_conditions_for_in: default_max_or_conditions_for_in(),
            max_in_values: default_max_in_values(),
        }
    }
}

impl QueryConfig {
    /// 从JSON文件加载配置
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_ref = path.as_ref();
        let display = path_ref.display().to_string();

        // 检查文件是否存在
        if !path_ref.exists() {
            return Err(ConfigError::Missing(display));
        }

        // 读取文件内容
        let content = fs::read_to_string(path_ref).map_err(|source| ConfigError::Read {
            path: display.clone(),
            source,
        })?;

        // 解析JSON
        serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: display,
            source,
        })
    }

    /// 加载配置，失败时使用默认配置
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        match Self::from_json_file(path) {
            Ok(config) => config,
            Err(e) => {
                log::warn!("{}, using default query config", e);
                Self::default()
            }
        }
    }

    /// 登记一个字段
    pub fn with_field(mut self, field_id: impl Into<String>, datatype: Datatype) -> Self {
        self.fields.insert(
            field_id.into(),
            FieldConfig {
                datatype,
                column: None,
                table: None,
            },
        );
        self
    }

    pub fn field(&self, field_id: &str) -> Option<&FieldConfig> {
        self.fields.get(field_id)
    }

    /// 获取字段对应的列名，如果没有配置则返回 `field_<id>`
    pub fn column_name(&self, field_id: &str) -> String {
        self.fields
            .get(field_id)
            .and_then(|field| field.column.clone())
            .unwrap_or_else(|| format!("field_{}", field_id))
    }

    /// 获取字段所在的表
    pub fn table_name(&self, field_id: &str) -> Option<&str> {
        self.fields.get(field_id).and_then(|field| field.table.as_deref())
    }
}

impl DatatypeLookup for QueryConfig {
    fn datatype(&self, field_id: &str) -> Option<Datatype> {
        self.fields.get(field_id).map(|field| field.datatype)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_valid_json_config() {
        // 创建临时配置文件
        let temp_file = std::env::temp_dir().join("concept_query_test_config.json");
        let mut file = fs::File::create(&temp_file).unwrap();
        writeln!(
            file,
            r#"{{
            "fields": {{
                "170": {{"datatype": "boolean", "column": "has_abr"}},
                "157": {{"datatype": "number", "table": "audiograms"}},
                "119": {{"datatype": "string"}},
                "200": {{"datatype": "geometry"}}
            }},
            "expand_datatypes": ["boolean"],
            "base_table": "subjects"
        }}"#
        )
        .unwrap();

        // 测试加载
        let config = QueryConfig::from_json_file(&temp_file).unwrap();
        assert_eq!(config.datatype("170"), Some(Datatype::Boolean));
        assert_eq!(config.datatype("200"), Some(Datatype::Other));
        assert_eq!(config.datatype("999"), None);
        assert_eq!(config.column_name("170"), "has_abr");
        assert_eq!(config.column_name("119"), "field_119");
        assert_eq!(config.table_name("157"), Some("audiograms"));
        assert_eq!(config.base_table, "subjects");
        assert_eq!(config.max_in_values, 1000);
        assert!(config.expand_datatypes.expands(Some(Datatype::Boolean)));
        assert!(!config.expand_datatypes.expands(Some(Datatype::NullBoolean)));

        // 清理
        fs::remove_file(&temp_file).ok();
    }

    #[test]
    fn test_invalid_json_config() {
        let temp_file = std::env::temp_dir().join("concept_query_test_invalid.json");
        let mut file = fs::File::create(&temp_file).unwrap();
        writeln!(file, "invalid json").unwrap();

        let result = QueryConfig::from_json_file(&temp_file);
        assert!(matches!(result, Err(ConfigError::Parse { .. })));

        // 清理
        fs::remove_file(&temp_file).ok();
    }

    #[test]
    fn test_missing_file() {
        let result = QueryConfig::from_json_file("non_existent_file.json");
        assert!(matches!(result, Err(ConfigError::Missing(_))));
        assert_eq!(QueryConfig::load_or_default("non_existent_file.json"), QueryConfig::default());
    }

    #[test]
    fn test_default_config() {
        let config = QueryConfig::default();
        assert_eq!(config.base_table, "patients");
        assert!(config.expand_datatypes.expands(Some(Datatype::Boolean)));
        assert!(config.expand_datatypes.expands(Some(Datatype::NullBoolean)));
        assert!(!config.expand_datatypes.expands(Some(Datatype::String)));
        assert!(!config.expand_datatypes.expands(None));
    }

    #[test]
    fn test_map_lookup() {
        let mut map = HashMap::new();
        map.insert("170".to_string(), Datatype::Boolean);
        assert_eq!(map.datatype("170"), Some(Datatype::Boolean));
        assert_eq!(map.datatype("171"), None);
    }
}
