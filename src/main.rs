use anyhow::{Context, Result};
use serde_json::json;

use concept_query::config::{ConfigError, Datatype, QueryConfig};
use concept_query::sql_compiler::SqlCompiler;
use concept_query::{datasource_from_query, validate, ConceptId, CriteriaSet, Datasource, QueryBuilder};

/// 加载查询配置，失败时使用演示用的字段目录
fn load_config() -> QueryConfig {
    match QueryConfig::from_json_file("query_config.json") {
        Ok(config) => {
            println!("✅ 成功从JSON配置文件加载 {} 个字段", config.fields.len());
            config
        }
        Err(ConfigError::Missing(path)) => {
            println!("⚠️ 未找到配置文件 {}, 使用演示配置", path);
            demo_config()
        }
        Err(e) => {
            println!("❌ JSON配置文件加载失败: {}", e);
            println!("⚠️ 将使用演示配置");
            demo_config()
        }
    }
}

fn demo_config() -> QueryConfig {
    QueryConfig::default()
        .with_field("119", Datatype::String)
        .with_field("143", Datatype::Boolean)
        .with_field("151", Datatype::Number)
        .with_field("157", Datatype::Number)
        .with_field("170", Datatype::Boolean)
}

fn main() -> Result<()> {
    env_logger::init();

    println!("--- Concept Query: 数据源到查询树 ---");
    let config = load_config();
    let builder = QueryBuilder::from_config(&config);
    let compiler = SqlCompiler::from_config(&config);
    let mut criteria = CriteriaSet::new();

    // 示例数据源
    let samples: Vec<(ConceptId, serde_json::Value)> = vec![
        (93, json!({"93_170": [false, true], "93_170_operator": "-in"})),
        (43, json!({"43_119": ["Air", "Bone"]})),
        (50, json!({"50_157_input0": "3.6", "50_157_input1": "5.9", "50_157_operator": "range"})),
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
        (32, json!({"32_32": []})),
    ];

    for (concept_id, sample) in samples {
        println!("\n[概念 {}] 数据源: {}", concept_id, sample);
        let datasource: Datasource = serde_json::from_value(sample).context("invalid sample datasource")?;

        // 1. 数据源 → 查询树
        let query = match builder.build_query(concept_id, &datasource) {
            Ok(query) => query,
            Err(e) if e.is_user_input() => {
                println!("⚠️ {}", e);
                continue;
            }
            Err(e) => return Err(e).context(format!("cannot build query for concept {}", concept_id)),
        };
        validate(&query)?;
        println!("查询树: {}", serde_json::to_string(&query)?);
        println!("描述: {}", query.describe());

        // 2. 查询树 → 数据源
        let restored = datasource_from_query(&query)?;
        println!("还原的数据源: {}", serde_json::to_string(&restored)?);

        // 3. 查询树 → SQL
        let compiled = compiler.compile(&query)?;
        println!("SQL: {}", compiled.sql);
        for opt in &compiled.optimizations {
            println!("• {:?}", opt);
        }

        criteria.upsert(query)?;
    }

    if let Some(session) = criteria.session_query() {
        println!("\n[会话查询] {} 个条件", criteria.len());
        println!("{}", serde_json::to_string_pretty(&session)?);
        println!("SQL: {}", compiler.compile(&session)?.sql);
    }

    Ok(())
}
