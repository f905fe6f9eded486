//! 需要真实PostgreSQL的端到端存储测试
//!
//! 运行: HPS_TEST_DATABASE_URL=postgres://... cargo test -p hps-database -- --ignored

use hps_core::config::DatabaseConfig;
use hps_core::{AmbientContext, NewEncounter, RecordStatus, Season};
use hps_database::{DatabasePool, DatabaseQueries, PgStore};
use hps_pipeline::EncounterStore;

fn test_config(url: String, transaction_timeout_secs: u64) -> DatabaseConfig {
    DatabaseConfig {
        url,
        max_connections: 5,
        min_connections: 1,
        acquire_timeout_secs: 5,
        transaction_timeout_secs,
    }
}

/// 建表、写入目录种子并插入一个唯一测试用户
async fn seeded_pool(tag: &str, transaction_timeout_secs: u64) -> (DatabasePool, i64) {
    let url = std::env::var("HPS_TEST_DATABASE_URL").expect("HPS_TEST_DATABASE_URL not set");
    let pool = DatabasePool::new(&test_config(url, transaction_timeout_secs))
        .await
        .unwrap();
    let queries = DatabaseQueries::new(&pool);

    queries.create_tables().await.unwrap();
    queries
        .seed_catalog(
            &[
                ("cough".to_string(), "Cough".to_string()),
                ("fever".to_string(), "Fever".to_string()),
            ],
            &[("flu".to_string(), "Influenza".to_string())],
        )
        .await
        .unwrap();

    let tag = format!("{}{}", tag, std::process::id());
    let user_id: i64 = sqlx::query_scalar(
        "INSERT INTO users (username, email, password, gender) VALUES ($1, $2, 'x', 'male') RETURNING id",
    )
    .bind(&tag)
    .bind(format!("{}@test.local", tag))
    .fetch_one(pool.pool())
    .await
    .unwrap();

    (pool, user_id)
}

async fn record_count(pool: &DatabasePool, user_id: i64) -> i64 {
    sqlx::query_scalar("SELECT COUNT(*) FROM medical_records WHERE user_id = $1")
        .bind(user_id)
        .fetch_one(pool.pool())
        .await
        .unwrap()
}

fn test_ambient() -> AmbientContext {
    AmbientContext {
        temperature: 20.0,
        humidity: 50.0,
        air_quality_index: 2.0,
        season: Season::Autumn,
    }
}

#[tokio::test]
#[ignore = "requires PostgreSQL (set HPS_TEST_DATABASE_URL)"]
async fn test_persist_and_read_back_links() {
    let (pool, user_id) = seeded_pool("rt", 5).await;
    let queries = DatabaseQueries::new(&pool);

    let symptom_map = queries
        .resolve_symptom_codes(&["cough".to_string(), "fever".to_string()])
        .await
        .unwrap();
    let disease_map = queries
        .resolve_disease_codes(&["flu".to_string()])
        .await
        .unwrap();
    assert_eq!(symptom_map.len(), 2);
    let flu_id = disease_map["flu"];

    let mut symptom_ids: Vec<i64> = symptom_map.values().copied().collect();
    symptom_ids.sort_unstable();

    let store = PgStore::new(pool.clone());
    let record_id = store
        .persist_encounter(
            &NewEncounter::system_prediction(user_id, test_ambient()),
            &symptom_ids,
            &[(flu_id, 0.8)],
        )
        .await
        .unwrap();

    // 病历本体按写入内容读回
    let record = queries
        .get_medical_record(record_id)
        .await
        .unwrap()
        .expect("record should exist");
    assert_eq!(record.user_id, user_id);
    assert_eq!(record.record_type, "system_prediction");
    assert_eq!(record.status, RecordStatus::Completed);
    assert_eq!(record.ambient.temperature, 20.0);
    assert_eq!(record.ambient.season, Season::Autumn);

    // 读回的ID集合与写入一致，与插入顺序无关
    let read_back = queries.get_record_symptom_ids(record_id).await.unwrap();
    assert_eq!(read_back, symptom_ids);

    let diseases = queries
        .get_record_disease_predictions(record_id)
        .await
        .unwrap();
    assert_eq!(diseases, vec![(flu_id, 0.8)]);
}

#[tokio::test]
#[ignore = "requires PostgreSQL (set HPS_TEST_DATABASE_URL)"]
async fn test_timeout_commits_nothing() {
    // 超时为0秒：任何事务都会在提交前被丢弃
    let (pool, user_id) = seeded_pool("to", 0).await;
    let queries = DatabaseQueries::new(&pool);

    let symptom_map = queries
        .resolve_symptom_codes(&["cough".to_string()])
        .await
        .unwrap();
    let symptom_ids: Vec<i64> = symptom_map.values().copied().collect();

    let store = PgStore::new(pool.clone());
    let err = store
        .persist_encounter(
            &NewEncounter::system_prediction(user_id, test_ambient()),
            &symptom_ids,
            &[],
        )
        .await
        .unwrap_err();

    assert_eq!(err.kind(), "storage_timeout");
    // 事务随连接释放回滚，不留半成品
    assert_eq!(record_count(&pool, user_id).await, 0);
}

#[tokio::test]
#[ignore = "requires PostgreSQL (set HPS_TEST_DATABASE_URL)"]
async fn test_failed_link_rolls_back_record() {
    let (pool, user_id) = seeded_pool("rb", 5).await;

    // 不存在的症状ID触发外键冲突：病历行已写入事务，必须一并回滚
    let store = PgStore::new(pool.clone());
    let err = store
        .persist_encounter(
            &NewEncounter::system_prediction(user_id, test_ambient()),
            &[i64::MAX],
            &[],
        )
        .await
        .unwrap_err();

    assert_eq!(err.kind(), "storage_failure");
    assert_eq!(record_count(&pool, user_id).await, 0);
}
