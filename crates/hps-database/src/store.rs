//! 协作方接口的PostgreSQL实现
//!
//! `persist_encounter` 在单个事务内写入病历与全部关联行：
//! 任何失败显式回滚；超时或取消时事务随连接释放回滚，
//! 绝不提交半成品。

use crate::connection::DatabasePool;
use crate::queries::DatabaseQueries;
use async_trait::async_trait;
use hps_core::{HpsError, NewEncounter, Result, UserProfile};
use hps_pipeline::{CatalogService, EncounterStore, UserDirectory};
use sqlx::{Postgres, Transaction};
use std::collections::HashMap;

/// 基于连接池的存储实现
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: DatabasePool,
}

impl PgStore {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }

    async fn write_encounter(
        tx: &mut Transaction<'_, Postgres>,
        encounter: &NewEncounter,
        symptom_ids: &[i64],
        disease_predictions: &[(i64, f64)],
    ) -> Result<i64> {
        let record_id: i64 = sqlx::query_scalar(r#"
            INSERT INTO medical_records
                (user_id, record_type, status, weather_temp, humidity, air_quality_index, season)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id
        "#)
        .bind(encounter.user_id)
        .bind(&encounter.record_type)
        .bind(encounter.status.as_str())
        .bind(encounter.ambient.temperature)
        .bind(encounter.ambient.humidity)
        .bind(encounter.ambient.air_quality_index)
        .bind(encounter.ambient.season.as_str())
        .fetch_one(&mut **tx)
        .await
        .map_err(|e| HpsError::Database(e.to_string()))?;

        for symptom_id in symptom_ids {
            sqlx::query("INSERT INTO record_symptoms (record_id, symptom_id) VALUES ($1, $2)")
                .bind(record_id)
                .bind(symptom_id)
                .execute(&mut **tx)
                .await
                .map_err(|e| HpsError::Database(e.to_string()))?;
        }

        // 已解析子集为空时不写任何疾病预测行，不算错误
        for (disease_id, probability) in disease_predictions {
            sqlx::query(
                "INSERT INTO record_diseases (record_id, disease_id, probability) VALUES ($1, $2, $3)"
            )
            .bind(record_id)
            .bind(disease_id)
            .bind(probability)
            .execute(&mut **tx)
            .await
            .map_err(|e| HpsError::Database(e.to_string()))?;
        }

        Ok(record_id)
    }
}

#[async_trait]
impl EncounterStore for PgStore {
    async fn persist_encounter(
        &self,
        encounter: &NewEncounter,
        symptom_ids: &[i64],
        disease_predictions: &[(i64, f64)],
    ) -> Result<i64> {
        let timeout = self.pool.transaction_timeout();

        let transaction = async {
            let mut tx = self
                .pool
                .pool()
                .begin()
                .await
                .map_err(|e| HpsError::Database(e.to_string()))?;

            match Self::write_encounter(&mut tx, encounter, symptom_ids, disease_predictions).await
            {
                Ok(record_id) => {
                    tx.commit()
                        .await
                        .map_err(|e| HpsError::Database(e.to_string()))?;
                    Ok(record_id)
                }
                Err(e) => {
                    // 显式回滚后再传播
                    if let Err(rollback_err) = tx.rollback().await {
                        tracing::error!("Rollback failed: {}", rollback_err);
                    }
                    tracing::warn!("Encounter transaction rolled back: {}", e);
                    Err(e)
                }
            }
        };

        match tokio::time::timeout(timeout, transaction).await {
            Ok(result) => result,
            // 超时丢弃事务（连接归还时回滚），不提交
            Err(_) => Err(HpsError::StorageTimeout(format!(
                "encounter transaction exceeded {}s",
                timeout.as_secs()
            ))),
        }
    }
}

#[async_trait]
impl UserDirectory for PgStore {
    async fn get_user_by_id(&self, id: i64) -> Result<Option<UserProfile>> {
        DatabaseQueries::new(&self.pool).get_user_by_id(id).await
    }
}

#[async_trait]
impl CatalogService for PgStore {
    async fn resolve_symptom_codes(&self, codes: &[String]) -> Result<HashMap<String, i64>> {
        DatabaseQueries::new(&self.pool)
            .resolve_symptom_codes(codes)
            .await
    }

    async fn resolve_disease_codes(&self, codes: &[String]) -> Result<HashMap<String, i64>> {
        DatabaseQueries::new(&self.pool)
            .resolve_disease_codes(codes)
            .await
    }
}
