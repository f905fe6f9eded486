//! 预测事务协调器
//!
//! 管线唯一入口：解析用户 → 编码特征 → 推理 → 解析目录编码 →
//! 原子持久化。事务开启前的任何失败都不触碰存储；事务内的
//! 失败由存储层整体回滚。

use crate::ambient::{current_season, WeatherProvider};
use crate::traits::{CatalogService, EncounterStore, UserDirectory};
use chrono::Utc;
use hps_core::{
    AmbientContext, HpsError, NewEncounter, PatientProfile, PredictionResult, Result,
};
use hps_ml::{FeatureEncoder, InferenceEngine};
use std::sync::Arc;

/// 一次成功提交的结果
#[derive(Debug, Clone)]
pub struct SubmitOutcome {
    pub record_id: i64,
    pub prediction: PredictionResult,
}

/// 预测事务协调器
pub struct PredictionCoordinator {
    directory: Arc<dyn UserDirectory>,
    catalog: Arc<dyn CatalogService>,
    store: Arc<dyn EncounterStore>,
    engine: InferenceEngine,
    weather: Arc<dyn WeatherProvider>,
    threshold: f64,
}

impl PredictionCoordinator {
    pub fn new(
        directory: Arc<dyn UserDirectory>,
        catalog: Arc<dyn CatalogService>,
        store: Arc<dyn EncounterStore>,
        engine: InferenceEngine,
        weather: Arc<dyn WeatherProvider>,
        threshold: f64,
    ) -> Self {
        Self {
            directory,
            catalog,
            store,
            engine,
            weather,
            threshold,
        }
    }

    /// 提交一次症状报告：预测并原子落库
    ///
    /// 要么完整的病历（含症状关联和可能为空的疾病预测关联）
    /// 提交成功，要么什么都不存在，外部观察不到中间状态。
    pub async fn submit(&self, user_id: i64, symptom_codes: &[String]) -> Result<SubmitOutcome> {
        if symptom_codes.is_empty() {
            return Err(HpsError::Validation(
                "symptom_codes must not be empty".to_string(),
            ));
        }

        // 1. 解析用户（失败时尚未开启任何事务）
        let user = self
            .directory
            .get_user_by_id(user_id)
            .await?
            .ok_or(HpsError::UserNotFound(user_id))?;

        // 2. 采集环境、编码特征、推理；推理失败不触碰存储
        let reading = self.weather.sample();
        let ambient = AmbientContext::from_reading(reading, current_season());
        let profile = PatientProfile::from_user(&user, Utc::now().date_naive());

        let vector = FeatureEncoder::encode(&profile, &ambient, symptom_codes);
        let prediction = self
            .engine
            .infer(&vector, self.threshold)
            .map_err(|e| HpsError::PredictionUnavailable(e.to_string()))?;

        // 3. 症状编码必须全部可解析，否则整体拒绝
        let deduped = dedup_preserving_order(symptom_codes);
        let symptom_map = self.catalog.resolve_symptom_codes(&deduped).await?;
        let offenders: Vec<String> = deduped
            .iter()
            .filter(|code| !symptom_map.contains_key(*code))
            .cloned()
            .collect();
        if !offenders.is_empty() {
            tracing::warn!("Rejecting submit for user {}: invalid symptom codes {:?}", user_id, offenders);
            return Err(HpsError::InvalidSymptomCode(offenders));
        }
        let symptom_ids: Vec<i64> = deduped.iter().map(|code| symptom_map[code]).collect();

        // 4. 前3疾病编码：无目录匹配的只从持久化中剔除，
        //    预测结果里原样保留
        let top_codes: Vec<String> = prediction
            .sorted_predictions
            .iter()
            .map(|(code, _)| code.clone())
            .collect();
        let disease_map = self.catalog.resolve_disease_codes(&top_codes).await?;
        let disease_predictions: Vec<(i64, f64)> = prediction
            .sorted_predictions
            .iter()
            .filter_map(|(code, prob)| disease_map.get(code).map(|&id| (id, *prob)))
            .collect();
        if disease_predictions.len() < top_codes.len() {
            tracing::debug!(
                "Dropping {} unresolved disease codes from persistence",
                top_codes.len() - disease_predictions.len()
            );
        }

        // 5. 单事务写入病历 + 关联行
        let encounter = NewEncounter::system_prediction(user_id, ambient);
        let record_id = self
            .store
            .persist_encounter(&encounter, &symptom_ids, &disease_predictions)
            .await?;

        tracing::info!(
            "Recorded encounter {} for user {}: {} symptoms, {} disease predictions",
            record_id,
            user_id,
            symptom_ids.len(),
            disease_predictions.len()
        );

        Ok(SubmitOutcome {
            record_id,
            prediction,
        })
    }
}

fn dedup_preserving_order(codes: &[String]) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    codes
        .iter()
        .filter(|code| seen.insert(code.as_str()))
        .cloned()
        .collect()
}
