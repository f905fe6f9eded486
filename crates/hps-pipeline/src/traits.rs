//! 外部协作方接口
//!
//! 预测管线依赖的三个协作方，全部以 `Arc<dyn …>` 注入，
//! 测试可替换为内存实现。

use async_trait::async_trait;
use hps_core::{NewEncounter, Result, UserProfile};
use std::collections::HashMap;

/// 用户目录：只读查询用户画像
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn get_user_by_id(&self, id: i64) -> Result<Option<UserProfile>>;
}

/// 症状/疾病目录：编码 → 行ID解析，允许部分命中，
/// 完整性由调用方检查
#[async_trait]
pub trait CatalogService: Send + Sync {
    async fn resolve_symptom_codes(&self, codes: &[String]) -> Result<HashMap<String, i64>>;
    async fn resolve_disease_codes(&self, codes: &[String]) -> Result<HashMap<String, i64>>;
}

/// 病历存储：病历 + 症状关联 + 疾病预测关联在单个事务内
/// 全有或全无地写入
#[async_trait]
pub trait EncounterStore: Send + Sync {
    /// 返回存储分配的病历ID。任何失败（含超时、取消）必须
    /// 回滚，不留下部分状态。
    async fn persist_encounter(
        &self,
        encounter: &NewEncounter,
        symptom_ids: &[i64],
        disease_predictions: &[(i64, f64)],
    ) -> Result<i64>;
}
