//! 特征编码
//!
//! 将患者画像、环境上下文和症状编码转换为有序数值特征向量。

use hps_core::{AmbientContext, PatientProfile};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// 有序特征向量：特征名 → 数值
///
/// 插入顺序即向量顺序；与模型声明顺序的对齐由推理引擎的
/// `reindex` 完成，编码器本身不感知模型。
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FeatureVector {
    names: Vec<String>,
    values: HashMap<String, f64>,
}

impl FeatureVector {
    pub fn new() -> Self {
        Self::default()
    }

    /// 写入特征；重复写入覆盖数值，保留首次位置
    pub fn insert(&mut self, name: &str, value: f64) {
        if !self.values.contains_key(name) {
            self.names.push(name.to_string());
        }
        self.values.insert(name.to_string(), value);
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.values.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// 按给定顺序重排：缺失补0.0，多余丢弃。幂等。
    pub fn reindex(&self, order: &[String]) -> FeatureVector {
        let mut out = FeatureVector::new();
        for name in order {
            out.insert(name, self.get(name).unwrap_or(0.0));
        }
        out
    }

    /// 按当前顺序导出稠密数值行
    pub fn as_row(&self) -> Vec<f64> {
        self.names
            .iter()
            .map(|name| self.values[name])
            .collect()
    }
}

/// 特征编码器：输入的纯函数，无副作用
pub struct FeatureEncoder;

/// 基础特征名（症状旗标之外的固定列）
pub const BASE_FEATURES: [&str; 6] = [
    "age",
    "gender",
    "weather_temp",
    "humidity",
    "air_quality_index",
    "season",
];

impl FeatureEncoder {
    /// 编码一次预测请求的全部特征
    pub fn encode(
        profile: &PatientProfile,
        ambient: &AmbientContext,
        symptom_codes: &[String],
    ) -> FeatureVector {
        let mut vector = FeatureVector::new();
        vector.insert("age", profile.age);
        vector.insert("gender", profile.gender.code());
        vector.insert("weather_temp", ambient.temperature);
        vector.insert("humidity", ambient.humidity);
        vector.insert("air_quality_index", ambient.air_quality_index);
        vector.insert("season", ambient.season.code());

        for code in symptom_codes {
            vector.insert(code, 1.0);
        }

        vector
    }
}
