//! 核心数据模型定义

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// 性别枚举
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Gender {
    Male,
    Female,
    Other,
}

impl Gender {
    /// 训练/推理使用的固定整数编码
    pub fn code(&self) -> f64 {
        match self {
            Gender::Male => 1.0,
            Gender::Female => 0.0,
            Gender::Other => 2.0,
        }
    }

    /// 从数据库字符串解析，未知取值归入Other
    pub fn from_str_or_other(s: &str) -> Self {
        match s {
            "male" => Gender::Male,
            "female" => Gender::Female,
            _ => Gender::Other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::Male => "male",
            Gender::Female => "female",
            Gender::Other => "other",
        }
    }
}

/// 季节枚举
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Season {
    Spring,
    Summer,
    Autumn,
    Winter,
}

impl Season {
    /// 训练/推理使用的固定整数编码
    pub fn code(&self) -> f64 {
        match self {
            Season::Spring => 0.0,
            Season::Summer => 1.0,
            Season::Autumn => 2.0,
            Season::Winter => 3.0,
        }
    }

    /// 按月份划分季节
    pub fn from_month(month: u32) -> Self {
        match month {
            12 | 1 | 2 => Season::Winter,
            3..=5 => Season::Spring,
            6..=8 => Season::Summer,
            _ => Season::Autumn,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Season::Spring => "spring",
            Season::Summer => "summer",
            Season::Autumn => "autumn",
            Season::Winter => "winter",
        }
    }

    /// 从数据库字符串解析，未知取值默认Spring
    pub fn from_str_or_default(s: &str) -> Self {
        match s {
            "summer" => Season::Summer,
            "autumn" => Season::Autumn,
            "winter" => Season::Winter,
            "spring" => Season::Spring,
            _ => Season::Spring,
        }
    }
}

/// 用户目录视图（预测管线只读取这两个字段）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: i64,
    pub date_of_birth: Option<NaiveDate>,
    pub gender: Gender,
}

/// 每次请求的患者画像快照，构建后不再变更
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatientProfile {
    pub age: f64,
    pub gender: Gender,
}

impl PatientProfile {
    /// 出生日期缺失时年龄按30处理
    pub fn from_user(user: &UserProfile, today: NaiveDate) -> Self {
        let age = user
            .date_of_birth
            .map(|dob| (today.year() - dob.year()) as f64)
            .unwrap_or(30.0);
        Self {
            age,
            gender: user.gender,
        }
    }
}

/// 环境上下文：采集后不可变
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AmbientContext {
    pub temperature: f64,
    pub humidity: f64,
    pub air_quality_index: f64,
    pub season: Season,
}

/// 环境读数（来源可能缺项，转换时落默认值）
#[derive(Debug, Clone, Default)]
pub struct AmbientReading {
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
    pub air_quality_index: Option<f64>,
}

impl AmbientContext {
    pub const DEFAULT_TEMPERATURE: f64 = 25.0;
    pub const DEFAULT_HUMIDITY: f64 = 60.0;
    pub const DEFAULT_AQI: f64 = 3.0;

    pub fn from_reading(reading: AmbientReading, season: Season) -> Self {
        Self {
            temperature: reading.temperature.unwrap_or(Self::DEFAULT_TEMPERATURE),
            humidity: reading.humidity.unwrap_or(Self::DEFAULT_HUMIDITY),
            air_quality_index: reading.air_quality_index.unwrap_or(Self::DEFAULT_AQI),
            season,
        }
    }
}

/// 病历记录状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecordStatus {
    Completed,
    Pending,
}

impl RecordStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordStatus::Completed => "completed",
            RecordStatus::Pending => "pending",
        }
    }

    /// 从数据库字符串解析，未知取值归入Pending
    pub fn from_str_or_default(s: &str) -> Self {
        match s {
            "completed" => RecordStatus::Completed,
            _ => RecordStatus::Pending,
        }
    }
}

/// 待写入的病历记录（id由存储层分配）
#[derive(Debug, Clone)]
pub struct NewEncounter {
    pub user_id: i64,
    pub record_type: String,
    pub status: RecordStatus,
    pub ambient: AmbientContext,
}

impl NewEncounter {
    /// 系统预测产生的病历
    pub fn system_prediction(user_id: i64, ambient: AmbientContext) -> Self {
        Self {
            user_id,
            record_type: "system_prediction".to_string(),
            status: RecordStatus::Completed,
            ambient,
        }
    }
}

/// 病历记录（已持久化）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MedicalRecord {
    pub id: i64,
    pub user_id: i64,
    pub record_type: String,
    pub status: RecordStatus,
    pub ambient: AmbientContext,
    pub created_at: DateTime<Utc>,
}

/// 多标签预测结果（派生数据，仅疾病预测行落库）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionResult {
    /// 全部标签的阳性概率
    pub all_probabilities: BTreeMap<String, f64>,
    /// 超过阈值的标签子集
    pub predicted_diseases: BTreeMap<String, f64>,
    /// 概率降序的前3项，同分按模型标签顺序
    pub sorted_predictions: Vec<(String, f64)>,
    pub prediction_time: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_season_from_month() {
        assert_eq!(Season::from_month(12), Season::Winter);
        assert_eq!(Season::from_month(1), Season::Winter);
        assert_eq!(Season::from_month(4), Season::Spring);
        assert_eq!(Season::from_month(7), Season::Summer);
        assert_eq!(Season::from_month(10), Season::Autumn);
    }

    #[test]
    fn test_gender_codes() {
        assert_eq!(Gender::Male.code(), 1.0);
        assert_eq!(Gender::Female.code(), 0.0);
        assert_eq!(Gender::Other.code(), 2.0);
        assert_eq!(Gender::from_str_or_other("unknown"), Gender::Other);
    }

    #[test]
    fn test_profile_age_fallback() {
        let today = NaiveDate::from_ymd_opt(2026, 8, 30).unwrap();
        let user = UserProfile {
            id: 1,
            date_of_birth: Some(NaiveDate::from_ymd_opt(1990, 3, 14).unwrap()),
            gender: Gender::Female,
        };
        assert_eq!(PatientProfile::from_user(&user, today).age, 36.0);

        let no_dob = UserProfile {
            id: 2,
            date_of_birth: None,
            gender: Gender::Male,
        };
        assert_eq!(PatientProfile::from_user(&no_dob, today).age, 30.0);
    }

    #[test]
    fn test_record_status_round_trips_through_storage_string() {
        assert_eq!(
            RecordStatus::from_str_or_default(RecordStatus::Completed.as_str()),
            RecordStatus::Completed
        );
        assert_eq!(
            RecordStatus::from_str_or_default(RecordStatus::Pending.as_str()),
            RecordStatus::Pending
        );
        assert_eq!(
            RecordStatus::from_str_or_default("garbage"),
            RecordStatus::Pending
        );
    }

    #[test]
    fn test_ambient_defaults() {
        let ctx = AmbientContext::from_reading(AmbientReading::default(), Season::Winter);
        assert_eq!(ctx.temperature, AmbientContext::DEFAULT_TEMPERATURE);
        assert_eq!(ctx.humidity, AmbientContext::DEFAULT_HUMIDITY);
        assert_eq!(ctx.air_quality_index, AmbientContext::DEFAULT_AQI);
        assert_eq!(ctx.season, Season::Winter);
    }
}
