//! 数据库模型

use chrono::{DateTime, NaiveDate, Utc};
use hps_core::{
    AmbientContext, Gender, MedicalRecord, RecordStatus, Season, UserProfile,
};
use sqlx::FromRow;

// 数据库表模型 - 使用FromRow trait用于SQL查询

/// 用户表投影（预测管线只读取这几列）
#[derive(Debug, FromRow)]
pub struct DbUser {
    pub id: i64,
    pub date_of_birth: Option<NaiveDate>,
    pub gender: String, // 存储为字符串，转换为Gender枚举
}

impl From<DbUser> for UserProfile {
    fn from(db_user: DbUser) -> Self {
        UserProfile {
            id: db_user.id,
            date_of_birth: db_user.date_of_birth,
            gender: Gender::from_str_or_other(&db_user.gender),
        }
    }
}

/// 目录编码解析行
#[derive(Debug, FromRow)]
pub struct DbCodeId {
    pub id: i64,
    pub code: String,
}

/// 病历表行（环境字段展开存储）
#[derive(Debug, FromRow)]
pub struct DbMedicalRecord {
    pub id: i64,
    pub user_id: i64,
    pub record_type: String,
    pub status: String,
    pub weather_temp: f64,
    pub humidity: f64,
    pub air_quality_index: f64,
    pub season: String,
    pub created_at: DateTime<Utc>,
}

impl From<DbMedicalRecord> for MedicalRecord {
    fn from(row: DbMedicalRecord) -> Self {
        MedicalRecord {
            id: row.id,
            user_id: row.user_id,
            record_type: row.record_type,
            status: RecordStatus::from_str_or_default(&row.status),
            ambient: AmbientContext {
                temperature: row.weather_temp,
                humidity: row.humidity,
                air_quality_index: row.air_quality_index,
                season: Season::from_str_or_default(&row.season),
            },
            created_at: row.created_at,
        }
    }
}

/// 训练数据行：病历 + 用户画像 + 聚合的症状/疾病编码
#[derive(Debug, FromRow)]
pub struct TrainingRow {
    pub date_of_birth: Option<NaiveDate>,
    pub gender: String,
    pub weather_temp: f64,
    pub humidity: f64,
    pub air_quality_index: f64,
    pub season: String,
    pub symptoms: Vec<String>,
    pub diseases: Vec<String>,
}
