//! 数据库查询操作

use crate::connection::DatabasePool;
use crate::models::*;
use hps_core::{HpsError, MedicalRecord, Result, UserProfile};
use std::collections::HashMap;

/// 数据库查询操作接口
pub struct DatabaseQueries<'a> {
    pool: &'a DatabasePool,
}

impl<'a> DatabaseQueries<'a> {
    pub fn new(pool: &'a DatabasePool) -> Self {
        Self { pool }
    }

    /// 创建数据库表
    pub async fn create_tables(&self) -> Result<()> {
        let pool = self.pool.pool();

        // 创建用户表
        sqlx::query(r#"
            CREATE TABLE IF NOT EXISTS users (
                id BIGSERIAL PRIMARY KEY,
                username VARCHAR(64) UNIQUE NOT NULL,
                email VARCHAR(255) UNIQUE NOT NULL,
                password VARCHAR(255) NOT NULL,
                first_name VARCHAR(64),
                last_name VARCHAR(64),
                date_of_birth DATE,
                gender VARCHAR(16) NOT NULL DEFAULT 'other',
                phone VARCHAR(32),
                address TEXT,
                role VARCHAR(16) NOT NULL DEFAULT 'patient',
                is_active BOOLEAN NOT NULL DEFAULT TRUE,
                created_at TIMESTAMP WITH TIME ZONE DEFAULT NOW()
            )
        "#).execute(pool).await.map_err(|e| HpsError::Database(e.to_string()))?;

        // 创建症状目录表
        sqlx::query(r#"
            CREATE TABLE IF NOT EXISTS symptoms (
                id BIGSERIAL PRIMARY KEY,
                code VARCHAR(64) UNIQUE NOT NULL,
                name VARCHAR(255) NOT NULL
            )
        "#).execute(pool).await.map_err(|e| HpsError::Database(e.to_string()))?;

        // 创建疾病目录表
        sqlx::query(r#"
            CREATE TABLE IF NOT EXISTS diseases (
                id BIGSERIAL PRIMARY KEY,
                code VARCHAR(64) UNIQUE NOT NULL,
                name VARCHAR(255) NOT NULL
            )
        "#).execute(pool).await.map_err(|e| HpsError::Database(e.to_string()))?;

        // 创建病历表
        sqlx::query(r#"
            CREATE TABLE IF NOT EXISTS medical_records (
                id BIGSERIAL PRIMARY KEY,
                user_id BIGINT NOT NULL REFERENCES users(id),
                record_type VARCHAR(32) NOT NULL,
                status VARCHAR(20) NOT NULL,
                weather_temp DOUBLE PRECISION NOT NULL,
                humidity DOUBLE PRECISION NOT NULL,
                air_quality_index DOUBLE PRECISION NOT NULL,
                season VARCHAR(16) NOT NULL,
                created_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW()
            )
        "#).execute(pool).await.map_err(|e| HpsError::Database(e.to_string()))?;

        // 创建病历-症状关联表
        sqlx::query(r#"
            CREATE TABLE IF NOT EXISTS record_symptoms (
                record_id BIGINT NOT NULL REFERENCES medical_records(id) ON DELETE CASCADE,
                symptom_id BIGINT NOT NULL REFERENCES symptoms(id),
                PRIMARY KEY (record_id, symptom_id)
            )
        "#).execute(pool).await.map_err(|e| HpsError::Database(e.to_string()))?;

        // 创建病历-疾病预测关联表
        sqlx::query(r#"
            CREATE TABLE IF NOT EXISTS record_diseases (
                record_id BIGINT NOT NULL REFERENCES medical_records(id) ON DELETE CASCADE,
                disease_id BIGINT NOT NULL REFERENCES diseases(id),
                probability DOUBLE PRECISION NOT NULL,
                PRIMARY KEY (record_id, disease_id)
            )
        "#).execute(pool).await.map_err(|e| HpsError::Database(e.to_string()))?;

        // 创建索引以优化查询性能
        self.create_indexes().await?;

        tracing::info!("Database tables created successfully");
        Ok(())
    }

    /// 创建数据库索引
    async fn create_indexes(&self) -> Result<()> {
        let pool = self.pool.pool();

        let indexes = vec![
            "CREATE INDEX IF NOT EXISTS idx_users_username ON users(username)",
            "CREATE INDEX IF NOT EXISTS idx_symptoms_code ON symptoms(code)",
            "CREATE INDEX IF NOT EXISTS idx_diseases_code ON diseases(code)",
            "CREATE INDEX IF NOT EXISTS idx_medical_records_user_id ON medical_records(user_id)",
            "CREATE INDEX IF NOT EXISTS idx_record_symptoms_record_id ON record_symptoms(record_id)",
            "CREATE INDEX IF NOT EXISTS idx_record_diseases_record_id ON record_diseases(record_id)",
        ];

        for index_sql in indexes {
            sqlx::query(index_sql)
                .execute(pool)
                .await
                .map_err(|e| HpsError::Database(e.to_string()))?;
        }

        tracing::info!("Database indexes created successfully");
        Ok(())
    }

    // ========== 用户相关操作 ==========

    /// 根据ID查找用户画像
    pub async fn get_user_by_id(&self, id: i64) -> Result<Option<UserProfile>> {
        let pool = self.pool.pool();

        let result = sqlx::query_as::<_, DbUser>(
            "SELECT id, date_of_birth, gender FROM users WHERE id = $1"
        )
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(|e| HpsError::Database(e.to_string()))?;

        Ok(result.map(UserProfile::from))
    }

    // ========== 目录相关操作 ==========

    /// 症状编码批量解析为行ID（允许部分命中）
    pub async fn resolve_symptom_codes(&self, codes: &[String]) -> Result<HashMap<String, i64>> {
        self.resolve_codes("symptoms", codes).await
    }

    /// 疾病编码批量解析为行ID（允许部分命中）
    pub async fn resolve_disease_codes(&self, codes: &[String]) -> Result<HashMap<String, i64>> {
        self.resolve_codes("diseases", codes).await
    }

    async fn resolve_codes(&self, table: &str, codes: &[String]) -> Result<HashMap<String, i64>> {
        if codes.is_empty() {
            return Ok(HashMap::new());
        }
        let pool = self.pool.pool();

        let query = format!("SELECT id, code FROM {} WHERE code = ANY($1)", table);
        let rows = sqlx::query_as::<_, DbCodeId>(&query)
            .bind(codes)
            .fetch_all(pool)
            .await
            .map_err(|e| HpsError::Database(e.to_string()))?;

        Ok(rows.into_iter().map(|row| (row.code, row.id)).collect())
    }

    /// 按ID顺序列出全部疾病编码（顺序即模型标签顺序）
    pub async fn list_disease_codes(&self) -> Result<Vec<String>> {
        let pool = self.pool.pool();

        let rows = sqlx::query_as::<_, DbCodeId>("SELECT id, code FROM diseases ORDER BY id")
            .fetch_all(pool)
            .await
            .map_err(|e| HpsError::Database(e.to_string()))?;

        Ok(rows.into_iter().map(|row| row.code).collect())
    }

    /// 按ID顺序列出全部症状编码
    pub async fn list_symptom_codes(&self) -> Result<Vec<String>> {
        let pool = self.pool.pool();

        let rows = sqlx::query_as::<_, DbCodeId>("SELECT id, code FROM symptoms ORDER BY id")
            .fetch_all(pool)
            .await
            .map_err(|e| HpsError::Database(e.to_string()))?;

        Ok(rows.into_iter().map(|row| row.code).collect())
    }

    /// 写入目录条目（已存在的编码跳过）
    pub async fn seed_catalog(
        &self,
        symptoms: &[(String, String)],
        diseases: &[(String, String)],
    ) -> Result<()> {
        let pool = self.pool.pool();

        for (code, name) in symptoms {
            sqlx::query("INSERT INTO symptoms (code, name) VALUES ($1, $2) ON CONFLICT (code) DO NOTHING")
                .bind(code)
                .bind(name)
                .execute(pool)
                .await
                .map_err(|e| HpsError::Database(e.to_string()))?;
        }
        for (code, name) in diseases {
            sqlx::query("INSERT INTO diseases (code, name) VALUES ($1, $2) ON CONFLICT (code) DO NOTHING")
                .bind(code)
                .bind(name)
                .execute(pool)
                .await
                .map_err(|e| HpsError::Database(e.to_string()))?;
        }

        tracing::info!(
            "Catalog seeded: {} symptoms, {} diseases",
            symptoms.len(),
            diseases.len()
        );
        Ok(())
    }

    // ========== 病历相关操作 ==========

    /// 按ID读回病历记录
    pub async fn get_medical_record(&self, id: i64) -> Result<Option<MedicalRecord>> {
        let pool = self.pool.pool();

        let result = sqlx::query_as::<_, DbMedicalRecord>(r#"
            SELECT id, user_id, record_type, status, weather_temp, humidity,
                   air_quality_index, season, created_at
            FROM medical_records
            WHERE id = $1
        "#)
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(|e| HpsError::Database(e.to_string()))?;

        Ok(result.map(MedicalRecord::from))
    }

    /// 读回某病历关联的症状ID集合
    pub async fn get_record_symptom_ids(&self, record_id: i64) -> Result<Vec<i64>> {
        let pool = self.pool.pool();

        let rows: Vec<(i64,)> = sqlx::query_as(
            "SELECT symptom_id FROM record_symptoms WHERE record_id = $1 ORDER BY symptom_id"
        )
        .bind(record_id)
        .fetch_all(pool)
        .await
        .map_err(|e| HpsError::Database(e.to_string()))?;

        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    /// 读回某病历关联的疾病预测
    pub async fn get_record_disease_predictions(&self, record_id: i64) -> Result<Vec<(i64, f64)>> {
        let pool = self.pool.pool();

        let rows: Vec<(i64, f64)> = sqlx::query_as(
            "SELECT disease_id, probability FROM record_diseases WHERE record_id = $1 ORDER BY disease_id"
        )
        .bind(record_id)
        .fetch_all(pool)
        .await
        .map_err(|e| HpsError::Database(e.to_string()))?;

        Ok(rows)
    }

    // ========== 训练数据 ==========

    /// 加载多标签训练数据：每条病历带用户画像、环境字段及
    /// 聚合后的症状/疾病编码；无疾病标签的病历被排除
    pub async fn load_training_rows(&self) -> Result<Vec<TrainingRow>> {
        let pool = self.pool.pool();

        let rows = sqlx::query_as::<_, TrainingRow>(r#"
            SELECT
                u.date_of_birth,
                u.gender,
                mr.weather_temp,
                mr.humidity,
                mr.air_quality_index,
                mr.season,
                COALESCE(rsa.symptoms, '{}') AS symptoms,
                rda.diseases
            FROM medical_records mr
            JOIN users u ON mr.user_id = u.id
            LEFT JOIN (
                SELECT rs.record_id, array_agg(s.code) AS symptoms
                FROM record_symptoms rs
                JOIN symptoms s ON rs.symptom_id = s.id
                GROUP BY rs.record_id
            ) rsa ON mr.id = rsa.record_id
            JOIN (
                SELECT rd.record_id, array_agg(d.code) AS diseases
                FROM record_diseases rd
                JOIN diseases d ON rd.disease_id = d.id
                GROUP BY rd.record_id
            ) rda ON mr.id = rda.record_id
        "#)
        .fetch_all(pool)
        .await
        .map_err(|e| HpsError::Database(e.to_string()))?;

        tracing::info!("Loaded {} training rows from the database", rows.len());
        Ok(rows)
    }
}
