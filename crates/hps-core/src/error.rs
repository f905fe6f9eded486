//! 错误定义模块

use thiserror::Error;

/// HPS系统统一错误类型
#[derive(Error, Debug)]
pub enum HpsError {
    #[error("配置错误: {0}")]
    Config(String),

    #[error("数据库错误: {0}")]
    Database(String),

    #[error("存储超时: {0}")]
    StorageTimeout(String),

    #[error("用户不存在: {0}")]
    UserNotFound(i64),

    #[error("无效症状编码: {}", .0.join(", "))]
    InvalidSymptomCode(Vec<String>),

    #[error("预测服务不可用: {0}")]
    PredictionUnavailable(String),

    #[error("模型文件未找到: {0}")]
    ArtifactNotFound(String),

    #[error("特征维度不匹配: 期望 {expected}, 实际 {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("模型不包含任何疾病标签")]
    EmptyArtifact,

    #[error("验证错误: {0}")]
    Validation(String),

    #[error("序列化错误: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO错误: {0}")]
    Io(#[from] std::io::Error),

    #[error("系统内部错误: {0}")]
    Internal(String),
}

impl HpsError {
    /// 机器可读的错误类别，供外层（HTTP等）映射响应
    pub fn kind(&self) -> &'static str {
        match self {
            HpsError::Config(_) => "config",
            HpsError::Database(_) => "storage_failure",
            HpsError::StorageTimeout(_) => "storage_timeout",
            HpsError::UserNotFound(_) => "user_not_found",
            HpsError::InvalidSymptomCode(_) => "invalid_symptom_code",
            HpsError::PredictionUnavailable(_) => "prediction_unavailable",
            HpsError::ArtifactNotFound(_) => "artifact_not_found",
            HpsError::DimensionMismatch { .. } => "dimension_mismatch",
            HpsError::EmptyArtifact => "empty_artifact",
            HpsError::Validation(_) => "validation",
            HpsError::Serialization(_) => "serialization",
            HpsError::Io(_) => "io",
            HpsError::Internal(_) => "internal",
        }
    }
}

/// HPS系统统一结果类型
pub type Result<T> = std::result::Result<T, HpsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_symptom_code_lists_offenders() {
        let err = HpsError::InvalidSymptomCode(vec!["bogus".into(), "fake".into()]);
        let msg = err.to_string();
        assert!(msg.contains("bogus"));
        assert!(msg.contains("fake"));
        assert_eq!(err.kind(), "invalid_symptom_code");
    }

    #[test]
    fn test_kind_is_stable() {
        assert_eq!(HpsError::UserNotFound(7).kind(), "user_not_found");
        assert_eq!(
            HpsError::DimensionMismatch { expected: 6, actual: 4 }.kind(),
            "dimension_mismatch"
        );
    }
}
