//! 模型工件
//!
//! 离线训练产出的不可变模型包：逐标签二分类器集成、标准化器、
//! 特征顺序与标签顺序。加载后进程内只读共享，序列化格式由
//! `ArtifactCodec` 封装。

use chrono::{DateTime, Utc};
use hps_core::{HpsError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// 阳性类别编号
pub const POSITIVE_CLASS: u32 = 1;

/// 逐特征标准化器（训练期拟合的均值/标准差）
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StandardScaler {
    pub mean: Vec<f64>,
    pub std: Vec<f64>,
}

impl StandardScaler {
    /// 在训练矩阵上拟合；列宽由调用方声明
    pub fn fit(rows: &[Vec<f64>], width: usize) -> Self {
        let n = rows.len().max(1) as f64;
        let mut mean = vec![0.0; width];
        for row in rows {
            for (i, value) in row.iter().enumerate().take(width) {
                mean[i] += value;
            }
        }
        for m in &mut mean {
            *m /= n;
        }

        let mut std = vec![0.0; width];
        for row in rows {
            for (i, value) in row.iter().enumerate().take(width) {
                let d = value - mean[i];
                std[i] += d * d;
            }
        }
        for s in &mut std {
            *s = (*s / n).sqrt();
        }

        Self { mean, std }
    }

    /// 标准化器期望的输入维度
    pub fn width(&self) -> usize {
        self.mean.len()
    }

    /// 标准化一行；零方差特征输出0.0
    pub fn transform(&self, row: &[f64]) -> Result<Vec<f64>> {
        if row.len() != self.width() {
            return Err(HpsError::DimensionMismatch {
                expected: self.width(),
                actual: row.len(),
            });
        }
        Ok(row
            .iter()
            .enumerate()
            .map(|(i, &x)| {
                if self.std[i] == 0.0 {
                    0.0
                } else {
                    (x - self.mean[i]) / self.std[i]
                }
            })
            .collect())
    }
}

/// 决策树节点：阈值分裂或叶子类别分布
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TreeNode {
    Split {
        feature: usize,
        threshold: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
    },
    Leaf {
        /// 与所属分类器 `classes` 对齐的归一化分布
        distribution: Vec<f64>,
    },
}

impl TreeNode {
    /// 沿分裂路径下行到叶子分布
    pub fn predict(&self, row: &[f64]) -> &[f64] {
        match self {
            TreeNode::Leaf { distribution } => distribution,
            TreeNode::Split {
                feature,
                threshold,
                left,
                right,
            } => {
                let value = row.get(*feature).copied().unwrap_or(0.0);
                if value <= *threshold {
                    left.predict(row)
                } else {
                    right.predict(row)
                }
            }
        }
    }
}

/// 单棵决策树
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTree {
    pub root: TreeNode,
}

impl DecisionTree {
    pub fn predict_distribution(&self, row: &[f64]) -> &[f64] {
        self.root.predict(row)
    }
}

/// 单标签二分类器：观测类别集合 + 树集成
///
/// 训练集中从未出现阳性样本的标签，其 `classes` 只有单个类别；
/// 这类分类器的阳性概率按策略定义为0.0，不报错。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabelClassifier {
    pub classes: Vec<u32>,
    pub trees: Vec<DecisionTree>,
}

impl LabelClassifier {
    /// 只见过单一类别的退化分类器
    pub fn single_class(class: u32) -> Self {
        Self {
            classes: vec![class],
            trees: vec![DecisionTree {
                root: TreeNode::Leaf {
                    distribution: vec![1.0],
                },
            }],
        }
    }

    /// 各观测类别的概率 = 各树叶子分布的平均
    pub fn predict_proba(&self, row: &[f64]) -> Vec<f64> {
        let mut acc = vec![0.0; self.classes.len()];
        if self.trees.is_empty() {
            return acc;
        }
        for tree in &self.trees {
            let dist = tree.predict_distribution(row);
            for (i, p) in dist.iter().enumerate().take(acc.len()) {
                acc[i] += p;
            }
        }
        let n = self.trees.len() as f64;
        for p in &mut acc {
            *p /= n;
        }
        acc
    }

    /// 阳性类别概率；阳性类别未被观测到时为0.0
    pub fn positive_probability(&self, row: &[f64]) -> f64 {
        match self.classes.iter().position(|&c| c == POSITIVE_CLASS) {
            Some(idx) => self.predict_proba(row)[idx],
            None => 0.0,
        }
    }
}

/// 训练产出的不可变模型包
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub ensemble: Vec<LabelClassifier>,
    pub scaler: StandardScaler,
    /// 特征列顺序，承载语义，禁止重排
    pub feature_names: Vec<String>,
    /// 疾病编码顺序，与 `ensemble` 一一对应，禁止重排
    pub label_codes: Vec<String>,
    pub trained_at: DateTime<Utc>,
    pub model_type: String,
}

impl ModelArtifact {
    /// 校验内部一致性；推理引擎构造时调用
    pub fn validate(&self) -> Result<()> {
        if self.label_codes.is_empty() {
            return Err(HpsError::EmptyArtifact);
        }
        if self.ensemble.len() != self.label_codes.len() {
            return Err(HpsError::Validation(format!(
                "ensemble size {} does not match label count {}",
                self.ensemble.len(),
                self.label_codes.len()
            )));
        }
        if self.scaler.width() != self.feature_names.len() {
            return Err(HpsError::DimensionMismatch {
                expected: self.feature_names.len(),
                actual: self.scaler.width(),
            });
        }
        Ok(())
    }
}

/// 模型工件编解码接口：二进制格式是实现细节，不属于核心契约
pub trait ArtifactCodec: Send + Sync {
    fn load(&self, path: &Path) -> Result<ModelArtifact>;
    fn save(&self, artifact: &ModelArtifact, path: &Path) -> Result<()>;
}

/// JSON格式编解码实现
pub struct JsonArtifactCodec;

impl ArtifactCodec for JsonArtifactCodec {
    /// 路径不存在直接报错，绝不静默替换
    fn load(&self, path: &Path) -> Result<ModelArtifact> {
        if !path.exists() {
            return Err(HpsError::ArtifactNotFound(path.display().to_string()));
        }
        let data = std::fs::read_to_string(path)?;
        let artifact: ModelArtifact = serde_json::from_str(&data)?;
        artifact.validate()?;
        tracing::info!(
            "Model artifact loaded from {} ({} features, {} labels, trained at {})",
            path.display(),
            artifact.feature_names.len(),
            artifact.label_codes.len(),
            artifact.trained_at
        );
        Ok(artifact)
    }

    fn save(&self, artifact: &ModelArtifact, path: &Path) -> Result<()> {
        artifact.validate()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_string(artifact)?;
        std::fs::write(path, data)?;
        tracing::info!("Model artifact saved to {}", path.display());
        Ok(())
    }
}
