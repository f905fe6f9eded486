//! 模型训练
//!
//! 基于历史病历训练多标签模型：拟合标准化器，再逐疾病标签
//! 训练一个自助采样 + Gini分裂的树集成。产物满足工件契约，
//! 训练集中无阳性样本的标签照常保留为单类别分类器。

use crate::artifact::{
    DecisionTree, LabelClassifier, ModelArtifact, StandardScaler, TreeNode, POSITIVE_CLASS,
};
use crate::features::FeatureVector;
use chrono::Utc;
use hps_core::{HpsError, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// 训练超参数
#[derive(Debug, Clone)]
pub struct TrainerConfig {
    /// 每个标签的树数量
    pub n_trees: usize,
    /// 单棵树最大深度
    pub max_depth: usize,
    /// 继续分裂所需的最小样本数
    pub min_samples_split: usize,
    /// 随机种子，保证训练可复现
    pub seed: u64,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            n_trees: 25,
            max_depth: 8,
            min_samples_split: 4,
            seed: 42,
        }
    }
}

/// 单条训练样本：编码后的特征 + 该病历确诊的疾病编码
#[derive(Debug, Clone)]
pub struct TrainingExample {
    pub features: FeatureVector,
    pub labels: Vec<String>,
}

/// 多标签模型训练器
pub struct Trainer {
    config: TrainerConfig,
}

impl Trainer {
    pub fn new(config: TrainerConfig) -> Self {
        Self { config }
    }

    /// 训练并组装模型工件
    pub fn fit(
        &self,
        examples: &[TrainingExample],
        feature_names: &[String],
        label_codes: &[String],
    ) -> Result<ModelArtifact> {
        if label_codes.is_empty() {
            return Err(HpsError::EmptyArtifact);
        }
        if feature_names.is_empty() {
            return Err(HpsError::Validation("no feature columns".to_string()));
        }
        if examples.is_empty() {
            return Err(HpsError::Validation("no training examples".to_string()));
        }

        tracing::info!(
            "Training multi-label model: {} examples, {} features, {} labels",
            examples.len(),
            feature_names.len(),
            label_codes.len()
        );

        let rows: Vec<Vec<f64>> = examples
            .iter()
            .map(|ex| ex.features.reindex(feature_names).as_row())
            .collect();

        let scaler = StandardScaler::fit(&rows, feature_names.len());
        let matrix: Vec<Vec<f64>> = rows
            .iter()
            .map(|row| scaler.transform(row))
            .collect::<Result<_>>()?;

        let mut rng = StdRng::seed_from_u64(self.config.seed);
        let mut ensemble = Vec::with_capacity(label_codes.len());

        for code in label_codes {
            let targets: Vec<u32> = examples
                .iter()
                .map(|ex| {
                    if ex.labels.iter().any(|l| l == code) {
                        POSITIVE_CLASS
                    } else {
                        0
                    }
                })
                .collect();

            let has_positive = targets.iter().any(|&t| t == POSITIVE_CLASS);
            let has_negative = targets.iter().any(|&t| t == 0);

            if !(has_positive && has_negative) {
                // 单类别标签仍保留在工件中
                let class = if has_positive { POSITIVE_CLASS } else { 0 };
                tracing::warn!("Label {} has a single observed class {}", code, class);
                ensemble.push(LabelClassifier::single_class(class));
                continue;
            }

            ensemble.push(self.fit_label(&matrix, &targets, &mut rng));
        }

        let artifact = ModelArtifact {
            ensemble,
            scaler,
            feature_names: feature_names.to_vec(),
            label_codes: label_codes.to_vec(),
            trained_at: Utc::now(),
            model_type: "random_forest_multilabel".to_string(),
        };
        artifact.validate()?;
        Ok(artifact)
    }

    /// 训练单个标签的树集成
    fn fit_label(&self, matrix: &[Vec<f64>], targets: &[u32], rng: &mut StdRng) -> LabelClassifier {
        let n = matrix.len();
        let mut trees = Vec::with_capacity(self.config.n_trees);

        for _ in 0..self.config.n_trees {
            // 自助采样
            let indices: Vec<usize> = (0..n).map(|_| rng.gen_range(0..n)).collect();
            let root = self.grow(matrix, targets, &indices, 0, rng);
            trees.push(DecisionTree { root });
        }

        LabelClassifier {
            classes: vec![0, POSITIVE_CLASS],
            trees,
        }
    }

    /// 递归生长一棵树
    fn grow(
        &self,
        matrix: &[Vec<f64>],
        targets: &[u32],
        indices: &[usize],
        depth: usize,
        rng: &mut StdRng,
    ) -> TreeNode {
        let counts = class_counts(targets, indices);
        let total = indices.len();

        let pure = counts[0] == 0 || counts[1] == 0;
        if pure || depth >= self.config.max_depth || total < self.config.min_samples_split {
            return leaf_from_counts(&counts, total);
        }

        let n_features = matrix[0].len();
        let subset = sample_features(n_features, rng);

        let parent_gini = gini(&counts, total);
        let mut best: Option<(f64, usize, f64)> = None;

        for &feature in &subset {
            let mut values: Vec<f64> = indices.iter().map(|&i| matrix[i][feature]).collect();
            values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
            values.dedup();

            for pair in values.windows(2) {
                let threshold = (pair[0] + pair[1]) / 2.0;
                let (left_counts, right_counts, n_left, n_right) =
                    split_counts(matrix, targets, indices, feature, threshold);
                if n_left == 0 || n_right == 0 {
                    continue;
                }
                let weighted = (n_left as f64 * gini(&left_counts, n_left)
                    + n_right as f64 * gini(&right_counts, n_right))
                    / total as f64;
                if weighted < parent_gini - 1e-12
                    && best.map_or(true, |(score, _, _)| weighted < score)
                {
                    best = Some((weighted, feature, threshold));
                }
            }
        }

        let Some((_, feature, threshold)) = best else {
            return leaf_from_counts(&counts, total);
        };

        let (left_idx, right_idx): (Vec<usize>, Vec<usize>) = indices
            .iter()
            .partition(|&&i| matrix[i][feature] <= threshold);

        TreeNode::Split {
            feature,
            threshold,
            left: Box::new(self.grow(matrix, targets, &left_idx, depth + 1, rng)),
            right: Box::new(self.grow(matrix, targets, &right_idx, depth + 1, rng)),
        }
    }
}

fn class_counts(targets: &[u32], indices: &[usize]) -> [usize; 2] {
    let mut counts = [0usize; 2];
    for &i in indices {
        if targets[i] == POSITIVE_CLASS {
            counts[1] += 1;
        } else {
            counts[0] += 1;
        }
    }
    counts
}

fn gini(counts: &[usize; 2], total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let n = total as f64;
    let p0 = counts[0] as f64 / n;
    let p1 = counts[1] as f64 / n;
    1.0 - p0 * p0 - p1 * p1
}

fn leaf_from_counts(counts: &[usize; 2], total: usize) -> TreeNode {
    let n = total.max(1) as f64;
    TreeNode::Leaf {
        distribution: vec![counts[0] as f64 / n, counts[1] as f64 / n],
    }
}

/// 随机抽取 sqrt(n) 个候选特征
fn sample_features(n_features: usize, rng: &mut StdRng) -> Vec<usize> {
    let k = ((n_features as f64).sqrt().round() as usize).max(1).min(n_features);
    rand::seq::index::sample(rng, n_features, k).into_vec()
}

fn split_counts(
    matrix: &[Vec<f64>],
    targets: &[u32],
    indices: &[usize],
    feature: usize,
    threshold: f64,
) -> ([usize; 2], [usize; 2], usize, usize) {
    let mut left = [0usize; 2];
    let mut right = [0usize; 2];
    for &i in indices {
        let class = if targets[i] == POSITIVE_CLASS { 1 } else { 0 };
        if matrix[i][feature] <= threshold {
            left[class] += 1;
        } else {
            right[class] += 1;
        }
    }
    let n_left = left[0] + left[1];
    let n_right = right[0] + right[1];
    (left, right, n_left, n_right)
}
