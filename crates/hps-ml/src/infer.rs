//! 推理引擎
//!
//! 持有只读模型工件，对编码后的特征向量执行多标签概率推理。

use crate::artifact::ModelArtifact;
use crate::features::FeatureVector;
use chrono::Utc;
use hps_core::{PredictionResult, Result};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::Arc;

/// 默认阳性判定阈值
pub const DEFAULT_THRESHOLD: f64 = 0.5;

/// 推理引擎
///
/// 工件在进程启动时加载一次，经 `Arc` 跨请求只读共享；
/// 推理为纯计算，无需加锁。
#[derive(Debug, Clone)]
pub struct InferenceEngine {
    artifact: Arc<ModelArtifact>,
}

impl InferenceEngine {
    /// 构造时校验工件一致性
    pub fn new(artifact: Arc<ModelArtifact>) -> Result<Self> {
        artifact.validate()?;
        Ok(Self { artifact })
    }

    pub fn artifact(&self) -> &ModelArtifact {
        &self.artifact
    }

    /// 对单个特征向量执行多标签推理
    ///
    /// 输入向量先按工件声明的列顺序重排（缺失补0，多余丢弃），
    /// 再标准化，逐标签提取阳性概率。按请求顺序直接喂入会
    /// 无声地产生错误预测，重排是强制步骤。
    pub fn infer(&self, vector: &FeatureVector, threshold: f64) -> Result<PredictionResult> {
        let artifact = &self.artifact;

        let ordered = vector.reindex(&artifact.feature_names);
        let scaled = artifact.scaler.transform(&ordered.as_row())?;

        let mut all_probabilities = BTreeMap::new();
        let mut ranked: Vec<(usize, String, f64)> = Vec::with_capacity(artifact.label_codes.len());

        for (idx, (code, classifier)) in artifact
            .label_codes
            .iter()
            .zip(artifact.ensemble.iter())
            .enumerate()
        {
            let probability = classifier.positive_probability(&scaled);
            all_probabilities.insert(code.clone(), probability);
            ranked.push((idx, code.clone(), probability));
        }

        let predicted_diseases: BTreeMap<String, f64> = all_probabilities
            .iter()
            .filter(|(_, &p)| p >= threshold)
            .map(|(code, &p)| (code.clone(), p))
            .collect();

        // 稳定排序：概率降序，同分保留工件标签顺序，保证确定性
        ranked.sort_by(|a, b| b.2.partial_cmp(&a.2).unwrap_or(Ordering::Equal));
        let sorted_predictions: Vec<(String, f64)> = ranked
            .into_iter()
            .take(3)
            .map(|(_, code, p)| (code, p))
            .collect();

        tracing::debug!(
            "Inference produced {} labels, {} above threshold {}",
            all_probabilities.len(),
            predicted_diseases.len(),
            threshold
        );

        Ok(PredictionResult {
            all_probabilities,
            predicted_diseases,
            sorted_predictions,
            prediction_time: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::{
        DecisionTree, LabelClassifier, ModelArtifact, StandardScaler, TreeNode,
    };

    fn leaf_clf(p0: f64, p1: f64) -> LabelClassifier {
        LabelClassifier {
            classes: vec![0, 1],
            trees: vec![DecisionTree {
                root: TreeNode::Leaf {
                    distribution: vec![p0, p1],
                },
            }],
        }
    }

    fn artifact(labels: &[&str], ensemble: Vec<LabelClassifier>) -> Arc<ModelArtifact> {
        let feature_names: Vec<String> =
            ["age", "gender", "fever"].iter().map(|s| s.to_string()).collect();
        Arc::new(ModelArtifact {
            ensemble,
            scaler: StandardScaler {
                mean: vec![0.0; 3],
                std: vec![1.0; 3],
            },
            feature_names,
            label_codes: labels.iter().map(|s| s.to_string()).collect(),
            trained_at: Utc::now(),
            model_type: "random_forest_multilabel".into(),
        })
    }

    #[test]
    fn test_all_probabilities_covers_every_label() {
        let engine = InferenceEngine::new(artifact(
            &["flu", "cold", "allergy"],
            vec![
                leaf_clf(0.3, 0.7),
                leaf_clf(0.6, 0.4),
                LabelClassifier::single_class(0),
            ],
        ))
        .unwrap();

        // 全零向量
        let result = engine.infer(&FeatureVector::new(), DEFAULT_THRESHOLD).unwrap();

        assert_eq!(result.all_probabilities.len(), 3);
        assert_eq!(result.all_probabilities["flu"], 0.7);
        assert_eq!(result.all_probabilities["cold"], 0.4);
        // 无阳性样本的标签概率恰为0.0，不报错
        assert_eq!(result.all_probabilities["allergy"], 0.0);
        assert_eq!(result.predicted_diseases.len(), 1);
        assert!(result.predicted_diseases.contains_key("flu"));
    }

    #[test]
    fn test_sorted_predictions_order_and_ties() {
        let engine = InferenceEngine::new(artifact(
            &["a", "b", "c", "d"],
            vec![
                leaf_clf(0.5, 0.5),
                leaf_clf(0.2, 0.8),
                leaf_clf(0.5, 0.5),
                leaf_clf(0.9, 0.1),
            ],
        ))
        .unwrap();

        let result = engine.infer(&FeatureVector::new(), DEFAULT_THRESHOLD).unwrap();

        assert_eq!(result.sorted_predictions.len(), 3);
        assert_eq!(result.sorted_predictions[0].0, "b");
        // 同分0.5按工件标签顺序: a在c前
        assert_eq!(result.sorted_predictions[1].0, "a");
        assert_eq!(result.sorted_predictions[2].0, "c");
        for pair in result.sorted_predictions.windows(2) {
            assert!(pair[0].1 >= pair[1].1);
        }
    }

    #[test]
    fn test_empty_artifact_rejected() {
        let err = InferenceEngine::new(artifact(&[], vec![])).unwrap_err();
        assert!(matches!(err, hps_core::HpsError::EmptyArtifact));
    }

    #[test]
    fn test_request_order_does_not_matter() {
        let engine = InferenceEngine::new(artifact(
            &["flu"],
            vec![leaf_clf(0.1, 0.9)],
        ))
        .unwrap();

        let mut forward = FeatureVector::new();
        forward.insert("age", 30.0);
        forward.insert("fever", 1.0);

        let mut reversed = FeatureVector::new();
        reversed.insert("fever", 1.0);
        reversed.insert("age", 30.0);

        let a = engine.infer(&forward, DEFAULT_THRESHOLD).unwrap();
        let b = engine.infer(&reversed, DEFAULT_THRESHOLD).unwrap();
        assert_eq!(a.all_probabilities, b.all_probabilities);
    }
}
