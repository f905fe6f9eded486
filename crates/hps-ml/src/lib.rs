//! # HPS ML
//!
//! 特征编码、模型工件与多标签推理/训练。

pub mod artifact;
pub mod features;
pub mod infer;
pub mod train;

pub use artifact::{ArtifactCodec, JsonArtifactCodec, LabelClassifier, ModelArtifact, StandardScaler};
pub use features::{FeatureEncoder, FeatureVector};
pub use infer::{InferenceEngine, DEFAULT_THRESHOLD};
pub use train::{Trainer, TrainerConfig, TrainingExample};
