//! # HPS Core
//!
//! 疾病预测系统的核心模块，提供基础数据结构、错误定义和配置管理。

pub mod config;
pub mod error;
pub mod models;

pub use config::AppConfig;
pub use error::{HpsError, Result};
pub use models::*;
