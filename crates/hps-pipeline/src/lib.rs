//! # HPS Pipeline
//!
//! 预测事务管线：协作方接口、环境采集、目录缓存与提交协调器。

pub mod ambient;
pub mod catalog;
pub mod coordinator;
pub mod traits;

pub use ambient::{current_season, SimulatedWeather, WeatherProvider};
pub use catalog::CachedCatalog;
pub use coordinator::{PredictionCoordinator, SubmitOutcome};
pub use traits::{CatalogService, EncounterStore, UserDirectory};
