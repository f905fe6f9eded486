//! # HPS数据库模块
//!
//! 提供PostgreSQL连接池、建表/查询操作，以及预测管线
//! 协作方接口的存储实现。

pub mod connection;
pub mod models;
pub mod queries;
pub mod store;

// 重新导出主要类型
pub use connection::DatabasePool;
pub use models::*;
pub use queries::DatabaseQueries;
pub use store::PgStore;
