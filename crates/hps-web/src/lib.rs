//! # HPS Web
//!
//! 预测服务的HTTP表层。协调器是核心唯一入口，
//! 这里只做请求解码与响应映射。

pub mod handlers;
pub mod server;

pub use handlers::AppState;
pub use server::WebServer;
