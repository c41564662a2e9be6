//! HTTP APIモジュール

pub mod commands;
pub mod handlers;
pub mod models;
pub mod params;
pub mod response;
pub mod routes;

// 再エクスポート
pub use models::{ApiResponse, Status};
pub use response::{respond, Operation};
pub use routes::configure;
