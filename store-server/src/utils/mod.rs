//! 工具模块
//!
//! - **error**: 统一错误类型和 API 响应结构
//! - **logger**: tracing 日志初始化
//! - **time**: 业务时区时间工具

pub mod error;
pub mod logger;
pub mod time;

pub use error::{AppError, AppResponse, AppResult};
pub use logger::{init_logger, init_logger_with_file};
