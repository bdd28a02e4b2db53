//! # darray-core
//!
//! 分布式数组计算系统的共享基础模块
//!
//! 本模块提供：
//! - 统一错误类型定义
//! - 应用配置加载
//! - 共享数据模型（片段、Worker、运算）
//! - 线路协议（消息词汇表与编解码）

pub mod config;
pub mod errors;
pub mod models;
pub mod protocol;

pub use config::AppConfig;
pub use errors::{DArrayError, DArrayResult};
pub use models::{Fragment, Operation, WorkerRecord};
pub use protocol::{Capabilities, WireMessage};
