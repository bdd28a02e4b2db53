//! # darray-master
//!
//! Master端编排引擎：数组划分、任务分发、结果聚合、Worker健康监测
//! 与故障恢复。Worker进程本身是外部协作方，不在本crate范围内。

pub mod fragmenter;
pub mod health;
pub mod listener;
pub mod orchestrator;
pub mod result_manager;
pub mod test_utils;
pub mod transport;

pub use fragmenter::DArray;
pub use health::{HealthConfig, RecoveryCapable, WorkerHealthMonitor};
pub use listener::MasterListener;
pub use orchestrator::{Assignment, MasterOptions, MasterServer, MasterState};
pub use result_manager::ResultManager;
pub use transport::{TransportConfig, WorkerConnection, WorkerTransport};
