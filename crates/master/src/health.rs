//! 基于心跳的Worker健康监测与超时恢复触发。

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, error, info, warn};

use darray_core::DArrayResult;

/// 能够恢复故障Worker任务的组件接口
#[async_trait]
pub trait RecoveryCapable: Send + Sync {
    /// 为故障Worker的已分配片段触发恢复
    async fn trigger_recovery_for_worker(&self, worker_id: &str) -> DArrayResult<()>;
}

/// 健康监测配置
#[derive(Debug, Clone)]
pub struct HealthConfig {
    /// 心跳超时时间（毫秒）
    pub heartbeat_timeout_ms: i64,
    /// 扫描间隔（毫秒）
    pub sweep_interval_ms: u64,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            heartbeat_timeout_ms: 5000, // 5秒心跳超时
            sweep_interval_ms: 1000,    // 1秒扫描一次
        }
    }
}

/// Worker健康监测器。
///
/// 记录每个Worker最近一次心跳时间；周期扫描中首次超时的Worker被宣告死亡，
/// 其心跳条目被移除（一次性，之后不会再次触发），并同步调用恢复回调。
pub struct WorkerHealthMonitor {
    heartbeats: RwLock<HashMap<String, DateTime<Utc>>>,
    config: HealthConfig,
}

impl WorkerHealthMonitor {
    pub fn new(config: HealthConfig) -> Self {
        Self {
            heartbeats: RwLock::new(HashMap::new()),
            config,
        }
    }

    /// 记录Worker当前时刻的心跳
    pub async fn update_heartbeat(&self, worker_id: &str) {
        debug!("收到Worker {} 的心跳", worker_id);
        let mut heartbeats = self.heartbeats.write().await;
        heartbeats.insert(worker_id.to_string(), Utc::now());
    }

    /// 最近一次心跳时间
    pub async fn last_seen(&self, worker_id: &str) -> Option<DateTime<Utc>> {
        self.heartbeats.read().await.get(worker_id).copied()
    }

    /// 当前被跟踪的Worker数量
    pub async fn tracked_count(&self) -> usize {
        self.heartbeats.read().await.len()
    }

    fn is_expired(&self, last_seen: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        (now - last_seen).num_milliseconds() > self.config.heartbeat_timeout_ms
    }

    /// 移除并返回所有超时的Worker
    pub async fn sweep_expired(&self, now: DateTime<Utc>) -> Vec<String> {
        let mut heartbeats = self.heartbeats.write().await;

        let expired: Vec<String> = heartbeats
            .iter()
            .filter(|(_, last_seen)| self.is_expired(**last_seen, now))
            .map(|(worker_id, _)| worker_id.clone())
            .collect();

        for worker_id in &expired {
            heartbeats.remove(worker_id);
        }

        expired
    }

    /// 执行监测循环，直到收到停止信号。
    ///
    /// 每个扫描周期内超时的Worker按顺序同步触发恢复回调。
    pub async fn run(
        &self,
        recovery: Arc<dyn RecoveryCapable>,
        mut shutdown: broadcast::Receiver<()>,
    ) {
        info!(
            "启动Worker健康监测循环 (超时 {}ms, 间隔 {}ms)",
            self.config.heartbeat_timeout_ms, self.config.sweep_interval_ms
        );

        let interval = Duration::from_millis(self.config.sweep_interval_ms);

        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    info!("收到停止信号，退出健康监测循环");
                    break;
                }
                _ = tokio::time::sleep(interval) => {
                    let expired = self.sweep_expired(Utc::now()).await;

                    for worker_id in expired {
                        warn!("Worker {} 心跳超时，宣告死亡并触发恢复", worker_id);
                        if let Err(e) = recovery.trigger_recovery_for_worker(&worker_id).await {
                            error!("恢复Worker {} 的任务时出错: {}", worker_id, e);
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;
    use tokio::sync::Mutex;

    struct RecordingRecovery {
        triggered: Mutex<Vec<String>>,
    }

    impl RecordingRecovery {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                triggered: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl RecoveryCapable for RecordingRecovery {
        async fn trigger_recovery_for_worker(&self, worker_id: &str) -> DArrayResult<()> {
            self.triggered.lock().await.push(worker_id.to_string());
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_heartbeat_keeps_worker_alive() {
        let monitor = WorkerHealthMonitor::new(HealthConfig::default());
        monitor.update_heartbeat("worker1").await;

        let expired = monitor.sweep_expired(Utc::now()).await;
        assert!(expired.is_empty());
        assert_eq!(monitor.tracked_count().await, 1);
    }

    #[tokio::test]
    async fn test_sweep_declares_expired_worker_dead_once() {
        let monitor = WorkerHealthMonitor::new(HealthConfig::default());
        monitor.update_heartbeat("worker1").await;
        monitor.update_heartbeat("worker2").await;

        let later = Utc::now() + ChronoDuration::milliseconds(6000);
        let mut expired = monitor.sweep_expired(later).await;
        expired.sort();
        assert_eq!(expired, vec!["worker1".to_string(), "worker2".to_string()]);

        // 一次性：条目已被移除，同一Worker不会再次超时
        assert_eq!(monitor.tracked_count().await, 0);
        assert!(monitor.sweep_expired(later).await.is_empty());
    }

    #[tokio::test]
    async fn test_run_invokes_recovery_and_stops_on_signal() {
        let monitor = Arc::new(WorkerHealthMonitor::new(HealthConfig {
            heartbeat_timeout_ms: 50,
            sweep_interval_ms: 20,
        }));
        let recovery = RecordingRecovery::new();
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

        monitor.update_heartbeat("worker1").await;

        let handle = {
            let monitor = monitor.clone();
            let recovery = recovery.clone();
            tokio::spawn(async move {
                monitor
                    .run(recovery as Arc<dyn RecoveryCapable>, shutdown_rx)
                    .await;
            })
        };

        tokio::time::sleep(Duration::from_millis(200)).await;
        shutdown_tx.send(()).unwrap();
        handle.await.unwrap();

        let triggered = recovery.triggered.lock().await;
        assert_eq!(triggered.as_slice(), ["worker1".to_string()]);
    }
}
