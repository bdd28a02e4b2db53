//! Master编排引擎：分发片段、收集结果、在Worker故障时重新指派。
//!
//! 锁纪律：分配表、备用队列、状态与心跳表各自独立加锁，所有锁只做
//! 叶级短临界区持有，绝不跨网络I/O等待持锁。

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{broadcast, Mutex, RwLock};
use tracing::{debug, error, info, warn};

use darray_core::{DArrayError, DArrayResult, Fragment, Operation, WireMessage};

use crate::fragmenter::DArray;
use crate::health::{HealthConfig, RecoveryCapable, WorkerHealthMonitor};
use crate::result_manager::ResultManager;
use crate::transport::WorkerTransport;

/// Master配置选项
#[derive(Debug, Clone, Default)]
pub struct MasterOptions {
    /// Worker按元素应用的运算
    pub operation: Operation,
    /// 健康监测配置
    pub health: HealthConfig,
}

/// 运行状态机：INIT → DISTRIBUTING → COLLECTING → COMPLETE
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MasterState {
    Init,
    Distributing,
    Collecting,
    Complete,
}

/// 某个Worker当前持有的任务
#[derive(Debug, Clone)]
pub struct Assignment {
    pub task_id: String,
    pub fragment: Fragment,
}

/// Master编排器。
///
/// 组合划分器、聚合器与健康监测器：为每个活跃Worker分发一个片段，
/// 以同步往返收集结果，心跳超时后把故障Worker的片段以相同任务ID
/// 重发给FIFO顺序的备用Worker。
pub struct MasterServer {
    darray: Mutex<DArray>,
    operation: Operation,
    workers: RwLock<Vec<Arc<dyn WorkerTransport>>>,
    standby_workers: Mutex<VecDeque<Arc<dyn WorkerTransport>>>,
    /// Worker ID → 当前分配；恢复时在新Worker名下登记，旧键不清理只被取代
    assignments: RwLock<HashMap<String, Assignment>>,
    result_manager: ResultManager,
    health_monitor: Arc<WorkerHealthMonitor>,
    state: RwLock<MasterState>,
    shutdown_tx: broadcast::Sender<()>,
}

impl MasterServer {
    /// 创建编排器。完成阈值取自当前划分的片段数，之后不再重新推导。
    pub fn new(mut darray: DArray, options: MasterOptions) -> Self {
        let expected = darray.fragments().len();
        let (shutdown_tx, _) = broadcast::channel(16);

        Self {
            darray: Mutex::new(darray),
            operation: options.operation,
            workers: RwLock::new(Vec::new()),
            standby_workers: Mutex::new(VecDeque::new()),
            assignments: RwLock::new(HashMap::new()),
            result_manager: ResultManager::new(expected),
            health_monitor: Arc::new(WorkerHealthMonitor::new(options.health)),
            state: RwLock::new(MasterState::Init),
            shutdown_tx,
        }
    }

    /// 登记参与分发的活跃Worker
    pub async fn register_workers(&self, workers: Vec<Arc<dyn WorkerTransport>>) {
        self.workers.write().await.extend(workers);
    }

    /// 登记备用Worker，恢复时按FIFO顺序消耗
    pub async fn register_standby_workers(&self, workers: Vec<Arc<dyn WorkerTransport>>) {
        self.standby_workers.lock().await.extend(workers);
    }

    pub fn health_monitor(&self) -> Arc<WorkerHealthMonitor> {
        self.health_monitor.clone()
    }

    pub fn result_manager(&self) -> &ResultManager {
        &self.result_manager
    }

    pub fn subscribe_shutdown(&self) -> broadcast::Receiver<()> {
        self.shutdown_tx.subscribe()
    }

    /// 触发关闭：停止监测循环并让监听端停止接受连接
    pub fn shutdown(&self) {
        info!("触发Master关闭");
        let _ = self.shutdown_tx.send(());
    }

    pub async fn state(&self) -> MasterState {
        *self.state.read().await
    }

    async fn set_state(&self, next: MasterState) {
        let mut state = self.state.write().await;
        if *state != next {
            info!("Master状态切换: {:?} -> {:?}", *state, next);
            *state = next;
        }
    }

    /// 在后台任务中运行健康监测循环，自身作为恢复回调
    pub fn spawn_health_monitor(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let monitor = self.health_monitor.clone();
        let recovery: Arc<dyn RecoveryCapable> = self.clone();
        let shutdown = self.subscribe_shutdown();

        tokio::spawn(async move {
            monitor.run(recovery, shutdown).await;
        })
    }

    /// 分发片段并收集同步回复。
    ///
    /// 每个活跃Worker恰好收到一个片段；Worker不足时多出的片段只记录
    /// 日志，不会被发送，也永远无法完成。同时在途的往返数量即
    /// `min(片段数, Worker数)`。
    pub async fn distribute(&self) -> DArrayResult<()> {
        self.set_state(MasterState::Distributing).await;

        let fragments: Vec<Fragment> = {
            let mut darray = self.darray.lock().await;
            darray.fragments().to_vec()
        };
        let workers: Vec<Arc<dyn WorkerTransport>> = self.workers.read().await.clone();

        let task_count = fragments.len().min(workers.len());
        for fragment in &fragments[task_count..] {
            warn!("没有足够的Worker处理片段 {}，该片段不会被分发", fragment.id);
        }

        info!(
            "开始分发 {} 个片段（划分共 {} 个），运算: {}",
            task_count,
            fragments.len(),
            self.operation
        );

        // 发送前先登记分配关系，故障恢复依赖它
        {
            let mut assignments = self.assignments.write().await;
            for (i, fragment) in fragments.iter().take(task_count).enumerate() {
                assignments.insert(
                    workers[i].worker_id().to_string(),
                    Assignment {
                        task_id: format!("T{i}"),
                        fragment: fragment.clone(),
                    },
                );
            }
        }

        self.set_state(MasterState::Collecting).await;

        let sends: Vec<_> = (0..task_count)
            .map(|i| self.dispatch_to(workers[i].clone(), fragments[i].clone(), format!("T{i}")))
            .collect();
        futures::future::join_all(sends).await;

        if self.result_manager.is_complete().await {
            self.set_state(MasterState::Complete).await;
        }

        Ok(())
    }

    /// 单个任务的发送与收集；通信失败只记录日志，不影响其它任务
    async fn dispatch_to(
        &self,
        worker: Arc<dyn WorkerTransport>,
        fragment: Fragment,
        task_id: String,
    ) {
        if let Err(e) = self.send_and_collect(worker.as_ref(), &fragment, &task_id).await {
            warn!(
                "任务 {} 在Worker {} 上执行失败: {}",
                task_id,
                worker.worker_id(),
                e
            );
        }
    }

    async fn send_and_collect(
        &self,
        worker: &dyn WorkerTransport,
        fragment: &Fragment,
        task_id: &str,
    ) -> DArrayResult<()> {
        let reply = worker
            .send_task(fragment, task_id, self.operation.expr())
            .await?;

        match reply {
            WireMessage::Result {
                task_id: reply_task_id,
                worker_id,
                result,
            } => {
                if reply_task_id != task_id {
                    warn!(
                        "Worker {} 返回的任务ID {} 与下发的 {} 不符",
                        worker_id, reply_task_id, task_id
                    );
                }
                if result.len() != fragment.len() {
                    warn!(
                        "任务 {} 的结果长度 {} 与片段长度 {} 不符",
                        reply_task_id,
                        result.len(),
                        fragment.len()
                    );
                }
                self.result_manager
                    .add_result(
                        &reply_task_id,
                        Fragment::new(worker_id, fragment.start_offset, result),
                    )
                    .await;
                Ok(())
            }
            WireMessage::Error { message } => {
                warn!(
                    "Worker {} 对任务 {} 返回错误: {}",
                    worker.worker_id(),
                    task_id,
                    message
                );
                Ok(())
            }
            other => {
                warn!(
                    "Worker {} 对任务 {} 返回了意外的 {} 消息",
                    worker.worker_id(),
                    task_id,
                    other.type_tag()
                );
                Ok(())
            }
        }
    }

    /// 处理入站连接上的一条消息，返回需要写回的回复
    pub async fn handle_inbound(&self, message: WireMessage) -> Option<WireMessage> {
        match message {
            WireMessage::Init {
                worker_id,
                capabilities,
            } => {
                info!(
                    "Worker {} 上线 ({} cores, {})",
                    worker_id, capabilities.cores, capabilities.language
                );
                Some(WireMessage::Done)
            }
            WireMessage::Heartbeat { worker_id } => {
                self.health_monitor.update_heartbeat(&worker_id).await;
                None
            }
            WireMessage::Error { message } => {
                warn!("收到Worker错误通知: {}", message);
                None
            }
            WireMessage::Result {
                task_id, worker_id, ..
            } => {
                // 任务投递是同步往返，推送的RESULT不参与收集
                warn!(
                    "忽略Worker {} 推送的任务 {} 结果",
                    worker_id, task_id
                );
                None
            }
            other => {
                warn!("Master端点收到意外的 {} 消息", other.type_tag());
                Some(WireMessage::Error {
                    message: format!("unexpected message type: {}", other.type_tag()),
                })
            }
        }
    }

    /// 非阻塞查询最终结果；未完成时返回 [`DArrayError::ResultNotReady`]
    pub async fn try_final_result(&self) -> DArrayResult<Vec<f64>> {
        if !self.result_manager.is_complete().await {
            return Err(DArrayError::ResultNotReady);
        }
        self.set_state(MasterState::Complete).await;
        Ok(self.result_manager.assemble().await)
    }

    /// 阻塞等待最终结果（调用方显式选择阻塞语义），关闭时提前返回
    pub async fn wait_final_result(&self) -> DArrayResult<Vec<f64>> {
        let mut shutdown = self.subscribe_shutdown();

        loop {
            match self.try_final_result().await {
                Err(DArrayError::ResultNotReady) => {}
                other => return other,
            }

            tokio::select! {
                _ = shutdown.recv() => {
                    return Err(DArrayError::Internal("等待结果时Master已关闭".to_string()));
                }
                _ = tokio::time::sleep(Duration::from_millis(100)) => {}
            }
        }
    }

    /// 当前分配关系快照
    pub async fn assignment_for(&self, worker_id: &str) -> Option<Assignment> {
        self.assignments.read().await.get(worker_id).cloned()
    }

    /// 剩余备用Worker数量
    pub async fn standby_count(&self) -> usize {
        self.standby_workers.lock().await.len()
    }
}

#[async_trait]
impl RecoveryCapable for MasterServer {
    /// 查找故障Worker的分配并重发给备用Worker。
    ///
    /// 没有分配记录时为无操作；没有备用Worker时该片段槽位永远无法
    /// 完成，记录为致命错误。重发保持相同的任务ID。
    async fn trigger_recovery_for_worker(&self, worker_id: &str) -> DArrayResult<()> {
        let assignment = self.assignments.read().await.get(worker_id).cloned();

        let Some(assignment) = assignment else {
            warn!("未找到Worker {} 的任务分配，跳过恢复", worker_id);
            return Ok(());
        };

        let standby = self.standby_workers.lock().await.pop_front();

        let Some(standby) = standby else {
            error!(
                "没有可用的备用Worker，任务 {} 的片段 {} 永远无法完成",
                assignment.task_id, assignment.fragment.id
            );
            return Err(DArrayError::RecoveryExhausted {
                task_id: assignment.task_id,
            });
        };

        info!(
            "将任务 {} 从故障Worker {} 重发给备用Worker {}",
            assignment.task_id,
            worker_id,
            standby.worker_id()
        );

        // 新分配登记在备用Worker名下；故障Worker的旧键保留，
        // 其心跳条目已被监测器移除，不会再次触发
        {
            let mut assignments = self.assignments.write().await;
            assignments.insert(standby.worker_id().to_string(), assignment.clone());
        }

        self.send_and_collect(standby.as_ref(), &assignment.fragment, &assignment.task_id)
            .await?;

        if self.result_manager.is_complete().await {
            self.set_state(MasterState::Complete).await;
        } else {
            debug!("恢复后仍有未完成的片段槽位");
        }

        Ok(())
    }
}
