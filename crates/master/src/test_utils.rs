//! 测试辅助工具：可脚本化的Worker传输替身。

use std::io;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use darray_core::{DArrayError, DArrayResult, Fragment, WireMessage};

use crate::transport::WorkerTransport;

/// 记录每次发送并返回恒等结果的Mock传输
pub struct MockWorkerTransport {
    worker_id: String,
    fail: bool,
    sent: Mutex<Vec<SentTask>>,
}

/// 一次send_task调用的记录
#[derive(Debug, Clone, PartialEq)]
pub struct SentTask {
    pub task_id: String,
    pub fragment: Fragment,
    pub operation: String,
}

impl MockWorkerTransport {
    pub fn new(worker_id: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            worker_id: worker_id.into(),
            fail: false,
            sent: Mutex::new(Vec::new()),
        })
    }

    /// 每次发送都以通信错误失败的替身
    pub fn failing(worker_id: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            worker_id: worker_id.into(),
            fail: true,
            sent: Mutex::new(Vec::new()),
        })
    }

    pub async fn sent_tasks(&self) -> Vec<SentTask> {
        self.sent.lock().await.clone()
    }
}

#[async_trait]
impl WorkerTransport for MockWorkerTransport {
    fn worker_id(&self) -> &str {
        &self.worker_id
    }

    async fn send_task(
        &self,
        fragment: &Fragment,
        task_id: &str,
        operation: &str,
    ) -> DArrayResult<WireMessage> {
        self.sent.lock().await.push(SentTask {
            task_id: task_id.to_string(),
            fragment: fragment.clone(),
            operation: operation.to_string(),
        });

        if self.fail {
            return Err(DArrayError::Communication {
                worker_id: self.worker_id.clone(),
                source: io::Error::new(io::ErrorKind::ConnectionRefused, "mock拒绝连接"),
            });
        }

        Ok(WireMessage::Result {
            task_id: task_id.to_string(),
            worker_id: self.worker_id.clone(),
            result: fragment.values.clone(),
        })
    }
}
