//! 到Worker的同步往返传输：每次交换使用一条新连接。

use std::io;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::debug;

use darray_core::protocol::{decode_line, encode_line};
use darray_core::{DArrayError, DArrayResult, Fragment, WireMessage, WorkerRecord};

/// 传输配置
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// 连接超时时间（毫秒）
    pub connect_timeout_ms: u64,
    /// 单次读写超时时间（毫秒）
    pub io_timeout_ms: u64,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: 3000, // 3秒连接超时
            io_timeout_ms: 10000,     // 10秒读写超时
        }
    }
}

/// Worker任务投递接口。
///
/// 同步往返模式：发送一条TASK并阻塞等待唯一一条回复。
/// 任何连接/读写失败以通信错误返回，调用方必须按任务隔离处理，
/// 单个Worker的失败不得中断其它任务。
#[async_trait]
pub trait WorkerTransport: Send + Sync {
    fn worker_id(&self) -> &str;

    /// 发送任务并返回解码后的回复消息
    async fn send_task(
        &self,
        fragment: &Fragment,
        task_id: &str,
        operation: &str,
    ) -> DArrayResult<WireMessage>;
}

/// 到远程Worker的TCP连接描述。不做连接复用，每次发送新建连接。
pub struct WorkerConnection {
    record: WorkerRecord,
    /// TASK消息中携带的回传地址（Master监听地址）
    callback_addr: String,
    config: TransportConfig,
}

impl WorkerConnection {
    pub fn new(
        record: WorkerRecord,
        callback_addr: impl Into<String>,
        config: TransportConfig,
    ) -> Self {
        Self {
            record,
            callback_addr: callback_addr.into(),
            config,
        }
    }

    fn comm_error(&self, source: io::Error) -> DArrayError {
        DArrayError::Communication {
            worker_id: self.record.id.clone(),
            source,
        }
    }

    fn timeout_error(&self, what: &str) -> DArrayError {
        self.comm_error(io::Error::new(io::ErrorKind::TimedOut, what.to_string()))
    }
}

#[async_trait]
impl WorkerTransport for WorkerConnection {
    fn worker_id(&self) -> &str {
        &self.record.id
    }

    async fn send_task(
        &self,
        fragment: &Fragment,
        task_id: &str,
        operation: &str,
    ) -> DArrayResult<WireMessage> {
        let message = WireMessage::Task {
            task_id: task_id.to_string(),
            data: fragment.values.clone(),
            operation: operation.to_string(),
            send_result_to: self.callback_addr.clone(),
        };
        let mut line = encode_line(&message)?;
        line.push('\n');

        let addr = self.record.addr();
        debug!("发送任务 {} 到Worker {} ({})", task_id, self.record.id, addr);

        let connect_timeout = Duration::from_millis(self.config.connect_timeout_ms);
        let io_timeout = Duration::from_millis(self.config.io_timeout_ms);

        let stream = timeout(connect_timeout, TcpStream::connect(&addr))
            .await
            .map_err(|_| self.timeout_error("连接超时"))?
            .map_err(|e| self.comm_error(e))?;

        let (read_half, mut write_half) = stream.into_split();

        timeout(io_timeout, write_half.write_all(line.as_bytes()))
            .await
            .map_err(|_| self.timeout_error("写入超时"))?
            .map_err(|e| self.comm_error(e))?;

        let mut reader = BufReader::new(read_half);
        let mut reply = String::new();
        let read = timeout(io_timeout, reader.read_line(&mut reply))
            .await
            .map_err(|_| self.timeout_error("等待回复超时"))?
            .map_err(|e| self.comm_error(e))?;

        if read == 0 {
            return Err(self.comm_error(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "Worker在回复前关闭了连接",
            )));
        }

        debug!("收到Worker {} 对任务 {} 的回复", self.record.id, task_id);
        decode_line(&reply)
    }
}
