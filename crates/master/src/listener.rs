//! Master入站端点：每条连接一个处理任务，每条连接一条消息。

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use darray_core::protocol::{decode_line, encode_line};
use darray_core::{DArrayResult, WireMessage};

use crate::orchestrator::MasterServer;

/// 接收Worker入站连接（INIT握手、HEARTBEAT、错误通知）的监听端。
pub struct MasterListener {
    listener: TcpListener,
    master: Arc<MasterServer>,
}

impl MasterListener {
    pub async fn bind(addr: &str, master: Arc<MasterServer>) -> DArrayResult<Self> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self { listener, master })
    }

    /// 实际绑定的地址（配置端口为0时由系统分配）
    pub fn local_addr(&self) -> DArrayResult<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// 接受连接直到收到停止信号
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        match self.listener.local_addr() {
            Ok(addr) => info!("Master监听入站连接: {}", addr),
            Err(_) => info!("Master监听入站连接"),
        }

        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    info!("收到停止信号，停止接受入站连接");
                    break;
                }
                accepted = self.listener.accept() => {
                    match accepted {
                        Ok((stream, peer)) => {
                            let master = self.master.clone();
                            tokio::spawn(async move {
                                handle_connection(master, stream, peer).await;
                            });
                        }
                        Err(e) => {
                            warn!("接受入站连接失败: {}", e);
                        }
                    }
                }
            }
        }
    }
}

/// 读取一条消息、交给编排器处理、按需写回回复。
/// 解析失败回复ERROR，绝不影响其它连接的处理。
async fn handle_connection(master: Arc<MasterServer>, stream: TcpStream, peer: SocketAddr) {
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);

    let mut line = String::new();
    match reader.read_line(&mut line).await {
        Ok(0) => {
            debug!("连接 {} 未发送任何数据即关闭", peer);
            return;
        }
        Ok(_) => {}
        Err(e) => {
            warn!("读取来自 {} 的消息失败: {}", peer, e);
            return;
        }
    }

    let reply = match decode_line(&line) {
        Ok(message) => {
            debug!("收到来自 {} 的 {} 消息", peer, message.type_tag());
            master.handle_inbound(message).await
        }
        Err(e) => {
            warn!("来自 {} 的消息无法解析: {}", peer, e);
            Some(WireMessage::Error {
                message: e.to_string(),
            })
        }
    };

    if let Some(reply) = reply {
        match encode_line(&reply) {
            Ok(mut encoded) => {
                encoded.push('\n');
                if let Err(e) = write_half.write_all(encoded.as_bytes()).await {
                    warn!("向 {} 写回 {} 回复失败: {}", peer, reply.type_tag(), e);
                }
            }
            Err(e) => {
                error!("编码 {} 回复失败: {}", reply.type_tag(), e);
            }
        }
    }
}
