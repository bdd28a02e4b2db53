use serde::{Deserialize, Serialize};

/// Worker能力描述，随INIT消息上报
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Capabilities {
    pub cores: u32,
    pub language: String,
}

/// Master与Worker之间的全部消息类型。
///
/// 每条消息编码为单行文本，`type` 字段标识消息类型，换行符是唯一的帧边界。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum WireMessage {
    /// Worker上线握手
    #[serde(rename = "INIT")]
    Init {
        worker_id: String,
        capabilities: Capabilities,
    },

    /// Master下发的计算任务
    #[serde(rename = "TASK")]
    Task {
        task_id: String,
        data: Vec<f64>,
        operation: String,
        send_result_to: String,
    },

    /// Worker返回的片段计算结果
    #[serde(rename = "RESULT")]
    Result {
        task_id: String,
        worker_id: String,
        result: Vec<f64>,
    },

    /// Worker周期性存活信号
    #[serde(rename = "HEARTBEAT")]
    Heartbeat { worker_id: String },

    /// Worker间的片段副本同步
    #[serde(rename = "REPLICA")]
    Replica {
        task_id: String,
        fragment: Vec<f64>,
        replica_id: String,
    },

    /// 请求副本持有者接管故障Worker的任务
    #[serde(rename = "RECOVER")]
    Recover {
        original_worker_id: String,
        task_id: String,
    },

    /// 错误通知
    #[serde(rename = "ERROR")]
    Error { message: String },

    /// 握手确认
    #[serde(rename = "DONE")]
    Done,
}

impl WireMessage {
    /// 消息类型标签，用于日志输出
    pub fn type_tag(&self) -> &'static str {
        match self {
            WireMessage::Init { .. } => "INIT",
            WireMessage::Task { .. } => "TASK",
            WireMessage::Result { .. } => "RESULT",
            WireMessage::Heartbeat { .. } => "HEARTBEAT",
            WireMessage::Replica { .. } => "REPLICA",
            WireMessage::Recover { .. } => "RECOVER",
            WireMessage::Error { .. } => "ERROR",
            WireMessage::Done => "DONE",
        }
    }
}
