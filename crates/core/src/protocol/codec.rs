//! 线路协议编解码。
//!
//! 一行一条消息：编码输出紧凑单行JSON对象，解码委托给标准JSON解析器。
//! 任何不是 `{...}` 包裹的输入、缺少键值分隔符或字段不完整的消息均以
//! [`DArrayError::Parse`] 拒绝，且只影响当前这一条消息的处理。

use crate::errors::{DArrayError, DArrayResult};
use crate::protocol::messages::WireMessage;

/// 将消息编码为单行文本（不含换行符）
pub fn encode_line(message: &WireMessage) -> DArrayResult<String> {
    serde_json::to_string(message).map_err(|e| DArrayError::Serialization(e.to_string()))
}

/// 解析一行文本为消息
pub fn decode_line(line: &str) -> DArrayResult<WireMessage> {
    let trimmed = line.trim();

    if !trimmed.starts_with('{') || !trimmed.ends_with('}') {
        return Err(DArrayError::Parse(format!(
            "消息必须是JSON对象: {trimmed}"
        )));
    }

    serde_json::from_str(trimmed).map_err(|e| DArrayError::Parse(e.to_string()))
}
