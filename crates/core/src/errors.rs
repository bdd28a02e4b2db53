use thiserror::Error;

/// 分布式数组系统错误类型定义
#[derive(Debug, Error)]
pub enum DArrayError {
    #[error("参数校验错误: {0}")]
    Validation(String),

    #[error("协议解析错误: {0}")]
    Parse(String),

    #[error("与Worker {worker_id} 通信失败: {source}")]
    Communication {
        worker_id: String,
        #[source]
        source: std::io::Error,
    },

    #[error("恢复失败: 没有可用的备用Worker接管任务 {task_id}")]
    RecoveryExhausted { task_id: String },

    #[error("计算结果尚未就绪")]
    ResultNotReady,

    #[error("配置错误: {0}")]
    Configuration(String),

    #[error("序列化错误: {0}")]
    Serialization(String),

    #[error("IO错误: {0}")]
    Io(#[from] std::io::Error),

    #[error("内部错误: {0}")]
    Internal(String),
}

/// 统一的Result类型
pub type DArrayResult<T> = std::result::Result<T, DArrayError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DArrayError::Validation("数据数组不能为空".to_string());
        assert!(err.to_string().contains("参数校验错误"));

        let err = DArrayError::RecoveryExhausted {
            task_id: "T0".to_string(),
        };
        assert!(err.to_string().contains("T0"));
    }

    #[test]
    fn test_communication_error_wraps_io_source() {
        use std::error::Error;

        let io_err = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        let err = DArrayError::Communication {
            worker_id: "worker1".to_string(),
            source: io_err,
        };

        assert!(err.to_string().contains("worker1"));
        assert!(err.source().is_some());
    }
}
