use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::errors::{DArrayError, DArrayResult};
use crate::models::{Operation, WorkerRecord};

/// 应用配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub master: MasterNetConfig,
    #[serde(default)]
    pub health: HealthSettings,
    pub compute: ComputeConfig,
    /// 参与分发的活跃Worker
    pub workers: Vec<WorkerRecord>,
    /// 恢复时按FIFO顺序消耗的备用Worker
    #[serde(default)]
    pub standby_workers: Vec<WorkerRecord>,
}

/// Master网络配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MasterNetConfig {
    /// 入站监听地址（INIT/HEARTBEAT）
    pub listen_addr: String,
    /// 连接Worker的超时时间（毫秒）
    pub connect_timeout_ms: u64,
    /// 单次读写的超时时间（毫秒）
    pub io_timeout_ms: u64,
}

impl Default for MasterNetConfig {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:5000".to_string(),
            connect_timeout_ms: 3000,
            io_timeout_ms: 10000,
        }
    }
}

/// 健康监测配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthSettings {
    /// 心跳超时时间（毫秒）
    pub heartbeat_timeout_ms: i64,
    /// 扫描间隔（毫秒）
    pub sweep_interval_ms: u64,
}

impl Default for HealthSettings {
    fn default() -> Self {
        Self {
            heartbeat_timeout_ms: 5000, // 5秒心跳超时
            sweep_interval_ms: 1000,    // 1秒扫描一次
        }
    }
}

/// 计算任务配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputeConfig {
    /// 片段数量（会被输入长度截断）
    pub fragment_count: usize,
    /// Worker按元素应用的运算
    #[serde(default)]
    pub operation: Operation,
    /// 显式输入数据，与 input_len 二选一
    #[serde(default)]
    pub input: Option<Vec<f64>>,
    /// 生成 1..=n 作为输入数据
    #[serde(default)]
    pub input_len: Option<usize>,
}

impl AppConfig {
    /// 从TOML文件加载配置
    pub fn load(path: impl AsRef<Path>) -> DArrayResult<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            DArrayError::Configuration(format!("读取配置文件 {} 失败: {e}", path.display()))
        })?;

        let config: AppConfig = toml::from_str(&content)
            .map_err(|e| DArrayError::Configuration(format!("TOML解析错误: {e}")))?;

        config.validate()?;
        Ok(config)
    }

    /// 校验配置的一致性
    pub fn validate(&self) -> DArrayResult<()> {
        if self.compute.fragment_count == 0 {
            return Err(DArrayError::Configuration(
                "片段数量必须为正数".to_string(),
            ));
        }

        if self.workers.is_empty() {
            return Err(DArrayError::Configuration(
                "至少需要配置一个活跃Worker".to_string(),
            ));
        }

        match (&self.compute.input, self.compute.input_len) {
            (Some(input), _) if input.is_empty() => Err(DArrayError::Configuration(
                "输入数据不能为空".to_string(),
            )),
            (None, Some(0)) => Err(DArrayError::Configuration(
                "输入长度必须为正数".to_string(),
            )),
            (None, None) => Err(DArrayError::Configuration(
                "必须配置 input 或 input_len 之一".to_string(),
            )),
            _ => Ok(()),
        }
    }

    /// 根据配置构造输入数组
    pub fn input_data(&self) -> Vec<f64> {
        match &self.compute.input {
            Some(input) => input.clone(),
            None => {
                let n = self.compute.input_len.unwrap_or(0);
                (1..=n).map(|i| i as f64).collect()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn sample_toml() -> &'static str {
        r#"
[master]
listen_addr = "127.0.0.1:5000"
connect_timeout_ms = 2000
io_timeout_ms = 8000

[health]
heartbeat_timeout_ms = 5000
sweep_interval_ms = 1000

[compute]
fragment_count = 2
operation = "identity"
input = [1.0, 2.0, 3.0, 4.0]

[[workers]]
id = "worker1"
host = "localhost"
port = 6001

[[workers]]
id = "worker2"
host = "localhost"
port = 6003

[[standby_workers]]
id = "backup1"
host = "localhost"
port = 6101
"#
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(sample_toml().as_bytes()).unwrap();

        let config = AppConfig::load(file.path()).unwrap();
        assert_eq!(config.compute.fragment_count, 2);
        assert_eq!(config.compute.operation, Operation::Identity);
        assert_eq!(config.workers.len(), 2);
        assert_eq!(config.standby_workers.len(), 1);
        assert_eq!(config.workers[0].addr(), "localhost:6001");
        assert_eq!(config.input_data(), vec![1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_defaults_applied() {
        let toml = r#"
[compute]
fragment_count = 3
input_len = 10

[[workers]]
id = "worker1"
host = "localhost"
port = 6001
"#;
        let config: AppConfig = toml::from_str(toml).unwrap();
        config.validate().unwrap();
        assert_eq!(config.master.listen_addr, "127.0.0.1:5000");
        assert_eq!(config.health.heartbeat_timeout_ms, 5000);
        assert_eq!(config.health.sweep_interval_ms, 1000);
        assert_eq!(config.compute.operation, Operation::Identity);
        assert_eq!(config.input_data().len(), 10);
        assert_eq!(config.input_data()[0], 1.0);
    }

    #[test]
    fn test_validate_rejects_bad_config() {
        let mut config: AppConfig = toml::from_str(sample_toml()).unwrap();
        config.compute.fragment_count = 0;
        assert!(config.validate().is_err());

        let mut config: AppConfig = toml::from_str(sample_toml()).unwrap();
        config.workers.clear();
        assert!(config.validate().is_err());

        let mut config: AppConfig = toml::from_str(sample_toml()).unwrap();
        config.compute.input = None;
        config.compute.input_len = None;
        assert!(config.validate().is_err());
    }
}
