use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use darray_core::AppConfig;
use darray_master::{
    DArray, HealthConfig, MasterListener, MasterOptions, MasterServer, TransportConfig,
    WorkerConnection, WorkerTransport,
};

/// 主应用程序：按配置装配各组件并驱动一次完整的计算运行
pub struct Application {
    master: Arc<MasterServer>,
    listener: MasterListener,
}

impl Application {
    /// 创建新的应用实例
    pub async fn new(config: AppConfig) -> Result<Self> {
        let data = config.input_data();
        info!(
            "输入数组长度 {}，片段数 {}，运算 {}",
            data.len(),
            config.compute.fragment_count,
            config.compute.operation
        );

        let darray = DArray::new(data, config.compute.fragment_count)
            .context("构造分布式数组失败")?;

        let master = Arc::new(MasterServer::new(
            darray,
            MasterOptions {
                operation: config.compute.operation,
                health: HealthConfig {
                    heartbeat_timeout_ms: config.health.heartbeat_timeout_ms,
                    sweep_interval_ms: config.health.sweep_interval_ms,
                },
            },
        ));

        let transport_config = TransportConfig {
            connect_timeout_ms: config.master.connect_timeout_ms,
            io_timeout_ms: config.master.io_timeout_ms,
        };

        let workers = build_connections(&config, &config.workers, &transport_config);
        let standby_workers = build_connections(&config, &config.standby_workers, &transport_config);
        info!(
            "登记 {} 个活跃Worker，{} 个备用Worker",
            workers.len(),
            standby_workers.len()
        );

        master.register_workers(workers).await;
        master.register_standby_workers(standby_workers).await;

        let listener = MasterListener::bind(&config.master.listen_addr, master.clone())
            .await
            .with_context(|| format!("绑定监听地址 {} 失败", config.master.listen_addr))?;

        Ok(Self { master, listener })
    }

    pub fn master(&self) -> Arc<MasterServer> {
        self.master.clone()
    }

    /// 启动监听与健康监测，分发片段并等待最终结果
    pub async fn run(self) -> Result<Vec<f64>> {
        let Self { master, listener } = self;

        let listener_handle = tokio::spawn(listener.run(master.subscribe_shutdown()));
        let monitor_handle = master.spawn_health_monitor();

        master.distribute().await.context("分发片段失败")?;

        let result = master
            .wait_final_result()
            .await
            .context("等待最终结果失败")?;

        // 运行结束后停止监听与监测循环
        master.shutdown();
        let _ = monitor_handle.await;
        let _ = listener_handle.await;

        Ok(result)
    }
}

fn build_connections(
    config: &AppConfig,
    records: &[darray_core::WorkerRecord],
    transport_config: &TransportConfig,
) -> Vec<Arc<dyn WorkerTransport>> {
    records
        .iter()
        .map(|record| {
            Arc::new(WorkerConnection::new(
                record.clone(),
                config.master.listen_addr.clone(),
                transport_config.clone(),
            )) as Arc<dyn WorkerTransport>
        })
        .collect()
}
