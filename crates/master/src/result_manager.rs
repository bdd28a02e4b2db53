//! 按任务存储片段结果并在全部到齐后按偏移顺序装配。

use std::collections::HashMap;

use tokio::sync::RwLock;
use tracing::{debug, warn};

use darray_core::Fragment;

/// 结果聚合器。
///
/// 以 `taskId:fragmentId` 为复合键存储结果，可被多个连接处理任务并发调用。
/// 完成阈值在构造时固定；之后输入数组的增长不会重新推导该阈值。
pub struct ResultManager {
    results: RwLock<HashMap<String, Fragment>>,
    expected_count: usize,
}

impl ResultManager {
    pub fn new(expected_count: usize) -> Self {
        Self {
            results: RwLock::new(HashMap::new()),
            expected_count,
        }
    }

    /// 存储一个片段结果。同键重复插入覆盖旧值，计数不增长。
    pub async fn add_result(&self, task_id: &str, fragment: Fragment) {
        let key = format!("{task_id}:{}", fragment.id);
        debug!("存储任务 {} 的结果片段 {} (偏移 {})", task_id, fragment.id, fragment.start_offset);

        let mut results = self.results.write().await;
        results.insert(key, fragment);
    }

    /// 已存储的不同结果数量
    pub async fn result_count(&self) -> usize {
        self.results.read().await.len()
    }

    /// 不同键的数量达到预期后即视为完成
    pub async fn is_complete(&self) -> bool {
        self.results.read().await.len() >= self.expected_count
    }

    /// 将已有结果按起始偏移升序装配为单个数组。
    ///
    /// 输出长度取片段的最大结束偏移（完整状态下等于原始数组长度）；
    /// 未覆盖的位置保持0值，重叠位置由排序靠后的片段覆盖。
    pub async fn assemble(&self) -> Vec<f64> {
        let mut fragments: Vec<Fragment> = {
            let results = self.results.read().await;
            results.values().cloned().collect()
        };
        fragments.sort_by_key(|f| f.start_offset);

        let total = fragments.iter().map(|f| f.end_offset()).max().unwrap_or(0);
        let mut merged = vec![0.0; total];

        let mut cursor = 0;
        for fragment in &fragments {
            if fragment.start_offset < cursor {
                warn!(
                    "片段 {} 在偏移 {} 处与已装配数据重叠，后写入者生效",
                    fragment.id, fragment.start_offset
                );
            } else if fragment.start_offset > cursor {
                debug!("偏移 {}..{} 未被任何片段覆盖，保持0值", cursor, fragment.start_offset);
            }

            merged[fragment.start_offset..fragment.end_offset()]
                .copy_from_slice(&fragment.values);
            cursor = cursor.max(fragment.end_offset());
        }

        merged
    }
}
