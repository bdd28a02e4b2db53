use serde::{Deserialize, Serialize};

/// 数据片段：原始数组的一段连续子区间及其在原序列中的起始偏移
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fragment {
    /// 片段的唯一标识（初始划分为 F0..F(N-1)，结果片段使用Worker ID）
    pub id: String,
    /// 在原始数组中的起始偏移
    pub start_offset: usize,
    /// 片段数据
    pub values: Vec<f64>,
}

impl Fragment {
    pub fn new(id: impl Into<String>, start_offset: usize, values: Vec<f64>) -> Self {
        Self {
            id: id.into(),
            start_offset,
            values,
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// 片段结束偏移（不含）
    pub fn end_offset(&self) -> usize {
        self.start_offset + self.values.len()
    }
}
