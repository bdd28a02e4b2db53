//! 固定片段数的数组划分，数据变更后强制重新划分。

use tracing::warn;

use darray_core::{DArrayError, DArrayResult, Fragment};

/// 分布式数组：持有原始数据快照并按固定片段数划分。
///
/// 追加数据只替换底层数组并将划分标记为过期；片段在下一次读取时
/// 以构造时请求的片段数（按新长度重新截断）重新计算。
pub struct DArray {
    data: Vec<f64>,
    /// 构造时请求的片段数，划分时按当前长度截断
    requested_count: usize,
    fragments: Vec<Fragment>,
    needs_update: bool,
}

impl DArray {
    /// 创建新的分布式数组并立即划分。
    ///
    /// 数据为空或片段数非正时返回 [`DArrayError::Validation`]。
    pub fn new(data: Vec<f64>, fragment_count: usize) -> DArrayResult<Self> {
        if data.is_empty() {
            return Err(DArrayError::Validation("数据数组不能为空".to_string()));
        }
        if fragment_count == 0 {
            return Err(DArrayError::Validation("片段数量必须为正数".to_string()));
        }

        let mut darray = Self {
            data,
            requested_count: fragment_count,
            fragments: Vec::new(),
            needs_update: true,
        };
        darray.divide();
        Ok(darray)
    }

    /// 当前生效的片段数 `min(请求数, 数组长度)`
    pub fn fragment_count(&self) -> usize {
        self.requested_count.min(self.data.len())
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// 将当前数组划分为均衡片段，前 `remainder` 个片段多一个元素
    fn divide(&mut self) {
        self.fragments.clear();

        let n = self.data.len();
        let count = self.fragment_count();
        let base_size = n / count;
        let remainder = n % count;

        let mut start = 0;
        for i in 0..count {
            let extra = if i < remainder { 1 } else { 0 };
            let end = start + base_size + extra;

            self.fragments
                .push(Fragment::new(format!("F{i}"), start, self.data[start..end].to_vec()));

            start = end;
        }

        self.needs_update = false;
    }

    /// 返回当前片段，过期时自动重新划分
    pub fn fragments(&mut self) -> &[Fragment] {
        if self.needs_update {
            self.divide();
        }
        &self.fragments
    }

    /// 追加单个值并将划分标记为过期
    pub fn push(&mut self, value: f64) {
        self.data.push(value);
        self.needs_update = true;
    }

    /// 批量追加并将划分标记为过期，空输入不做任何事
    pub fn extend(&mut self, values: &[f64]) {
        if values.is_empty() {
            return;
        }
        self.data.extend_from_slice(values);
        self.needs_update = true;
    }

    /// 将处理后的片段按记录的偏移写回长度等于当前数组的输出。
    ///
    /// 未被任何片段覆盖的位置保持0值；部分合并不视为错误。
    pub fn merge(&self, fragments: &[Fragment]) -> Vec<f64> {
        let mut merged = vec![0.0; self.data.len()];

        for fragment in fragments {
            let start = fragment.start_offset;
            if start >= merged.len() {
                warn!("片段 {} 的偏移 {} 超出数组长度 {}", fragment.id, start, merged.len());
                continue;
            }
            let end = fragment.end_offset().min(merged.len());
            if end < fragment.end_offset() {
                warn!("片段 {} 超出数组边界，结果被截断", fragment.id);
            }
            merged[start..end].copy_from_slice(&fragment.values[..end - start]);
        }

        merged
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(n: usize) -> Vec<f64> {
        (1..=n).map(|i| i as f64).collect()
    }

    #[test]
    fn test_new_rejects_invalid_arguments() {
        assert!(matches!(
            DArray::new(Vec::new(), 2),
            Err(DArrayError::Validation(_))
        ));
        assert!(matches!(
            DArray::new(vec![1.0], 0),
            Err(DArrayError::Validation(_))
        ));
    }

    #[test]
    fn test_fragment_count_clamped_to_length() {
        let mut darray = DArray::new(sample(3), 10).unwrap();
        assert_eq!(darray.fragment_count(), 3);
        assert_eq!(darray.fragments().len(), 3);
    }

    #[test]
    fn test_balanced_division() {
        let mut darray = DArray::new(sample(10), 3).unwrap();
        let fragments = darray.fragments();

        assert_eq!(fragments.len(), 3);
        // 10 = 4 + 3 + 3，余数分给前面的片段
        assert_eq!(fragments[0].values, vec![1.0, 2.0, 3.0, 4.0]);
        assert_eq!(fragments[1].values, vec![5.0, 6.0, 7.0]);
        assert_eq!(fragments[2].values, vec![8.0, 9.0, 10.0]);
        assert_eq!(fragments[0].start_offset, 0);
        assert_eq!(fragments[1].start_offset, 4);
        assert_eq!(fragments[2].start_offset, 7);
        assert_eq!(fragments[0].id, "F0");
        assert_eq!(fragments[2].id, "F2");
    }

    #[test]
    fn test_roundtrip_law_for_all_counts() {
        let data = sample(7);
        for n in 1..=data.len() {
            let mut darray = DArray::new(data.clone(), n).unwrap();
            let fragments = darray.fragments().to_vec();

            assert_eq!(fragments.len(), n.min(data.len()));

            let total: usize = fragments.iter().map(|f| f.len()).sum();
            assert_eq!(total, data.len());

            let max_len = fragments.iter().map(|f| f.len()).max().unwrap();
            let min_len = fragments.iter().map(|f| f.len()).min().unwrap();
            assert!(max_len - min_len <= 1, "片段长度差不能超过1");

            assert_eq!(darray.merge(&fragments), data);
        }
    }

    #[test]
    fn test_push_marks_division_stale() {
        let mut darray = DArray::new(sample(4), 2).unwrap();
        assert_eq!(darray.fragments().len(), 2);

        darray.push(5.0);
        let fragments = darray.fragments();
        assert_eq!(fragments.len(), 2);
        assert_eq!(fragments[0].values, vec![1.0, 2.0, 3.0]);
        assert_eq!(fragments[1].values, vec![4.0, 5.0]);
    }

    #[test]
    fn test_extend_reclamps_original_count() {
        // 请求5个片段但只有2个元素：先截断为2，增长后恢复为5
        let mut darray = DArray::new(sample(2), 5).unwrap();
        assert_eq!(darray.fragments().len(), 2);

        darray.extend(&[3.0, 4.0, 5.0, 6.0]);
        assert_eq!(darray.fragments().len(), 5);
        assert_eq!(darray.len(), 6);

        darray.extend(&[]);
        assert_eq!(darray.fragments().len(), 5);
    }

    #[test]
    fn test_merge_partial_zero_fills() {
        let mut darray = DArray::new(sample(4), 2).unwrap();
        let fragments = darray.fragments().to_vec();

        let merged = darray.merge(&fragments[1..]);
        assert_eq!(merged, vec![0.0, 0.0, 3.0, 4.0]);
    }
}
