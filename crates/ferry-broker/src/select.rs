//! 候选挑选策略：从可行集中确定一个派发目标。

use std::sync::atomic::{AtomicU64, Ordering};

use ferry_core::capability::Target;

/// 可插拔的挑选策略契约。
///
/// # 契约说明（What）
/// - **输入**：过滤链产出的可行候选集（已剔除本调用中失败过的目标）；
/// - **要求**：相同候选集合（不论列表顺序）下的裁决必须确定——目录返回的列表
///   顺序跨调用不保证稳定，策略不得依赖它。
pub trait SelectionStrategy: Send + Sync {
    /// 从候选集中挑选一个目标；空集返回 `None`。
    fn select(&self, candidates: &[Target]) -> Option<Target>;
}

/// 取工作标识字典序最小者，适合测试与单实例部署。
pub struct FirstAvailable;

impl SelectionStrategy for FirstAvailable {
    fn select(&self, candidates: &[Target]) -> Option<Target> {
        candidates
            .iter()
            .min_by(|a, b| a.worker_id().cmp(b.worker_id()))
            .cloned()
    }
}

/// 稳定轮询：按工作标识排序后以原子游标轮转，跨调用摊开负载。
///
/// # 教案式解读
/// - **意图（Why）**：多个非本地且能力完备的候选之间需要一个确定性的裁决准则；
///   直接取目录列表的第一项会把全部流量压到同一实例上，且依赖不稳定的列表顺序；
/// - **实现（How)**：先按工作标识全序排序消除目录顺序的影响，再用 `AtomicU64`
///   游标取模索引；游标只增不减，并发调用各自拿到相邻的序号；
/// - **权衡（Trade-offs）**：候选集合在两次调用间变化时，取模索引会跳变，
///   负载均摊在长周期上仍然成立；排序是每次挑选 O(n log n) 的代价，候选集
///   通常很小，换确定性是值得的。
pub struct RoundRobin {
    cursor: AtomicU64,
}

impl RoundRobin {
    /// 构造游标归零的轮询策略。
    pub fn new() -> Self {
        Self {
            cursor: AtomicU64::new(0),
        }
    }
}

impl Default for RoundRobin {
    fn default() -> Self {
        Self::new()
    }
}

impl SelectionStrategy for RoundRobin {
    fn select(&self, candidates: &[Target]) -> Option<Target> {
        if candidates.is_empty() {
            return None;
        }
        let mut ordered: Vec<&Target> = candidates.iter().collect();
        ordered.sort_by(|a, b| a.worker_id().cmp(b.worker_id()));
        let index = self.cursor.fetch_add(1, Ordering::Relaxed) as usize % ordered.len();
        Some(ordered[index].clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ferry_core::ids::WorkerId;

    fn targets(ids: &[&str]) -> Vec<Target> {
        ids.iter()
            .map(|id| Target::new(WorkerId::parse(*id).unwrap()))
            .collect()
    }

    #[test]
    fn empty_candidates_yield_none() {
        assert!(RoundRobin::new().select(&[]).is_none());
        assert!(FirstAvailable.select(&[]).is_none());
    }

    #[test]
    fn round_robin_cycles_in_worker_id_order() {
        let strategy = RoundRobin::new();
        let candidates = targets(&["w2", "w3", "w1"]);
        let picked: Vec<String> = (0..4)
            .map(|_| strategy.select(&candidates).unwrap().worker_id().to_string())
            .collect();
        assert_eq!(picked, ["w1", "w2", "w3", "w1"]);
    }

    #[test]
    fn selection_ignores_directory_list_order() {
        // 同一集合的两种排列，在相同游标位置裁决一致。
        let a = RoundRobin::new();
        let b = RoundRobin::new();
        let forward = targets(&["w1", "w2", "w3"]);
        let shuffled = targets(&["w3", "w1", "w2"]);
        for _ in 0..3 {
            assert_eq!(
                a.select(&forward).unwrap().worker_id(),
                b.select(&shuffled).unwrap().worker_id()
            );
        }
    }

    #[test]
    fn first_available_is_deterministic() {
        let candidates = targets(&["w9", "w2", "w5"]);
        assert_eq!(
            FirstAvailable.select(&candidates).unwrap().worker_id().as_str(),
            "w2"
        );
    }
}
