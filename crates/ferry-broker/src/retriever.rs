//! 目标解析器：目录查询之上受陈旧上界约束的只读缓存。

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;

use ferry_core::{
    capability::Target,
    contract::Directory,
    ids::{FitableId, GenericableId},
};

use crate::error::RouteError;

type CacheKey = (GenericableId, FitableId);

struct CacheEntry {
    targets: Arc<[Target]>,
    refreshed_at: Instant,
}

/// `TargetRetriever` 把目录查询包装为按 (genericable, fitable) 键控的缓存读取。
///
/// # 教案式解读
/// - **意图（Why）**：
///   - 目录查询通常是一次跨进程往返，热路径上的每次调用都回源无法接受；
///   - 同时必须保证“任何调用方都不会读到超过陈旧上界的列表”——缓存是性能手段，
///     不是一致性豁免。
/// - **实现策略（How）**：
///   - 内部持有 `DashMap<CacheKey, CacheEntry>`，条目的值是 `Arc<[Target]>`：
///     刷新时整体替换该 `Arc`，已经拿到旧列表的读者自然过渡，不存在原地修改；
///   - 采用惰性过期：读取时比较条目年龄与陈旧上界，过期即回源；
///   - 回源失败时**不回退到陈旧条目**，而是分类为 [`RouteError::RouterUnavailable`]，
///     陈旧上界优先于可用性。
///
/// # 契约说明（What）
/// - **后置条件**：
///   - 成功返回的列表年龄不超过构造时传入的陈旧上界；
///   - 返回空列表表示“查询成功但当前无目标承接”，与通道失败严格区分；
/// - **并发**：任意数量的并发读者安全；并发回源可能发生重复查询，后写覆盖先写，
///   两者都是同一目录的合法快照。
pub struct TargetRetriever {
    directory: Arc<dyn Directory>,
    staleness: Duration,
    cache: DashMap<CacheKey, CacheEntry>,
}

impl TargetRetriever {
    /// 以目录实现与陈旧上界构造解析器。
    pub fn new(directory: Arc<dyn Directory>, staleness: Duration) -> Self {
        Self {
            directory,
            staleness,
            cache: DashMap::new(),
        }
    }

    /// 解析当前承接 (genericable, fitable) 的目标列表。
    ///
    /// 新鲜的缓存条目直接命中；未命中或过期时回源目录，失败分类为
    /// [`RouteError::RouterUnavailable`]。
    pub async fn resolve(
        &self,
        genericable: &GenericableId,
        fitable: &FitableId,
    ) -> Result<Arc<[Target]>, RouteError> {
        let key = (genericable.clone(), fitable.clone());
        // 读取后立即释放分段锁，目录往返不得持有任何缓存锁。
        if let Some(entry) = self.cache.get(&key) {
            if entry.refreshed_at.elapsed() <= self.staleness {
                tracing::debug!(genericable = %genericable, fitable = %fitable, "目标缓存命中");
                return Ok(Arc::clone(&entry.targets));
            }
        }

        match self.directory.lookup(genericable, fitable).await {
            Ok(list) => {
                let targets: Arc<[Target]> = list.into();
                tracing::debug!(
                    genericable = %genericable,
                    fitable = %fitable,
                    count = targets.len(),
                    "目录回源完成，缓存整体换新"
                );
                self.cache.insert(
                    key,
                    CacheEntry {
                        targets: Arc::clone(&targets),
                        refreshed_at: Instant::now(),
                    },
                );
                Ok(targets)
            }
            Err(cause) => {
                tracing::warn!(
                    genericable = %genericable,
                    fitable = %fitable,
                    error = %cause,
                    "目录查询通道失败"
                );
                Err(RouteError::RouterUnavailable {
                    genericable: genericable.clone(),
                    fitable: fitable.clone(),
                    cause,
                })
            }
        }
    }

    /// 主动失效某个键的缓存条目，下一次解析强制回源。
    pub fn invalidate(&self, genericable: &GenericableId, fitable: &FitableId) {
        self.cache
            .remove(&(genericable.clone(), fitable.clone()));
    }
}
