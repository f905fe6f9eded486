//! 目录缓存
//!
//! 对症状/疾病目录解析结果做短时缓存。单次 `submit` 的解析
//! 发生在同一时刻、同一快照上；快照过期后整体丢弃重建。
//! 未命中（编码不存在）同样被缓存，到期前保持一致。

use crate::traits::CatalogService;
use async_trait::async_trait;
use hps_core::Result;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

/// 缓存的两个目录维度
#[derive(Debug, Clone, Copy)]
enum CatalogKind {
    Symptoms,
    Diseases,
}

#[derive(Debug)]
struct CacheState {
    fetched_at: Instant,
    symptoms: HashMap<String, Option<i64>>,
    diseases: HashMap<String, Option<i64>>,
}

impl CacheState {
    fn empty() -> Self {
        Self {
            fetched_at: Instant::now(),
            symptoms: HashMap::new(),
            diseases: HashMap::new(),
        }
    }

    fn entries(&self, kind: CatalogKind) -> &HashMap<String, Option<i64>> {
        match kind {
            CatalogKind::Symptoms => &self.symptoms,
            CatalogKind::Diseases => &self.diseases,
        }
    }

    fn entries_mut(&mut self, kind: CatalogKind) -> &mut HashMap<String, Option<i64>> {
        match kind {
            CatalogKind::Symptoms => &mut self.symptoms,
            CatalogKind::Diseases => &mut self.diseases,
        }
    }
}

/// 从缓存条目中取出请求编码的命中子集
fn hits(codes: &[String], entries: &HashMap<String, Option<i64>>) -> HashMap<String, i64> {
    codes
        .iter()
        .filter_map(|code| entries.get(code).and_then(|id| *id).map(|id| (code.clone(), id)))
        .collect()
}

/// 带TTL的目录缓存装饰器
pub struct CachedCatalog {
    inner: Arc<dyn CatalogService>,
    ttl: Duration,
    state: RwLock<CacheState>,
}

impl CachedCatalog {
    pub fn new(inner: Arc<dyn CatalogService>, ttl: Duration) -> Self {
        Self {
            inner,
            ttl,
            state: RwLock::new(CacheState::empty()),
        }
    }

    async fn resolve_cached<F, Fut>(
        &self,
        codes: &[String],
        kind: CatalogKind,
        fetch: F,
    ) -> Result<HashMap<String, i64>>
    where
        F: FnOnce(Vec<String>) -> Fut,
        Fut: std::future::Future<Output = Result<HashMap<String, i64>>>,
    {
        // 快路径：快照未过期且全部编码已有结论时只持读锁
        {
            let state = self.state.read().await;
            if state.fetched_at.elapsed() <= self.ttl {
                let entries = state.entries(kind);
                if codes.iter().all(|code| entries.contains_key(code)) {
                    return Ok(hits(codes, entries));
                }
            }
        }

        let mut state = self.state.write().await;
        if state.fetched_at.elapsed() > self.ttl {
            *state = CacheState::empty();
        }

        // 读锁到写锁之间缓存可能已被补齐，按当前内容重算缺口
        let missing: Vec<String> = codes
            .iter()
            .filter(|code| !state.entries(kind).contains_key(*code))
            .cloned()
            .collect();

        if !missing.is_empty() {
            let resolved = fetch(missing.clone()).await?;
            let entries = state.entries_mut(kind);
            for code in missing {
                let id = resolved.get(&code).copied();
                entries.insert(code, id);
            }
        }

        Ok(hits(codes, state.entries(kind)))
    }
}

#[async_trait]
impl CatalogService for CachedCatalog {
    async fn resolve_symptom_codes(&self, codes: &[String]) -> Result<HashMap<String, i64>> {
        let inner = self.inner.clone();
        self.resolve_cached(codes, CatalogKind::Symptoms, move |missing| async move {
            inner.resolve_symptom_codes(&missing).await
        })
        .await
    }

    async fn resolve_disease_codes(&self, codes: &[String]) -> Result<HashMap<String, i64>> {
        let inner = self.inner.clone();
        self.resolve_cached(codes, CatalogKind::Diseases, move |missing| async move {
            inner.resolve_disease_codes(&missing).await
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// 记录访问次数的目录桩
    struct CountingCatalog {
        hits: AtomicUsize,
    }

    #[async_trait]
    impl CatalogService for CountingCatalog {
        async fn resolve_symptom_codes(&self, codes: &[String]) -> Result<HashMap<String, i64>> {
            self.hits.fetch_add(1, Ordering::SeqCst);
            Ok(codes
                .iter()
                .filter(|c| c.as_str() != "bogus")
                .enumerate()
                .map(|(i, c)| (c.clone(), i as i64 + 1))
                .collect())
        }

        async fn resolve_disease_codes(&self, codes: &[String]) -> Result<HashMap<String, i64>> {
            self.resolve_symptom_codes(codes).await
        }
    }

    #[tokio::test]
    async fn test_cache_serves_repeat_lookups() {
        let inner = Arc::new(CountingCatalog {
            hits: AtomicUsize::new(0),
        });
        let cache = CachedCatalog::new(inner.clone(), Duration::from_secs(60));

        let codes = vec!["cough".to_string(), "fever".to_string()];
        let first = cache.resolve_symptom_codes(&codes).await.unwrap();
        let second = cache.resolve_symptom_codes(&codes).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(inner.hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_warm_cache_serves_concurrent_lookups() {
        let inner = Arc::new(CountingCatalog {
            hits: AtomicUsize::new(0),
        });
        let cache = Arc::new(CachedCatalog::new(inner.clone(), Duration::from_secs(60)));

        let codes = vec!["cough".to_string(), "fever".to_string()];
        let warm = cache.resolve_symptom_codes(&codes).await.unwrap();

        // 命中快照的并发解析互不阻塞，也不会再打到下游
        let tasks: Vec<_> = (0..4)
            .map(|_| {
                let cache = cache.clone();
                let codes = codes.clone();
                tokio::spawn(async move { cache.resolve_symptom_codes(&codes).await })
            })
            .collect();
        for task in tasks {
            assert_eq!(task.await.unwrap().unwrap(), warm);
        }
        assert_eq!(inner.hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cache_remembers_misses() {
        let inner = Arc::new(CountingCatalog {
            hits: AtomicUsize::new(0),
        });
        let cache = CachedCatalog::new(inner.clone(), Duration::from_secs(60));

        let codes = vec!["bogus".to_string()];
        assert!(cache.resolve_symptom_codes(&codes).await.unwrap().is_empty());
        assert!(cache.resolve_symptom_codes(&codes).await.unwrap().is_empty());
        assert_eq!(inner.hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_expired_cache_refetches() {
        let inner = Arc::new(CountingCatalog {
            hits: AtomicUsize::new(0),
        });
        let cache = CachedCatalog::new(inner.clone(), Duration::from_millis(0));

        let codes = vec!["cough".to_string()];
        cache.resolve_symptom_codes(&codes).await.unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;
        cache.resolve_symptom_codes(&codes).await.unwrap();
        assert_eq!(inner.hits.load(Ordering::SeqCst), 2);
    }
}
