//! 查询缓存
//!
//! 以逻辑查询键缓存最近一次成功的远程读取结果：
//! - 同一键的并发读取共享一次远程请求
//! - 写操作成功后按声明的键列表失效，活跃读者随即重新获取
//! - 不做乐观更新，不做重试，不设过期时间
//!
//! 远程读取在独立任务中运行，读者中途离开不会取消请求，迟到的结果照常写入缓存。

use chrono::{DateTime, Utc};
use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard};
use telemed_core::{Result, TelemedError};
use tokio::sync::{broadcast, watch};
use tracing::{debug, info, warn};

use crate::key::{Invalidation, QueryKey};

type AnyValue = Arc<dyn Any + Send + Sync>;
type FetchOutcome = std::result::Result<AnyValue, TelemedError>;
type BoxFetch = Pin<Box<dyn Future<Output = FetchOutcome> + Send>>;
type Fetcher = Arc<dyn Fn() -> BoxFetch + Send + Sync>;
type InFlight = watch::Receiver<Option<FetchOutcome>>;

/// 缓存配置
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// 事件广播通道容量
    pub event_capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { event_capacity: 64 }
    }
}

/// 缓存事件
#[derive(Debug, Clone, PartialEq)]
pub enum CacheEvent {
    /// 远程读取成功并写入
    Updated(QueryKey),
    /// 条目被标记为过期
    Invalidated(QueryKey),
    /// 远程读取失败，原有缓存保持不变
    Failed(QueryKey, TelemedError),
    /// 整个缓存被清空（注销）
    Cleared,
}

/// 单个条目的对外状态
#[derive(Debug, Clone, PartialEq)]
pub struct QueryStatus {
    pub has_value: bool,
    pub is_stale: bool,
    pub is_fetching: bool,
    pub observers: usize,
    pub last_error: Option<TelemedError>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Default)]
struct Entry {
    value: Option<AnyValue>,
    stale: bool,
    /// 每次失效加一，用于识别在途期间发生的失效
    generation: u64,
    /// 当前值所属的失效代
    value_generation: u64,
    /// 最近一次发起的请求及其所属的失效代
    in_flight: Option<(u64, InFlight)>,
    /// 最近一次由观察者登记的读取函数
    fetcher: Option<Fetcher>,
    observers: usize,
    last_error: Option<TelemedError>,
    updated_at: Option<DateTime<Utc>>,
}

impl Entry {
    fn is_fresh(&self) -> bool {
        self.value.is_some() && !self.stale
    }

    /// 属于当前失效代且发送端仍存活的在途请求
    ///
    /// 失效之前发出的请求不能再被加入，否则读者会拿到写操作之前的数据。
    fn live_in_flight(&self) -> Option<InFlight> {
        self.in_flight
            .as_ref()
            .filter(|(generation, rx)| *generation == self.generation && rx.has_changed().is_ok())
            .map(|(_, rx)| rx.clone())
    }

    /// 任意失效代的在途请求
    fn is_fetching(&self) -> bool {
        self.in_flight
            .as_ref()
            .is_some_and(|(_, rx)| rx.has_changed().is_ok())
    }
}

#[derive(Default)]
struct CacheState {
    entries: HashMap<QueryKey, Entry>,
    /// 每次清空加一，清空前发起的请求结果不再写入
    epoch: u64,
}

struct CacheInner {
    state: Mutex<CacheState>,
    events: broadcast::Sender<CacheEvent>,
}

impl CacheInner {
    fn lock(&self) -> Result<MutexGuard<'_, CacheState>> {
        self.state
            .lock()
            .map_err(|_| TelemedError::Internal("query cache lock poisoned".to_string()))
    }

    fn emit(&self, event: CacheEvent) {
        // 没有订阅者时发送失败属正常情况
        let _ = self.events.send(event);
    }
}

/// 进程级查询缓存
///
/// 克隆得到的是同一缓存的句柄。每个登录会话构造一次，注销时清空。
#[derive(Clone)]
pub struct QueryCache {
    inner: Arc<CacheInner>,
}

impl QueryCache {
    pub fn new(config: CacheConfig) -> Self {
        let (events, _) = broadcast::channel(config.event_capacity.max(1));
        Self {
            inner: Arc::new(CacheInner {
                state: Mutex::new(CacheState::default()),
                events,
            }),
        }
    }

    /// 读取一个查询
    ///
    /// `enabled` 为 `false` 时不发起请求并返回 `Ok(None)`。
    /// 缓存新鲜时直接返回；否则发起（或加入已在途的）一次远程读取。
    pub async fn read<T, F, Fut>(&self, key: QueryKey, enabled: bool, fetch: F) -> Result<Option<T>>
    where
        T: Clone + Send + Sync + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        if !enabled {
            debug!("Query {} disabled", key);
            return Ok(None);
        }

        let value = self
            .read_erased(&key, move || {
                let fut = fetch();
                Box::pin(async move { fut.await.map(|v| Arc::new(v) as AnyValue) }) as BoxFetch
            })
            .await?;
        downcast::<T>(&key, &value).map(Some)
    }

    async fn read_erased<M>(&self, key: &QueryKey, make_fetch: M) -> Result<AnyValue>
    where
        M: FnOnce() -> BoxFetch,
    {
        let rx = {
            let mut state = self.inner.lock()?;
            let epoch = state.epoch;
            let entry = state.entries.entry(key.clone()).or_default();

            if entry.is_fresh() {
                if let Some(value) = &entry.value {
                    debug!("Query {} served from cache", key);
                    return Ok(Arc::clone(value));
                }
            }

            match entry.live_in_flight() {
                Some(rx) => {
                    debug!("Query {} joined in-flight fetch", key);
                    drop(make_fetch);
                    rx
                }
                None => start_fetch(&self.inner, entry, key.clone(), epoch, make_fetch()),
            }
        };

        wait_for(rx).await
    }

    /// 登记一个活跃读者
    ///
    /// 观察者存活期间，键被失效会立即在后台重新获取。
    pub fn observe<T, F, Fut>(&self, key: QueryKey, fetch: F) -> Result<QueryObserver>
    where
        T: Clone + Send + Sync + 'static,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let fetcher: Fetcher = Arc::new(move || {
            let fut = fetch();
            Box::pin(async move { fut.await.map(|v| Arc::new(v) as AnyValue) }) as BoxFetch
        });

        {
            let mut state = self.inner.lock()?;
            let entry = state.entries.entry(key.clone()).or_default();
            entry.fetcher = Some(Arc::clone(&fetcher));
            entry.observers += 1;
        }

        Ok(QueryObserver {
            cache: self.clone(),
            key,
            fetcher,
        })
    }

    /// 按目标标记过期，返回受影响的键
    pub fn invalidate(&self, target: &Invalidation) -> Result<Vec<QueryKey>> {
        let mut affected = Vec::new();
        let mut state = self.inner.lock()?;
        let epoch = state.epoch;

        for (key, entry) in state.entries.iter_mut().filter(|(k, _)| target.matches(k)) {
            entry.stale = true;
            entry.generation += 1;
            affected.push(key.clone());
            self.inner.emit(CacheEvent::Invalidated(key.clone()));

            // 旧代的在途请求不算数，观察者需要失效之后的数据
            if entry.observers == 0 || entry.live_in_flight().is_some() {
                continue;
            }
            if let Some(fetcher) = entry.fetcher.clone() {
                if tokio::runtime::Handle::try_current().is_ok() {
                    debug!("Refetching observed query {}", key);
                    start_fetch(&self.inner, entry, key.clone(), epoch, fetcher());
                }
            }
        }

        if !affected.is_empty() {
            debug!("Invalidated {} queries", affected.len());
        }
        Ok(affected)
    }

    /// 执行一次写操作
    ///
    /// 成功时依次应用 `invalidations`；失败时缓存保持不变，错误原样返回。
    pub async fn mutate<P, R, F, Fut>(
        &self,
        payload: P,
        mutate_fn: F,
        invalidations: &[Invalidation],
    ) -> Result<R>
    where
        F: FnOnce(P) -> Fut,
        Fut: Future<Output = Result<R>>,
    {
        match mutate_fn(payload).await {
            Ok(result) => {
                for target in invalidations {
                    self.invalidate(target)?;
                }
                Ok(result)
            }
            Err(e) => {
                warn!("Mutation failed: {}", e);
                Err(e)
            }
        }
    }

    /// 清空全部条目，注销时调用
    pub fn clear(&self) -> Result<()> {
        let mut state = self.inner.lock()?;
        let dropped = state.entries.len();
        state.entries.clear();
        state.epoch += 1;
        self.inner.emit(CacheEvent::Cleared);
        info!("Query cache cleared ({} entries)", dropped);
        Ok(())
    }

    /// 不触发请求地查看缓存值（可能已过期）
    pub fn peek<T: Clone + 'static>(&self, key: &QueryKey) -> Option<T> {
        let state = self.inner.lock().ok()?;
        let value = state.entries.get(key)?.value.as_ref()?;
        value.as_ref().downcast_ref::<T>().cloned()
    }

    pub fn status(&self, key: &QueryKey) -> Option<QueryStatus> {
        let state = self.inner.lock().ok()?;
        let entry = state.entries.get(key)?;
        Some(QueryStatus {
            has_value: entry.value.is_some(),
            is_stale: entry.stale,
            is_fetching: entry.is_fetching(),
            observers: entry.observers,
            last_error: entry.last_error.clone(),
            updated_at: entry.updated_at,
        })
    }

    pub fn is_stale(&self, key: &QueryKey) -> bool {
        self.status(key).map(|s| s.is_stale).unwrap_or(true)
    }

    pub fn entry_count(&self) -> usize {
        self.inner.lock().map(|s| s.entries.len()).unwrap_or(0)
    }

    /// 订阅缓存事件
    pub fn subscribe(&self) -> broadcast::Receiver<CacheEvent> {
        self.inner.events.subscribe()
    }
}

impl Default for QueryCache {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}

impl std::fmt::Debug for QueryCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryCache")
            .field("entries", &self.entry_count())
            .finish()
    }
}

/// 活跃读者句柄，释放时注销
pub struct QueryObserver {
    cache: QueryCache,
    key: QueryKey,
    fetcher: Fetcher,
}

impl QueryObserver {
    pub fn key(&self) -> &QueryKey {
        &self.key
    }

    /// 以登记的读取函数读取当前值
    pub async fn current<T: Clone + Send + Sync + 'static>(&self) -> Result<T> {
        let fetcher = Arc::clone(&self.fetcher);
        let value = self.cache.read_erased(&self.key, move || fetcher()).await?;
        downcast::<T>(&self.key, &value)
    }
}

impl Drop for QueryObserver {
    fn drop(&mut self) {
        if let Ok(mut state) = self.cache.inner.lock() {
            if let Some(entry) = state.entries.get_mut(&self.key) {
                entry.observers = entry.observers.saturating_sub(1);
            }
        }
    }
}

/// 在独立任务中发起远程读取，返回结果接收端
fn start_fetch(
    inner: &Arc<CacheInner>,
    entry: &mut Entry,
    key: QueryKey,
    epoch: u64,
    fetch: BoxFetch,
) -> InFlight {
    let (tx, rx) = watch::channel(None);
    let generation = entry.generation;
    entry.in_flight = Some((generation, rx.clone()));
    let inner = Arc::clone(inner);

    debug!("Fetching query {}", key);
    tokio::spawn(async move {
        let outcome = fetch.await;
        complete_fetch(&inner, &key, generation, epoch, &outcome);
        // 所有读者都已离开时无人接收，忽略即可
        let _ = tx.send(Some(outcome));
    });

    rx
}

/// 写回一次远程读取的结果
fn complete_fetch(
    inner: &Arc<CacheInner>,
    key: &QueryKey,
    generation: u64,
    epoch: u64,
    outcome: &FetchOutcome,
) {
    let Ok(mut state) = inner.lock() else {
        return;
    };
    if state.epoch != epoch {
        debug!("Discarding result for {} fetched before cache was cleared", key);
        return;
    }
    let Some(entry) = state.entries.get_mut(key) else {
        return;
    };
    // 只释放自己占用的在途位置，较新的请求可能已经替换了它
    if matches!(entry.in_flight, Some((g, _)) if g == generation) {
        entry.in_flight = None;
    }

    match outcome {
        Ok(_) if generation < entry.value_generation => {
            debug!("Discarding outdated result for {}", key);
        }
        Ok(value) => {
            entry.value = Some(Arc::clone(value));
            entry.value_generation = generation;
            entry.stale = entry.generation != generation;
            entry.last_error = None;
            entry.updated_at = Some(Utc::now());
            inner.emit(CacheEvent::Updated(key.clone()));

            // 在途期间被失效且仍有观察者，再取一次
            if entry.stale && entry.observers > 0 && entry.live_in_flight().is_none() {
                if let Some(fetcher) = entry.fetcher.clone() {
                    start_fetch(inner, entry, key.clone(), epoch, fetcher());
                }
            }
        }
        Err(e) => {
            warn!("Query {} failed: {}", key, e);
            entry.last_error = Some(e.clone());
            inner.emit(CacheEvent::Failed(key.clone(), e.clone()));
        }
    }
}

async fn wait_for(mut rx: InFlight) -> FetchOutcome {
    loop {
        let current = rx.borrow().clone();
        if let Some(outcome) = current {
            return outcome;
        }
        if rx.changed().await.is_err() {
            let last = rx.borrow().clone();
            return last.unwrap_or_else(|| {
                Err(TelemedError::Internal("query fetch aborted".to_string()))
            });
        }
    }
}

fn downcast<T: Clone + 'static>(key: &QueryKey, value: &AnyValue) -> Result<T> {
    value
        .as_ref()
        .downcast_ref::<T>()
        .cloned()
        .ok_or_else(|| TelemedError::Internal(format!("type mismatch for query {}", key)))
}
