//! 窗口去重（Idempotency Window）
//!
//! 以业务键 `(aggregate_id, event_timestamp, event_name)` 记录首次出现的时间，
//! 窗口内再次出现的事件在到达持久化器之前被丢弃。窗口从首次出现起计算，
//! 重复出现不会刷新；过期记录由 `purge_expired` 或后台清理任务移除。
//!
//! 过滤器登记的键在下游日志返回之前处于"进行中"状态。此时同键的其他批次
//! 会等待：首个批次成功后才把重复丢弃，失败则由等待者重新登记并写入。
//! 多个键按 `DedupKey` 的顺序依次登记，等待之间不会形成环。
//!
//! 该过滤器对单个窗口实例是精确的，跨进程重启只是尽力而为。
//!
use super::EventLog;
use crate::{
    domain_event::Event,
    error::DomainResult as Result,
    filter::Filter,
    identity::{AggregateId, VersionedName},
    timestamp::StreamTimestamp,
};
use async_trait::async_trait;
use dashmap::{DashMap, mapref::entry::Entry};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// 去重窗口配置
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct IdempotencyConfig {
    /// 同一业务键被视为重复的时长
    pub window: Duration,
    /// 后台清理过期记录的间隔
    pub sweep_interval: Duration,
}

impl Default for IdempotencyConfig {
    fn default() -> Self {
        Self {
            window: Duration::from_secs(300),
            sweep_interval: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DedupKey {
    aggregate_id: AggregateId,
    event_timestamp: StreamTimestamp,
    event_name: VersionedName,
}

impl DedupKey {
    pub fn of(event: &Event) -> Self {
        Self {
            aggregate_id: event.aggregate_id().clone(),
            event_timestamp: event.event_timestamp().clone(),
            event_name: event.event_name().clone(),
        }
    }
}

#[derive(Debug)]
struct Seen {
    first_seen: Instant,
    state: SeenState,
}

#[derive(Debug)]
enum SeenState {
    /// 已登记的批次尚未得到下游结果；发送端释放时唤醒等待者
    InFlight {
        claim: u64,
        settled: watch::Receiver<()>,
    },
    Durable,
}

enum Admission {
    Admitted(Claim),
    Duplicate,
    InFlight(watch::Receiver<()>),
}

struct Claim {
    key: DedupKey,
    id: u64,
    _settle: watch::Sender<()>,
}

#[derive(Debug)]
pub struct IdempotencyWindow {
    seen: DashMap<DedupKey, Seen>,
    claims: AtomicU64,
    config: IdempotencyConfig,
}

impl IdempotencyWindow {
    pub fn new(config: IdempotencyConfig) -> Self {
        Self {
            seen: DashMap::new(),
            claims: AtomicU64::new(0),
            config,
        }
    }

    pub fn config(&self) -> &IdempotencyConfig {
        &self.config
    }

    /// 原子地检查并登记：首次出现或已过期返回 `true`
    ///
    /// 直接登记为已持久化；过滤器内部走进行中登记。
    pub fn admit(&self, key: DedupKey) -> bool {
        let now = Instant::now();
        match self.seen.entry(key) {
            Entry::Occupied(mut entry) => {
                if self.is_live(entry.get(), now) {
                    false
                } else {
                    entry.insert(Seen {
                        first_seen: now,
                        state: SeenState::Durable,
                    });
                    true
                }
            }
            Entry::Vacant(entry) => {
                entry.insert(Seen {
                    first_seen: now,
                    state: SeenState::Durable,
                });
                true
            }
        }
    }

    /// 撤销登记，使重试不会被误判为重复
    pub fn forget(&self, key: &DedupKey) {
        self.seen.remove(key);
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    /// 移除过期记录，返回移除数量；进行中的登记不会被移除
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.seen.len();
        self.seen.retain(|_, seen| self.is_live(seen, now));
        before.saturating_sub(self.seen.len())
    }

    /// 按 `sweep_interval` 周期清理，直到令牌被取消
    pub fn spawn_sweeper(self: &Arc<Self>, token: CancellationToken) -> JoinHandle<()> {
        let window = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = time::interval(window.config.sweep_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        let purged = window.purge_expired();
                        if purged > 0 {
                            debug!(purged, "expired dedup keys purged");
                        }
                    }
                }
            }
        })
    }

    fn is_live(&self, seen: &Seen, now: Instant) -> bool {
        match seen.state {
            SeenState::InFlight { .. } => true,
            SeenState::Durable => now.duration_since(seen.first_seen) < self.config.window,
        }
    }

    fn try_claim(&self, key: &DedupKey) -> Admission {
        let now = Instant::now();
        let entry = self.seen.entry(key.clone());
        if let Entry::Occupied(occupied) = &entry {
            let seen = occupied.get();
            match &seen.state {
                SeenState::InFlight { settled, .. } => return Admission::InFlight(settled.clone()),
                SeenState::Durable if self.is_live(seen, now) => return Admission::Duplicate,
                SeenState::Durable => {}
            }
        }

        let id = self.claims.fetch_add(1, Ordering::Relaxed);
        let (settle, settled) = watch::channel(());
        entry.insert(Seen {
            first_seen: now,
            state: SeenState::InFlight { claim: id, settled },
        });
        Admission::Admitted(Claim {
            key: key.clone(),
            id,
            _settle: settle,
        })
    }

    /// 结束一次登记；只处理仍属于该登记的记录
    fn settle(&self, claim: Claim, durable: bool) {
        if let Entry::Occupied(mut entry) = self.seen.entry(claim.key.clone()) {
            let owned = matches!(
                entry.get().state,
                SeenState::InFlight { claim: id, .. } if id == claim.id
            );
            if owned && durable {
                entry.get_mut().state = SeenState::Durable;
            } else if owned {
                entry.remove();
            }
        }
        // 记录更新之后才释放发送端，被唤醒的等待者看到的是最终状态
        drop(claim);
    }
}

/// 一个批次持有的登记；未提交即释放时全部撤销
struct Claims<'w> {
    window: &'w IdempotencyWindow,
    held: Vec<Claim>,
}

impl Claims<'_> {
    fn commit(mut self) {
        for claim in std::mem::take(&mut self.held) {
            self.window.settle(claim, true);
        }
    }
}

impl Drop for Claims<'_> {
    fn drop(&mut self) {
        for claim in std::mem::take(&mut self.held) {
            self.window.settle(claim, false);
        }
    }
}

/// 事件日志前置过滤：丢弃窗口内重复的事件（同一批次内的重复同样丢弃）
pub fn idempotent_filter(window: Arc<IdempotencyWindow>) -> Filter<Arc<dyn EventLog>> {
    Filter::new(move |inner: Arc<dyn EventLog>| {
        Arc::new(IdempotentEventLog {
            inner,
            window: window.clone(),
        }) as Arc<dyn EventLog>
    })
}

struct IdempotentEventLog {
    inner: Arc<dyn EventLog>,
    window: Arc<IdempotencyWindow>,
}

fn dropped(event: &Event) {
    debug!(
        aggregate_id = %event.aggregate_id(),
        event_timestamp = %event.event_timestamp(),
        event_name = %event.event_name(),
        "duplicate event dropped"
    );
}

#[async_trait]
impl EventLog for IdempotentEventLog {
    async fn log(&self, events: Vec<Event>) -> Result<Vec<Event>> {
        let mut firsts: BTreeMap<DedupKey, usize> = BTreeMap::new();
        for (index, event) in events.iter().enumerate() {
            let key = DedupKey::of(event);
            if firsts.contains_key(&key) {
                dropped(event);
            } else {
                firsts.insert(key, index);
            }
        }

        let mut claims = Claims {
            window: &self.window,
            held: Vec::with_capacity(firsts.len()),
        };
        let mut admitted = HashSet::with_capacity(firsts.len());
        for (key, index) in &firsts {
            loop {
                match self.window.try_claim(key) {
                    Admission::Admitted(claim) => {
                        claims.held.push(claim);
                        admitted.insert(*index);
                        break;
                    }
                    Admission::Duplicate => {
                        dropped(&events[*index]);
                        break;
                    }
                    Admission::InFlight(mut settled) => {
                        // 发送端释放即返回（Err），随后重新判断
                        let _ = settled.changed().await;
                    }
                }
            }
        }

        let admitted: Vec<Event> = events
            .into_iter()
            .enumerate()
            .filter_map(|(index, event)| admitted.contains(&index).then_some(event))
            .collect();

        let result = self.inner.log(admitted).await;
        if result.is_ok() {
            claims.commit();
        }
        result
    }
}
