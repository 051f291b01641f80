//! 缓存状态仓储（CachingStateRepository）
//!
//! 首次读取时从 `EventRetriever` 加载历史，按因果顺序排序后折叠，
//! 结果按聚合缓存；之后发布的事件通过 `apply` 增量折叠到缓存中。
//!
//! - 已折叠事件的处理 ID 按聚合记录，重复投递不会再次折叠；
//! - 加载进行期间到达的事件先暂存，加载结束时与历史合并后一起排序折叠；
//! - 因果键早于已折叠的最后一条事件时，缓存被丢弃，下次读取从历史重建。
//!
//! `apply` 假定事件已被持久化（事件日志先写入再发布）。
//!
use super::Accumulator;
use crate::{
    causal_order::{CausalOrder, CausalOrdering},
    domain_event::Event,
    error::DomainResult as Result,
    eventing::{EventHandler, HandledEventType},
    identity::{AggregateId, EventType},
    persist::{EventRetriever, TimeRange},
    registry::TypeRegistry,
    timestamp::StreamTimestamp,
};
use async_trait::async_trait;
use dashmap::{DashMap, mapref::entry::Entry};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;
use uuid::Uuid;

type CausalKey = (CausalOrder, StreamTimestamp);

enum Slot<S> {
    /// 正在从存储加载；`pending` 暂存加载期间发布的事件
    Loading { generation: u64, pending: Vec<Event> },
    Ready(Cached<S>),
}

struct Cached<S> {
    state: Option<S>,
    applied: HashSet<Uuid>,
    last: Option<CausalKey>,
}

impl<S> Cached<S> {
    fn covers(&self, event: &Event) -> bool {
        event
            .processing_id()
            .is_some_and(|id| self.applied.contains(&id))
    }

    fn record(&mut self, event: &Event, key: CausalKey) {
        if let Some(id) = event.processing_id() {
            self.applied.insert(id);
        }
        if self.last.as_ref().is_none_or(|last| key > *last) {
            self.last = Some(key);
        }
    }
}

enum Reserved<S> {
    Ready(Option<S>),
    Loading(u64),
}

/// 加载结束（包括被取消）时撤销仍未完成的加载登记
struct LoadGuard<'a, S> {
    cache: &'a DashMap<AggregateId, Slot<S>>,
    loading: Vec<(AggregateId, u64)>,
}

impl<S> Drop for LoadGuard<'_, S> {
    fn drop(&mut self) {
        for (aggregate_id, generation) in &self.loading {
            self.cache.remove_if(aggregate_id, |_, slot| {
                matches!(slot, Slot::Loading { generation: g, .. } if g == generation)
            });
        }
    }
}

fn same_event(a: &Event, b: &Event) -> bool {
    match (a.processing_id(), b.processing_id()) {
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}

pub struct CachingStateRepository<S> {
    aggregate_type: String,
    handler_name: String,
    retriever: Arc<dyn EventRetriever>,
    registry: Arc<TypeRegistry>,
    ordering: CausalOrdering<EventType>,
    accumulator: Accumulator<S>,
    cache: DashMap<AggregateId, Slot<S>>,
    generations: AtomicU64,
}

impl<S> CachingStateRepository<S>
where
    S: Clone + Send + Sync + 'static,
{
    pub fn new(
        aggregate_type: impl Into<String>,
        retriever: Arc<dyn EventRetriever>,
        registry: Arc<TypeRegistry>,
        accumulator: Accumulator<S>,
    ) -> Self {
        let aggregate_type = aggregate_type.into();
        Self {
            handler_name: format!("state-cache:{aggregate_type}"),
            aggregate_type,
            retriever,
            ordering: registry.event_ordering(),
            registry,
            accumulator,
            cache: DashMap::new(),
            generations: AtomicU64::new(0),
        }
    }

    pub fn aggregate_type(&self) -> &str {
        &self.aggregate_type
    }

    /// 读取状态；聚合没有任何已知事件时为 `None`
    pub async fn get_state(&self, aggregate_id: &AggregateId) -> Result<Option<S>> {
        let generation = match self.reserve(aggregate_id) {
            Reserved::Ready(state) => return Ok(state),
            Reserved::Loading(generation) => generation,
        };
        let _guard = LoadGuard {
            cache: &self.cache,
            loading: vec![(aggregate_id.clone(), generation)],
        };

        let events = self
            .retriever
            .get_events(self.registry.as_ref(), aggregate_id, TimeRange::all())
            .await?;
        self.finish(aggregate_id, generation, events)
    }

    /// 批量读取同类型的多个聚合；只返回存在状态的聚合
    pub async fn get_states(&self, ids: &[Uuid]) -> Result<HashMap<Uuid, S>> {
        let mut out = HashMap::with_capacity(ids.len());
        let mut guard = LoadGuard {
            cache: &self.cache,
            loading: Vec::new(),
        };

        for id in ids {
            let aggregate_id = AggregateId::of(self.aggregate_type.clone(), *id);
            match self.reserve(&aggregate_id) {
                Reserved::Ready(Some(state)) => {
                    out.insert(*id, state);
                }
                Reserved::Ready(None) => {}
                Reserved::Loading(generation) => guard.loading.push((aggregate_id, generation)),
            }
        }
        if guard.loading.is_empty() {
            return Ok(out);
        }

        let missing: Vec<Uuid> = guard.loading.iter().map(|(a, _)| a.id()).collect();
        let mut histories = self
            .retriever
            .get_events_for(
                self.registry.as_ref(),
                &self.aggregate_type,
                &missing,
                TimeRange::all(),
            )
            .await?;
        for (aggregate_id, generation) in &guard.loading {
            let events = histories.remove(&aggregate_id.id()).unwrap_or_default();
            if let Some(state) = self.finish(aggregate_id, *generation, events)? {
                out.insert(aggregate_id.id(), state);
            }
        }

        Ok(out)
    }

    /// 把新事件折叠到已缓存的状态；未缓存的聚合在下次读取时加载
    pub fn apply(&self, event: &Event) -> Result<()> {
        if event.aggregate_id().aggregate_type() != self.aggregate_type {
            return Ok(());
        }
        let Entry::Occupied(mut slot) = self.cache.entry(event.aggregate_id().clone()) else {
            return Ok(());
        };

        let stale = match slot.get_mut() {
            Slot::Loading { pending, .. } => {
                pending.push(event.clone());
                return Ok(());
            }
            Slot::Ready(cached) => {
                if cached.covers(event) {
                    return Ok(());
                }
                let key = self.causal_key(event);
                if cached.last.as_ref().is_some_and(|last| key < *last) {
                    true
                } else {
                    let mut next = cached.state.clone();
                    self.accumulator.fold(&mut next, event)?;
                    cached.state = next;
                    cached.record(event, key);
                    false
                }
            }
        };

        if stale {
            slot.remove();
            debug!(
                aggregate_id = %event.aggregate_id(),
                event_type = %event.event_type(),
                "event arrived out of causal order, cached state dropped"
            );
        }
        Ok(())
    }

    pub fn invalidate(&self, aggregate_id: &AggregateId) {
        self.cache.remove(aggregate_id);
    }

    pub fn cached_len(&self) -> usize {
        self.cache
            .iter()
            .filter(|slot| matches!(slot.value(), Slot::Ready(_)))
            .count()
    }

    fn causal_key(&self, event: &Event) -> CausalKey {
        (
            self.ordering.order_of(event),
            event.event_timestamp().clone(),
        )
    }

    fn reserve(&self, aggregate_id: &AggregateId) -> Reserved<S> {
        match self.cache.entry(aggregate_id.clone()) {
            Entry::Occupied(slot) => match slot.get() {
                Slot::Ready(cached) => Reserved::Ready(cached.state.clone()),
                Slot::Loading { generation, .. } => Reserved::Loading(*generation),
            },
            Entry::Vacant(slot) => {
                let generation = self.generations.fetch_add(1, Ordering::Relaxed);
                slot.insert(Slot::Loading {
                    generation,
                    pending: Vec::new(),
                });
                Reserved::Loading(generation)
            }
        }
    }

    /// 结束一次加载：仍是本次登记时合并暂存事件并写入缓存，否则只返回结果
    fn finish(
        &self,
        aggregate_id: &AggregateId,
        generation: u64,
        history: Vec<Event>,
    ) -> Result<Option<S>> {
        let mut slot = match self.cache.entry(aggregate_id.clone()) {
            Entry::Occupied(slot) => slot,
            Entry::Vacant(_) => return Ok(self.rebuild(aggregate_id, history)?.state),
        };

        let pending = match slot.get_mut() {
            Slot::Ready(cached) => return Ok(cached.state.clone()),
            Slot::Loading {
                generation: g,
                pending,
            } if *g == generation => std::mem::take(pending),
            Slot::Loading { .. } => return Ok(self.rebuild(aggregate_id, history)?.state),
        };

        let mut events = history;
        for event in pending {
            if !events.iter().any(|known| same_event(known, &event)) {
                events.push(event);
            }
        }

        match self.rebuild(aggregate_id, events) {
            Ok(cached) => {
                let state = cached.state.clone();
                slot.insert(Slot::Ready(cached));
                Ok(state)
            }
            Err(err) => {
                slot.remove();
                Err(err)
            }
        }
    }

    fn rebuild(&self, aggregate_id: &AggregateId, events: Vec<Event>) -> Result<Cached<S>> {
        let events = self.ordering.sorted(events);
        let state = self.accumulator.replay(&events)?;
        debug!(
            aggregate_id = %aggregate_id,
            events = events.len(),
            "state rebuilt from history"
        );
        Ok(Cached {
            state,
            applied: events.iter().filter_map(Event::processing_id).collect(),
            last: events.last().map(|event| self.causal_key(event)),
        })
    }
}

#[async_trait]
impl<S> EventHandler for CachingStateRepository<S>
where
    S: Clone + Send + Sync + 'static,
{
    fn handler_name(&self) -> &str {
        &self.handler_name
    }

    fn handled_event_type(&self) -> HandledEventType {
        HandledEventType::Many(self.registry.event_types_of(&self.aggregate_type))
    }

    async fn handle(&self, event: &Event) -> anyhow::Result<()> {
        self.apply(event)?;
        Ok(())
    }
}
