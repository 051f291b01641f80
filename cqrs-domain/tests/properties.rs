use chrono::{Duration, TimeZone, Utc};
use cqrs_domain::catalogue::{AggregateCatalogue, InMemoryAggregateCatalogue};
use cqrs_domain::causal_order::{CausalOrder, CausalOrdering};
use cqrs_domain::domain_event::{Event, EventCharacteristics};
use cqrs_domain::error::DomainError;
use cqrs_domain::identity::{AggregateId, EventType, VersionedName};
use cqrs_domain::state::Accumulator;
use cqrs_domain::timestamp::StreamTimestamp;
use cqrs_domain::tuple::{TupleSchema, TupleSlot, TupleValue, ValueType};
use proptest::prelude::*;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use uuid::Uuid;

// ============================================================================
// 元组
// ============================================================================

fn slot_value() -> impl Strategy<Value = (ValueType, TupleValue)> {
    prop_oneof![
        any::<i64>().prop_map(|v| (ValueType::Integer, TupleValue::Integer(v))),
        any::<bool>().prop_map(|v| (ValueType::Boolean, TupleValue::Boolean(v))),
        "[a-z]{0,8}".prop_map(|v| (ValueType::Text, TupleValue::Text(v))),
        proptest::option::of(any::<i64>()).prop_map(|v| (
            ValueType::optional(ValueType::Integer),
            TupleValue::from(v)
        )),
    ]
}

/// 槽位名互不相同的结构 + 与之匹配的值（值按槽位名排序）
fn schema_and_values() -> impl Strategy<Value = (Arc<TupleSchema>, Vec<(String, TupleValue)>)> {
    prop::collection::btree_map("[a-z]{1,6}", slot_value(), 1..8).prop_map(|slots| {
        let schema = TupleSchema::of(
            "generated",
            slots
                .iter()
                .map(|(name, (ty, _))| TupleSlot::of(name.clone(), ty.clone())),
        )
        .unwrap();
        let values = slots.into_iter().map(|(name, (_, v))| (name, v)).collect();
        (Arc::new(schema), values)
    })
}

proptest! {
    #[test]
    fn positional_values_round_trip_through_keys((schema, values) in schema_and_values()) {
        let tuple = schema
            .make_with(values.iter().map(|(_, v)| v.clone()).collect())
            .unwrap();
        for (name, value) in &values {
            let key = schema.get_key::<TupleValue>(name).unwrap();
            prop_assert_eq!(&tuple.get(&key).unwrap(), value);
        }
        let again = schema.from_json(&tuple.to_json()).unwrap();
        prop_assert_eq!(again, tuple);
    }

    #[test]
    fn wrong_arity_is_a_schema_violation((schema, values) in schema_and_values(), extra in any::<bool>()) {
        let mut values: Vec<TupleValue> = values.into_iter().map(|(_, v)| v).collect();
        if extra {
            values.push(TupleValue::Boolean(true));
        } else {
            values.pop();
        }
        let is_violation = matches!(schema.make_with(values), Err(DomainError::SchemaViolation { .. }));
        prop_assert!(is_violation);
    }

    #[test]
    fn mistyped_values_are_a_schema_violation(
        (schema, values) in schema_and_values(),
        index in any::<prop::sample::Index>(),
    ) {
        let mut values: Vec<TupleValue> = values.into_iter().map(|(_, v)| v).collect();
        let i = index.index(values.len());
        // 浮点值不可赋值给任何生成的槽位类型
        values[i] = TupleValue::Float(0.5);
        let is_violation = matches!(schema.make_with(values), Err(DomainError::SchemaViolation { .. }));
        prop_assert!(is_violation);
    }
}

// ============================================================================
// 因果排序
// ============================================================================

const KINDS: [&str; 5] = ["opened", "first", "second", "unordered", "closed"];

fn ordering() -> CausalOrdering<EventType> {
    let ty = |name: &str| EventType::of("ticket", VersionedName::unversioned(name));
    CausalOrdering::on_event_types(HashMap::from([
        (ty("first"), CausalOrder::ordered(1)),
        (ty("second"), CausalOrder::ordered(2)),
    ]))
}

fn ticket_event(kind: usize, seconds: i64) -> Event {
    let name = KINDS[kind];
    let characteristics = match name {
        "opened" => EventCharacteristics::INITIAL,
        "closed" => EventCharacteristics::TERMINAL,
        _ => EventCharacteristics::NONE,
    };
    let schema = Arc::new(TupleSchema::of(name, []).unwrap());
    let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    Event::builder()
        .aggregate_id(AggregateId::of("ticket", Uuid::nil()))
        .event_timestamp(StreamTimestamp::of("s", t0 + Duration::seconds(seconds)))
        .event_name(VersionedName::unversioned(name))
        .parameters(schema.make_with(vec![]).unwrap())
        .characteristics(characteristics)
        .build()
}

fn rank(event: &Event) -> usize {
    KINDS
        .iter()
        .position(|k| *k == event.event_name().name())
        .unwrap_or(usize::MAX)
}

proptest! {
    #[test]
    fn causal_sort_respects_declared_order(
        raw in prop::collection::vec((0..KINDS.len(), -100i64..100), 0..30)
    ) {
        let events: Vec<Event> = raw.iter().map(|(k, s)| ticket_event(*k, *s)).collect();
        let sorted = ordering().sorted(events);

        for pair in sorted.windows(2) {
            let (a, b) = (&pair[0], &pair[1]);
            prop_assert!(rank(a) <= rank(b));
            if rank(a) == rank(b) {
                prop_assert!(a.event_timestamp() <= b.event_timestamp());
            }
        }
    }
}

// ============================================================================
// 快照 / 重放一致性
// ============================================================================

fn amount_event(index: usize, amount: i64) -> Event {
    let schema = Arc::new(
        TupleSchema::of("account/moved_0", [TupleSlot::of("amount", ValueType::Integer)]).unwrap(),
    );
    Event::builder()
        .aggregate_id(AggregateId::of("account", Uuid::nil()))
        .event_timestamp(StreamTimestamp::now("acc"))
        .event_name(VersionedName::unversioned(if index == 0 { "opened" } else { "moved" }))
        .parameters(schema.make_with(vec![amount.into()]).unwrap())
        .build()
}

fn balance() -> Accumulator<(i64, Vec<i64>)> {
    let schema = Arc::new(
        TupleSchema::of("account/moved_0", [TupleSlot::of("amount", ValueType::Integer)]).unwrap(),
    );
    let key = schema.get_key::<i64>("amount").unwrap();
    let mutate_key = key.clone();
    Accumulator::new(
        move |event: &Event| {
            let opening = event.parameters().get(&key)?;
            Ok((opening, vec![opening]))
        },
        move |event: &Event, state: &mut (i64, Vec<i64>)| {
            let amount = event.parameters().get(&mutate_key)?;
            // 非交换的折叠：顺序错误会改变结果
            state.0 = state.0.wrapping_mul(3).wrapping_add(amount);
            state.1.push(amount);
            Ok(())
        },
    )
}

proptest! {
    #[test]
    fn replay_equals_update_from_any_snapshot(
        amounts in prop::collection::vec(-1000i64..1000, 0..20),
        split in any::<prop::sample::Index>(),
    ) {
        let events: Vec<Event> = amounts
            .iter()
            .enumerate()
            .map(|(i, a)| amount_event(i, *a))
            .collect();
        let k = split.index(events.len() + 1);
        let acc = balance();

        let full = acc.replay(&events).unwrap();
        let snapshot = acc.replay(&events[..k]).unwrap();
        prop_assert_eq!(acc.update(snapshot, &events[k..]).unwrap(), full);
    }
}

// ============================================================================
// 聚合目录
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn concurrent_distinct_adds_are_never_lost(threads in 2usize..8, per_thread in 1usize..50) {
        let catalogue = Arc::new(InMemoryAggregateCatalogue::new());
        let handles: Vec<_> = (0..threads)
            .map(|_| {
                let catalogue = catalogue.clone();
                std::thread::spawn(move || {
                    let ids: Vec<Uuid> = (0..per_thread).map(|_| Uuid::new_v4()).collect();
                    for id in &ids {
                        catalogue.add("order", *id);
                    }
                    // 移除一半，留下另一半
                    for id in ids.iter().step_by(2) {
                        catalogue.remove("order", *id);
                    }
                    ids.into_iter().skip(1).step_by(2).collect::<Vec<_>>()
                })
            })
            .collect();

        let mut expected = HashSet::new();
        for handle in handles {
            expected.extend(handle.join().unwrap());
        }
        prop_assert_eq!(catalogue.get_ids("order"), expected);
    }
}
