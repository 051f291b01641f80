//! 类型注册表（TypeRegistry）
//!
//! 启动时一次性构建的声明式注册表：事件/命令的 名称+版本 → 元组结构、
//! 因果顺序与事件特征。注册表以显式参数传递给需要它的组件，
//! 并实现 `EventTypeMatcher` / `CommandTypeMatcher` 两个匹配协议。
//!
use crate::{
    causal_order::{CausalOrder, CausalOrdering},
    command::Command,
    domain_event::{Event, EventCharacteristics},
    error::{DomainError, DomainResult as Result},
    identity::{AggregateId, CommandType, EventType, VersionedName},
    timestamp::StreamTimestamp,
    tuple::{TupleSchema, TupleSlot, TupleValue},
};
use std::collections::HashMap;
use std::sync::Arc;

/// 事件类型匹配：是否认识该 名称+版本，以及按哪个结构解释
pub trait EventTypeMatcher: Send + Sync {
    fn match_event_type(&self, event_type: &EventType) -> Option<Arc<TupleSchema>>;

    /// 持久化记录不含特征，读回时由匹配方补齐
    fn characteristics_of(&self, _event_type: &EventType) -> EventCharacteristics {
        EventCharacteristics::NONE
    }
}

/// 命令类型匹配
pub trait CommandTypeMatcher: Send + Sync {
    fn match_command_type(&self, command_type: &CommandType) -> Option<Arc<TupleSchema>>;
}

impl<T> EventTypeMatcher for Arc<T>
where
    T: EventTypeMatcher + ?Sized,
{
    fn match_event_type(&self, event_type: &EventType) -> Option<Arc<TupleSchema>> {
        (**self).match_event_type(event_type)
    }

    fn characteristics_of(&self, event_type: &EventType) -> EventCharacteristics {
        (**self).characteristics_of(event_type)
    }
}

impl<T> CommandTypeMatcher for Arc<T>
where
    T: CommandTypeMatcher + ?Sized,
{
    fn match_command_type(&self, command_type: &CommandType) -> Option<Arc<TupleSchema>> {
        (**self).match_command_type(command_type)
    }
}

/// 事件注册项
#[derive(Debug, Clone)]
pub struct EventDefinition {
    event_type: EventType,
    schema: Arc<TupleSchema>,
    characteristics: EventCharacteristics,
    order: Option<i32>,
}

impl EventDefinition {
    /// 结构名取 `aggregate_type/name_version`
    pub fn of(
        aggregate_type: &str,
        name: VersionedName,
        slots: impl IntoIterator<Item = TupleSlot>,
    ) -> Result<Self> {
        let schema = TupleSchema::of(format!("{aggregate_type}/{name}"), slots)?;
        Ok(Self {
            event_type: EventType::of(aggregate_type, name),
            schema: Arc::new(schema),
            characteristics: EventCharacteristics::NONE,
            order: None,
        })
    }

    pub fn initial(mut self) -> Self {
        self.characteristics = self.characteristics.union(EventCharacteristics::INITIAL);
        self
    }

    pub fn terminal(mut self) -> Self {
        self.characteristics = self.characteristics.union(EventCharacteristics::TERMINAL);
        self
    }

    pub fn ordered(mut self, n: i32) -> Self {
        self.order = Some(n);
        self
    }

    pub fn event_type(&self) -> &EventType {
        &self.event_type
    }

    pub fn schema(&self) -> &Arc<TupleSchema> {
        &self.schema
    }

    pub fn characteristics(&self) -> EventCharacteristics {
        self.characteristics
    }

    /// INITIAL/TERMINAL 优先于显式顺序；都没有时返回 `None`
    pub fn causal_order(&self) -> Option<CausalOrder> {
        if self.characteristics.is_initial() {
            Some(CausalOrder::INITIAL)
        } else if self.characteristics.is_terminal() {
            Some(CausalOrder::TERMINAL)
        } else {
            self.order.map(CausalOrder::ordered)
        }
    }
}

/// 命令注册项
#[derive(Debug, Clone)]
pub struct CommandDefinition {
    command_type: CommandType,
    schema: Arc<TupleSchema>,
    order: Option<i32>,
}

impl CommandDefinition {
    pub fn of(
        aggregate_type: &str,
        name: VersionedName,
        slots: impl IntoIterator<Item = TupleSlot>,
    ) -> Result<Self> {
        let schema = TupleSchema::of(format!("{aggregate_type}/{name}"), slots)?;
        Ok(Self {
            command_type: CommandType::of(aggregate_type, name),
            schema: Arc::new(schema),
            order: None,
        })
    }

    pub fn ordered(mut self, n: i32) -> Self {
        self.order = Some(n);
        self
    }

    pub fn command_type(&self) -> &CommandType {
        &self.command_type
    }

    pub fn schema(&self) -> &Arc<TupleSchema> {
        &self.schema
    }
}

/// 逐条登记定义，每次登记都可能失败，因此不走 `bon` 的一次性 setter
#[derive(Debug, Default)]
pub struct TypeRegistryBuilder {
    events: HashMap<EventType, EventDefinition>,
    commands: HashMap<CommandType, CommandDefinition>,
}

impl TypeRegistryBuilder {
    /// 重复注册同一事件类型视为结构违例
    pub fn event(mut self, definition: EventDefinition) -> Result<Self> {
        let key = definition.event_type.clone();
        if self.events.contains_key(&key) {
            return Err(DomainError::schema_violation(
                definition.schema.name(),
                "event type registered twice",
            ));
        }
        self.events.insert(key, definition);
        Ok(self)
    }

    pub fn command(mut self, definition: CommandDefinition) -> Result<Self> {
        let key = definition.command_type.clone();
        if self.commands.contains_key(&key) {
            return Err(DomainError::schema_violation(
                definition.schema.name(),
                "command type registered twice",
            ));
        }
        self.commands.insert(key, definition);
        Ok(self)
    }

    pub fn build(self) -> TypeRegistry {
        TypeRegistry {
            events: self.events,
            commands: self.commands,
        }
    }
}

/// 构建后只读，可在线程间共享
#[derive(Debug, Default)]
pub struct TypeRegistry {
    events: HashMap<EventType, EventDefinition>,
    commands: HashMap<CommandType, CommandDefinition>,
}

impl TypeRegistry {
    pub fn builder() -> TypeRegistryBuilder {
        TypeRegistryBuilder::default()
    }

    pub fn event_definition(&self, event_type: &EventType) -> Option<&EventDefinition> {
        self.events.get(event_type)
    }

    pub fn command_definition(&self, command_type: &CommandType) -> Option<&CommandDefinition> {
        self.commands.get(command_type)
    }

    /// 某聚合类型下注册的全部事件类型
    pub fn event_types_of(&self, aggregate_type: &str) -> Vec<EventType> {
        let mut types: Vec<EventType> = self
            .events
            .keys()
            .filter(|ty| ty.aggregate_type() == aggregate_type)
            .cloned()
            .collect();
        types.sort();
        types
    }

    pub fn event_ordering(&self) -> CausalOrdering<EventType> {
        CausalOrdering::on_event_types(
            self.events
                .iter()
                .filter_map(|(ty, def)| def.causal_order().map(|order| (ty.clone(), order)))
                .collect(),
        )
    }

    pub fn command_ordering(&self) -> CausalOrdering<CommandType> {
        CausalOrdering::on_command_types(
            self.commands
                .iter()
                .filter_map(|(ty, def)| {
                    def.order
                        .map(|n| (ty.clone(), CausalOrder::ordered(n)))
                })
                .collect(),
        )
    }

    /// 按注册结构构建事件；未注册的类型返回 `UnrecognizedType`
    pub fn event<I, K, V>(
        &self,
        aggregate_id: AggregateId,
        event_timestamp: StreamTimestamp,
        event_name: VersionedName,
        parameters: I,
    ) -> Result<Event>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<TupleValue>,
    {
        let event_type = EventType::of(aggregate_id.aggregate_type(), event_name.clone());
        let Some(definition) = self.events.get(&event_type) else {
            return Err(DomainError::unrecognized_event(event_type));
        };

        Ok(Event::builder()
            .aggregate_id(aggregate_id)
            .event_timestamp(event_timestamp)
            .event_name(event_name)
            .parameters(definition.schema.make(parameters)?)
            .characteristics(definition.characteristics)
            .build())
    }

    pub fn command<I, K, V>(
        &self,
        aggregate_id: AggregateId,
        command_timestamp: StreamTimestamp,
        command_name: VersionedName,
        parameters: I,
    ) -> Result<Command>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<TupleValue>,
    {
        let command_type = CommandType::of(aggregate_id.aggregate_type(), command_name.clone());
        let Some(definition) = self.commands.get(&command_type) else {
            return Err(DomainError::unrecognized_command(command_type));
        };

        Ok(Command::builder()
            .aggregate_id(aggregate_id)
            .command_timestamp(command_timestamp)
            .command_name(command_name)
            .parameters(definition.schema.make(parameters)?)
            .build())
    }

    /// 校验外部构建的事件：类型已注册且参数满足注册结构
    pub fn validate_event(&self, event: &Event) -> Result<()> {
        let event_type = event.event_type();
        let Some(definition) = self.events.get(&event_type) else {
            return Err(DomainError::unrecognized_event(event_type));
        };
        ensure_conforms(event.parameters().schema(), &definition.schema)
    }

    pub fn validate_command(&self, command: &Command) -> Result<()> {
        let command_type = command.command_type();
        let Some(definition) = self.commands.get(&command_type) else {
            return Err(DomainError::unrecognized_command(command_type));
        };
        ensure_conforms(command.parameters().schema(), &definition.schema)
    }
}

fn ensure_conforms(actual: &TupleSchema, expected: &TupleSchema) -> Result<()> {
    if actual == expected {
        Ok(())
    } else {
        Err(DomainError::schema_violation(
            expected.name(),
            format!("parameters built with incompatible schema {actual}"),
        ))
    }
}

impl EventTypeMatcher for TypeRegistry {
    fn match_event_type(&self, event_type: &EventType) -> Option<Arc<TupleSchema>> {
        self.events.get(event_type).map(|def| def.schema.clone())
    }

    fn characteristics_of(&self, event_type: &EventType) -> EventCharacteristics {
        self.events
            .get(event_type)
            .map(|def| def.characteristics)
            .unwrap_or_default()
    }
}

impl CommandTypeMatcher for TypeRegistry {
    fn match_command_type(&self, command_type: &CommandType) -> Option<Arc<TupleSchema>> {
        self.commands.get(command_type).map(|def| def.schema.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tuple::{TupleValue, ValueType};
    use uuid::Uuid;

    fn registry() -> TypeRegistry {
        TypeRegistry::builder()
            .event(
                EventDefinition::of(
                    "user",
                    VersionedName::unversioned("created"),
                    [TupleSlot::of("name", ValueType::Text)],
                )
                .unwrap()
                .initial(),
            )
            .unwrap()
            .event(
                EventDefinition::of(
                    "user",
                    VersionedName::unversioned("renamed"),
                    [TupleSlot::of("name", ValueType::Text)],
                )
                .unwrap()
                .ordered(3),
            )
            .unwrap()
            .event(
                EventDefinition::of("user", VersionedName::unversioned("deleted"), [])
                    .unwrap()
                    .terminal(),
            )
            .unwrap()
            .command(
                CommandDefinition::of(
                    "user",
                    VersionedName::of("rename", "1"),
                    [TupleSlot::of("name", ValueType::Text)],
                )
                .unwrap(),
            )
            .unwrap()
            .build()
    }

    #[test]
    fn builds_events_with_registered_schema_and_characteristics() {
        let registry = registry();
        let id = AggregateId::of("user", Uuid::new_v4());
        let event = registry
            .event(
                id.clone(),
                StreamTimestamp::now("t"),
                VersionedName::unversioned("created"),
                [("name", "Ann")],
            )
            .unwrap();
        assert!(event.is_initial());
        assert_eq!(event.parameters().get_value("name"), Some(&TupleValue::from("Ann")));
        assert!(registry.validate_event(&event).is_ok());
    }

    #[test]
    fn unknown_names_and_versions_are_unrecognized() {
        let registry = registry();
        let id = AggregateId::of("user", Uuid::new_v4());
        let err = registry
            .event(
                id.clone(),
                StreamTimestamp::now("t"),
                VersionedName::of("created", "9"),
                [("name", "Ann")],
            )
            .unwrap_err();
        assert!(matches!(err, DomainError::UnrecognizedType { kind: "event", .. }));

        let err = registry
            .command(
                id,
                StreamTimestamp::now("t"),
                VersionedName::unversioned("rename"),
                [("name", "Bea")],
            )
            .unwrap_err();
        assert!(matches!(err, DomainError::UnrecognizedType { kind: "command", .. }));
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let def = EventDefinition::of("user", VersionedName::unversioned("created"), []).unwrap();
        let err = TypeRegistry::builder()
            .event(def.clone())
            .unwrap()
            .event(def)
            .unwrap_err();
        assert!(matches!(err, DomainError::SchemaViolation { .. }));
    }

    #[test]
    fn ordering_reflects_registration() {
        let registry = registry();
        let id = AggregateId::of("user", Uuid::new_v4());
        let at = StreamTimestamp::now("t");
        let deleted = registry
            .event(
                id.clone(),
                at.clone(),
                VersionedName::unversioned("deleted"),
                Vec::<(&str, TupleValue)>::new(),
            )
            .unwrap();
        let renamed = registry
            .event(
                id.clone(),
                at.clone(),
                VersionedName::unversioned("renamed"),
                [("name", "Bea")],
            )
            .unwrap();
        let created = registry
            .event(id, at, VersionedName::unversioned("created"), [("name", "Ann")])
            .unwrap();

        let sorted = registry
            .event_ordering()
            .sorted(vec![deleted, renamed, created]);
        let names: Vec<&str> = sorted.iter().map(|e| e.event_name().name()).collect();
        assert_eq!(names, vec!["created", "renamed", "deleted"]);
    }

    #[test]
    fn matcher_resolves_schemas() {
        let registry = registry();
        let ty = EventType::of("user", VersionedName::unversioned("renamed"));
        let schema = registry.match_event_type(&ty).unwrap();
        assert_eq!(schema.name(), "user/renamed_0");
        assert!(registry
            .match_event_type(&EventType::of("order", VersionedName::unversioned("renamed")))
            .is_none());
    }
}
