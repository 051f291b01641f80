use crate::{domain_event::Event, error::DomainResult as Result};
use std::sync::Arc;

type InitialHandler<S> = dyn Fn(&Event) -> Result<S> + Send + Sync;
type Mutator<S> = dyn Fn(&Event, &mut S) -> Result<()> + Send + Sync;

/// 状态累积器：初始事件处理函数 + 变更函数
///
/// 不做任何重排，调用方需按因果顺序提供事件。
pub struct Accumulator<S> {
    initial: Arc<InitialHandler<S>>,
    mutator: Arc<Mutator<S>>,
}

impl<S> Clone for Accumulator<S> {
    fn clone(&self) -> Self {
        Self {
            initial: self.initial.clone(),
            mutator: self.mutator.clone(),
        }
    }
}

impl<S> Accumulator<S> {
    pub fn new<I, M>(initial: I, mutator: M) -> Self
    where
        I: Fn(&Event) -> Result<S> + Send + Sync + 'static,
        M: Fn(&Event, &mut S) -> Result<()> + Send + Sync + 'static,
    {
        Self {
            initial: Arc::new(initial),
            mutator: Arc::new(mutator),
        }
    }

    /// 单步折叠：尚无状态时走初始处理，否则走变更
    pub fn fold(&self, state: &mut Option<S>, event: &Event) -> Result<()> {
        match state {
            Some(current) => (self.mutator)(event, current),
            None => {
                *state = Some((self.initial)(event)?);
                Ok(())
            }
        }
    }

    pub fn state_builder(&self) -> StateBuilder<S> {
        StateBuilder {
            accumulator: self.clone(),
            state: None,
        }
    }

    /// 从已有快照继续构建
    pub fn resume(&self, snapshot: Option<S>) -> StateBuilder<S> {
        StateBuilder {
            accumulator: self.clone(),
            state: snapshot,
        }
    }

    /// 从头重放一段有序历史
    pub fn replay<'e>(&self, events: impl IntoIterator<Item = &'e Event>) -> Result<Option<S>> {
        self.update(None, events)
    }

    /// 在快照上折叠新事件，与完整重放代数一致
    pub fn update<'e>(
        &self,
        snapshot: Option<S>,
        events: impl IntoIterator<Item = &'e Event>,
    ) -> Result<Option<S>> {
        let mut builder = self.resume(snapshot);
        for event in events {
            builder.accept(event)?;
        }
        Ok(builder.into_state())
    }
}

pub struct StateBuilder<S> {
    accumulator: Accumulator<S>,
    state: Option<S>,
}

impl<S> StateBuilder<S> {
    pub fn accept(&mut self, event: &Event) -> Result<()> {
        self.accumulator.fold(&mut self.state, event)
    }

    /// 尚未接收任何事件时为 `None`
    pub fn get(&self) -> Option<&S> {
        self.state.as_ref()
    }

    pub fn into_state(self) -> Option<S> {
        self.state
    }
}
