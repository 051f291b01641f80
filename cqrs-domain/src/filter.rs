//! 过滤器组合（Filter Composition）
//!
//! 管道阶段 `T` 的过滤器是变换 `T -> T`：前置过滤在委托前观察/修改，
//! 后置过滤在委托后观察/修改，完整拦截器两者兼有。
//! `compose` 自左向右折叠，列表中第一个过滤器位于最外层。
//!
//! 过滤器链只能由一个有序列表组合而成：把已组合的链再次传入
//! `compose` 会返回 `FilterComposition` 错误。
//!
//! 事件总线、事件批次、事件日志、事件发布器与命令执行器的过滤器
//! 都遵循同一组合规则。
//!
use crate::error::{DomainError, DomainResult as Result};
use std::fmt;
use std::sync::Arc;

pub struct Filter<T> {
    apply: Arc<dyn Fn(T) -> T + Send + Sync>,
    /// 链中过滤器的数量；单个过滤器为 `None`
    chain_len: Option<usize>,
}

impl<T> Filter<T> {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(T) -> T + Send + Sync + 'static,
    {
        Self {
            apply: Arc::new(f),
            chain_len: None,
        }
    }

    pub fn apply(&self, target: T) -> T {
        (self.apply)(target)
    }

    pub fn is_chain(&self) -> bool {
        self.chain_len.is_some()
    }
}

impl<T: 'static> Filter<T> {
    pub fn identity() -> Self {
        Self::new(|target| target)
    }
}

impl<T> Clone for Filter<T> {
    fn clone(&self) -> Self {
        Self {
            apply: self.apply.clone(),
            chain_len: self.chain_len,
        }
    }
}

impl<T> fmt::Debug for Filter<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.chain_len {
            Some(len) => write!(f, "Filter(chain of {len})"),
            None => f.write_str("Filter"),
        }
    }
}

/// 组合过滤器：`compose([f1, f2, f3]).apply(t) == f1(f2(f3(t)))`
pub fn compose<T, I>(filters: I) -> Result<Filter<T>>
where
    T: 'static,
    I: IntoIterator<Item = Filter<T>>,
{
    let filters: Vec<Filter<T>> = filters.into_iter().collect();

    if let Some(chain) = filters.iter().find(|f| f.is_chain()) {
        return Err(DomainError::FilterComposition {
            reason: format!(
                "cannot merge an already composed {chain:?}; compose from a single ordered list"
            ),
        });
    }

    let len = filters.len();
    Ok(Filter {
        apply: Arc::new(move |target| {
            filters
                .iter()
                .rev()
                .fold(target, |inner, filter| filter.apply(inner))
        }),
        chain_len: Some(len),
    })
}
