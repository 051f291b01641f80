//! 流时间戳（StreamTimestamp）
//!
//! 事件的业务时间：流标识 + 时间点。可派生子流 `stream/child`，
//! 使因果相关的事件无需协调即可归属到同一来源。
//!
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// 排序规则：先按 `stream_id` 字典序，再按 `timestamp`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StreamTimestamp {
    stream_id: String,
    timestamp: DateTime<Utc>,
}

impl StreamTimestamp {
    pub fn of(stream_id: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            stream_id: stream_id.into(),
            timestamp,
        }
    }

    pub fn now(stream_id: impl Into<String>) -> Self {
        Self::of(stream_id, Utc::now())
    }

    pub fn stream_id(&self) -> &str {
        &self.stream_id
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// 派生子流，时间点保持不变
    pub fn sub_stream(&self, child: &str) -> Self {
        Self {
            stream_id: format!("{}/{}", self.stream_id, child),
            timestamp: self.timestamp,
        }
    }

    pub fn with_timestamp(&self, timestamp: DateTime<Utc>) -> Self {
        Self {
            stream_id: self.stream_id.clone(),
            timestamp,
        }
    }
}

impl fmt::Display for StreamTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.stream_id, self.timestamp.to_rfc3339())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[test]
    fn orders_by_stream_then_time() {
        let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let a_late = StreamTimestamp::of("a", t0 + Duration::seconds(10));
        let b_early = StreamTimestamp::of("b", t0);
        let a_early = StreamTimestamp::of("a", t0);

        let mut all = vec![b_early.clone(), a_late.clone(), a_early.clone()];
        all.sort();
        assert_eq!(all, vec![a_early, a_late, b_early]);
    }

    #[test]
    fn sub_stream_keeps_timestamp() {
        let parent = StreamTimestamp::now("import");
        let child = parent.sub_stream("row-7");
        assert_eq!(child.stream_id(), "import/row-7");
        assert_eq!(child.timestamp(), parent.timestamp());
    }
}
