use serde::{Deserialize, Serialize};
use std::fmt;

/// 事件特征集合：`INITIAL`（创建聚合）/ `TERMINAL`（终结聚合）
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventCharacteristics {
    initial: bool,
    terminal: bool,
}

impl EventCharacteristics {
    pub const NONE: Self = Self {
        initial: false,
        terminal: false,
    };
    pub const INITIAL: Self = Self {
        initial: true,
        terminal: false,
    };
    pub const TERMINAL: Self = Self {
        initial: false,
        terminal: true,
    };

    pub fn is_initial(&self) -> bool {
        self.initial
    }

    pub fn is_terminal(&self) -> bool {
        self.terminal
    }

    pub fn union(self, other: Self) -> Self {
        Self {
            initial: self.initial || other.initial,
            terminal: self.terminal || other.terminal,
        }
    }
}

impl fmt::Display for EventCharacteristics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.initial, self.terminal) {
            (false, false) => f.write_str("[]"),
            (true, false) => f.write_str("[INITIAL]"),
            (false, true) => f.write_str("[TERMINAL]"),
            (true, true) => f.write_str("[INITIAL, TERMINAL]"),
        }
    }
}
