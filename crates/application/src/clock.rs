use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, Utc};
use domain::Timestamp;

/// 消息创建时间的来源
pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;
}

#[derive(Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Utc::now()
    }
}

/// 从固定起点开始，每次读取前进一秒
///
/// 创建时间严格递增，适合需要确定排序的场景。
#[derive(Debug)]
pub struct SteppingClock {
    origin: i64,
    ticks: AtomicI64,
}

impl SteppingClock {
    pub fn starting_at(origin: Timestamp) -> Self {
        Self {
            origin: origin.timestamp(),
            ticks: AtomicI64::new(0),
        }
    }
}

impl Default for SteppingClock {
    fn default() -> Self {
        Self {
            origin: 1_700_000_000,
            ticks: AtomicI64::new(0),
        }
    }
}

impl Clock for SteppingClock {
    fn now(&self) -> Timestamp {
        let tick = self.ticks.fetch_add(1, Ordering::SeqCst);
        DateTime::from_timestamp(self.origin.saturating_add(tick), 0).unwrap_or_else(Utc::now)
    }
}
