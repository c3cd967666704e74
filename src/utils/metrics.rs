
//! Control-loop metrics shared between the loop thread and the status query.
//!
//! Plain atomic counters: the loop thread is the only writer, readers take a
//! relaxed snapshot. No locks on the tick path.

use serde::Serialize;
use std::{
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

#[derive(Debug, Default)]
pub struct LoopStats {
    ticks: AtomicU64,
    command_failures: AtomicU64,
    overruns: AtomicU64,
    last_tick_us: AtomicU64,
    max_tick_us: AtomicU64,
}

/// Point-in-time copy of [`LoopStats`], serialized into the status reply.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LoopStatsSnapshot {
    pub ticks: u64,
    pub command_failures: u64,
    pub overruns: u64,
    pub last_tick_us: u64,
    pub max_tick_us: u64,
}

pub type SharedStats = Arc<LoopStats>;

impl LoopStats {
    pub fn new_shared() -> SharedStats {
        Arc::new(Self::default())
    }

    /// Records one finished tick: its execution time and how many commands failed.
    pub fn record_tick(&self, exec: Duration, failures: u64, period: Duration) {
        let exec_us = exec.as_micros() as u64;
        self.ticks.fetch_add(1, Ordering::Relaxed);
        self.command_failures.fetch_add(failures, Ordering::Relaxed);
        self.last_tick_us.store(exec_us, Ordering::Relaxed);
        self.max_tick_us.fetch_max(exec_us, Ordering::Relaxed);
        if exec > period {
            self.overruns.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn snapshot(&self) -> LoopStatsSnapshot {
        LoopStatsSnapshot {
            ticks: self.ticks.load(Ordering::Relaxed),
            command_failures: self.command_failures.load(Ordering::Relaxed),
            overruns: self.overruns.load(Ordering::Relaxed),
            last_tick_us: self.last_tick_us.load(Ordering::Relaxed),
            max_tick_us: self.max_tick_us.load(Ordering::Relaxed),
        }
    }
}
