//! simulated.rs
//! In-memory servo bus: records every command, can inject faults.
//!
//! Clones share state, so a test can keep one handle for inspection while
//! another is boxed behind the shared bus.

use parking_lot::Mutex;
use std::{collections::HashMap, sync::Arc};

use crate::actuator::driver::ServoBus;
use crate::actuator::maestro::MAX_CHANNELS;
use crate::utils::error::BusError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusCommand {
    Target { channel: u8, target: u16 },
    Speed { channel: u8, speed: u16 },
    Accel { channel: u8, accel: u16 },
    Range { channel: u8, min: u16, max: u16 },
    Close,
}

#[derive(Debug, Default)]
struct SimState {
    log: Vec<BusCommand>,
    positions: HashMap<u8, u16>,
    ranges: HashMap<u8, (u16, u16)>,
    // Remaining forced failures per channel.
    faults: HashMap<u8, u32>,
    fault_rate: f64,
    // Polls that still report "moving" after the last target write.
    settle_polls: u32,
    pending_polls: u32,
    closed: bool,
}

#[derive(Debug, Clone, Default)]
pub struct SimulatedBus {
    state: Arc<Mutex<SimState>>,
}

impl SimulatedBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every command fails independently with probability `rate`.
    pub fn with_fault_rate(rate: f64) -> Self {
        let bus = Self::new();
        bus.state.lock().fault_rate = rate.clamp(0.0, 1.0);
        bus
    }

    /// After each target write, report "moving" for this many polls.
    pub fn with_settle_polls(self, polls: u32) -> Self {
        self.state.lock().settle_polls = polls;
        self
    }

    /// Fail the next `count` commands addressed to `channel`.
    pub fn fail_next(&self, channel: u8, count: u32) {
        *self.state.lock().faults.entry(channel).or_insert(0) += count;
    }

    pub fn commands(&self) -> Vec<BusCommand> {
        self.state.lock().log.clone()
    }

    pub fn clear(&self) {
        self.state.lock().log.clear();
    }

    /// Targets written to `channel`, oldest first.
    pub fn targets_for(&self, channel: u8) -> Vec<u16> {
        self.state
            .lock()
            .log
            .iter()
            .filter_map(|cmd| match *cmd {
                BusCommand::Target { channel: ch, target } if ch == channel => Some(target),
                _ => None,
            })
            .collect()
    }

    pub fn last_target(&self, channel: u8) -> Option<u16> {
        self.targets_for(channel).last().copied()
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    fn check(state: &mut SimState, channel: u8) -> Result<(), BusError> {
        if state.closed {
            return Err(BusError::Closed);
        }
        if channel as usize >= MAX_CHANNELS {
            return Err(BusError::InvalidChannel(channel));
        }
        if let Some(left) = state.faults.get_mut(&channel) {
            if *left > 0 {
                *left -= 1;
                return Err(BusError::Injected(channel));
            }
        }
        if state.fault_rate > 0.0 && rand::random_bool(state.fault_rate) {
            return Err(BusError::Injected(channel));
        }
        Ok(())
    }
}

impl ServoBus for SimulatedBus {
    fn set_target(&mut self, channel: u8, target: u16) -> Result<(), BusError> {
        let mut s = self.state.lock();
        Self::check(&mut s, channel)?;
        let target = match s.ranges.get(&channel) {
            Some(&(min, max)) => target.clamp(min, max),
            None => target,
        };
        s.positions.insert(channel, target);
        s.pending_polls = s.settle_polls;
        s.log.push(BusCommand::Target { channel, target });
        Ok(())
    }

    fn set_speed(&mut self, channel: u8, speed: u16) -> Result<(), BusError> {
        let mut s = self.state.lock();
        Self::check(&mut s, channel)?;
        s.log.push(BusCommand::Speed { channel, speed });
        Ok(())
    }

    fn set_accel(&mut self, channel: u8, accel: u16) -> Result<(), BusError> {
        let mut s = self.state.lock();
        Self::check(&mut s, channel)?;
        s.log.push(BusCommand::Accel { channel, accel });
        Ok(())
    }

    fn set_range(&mut self, channel: u8, min: u16, max: u16) -> Result<(), BusError> {
        let mut s = self.state.lock();
        Self::check(&mut s, channel)?;
        s.ranges.insert(channel, (min.min(max), max.max(min)));
        s.log.push(BusCommand::Range { channel, min, max });
        Ok(())
    }

    fn get_position(&mut self, channel: u8) -> Result<u16, BusError> {
        let mut s = self.state.lock();
        Self::check(&mut s, channel)?;
        Ok(s.positions.get(&channel).copied().unwrap_or(0))
    }

    fn is_moving(&mut self, channel: u8) -> Result<bool, BusError> {
        let mut s = self.state.lock();
        Self::check(&mut s, channel)?;
        Ok(Self::poll(&mut s))
    }

    fn get_moving_state(&mut self) -> Result<bool, BusError> {
        let mut s = self.state.lock();
        if s.closed {
            return Err(BusError::Closed);
        }
        Ok(Self::poll(&mut s))
    }

    fn close(&mut self) -> Result<(), BusError> {
        let mut s = self.state.lock();
        if !s.closed {
            s.closed = true;
            s.log.push(BusCommand::Close);
        }
        Ok(())
    }
}

impl SimulatedBus {
    fn poll(state: &mut SimState) -> bool {
        if state.pending_polls > 0 {
            state.pending_polls -= 1;
            true
        } else {
            false
        }
    }
}
