//! bus.rs
//! Shared, serialized access to the single servo controller.
//!
//! The serial bus cannot multiplex, so every caller (control loop, stop,
//! home, manual helpers) goes through one `parking_lot::Mutex`. Multi-command
//! batches take the lock once via [`BusHandle::batch`] so a tick is never
//! interleaved with a manual command.

use parking_lot::Mutex;
use std::sync::Arc;

use crate::actuator::driver::{ServoBus, ServoConfig, clamp_target};
use crate::utils::error::{Result, RobotError};

#[derive(Clone)]
pub struct BusHandle {
    inner: Arc<Mutex<Box<dyn ServoBus>>>,
}

/// Locked view of the bus for the duration of one batch.
pub struct BusBatch<'a> {
    bus: &'a mut dyn ServoBus,
}

impl BusBatch<'_> {
    /// Clamps into the legal target range, then writes.
    pub fn set_target(&mut self, channel: u8, target: u16) -> Result<()> {
        self.bus
            .set_target(channel, clamp_target(target as i64))
            .map_err(|e| RobotError::command(channel, e))
    }
}

impl BusHandle {
    pub fn new<B: ServoBus + 'static>(bus: B) -> Self {
        Self { inner: Arc::new(Mutex::new(Box::new(bus))) }
    }

    /// Runs `f` with the bus locked once.
    pub fn batch<R>(&self, f: impl FnOnce(&mut BusBatch<'_>) -> R) -> R {
        let mut guard = self.inner.lock();
        let mut batch = BusBatch { bus: &mut **guard };
        f(&mut batch)
    }

    pub fn set_target(&self, channel: u8, target: u16) -> Result<()> {
        self.batch(|b| b.set_target(channel, target))
    }

    pub fn set_speed(&self, channel: u8, speed: u16) -> Result<()> {
        self.inner.lock().set_speed(channel, speed).map_err(|e| RobotError::command(channel, e))
    }

    pub fn set_accel(&self, channel: u8, accel: u16) -> Result<()> {
        self.inner.lock().set_accel(channel, accel).map_err(|e| RobotError::command(channel, e))
    }

    pub fn set_range(&self, channel: u8, min: u16, max: u16) -> Result<()> {
        self.inner
            .lock()
            .set_range(channel, min, max)
            .map_err(|e| RobotError::command(channel, e))
    }

    /// Applies accel, speed and range in one locked batch.
    pub fn configure(&self, channel: u8, config: &ServoConfig) -> Result<()> {
        let mut bus = self.inner.lock();
        bus.set_accel(channel, config.accel).map_err(|e| RobotError::command(channel, e))?;
        bus.set_speed(channel, config.speed).map_err(|e| RobotError::command(channel, e))?;
        bus.set_range(channel, config.min, config.max)
            .map_err(|e| RobotError::command(channel, e))
    }

    pub fn get_position(&self, channel: u8) -> Result<u16> {
        self.inner.lock().get_position(channel).map_err(|e| RobotError::command(channel, e))
    }

    pub fn is_moving(&self, channel: u8) -> Result<bool> {
        self.inner.lock().is_moving(channel).map_err(|e| RobotError::command(channel, e))
    }

    pub fn get_moving_state(&self) -> Result<bool> {
        Ok(self.inner.lock().get_moving_state()?)
    }

    pub fn close(&self) -> Result<()> {
        Ok(self.inner.lock().close()?)
    }
}
