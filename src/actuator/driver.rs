//! driver.rs
//! Channel-addressed servo driver interface.
//!
//! The serial link is treated as synchronous and fallible per call: every
//! operation returns its own `Result`, so callers decide which failures are
//! fatal (startup) and which are only reported (control-loop ticks).

use serde::{Deserialize, Serialize};

use crate::utils::error::BusError;

/// Lowest target the command layer will ever transmit (quarter-microseconds).
pub const TARGET_MIN: u16 = 4000;
/// Highest target the command layer will ever transmit.
pub const TARGET_MAX: u16 = 8000;
/// Neutral pulse: centered joint, stopped continuous-rotation wheel.
pub const NEUTRAL: u16 = 6000;

/// Clamps any integer into `[TARGET_MIN, TARGET_MAX]`.
#[inline]
pub fn clamp_target(value: i64) -> u16 {
    value.clamp(TARGET_MIN as i64, TARGET_MAX as i64) as u16
}

/// Per-channel limits applied once at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServoConfig {
    /// 0 = unlimited.
    pub speed: u16,
    /// 0 = unlimited.
    pub accel: u16,
    pub min: u16,
    pub max: u16,
}

impl Default for ServoConfig {
    fn default() -> Self {
        Self { speed: 0, accel: 0, min: TARGET_MIN, max: TARGET_MAX }
    }
}

/// One servo controller on one serial bus.
///
/// Implementations are not required to be thread-safe; sharing goes through
/// [`crate::actuator::bus::BusHandle`], which serializes every call.
pub trait ServoBus: Send {
    fn set_target(&mut self, channel: u8, target: u16) -> Result<(), BusError>;

    fn set_speed(&mut self, channel: u8, speed: u16) -> Result<(), BusError>;

    fn set_accel(&mut self, channel: u8, accel: u16) -> Result<(), BusError>;

    /// Travel limits; subsequent targets on `channel` are clamped into `[min, max]`.
    fn set_range(&mut self, channel: u8, min: u16, max: u16) -> Result<(), BusError>;

    fn get_position(&mut self, channel: u8) -> Result<u16, BusError>;

    fn is_moving(&mut self, channel: u8) -> Result<bool, BusError>;

    /// True while any channel is still moving toward its target.
    fn get_moving_state(&mut self) -> Result<bool, BusError>;

    fn close(&mut self) -> Result<(), BusError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamp_target_bounds() {
        assert_eq!(clamp_target(9000), TARGET_MAX);
        assert_eq!(clamp_target(-5), TARGET_MIN);
        assert_eq!(clamp_target(6123), 6123);
    }
}
