//! body.rs
//! Named joint commands and full-body helpers over the shared bus.
//!
//! Every helper is a short, ordered batch of target writes. The blocking ones
//! (`home`, `smooth_move`, `wait`, `wait_all`) sleep on the caller's thread and
//! must stay off the control-loop tick.

use log::{debug, info, warn};
use spin_sleep::{SpinSleeper, SpinStrategy};
use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use crate::actuator::{
    bus::BusHandle,
    driver::{NEUTRAL, ServoConfig, clamp_target},
};
use crate::motion::joints::{self, JointRegistry};
use crate::utils::error::{Result, RobotError};

pub const GRIPPER_OPEN: u16 = 7000;
pub const GRIPPER_CLOSED: u16 = 5000;
pub const DEFAULT_SETTLE: Duration = Duration::from_secs(1);
pub const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_secs(5);
const POLL_INTERVAL: Duration = Duration::from_millis(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Left,
    Right,
}

impl Side {
    fn prefix(self) -> &'static str {
        match self {
            Side::Left => "l",
            Side::Right => "r",
        }
    }
}

fn sleeper() -> SpinSleeper {
    SpinSleeper::new(100_000).with_spin_strategy(SpinStrategy::YieldThread)
}

#[derive(Clone)]
pub struct Robot {
    registry: Arc<JointRegistry>,
    bus: BusHandle,
    settle: Duration,
    wait_timeout: Duration,
}

impl Robot {
    pub fn new(registry: Arc<JointRegistry>, bus: BusHandle) -> Self {
        Self {
            registry,
            bus,
            settle: DEFAULT_SETTLE,
            wait_timeout: DEFAULT_WAIT_TIMEOUT,
        }
    }

    pub fn with_timing(mut self, settle: Duration, wait_timeout: Duration) -> Self {
        self.settle = settle;
        self.wait_timeout = wait_timeout;
        self
    }

    pub fn registry(&self) -> &JointRegistry {
        &self.registry
    }

    pub fn bus(&self) -> &BusHandle {
        &self.bus
    }

    // ====================================================================
    // Core movement
    // ====================================================================

    pub fn move_joint(&self, joint: &str, target: u16) -> Result<()> {
        let channel = self.registry.resolve(joint)?;
        self.bus.set_target(channel, target)
    }

    pub fn configure_servo(&self, joint: &str, config: &ServoConfig) -> Result<()> {
        let channel = self.registry.resolve(joint)?;
        self.bus.configure(channel, config)
    }

    /// Steps linearly from the current position to `target`, `step` units
    /// per write with `delay` between writes, ending exactly on `target`.
    pub fn smooth_move(&self, joint: &str, target: u16, step: u16, delay: Duration) -> Result<()> {
        let channel = self.registry.resolve(joint)?;
        let target = clamp_target(target as i64);
        let mut pos = clamp_target(self.bus.get_position(channel)? as i64) as i32;
        let goal = target as i32;
        let step = step.max(1) as i32;
        let sleeper = sleeper();
        let dir = if goal >= pos { 1 } else { -1 };

        while (dir > 0 && pos < goal) || (dir < 0 && pos > goal) {
            self.bus.set_target(channel, pos as u16)?;
            sleeper.sleep(delay);
            pos += dir * step;
        }
        self.bus.set_target(channel, target)
    }

    /// Blocks until `joint` reports idle, polling every 10 ms.
    pub fn wait(&self, joint: &str) -> Result<()> {
        let channel = self.registry.resolve(joint)?;
        self.poll_until_idle(joint, || self.bus.is_moving(channel))
    }

    /// Blocks until no channel is moving.
    pub fn wait_all(&self) -> Result<()> {
        self.poll_until_idle("all joints", || self.bus.get_moving_state())
    }

    fn poll_until_idle(&self, what: &str, mut moving: impl FnMut() -> Result<bool>) -> Result<()> {
        let start = Instant::now();
        let sleeper = sleeper();
        while moving()? {
            if start.elapsed() >= self.wait_timeout {
                return Err(RobotError::Timeout(self.wait_timeout, what.to_string()));
            }
            sleeper.sleep(POLL_INTERVAL);
        }
        Ok(())
    }

    // ====================================================================
    // Head and waist
    // ====================================================================

    pub fn move_head_h(&self, target: u16) -> Result<()> {
        self.move_joint(joints::HEAD_H, target)
    }

    pub fn move_head_v(&self, target: u16) -> Result<()> {
        self.move_joint(joints::HEAD_V, target)
    }

    pub fn center_head(&self) -> Result<()> {
        self.move_head_h(NEUTRAL)?;
        self.move_head_v(NEUTRAL)
    }

    /// Head and waist back to neutral.
    pub fn center_pose(&self) -> Result<()> {
        self.center_head()?;
        self.move_joint(joints::WAIST, NEUTRAL)
    }

    // ====================================================================
    // Arms
    // ====================================================================

    pub fn open_gripper(&self, side: Side) -> Result<()> {
        self.move_joint(&format!("{}Gripper", side.prefix()), GRIPPER_OPEN)
    }

    pub fn close_gripper(&self, side: Side) -> Result<()> {
        self.move_joint(&format!("{}Gripper", side.prefix()), GRIPPER_CLOSED)
    }

    pub fn arm_neutral(&self, side: Side) -> Result<()> {
        let prefix = side.prefix();
        for part in ["ShoulderV", "ShoulderH", "Elbow", "WristSwing", "WristTwist"] {
            self.move_joint(&format!("{}{}", prefix, part), NEUTRAL)?;
        }
        Ok(())
    }

    // ====================================================================
    // Wheels (continuous-rotation servos)
    // ====================================================================

    /// Writes both wheels under one bus lock. Both writes are attempted even
    /// if the first fails; the first error is returned.
    pub fn drive(&self, left: u16, right: u16) -> Result<()> {
        let l = self.registry.resolve(joints::LEFT_WHEEL)?;
        let r = self.registry.resolve(joints::RIGHT_WHEEL)?;
        self.bus.batch(|b| {
            let left_res = b.set_target(l, left);
            let right_res = b.set_target(r, right);
            left_res.and(right_res)
        })
    }

    pub fn stop(&self) -> Result<()> {
        self.drive(NEUTRAL, NEUTRAL)
    }

    pub fn forward(&self) -> Result<()> {
        self.drive(7000, 5000)
    }

    pub fn backward(&self) -> Result<()> {
        self.drive(5000, 7000)
    }

    pub fn turn_left(&self) -> Result<()> {
        self.drive(5500, 5500)
    }

    pub fn turn_right(&self) -> Result<()> {
        self.drive(6500, 6500)
    }

    // ====================================================================
    // Full body
    // ====================================================================

    /// Every registered joint to neutral, then block for the settle time.
    ///
    /// A failing joint does not stop the others from being centered.
    pub fn home(&self) -> Result<()> {
        info!("homing {} joints", self.registry.len());
        let mut first_err = None;
        for (name, channel) in self.registry.joints() {
            if let Err(e) = self.bus.set_target(channel, NEUTRAL) {
                warn!("home: {} failed: {}", name, e);
                first_err.get_or_insert(e);
            }
        }
        sleeper().sleep(self.settle);
        debug!("home settled after {:?}", self.settle);
        first_err.map_or(Ok(()), Err)
    }
}
