//! surface.rs
//! Inbound control operations, independent of any transport.
//!
//! Cheap to clone; one instance per request thread. Input is validated and
//! clamped here before it reaches the shared intent.

use log::{debug, info, warn};
use serde::Serialize;
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use crate::motion::body::Robot;
use crate::teleop::intent::{IntentSnapshot, IntentState, JoystickUpdate, SliderUpdate};
use crate::utils::error::Result;
use crate::utils::metrics::{LoopStatsSnapshot, SharedStats};

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StatusReport {
    pub connected: bool,
    pub running: bool,
    #[serde(flatten)]
    pub intent: IntentSnapshot,
    #[serde(rename = "loop")]
    pub stats: LoopStatsSnapshot,
}

#[derive(Clone)]
pub struct ControlSurface {
    intent: IntentState,
    robot: Robot,
    stats: SharedStats,
    running: Arc<AtomicBool>,
    connected: Arc<AtomicBool>,
}

impl ControlSurface {
    pub fn new(
        intent: IntentState,
        robot: Robot,
        stats: SharedStats,
        running: Arc<AtomicBool>,
        connected: Arc<AtomicBool>,
    ) -> Self {
        Self { intent, robot, stats, running, connected }
    }

    pub fn joystick(&self, update: JoystickUpdate) -> Result<IntentSnapshot> {
        let snap = self.intent.set_joystick(update)?;
        debug!("joystick x={:.2} y={:.2}", snap.x, snap.y);
        Ok(snap)
    }

    pub fn sliders(&self, update: SliderUpdate) -> IntentSnapshot {
        let snap = self.intent.apply_sliders(update);
        debug!("sliders headH={} headV={} waist={}", snap.head_h, snap.head_v, snap.waist);
        snap
    }

    /// Zeroes the intent, then stops the wheels and centers head and waist
    /// directly on the bus. The intent is reset even if the bus write fails.
    pub fn stop(&self) -> Result<IntentSnapshot> {
        let snap = self.intent.reset();
        info!("stop requested");
        let wheels = self.robot.stop();
        let pose = self.robot.center_pose();
        if let Err(e) = &wheels {
            warn!("stop: wheel command failed: {}", e);
        }
        wheels.and(pose).map(|_| snap)
    }

    /// Blocking: centers every joint and waits for the settle time. The
    /// intent is reset first so the loop does not drive away from home.
    pub fn home(&self) -> Result<IntentSnapshot> {
        let snap = self.intent.reset();
        info!("home requested");
        self.robot.home()?;
        Ok(snap)
    }

    pub fn status(&self) -> StatusReport {
        StatusReport {
            connected: self.connected.load(Ordering::Acquire),
            running: self.running.load(Ordering::Acquire),
            intent: self.intent.snapshot(),
            stats: self.stats.snapshot(),
        }
    }

    pub fn intent(&self) -> &IntentState {
        &self.intent
    }
}
