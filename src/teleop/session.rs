//! session.rs
//! Startup and shutdown sequencing around the control loop.
//!
//! Startup: registry → servo configuration → wheels stopped → loop RUNNING.
//! Shutdown: loop STOPPED (bounded wait) → wheels stopped → bus closed.

use log::{error, info, warn};
use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread::JoinHandle,
    time::Duration,
};

use crate::actuator::bus::BusHandle;
use crate::motion::{body::Robot, joints::JointRegistry};
use crate::teleop::{
    control_loop::{ControlLoop, ControlTick, LoopConfig, LoopState},
    intent::IntentState,
    surface::ControlSurface,
};
use crate::utils::config::RobotConfig;
use crate::utils::error::Result;
use crate::utils::metrics::{LoopStats, SharedStats};
use crate::utils::trace::TickRecorder;

pub struct TeleopSession {
    robot: Robot,
    control: ControlLoop,
    surface: ControlSurface,
    stats: SharedStats,
    connected: Arc<AtomicBool>,
    recorder: Option<(TickRecorder, JoinHandle<()>)>,
    shutdown_timeout: Duration,
}

impl TeleopSession {
    /// Validates the joint map, applies servo limits and stops the wheels.
    /// Any failure here aborts startup.
    pub fn initialize(config: &RobotConfig, bus: BusHandle) -> Result<Self> {
        let registry = Arc::new(JointRegistry::from_config(&config.joints)?);
        let robot = Robot::new(registry, bus)
            .with_timing(config.home_settle(), config.wait_timeout());

        for setup in &config.servos {
            robot.configure_servo(&setup.joint, &setup.config)?;
        }
        robot.stop()?;

        let stats = LoopStats::new_shared();
        let intent = IntentState::new();
        let mut tick = ControlTick::new(robot.clone(), intent.clone(), stats.clone(), config.tick_period())?;

        let recorder = config.trace_csv.as_ref().map(|path| {
            let recorder = TickRecorder::new();
            let handle = recorder.start_exporter(path.clone());
            (recorder, handle)
        });
        if let Some((r, _)) = &recorder {
            tick = tick.with_recorder(r.clone());
        }

        let mut control = ControlLoop::new(
            tick,
            LoopConfig {
                period: config.tick_period(),
                realtime_priority: config.realtime_priority,
                pin_core: config.pin_core,
            },
        );
        control.set_drop_timeout(config.shutdown_timeout());

        let connected = Arc::new(AtomicBool::new(true));
        let surface = ControlSurface::new(
            intent,
            robot.clone(),
            stats.clone(),
            control.running_flag(),
            connected.clone(),
        );

        info!("robot initialized ({} joints)", robot.registry().len());
        Ok(Self {
            robot,
            control,
            surface,
            stats,
            connected,
            recorder,
            shutdown_timeout: config.shutdown_timeout(),
        })
    }

    pub fn start(&mut self) -> Result<()> {
        self.control.start()?;
        info!("robot ready");
        Ok(())
    }

    pub fn surface(&self) -> ControlSurface {
        self.surface.clone()
    }

    pub fn robot(&self) -> &Robot {
        &self.robot
    }

    pub fn state(&self) -> LoopState {
        self.control.state()
    }

    pub fn stats(&self) -> &SharedStats {
        &self.stats
    }

    /// Stops the loop (bounded wait), stops the wheels once more and closes
    /// the bus. The bus is closed even if the loop did not exit in time.
    pub fn shutdown(mut self) -> Result<()> {
        info!("shutting down robot");
        let loop_result = self.control.stop(self.shutdown_timeout);

        if let Err(e) = self.robot.stop() {
            warn!("shutdown: wheel stop failed: {}", e);
        }
        self.connected.store(false, Ordering::Release);
        let close_result = self.robot.bus().close();

        if let Some((recorder, handle)) = self.recorder.take() {
            recorder.stop();
            if handle.join().is_err() {
                error!("tick trace exporter panicked");
            }
        }

        info!("robot shutdown complete");
        loop_result.and(close_result)
    }
}
