//! control_loop.rs
//! Fixed-cadence teleoperation loop (default 20 Hz).
//!
//! Each tick: copy the intent snapshot → arcade-drive the wheels → write the
//! five driven joints in one bus batch → wait out the rest of the period.
//!
//! - Cancellation: a crossbeam channel is the token. The end-of-tick wait is
//!   `recv_timeout`, so a stop request or a dropped handle is observed within
//!   one period.
//! - Failed writes are logged and counted; the loop keeps running.
//! - Leaving the loop by any path (stop, dropped handle, panic) centers both
//!   wheels before the thread reports termination.

use crossbeam::channel::{Receiver, RecvTimeoutError, Sender, bounded};
use log::{error, info, warn};
use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};
use thread_priority::{ThreadBuilderExt, ThreadPriority};

use crate::motion::{
    body::Robot,
    joints::DriveChannels,
    kinematics::calculate_arcade_drive,
};
use crate::teleop::intent::IntentState;
use crate::utils::error::{Result, RobotError};
use crate::utils::metrics::SharedStats;
use crate::utils::trace::{TickEvent, TickRecorder};

pub const DEFAULT_PERIOD: Duration = Duration::from_millis(50);
const FINAL_STOP_ATTEMPTS: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopConfig {
    pub period: Duration,
    pub realtime_priority: bool,
    pub pin_core: Option<usize>,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self { period: DEFAULT_PERIOD, realtime_priority: false, pin_core: None }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Stopped,
    Running,
}

/// Result of one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickOutcome {
    pub left: u16,
    pub right: u16,
    pub failures: u64,
    pub exec: Duration,
}

/// The per-tick work, independent of scheduling.
#[derive(Clone)]
pub struct ControlTick {
    robot: Robot,
    intent: IntentState,
    channels: DriveChannels,
    stats: SharedStats,
    recorder: Option<TickRecorder>,
    period: Duration,
}

impl ControlTick {
    pub fn new(robot: Robot, intent: IntentState, stats: SharedStats, period: Duration) -> Result<Self> {
        let channels = DriveChannels::resolve(robot.registry())?;
        Ok(Self { robot, intent, channels, stats, recorder: None, period })
    }

    pub fn with_recorder(mut self, recorder: TickRecorder) -> Self {
        self.recorder = Some(recorder);
        self
    }

    /// Reads intent once and issues all five targets under one bus lock.
    pub fn execute(&self, seq: u64) -> TickOutcome {
        let started = Instant::now();
        let intent = self.intent.snapshot();
        let (left, right) = calculate_arcade_drive(intent.x, intent.y);
        let ch = self.channels;
        let commands = [
            (ch.left_wheel, left),
            (ch.right_wheel, right),
            (ch.head_h, intent.head_h),
            (ch.head_v, intent.head_v),
            (ch.waist, intent.waist),
        ];

        let errors: Vec<RobotError> = self.robot.bus().batch(|b| {
            commands
                .iter()
                .filter_map(|&(channel, target)| b.set_target(channel, target).err())
                .collect()
        });
        for e in &errors {
            warn!("tick {}: {}", seq, e);
        }

        let failures = errors.len() as u64;
        let exec = started.elapsed();
        self.stats.record_tick(exec, failures, self.period);

        if let Some(recorder) = &self.recorder {
            recorder.record(TickEvent {
                tick: seq,
                ts_us: recorder.now_us(),
                x: intent.x,
                y: intent.y,
                left,
                right,
                head_h: intent.head_h,
                head_v: intent.head_v,
                waist: intent.waist,
                failures,
                exec_us: exec.as_micros() as u64,
            });
        }

        TickOutcome { left, right, failures, exec }
    }

    fn run(self, cancel: Receiver<()>, done: Sender<()>, running: Arc<AtomicBool>, pin_core: Option<usize>) {
        // Dropped last: the owner sees termination only after the final stop.
        let _done = done;
        let _guard = FinalStop { robot: &self.robot, running: &running };

        if let Some(core) = pin_core {
            pin_to_core(core);
        }
        info!("control loop started ({:?} period)", self.period);

        let mut seq: u64 = 0;
        let mut next_release = Instant::now();
        loop {
            self.execute(seq);
            seq += 1;

            next_release += self.period;
            let now = Instant::now();
            let wait = if next_release > now {
                next_release - now
            } else {
                // Overrun: resync instead of bursting to catch up.
                next_release = now;
                Duration::ZERO
            };

            match cancel.recv_timeout(wait) {
                Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                Err(RecvTimeoutError::Timeout) => {}
            }
        }

        info!("control loop exiting after {} ticks", seq);
    }
}

/// Centers both wheels when the loop thread leaves its body, including unwinding.
struct FinalStop<'a> {
    robot: &'a Robot,
    running: &'a AtomicBool,
}

impl Drop for FinalStop<'_> {
    fn drop(&mut self) {
        if thread::panicking() {
            error!("control loop panicked; stopping wheels");
        }
        let mut stopped = false;
        for attempt in 1..=FINAL_STOP_ATTEMPTS {
            match self.robot.stop() {
                Ok(()) => {
                    stopped = true;
                    break;
                }
                Err(e) => warn!("final wheel stop attempt {} failed: {}", attempt, e),
            }
        }
        if stopped {
            info!("control loop stopped - wheels centered");
        } else {
            error!("could not center wheels after {} attempts", FINAL_STOP_ATTEMPTS);
        }
        self.running.store(false, Ordering::Release);
    }
}

fn pin_to_core(core: usize) {
    let core_ids = core_affinity::get_core_ids().unwrap_or_default();
    match core_ids.get(core) {
        Some(core_id) if core_affinity::set_for_current(*core_id) => {
            info!("control loop pinned to core {}", core)
        }
        Some(_) => warn!("failed to pin control loop to core {}", core),
        None => warn!("core {} not found among available cores", core),
    }
}

struct LoopTask {
    cancel: Sender<()>,
    done: Receiver<()>,
    handle: JoinHandle<()>,
}

/// Owner of the loop thread: STOPPED ⇄ RUNNING.
pub struct ControlLoop {
    tick: ControlTick,
    config: LoopConfig,
    running: Arc<AtomicBool>,
    task: Option<LoopTask>,
    drop_timeout: Duration,
}

impl ControlLoop {
    pub fn new(tick: ControlTick, config: LoopConfig) -> Self {
        Self {
            tick,
            config,
            running: Arc::new(AtomicBool::new(false)),
            task: None,
            drop_timeout: Duration::from_secs(2),
        }
    }

    /// Shared view of the RUNNING flag for status reporting.
    pub fn running_flag(&self) -> Arc<AtomicBool> {
        self.running.clone()
    }

    pub fn state(&self) -> LoopState {
        if self.task.is_some() && self.running.load(Ordering::Acquire) {
            LoopState::Running
        } else {
            LoopState::Stopped
        }
    }

    /// STOPPED → RUNNING. Call only after actuator initialization.
    pub fn start(&mut self) -> Result<()> {
        if self.task.is_some() {
            warn!("control loop already running");
            return Ok(());
        }

        let (cancel_tx, cancel_rx) = bounded::<()>(1);
        let (done_tx, done_rx) = bounded::<()>(1);
        let tick = self.tick.clone();
        let running = self.running.clone();
        let pin_core = self.config.pin_core;
        running.store(true, Ordering::Release);

        let builder = thread::Builder::new().name("control-loop".into());
        let spawned = if self.config.realtime_priority {
            builder.spawn_with_priority(ThreadPriority::Max, move |priority| {
                if let Err(e) = priority {
                    warn!("control loop running without elevated priority: {:?}", e);
                }
                tick.run(cancel_rx, done_tx, running, pin_core)
            })
        } else {
            builder.spawn(move || tick.run(cancel_rx, done_tx, running, pin_core))
        };

        match spawned {
            Ok(handle) => {
                self.task = Some(LoopTask { cancel: cancel_tx, done: done_rx, handle });
                Ok(())
            }
            Err(e) => {
                self.running.store(false, Ordering::Release);
                Err(RobotError::Io(e))
            }
        }
    }

    /// RUNNING → STOPPED. Waits up to `timeout` for the thread to issue its
    /// final stop and exit. Calling it while stopped is a no-op.
    pub fn stop(&mut self, timeout: Duration) -> Result<()> {
        let Some(task) = self.task.take() else {
            return Ok(());
        };

        let _ = task.cancel.try_send(());
        match task.done.recv_timeout(timeout) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                if task.handle.join().is_err() {
                    error!("control loop thread panicked");
                }
                Ok(())
            }
            Err(RecvTimeoutError::Timeout) => {
                error!("control loop did not terminate within {:?}", timeout);
                Err(RobotError::Timeout(timeout, "control loop termination".into()))
            }
        }
    }

    pub fn set_drop_timeout(&mut self, timeout: Duration) {
        self.drop_timeout = timeout;
    }
}

impl Drop for ControlLoop {
    fn drop(&mut self) {
        if let Err(e) = self.stop(self.drop_timeout) {
            error!("control loop drop: {}", e);
        }
    }
}
