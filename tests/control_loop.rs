use std::{
    sync::Arc,
    thread,
    time::{Duration, Instant},
};

use teleop_core::{
    actuator::{
        bus::BusHandle,
        simulated::{BusCommand, SimulatedBus},
    },
    motion::{body::Robot, joints::JointRegistry},
    teleop::{
        control_loop::{ControlLoop, ControlTick, LoopConfig, LoopState},
        intent::{IntentState, JoystickUpdate, SliderUpdate},
    },
    utils::metrics::{LoopStats, SharedStats},
};

const PERIOD: Duration = Duration::from_millis(10);

fn build(probe: &SimulatedBus) -> (ControlLoop, IntentState, SharedStats) {
    let robot = Robot::new(Arc::new(JointRegistry::standard()), BusHandle::new(probe.clone()));
    let intent = IntentState::new();
    let stats = LoopStats::new_shared();
    let tick = ControlTick::new(robot, intent.clone(), stats.clone(), PERIOD).unwrap();
    let ctl = ControlLoop::new(tick, LoopConfig { period: PERIOD, ..Default::default() });
    (ctl, intent, stats)
}

fn wait_for_ticks(stats: &SharedStats, n: u64) {
    let deadline = Instant::now() + Duration::from_secs(2);
    while stats.snapshot().ticks < n {
        assert!(Instant::now() < deadline, "loop did not reach {} ticks", n);
        thread::sleep(Duration::from_millis(2));
    }
}

#[test]
fn stop_mid_run_ends_with_centered_wheels() {
    let probe = SimulatedBus::new();
    let (mut ctl, intent, stats) = build(&probe);
    intent.set_joystick(JoystickUpdate { x: 0.0, y: 1.0 }).unwrap();

    ctl.start().unwrap();
    assert_eq!(ctl.state(), LoopState::Running);
    wait_for_ticks(&stats, 3);
    assert_eq!(probe.last_target(1), Some(7000));

    let begin = Instant::now();
    ctl.stop(Duration::from_secs(2)).unwrap();
    assert!(begin.elapsed() < Duration::from_secs(2));
    assert_eq!(ctl.state(), LoopState::Stopped);

    // The final two target writes are the wheel stop.
    let targets: Vec<_> = probe
        .commands()
        .into_iter()
        .filter(|c| matches!(c, BusCommand::Target { .. }))
        .collect();
    let tail = &targets[targets.len() - 2..];
    assert_eq!(
        tail,
        &[
            BusCommand::Target { channel: 1, target: 6000 },
            BusCommand::Target { channel: 0, target: 6000 },
        ]
    );

    // Nothing is written once the loop has terminated.
    let count = probe.commands().len();
    thread::sleep(PERIOD * 3);
    assert_eq!(probe.commands().len(), count);
}

#[test]
fn failed_wheel_write_does_not_stop_later_ticks() {
    let probe = SimulatedBus::new();
    let (mut ctl, intent, stats) = build(&probe);
    intent.set_joystick(JoystickUpdate { x: 0.0, y: -1.0 }).unwrap();
    probe.fail_next(1, 1);

    ctl.start().unwrap();
    wait_for_ticks(&stats, 5);
    ctl.stop(Duration::from_secs(2)).unwrap();

    let snap = stats.snapshot();
    assert_eq!(snap.command_failures, 1);
    assert!(snap.ticks >= 5);
    // Later ticks reached the left wheel with the reverse command.
    assert!(probe.targets_for(1).contains(&5000));
}

#[test]
fn loop_picks_up_intent_changes() {
    let probe = SimulatedBus::new();
    let (mut ctl, intent, stats) = build(&probe);
    ctl.start().unwrap();

    intent.set_joystick(JoystickUpdate { x: 0.5, y: 0.5 }).unwrap();
    intent.apply_sliders(SliderUpdate { head_h: Some(9000), waist: Some(4500), ..Default::default() });
    let seen = stats.snapshot().ticks;
    wait_for_ticks(&stats, seen + 2);

    assert_eq!(probe.last_target(1), Some(6000));
    assert_eq!(probe.last_target(0), Some(5000));
    assert_eq!(probe.last_target(3), Some(8000));
    assert_eq!(probe.last_target(2), Some(4500));
    ctl.stop(Duration::from_secs(2)).unwrap();
}

#[test]
fn stop_is_idempotent_and_restart_works() {
    let probe = SimulatedBus::new();
    let (mut ctl, _intent, stats) = build(&probe);
    ctl.start().unwrap();
    wait_for_ticks(&stats, 1);
    ctl.stop(Duration::from_secs(2)).unwrap();
    ctl.stop(Duration::from_secs(2)).unwrap();
    assert_eq!(ctl.state(), LoopState::Stopped);

    let before = stats.snapshot().ticks;
    ctl.start().unwrap();
    wait_for_ticks(&stats, before + 2);
    ctl.stop(Duration::from_secs(2)).unwrap();
}

#[test]
fn cadence_does_not_busy_spin() {
    let probe = SimulatedBus::new();
    let (mut ctl, _intent, stats) = build(&probe);
    ctl.start().unwrap();
    thread::sleep(Duration::from_millis(105));
    ctl.stop(Duration::from_secs(2)).unwrap();

    // ~11 ticks at 10 ms; allow generous scheduling slack either way.
    let ticks = stats.snapshot().ticks;
    assert!((3..=30).contains(&ticks), "unexpected tick count {}", ticks);
}
