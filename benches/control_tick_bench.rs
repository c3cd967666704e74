use criterion::{BatchSize, Criterion, criterion_group, criterion_main};
use std::{sync::Arc, thread, time::Duration};

use teleop_core::{
    actuator::{bus::BusHandle, simulated::SimulatedBus},
    motion::{body::Robot, joints::JointRegistry},
    teleop::{
        control_loop::{ControlTick, DEFAULT_PERIOD},
        intent::{IntentState, JoystickUpdate},
    },
    utils::{metrics::LoopStats, trace::TickRecorder},
};

fn tick_fixture() -> (ControlTick, IntentState, SimulatedBus) {
    let probe = SimulatedBus::new();
    let robot = Robot::new(Arc::new(JointRegistry::standard()), BusHandle::new(probe.clone()));
    let intent = IntentState::new();
    let tick = ControlTick::new(robot, intent.clone(), LoopStats::new_shared(), DEFAULT_PERIOD)
        .expect("standard registry resolves drive channels");
    (tick, intent, probe)
}

fn control_tick_deadline_bench(c: &mut Criterion) {
    let (tick, intent, probe) = tick_fixture();
    intent.set_joystick(JoystickUpdate { x: 0.3, y: 0.8 }).unwrap();

    c.bench_function("control_tick_execute", |b| {
        b.iter_batched(
            || probe.clear(),
            |_| {
                let out = tick.execute(0);
                // A tick must fit well inside its 50 ms period.
                assert!(out.exec < Duration::from_millis(5));
            },
            BatchSize::SmallInput,
        )
    });
}

fn control_tick_contention_bench(c: &mut Criterion) {
    let (tick, intent, probe) = tick_fixture();
    let writer_intent = intent.clone();
    let stop = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let writer_stop = stop.clone();

    // Simulates a request handler hammering the joystick endpoint.
    let writer = thread::spawn(move || {
        let mut v = -1.0;
        while !writer_stop.load(std::sync::atomic::Ordering::Relaxed) {
            let _ = writer_intent.set_joystick(JoystickUpdate { x: v, y: -v });
            v = if v >= 1.0 { -1.0 } else { v + 0.01 };
        }
    });

    c.bench_function("control_tick_with_writer", |b| {
        b.iter_batched(|| probe.clear(), |_| tick.execute(0), BatchSize::SmallInput)
    });

    stop.store(true, std::sync::atomic::Ordering::Relaxed);
    let _ = writer.join();
}

fn control_tick_trace_bench(c: &mut Criterion) {
    let (tick, _intent, probe) = tick_fixture();
    let recorder = TickRecorder::new();
    let tick = tick.with_recorder(recorder.clone());

    c.bench_function("control_tick_traced", |b| {
        b.iter_batched(|| probe.clear(), |_| tick.execute(0), BatchSize::SmallInput)
    });
    assert!(recorder.pending() > 0 || recorder.dropped() > 0);
}

criterion_group!(
    benches,
    control_tick_deadline_bench,
    control_tick_contention_bench,
    control_tick_trace_bench
);
criterion_main!(benches);
