use criterion::{Criterion, criterion_group, criterion_main};
use std::hint::black_box;

use teleop_core::motion::kinematics::{calculate_arcade_drive, map_joystick_to_servo};

fn bench_arcade_drive(c: &mut Criterion) {
    let mut group = c.benchmark_group("arcade_drive");

    for (label, x, y) in [("centered", 0.0, 0.0), ("deadzone", 0.05, -0.08), ("diagonal", 0.9, 0.9)] {
        group.bench_function(label, |b| {
            b.iter(|| calculate_arcade_drive(black_box(x), black_box(y)))
        });
    }
    group.finish();
}

fn bench_joystick_sweep(c: &mut Criterion) {
    // 21x21 grid over the full stick range.
    let grid: Vec<(f64, f64)> = (0..=20)
        .flat_map(|i| (0..=20).map(move |j| (i as f64 / 10.0 - 1.0, j as f64 / 10.0 - 1.0)))
        .collect();

    c.bench_function("arcade_drive_sweep", |b| {
        b.iter(|| {
            for &(x, y) in &grid {
                let (l, r) = calculate_arcade_drive(black_box(x), black_box(y));
                assert!((5000..=7000).contains(&l) && (5000..=7000).contains(&r));
            }
        })
    });

    c.bench_function("map_joystick_to_servo", |b| {
        b.iter(|| map_joystick_to_servo(black_box(0.37), black_box(true)))
    });
}

criterion_group!(benches, bench_arcade_drive, bench_joystick_sweep);
criterion_main!(benches);
