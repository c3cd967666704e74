//! kinematics.rs
//! Joystick → wheel target mapping (arcade drive).
//!
//! Pure functions, no I/O. Output is always within `[DRIVE_MIN, DRIVE_MAX]`.

use crate::actuator::driver::NEUTRAL;

/// Input magnitude below which an axis reads as exactly zero.
pub const DEADZONE: f64 = 0.1;
pub const DRIVE_MIN: u16 = 5000;
pub const DRIVE_MAX: u16 = 7000;
/// Target units per unit of normalized input.
const DRIVE_SCALE: f64 = 1000.0;

/// Maps a normalized value in [-1, 1] onto [5000, 7000], centered on 6000.
///
/// Out-of-range input is clamped first; a non-finite value reads as centered.
pub fn map_joystick_to_servo(value: f64, reversed: bool) -> u16 {
    let value = if value.is_finite() { value.clamp(-1.0, 1.0) } else { 0.0 };
    let value = if reversed { -value } else { value };
    let target = (NEUTRAL as f64 + value * DRIVE_SCALE).round();
    target.clamp(DRIVE_MIN as f64, DRIVE_MAX as f64) as u16
}

#[inline]
fn apply_deadzone(value: f64) -> f64 {
    if !value.is_finite() || value.abs() < DEADZONE { 0.0 } else { value }
}

/// Differential mix before mapping: `(left, right)` with both in [-1, 1].
///
/// Returns `None` when both axes are inside the deadzone.
pub fn mix_arcade(x: f64, y: f64) -> Option<(f64, f64)> {
    let x = apply_deadzone(x);
    let y = apply_deadzone(y);
    if x == 0.0 && y == 0.0 {
        return None;
    }

    let forward = y;
    let turn = x;
    let mut left = forward - turn;
    let mut right = forward + turn;

    // Scale down together so the left/right ratio survives.
    let max = left.abs().max(right.abs());
    if max > 1.0 {
        left /= max;
        right /= max;
    }
    Some((left, right))
}

/// Joystick `(x, y)` → `(left_target, right_target)`.
///
/// The right wheel is mounted mirrored, so its mapping is reversed. Swapping
/// which side is reversed makes the robot spin in place instead of driving.
pub fn calculate_arcade_drive(x: f64, y: f64) -> (u16, u16) {
    match mix_arcade(x, y) {
        None => (NEUTRAL, NEUTRAL),
        Some((left, right)) => (
            map_joystick_to_servo(left, false),
            map_joystick_to_servo(right, true),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid() -> impl Iterator<Item = (f64, f64)> {
        (-20..=20).flat_map(|i| (-20..=20).map(move |j| (i as f64 / 20.0, j as f64 / 20.0)))
    }

    #[test]
    fn map_reference_points() {
        assert_eq!(map_joystick_to_servo(0.0, false), 6000);
        assert_eq!(map_joystick_to_servo(1.0, false), 7000);
        assert_eq!(map_joystick_to_servo(-1.0, false), 5000);
        assert_eq!(map_joystick_to_servo(1.0, true), 5000);
        assert_eq!(map_joystick_to_servo(-1.0, true), 7000);
    }

    #[test]
    fn map_clamps_out_of_range_and_nan() {
        assert_eq!(map_joystick_to_servo(3.0, false), 7000);
        assert_eq!(map_joystick_to_servo(-7.5, false), 5000);
        assert_eq!(map_joystick_to_servo(f64::NAN, false), 6000);
        assert_eq!(map_joystick_to_servo(0.2504, false), 6250);
    }

    #[test]
    fn inside_deadzone_is_stopped() {
        for (x, y) in [(0.0, 0.0), (0.09, -0.09), (-0.099, 0.05), (0.0, 0.0999)] {
            assert_eq!(calculate_arcade_drive(x, y), (6000, 6000));
        }
    }

    #[test]
    fn outputs_stay_in_drive_band() {
        for (x, y) in grid() {
            let (l, r) = calculate_arcade_drive(x, y);
            assert!((DRIVE_MIN..=DRIVE_MAX).contains(&l), "left {} for ({}, {})", l, x, y);
            assert!((DRIVE_MIN..=DRIVE_MAX).contains(&r), "right {} for ({}, {})", r, x, y);
        }
    }

    #[test]
    fn normalization_preserves_ratio() {
        for (x, y) in grid() {
            let (x_dz, y_dz) = (apply_deadzone(x), apply_deadzone(y));
            let (raw_l, raw_r) = (y_dz - x_dz, y_dz + x_dz);
            if raw_l.abs() <= 1.0 && raw_r.abs() <= 1.0 {
                continue;
            }
            let (l, r) = mix_arcade(x, y).unwrap();
            assert!(l.abs() <= 1.0 + 1e-12 && r.abs() <= 1.0 + 1e-12);
            if raw_r != 0.0 && r != 0.0 {
                assert!((raw_l / raw_r - l / r).abs() < 1e-9, "ratio drift at ({}, {})", x, y);
            }
        }
    }

    #[test]
    fn diagonal_scenario() {
        // forward 0.5, turn 0.5 -> left 0.0, right 1.0
        assert_eq!(calculate_arcade_drive(0.5, 0.5), (6000, 5000));
    }

    #[test]
    fn straight_forward_drives_wheels_opposite_pulses() {
        assert_eq!(calculate_arcade_drive(0.0, 1.0), (7000, 5000));
        assert_eq!(calculate_arcade_drive(0.0, -1.0), (5000, 7000));
    }

    #[test]
    fn full_turn_is_normalized() {
        // left = 1 - 1 = 0, right = 1 + 1 = 2 -> (0, 1)
        assert_eq!(calculate_arcade_drive(1.0, 1.0), (6000, 5000));
        // spin: left = -1, right = 1 -> both wheels at 5000
        assert_eq!(calculate_arcade_drive(1.0, 0.0), (5000, 5000));
    }
}
