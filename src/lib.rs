//! # teleop_core
//!
//! Joint-command layer and real-time teleoperation loop for a servo-driven
//! robot (wheeled base, head, waist, two arms) on a Maestro-class controller.
//!
//! ## Layers
//! - `actuator`: driver trait, Maestro serial driver, simulated bus, serialized handle.
//! - `motion`: joint registry, arcade-drive kinematics, named joint commands.
//! - `teleop`: shared intent, 20 Hz control loop, control surface, session lifecycle.
//! - `server`: JSON-over-HTTP transport for the control surface.
//! - `utils`: configuration, errors, loop metrics, tick trace.

pub mod actuator;
pub mod motion;
pub mod server;
pub mod teleop;
pub mod utils;

pub use utils::error::{BusError, Result, RobotError};
