// Teleoperation: shared intent, the fixed-cadence control loop, the inbound
// control surface, and session start/stop sequencing.
pub mod intent;
pub mod control_loop;
pub mod surface;
pub mod session;
