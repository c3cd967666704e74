//! Error taxonomy for the teleoperation stack.
//!
//! - `BusError`: a single driver call failed (serial I/O, short reply, closed port).
//! - `RobotError`: everything above the driver; startup, registry, input validation.

use thiserror::Error;

/// Failure reported by an actuator driver for one call.
#[derive(Debug, Error)]
pub enum BusError {
    #[error("serial i/o failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("short reply from controller: expected {expected} bytes, got {got}")]
    ShortReply { expected: usize, got: usize },

    #[error("channel {0} is out of range for this controller")]
    InvalidChannel(u8),

    #[error("bus is closed")]
    Closed,

    #[error("injected fault on channel {0}")]
    Injected(u8),
}

#[derive(Debug, Error)]
pub enum RobotError {
    /// Actuator controller unreachable at startup. Fatal.
    #[error("could not connect to servo controller on {port}: {reason}")]
    Connection { port: String, reason: String },

    /// Name missing from the joint registry. Programming/config error.
    #[error("unknown joint: {0}")]
    UnknownJoint(String),

    /// One driver call failed. Non-fatal inside the control loop.
    #[error("command on channel {channel} failed: {source}")]
    ActuatorCommand {
        channel: u8,
        #[source]
        source: BusError,
    },

    /// Bus-wide failure not tied to one channel (moving-state query, close).
    #[error("servo bus failure: {0}")]
    Bus(#[from] BusError),

    /// Malformed inbound intent payload; shared state is left unchanged.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("timed out after {0:?} waiting for {1}")]
    Timeout(std::time::Duration, String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

impl RobotError {
    pub(crate) fn command(channel: u8, source: BusError) -> Self {
        RobotError::ActuatorCommand { channel, source }
    }
}

pub type Result<T> = std::result::Result<T, RobotError>;
