//! Runtime configuration.
//!
//! Every field has a default, so an absent or partial JSON file is valid.
//! The binary reads the path from `ROBOT_CONFIG`; without it the defaults
//! describe the standard robot on `/dev/ttyACM0`.

use serde::Deserialize;
use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::actuator::driver::ServoConfig;
use crate::motion::joints::{self, DEFAULT_JOINTS};
use crate::utils::error::{Result, RobotError};

pub const CONFIG_ENV: &str = "ROBOT_CONFIG";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DriverKind {
    Maestro,
    Simulated,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SerialConfig {
    pub port: String,
    pub baud: u32,
    /// Pololu protocol device number.
    pub device: u8,
    pub timeout_ms: u64,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: "/dev/ttyACM0".into(),
            baud: 9600,
            device: 0x0c,
            timeout_ms: 100,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct JointEntry {
    pub name: String,
    pub channel: u8,
}

/// Servo limits applied to one joint at startup.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ServoSetup {
    pub joint: String,
    #[serde(flatten)]
    pub config: ServoConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RobotConfig {
    pub driver: DriverKind,
    pub serial: SerialConfig,
    pub http_bind: String,
    pub tick_ms: u64,
    pub shutdown_timeout_ms: u64,
    pub home_settle_ms: u64,
    pub wait_timeout_ms: u64,
    pub joints: Vec<JointEntry>,
    pub servos: Vec<ServoSetup>,
    /// Per-tick CSV trace; disabled when absent.
    pub trace_csv: Option<PathBuf>,
    pub realtime_priority: bool,
    pub pin_core: Option<usize>,
    /// Fault probability per command when running against the simulated bus.
    pub sim_fault_rate: f64,
}

impl Default for RobotConfig {
    fn default() -> Self {
        Self {
            driver: DriverKind::Maestro,
            serial: SerialConfig::default(),
            http_bind: "0.0.0.0:5000".into(),
            tick_ms: 50,
            shutdown_timeout_ms: 2_000,
            home_settle_ms: 1_000,
            wait_timeout_ms: 5_000,
            joints: DEFAULT_JOINTS
                .iter()
                .map(|(name, channel)| JointEntry { name: (*name).into(), channel: *channel })
                .collect(),
            // Wheels are continuous-rotation servos: no speed/accel limiting.
            servos: [joints::LEFT_WHEEL, joints::RIGHT_WHEEL]
                .iter()
                .map(|joint| ServoSetup {
                    joint: (*joint).into(),
                    config: ServoConfig { speed: 0, accel: 0, min: 4000, max: 8000 },
                })
                .collect(),
            trace_csv: None,
            realtime_priority: true,
            pin_core: None,
            sim_fault_rate: 0.0,
        }
    }
}

impl RobotConfig {
    pub fn parse_json(text: &str) -> Result<Self> {
        let config: RobotConfig =
            serde_json::from_str(text).map_err(|e| RobotError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::parse_json(&text)
    }

    /// Loads the file named by `ROBOT_CONFIG`, or the defaults when unset.
    pub fn from_env() -> Result<Self> {
        match std::env::var_os(CONFIG_ENV) {
            Some(path) => Self::load(Path::new(&path)),
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.tick_ms == 0 {
            return Err(RobotError::Config("tick_ms must be positive".into()));
        }
        if !(0.0..=1.0).contains(&self.sim_fault_rate) {
            return Err(RobotError::Config("sim_fault_rate must be within [0, 1]".into()));
        }
        for setup in &self.servos {
            if setup.config.min > setup.config.max {
                return Err(RobotError::Config(format!(
                    "servo range for {} is inverted ({} > {})",
                    setup.joint, setup.config.min, setup.config.max
                )));
            }
        }
        Ok(())
    }

    pub fn tick_period(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }

    pub fn home_settle(&self) -> Duration {
        Duration::from_millis(self.home_settle_ms)
    }

    pub fn wait_timeout(&self) -> Duration {
        Duration::from_millis(self.wait_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_object_yields_defaults() {
        let config = RobotConfig::parse_json("{}").unwrap();
        assert_eq!(config, RobotConfig::default());
        assert_eq!(config.tick_period(), Duration::from_millis(50));
        assert_eq!(config.joints.len(), DEFAULT_JOINTS.len());
    }

    #[test]
    fn partial_file_overrides_fields() {
        let config = RobotConfig::parse_json(
            r#"{"driver":"simulated","tick_ms":20,"serial":{"port":"/dev/ttyUSB1"},
                "servos":[{"joint":"headH","speed":10,"accel":5,"min":4500,"max":7500}]}"#,
        )
        .unwrap();
        assert_eq!(config.driver, DriverKind::Simulated);
        assert_eq!(config.tick_ms, 20);
        assert_eq!(config.serial.port, "/dev/ttyUSB1");
        assert_eq!(config.serial.device, 0x0c);
        assert_eq!(config.servos[0].config.min, 4500);
    }

    #[test]
    fn zero_tick_is_rejected() {
        assert!(matches!(
            RobotConfig::parse_json(r#"{"tick_ms":0}"#),
            Err(RobotError::Config(_))
        ));
    }

    #[test]
    fn inverted_servo_range_is_rejected() {
        let err = RobotConfig::parse_json(
            r#"{"servos":[{"joint":"waist","speed":0,"accel":0,"min":8000,"max":4000}]}"#,
        );
        assert!(matches!(err, Err(RobotError::Config(_))));
    }
}
