//! joints.rs
//! Immutable joint-name → channel registry, validated once at startup.

use std::collections::HashMap;

use crate::utils::config::JointEntry;
use crate::utils::error::{Result, RobotError};

pub const WAIST: &str = "waist";
pub const LEFT_WHEEL: &str = "lWheel";
pub const RIGHT_WHEEL: &str = "rWheel";
pub const HEAD_H: &str = "headH";
pub const HEAD_V: &str = "headV";

/// Joints the control loop drives every tick.
pub const REQUIRED_JOINTS: [&str; 5] = [LEFT_WHEEL, RIGHT_WHEEL, HEAD_H, HEAD_V, WAIST];

pub const DEFAULT_JOINTS: [(&str, u8); 17] = [
    (WAIST, 2),
    (LEFT_WHEEL, 1),
    (RIGHT_WHEEL, 0),
    (HEAD_H, 3),
    (HEAD_V, 4),
    ("rShoulderV", 5),
    ("rShoulderH", 6),
    ("rElbow", 7),
    ("rWristSwing", 8),
    ("rWristTwist", 9),
    ("rGripper", 10),
    ("lShoulderV", 11),
    ("lShoulderH", 12),
    ("lElbow", 13),
    ("lWristSwing", 14),
    ("lWristTwist", 15),
    ("lGripper", 16),
];

#[derive(Debug, Clone)]
pub struct JointRegistry {
    // Registration order, kept for bulk operations.
    entries: Vec<(String, u8)>,
    by_name: HashMap<String, u8>,
}

impl JointRegistry {
    /// Builds a registry and fails fast on duplicates or missing required joints.
    pub fn new<I, S>(joints: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, u8)>,
        S: Into<String>,
    {
        let mut entries = Vec::new();
        let mut by_name = HashMap::new();

        for (name, channel) in joints {
            let name = name.into();
            if by_name.contains_key(&name) {
                return Err(RobotError::Config(format!("joint {} registered twice", name)));
            }
            if let Some((other, _)) = entries.iter().find(|(_, ch)| *ch == channel) {
                return Err(RobotError::Config(format!(
                    "channel {} mapped to both {} and {}",
                    channel, other, name
                )));
            }
            by_name.insert(name.clone(), channel);
            entries.push((name, channel));
        }

        for required in REQUIRED_JOINTS {
            if !by_name.contains_key(required) {
                return Err(RobotError::Config(format!("required joint {} is missing", required)));
            }
        }

        Ok(Self { entries, by_name })
    }

    pub fn standard() -> Self {
        Self {
            entries: DEFAULT_JOINTS.iter().map(|(n, c)| ((*n).to_string(), *c)).collect(),
            by_name: DEFAULT_JOINTS.iter().map(|(n, c)| ((*n).to_string(), *c)).collect(),
        }
    }

    pub fn from_config(entries: &[JointEntry]) -> Result<Self> {
        Self::new(entries.iter().map(|e| (e.name.clone(), e.channel)))
    }

    pub fn resolve(&self, name: &str) -> Result<u8> {
        self.by_name
            .get(name)
            .copied()
            .ok_or_else(|| RobotError::UnknownJoint(name.to_string()))
    }

    pub fn joints(&self) -> impl Iterator<Item = (&str, u8)> + '_ {
        self.entries.iter().map(|(name, ch)| (name.as_str(), *ch))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Channels of the joints the loop drives, resolved once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DriveChannels {
    pub left_wheel: u8,
    pub right_wheel: u8,
    pub head_h: u8,
    pub head_v: u8,
    pub waist: u8,
}

impl DriveChannels {
    pub fn resolve(registry: &JointRegistry) -> Result<Self> {
        Ok(Self {
            left_wheel: registry.resolve(LEFT_WHEEL)?,
            right_wheel: registry.resolve(RIGHT_WHEEL)?,
            head_h: registry.resolve(HEAD_H)?,
            head_v: registry.resolve(HEAD_V)?,
            waist: registry.resolve(WAIST)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_map_resolves() {
        let reg = JointRegistry::standard();
        assert_eq!(reg.resolve(RIGHT_WHEEL).unwrap(), 0);
        assert_eq!(reg.resolve(LEFT_WHEEL).unwrap(), 1);
        assert_eq!(reg.resolve("lGripper").unwrap(), 16);
        assert_eq!(reg.len(), 17);
        assert_eq!(reg.joints().next(), Some((WAIST, 2)));
    }

    #[test]
    fn unknown_name_fails() {
        let reg = JointRegistry::standard();
        assert!(matches!(reg.resolve("tail"), Err(RobotError::UnknownJoint(n)) if n == "tail"));
    }

    #[test]
    fn missing_required_joint_fails_at_construction() {
        let err = JointRegistry::new([(LEFT_WHEEL, 1), (RIGHT_WHEEL, 0), (HEAD_H, 3), (HEAD_V, 4)]);
        assert!(matches!(err, Err(RobotError::Config(_))));
    }

    #[test]
    fn duplicate_channel_fails() {
        let err = JointRegistry::new([
            (LEFT_WHEEL, 1),
            (RIGHT_WHEEL, 1),
            (HEAD_H, 3),
            (HEAD_V, 4),
            (WAIST, 2),
        ]);
        assert!(matches!(err, Err(RobotError::Config(_))));
    }

    #[test]
    fn standard_equals_validated_defaults() {
        let validated = JointRegistry::new(DEFAULT_JOINTS).unwrap();
        let standard = JointRegistry::standard();
        assert!(validated.joints().eq(standard.joints()));
    }
}
