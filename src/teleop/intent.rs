//! intent.rs
//! Latest operator intent, shared between request handlers and the loop.
//!
//! The snapshot is `Copy`: writers replace fields under the write lock, the
//! loop copies the whole value once per tick. A reader never sees x from one
//! update paired with y from another.

use parking_lot::RwLock;
use serde::{Deserialize, Deserializer, Serialize, de};
use std::sync::Arc;

use crate::actuator::driver::{NEUTRAL, clamp_target};
use crate::utils::error::{Result, RobotError};

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct IntentSnapshot {
    pub x: f64,
    pub y: f64,
    #[serde(rename = "headH")]
    pub head_h: u16,
    #[serde(rename = "headV")]
    pub head_v: u16,
    pub waist: u16,
}

impl Default for IntentSnapshot {
    fn default() -> Self {
        Self { x: 0.0, y: 0.0, head_h: NEUTRAL, head_v: NEUTRAL, waist: NEUTRAL }
    }
}

/// Joystick payload. Missing axes read as centered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
pub struct JoystickUpdate {
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
}

/// Slider payload. Absent fields leave the stored value untouched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct SliderUpdate {
    #[serde(rename = "headH", default, deserialize_with = "slider_value")]
    pub head_h: Option<i64>,
    #[serde(rename = "headV", default, deserialize_with = "slider_value")]
    pub head_v: Option<i64>,
    #[serde(default, deserialize_with = "slider_value")]
    pub waist: Option<i64>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawSlider {
    Int(i64),
    Float(f64),
    Text(String),
}

/// Range inputs arrive as integers, floats or numeric strings depending on
/// the page. Floats truncate toward zero.
fn slider_value<'de, D>(deserializer: D) -> std::result::Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = match Option::<RawSlider>::deserialize(deserializer)? {
        Some(raw) => raw,
        None => return Ok(None),
    };
    match raw {
        RawSlider::Int(v) => Ok(Some(v)),
        RawSlider::Float(v) if v.is_finite() => Ok(Some(v.trunc() as i64)),
        RawSlider::Float(v) => Err(de::Error::custom(format!("slider value {} is not finite", v))),
        RawSlider::Text(text) => text
            .trim()
            .parse::<i64>()
            .map(Some)
            .map_err(|_| de::Error::custom(format!("slider value {:?} is not an integer", text))),
    }
}

#[derive(Debug, Clone, Default)]
pub struct IntentState {
    inner: Arc<RwLock<IntentSnapshot>>,
}

impl IntentState {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn snapshot(&self) -> IntentSnapshot {
        *self.inner.read()
    }

    /// Stores both axes, clamped to [-1, 1]. Non-finite input is rejected
    /// and the stored intent is left unchanged.
    pub fn set_joystick(&self, update: JoystickUpdate) -> Result<IntentSnapshot> {
        if !update.x.is_finite() || !update.y.is_finite() {
            return Err(RobotError::InvalidInput(format!(
                "joystick axes must be finite (x={}, y={})",
                update.x, update.y
            )));
        }
        let mut s = self.inner.write();
        s.x = update.x.clamp(-1.0, 1.0);
        s.y = update.y.clamp(-1.0, 1.0);
        Ok(*s)
    }

    /// Applies the present slider fields, each clamped to [4000, 8000].
    pub fn apply_sliders(&self, update: SliderUpdate) -> IntentSnapshot {
        let mut s = self.inner.write();
        if let Some(v) = update.head_h {
            s.head_h = clamp_target(v);
        }
        if let Some(v) = update.head_v {
            s.head_v = clamp_target(v);
        }
        if let Some(v) = update.waist {
            s.waist = clamp_target(v);
        }
        *s
    }

    /// Centered joystick, neutral head and waist.
    pub fn reset(&self) -> IntentSnapshot {
        let mut s = self.inner.write();
        *s = IntentSnapshot::default();
        *s
    }
}
