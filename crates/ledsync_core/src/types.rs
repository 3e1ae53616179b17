//! Identifier newtypes and enumerated codes shared across the workspace.

use std::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Identifier of one microcontroller-managed LED strip.
///
/// Assigned once (by the device or the server) and never reused within a
/// running system's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MicroId(i64);

impl MicroId {
    /// Creates an id from its raw numeric value.
    pub const fn new(value: i64) -> Self {
        Self(value)
    }

    /// Returns the raw numeric value.
    pub const fn value(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for MicroId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for MicroId {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

/// Identifier of one LED segment.
///
/// Stable across splits and merges that do not destroy the segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SegmentId(i64);

impl SegmentId {
    /// Creates an id from its raw numeric value.
    pub const fn new(value: i64) -> Self {
        Self(value)
    }

    /// Returns the raw numeric value.
    pub const fn value(&self) -> i64 {
        self.0
    }

    /// Generates a fresh id.
    ///
    /// Ids are drawn from a large random space; the store rejects the
    /// (astronomically unlikely) collision with a live id rather than
    /// retrying, so a generated id is safe to embed in an action payload
    /// before the action is applied.
    pub fn generate() -> Self {
        Self(rand::thread_rng().gen_range(1..i64::MAX))
    }
}

impl fmt::Display for SegmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for SegmentId {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

/// Identifier of a segment group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GroupId(i64);

impl GroupId {
    /// Creates an id from its raw numeric value.
    pub const fn new(value: i64) -> Self {
        Self(value)
    }

    /// Returns the raw numeric value.
    pub const fn value(&self) -> i64 {
        self.0
    }

    /// Generates a fresh id.
    pub fn generate() -> Self {
        Self(rand::thread_rng().gen_range(1..i64::MAX))
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for GroupId {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

/// Side selector for split and merge operations, in strip order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Direction {
    /// Toward the strip's first LED.
    Left,
    /// Toward the strip's last LED.
    Right,
}

impl Direction {
    /// Returns the opposite side.
    pub fn opposite(&self) -> Self {
        match self {
            Direction::Left => Direction::Right,
            Direction::Right => Direction::Left,
        }
    }

    /// Converts to the numeric code used on the serial wire.
    pub fn to_code(&self) -> u8 {
        match self {
            Direction::Left => 0,
            Direction::Right => 1,
        }
    }

    /// Converts from a numeric code.
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Direction::Left),
            1 => Some(Direction::Right),
            _ => None,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Left => write!(f, "left"),
            Direction::Right => write!(f, "right"),
        }
    }
}

/// Visual effect a segment can run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Effect {
    /// Rolling color waves.
    #[serde(rename = "COLORWAVES")]
    ColorWaves,
    /// Two-palette blend.
    #[serde(rename = "BLENDWAVE")]
    BlendWave,
}

impl Effect {
    /// Converts to the numeric code used on the serial wire and in
    /// persisted hashes.
    pub fn to_code(&self) -> u8 {
        match self {
            Effect::ColorWaves => 0,
            Effect::BlendWave => 1,
        }
    }

    /// Converts from a numeric code.
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Effect::ColorWaves),
            1 => Some(Effect::BlendWave),
            _ => None,
        }
    }
}

/// Who drives a segment's effect.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EffectControl {
    /// The segment's own effect field is authoritative.
    #[default]
    Individual,
    /// A segment group drives the effect.
    Group(GroupId),
}

impl EffectControl {
    /// Numeric form stored in segment hashes: `0` for individual control,
    /// the group id otherwise. Group ids are generated from `1..`, so `0`
    /// is never ambiguous.
    pub fn to_code(&self) -> i64 {
        match self {
            EffectControl::Individual => 0,
            EffectControl::Group(group_id) => group_id.value(),
        }
    }

    /// Converts from the numeric hash form.
    pub fn from_code(code: i64) -> Self {
        if code == 0 {
            EffectControl::Individual
        } else {
            EffectControl::Group(GroupId::new(code))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn effect_codes() {
        assert_eq!(Effect::ColorWaves.to_code(), 0);
        assert_eq!(Effect::BlendWave.to_code(), 1);

        assert_eq!(Effect::from_code(0), Some(Effect::ColorWaves));
        assert_eq!(Effect::from_code(1), Some(Effect::BlendWave));
        assert_eq!(Effect::from_code(7), None);
    }

    #[test]
    fn direction_codes_and_opposite() {
        assert_eq!(Direction::Left.to_code(), 0);
        assert_eq!(Direction::Right.to_code(), 1);
        assert_eq!(Direction::from_code(1), Some(Direction::Right));
        assert_eq!(Direction::from_code(2), None);

        assert_eq!(Direction::Left.opposite(), Direction::Right);
        assert_eq!(Direction::Right.opposite(), Direction::Left);
    }

    #[test]
    fn effect_control_code_roundtrip() {
        assert_eq!(EffectControl::Individual.to_code(), 0);
        assert_eq!(EffectControl::from_code(0), EffectControl::Individual);

        let group = GroupId::new(42);
        assert_eq!(EffectControl::Group(group).to_code(), 42);
        assert_eq!(EffectControl::from_code(42), EffectControl::Group(group));
    }

    #[test]
    fn generated_segment_ids_are_positive() {
        for _ in 0..100 {
            assert!(SegmentId::generate().value() > 0);
        }
    }

    #[test]
    fn effect_serializes_with_wire_names() {
        let json = serde_json::to_string(&Effect::ColorWaves).unwrap();
        assert_eq!(json, "\"COLORWAVES\"");
        let back: Effect = serde_json::from_str("\"BLENDWAVE\"").unwrap();
        assert_eq!(back, Effect::BlendWave);
    }
}
