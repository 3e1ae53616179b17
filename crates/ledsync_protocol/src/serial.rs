//! Line codec for the microcontroller serial protocol.
//!
//! Devices speak line-delimited JSON arrays at 115200 baud: one message per
//! `\n`-terminated line, first element a numeric tag. Commands flow
//! gateway-to-device; reports flow device-to-gateway and are either a full
//! state dump or a small telemetry tuple. The physical port is owned by the
//! gateway process; this module only encodes and parses lines.

use serde_json::{json, Value};

use ledsync_core::{
    compute_boundaries, Action, Direction, Effect, EffectControl, Micro, MicroId,
    MicrosAndSegments, Segment, SegmentId,
};

use crate::error::{ProtocolError, ProtocolResult};

/// Numeric tags on the serial wire. `GET_STATE` doubles as the tag of the
/// full-state report a device answers with.
pub mod tags {
    /// Request a full-state report.
    pub const GET_STATE: i64 = 1;
    /// Factory-reset the strip to one full-length segment.
    pub const RESET_MICRO_STATE: i64 = 2;
    /// Split one segment in two.
    pub const SPLIT_SEGMENT: i64 = 3;
    /// Merge one segment into a neighbor.
    pub const MERGE_SEGMENTS: i64 = 4;
    /// Move every cut point at once.
    pub const RESIZE_SEGMENTS_FROM_BOUNDARIES: i64 = 5;
    /// Change one segment's effect.
    pub const SET_SEGMENT_EFFECT: i64 = 6;
    /// Change the strip-wide brightness.
    pub const SET_MICRO_BRIGHTNESS: i64 = 7;
    /// Telemetry: device-side error.
    pub const ERROR: i64 = 8;
    /// Telemetry: device-side warning.
    pub const WARNING: i64 = 9;
    /// Telemetry: informational note.
    pub const INFO: i64 = 10;
    /// Telemetry: debug chatter.
    pub const DEBUG: i64 = 11;
    /// Telemetry: liveness ping.
    pub const PING: i64 = 12;
}

/// A command a gateway writes to a device.
#[derive(Debug, Clone, PartialEq)]
pub enum MicroCommand {
    /// `[GET_STATE]`
    GetState,
    /// `[RESET_MICRO_STATE]`
    ResetMicroState,
    /// `[SPLIT_SEGMENT, newEffect, direction, segmentId, newSegmentId]`
    SplitSegment {
        /// Effect for the new half.
        new_effect: Effect,
        /// Side on which the new half is placed.
        direction: Direction,
        /// Segment to split.
        segment_id: SegmentId,
        /// Originator-chosen id for the new half.
        new_segment_id: SegmentId,
    },
    /// `[MERGE_SEGMENTS, segmentId, direction]`
    MergeSegments {
        /// Segment to merge away.
        segment_id: SegmentId,
        /// Neighbor that absorbs it.
        direction: Direction,
    },
    /// `[RESIZE_SEGMENTS_FROM_BOUNDARIES, boundaries]`
    ResizeSegmentsFromBoundaries {
        /// The new cut points.
        boundaries: Vec<u32>,
    },
    /// `[SET_SEGMENT_EFFECT, newEffect, segmentId]`
    SetSegmentEffect {
        /// The effect to run.
        new_effect: Effect,
        /// Segment whose effect changes.
        segment_id: SegmentId,
    },
    /// `[SET_MICRO_BRIGHTNESS, brightness]`
    SetMicroBrightness {
        /// New strip-wide brightness.
        brightness: u8,
    },
}

impl MicroCommand {
    /// Encodes the command as one newline-terminated wire line.
    pub fn encode_line(&self) -> String {
        let value = match self {
            MicroCommand::GetState => json!([tags::GET_STATE]),
            MicroCommand::ResetMicroState => json!([tags::RESET_MICRO_STATE]),
            MicroCommand::SplitSegment {
                new_effect,
                direction,
                segment_id,
                new_segment_id,
            } => json!([
                tags::SPLIT_SEGMENT,
                new_effect.to_code(),
                direction.to_code(),
                segment_id.value(),
                new_segment_id.value(),
            ]),
            MicroCommand::MergeSegments {
                segment_id,
                direction,
            } => json!([
                tags::MERGE_SEGMENTS,
                segment_id.value(),
                direction.to_code()
            ]),
            MicroCommand::ResizeSegmentsFromBoundaries { boundaries } => {
                json!([tags::RESIZE_SEGMENTS_FROM_BOUNDARIES, boundaries])
            }
            MicroCommand::SetSegmentEffect {
                new_effect,
                segment_id,
            } => json!([
                tags::SET_SEGMENT_EFFECT,
                new_effect.to_code(),
                segment_id.value()
            ]),
            MicroCommand::SetMicroBrightness { brightness } => {
                json!([tags::SET_MICRO_BRIGHTNESS, brightness])
            }
        };
        format!("{value}\n")
    }

    /// Translates a forwarded action into the command a gateway writes to
    /// the addressed device. Returns `None` for kinds with no hardware
    /// counterpart (bulk adds, group management, resets of the server
    /// model).
    pub fn from_action(action: &Action) -> Option<Self> {
        match action {
            Action::SplitSegment(p) => Some(MicroCommand::SplitSegment {
                new_effect: p.new_effect,
                direction: p.direction,
                segment_id: p.segment_id,
                new_segment_id: p.new_segment_id,
            }),
            Action::MergeSegments(p) => Some(MicroCommand::MergeSegments {
                segment_id: p.segment_id,
                direction: p.direction,
            }),
            Action::ResizeSegmentsFromBoundaries(p) => {
                Some(MicroCommand::ResizeSegmentsFromBoundaries {
                    boundaries: p.segment_boundaries.clone(),
                })
            }
            Action::SetSegmentEffect(p) => Some(MicroCommand::SetSegmentEffect {
                new_effect: p.new_effect,
                segment_id: p.segment_id,
            }),
            Action::SetMicroBrightness(p) => Some(MicroCommand::SetMicroBrightness {
                brightness: p.brightness,
            }),
            _ => None,
        }
    }
}

/// One segment as a device reports it: `[offset, numLEDs, effect, segmentId]`.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportedSegment {
    /// First LED of the range.
    pub offset: u32,
    /// Number of LEDs in the range.
    pub num_leds: u32,
    /// Effect the range is running.
    pub effect: Effect,
    /// The device's id for this segment.
    pub segment_id: SegmentId,
}

/// A device's full-state report.
#[derive(Debug, Clone, PartialEq)]
pub struct MicroStateReport {
    /// The reporting device.
    pub micro_id: MicroId,
    /// Addressable strip length.
    pub total_leds: u32,
    /// Current strip-wide brightness.
    pub brightness: u8,
    /// Segments in strip order.
    pub segments: Vec<ReportedSegment>,
}

impl MicroStateReport {
    /// Converts the report into the bulk-add payload shape.
    ///
    /// Every reported segment starts under individual control, and the
    /// boundary list is recomputed rather than trusted from the device.
    pub fn into_add_micros(self) -> MicrosAndSegments {
        let mut segments: Vec<Segment> = self
            .segments
            .into_iter()
            .map(|reported| Segment {
                segment_id: reported.segment_id,
                micro_id: self.micro_id,
                offset: reported.offset,
                num_leds: reported.num_leds,
                effect: reported.effect,
                effect_controlled_by: EffectControl::Individual,
            })
            .collect();
        segments.sort_by_key(|s| s.offset);

        let micro = Micro {
            micro_id: self.micro_id,
            total_leds: self.total_leds,
            brightness: self.brightness,
            segment_ids: segments.iter().map(|s| s.segment_id).collect(),
            segment_boundaries: compute_boundaries(&segments),
        };

        let mut collections = MicrosAndSegments::default();
        collections.micros.insert(micro.micro_id, micro);
        for segment in segments {
            collections.segments.insert(segment.segment_id, segment);
        }
        collections
    }
}

/// Severity of a telemetry tuple.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TelemetryTag {
    /// Device-side error.
    Error,
    /// Device-side warning.
    Warning,
    /// Informational note.
    Info,
    /// Debug chatter.
    Debug,
    /// Liveness ping.
    Ping,
}

impl TelemetryTag {
    /// Converts from a wire tag.
    pub fn from_tag(tag: i64) -> Option<Self> {
        match tag {
            tags::ERROR => Some(TelemetryTag::Error),
            tags::WARNING => Some(TelemetryTag::Warning),
            tags::INFO => Some(TelemetryTag::Info),
            tags::DEBUG => Some(TelemetryTag::Debug),
            tags::PING => Some(TelemetryTag::Ping),
            _ => None,
        }
    }
}

/// A short telemetry tuple: `[tag, microId, detail?]`.
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetryReport {
    /// Severity of the message.
    pub tag: TelemetryTag,
    /// The reporting device.
    pub micro_id: MicroId,
    /// Free-form detail, when the device sent one.
    pub detail: Option<String>,
}

/// Any message a device sends upstream.
#[derive(Debug, Clone, PartialEq)]
pub enum MicroReport {
    /// A full-state report.
    State(MicroStateReport),
    /// A telemetry tuple.
    Telemetry(TelemetryReport),
}

/// The collaborator seam to the physical serial layer: "send this command
/// to the device identified by `micro_id`". Implemented by the gateway's
/// port multiplexer; report delivery happens on the gateway's read loop via
/// [`parse_report`].
pub trait SerialLink {
    /// Writes one command to the addressed device.
    fn send_command(&self, micro_id: MicroId, command: &MicroCommand) -> ProtocolResult<()>;
}

/// Parses one report line.
pub fn parse_report(line: &str) -> ProtocolResult<MicroReport> {
    let value: Value = serde_json::from_str(line.trim_end())?;
    let items = value
        .as_array()
        .ok_or_else(|| ProtocolError::invalid_message("report is not an array"))?;
    let tag = int_at(items, 0, "tag")?;

    if tag == tags::GET_STATE {
        return parse_state_report(items).map(MicroReport::State);
    }
    if let Some(telemetry_tag) = TelemetryTag::from_tag(tag) {
        let micro_id = MicroId::new(int_at(items, 1, "microId")?);
        let detail = items
            .get(2)
            .and_then(Value::as_str)
            .map(ToString::to_string);
        return Ok(MicroReport::Telemetry(TelemetryReport {
            tag: telemetry_tag,
            micro_id,
            detail,
        }));
    }

    Err(ProtocolError::UnknownTag { tag })
}

fn parse_state_report(items: &[Value]) -> ProtocolResult<MicroStateReport> {
    let micro_id = MicroId::new(int_at(items, 1, "microId")?);
    let total_leds = uint_at(items, 2, "totalLEDs")?;
    let brightness = uint_at(items, 3, "brightness")?;
    let brightness = u8::try_from(brightness)
        .map_err(|_| ProtocolError::invalid_message(format!("brightness {brightness} > 255")))?;

    let raw_segments = items
        .get(4)
        .and_then(Value::as_array)
        .ok_or_else(|| ProtocolError::invalid_message("missing segments array"))?;

    let mut segments = Vec::with_capacity(raw_segments.len());
    for raw in raw_segments {
        let fields = raw
            .as_array()
            .ok_or_else(|| ProtocolError::invalid_message("segment is not an array"))?;
        let effect_code = int_at(fields, 2, "effect")?;
        let effect = Effect::from_code(
            u8::try_from(effect_code)
                .map_err(|_| ProtocolError::UnknownEffect { code: effect_code })?,
        )
        .ok_or(ProtocolError::UnknownEffect { code: effect_code })?;
        segments.push(ReportedSegment {
            offset: uint_at(fields, 0, "offset")?,
            num_leds: uint_at(fields, 1, "numLEDs")?,
            effect,
            segment_id: SegmentId::new(int_at(fields, 3, "segmentId")?),
        });
    }

    Ok(MicroStateReport {
        micro_id,
        total_leds,
        brightness,
        segments,
    })
}

fn int_at(items: &[Value], index: usize, field: &str) -> ProtocolResult<i64> {
    items
        .get(index)
        .and_then(Value::as_i64)
        .ok_or_else(|| ProtocolError::invalid_message(format!("missing or non-integer {field}")))
}

fn uint_at(items: &[Value], index: usize, field: &str) -> ProtocolResult<u32> {
    let value = int_at(items, index, field)?;
    u32::try_from(value)
        .map_err(|_| ProtocolError::invalid_message(format!("{field} {value} out of range")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commands_encode_as_tagged_arrays() {
        assert_eq!(MicroCommand::GetState.encode_line(), "[1]\n");
        assert_eq!(
            MicroCommand::SplitSegment {
                new_effect: Effect::BlendWave,
                direction: Direction::Right,
                segment_id: SegmentId::new(10),
                new_segment_id: SegmentId::new(11),
            }
            .encode_line(),
            "[3,1,1,10,11]\n"
        );
        assert_eq!(
            MicroCommand::MergeSegments {
                segment_id: SegmentId::new(10),
                direction: Direction::Left,
            }
            .encode_line(),
            "[4,10,0]\n"
        );
        assert_eq!(
            MicroCommand::ResizeSegmentsFromBoundaries {
                boundaries: vec![30, 60],
            }
            .encode_line(),
            "[5,[30,60]]\n"
        );
        assert_eq!(
            MicroCommand::SetMicroBrightness { brightness: 200 }.encode_line(),
            "[7,200]\n"
        );
    }

    #[test]
    fn per_micro_actions_translate_to_commands() {
        let action = Action::split_segment(
            MicroId::new(1),
            SegmentId::new(10),
            Direction::Right,
            Effect::BlendWave,
            SegmentId::new(11),
        );
        let command = MicroCommand::from_action(&action).unwrap();
        assert!(matches!(command, MicroCommand::SplitSegment { .. }));

        assert_eq!(MicroCommand::from_action(&Action::ResetAllState), None);
        assert_eq!(
            MicroCommand::from_action(&Action::remove_micros(vec![MicroId::new(1)])),
            None
        );
    }

    #[test]
    fn state_report_parses_and_converts() {
        let line = "[1, 7, 100, 255, [[0, 50, 0, 10], [50, 50, 1, 11]]]\n";
        let report = match parse_report(line).unwrap() {
            MicroReport::State(report) => report,
            other => panic!("expected state report, got {other:?}"),
        };
        assert_eq!(report.micro_id, MicroId::new(7));
        assert_eq!(report.total_leds, 100);
        assert_eq!(report.segments.len(), 2);

        let collections = report.into_add_micros();
        let micro = &collections.micros[&MicroId::new(7)];
        assert_eq!(
            micro.segment_ids,
            vec![SegmentId::new(10), SegmentId::new(11)]
        );
        assert_eq!(micro.segment_boundaries, vec![50]);
        let segment = &collections.segments[&SegmentId::new(11)];
        assert_eq!(segment.effect, Effect::BlendWave);
        assert_eq!(segment.effect_controlled_by, EffectControl::Individual);
    }

    #[test]
    fn report_boundaries_come_from_geometry_not_the_device() {
        // Segments reported out of order still produce ordered state.
        let line = "[1, 7, 60, 128, [[30, 30, 1, 2], [0, 30, 0, 1]]]";
        let report = match parse_report(line).unwrap() {
            MicroReport::State(report) => report,
            other => panic!("expected state report, got {other:?}"),
        };
        let collections = report.into_add_micros();
        let micro = &collections.micros[&MicroId::new(7)];
        assert_eq!(micro.segment_ids, vec![SegmentId::new(1), SegmentId::new(2)]);
        assert_eq!(micro.segment_boundaries, vec![30]);
    }

    #[test]
    fn telemetry_parses_with_and_without_detail() {
        let report = parse_report("[12, 7]").unwrap();
        assert_eq!(
            report,
            MicroReport::Telemetry(TelemetryReport {
                tag: TelemetryTag::Ping,
                micro_id: MicroId::new(7),
                detail: None,
            })
        );

        let report = parse_report("[8, 7, \"segment index out of range\"]").unwrap();
        match report {
            MicroReport::Telemetry(telemetry) => {
                assert_eq!(telemetry.tag, TelemetryTag::Error);
                assert_eq!(
                    telemetry.detail.as_deref(),
                    Some("segment index out of range")
                );
            }
            other => panic!("expected telemetry, got {other:?}"),
        }
    }

    #[test]
    fn unknown_tags_are_named_in_the_error() {
        let err = parse_report("[99, 7]").unwrap_err();
        assert!(matches!(err, ProtocolError::UnknownTag { tag: 99 }));
    }

    #[test]
    fn unknown_effect_codes_are_rejected() {
        let line = "[1, 7, 100, 255, [[0, 100, 9, 10]]]";
        let err = parse_report(line).unwrap_err();
        assert!(matches!(err, ProtocolError::UnknownEffect { code: 9 }));
    }

    #[test]
    fn garbage_lines_are_json_errors() {
        assert!(matches!(
            parse_report("not json").unwrap_err(),
            ProtocolError::Json(_)
        ));
        assert!(matches!(
            parse_report("{\"cmd\": 1}").unwrap_err(),
            ProtocolError::InvalidMessage { .. }
        ));
    }
}
