//! # ledsync protocol
//!
//! Wire-level vocabulary shared by ledsync participants: the action envelope
//! with `{source, destination}` routing metadata, the channel names
//! connections join, the socket event set, and the line codec for the
//! microcontroller serial protocol.
//!
//! This crate defines shapes and codecs only; transports (socket server,
//! serial port) live with their owners and speak these types at the seam.

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod channel;
pub mod envelope;
pub mod error;
pub mod events;
pub mod serial;

pub use channel::ChannelName;
pub use envelope::{ActionEnvelope, ActionMeta, Source};
pub use error::{ProtocolError, ProtocolResult};
pub use events::{ClientEvent, ServerEvent};
pub use serial::{
    parse_report, MicroCommand, MicroReport, MicroStateReport, ReportedSegment, SerialLink,
    TelemetryReport, TelemetryTag,
};
