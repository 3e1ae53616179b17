//! Broadcast channel names.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use ledsync_core::MicroId;

use crate::error::ProtocolError;

/// The role-group channels plus one channel per micro.
const WEB_CLIENTS: &str = "WEB_CLIENTS";
const LIGHT_CLIENTS: &str = "LIGHT_CLIENTS";

/// A named broadcast group a connection can join.
///
/// Serialized as a plain string: the two role-group names, or the
/// stringified micro id for per-micro channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelName {
    /// Every joined web client.
    WebClients,
    /// Every joined light client.
    LightClients,
    /// The light client owning this micro.
    Micro(MicroId),
}

impl fmt::Display for ChannelName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelName::WebClients => f.write_str(WEB_CLIENTS),
            ChannelName::LightClients => f.write_str(LIGHT_CLIENTS),
            ChannelName::Micro(micro_id) => write!(f, "{micro_id}"),
        }
    }
}

impl FromStr for ChannelName {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            WEB_CLIENTS => Ok(ChannelName::WebClients),
            LIGHT_CLIENTS => Ok(ChannelName::LightClients),
            other => other
                .parse::<i64>()
                .map(|id| ChannelName::Micro(MicroId::new(id)))
                .map_err(|_| ProtocolError::UnknownChannel {
                    name: other.to_string(),
                }),
        }
    }
}

impl Serialize for ChannelName {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ChannelName {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        name.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_groups_roundtrip_by_name() {
        assert_eq!(ChannelName::WebClients.to_string(), "WEB_CLIENTS");
        assert_eq!(ChannelName::LightClients.to_string(), "LIGHT_CLIENTS");
        assert_eq!(
            "WEB_CLIENTS".parse::<ChannelName>().unwrap(),
            ChannelName::WebClients
        );
        assert_eq!(
            "LIGHT_CLIENTS".parse::<ChannelName>().unwrap(),
            ChannelName::LightClients
        );
    }

    #[test]
    fn micro_channels_are_stringified_ids() {
        let channel = ChannelName::Micro(MicroId::new(42));
        assert_eq!(channel.to_string(), "42");
        assert_eq!("42".parse::<ChannelName>().unwrap(), channel);
    }

    #[test]
    fn garbage_names_are_rejected() {
        let err = "basement".parse::<ChannelName>().unwrap_err();
        assert!(matches!(err, ProtocolError::UnknownChannel { .. }));
    }

    #[test]
    fn serde_uses_the_string_form() {
        let channel = ChannelName::Micro(MicroId::new(7));
        let json = serde_json::to_string(&channel).unwrap();
        assert_eq!(json, "\"7\"");
        let back: ChannelName = serde_json::from_str("\"WEB_CLIENTS\"").unwrap();
        assert_eq!(back, ChannelName::WebClients);
    }
}
