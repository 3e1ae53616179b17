//! The action envelope carried by the transport.
//!
//! On the wire an envelope is the action's `{ "type", "payload" }` shape with
//! an optional `meta` block naming the originating role and the channel the
//! action is addressed to.

use serde::{Deserialize, Serialize};

use ledsync_core::{Action, MicroId};

use crate::channel::ChannelName;

/// Which role produced an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Source {
    /// A browser UI.
    #[serde(rename = "WEB_CLIENT")]
    WebClient,
    /// A serial gateway process.
    #[serde(rename = "LIGHT_CLIENT")]
    LightClient,
}

/// Provenance and addressing for one action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionMeta {
    /// The role that produced the action.
    pub source: Source,
    /// The channel the action is addressed to.
    pub destination: ChannelName,
}

/// An action plus its routing metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionEnvelope {
    /// The mutation itself.
    #[serde(flatten)]
    pub action: Action,
    /// Routing metadata; absent for server-synthesized envelopes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<ActionMeta>,
}

impl ActionEnvelope {
    /// Wraps an action with no metadata (server-originated).
    pub fn server(action: Action) -> Self {
        Self { action, meta: None }
    }

    /// Wraps an action originated by a web client, addressed to a micro.
    pub fn from_web_client(action: Action, destination: MicroId) -> Self {
        Self {
            action,
            meta: Some(ActionMeta {
                source: Source::WebClient,
                destination: ChannelName::Micro(destination),
            }),
        }
    }

    /// Wraps an action originated by a light client.
    ///
    /// Hardware-originated changes are only ever mirrored to web clients,
    /// so the destination is the web-clients group.
    pub fn from_light_client(action: Action) -> Self {
        Self {
            action,
            meta: Some(ActionMeta {
                source: Source::LightClient,
                destination: ChannelName::WebClients,
            }),
        }
    }

    /// The originating role, if the envelope carries one.
    pub fn source(&self) -> Option<Source> {
        self.meta.map(|meta| meta.source)
    }

    /// The addressed channel, if the envelope carries one.
    pub fn destination(&self) -> Option<ChannelName> {
        self.meta.map(|meta| meta.destination)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ledsync_core::{Direction, Effect, SegmentId};

    fn split_action() -> Action {
        Action::split_segment(
            MicroId::new(1),
            SegmentId::new(10),
            Direction::Right,
            Effect::BlendWave,
            SegmentId::new(11),
        )
    }

    #[test]
    fn envelope_flattens_the_action() {
        let envelope = ActionEnvelope::from_web_client(split_action(), MicroId::new(1));
        let json = serde_json::to_value(&envelope).unwrap();

        assert_eq!(json["type"], "SPLIT_SEGMENT");
        assert_eq!(json["payload"]["microId"], 1);
        assert_eq!(json["meta"]["source"], "WEB_CLIENT");
        assert_eq!(json["meta"]["destination"], "1");

        let back: ActionEnvelope = serde_json::from_value(json).unwrap();
        assert_eq!(back, envelope);
    }

    #[test]
    fn server_envelope_omits_meta() {
        let envelope = ActionEnvelope::server(Action::ResetAllState);
        let json = serde_json::to_value(&envelope).unwrap();
        assert!(json.get("meta").is_none());
        assert_eq!(envelope.source(), None);
    }

    #[test]
    fn light_client_envelope_targets_web_clients() {
        let envelope = ActionEnvelope::from_light_client(Action::set_micro_brightness(
            MicroId::new(2),
            128,
        ));
        assert_eq!(envelope.source(), Some(Source::LightClient));
        assert_eq!(envelope.destination(), Some(ChannelName::WebClients));
    }
}
