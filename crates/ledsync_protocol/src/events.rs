//! The socket event vocabulary between participants and the router.

use serde::{Deserialize, Serialize};

use ledsync_core::MicroId;

use crate::envelope::ActionEnvelope;

/// Events a participant sends to the router.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ClientEvent {
    /// A web client announcing itself; the router replies with a full-state
    /// snapshot.
    #[serde(rename = "INIT_WEB_CLIENT")]
    InitWebClient,

    /// A light client announcing itself; the router asks it to re-report
    /// its hardware.
    #[serde(rename = "INIT_LIGHT_CLIENT", rename_all = "camelCase")]
    InitLightClient {
        /// Stable gateway identity, chosen by the gateway.
        client_id: String,
    },

    /// A light client subscribing to the channel of a micro it owns.
    /// Sent once per attached microcontroller.
    #[serde(rename = "ADD_MICRO_CHANNEL", rename_all = "camelCase")]
    AddMicroChannel {
        /// The owned micro.
        micro_id: MicroId,
    },

    /// A state-mutating action with its routing metadata.
    #[serde(rename = "ROOT_ACTION")]
    RootAction(ActionEnvelope),

    /// A request to make every participant rebuild its state.
    #[serde(rename = "RE_INIT_APP_STATE")]
    ReInitAppState,
}

impl ClientEvent {
    /// The wire name of this event, for logging.
    pub fn name(&self) -> &'static str {
        match self {
            ClientEvent::InitWebClient => "INIT_WEB_CLIENT",
            ClientEvent::InitLightClient { .. } => "INIT_LIGHT_CLIENT",
            ClientEvent::AddMicroChannel { .. } => "ADD_MICRO_CHANNEL",
            ClientEvent::RootAction(_) => "ROOT_ACTION",
            ClientEvent::ReInitAppState => "RE_INIT_APP_STATE",
        }
    }
}

/// Events the router delivers to a participant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ServerEvent {
    /// An action to apply locally.
    #[serde(rename = "ROOT_ACTION")]
    RootAction(ActionEnvelope),

    /// Drop local state; light clients re-report their hardware in
    /// response.
    #[serde(rename = "RE_INIT_APP_STATE")]
    ReInitAppState,
}

impl ServerEvent {
    /// The wire name of this event, for logging.
    pub fn name(&self) -> &'static str {
        match self {
            ServerEvent::RootAction(_) => "ROOT_ACTION",
            ServerEvent::ReInitAppState => "RE_INIT_APP_STATE",
        }
    }
}
