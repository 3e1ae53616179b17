//! Channel membership and event delivery.

use std::collections::{HashMap, HashSet};

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::warn;

use ledsync_core::MicroId;
use ledsync_protocol::{ChannelName, ServerEvent};

use crate::session::ParticipantId;

/// Holds every participant's delivery queue and channel memberships.
///
/// Delivery queues are unbounded: the router never blocks on a slow
/// consumer, and a participant whose queue receiver is gone is simply
/// skipped. Backpressure applies upstream, at the action pipeline.
#[derive(Debug, Default)]
pub struct ChannelHub {
    senders: HashMap<ParticipantId, UnboundedSender<ServerEvent>>,
    channels: HashMap<ChannelName, HashSet<ParticipantId>>,
}

impl ChannelHub {
    /// Creates an empty hub.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a participant and returns its delivery queue.
    pub fn register(&mut self, participant: ParticipantId) -> UnboundedReceiver<ServerEvent> {
        let (sender, receiver) = mpsc::unbounded_channel();
        self.senders.insert(participant, sender);
        receiver
    }

    /// Removes a participant from every channel and drops its queue.
    pub fn unregister(&mut self, participant: ParticipantId) {
        self.senders.remove(&participant);
        for members in self.channels.values_mut() {
            members.remove(&participant);
        }
        self.channels.retain(|_, members| !members.is_empty());
    }

    /// Adds a participant to a channel.
    pub fn join(&mut self, participant: ParticipantId, channel: ChannelName) {
        self.channels.entry(channel).or_default().insert(participant);
    }

    /// The micro channels a participant has joined.
    pub fn micro_channels_of(&self, participant: ParticipantId) -> Vec<MicroId> {
        let mut micro_ids: Vec<MicroId> = self
            .channels
            .iter()
            .filter_map(|(channel, members)| match channel {
                ChannelName::Micro(micro_id) if members.contains(&participant) => Some(*micro_id),
                _ => None,
            })
            .collect();
        micro_ids.sort();
        micro_ids
    }

    /// Delivers an event to one participant.
    pub fn send_to(&self, participant: ParticipantId, event: ServerEvent) {
        let Some(sender) = self.senders.get(&participant) else {
            warn!(%participant, event = event.name(), "dropping event for unregistered participant");
            return;
        };
        if sender.send(event).is_err() {
            warn!(%participant, "delivery queue receiver is gone");
        }
    }

    /// Delivers an event to every member of a channel except `exclude`.
    ///
    /// Returns the number of participants delivered to.
    pub fn broadcast(
        &self,
        channel: &ChannelName,
        event: &ServerEvent,
        exclude: Option<ParticipantId>,
    ) -> usize {
        let Some(members) = self.channels.get(channel) else {
            return 0;
        };
        let mut delivered = 0;
        for member in members {
            if Some(*member) == exclude {
                continue;
            }
            self.send_to(*member, event.clone());
            delivered += 1;
        }
        delivered
    }

    /// Delivers an event to every registered participant except `exclude`.
    pub fn broadcast_all(&self, event: &ServerEvent, exclude: Option<ParticipantId>) {
        for participant in self.senders.keys() {
            if Some(*participant) == exclude {
                continue;
            }
            self.send_to(*participant, event.clone());
        }
    }
}
