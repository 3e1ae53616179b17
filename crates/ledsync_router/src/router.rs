//! The router: applies actions through the entity store, persists them, and
//! fans the results out to the right channels.

use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, info, warn};

use ledsync_core::{Action, ActionOutcome, EntityState, EntityStore, MicroId};
use ledsync_protocol::{ActionEnvelope, ChannelName, ClientEvent, ServerEvent};
use ledsync_store::PersistenceMapper;

use crate::config::RouterConfig;
use crate::error::{RouterError, RouterResult};
use crate::hub::ChannelHub;
use crate::session::{ParticipantId, Role, SessionRegistry};

/// The single writer over the entity store.
///
/// All participant traffic is funneled through one `Router` instance (the
/// action pipeline owns it on a dedicated thread), so every action is
/// applied, persisted, and fanned out before the next one is looked at.
///
/// An action is published only after its persistence batch is acknowledged;
/// a failed write leaves the in-memory projection untouched and the
/// originator gets the error.
pub struct Router {
    store: EntityStore,
    mapper: PersistenceMapper,
    hub: ChannelHub,
    sessions: SessionRegistry,
    config: RouterConfig,
}

impl Router {
    /// Opens a router over a persistence mapper, reconstructing the entity
    /// collections from the backend.
    ///
    /// # Errors
    ///
    /// Fails if the backend is unreachable or its records are corrupt; a
    /// router never starts against state it cannot read.
    pub fn open(mapper: PersistenceMapper, config: RouterConfig) -> RouterResult<Self> {
        let collections = mapper.read_all()?;
        info!(
            micros = collections.micros.len(),
            segments = collections.segments.len(),
            "router opened"
        );
        Ok(Self {
            store: EntityStore::from_state(EntityState::from_collections(collections)),
            mapper,
            hub: ChannelHub::new(),
            sessions: SessionRegistry::new(),
            config,
        })
    }

    /// The current entity state.
    pub fn state(&self) -> &EntityState {
        self.store.state()
    }

    /// The configuration the router was opened with.
    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    /// Registers a new connection and returns its delivery queue.
    ///
    /// The participant has no role until it sends an init event.
    pub fn connect(&mut self) -> (ParticipantId, UnboundedReceiver<ServerEvent>) {
        let participant = ParticipantId::generate();
        let receiver = self.hub.register(participant);
        self.sessions.connect(participant);
        debug!(%participant, "participant connected");
        (participant, receiver)
    }

    /// Handles one event from a participant.
    pub fn handle_event(
        &mut self,
        participant: ParticipantId,
        event: ClientEvent,
    ) -> RouterResult<()> {
        if !self.sessions.is_connected(participant) {
            return Err(RouterError::UnknownParticipant { participant });
        }
        debug!(%participant, event = event.name(), "handling event");

        match event {
            ClientEvent::InitWebClient => self.join_web_client(participant),
            ClientEvent::InitLightClient { client_id } => {
                self.join_light_client(participant, client_id)
            }
            ClientEvent::AddMicroChannel { micro_id } => {
                self.add_micro_channel(participant, micro_id)
            }
            ClientEvent::RootAction(envelope) => self.handle_action(participant, envelope),
            ClientEvent::ReInitAppState => self.reinit_all(participant),
        }
    }

    /// Disconnects a participant.
    ///
    /// A light client's disconnect cascades: the micros behind its channels
    /// go dark, so they are removed from the model and the removal is
    /// mirrored to web clients.
    pub fn disconnect(&mut self, participant: ParticipantId) -> RouterResult<()> {
        let is_light_client = matches!(
            self.sessions.role(participant),
            Ok(Role::LightClient { .. })
        );
        if is_light_client {
            self.remove_gateway_micros(participant)?;
        }
        self.hub.unregister(participant);
        self.sessions.disconnect(participant);
        info!(%participant, "participant disconnected");
        Ok(())
    }

    /// Light clients whose requested resync has been outstanding longer
    /// than the configured timeout.
    pub fn stale_resyncs(&self) -> Vec<ParticipantId> {
        self.sessions.stale_resyncs(self.config.resync_timeout)
    }

    /// Logs and returns the stale light clients. They stay connected;
    /// dropping them is the transport's call.
    pub fn sweep_stale_resyncs(&self) -> Vec<ParticipantId> {
        let stale = self.stale_resyncs();
        for participant in &stale {
            warn!(participant = %participant, "light client has not re-reported in time");
        }
        stale
    }

    fn join_web_client(&mut self, participant: ParticipantId) -> RouterResult<()> {
        self.sessions.join(participant, Role::WebClient)?;
        self.hub.join(participant, ChannelName::WebClients);
        info!(%participant, "web client joined");

        // Snapshot from the backend, not the in-memory projection: a web
        // client joining right after a restart sees the same state every
        // other reader of the backend does.
        let snapshot = self.mapper.read_all()?;
        if !snapshot.is_empty() {
            self.hub.send_to(
                participant,
                ServerEvent::RootAction(ActionEnvelope::server(Action::AddMicros(snapshot))),
            );
        }
        Ok(())
    }

    fn join_light_client(
        &mut self,
        participant: ParticipantId,
        client_id: String,
    ) -> RouterResult<()> {
        info!(%participant, client_id, "light client joined");
        self.sessions
            .join(participant, Role::LightClient { client_id })?;
        self.hub.join(participant, ChannelName::LightClients);

        // The gateway's hardware is the source of truth for which micros
        // exist behind it; ask it to report rather than trusting whatever
        // the backend remembers.
        self.hub.send_to(participant, ServerEvent::ReInitAppState);
        self.sessions.mark_resync_requested(participant)
    }

    fn add_micro_channel(
        &mut self,
        participant: ParticipantId,
        micro_id: MicroId,
    ) -> RouterResult<()> {
        match self.sessions.role(participant)? {
            Role::LightClient { .. } => {
                debug!(%participant, %micro_id, "joined micro channel");
                self.hub.join(participant, ChannelName::Micro(micro_id));
                Ok(())
            }
            Role::WebClient => {
                warn!(%participant, %micro_id, "web client asked for a micro channel; ignoring");
                Ok(())
            }
        }
    }

    fn handle_action(
        &mut self,
        participant: ParticipantId,
        envelope: ActionEnvelope,
    ) -> RouterResult<()> {
        let role = self.sessions.role(participant)?.clone();

        let applied = self.store.apply(&envelope.action)?;
        self.mapper
            .write_action(applied.state(), &envelope.action, applied.outcome())?;
        let expanded = match applied.outcome() {
            ActionOutcome::Expanded { actions } => actions.clone(),
            _ => Vec::new(),
        };
        self.store.commit(applied);
        // Only a fleet report settles an outstanding resync request; other
        // traffic from the gateway does not prove it re-reported.
        if matches!(envelope.action, Action::AddMicros(_)) {
            self.sessions.clear_resync(participant);
        }
        debug!(%participant, kind = envelope.action.kind(), "action committed");

        if matches!(envelope.action, Action::ResetAllState) {
            // The backend was flushed as this action's persistence step;
            // every other participant rebuilds from scratch.
            self.hub
                .broadcast_all(&ServerEvent::ReInitAppState, Some(participant));
            for gateway in self.sessions.light_clients() {
                if gateway != participant {
                    self.sessions.mark_resync_requested(gateway)?;
                }
            }
            return Ok(());
        }

        match role {
            Role::WebClient => self.fan_out_from_web(participant, envelope, expanded),
            Role::LightClient { .. } => {
                // Hardware-originated changes are mirrored to UIs only;
                // echoing them back toward the hardware would loop.
                let event = ServerEvent::RootAction(envelope);
                self.hub
                    .broadcast(&ChannelName::WebClients, &event, Some(participant));
            }
        }
        Ok(())
    }

    fn fan_out_from_web(
        &mut self,
        participant: ParticipantId,
        envelope: ActionEnvelope,
        expanded: Vec<Action>,
    ) {
        let event = ServerEvent::RootAction(envelope.clone());
        self.hub
            .broadcast(&ChannelName::WebClients, &event, Some(participant));

        if !expanded.is_empty() {
            // A group effect reaches each member's micro on its own
            // channel, as plain per-segment actions the gateway can
            // translate to serial commands.
            for action in expanded {
                let Some(micro_id) = action.target_micro() else {
                    continue;
                };
                let event =
                    ServerEvent::RootAction(ActionEnvelope::from_web_client(action, micro_id));
                self.hub
                    .broadcast(&ChannelName::Micro(micro_id), &event, Some(participant));
            }
            return;
        }

        if envelope.action.is_group_management() {
            return;
        }
        let micro_id = match envelope.destination() {
            Some(ChannelName::Micro(micro_id)) => Some(micro_id),
            _ => envelope.action.target_micro(),
        };
        if let Some(micro_id) = micro_id {
            self.hub
                .broadcast(&ChannelName::Micro(micro_id), &event, Some(participant));
        }
    }

    fn reinit_all(&mut self, participant: ParticipantId) -> RouterResult<()> {
        self.sessions.role(participant)?;
        self.hub
            .broadcast_all(&ServerEvent::ReInitAppState, Some(participant));
        for gateway in self.sessions.light_clients() {
            if gateway != participant {
                self.sessions.mark_resync_requested(gateway)?;
            }
        }
        Ok(())
    }

    fn remove_gateway_micros(&mut self, participant: ParticipantId) -> RouterResult<()> {
        let micro_ids: Vec<MicroId> = self
            .hub
            .micro_channels_of(participant)
            .into_iter()
            .filter(|micro_id| self.store.state().micros.contains_key(micro_id))
            .collect();
        if micro_ids.is_empty() {
            return Ok(());
        }
        info!(%participant, count = micro_ids.len(), "removing micros of departed gateway");

        let action = Action::remove_micros(micro_ids);
        let applied = self.store.apply(&action)?;
        self.mapper
            .write_action(applied.state(), &action, applied.outcome())?;
        self.store.commit(applied);

        let event = ServerEvent::RootAction(ActionEnvelope::from_light_client(action));
        self.hub
            .broadcast(&ChannelName::WebClients, &event, Some(participant));
        Ok(())
    }
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router")
            .field(
                "micros",
                &self.store.state().micros.len(),
            )
            .finish_non_exhaustive()
    }
}
