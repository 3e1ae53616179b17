//! The action pipeline: a bounded queue in front of the router's single
//! writer thread.
//!
//! Transport tasks are async; the router (and the blocking Redis client
//! under it) is not. The pipeline bridges the two: submissions queue on a
//! bounded tokio channel and a dedicated thread drains it, applying one
//! request at a time. A full queue makes `submit` wait, which is the
//! system's backpressure.

use tokio::sync::mpsc::{self, UnboundedReceiver};
use tokio::sync::oneshot;
use tracing::debug;

use ledsync_protocol::{ClientEvent, ServerEvent};

use crate::error::{RouterError, RouterResult};
use crate::router::Router;
use crate::session::ParticipantId;

enum PipelineRequest {
    Connect {
        reply: oneshot::Sender<(ParticipantId, UnboundedReceiver<ServerEvent>)>,
    },
    Event {
        participant: ParticipantId,
        event: ClientEvent,
        reply: oneshot::Sender<RouterResult<()>>,
    },
    Disconnect {
        participant: ParticipantId,
        reply: oneshot::Sender<RouterResult<()>>,
    },
    SweepStale {
        reply: oneshot::Sender<Vec<ParticipantId>>,
    },
}

/// Cloneable async handle to the router's writer thread.
///
/// The thread exits when every handle has been dropped and the queue has
/// drained.
#[derive(Clone)]
pub struct ActionPipeline {
    requests: mpsc::Sender<PipelineRequest>,
}

impl ActionPipeline {
    /// Moves the router onto a dedicated writer thread and returns the
    /// handle that feeds it.
    pub fn spawn(router: Router) -> Self {
        let (requests, receiver) = mpsc::channel(router.config().pipeline_capacity);
        std::thread::spawn(move || writer_loop(router, receiver));
        Self { requests }
    }

    /// Registers a new connection.
    pub async fn connect(
        &self,
    ) -> RouterResult<(ParticipantId, UnboundedReceiver<ServerEvent>)> {
        let (reply, response) = oneshot::channel();
        self.send(PipelineRequest::Connect { reply }).await?;
        response.await.map_err(|_| RouterError::PipelineClosed)
    }

    /// Submits one participant event and waits for its outcome.
    pub async fn submit(
        &self,
        participant: ParticipantId,
        event: ClientEvent,
    ) -> RouterResult<()> {
        let (reply, response) = oneshot::channel();
        self.send(PipelineRequest::Event {
            participant,
            event,
            reply,
        })
        .await?;
        response.await.map_err(|_| RouterError::PipelineClosed)?
    }

    /// Disconnects a participant.
    pub async fn disconnect(&self, participant: ParticipantId) -> RouterResult<()> {
        let (reply, response) = oneshot::channel();
        self.send(PipelineRequest::Disconnect { participant, reply })
            .await?;
        response.await.map_err(|_| RouterError::PipelineClosed)?
    }

    /// Reports the light clients that never re-reported in time.
    ///
    /// Callers run this on a timer; the pipeline itself has no clock.
    pub async fn sweep_stale_resyncs(&self) -> RouterResult<Vec<ParticipantId>> {
        let (reply, response) = oneshot::channel();
        self.send(PipelineRequest::SweepStale { reply }).await?;
        response.await.map_err(|_| RouterError::PipelineClosed)
    }

    async fn send(&self, request: PipelineRequest) -> RouterResult<()> {
        self.requests
            .send(request)
            .await
            .map_err(|_| RouterError::PipelineClosed)
    }
}

impl std::fmt::Debug for ActionPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionPipeline").finish_non_exhaustive()
    }
}

fn writer_loop(mut router: Router, mut receiver: mpsc::Receiver<PipelineRequest>) {
    debug!("router writer thread started");
    while let Some(request) = receiver.blocking_recv() {
        // A dropped reply sender means the submitter gave up waiting; the
        // work is still done in order.
        match request {
            PipelineRequest::Connect { reply } => {
                let _ = reply.send(router.connect());
            }
            PipelineRequest::Event {
                participant,
                event,
                reply,
            } => {
                let _ = reply.send(router.handle_event(participant, event));
            }
            PipelineRequest::Disconnect { participant, reply } => {
                let _ = reply.send(router.disconnect(participant));
            }
            PipelineRequest::SweepStale { reply } => {
                let _ = reply.send(router.sweep_stale_resyncs());
            }
        }
    }
    debug!("router writer thread exiting");
}
