//! # ledsync router
//!
//! The service layer of the ledsync workspace: participant sessions,
//! channel membership, and the single-writer action pipeline that applies
//! each mutation, persists it, and fans the result out.
//!
//! ## Flow
//!
//! 1. A transport accepts a connection and calls
//!    [`ActionPipeline::connect`], obtaining a [`ParticipantId`] and a
//!    delivery queue of [`ServerEvent`]s to forward to the peer.
//! 2. Incoming events go through [`ActionPipeline::submit`]; the router
//!    thread applies them in arrival order.
//! 3. Each accepted action is persisted before it is published; a
//!    persistence failure rejects the action whole.
//! 4. Routing is asymmetric: UI-originated actions reach other UIs and the
//!    targeted micro's channel, hardware-originated actions reach UIs only.
//!
//! [`ServerEvent`]: ledsync_protocol::ServerEvent

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod hub;
pub mod pipeline;
pub mod router;
pub mod session;

pub use config::RouterConfig;
pub use error::{RouterError, RouterResult};
pub use hub::ChannelHub;
pub use pipeline::ActionPipeline;
pub use router::Router;
pub use session::{ParticipantId, Role, SessionRegistry};
