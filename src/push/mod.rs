//! Push channel adapter.
//!
//! ## Components
//!
//! - [`channel`]: the transport-agnostic [`PushChannel`] handle and its event model
//! - [`ws`]: WebSocket transport ([`WsConnector`])
//!
//! The orchestrator depends only on the [`PushConnector`] seam, so an
//! in-process transport ([`PushChannel::loopback`]) can stand in for the
//! network.

pub mod channel;
pub mod ws;

use crate::errors::PushError;
use crate::identity::ClientIdentity;
use async_trait::async_trait;

pub use channel::{Frame, LoopbackPeer, Outbound, PushChannel, PushEvent};
pub use ws::{WsConnector, push_endpoint};

/// Establishes one push connection per client identity.
#[async_trait]
pub trait PushConnector: Send + Sync {
    /// Open a connection scoped to `identity`.
    ///
    /// # Errors
    ///
    /// Returns [`PushError::Connection`] when the handshake is rejected.
    async fn open(&self, identity: &ClientIdentity) -> Result<PushChannel, PushError>;
}
