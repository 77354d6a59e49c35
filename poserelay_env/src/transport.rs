//! Pub/sub transport abstraction for the relay.

use crate::error::TransportError;
use crate::types::{RelayOutput, Snapshot};
use async_trait::async_trait;

/// Abstraction over the pub/sub boundary.
///
/// The relay subscribes to one inbound stream of full-world snapshots and
/// publishes several outbound streams ([`RelayOutput`] variants). The
/// transport owns topic wiring and message encoding; the relay core never
/// sees either.
///
/// # Implementations
///
/// - **In-process**: [`crate::ChannelTransport`] - tokio mpsc pair
/// - **Standalone**: [`crate::JsonLineTransport`] - JSON lines on stdio
#[async_trait]
pub trait PoseTransport: Send + Sync + 'static {
    /// Receives the next raw snapshot from the upstream producer.
    ///
    /// # Returns
    /// * `Some(snapshot)` - A snapshot arrived
    /// * `None` - The inbound stream closed (shutdown)
    ///
    /// # Blocking
    /// This method blocks until a snapshot arrives or the stream closes.
    async fn recv_snapshot(&self) -> Option<Snapshot>;

    /// Publishes one output record.
    ///
    /// # Returns
    /// * `Ok(())` - Record queued for delivery
    /// * `Err(_)` - Publication failed; the relay logs and carries on,
    ///   a failed tick never aborts subsequent ticks
    async fn publish(&self, output: RelayOutput) -> Result<(), TransportError>;
}
