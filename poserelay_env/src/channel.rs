//! In-process channel transport for tests and embedded wiring.

use crate::error::TransportError;
use crate::transport::PoseTransport;
use crate::types::{RelayOutput, Snapshot};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};

/// Channel-based transport backed by tokio mpsc.
///
/// The constructor hands back the far ends of both channels: a sender to
/// feed raw snapshots in and a receiver to drain published records.
/// Dropping the snapshot sender closes the inbound stream, which the
/// relay observes as shutdown.
pub struct ChannelTransport {
    /// Inbound raw snapshots
    inbound: Mutex<mpsc::Receiver<Snapshot>>,

    /// Outbound published records
    outbound: mpsc::Sender<RelayOutput>,
}

impl ChannelTransport {
    /// Creates a transport with the given channel capacity.
    ///
    /// # Returns
    /// `(transport, snapshot_tx, output_rx)`
    pub fn new(
        capacity: usize,
    ) -> (
        Arc<Self>,
        mpsc::Sender<Snapshot>,
        mpsc::Receiver<RelayOutput>,
    ) {
        let (snapshot_tx, snapshot_rx) = mpsc::channel(capacity);
        let (output_tx, output_rx) = mpsc::channel(capacity);

        let transport = Arc::new(Self {
            inbound: Mutex::new(snapshot_rx),
            outbound: output_tx,
        });

        (transport, snapshot_tx, output_rx)
    }
}

#[async_trait]
impl PoseTransport for ChannelTransport {
    async fn recv_snapshot(&self) -> Option<Snapshot> {
        self.inbound.lock().await.recv().await
    }

    async fn publish(&self, output: RelayOutput) -> Result<(), TransportError> {
        self.outbound
            .send(output)
            .await
            .map_err(|_| TransportError::closed("output channel receiver dropped"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{NamedPose, Pose};

    #[tokio::test]
    async fn test_channel_roundtrip() {
        let (transport, snapshot_tx, mut output_rx) = ChannelTransport::new(8);

        let snapshot = Snapshot::new(vec![NamedPose::new("sim_0", Pose::default())]);
        snapshot_tx.send(snapshot.clone()).await.unwrap();

        let received = transport.recv_snapshot().await.unwrap();
        assert_eq!(received, snapshot);

        transport
            .publish(RelayOutput::Aggregate(received))
            .await
            .unwrap();
        assert!(matches!(
            output_rx.recv().await,
            Some(RelayOutput::Aggregate(_))
        ));
    }

    #[tokio::test]
    async fn test_closed_inbound_yields_none() {
        let (transport, snapshot_tx, _output_rx) = ChannelTransport::new(8);
        drop(snapshot_tx);

        assert!(transport.recv_snapshot().await.is_none());
    }
}
