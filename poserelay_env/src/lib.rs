//! poserelay Environment Abstraction Layer
//!
//! This crate holds everything the relay core treats as an external
//! collaborator: the clock, task spawning, and the pub/sub transport
//! that delivers raw pose snapshots and carries republished streams.
//!
//! The core pipeline is generic over two traits defined here:
//! - [`RelayContext`] - time and task spawning (production: tokio)
//! - [`PoseTransport`] - snapshot ingestion and stream publication
//!
//! # Example
//!
//! ```ignore
//! use poserelay_env::{RelayContext, PoseTransport};
//!
//! async fn relay_loop<Ctx: RelayContext, T: PoseTransport>(
//!     ctx: &Ctx,
//!     transport: &T,
//! ) {
//!     loop {
//!         tokio::select! {
//!             snapshot = transport.recv_snapshot() => ingest(snapshot),
//!             _ = ctx.sleep(Duration::from_millis(33)) => publish_tick(),
//!         }
//!     }
//! }
//! ```

mod channel;
mod context;
mod error;
mod stdio;
mod tokio_impl;
mod transport;
mod types;

pub use channel::ChannelTransport;
pub use context::RelayContext;
pub use error::TransportError;
pub use stdio::JsonLineTransport;
pub use tokio_impl::TokioContext;
pub use transport::PoseTransport;
pub use types::{NamedPose, Pose, RelayOutput, Snapshot, StampedPose};
