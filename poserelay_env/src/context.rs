//! Core environment context trait for the relay.

use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;

/// The central interface for environment interaction.
///
/// This trait abstracts the clock and task spawning so that the relay
/// pipeline can run against the production runtime or a test harness
/// without code changes.
///
/// # Implementations
///
/// - **Production**: [`crate::TokioContext`] - wraps `tokio::time`
#[async_trait]
pub trait RelayContext: Send + Sync + 'static {
    /// Returns the current monotonic time since context creation.
    ///
    /// Used to stamp published poses and path history entries.
    fn now(&self) -> Duration;

    /// Suspends execution for the given duration.
    ///
    /// Drives the periodic publish and history ticks.
    async fn sleep(&self, duration: Duration);

    /// Spawns a background task.
    fn spawn<F>(&self, name: &str, future: F)
    where
        F: Future<Output = ()> + Send + 'static;
}
