//! Relay scheduler - per-agent state, ingestion, and the periodic tasks.
//!
//! Three logical flows touch the shared agent table: the ingestion entry
//! point (driven by upstream snapshots), the fast publish tick, and the
//! slow history tick. All three go through one table-wide lock with short
//! critical sections; the lock is never held across an await point.
//!
//! Within a single [`RelayScheduler::ingest`] call, registry discovery
//! happens before the state update, which happens before the snapshot
//! becomes visible to either periodic task. Across calls, the most recent
//! ingest wins for any given agent.

use crate::consolidate::SnapshotConsolidator;
use crate::error::RelayError;
use crate::history::PathHistory;
use crate::noise::NoiseModel;
use crate::registry::{Entity, EntityRegistry};
use poserelay_env::{
    NamedPose, Pose, PoseTransport, RelayContext, RelayOutput, Snapshot, StampedPose,
};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info, warn};

/// Configuration for a relay scheduler.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Producer-side name prefix selecting agents of interest
    pub prefix: String,

    /// Canonical tag substituted for the prefix (and stripped for ids)
    pub tag: String,

    /// Publish tick rate in Hz (default: 30)
    pub publish_rate_hz: u32,

    /// History tick rate in Hz (default: 10)
    pub history_rate_hz: u32,

    /// Bounded path history capacity per agent (default: 400)
    pub history_capacity: usize,

    /// Uniform noise band width in meters (default: 1.0)
    pub noise_offset: f64,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            prefix: "sim_".to_string(),
            tag: "agent".to_string(),
            publish_rate_hz: 30,
            history_rate_hz: 10,
            history_capacity: 400,
            noise_offset: 1.0,
        }
    }
}

/// Per-agent relay state.
///
/// `last_pose == None` is the pre-Active gate: an agent that has never
/// appeared in an ingested snapshot produces no output on either tick.
#[derive(Debug)]
struct RelayState {
    entity: Entity,
    last_pose: Option<Pose>,
    last_update: Duration,
    history: PathHistory,
}

/// Everything the three flows share, behind one lock.
struct Table {
    registry: EntityRegistry,
    /// BTreeMap keeps publication in canonical (lexicographic) order
    agents: BTreeMap<String, RelayState>,
    noise: Option<NoiseModel>,
}

/// Owns the per-agent state table and drives the relay pipeline.
///
/// Generic over the context and transport implementations, so the same
/// scheduler runs against production stdio or an in-process channel pair.
pub struct RelayScheduler<Ctx, T>
where
    Ctx: RelayContext,
    T: PoseTransport,
{
    context: Arc<Ctx>,
    transport: Arc<T>,
    config: RelayConfig,
    consolidator: SnapshotConsolidator,
    /// Flattened covariance cached from the noise model at construction
    covariance_flat: Option<Vec<f64>>,
    table: Mutex<Table>,
}

impl<Ctx, T> RelayScheduler<Ctx, T>
where
    Ctx: RelayContext,
    T: PoseTransport,
{
    /// Creates a ground-truth stage scheduler (no noise injection).
    pub fn new(context: Arc<Ctx>, transport: Arc<T>, config: RelayConfig) -> Self {
        Self::build(context, transport, config, None)
    }

    /// Creates a noisy-sensor stage scheduler.
    ///
    /// Every ingested pose is perturbed before storage, and per-agent
    /// publications carry the model's cached covariance plus the bounded
    /// path history.
    pub fn with_noise(
        context: Arc<Ctx>,
        transport: Arc<T>,
        config: RelayConfig,
        noise: NoiseModel,
    ) -> Self {
        Self::build(context, transport, config, Some(noise))
    }

    fn build(
        context: Arc<Ctx>,
        transport: Arc<T>,
        config: RelayConfig,
        noise: Option<NoiseModel>,
    ) -> Self {
        let consolidator = SnapshotConsolidator::new(&config.prefix, &config.tag);
        let covariance_flat = noise.as_ref().map(NoiseModel::covariance_flat);

        Self {
            context,
            transport,
            consolidator,
            covariance_flat,
            table: Mutex::new(Table {
                registry: EntityRegistry::new(config.tag.clone()),
                agents: BTreeMap::new(),
                noise,
            }),
            config,
        }
    }

    /// Ingests one raw snapshot: consolidate, perturb (noisy stage),
    /// republish the aggregate, discover new agents, update latest poses.
    ///
    /// Agents registered earlier but absent from this snapshot keep their
    /// stale last pose.
    pub async fn ingest(&self, raw: &Snapshot) -> Result<(), RelayError> {
        let canonical = self.consolidator.consolidate(raw);

        let outgoing = {
            let mut table = self.table.lock().expect("relay table lock poisoned");

            let outgoing = match table.noise.as_mut() {
                Some(noise) => Snapshot::new(
                    canonical
                        .iter()
                        .map(|entry| {
                            NamedPose::new(entry.name.clone(), noise.apply_offset(&entry.pose))
                        })
                        .collect(),
                ),
                None => canonical,
            };

            let now = self.context.now();
            let discovered = table.registry.observe(outgoing.names())?;

            for name in &discovered {
                if let Some(entity) = table.registry.get(name).cloned() {
                    info!(agent = %name, id = entity.id, "discovered new agent");
                    table.agents.insert(
                        name.clone(),
                        RelayState {
                            entity,
                            last_pose: None,
                            last_update: now,
                            history: PathHistory::new(self.config.history_capacity),
                        },
                    );
                }
            }

            for entry in outgoing.iter() {
                if let Some(state) = table.agents.get_mut(&entry.name) {
                    state.last_pose = Some(entry.pose);
                    state.last_update = now;
                }
            }

            outgoing
        };

        if let Err(err) = self.transport.publish(RelayOutput::Aggregate(outgoing)).await {
            error!(%err, "aggregate republish failed");
        }
        Ok(())
    }

    /// Fast periodic task: publishes the current pose of every agent that
    /// has observed at least one update. Noisy stage adds the cached
    /// covariance and the current path contents.
    pub async fn publish_tick(&self) {
        let now = self.context.now();

        let outputs: Vec<RelayOutput> = {
            let table = self.table.lock().expect("relay table lock poisoned");

            table
                .agents
                .iter()
                .filter_map(|(name, state)| state.last_pose.map(|pose| (name, state, pose)))
                .flat_map(|(name, state, pose)| {
                    let stamped = StampedPose::new(now, pose);
                    match &self.covariance_flat {
                        Some(covariance) => vec![
                            RelayOutput::PoseWithCovariance {
                                name: name.clone(),
                                pose: stamped,
                                covariance: covariance.clone(),
                            },
                            RelayOutput::Path {
                                name: name.clone(),
                                poses: state.history.snapshot(),
                            },
                        ],
                        None => vec![RelayOutput::Pose {
                            name: name.clone(),
                            pose: stamped,
                        }],
                    }
                })
                .collect()
        };

        for output in outputs {
            if let Err(err) = self.transport.publish(output).await {
                error!(%err, "periodic publish failed");
            }
        }
    }

    /// Slow periodic task: appends a stamped copy of the current pose to
    /// each active agent's bounded history.
    pub fn history_tick(&self) {
        let now = self.context.now();
        let mut table = self.table.lock().expect("relay table lock poisoned");

        for state in table.agents.values_mut() {
            if let Some(pose) = state.last_pose {
                state.history.append(StampedPose::new(now, pose));
            }
        }
    }

    /// Drives all three flows until shutdown is signalled or the inbound
    /// stream closes. Per-tick failures are logged and never abort the
    /// loops.
    pub async fn run(&self, shutdown: watch::Receiver<bool>) {
        let publish_period = Duration::from_secs_f64(1.0 / self.config.publish_rate_hz as f64);
        let history_period = Duration::from_secs_f64(1.0 / self.config.history_rate_hz as f64);

        // Inbound closure stops the periodic loops too, so EOF shuts the
        // whole relay down without an external signal.
        let (closed_tx, closed_rx) = watch::channel(false);

        let ingest_loop = async {
            let mut shutdown = shutdown.clone();
            loop {
                tokio::select! {
                    snapshot = self.transport.recv_snapshot() => match snapshot {
                        Some(snapshot) => {
                            if let Err(err) = self.ingest(&snapshot).await {
                                warn!(%err, "snapshot rejected");
                            }
                        }
                        None => {
                            info!("inbound snapshot stream closed");
                            let _ = closed_tx.send(true);
                            break;
                        }
                    },
                    _ = shutdown.changed() => break,
                }
            }
        };

        let publish_loop = async {
            let mut shutdown = shutdown.clone();
            let mut closed = closed_rx.clone();
            loop {
                tokio::select! {
                    _ = self.context.sleep(publish_period) => self.publish_tick().await,
                    _ = shutdown.changed() => break,
                    _ = closed.changed() => break,
                }
            }
        };

        let history_loop = async {
            let mut shutdown = shutdown.clone();
            let mut closed = closed_rx.clone();
            loop {
                tokio::select! {
                    _ = self.context.sleep(history_period) => self.history_tick(),
                    _ = shutdown.changed() => break,
                    _ = closed.changed() => break,
                }
            }
        };

        tokio::join!(ingest_loop, publish_loop, history_loop);
        info!("relay scheduler stopped");
    }

    /// Returns the number of registered agents.
    pub fn agent_count(&self) -> usize {
        self.table.lock().expect("relay table lock poisoned").agents.len()
    }

    /// Returns the names of agents past the pre-Active gate, in canonical
    /// order.
    pub fn active_agents(&self) -> Vec<String> {
        let table = self.table.lock().expect("relay table lock poisoned");
        table
            .agents
            .iter()
            .filter(|(_, state)| state.last_pose.is_some())
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Returns the history length for a registered agent.
    pub fn history_len(&self, name: &str) -> Option<usize> {
        let table = self.table.lock().expect("relay table lock poisoned");
        table.agents.get(name).map(|state| state.history.len())
    }

    /// Returns the parsed id and last-update time for a registered agent.
    pub fn agent_info(&self, name: &str) -> Option<(u32, Duration)> {
        let table = self.table.lock().expect("relay table lock poisoned");
        table
            .agents
            .get(name)
            .map(|state| (state.entity.id, state.last_update))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::noise::NoiseStrategy;
    use poserelay_env::{ChannelTransport, TokioContext};
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use tokio::sync::mpsc;
    use tokio::time::timeout;

    fn raw(names: &[&str]) -> Snapshot {
        Snapshot::new(
            names
                .iter()
                .enumerate()
                .map(|(i, name)| NamedPose::new(*name, Pose::at(i as f64, 0.0, 0.0)))
                .collect(),
        )
    }

    async fn recv(rx: &mut mpsc::Receiver<RelayOutput>) -> RelayOutput {
        timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("timed out waiting for output")
            .expect("output channel closed")
    }

    fn ground_truth_scheduler() -> (
        Arc<RelayScheduler<TokioContext, ChannelTransport>>,
        mpsc::Sender<Snapshot>,
        mpsc::Receiver<RelayOutput>,
    ) {
        let (transport, snapshot_tx, output_rx) = ChannelTransport::new(64);
        let scheduler = Arc::new(RelayScheduler::new(
            TokioContext::shared(),
            transport,
            RelayConfig::default(),
        ));
        (scheduler, snapshot_tx, output_rx)
    }

    fn noisy_scheduler() -> (
        Arc<RelayScheduler<TokioContext, ChannelTransport>>,
        mpsc::Receiver<RelayOutput>,
    ) {
        let (transport, _snapshot_tx, output_rx) = ChannelTransport::new(64);
        let config = RelayConfig {
            // Noisy stage consumes already-canonical names.
            prefix: "agent".to_string(),
            ..RelayConfig::default()
        };
        let noise = NoiseModel::with_rng(
            NoiseStrategy::Uniform { offset: 1.0 },
            StdRng::seed_from_u64(11),
        );
        let scheduler = Arc::new(RelayScheduler::with_noise(
            TokioContext::shared(),
            transport,
            config,
            noise,
        ));
        (scheduler, output_rx)
    }

    #[tokio::test]
    async fn test_silent_before_first_update() {
        let (scheduler, _snapshot_tx, mut output_rx) = ground_truth_scheduler();

        scheduler.publish_tick().await;
        scheduler.history_tick();

        assert!(output_rx.try_recv().is_err());
        assert_eq!(scheduler.agent_count(), 0);
    }

    #[tokio::test]
    async fn test_ground_truth_pipeline() {
        let (scheduler, _snapshot_tx, mut output_rx) = ground_truth_scheduler();

        scheduler
            .ingest(&raw(&["sim_0", "sim_1", "ground_plane"]))
            .await
            .unwrap();

        // Aggregate republished on ingest, consolidated and renamed.
        let aggregate = recv(&mut output_rx).await;
        match aggregate {
            RelayOutput::Aggregate(snapshot) => {
                let names: Vec<&str> = snapshot.names().collect();
                assert_eq!(names, vec!["agent0", "agent1"]);
            }
            other => panic!("expected aggregate, got {other:?}"),
        }

        assert_eq!(scheduler.agent_count(), 2);
        assert_eq!(scheduler.active_agents(), vec!["agent0", "agent1"]);
        assert_eq!(scheduler.agent_info("agent1").map(|(id, _)| id), Some(1));

        // Fast tick publishes one pose per active agent, canonical order.
        scheduler.publish_tick().await;
        match recv(&mut output_rx).await {
            RelayOutput::Pose { name, pose } => {
                assert_eq!(name, "agent0");
                assert_eq!(pose.pose, Pose::at(0.0, 0.0, 0.0));
            }
            other => panic!("expected pose, got {other:?}"),
        }
        match recv(&mut output_rx).await {
            RelayOutput::Pose { name, .. } => assert_eq!(name, "agent1"),
            other => panic!("expected pose, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_absent_agent_keeps_stale_pose() {
        let (scheduler, _snapshot_tx, mut output_rx) = ground_truth_scheduler();

        scheduler.ingest(&raw(&["sim_0", "sim_1"])).await.unwrap();
        let _ = recv(&mut output_rx).await; // aggregate

        // Second snapshot moves sim_0 and omits sim_1 entirely.
        let moved = Snapshot::new(vec![NamedPose::new("sim_0", Pose::at(9.0, 9.0, 9.0))]);
        scheduler.ingest(&moved).await.unwrap();
        let _ = recv(&mut output_rx).await; // aggregate

        scheduler.publish_tick().await;
        match recv(&mut output_rx).await {
            RelayOutput::Pose { name, pose } => {
                assert_eq!(name, "agent0");
                assert_eq!(pose.pose, Pose::at(9.0, 9.0, 9.0));
            }
            other => panic!("expected pose, got {other:?}"),
        }
        match recv(&mut output_rx).await {
            RelayOutput::Pose { name, pose } => {
                assert_eq!(name, "agent1");
                // Stale pose from the first snapshot, not dropped.
                assert_eq!(pose.pose, Pose::at(1.0, 0.0, 0.0));
            }
            other => panic!("expected pose, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_noisy_stage_outputs() {
        let (scheduler, mut output_rx) = noisy_scheduler();

        let truth = Pose::at(5.0, 5.0, 5.0);
        scheduler
            .ingest(&Snapshot::new(vec![NamedPose::new("agent0", truth)]))
            .await
            .unwrap();

        // Aggregate carries the noised pose, bounded by offset/2 per axis.
        match recv(&mut output_rx).await {
            RelayOutput::Aggregate(snapshot) => {
                let noisy = snapshot.poses[0].pose;
                assert!((noisy.position.x - 5.0).abs() <= 0.5);
                assert!((noisy.position.y - 5.0).abs() <= 0.5);
                assert!((noisy.position.z - 5.0).abs() <= 0.5);
                assert_eq!(noisy.orientation, truth.orientation);
            }
            other => panic!("expected aggregate, got {other:?}"),
        }

        scheduler.publish_tick().await;
        match recv(&mut output_rx).await {
            RelayOutput::PoseWithCovariance {
                name, covariance, ..
            } => {
                assert_eq!(name, "agent0");
                assert_eq!(covariance.len(), 36);
                // Rotational block (rows 3..6) is all zeros.
                assert!(covariance[3 * 6 + 3..].iter().all(|v| *v == 0.0));
            }
            other => panic!("expected pose with covariance, got {other:?}"),
        }
        match recv(&mut output_rx).await {
            RelayOutput::Path { name, poses } => {
                assert_eq!(name, "agent0");
                assert!(poses.is_empty()); // no history tick yet
            }
            other => panic!("expected path, got {other:?}"),
        }

        // After a history tick the path stream carries one entry.
        scheduler.history_tick();
        scheduler.publish_tick().await;
        let _pose = recv(&mut output_rx).await;
        match recv(&mut output_rx).await {
            RelayOutput::Path { poses, .. } => assert_eq!(poses.len(), 1),
            other => panic!("expected path, got {other:?}"),
        }
        assert_eq!(scheduler.history_len("agent0"), Some(1));
    }

    #[tokio::test]
    async fn test_covariance_identical_across_ticks() {
        let (scheduler, mut output_rx) = noisy_scheduler();

        scheduler
            .ingest(&Snapshot::new(vec![NamedPose::new(
                "agent0",
                Pose::default(),
            )]))
            .await
            .unwrap();
        let _ = recv(&mut output_rx).await; // aggregate

        let mut matrices = Vec::new();
        for _ in 0..2 {
            scheduler.publish_tick().await;
            match recv(&mut output_rx).await {
                RelayOutput::PoseWithCovariance { covariance, .. } => matrices.push(covariance),
                other => panic!("expected pose with covariance, got {other:?}"),
            }
            let _ = recv(&mut output_rx).await; // path
        }

        assert_eq!(matrices[0], matrices[1]);
    }

    #[tokio::test]
    async fn test_run_until_shutdown() {
        let (transport, snapshot_tx, mut output_rx) = ChannelTransport::new(64);
        let scheduler = Arc::new(RelayScheduler::new(
            TokioContext::shared(),
            transport,
            RelayConfig::default(),
        ));

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn({
            let scheduler = scheduler.clone();
            async move { scheduler.run(shutdown_rx).await }
        });

        snapshot_tx.send(raw(&["sim_0"])).await.unwrap();

        // Aggregate arrives from the ingest flow, then the 30 Hz loop
        // starts emitting per-agent poses.
        match recv(&mut output_rx).await {
            RelayOutput::Aggregate(snapshot) => assert_eq!(snapshot.len(), 1),
            other => panic!("expected aggregate, got {other:?}"),
        }
        match recv(&mut output_rx).await {
            RelayOutput::Pose { name, .. } => assert_eq!(name, "agent0"),
            other => panic!("expected pose, got {other:?}"),
        }

        shutdown_tx.send(true).unwrap();
        timeout(Duration::from_secs(1), handle)
            .await
            .expect("run did not stop on shutdown")
            .unwrap();
    }

    #[tokio::test]
    async fn test_run_stops_when_inbound_closes() {
        let (transport, snapshot_tx, _output_rx) = ChannelTransport::new(8);
        let scheduler = Arc::new(RelayScheduler::new(
            TokioContext::shared(),
            transport,
            RelayConfig::default(),
        ));

        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn({
            let scheduler = scheduler.clone();
            async move { scheduler.run(shutdown_rx).await }
        });

        // Closing the inbound stream must stop all three flows, not just
        // ingestion - no shutdown signal is ever sent here.
        drop(snapshot_tx);

        timeout(Duration::from_secs(1), handle)
            .await
            .expect("run did not stop when inbound closed")
            .unwrap();
    }
}
