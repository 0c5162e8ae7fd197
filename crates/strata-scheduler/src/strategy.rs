//! Scheduler strategies: the closed set the provisioning pipeline picks from.

use std::sync::Arc;

use strata_backend::Backend;
use strata_core::{SchedulerKind, Segment, StrataConfig, TopologyRequirement, VolumeInfo};

use crate::autoplace::AutoplaceScheduler;
use crate::context::RequestContext;
use crate::error::SchedulerResult;
use crate::topology::TopologyScheduler;

/// A placement strategy, chosen once from configuration.
#[derive(Clone)]
pub enum Scheduler {
    /// Preferred, then requisite, then unconstrained placement.
    AutoplaceTopology(TopologyScheduler),
    /// One unconstrained autoplace.
    Autoplace(AutoplaceScheduler),
}

impl Scheduler {
    pub fn from_config<B: Backend + 'static>(config: &StrataConfig, backend: Arc<B>) -> Self {
        match config.scheduler.strategy {
            SchedulerKind::AutoplaceTopology => {
                Scheduler::AutoplaceTopology(TopologyScheduler::new(backend, &config.topology))
            }
            SchedulerKind::Autoplace => {
                Scheduler::Autoplace(AutoplaceScheduler::new(backend, &config.topology))
            }
        }
    }

    pub fn kind(&self) -> SchedulerKind {
        match self {
            Scheduler::AutoplaceTopology(_) => SchedulerKind::AutoplaceTopology,
            Scheduler::Autoplace(_) => SchedulerKind::Autoplace,
        }
    }

    pub fn name(&self) -> &'static str {
        self.kind().as_str()
    }

    /// Place replicas for a new volume.
    pub async fn create(
        &self,
        ctx: &RequestContext,
        vol: &VolumeInfo,
        topology: &TopologyRequirement,
    ) -> SchedulerResult<()> {
        match self {
            Scheduler::AutoplaceTopology(s) => s.create(ctx, vol, topology).await,
            Scheduler::Autoplace(s) => s.create(ctx, vol).await,
        }
    }

    /// Topology segments the volume is accessible from.
    pub async fn accessible_topologies(
        &self,
        ctx: &RequestContext,
        vol: &VolumeInfo,
    ) -> SchedulerResult<Vec<Segment>> {
        match self {
            Scheduler::AutoplaceTopology(s) => s.accessible_topologies(ctx, vol).await,
            Scheduler::Autoplace(s) => s.accessible_topologies(ctx, vol).await,
        }
    }
}
