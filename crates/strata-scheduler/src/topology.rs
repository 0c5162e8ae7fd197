//! Topology-aware placement.
//!
//! Places a volume's replicas so that the orchestrator's topology contract
//! holds while the backend's autoplacer still picks the concrete nodes:
//!
//! 1. **Preferred**: walk the preferred segments in order and try to place
//!    on the first one that works. Best effort; failures fall through.
//! 2. **Requisite**: autoplace restricted to the union of all requisite
//!    segments. Running out of eligible nodes here is reported as
//!    [`SchedulerError::ResourceExhausted`].
//! 3. **Unconstrained**: if the requisite nodes cannot hold every replica
//!    (or there were none), top up anywhere.
//!
//! Every step relies on autoplace being cumulative: each call only adds the
//! replicas still missing, so the phases build on each other and a repeated
//! `create` after a partial failure picks up where the last one stopped.

use std::sync::Arc;

use strata_backend::{
    ApiCode, AutoPlaceRequest, Backend, BackendError, NodeApi, PlacementApi,
};
use strata_core::{Segment, TopologyConfig, TopologyRequirement, VolumeHandle, VolumeInfo, VolumeParameters};
use tracing::{debug, info, trace};

use crate::accessible::generic_accessible_topologies;
use crate::context::RequestContext;
use crate::error::{Phase, SchedulerError, SchedulerResult};
use crate::resolver::NodeResolver;

/// Result of one best-effort attempt on a preferred segment.
#[derive(Debug)]
pub enum PreferredOutcome {
    /// Autoplace on the segment's nodes succeeded.
    Placed,
    /// The segment resolved to no nodes; no call was issued.
    NotAttemptable,
    /// Autoplace was rejected; the next preferred segment may still work.
    FailedSoft(BackendError),
}

/// Scheduler honoring both preferred and requisite topology.
#[derive(Clone)]
pub struct TopologyScheduler {
    resolver: NodeResolver,
    placement: Arc<dyn PlacementApi>,
}

impl TopologyScheduler {
    pub fn new<B: Backend + 'static>(backend: Arc<B>, topology: &TopologyConfig) -> Self {
        let nodes: Arc<dyn NodeApi> = backend.clone();
        let placement: Arc<dyn PlacementApi> = backend;
        Self {
            resolver: NodeResolver::new(nodes, topology),
            placement,
        }
    }

    /// Place replicas for `vol` according to `topology`.
    ///
    /// On failure the backend may hold a partial replica set; nothing is
    /// rolled back.
    pub async fn create(
        &self,
        ctx: &RequestContext,
        vol: &VolumeInfo,
        topology: &TopologyRequirement,
    ) -> SchedulerResult<()> {
        let params = VolumeParameters::from_map(&vol.parameters)?;
        let count = params.placement_count;
        trace!(volume = %vol.id, requirements = ?topology, count, "got topology requirement");

        for preferred in &topology.preferred {
            match self.try_preferred(ctx, &vol.id, preferred, count).await? {
                PreferredOutcome::Placed => {
                    debug!(volume = %vol.id, segments = ?preferred, "placed on preferred nodes");
                    break;
                }
                PreferredOutcome::NotAttemptable => {
                    trace!(volume = %vol.id, segments = ?preferred, "no nodes for preferred segment");
                }
                PreferredOutcome::FailedSoft(err) => {
                    debug!(
                        volume = %vol.id,
                        segments = ?preferred,
                        error = %err,
                        "failed to autoplace on preferred nodes"
                    );
                }
            }
        }

        let requisite_nodes = self.requisite_nodes(ctx, &vol.id, &topology.requisite).await?;
        trace!(volume = %vol.id, requisite = ?requisite_nodes, "got requisite nodes");

        if !requisite_nodes.is_empty() {
            let request = AutoPlaceRequest::restricted(requisite_nodes.clone(), count);
            debug!(volume = %vol.id, requisite = ?requisite_nodes, "try placement on requisite nodes");

            match ctx.run(self.placement.autoplace(&vol.id, request)).await? {
                Ok(()) => {}
                Err(source) if source.is_api_call(ApiCode::NotEnoughNodes) => {
                    return Err(SchedulerError::ResourceExhausted {
                        volume: vol.id.to_string(),
                        source,
                    });
                }
                Err(source) => {
                    return Err(SchedulerError::Placement {
                        phase: Phase::Requisite,
                        volume: vol.id.to_string(),
                        source,
                    });
                }
            }
        }

        if requisite_nodes.len() < count as usize {
            debug!(volume = %vol.id, "try placement without topology constraints");
            ctx.run(self.placement.autoplace(&vol.id, AutoPlaceRequest::unconstrained()))
                .await?
                .map_err(|source| SchedulerError::Placement {
                    phase: Phase::Unconstrained,
                    volume: vol.id.to_string(),
                    source,
                })?;
        }

        info!(volume = %vol.id, count, "placement successful");
        Ok(())
    }

    /// Report where `vol` is accessible from.
    pub async fn accessible_topologies(
        &self,
        ctx: &RequestContext,
        vol: &VolumeInfo,
    ) -> SchedulerResult<Vec<Segment>> {
        let params = VolumeParameters::from_map(&vol.parameters)?;
        generic_accessible_topologies(
            ctx,
            self.placement.as_ref(),
            self.resolver.node_key(),
            &vol.id,
            &params,
        )
        .await
    }

    /// One best-effort attempt on a preferred segment.
    ///
    /// Resolution failures, cancellation and deadline expiry are returned
    /// as errors; only a rejected autoplace is soft.
    pub async fn try_preferred(
        &self,
        ctx: &RequestContext,
        volume: &VolumeHandle,
        segment: &Segment,
        count: u32,
    ) -> SchedulerResult<PreferredOutcome> {
        let nodes = self
            .resolver
            .resolve(ctx, volume, Phase::Preferred, segment)
            .await?;
        if nodes.is_empty() {
            return Ok(PreferredOutcome::NotAttemptable);
        }

        trace!(%volume, nodes = ?nodes, "try initial placement on preferred nodes");
        let request = AutoPlaceRequest::restricted(nodes, count);

        Ok(match ctx.run(self.placement.autoplace(volume, request)).await? {
            Ok(()) => PreferredOutcome::Placed,
            Err(err) => PreferredOutcome::FailedSoft(err),
        })
    }

    /// Union of all requisite segments' nodes, first occurrence wins.
    async fn requisite_nodes(
        &self,
        ctx: &RequestContext,
        volume: &VolumeHandle,
        requisite: &[Segment],
    ) -> SchedulerResult<Vec<String>> {
        let mut nodes: Vec<String> = Vec::new();
        for segment in requisite {
            for node in self
                .resolver
                .resolve(ctx, volume, Phase::Requisite, segment)
                .await?
            {
                if !nodes.contains(&node) {
                    nodes.push(node);
                }
            }
        }
        Ok(nodes)
    }
}
