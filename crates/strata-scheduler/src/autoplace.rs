//! Plain autoplace: one unconstrained call, topology ignored.

use std::sync::Arc;

use strata_backend::{AutoPlaceRequest, PlacementApi};
use strata_core::{Segment, TopologyConfig, VolumeInfo, VolumeParameters};
use tracing::info;

use crate::accessible::generic_accessible_topologies;
use crate::context::RequestContext;
use crate::error::{Phase, SchedulerError, SchedulerResult};

#[derive(Clone)]
pub struct AutoplaceScheduler {
    placement: Arc<dyn PlacementApi>,
    node_key: String,
}

impl AutoplaceScheduler {
    pub fn new<P: PlacementApi + 'static>(placement: Arc<P>, topology: &TopologyConfig) -> Self {
        Self {
            placement,
            node_key: topology.node_key.clone(),
        }
    }

    pub async fn create(&self, ctx: &RequestContext, vol: &VolumeInfo) -> SchedulerResult<()> {
        let params = VolumeParameters::from_map(&vol.parameters)?;

        ctx.run(self.placement.autoplace(&vol.id, AutoPlaceRequest::unconstrained()))
            .await?
            .map_err(|source| SchedulerError::Placement {
                phase: Phase::Unconstrained,
                volume: vol.id.to_string(),
                source,
            })?;

        info!(volume = %vol.id, count = params.placement_count, "placement successful");
        Ok(())
    }

    pub async fn accessible_topologies(
        &self,
        ctx: &RequestContext,
        vol: &VolumeInfo,
    ) -> SchedulerResult<Vec<Segment>> {
        let params = VolumeParameters::from_map(&vol.parameters)?;
        generic_accessible_topologies(ctx, self.placement.as_ref(), &self.node_key, &vol.id, &params)
            .await
    }
}

#[cfg(test)]
mod tests {
    use strata_backend::{InMemoryBackend, NodeSpec};

    use super::*;

    #[tokio::test]
    async fn places_with_single_unconstrained_call() {
        let backend = InMemoryBackend::with_nodes([NodeSpec::new("node-a"), NodeSpec::new("node-b")]);
        let vol = VolumeInfo::new("pvc-1").with_parameter("placementCount", "2");
        backend.define_volume(&vol.id, 2);
        let scheduler = AutoplaceScheduler::new(Arc::new(backend.clone()), &TopologyConfig::default());

        scheduler.create(&RequestContext::background(), &vol).await.unwrap();

        assert_eq!(backend.autoplace_calls(), vec![AutoPlaceRequest::unconstrained()]);
        assert_eq!(backend.replica_nodes(&vol.id), vec!["node-a", "node-b"]);

        let topos = scheduler
            .accessible_topologies(&RequestContext::background(), &vol)
            .await
            .unwrap();
        assert_eq!(topos.len(), 2);
    }

    #[tokio::test]
    async fn capacity_shortage_is_not_resource_exhausted() {
        let backend = InMemoryBackend::with_nodes([NodeSpec::new("node-a")]);
        let vol = VolumeInfo::new("pvc-1").with_parameter("placementCount", "2");
        backend.define_volume(&vol.id, 2);
        let scheduler = AutoplaceScheduler::new(Arc::new(backend), &TopologyConfig::default());

        let err = scheduler
            .create(&RequestContext::background(), &vol)
            .await
            .unwrap_err();
        assert!(!err.is_resource_exhausted());
    }
}
