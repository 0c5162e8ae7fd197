//! Topology segment → node name resolution.
//!
//! Most segments name a node directly under the node-identity key, which
//! needs no backend round trip. Aggregate segments (a zone or rack label
//! with no node name) are resolved by listing the nodes whose auxiliary
//! properties match every key/value pair of the segment.

use std::sync::Arc;

use strata_backend::{ListOpts, NodeApi};
use strata_core::{Segment, TopologyConfig, VolumeHandle};
use tracing::trace;

use crate::context::RequestContext;
use crate::error::{Phase, SchedulerError, SchedulerResult};

#[derive(Clone)]
pub struct NodeResolver {
    nodes: Arc<dyn NodeApi>,
    node_key: String,
    aux_prefix: String,
}

impl NodeResolver {
    pub fn new(nodes: Arc<dyn NodeApi>, topology: &TopologyConfig) -> Self {
        Self {
            nodes,
            node_key: topology.node_key.clone(),
            aux_prefix: topology.aux_prefix.clone(),
        }
    }

    pub fn node_key(&self) -> &str {
        &self.node_key
    }

    /// Property filters for an aggregate segment, one per key/value pair.
    pub fn filters_for(&self, segment: &Segment) -> ListOpts {
        ListOpts {
            props: segment
                .iter()
                .map(|(k, v)| format!("{}{k}={v}", self.aux_prefix))
                .collect(),
        }
    }

    /// Resolve `segment` to candidate node names.
    ///
    /// An empty list is a valid answer. A failed listing is returned as
    /// [`SchedulerError::NodeResolution`].
    pub async fn resolve(
        &self,
        ctx: &RequestContext,
        volume: &VolumeHandle,
        phase: Phase,
        segment: &Segment,
    ) -> SchedulerResult<Vec<String>> {
        if let Some(node) = segment.get(&self.node_key) {
            return Ok(vec![node.to_string()]);
        }

        let opts = self.filters_for(segment);
        trace!(filters = ?opts.props, "listing nodes for aggregate segment");

        let nodes = ctx
            .run(self.nodes.list_nodes(&opts))
            .await?
            .map_err(|source| SchedulerError::NodeResolution {
                phase,
                volume: volume.to_string(),
                segment: segment.clone(),
                source,
            })?;

        Ok(nodes.into_iter().map(|n| n.name).collect())
    }
}
