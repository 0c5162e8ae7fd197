//! Accessible topology reporting shared by all strategies.

use std::collections::BTreeSet;

use strata_backend::PlacementApi;
use strata_core::{Segment, VolumeHandle, VolumeParameters};
use tracing::trace;

use crate::context::RequestContext;
use crate::error::{SchedulerError, SchedulerResult};

/// Report where `volume` can be accessed from.
///
/// With remote access allowed the volume is reachable from every node,
/// which is expressed as an empty list. Otherwise each node holding a
/// diskful replica contributes one `{node_key: node}` segment, sorted by
/// node name.
pub async fn generic_accessible_topologies(
    ctx: &RequestContext,
    placement: &dyn PlacementApi,
    node_key: &str,
    volume: &VolumeHandle,
    params: &VolumeParameters,
) -> SchedulerResult<Vec<Segment>> {
    if params.allow_remote_volume_access {
        trace!(%volume, "remote access allowed, volume accessible everywhere");
        return Ok(Vec::new());
    }

    let replicas = ctx
        .run(placement.replicas(volume))
        .await?
        .map_err(|source| SchedulerError::Replicas {
            volume: volume.to_string(),
            source,
        })?;

    let nodes: BTreeSet<String> = replicas
        .into_iter()
        .filter(|r| !r.diskless)
        .map(|r| r.node_name)
        .collect();

    Ok(nodes
        .into_iter()
        .map(|node| Segment::for_node(node_key, node))
        .collect())
}
