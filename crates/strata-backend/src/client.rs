//! Storage backend contracts.
//!
//! The scheduler never talks to a concrete REST client; it is handed trait
//! objects for the two capabilities it needs:
//!
//! - [`NodeApi`]: list nodes, optionally filtered by `key=value` properties
//! - [`PlacementApi`]: autoplace replicas and list where they ended up
//!
//! Autoplace is cumulative: each call ensures *at least* the requested
//! number of replicas exists for the volume (restricted to the given nodes
//! for any replica it has to add), building on replicas placed earlier.
//! Already satisfied requests are no-ops.

use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};
use strata_core::{Node, VolumeHandle};

use crate::error::BackendResult;

/// Boxed future alias for backend calls.
pub type BackendFuture<'a, T> = Pin<Box<dyn Future<Output = BackendResult<T>> + Send + 'a>>;

/// Options for node listing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListOpts {
    /// Property filters of the form `key=value`, ANDed together.
    pub props: Vec<String>,
}

impl ListOpts {
    /// Split each filter into `(key, value)`. Filters without `=` are `None`.
    pub fn parsed_props(&self) -> Vec<Option<(&str, &str)>> {
        self.props.iter().map(|p| p.split_once('=')).collect()
    }
}

/// Node selection for an autoplace call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutoSelectFilter {
    /// Only place new replicas on these nodes. Empty = no restriction.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub node_name_list: Vec<String>,
    /// Replica count to reach. `None` = the volume's configured count.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub place_count: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutoPlaceRequest {
    pub select_filter: AutoSelectFilter,
}

impl AutoPlaceRequest {
    /// Autoplace without topology constraints or count override.
    pub fn unconstrained() -> Self {
        Self::default()
    }

    /// Autoplace restricted to `nodes`, asking for `placement_count`
    /// replicas but never more than there are candidate nodes.
    pub fn restricted(nodes: Vec<String>, placement_count: u32) -> Self {
        let candidates = u32::try_from(nodes.len()).unwrap_or(u32::MAX);
        Self {
            select_filter: AutoSelectFilter {
                node_name_list: nodes,
                place_count: Some(candidates.min(placement_count)),
            },
        }
    }
}

/// One replica of a volume as reported by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplicaInfo {
    pub node_name: String,
    /// Diskless replicas only provide remote access to the data.
    pub diskless: bool,
}

/// Node listing capability.
pub trait NodeApi: Send + Sync {
    fn list_nodes<'a>(&'a self, opts: &'a ListOpts) -> BackendFuture<'a, Vec<Node>>;
}

/// Replica placement capability.
pub trait PlacementApi: Send + Sync {
    /// Ensure replicas exist for `volume` according to `request`.
    fn autoplace<'a>(
        &'a self,
        volume: &'a VolumeHandle,
        request: AutoPlaceRequest,
    ) -> BackendFuture<'a, ()>;

    /// List the replicas currently placed for `volume`.
    fn replicas<'a>(&'a self, volume: &'a VolumeHandle) -> BackendFuture<'a, Vec<ReplicaInfo>>;
}

/// Everything the scheduler needs from a backend.
pub trait Backend: NodeApi + PlacementApi {}

impl<T: NodeApi + PlacementApi> Backend for T {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn restricted_caps_count_to_candidates() {
        let req = AutoPlaceRequest::restricted(vec!["a".into()], 3);
        assert_eq!(req.select_filter.node_name_list, vec!["a".to_string()]);
        assert_eq!(req.select_filter.place_count, Some(1));
    }

    #[test]
    fn restricted_keeps_count_when_enough_candidates() {
        let req = AutoPlaceRequest::restricted(vec!["a".into(), "b".into(), "c".into()], 2);
        assert_eq!(req.select_filter.place_count, Some(2));

        let req = AutoPlaceRequest::restricted(vec!["a".into(), "b".into()], 2);
        assert_eq!(req.select_filter.place_count, Some(2));
    }

    #[test]
    fn unconstrained_serializes_empty_filter() {
        let json = serde_json::to_string(&AutoPlaceRequest::unconstrained()).unwrap();
        assert_eq!(json, r#"{"select_filter":{}}"#);
    }

    #[test]
    fn parses_property_filters() {
        let opts = ListOpts {
            props: vec!["Aux/zone=rack1".into(), "broken".into()],
        };
        assert_eq!(
            opts.parsed_props(),
            vec![Some(("Aux/zone", "rack1")), None]
        );
    }
}
