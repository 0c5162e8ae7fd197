//! InMemoryBackend — a programmable storage backend held in process memory.
//!
//! Implements [`NodeApi`] and [`PlacementApi`] with the backend's cumulative
//! autoplace semantics, so placement sequences can be exercised without a
//! real cluster. On top of that it records every call it receives and lets
//! callers script failures and latency.
//!
//! Node choice among eligible candidates is deliberately simple (most free
//! slots first, then name). It stands in for the real placement engine and
//! is not meant to model its heuristics.

use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use strata_core::{Node, VolumeHandle};
use tracing::{debug, trace};

use crate::client::{AutoPlaceRequest, BackendFuture, ListOpts, NodeApi, PlacementApi, ReplicaInfo};
use crate::error::{ApiCode, BackendError, BackendResult};

/// Declarative description of a node, as found in cluster files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeSpec {
    pub name: String,
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
    /// Maximum number of replicas (across all volumes). `None` = unlimited.
    #[serde(default)]
    pub capacity: Option<u32>,
    #[serde(default = "default_online")]
    pub online: bool,
}

fn default_online() -> bool {
    true
}

impl NodeSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            properties: BTreeMap::new(),
            capacity: None,
            online: true,
        }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn with_capacity(mut self, capacity: u32) -> Self {
        self.capacity = Some(capacity);
        self
    }

    pub fn offline(mut self) -> Self {
        self.online = false;
        self
    }

    fn to_node(&self) -> Node {
        Node {
            name: self.name.clone(),
            properties: self.properties.clone(),
        }
    }
}

/// A call received by the backend, in arrival order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "call", rename_all = "snake_case")]
pub enum BackendCall {
    ListNodes { props: Vec<String> },
    Autoplace { volume: String, request: AutoPlaceRequest },
    Replicas { volume: String },
}

#[derive(Debug)]
struct VolumeEntry {
    place_count: u32,
    replicas: Vec<ReplicaInfo>,
}

#[derive(Debug, Default)]
struct Inner {
    nodes: BTreeMap<String, NodeSpec>,
    volumes: BTreeMap<VolumeHandle, VolumeEntry>,
    calls: Vec<BackendCall>,
    /// Scripted autoplace outcomes: `Some(err)` fails that call, `None`
    /// lets it run normally. Consumed front to back.
    autoplace_script: VecDeque<Option<BackendError>>,
    list_failure: Option<BackendError>,
    replicas_failure: Option<BackendError>,
    latency: Option<Duration>,
}

impl Inner {
    fn used_slots(&self, node: &str) -> u32 {
        self.volumes
            .values()
            .flat_map(|v| v.replicas.iter())
            .filter(|r| r.node_name == node)
            .count() as u32
    }

    fn free_slots(&self, spec: &NodeSpec) -> u32 {
        spec.capacity
            .map_or(u32::MAX, |cap| cap.saturating_sub(self.used_slots(&spec.name)))
    }

    fn list_nodes(&self, opts: &ListOpts) -> BackendResult<Vec<Node>> {
        let mut filters = Vec::with_capacity(opts.props.len());
        for (raw, parsed) in opts.props.iter().zip(opts.parsed_props()) {
            let (key, value) = parsed.ok_or_else(|| {
                BackendError::api(ApiCode::InvalidProperty, format!("malformed filter {raw:?}"))
            })?;
            filters.push((key, value));
        }

        Ok(self
            .nodes
            .values()
            .filter(|spec| {
                filters
                    .iter()
                    .all(|(k, v)| spec.properties.get(*k).is_some_and(|nv| nv == v))
            })
            .map(NodeSpec::to_node)
            .collect())
    }

    fn autoplace(&mut self, volume: &VolumeHandle, request: &AutoPlaceRequest) -> BackendResult<()> {
        let (target, hosting): (u32, Vec<String>) = {
            let entry = self.volumes.get(volume).ok_or_else(|| {
                BackendError::api(
                    ApiCode::UnknownResourceDefinition,
                    format!("resource definition {volume} not found"),
                )
            })?;
            let target = request.select_filter.place_count.unwrap_or(entry.place_count);
            (target, entry.replicas.iter().map(|r| r.node_name.clone()).collect())
        };

        let existing = self.volumes[volume]
            .replicas
            .iter()
            .filter(|r| !r.diskless)
            .count() as u32;
        if existing >= target {
            trace!(%volume, existing, target, "autoplace already satisfied");
            return Ok(());
        }
        let needed = (target - existing) as usize;

        let allowed = &request.select_filter.node_name_list;
        let mut candidates: Vec<(&NodeSpec, u32)> = self
            .nodes
            .values()
            .filter(|spec| spec.online)
            .filter(|spec| allowed.is_empty() || allowed.contains(&spec.name))
            .filter(|spec| !hosting.contains(&spec.name))
            .map(|spec| (spec, self.free_slots(spec)))
            .filter(|(_, free)| *free > 0)
            .collect();

        if candidates.len() < needed {
            return Err(BackendError::api(
                ApiCode::NotEnoughNodes,
                format!(
                    "{volume}: {needed} more replica(s) required, only {} eligible node(s)",
                    candidates.len()
                ),
            ));
        }

        candidates.sort_by(|(a, fa), (b, fb)| fb.cmp(fa).then_with(|| a.name.cmp(&b.name)));
        let chosen: Vec<String> = candidates
            .into_iter()
            .take(needed)
            .map(|(spec, _)| spec.name.clone())
            .collect();

        debug!(%volume, nodes = ?chosen, "autoplace placed replicas");
        if let Some(entry) = self.volumes.get_mut(volume) {
            entry
                .replicas
                .extend(chosen.into_iter().map(|node_name| ReplicaInfo {
                    node_name,
                    diskless: false,
                }));
        }
        Ok(())
    }
}

/// Shared, cloneable in-memory backend.
#[derive(Debug, Clone, Default)]
pub struct InMemoryBackend {
    inner: Arc<Mutex<Inner>>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a backend pre-populated with the given nodes.
    pub fn with_nodes(nodes: impl IntoIterator<Item = NodeSpec>) -> Self {
        let backend = Self::new();
        for node in nodes {
            backend.add_node(node);
        }
        backend
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    // ── Setup ──────────────────────────────────────────────────────

    /// Register (or replace) a node.
    pub fn add_node(&self, node: NodeSpec) {
        self.lock().nodes.insert(node.name.clone(), node);
    }

    pub fn set_online(&self, node: &str, online: bool) {
        if let Some(spec) = self.lock().nodes.get_mut(node) {
            spec.online = online;
        }
    }

    /// Define a volume whose unconstrained autoplace targets `place_count`.
    pub fn define_volume(&self, volume: &VolumeHandle, place_count: u32) {
        self.lock()
            .volumes
            .entry(volume.clone())
            .and_modify(|v| v.place_count = place_count)
            .or_insert(VolumeEntry {
                place_count,
                replicas: Vec::new(),
            });
    }

    /// Attach a diskless replica, as the backend does for remote access.
    pub fn add_diskless_replica(&self, volume: &VolumeHandle, node: &str) {
        if let Some(entry) = self.lock().volumes.get_mut(volume) {
            entry.replicas.push(ReplicaInfo {
                node_name: node.to_string(),
                diskless: true,
            });
        }
    }

    // ── Scripting ──────────────────────────────────────────────────

    /// Make the next unscripted autoplace call fail with `err`.
    pub fn fail_next_autoplace(&self, err: BackendError) {
        self.lock().autoplace_script.push_back(Some(err));
    }

    /// Let the next unscripted autoplace call run normally.
    pub fn pass_next_autoplace(&self) {
        self.lock().autoplace_script.push_back(None);
    }

    /// Make every node listing fail with `err` until cleared.
    pub fn fail_node_listing(&self, err: BackendError) {
        self.lock().list_failure = Some(err);
    }

    pub fn clear_node_listing_failure(&self) {
        self.lock().list_failure = None;
    }

    /// Make every replica listing fail with `err`.
    pub fn fail_replica_listing(&self, err: BackendError) {
        self.lock().replicas_failure = Some(err);
    }

    /// Delay every call by `latency` before it takes effect.
    pub fn set_latency(&self, latency: Duration) {
        self.lock().latency = Some(latency);
    }

    // ── Inspection ─────────────────────────────────────────────────

    pub fn calls(&self) -> Vec<BackendCall> {
        self.lock().calls.clone()
    }

    pub fn autoplace_calls(&self) -> Vec<AutoPlaceRequest> {
        self.lock()
            .calls
            .iter()
            .filter_map(|c| match c {
                BackendCall::Autoplace { request, .. } => Some(request.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn list_calls(&self) -> Vec<ListOpts> {
        self.lock()
            .calls
            .iter()
            .filter_map(|c| match c {
                BackendCall::ListNodes { props } => Some(ListOpts {
                    props: props.clone(),
                }),
                _ => None,
            })
            .collect()
    }

    /// Nodes holding a diskful replica of `volume`, in placement order.
    pub fn replica_nodes(&self, volume: &VolumeHandle) -> Vec<String> {
        self.lock()
            .volumes
            .get(volume)
            .map(|v| {
                v.replicas
                    .iter()
                    .filter(|r| !r.diskless)
                    .map(|r| r.node_name.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    fn record(&self, call: BackendCall) -> Option<Duration> {
        let mut inner = self.lock();
        inner.calls.push(call);
        inner.latency
    }
}

impl NodeApi for InMemoryBackend {
    fn list_nodes<'a>(&'a self, opts: &'a ListOpts) -> BackendFuture<'a, Vec<Node>> {
        Box::pin(async move {
            let latency = self.record(BackendCall::ListNodes {
                props: opts.props.clone(),
            });
            if let Some(latency) = latency {
                tokio::time::sleep(latency).await;
            }

            let inner = self.lock();
            if let Some(err) = &inner.list_failure {
                return Err(err.clone());
            }
            inner.list_nodes(opts)
        })
    }
}

impl PlacementApi for InMemoryBackend {
    fn autoplace<'a>(
        &'a self,
        volume: &'a VolumeHandle,
        request: AutoPlaceRequest,
    ) -> BackendFuture<'a, ()> {
        Box::pin(async move {
            let latency = self.record(BackendCall::Autoplace {
                volume: volume.to_string(),
                request: request.clone(),
            });
            if let Some(latency) = latency {
                tokio::time::sleep(latency).await;
            }

            let mut inner = self.lock();
            if let Some(Some(err)) = inner.autoplace_script.pop_front() {
                debug!(%volume, error = %err, "scripted autoplace failure");
                return Err(err);
            }
            inner.autoplace(volume, &request)
        })
    }

    fn replicas<'a>(&'a self, volume: &'a VolumeHandle) -> BackendFuture<'a, Vec<ReplicaInfo>> {
        Box::pin(async move {
            let latency = self.record(BackendCall::Replicas {
                volume: volume.to_string(),
            });
            if let Some(latency) = latency {
                tokio::time::sleep(latency).await;
            }

            let inner = self.lock();
            if let Some(err) = &inner.replicas_failure {
                return Err(err.clone());
            }
            inner
                .volumes
                .get(volume)
                .map(|v| v.replicas.clone())
                .ok_or_else(|| {
                    BackendError::api(
                        ApiCode::UnknownResourceDefinition,
                        format!("resource definition {volume} not found"),
                    )
                })
        })
    }
}
