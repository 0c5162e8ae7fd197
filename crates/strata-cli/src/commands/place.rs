//! `strata place`: run one create request against a simulated cluster.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use strata_backend::{BackendCall, InMemoryBackend, NodeSpec};
use strata_core::{
    Segment, StrataConfig, TopologyRequirement, VolumeHandle, VolumeInfo, VolumeParameters,
};
use strata_scheduler::{RequestContext, Scheduler, StatusCode};
use tracing::{info, warn};

#[derive(Debug, Default, Deserialize)]
pub struct ClusterFile {
    #[serde(default)]
    pub nodes: Vec<NodeSpec>,
}

#[derive(Debug, Deserialize)]
pub struct PlacementRequest {
    pub volume: VolumeHandle,
    #[serde(default)]
    pub parameters: HashMap<String, String>,
    #[serde(default)]
    pub topology: TopologyRequirement,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    Placed,
    Failed { code: StatusCode, error: String },
}

#[derive(Debug, Serialize)]
pub struct PlacementReport {
    pub strategy: &'static str,
    pub volume: VolumeHandle,
    pub outcome: Outcome,
    pub replicas: Vec<String>,
    /// Only reported when placement succeeded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accessible_topologies: Option<Vec<Segment>>,
    /// Set when placement succeeded but the topology lookup did not.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accessible_topologies_error: Option<String>,
    pub calls: Vec<BackendCall>,
}

pub fn load_cluster(path: &Path) -> anyhow::Result<InMemoryBackend> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading cluster file {}", path.display()))?;
    let cluster: ClusterFile = toml::from_str(&content)
        .with_context(|| format!("parsing cluster file {}", path.display()))?;
    info!(nodes = cluster.nodes.len(), "cluster loaded");
    Ok(InMemoryBackend::with_nodes(cluster.nodes))
}

pub fn load_request(path: &Path) -> anyhow::Result<PlacementRequest> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading request file {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("parsing request file {}", path.display()))
}

/// Schedule `request` on `backend` and describe what happened.
pub async fn simulate(
    config: &StrataConfig,
    backend: InMemoryBackend,
    request: PlacementRequest,
    ctx: &RequestContext,
) -> anyhow::Result<PlacementReport> {
    let vol = VolumeInfo {
        id: request.volume,
        parameters: request.parameters,
    };

    // Invalid parameters still reach the scheduler so the report carries
    // its classification.
    let place_count = VolumeParameters::from_map(&vol.parameters)
        .map(|p| p.placement_count)
        .unwrap_or(1);
    backend.define_volume(&vol.id, place_count);

    let scheduler = Scheduler::from_config(config, Arc::new(backend.clone()));
    let mut accessible_topologies = None;
    let mut accessible_topologies_error = None;
    let outcome = match scheduler.create(ctx, &vol, &request.topology).await {
        Ok(()) => {
            match scheduler.accessible_topologies(ctx, &vol).await {
                Ok(topos) => accessible_topologies = Some(topos),
                Err(err) => {
                    warn!(volume = %vol.id, error = %err, "accessible topology lookup failed");
                    accessible_topologies_error = Some(err.to_string());
                }
            }
            Outcome::Placed
        }
        Err(err) => {
            warn!(volume = %vol.id, error = %err, "placement failed");
            Outcome::Failed {
                code: err.code(),
                error: err.to_string(),
            }
        }
    };

    Ok(PlacementReport {
        strategy: scheduler.name(),
        replicas: backend.replica_nodes(&vol.id),
        volume: vol.id,
        outcome,
        accessible_topologies,
        accessible_topologies_error,
        calls: backend.calls(),
    })
}

/// Returns whether the volume was placed.
pub async fn run(config: &StrataConfig, cluster: &Path, request: &Path) -> anyhow::Result<bool> {
    let backend = load_cluster(cluster)?;
    let request = load_request(request)?;

    let (cancel, mut ctx) = RequestContext::cancellable();
    if let Some(timeout) = config.scheduler.request_timeout()? {
        ctx = ctx.with_timeout(timeout);
    }
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received, cancelling request");
            cancel.cancel();
        }
    });

    let report = simulate(config, backend, request, &ctx).await;
    interrupt.abort();
    let report = report?;

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(report.outcome == Outcome::Placed)
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use strata_backend::BackendError;
    use strata_core::SchedulerKind;
    use tempfile::TempDir;

    use super::*;

    const CLUSTER: &str = r#"
[[nodes]]
name = "node-a"
[nodes.properties]
"Aux/zone" = "z1"

[[nodes]]
name = "node-b"
capacity = 4
[nodes.properties]
"Aux/zone" = "z1"

[[nodes]]
name = "node-c"
online = false
[nodes.properties]
"Aux/zone" = "z2"
"#;

    fn write(dir: &TempDir, name: &str, content: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn loads_cluster_file() {
        let tmp = TempDir::new().unwrap();
        let path = write(&tmp, "cluster.toml", CLUSTER);
        let cluster: ClusterFile = toml::from_str(CLUSTER).unwrap();

        assert_eq!(cluster.nodes.len(), 3);
        assert_eq!(cluster.nodes[1].capacity, Some(4));
        assert!(!cluster.nodes[2].online);
        assert!(load_cluster(&path).is_ok());
    }

    #[test]
    fn loads_request_with_defaults() {
        let tmp = TempDir::new().unwrap();
        let path = write(&tmp, "request.json", r#"{"volume": "pvc-1"}"#);

        let request = load_request(&path).unwrap();
        assert_eq!(request.volume.as_str(), "pvc-1");
        assert!(request.parameters.is_empty());
        assert!(request.topology.is_unconstrained());
    }

    #[test]
    fn missing_file_names_the_path() {
        let err = load_request(Path::new("/nonexistent/request.json")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/request.json"));
    }

    #[tokio::test]
    async fn report_for_successful_placement() {
        let backend = InMemoryBackend::with_nodes(toml::from_str::<ClusterFile>(CLUSTER).unwrap().nodes);
        let request: PlacementRequest = serde_json::from_value(json!({
            "volume": "pvc-1",
            "parameters": {"placementCount": "2"},
            "topology": {"requisite": [{"zone": "z1"}]}
        }))
        .unwrap();

        let report = simulate(&StrataConfig::default(), backend, request, &RequestContext::background())
            .await
            .unwrap();

        assert_eq!(report.strategy, "autoplace-topology");
        assert_eq!(report.outcome, Outcome::Placed);
        assert_eq!(report.replicas, vec!["node-a", "node-b"]);
        assert_eq!(report.accessible_topologies.as_ref().map(Vec::len), Some(2));

        let rendered = serde_json::to_value(&report).unwrap();
        assert_eq!(rendered["outcome"], json!({"status": "placed"}));
        assert_eq!(rendered["calls"][0]["call"], "list_nodes");
    }

    #[tokio::test]
    async fn topology_lookup_failure_still_reports_placement() {
        let backend = InMemoryBackend::with_nodes(toml::from_str::<ClusterFile>(CLUSTER).unwrap().nodes);
        backend.fail_replica_listing(BackendError::Transport("connection reset".into()));
        let request: PlacementRequest =
            serde_json::from_value(json!({"volume": "pvc-5"})).unwrap();

        let report = simulate(&StrataConfig::default(), backend, request, &RequestContext::background())
            .await
            .unwrap();

        assert_eq!(report.outcome, Outcome::Placed);
        assert_eq!(report.replicas.len(), 1);
        assert!(report.accessible_topologies.is_none());
        let error = report.accessible_topologies_error.as_deref().unwrap();
        assert!(error.contains("connection reset"));

        let rendered = serde_json::to_value(&report).unwrap();
        assert!(rendered.get("accessible_topologies").is_none());
        assert!(rendered["accessible_topologies_error"].is_string());
    }

    #[tokio::test]
    async fn report_for_exhausted_zone() {
        let backend = InMemoryBackend::with_nodes(toml::from_str::<ClusterFile>(CLUSTER).unwrap().nodes);
        let request: PlacementRequest = serde_json::from_value(json!({
            "volume": "pvc-2",
            "topology": {"requisite": [{"zone": "z2"}]}
        }))
        .unwrap();

        let report = simulate(&StrataConfig::default(), backend, request, &RequestContext::background())
            .await
            .unwrap();

        match &report.outcome {
            Outcome::Failed { code, .. } => assert_eq!(*code, StatusCode::ResourceExhausted),
            other => panic!("unexpected outcome {other:?}"),
        }
        assert!(report.replicas.is_empty());
        assert!(report.accessible_topologies.is_none());
    }

    #[tokio::test]
    async fn report_for_bad_parameters() {
        let request: PlacementRequest = serde_json::from_value(json!({
            "volume": "pvc-3",
            "parameters": {"placementCount": "many"}
        }))
        .unwrap();

        let report = simulate(
            &StrataConfig::default(),
            InMemoryBackend::new(),
            request,
            &RequestContext::background(),
        )
        .await
        .unwrap();

        assert!(matches!(
            report.outcome,
            Outcome::Failed { code: StatusCode::InvalidArgument, .. }
        ));
        assert!(report.calls.is_empty());
    }

    #[tokio::test]
    async fn autoplace_strategy_from_config() {
        let backend = InMemoryBackend::with_nodes(toml::from_str::<ClusterFile>(CLUSTER).unwrap().nodes);
        let mut config = StrataConfig::default();
        config.scheduler.strategy = SchedulerKind::Autoplace;
        let request: PlacementRequest =
            serde_json::from_value(json!({"volume": "pvc-4"})).unwrap();

        let report = simulate(&config, backend, request, &RequestContext::background())
            .await
            .unwrap();

        assert_eq!(report.strategy, "autoplace");
        assert_eq!(report.replicas.len(), 1);
    }
}
