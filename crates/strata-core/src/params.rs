//! Volume parameters handed over from the storage class.
//!
//! Only the fields the placement layer needs are extracted here; everything
//! else in the map is validated by the provisioning pipeline and ignored.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Key carrying the replica count.
pub const PLACEMENT_COUNT_KEY: &str = "placementcount";
/// Legacy alias for [`PLACEMENT_COUNT_KEY`].
pub const AUTOPLACE_KEY: &str = "autoplace";
pub const ALLOW_REMOTE_ACCESS_KEY: &str = "allowremotevolumeaccess";
pub const RESOURCE_GROUP_KEY: &str = "resourcegroup";

/// Errors raised while reading volume parameters.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParameterError {
    #[error("invalid value for {key}: {value:?} ({reason})")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },

    #[error("placement count must be at least 1")]
    ZeroPlacementCount,
}

pub type ParameterResult<T> = Result<T, ParameterError>;

/// Typed view over the volume parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeParameters {
    /// Total number of replicas desired for the volume.
    pub placement_count: u32,
    /// Whether nodes without a local replica may attach the volume.
    pub allow_remote_volume_access: bool,
    pub resource_group: Option<String>,
}

impl Default for VolumeParameters {
    fn default() -> Self {
        Self {
            placement_count: 1,
            allow_remote_volume_access: false,
            resource_group: None,
        }
    }
}

impl VolumeParameters {
    /// Parse from the raw string map. Keys match case-insensitively.
    ///
    /// `placementCount` takes precedence over `autoPlace` when both are set.
    pub fn from_map(raw: &HashMap<String, String>) -> ParameterResult<Self> {
        let mut params = Self::default();

        // Sorted so that case variants of the same key resolve the same way
        // on every run.
        let mut entries: Vec<(&String, &String)> = raw.iter().collect();
        entries.sort();
        let has_primary = entries
            .iter()
            .any(|(k, _)| k.eq_ignore_ascii_case(PLACEMENT_COUNT_KEY));

        for (key, value) in entries {
            match key.to_ascii_lowercase().as_str() {
                AUTOPLACE_KEY if has_primary => {}
                PLACEMENT_COUNT_KEY | AUTOPLACE_KEY => {
                    params.placement_count = parse_count(key, value)?;
                }
                ALLOW_REMOTE_ACCESS_KEY => {
                    params.allow_remote_volume_access = parse_bool(key, value)?;
                }
                RESOURCE_GROUP_KEY => {
                    params.resource_group = Some(value.clone());
                }
                _ => {}
            }
        }

        Ok(params)
    }

}

fn parse_count(key: &str, value: &str) -> ParameterResult<u32> {
    let count = value
        .trim()
        .parse::<u32>()
        .map_err(|e| ParameterError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
            reason: e.to_string(),
        })?;
    if count == 0 {
        return Err(ParameterError::ZeroPlacementCount);
    }
    Ok(count)
}

fn parse_bool(key: &str, value: &str) -> ParameterResult<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "1" => Ok(true),
        "false" | "no" | "0" => Ok(false),
        _ => Err(ParameterError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
            reason: "expected a boolean".to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn defaults_to_single_replica() {
        let params = VolumeParameters::from_map(&HashMap::new()).unwrap();
        assert_eq!(params, VolumeParameters::default());
        assert_eq!(params.placement_count, 1);
    }

    #[test]
    fn keys_are_case_insensitive() {
        let params = VolumeParameters::from_map(&raw(&[
            ("placementCount", "3"),
            ("AllowRemoteVolumeAccess", "true"),
            ("resourceGroup", "rg-fast"),
        ]))
        .unwrap();
        assert_eq!(params.placement_count, 3);
        assert!(params.allow_remote_volume_access);
        assert_eq!(params.resource_group.as_deref(), Some("rg-fast"));
    }

    #[test]
    fn autoplace_alias() {
        let params = VolumeParameters::from_map(&raw(&[("autoPlace", "2")])).unwrap();
        assert_eq!(params.placement_count, 2);
    }

    #[test]
    fn placement_count_wins_over_autoplace() {
        let both = raw(&[("placementCount", "3"), ("autoPlace", "1")]);
        for _ in 0..50 {
            let params = VolumeParameters::from_map(&both).unwrap();
            assert_eq!(params.placement_count, 3);
        }

        // The alias is not even validated when the primary key is present.
        let params =
            VolumeParameters::from_map(&raw(&[("autoplace", "lots"), ("PlacementCount", "2")]))
                .unwrap();
        assert_eq!(params.placement_count, 2);
    }

    #[test]
    fn rejects_non_numeric_count() {
        let err = VolumeParameters::from_map(&raw(&[("placementCount", "three")])).unwrap_err();
        assert!(matches!(err, ParameterError::InvalidValue { ref key, .. } if key == "placementCount"));
    }

    #[test]
    fn rejects_zero_count() {
        let err = VolumeParameters::from_map(&raw(&[("placementCount", "0")])).unwrap_err();
        assert_eq!(err, ParameterError::ZeroPlacementCount);
    }

    #[test]
    fn rejects_bad_bool() {
        let err =
            VolumeParameters::from_map(&raw(&[("allowRemoteVolumeAccess", "maybe")])).unwrap_err();
        assert!(matches!(err, ParameterError::InvalidValue { .. }));
    }

    #[test]
    fn ignores_unknown_keys() {
        let params =
            VolumeParameters::from_map(&raw(&[("storagePool", "thin"), ("fsType", "xfs")])).unwrap();
        assert_eq!(params, VolumeParameters::default());
    }
}
