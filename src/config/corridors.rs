//! Corridor and intermediary-port definitions loaded from YAML.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::types::CorridorType;

/// One corridor definition row from `corridors.yaml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorridorDefinition {
    pub name: String,
    pub corridor_type: CorridorType,
    /// WKT POLYGON in WGS-84.
    pub geometry: String,
    #[serde(default = "default_risk_weight")]
    pub risk_weight: f64,
    #[serde(default)]
    pub is_jamming_zone: bool,
}

fn default_risk_weight() -> f64 {
    1.0
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct CorridorsFile {
    #[serde(default)]
    corridors: Vec<CorridorDefinition>,
}

/// Load corridor definitions. A missing file yields an empty list.
pub fn load_corridor_definitions(path: &Path) -> Result<Vec<CorridorDefinition>, super::ConfigError> {
    if !path.exists() {
        tracing::warn!(path = %path.display(), "corridors.yaml not found - no corridors seeded");
        return Ok(Vec::new());
    }
    let contents =
        std::fs::read_to_string(path).map_err(|e| super::ConfigError::Io(path.to_path_buf(), e))?;
    let file: CorridorsFile = serde_yaml::from_str(&contents)
        .map_err(|e| super::ConfigError::Yaml(path.to_path_buf(), e))?;
    Ok(file.corridors)
}

/// One intermediary port used by route-laundering classification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntermediaryPort {
    pub name: String,
    /// ISO 3166-1 alpha-2 country code.
    pub country: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct IntermediariesFile {
    #[serde(default)]
    intermediary_ports: Vec<IntermediaryPort>,
}

/// Load the laundering intermediary port list. Missing file yields empty.
pub fn load_intermediary_ports(path: &Path) -> Result<Vec<IntermediaryPort>, super::ConfigError> {
    if !path.exists() {
        tracing::warn!(path = %path.display(), "laundering_intermediaries.yaml not found");
        return Ok(Vec::new());
    }
    let contents =
        std::fs::read_to_string(path).map_err(|e| super::ConfigError::Io(path.to_path_buf(), e))?;
    let file: IntermediariesFile = serde_yaml::from_str(&contents)
        .map_err(|e| super::ConfigError::Yaml(path.to_path_buf(), e))?;
    Ok(file.intermediary_ports)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_corridor_yaml_shape() {
        let yaml = r"
corridors:
  - name: Baltic Export Corridor
    corridor_type: export_route
    geometry: POLYGON((20.0 54.0, 30.0 54.0, 30.0 60.0, 20.0 60.0, 20.0 54.0))
    risk_weight: 1.5
  - name: Laconian Gulf STS
    corridor_type: sts_zone
    geometry: POLYGON((22.0 36.0, 23.5 36.0, 23.5 37.0, 22.0 37.0, 22.0 36.0))
    is_jamming_zone: false
";
        let file: CorridorsFile = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(file.corridors.len(), 2);
        assert_eq!(file.corridors[0].corridor_type, CorridorType::ExportRoute);
        assert_eq!(file.corridors[1].risk_weight, 1.0);
    }

    #[test]
    fn test_intermediaries_yaml_shape() {
        let yaml = r"
intermediary_ports:
  - name: Fujairah
    country: AE
  - name: Ceuta
    country: ES
";
        let file: IntermediariesFile = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(file.intermediary_ports.len(), 2);
        assert_eq!(file.intermediary_ports[1].country, "ES");
    }
}
