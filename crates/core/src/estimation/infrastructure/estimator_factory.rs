use serde::{Deserialize, Serialize};

use crate::estimation::domain::landmark_estimator::{EstimatorError, LandmarkEstimator};
use crate::estimation::infrastructure::centroid_estimator::CentroidEstimator;

/// Known estimation engines. Adding a variant forces the `build_estimator`
/// match to handle it, so the registry stays compile-time checked instead
/// of dispatching on strings.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EstimatorKind {
    Centroid,
}

/// Detector configuration carried inside a `RunSpec`. Serializable so the
/// process-pool strategy can ship it to worker processes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EstimatorConfig {
    pub kind: EstimatorKind,
    /// Category name the engine reports its landmarks under.
    #[serde(default = "default_category")]
    pub category: String,
    /// Minimum luma (0-255) a pixel needs to contribute to the centroid.
    #[serde(default = "default_min_luma")]
    pub min_luma: f64,
}

fn default_category() -> String {
    "centroid".to_string()
}

fn default_min_luma() -> f64 {
    128.0
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            kind: EstimatorKind::Centroid,
            category: default_category(),
            min_luma: default_min_luma(),
        }
    }
}

/// Constructs the estimator an `EstimatorConfig` describes.
pub fn build_estimator(
    config: &EstimatorConfig,
) -> Result<Box<dyn LandmarkEstimator>, EstimatorError> {
    if config.category.is_empty() {
        return Err(EstimatorError::Init(
            "category name must not be empty".to_string(),
        ));
    }
    if !(0.0..=255.0).contains(&config.min_luma) {
        return Err(EstimatorError::Init(format!(
            "min_luma must be within 0-255, got {}",
            config.min_luma
        )));
    }

    match config.kind {
        EstimatorKind::Centroid => Ok(Box::new(CentroidEstimator::new(
            config.category.clone(),
            config.min_luma,
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builds_centroid_estimator() {
        let est = build_estimator(&EstimatorConfig::default()).unwrap();
        assert_eq!(est.categories().len(), 1);
        assert_eq!(est.categories()[0].name, "centroid");
    }

    #[test]
    fn test_rejects_empty_category() {
        let config = EstimatorConfig {
            category: String::new(),
            ..EstimatorConfig::default()
        };
        assert!(matches!(
            build_estimator(&config),
            Err(EstimatorError::Init(_))
        ));
    }

    #[test]
    fn test_rejects_out_of_range_luma() {
        let config = EstimatorConfig {
            min_luma: 300.0,
            ..EstimatorConfig::default()
        };
        assert!(matches!(
            build_estimator(&config),
            Err(EstimatorError::Init(_))
        ));
    }

    #[test]
    fn test_config_serde_roundtrip() {
        let config = EstimatorConfig {
            kind: EstimatorKind::Centroid,
            category: "pointA".to_string(),
            min_luma: 64.0,
        };
        let json = serde_json::to_string(&config).unwrap();
        let back: EstimatorConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(config, back);
    }

    #[test]
    fn test_config_defaults_fill_missing_fields() {
        let config: EstimatorConfig = serde_json::from_str(r#"{"kind":"centroid"}"#).unwrap();
        assert_eq!(config.category, "centroid");
        assert_eq!(config.min_luma, 128.0);
    }
}
