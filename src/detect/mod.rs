//! Response-time anomaly scoring and severity classification.

pub mod classify;
pub mod forest;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ingest::clean::AccessRecord;

#[derive(Debug, Error)]
pub enum DetectError {
    #[error("insufficient baseline data: need {needed} samples, have {have}")]
    InsufficientBaseline { needed: usize, have: usize },

    #[error("contamination must be in (0, 0.5], got {0}")]
    InvalidContamination(f64),

    #[error("detector parameter '{name}' must be at least 1")]
    InvalidParameter { name: &'static str },

    #[error("unknown {kind} label {value:?}")]
    UnknownLabel { kind: &'static str, value: String },
}

/// Detector verdict for a single record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnomalyFlag {
    Outlier,
    Inlier,
}

impl AnomalyFlag {
    pub fn as_str(self) -> &'static str {
        match self {
            AnomalyFlag::Outlier => "outlier",
            AnomalyFlag::Inlier => "inlier",
        }
    }

    pub fn is_outlier(self) -> bool {
        self == AnomalyFlag::Outlier
    }
}

impl fmt::Display for AnomalyFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AnomalyFlag {
    type Err = DetectError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "outlier" => Ok(AnomalyFlag::Outlier),
            "inlier" => Ok(AnomalyFlag::Inlier),
            other => Err(DetectError::UnknownLabel {
                kind: "anomaly",
                value: other.to_string(),
            }),
        }
    }
}

/// Severity tier of an access event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Classification {
    Normal,
    Suspicious,
    Critical,
}

impl Classification {
    pub fn as_str(self) -> &'static str {
        match self {
            Classification::Normal => "Normal",
            Classification::Suspicious => "Suspicious",
            Classification::Critical => "Critical",
        }
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Classification {
    type Err = DetectError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Normal" => Ok(Classification::Normal),
            "Suspicious" => Ok(Classification::Suspicious),
            "Critical" => Ok(Classification::Critical),
            other => Err(DetectError::UnknownLabel {
                kind: "classification",
                value: other.to_string(),
            }),
        }
    }
}

/// An access record after scoring and classification.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnrichedRecord {
    #[serde(flatten)]
    pub record: AccessRecord,
    pub anomaly: AnomalyFlag,
    pub classification: Classification,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_labels_parse_back() {
        for flag in [AnomalyFlag::Outlier, AnomalyFlag::Inlier] {
            assert_eq!(flag.as_str().parse::<AnomalyFlag>().unwrap(), flag);
        }
        for tier in [
            Classification::Normal,
            Classification::Suspicious,
            Classification::Critical,
        ] {
            assert_eq!(tier.to_string().parse::<Classification>().unwrap(), tier);
        }
        assert!("Crítico".parse::<Classification>().is_err());
        assert!("-1".parse::<AnomalyFlag>().is_err());
    }

    #[test]
    fn test_flag_serializes_lowercase() {
        let json = serde_json::to_string(&AnomalyFlag::Outlier).unwrap();
        assert_eq!(json, "\"outlier\"");
    }
}
