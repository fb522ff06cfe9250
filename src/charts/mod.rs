//! Descriptive charts over the enriched record set.
//!
//! Each chart is first aggregated into a serializable spec (the data that
//! matters), then written as `<name>.json` next to an SVG rendering.

pub mod svg;

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use serde::Serialize;
use thiserror::Error;
use tracing::info;

use crate::detect::{AnomalyFlag, EnrichedRecord};

pub const HOURLY_DISTRIBUTION: &str = "hourly_distribution";
pub const RESPONSE_TIME_ANOMALIES: &str = "response_time_anomalies";
pub const EVENT_TYPE_COUNTS: &str = "event_type_counts";

#[derive(Debug, Error)]
pub enum ChartError {
    #[error("failed to write chart '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to render chart '{name}': {source}")]
    Template {
        name: &'static str,
        #[source]
        source: askama::Error,
    },

    #[error("failed to serialize chart '{name}': {source}")]
    Json {
        name: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

/// One annotated bar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Bar {
    pub label: String,
    pub count: usize,
}

/// Count-per-category bar chart.
#[derive(Debug, Clone, Serialize)]
pub struct BarChart {
    pub title: String,
    pub x_label: String,
    pub y_label: String,
    /// Rotation of the category labels, in degrees.
    pub x_tick_rotation: i32,
    pub bars: Vec<Bar>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScatterPoint {
    pub timestamp: NaiveDateTime,
    pub response_time: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScatterSeries {
    pub anomaly: AnomalyFlag,
    pub points: Vec<ScatterPoint>,
}

/// Timestamp vs. response time, one series per anomaly flag.
#[derive(Debug, Clone, Serialize)]
pub struct ScatterChart {
    pub title: String,
    pub x_label: String,
    pub y_label: String,
    pub series: Vec<ScatterSeries>,
}

/// Records per hour of day. Always 24 bars, hours without records count 0.
pub fn hourly_distribution(records: &[EnrichedRecord]) -> BarChart {
    let mut counts = [0usize; 24];
    for r in records {
        counts[r.record.hour as usize % 24] += 1;
    }

    BarChart {
        title: "Access distribution by hour of day".to_string(),
        x_label: "Hour of day".to_string(),
        y_label: "Number of accesses".to_string(),
        x_tick_rotation: 0,
        bars: counts
            .iter()
            .enumerate()
            .map(|(hour, &count)| Bar {
                label: hour.to_string(),
                count,
            })
            .collect(),
    }
}

/// Raw scatter coordinates grouped by anomaly flag, inliers first.
/// Flags with no records get no series.
pub fn response_anomalies(records: &[EnrichedRecord]) -> ScatterChart {
    let series = [AnomalyFlag::Inlier, AnomalyFlag::Outlier]
        .into_iter()
        .map(|flag| ScatterSeries {
            anomaly: flag,
            points: records
                .iter()
                .filter(|r| r.anomaly == flag)
                .map(|r| ScatterPoint {
                    timestamp: r.record.timestamp,
                    response_time: r.record.response_time.as_secs(),
                })
                .collect(),
        })
        .filter(|s| !s.points.is_empty())
        .collect();

    ScatterChart {
        title: "Response time anomalies".to_string(),
        x_label: "Date and time".to_string(),
        y_label: "Response time (seconds)".to_string(),
        series,
    }
}

/// Records per distinct event type, in order of first appearance.
pub fn event_type_counts(records: &[EnrichedRecord]) -> BarChart {
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut bars: Vec<Bar> = Vec::new();

    for r in records {
        let event = r.record.event_type.as_str();
        match index.get(event) {
            Some(&i) => bars[i].count += 1,
            None => {
                index.insert(event, bars.len());
                bars.push(Bar {
                    label: event.to_string(),
                    count: 1,
                });
            }
        }
    }

    BarChart {
        title: "Event type counts".to_string(),
        x_label: "Event type".to_string(),
        y_label: "Count".to_string(),
        x_tick_rotation: -45,
        bars,
    }
}

/// Aggregate and write all three charts into `dir`, creating it if needed.
/// Returns the written file paths.
pub fn render_all(records: &[EnrichedRecord], dir: &Path) -> Result<Vec<PathBuf>, ChartError> {
    fs::create_dir_all(dir).map_err(|source| ChartError::Io {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut written = Vec::with_capacity(6);

    let hourly = hourly_distribution(records);
    written.extend(write_chart(dir, HOURLY_DISTRIBUTION, &hourly, svg::bar_chart(&hourly))?);

    let scatter = response_anomalies(records);
    written.extend(write_chart(dir, RESPONSE_TIME_ANOMALIES, &scatter, svg::scatter_chart(&scatter))?);

    let events = event_type_counts(records);
    written.extend(write_chart(dir, EVENT_TYPE_COUNTS, &events, svg::bar_chart(&events))?);

    info!(dir = %dir.display(), files = written.len(), "rendered charts");
    Ok(written)
}

fn write_chart<T: Serialize>(
    dir: &Path,
    name: &'static str,
    spec: &T,
    rendered: askama::Result<String>,
) -> Result<[PathBuf; 2], ChartError> {
    let json = serde_json::to_string_pretty(spec).map_err(|source| ChartError::Json { name, source })?;
    let svg = rendered.map_err(|source| ChartError::Template { name, source })?;

    let json_path = dir.join(format!("{name}.json"));
    let svg_path = dir.join(format!("{name}.svg"));
    for (path, body) in [(&json_path, json), (&svg_path, svg)] {
        fs::write(path, body).map_err(|source| ChartError::Io {
            path: path.clone(),
            source,
        })?;
    }
    Ok([json_path, svg_path])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::Classification;
    use crate::ingest::clean::{AccessRecord, ResponseTime, UNKNOWN_USER_TYPE};
    use chrono::NaiveDate;

    fn rec(hour: u32, event: &str, secs: u32, anomaly: AnomalyFlag) -> EnrichedRecord {
        EnrichedRecord {
            record: AccessRecord {
                timestamp: NaiveDate::from_ymd_opt(2024, 1, 1)
                    .unwrap()
                    .and_hms_opt(hour, 0, 0)
                    .unwrap(),
                hour,
                minute: 0,
                event_type: event.to_string(),
                status: "Permitido".to_string(),
                subject: "X".to_string(),
                observations: None,
                user_type: UNKNOWN_USER_TYPE.to_string(),
                response_time: ResponseTime::from_secs(secs),
            },
            anomaly,
            classification: Classification::Normal,
        }
    }

    fn sample() -> Vec<EnrichedRecord> {
        vec![
            rec(8, "Entrada", 3, AnomalyFlag::Inlier),
            rec(8, "Saída", 4, AnomalyFlag::Inlier),
            rec(9, "Entrada", 2, AnomalyFlag::Inlier),
            rec(23, "Alarme Disparado", 9000, AnomalyFlag::Outlier),
        ]
    }

    #[test]
    fn test_hourly_distribution_has_24_bars() {
        let chart = hourly_distribution(&sample());
        assert_eq!(chart.bars.len(), 24);
        assert_eq!(chart.bars[8].count, 2);
        assert_eq!(chart.bars[9].count, 1);
        assert_eq!(chart.bars[23].count, 1);
        assert_eq!(chart.bars[0].count, 0);
        assert_eq!(chart.bars.iter().map(|b| b.count).sum::<usize>(), 4);
    }

    #[test]
    fn test_event_type_counts_first_appearance_order() {
        let chart = event_type_counts(&sample());
        let labels: Vec<&str> = chart.bars.iter().map(|b| b.label.as_str()).collect();
        assert_eq!(labels, ["Entrada", "Saída", "Alarme Disparado"]);
        assert_eq!(chart.bars[0].count, 2);
        assert_eq!(chart.x_tick_rotation, -45);
    }

    #[test]
    fn test_response_anomalies_groups_by_flag() {
        let chart = response_anomalies(&sample());
        assert_eq!(chart.series.len(), 2);
        assert_eq!(chart.series[0].anomaly, AnomalyFlag::Inlier);
        assert_eq!(chart.series[0].points.len(), 3);
        assert_eq!(chart.series[1].anomaly, AnomalyFlag::Outlier);
        assert_eq!(chart.series[1].points[0].response_time, 9000);
    }

    #[test]
    fn test_response_anomalies_skips_empty_series() {
        let records = vec![rec(8, "Entrada", 3, AnomalyFlag::Inlier)];
        let chart = response_anomalies(&records);
        assert_eq!(chart.series.len(), 1);
    }

    #[test]
    fn test_render_all_writes_files() {
        let dir = tempfile::TempDir::new().unwrap();
        let out = dir.path().join("charts");
        let written = render_all(&sample(), &out).unwrap();

        assert_eq!(written.len(), 6);
        for path in &written {
            assert!(path.exists(), "missing {}", path.display());
        }

        let json = std::fs::read_to_string(out.join("event_type_counts.json")).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["bars"][2]["label"], "Alarme Disparado");
        assert_eq!(value["bars"][2]["count"], 1);

        let svg = std::fs::read_to_string(out.join("hourly_distribution.svg")).unwrap();
        assert!(svg.starts_with("<svg"));
    }

    #[test]
    fn test_render_empty_set() {
        let dir = tempfile::TempDir::new().unwrap();
        let written = render_all(&[], dir.path()).unwrap();
        assert_eq!(written.len(), 6);
    }
}
