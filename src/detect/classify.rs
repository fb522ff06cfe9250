use crate::detect::{AnomalyFlag, Classification, EnrichedRecord};
use crate::ingest::clean::AccessRecord;

/// Status value for a refused access.
pub const DENIED_STATUS: &str = "Negado";
/// Marker substring for alarm events.
pub const ALARM_MARKER: &str = "Alarme";

/// Severity tier of one event. The anomaly flag wins over everything else.
pub fn classify(anomaly: AnomalyFlag, status: &str, event_type: &str) -> Classification {
    if anomaly.is_outlier() {
        Classification::Suspicious
    } else if status == DENIED_STATUS || event_type.contains(ALARM_MARKER) {
        Classification::Critical
    } else {
        Classification::Normal
    }
}

/// Pair each record with its anomaly flag and classify it.
///
/// `records` and `flags` are matched positionally and must be the same length.
pub fn enrich(records: Vec<AccessRecord>, flags: &[AnomalyFlag]) -> Vec<EnrichedRecord> {
    debug_assert_eq!(records.len(), flags.len(), "one anomaly flag per record");
    records
        .into_iter()
        .zip(flags.iter().copied())
        .map(|(record, anomaly)| EnrichedRecord {
            classification: classify(anomaly, &record.status, &record.event_type),
            anomaly,
            record,
        })
        .collect()
}
