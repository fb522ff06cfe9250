//! Record cleaning and enrichment.
//!
//! Turns raw table rows into typed [`AccessRecord`]s: timestamps are parsed,
//! hour/minute and user type are derived, and the response time goes through
//! an explicit validation step. Rows with an invalid response time are
//! dropped; an invalid timestamp aborts the whole run.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Timelike};
use csv::StringRecord;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

use super::{
    IngestError, RawTable, COL_EVENT_TYPE, COL_OBSERVATIONS, COL_RESPONSE_TIME, COL_STATUS,
    COL_SUBJECT, COL_TIMESTAMP,
};

/// User type assigned when a record has no observations to derive it from.
pub const UNKNOWN_USER_TYPE: &str = "Unknown";

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
];

// Slash dates are month-first; day-first only when that cannot be valid.
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y", "%d/%m/%Y"];

#[derive(Debug, Error)]
pub enum CleanError {
    #[error("invalid timestamp {value:?} on line {line}")]
    InvalidTimestamp { line: u64, value: String },

    #[error(transparent)]
    Table(#[from] IngestError),
}

/// Why a response-time value was refused.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Rejection {
    #[error("empty value")]
    Empty,
    #[error("not a number")]
    NotNumeric,
    #[error("not a finite number")]
    NotFinite,
    #[error("negative duration")]
    Negative,
    #[error("duration out of range")]
    OutOfRange,
}

/// Gate response time in whole seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ResponseTime(u32);

impl ResponseTime {
    pub fn from_secs(secs: u32) -> Self {
        Self(secs)
    }

    pub fn as_secs(self) -> u32 {
        self.0
    }

    /// Validate a raw cell. Integer and decimal text are accepted; decimals are
    /// truncated toward zero.
    pub fn parse(raw: &str) -> Result<Self, Rejection> {
        let text = raw.trim();
        if text.is_empty() {
            return Err(Rejection::Empty);
        }
        if let Ok(secs) = text.parse::<u32>() {
            return Ok(Self(secs));
        }
        if let Ok(signed) = text.parse::<i64>() {
            return match signed {
                0 => Ok(Self(0)),
                s if s < 0 => Err(Rejection::Negative),
                _ => Err(Rejection::OutOfRange),
            };
        }

        let value: f64 = text.parse().map_err(|_| Rejection::NotNumeric)?;
        if !value.is_finite() {
            return Err(Rejection::NotFinite);
        }
        let truncated = value.trunc();
        if truncated < 0.0 {
            return Err(Rejection::Negative);
        }
        if truncated > f64::from(u32::MAX) {
            return Err(Rejection::OutOfRange);
        }
        Ok(Self(truncated as u32))
    }
}

/// A cleaned access event, before anomaly scoring.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AccessRecord {
    pub timestamp: NaiveDateTime,
    pub hour: u32,
    pub minute: u32,
    pub event_type: String,
    pub status: String,
    pub subject: String,
    pub observations: Option<String>,
    pub user_type: String,
    pub response_time: ResponseTime,
}

/// A row excluded by response-time validation.
#[derive(Debug, Clone, Serialize)]
pub struct DroppedRow {
    pub line: u64,
    pub value: String,
    pub reason: Rejection,
}

/// Output of [`clean`]: surviving records in input order plus what was dropped.
#[derive(Debug, Clone, Default)]
pub struct CleanReport {
    pub records: Vec<AccessRecord>,
    pub dropped: Vec<DroppedRow>,
}

struct Columns {
    timestamp: usize,
    event_type: usize,
    status: usize,
    subject: usize,
    observations: usize,
    response_time: usize,
}

impl Columns {
    fn resolve(table: &RawTable) -> Result<Self, IngestError> {
        Ok(Self {
            timestamp: table.require(COL_TIMESTAMP)?,
            event_type: table.require(COL_EVENT_TYPE)?,
            status: table.require(COL_STATUS)?,
            subject: table.require(COL_SUBJECT)?,
            observations: table.require(COL_OBSERVATIONS)?,
            response_time: table.require(COL_RESPONSE_TIME)?,
        })
    }
}

/// Clean every row of `table`.
pub fn clean(table: &RawTable) -> Result<CleanReport, CleanError> {
    let cols = Columns::resolve(table)?;
    let mut report = CleanReport::default();

    for (idx, row) in table.rows().iter().enumerate() {
        let line = row
            .position()
            .map(|p| p.line())
            .unwrap_or(idx as u64 + 2);

        let raw_ts = field(row, cols.timestamp);
        let timestamp = parse_timestamp(raw_ts).ok_or_else(|| CleanError::InvalidTimestamp {
            line,
            value: raw_ts.to_string(),
        })?;

        let raw_rt = field(row, cols.response_time);
        let response_time = match ResponseTime::parse(raw_rt) {
            Ok(rt) => rt,
            Err(reason) => {
                debug!(line, value = raw_rt, %reason, "dropping row with invalid response time");
                report.dropped.push(DroppedRow {
                    line,
                    value: raw_rt.to_string(),
                    reason,
                });
                continue;
            }
        };

        let observations = Some(field(row, cols.observations))
            .filter(|o| !o.trim().is_empty())
            .map(str::to_string);

        report.records.push(AccessRecord {
            timestamp,
            hour: timestamp.hour(),
            minute: timestamp.minute(),
            event_type: field(row, cols.event_type).to_string(),
            status: field(row, cols.status).to_string(),
            subject: field(row, cols.subject).to_string(),
            user_type: derive_user_type(observations.as_deref()),
            observations,
            response_time,
        });
    }

    info!(
        kept = report.records.len(),
        dropped = report.dropped.len(),
        "cleaned access records"
    );
    Ok(report)
}

/// First whitespace-delimited token of the observations, or [`UNKNOWN_USER_TYPE`].
pub fn derive_user_type(observations: Option<&str>) -> String {
    observations
        .and_then(|o| o.split_whitespace().next())
        .unwrap_or(UNKNOWN_USER_TYPE)
        .to_string()
}

/// Parse an event timestamp in any of the accepted layouts.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let text = raw.trim();
    if text.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.naive_local());
    }
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(text, fmt).ok())
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

fn field(row: &StringRecord, idx: usize) -> &str {
    row.get(idx).unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::read_table;
    use std::path::Path;

    const HEADER: &str = "Data e Hora,Tipo de Evento,Status,Usuário/Veículo,Observações,Tempo de Resposta (segundos)";

    fn table(rows: &[&str]) -> RawTable {
        let text = format!("{HEADER}\n{}\n", rows.join("\n"));
        read_table(text.as_bytes(), ',', Path::new("inline.csv")).unwrap()
    }

    #[test]
    fn test_response_time_parse() {
        assert_eq!(ResponseTime::parse("42"), Ok(ResponseTime::from_secs(42)));
        assert_eq!(ResponseTime::parse(" 7 "), Ok(ResponseTime::from_secs(7)));
        assert_eq!(ResponseTime::parse("3.9"), Ok(ResponseTime::from_secs(3)));
        assert_eq!(ResponseTime::parse("0"), Ok(ResponseTime::from_secs(0)));
        assert_eq!(ResponseTime::parse("N/A"), Err(Rejection::NotNumeric));
        assert_eq!(ResponseTime::parse(""), Err(Rejection::Empty));
        assert_eq!(ResponseTime::parse("-5"), Err(Rejection::Negative));
        assert_eq!(ResponseTime::parse("-0"), Ok(ResponseTime::from_secs(0)));
        assert_eq!(ResponseTime::parse("-0.5"), Ok(ResponseTime::from_secs(0)));
        assert_eq!(ResponseTime::parse("inf"), Err(Rejection::NotFinite));
        assert_eq!(ResponseTime::parse("NaN"), Err(Rejection::NotFinite));
        assert_eq!(ResponseTime::parse("99999999999"), Err(Rejection::OutOfRange));
    }

    #[test]
    fn test_parse_timestamp_layouts() {
        let expected = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(8, 5, 0)
            .unwrap();

        assert_eq!(parse_timestamp("2024-01-01 08:05:00"), Some(expected));
        assert_eq!(parse_timestamp("2024-01-01T08:05:00"), Some(expected));
        assert_eq!(parse_timestamp("2024-01-01 08:05"), Some(expected));
        assert_eq!(parse_timestamp("01/01/2024 08:05:00"), Some(expected));
        assert_eq!(parse_timestamp("2024-01-01T08:05:00Z"), Some(expected));
        assert_eq!(
            parse_timestamp("2024-01-01"),
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap().and_hms_opt(0, 0, 0)
        );
        assert_eq!(parse_timestamp("yesterday"), None);
        assert_eq!(parse_timestamp(""), None);
    }

    #[test]
    fn test_slash_dates_prefer_month_first() {
        let at = |y, m, d, h| {
            NaiveDate::from_ymd_opt(y, m, d)
                .unwrap()
                .and_hms_opt(h, 0, 0)
                .unwrap()
        };

        assert_eq!(parse_timestamp("01/02/2024 08:00"), Some(at(2024, 1, 2, 8)));
        assert_eq!(parse_timestamp("12/31/2024 08:00:00"), Some(at(2024, 12, 31, 8)));
        // Day-first when the first field cannot be a month.
        assert_eq!(parse_timestamp("31/12/2024 08:00"), Some(at(2024, 12, 31, 8)));
        assert_eq!(parse_timestamp("01/02/2024"), Some(at(2024, 1, 2, 0)));
        assert_eq!(parse_timestamp("25/12/2024"), Some(at(2024, 12, 25, 0)));
        assert_eq!(parse_timestamp("32/13/2024 99:00"), None);
    }

    #[test]
    fn test_derive_user_type() {
        assert_eq!(derive_user_type(Some("Visitante apartamento 12")), "Visitante");
        assert_eq!(derive_user_type(Some("  Morador")), "Morador");
        assert_eq!(derive_user_type(None), UNKNOWN_USER_TYPE);
        assert_eq!(derive_user_type(Some("   ")), UNKNOWN_USER_TYPE);
    }

    #[test]
    fn test_clean_derives_columns() {
        let t = table(&["2024-01-01 23:59:00,Saída,Permitido,ABC-1234,Morador bloco B,42"]);
        let report = clean(&t).unwrap();

        assert_eq!(report.records.len(), 1);
        let rec = &report.records[0];
        assert_eq!(rec.hour, 23);
        assert_eq!(rec.minute, 59);
        assert_eq!(rec.user_type, "Morador");
        assert_eq!(rec.response_time.as_secs(), 42);
        assert_eq!(rec.observations.as_deref(), Some("Morador bloco B"));
    }

    #[test]
    fn test_clean_drops_non_numeric_response_time() {
        let t = table(&[
            "2024-01-01 08:00:00,Entrada,Permitido,A,Morador,3",
            "2024-01-01 08:01:00,Entrada,Permitido,B,Morador,N/A",
            "2024-01-01 08:02:00,Entrada,Permitido,C,,5",
        ]);
        let report = clean(&t).unwrap();

        let subjects: Vec<&str> = report.records.iter().map(|r| r.subject.as_str()).collect();
        assert_eq!(subjects, ["A", "C"]);
        assert_eq!(report.dropped.len(), 1);
        assert_eq!(report.dropped[0].value, "N/A");
        assert_eq!(report.dropped[0].reason, Rejection::NotNumeric);
        assert_eq!(report.dropped[0].line, 3);

        assert_eq!(report.records[1].observations, None);
        assert_eq!(report.records[1].user_type, UNKNOWN_USER_TYPE);
    }

    #[test]
    fn test_clean_invalid_timestamp_is_fatal() {
        let t = table(&[
            "2024-01-01 08:00:00,Entrada,Permitido,A,Morador,3",
            "not a date,Entrada,Permitido,B,Morador,N/A",
        ]);
        let err = clean(&t).unwrap_err();
        match err {
            CleanError::InvalidTimestamp { line, value } => {
                assert_eq!(line, 3);
                assert_eq!(value, "not a date");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
