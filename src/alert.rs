//! Console alerts for Critical access events.

use std::io::{self, Write};

use crate::detect::{Classification, EnrichedRecord};

pub const ALERT_BANNER: &str = "ALERT: Critical accesses detected!";

/// Write one alert block per Critical record, preceded by a single banner.
/// Writes nothing when no record is Critical. Returns the number of alerts.
pub fn write_alerts<W: Write>(out: &mut W, records: &[EnrichedRecord]) -> io::Result<usize> {
    let mut count = 0;

    for enriched in records
        .iter()
        .filter(|r| r.classification == Classification::Critical)
    {
        if count == 0 {
            writeln!(out, "\n{ALERT_BANNER}")?;
        }
        let rec = &enriched.record;
        tracing::debug!(
            timestamp = %rec.timestamp,
            event_type = %rec.event_type,
            subject = %rec.subject,
            "critical access"
        );

        writeln!(out, "- Date/Time: {}", rec.timestamp.format("%Y-%m-%d %H:%M:%S"))?;
        writeln!(out, "- Event type: {}", rec.event_type)?;
        writeln!(out, "- User/Vehicle: {}", rec.subject)?;
        writeln!(
            out,
            "- Observations: {}\n",
            rec.observations.as_deref().unwrap_or("(none)")
        )?;
        count += 1;
    }

    Ok(count)
}
