use std::collections::HashMap;
use std::path::Path;

use log::{info, warn};

use super::{DriverTelemetry, LapTime, Session, SessionRecord};
use crate::ReplayError;

/// Loads a session recorded as JSON Lines, one [`SessionRecord`] per line.
///
/// Drivers are enumerated in the order they are first declared. Samples keep
/// the order they appear in the file; the provider is trusted to emit them with
/// non-decreasing timestamps, violations are only reported.
pub fn load_session_jsonl(source_file: &Path) -> Result<Session, ReplayError> {
    let records = serde_jsonlines::json_lines::<SessionRecord, _>(source_file)
        .map_err(|e| ReplayError::SessionFileError { source: e })?;

    let mut session = Session::default();
    let mut index_by_id = HashMap::new();
    for (line_no, record) in records.enumerate() {
        let line = line_no + 1;
        let record = record.map_err(|e| ReplayError::SessionParseError {
            reason: format!("line {}: {}", line, e),
        })?;

        match record {
            SessionRecord::Driver(entity) => {
                if index_by_id.contains_key(&entity.id) {
                    warn!(
                        "Driver {} declared again at line {}, keeping the first declaration",
                        entity.id, line
                    );
                    continue;
                }
                index_by_id.insert(entity.id.clone(), session.drivers.len());
                session
                    .drivers
                    .push(DriverTelemetry::new(entity, Vec::new()));
            }
            SessionRecord::Lap {
                driver,
                lap_number,
                lap_time_ms,
            } => {
                let idx = *index_by_id
                    .get(&driver)
                    .ok_or(ReplayError::UndeclaredDriver { driver, line })?;
                session.drivers[idx].laps.push(LapTime {
                    lap_number,
                    lap_time_ms,
                });
            }
            SessionRecord::DataPoint { driver, sample } => {
                let idx = *index_by_id
                    .get(&driver)
                    .ok_or(ReplayError::UndeclaredDriver { driver, line })?;
                let telemetry = &mut session.drivers[idx];
                if let Some(last) = telemetry.samples.last() {
                    if sample.timestamp_ms < last.timestamp_ms {
                        warn!(
                            "Sample for {} at line {} goes back in time ({} < {})",
                            telemetry.entity.abbreviation,
                            line,
                            sample.timestamp_ms,
                            last.timestamp_ms
                        );
                    }
                }
                telemetry.samples.push(*sample);
            }
        }
    }

    info!(
        "Loaded {:?}, found {} drivers with a total of {} samples",
        source_file,
        session.drivers.len(),
        session.total_samples()
    );
    Ok(session)
}
