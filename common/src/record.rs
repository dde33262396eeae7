use chrono::{DateTime, FixedOffset, Local};

use crate::types::Sample;

pub const HEADER: &str = "timestamp\tcooling\ttemp\tnotes";

/// RFC 850 layout with a numeric offset, e.g. `Monday, 02-Jan-06 15:04:05 -0700`.
pub const TIMESTAMP_FORMAT: &str = "%A, %d-%b-%y %H:%M:%S %z";

pub const NOTE_RESTARTING: &str = "RESTARTING SYSTEM";
pub const NOTE_WAITING_OFF: &str = "RESTART: waiting on turn off";
pub const NOTE_TURNED_OFF: &str = "RESTART: system turned off";
pub const NOTE_WAITING_ON: &str = "RESTART: waiting on turn on";
pub const NOTE_TURNED_ON: &str = "RESTART: system turned on";

/// One row of the observation log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservationRecord {
    pub timestamp: DateTime<FixedOffset>,
    pub cooling: Option<bool>,
    pub temperature_f: Option<i32>,
    pub note: Option<String>,
}

impl ObservationRecord {
    pub fn sample_at(timestamp: DateTime<FixedOffset>, sample: &Sample) -> Self {
        Self {
            timestamp,
            cooling: Some(sample.is_cooling),
            temperature_f: Some(sample.temperature_f),
            note: None,
        }
    }

    pub fn note_at(timestamp: DateTime<FixedOffset>, note: impl Into<String>) -> Self {
        Self {
            timestamp,
            cooling: None,
            temperature_f: None,
            note: Some(note.into()),
        }
    }

    pub fn sample(sample: &Sample) -> Self {
        Self::sample_at(now(), sample)
    }

    pub fn note(note: impl Into<String>) -> Self {
        Self::note_at(now(), note)
    }

    /// Renders the row without a trailing newline. Every row has four columns.
    pub fn to_tsv(&self) -> String {
        let cooling = self.cooling.map(|value| value.to_string()).unwrap_or_default();
        let temperature = self
            .temperature_f
            .map(|value| value.to_string())
            .unwrap_or_default();
        let note = self.note.as_deref().map(flatten).unwrap_or_default();

        format!(
            "{}\t{cooling}\t{temperature}\t{note}",
            self.timestamp.format(TIMESTAMP_FORMAT)
        )
    }
}

fn now() -> DateTime<FixedOffset> {
    Local::now().fixed_offset()
}

fn flatten(note: &str) -> String {
    note.split(['\t', '\n', '\r'])
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::types::{HvacMode, HvacState};

    fn at() -> DateTime<FixedOffset> {
        FixedOffset::west_opt(7 * 3600)
            .unwrap()
            .with_ymd_and_hms(2006, 1, 2, 15, 4, 5)
            .unwrap()
    }

    #[test]
    fn header_has_four_columns() {
        assert_eq!(HEADER.split('\t').count(), 4);
    }

    #[test]
    fn sample_row_carries_cooling_and_temperature_only() {
        let sample = Sample::new(72, HvacMode::Cool, HvacState::Cooling);
        let row = ObservationRecord::sample_at(at(), &sample).to_tsv();

        let columns: Vec<&str> = row.split('\t').collect();
        assert_eq!(
            columns,
            vec!["Monday, 02-Jan-06 15:04:05 -0700", "true", "72", ""]
        );
    }

    #[test]
    fn note_row_leaves_sample_columns_empty() {
        let row = ObservationRecord::note_at(at(), NOTE_RESTARTING).to_tsv();
        assert_eq!(row, "Monday, 02-Jan-06 15:04:05 -0700\t\t\tRESTARTING SYSTEM");
    }

    #[test]
    fn multiline_notes_stay_on_one_row() {
        let row = ObservationRecord::note_at(at(), "Error turning system off:\nstatus\t503\n")
            .to_tsv();

        assert_eq!(row.lines().count(), 1);
        assert!(row.ends_with("\t\t\tError turning system off: status 503"));
    }
}
