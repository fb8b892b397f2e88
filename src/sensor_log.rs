//! Append-only CSV log of observed samples.
//!
//! One writer (the stream loop), many readers (query handlers). A reader may
//! observe a torn trailing line while a row is being appended; reads skip
//! malformed rows instead of failing the whole query.

use crate::schema::{Channel, Sample};
use chrono::{DateTime, NaiveDateTime, Utc};
use std::collections::HashMap;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Log errors. A failed append loses that cycle's persistence only; the
/// in-memory sample still feeds prediction and alerting.
#[derive(Debug, thiserror::Error)]
pub enum LogError {
    #[error("log I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("log write error: {0}")]
    Csv(#[from] csv::Error),
}

/// Handle on the durable sensor log file.
#[derive(Debug, Clone)]
pub struct SensorLog {
    path: PathBuf,
}

impl SensorLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Column headers: timestamp fields first, then the channel schema.
    fn header() -> Vec<&'static str> {
        let mut header = vec!["Timestamp", "From Date"];
        header.extend(Channel::ALL.iter().map(|c| c.label()));
        header
    }

    /// Append one sample. The header is written on first use; rows are never
    /// rewritten. Channels absent from the sample are stored as empty fields.
    pub fn append(&self, sample: &Sample) -> Result<(), LogError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let needs_header = file.metadata()?.len() == 0;

        let mut writer = csv::Writer::from_writer(file);
        if needs_header {
            writer.write_record(Self::header())?;
        }

        let mut record = vec![
            sample.timestamp.format(TIMESTAMP_FORMAT).to_string(),
            sample.from_date.clone(),
        ];
        for channel in Channel::ALL {
            record.push(
                sample
                    .reading(channel)
                    .map(|v| v.to_string())
                    .unwrap_or_default(),
            );
        }
        writer.write_record(&record)?;
        writer.flush()?;
        Ok(())
    }

    /// All valid rows, oldest first. Malformed rows (wrong field count,
    /// unparsable timestamp, an in-progress trailing line) are skipped.
    /// Unparsable channel values become missing readings within their row.
    pub fn read_all(&self) -> Result<Vec<Sample>, LogError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_path(&self.path)?;

        let expected_fields = Self::header().len();
        let mut samples = Vec::new();
        for record in reader.records() {
            let record = match record {
                Ok(r) => r,
                Err(_) => continue,
            };
            if record.len() != expected_fields {
                continue;
            }
            let timestamp = match NaiveDateTime::parse_from_str(&record[0], TIMESTAMP_FORMAT) {
                Ok(naive) => DateTime::<Utc>::from_naive_utc_and_offset(naive, Utc),
                Err(_) => continue,
            };

            let mut readings = HashMap::new();
            for (i, channel) in Channel::ALL.iter().enumerate() {
                if let Ok(value) = record[i + 2].trim().parse::<f64>() {
                    if value.is_finite() {
                        readings.insert(*channel, value);
                    }
                }
            }

            samples.push(Sample {
                timestamp,
                from_date: record[1].to_string(),
                readings,
            });
        }
        Ok(samples)
    }

    /// Most recent valid row, if any.
    pub fn latest(&self) -> Result<Option<Sample>, LogError> {
        Ok(self.read_all()?.pop())
    }

    /// Last `n` valid rows, oldest first.
    pub fn tail(&self, n: usize) -> Result<Vec<Sample>, LogError> {
        let mut rows = self.read_all()?;
        let skip = rows.len().saturating_sub(n);
        Ok(rows.split_off(skip))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn sample_at(secs: i64, pm25: f64) -> Sample {
        let mut sample = Sample::new(HashMap::from([(Channel::Pm25, pm25)]));
        sample.timestamp = DateTime::<Utc>::from_timestamp(1_700_000_000 + secs, 0).unwrap();
        sample
    }

    #[test]
    fn test_append_writes_header_once() {
        let dir = tempfile::tempdir().unwrap();
        let log = SensorLog::new(dir.path().join("sensor_data.csv"));

        log.append(&sample_at(0, 31.0)).unwrap();
        log.append(&sample_at(5, 32.0)).unwrap();

        let content = std::fs::read_to_string(log.path()).unwrap();
        assert_eq!(content.matches("Timestamp").count(), 1);
        assert!(content.contains("PM2.5 (ug/m3)"));
        assert_eq!(content.lines().count(), 3);
    }

    #[test]
    fn test_round_trip_preserves_order_and_gaps() {
        let dir = tempfile::tempdir().unwrap();
        let log = SensorLog::new(dir.path().join("sensor_data.csv"));

        log.append(&sample_at(0, 31.0)).unwrap();
        log.append(&sample_at(5, 32.0)).unwrap();

        let rows = log.read_all().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].reading(Channel::Pm25), Some(31.0));
        assert_eq!(rows[1].reading(Channel::Pm25), Some(32.0));
        // Channels we never wrote come back missing, not zero.
        assert_eq!(rows[0].reading(Channel::So2), None);
    }

    #[test]
    fn test_torn_trailing_row_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let log = SensorLog::new(dir.path().join("sensor_data.csv"));

        log.append(&sample_at(0, 31.0)).unwrap();
        log.append(&sample_at(5, 32.0)).unwrap();

        // Simulate a reader racing an in-progress append.
        let mut file = OpenOptions::new().append(true).open(log.path()).unwrap();
        write!(file, "2023-11-14 22:13:30,2023-11-14,45.2,88").unwrap();

        let rows = log.read_all().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(log.latest().unwrap().unwrap().reading(Channel::Pm25), Some(32.0));
    }

    #[test]
    fn test_garbage_channel_value_becomes_missing() {
        let dir = tempfile::tempdir().unwrap();
        let log = SensorLog::new(dir.path().join("sensor_data.csv"));
        log.append(&sample_at(0, 31.0)).unwrap();

        let content = std::fs::read_to_string(log.path()).unwrap();
        let patched = content.replace("31", "not-a-number");
        std::fs::write(log.path(), patched).unwrap();

        let rows = log.read_all().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].reading(Channel::Pm25), None);
    }

    #[test]
    fn test_missing_file_reads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let log = SensorLog::new(dir.path().join("absent.csv"));
        assert!(log.read_all().unwrap().is_empty());
        assert!(log.latest().unwrap().is_none());
    }

    #[test]
    fn test_tail_returns_most_recent() {
        let dir = tempfile::tempdir().unwrap();
        let log = SensorLog::new(dir.path().join("sensor_data.csv"));
        for i in 0..5 {
            log.append(&sample_at(i * 5, 30.0 + i as f64)).unwrap();
        }
        let tail = log.tail(2).unwrap();
        assert_eq!(tail.len(), 2);
        assert_eq!(tail[0].reading(Channel::Pm25), Some(33.0));
        assert_eq!(tail[1].reading(Channel::Pm25), Some(34.0));
    }
}
