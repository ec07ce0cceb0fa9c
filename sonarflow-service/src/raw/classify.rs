// Temporal Classifier
// Derives timestamps and julian days from raw file names

use crate::error::{PipelineError, PipelineResult};
use crate::raw::record::RawFileRecord;

use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime};
use regex::Regex;
use std::collections::BTreeMap;

const DATE_GROUP: &str = "date";
const TIME_GROUP: &str = "time";

const DATE_FORMATS: &[&str] = &["%Y%m%d", "%Y-%m-%d", "%Y_%m_%d", "%Y/%m/%d"];
const TIME_FORMATS: &[&str] = &["%H%M%S%.f", "%H:%M:%S%.f", "%H-%M-%S%.f", "%H%M", "%H:%M"];

/// Fields extracted from one file identifier
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Classification {
    pub datetime: Option<NaiveDateTime>,
    pub jday: Option<u32>,
    pub month: Option<u32>,
    pub year: Option<i32>,
    /// Captured groups other than the consumed date and time
    pub fields: BTreeMap<String, String>,
}

impl Classification {
    /// Build a raw file record carrying these fields
    pub fn into_record(self, path: impl Into<String>, instrument: impl Into<String>) -> RawFileRecord {
        let mut record = RawFileRecord::new(path, instrument);
        record.datetime = self.datetime;
        record.jday = self.jday;
        record.month = self.month;
        record.year = self.year;
        record.fields = self
            .fields
            .into_iter()
            .map(|(k, v)| (k, serde_json::Value::String(v)))
            .collect();
        record
    }
}

/// Compiled file name pattern with named capture groups
#[derive(Debug, Clone)]
pub struct FilePattern {
    regex: Regex,
}

impl FilePattern {
    pub fn new(pattern: &str) -> PipelineResult<Self> {
        let regex = Regex::new(pattern).map_err(|e| PipelineError::InvalidPattern {
            pattern: pattern.to_string(),
            message: e.to_string(),
        })?;
        Ok(Self { regex })
    }

    pub fn as_str(&self) -> &str {
        self.regex.as_str()
    }

    /// Classify a file identifier.
    ///
    /// The first match of the pattern is used. When both `date` and `time` groups
    /// matched they are parsed into one timestamp and replaced by the derived
    /// `jday`, `month` and `year`; groups literally named `jday`, `month` or `year`
    /// take precedence over derived values. With only one of the two groups no
    /// timestamp is derived and the captured text is returned as-is.
    pub fn classify(&self, path: &str) -> PipelineResult<Classification> {
        let captures = self
            .regex
            .captures(path)
            .ok_or_else(|| PipelineError::PatternMismatch {
                path: path.to_string(),
                pattern: self.regex.as_str().to_string(),
            })?;

        let mut fields: BTreeMap<String, String> = self
            .regex
            .capture_names()
            .flatten()
            .filter_map(|name| {
                captures
                    .name(name)
                    .map(|m| (name.to_string(), m.as_str().to_string()))
            })
            .collect();

        let mut classification = Classification::default();

        if fields.contains_key(DATE_GROUP) && fields.contains_key(TIME_GROUP) {
            let date = fields.remove(DATE_GROUP).unwrap_or_default();
            let time = fields.remove(TIME_GROUP).unwrap_or_default();
            let datetime = parse_timestamp(&date, &time).ok_or_else(|| {
                PipelineError::TimestampParse {
                    path: path.to_string(),
                    value: format!("{}{}", date, time),
                }
            })?;
            classification.datetime = Some(datetime);
            classification.jday = Some(datetime.ordinal());
            classification.month = Some(datetime.month());
            classification.year = Some(datetime.year());
        }

        if let Some(jday) = take_number::<u32>(&mut fields, "jday") {
            classification.jday = Some(jday);
        }
        if let Some(month) = take_number::<u32>(&mut fields, "month") {
            classification.month = Some(month);
        }
        if let Some(year) = take_number::<i32>(&mut fields, "year") {
            classification.year = Some(year);
        }

        classification.fields = fields;
        Ok(classification)
    }

    /// Classify a path and build its record in one step
    pub fn record(&self, path: &str, instrument: &str) -> PipelineResult<RawFileRecord> {
        Ok(self.classify(path)?.into_record(path, instrument))
    }
}

/// Classify a single file identifier against a pattern string
pub fn parse_file_path(raw_file: &str, fname_pattern: &str) -> PipelineResult<Classification> {
    FilePattern::new(fname_pattern)?.classify(raw_file)
}

fn take_number<T: std::str::FromStr>(fields: &mut BTreeMap<String, String>, key: &str) -> Option<T> {
    let value = fields.get(key)?.parse::<T>().ok()?;
    fields.remove(key);
    Some(value)
}

fn parse_timestamp(date: &str, time: &str) -> Option<NaiveDateTime> {
    let date = parse_date(date.trim_start_matches('D'))?;
    let time = parse_time(time.trim_start_matches(|c: char| matches!(c, 'T' | 't' | '-' | '_')))?;
    Some(date.and_time(time))
}

fn parse_date(value: &str) -> Option<NaiveDate> {
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(value, format).ok())
}

fn parse_time(value: &str) -> Option<NaiveTime> {
    TIME_FORMATS
        .iter()
        .find_map(|format| NaiveTime::parse_from_str(value, format).ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    const ISO_PATTERN: &str =
        r"(?P<instrument>EK\d+)_(?P<date>\d{4}-\d{2}-\d{2})T(?P<time>\d{2}:\d{2}:\d{2})";

    #[test]
    fn test_iso_file_name() {
        let parsed = parse_file_path("EK60_2017-01-15T03:00:00.raw", ISO_PATTERN).unwrap();
        assert_eq!(parsed.jday, Some(15));
        assert_eq!(parsed.year, Some(2017));
        assert_eq!(parsed.month, Some(1));
        assert_eq!(
            parsed.datetime.map(|d| d.to_string()),
            Some("2017-01-15 03:00:00".to_string())
        );
        assert_eq!(parsed.fields.get("instrument").map(String::as_str), Some("EK60"));
        assert!(!parsed.fields.contains_key("date"));
        assert!(!parsed.fields.contains_key("time"));
    }

    #[test]
    fn test_compact_ooi_file_name() {
        let pattern = r"(?P<site>[A-Z0-9]+)-.*-D(?P<date>\d{8})-T(?P<time>\d{6})";
        let parsed = parse_file_path(
            "s3://ooi/CE04OSPS-PC01B-05-ZPLSCB102_OOI-D20170301-T120000.raw",
            pattern,
        )
        .unwrap();
        assert_eq!(parsed.jday, Some(60));
        assert_eq!(parsed.month, Some(3));
        assert_eq!(parsed.fields.get("site").map(String::as_str), Some("CE04OSPS"));
    }

    #[test]
    fn test_leap_year_day_of_year() {
        let pattern = r"D(?P<date>\d{8})-T(?P<time>\d{6})";
        let parsed = parse_file_path("x-D20161231-T235959.raw", pattern).unwrap();
        assert_eq!(parsed.jday, Some(366));
    }

    #[test]
    fn test_pattern_mismatch() {
        let err = parse_file_path("notes.txt", ISO_PATTERN).unwrap_err();
        assert!(matches!(err, PipelineError::PatternMismatch { .. }));
    }

    #[test]
    fn test_date_without_time_keeps_literals() {
        let pattern = r"(?P<instrument>EK\d+)_(?P<date>\d{8})";
        let parsed = parse_file_path("EK80_20170115.raw", pattern).unwrap();
        assert!(parsed.datetime.is_none());
        assert!(parsed.jday.is_none());
        assert_eq!(parsed.fields.get("date").map(String::as_str), Some("20170115"));
    }

    #[test]
    fn test_captured_jday_wins() {
        let pattern = r"day(?P<jday>\d{3})_(?P<date>\d{8})_(?P<time>\d{6})";
        let parsed = parse_file_path("day200_20170115_000000.raw", pattern).unwrap();
        assert_eq!(parsed.jday, Some(200));
        assert_eq!(parsed.month, Some(1));
        assert!(!parsed.fields.contains_key("jday"));
    }

    #[test]
    fn test_unparseable_timestamp() {
        let pattern = r"(?P<date>\d{8})-(?P<time>\d{6})";
        let err = parse_file_path("20171345-250000.raw", pattern).unwrap_err();
        assert!(matches!(err, PipelineError::TimestampParse { .. }));
    }

    #[test]
    fn test_invalid_regex() {
        let err = FilePattern::new("(?P<date>").unwrap_err();
        assert!(matches!(err, PipelineError::InvalidPattern { .. }));
    }

    #[test]
    fn test_record_carries_instrument() {
        let pattern = FilePattern::new(ISO_PATTERN).unwrap();
        let record = pattern.record("/raw/EK60_2017-02-01T00:00:00.raw", "EK60").unwrap();
        assert_eq!(record.instrument, "EK60");
        assert_eq!(record.jday, Some(32));
        assert_eq!(record.path, "/raw/EK60_2017-02-01T00:00:00.raw");
    }
}
